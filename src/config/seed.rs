//! Turning configured groups into stored rows.

use crate::config::loader::{Config, FilterConfig, SourceEntry};
use crate::error::Result;
use crate::store::{FilterRecord, GroupId, SourceRecord, Store};

/// Stored form of a configured source. `data` becomes its JSON settings.
pub fn source_record(entry: &SourceEntry, group_id: GroupId) -> Result<SourceRecord> {
    Ok(SourceRecord {
        id: 0,
        source_type: entry.source_type.clone(),
        name: entry.name.clone(),
        data_json: serde_json::to_string(&entry.data)?,
        source_group_id: group_id,
    })
}

/// Stored form of a configured filter.
pub fn filter_record(filter: &FilterConfig, group_id: GroupId) -> Result<FilterRecord> {
    Ok(FilterRecord {
        id: 0,
        for_submissions: filter.for_submissions,
        field: filter.field.clone(),
        comparator: filter.comparator.clone(),
        value_json: serde_json::to_string(&filter.value)?,
        negative_match: filter.negative_match,
        source_group_id: group_id,
    })
}

/// Make the stored groups match the configuration.
///
/// A group already in the store is replaced with its configured sources and
/// filters. Stored groups missing from the configuration are removed. Posts,
/// urls and files are left alone. Returns the group ids in configuration order.
pub async fn seed_store(config: &Config, store: &dyn Store) -> Result<Vec<GroupId>> {
    for stored in store.source_groups().await? {
        let configured = config.groups.iter().any(|g| g.name == stored.name);
        if !configured {
            tracing::debug!("Removing group '{}' no longer in config", stored.name);
            store.delete_source_group(stored.id).await?;
        }
    }

    let mut ids = Vec::with_capacity(config.groups.len());
    for group in &config.groups {
        if let Some(existing) = store.find_source_group_by_name(&group.name).await? {
            store.delete_source_group(existing.id).await?;
        }

        let record = store.insert_source_group(&group.name, &group.color).await?;
        for entry in &group.sources {
            store.insert_source(source_record(entry, record.id)?).await?;
        }
        for filter in &group.filters {
            store.insert_filter(filter_record(filter, record.id)?).await?;
        }
        tracing::debug!(
            "Seeded group '{}' with {} sources and {} filters",
            group.name,
            group.sources.len(),
            group.filters.len()
        );
        ids.push(record.id);
    }
    Ok(ids)
}
