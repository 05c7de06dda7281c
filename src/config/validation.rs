//! Configuration validation logic.

use std::collections::HashSet;

use crate::config::loader::{Config, GroupConfig, SourceEntry};
use crate::config::seed::{filter_record, source_record};
use crate::error::{Error, Result};
use crate::filters::CompiledFilter;
use crate::sources::SourceRegistry;

/// Longest source name the store accepts.
const MAX_SOURCE_NAME_LENGTH: usize = 36;

/// Longest source type the store accepts.
const MAX_SOURCE_TYPE_LENGTH: usize = 15;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_credentials(config)?;
    validate_groups(&config.groups, &SourceRegistry::builtin())?;

    Ok(())
}

/// Validate what scanning needs to authenticate.
pub fn validate_credentials(config: &Config) -> Result<()> {
    let token = config.account.refresh_token.trim();
    if token.is_empty() {
        return Err(Error::MissingConfig("refresh_token".to_string()));
    }

    let lower = token.to_lowercase();
    if lower.contains("replaceme") || lower.contains("your_token") {
        return Err(Error::ConfigValidation {
            field: "refresh_token".to_string(),
            message: "Token appears to be a placeholder. Please authorize an account.".to_string(),
        });
    }

    if config.account.client_id.trim().is_empty() {
        return Err(Error::MissingConfig("client_id".to_string()));
    }

    if config.account.user_agent.trim().is_empty() {
        return Err(Error::MissingConfig("user_agent".to_string()));
    }

    Ok(())
}

/// Validate group definitions: names, source names, filters.
///
/// A source whose type or settings are unusable does not fail validation.
/// It is logged here and skipped when its group is loaded, so the rest of
/// the group still scans.
pub fn validate_groups(groups: &[GroupConfig], registry: &SourceRegistry) -> Result<()> {
    let mut names = HashSet::new();
    for group in groups {
        let name = group.name.trim();
        if name.is_empty() {
            return Err(Error::ConfigValidation {
                field: "groups.name".to_string(),
                message: "Group names must not be empty".to_string(),
            });
        }
        if !names.insert(name.to_lowercase()) {
            return Err(Error::ConfigValidation {
                field: "groups.name".to_string(),
                message: format!("Group '{}' is defined more than once", name),
            });
        }

        for entry in &group.sources {
            if entry.name.is_empty() || entry.name.chars().count() > MAX_SOURCE_NAME_LENGTH {
                return Err(Error::ConfigValidation {
                    field: "sources.name".to_string(),
                    message: format!(
                        "Source name '{}' must be 1 to {} characters",
                        entry.name, MAX_SOURCE_NAME_LENGTH
                    ),
                });
            }
            if let Err(error) = check_source(entry, registry) {
                tracing::warn!(
                    "Source '{}' ({}) in group '{}' will be skipped: {}",
                    entry.name,
                    entry.source_type,
                    name,
                    error
                );
            }
        }

        for filter in &group.filters {
            CompiledFilter::compile(&filter_record(filter, 0)?)?;
        }
    }

    Ok(())
}

/// Build a source once so bad settings are reported before scanning.
fn check_source(entry: &SourceEntry, registry: &SourceRegistry) -> Result<()> {
    if entry.source_type.len() > MAX_SOURCE_TYPE_LENGTH {
        return Err(Error::UnknownSourceType(entry.source_type.clone()));
    }
    registry.create_from_db(&source_record(entry, 0)?)?;
    Ok(())
}
