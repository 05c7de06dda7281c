//! Posts listed in a subreddit.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{ContentApi, ListingKind, SubredditSort, TimeRange};
use crate::error::{Error, Result};
use crate::listing::ListingReader;
use crate::sources::schema::{apply_schema, parse_json_object, DefaultValue, FieldType, SchemaField};
use crate::sources::{check_type, Source, SourceVariant};
use crate::store::SourceRecord;

pub const TYPE: &str = "subreddit-posts";

pub const SCHEMA: &[SchemaField] = &[
    SchemaField {
        name: "subreddit",
        description: "Subreddit to scan (without the r/ prefix)",
        field_type: FieldType::String,
        default: DefaultValue::Str("all"),
    },
    SchemaField {
        name: "type",
        description: "Sort order: hot, new, top, or rising",
        field_type: FieldType::String,
        default: DefaultValue::Str("hot"),
    },
    SchemaField {
        name: "time",
        description: "Time range for top posts: hour, day, week, month, year, or all",
        field_type: FieldType::String,
        default: DefaultValue::Str("all"),
    },
    SchemaField {
        name: "limit",
        description: "Maximum number of posts to scan",
        field_type: FieldType::Number,
        default: DefaultValue::Number(100.0),
    },
];

pub const VARIANT: SourceVariant = SourceVariant {
    source_type: TYPE,
    description: "Posts from a subreddit listing",
    schema: SCHEMA,
    factory: build,
};

fn build(record: &SourceRecord) -> Result<Box<dyn Source>> {
    Ok(Box::new(SubredditPostSource::create_from_db(record)?))
}

/// Typed config for [`SubredditPostSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubredditConfig {
    pub subreddit: String,
    pub sort: SubredditSort,
    pub time: TimeRange,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct SubredditPostSource {
    name: String,
    config: SubredditConfig,
}

impl SubredditPostSource {
    pub fn create_from_db(record: &SourceRecord) -> Result<Self> {
        check_type(record, TYPE)?;

        let mut data = parse_json_object(&record.data_json)?;
        // "sort" is accepted as an alias for the sort key.
        if !data.contains_key("type") {
            if let Some(sort) = data.remove("sort") {
                data.insert("type".to_string(), sort);
            }
        }
        let parsed = apply_schema(SCHEMA, &data)?;

        let subreddit = parsed
            .get_str("subreddit")?
            .trim()
            .trim_start_matches("/r/")
            .trim_start_matches("r/")
            .to_string();
        if subreddit.is_empty() {
            return Err(Error::InvalidSourceConfig {
                field: "subreddit".to_string(),
                message: "subreddit name cannot be empty".to_string(),
            });
        }

        let sort = parsed
            .get_str("type")?
            .parse::<SubredditSort>()
            .map_err(|message| Error::InvalidSourceConfig {
                field: "type".to_string(),
                message,
            })?;

        let time = parsed
            .get_str("time")?
            .parse::<TimeRange>()
            .map_err(|message| Error::InvalidSourceConfig {
                field: "time".to_string(),
                message,
            })?;

        Ok(Self {
            name: record.name.clone(),
            config: SubredditConfig {
                subreddit,
                sort,
                time,
                limit: parsed.get_count("limit")?,
            },
        })
    }

    pub fn config(&self) -> &SubredditConfig {
        &self.config
    }
}

#[async_trait]
impl Source for SubredditPostSource {
    fn source_type(&self) -> &'static str {
        TYPE
    }

    fn schema(&self) -> &'static [SchemaField] {
        SCHEMA
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn yields_comments(&self) -> bool {
        false
    }

    async fn find(&self, api: Arc<dyn ContentApi>) -> Result<ListingReader> {
        let kind = ListingKind::Subreddit {
            name: self.config.subreddit.clone(),
            sort: self.config.sort,
            time: self.config.time,
        };
        let listing = api.start_listing(&kind).await?;
        Ok(ListingReader::new(api, listing, self.config.limit).submissions_only())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(data_json: &str) -> SourceRecord {
        SourceRecord {
            id: 1,
            source_type: TYPE.to_string(),
            name: "news".to_string(),
            data_json: data_json.to_string(),
            source_group_id: 1,
        }
    }

    #[test]
    fn test_defaults() {
        let source = SubredditPostSource::create_from_db(&record("{}")).unwrap();
        assert_eq!(
            source.config(),
            &SubredditConfig {
                subreddit: "all".to_string(),
                sort: SubredditSort::Hot,
                time: TimeRange::All,
                limit: 100,
            }
        );
    }

    #[test]
    fn test_sort_alias_and_prefix_strip() {
        let source = SubredditPostSource::create_from_db(&record(
            r#"{"subreddit":"r/pics","sort":"rising","limit":"5"}"#,
        ))
        .unwrap();
        assert_eq!(source.config().subreddit, "pics");
        assert_eq!(source.config().sort, SubredditSort::Rising);
        assert_eq!(source.config().limit, 5);
    }

    #[test]
    fn test_invalid_sort_rejected() {
        let err = SubredditPostSource::create_from_db(&record(r#"{"type":"best"}"#)).unwrap_err();
        assert!(matches!(err, Error::InvalidSourceConfig { ref field, .. } if field == "type"));
    }

    #[test]
    fn test_wrong_record_type_rejected() {
        let mut rec = record("{}");
        rec.source_type = "saved-posts".to_string();
        assert!(SubredditPostSource::create_from_db(&rec).is_err());
    }
}
