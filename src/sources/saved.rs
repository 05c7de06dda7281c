//! Items saved by the authenticated account.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{ContentApi, ListingKind};
use crate::error::Result;
use crate::listing::ListingReader;
use crate::sources::schema::{parse_config, DefaultValue, FieldType, SchemaField};
use crate::sources::{check_type, Source, SourceVariant};
use crate::store::SourceRecord;

pub const TYPE: &str = "saved-posts";

pub const SCHEMA: &[SchemaField] = &[
    SchemaField {
        name: "getComments",
        description: "Also download media linked in saved comments?",
        field_type: FieldType::Boolean,
        default: DefaultValue::Bool(true),
    },
    SchemaField {
        name: "limit",
        description: "Maximum number of saved items to scan (0 for all)",
        field_type: FieldType::Number,
        default: DefaultValue::Number(0.0),
    },
];

pub const VARIANT: SourceVariant = SourceVariant {
    source_type: TYPE,
    description: "Posts and comments saved by the authorized account",
    schema: SCHEMA,
    factory: build,
};

fn build(record: &SourceRecord) -> Result<Box<dyn Source>> {
    Ok(Box::new(SavedPostSource::create_from_db(record)?))
}

/// Typed config for [`SavedPostSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedConfig {
    pub get_comments: bool,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct SavedPostSource {
    name: String,
    config: SavedConfig,
}

impl SavedPostSource {
    pub fn create_from_db(record: &SourceRecord) -> Result<Self> {
        check_type(record, TYPE)?;
        let parsed = parse_config(SCHEMA, &record.data_json)?;
        Ok(Self {
            name: record.name.clone(),
            config: SavedConfig {
                get_comments: parsed.get_bool("getComments")?,
                limit: parsed.get_count("limit")?,
            },
        })
    }

    pub fn config(&self) -> &SavedConfig {
        &self.config
    }
}

#[async_trait]
impl Source for SavedPostSource {
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
        self.config.get_comments
    }

    async fn find(&self, api: Arc<dyn ContentApi>) -> Result<ListingReader> {
        let listing = api.start_listing(&ListingKind::Saved).await?;
        let reader = ListingReader::new(api, listing, self.config.limit);
        Ok(if self.config.get_comments {
            reader
        } else {
            reader.submissions_only()
        })
    }
}
