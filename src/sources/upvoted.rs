//! Submissions upvoted by the authenticated account.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{ContentApi, ListingKind};
use crate::error::Result;
use crate::listing::ListingReader;
use crate::sources::schema::{parse_config, DefaultValue, FieldType, SchemaField};
use crate::sources::{check_type, Source, SourceVariant};
use crate::store::SourceRecord;

pub const TYPE: &str = "upvoted-posts";

pub const SCHEMA: &[SchemaField] = &[SchemaField {
    name: "limit",
    description: "Maximum number of upvoted posts to scan (0 for all)",
    field_type: FieldType::Number,
    default: DefaultValue::Number(0.0),
}];

pub const VARIANT: SourceVariant = SourceVariant {
    source_type: TYPE,
    description: "Submissions upvoted by the authorized account",
    schema: SCHEMA,
    factory: build,
};

fn build(record: &SourceRecord) -> Result<Box<dyn Source>> {
    Ok(Box::new(UpvotedPostSource::create_from_db(record)?))
}

#[derive(Debug, Clone)]
pub struct UpvotedPostSource {
    name: String,
    limit: usize,
}

impl UpvotedPostSource {
    pub fn create_from_db(record: &SourceRecord) -> Result<Self> {
        check_type(record, TYPE)?;
        let parsed = parse_config(SCHEMA, &record.data_json)?;
        Ok(Self {
            name: record.name.clone(),
            limit: parsed.get_count("limit")?,
        })
    }
}

#[async_trait]
impl Source for UpvotedPostSource {
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
        let listing = api.start_listing(&ListingKind::Upvoted).await?;
        Ok(ListingReader::new(api, listing, self.limit).submissions_only())
    }
}
