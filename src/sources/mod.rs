//! Content sources.
//!
//! A source turns one stored configuration into a lazy stream of posts.
//! Variants are looked up by their `type` discriminant in a
//! [`SourceRegistry`]; `create_from_db` is the only construction path.

pub mod saved;
pub mod schema;
pub mod subreddit;
pub mod upvoted;

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::ContentApi;
use crate::error::{Error, Result};
use crate::listing::ListingReader;
use crate::store::SourceRecord;

pub use saved::SavedPostSource;
pub use schema::{FieldType, SchemaField, SourceConfig};
pub use subreddit::SubredditPostSource;
pub use upvoted::UpvotedPostSource;

/// A configured generator of posts.
#[async_trait]
pub trait Source: Send + Sync {
    fn source_type(&self) -> &'static str;

    /// Declared config fields, in prompt order.
    fn schema(&self) -> &'static [SchemaField];

    /// User-assigned name from the stored record.
    fn name(&self) -> &str;

    /// Whether this source can yield comments as well as submissions.
    fn yields_comments(&self) -> bool;

    /// Start a fresh retrieval. Every call begins from the first page.
    async fn find(&self, api: Arc<dyn ContentApi>) -> Result<ListingReader>;
}

/// Constructor from a stored record.
pub type SourceFactory = fn(&SourceRecord) -> Result<Box<dyn Source>>;

/// A registered source variant.
#[derive(Clone, Copy)]
pub struct SourceVariant {
    pub source_type: &'static str,
    pub description: &'static str,
    pub schema: &'static [SchemaField],
    pub factory: SourceFactory,
}

impl std::fmt::Debug for SourceVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceVariant")
            .field("source_type", &self.source_type)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Maps `type` discriminants to variant constructors.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    variants: Vec<SourceVariant>,
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self {
            variants: Vec::new(),
        }
    }

    /// Registry with every built-in variant.
    pub fn builtin() -> Self {
        Self {
            variants: vec![
                saved::VARIANT,
                upvoted::VARIANT,
                subreddit::VARIANT,
            ],
        }
    }

    /// Add a variant. Discriminants must be unique.
    pub fn register(&mut self, variant: SourceVariant) -> Result<()> {
        if self.get(variant.source_type).is_some() {
            return Err(Error::Config(format!(
                "Source type '{}' is already registered",
                variant.source_type
            )));
        }
        self.variants.push(variant);
        Ok(())
    }

    pub fn get(&self, source_type: &str) -> Option<&SourceVariant> {
        self.variants.iter().find(|v| v.source_type == source_type)
    }

    pub fn variants(&self) -> &[SourceVariant] {
        &self.variants
    }

    /// Build a runnable source from its stored configuration.
    pub fn create_from_db(&self, record: &SourceRecord) -> Result<Box<dyn Source>> {
        let variant = self
            .get(&record.source_type)
            .ok_or_else(|| Error::UnknownSourceType(record.source_type.clone()))?;
        (variant.factory)(record)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Build a source with the built-in registry.
pub fn make_source(record: &SourceRecord) -> Result<Box<dyn Source>> {
    SourceRegistry::builtin().create_from_db(record)
}

/// Every built-in variant.
pub fn available_sources() -> Vec<SourceVariant> {
    SourceRegistry::builtin().variants
}

/// Reject records handed to the wrong variant.
fn check_type(record: &SourceRecord, expected: &str) -> Result<()> {
    if record.source_type != expected {
        return Err(Error::InvalidSourceConfig {
            field: "type".to_string(),
            message: format!(
                "record of type '{}' cannot build a '{}' source",
                record.source_type, expected
            ),
        });
    }
    Ok(())
}
