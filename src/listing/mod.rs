//! Paginated retrieval module.
//!
//! Provides:
//! - `ListingReader`, a pull-based cursor over an upstream listing
//! - Raw item resolution with one-shot lazy completion

pub mod reader;
pub mod resolve;

pub use reader::{ListingReader, DEFAULT_PAGE_SIZE};
pub use resolve::resolve_post;
