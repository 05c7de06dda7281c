//! Deduplication module.
//!
//! Provides:
//! - File hashing (perceptual for images, metadata-blind for MP4, MD5 otherwise)
//! - Media kind and MIME detection for finished downloads

pub mod hash;

pub use hash::{hash_file, mime_type, MediaKind};
