//! Filesystem module.
//!
//! Provides:
//! - Download path layout
//! - Filename sanitizing

pub mod naming;
pub mod paths;

pub use naming::{make_unique_filename, text_component, truncate_component};
pub use paths::{download_target, ensure_dir, temp_name, with_appended_extension};
