//! Configuration module for the reddit-media-downloader.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Configuration validation
//! - Seeding a store with the configured source groups

pub mod loader;
pub mod seed;
pub mod validation;

pub use loader::{AccountConfig, Config, FilterConfig, GroupConfig, OptionsConfig, SourceEntry};
pub use seed::seed_store;
pub use validation::validate_config;
