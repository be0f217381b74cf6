//! Shared types, error model, and configuration for toolscout.
//!
//! This crate is the foundation depended on by all other toolscout crates.
//! It provides:
//! - [`ToolscoutError`] — the unified error type
//! - Domain types ([`RawRecord`], [`EnrichedRecord`], [`RecordStatus`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)
//! - Slug derivation ([`slugify`])

pub mod config;
pub mod error;
pub mod slug;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalysisConfig, AppConfig, DefaultsConfig, PipelineConfig, PipelineSection, ServerConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_database_path, validate_api_key, validate_config,
};
pub use error::{Result, ToolscoutError};
pub use slug::{FALLBACK_SLUG, slugify};
pub use types::{
    EnrichedPage, EnrichedRecord, Feature, NewEnrichedRecord, PipelineStatus, ProsCons,
    RawRecord, RecordStatus, StatusUpdate, ToolProfile,
};
