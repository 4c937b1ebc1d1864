//! Shared types, error model, and configuration for RfpCheck.
//!
//! This crate is the foundation depended on by all other RfpCheck crates.
//! It provides:
//! - [`RfpCheckError`] — the unified error type
//! - Domain types ([`SessionCredential`], [`SourceDocument`], [`Chunk`])
//! - Configuration ([`AppConfig`], [`SourceConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, ChunkingConfig, ExtractionConfig, OpenAiConfig, RetrievalConfig,
    SourceConfig, SourceSettings, config_dir, config_file_path, init_config, load_config,
    load_config_from, parse_url_list, validate_api_key,
};
pub use error::{Result, RfpCheckError};
pub use types::{
    Chunk, ChunkMetadata, DocumentMetadata, SessionCredential, SourceDocument, content_hash,
};
