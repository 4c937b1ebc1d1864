//! Error types for RfpCheck.
//!
//! Library crates use [`RfpCheckError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all RfpCheck operations.
#[derive(Debug, thiserror::Error)]
pub enum RfpCheckError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Session credentials could not be attached to the browser.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Navigating to or reading a single page failed.
    #[error("navigation error for {url}: {message}")]
    Navigation { url: String, message: String },

    /// The browser could not be launched or driven.
    #[error("browser error: {0}")]
    Browser(String),

    /// No documents or chunks were available to build the index from.
    #[error("empty corpus: no documents were loaded, check content extraction and cookies")]
    EmptyCorpus,

    /// Similarity index misuse (empty index, dimension mismatch, bad k).
    #[error("index error: {message}")]
    Index { message: String },

    /// Embedding or language-model service failure.
    #[error("service error: {0}")]
    Service(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RfpCheckError>;

impl RfpCheckError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a navigation error for a URL.
    pub fn navigation(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create an index error from any displayable message.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
