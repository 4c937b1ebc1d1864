//! Core domain types shared by the ingestion and retrieval stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Cookie path applied to every session credential.
pub const DEFAULT_COOKIE_PATH: &str = "/";

// ---------------------------------------------------------------------------
// SessionCredential
// ---------------------------------------------------------------------------

/// A cookie replayed into the browser to authenticate without logging in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    /// Cookie name.
    pub name: String,
    /// Cookie value. Never logged in full.
    pub value: String,
    /// Target site domain, identical for every credential of a run.
    pub domain: String,
    /// Cookie path (always `/`).
    pub path: String,
}

impl SessionCredential {
    /// Create a credential scoped to `domain` with the root path.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: DEFAULT_COOKIE_PATH.to_string(),
        }
    }

    /// The value with everything past the first two characters hidden.
    pub fn masked_value(&self) -> String {
        let visible: String = self.value.chars().take(2).collect();
        format!("{visible}***")
    }
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("name", &self.name)
            .field("value", &self.masked_value())
            .field("domain", &self.domain)
            .field("path", &self.path)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// Provenance of a scraped page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// The article URL the document was scraped from.
    pub source: Url,
    /// Page title (first `<h1>`), if one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the page was rendered.
    pub fetched_at: DateTime<Utc>,
    /// SHA-256 of `content`.
    pub content_hash: String,
}

/// One scraped article, ready to be chunked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Title line plus extracted body (or a diagnostic placeholder).
    pub content: String,
    /// Provenance.
    pub metadata: DocumentMetadata,
}

impl SourceDocument {
    /// Build a document from its parts, stamping the fetch time and hash.
    pub fn new(source: Url, title: Option<String>, content: String) -> Self {
        let content_hash = content_hash(&content);
        Self {
            content,
            metadata: DocumentMetadata {
                source,
                title,
                fetched_at: Utc::now(),
                content_hash,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// Traceability information carried by every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Inherited unchanged from the parent document.
    pub source: Url,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// Character offset of the chunk inside the document content.
    pub start_char: usize,
}

/// A bounded slice of a document's text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Compute the hex SHA-256 of a string.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
