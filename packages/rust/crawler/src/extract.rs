//! Structured content extraction from embedded page data.
//!
//! Article pages ship their content as a JSON document inside a
//! `<script id="__NEXT_DATA__">` element. The extractor walks that JSON to
//! the content blocks and concatenates their text. Failures are reported as
//! an [`ExtractionFailure`] value, never raised, so a bad page cannot abort
//! a batch. A data block that is not JSON at all is the one failure that
//! makes the acquirer drop the page instead of keeping a placeholder.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;

use rfpcheck_shared::{ExtractionConfig, Result, RfpCheckError};

/// Title used when the page has no `<h1>`.
pub const TITLE_NOT_FOUND: &str = "Title not found";

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Why the article body could not be extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// No `<script>` element with the data id.
    DataBlockMissing,
    /// The data block does not parse as JSON. The page is skipped.
    InvalidJson { reason: String },
    /// The JSON parses but the blocks path is missing or mis-shaped.
    MalformedData { reason: String },
    /// The blocks were found but none carried text.
    EmptyContent,
}

impl ExtractionFailure {
    /// Diagnostic text stored in place of the article body.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::DataBlockMissing => "Embedded content data not found",
            Self::InvalidJson { .. } => "Embedded content data is not valid JSON",
            Self::MalformedData { .. } => "Failed to parse embedded content structure",
            Self::EmptyContent => "Embedded content blocks are empty",
        }
    }

    /// Whether the page should be dropped rather than kept with a placeholder.
    pub fn skips_page(&self) -> bool {
        matches!(self, Self::InvalidJson { .. })
    }
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson { reason } | Self::MalformedData { reason } => {
                write!(f, "{}: {reason}", self.placeholder())
            }
            _ => f.write_str(self.placeholder()),
        }
    }
}

/// Title and body pulled from one rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    /// Trimmed text of the first `<h1>`.
    pub title: Option<String>,
    /// Concatenated block text, or the reason there is none.
    pub body: std::result::Result<String, ExtractionFailure>,
}

impl ExtractedArticle {
    /// Title, or [`TITLE_NOT_FOUND`].
    pub fn title_or_placeholder(&self) -> &str {
        self.title.as_deref().unwrap_or(TITLE_NOT_FOUND)
    }

    /// Body text, or the failure placeholder.
    pub fn body_or_placeholder(&self) -> &str {
        match &self.body {
            Ok(body) => body,
            Err(failure) => failure.placeholder(),
        }
    }

    /// Render the document content: a title line followed by the body.
    pub fn to_document_content(&self) -> String {
        format!(
            "TITLE: {}\n\nCONTENT:\n{}",
            self.title_or_placeholder(),
            self.body_or_placeholder()
        )
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Extracts article content from the page-data JSON of rendered HTML.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    script_selector: Selector,
    blocks_pointer: String,
}

impl ContentExtractor {
    /// Build an extractor for the configured script id and blocks path.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let id = config.data_script_id.trim();
        if id.is_empty() {
            return Err(RfpCheckError::config("extraction.data_script_id is empty"));
        }
        if !config.blocks_pointer.is_empty() && !config.blocks_pointer.starts_with('/') {
            return Err(RfpCheckError::config(format!(
                "extraction.blocks_pointer must start with '/': {}",
                config.blocks_pointer
            )));
        }

        let script_selector = Selector::parse(&format!(r#"script[id="{id}"]"#))
            .map_err(|e| RfpCheckError::config(format!("invalid data script id '{id}': {e}")))?;

        Ok(Self {
            script_selector,
            blocks_pointer: config.blocks_pointer.clone(),
        })
    }

    /// Extract the title and body from a parsed page.
    pub fn extract(&self, doc: &Html) -> ExtractedArticle {
        ExtractedArticle {
            title: extract_h1(doc),
            body: self.extract_body(doc),
        }
    }

    /// Convenience wrapper over [`Self::extract`] for raw HTML.
    pub fn extract_html(&self, html: &str) -> ExtractedArticle {
        self.extract(&Html::parse_document(html))
    }

    fn extract_body(&self, doc: &Html) -> std::result::Result<String, ExtractionFailure> {
        let script = doc
            .select(&self.script_selector)
            .next()
            .ok_or(ExtractionFailure::DataBlockMissing)?;

        let raw: String = script.text().collect();
        let data: Value =
            serde_json::from_str(&raw).map_err(|e| ExtractionFailure::InvalidJson {
                reason: e.to_string(),
            })?;

        let blocks = walk_pointer(&data, &self.blocks_pointer)?;
        let blocks = blocks
            .as_array()
            .ok_or_else(|| ExtractionFailure::MalformedData {
                reason: format!("expected array at {}", self.blocks_pointer),
            })?;

        let mut parts = Vec::new();
        for (i, block) in blocks.iter().enumerate() {
            let block = block
                .as_object()
                .ok_or_else(|| ExtractionFailure::MalformedData {
                    reason: format!("block {i} is not an object"),
                })?;

            match block.get("text") {
                None | Some(Value::Null) => {}
                Some(Value::String(text)) if text.is_empty() => {}
                Some(Value::String(text)) => parts.push(text.as_str()),
                Some(_) => {
                    return Err(ExtractionFailure::MalformedData {
                        reason: format!("block {i} has a non-string text field"),
                    });
                }
            }
        }

        let content = parts.join("\n\n").trim().to_string();
        if content.is_empty() {
            return Err(ExtractionFailure::EmptyContent);
        }
        Ok(content)
    }
}

/// Follow a JSON pointer one key at a time so failures name the missing step.
fn walk_pointer<'a>(
    data: &'a Value,
    pointer: &str,
) -> std::result::Result<&'a Value, ExtractionFailure> {
    let mut current = data;
    for key in pointer.split('/').skip(1) {
        current = match current {
            Value::Object(map) => map.get(key).ok_or_else(|| ExtractionFailure::MalformedData {
                reason: format!("missing key '{key}'"),
            })?,
            Value::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .ok_or_else(|| ExtractionFailure::MalformedData {
                    reason: format!("missing index '{key}'"),
                })?,
            _ => {
                return Err(ExtractionFailure::MalformedData {
                    reason: format!("expected object before '{key}'"),
                });
            }
        };
    }
    Ok(current)
}

/// Extract the trimmed text of the first `<h1>`.
pub(crate) fn extract_h1(doc: &Html) -> Option<String> {
    static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("valid selector"));

    doc.select(&H1)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}
