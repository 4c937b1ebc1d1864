//! Application configuration for RfpCheck.
//!
//! User config lives at `~/.rfpcheck/rfpcheck.toml`. Secrets (session
//! cookies, API keys) are never stored there: the file only names the
//! environment variables to read them from. A `.env` file in the working
//! directory is honored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, RfpCheckError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "rfpcheck.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".rfpcheck";

// ---------------------------------------------------------------------------
// Config structs (matching rfpcheck.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the knowledge-base source settings come from.
    #[serde(default)]
    pub source: SourceSettings,

    /// Headless browser settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Embedded page-data extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Text splitting settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// OpenAI-compatible service settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// `[source]` section: names of the env vars holding the scrape inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Env var with the raw `name=value; ...` cookie string.
    #[serde(default = "default_cookies_env")]
    pub cookies_env: String,

    /// Env var with the cookie domain.
    #[serde(default = "default_domain_env")]
    pub domain_env: String,

    /// Env var with the comma-separated article URLs.
    #[serde(default = "default_urls_env")]
    pub urls_env: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            cookies_env: default_cookies_env(),
            domain_env: default_domain_env(),
            urls_env: default_urls_env(),
        }
    }
}

fn default_cookies_env() -> String {
    "SESSION_COOKIES".into()
}
fn default_domain_env() -> String {
    "TARGET_DOMAIN".into()
}
fn default_urls_env() -> String {
    "ARTICLE_URLS".into()
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run Chromium without a window.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Per-URL navigation timeout in seconds.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Explicit Chromium executable; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Pass `--no-sandbox` (needed in most containers).
    #[serde(default)]
    pub no_sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout_secs: default_navigation_timeout(),
            executable: None,
            no_sandbox: false,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_navigation_timeout() -> u64 {
    30
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// `id` of the `<script>` element holding the page data JSON.
    #[serde(default = "default_data_script_id")]
    pub data_script_id: String,

    /// JSON pointer to the array of content blocks.
    #[serde(default = "default_blocks_pointer")]
    pub blocks_pointer: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            data_script_id: default_data_script_id(),
            blocks_pointer: default_blocks_pointer(),
        }
    }
}

fn default_data_script_id() -> String {
    "__NEXT_DATA__".into()
}
fn default_blocks_pointer() -> String {
    "/props/pageProps/articleContent/blocks".into()
}

/// `[chunking]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks of one document.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1500
}
fn default_chunk_overlap() -> usize {
    200
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the language model.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Maximum inputs per embedding request.
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            embedding_batch_size: default_embedding_batch_size(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_embedding_batch_size() -> usize {
    64
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model, used for both chunks and queries.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Chat model that judges the demand.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Sampling temperature for the chat model.
    #[serde(default)]
    pub temperature: f32,

    /// HTTP timeout for service calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            temperature: 0.0,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_chat_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_request_timeout() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Source config (runtime, resolved from the environment)
// ---------------------------------------------------------------------------

/// Scrape inputs resolved from the environment at pipeline-build time.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Raw cookie string, if set.
    pub cookie_string: Option<String>,
    /// Cookie domain, if set.
    pub domain: Option<String>,
    /// Article URLs in configured order.
    pub urls: Vec<Url>,
}

impl SourceSettings {
    /// Resolve the source config from the process environment (and `.env`).
    pub fn from_env(&self) -> SourceConfig {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(?path, "loaded .env file");
        }
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve the source config through an arbitrary variable lookup.
    pub fn resolve_with<F>(&self, lookup: F) -> SourceConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let urls = lookup(&self.urls_env)
            .map(|raw| parse_url_list(&raw))
            .unwrap_or_default();

        SourceConfig {
            cookie_string: non_blank(&self.cookies_env),
            domain: non_blank(&self.domain_env).map(|d| d.trim().to_string()),
            urls,
        }
    }
}

/// Parse a comma-separated URL list, dropping blanks and unparsable entries.
pub fn parse_url_list(raw: &str) -> Vec<Url> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match Url::parse(s) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(url = s, error = %e, "skipping unparsable article URL");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.rfpcheck/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RfpCheckError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.rfpcheck/rfpcheck.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RfpCheckError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RfpCheckError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RfpCheckError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RfpCheckError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RfpCheckError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the OpenAI API key env var is set and non-empty, returning it.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(RfpCheckError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("SESSION_COOKIES"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("__NEXT_DATA__"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.chunking.chunk_size, 1500);
        assert_eq!(parsed.chunking.chunk_overlap, 200);
        assert_eq!(parsed.retrieval.top_k, 4);
        assert_eq!(parsed.openai.embedding_model, "text-embedding-3-small");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[chunking]
chunk_size = 800

[browser]
no_sandbox = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert!(config.browser.no_sandbox);
        assert!(config.browser.headless);
        assert_eq!(config.source.urls_env, "ARTICLE_URLS");
    }

    #[test]
    fn source_resolves_from_lookup() {
        let vars = env(&[
            ("SESSION_COOKIES", "a=1; b=2"),
            ("TARGET_DOMAIN", " x.com "),
            ("ARTICLE_URLS", "https://x.com/a, https://x.com/b,,"),
        ]);
        let source = SourceSettings::default().resolve_with(|k| vars.get(k).cloned());
        assert_eq!(source.cookie_string.as_deref(), Some("a=1; b=2"));
        assert_eq!(source.domain.as_deref(), Some("x.com"));
        assert_eq!(source.urls.len(), 2);
        assert_eq!(source.urls[1].as_str(), "https://x.com/b");
    }

    #[test]
    fn blank_source_values_are_absent() {
        let vars = env(&[("SESSION_COOKIES", "   ")]);
        let source = SourceSettings::default().resolve_with(|k| vars.get(k).cloned());
        assert!(source.cookie_string.is_none());
        assert!(source.domain.is_none());
        assert!(source.urls.is_empty());
    }

    #[test]
    fn url_list_skips_garbage() {
        let urls = parse_url_list("https://x.com/a, not a url ,https://x.com/c");
        let urls: Vec<_> = urls.iter().map(Url::as_str).collect();
        assert_eq!(urls, vec!["https://x.com/a", "https://x.com/c"]);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openai.api_key_env = "RFPCHECK_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
