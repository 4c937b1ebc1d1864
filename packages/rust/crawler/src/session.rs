//! Session credential builder.
//!
//! Turns a raw `Cookie:`-style header value into the per-cookie records the
//! browser needs, so an already-authenticated session can be replayed.

use tracing::debug;

use rfpcheck_shared::{Result, RfpCheckError, SessionCredential};

/// Parse `name=value; name=value` pairs into credentials for `domain`.
///
/// Segments without `=` are skipped. Only the first `=` splits, so values
/// may contain `=`. Missing or blank inputs are a config error.
pub fn build_credentials(
    cookie_string: Option<&str>,
    domain: Option<&str>,
) -> Result<Vec<SessionCredential>> {
    let (cookie_string, domain) = match (cookie_string, domain) {
        (Some(c), Some(d)) if !c.trim().is_empty() && !d.trim().is_empty() => (c, d.trim()),
        _ => {
            return Err(RfpCheckError::config(
                "session cookies or target domain not configured",
            ));
        }
    };

    let mut credentials = Vec::new();
    for pair in cookie_string.split(';') {
        let pair = pair.trim();
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };

        if name.is_empty() || value.is_empty() {
            debug!(name, "skipping cookie with empty name or value");
            continue;
        }

        credentials.push(SessionCredential::new(name, value, domain));
    }

    debug!(count = credentials.len(), domain, "built session credentials");
    Ok(credentials)
}
