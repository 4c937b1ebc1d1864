//! Sequential, session-preserving page acquirer.
//!
//! One browser and one browsing context serve the whole batch so the replayed
//! session cookies apply to every page. URLs are visited strictly in order;
//! a failing URL is recorded and skipped, never retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use scraper::Html;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use rfpcheck_shared::{Result, RfpCheckError, SessionCredential, SourceDocument};

use crate::browser::{BrowserLauncher, BrowserSession};
use crate::extract::ContentExtractor;

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// A URL that produced no document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationFailure {
    pub url: Url,
    pub message: String,
}

/// Outcome of acquiring a batch of URLs.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// One document per successfully navigated URL, in input order.
    pub documents: Vec<SourceDocument>,
    /// URLs that were skipped, in input order.
    pub failures: Vec<NavigationFailure>,
    /// Documents whose body is an extraction placeholder.
    pub extraction_failures: usize,
    /// Wall time of the batch.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// PageAcquirer
// ---------------------------------------------------------------------------

/// Drives a browser over a list of article URLs.
pub struct PageAcquirer {
    launcher: Arc<dyn BrowserLauncher>,
    extractor: ContentExtractor,
    navigation_timeout: Duration,
}

impl PageAcquirer {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        extractor: ContentExtractor,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            extractor,
            navigation_timeout,
        }
    }

    /// Visit every URL with the given credentials and extract its content.
    ///
    /// `on_page(url, current, total)` is called before each navigation.
    /// Fails only when the browser cannot start or the credentials cannot be
    /// attached; the browser is closed on every path after launch.
    #[instrument(skip_all, fields(urls = urls.len(), credentials = credentials.len()))]
    pub async fn acquire(
        &self,
        urls: &[Url],
        credentials: &[SessionCredential],
        on_page: &(dyn Fn(&Url, usize, usize) + Sync),
    ) -> Result<Acquisition> {
        let start = Instant::now();
        let mut session = self.launcher.launch().await?;

        let outcome = self.visit_all(session.as_mut(), urls, credentials, on_page).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        debug!("browser closed");

        let (documents, failures) = outcome?;
        let extraction_failures = documents
            .iter()
            .filter(|(_, extraction_ok)| !extraction_ok)
            .count();
        let documents: Vec<SourceDocument> = documents.into_iter().map(|(d, _)| d).collect();

        let acquisition = Acquisition {
            documents,
            failures,
            extraction_failures,
            duration: start.elapsed(),
        };

        info!(
            documents = acquisition.documents.len(),
            failed = acquisition.failures.len(),
            extraction_failures = acquisition.extraction_failures,
            duration_ms = acquisition.duration.as_millis(),
            "acquisition completed"
        );

        Ok(acquisition)
    }

    async fn visit_all(
        &self,
        session: &mut dyn BrowserSession,
        urls: &[Url],
        credentials: &[SessionCredential],
        on_page: &(dyn Fn(&Url, usize, usize) + Sync),
    ) -> Result<(Vec<(SourceDocument, bool)>, Vec<NavigationFailure>)> {
        if let Err(e) = session.attach_credentials(credentials).await {
            error!(error = %e, "failed to load session cookies, aborting acquisition");
            return Err(match e {
                RfpCheckError::Authentication(_) => e,
                other => RfpCheckError::Authentication(other.to_string()),
            });
        }
        info!(count = credentials.len(), "session cookies loaded");

        let total = urls.len();
        let mut documents = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (i, url) in urls.iter().enumerate() {
            on_page(url, i + 1, total);

            let outcome: Result<(SourceDocument, bool)> = self.visit(session, url).await;
            match outcome {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(%url, error = %e, "failed to process URL, skipping");
                    failures.push(NavigationFailure {
                        url: url.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok((documents, failures))
    }

    /// Navigate to one URL and build its document.
    async fn visit(
        &self,
        session: &mut dyn BrowserSession,
        url: &Url,
    ) -> Result<(SourceDocument, bool)> {
        debug!(%url, "navigating");

        let html = tokio::time::timeout(self.navigation_timeout, session.fetch_html(url))
            .await
            .map_err(|_| {
                RfpCheckError::navigation(
                    url.as_str(),
                    format!("timed out after {}s", self.navigation_timeout.as_secs()),
                )
            })??;

        let article = self.extractor.extract(&Html::parse_document(&html));
        if let Err(failure) = &article.body {
            if failure.skips_page() {
                return Err(RfpCheckError::navigation(url.as_str(), failure.to_string()));
            }
        }
        let extraction_ok = article.body.is_ok();

        match &article.body {
            Ok(body) => debug!(
                %url,
                title = article.title_or_placeholder(),
                preview = %preview(body),
                "extracted article"
            ),
            Err(failure) => warn!(%url, %failure, "could not extract content"),
        }

        let doc = SourceDocument::new(
            url.clone(),
            article.title.clone(),
            article.to_document_content(),
        );
        Ok((doc, extraction_ok))
    }
}

/// First 150 characters, for logs.
fn preview(text: &str) -> String {
    text.chars().take(150).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rfpcheck_shared::ExtractionConfig;

    use super::*;

    const ARTICLE: &str = r#"<html><body><h1>Encryption</h1>
        <script id="__NEXT_DATA__">{"props":{"pageProps":{"articleContent":{"blocks":[
        {"text":"Data is encrypted at rest."}]}}}}</script></body></html>"#;

    /// Serves canned HTML per URL and records what happened.
    #[derive(Default)]
    struct FakeBrowser {
        pages: HashMap<String, String>,
        failing: Vec<String>,
        hanging: Vec<String>,
        reject_cookies: bool,
        fail_launch: bool,
        launches: AtomicUsize,
        closes: Arc<AtomicUsize>,
        visited: Arc<Mutex<Vec<String>>>,
        cookies: Arc<Mutex<Vec<SessionCredential>>>,
    }

    struct FakeSession {
        pages: HashMap<String, String>,
        failing: Vec<String>,
        hanging: Vec<String>,
        reject_cookies: bool,
        closes: Arc<AtomicUsize>,
        visited: Arc<Mutex<Vec<String>>>,
        cookies: Arc<Mutex<Vec<SessionCredential>>>,
    }

    #[async_trait]
    impl BrowserLauncher for FakeBrowser {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
            if self.fail_launch {
                return Err(RfpCheckError::Browser("no chromium".into()));
            }
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                pages: self.pages.clone(),
                failing: self.failing.clone(),
                hanging: self.hanging.clone(),
                reject_cookies: self.reject_cookies,
                closes: self.closes.clone(),
                visited: self.visited.clone(),
                cookies: self.cookies.clone(),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn attach_credentials(&mut self, credentials: &[SessionCredential]) -> Result<()> {
            if self.reject_cookies {
                return Err(RfpCheckError::Authentication("cookie rejected".into()));
            }
            self.cookies.lock().unwrap().extend_from_slice(credentials);
            Ok(())
        }

        async fn fetch_html(&mut self, url: &Url) -> Result<String> {
            self.visited.lock().unwrap().push(url.to_string());
            if self.failing.contains(&url.to_string()) {
                return Err(RfpCheckError::navigation(url.as_str(), "net::ERR_FAILED"));
            }
            if self.hanging.contains(&url.to_string()) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(self.pages.get(url.as_str()).cloned().unwrap_or_default())
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn urls(list: &[&str]) -> Vec<Url> {
        list.iter().map(|u| Url::parse(u).unwrap()).collect()
    }

    fn acquirer(browser: Arc<FakeBrowser>) -> PageAcquirer {
        let extractor = ContentExtractor::new(&ExtractionConfig::default()).unwrap();
        PageAcquirer::new(browser, extractor, Duration::from_secs(5))
    }

    fn creds() -> Vec<SessionCredential> {
        vec![SessionCredential::new("sid", "42", "x.com")]
    }

    fn no_progress(_: &Url, _: usize, _: usize) {}

    #[tokio::test]
    async fn failing_url_is_skipped_in_order() {
        let list = urls(&["https://x.com/1", "https://x.com/2", "https://x.com/3"]);
        let browser = Arc::new(FakeBrowser {
            pages: list
                .iter()
                .map(|u| (u.to_string(), ARTICLE.to_string()))
                .collect(),
            failing: vec!["https://x.com/2".into()],
            ..Default::default()
        });

        let result = acquirer(browser.clone())
            .acquire(&list, &creds(), &no_progress)
            .await
            .unwrap();

        let sources: Vec<_> = result
            .documents
            .iter()
            .map(|d| d.metadata.source.as_str())
            .collect();
        assert_eq!(sources, vec!["https://x.com/1", "https://x.com/3"]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].url.as_str(), "https://x.com/2");
        assert_eq!(browser.launches.load(Ordering::SeqCst), 1);
        assert_eq!(browser.closes.load(Ordering::SeqCst), 1);
        assert_eq!(browser.visited.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cookies_attached_once_before_navigation() {
        let list = urls(&["https://x.com/1", "https://x.com/2"]);
        let browser = Arc::new(FakeBrowser::default());

        acquirer(browser.clone())
            .acquire(&list, &creds(), &no_progress)
            .await
            .unwrap();

        let cookies = browser.cookies.lock().unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "sid");
    }

    #[tokio::test]
    async fn rejected_cookies_abort_and_close() {
        let list = urls(&["https://x.com/1"]);
        let browser = Arc::new(FakeBrowser {
            reject_cookies: true,
            ..Default::default()
        });

        let err = acquirer(browser.clone())
            .acquire(&list, &creds(), &no_progress)
            .await
            .unwrap_err();

        assert!(matches!(err, RfpCheckError::Authentication(_)));
        assert!(browser.visited.lock().unwrap().is_empty());
        assert_eq!(browser.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn launch_failure_is_fatal() {
        let browser = Arc::new(FakeBrowser {
            fail_launch: true,
            ..Default::default()
        });
        let err = acquirer(browser.clone())
            .acquire(&urls(&["https://x.com/1"]), &creds(), &no_progress)
            .await
            .unwrap_err();
        assert!(matches!(err, RfpCheckError::Browser(_)));
        assert_eq!(browser.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn extraction_failure_keeps_document() {
        let list = urls(&["https://x.com/empty"]);
        let browser = Arc::new(FakeBrowser {
            pages: HashMap::from([(
                "https://x.com/empty".to_string(),
                "<html><body><h1>Bare</h1></body></html>".to_string(),
            )]),
            ..Default::default()
        });

        let result = acquirer(browser)
            .acquire(&list, &creds(), &no_progress)
            .await
            .unwrap();

        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.extraction_failures, 1);
        assert_eq!(
            result.documents[0].content,
            "TITLE: Bare\n\nCONTENT:\nEmbedded content data not found"
        );
    }

    #[tokio::test]
    async fn invalid_page_data_skips_url() {
        let list = urls(&["https://x.com/1", "https://x.com/broken", "https://x.com/3"]);
        let mut pages: HashMap<String, String> = list
            .iter()
            .map(|u| (u.to_string(), ARTICLE.to_string()))
            .collect();
        pages.insert(
            "https://x.com/broken".to_string(),
            r#"<h1>T</h1><script id="__NEXT_DATA__">{broken</script>"#.to_string(),
        );
        let browser = Arc::new(FakeBrowser {
            pages,
            ..Default::default()
        });

        let result = acquirer(browser)
            .acquire(&list, &creds(), &no_progress)
            .await
            .unwrap();

        let sources: Vec<_> = result
            .documents
            .iter()
            .map(|d| d.metadata.source.as_str())
            .collect();
        assert_eq!(sources, vec!["https://x.com/1", "https://x.com/3"]);
        assert_eq!(result.extraction_failures, 0);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].url.as_str(), "https://x.com/broken");
        assert!(result.failures[0].message.contains("not valid JSON"));
        assert!(
            result
                .documents
                .iter()
                .all(|d| !d.content.contains("Failed to parse"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_navigation_times_out() {
        let list = urls(&["https://x.com/slow", "https://x.com/ok"]);
        let browser = Arc::new(FakeBrowser {
            pages: HashMap::from([("https://x.com/ok".to_string(), ARTICLE.to_string())]),
            hanging: vec!["https://x.com/slow".into()],
            ..Default::default()
        });

        let result = acquirer(browser)
            .acquire(&list, &creds(), &no_progress)
            .await
            .unwrap();

        assert_eq!(result.documents.len(), 1);
        assert!(result.failures[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn progress_reports_each_url() {
        let list = urls(&["https://x.com/1", "https://x.com/2"]);
        let seen = Mutex::new(Vec::new());
        let on_page = |url: &Url, current: usize, total: usize| {
            seen.lock().unwrap().push(format!("{current}/{total} {url}"));
        };

        acquirer(Arc::new(FakeBrowser::default()))
            .acquire(&list, &creds(), &on_page)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["1/2 https://x.com/1", "2/2 https://x.com/2"]
        );
    }

    #[test]
    fn preview_is_char_bounded() {
        let text = "é".repeat(200);
        assert_eq!(preview(&text).chars().count(), 150);
    }
}
