//! Headless browser driver.
//!
//! The page acquirer only talks to [`BrowserLauncher`] and [`BrowserSession`];
//! [`ChromiumLauncher`] is the production implementation over `chromiumoxide`.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams};
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, NavigateParams};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use rfpcheck_shared::{BrowserConfig, Result, RfpCheckError, SessionCredential};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a browser with a single browsing context.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// One browser instance with one browsing context, reused across pages.
#[async_trait]
pub trait BrowserSession: Send {
    /// Install cookies into the context before any navigation.
    async fn attach_credentials(&mut self, credentials: &[SessionCredential]) -> Result<()>;

    /// Navigate to `url`, wait for `DOMContentLoaded`, and return its HTML.
    async fn fetch_html(&mut self, url: &Url) -> Result<String>;

    /// Shut the browser down. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Chromium
// ---------------------------------------------------------------------------

/// Launches headless Chromium through the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn chrome_config(&self) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .request_timeout(Duration::from_secs(self.config.navigation_timeout_secs.max(1)));

        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| RfpCheckError::Browser(format!("invalid browser config: {e}")))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let config = self.chrome_config()?;
        info!(headless = self.config.headless, "launching chromium");

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RfpCheckError::Browser(format!("failed to launch chromium: {e}")))?;

        // The handler drives the CDP connection and must be polled for the
        // browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "chromium handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!(error = %close_err, "closing chromium after failed tab open failed");
                }
                if let Err(wait_err) = browser.wait().await {
                    warn!(error = %wait_err, "waiting for chromium to exit failed");
                }
                handler_task.abort();
                return Err(RfpCheckError::Browser(format!("failed to open tab: {e}")));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task: Some(handler_task),
        }))
    }
}

/// A running Chromium with one tab.
struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn attach_credentials(&mut self, credentials: &[SessionCredential]) -> Result<()> {
        let cookies = credentials
            .iter()
            .map(|c| {
                CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .domain(c.domain.clone())
                    .path(c.path.clone())
                    .build()
                    .map_err(|e| {
                        RfpCheckError::Authentication(format!("invalid cookie '{}': {e}", c.name))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.page
            .execute(SetCookiesParams::new(cookies))
            .await
            .map_err(|e| RfpCheckError::Authentication(format!("failed to set cookies: {e}")))?;

        Ok(())
    }

    async fn fetch_html(&mut self, url: &Url) -> Result<String> {
        let nav_err = |message: String| RfpCheckError::navigation(url.as_str(), message);

        // Subscribe first so the event cannot fire before we listen.
        let mut dom_ready = self
            .page
            .event_listener::<EventDomContentEventFired>()
            .await
            .map_err(|e| nav_err(format!("subscribe to DOMContentLoaded: {e}")))?;

        let navigated = self
            .page
            .execute(NavigateParams::new(url.as_str()))
            .await
            .map_err(|e| nav_err(e.to_string()))?;
        if let Some(error) = navigated.result.error_text.as_deref() {
            return Err(nav_err(error.to_string()));
        }

        // Same-document navigations have no loader and fire no DOM event.
        if navigated.result.loader_id.is_some() && dom_ready.next().await.is_none() {
            return Err(nav_err("page closed before DOMContentLoaded".to_string()));
        }
        debug!(%url, "DOMContentLoaded");

        self.page
            .content()
            .await
            .map_err(|e| RfpCheckError::navigation(url.as_str(), format!("read content: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        let Some(handler_task) = self.handler_task.take() else {
            return Ok(());
        };

        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "waiting for chromium to exit failed");
        }
        if let Err(e) = handler_task.await {
            debug!(error = %e, "chromium handler task ended abnormally");
        }

        closed
            .map(|_| ())
            .map_err(|e| RfpCheckError::Browser(format!("failed to close chromium: {e}")))
    }
}
