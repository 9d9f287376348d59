//! Page fetching
//!
//! Two fetch paths share one result shape:
//!
//! - [`http::HttpEngine`] issues a plain GET through a client that honors
//!   the proxy scope
//! - a [`browser::BrowserEngine`] drives a full browser session per fetch
//!   (navigate, optional dynamic-content wait, optional selector wait,
//!   best-effort clicks)
//!
//! [`PageFetcher`] dispatches on the resolved engine and applies the single
//! browser-to-HTTP fallback: when a browser attempt dies on a navigation
//! timeout or a proxy/tunnel/connection error, the same URL is refetched
//! over plain HTTP once and the original error text is kept as the fallback
//! reason. Any other browser error propagates to the caller.

pub mod browser;
pub mod chromium;
pub mod http;

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::config::{EngineKind, RunConfig};
use crate::proxy::ProxySettings;
use crate::FetchError;

pub use browser::{BrowserEngine, BrowserPage, BrowserRequest, ClickAttempt};
pub use chromium::ChromiumEngine;
pub use http::HttpEngine;

/// User agent sent on every outbound request, browser or plain HTTP
pub const USER_AGENT: &str = "LeafcutterCrawler/1.0 (+https://leafcutter.local)";

/// Accept header for the plain HTTP path
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

/// Navigation timeout without a browser proxy
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(45);

/// Navigation timeout when the session goes through a proxy
pub const NAVIGATION_TIMEOUT_PROXIED: Duration = Duration::from_secs(90);

/// One fetched page, from either path
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Observed HTTP status; browser fetches default to 200 when the driver
    /// cannot see the main response
    pub status: u16,
    /// URL after redirects
    pub final_url: String,
    pub html: String,
    /// Engine that actually produced this page
    pub engine: EngineKind,
    /// Original browser error text when the HTTP fallback produced the page
    pub fallback_reason: Option<String>,
}

/// Engine dispatch plus the browser-to-HTTP fallback
pub struct PageFetcher {
    http: HttpEngine,
    browser: Option<Box<dyn BrowserEngine>>,
    proxy: ProxySettings,
}

impl PageFetcher {
    /// Builds the fetcher for a run
    ///
    /// # Arguments
    ///
    /// * `proxy` - Resolved proxy settings, consulted for both paths
    /// * `browser` - Browser engine, `None` for HTTP-only deployments
    pub fn new(
        proxy: ProxySettings,
        browser: Option<Box<dyn BrowserEngine>>,
    ) -> Result<Self, FetchError> {
        let http = HttpEngine::new(&proxy)?;
        Ok(Self {
            http,
            browser,
            proxy,
        })
    }

    /// The underlying HTTP client, shared with the robots gate
    pub fn http_client(&self) -> &reqwest::Client {
        self.http.client()
    }

    /// Fetches one page with the resolved engine
    ///
    /// # Arguments
    ///
    /// * `url` - Page to fetch
    /// * `engine` - Resolved engine for the run
    /// * `config` - Run configuration (wait and click settings)
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - Page content; `engine` names the path that
    ///   actually produced it
    /// * `Err(FetchError)` - Unrecoverable fetch failure
    pub async fn fetch(
        &self,
        url: &Url,
        engine: EngineKind,
        config: &RunConfig,
    ) -> Result<FetchedPage, FetchError> {
        if engine == EngineKind::HttpFast {
            return self.http.fetch(url).await;
        }

        let driver = self
            .browser
            .as_deref()
            .ok_or_else(|| FetchError::EngineUnavailable {
                url: url.to_string(),
            })?;
        let request = self.browser_request(url, engine, config);

        match driver.fetch(&request).await {
            Ok(page) => {
                for click in &page.clicks {
                    match &click.error {
                        None => debug!(selector = %click.selector, "click selector applied"),
                        Some(error) => {
                            debug!(selector = %click.selector, %error, "click selector skipped")
                        }
                    }
                }
                Ok(FetchedPage {
                    status: page.status.unwrap_or(200),
                    final_url: page.final_url.unwrap_or_else(|| url.to_string()),
                    html: page.html,
                    engine,
                    fallback_reason: None,
                })
            }
            Err(error) if error.triggers_http_fallback() => {
                let reason = error.to_string();
                warn!(%url, %reason, "browser fetch failed, falling back to plain HTTP");
                let mut page = self.http.fetch(url).await?;
                page.fallback_reason = Some(reason);
                Ok(page)
            }
            Err(error) => Err(FetchError::Browser(error)),
        }
    }

    fn browser_request(&self, url: &Url, engine: EngineKind, config: &RunConfig) -> BrowserRequest {
        let proxy = self.proxy.browser_proxy();
        let navigation_timeout = if proxy.is_some() {
            NAVIGATION_TIMEOUT_PROXIED
        } else {
            NAVIGATION_TIMEOUT
        };
        BrowserRequest {
            url: url.clone(),
            user_agent: USER_AGENT.to_string(),
            stealth: engine == EngineKind::Camoufox,
            navigation_timeout,
            dynamic_content_wait: Duration::from_secs_f64(config.wait_for_dynamic_content_seconds),
            wait_for_selector: if config.wait_for_selector.is_empty() {
                None
            } else {
                Some(config.wait_for_selector.clone())
            },
            click_selectors: config.click_selectors.clone(),
            proxy,
        }
    }
}
