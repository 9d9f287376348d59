//! Browser engine contract
//!
//! A [`BrowserEngine`] turns one [`BrowserRequest`] into one [`BrowserPage`],
//! launching and tearing down whatever session it needs per call. The
//! production implementation lives in [`super::chromium`]; tests substitute
//! scripted engines through the same trait.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::proxy::BrowserProxy;
use crate::BrowserError;

/// How long a selector wait may block before it fails the fetch
pub const SELECTOR_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-selector click budget
pub const CLICK_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything one browser-driven fetch needs
#[derive(Debug, Clone)]
pub struct BrowserRequest {
    pub url: Url,
    pub user_agent: String,
    /// Use the stealth browser build instead of the standard one
    pub stealth: bool,
    pub navigation_timeout: Duration,
    /// Extra settle time after navigation, zero to skip
    pub dynamic_content_wait: Duration,
    /// Selector that must appear before capture, `None` to skip
    pub wait_for_selector: Option<String>,
    /// Selectors to click once each, in order, best-effort
    pub click_selectors: Vec<String>,
    pub proxy: Option<BrowserProxy>,
}

/// Result of one click selector attempt
#[derive(Debug, Clone)]
pub struct ClickAttempt {
    pub selector: String,
    /// `None` when the click landed
    pub error: Option<String>,
}

impl ClickAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Captured page state after a browser-driven fetch
#[derive(Debug, Clone)]
pub struct BrowserPage {
    /// Main document status when the driver observed it
    pub status: Option<u16>,
    /// Address bar URL after navigation and clicks
    pub final_url: Option<String>,
    pub html: String,
    pub clicks: Vec<ClickAttempt>,
}

/// One full browser fetch: launch, navigate, wait, click, capture, close
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn fetch(&self, request: &BrowserRequest) -> Result<BrowserPage, BrowserError>;
}
