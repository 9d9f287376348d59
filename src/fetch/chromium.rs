//! Chromium-backed browser engine
//!
//! Drives a headless Chromium over CDP. Each fetch launches a fresh browser
//! process and closes it before returning, so one hung page can never poison
//! the next; the launch cost is accepted for isolation.
//!
//! The stealth variant is the same driver pointed at a hardened Chromium
//! build via `LEAFCUTTER_STEALTH_BROWSER_PATH`; the standard variant honors
//! `CHROMIUM_PATH` and otherwise auto-detects an installed browser.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::error::CdpError;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use super::browser::{
    BrowserEngine, BrowserPage, BrowserRequest, ClickAttempt, CLICK_TIMEOUT,
    SELECTOR_WAIT_TIMEOUT,
};
use crate::BrowserError;

/// Polling step for selector waits
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long to keep draining buffered response events after capture
const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Extra headroom on the CDP request timeout over the navigation budget
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Ceiling on waiting for the browser process to exit during teardown
const BROWSER_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Production [`BrowserEngine`] on top of chromiumoxide
#[derive(Debug, Default)]
pub struct ChromiumEngine;

impl ChromiumEngine {
    pub fn new() -> Self {
        Self
    }

    async fn launch(
        &self,
        request: &BrowserRequest,
    ) -> Result<(Browser, JoinHandle<()>), BrowserError> {
        let user_data_dir =
            env::temp_dir().join(format!("leafcutter_chrome_{}", std::process::id()));
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|error| BrowserError::Launch(error.to_string()))?;

        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(request.navigation_timeout + REQUEST_TIMEOUT_MARGIN)
            .window_size(1920, 1080)
            .user_data_dir(user_data_dir);

        if let Some(executable) = executable_path(request.stealth) {
            builder = builder.chrome_executable(executable);
        }
        if let Some(proxy) = &request.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.server));
            if proxy.username.is_some() || proxy.password.is_some() {
                warn!("proxy credentials cannot be forwarded to the browser session");
            }
        }

        let config = builder.build().map_err(BrowserError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|error| BrowserError::Launch(error.to_string()))?;

        // The handler must be polled for the whole session or CDP stalls.
        let handler_task = tokio::task::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(error) = result {
                    debug!(%error, "browser handler reported an error");
                }
            }
        });

        Ok((browser, handler_task))
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn fetch(&self, request: &BrowserRequest) -> Result<BrowserPage, BrowserError> {
        let (mut browser, handler_task) = self.launch(request).await?;
        let result = drive_page(&browser, request).await;

        if let Err(error) = browser.close().await {
            debug!(%error, "browser close failed");
        }
        match timeout(BROWSER_EXIT_TIMEOUT, browser.wait()).await {
            Ok(Err(error)) => debug!(%error, "browser wait failed"),
            Err(_) => debug!("browser did not exit before the teardown deadline"),
            Ok(Ok(_)) => {}
        }
        handler_task.abort();

        result
    }
}

async fn drive_page(
    browser: &Browser,
    request: &BrowserRequest,
) -> Result<BrowserPage, BrowserError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|error| BrowserError::Session(error.to_string()))?;
    page.set_user_agent(request.user_agent.as_str())
        .await
        .map_err(|error| BrowserError::Session(error.to_string()))?;

    // Best-effort status capture; navigation still works without it.
    let mut responses = page.event_listener::<EventResponseReceived>().await.ok();

    let navigation = timeout(request.navigation_timeout, async {
        page.goto(request.url.as_str()).await?;
        page.wait_for_navigation().await?;
        Ok::<(), CdpError>(())
    })
    .await;
    match navigation {
        Err(_) => {
            return Err(BrowserError::NavigationTimeout(
                request.navigation_timeout.as_millis() as u64,
            ))
        }
        Ok(Err(error)) => {
            return Err(classify_navigation_error(
                error.to_string(),
                request.navigation_timeout,
            ))
        }
        Ok(Ok(())) => {}
    }

    if !request.dynamic_content_wait.is_zero() {
        tokio::time::sleep(request.dynamic_content_wait).await;
    }

    if let Some(selector) = &request.wait_for_selector {
        wait_for_selector(&page, selector, SELECTOR_WAIT_TIMEOUT).await?;
    }

    let mut clicks = Vec::with_capacity(request.click_selectors.len());
    for selector in &request.click_selectors {
        clicks.push(click_first(&page, selector).await);
    }

    let html = page
        .content()
        .await
        .map_err(|error| BrowserError::Session(error.to_string()))?;
    let final_url = page.url().await.ok().flatten();
    let status = observed_status(responses.as_mut()).await;

    Ok(BrowserPage {
        status,
        final_url,
        html,
        clicks,
    })
}

/// Maps CDP navigation failure text onto the error variants the fallback
/// logic distinguishes; anything unrecognized is a session error
fn classify_navigation_error(text: String, navigation_timeout: Duration) -> BrowserError {
    let lowered = text.to_lowercase();
    if lowered.contains("err_proxy_connection_failed") {
        BrowserError::ProxyConnection(text)
    } else if lowered.contains("err_tunnel_connection_failed") {
        BrowserError::TunnelConnection(text)
    } else if lowered.contains("err_connection_reset") {
        BrowserError::ConnectionReset(text)
    } else if lowered.contains("err_connection_timed_out") {
        BrowserError::ConnectionTimedOut(text)
    } else if lowered.contains("timeout") || lowered.contains("timed out") {
        BrowserError::NavigationTimeout(navigation_timeout.as_millis() as u64)
    } else {
        BrowserError::Session(text)
    }
}

/// Polls for a selector until it appears or the budget runs out
async fn wait_for_selector(
    page: &Page,
    selector: &str,
    wait_timeout: Duration,
) -> Result<(), BrowserError> {
    let start = Instant::now();
    loop {
        if page.find_element(selector).await.is_ok() {
            return Ok(());
        }
        if start.elapsed() >= wait_timeout {
            return Err(BrowserError::SelectorTimeout {
                selector: selector.to_string(),
                timeout_ms: wait_timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

/// Clicks the first match of a selector, never failing the fetch
async fn click_first(page: &Page, selector: &str) -> ClickAttempt {
    let attempt = timeout(CLICK_TIMEOUT, async {
        let element = page.find_element(selector).await?;
        element.click().await?;
        Ok::<(), CdpError>(())
    })
    .await;

    let error = match attempt {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error.to_string()),
        Err(_) => Some(format!(
            "click timeout after {} ms",
            CLICK_TIMEOUT.as_millis()
        )),
    };
    ClickAttempt {
        selector: selector.to_string(),
        error,
    }
}

/// Drains buffered response events and returns the status of the last
/// document response, which is the final hop of any redirect chain
async fn observed_status(
    responses: Option<&mut EventStream<EventResponseReceived>>,
) -> Option<u16> {
    let events = responses?;
    let mut status = None;
    while let Ok(Some(event)) = timeout(EVENT_DRAIN_TIMEOUT, events.next()).await {
        if matches!(event.r#type, ResourceType::Document) {
            status = u16::try_from(event.response.status).ok();
        }
    }
    status
}

fn executable_path(stealth: bool) -> Option<String> {
    let variable = if stealth {
        "LEAFCUTTER_STEALTH_BROWSER_PATH"
    } else {
        "CHROMIUM_PATH"
    };
    env::var(variable)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
