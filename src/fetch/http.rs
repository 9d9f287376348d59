//! Plain HTTP fetch path
//!
//! One `reqwest` client per run, built at startup: routed through the proxy
//! when the proxy scope covers HTTP, direct otherwise. The proxied variant
//! accepts invalid TLS certificates (interception tunnels present their own)
//! and follows a longer redirect chain. Non-success statuses are not errors
//! here; the caller decides what a 404 or a 403 means.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{redirect, Client};
use url::Url;

use super::{FetchedPage, ACCEPT_HTML, USER_AGENT};
use crate::config::EngineKind;
use crate::proxy::ProxySettings;
use crate::FetchError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DIRECT_MAX_REDIRECTS: usize = 10;
const PROXIED_MAX_REDIRECTS: usize = 20;

/// The lightweight `http:fast` engine
pub struct HttpEngine {
    client: Client,
}

impl HttpEngine {
    /// Builds the engine, choosing the proxied or direct client once
    pub fn new(proxy: &ProxySettings) -> Result<Self, FetchError> {
        let client = match proxy.url() {
            Some(proxy_url) if proxy.applies_to_http() => build_proxied_client(proxy_url)?,
            _ => build_direct_client()?,
        };
        Ok(Self { client })
    }

    /// The underlying client, shared with collaborators that need raw requests
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches one page over plain HTTP
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - Body and status, whatever the status was
    /// * `Err(FetchError::Http)` - Transport-level failure
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchedPage {
            status,
            final_url,
            html,
            engine: EngineKind::HttpFast,
            fallback_reason: None,
        })
    }
}

fn build_direct_client() -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(redirect::Policy::limited(DIRECT_MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(FetchError::Client)
}

fn build_proxied_client(proxy_url: &Url) -> Result<Client, FetchError> {
    let proxy = reqwest::Proxy::all(proxy_url.clone()).map_err(FetchError::Client)?;
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(redirect::Policy::limited(PROXIED_MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .proxy(proxy)
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(FetchError::Client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine() -> HttpEngine {
        HttpEngine::new(&ProxySettings::disabled()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_identity_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", USER_AGENT))
            // wiremock splits comma-joined header values at ingestion, so the
            // list form is the only encoding that can match this value.
            .and(headers("accept", ACCEPT_HTML.split(',').collect::<Vec<_>>()))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let fetched = engine().fetch(&url).await.unwrap();
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.engine, EngineKind::HttpFast);
        assert_eq!(fetched.html, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_follows_redirects_and_reports_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/new"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let fetched = engine().fetch(&url).await.unwrap();
        assert_eq!(fetched.status, 200);
        assert!(fetched.final_url.ends_with("/new"));
        assert_eq!(fetched.html, "moved");
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let fetched = engine().fetch(&url).await.unwrap();
        assert_eq!(fetched.status, 404);
        assert_eq!(fetched.html, "gone");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_fetch_error() {
        // Reserved TEST-NET-1 address, nothing listens there.
        let url = Url::parse("http://192.0.2.1:9/").unwrap();
        let engine = HttpEngine::new(&ProxySettings::disabled()).unwrap();
        let error = engine.fetch(&url).await.unwrap_err();
        assert!(matches!(error, FetchError::Http { .. }));
        assert!(error.to_string().contains("fetch failed"));
    }
}
