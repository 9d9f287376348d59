//! Per-run robots gate
//!
//! Fetches `{origin}/robots.txt` at most once per origin over the run's
//! HTTP client (so proxy rules apply) and evaluates URLs against the cached
//! result with the worker user agent. Any fetch problem, including non-2xx
//! statuses, caches an allow-all entry for that origin.

use std::collections::HashMap;

use reqwest::Client;
use tracing::debug;
use url::{Origin, Url};

use super::ParsedRobots;
use crate::fetch::USER_AGENT;

/// Robots.txt gate with a per-origin cache
pub struct RobotsGate {
    enabled: bool,
    client: Client,
    cache: HashMap<String, ParsedRobots>,
}

impl RobotsGate {
    /// Creates the gate for a run
    ///
    /// # Arguments
    ///
    /// * `enabled` - When false, every URL is allowed without any fetch
    /// * `client` - HTTP client shared with the fetch path
    pub fn new(enabled: bool, client: Client) -> Self {
        Self {
            enabled,
            client,
            cache: HashMap::new(),
        }
    }

    /// Checks whether a URL may be fetched
    pub async fn is_allowed(&mut self, url: &Url) -> bool {
        if !self.enabled {
            return true;
        }
        let origin = match url.origin() {
            origin @ Origin::Tuple(..) => origin.ascii_serialization(),
            Origin::Opaque(_) => return true,
        };
        if !self.cache.contains_key(&origin) {
            let robots = self.load_origin(&origin).await;
            self.cache.insert(origin.clone(), robots);
        }
        match self.cache.get(&origin) {
            Some(robots) => robots.is_allowed(url.as_str(), USER_AGENT),
            None => true,
        }
    }

    async fn load_origin(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{origin}/robots.txt");
        let response = match self.client.get(&robots_url).send().await {
            Ok(response) => response,
            Err(error) => {
                debug!(%robots_url, %error, "robots.txt fetch failed, allowing origin");
                return ParsedRobots::allow_all();
            }
        };
        if !response.status().is_success() {
            debug!(%robots_url, status = response.status().as_u16(), "no robots.txt, allowing origin");
            return ParsedRobots::allow_all();
        }
        match response.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(error) => {
                debug!(%robots_url, %error, "robots.txt body read failed, allowing origin");
                ParsedRobots::allow_all()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        Client::new()
    }

    #[tokio::test]
    async fn test_disabled_gate_allows_without_fetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
            .expect(0)
            .mount(&server)
            .await;

        let mut gate = RobotsGate::new(false, client());
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(gate.is_allowed(&url).await);
    }

    #[tokio::test]
    async fn test_disallowed_path_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
            )
            .mount(&server)
            .await;

        let mut gate = RobotsGate::new(true, client());
        let open = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let private = Url::parse(&format!("{}/private/doc", server.uri())).unwrap();
        assert!(gate.is_allowed(&open).await);
        assert!(!gate.is_allowed(&private).await);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_everything() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut gate = RobotsGate::new(true, client());
        let url = Url::parse(&format!("{}/anything", server.uri())).unwrap();
        assert!(gate.is_allowed(&url).await);
    }

    #[tokio::test]
    async fn test_unreachable_origin_allows_everything() {
        let mut gate = RobotsGate::new(true, client());
        let url = Url::parse("http://127.0.0.1:1/page").unwrap();
        assert!(gate.is_allowed(&url).await);
    }

    #[tokio::test]
    async fn test_robots_fetched_once_per_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut gate = RobotsGate::new(true, client());
        let first = Url::parse(&format!("{}/a", server.uri())).unwrap();
        let second = Url::parse(&format!("{}/b", server.uri())).unwrap();
        let blocked = Url::parse(&format!("{}/admin", server.uri())).unwrap();
        assert!(gate.is_allowed(&first).await);
        assert!(gate.is_allowed(&second).await);
        assert!(!gate.is_allowed(&blocked).await);
    }
}
