//! Leafcutter: a queue-driven website content crawler worker
//!
//! This crate implements the worker half of a distributed crawler: it leases
//! URLs from an orchestrator queue, fetches each page through a policy-selected
//! engine (stealth browser, standard browser, or plain HTTP), extracts cleaned
//! content and media links, discovers in-scope follow-on links, and reports
//! every outcome back to the queue under run-wide budgets.

pub mod config;
pub mod discover;
pub mod engine;
pub mod extract;
pub mod failure;
pub mod fetch;
pub mod link;
pub mod policy;
pub mod proxy;
pub mod queue;
pub mod robots;
pub mod scope;
pub mod worker;

use thiserror::Error;

/// Main error type for worker operations
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),
}

/// Configuration and run-input errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} is required")]
    MissingEnv(&'static str),
}

/// Errors from the orchestrator queue API
#[derive(Debug, Error)]
pub enum QueueError {
    /// The HTTP client could not be constructed
    #[error("failed to build internal API client: {0}")]
    Client(#[source] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Internal API {path} failed: {status} {body}")]
    Api {
        path: String,
        status: u16,
        body: String,
    },

    /// The request never completed (DNS, connect, timeout, ...)
    #[error("Internal API {path} network error: {source}")]
    Transport {
        path: String,
        source: reqwest::Error,
    },

    /// The response body was not the expected JSON shape
    #[error("Internal API {path} returned invalid JSON: {source}")]
    Decode {
        path: String,
        source: reqwest::Error,
    },
}

/// Errors from the fetch layer (either engine path)
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP client construction failed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport failure from the lightweight HTTP engine
    #[error("fetch failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// A browser engine was selected but none is wired into the fetcher
    #[error("browser engine unavailable for {url}")]
    EngineUnavailable { url: String },

    /// The response carried a blocked-class status (401/403/429)
    #[error("Blocked with status {status}")]
    BlockedStatus { status: u16 },
}

/// Errors raised while driving the browser collaborator
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("navigation timeout after {0} ms")]
    NavigationTimeout(u64),

    #[error("selector wait timeout after {timeout_ms} ms for {selector}")]
    SelectorTimeout { selector: String, timeout_ms: u64 },

    #[error("proxy connection failed: {0}")]
    ProxyConnection(String),

    #[error("tunnel connection failed: {0}")]
    TunnelConnection(String),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("connection timed out: {0}")]
    ConnectionTimedOut(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser session failed: {0}")]
    Session(String),
}

impl BrowserError {
    /// Whether the lightweight HTTP engine should be tried once after this
    /// failure. Navigation/selector timeouts and proxy-path connection
    /// failures are recoverable by a plain GET; anything else propagates.
    pub fn triggers_http_fallback(&self) -> bool {
        matches!(
            self,
            BrowserError::NavigationTimeout(_)
                | BrowserError::SelectorTimeout { .. }
                | BrowserError::ProxyConnection(_)
                | BrowserError::TunnelConnection(_)
                | BrowserError::ConnectionReset(_)
                | BrowserError::ConnectionTimedOut(_)
        )
    }
}

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{EngineKind, HtmlTransformer, RunConfig, ScopeMode};
pub use engine::{resolve_engine, EngineResolution};
pub use failure::{classify_failure, FailureClass, FailureKind};
pub use policy::{evaluate_stop, BudgetSnapshot, StopReason};
pub use scope::ScopeMatcher;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_error_fallback_eligibility() {
        assert!(BrowserError::NavigationTimeout(45000).triggers_http_fallback());
        assert!(BrowserError::SelectorTimeout {
            selector: "#app".to_string(),
            timeout_ms: 15000,
        }
        .triggers_http_fallback());
        assert!(
            BrowserError::ProxyConnection("net::ERR_PROXY_CONNECTION_FAILED".to_string())
                .triggers_http_fallback()
        );
        assert!(!BrowserError::Launch("no executable".to_string()).triggers_http_fallback());
        assert!(!BrowserError::Session("page crashed".to_string()).triggers_http_fallback());
    }

    #[test]
    fn test_error_messages_carry_classification_keywords() {
        // The classifier matches on substrings of these messages, so the
        // wording is part of the contract.
        let timeout = BrowserError::NavigationTimeout(90000);
        assert!(timeout.to_string().contains("timeout"));

        let blocked = FetchError::BlockedStatus { status: 403 };
        assert_eq!(blocked.to_string(), "Blocked with status 403");
    }
}
