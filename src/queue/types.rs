//! Wire types for the internal run API
//!
//! Everything here mirrors the JSON bodies the orchestrator sends and
//! accepts. Unknown or missing optional fields never fail deserialization;
//! the orchestrator side evolves independently of the worker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event types understood by the orchestrator event sink
pub const EVENT_RUNTIME_STARTED: &str = "runtime.started";
pub const EVENT_PROXY_APPLIED: &str = "proxy.client.applied";
pub const EVENT_ENGINE_FALLBACK: &str = "engine.fallback";
pub const EVENT_REQUEST_SUCCEEDED: &str = "request.succeeded";
pub const EVENT_REQUEST_FAILED: &str = "request.failed";
pub const EVENT_RUNTIME_FINISHED: &str = "runtime.finished";
pub const EVENT_RUNTIME_CRASHED: &str = "runtime.crashed";
pub const EVENT_RUNTIME_INPUT_INVALID: &str = "runtime.input_invalid";

/// Stages events are attributed to
pub const STAGE_RUNTIME: &str = "runtime";
pub const STAGE_PROXY: &str = "proxy";
pub const STAGE_REQUEST: &str = "request";

/// Event severity levels
pub const LEVEL_INFO: &str = "info";
pub const LEVEL_WARNING: &str = "warning";
pub const LEVEL_ERROR: &str = "error";

/// One crawl request leased from the queue
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseItem {
    pub request_id: String,
    pub url: String,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub attempt: u32,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub metadata: Value,
}

impl LeaseItem {
    /// Crawl depth carried in the item metadata.
    ///
    /// Zero when the field is absent or not a non-negative integer.
    pub fn depth(&self) -> u32 {
        self.metadata
            .get("depth")
            .and_then(Value::as_u64)
            .map(|depth| depth as u32)
            .unwrap_or(0)
    }
}

/// Run descriptor returned by the bootstrap call
#[derive(Debug, Clone, Deserialize)]
pub struct Bootstrap {
    pub run: RunDescriptor,
    #[serde(default)]
    pub output_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunDescriptor {
    pub id: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub request_policy: Value,
    #[serde(default)]
    pub concurrency: ConcurrencySpec,
    #[serde(default)]
    pub budget_policy: Value,
}

/// Concurrency block of the bootstrap payload.
///
/// The fields stay loosely typed so a misconfigured orchestrator cannot
/// fail the bootstrap decode; [`ConcurrencySpec::bounds`] falls back to
/// sane values instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConcurrencySpec {
    #[serde(default)]
    pub min_concurrency: Value,
    #[serde(default)]
    pub max_concurrency: Value,
    #[serde(default)]
    pub autoscale_mode: Value,
}

impl ConcurrencySpec {
    /// Effective `(min, max)` batch-size bounds.
    ///
    /// `min` is at least 1; `max` is at least `min`. Non-numeric values
    /// fall back to those floors.
    pub fn bounds(&self) -> (u32, u32) {
        let min = numeric(&self.min_concurrency)
            .map(|value| value.max(1.0))
            .unwrap_or(1.0) as u32;
        let max = numeric(&self.max_concurrency)
            .map(|value| value.max(min as f64))
            .unwrap_or(min as f64) as u32;
        (min, max)
    }

    /// Whether the worker may adjust concurrency between leases.
    pub fn adaptive(&self) -> bool {
        self.autoscale_mode
            .as_str()
            .map(str::trim)
            .filter(|mode| !mode.is_empty())
            .unwrap_or("adaptive")
            == "adaptive"
    }
}

fn numeric(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
}

/// A discovered link handed back to the queue
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueItem {
    pub url: String,
    pub discovered_from_request_id: String,
    pub priority: u8,
    pub metadata: Value,
}

/// Successful completion report for a leased item
#[derive(Debug, Clone, Serialize)]
pub struct AckOutcome {
    pub request_id: String,
    pub status_code: u16,
    pub latency_ms: u64,
    pub metadata: Value,
}

/// Failure report for a leased item
#[derive(Debug, Clone, Serialize)]
pub struct FailOutcome {
    pub request_id: String,
    pub error_type: String,
    pub error_reason: String,
    pub retryable: bool,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
}

/// A structured run event for the orchestrator event sink.
///
/// `request_id`, `stage`, and `message` serialize as `null` when unset;
/// the level defaults to `info`.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub event_type: String,
    pub request_id: Option<String>,
    pub stage: Option<String>,
    pub payload: Value,
    pub message: Option<String>,
    pub level: String,
}

impl RunEvent {
    pub fn new(event_type: &str, stage: &str, payload: Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            request_id: None,
            stage: Some(stage.to_string()),
            payload,
            message: None,
            level: LEVEL_INFO.to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn concurrency(min: Value, max: Value, mode: Value) -> ConcurrencySpec {
        ConcurrencySpec {
            min_concurrency: min,
            max_concurrency: max,
            autoscale_mode: mode,
        }
    }

    #[test]
    fn test_depth_from_metadata() {
        let item: LeaseItem = serde_json::from_value(json!({
            "request_id": "req-1",
            "url": "https://example.com/",
            "metadata": {"depth": 3}
        }))
        .unwrap();
        assert_eq!(item.depth(), 3);
    }

    #[test]
    fn test_depth_defaults_to_zero() {
        let missing: LeaseItem = serde_json::from_value(json!({
            "request_id": "req-1",
            "url": "https://example.com/"
        }))
        .unwrap();
        assert_eq!(missing.depth(), 0);

        let non_numeric: LeaseItem = serde_json::from_value(json!({
            "request_id": "req-2",
            "url": "https://example.com/",
            "metadata": {"depth": "deep"}
        }))
        .unwrap();
        assert_eq!(non_numeric.depth(), 0);
    }

    #[test]
    fn test_optional_lease_fields() {
        let item: LeaseItem = serde_json::from_value(json!({
            "request_id": "req-1",
            "url": "https://example.com/",
            "canonical_url": "https://example.com",
            "attempt": 2,
            "max_attempts": 5
        }))
        .unwrap();
        assert_eq!(item.attempt, 2);
        assert_eq!(item.max_attempts, Some(5));
        assert_eq!(item.canonical_url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_numeric_bounds() {
        let spec = concurrency(json!(2), json!(8), json!("adaptive"));
        assert_eq!(spec.bounds(), (2, 8));
        assert!(spec.adaptive());
    }

    #[test]
    fn test_min_floors_at_one() {
        assert_eq!(concurrency(json!(0), json!(4), Value::Null).bounds(), (1, 4));
        assert_eq!(concurrency(json!(-3), json!(4), Value::Null).bounds(), (1, 4));
    }

    #[test]
    fn test_max_floors_at_min() {
        assert_eq!(concurrency(json!(5), json!(2), Value::Null).bounds(), (5, 5));
    }

    #[test]
    fn test_non_numeric_falls_back() {
        assert_eq!(
            concurrency(Value::Null, Value::Null, Value::Null).bounds(),
            (1, 1)
        );
        assert_eq!(
            concurrency(json!("lots"), json!({}), Value::Null).bounds(),
            (1, 1)
        );
    }

    #[test]
    fn test_string_numbers_accepted() {
        assert_eq!(
            concurrency(json!("2"), json!(" 6 "), Value::Null).bounds(),
            (2, 6)
        );
    }

    #[test]
    fn test_autoscale_mode() {
        assert!(concurrency(Value::Null, Value::Null, Value::Null).adaptive());
        assert!(concurrency(Value::Null, Value::Null, json!("")).adaptive());
        assert!(!concurrency(Value::Null, Value::Null, json!("fixed")).adaptive());
        assert!(!concurrency(Value::Null, Value::Null, json!("manual")).adaptive());
    }

    #[test]
    fn test_event_defaults_serialize_as_nulls() {
        let event = RunEvent::new(EVENT_RUNTIME_STARTED, STAGE_RUNTIME, json!({"worker_id": "w-1"}));
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["event_type"], "runtime.started");
        assert_eq!(wire["request_id"], Value::Null);
        assert_eq!(wire["stage"], "runtime");
        assert_eq!(wire["message"], Value::Null);
        assert_eq!(wire["level"], "info");
    }

    #[test]
    fn test_event_builder_helpers() {
        let event = RunEvent::new(EVENT_REQUEST_FAILED, STAGE_REQUEST, json!({}))
            .with_request_id("req-9")
            .with_message("connection reset")
            .with_level(LEVEL_ERROR);
        assert_eq!(event.request_id.as_deref(), Some("req-9"));
        assert_eq!(event.message.as_deref(), Some("connection reset"));
        assert_eq!(event.level, "error");
    }
}
