//! Failure classification
//!
//! Every failed item is reported to the queue with an error type and a
//! retryable flag; the queue owns retry scheduling, the worker never retries
//! on its own. Classification looks at the observed HTTP status first, then
//! falls back to case-insensitive substring matching on the error message.
//!
//! | Kind      | Trigger                                   | Retryable |
//! |-----------|-------------------------------------------|-----------|
//! | `blocked` | status 401/403/429, "captcha", "blocked"  | yes       |
//! | `budget`  | "budget", "max results", "max pages"      | no        |
//! | `policy`  | "robots", "policy", "depth"               | no        |
//! | `parse`   | "parse", "extract", "invalid input"       | no        |
//! | `network` | "timeout", "network", "fetch", "socket"   | yes       |
//! | `infra`   | anything else                             | no        |

/// Error categories reported to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Blocked,
    Budget,
    Policy,
    Parse,
    Network,
    Infra,
}

impl FailureKind {
    /// Wire name used in fail reports and events
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Blocked => "blocked",
            FailureKind::Budget => "budget",
            FailureKind::Policy => "policy",
            FailureKind::Parse => "parse",
            FailureKind::Network => "network",
            FailureKind::Infra => "infra",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome for one failed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureClass {
    pub kind: FailureKind,
    pub retryable: bool,
}

/// Classifies a failure from its message and optional observed status
///
/// Status takes precedence over message text; message matching is
/// case-insensitive and runs in the table order documented at module level.
///
/// # Example
///
/// ```
/// use leafcutter::failure::{classify_failure, FailureKind};
///
/// let class = classify_failure("Blocked with status 403", Some(403));
/// assert_eq!(class.kind, FailureKind::Blocked);
/// assert!(class.retryable);
/// ```
pub fn classify_failure(message: &str, status: Option<u16>) -> FailureClass {
    let text = message.to_lowercase();
    let contains_any =
        |needles: &[&str]| needles.iter().any(|needle| text.contains(needle));

    if matches!(status, Some(401 | 403 | 429)) || contains_any(&["captcha", "blocked"]) {
        return FailureClass {
            kind: FailureKind::Blocked,
            retryable: true,
        };
    }
    if contains_any(&["budget", "max results", "max pages"]) {
        return FailureClass {
            kind: FailureKind::Budget,
            retryable: false,
        };
    }
    if contains_any(&["robots", "policy", "depth"]) {
        return FailureClass {
            kind: FailureKind::Policy,
            retryable: false,
        };
    }
    if contains_any(&["parse", "extract", "invalid input"]) {
        return FailureClass {
            kind: FailureKind::Parse,
            retryable: false,
        };
    }
    if contains_any(&["timeout", "network", "fetch", "socket"]) {
        return FailureClass {
            kind: FailureKind::Network,
            retryable: true,
        };
    }
    FailureClass {
        kind: FailureKind::Infra,
        retryable: false,
    }
}
