//! Engine selection
//!
//! Resolves the engine a run actually uses from the engine it requested:
//!
//! - `camoufox` requires the stealth browser runtime; when it is not
//!   available the run degrades to `playwright` and records why
//! - `playwright` and `http:fast` are always considered available
//!
//! Stealth availability is read from the environment once at startup and
//! the result is passed around as a plain bool, so resolution itself stays
//! deterministic and testable.

use crate::config::EngineKind;

/// Values that mark an availability flag as set
const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];

/// Environment flags that advertise the stealth browser runtime
const STEALTH_FLAGS: [&str; 3] = [
    "CAMOUFOX_AVAILABLE",
    "LEAFCUTTER_CAMOUFOX_AVAILABLE",
    "LEAFCUTTER_CAMOUFOX_ENABLED",
];

/// Outcome of resolving the requested engine against runtime availability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResolution {
    /// Engine named in the run input
    pub requested: EngineKind,
    /// Engine the run will actually use
    pub selected: EngineKind,
    /// Set when `selected` differs from `requested`
    pub fallback_reason: Option<&'static str>,
}

/// Resolves the engine to use for a run
///
/// # Arguments
///
/// * `requested` - Engine named in the run input
/// * `stealth_available` - Whether the stealth browser runtime is present
///
/// # Example
///
/// ```
/// use leafcutter::config::EngineKind;
/// use leafcutter::engine::resolve_engine;
///
/// let resolution = resolve_engine(EngineKind::Camoufox, false);
/// assert_eq!(resolution.selected, EngineKind::Playwright);
/// assert_eq!(resolution.fallback_reason, Some("camoufox_unavailable"));
/// ```
pub fn resolve_engine(requested: EngineKind, stealth_available: bool) -> EngineResolution {
    if requested == EngineKind::Camoufox && !stealth_available {
        return EngineResolution {
            requested,
            selected: EngineKind::Playwright,
            fallback_reason: Some("camoufox_unavailable"),
        };
    }
    EngineResolution {
        requested,
        selected: requested,
        fallback_reason: None,
    }
}

/// Checks the environment for a stealth browser availability flag
///
/// Any one of `CAMOUFOX_AVAILABLE`, `LEAFCUTTER_CAMOUFOX_AVAILABLE` or
/// `LEAFCUTTER_CAMOUFOX_ENABLED` set to a truthy value (`1`, `true`, `yes`,
/// `on`, case-insensitive) counts as available.
pub fn stealth_engine_available() -> bool {
    STEALTH_FLAGS
        .iter()
        .any(|name| std::env::var(name).map(|v| is_truthy(&v)).unwrap_or(false))
}

fn is_truthy(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    TRUTHY.contains(&normalized.as_str())
}
