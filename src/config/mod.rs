//! Run configuration
//!
//! The orchestrator's bootstrap response carries the run input as a JSON
//! object. This module defines the typed configuration the rest of the worker
//! reads and the parser that validates, defaults, and range-checks that JSON.

mod parser;
mod types;

pub use parser::parse_run_input;
pub use types::{EngineKind, HtmlTransformer, RunConfig, ScopeMode};
