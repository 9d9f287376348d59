//! Link handling shared by extraction and discovery
//!
//! This module provides candidate-link normalization and the URL glob
//! matching used by include/exclude crawl filters.

mod matcher;
mod normalize;

// Re-export main functions
pub use matcher::{compile_globs, matches_any, UrlGlob};
pub use normalize::normalize_link;
