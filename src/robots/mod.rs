//! Robots.txt handling
//!
//! One [`RobotsGate`] per run answers "may we fetch this URL" with a
//! per-origin cache. Unreachable or unparseable robots.txt files allow
//! everything; a crawl must not stall because a site serves a broken
//! robots file.

mod gate;
mod parser;

pub use gate::RobotsGate;
pub use parser::ParsedRobots;
