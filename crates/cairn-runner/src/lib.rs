//! Turns raw runner process output into discrete lifecycle events using
//! the regex rules each platform driver supplies.

pub mod log_parser;
pub mod log_patterns;

pub use log_parser::{extract_events, parse_chunk, LogLevel, RunnerLogEvent, RunnerStatus};
pub use log_patterns::{CompiledLogPatterns, PatternError};
