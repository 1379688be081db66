//! Upstream stream vocabularies
//!
//! Each backend writes JSON lines to stdout. Lines are decoded into closed
//! enums with a catch-all `Other` variant; anything that fails to decode is
//! skipped by the caller.

use serde::de::DeserializeOwned;
use tracing::trace;

pub mod claude;
pub mod codex;

/// Decode one stdout line, or `None` for blank and malformed lines
pub fn parse_json_line<T: DeserializeOwned>(line: &str) -> Option<T> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            trace!("skipping unparseable line: {}", e);
            None
        }
    }
}
