//! JSON-lines event input for the `run` command.
//!
//! One event per line:
//!
//! ```text
//! {"group": "App", "name": "Logged In", "properties": {"Version": "1.0"}, "dedupe": true}
//! ```
//!
//! `properties` and `dedupe` are optional. Blank lines and lines starting
//! with `#` are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CliError, Result};

/// One event read from the input
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EventLine {
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub dedupe: bool,
    /// 1-based line number in the input
    #[serde(skip)]
    pub line: usize,
}

/// Read events from a file path, or stdin when `source` is `-`
pub fn read_events(source: &str) -> Result<Vec<EventLine>> {
    if source == "-" {
        let stdin = io::stdin();
        parse_events(stdin.lock())
    } else {
        let file = File::open(source).map_err(|e| CliError::events_io(source, e))?;
        parse_events(BufReader::new(file))
    }
}

/// Parse JSON-lines events
pub fn parse_events(reader: impl BufRead) -> Result<Vec<EventLine>> {
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut event: EventLine = serde_json::from_str(trimmed)
            .map_err(|e| CliError::event_parse(idx + 1, e.to_string()))?;
        event.line = idx + 1;
        events.push(event);
    }

    Ok(events)
}
