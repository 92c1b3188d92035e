//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Events input could not be opened
    #[error("Failed to open events from {source_name}: {source}")]
    EventsIo {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed event line
    #[error("Invalid event on line {line}: {message}")]
    EventParse { line: usize, message: String },

    /// Event rejected by the producer API
    #[error("Event on line {line} rejected: {message}")]
    EventRejected { line: usize, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn events_io(source_name: impl Into<String>, source: std::io::Error) -> Self {
        Self::EventsIo {
            source_name: source_name.into(),
            source,
        }
    }

    pub fn event_parse(line: usize, message: impl Into<String>) -> Self {
        Self::EventParse {
            line,
            message: message.into(),
        }
    }

    pub fn event_rejected(line: usize, message: impl Into<String>) -> Self {
        Self::EventRejected {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
