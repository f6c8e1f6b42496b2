//! Error types for Cadence

use crate::Phase;
use thiserror::Error;

/// The main error type for Cadence operations
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Dispatcher already retired: no instance is available after shutdown")]
    DispatcherRetired,

    #[error("Dispatcher busy: it is borrowed by the running pass; use the FrameContext")]
    DispatcherBusy,

    #[error("{phase} pass aborted by participant '{participant}': {source}")]
    PhaseAborted {
        phase: Phase,
        participant: String,
        #[source]
        source: Box<CadenceError>,
    },

    #[error("Participant error: {0}")]
    Participant(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

impl CadenceError {
    /// Shorthand for a participant-defined failure
    pub fn participant(msg: impl Into<String>) -> Self {
        CadenceError::Participant(msg.into())
    }
}

/// Result type alias for Cadence operations
pub type Result<T> = std::result::Result<T, CadenceError>;

impl From<toml::de::Error> for CadenceError {
    fn from(err: toml::de::Error) -> Self {
        CadenceError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for CadenceError {
    fn from(err: toml::ser::Error) -> Self {
        CadenceError::TomlSerError(err.to_string())
    }
}
