//! Error types for the scripting crate

use ots_core::OtsError;

/// Script-specific error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// A script or library file could not be loaded
    #[error("Can not load {file}: {reason}")]
    LoadFailed { file: String, reason: String },

    /// Event name not understood by the NPC event table
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Callback handle does not name a live callback
    #[error("Callback not found: {0}")]
    CallbackNotFound(i32),

    /// Runtime error raised by a callback
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<ScriptError> for OtsError {
    fn from(err: ScriptError) -> Self {
        OtsError::Script(err.to_string())
    }
}

/// Result type for scripting operations
pub type Result<T> = std::result::Result<T, ScriptError>;
