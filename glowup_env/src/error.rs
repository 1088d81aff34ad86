//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors raised by external collaborators (session action, screen source).
#[derive(Debug, Error)]
pub enum EnvError {
    /// An external command could not be run or exited unsuccessfully
    #[error("Command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// Collaborator output could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The collaborator is not available on this platform
    #[error("Unsupported platform: {0}")]
    Unsupported(String),
}

impl EnvError {
    /// Creates a command failure.
    pub fn command(command: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}
