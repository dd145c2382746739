use std::error::Error as StdError;

use autopilot_protocol::{ProtocolError, Status};
use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Everything a command body, an evaluator or input binding can fail with.
///
/// All variants except [`CheckError::Unexpected`] mean "the step ran but could not reach a
/// verdict" and surface as a `FAILED` status line with return code 0.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The user-supplied configuration (config file, rules file, environment) is wrong.
    #[error("{0}")]
    Configuration(String),
    #[error("Input validation failed for {field}: {message}")]
    InputValidation { field: String, message: String },
    /// The command line does not match the provider's shape.
    #[error("{0}")]
    Usage(String),
    /// A recoverable failure detected by the check itself.
    #[error("{0}")]
    Autopilot(String),
    /// A bug or environmental failure. Reported with its cause chain, no status line.
    #[error("{0}")]
    Unexpected(BoxError),
}

impl CheckError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CheckError::Configuration(message.into())
    }

    pub fn autopilot(message: impl Into<String>) -> Self {
        CheckError::Autopilot(message.into())
    }

    pub fn input_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CheckError::InputValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unexpected(err: impl Into<BoxError>) -> Self {
        CheckError::Unexpected(err.into())
    }

    pub fn is_unexpected(&self) -> bool {
        matches!(self, CheckError::Unexpected(_))
    }

    /// Status line this error turns into, or `None` when it must crash the step instead.
    pub fn status(&self) -> Option<Status> {
        if self.is_unexpected() {
            None
        } else {
            Some(Status::Failed)
        }
    }
}

impl From<std::io::Error> for CheckError {
    fn from(err: std::io::Error) -> Self {
        CheckError::Unexpected(Box::new(err))
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(err: serde_json::Error) -> Self {
        CheckError::Unexpected(Box::new(err))
    }
}

impl From<ProtocolError> for CheckError {
    fn from(err: ProtocolError) -> Self {
        CheckError::Unexpected(Box::new(err))
    }
}

/// The provider itself is malformed; raised by [`crate::App::new`] before anything runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider `{provider}` declares a command group without sub-commands")]
    NoSubcommands { provider: String },
    #[error("sub-command `{name}` is declared more than once")]
    DuplicateSubcommand { name: String },
    #[error("parameter `{name}` is declared more than once on `{command}`")]
    DuplicateParam { command: String, name: String },
    #[error("parameter `{name}` on `{command}` clashes with a built-in option")]
    ReservedParam { command: String, name: String },
    #[error("invalid name `{name}`: names must be non-empty and contain no whitespace")]
    InvalidName { name: String },
}

/// Raised in place of a panic that escaped a command body or evaluator.
#[derive(Debug, Error)]
#[error("panicked: {0}")]
pub(crate) struct Panicked(pub(crate) String);
