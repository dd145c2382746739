use std::{path::PathBuf, time::Duration};

use autopilot_protocol::Status;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("step binary not configured (set it on the builder or via {env})")]
    MissingBinary { env: &'static str },
    #[error("failed to spawn step process (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
    #[error("step process timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("failed waiting for step process: {0}")]
    Wait(std::io::Error),
    #[error("failed reading stdout: {0}")]
    StdoutRead(std::io::Error),
    #[error("failed reading stderr: {0}")]
    StderrRead(std::io::Error),
    #[error("internal error: missing stdout pipe")]
    MissingStdout,
    #[error("internal error: missing stderr pipe")]
    MissingStderr,
    #[error("internal error: join failure: {0}")]
    Join(String),
    #[error("step exited with return code {returncode}")]
    NonZeroExit { returncode: i32 },
    #[error("step could not be evaluated: {reason}")]
    Failed { reason: String },
}

impl StepError {
    /// Status a parent reports when this error ends its own evaluation.
    pub fn status(&self) -> Status {
        match self {
            StepError::Failed { .. } => Status::Failed,
            _ => Status::Error,
        }
    }
}
