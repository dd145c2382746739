use autopilot_protocol::{CheckResult, OutputMap, ParsedStream, Status};

use crate::StepError;

/// Reason recorded when a child finished without printing a status line.
pub const NO_STATUS_REASON: &str = "Step did not report a status.";

/// Parent-side view of one finished child step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    status: Status,
    reason: String,
    results: Vec<CheckResult>,
    outputs: OutputMap,
    returncode: i32,
    stdout: String,
    stderr: String,
}

impl StepResult {
    pub(crate) fn from_stream(parsed: ParsedStream, returncode: i32, stderr: String) -> Self {
        let (status, reason) = match parsed.evaluation {
            Some(evaluation) => (evaluation.status, evaluation.reason),
            None => (Status::Failed, NO_STATUS_REASON.to_string()),
        };
        Self {
            status,
            reason,
            results: parsed.results,
            outputs: parsed.outputs,
            returncode,
            stdout: parsed.stdout,
            stderr,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Results in the order the child printed them.
    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn outputs(&self) -> &OutputMap {
        &self.outputs
    }

    pub fn returncode(&self) -> i32 {
        self.returncode
    }

    /// Lines that were not protocol records, verbatim.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// `Err` only for a `FAILED` verdict; `RED` and friends are valid outcomes.
    pub fn raise_for_status(&self) -> Result<&Self, StepError> {
        if self.status == Status::Failed {
            return Err(StepError::Failed {
                reason: self.reason.clone(),
            });
        }
        Ok(self)
    }

    pub fn exit_for_returncode(&self) -> Result<&Self, StepError> {
        if self.returncode != 0 {
            return Err(StepError::NonZeroExit {
                returncode: self.returncode,
            });
        }
        Ok(self)
    }
}
