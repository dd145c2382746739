//! Evaluator callbacks and the rules for running them.
//!
//! After the command bodies ran, the app calls, in order: the evaluator of every invoked
//! sub-command that declares one (with the results that sub-command produced), then the
//! top-level evaluator (with all results). Each call emits a status line; the last one is the
//! authoritative verdict. When no evaluator is involved and at least one result was recorded,
//! [`default_evaluator`] decides. An evaluator that returns an error stops the run; the app then
//! emits a single final `FAILED` line for it.

use std::panic::{self, AssertUnwindSafe};

use autopilot_protocol::{CheckResult, Evaluation, Status};
use tracing::{debug, warn};

use crate::{error::Panicked, CheckError, EvaluatorFn};

pub const ALL_FULFILLED: &str = "All criteria are fulfilled.";
pub const NOT_ALL_FULFILLED: &str = "Not all criteria are fulfilled!";

/// `GREEN` iff every result is fulfilled, else `RED`.
///
/// Only meaningful for a non-empty slice; the app never calls it without results.
pub fn default_evaluator(results: &[CheckResult]) -> Evaluation {
    let unfulfilled: Vec<&str> = results
        .iter()
        .filter(|result| !result.fulfilled)
        .map(|result| result.criterion.as_str())
        .collect();

    if unfulfilled.is_empty() {
        Evaluation::new(Status::Green, ALL_FULFILLED)
    } else {
        debug!(?unfulfilled, "unfulfilled criteria");
        Evaluation::new(Status::Red, NOT_ALL_FULFILLED)
    }
}

/// Worst status over all results, honouring a `status` hint in each result's metadata.
///
/// Fulfilled results count as `GREEN`; unfulfilled ones use their `metadata.status` (for example
/// `YELLOW` for a soft failure) and fall back to `RED`. An unknown hint is a configuration error.
pub fn metadata_status_evaluator(results: &[CheckResult]) -> Result<Evaluation, CheckError> {
    if results.is_empty() {
        return Ok(Evaluation::new(Status::Na, "No criteria were checked."));
    }

    let mut worst = Status::Green;
    let mut reasons = Vec::new();
    for result in results {
        let status = if result.fulfilled {
            Status::Green
        } else {
            match result.metadata_value("status").and_then(|v| v.as_str()) {
                Some(hint) => hint.parse::<Status>().map_err(|err| {
                    CheckError::configuration(format!(
                        "criterion `{}` carries an invalid status hint: {err}",
                        result.criterion
                    ))
                })?,
                None => Status::Red,
            }
        };
        if status != Status::Green {
            reasons.push(format!("{}: {}", result.criterion, result.justification));
        }
        worst = worst.max(status);
    }

    if reasons.is_empty() {
        Ok(Evaluation::new(worst, ALL_FULFILLED))
    } else {
        Ok(Evaluation::new(worst, reasons.join("; ")))
    }
}

/// Runs one evaluator callback. Its error is passed through unchanged; a panic is unexpected.
pub(crate) fn run_evaluator(
    evaluator: &EvaluatorFn,
    results: &[CheckResult],
) -> Result<Evaluation, CheckError> {
    catch_panic(|| evaluator(results))?.inspect_err(|err| warn!(error = %err, "evaluator failed"))
}

/// Converts a panic into [`CheckError::Unexpected`].
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, CheckError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        CheckError::unexpected(Panicked(message))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn default_evaluator_is_green_only_when_everything_passed() {
        let green = default_evaluator(&[CheckResult::fulfilled("a", "")]);
        assert_eq!(green, Evaluation::new(Status::Green, ALL_FULFILLED));

        let red = default_evaluator(&[
            CheckResult::fulfilled("a", ""),
            CheckResult::unfulfilled("b", ""),
        ]);
        assert_eq!(red, Evaluation::new(Status::Red, NOT_ALL_FULFILLED));
    }

    #[test]
    fn metadata_hints_pick_the_worst_status() {
        let results = [
            CheckResult::fulfilled("a", "fine"),
            CheckResult::unfulfilled("b", "a bit old").with_metadata("status", "YELLOW"),
        ];
        let evaluation = metadata_status_evaluator(&results).unwrap();
        assert_eq!(evaluation.status, Status::Yellow);
        assert_eq!(evaluation.reason, "b: a bit old");

        let bad = [CheckResult::unfulfilled("c", "x").with_metadata("status", "MAUVE")];
        assert!(matches!(
            metadata_status_evaluator(&bad),
            Err(CheckError::Configuration(_))
        ));
        assert_eq!(metadata_status_evaluator(&[]).unwrap().status, Status::Na);
    }

    #[test]
    fn failing_evaluators_stop_the_run() {
        let failing: EvaluatorFn =
            Arc::new(|_: &[CheckResult]| -> Result<Evaluation, CheckError> {
                Err(CheckError::configuration("no thresholds"))
            });
        let err = run_evaluator(&failing, &[]).unwrap_err();
        assert!(matches!(err, CheckError::Configuration(_)), "{err:?}");
        assert_eq!(err.status(), Some(Status::Failed));
        assert_eq!(err.to_string(), "no thresholds");

        let panicking: EvaluatorFn =
            Arc::new(|_: &[CheckResult]| -> Result<Evaluation, CheckError> {
                panic!("evaluator bug")
            });
        let err = run_evaluator(&panicking, &[]).unwrap_err();
        assert!(err.is_unexpected());
        assert_eq!(err.to_string(), "panicked: evaluator bug");
    }
}
