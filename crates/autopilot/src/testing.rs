//! Helpers for testing autopilots in-process.
//!
//! ```rust
//! use autopilot::{testing, App, CheckResult, Provider, Status};
//!
//! let app = App::new(Provider::command("smoke", |ctx| {
//!     ctx.add_result(CheckResult::fulfilled("reachable", "200 OK"));
//!     Ok(())
//! }))
//! .unwrap();
//!
//! let run = testing::run_app(&app, ["--debug"]);
//! assert_eq!(run.code, 0);
//! testing::assert_result_status(&run.stdout, Status::Green, Some("fulfilled"));
//! ```

use std::ffi::OsString;

use autopilot_protocol::{Evaluation, ProtocolLine, Status};
use regex::Regex;

use crate::App;

pub use crate::store::{protect, protect_results, ProtectedResults};

/// What one in-process invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRun {
    pub code: i32,
    pub stdout: String,
}

impl AppRun {
    pub fn lines(&self) -> impl Iterator<Item = ProtocolLine> + '_ {
        self.stdout.lines().map(ProtocolLine::parse)
    }

    /// The authoritative (last) status line, if any.
    pub fn evaluation(&self) -> Option<Evaluation> {
        status_lines(&self.stdout).pop()
    }
}

/// Runs `app` with `args` (binary name excluded) while capturing stdout.
///
/// The current thread's result store is protected for the duration of the run.
pub fn run_app<I, T>(app: &App, args: I) -> AppRun
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = std::iter::once(OsString::from(app.provider().name()))
        .chain(args.into_iter().map(Into::into))
        .collect();

    let mut stdout = Vec::new();
    let code = protect_results(|| app.run_from(argv, &mut stdout));
    AppRun {
        code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
    }
}

/// Every status line in `stdout`, in emission order.
pub fn status_lines(stdout: &str) -> Vec<Evaluation> {
    stdout
        .lines()
        .filter_map(|line| match ProtocolLine::parse(line) {
            ProtocolLine::Status(evaluation) => Some(evaluation),
            _ => None,
        })
        .collect()
}

/// Asserts that the last status line in `stdout` has `expected` status and, when given, that its
/// reason matches `reason_pattern` (a regex, searched anywhere in the reason).
#[track_caller]
pub fn assert_result_status(stdout: &str, expected: Status, reason_pattern: Option<&str>) {
    let Some(evaluation) = status_lines(stdout).pop() else {
        panic!("no status line in output:\n{stdout}");
    };
    assert_eq!(
        evaluation.status, expected,
        "unexpected status (reason: {:?}) in output:\n{stdout}",
        evaluation.reason
    );
    if let Some(pattern) = reason_pattern {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|err| panic!("invalid reason pattern {pattern:?}: {err}"));
        assert!(
            regex.is_match(&evaluation.reason),
            "reason {:?} does not match {pattern:?}",
            evaluation.reason
        );
    }
}

#[track_caller]
pub fn assert_no_result_status(stdout: &str) {
    let statuses = status_lines(stdout);
    assert!(
        statuses.is_empty(),
        "expected no status line, found {statuses:?} in output:\n{stdout}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const STDOUT: &str = concat!(
        "starting\n",
        r#"{"result": {"criterion": "a", "fulfilled": true, "justification": ""}}"#,
        "\n",
        r#"{"status": "YELLOW", "reason": "sub"}"#,
        "\n",
        r#"{"status": "RED", "reason": "Not all criteria are fulfilled!"}"#,
        "\n",
    );

    #[test]
    fn the_last_status_line_counts() {
        assert_eq!(status_lines(STDOUT).len(), 2);
        assert_result_status(STDOUT, Status::Red, Some("^Not all"));
    }

    #[test]
    #[should_panic(expected = "unexpected status")]
    fn wrong_status_panics() {
        assert_result_status(STDOUT, Status::Yellow, None);
    }

    #[test]
    fn output_without_status() {
        assert_no_result_status("just a log line\n");
    }
}
