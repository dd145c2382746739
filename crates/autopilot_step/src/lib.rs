#![forbid(unsafe_code)]
//! Parent-side driver for autopilot steps.
//!
//! [`StepClient`] spawns a child autopilot, captures its stdout and folds the line-delimited JSON
//! report into a [`StepResult`]: results in order, outputs merged later-wins, the first status
//! line as the verdict (`FAILED` when there is none) and everything else as verbatim log text.
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), autopilot_step::StepError> {
//! use autopilot_step::StepClient;
//!
//! let client = StepClient::builder().binary("./hello-autopilot").build();
//! let step = client.run(["--name", "pipeline"]).await?;
//! step.exit_for_returncode()?.raise_for_status()?;
//! println!("{}", step.outputs().to_output_line().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

mod builder;
mod client;
mod error;
mod process;
mod step_result;

pub use builder::StepClientBuilder;
pub use client::{StepClient, STEP_BINARY_ENV};
pub use error::StepError;
pub use step_result::{StepResult, NO_STATUS_REASON};

pub use autopilot_protocol::{CheckResult, OutputMap, Status};
