#![forbid(unsafe_code)]
//! Runtime shared by every autopilot step.
//!
//! An autopilot is a small CLI that performs one check and reports a verdict on stdout using the
//! line-delimited JSON protocol from [`autopilot_protocol`]. Apps describe their shape with a
//! [`Provider`] (a single command body or a group of sub-commands, plus optional evaluator and
//! version callbacks) and hand it to [`App`], which:
//!
//! - injects `--help`, `--version`, `--no-colors` and `--debug`;
//! - binds and validates declared [`Param`]s (CLI value > environment variable > default);
//! - runs the selected body (or the chain of sub-command bodies) against the ambient
//!   [result store](store);
//! - emits `output`/`result` lines and the final `status` line through the evaluator engine;
//! - maps [`CheckError`] variants to `FAILED` verdicts and anything unexpected to an error report
//!   with a non-zero return code and no status line.
//!
//! ```rust,no_run
//! use autopilot::{App, CheckResult, Param, Provider};
//!
//! let provider = Provider::command("file-check", |ctx| {
//!     let path = ctx.params().require("path")?;
//!     let exists = std::path::Path::new(path).exists();
//!     ctx.add_result(CheckResult::new("file exists", exists, format!("checked {path}")));
//!     Ok(())
//! })
//! .param(Param::positional("path").required(true))
//! .version(|| env!("CARGO_PKG_VERSION").to_string());
//!
//! App::new(provider).expect("valid provider").main();
//! ```

mod app;
pub mod config;
mod emit;
mod error;
pub mod evaluator;
pub mod logging;
mod params;
mod provider;
pub mod store;
pub mod testing;

pub use app::App;
pub use error::{BoxError, CheckError, ProviderError};
pub use params::{Param, ParamKind, ParamValue, Params, Validator};
pub use provider::{
    CommandContext, CommandFn, EvaluatorFn, Provider, ProviderKind, SubcommandProvider, VersionFn,
};

pub use autopilot_protocol::{CheckResult, Evaluation, OutputMap, Status};
