use std::{
    collections::BTreeMap,
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

use autopilot_protocol::{parse_stream, IngestLimits};
use tokio::process::Command;
use tracing::debug;

use crate::{builder::StepClientBuilder, process, StepError, StepResult};

/// Environment variable naming the step binary when the builder sets none.
pub const STEP_BINARY_ENV: &str = "AUTOPILOT_STEP_BINARY";

/// Runs child autopilot steps and parses what they report.
#[derive(Debug, Clone)]
pub struct StepClient {
    pub(crate) binary: Option<PathBuf>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) mirror_stdout: bool,
    pub(crate) mirror_stderr: bool,
    pub(crate) limits: IngestLimits,
}

impl StepClient {
    pub fn builder() -> StepClientBuilder {
        StepClientBuilder::default()
    }

    /// Runs the configured binary with `args`.
    pub async fn run<I, S>(&self, args: I) -> Result<StepResult, StepError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let binary = self.resolve_binary()?;
        self.run_binary(&binary, args).await
    }

    /// Runs `binary` with `args`, ignoring the configured binary.
    pub async fn run_binary<I, S>(&self, binary: &Path, args: I) -> Result<StepResult, StepError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(binary);
        cmd.args(args);

        if let Some(dir) = self.working_dir.as_ref() {
            cmd.current_dir(dir);
        }

        process::apply_env(&mut cmd, &self.env);

        debug!(binary = %binary.display(), "running step");
        let output = process::run_command(
            cmd,
            binary,
            self.timeout,
            self.mirror_stdout,
            self.mirror_stderr,
        )
        .await?;

        let returncode = process::returncode(&output.status);
        let parsed = parse_stream(output.stdout.as_slice(), self.limits);
        debug!(
            returncode,
            results = parsed.results.len(),
            outputs = parsed.outputs.len(),
            "step finished"
        );
        Ok(StepResult::from_stream(
            parsed,
            returncode,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }

    fn resolve_binary(&self) -> Result<PathBuf, StepError> {
        if let Some(binary) = &self.binary {
            return Ok(binary.clone());
        }
        std::env::var_os(STEP_BINARY_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .ok_or(StepError::MissingBinary {
                env: STEP_BINARY_ENV,
            })
    }
}
