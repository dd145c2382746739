use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use autopilot_protocol::IngestLimits;

use crate::client::StepClient;

#[derive(Debug, Clone)]
pub struct StepClientBuilder {
    pub(crate) binary: Option<PathBuf>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) mirror_stdout: bool,
    pub(crate) mirror_stderr: bool,
    pub(crate) limits: IngestLimits,
}

impl Default for StepClientBuilder {
    fn default() -> Self {
        Self {
            binary: None,
            working_dir: None,
            env: BTreeMap::new(),
            timeout: None,
            mirror_stdout: false,
            mirror_stderr: false,
            limits: IngestLimits::default(),
        }
    }
}

impl StepClientBuilder {
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Extra environment for the child, on top of the inherited one.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Kill the child and fail with [`crate::StepError::Timeout`] after this long.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mirror_stdout(mut self, enabled: bool) -> Self {
        self.mirror_stdout = enabled;
        self
    }

    pub fn mirror_stderr(mut self, enabled: bool) -> Self {
        self.mirror_stderr = enabled;
        self
    }

    pub fn max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.limits.max_line_bytes = max_line_bytes;
        self
    }

    pub fn build(self) -> StepClient {
        StepClient {
            binary: self.binary,
            working_dir: self.working_dir,
            env: self.env,
            timeout: self.timeout,
            mirror_stdout: self.mirror_stdout,
            mirror_stderr: self.mirror_stderr,
            limits: self.limits,
        }
    }
}
