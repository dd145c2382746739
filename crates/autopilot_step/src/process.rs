use std::{
    collections::BTreeMap,
    io,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    process::{Child, Command},
    task::JoinHandle,
    time,
};
use tracing::{debug, warn};

use crate::StepError;

/// Pauses between spawn attempts while the binary is still busy.
const SPAWN_RETRY_DELAYS: [Duration; 4] = [
    Duration::from_millis(2),
    Duration::from_millis(5),
    Duration::from_millis(15),
    Duration::from_millis(50),
];

const ETXTBSY: i32 = 26;

/// Console stream a child stream is echoed to while it is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mirror {
    Off,
    Stdout,
    Stderr,
}

impl Mirror {
    fn console(self) -> Option<Box<dyn AsyncWrite + Send + Unpin>> {
        match self {
            Mirror::Off => None,
            Mirror::Stdout => Some(Box::new(tokio::io::stdout())),
            Mirror::Stderr => Some(Box::new(tokio::io::stderr())),
        }
    }
}

/// Raw result of one child run, before the stdout stream is parsed.
#[derive(Debug, Clone)]
pub(crate) struct ChildOutput {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
}

/// Reads `stream` to the end, echoing every chunk to the mirror console as it arrives.
pub(crate) async fn collect_stream<R>(stream: R, mirror: Mirror) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut stream = BufReader::new(stream);
    let mut console = mirror.console();
    let mut collected = Vec::new();
    loop {
        let chunk = stream.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }
        if let Some(console) = console.as_mut() {
            console.write_all(chunk).await?;
            console.flush().await?;
        }
        collected.extend_from_slice(chunk);
        let consumed = chunk.len();
        stream.consume(consumed);
    }
    Ok(collected)
}

fn binary_is_busy(err: &io::Error) -> bool {
    err.raw_os_error() == Some(ETXTBSY)
}

/// Spawns `command`, retrying while the binary is busy (it was written a moment ago and is
/// still open for writing somewhere).
pub(crate) async fn spawn_child(command: &mut Command, binary: &Path) -> Result<Child, StepError> {
    let mut delays = SPAWN_RETRY_DELAYS.into_iter();
    loop {
        let source = match command.spawn() {
            Ok(child) => return Ok(child),
            Err(err) => err,
        };
        match delays.next() {
            Some(delay) if binary_is_busy(&source) => {
                debug!(binary = %binary.display(), ?delay, "step binary busy, retrying spawn");
                time::sleep(delay).await;
            }
            _ => {
                return Err(StepError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                })
            }
        }
    }
}

async fn join_stream(
    handle: JoinHandle<io::Result<Vec<u8>>>,
    read_error: fn(io::Error) -> StepError,
) -> Result<Vec<u8>, StepError> {
    handle
        .await
        .map_err(|err| StepError::Join(err.to_string()))?
        .map_err(read_error)
}

pub(crate) async fn run_command(
    mut command: Command,
    binary: &Path,
    timeout: Option<Duration>,
    mirror_stdout: bool,
    mirror_stderr: bool,
) -> Result<ChildOutput, StepError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = spawn_child(&mut command, binary).await?;
    let stdout = child.stdout.take().ok_or(StepError::MissingStdout)?;
    let stderr = child.stderr.take().ok_or(StepError::MissingStderr)?;

    let stdout_mirror = if mirror_stdout { Mirror::Stdout } else { Mirror::Off };
    let stderr_mirror = if mirror_stderr { Mirror::Stderr } else { Mirror::Off };
    let stdout_task = tokio::spawn(collect_stream(stdout, stdout_mirror));
    let stderr_task = tokio::spawn(collect_stream(stderr, stderr_mirror));

    let waited = match timeout {
        Some(limit) => time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };
    let status = match waited {
        Some(status) => status.map_err(StepError::Wait)?,
        None => {
            if let Err(err) = child.kill().await {
                warn!(error = %err, "failed to kill timed out step");
            }
            stdout_task.abort();
            stderr_task.abort();
            return Err(StepError::Timeout {
                timeout: timeout.unwrap_or_default(),
            });
        }
    };

    Ok(ChildOutput {
        status,
        stdout: join_stream(stdout_task, StepError::StdoutRead).await?,
        stderr: join_stream(stderr_task, StepError::StderrRead).await?,
    })
}

pub(crate) fn apply_env(command: &mut Command, env: &BTreeMap<String, String>) {
    command.envs(env);
}

/// Exit code, or -1 when the child was terminated by a signal.
pub(crate) fn returncode(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_stream_keeps_every_byte_in_order() {
        let input: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let collected = collect_stream(input.as_slice(), Mirror::Off).await.unwrap();
        assert_eq!(collected, input);
    }

    #[tokio::test]
    async fn mirroring_works_on_a_current_thread_runtime() {
        let collected = collect_stream(&b"mirrored line\n"[..], Mirror::Stderr)
            .await
            .unwrap();
        assert_eq!(collected, b"mirrored line\n");
    }

    #[test]
    fn only_a_busy_binary_is_retried() {
        assert!(binary_is_busy(&io::Error::from_raw_os_error(ETXTBSY)));
        assert!(!binary_is_busy(&io::Error::from(io::ErrorKind::NotFound)));
    }
}
