//! Runs a single attempt of a job as a supervised child process.
//!
//! The executor is stateless: it spawns the command, captures output up to a
//! cap, enforces the wall-clock timeout, and reports an [`Outcome`]. It never
//! touches the store.

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Per-stream capture cap. Bounds the size of the stored row; anything past
/// the cap is drained and discarded so the child never blocks on a full pipe.
pub const OUTPUT_CAP_BYTES: usize = 1024 * 1024;

const TRUNCATION_MARKER: &str = "…[truncated]";

/// Window between SIGTERM and SIGKILL when tearing a process group down.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// The result of one attempt.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Exit code of the child, `None` if it was killed by a signal or never
    /// spawned.
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub terminated_by_timeout: bool,
    /// Set when the command could not be started at all (not found,
    /// permission denied). Classified as a retriable failed attempt.
    pub spawn_error: Option<String>,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && !self.terminated_by_timeout && self.spawn_error.is_none()
    }
}

/// Seam between the worker loop and process supervision, so tests can inject
/// scripted outcomes.
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    async fn run(&self, command: &str, timeout: Duration, cancel: &CancellationToken) -> Outcome;
}

/// Executes commands through the host shell so quoting, pipes, and
/// redirection behave as a shell user expects.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, command: &str, timeout: Duration, cancel: &CancellationToken) -> Outcome {
        let started = Instant::now();
        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command, error = %e, "failed to spawn command");
                return Outcome {
                    spawn_error: Some(e.to_string()),
                    duration: started.elapsed(),
                    ..Outcome::default()
                };
            }
        };

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");
        let stdout_task = tokio::spawn(read_capped(stdout));
        let stderr_task = tokio::spawn(read_capped(stderr));

        let mut terminated_by_timeout = false;
        let waited = tokio::select! {
            biased;

            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(timeout) => {
                terminated_by_timeout = true;
                None
            }
        };
        let status = match waited {
            Some(status) => status,
            None => terminate_group(&mut child).await,
        };

        Outcome {
            exit_code: status.ok().and_then(|s| s.code()).map(i64::from),
            stdout: stdout_task.await.unwrap_or_default(),
            stderr: stderr_task.await.unwrap_or_default(),
            duration: started.elapsed(),
            terminated_by_timeout,
            spawn_error: None,
        }
    }
}

/// SIGTERM the whole process group, escalating to SIGKILL after the grace
/// window. The child was spawned as its own group leader, so pipelines and
/// subshells go down with it.
async fn terminate_group(child: &mut Child) -> std::io::Result<ExitStatus> {
    if let Some(pid) = child.id() {
        let pgid = Pid::from_raw(pid as i32);
        let _ = signal::killpg(pgid, Signal::SIGTERM);
        match tokio::time::timeout(KILL_GRACE, child.wait()).await {
            Ok(status) => return status,
            Err(_) => {
                let _ = signal::killpg(pgid, Signal::SIGKILL);
            }
        }
    } else {
        let _ = child.start_kill();
    }
    child.wait().await
}

async fn read_capped<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if captured.len() < OUTPUT_CAP_BYTES {
                    let take = n.min(OUTPUT_CAP_BYTES - captured.len());
                    captured.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
        }
    }
    let mut output = String::from_utf8_lossy(&captured).into_owned();
    if truncated {
        output.push_str(TRUNCATION_MARKER);
    }
    output
}
