//! Supervised execution of the real `zed` binary.
//!
//! Each command spawns one child with a scrubbed environment. Its stdout and
//! stderr are drained concurrently into buffers capped at
//! `terminal.max_output_bytes`; anything beyond the cap is read and dropped
//! so the child never blocks on a full pipe, and a cut never splits a UTF-8
//! character. The child is killed when `terminal.process_timeout_ms` expires
//! or when the caller goes away (`kill_on_drop`). A semaphore caps how many children run at once.

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::settings;
use crate::terminal::command::Command as ZedCommand;
use crate::terminal::dispatch::Invocation;
use crate::terminal::result::ExecutionResult;
use crate::terminal::CommandExecutor;

/// How long to wait for the output pipes to close after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct ProcessExecutor {
    binary: String,
    timeout: Duration,
    max_output_bytes: usize,
    endpoint: String,
    token: Option<String>,
    insecure: bool,
    permits: Arc<Semaphore>,
}

impl ProcessExecutor {
    pub fn new(terminal: &settings::Terminal, spicedb: &settings::SpiceDb) -> Self {
        let endpoint = spicedb.grpc_endpoint.clone().unwrap_or_else(|| {
            spicedb
                .endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .to_string()
        });
        Self {
            binary: terminal.zed_binary.clone(),
            timeout: Duration::from_millis(terminal.process_timeout_ms),
            max_output_bytes: terminal.max_output_bytes,
            endpoint,
            token: spicedb.token.clone(),
            insecure: spicedb.insecure,
            permits: Arc::new(Semaphore::new(terminal.max_concurrent_processes.max(1))),
        }
    }

    /// Arguments for the child: everything after the root keyword, plus the
    /// connection flags the user did not supply.
    pub fn build_args(&self, command: &ZedCommand) -> Vec<String> {
        let mut args = command.args().to_vec();
        if !command.has_flag("endpoint") {
            args.push("--endpoint".to_string());
            args.push(self.endpoint.clone());
        }
        if let Some(token) = &self.token {
            if !command.has_flag("token") {
                args.push("--token".to_string());
                args.push(token.clone());
            }
        }
        if self.insecure && !command.has_flag("insecure") {
            args.push("--insecure".to_string());
        }
        args
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, invocation: &Invocation) -> ExecutionResult {
        let started_at = Utc::now();

        let Ok(_permit) = self.permits.clone().try_acquire_owned() else {
            tracing::warn!("process limit reached, refusing command");
            return ExecutionResult::from_process(started_at, None, String::new(), String::new())
                .with_error("too many commands are running; try again shortly");
        };

        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args(&invocation.command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        apply_safe_env(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(binary = %self.binary, error = %e, "failed to spawn zed");
                return ExecutionResult::from_process(
                    started_at,
                    None,
                    String::new(),
                    String::new(),
                )
                .with_error(format!("failed to spawn `{}`: {e}", self.binary));
            }
        };

        let limit = self.max_output_bytes;
        let (stdout_task, stdout_capture) = spawn_drain(child.stdout.take(), limit);
        let (stderr_task, stderr_capture) = spawn_drain(child.stderr.take(), limit);

        let (code, failure) = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code(), None),
            Ok(Err(e)) => {
                let _ = child.kill().await;
                (None, Some(format!("failed to wait for `{}`: {e}", self.binary)))
            }
            Err(_elapsed) => {
                tracing::warn!(
                    binary = %self.binary,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "zed process timed out"
                );
                let _ = child.kill().await;
                (
                    None,
                    Some(format!(
                        "command timed out after {}ms",
                        self.timeout.as_millis()
                    )),
                )
            }
        };

        let stdout = collect(stdout_task, stdout_capture, limit).await;
        let stderr = collect(stderr_task, stderr_capture, limit).await;
        let truncated = stdout.truncated || stderr.truncated;

        let result = ExecutionResult::from_process(started_at, code, stdout.text, stderr.text)
            .with_truncated(truncated);
        match failure {
            Some(message) => result.with_error(message),
            None => result,
        }
    }

    fn spawns_process(&self) -> bool {
        true
    }
}

/// Clear the inherited environment, keeping only what `zed` needs to run.
/// Connection details travel as flags, never as inherited secrets.
fn apply_safe_env(cmd: &mut Command) {
    cmd.env_clear();
    for var in ["PATH", "HOME", "TMPDIR"] {
        if let Ok(value) = std::env::var(var) {
            cmd.env(var, value);
        }
    }
    cmd.env("LANG", "en_US.UTF-8");
    cmd.env("NO_COLOR", "1");
}

/// Bytes read from one pipe so far.
#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

type SharedCapture = Arc<Mutex<Capture>>;

fn lock(capture: &SharedCapture) -> MutexGuard<'_, Capture> {
    capture.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct Output {
    text: String,
    truncated: bool,
}

/// Start draining a pipe in the background, keeping at most `limit` bytes.
fn spawn_drain<R>(reader: Option<R>, limit: usize) -> (JoinHandle<()>, SharedCapture)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let capture = SharedCapture::default();
    let task = tokio::spawn(drain(reader, limit, capture.clone()));
    (task, capture)
}

/// Read a pipe to EOF. Everything past `limit` is read and dropped.
async fn drain<R: AsyncRead + Unpin>(reader: Option<R>, limit: usize, capture: SharedCapture) {
    let Some(mut reader) = reader else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut capture = lock(&capture);
                let room = limit.saturating_sub(capture.bytes.len());
                capture.bytes.extend_from_slice(&chunk[..n.min(room)]);
                if n > room {
                    capture.truncated = true;
                }
            }
        }
    }
}

/// Join a drain task. A grandchild may hold the pipe open after the child
/// is gone, so give up after a grace period and keep what was read.
async fn collect(mut task: JoinHandle<()>, capture: SharedCapture, limit: usize) -> Output {
    let abandoned = tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err();
    if abandoned {
        task.abort();
    }
    let Capture { bytes, truncated } = std::mem::take(&mut *lock(&capture));
    let truncated = truncated || abandoned;
    Output {
        text: decode(bytes, truncated, limit),
        truncated,
    }
}

/// Decode captured bytes without ever exceeding `limit` bytes of text.
fn decode(mut bytes: Vec<u8>, truncated: bool, limit: usize) -> String {
    if truncated {
        drop_partial_char(&mut bytes);
    }
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if text.len() > limit {
        // replacement characters are wider than the bytes they stand for
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Remove a UTF-8 sequence cut short at the end of `bytes`.
fn drop_partial_char(bytes: &mut Vec<u8>) {
    let len = bytes.len();
    for back in 1..=len.min(4) {
        let byte = bytes[len - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        if width > back {
            bytes.truncate(len - back);
        }
        return;
    }
}
