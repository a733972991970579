//! External tool execution for ping, traceroute and custom probes.
//!
//! Every tool runs with a hard timeout. The child is killed when the timeout
//! elapses; output captured up to that point is kept. Stderr is appended to
//! stdout under a `STDERR:` marker.

use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::target::{host_of, render_template};
use super::{Execution, ProbeError};

/// A fully resolved tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Name used in error messages.
    pub tool: &'static str,
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Treat a non-zero exit as success (traceroute reports unreachable hops that way).
    pub tolerate_failure: bool,
}

pub fn ping_spec(target: &str, count: u32, timeout: Duration) -> CommandSpec {
    let count_flag = if cfg!(target_os = "windows") { "-n" } else { "-c" };
    CommandSpec {
        tool: "ping",
        program: "ping".to_string(),
        args: vec![count_flag.to_string(), count.to_string(), host_of(target)],
        timeout,
        tolerate_failure: false,
    }
}

pub fn traceroute_spec(target: &str, timeout: Duration) -> CommandSpec {
    let program = if cfg!(target_os = "windows") { "tracert" } else { "traceroute" };
    CommandSpec {
        tool: "traceroute",
        program: program.to_string(),
        args: vec![host_of(target)],
        timeout,
        tolerate_failure: true,
    }
}

pub fn custom_spec(template: &str, target: &str, timeout: Duration) -> CommandSpec {
    let command_line = render_template(template, target);
    let (program, flag) = if cfg!(target_os = "windows") { ("cmd", "/C") } else { ("sh", "-c") };
    CommandSpec {
        tool: "custom command",
        program: program.to_string(),
        args: vec![flag.to_string(), command_line],
        timeout,
        tolerate_failure: false,
    }
}

/// Time given to the output readers once the child is gone. A grandchild
/// still holding the pipes open must not keep the caller waiting.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

type Captured = Arc<Mutex<Vec<u8>>>;

/// Copies a pipe into `buffer` chunk by chunk, so whatever arrived before a
/// kill is still there afterwards.
fn capture<R>(mut pipe: R, buffer: Captured) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
            }
        }
    })
}

async fn drain(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            abort.abort();
        }
    }
}

fn take_text(buffer: &Captured) -> String {
    let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Runs the tool and collects its output, never failing outright: errors end
/// up in [`Execution::error`] next to whatever output was captured, including
/// the output produced before a timeout.
pub async fn run_command(spec: &CommandSpec) -> Execution {
    log::debug!("Executing {} {:?} (timeout: {:?})", spec.program, spec.args, spec.timeout);

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(source) => {
            return Execution::failed(ProbeError::Spawn {
                tool: spec.tool,
                source,
            });
        }
    };

    let stdout = Captured::default();
    let stderr = Captured::default();
    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        readers.push(capture(pipe, stdout.clone()));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(capture(pipe, stderr.clone()));
    }

    let waited = tokio::select! {
        status = child.wait() => Some(status),
        _ = tokio::time::sleep(spec.timeout) => None,
    };
    if waited.is_none() {
        log::warn!("{} timed out after {:?}, killing it", spec.tool, spec.timeout);
        if let Err(e) = child.kill().await {
            log::warn!("Failed to kill {}: {e}", spec.tool);
        }
    }
    drain(readers).await;

    let mut text = take_text(&stdout);
    let stderr = take_text(&stderr);
    if !stderr.is_empty() {
        text.push_str("\nSTDERR:\n");
        text.push_str(&stderr);
    }

    let mut execution = Execution {
        output: text,
        ..Default::default()
    };

    match waited {
        Some(Ok(status)) => {
            if let Some(code) = status.code() {
                execution = execution.with_meta("exit_code", code);
            }
            if !status.success() && !spec.tolerate_failure {
                execution.error = Some(ProbeError::Failed {
                    tool: spec.tool,
                    status,
                });
            }
        }
        Some(Err(source)) => {
            execution.error = Some(ProbeError::Spawn {
                tool: spec.tool,
                source,
            });
        }
        None => {
            execution = execution.with_meta("timed_out", true);
            if !spec.tolerate_failure {
                execution.error = Some(ProbeError::Timeout {
                    tool: spec.tool,
                    after: spec.timeout,
                });
            }
        }
    }

    execution
}
