// src/exec/process.rs

//! Spawning a shell command and watching it until it exits.

use std::future::Future;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::kill::kill_tree;
use super::runner::CommandSpec;
use super::{ExecError, ExitOutcome, ExitReason, Severity};

/// Live control surface of a spawned process.
pub trait ProcessControl: Send {
    /// Queue `line` (plus a newline) for the child's stdin.
    fn write_line(&mut self, line: &str) -> Result<(), ExecError>;

    /// Terminate the whole process tree.
    fn terminate(&mut self, severity: Severity) -> Result<(), ExecError>;
}

/// Resolves exactly once, when the process has exited and its output
/// streams are closed.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<ExitOutcome>,
}

impl Completion {
    /// A completion together with the sender that resolves it.
    pub fn channel() -> (oneshot::Sender<ExitOutcome>, Completion) {
        let (tx, rx) = oneshot::channel();
        (tx, Completion { rx })
    }
}

impl Future for Completion {
    type Output = ExitOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The monitor task vanished without reporting (runtime shutdown).
            Poll::Ready(Err(_)) => Poll::Ready(ExitOutcome {
                reason: ExitReason::Code(-1),
                last_line: "process monitor went away".to_string(),
            }),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A spawned command: the control half and the completion half, owned
/// together but consumable separately.
pub struct RunningCommand {
    pub control: Box<dyn ProcessControl>,
    pub completion: Completion,
}

impl RunningCommand {
    pub fn new(control: Box<dyn ProcessControl>, completion: Completion) -> Self {
        Self { control, completion }
    }

    /// Wait for the process to finish, keeping the control half alive
    /// until then.
    pub async fn wait(self) -> ExitOutcome {
        let RunningCommand { control, completion } = self;
        let outcome = completion.await;
        drop(control);
        outcome
    }
}

/// Most recent non-empty output line across stdout and stderr.
#[derive(Debug, Clone, Default)]
struct LastLine(Arc<Mutex<String>>);

impl LastLine {
    fn record(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = line.to_string();
    }

    fn get(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Production [`ProcessControl`]: signals go to the process group, stdin
/// lines are handed to a writer task.
struct ShellProcess {
    pid: Option<u32>,
    stdin: Option<mpsc::UnboundedSender<String>>,
}

impl ProcessControl for ShellProcess {
    fn write_line(&mut self, line: &str) -> Result<(), ExecError> {
        let stdin = self.stdin.as_ref().ok_or(ExecError::NotRunning)?;
        stdin
            .send(format!("{line}\n"))
            .map_err(|_| ExecError::NotRunning)
    }

    fn terminate(&mut self, severity: Severity) -> Result<(), ExecError> {
        let pid = self.pid.ok_or(ExecError::NotRunning)?;
        kill_tree(pid, severity)
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(script: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    }
}

/// Spawn `spec.cmd` through the shell.
///
/// Returns `ExecError::Spawn` when the OS could not create the process.
/// Otherwise every stdout/stderr line is logged under `owner`, and the
/// returned completion resolves with the exit code (or signal name) and the
/// last line seen on either stream.
pub fn spawn_shell(spec: CommandSpec) -> Result<RunningCommand, ExecError> {
    let mut cmd = shell_command(&spec.cmd);
    cmd.current_dir(&spec.cwd)
        .envs(&spec.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        cmd: spec.cmd.clone(),
        source,
    })?;
    let pid = child.id();

    info!(owner = %spec.owner, cmd = %spec.cmd, cwd = %spec.cwd.display(), ?pid, "spawned process");

    let last_line = LastLine::default();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(pump_lines(stdout, "stdout", spec.owner.clone(), last_line.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(pump_lines(stderr, "stderr", spec.owner.clone(), last_line.clone()));
    }

    let stdin = child.stdin.take().map(|stdin| feed_stdin(stdin, spec.owner.clone()));

    let (done_tx, completion) = Completion::channel();
    let owner = spec.owner;
    tokio::spawn(async move {
        let reason = match child.wait().await {
            Ok(status) => exit_reason(status),
            Err(e) => {
                warn!(owner = %owner, error = %e, "waiting for process failed");
                last_line.record(&format!("wait failed: {e}"));
                ExitReason::Code(-1)
            }
        };
        // Output may still be buffered in the pipes after exit.
        for reader in readers {
            let _ = reader.await;
        }

        match &reason {
            ExitReason::Code(code) => info!(owner = %owner, exit_code = code, "exited with code {code}"),
            ExitReason::Signal(sig) => info!(owner = %owner, signal = %sig, "killed by signal {sig}"),
        }

        let outcome = ExitOutcome {
            reason,
            last_line: last_line.get(),
        };
        if done_tx.send(outcome).is_err() {
            debug!(owner = %owner, "nobody awaiting process completion");
        }
    });

    let control = ShellProcess { pid, stdin };
    Ok(RunningCommand::new(Box::new(control), completion))
}

fn pump_lines<R>(
    stream: R,
    label: &'static str,
    owner: String,
    last_line: LastLine,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        // Split on raw bytes so non-UTF-8 output never stops the drain.
        let mut lines = BufReader::new(stream).split(b'\n');
        loop {
            match lines.next_segment().await {
                Ok(Some(raw)) => {
                    let line = decode_line(&raw);
                    info!(owner = %owner, "{label}: {line}");
                    last_line.record(&line);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(owner = %owner, error = %e, "{label} closed");
                    break;
                }
            }
        }
    })
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn feed_stdin(mut stdin: ChildStdin, owner: String) -> mpsc::UnboundedSender<String> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if let Err(e) = stdin.write_all(chunk.as_bytes()).await {
                debug!(owner = %owner, error = %e, "stdin closed");
                break;
            }
            let _ = stdin.flush().await;
        }
    });
    tx
}

fn exit_reason(status: ExitStatus) -> ExitReason {
    if let Some(code) = status.code() {
        return ExitReason::Code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitReason::Signal(super::kill::signal_name(signal));
        }
    }
    ExitReason::Code(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_line_ignores_blank_lines() {
        let last = LastLine::default();
        last.record("  first  ");
        last.record("   ");
        assert_eq!(last.get(), "first");
        last.record("second");
        assert_eq!(last.get(), "second");
    }

    #[test]
    fn decode_line_is_lossy_and_strips_carriage_return() {
        assert_eq!(decode_line(b"plain\r"), "plain");
        assert_eq!(decode_line(b"bad \xff byte"), "bad \u{FFFD} byte");
    }
}
