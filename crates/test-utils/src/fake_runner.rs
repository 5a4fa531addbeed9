use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use harbormaster::exec::{
    CommandRunner, CommandSpec, Completion, ExecError, ExitOutcome, ExitReason, ProcessControl,
    RunningCommand, Severity,
};
use harbormaster::fs::mock::MockFileSystem;
use tokio::sync::oneshot;

/// How a fake process behaves once spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Finish immediately with `code`, having printed `line`.
    Exit { code: i32, line: String },
    /// The runner refuses to spawn it.
    FailToSpawn,
    /// Stay up until signalled or finished by the test; any signal ends it.
    Hold,
    /// Like `Hold`, but ignores graceful termination.
    Stubborn,
}

impl Script {
    pub fn exit(code: i32, line: &str) -> Self {
        Script::Exit {
            code,
            line: line.to_string(),
        }
    }
}

struct Live {
    cmd: String,
    script: Script,
    tx: oneshot::Sender<ExitOutcome>,
}

#[derive(Default)]
struct Inner {
    rules: Vec<(String, Script)>,
    spawned: Vec<CommandSpec>,
    signals: Vec<(String, Severity)>,
    stdin: Vec<(String, String)>,
    live: HashMap<usize, Live>,
    next_id: usize,
    clones_into: Option<MockFileSystem>,
}

/// A fake [`CommandRunner`] that:
/// - records every spawned command, signal and stdin line
/// - answers each command by the first rule whose prefix matches it
///   (unmatched commands exit 0 with no output).
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `script`.
    pub fn on(self, prefix: &str, script: Script) -> Self {
        self.lock().rules.push((prefix.to_string(), script));
        self
    }

    /// Make successful `git clone` commands create their target directory
    /// in `fs`, like the real thing would.
    pub fn cloning_into(self, fs: MockFileSystem) -> Self {
        self.lock().clones_into = Some(fs);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn spawned(&self) -> Vec<CommandSpec> {
        self.lock().spawned.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock().spawned.iter().map(|s| s.cmd.clone()).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lock()
            .spawned
            .iter()
            .filter(|s| s.cmd.starts_with(prefix))
            .count()
    }

    pub fn signals(&self) -> Vec<(String, Severity)> {
        self.lock().signals.clone()
    }

    pub fn stdin_lines(&self) -> Vec<(String, String)> {
        self.lock().stdin.clone()
    }

    /// Number of spawned processes that have not finished.
    pub fn live(&self) -> usize {
        self.lock().live.len()
    }

    /// End the oldest live process whose command starts with `prefix`.
    pub fn finish(&self, prefix: &str, reason: ExitReason, line: &str) -> bool {
        let mut inner = self.lock();
        let id = inner
            .live
            .iter()
            .filter(|(_, l)| l.cmd.starts_with(prefix))
            .map(|(id, _)| *id)
            .min();
        match id.and_then(|id| inner.live.remove(&id)) {
            Some(live) => {
                let _ = live.tx.send(ExitOutcome {
                    reason,
                    last_line: line.to_string(),
                });
                true
            }
            None => false,
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn spawn(&self, spec: CommandSpec) -> Result<RunningCommand, ExecError> {
        let mut inner = self.lock();
        inner.spawned.push(spec.clone());

        let script = inner
            .rules
            .iter()
            .find(|(prefix, _)| spec.cmd.starts_with(prefix.as_str()))
            .map(|(_, s)| s.clone())
            .unwrap_or(Script::exit(0, ""));

        let (tx, completion) = Completion::channel();
        inner.next_id += 1;
        let id = inner.next_id;

        match script {
            Script::FailToSpawn => {
                return Err(ExecError::Spawn {
                    cmd: spec.cmd,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
                });
            }
            Script::Exit { code, line } => {
                if code == 0 && spec.cmd.starts_with("git clone") {
                    if let (Some(fs), Some(target)) =
                        (&inner.clones_into, spec.cmd.split_whitespace().last())
                    {
                        fs.add_dir(spec.cwd.join(target));
                    }
                }
                let _ = tx.send(ExitOutcome {
                    reason: ExitReason::Code(code),
                    last_line: line,
                });
            }
            script @ (Script::Hold | Script::Stubborn) => {
                inner.live.insert(
                    id,
                    Live {
                        cmd: spec.cmd.clone(),
                        script,
                        tx,
                    },
                );
            }
        }

        let control = FakeProcess {
            id,
            cmd: spec.cmd,
            inner: Arc::clone(&self.inner),
        };
        Ok(RunningCommand::new(Box::new(control), completion))
    }
}

struct FakeProcess {
    id: usize,
    cmd: String,
    inner: Arc<Mutex<Inner>>,
}

impl ProcessControl for FakeProcess {
    fn write_line(&mut self, line: &str) -> Result<(), ExecError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.live.contains_key(&self.id) {
            return Err(ExecError::NotRunning);
        }
        inner.stdin.push((self.cmd.clone(), line.to_string()));
        Ok(())
    }

    fn terminate(&mut self, severity: Severity) -> Result<(), ExecError> {
        let mut inner = self.inner.lock().unwrap();
        inner.signals.push((self.cmd.clone(), severity));

        let ends = match inner.live.get(&self.id) {
            None => return Err(ExecError::NotRunning),
            Some(live) => live.script == Script::Hold || severity == Severity::Forced,
        };
        if ends {
            if let Some(live) = inner.live.remove(&self.id) {
                let signal = match severity {
                    Severity::Graceful => "SIGTERM",
                    Severity::Forced => "SIGKILL",
                };
                let _ = live.tx.send(ExitOutcome {
                    reason: ExitReason::Signal(signal.to_string()),
                    last_line: String::new(),
                });
            }
        }
        Ok(())
    }
}
