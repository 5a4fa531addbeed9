// src/exec/runner.rs

//! Pluggable command runner abstraction.
//!
//! Provisioning and supervision talk to a `CommandRunner` instead of
//! spawning processes directly. Production code uses [`ShellRunner`]; tests
//! provide a runner that records commands and resolves them on demand.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::process::{RunningCommand, spawn_shell};
use super::{ExecError, ExitOutcome};

/// Everything needed to launch one shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub cmd: String,
    pub cwd: PathBuf,
    /// Merged over the ambient environment.
    pub env: BTreeMap<String, String>,
    /// Logical owner used to tag log output (the project name).
    pub owner: String,
}

impl CommandSpec {
    pub fn new(cmd: impl Into<String>, cwd: impl Into<PathBuf>, owner: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            owner: owner.into(),
        }
    }

    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Trait abstracting how commands are launched.
pub trait CommandRunner: Send + Sync {
    /// Launch `spec`; an `Err` means no process exists at all.
    fn spawn(&self, spec: CommandSpec) -> Result<RunningCommand, ExecError>;
}

/// Real runner used in production: `sh -c` (or `cmd /C`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn spawn(&self, spec: CommandSpec) -> Result<RunningCommand, ExecError> {
        spawn_shell(spec)
    }
}

/// Spawn `spec` and wait for it to finish.
pub async fn run_to_end(
    runner: &dyn CommandRunner,
    spec: CommandSpec,
) -> Result<ExitOutcome, ExecError> {
    let running = runner.spawn(spec)?;
    Ok(running.wait().await)
}
