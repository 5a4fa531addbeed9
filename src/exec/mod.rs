// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running shell commands, using
//! `tokio::process::Command`, and handing back a [`RunningCommand`]: a live
//! control surface (stdin / signals) plus a one-shot [`Completion`].
//!
//! - [`process`] spawns the shell, pumps its output and resolves completion.
//! - [`kill`] terminates whole process trees and names signals.
//! - [`runner`] provides the `CommandRunner` trait and the production
//!   `ShellRunner`; tests swap in a scripted implementation.

pub mod kill;
pub mod process;
pub mod runner;

use std::fmt;
use std::io;

use thiserror::Error;

pub use process::{Completion, ProcessControl, RunningCommand, spawn_shell};
pub use runner::{CommandRunner, CommandSpec, ShellRunner, run_to_end};

/// Errors from spawning or controlling a child process.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The OS refused to create the process; there is no exit code.
    #[error("could not execute `{cmd}`: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("process is no longer running")]
    NotRunning,

    #[error("could not signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Code(i32),
    /// Terminated by a signal, e.g. `"SIGTERM"`.
    Signal(String),
}

impl ExitReason {
    pub fn success(&self) -> bool {
        matches!(self, ExitReason::Code(0))
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Code(code) => write!(f, "{code}"),
            ExitReason::Signal(name) => f.write_str(name),
        }
    }
}

/// What a finished command resolves to: how it ended plus the last
/// non-empty line it printed on stdout or stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOutcome {
    pub reason: ExitReason,
    pub last_line: String,
}

/// Termination severity: SIGTERM vs SIGKILL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Graceful,
    Forced,
}
