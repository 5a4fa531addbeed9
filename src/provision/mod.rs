// src/provision/mod.rs

//! Preparing a project's working copy: clone or update, then install and
//! build.
//!
//! The pipeline itself lives in [`pipeline`]; this module holds its error
//! taxonomy and progress stages.

pub mod pipeline;

use std::fmt;

use thiserror::Error;

use crate::exec::{ExecError, ExitOutcome};

pub use pipeline::{Provisioner, UP_TO_DATE_MARKER};

/// Progress signal emitted as the pipeline enters each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Updating,
    Cloning,
    Installing,
    Building,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Updating => "updating...",
            Stage::Cloning => "cloning...",
            Stage::Installing => "installing...",
            Stage::Building => "building...",
        })
    }
}

/// Why one pipeline step did not succeed.
#[derive(Debug)]
pub enum StepFailure {
    /// The command could not be spawned.
    NotExecuted(ExecError),
    /// The command ran and exited unsuccessfully.
    Exited(ExitOutcome),
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFailure::NotExecuted(err) => write!(f, "could not execute ({err})"),
            StepFailure::Exited(outcome) => write!(f, "{} {}", outcome.reason, outcome.last_line),
        }
    }
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    /// `git pull` could not even be spawned.
    #[error("git pull err: could not execute ({0})")]
    Execution(#[source] ExecError),

    #[error("git clone err: {0}")]
    Clone(StepFailure),

    #[error("install err: {0}")]
    Install(StepFailure),

    #[error("build err: {0}")]
    Build(StepFailure),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExitReason;

    #[test]
    fn errors_render_code_and_output() {
        let err = ProvisionError::Install(StepFailure::Exited(ExitOutcome {
            reason: ExitReason::Code(1),
            last_line: "npm ERR! missing script: build".to_string(),
        }));
        assert_eq!(err.to_string(), "install err: 1 npm ERR! missing script: build");

        let err = ProvisionError::Clone(StepFailure::Exited(ExitOutcome {
            reason: ExitReason::Signal("SIGKILL".to_string()),
            last_line: String::new(),
        }));
        assert_eq!(err.to_string(), "git clone err: SIGKILL ");
    }
}
