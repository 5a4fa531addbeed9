// src/supervisor/state.rs

//! Pure supervisor state machine.
//!
//! Status is never stored. It is computed by [`derive_status`] from three
//! facts: whether a runtime handle exists, whether a transition is in
//! flight (`busy`), and how the last run ended. `SupervisorState` owns those
//! facts and the transitions between them. It is generic over the runtime
//! handle so the core can be tested with a unit placeholder.

use std::fmt;

use crate::exec::{ExitOutcome, ExitReason, Severity};
use crate::types::ProjectStatus;

/// How the most recent run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Exited(i32),
    Signaled(String),
    /// Provisioning failed or the start command could not be launched.
    Failed,
}

impl From<ExitReason> for RunResult {
    fn from(reason: ExitReason) -> Self {
        match reason {
            ExitReason::Code(code) => RunResult::Exited(code),
            ExitReason::Signal(name) => RunResult::Signaled(name),
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunResult::Exited(code) => write!(f, "{code}"),
            RunResult::Signaled(name) => f.write_str(name),
            RunResult::Failed => f.write_str("failed"),
        }
    }
}

/// Map `(has_runtime, busy, last_result)` to exactly one status.
pub fn derive_status(has_runtime: bool, busy: bool, last: &RunResult) -> ProjectStatus {
    match (has_runtime, busy, last) {
        (true, false, _) => ProjectStatus::Running,
        (true, true, _) => ProjectStatus::Stopping,
        (false, true, _) => ProjectStatus::Starting,
        (false, false, RunResult::Exited(0)) => ProjectStatus::Terminated,
        (false, false, RunResult::Exited(_)) => ProjectStatus::Crashed,
        (false, false, RunResult::Failed) => ProjectStatus::Failed,
        (false, false, RunResult::Signaled(_)) => ProjectStatus::Killed,
    }
}

pub const DETAIL_NOT_STARTED: &str = "not started";
pub const DETAIL_STARTING: &str = "starting...";
pub const DETAIL_RUNNING: &str = "running";
pub const DETAIL_SPAWN_FAILED: &str = "process failed to start";
pub const DETAIL_TERM_SENT: &str = "sent terminate signal, awaiting graceful shutdown";
pub const DETAIL_KILL_SENT: &str = "sent kill signal, awaiting forced shutdown";
pub const DETAIL_ERADICATED: &str = "working copy removed";

#[derive(Debug)]
pub struct SupervisorState<R> {
    runtime: Option<R>,
    busy: bool,
    last_result: RunResult,
    last_output: String,
    restart_requested: bool,
    detail: String,
}

impl<R> Default for SupervisorState<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> SupervisorState<R> {
    pub fn new() -> Self {
        Self {
            runtime: None,
            busy: false,
            last_result: RunResult::Exited(0),
            last_output: DETAIL_NOT_STARTED.to_string(),
            restart_requested: false,
            detail: DETAIL_NOT_STARTED.to_string(),
        }
    }

    pub fn status(&self) -> ProjectStatus {
        derive_status(self.runtime.is_some(), self.busy, &self.last_result)
    }

    pub fn is_stopped(&self) -> bool {
        self.status().is_stopped()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn has_runtime(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn last_result(&self) -> &RunResult {
        &self.last_result
    }

    /// Last output line (or error message) of the most recent run.
    pub fn last_output(&self) -> &str {
        &self.last_output
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Replace the detail text; empty strings are ignored.
    pub fn set_detail(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        if !detail.is_empty() {
            self.detail = detail;
        }
    }

    pub fn runtime_mut(&mut self) -> Option<&mut R> {
        self.runtime.as_mut()
    }

    /// Claim the supervisor for a start. Only allowed from a stopped state.
    pub fn begin_start(&mut self) -> bool {
        if !self.is_stopped() {
            return false;
        }
        self.busy = true;
        self.set_detail(DETAIL_STARTING);
        true
    }

    /// Provisioning or spawning failed before any process existed.
    pub fn start_failed(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        self.busy = false;
        self.restart_requested = false;
        self.last_result = RunResult::Failed;
        self.last_output = detail.clone();
        self.set_detail(detail);
    }

    /// The start command is running; keep its handle.
    pub fn attach(&mut self, runtime: R) {
        self.runtime = Some(runtime);
        self.busy = false;
        self.set_detail(DETAIL_RUNNING);
    }

    /// Begin a stop and hand back the runtime to signal.
    ///
    /// A forced stop proceeds whenever a runtime exists, escalating a
    /// graceful stop already in flight. A graceful stop is refused while any
    /// transition is outstanding.
    pub fn begin_stop(&mut self, severity: Severity) -> Option<&mut R> {
        self.runtime.as_ref()?;
        match severity {
            Severity::Forced => {
                self.busy = true;
                self.set_detail(DETAIL_KILL_SENT);
            }
            Severity::Graceful => {
                if self.busy {
                    return None;
                }
                self.busy = true;
                self.set_detail(DETAIL_TERM_SENT);
            }
        }
        self.runtime.as_mut()
    }

    /// Ask for a new start once the current run ends.
    ///
    /// Refused when already stopped: no run is left to end, so nothing
    /// would ever consume the request.
    pub fn request_restart(&mut self) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.restart_requested = true;
        true
    }

    /// The running process has exited. Returns the dropped runtime and
    /// whether a restart was requested (the request is consumed).
    pub fn finish_run(&mut self, outcome: ExitOutcome) -> (Option<R>, bool) {
        let runtime = self.runtime.take();
        self.busy = false;
        self.set_detail(format!("{} | {}", outcome.reason, outcome.last_line));
        self.last_result = outcome.reason.into();
        self.last_output = outcome.last_line;
        let restart = std::mem::take(&mut self.restart_requested);
        (runtime, restart)
    }

    /// Claim the supervisor for deleting its working copy.
    pub fn begin_eradicate(&mut self) -> bool {
        if !self.is_stopped() {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn finish_eradicate(&mut self) {
        self.busy = false;
        self.restart_requested = false;
        self.set_detail(DETAIL_ERADICATED);
    }
}
