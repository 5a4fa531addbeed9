// src/supervisor/runtime.rs

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::config::Project;
use crate::exec::{
    CommandRunner, CommandSpec, Completion, ProcessControl, RunningCommand, Severity,
};
use crate::fs::FileSystem;
use crate::provision::{Provisioner, Stage};
use crate::types::{ProjectStatus, Report};

use super::sink::ReportSink;
use super::state::{DETAIL_SPAWN_FAILED, SupervisorState};

/// Boxed future returned by [`Supervisor::start`].
pub type StartFuture = Pin<Box<dyn Future<Output = bool> + Send + 'static>>;

type State = SupervisorState<Box<dyn ProcessControl>>;

/// Shared collaborators every supervisor needs.
#[derive(Clone)]
pub struct SupervisorDeps {
    pub runner: Arc<dyn CommandRunner>,
    pub fs: Arc<dyn FileSystem>,
    pub sink: Arc<dyn ReportSink>,
}

/// Owns one project's process lifecycle.
///
/// All operations lock the state only briefly and never across an await;
/// the `busy` flag inside the state is what serialises transitions.
pub struct Supervisor {
    project: Project,
    workspace: PathBuf,
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
    provisioner: Provisioner,
    sink: Arc<dyn ReportSink>,
    state: Mutex<State>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Supervisor")
            .field("name", &self.project.name)
            .field("status", &state.status())
            .field("detail", &state.detail())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(project: Project, workspace: impl Into<PathBuf>, deps: SupervisorDeps) -> Arc<Self> {
        let provisioner = Provisioner::new(Arc::clone(&deps.runner), Arc::clone(&deps.fs));
        Arc::new(Self {
            project,
            workspace: workspace.into(),
            runner: deps.runner,
            fs: deps.fs,
            provisioner,
            sink: deps.sink,
            state: Mutex::new(SupervisorState::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.project.name
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// `<workspace>/<name>`.
    pub fn project_path(&self) -> PathBuf {
        self.workspace.join(&self.project.name)
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn status(&self) -> ProjectStatus {
        self.lock().status()
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().is_stopped()
    }

    /// Current `{name, status, detail}`.
    pub fn report(&self) -> Report {
        self.build_report(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_report(&self, state: &State) -> Report {
        Report {
            name: self.project.name.clone(),
            status: state.status(),
            detail: state.detail().to_string(),
        }
    }

    /// Emit a report for `state`; callers still hold the lock, which keeps
    /// reports in the same order as the changes they describe.
    fn emit(&self, state: &State) {
        self.sink.report(self.build_report(state));
    }

    /// Provision and launch the project.
    ///
    /// Resolves to `false` without doing anything unless the project is
    /// stopped. Provisioning and spawn failures are recorded as `failed` and
    /// reported; they also resolve to `false`.
    pub fn start(self: &Arc<Self>) -> StartFuture {
        Box::pin(Arc::clone(self).run_start())
    }

    async fn run_start(self: Arc<Self>) -> bool {
        {
            let mut state = self.lock();
            if !state.begin_start() {
                debug!(project = %self.name(), status = %state.status(), "start ignored; not stopped");
                return false;
            }
            self.emit(&state);
        }

        let progress = |stage: Stage| {
            let mut state = self.lock();
            state.set_detail(stage.to_string());
            self.emit(&state);
        };
        let provisioned = self
            .provisioner
            .provision(&self.project, &self.workspace, progress)
            .await;

        let path = match provisioned {
            Ok(path) => path,
            Err(err) => {
                warn!(project = %self.name(), error = %err, "provisioning failed");
                let mut state = self.lock();
                state.start_failed(err.to_string());
                self.emit(&state);
                return false;
            }
        };

        let spec = CommandSpec::new(&self.project.start, &path, &self.project.name)
            .with_env(&self.project.env);
        let RunningCommand { control, completion } = match self.runner.spawn(spec) {
            Ok(running) => running,
            Err(err) => {
                warn!(project = %self.name(), error = %err, "start command failed to spawn");
                let mut state = self.lock();
                state.start_failed(DETAIL_SPAWN_FAILED);
                self.emit(&state);
                return false;
            }
        };

        {
            let mut state = self.lock();
            state.attach(control);
            self.emit(&state);
        }
        info!(project = %self.name(), "running");

        self.watch_exit(completion);
        true
    }

    /// The stop handler: runs exactly once per launched process.
    fn watch_exit(self: &Arc<Self>, completion: Completion) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = completion.await;
            let restart = {
                let mut state = this.lock();
                let (_runtime, restart) = state.finish_run(outcome);
                this.emit(&state);
                restart
            };
            info!(project = %this.name(), status = %this.status(), "process finished");
            if restart {
                info!(project = %this.name(), "restart requested; starting again");
                this.start().await;
            }
        });
    }

    /// Signal the running process. Forced stops may escalate a graceful stop
    /// already in flight; graceful stops are refused while busy.
    pub fn stop(&self, force: bool) -> bool {
        let severity = if force { Severity::Forced } else { Severity::Graceful };
        let mut state = self.lock();
        let Some(control) = state.begin_stop(severity) else {
            debug!(project = %self.name(), ?severity, "stop ignored");
            return false;
        };
        if let Err(err) = control.terminate(severity) {
            warn!(project = %self.name(), error = %err, ?severity, "could not signal process");
        }
        self.emit(&state);
        true
    }

    pub fn kill(&self) -> bool {
        self.stop(true)
    }

    /// Stop gracefully and start again once the process has exited.
    ///
    /// Does nothing for a project that is already stopped.
    pub fn restart(&self) -> bool {
        if !self.lock().request_restart() {
            debug!(project = %self.name(), "restart ignored; already stopped");
            return false;
        }
        self.stop(false)
    }

    /// Delete the working copy. Only allowed while stopped; deletion errors
    /// are logged, not reported.
    pub async fn eradicate(&self) -> bool {
        if !self.lock().begin_eradicate() {
            debug!(project = %self.name(), "eradicate ignored; not stopped");
            return false;
        }

        let fs = Arc::clone(&self.fs);
        let path = self.project_path();
        info!(project = %self.name(), path = %path.display(), "eradicating working copy");
        match tokio::task::spawn_blocking(move || fs.remove_dir_all(&path)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(project = %self.name(), error = %e, "could not remove working copy"),
            Err(e) => warn!(project = %self.name(), error = %e, "removal task failed"),
        }

        let mut state = self.lock();
        state.finish_eradicate();
        self.emit(&state);
        true
    }

    /// Write a line to the running process's stdin.
    pub fn send_line(&self, line: &str) -> bool {
        let mut state = self.lock();
        let Some(control) = state.runtime_mut() else {
            return false;
        };
        match control.write_line(line) {
            Ok(()) => true,
            Err(err) => {
                warn!(project = %self.name(), error = %err, "could not write to stdin");
                false
            }
        }
    }
}
