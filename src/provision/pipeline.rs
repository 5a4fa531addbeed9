// src/provision/pipeline.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Project;
use crate::exec::{CommandRunner, CommandSpec, ExitOutcome, run_to_end};
use crate::fs::FileSystem;

use super::{ProvisionError, Stage, StepFailure};

/// Output of `git pull` when there is nothing new; install/build are then
/// skipped.
pub const UP_TO_DATE_MARKER: &str = "Already up to date.";

/// Clone/update + install + build pipeline.
///
/// Cheap to clone; shares the runner and filesystem.
#[derive(Clone)]
pub struct Provisioner {
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
}

impl Provisioner {
    pub fn new(runner: Arc<dyn CommandRunner>, fs: Arc<dyn FileSystem>) -> Self {
        Self { runner, fs }
    }

    /// Make sure `<workspace>/<project.name>` holds an up-to-date, installed
    /// and built working copy, and return its path.
    ///
    /// - An existing copy is `git pull`ed. If the pull fails the copy is
    ///   deleted and cloned afresh; if it reports "Already up to date." the
    ///   install and build steps are skipped.
    /// - A missing copy is cloned into the workspace.
    /// - Install and build (when configured) run inside the copy with the
    ///   project's environment overrides.
    ///
    /// `progress` is called synchronously as each stage begins.
    pub async fn provision<F>(
        &self,
        project: &Project,
        workspace: &Path,
        progress: F,
    ) -> Result<PathBuf, ProvisionError>
    where
        F: Fn(Stage) + Send + Sync,
    {
        let name = project.name.as_str();
        let project_path = workspace.join(name);
        let mut needs_clone = !self.fs.is_dir(&project_path);
        let mut needs_install = true;

        if !needs_clone {
            progress(Stage::Updating);
            info!(project = %name, "checking for updates");
            let pull = run_to_end(
                self.runner.as_ref(),
                CommandSpec::new("git pull", &project_path, name),
            )
            .await
            .map_err(ProvisionError::Execution)?;

            if !pull.reason.success() {
                warn!(project = %name, exit = %pull.reason, "git pull failed; destroying working copy and recloning");
                self.remove_best_effort(&project_path).await;
                needs_clone = true;
            } else if pull.last_line.contains(UP_TO_DATE_MARKER) {
                info!(project = %name, "up to date; skipping install and build");
                needs_install = false;
            } else {
                info!(project = %name, "updated");
            }
        }

        if needs_clone {
            progress(Stage::Cloning);
            info!(project = %name, repo = %project.repo, "cloning");
            let clone = CommandSpec::new(format!("git clone {} {}", project.repo, name), workspace, name);
            self.run_step(clone).await.map_err(ProvisionError::Clone)?;
        }

        if needs_install {
            if let Some(install) = project.install_cmd() {
                progress(Stage::Installing);
                info!(project = %name, "installing");
                let spec = CommandSpec::new(install, &project_path, name).with_env(&project.env);
                self.run_step(spec).await.map_err(ProvisionError::Install)?;
            }
            if let Some(build) = project.build_cmd() {
                progress(Stage::Building);
                info!(project = %name, "building");
                let spec = CommandSpec::new(build, &project_path, name).with_env(&project.env);
                self.run_step(spec).await.map_err(ProvisionError::Build)?;
            }
        }

        info!(project = %name, path = %project_path.display(), "project is ready");
        Ok(project_path)
    }

    /// Run one step to completion; anything but exit code 0 is a failure.
    async fn run_step(&self, spec: CommandSpec) -> Result<ExitOutcome, StepFailure> {
        let outcome = run_to_end(self.runner.as_ref(), spec)
            .await
            .map_err(StepFailure::NotExecuted)?;
        if outcome.reason.success() {
            Ok(outcome)
        } else {
            Err(StepFailure::Exited(outcome))
        }
    }

    async fn remove_best_effort(&self, path: &Path) {
        let fs = Arc::clone(&self.fs);
        let target = path.to_path_buf();
        match tokio::task::spawn_blocking(move || fs.remove_dir_all(&target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "could not remove working copy"),
            Err(e) => warn!(path = %path.display(), error = %e, "removal task failed"),
        }
    }
}
