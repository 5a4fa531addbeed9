use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally visible state of one project, derived from its supervisor's
/// flags (see [`crate::supervisor::derive_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Running,
    Stopping,
    Starting,
    /// Last run exited with code 0 (or never ran).
    Terminated,
    /// Last run exited with a non-zero code.
    Crashed,
    /// Provisioning or launching failed before a process existed.
    Failed,
    /// Last run was ended by a signal.
    Killed,
}

impl ProjectStatus {
    /// Terminal states, from which `start` is allowed.
    pub fn is_stopped(self) -> bool {
        matches!(
            self,
            ProjectStatus::Terminated
                | ProjectStatus::Crashed
                | ProjectStatus::Failed
                | ProjectStatus::Killed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Running => "running",
            ProjectStatus::Stopping => "stopping",
            ProjectStatus::Starting => "starting",
            ProjectStatus::Terminated => "terminated",
            ProjectStatus::Crashed => "crashed",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Killed => "killed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{name, status, detail}` snapshot pushed to authenticated sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub name: String,
    pub status: ProjectStatus,
    pub detail: String,
}
