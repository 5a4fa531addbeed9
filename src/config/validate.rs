// src/config/validate.rs

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::config::model::{HostConfig, Project, RawHostConfig};
use crate::errors::{HarborError, Result};

impl TryFrom<RawHostConfig> for HostConfig {
    type Error = HarborError;

    fn try_from(raw: RawHostConfig) -> std::result::Result<Self, Self::Error> {
        validate_host_config(&raw)?;
        Ok(HostConfig::new_unchecked(raw))
    }
}

fn validate_host_config(cfg: &RawHostConfig) -> Result<()> {
    if cfg.port == 0 {
        return Err(HarborError::ConfigError(
            "port must be between 1 and 65535 (got 0)".to_string(),
        ));
    }
    if cfg.workspace.as_os_str().is_empty() {
        return Err(HarborError::ConfigError(
            "workspace must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Check a project list for the problems that would otherwise only surface
/// at runtime: duplicate names, names that escape the workspace, missing
/// commands and clashing proxy rules.
pub fn validate_projects(projects: &[Project]) -> Result<()> {
    let mut names = HashSet::new();
    let mut hosts = HashSet::new();

    for project in projects {
        validate_name(&project.name)?;
        if !names.insert(project.name.as_str()) {
            return Err(HarborError::ConfigError(format!(
                "duplicate project name '{}'",
                project.name
            )));
        }
        if project.repo.trim().is_empty() {
            return Err(HarborError::ConfigError(format!(
                "project '{}' has an empty `repo`",
                project.name
            )));
        }
        if project.start.trim().is_empty() {
            return Err(HarborError::ConfigError(format!(
                "project '{}' has an empty `start` command",
                project.name
            )));
        }
        if let Some(rule) = &project.proxy {
            if rule.to_port == 0 {
                return Err(HarborError::ConfigError(format!(
                    "project '{}' proxies to port 0",
                    project.name
                )));
            }
            if !hosts.insert(rule.from_host.as_str()) {
                return Err(HarborError::ConfigError(format!(
                    "proxy host '{}' is claimed by more than one project",
                    rule.from_host
                )));
            }
        }
    }
    Ok(())
}

/// A name must be usable both as a single directory under the workspace and
/// as an argument to `git clone <repo> <name>`.
fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\')
        || !matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        );
    if bad {
        return Err(HarborError::ConfigError(format!(
            "invalid project name '{name}': must be a single path component without whitespace"
        )));
    }
    Ok(())
}
