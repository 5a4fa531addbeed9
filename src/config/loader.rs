// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::model::{HostConfig, Project, RawHostConfig};
use crate::config::validate::validate_projects;
use crate::errors::{HarborError, Result};
use crate::fs::FileSystem;

/// Name of the project list inside the workspace root.
pub const PROJECTS_FILE: &str = "data.json";

/// Load a host configuration file and return the raw `RawHostConfig`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// the checked version.
pub fn load_host_config(path: impl AsRef<Path>) -> Result<RawHostConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        HarborError::ConfigError(format!("could not read {}: {e}", path.display()))
    })?;

    let config: RawHostConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load the host configuration from `path` and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<HostConfig> {
    let raw = load_host_config(path)?;
    HostConfig::try_from(raw)
}

/// Make sure the workspace root exists.
pub fn prepare_workspace(fs: &dyn FileSystem, cfg: &HostConfig) -> Result<()> {
    if !fs.is_dir(&cfg.workspace) {
        info!(workspace = %cfg.workspace.display(), "creating workspace folder");
        fs.create_dir_all(&cfg.workspace)?;
    }
    Ok(())
}

/// Read `<workspace>/data.json` (writing `[]` there if it is missing) and
/// validate the project list.
pub fn load_projects(fs: &dyn FileSystem, workspace: &Path) -> Result<Vec<Project>> {
    let path = workspace.join(PROJECTS_FILE);
    let json = fs.read_or_write_default(&path, "[]")?;
    let projects: Vec<Project> = serde_json::from_str(&json)?;
    validate_projects(&projects)?;
    Ok(projects)
}

/// Read the bcrypt hash the gateway authenticates against.
pub fn load_password_hash(fs: &dyn FileSystem, cfg: &HostConfig) -> Result<String> {
    if !fs.exists(&cfg.password_hash) {
        return Err(HarborError::ConfigError(format!(
            "no password hash at {}; create one with `harbormaster --hash-password > {}`",
            cfg.password_hash.display(),
            cfg.password_hash.display()
        )));
    }
    let hash = fs.read_to_string(&cfg.password_hash).map_err(|e| {
        HarborError::ConfigError(format!(
            "could not read password hash {}: {e}; create it with --hash-password",
            cfg.password_hash.display()
        ))
    })?;
    let hash = hash.trim();
    if hash.is_empty() {
        return Err(HarborError::ConfigError(format!(
            "password hash file {} is empty",
            cfg.password_hash.display()
        )));
    }
    Ok(hash.to_string())
}
