// src/config/mod.rs

//! Host configuration (TOML) and the project list (JSON).
//!
//! - [`model`] holds the serde types.
//! - [`loader`] reads them from disk (through [`crate::fs::FileSystem`] for
//!   everything that lives in the workspace).
//! - [`validate`] performs the semantic checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    PROJECTS_FILE, load_and_validate, load_host_config, load_password_hash, load_projects,
    prepare_workspace,
};
pub use model::{HostConfig, Project, ProxyRule, RawHostConfig, TlsConfig};
pub use validate::validate_projects;
