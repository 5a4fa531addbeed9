// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One managed project, as listed in `<workspace>/data.json`.
///
/// ```json
/// {
///   "name": "sample1",
///   "repo": "https://github.com/hbtz-dev/demo-server",
///   "install": "npm install",
///   "build": "npm run build",
///   "start": "npm run start",
///   "env": { "PORT": "8000" },
///   "proxy": { "fromHost": "127.0.0.2:8080", "toPort": 8000 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique key; also the directory name under the workspace root.
    pub name: String,

    /// Anything `git clone` accepts.
    pub repo: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,

    pub start: String,

    /// Overrides merged over the ambient environment for install, build
    /// and start.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyRule>,
}

impl Project {
    /// Configured install command, ignoring blank strings.
    pub fn install_cmd(&self) -> Option<&str> {
        non_blank(self.install.as_deref())
    }

    /// Configured build command, ignoring blank strings.
    pub fn build_cmd(&self) -> Option<&str> {
        non_blank(self.build.as_deref())
    }
}

fn non_blank(cmd: Option<&str>) -> Option<&str> {
    cmd.filter(|c| !c.trim().is_empty())
}

/// Route requests whose `Host` header equals `from_host` to
/// `http://localhost:<to_port>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRule {
    pub from_host: String,
    pub to_port: u16,
}

/// Host configuration as read from `Harbor.toml`.
///
/// ```toml
/// port = 8080
/// proxy = true
/// workspace = "./workspace"
/// autostart = true
///
/// [tls]
/// cert = "dummy/cert.pem"
/// key = "dummy/cert.key"
/// ```
///
/// All keys are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawHostConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable Host-header based reverse proxying.
    #[serde(default)]
    pub proxy: bool,

    /// Root directory holding `data.json`, `.passhash` and every working copy.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Start every project right after boot.
    #[serde(default)]
    pub autostart: bool,

    /// Where the bcrypt password hash lives; defaults to `<workspace>/.passhash`.
    #[serde(default)]
    pub password_hash: Option<PathBuf>,

    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_port() -> u16 {
    8080
}

fn default_workspace() -> PathBuf {
    PathBuf::from("./workspace")
}

impl Default for RawHostConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            proxy: false,
            workspace: default_workspace(),
            autostart: false,
            password_hash: None,
            tls: None,
        }
    }
}

/// PEM certificate chain and private key paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Validated host configuration.
///
/// Only constructible through `TryFrom<RawHostConfig>` (see
/// [`crate::config::validate`]).
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub port: u16,
    pub proxy: bool,
    pub workspace: PathBuf,
    pub autostart: bool,
    pub password_hash: PathBuf,
    pub tls: Option<TlsConfig>,
}

impl HostConfig {
    pub(crate) fn new_unchecked(raw: RawHostConfig) -> Self {
        let password_hash = raw
            .password_hash
            .unwrap_or_else(|| raw.workspace.join(".passhash"));
        Self {
            port: raw.port,
            proxy: raw.proxy,
            workspace: raw.workspace,
            autostart: raw.autostart,
            password_hash,
            tls: raw.tls,
        }
    }
}
