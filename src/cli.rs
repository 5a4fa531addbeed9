// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `harbormaster`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "harbormaster",
    version,
    about = "Provision, run and remotely control git-backed projects.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the host config file (TOML).
    ///
    /// Default: `Harbor.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Harbor.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HARBOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate config + project list, print them, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not start projects at boot, even if `autostart = true`.
    #[arg(long)]
    pub no_autostart: bool,

    /// Read a password from stdin, print its bcrypt hash and exit.
    #[arg(long)]
    pub hash_password: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
