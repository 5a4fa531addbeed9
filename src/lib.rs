// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod gateway;
pub mod logging;
pub mod provision;
pub mod proxy;
pub mod server;
pub mod supervisor;
pub mod types;

use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{
    HostConfig, Project, load_and_validate, load_password_hash, load_projects, prepare_workspace,
};
use crate::exec::ShellRunner;
use crate::fs::{FileSystem, RealFileSystem};
use crate::gateway::{Gateway, GatewayOptions, hub_channel};
use crate::proxy::ProxyTable;
use crate::server::AppState;
use crate::supervisor::{Supervisor, SupervisorDeps};

/// How long Ctrl-C waits for graceful stops before killing what is left.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config + project list loading
/// - one supervisor per project, reporting into the gateway hub
/// - the HTTP listener (gateway + optional proxy)
/// - autostart and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    if args.hash_password {
        return print_password_hash();
    }

    let cfg = load_and_validate(&args.config)?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    prepare_workspace(fs.as_ref(), &cfg)?;
    let projects = load_projects(fs.as_ref(), &cfg.workspace)?;
    info!(count = projects.len(), "loaded projects");

    let proxy = if cfg.proxy {
        ProxyTable::from_projects(&projects)
    } else {
        ProxyTable::disabled()
    };

    if args.dry_run {
        print_dry_run(&cfg, &projects, &proxy);
        return Ok(());
    }

    let password_hash = load_password_hash(fs.as_ref(), &cfg)?;

    let (hub, hub_rx) = hub_channel();
    let deps = SupervisorDeps {
        runner: Arc::new(ShellRunner),
        fs,
        sink: Arc::new(hub.clone()),
    };
    let supervisors: Vec<Arc<Supervisor>> = projects
        .into_iter()
        .map(|project| Supervisor::new(project, cfg.workspace.clone(), deps.clone()))
        .collect();

    let gateway = Gateway::new(
        supervisors.clone(),
        password_hash,
        hub,
        hub_rx,
        GatewayOptions::default(),
    );
    let app = server::router(AppState::new(gateway, proxy)?);

    if cfg.autostart && !args.no_autostart {
        info!("autostarting every project");
        for supervisor in &supervisors {
            tokio::spawn(supervisor.start());
        }
    }

    let shutdown = {
        let supervisors = supervisors.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("Ctrl+C received; stopping projects");
            stop_all(&supervisors, SHUTDOWN_GRACE).await;
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    server::serve(app, addr, cfg.tls.as_ref(), shutdown).await
}

/// Gracefully stop every supervisor, then kill whatever is still up once
/// `grace` has passed.
pub async fn stop_all(supervisors: &[Arc<Supervisor>], grace: Duration) {
    for supervisor in supervisors {
        supervisor.stop(false);
    }

    let all_stopped = || supervisors.iter().all(|s| s.is_stopped());
    let deadline = tokio::time::Instant::now() + grace;
    while !all_stopped() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    for supervisor in supervisors.iter().filter(|s| !s.is_stopped()) {
        warn!(project = %supervisor.name(), "still running after grace period; killing");
        supervisor.kill();
    }
}

/// `--hash-password`: read one line from stdin and print its bcrypt hash.
fn print_password_hash() -> Result<()> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("refusing to hash an empty password");
    }
    let hash = gateway::auth::hash_password(password).context("hashing password")?;
    println!("{hash}");
    Ok(())
}

/// Simple dry-run output: host settings, projects and proxy routes.
fn print_dry_run(cfg: &HostConfig, projects: &[Project], proxy: &ProxyTable) {
    println!("harbormaster dry-run");
    println!("  port = {}", cfg.port);
    println!("  workspace = {}", cfg.workspace.display());
    println!("  autostart = {}", cfg.autostart);
    println!("  proxy = {}", cfg.proxy);
    println!("  tls = {}", cfg.tls.is_some());
    println!();

    println!("projects ({}):", projects.len());
    for project in projects {
        println!("  - {}", project.name);
        println!("      repo: {}", project.repo);
        if let Some(install) = project.install_cmd() {
            println!("      install: {install}");
        }
        if let Some(build) = project.build_cmd() {
            println!("      build: {build}");
        }
        println!("      start: {}", project.start);
        if !project.env.is_empty() {
            let keys: Vec<&str> = project.env.keys().map(String::as_str).collect();
            println!("      env: {keys:?}");
        }
    }

    if !proxy.is_empty() {
        println!();
        println!("proxy routes ({}):", proxy.len());
        let mut routes: Vec<_> = proxy.iter().collect();
        routes.sort();
        for (host, port) in routes {
            println!("  {host} -> localhost:{port}");
        }
    }

    debug!("dry-run complete (nothing started)");
}
