#![allow(dead_code)]

pub use harbormaster_test_utils::{RecordingSink, builders, fake_runner, init_tracing, wait_until, with_timeout};

use std::sync::Arc;

use harbormaster::config::Project;
use harbormaster::fs::mock::MockFileSystem;
use harbormaster::supervisor::{Supervisor, SupervisorDeps};
use harbormaster_test_utils::fake_runner::ScriptedRunner;

pub const WORKSPACE: &str = "/ws";

/// A supervisor wired to fakes, plus handles on each fake.
pub struct Harness {
    pub runner: ScriptedRunner,
    pub fs: MockFileSystem,
    pub sink: RecordingSink,
    pub supervisor: Arc<Supervisor>,
}

/// `runner` gets its `git clone`s wired to the harness filesystem.
pub fn harness(project: Project, runner: ScriptedRunner) -> Harness {
    let fs = MockFileSystem::new();
    let runner = runner.cloning_into(fs.clone());
    let sink = RecordingSink::new();
    let deps = SupervisorDeps {
        runner: Arc::new(runner.clone()),
        fs: Arc::new(fs.clone()),
        sink: Arc::new(sink.clone()),
    };
    let supervisor = Supervisor::new(project, WORKSPACE, deps);
    Harness {
        runner,
        fs,
        sink,
        supervisor,
    }
}

/// Password every [`spawn_app`] gateway accepts.
pub const PASSWORD: &str = "hunter22";

/// A live listener on an ephemeral port, serving gateway and proxy.
pub struct TestApp {
    pub addr: std::net::SocketAddr,
    pub gateway: Arc<harbormaster::gateway::Gateway>,
    pub runner: ScriptedRunner,
}

pub async fn spawn_app(
    projects: Vec<Project>,
    runner: ScriptedRunner,
    proxy: harbormaster::proxy::ProxyTable,
    options: harbormaster::gateway::GatewayOptions,
) -> TestApp {
    // Minimum cost keeps the tests fast.
    spawn_app_with_cost(projects, runner, proxy, options, 4).await
}

/// Like [`spawn_app`], hashing [`PASSWORD`] at the given bcrypt cost.
pub async fn spawn_app_with_cost(
    projects: Vec<Project>,
    runner: ScriptedRunner,
    proxy: harbormaster::proxy::ProxyTable,
    options: harbormaster::gateway::GatewayOptions,
    cost: u32,
) -> TestApp {
    use harbormaster::gateway::{Gateway, hub_channel};
    use harbormaster::server::{AppState, router};

    init_tracing();
    let fs = MockFileSystem::new();
    let runner = runner.cloning_into(fs.clone());
    let (hub, hub_rx) = hub_channel();
    let deps = SupervisorDeps {
        runner: Arc::new(runner.clone()),
        fs: Arc::new(fs),
        sink: Arc::new(hub.clone()),
    };
    let supervisors = projects
        .into_iter()
        .map(|p| Supervisor::new(p, WORKSPACE, deps.clone()))
        .collect();
    let hash = bcrypt::hash(PASSWORD, cost).unwrap();
    let gateway = Gateway::new(supervisors, hash, hub, hub_rx, options);

    let app = router(AppState::new(Arc::clone(&gateway), proxy).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    TestApp {
        addr,
        gateway,
        runner,
    }
}
