// tests/provision.rs

mod common;
use crate::common::builders::ProjectBuilder;
use crate::common::fake_runner::{Script, ScriptedRunner};
use crate::common::init_tracing;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use harbormaster::fs::mock::MockFileSystem;
use harbormaster::provision::{ProvisionError, Provisioner, Stage};

type TestResult = Result<(), Box<dyn Error>>;

struct Setup {
    runner: ScriptedRunner,
    fs: MockFileSystem,
    stages: Arc<Mutex<Vec<Stage>>>,
}

impl Setup {
    fn new(runner: ScriptedRunner) -> Self {
        init_tracing();
        let fs = MockFileSystem::new();
        Self {
            runner: runner.cloning_into(fs.clone()),
            fs,
            stages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn provision(&self, project: &harbormaster::config::Project) -> Result<PathBuf, ProvisionError> {
        let provisioner = Provisioner::new(Arc::new(self.runner.clone()), Arc::new(self.fs.clone()));
        let stages = Arc::clone(&self.stages);
        provisioner
            .provision(project, Path::new("/ws"), move |stage| {
                stages.lock().unwrap().push(stage)
            })
            .await
    }

    fn stages(&self) -> Vec<Stage> {
        self.stages.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn fresh_clone_installs_and_builds_with_project_env() -> TestResult {
    let setup = Setup::new(ScriptedRunner::new());
    let project = ProjectBuilder::new("svc")
        .install("npm ci")
        .build_cmd("npm run build")
        .env("NODE_ENV", "production")
        .build();

    let path = setup.provision(&project).await?;

    assert_eq!(path, PathBuf::from("/ws/svc"));
    assert_eq!(
        setup.runner.commands(),
        vec![
            "git clone https://git.example.invalid/svc.git svc".to_string(),
            "npm ci".to_string(),
            "npm run build".to_string(),
        ]
    );
    assert_eq!(setup.stages(), vec![Stage::Cloning, Stage::Installing, Stage::Building]);

    let spawned = setup.runner.spawned();
    assert_eq!(spawned[0].cwd, PathBuf::from("/ws"));
    assert!(spawned[0].env.is_empty(), "clone runs without project env");
    for step in &spawned[1..] {
        assert_eq!(step.cwd, PathBuf::from("/ws/svc"));
        assert_eq!(step.env.get("NODE_ENV").map(String::as_str), Some("production"));
        assert_eq!(step.owner, "svc");
    }
    Ok(())
}

#[tokio::test]
async fn up_to_date_pull_skips_install_and_build() -> TestResult {
    let setup = Setup::new(ScriptedRunner::new().on("git pull", Script::exit(0, "Already up to date.")));
    setup.fs.add_dir("/ws/svc");
    let project = ProjectBuilder::new("svc").install("npm ci").build_cmd("npm run build").build();

    setup.provision(&project).await?;

    assert_eq!(setup.runner.commands(), vec!["git pull".to_string()]);
    assert_eq!(setup.runner.spawned()[0].cwd, PathBuf::from("/ws/svc"));
    assert_eq!(setup.stages(), vec![Stage::Updating]);
    Ok(())
}

#[tokio::test]
async fn pull_with_changes_reinstalls() -> TestResult {
    let setup = Setup::new(
        ScriptedRunner::new().on("git pull", Script::exit(0, " 2 files changed, 10 insertions(+)")),
    );
    setup.fs.add_dir("/ws/svc");
    let project = ProjectBuilder::new("svc").install("npm ci").build();

    setup.provision(&project).await?;

    assert_eq!(setup.runner.commands(), vec!["git pull".to_string(), "npm ci".to_string()]);
    assert_eq!(setup.stages(), vec![Stage::Updating, Stage::Installing]);
    Ok(())
}

#[tokio::test]
async fn failed_pull_wipes_and_reclones() -> TestResult {
    let setup = Setup::new(
        ScriptedRunner::new().on("git pull", Script::exit(1, "fatal: not a git repository")),
    );
    setup.fs.add_file("/ws/svc/stale.txt", "left over");
    let project = ProjectBuilder::new("svc").build();

    setup.provision(&project).await?;

    assert_eq!(setup.runner.count("git pull"), 1);
    assert_eq!(setup.runner.count("git clone"), 1);
    assert!(!setup.fs.paths().contains(&PathBuf::from("/ws/svc/stale.txt")));
    assert!(setup.fs.paths().contains(&PathBuf::from("/ws/svc")));
    assert_eq!(setup.stages(), vec![Stage::Updating, Stage::Cloning]);
    Ok(())
}

#[tokio::test]
async fn clone_failure_carries_code_and_last_line() {
    let setup = Setup::new(
        ScriptedRunner::new().on("git clone", Script::exit(128, "fatal: repository not found")),
    );
    let project = ProjectBuilder::new("svc").install("npm ci").build();

    let err = setup.provision(&project).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Clone(_)));
    assert_eq!(err.to_string(), "git clone err: 128 fatal: repository not found");
    assert_eq!(setup.runner.count("npm ci"), 0);
}

#[tokio::test]
async fn install_failure_stops_before_build() {
    let setup = Setup::new(ScriptedRunner::new().on("npm ci", Script::exit(1, "npm ERR! missing script")));
    let project = ProjectBuilder::new("svc").install("npm ci").build_cmd("npm run build").build();

    let err = setup.provision(&project).await.unwrap_err();

    assert_eq!(err.to_string(), "install err: 1 npm ERR! missing script");
    assert_eq!(setup.runner.count("npm run build"), 0);
}

#[tokio::test]
async fn build_failure_is_reported_as_build_err() {
    let setup = Setup::new(ScriptedRunner::new().on("make", Script::exit(2, "cc: error")));
    let project = ProjectBuilder::new("svc").build_cmd("make").build();

    let err = setup.provision(&project).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Build(_)));
    assert_eq!(err.to_string(), "build err: 2 cc: error");
}

#[tokio::test]
async fn unspawnable_steps_say_so() {
    let setup = Setup::new(ScriptedRunner::new().on("git pull", Script::FailToSpawn));
    setup.fs.add_dir("/ws/svc");
    let err = setup.provision(&ProjectBuilder::new("svc").build()).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Execution(_)));
    assert!(err.to_string().starts_with("git pull err: could not execute"));

    let setup = Setup::new(ScriptedRunner::new().on("npm ci", Script::FailToSpawn));
    let err = setup
        .provision(&ProjectBuilder::new("svc").install("npm ci").build())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("install err: could not execute"));
}

#[tokio::test]
async fn blank_install_and_build_are_skipped() -> TestResult {
    let setup = Setup::new(ScriptedRunner::new());
    let project = ProjectBuilder::new("svc").install("  ").build_cmd("").build();

    setup.provision(&project).await?;

    assert_eq!(setup.runner.commands().len(), 1);
    assert_eq!(setup.stages(), vec![Stage::Cloning]);
    Ok(())
}
