// tests/exec_shell.rs

#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::collections::BTreeMap;
use std::error::Error;

use harbormaster::exec::{
    CommandSpec, ExecError, ExitReason, Severity, ShellRunner, run_to_end, spawn_shell,
};

type TestResult = Result<(), Box<dyn Error>>;

fn spec(cmd: &str) -> CommandSpec {
    CommandSpec::new(cmd, std::env::temp_dir(), "test")
}

#[tokio::test]
async fn reports_exit_code_and_last_line() -> TestResult {
    init_tracing();
    let outcome = with_timeout(run_to_end(&ShellRunner, spec("printf 'one\\ntwo\\n\\n'; exit 3"))).await?;
    assert_eq!(outcome.reason, ExitReason::Code(3));
    assert_eq!(outcome.last_line, "two");

    let outcome = with_timeout(run_to_end(&ShellRunner, spec("echo oops >&2; exit 1"))).await?;
    assert_eq!(outcome.reason, ExitReason::Code(1));
    assert_eq!(outcome.last_line, "oops");
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_output_keeps_draining() -> TestResult {
    init_tracing();
    let cmd = "printf 'bad \\377 byte\\n'; sleep 0.3; for i in 0 1 2; do echo after$i; done; exit 0";
    let outcome = with_timeout(run_to_end(&ShellRunner, spec(cmd))).await?;
    assert_eq!(outcome.reason, ExitReason::Code(0));
    assert_eq!(outcome.last_line, "after2");

    let outcome = with_timeout(run_to_end(&ShellRunner, spec("printf 'caf\\351\\r\\n'"))).await?;
    assert_eq!(outcome.last_line, "caf\u{FFFD}");
    Ok(())
}

#[tokio::test]
async fn env_overrides_reach_the_command() -> TestResult {
    init_tracing();
    let mut env = BTreeMap::new();
    env.insert("GREETING".to_string(), "ahoy".to_string());
    let outcome =
        with_timeout(run_to_end(&ShellRunner, spec("echo \"$GREETING\"").with_env(&env))).await?;
    assert!(outcome.reason.success());
    assert_eq!(outcome.last_line, "ahoy");
    Ok(())
}

#[tokio::test]
async fn missing_cwd_is_a_spawn_error() {
    init_tracing();
    let spec = CommandSpec::new("true", "/definitely/not/here", "test");
    assert!(matches!(spawn_shell(spec), Err(ExecError::Spawn { .. })));
}

#[tokio::test]
async fn stdin_lines_are_delivered() -> TestResult {
    init_tracing();
    let mut running = spawn_shell(spec("read line; echo \"got $line\""))?;
    running.control.write_line("ping")?;
    let outcome = with_timeout(running.wait()).await;
    assert_eq!(outcome.reason, ExitReason::Code(0));
    assert_eq!(outcome.last_line, "got ping");
    Ok(())
}

#[tokio::test]
async fn graceful_terminate_ends_with_sigterm() -> TestResult {
    init_tracing();
    let mut running = spawn_shell(spec("echo ready; sleep 30"))?;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    running.control.terminate(Severity::Graceful)?;
    let outcome = with_timeout(running.wait()).await;
    assert_eq!(outcome.reason, ExitReason::Signal("SIGTERM".into()));
    assert_eq!(outcome.last_line, "ready");
    Ok(())
}

#[tokio::test]
async fn forced_terminate_takes_down_background_children() -> TestResult {
    init_tracing();
    // The background sleep keeps stdout open; completion only resolves once
    // it is gone too.
    let mut running = spawn_shell(spec("sleep 30 & sleep 30"))?;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    running.control.terminate(Severity::Forced)?;
    let outcome = with_timeout(running.wait()).await;
    assert_eq!(outcome.reason, ExitReason::Signal("SIGKILL".into()));
    Ok(())
}
