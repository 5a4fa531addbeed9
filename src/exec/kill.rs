// src/exec/kill.rs

//! Whole-tree termination.
//!
//! On Unix every child is spawned as the leader of its own process group,
//! so signalling `-pgid` reaches the shell and everything it started. On
//! Windows `taskkill /T` walks the tree for us.

use super::{ExecError, Severity};

#[cfg(unix)]
pub fn kill_tree(pid: u32, severity: Severity) -> Result<(), ExecError> {
    let signal = match severity {
        Severity::Graceful => libc::SIGTERM,
        Severity::Forced => libc::SIGKILL,
    };
    let pgid = pid as libc::pid_t;

    // SAFETY: kill(2) takes plain integers and has no memory preconditions.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Err(ExecError::NotRunning);
        }
        return Err(ExecError::Signal { pid, source: err });
    }
    Ok(())
}

#[cfg(windows)]
pub fn kill_tree(pid: u32, severity: Severity) -> Result<(), ExecError> {
    use std::os::windows::process::CommandExt;

    const CREATE_NO_WINDOW: u32 = 0x08000000;

    let mut cmd = std::process::Command::new("taskkill");
    cmd.args(["/PID", &pid.to_string(), "/T"]);
    if severity == Severity::Forced {
        cmd.arg("/F");
    }
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd.spawn()
        .map(|_| ())
        .map_err(|source| ExecError::Signal { pid, source })
}

/// Conventional name for a signal number, e.g. `15` → `"SIGTERM"`.
#[cfg(unix)]
pub fn signal_name(signal: i32) -> String {
    let name = match signal {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGABRT => "SIGABRT",
        libc::SIGBUS => "SIGBUS",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGUSR2 => "SIGUSR2",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        other => return format!("SIG{other}"),
    };
    name.to_string()
}
