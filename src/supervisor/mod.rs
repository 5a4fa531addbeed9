// src/supervisor/mod.rs

//! Per-project process supervision.
//!
//! The flag bookkeeping and status derivation live in the pure [`state`]
//! core, which is unit tested without Tokio or processes. The async shell in
//! [`runtime`] drives provisioning and the command runner around it and
//! pushes every observable change into an injected [`ReportSink`].

pub mod runtime;
pub mod sink;
pub mod state;

pub use runtime::{StartFuture, Supervisor, SupervisorDeps};
pub use sink::{LogSink, ReportSink};
pub use state::{RunResult, SupervisorState, derive_status};
