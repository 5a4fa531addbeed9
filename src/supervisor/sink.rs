// src/supervisor/sink.rs

use tracing::info;

use crate::types::Report;

/// Receiver of supervisor reports.
///
/// Called synchronously, after the state it describes has been updated and
/// while that supervisor's state is still locked, so implementations must
/// not block and must not call back into the supervisor.
pub trait ReportSink: Send + Sync {
    fn report(&self, report: Report);
}

/// Writes reports to the log. Used when no gateway is listening.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&self, report: Report) {
        info!(
            project = %report.name,
            status = %report.status,
            detail = %report.detail,
            "status report"
        );
    }
}
