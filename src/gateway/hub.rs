// src/gateway/hub.rs

//! Single task that fans supervisor reports out to sessions.
//!
//! Reports and "session authenticated" events travel through one channel,
//! so a new session's snapshot is never overtaken by a report it already
//! contains, and every session sees reports in emission order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::supervisor::{LogSink, ReportSink, Supervisor};
use crate::types::Report;

use super::protocol;
use super::sessions::{SessionId, Sessions};

#[derive(Debug)]
pub(crate) enum HubEvent {
    Report(Report),
    Authenticated(SessionId),
}

/// [`ReportSink`] handed to supervisors; forwards into the hub.
#[derive(Debug, Clone)]
pub struct HubSink {
    tx: mpsc::UnboundedSender<HubEvent>,
}

/// Receiving half, consumed by [`super::Gateway::new`].
#[derive(Debug)]
pub struct HubReceiver {
    rx: mpsc::UnboundedReceiver<HubEvent>,
}

pub fn hub_channel() -> (HubSink, HubReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HubSink { tx }, HubReceiver { rx })
}

impl HubSink {
    pub(crate) fn authenticated(&self, id: SessionId) {
        let _ = self.tx.send(HubEvent::Authenticated(id));
    }
}

impl ReportSink for HubSink {
    fn report(&self, report: Report) {
        let _ = self.tx.send(HubEvent::Report(report));
    }
}

pub(crate) async fn run_hub(
    receiver: HubReceiver,
    sessions: Sessions,
    supervisors: Vec<Arc<Supervisor>>,
) {
    let HubReceiver { mut rx } = receiver;
    while let Some(event) = rx.recv().await {
        match event {
            HubEvent::Report(report) => {
                LogSink.report(report.clone());
                match protocol::encode_report(&report) {
                    Ok(text) => {
                        let delivered = sessions.lock().broadcast(&text);
                        debug!(project = %report.name, delivered, "report broadcast");
                    }
                    Err(e) => error!(error = %e, "failed to encode report"),
                }
            }
            HubEvent::Authenticated(id) => {
                let snapshot: Vec<Report> = supervisors.iter().map(|s| s.report()).collect();
                match protocol::encode_snapshot(&snapshot) {
                    Ok(text) => {
                        if !sessions.lock().authenticate(id, text) {
                            debug!(session = id, "session closed before snapshot");
                        }
                    }
                    Err(e) => error!(error = %e, "failed to encode snapshot"),
                }
            }
        }
    }
    debug!("report hub stopped");
}
