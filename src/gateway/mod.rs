// src/gateway/mod.rs

//! Authenticated WebSocket control plane.
//!
//! Each connection must send `{"type":"auth","pw":...}` within the auth
//! window; after that it receives a snapshot of every project followed by a
//! live stream of reports, and may send lifecycle actions. Any violation
//! drops the connection without a reply.

pub mod auth;
pub mod hub;
pub mod protocol;
pub mod session;
pub mod sessions;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::supervisor::Supervisor;

pub use hub::{HubReceiver, HubSink, hub_channel};
pub use protocol::{Action, ClientMessage, ProtocolViolation};
pub use sessions::{SessionId, SessionTable, SessionTicket, Sessions};

pub const MAX_SESSIONS: usize = 10;
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a session was torn down by the server.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    #[error("authentication failed")]
    AuthFailure,

    #[error("authentication timed out")]
    AuthTimeout,

    #[error("outbound queue overflowed")]
    Stalled,
}

#[derive(Debug, Clone, Copy)]
pub struct GatewayOptions {
    pub max_sessions: usize,
    pub auth_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_sessions: MAX_SESSIONS,
            auth_timeout: AUTH_TIMEOUT,
        }
    }
}

pub struct Gateway {
    supervisors: Vec<Arc<Supervisor>>,
    password_hash: Arc<str>,
    sessions: Sessions,
    hub: HubSink,
    auth_timeout: Duration,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("projects", &self.supervisors.len())
            .field("sessions", &self.sessions.len())
            .field("auth_timeout", &self.auth_timeout)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Build the gateway and spawn its report hub. `hub` must be the sender
    /// paired with `receiver`, the same one the supervisors report into.
    pub fn new(
        supervisors: Vec<Arc<Supervisor>>,
        password_hash: impl Into<Arc<str>>,
        hub: HubSink,
        receiver: HubReceiver,
        options: GatewayOptions,
    ) -> Arc<Self> {
        let sessions = Sessions::new(options.max_sessions);
        tokio::spawn(hub::run_hub(
            receiver,
            sessions.clone(),
            supervisors.clone(),
        ));
        Arc::new(Self {
            supervisors,
            password_hash: password_hash.into(),
            sessions,
            hub,
            auth_timeout: options.auth_timeout,
        })
    }

    pub fn supervisors(&self) -> &[Arc<Supervisor>] {
        &self.supervisors
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Supervisor>> {
        self.supervisors.iter().find(|s| s.name() == name)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn auth_timeout(&self) -> Duration {
        self.auth_timeout
    }

    pub(crate) fn hub(&self) -> &HubSink {
        &self.hub
    }

    pub(crate) async fn verify(&self, password: String) -> bool {
        auth::verify_password(password, Arc::clone(&self.password_hash)).await
    }

    /// Accept an upgrade, or refuse with 503 when every slot is taken.
    pub fn accept(self: &Arc<Self>, upgrade: WebSocketUpgrade) -> Response {
        let (tx, rx) = mpsc::channel(sessions::OUTBOUND_QUEUE);
        let Some(ticket) = self.sessions.try_register(tx) else {
            warn!(open = self.sessions.len(), "session limit reached; refusing connection");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        };
        let gateway = Arc::clone(self);
        upgrade.on_upgrade(move |socket| session::serve(socket, ticket, rx, gateway))
    }

    /// Fire off `action` on the named project without waiting for it.
    pub fn dispatch(&self, action: Action, which: &str) -> Result<(), ProtocolViolation> {
        let supervisor = self
            .find(which)
            .ok_or_else(|| ProtocolViolation::UnknownProject(which.to_string()))?;
        debug!(project = which, ?action, "dispatching action");

        match action {
            Action::Start => {
                tokio::spawn(supervisor.start());
            }
            Action::Stop => {
                supervisor.stop(false);
            }
            Action::Kill => {
                supervisor.kill();
            }
            Action::Restart => {
                supervisor.restart();
            }
            Action::Eradicate => {
                let supervisor = Arc::clone(supervisor);
                tokio::spawn(async move { supervisor.eradicate().await });
            }
        }
        Ok(())
    }
}
