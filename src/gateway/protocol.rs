// src/gateway/protocol.rs

//! Control-plane wire format.
//!
//! Client → server frames are JSON text in exactly one of two shapes:
//!
//! ```json
//! {"type": "auth", "pw": "<plaintext>"}
//! {"type": "start" | "stop" | "restart" | "eradicate" | "kill", "which": "<project>"}
//! ```
//!
//! Server → client frames are a JSON array of reports right after a
//! successful auth, then single report objects.

use serde::Deserialize;
use thiserror::Error;

use crate::types::Report;

/// Lifecycle operations a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
    Restart,
    Eradicate,
    Kill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Auth { password: String },
    Action { action: Action, which: String },
}

/// Anything that makes the gateway drop a connection on the spot.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("action sent before authentication")]
    NotAuthenticated,

    #[error("auth sent on an authenticated session")]
    AlreadyAuthenticated,

    #[error("unknown project '{0}'")]
    UnknownProject(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum AuthTag {
    Auth,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Auth {
        #[serde(rename = "type")]
        _tag: AuthTag,
        pw: String,
    },
    Action {
        #[serde(rename = "type")]
        action: Action,
        which: String,
    },
}

/// Parse one text frame.
pub fn decode(text: &str) -> Result<ClientMessage, ProtocolViolation> {
    let wire: Wire =
        serde_json::from_str(text).map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;
    Ok(match wire {
        Wire::Auth { pw, .. } => ClientMessage::Auth { password: pw },
        Wire::Action { action, which } => ClientMessage::Action { action, which },
    })
}

pub fn encode_report(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string(report)
}

pub fn encode_snapshot(reports: &[Report]) -> serde_json::Result<String> {
    serde_json::to_string(reports)
}
