// src/gateway/session.rs

//! One control-plane connection, from upgrade to close.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::protocol::{self, ClientMessage, ProtocolViolation};
use super::sessions::{SessionId, SessionTicket};
use super::{Gateway, SessionError};

enum Flow {
    Continue,
    Close,
}

pub(crate) async fn serve(
    socket: WebSocket,
    ticket: SessionTicket,
    mut outbound: mpsc::Receiver<String>,
    gateway: Arc<Gateway>,
) {
    let id = ticket.id();
    info!(session = id, "control session opened");

    let (mut tx, mut rx) = socket.split();
    let mut authenticated = false;
    let auth_deadline = Instant::now() + gateway.auth_timeout();
    let deadline = tokio::time::sleep_until(auth_deadline);
    tokio::pin!(deadline);

    let outcome: Result<(), SessionError> = loop {
        tokio::select! {
            _ = &mut deadline, if !authenticated => break Err(SessionError::AuthTimeout),
            queued = outbound.recv() => match queued {
                Some(text) => {
                    if tx.send(Message::Text(text)).await.is_err() {
                        break Ok(());
                    }
                }
                // The table dropped us.
                None => break Err(SessionError::Stalled),
            },
            frame = rx.next() => match frame {
                None | Some(Err(_)) => break Ok(()),
                Some(Ok(message)) => {
                    match handle_frame(message, &mut authenticated, auth_deadline, &gateway, id).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Close) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
            }
        }
    };

    match outcome {
        Ok(()) => info!(session = id, "control session closed"),
        // Returning drops both halves, which tears the connection down.
        Err(e) => warn!(session = id, reason = %e, "control session destroyed"),
    }
    drop(ticket);
}

async fn handle_frame(
    message: Message,
    authenticated: &mut bool,
    auth_deadline: Instant,
    gateway: &Gateway,
    id: SessionId,
) -> Result<Flow, SessionError> {
    let text = match message {
        Message::Text(text) => text,
        Message::Binary(bytes) => String::from_utf8(bytes).map_err(|_| {
            ProtocolViolation::Malformed("binary frame is not utf-8".to_string())
        })?,
        Message::Ping(_) | Message::Pong(_) => return Ok(Flow::Continue),
        Message::Close(_) => return Ok(Flow::Close),
    };

    match protocol::decode(&text)? {
        ClientMessage::Auth { password } => {
            if *authenticated {
                return Err(ProtocolViolation::AlreadyAuthenticated.into());
            }
            let verified = tokio::time::timeout_at(auth_deadline, gateway.verify(password))
                .await
                .map_err(|_| SessionError::AuthTimeout)?;
            if !verified {
                return Err(SessionError::AuthFailure);
            }
            *authenticated = true;
            debug!(session = id, "session authenticated");
            gateway.hub().authenticated(id);
        }
        ClientMessage::Action { action, which } => {
            if !*authenticated {
                return Err(ProtocolViolation::NotAuthenticated.into());
            }
            gateway.dispatch(action, &which)?;
        }
    }
    Ok(Flow::Continue)
}
