// src/gateway/sessions.rs

//! Registry of open control-plane connections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

pub type SessionId = u64;

/// Messages a session may have queued before it is dropped as stalled.
pub const OUTBOUND_QUEUE: usize = 256;

#[derive(Debug)]
struct Entry {
    authenticated: bool,
    outbound: mpsc::Sender<String>,
}

/// Bounded table of sessions and their outbound queues.
///
/// Pure bookkeeping: no IO beyond pushing onto bounded channels. A session
/// whose queue is full is removed, which closes its receiver.
#[derive(Debug)]
pub struct SessionTable {
    max: usize,
    next_id: SessionId,
    entries: HashMap<SessionId, Entry>,
}

impl SessionTable {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            next_id: 0,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an unauthenticated session, or `None` when the table is full.
    pub fn try_register(&mut self, outbound: mpsc::Sender<String>) -> Option<SessionId> {
        if self.entries.len() >= self.max {
            return None;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(
            id,
            Entry {
                authenticated: false,
                outbound,
            },
        );
        Some(id)
    }

    pub fn is_authenticated(&self, id: SessionId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.authenticated)
    }

    /// Mark `id` authenticated and queue `snapshot` as its first message.
    /// Returns false if the session is already gone.
    pub fn authenticate(&mut self, id: SessionId, snapshot: String) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.authenticated = true;
                if entry.outbound.try_send(snapshot).is_err() {
                    self.entries.remove(&id);
                    return false;
                }
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: SessionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Queue `text` for every authenticated session; returns how many.
    /// Sessions that cannot take it are dropped from the table.
    pub fn broadcast(&mut self, text: &str) -> usize {
        let mut delivered = 0;
        self.entries.retain(|id, entry| {
            if !entry.authenticated {
                return true;
            }
            match entry.outbound.try_send(text.to_string()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(session = *id, "outbound queue full; dropping session");
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
        delivered
    }
}

/// Shared handle to the session table.
#[derive(Debug, Clone)]
pub struct Sessions(Arc<Mutex<SessionTable>>);

impl Sessions {
    pub fn new(max: usize) -> Self {
        Self(Arc::new(Mutex::new(SessionTable::new(max))))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Register a connection; the session lives as long as the ticket.
    pub fn try_register(&self, outbound: mpsc::Sender<String>) -> Option<SessionTicket> {
        let id = self.lock().try_register(outbound)?;
        Some(SessionTicket {
            id,
            sessions: self.clone(),
        })
    }
}

/// Ownership of one table slot; dropping it removes the session.
#[derive(Debug)]
pub struct SessionTicket {
    id: SessionId,
    sessions: Sessions,
}

impl SessionTicket {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionTicket {
    fn drop(&mut self) {
        self.sessions.lock().remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_beyond_capacity() {
        let mut table = SessionTable::new(2);
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE);
        let a = table.try_register(tx.clone()).unwrap();
        table.try_register(tx.clone()).unwrap();
        assert!(table.try_register(tx.clone()).is_none());

        table.remove(a);
        assert!(table.try_register(tx).is_some());
    }

    #[test]
    fn broadcast_reaches_only_authenticated_sessions() {
        let mut table = SessionTable::new(10);
        let (tx_a, mut rx_a) = mpsc::channel(OUTBOUND_QUEUE);
        let (tx_b, mut rx_b) = mpsc::channel(OUTBOUND_QUEUE);
        let a = table.try_register(tx_a).unwrap();
        let b = table.try_register(tx_b).unwrap();

        assert!(table.authenticate(a, "[]".into()));
        assert!(table.is_authenticated(a));
        assert!(!table.is_authenticated(b));
        assert_eq!(table.broadcast("hello"), 1);

        assert_eq!(rx_a.try_recv().unwrap(), "[]");
        assert_eq!(rx_a.try_recv().unwrap(), "hello");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn dropping_a_ticket_frees_the_slot() {
        let sessions = Sessions::new(1);
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE);
        let ticket = sessions.try_register(tx.clone()).unwrap();
        assert!(sessions.try_register(tx.clone()).is_none());
        drop(ticket);
        assert!(sessions.is_empty());
        assert!(sessions.try_register(tx).is_some());
    }

    #[test]
    fn stalled_session_is_dropped_when_its_queue_fills() {
        let mut table = SessionTable::new(10);
        let (tx_slow, mut rx_slow) = mpsc::channel(2);
        let (tx_fast, mut rx_fast) = mpsc::channel(OUTBOUND_QUEUE);
        let slow = table.try_register(tx_slow).unwrap();
        let fast = table.try_register(tx_fast).unwrap();
        table.authenticate(slow, "[]".into());
        table.authenticate(fast, "[]".into());

        assert_eq!(table.broadcast("one"), 2);
        assert_eq!(table.broadcast("two"), 1);
        assert_eq!(table.len(), 1);
        assert!(!table.is_authenticated(slow));

        assert_eq!(rx_slow.try_recv().unwrap(), "[]");
        assert_eq!(rx_slow.try_recv().unwrap(), "one");
        assert!(matches!(
            rx_slow.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(rx_fast.try_recv().unwrap(), "[]");
        assert_eq!(rx_fast.try_recv().unwrap(), "one");
        assert_eq!(rx_fast.try_recv().unwrap(), "two");
    }
}
