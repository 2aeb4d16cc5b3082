use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use jari_core::events::SeatEvent;

/// Registry of connected viewers. Owned by the server and injected through
/// `AppState`; every seat-store writer reaches it via the event fan-out.
///
/// Delivery is best effort: a connection whose receiver is gone is skipped
/// and pruned, nothing is queued or retried. A viewer that connects after
/// an event primes itself from the full-state fetch instead.
pub struct SeatHub {
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<SeatEvent>>>,
}

impl SeatHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a viewer connection; the returned receiver feeds its socket.
    pub fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<SeatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        (id, rx)
    }

    /// Transport close path; safe to call for an already-pruned connection.
    pub fn unregister(&self, id: Uuid) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Deliver an event to every open connection. Iterates a snapshot so
    /// connects/disconnects during the fan-out are never observed
    /// mid-iteration. Returns the number of connections reached.
    pub fn broadcast(&self, event: &SeatEvent) -> usize {
        let snapshot: Vec<(Uuid, mpsc::UnboundedSender<SeatEvent>)> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(id);
            }
        }

        if !closed.is_empty() {
            let mut connections = self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for id in closed {
                connections.remove(&id);
                tracing::debug!(connection = %id, "pruned closed viewer connection");
            }
        }

        delivered
    }

    pub fn connections(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for SeatHub {
    fn default() -> Self {
        Self::new()
    }
}
