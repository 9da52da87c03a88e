//! Two-slot session registry for the duel server
//!
//! This module tracks which player slots own a live connection:
//! - Slot claims from the handshake, rejecting occupied or unknown slots
//! - Release on disconnect, keyed by connection id so a stale notice never
//!   evicts a newer connection on the same slot
//! - Non-blocking fan-out of encoded lines to every active slot
//!
//! A slot moves `Empty -> Active -> Disconnected -> Active ...`. The ship and
//! score that belong to a slot live in the game state and survive a
//! disconnect; only the connection handle is dropped here.

use log::{debug, info, warn};
use shared::{HandshakeError, SLOT_COUNT};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifies one accepted connection for the lifetime of the server.
pub type ConnectionId = u64;

/// Write side of an accepted connection
///
/// Lines pushed into `sender` are written to the socket by the connection's
/// writer task. Dropping the handle closes that channel, which ends the
/// writer and with it the connection.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub sender: mpsc::Sender<Arc<str>>,
    pub connected_at: Instant,
}

#[derive(Debug, Default)]
pub enum SlotState {
    /// Never claimed.
    #[default]
    Empty,
    Active(Connection),
    /// Was active; waiting for the same slot id to reconnect.
    Disconnected,
}

impl SlotState {
    pub fn is_active(&self) -> bool {
        matches!(self, SlotState::Active(_))
    }
}

/// How hard a broadcast tries to reach a slot whose buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Drop the line for that slot. Used for per-tick snapshots.
    BestEffort,
    /// Hand the line to a background task that waits for buffer space.
    Reliable,
}

/// Owns the connection handle of each slot
///
/// Only the simulation loop touches the manager, so no locking is needed;
/// connection tasks talk to it through the server's command queue.
pub struct ClientManager {
    slots: [SlotState; SLOT_COUNT],
    next_connection_id: ConnectionId,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            next_connection_id: 1,
        }
    }

    /// Attempts to bind a new connection to `slot`
    ///
    /// Fails if the slot index is out of range or the slot already has a
    /// live connection. Empty and disconnected slots are both claimable.
    pub fn claim(
        &mut self,
        slot: usize,
        addr: SocketAddr,
        sender: mpsc::Sender<Arc<str>>,
    ) -> Result<ConnectionId, HandshakeError> {
        let state = self
            .slots
            .get_mut(slot)
            .ok_or(HandshakeError::InvalidSlot(slot as i64))?;

        if state.is_active() {
            return Err(HandshakeError::SlotTaken(slot));
        }

        let id = self.next_connection_id;
        self.next_connection_id += 1;

        *state = SlotState::Active(Connection {
            id,
            addr,
            sender,
            connected_at: Instant::now(),
        });
        info!("Slot {} claimed by {} (connection {})", slot, addr, id);

        Ok(id)
    }

    /// Marks `slot` disconnected if `connection_id` is still its live
    /// connection. Returns false for stale or unknown notices.
    pub fn release(&mut self, slot: usize, connection_id: ConnectionId) -> bool {
        match self.slots.get_mut(slot) {
            Some(state) if state.is_current(connection_id) => {
                if let SlotState::Active(connection) = std::mem::replace(state, SlotState::Disconnected) {
                    info!(
                        "Slot {} released by {} after {:.1}s",
                        slot,
                        connection.addr,
                        connection.connected_at.elapsed().as_secs_f32()
                    );
                }
                true
            }
            _ => false,
        }
    }

    /// True when `connection_id` is the live connection on `slot`.
    pub fn is_current(&self, slot: usize, connection_id: ConnectionId) -> bool {
        self.slots
            .get(slot)
            .is_some_and(|state| state.is_current(connection_id))
    }

    pub fn state(&self, slot: usize) -> Option<&SlotState> {
        self.slots.get(slot)
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(SlotState::is_active)
    }

    /// Number of slots with a live connection
    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|state| state.is_active()).count()
    }

    pub fn all_active(&self) -> bool {
        self.connected_count() == SLOT_COUNT
    }

    /// Queues a line for one slot. Returns false if the slot has no live
    /// connection or its buffer could not take the line.
    pub fn send_to(&mut self, slot: usize, line: Arc<str>) -> bool {
        let sender = match self.slots.get(slot) {
            Some(SlotState::Active(connection)) => connection.sender.clone(),
            _ => return false,
        };

        match sender.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Slot {} outgoing buffer full, dropping line", slot);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.mark_closed(slot);
                false
            }
        }
    }

    /// Queues a line for every active slot without blocking
    ///
    /// Returns the slots whose writer had already gone away; those are
    /// released as part of the call.
    pub fn broadcast(&mut self, line: &Arc<str>, delivery: Delivery) -> Vec<usize> {
        let mut closed = Vec::new();

        for (slot, state) in self.slots.iter().enumerate() {
            let SlotState::Active(connection) = state else {
                continue;
            };

            match connection.sender.try_send(Arc::clone(line)) {
                Ok(()) => {}
                Err(TrySendError::Full(line)) => match delivery {
                    Delivery::BestEffort => {
                        debug!("Slot {} is behind, dropping frame", slot);
                    }
                    Delivery::Reliable => {
                        let sender = connection.sender.clone();
                        tokio::spawn(async move {
                            if sender.send(line).await.is_err() {
                                debug!("Slot {} closed before a reliable frame was delivered", slot);
                            }
                        });
                    }
                },
                Err(TrySendError::Closed(_)) => closed.push(slot),
            }
        }

        for slot in &closed {
            self.mark_closed(*slot);
        }
        closed
    }

    fn mark_closed(&mut self, slot: usize) {
        if let Some(state) = self.slots.get_mut(slot) {
            if state.is_active() {
                warn!("Slot {} writer closed, marking disconnected", slot);
                *state = SlotState::Disconnected;
            }
        }
    }
}

impl SlotState {
    fn is_current(&self, connection_id: ConnectionId) -> bool {
        matches!(self, SlotState::Active(connection) if connection.id == connection_id)
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn channel() -> (mpsc::Sender<Arc<str>>, mpsc::Receiver<Arc<str>>) {
        mpsc::channel(4)
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new();
        assert_eq!(manager.connected_count(), 0);
        assert!(!manager.all_active());
        assert!(matches!(manager.state(0), Some(SlotState::Empty)));
        assert!(manager.state(2).is_none());
    }

    #[test]
    fn test_claim_both_slots() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let id1 = manager.claim(0, test_addr(), tx1).unwrap();
        assert_eq!(manager.connected_count(), 1);
        assert!(!manager.all_active());

        let id2 = manager.claim(1, test_addr2(), tx2).unwrap();
        assert_ne!(id1, id2);
        assert!(manager.all_active());
    }

    #[test]
    fn test_claim_taken_slot_rejected() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let first = manager.claim(0, test_addr(), tx1).unwrap();
        let second = manager.claim(0, test_addr2(), tx2);

        assert_eq!(second, Err(HandshakeError::SlotTaken(0)));
        assert!(manager.is_current(0, first));
        assert_eq!(manager.connected_count(), 1);
    }

    #[test]
    fn test_claim_invalid_slot() {
        let mut manager = ClientManager::new();
        let (tx, _rx) = channel();

        assert_eq!(
            manager.claim(5, test_addr(), tx),
            Err(HandshakeError::InvalidSlot(5))
        );
    }

    #[test]
    fn test_release_then_reclaim() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let first = manager.claim(0, test_addr(), tx1).unwrap();
        assert!(manager.release(0, first));
        assert!(matches!(manager.state(0), Some(SlotState::Disconnected)));
        assert_eq!(manager.connected_count(), 0);

        let second = manager.claim(0, test_addr2(), tx2).unwrap();
        assert!(manager.is_current(0, second));
        assert!(!manager.is_current(0, first));
    }

    #[test]
    fn test_stale_release_is_ignored() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let first = manager.claim(1, test_addr(), tx1).unwrap();
        manager.release(1, first);
        let second = manager.claim(1, test_addr2(), tx2).unwrap();

        assert!(!manager.release(1, first));
        assert!(manager.is_current(1, second));
        assert!(!manager.release(0, second));
    }

    #[test]
    fn test_broadcast_reaches_active_slots() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        manager.claim(0, test_addr(), tx1).unwrap();
        manager.claim(1, test_addr2(), tx2).unwrap();

        let line: Arc<str> = Arc::from("{\"event\":\"x\"}\n");
        let closed = manager.broadcast(&line, Delivery::BestEffort);

        assert!(closed.is_empty());
        assert_eq!(rx1.try_recv().unwrap(), line);
        assert_eq!(rx2.try_recv().unwrap(), line);
    }

    #[test]
    fn test_broadcast_drops_frames_for_slow_slot() {
        let mut manager = ClientManager::new();
        let (tx, mut rx) = mpsc::channel(1);
        manager.claim(0, test_addr(), tx).unwrap();

        let first: Arc<str> = Arc::from("first\n");
        let second: Arc<str> = Arc::from("second\n");
        manager.broadcast(&first, Delivery::BestEffort);
        manager.broadcast(&second, Delivery::BestEffort);

        assert_eq!(rx.try_recv().unwrap(), first);
        assert!(rx.try_recv().is_err());
        assert!(manager.is_active(0));
    }

    #[test]
    fn test_broadcast_releases_closed_writer() {
        let mut manager = ClientManager::new();
        let (tx, rx) = channel();
        manager.claim(0, test_addr(), tx).unwrap();
        drop(rx);

        let line: Arc<str> = Arc::from("line\n");
        let closed = manager.broadcast(&line, Delivery::BestEffort);

        assert_eq!(closed, vec![0]);
        assert!(!manager.is_active(0));
        assert!(matches!(manager.state(0), Some(SlotState::Disconnected)));
    }

    #[test]
    fn test_send_to_inactive_slot() {
        let mut manager = ClientManager::new();
        assert!(!manager.send_to(0, Arc::from("hello\n")));
    }

    #[tokio::test]
    async fn test_reliable_delivery_waits_for_space() {
        let mut manager = ClientManager::new();
        let (tx, mut rx) = mpsc::channel(1);
        manager.claim(0, test_addr(), tx).unwrap();

        let snapshot: Arc<str> = Arc::from("snapshot\n");
        let game_over: Arc<str> = Arc::from("game_over\n");
        manager.broadcast(&snapshot, Delivery::BestEffort);
        manager.broadcast(&game_over, Delivery::Reliable);

        assert_eq!(rx.recv().await.unwrap(), snapshot);
        assert_eq!(rx.recv().await.unwrap(), game_over);
    }

    #[tokio::test]
    async fn test_reliable_delivery_to_vanished_reader() {
        let mut manager = ClientManager::new();
        let (tx, rx) = mpsc::channel(1);
        manager.claim(0, test_addr(), tx).unwrap();

        let snapshot: Arc<str> = Arc::from("snapshot\n");
        let game_over: Arc<str> = Arc::from("game_over\n");
        manager.broadcast(&snapshot, Delivery::BestEffort);
        manager.broadcast(&game_over, Delivery::Reliable);
        drop(rx);
        tokio::task::yield_now().await;

        assert_eq!(manager.broadcast(&snapshot, Delivery::BestEffort), vec![0]);
        assert!(!manager.is_active(0));
    }
}
