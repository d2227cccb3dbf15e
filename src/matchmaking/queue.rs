//! Matchmaking queue implementation

use std::collections::VecDeque;
use uuid::Uuid;

use crate::game::ClientHandle;

/// FIFO of clients waiting for the next match
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<ClientHandle>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client to the back of the queue
    pub fn enqueue(&mut self, handle: ClientHandle) {
        // Rejoin moves the client to the back
        self.queue.retain(|c| c.client_id != handle.client_id);
        self.queue.push_back(handle);
    }

    /// Remove a client from the queue
    pub fn dequeue(&mut self, client_id: Uuid) -> Option<ClientHandle> {
        let pos = self.queue.iter().position(|c| c.client_id == client_id)?;
        self.queue.remove(pos)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pop the two oldest connected clients, first one seated as A.
    ///
    /// Clients whose streams already closed are dropped on the way.
    pub fn try_form_pair(&mut self) -> Option<(ClientHandle, ClientHandle)> {
        self.queue.retain(ClientHandle::is_connected);
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some((first, second))
    }

    /// Position (1-based) of a client in the queue
    pub fn position(&self, client_id: &Uuid) -> Option<usize> {
        self.queue
            .iter()
            .position(|c| &c.client_id == client_id)
            .map(|p| p + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_in_arrival_order() {
        let mut queue = MatchmakingQueue::new();
        let (a, _rx_a) = ClientHandle::new("alice".to_string());
        let (b, _rx_b) = ClientHandle::new("bob".to_string());
        let (c, _rx_c) = ClientHandle::new("carol".to_string());
        queue.enqueue(a.clone());
        assert!(queue.try_form_pair().is_none());
        queue.enqueue(b.clone());
        queue.enqueue(c.clone());
        assert_eq!(queue.position(&c.client_id), Some(3));

        let (first, second) = queue.try_form_pair().unwrap();
        assert_eq!(first.client_id, a.client_id);
        assert_eq!(second.client_id, b.client_id);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.position(&c.client_id), Some(1));
    }

    #[test]
    fn disconnected_clients_are_skipped() {
        let mut queue = MatchmakingQueue::new();
        let (a, rx_a) = ClientHandle::new("alice".to_string());
        let (b, _rx_b) = ClientHandle::new("bob".to_string());
        queue.enqueue(a);
        queue.enqueue(b);
        drop(rx_a);
        assert!(queue.try_form_pair().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn dequeue_and_rejoin() {
        let mut queue = MatchmakingQueue::new();
        let (a, _rx_a) = ClientHandle::new("alice".to_string());
        let (b, _rx_b) = ClientHandle::new("bob".to_string());
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        queue.enqueue(a.clone());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.position(&a.client_id), Some(2));

        assert!(queue.dequeue(a.client_id).is_some());
        assert!(queue.dequeue(a.client_id).is_none());
        assert_eq!(queue.position(&a.client_id), None);
        assert!(!queue.is_empty());
    }
}
