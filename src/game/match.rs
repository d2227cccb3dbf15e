//! Active match registration and per-client outboxes

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ws::protocol::{PlayerId, ServerMsg};

/// Push-only handle to a connected client's event stream.
///
/// The streaming handler owns the receiving end and drains it; everyone else
/// only appends.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub client_id: Uuid,
    pub name: String,
    outbox: mpsc::UnboundedSender<ServerMsg>,
}

impl ClientHandle {
    pub fn new(name: String) -> (Self, mpsc::UnboundedReceiver<ServerMsg>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let handle = Self {
            client_id: Uuid::new_v4(),
            name,
            outbox,
        };
        (handle, rx)
    }

    /// Append without blocking. Returns false once the stream has gone away.
    pub fn push(&self, msg: ServerMsg) -> bool {
        self.outbox.send(msg).is_ok()
    }

    pub fn is_connected(&self) -> bool {
        !self.outbox.is_closed()
    }
}

/// The two seats of the running match
#[derive(Debug, Clone)]
struct ActiveMatch {
    id: Uuid,
    seats: [ClientHandle; 2],
}

/// What a disconnect did to the active match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The client was not seated in a running match; nothing changed
    NotSeated,
    /// The remaining player was declared winner
    OpponentWins { match_id: Uuid, winner: PlayerId },
}

/// Registry of the active match. One match runs per server process.
pub struct MatchRegistry {
    active: Mutex<Option<ActiveMatch>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// Seat two clients as A and B. Returns `None` if a match is already running.
    pub fn activate(&self, player_a: ClientHandle, player_b: ClientHandle) -> Option<Uuid> {
        let mut active = self.active.lock();
        if active.is_some() {
            return None;
        }
        let id = Uuid::new_v4();
        info!(
            match_id = %id,
            player_a = %player_a.name,
            player_b = %player_b.name,
            "Match activated"
        );
        *active = Some(ActiveMatch {
            id,
            seats: [player_a, player_b],
        });
        Some(id)
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn match_id(&self) -> Option<Uuid> {
        self.active.lock().as_ref().map(|m| m.id)
    }

    /// Seats whose streams are still open; zero when no match is running
    pub fn active_player_count(&self) -> usize {
        self.active
            .lock()
            .as_ref()
            .map(|m| m.seats.iter().filter(|c| c.is_connected()).count())
            .unwrap_or(0)
    }

    /// Seat of a connected client in the active match
    pub fn seat_of(&self, client_id: Uuid) -> Option<PlayerId> {
        let active = self.active.lock();
        let m = active.as_ref()?;
        PlayerId::ALL
            .into_iter()
            .find(|p| m.seats[p.index()].client_id == client_id)
    }

    pub fn name_of(&self, player: PlayerId) -> Option<String> {
        self.active
            .lock()
            .as_ref()
            .map(|m| m.seats[player.index()].name.clone())
    }

    /// Push to one seat of the active match
    pub fn send_to(&self, player: PlayerId, msg: ServerMsg) -> bool {
        let active = self.active.lock();
        match active.as_ref() {
            Some(m) => m.seats[player.index()].push(msg),
            None => false,
        }
    }

    /// Push to both seats. Returns how many outboxes accepted the event.
    pub fn broadcast(&self, msg: ServerMsg) -> usize {
        let active = self.active.lock();
        let Some(m) = active.as_ref() else {
            return 0;
        };
        m.seats
            .iter()
            .filter(|client| {
                let delivered = client.push(msg.clone());
                if !delivered {
                    warn!(client_id = %client.client_id, "Outbox closed, event dropped");
                }
                delivered
            })
            .count()
    }

    /// First disconnect of a seated client hands the opponent the win.
    /// Later disconnects for the same match are ignored.
    pub fn handle_disconnect(&self, client_id: Uuid) -> DisconnectOutcome {
        let mut active = self.active.lock();
        let Some(m) = active.as_ref() else {
            return DisconnectOutcome::NotSeated;
        };
        let Some(leaver) = PlayerId::ALL
            .into_iter()
            .find(|p| m.seats[p.index()].client_id == client_id)
        else {
            return DisconnectOutcome::NotSeated;
        };

        // Clearing the registration makes any later signal for this match a no-op
        let winner = leaver.opponent();
        let match_id = m.id;
        let _ = m.seats[winner.index()].push(ServerMsg::OpponentDisconnected {
            winner,
            message: "Your opponent disconnected. You win!".to_string(),
        });
        *active = None;

        info!(match_id = %match_id, leaver = %leaver, winner = %winner, "Match ended by disconnect");
        DisconnectOutcome::OpponentWins { match_id, winner }
    }

    /// End the match identified by `match_id`, if it is still the active one
    pub fn finish(&self, match_id: Uuid) -> bool {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(m) if m.id == match_id => {
                *active = None;
                info!(match_id = %match_id, "Match finished");
                true
            }
            _ => false,
        }
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seated() -> (
        MatchRegistry,
        Uuid,
        (ClientHandle, mpsc::UnboundedReceiver<ServerMsg>),
        (ClientHandle, mpsc::UnboundedReceiver<ServerMsg>),
    ) {
        let registry = MatchRegistry::new();
        let a = ClientHandle::new("alice".to_string());
        let b = ClientHandle::new("bob".to_string());
        let id = registry.activate(a.0.clone(), b.0.clone()).unwrap();
        (registry, id, a, b)
    }

    #[test]
    fn only_one_match_at_a_time() {
        let (registry, _, _a, _b) = seated();
        let (c, _rx_c) = ClientHandle::new("carol".to_string());
        let (d, _rx_d) = ClientHandle::new("dave".to_string());
        assert!(registry.activate(c, d).is_none());
        assert_eq!(registry.active_player_count(), 2);
    }

    #[test]
    fn broadcast_reaches_both_seats() {
        let (registry, _, (_, mut rx_a), (_, mut rx_b)) = seated();
        assert_eq!(registry.broadcast(ServerMsg::Pong { t: 7 }), 2);
        assert!(matches!(rx_a.try_recv(), Ok(ServerMsg::Pong { t: 7 })));
        assert!(matches!(rx_b.try_recv(), Ok(ServerMsg::Pong { t: 7 })));
    }

    #[test]
    fn dropped_stream_lowers_active_count() {
        let (registry, _, (_, rx_a), _b) = seated();
        drop(rx_a);
        assert_eq!(registry.active_player_count(), 1);
    }

    #[test]
    fn disconnect_declares_opponent_winner_once() {
        let (registry, id, (a, _rx_a), (_, mut rx_b)) = seated();
        assert_eq!(registry.seat_of(a.client_id), Some(PlayerId::A));

        let outcome = registry.handle_disconnect(a.client_id);
        assert_eq!(
            outcome,
            DisconnectOutcome::OpponentWins {
                match_id: id,
                winner: PlayerId::B
            }
        );
        assert!(matches!(
            rx_b.try_recv(),
            Ok(ServerMsg::OpponentDisconnected { winner: PlayerId::B, .. })
        ));
        assert!(!registry.is_active());
        assert_eq!(registry.handle_disconnect(a.client_id), DisconnectOutcome::NotSeated);
    }

    #[test]
    fn finish_only_clears_the_matching_id() {
        let (registry, id, _a, _b) = seated();
        assert!(!registry.finish(Uuid::new_v4()));
        assert!(registry.is_active());
        assert!(registry.finish(id));
        assert!(!registry.is_active());
    }
}
