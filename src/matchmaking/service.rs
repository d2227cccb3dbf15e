//! Matchmaking service - manages the waiting queue and match creation

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::{ClientHandle, DisconnectOutcome, GameStateManager, MatchRegistry, RoundManager};
use crate::util::time::unix_millis;
use crate::ws::protocol::{PlayerId, ServerMsg};

use super::queue::MatchmakingQueue;

/// Interval between pairing attempts
pub const MATCHMAKING_INTERVAL: Duration = Duration::from_millis(500);

/// Matchmaking service
pub struct MatchmakingService {
    queue: Mutex<MatchmakingQueue>,
    game: Arc<GameStateManager>,
    registry: Arc<MatchRegistry>,
    rounds: Arc<RoundManager>,
    /// Every open client stream, queued or seated
    sessions: DashMap<Uuid, ClientHandle>,
    stop_requested: AtomicBool,
}

impl MatchmakingService {
    pub fn new(
        game: Arc<GameStateManager>,
        registry: Arc<MatchRegistry>,
        rounds: Arc<RoundManager>,
    ) -> Self {
        Self {
            queue: Mutex::new(MatchmakingQueue::new()),
            game,
            registry,
            rounds,
            sessions: DashMap::new(),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Register a new stream and queue it for the next match.
    /// Returns the handle and the receiving end of its outbox.
    pub async fn register_client(
        &self,
        name: String,
    ) -> (ClientHandle, mpsc::UnboundedReceiver<ServerMsg>) {
        let (handle, rx) = ClientHandle::new(name);
        handle.push(ServerMsg::Welcome {
            client_id: handle.client_id,
            server_time: unix_millis(),
        });

        self.sessions.insert(handle.client_id, handle.clone());
        let mut queue = self.queue.lock().await;
        queue.enqueue(handle.clone());
        let waiting = queue.len();
        let position = queue.position(&handle.client_id).unwrap_or(waiting);
        drop(queue);

        let message = if self.registry.is_active() {
            format!("A match is in progress. You are number {} in the queue.", position)
        } else {
            "Waiting for an opponent...".to_string()
        };
        handle.push(ServerMsg::QueueUpdate { message });

        info!(client_id = %handle.client_id, name = %handle.name, queue_size = waiting, "Client connected");
        (handle, rx)
    }

    /// Called once a stream closes, for whatever reason
    pub async fn disconnect(&self, client_id: Uuid) {
        self.sessions.remove(&client_id);

        if self.queue.lock().await.dequeue(client_id).is_some() {
            info!(client_id = %client_id, "Queued client disconnected");
            return;
        }

        match self.registry.handle_disconnect(client_id) {
            DisconnectOutcome::OpponentWins { match_id, winner } => {
                info!(client_id = %client_id, match_id = %match_id, winner = %winner, "Seated client disconnected");
            }
            DisconnectOutcome::NotSeated => {
                debug!(client_id = %client_id, "Disconnect for unknown or finished session");
            }
        }
    }

    /// Seat the two oldest queued clients if no match is running
    pub async fn try_start_match(&self) -> Option<Uuid> {
        if self.registry.is_active() {
            return None;
        }
        let (player_a, player_b) = self.queue.lock().await.try_form_pair()?;

        self.game.reset();
        let Some(match_id) = self.registry.activate(player_a.clone(), player_b.clone()) else {
            // Another match took the slot
            let mut queue = self.queue.lock().await;
            queue.enqueue(player_a);
            queue.enqueue(player_b);
            return None;
        };
        self.rounds.begin_match();

        let snapshot = self.game.get_current_state_snapshot();
        let totals = self.game.totals();
        for (seat, client, opponent) in [
            (PlayerId::A, &player_a, &player_b),
            (PlayerId::B, &player_b, &player_a),
        ] {
            client.push(ServerMsg::MatchFound {
                match_id,
                player_id: seat,
                opponent_name: opponent.name.clone(),
                snapshot: snapshot.clone(),
                totals,
            });
        }

        info!(
            match_id = %match_id,
            player_a = %player_a.name,
            player_b = %player_b.name,
            "Match found"
        );
        self.rounds.ensure_started();
        Some(match_id)
    }

    /// Periodic pairing loop; returns once `stop` is called
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(MATCHMAKING_INTERVAL);
        while !self.stop_requested.load(Ordering::SeqCst) {
            interval.tick().await;
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }
            self.try_start_match().await;
        }
        info!("Matchmaking loop stopped");
    }

    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Number of open client streams
    pub fn connected_clients(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{EconomySettings, RoundSettings};

    fn service() -> (Arc<MatchmakingService>, Arc<GameStateManager>, Arc<MatchRegistry>) {
        let game = Arc::new(GameStateManager::new(EconomySettings {
            starting_gold: 200,
            starting_lives: 20,
            tick_rate: 20,
        }));
        let registry = Arc::new(MatchRegistry::new());
        let rounds = Arc::new(RoundManager::new(
            game.clone(),
            registry.clone(),
            RoundSettings {
                preparation: Duration::from_secs(60),
                ack_timeout: Duration::from_secs(1),
                round_income: 50,
                min_combat_secs: 0.0,
                post_combat_delay_secs: 0.0,
                max_combat_secs: 10.0,
            },
        ));
        let service = Arc::new(MatchmakingService::new(game.clone(), registry.clone(), rounds));
        (service, game, registry)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn two_clients_are_paired_in_order() {
        let (service, game, registry) = service();
        let (alice, mut rx_a) = service.register_client("alice".to_string()).await;
        assert!(service.try_start_match().await.is_none());

        game.build_tower(PlayerId::A, "standard", 4, 15, 1).unwrap();
        let (_bob, mut rx_b) = service.register_client("bob".to_string()).await;
        let match_id = service.try_start_match().await.unwrap();

        assert_eq!(registry.seat_of(alice.client_id), Some(PlayerId::A));
        assert_eq!(service.queue_size().await, 0);
        // Stale tower from before the match was wiped by the reset
        assert_eq!(game.gold(PlayerId::A), 200);

        let to_a = drain(&mut rx_a);
        assert!(matches!(to_a[0], ServerMsg::Welcome { .. }));
        assert!(to_a.iter().any(|m| matches!(
            m,
            ServerMsg::MatchFound { match_id: id, player_id: PlayerId::A, opponent_name, snapshot, .. }
                if *id == match_id && opponent_name == "bob" && snapshot.towers.len() == 2
        )));
        assert!(drain(&mut rx_b).iter().any(|m| matches!(
            m,
            ServerMsg::MatchFound { player_id: PlayerId::B, .. }
        )));
    }

    #[tokio::test]
    async fn third_client_waits_for_the_next_match() {
        let (service, _game, registry) = service();
        let (_a, _rx_a) = service.register_client("alice".to_string()).await;
        let (_b, _rx_b) = service.register_client("bob".to_string()).await;
        assert!(service.try_start_match().await.is_some());

        let (carol, mut rx_c) = service.register_client("carol".to_string()).await;
        let (_dave, _rx_d) = service.register_client("dave".to_string()).await;
        assert!(service.try_start_match().await.is_none());
        assert_eq!(service.queue_size().await, 2);
        assert!(drain(&mut rx_c).iter().any(|m| matches!(m, ServerMsg::QueueUpdate { .. })));
        assert_eq!(registry.seat_of(carol.client_id), None);
        assert_eq!(service.connected_clients(), 4);
    }

    #[tokio::test]
    async fn seated_disconnect_frees_the_slot() {
        let (service, _game, registry) = service();
        let (alice, _rx_a) = service.register_client("alice".to_string()).await;
        let (_bob, mut rx_b) = service.register_client("bob".to_string()).await;
        service.try_start_match().await.unwrap();

        service.disconnect(alice.client_id).await;
        assert!(!registry.is_active());
        assert_eq!(service.connected_clients(), 1);
        assert!(drain(&mut rx_b).iter().any(|m| matches!(
            m,
            ServerMsg::OpponentDisconnected { winner: PlayerId::B, .. }
        )));

        // Second signal for the same client changes nothing
        service.disconnect(alice.client_id).await;
        assert!(!registry.is_active());
    }

    #[tokio::test]
    async fn queued_disconnect_just_leaves_the_queue() {
        let (service, _game, _registry) = service();
        let (alice, _rx_a) = service.register_client("alice".to_string()).await;
        service.disconnect(alice.client_id).await;
        assert_eq!(service.queue_size().await, 0);
        assert_eq!(service.connected_clients(), 0);
    }
}
