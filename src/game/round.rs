//! Round lifecycle: preparation, combat, ack wait, result broadcast

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{
    PlayerId, PlayerTotals, RoundPhase, RoundResult, ServerMsg, SimulationData,
};

use super::manager::GameStateManager;
use super::r#match::MatchRegistry;
use super::simulation::{CombatTiming, GameState, SimulationError, SimulationOutcome};

/// Granularity of every bounded wait in the round loop
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timing and payout knobs for the round loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundSettings {
    pub preparation: Duration,
    pub ack_timeout: Duration,
    /// Gold granted to each player every round, on top of bounties
    pub round_income: u32,
    pub min_combat_secs: f64,
    pub post_combat_delay_secs: f64,
    /// Hard ceiling on simulated time
    pub max_combat_secs: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error("snapshot rejected by simulation: {0}")]
    Simulation(#[from] SimulationError),

    #[error("combat worker failed: {0}")]
    Worker(String),
}

/// How a single pass through the lifecycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// Stop was requested
    Stopped,
    /// Fewer than two connected players at the round boundary
    Skipped,
    /// Combat failed or the match ended before the result could be revealed
    Abandoned,
    /// The seated match changed during preparation; the next pass starts over
    Restarted,
    Completed(RoundResult),
}

/// How the preparation wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreparationEnd {
    Elapsed,
    Stopped,
    MatchChanged,
}

#[derive(Debug, Default)]
struct AckState {
    round: u32,
    received: [bool; 2],
}

/// Drives rounds for the active match on one long-lived task
pub struct RoundManager {
    game: Arc<GameStateManager>,
    registry: Arc<MatchRegistry>,
    settings: RoundSettings,
    phase: RwLock<(RoundPhase, u32)>,
    round_number: AtomicU32,
    acks: Mutex<AckState>,
    ack_notify: Notify,
    stop_requested: AtomicBool,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl RoundManager {
    pub fn new(
        game: Arc<GameStateManager>,
        registry: Arc<MatchRegistry>,
        settings: RoundSettings,
    ) -> Self {
        Self {
            game,
            registry,
            settings,
            phase: RwLock::new((RoundPhase::Preparation, 0)),
            round_number: AtomicU32::new(0),
            acks: Mutex::new(AckState::default()),
            ack_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            loop_task: Mutex::new(None),
        }
    }

    /// Spawn the round loop if it is not already running
    pub fn ensure_started(self: &Arc<Self>) {
        let mut task = self.loop_task.lock();
        if task.is_some() || self.is_stopping() {
            return;
        }
        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move { manager.run().await }));
        info!("Round loop started");
    }

    /// Request the loop to stop and wait for it. In-flight combat runs to completion.
    pub async fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.ack_notify.notify_one();
        let task = self.loop_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Round loop task failed");
            }
        }
        info!("Round loop stopped");
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Start numbering rounds from 1 again for a fresh match
    pub fn begin_match(&self) {
        self.round_number.store(0, Ordering::SeqCst);
        *self.acks.lock() = AckState::default();
    }

    pub fn is_in_preparation(&self) -> bool {
        self.phase.read().0 == RoundPhase::Preparation
    }

    pub fn current_phase(&self) -> (RoundPhase, u32) {
        *self.phase.read()
    }

    /// Number of the most recently started combat round
    pub fn current_round(&self) -> u32 {
        self.round_number.load(Ordering::SeqCst)
    }

    /// Record that `player` finished replaying `round_number`.
    ///
    /// Acks for any round other than the current one are ignored.
    pub fn record_ack(&self, player: PlayerId, round_number: u32) -> bool {
        let mut acks = self.acks.lock();
        if round_number == 0 || acks.round != round_number {
            debug!(player = %player, round_number, current = acks.round, "Ignoring stale round ack");
            return false;
        }
        acks.received[player.index()] = true;
        drop(acks);
        self.ack_notify.notify_one();
        info!(player = %player, round_number, "Round ack received");
        true
    }

    async fn run(self: Arc<Self>) {
        while !self.is_stopping() {
            if !self.registry.is_active() {
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
            let outcome = self.run_round().await;
            debug!(?outcome, "Round pass finished");
        }
    }

    /// One full pass through the lifecycle
    pub async fn run_round(&self) -> RoundOutcome {
        let upcoming = self.current_round() + 1;
        let seated = self.registry.match_id();
        self.game.open_preparation();
        self.enter_phase(RoundPhase::Preparation, upcoming);
        match self.wait_out_preparation(seated).await {
            PreparationEnd::Elapsed => {}
            PreparationEnd::Stopped => return RoundOutcome::Stopped,
            PreparationEnd::MatchChanged => {
                info!(previous = ?seated, "Match changed during preparation, restarting");
                return RoundOutcome::Restarted;
            }
        }

        let match_id = match seated {
            Some(id) if self.registry.active_player_count() >= 2 => id,
            _ => {
                debug!("Fewer than two players connected, skipping round");
                return RoundOutcome::Skipped;
            }
        };

        let round = self.round_number.fetch_add(1, Ordering::SeqCst) + 1;
        *self.acks.lock() = AckState {
            round,
            received: [false; 2],
        };

        // Closes the action gate under the same lock that freezes the snapshot
        let snapshot = self.game.begin_combat_snapshot();
        self.enter_phase(RoundPhase::Combat, round);
        self.registry.broadcast(ServerMsg::RoundStart {
            round_number: round,
            snapshot: snapshot.clone(),
        });
        info!(
            match_id = %match_id,
            round,
            towers = snapshot.towers.len(),
            units = snapshot.units.len(),
            "Combat started"
        );

        let outcome = match self.resolve_combat(snapshot).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(match_id = %match_id, round, error = %e, "Combat failed, abandoning round");
                self.game.clear_wave_data();
                return RoundOutcome::Abandoned;
            }
        };

        self.enter_phase(RoundPhase::AwaitingAcks, round);
        if !self.wait_for_acks(round, match_id).await {
            warn!(match_id = %match_id, round, "Round acks incomplete, revealing result anyway");
        }

        self.enter_phase(RoundPhase::ResultBroadcast, round);
        if self.registry.match_id() != Some(match_id) {
            // The game state may already belong to the next match
            info!(match_id = %match_id, round, "Match ended during round, discarding result");
            return RoundOutcome::Abandoned;
        }

        let result = self.round_result(round, &outcome);
        let totals = self.game.apply_round_result(&result);
        self.game.clear_wave_data();
        self.registry.broadcast(ServerMsg::RoundResult { result, totals });
        info!(
            match_id = %match_id,
            round,
            lives_a = totals.lives_player_a,
            lives_b = totals.lives_player_b,
            gold_a = totals.gold_player_a,
            gold_b = totals.gold_player_b,
            "Round result broadcast"
        );

        self.check_game_over(match_id, &totals);
        RoundOutcome::Completed(result)
    }

    /// Run the simulation on a blocking worker and wait for it
    async fn resolve_combat(&self, snapshot: SimulationData) -> Result<SimulationOutcome, RoundError> {
        let timing = CombatTiming::from_secs(
            snapshot.tick_rate,
            self.settings.min_combat_secs,
            self.settings.post_combat_delay_secs,
        );
        let max_ticks = (self.settings.max_combat_secs * snapshot.tick_rate as f64) as u32;

        let worker = tokio::task::spawn_blocking(move || {
            let mut state = GameState::new(&snapshot, timing)?;
            Ok::<_, SimulationError>(state.run_to_completion(max_ticks))
        });

        let outcome = worker.await.map_err(|e| RoundError::Worker(e.to_string()))??;
        debug!(ticks = outcome.ticks, truncated = outcome.truncated, "Combat resolved");
        Ok(outcome)
    }

    fn round_result(&self, round: u32, outcome: &SimulationOutcome) -> RoundResult {
        let income = self.settings.round_income;
        RoundResult {
            round_number: round,
            lives_lost_player_a: outcome.lives_lost_player_a,
            lives_lost_player_b: outcome.lives_lost_player_b,
            gold_earned_player_a: outcome.gold_earned_player_a.saturating_add(income),
            gold_earned_player_b: outcome.gold_earned_player_b.saturating_add(income),
        }
    }

    fn check_game_over(&self, match_id: Uuid, totals: &PlayerTotals) {
        let winner = match (totals.lives_player_a, totals.lives_player_b) {
            (0, 0) => None,
            (0, _) => Some(PlayerId::B),
            (_, 0) => Some(PlayerId::A),
            _ => return,
        };
        self.registry.broadcast(ServerMsg::GameOver {
            winner,
            reason: "A base ran out of lives".to_string(),
        });
        self.registry.finish(match_id);
        info!(match_id = %match_id, ?winner, "Game over");
    }

    /// Bounded wait for both acks. Returns false on timeout, stop, or match end.
    async fn wait_for_acks(&self, round: u32, match_id: Uuid) -> bool {
        let deadline = Instant::now() + self.settings.ack_timeout;
        loop {
            {
                let acks = self.acks.lock();
                if acks.round == round && acks.received.iter().all(|&r| r) {
                    return true;
                }
            }
            if self.is_stopping() || self.registry.match_id() != Some(match_id) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = (deadline - now).min(POLL_INTERVAL);
            let _ = tokio::time::timeout(wait, self.ack_notify.notified()).await;
        }
    }

    /// Sleep out preparation in small increments, watching for stop and for
    /// a different match being seated
    async fn wait_out_preparation(&self, seated: Option<Uuid>) -> PreparationEnd {
        let deadline = Instant::now() + self.settings.preparation;
        loop {
            if self.is_stopping() {
                return PreparationEnd::Stopped;
            }
            if self.registry.match_id() != seated {
                return PreparationEnd::MatchChanged;
            }
            let now = Instant::now();
            if now >= deadline {
                return PreparationEnd::Elapsed;
            }
            tokio::time::sleep((deadline - now).min(POLL_INTERVAL)).await;
        }
    }

    fn enter_phase(&self, phase: RoundPhase, round_number: u32) {
        *self.phase.write() = (phase, round_number);
        self.registry.broadcast(ServerMsg::PhaseChanged {
            phase,
            round_number,
        });
    }
}
