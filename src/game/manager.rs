//! Authoritative game state: the only mutation surface the network layer sees

use parking_lot::Mutex;
use tracing::info;

use crate::ws::protocol::{
    PlayerId, PlayerTotals, RoundResult, SimulationData, TowerSpec, UnitRequest, UnitSpec,
};

use super::economy::EconomyLedger;
use super::placement::PlacementValidator;
use super::snapshot::SnapshotBuilder;
use super::stats::TowerStats;
use super::wave::WaveQueue;

/// Why a player action was refused. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("actions are only accepted during preparation")]
    WrongPhase,

    #[error("no match is in progress")]
    NoActiveMatch,

    #[error("unknown or unbuildable tower type: {0}")]
    UnknownTowerType(String),

    #[error("invalid tower level: {0}")]
    InvalidLevel(u32),

    #[error("insufficient gold: need {needed}, have {available}")]
    InsufficientGold { needed: u32, available: u32 },

    #[error("cannot build at row {row}, col {col}")]
    InvalidPlacement { row: i32, col: i32 },

    #[error("no valid units in request")]
    NoValidUnits,

    #[error("too many requests")]
    RateLimited,
}

impl ActionError {
    /// Short machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::WrongPhase => "wrong_phase",
            Self::NoActiveMatch => "no_active_match",
            Self::UnknownTowerType(_) => "unknown_tower_type",
            Self::InvalidLevel(_) => "invalid_level",
            Self::InsufficientGold { .. } => "insufficient_gold",
            Self::InvalidPlacement { .. } => "invalid_placement",
            Self::NoValidUnits => "no_valid_units",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// Match economy settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EconomySettings {
    pub starting_gold: u32,
    pub starting_lives: u32,
    pub tick_rate: u32,
}

struct ManagerState {
    economy: EconomyLedger,
    placement: PlacementValidator,
    waves: WaveQueue,
    /// Builds and sends are accepted only while this is set
    accepting_actions: bool,
}

impl ManagerState {
    fn fresh(settings: &EconomySettings) -> Self {
        Self {
            economy: EconomyLedger::new(settings.starting_gold, settings.starting_lives),
            placement: PlacementValidator::standard(),
            waves: WaveQueue::new(),
            accepting_actions: true,
        }
    }
}

/// Lock-guarded facade over economy, placement, wave queue and snapshots.
///
/// Every method takes the single mutex for its whole body, so each call is
/// one critical section.
pub struct GameStateManager {
    settings: EconomySettings,
    snapshots: SnapshotBuilder,
    state: Mutex<ManagerState>,
}

impl GameStateManager {
    pub fn new(settings: EconomySettings) -> Self {
        Self {
            state: Mutex::new(ManagerState::fresh(&settings)),
            snapshots: SnapshotBuilder::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &EconomySettings {
        &self.settings
    }

    /// Back to starting gold/lives with an empty grid and queue
    pub fn reset(&self) {
        *self.state.lock() = ManagerState::fresh(&self.settings);
        info!("Game state reset for new match");
    }

    /// Charge, then place; refunds if the placement is rejected
    pub fn build_tower(
        &self,
        player: PlayerId,
        tower_type: &str,
        row: i32,
        col: i32,
        level: u32,
    ) -> Result<TowerSpec, ActionError> {
        if level == 0 {
            return Err(ActionError::InvalidLevel(level));
        }
        let cost = TowerStats::for_type(tower_type)
            .and_then(|stats| stats.build_cost(level))
            .ok_or_else(|| ActionError::UnknownTowerType(tower_type.to_string()))?;

        let mut state = self.state.lock();
        if !state.accepting_actions {
            return Err(ActionError::WrongPhase);
        }

        if !state.economy.spend_gold(player, cost) {
            let available = state.economy.get_gold(player);
            info!(player = %player, cost, available, "Build rejected: insufficient gold");
            return Err(ActionError::InsufficientGold {
                needed: cost,
                available,
            });
        }

        match state.placement.place_tower(player, tower_type, row, col, level) {
            Some(spec) => {
                info!(player = %player, tower_type, row, col, level, cost, "Tower built");
                Ok(spec)
            }
            None => {
                state.economy.add_gold(player, cost);
                info!(player = %player, row, col, "Build rejected: invalid placement, refunded");
                Err(ActionError::InvalidPlacement { row, col })
            }
        }
    }

    /// Price, charge and enqueue a batch of units, all or nothing
    pub fn add_units_to_wave(
        &self,
        player: PlayerId,
        requests: &[UnitRequest],
    ) -> Result<Vec<UnitSpec>, ActionError> {
        let mut state = self.state.lock();
        if !state.accepting_actions {
            return Err(ActionError::WrongPhase);
        }

        let (cost, units) = state.waves.prepare_units(player, requests);
        if units.is_empty() {
            return Err(ActionError::NoValidUnits);
        }

        if !state.economy.spend_gold(player, cost) {
            let available = state.economy.get_gold(player);
            info!(player = %player, cost, available, "Send rejected: insufficient gold");
            return Err(ActionError::InsufficientGold {
                needed: cost,
                available,
            });
        }

        let scheduled = state.waves.enqueue_units(units, self.settings.tick_rate);
        info!(player = %player, count = scheduled.len(), cost, "Units added to wave");
        Ok(scheduled)
    }

    /// Consistent snapshot of placed towers, castles and queued units
    pub fn get_current_state_snapshot(&self) -> SimulationData {
        let state = self.state.lock();
        self.snapshots
            .build(state.placement.towers(), state.waves.units(), self.settings.tick_rate)
    }

    /// Close the action gate and freeze the snapshot in one critical section.
    ///
    /// Nothing accepted after this call can miss the snapshot it returns.
    pub fn begin_combat_snapshot(&self) -> SimulationData {
        let mut state = self.state.lock();
        state.accepting_actions = false;
        self.snapshots
            .build(state.placement.towers(), state.waves.units(), self.settings.tick_rate)
    }

    /// Reopen builds and sends for the next preparation phase
    pub fn open_preparation(&self) {
        self.state.lock().accepting_actions = true;
    }

    pub fn is_accepting_actions(&self) -> bool {
        self.state.lock().accepting_actions
    }

    pub fn apply_round_result(&self, result: &RoundResult) -> PlayerTotals {
        let mut state = self.state.lock();
        state.economy.apply_round_result(result);
        state.economy.totals()
    }

    pub fn clear_wave_data(&self) {
        self.state.lock().waves.clear();
    }

    pub fn totals(&self) -> PlayerTotals {
        self.state.lock().economy.totals()
    }

    pub fn gold(&self, player: PlayerId) -> u32 {
        self.state.lock().economy.get_gold(player)
    }

    pub fn lives(&self, player: PlayerId) -> u32 {
        self.state.lock().economy.get_lives(player)
    }

    pub fn queued_units(&self) -> usize {
        self.state.lock().waves.len()
    }
}
