//! Deterministic fixed-timestep combat simulation
//!
//! A [`GameState`] is built from one immutable [`SimulationData`] snapshot and
//! stepped with [`GameState::update_tick`]. Given the same snapshot it yields
//! the same outcome on every host: all arithmetic is IEEE 754 `f64`, entities
//! are iterated in snapshot order, and units are targeted in spawn order.

use tracing::{debug, warn};

use crate::ws::protocol::{PlayerId, SimulationData};

use super::entities::{SimTower, SimUnit};
use super::map;
use super::stats::{TowerStats, UnitStats};

/// Construction failures. These mean an unvalidated snapshot reached the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("tick rate must be positive")]
    InvalidTickRate,

    #[error("unknown unit type: {0}")]
    UnknownUnitType(String),

    #[error("unknown tower type: {0}")]
    UnknownTowerType(String),

    #[error("unknown route: {0}")]
    UnknownRoute(u32),
}

/// End-of-combat timing gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatTiming {
    /// Combat never completes before this tick
    pub min_duration_ticks: u32,
    /// Ticks to hold after the last unit goes inactive
    pub post_combat_delay_ticks: u32,
}

impl CombatTiming {
    pub fn from_secs(tick_rate: u32, min_duration_secs: f64, post_combat_delay_secs: f64) -> Self {
        let to_ticks = |secs: f64| (secs * tick_rate as f64).round().max(0.0) as u32;
        Self {
            min_duration_ticks: to_ticks(min_duration_secs),
            post_combat_delay_ticks: to_ticks(post_combat_delay_secs),
        }
    }
}

/// What one combat produced, per player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub ticks: u32,
    pub kills_player_a: u32,
    pub kills_player_b: u32,
    pub lives_lost_player_a: u32,
    pub lives_lost_player_b: u32,
    /// Bounties collected by each player's towers
    pub gold_earned_player_a: u32,
    pub gold_earned_player_b: u32,
    /// True if the tick ceiling cut the run short
    pub truncated: bool,
}

/// All entities of one round of combat
#[derive(Debug, Clone)]
pub struct GameState {
    tick_rate: u32,
    sim_dt: f64,
    current_tick: u32,

    units: Vec<SimUnit>,
    towers: Vec<SimTower>,
    /// Indices into `units` of live units, in spawn order
    active_units: Vec<usize>,
    /// Units not yet spawned
    pending_spawns: usize,

    kills_by_player: [u32; 2],
    lives_lost_by_player: [u32; 2],
    gold_earned_by_player: [u32; 2],

    min_duration_ticks: u32,
    post_combat_delay_ticks: u32,
    last_unit_inactive_tick: Option<u32>,
}

impl GameState {
    /// Build entities from a snapshot. Fails fast on any unknown key.
    pub fn new(data: &SimulationData, timing: CombatTiming) -> Result<Self, SimulationError> {
        if data.tick_rate == 0 {
            return Err(SimulationError::InvalidTickRate);
        }

        let mut next_id: u32 = 1;

        let mut towers = Vec::with_capacity(data.towers.len());
        for spec in &data.towers {
            let stats = TowerStats::for_type(&spec.tower_type)
                .ok_or_else(|| SimulationError::UnknownTowerType(spec.tower_type.clone()))?;
            towers.push(SimTower::new(
                next_id,
                spec.player_id,
                &spec.tower_type,
                &stats,
                spec.position_x,
                spec.position_y,
                spec.level.max(1),
            ));
            next_id += 1;
        }

        let mut units = Vec::with_capacity(data.units.len());
        for spec in &data.units {
            let stats = UnitStats::for_type(&spec.unit_type)
                .ok_or_else(|| SimulationError::UnknownUnitType(spec.unit_type.clone()))?;
            let path = map::route_path(spec.route, spec.player_id)
                .ok_or(SimulationError::UnknownRoute(spec.route))?;
            units.push(SimUnit::new(
                next_id,
                spec.player_id,
                &spec.unit_type,
                &stats,
                path,
                spec.spawn_tick,
            ));
            next_id += 1;
        }

        let pending_spawns = units.len();
        Ok(Self {
            tick_rate: data.tick_rate,
            sim_dt: 1.0 / data.tick_rate as f64,
            current_tick: 0,
            units,
            towers,
            active_units: Vec::new(),
            pending_spawns,
            kills_by_player: [0; 2],
            lives_lost_by_player: [0; 2],
            gold_earned_by_player: [0; 2],
            min_duration_ticks: timing.min_duration_ticks,
            post_combat_delay_ticks: timing.post_combat_delay_ticks,
            last_unit_inactive_tick: None,
        })
    }

    /// Advance exactly one tick. The step order is part of the determinism contract.
    pub fn update_tick(&mut self) {
        // 1. spawns due this tick, in snapshot order
        if self.pending_spawns > 0 {
            for (idx, unit) in self.units.iter_mut().enumerate() {
                if !unit.spawned && unit.spawn_tick <= self.current_tick {
                    unit.spawn();
                    self.active_units.push(idx);
                    self.pending_spawns -= 1;
                }
            }
        }

        // 2. refresh the active list
        let units = &self.units;
        self.active_units.retain(|&idx| units[idx].is_active);

        // 3. movement
        let mut reached_base = Vec::new();
        for &idx in &self.active_units {
            if self.units[idx].advance(self.sim_dt) {
                reached_base.push(idx);
            }
        }

        // 4. towers
        for tower in self.towers.iter_mut() {
            if !tower.is_active || !tower.tick_cooldown() {
                continue;
            }
            let Some(target_idx) = tower.select_target(&self.units, &self.active_units) else {
                continue;
            };
            let target = &mut self.units[target_idx];
            tower.fire(target.entity_id);
            if target.take_damage(tower.damage) {
                let shooter = tower.player_id.index();
                self.kills_by_player[shooter] += 1;
                self.gold_earned_by_player[shooter] += target.bounty;
            }
        }

        // 5. base damage is charged to the side being attacked
        for idx in reached_base {
            let unit = &self.units[idx];
            let defender = unit.player_id.opponent().index();
            self.lives_lost_by_player[defender] += unit.base_damage;
        }

        // 6. drop the dead and the arrived
        let units = &self.units;
        self.active_units.retain(|&idx| units[idx].is_active);

        // 7. completion latch
        if self.last_unit_inactive_tick.is_none()
            && self.active_units.is_empty()
            && self.pending_spawns == 0
            && self.current_tick >= self.min_duration_ticks
        {
            self.last_unit_inactive_tick = Some(self.current_tick);
            debug!(tick = self.current_tick, "All units resolved");
        }

        // 8.
        self.current_tick += 1;
    }

    pub fn is_simulation_complete(&self) -> bool {
        if self.current_tick < self.min_duration_ticks {
            return false;
        }
        match self.last_unit_inactive_tick {
            Some(latched) => self.current_tick - latched >= self.post_combat_delay_ticks,
            None => false,
        }
    }

    /// Step until complete or until `max_ticks` have run in total
    pub fn run_to_completion(&mut self, max_ticks: u32) -> SimulationOutcome {
        while !self.is_simulation_complete() {
            if self.current_tick >= max_ticks {
                warn!(
                    ticks = self.current_tick,
                    active_units = self.active_units.len(),
                    "Simulation hit tick ceiling before completing"
                );
                return self.outcome(true);
            }
            self.update_tick();
        }
        self.outcome(false)
    }

    pub fn outcome(&self, truncated: bool) -> SimulationOutcome {
        SimulationOutcome {
            ticks: self.current_tick,
            kills_player_a: self.kills_by(PlayerId::A),
            kills_player_b: self.kills_by(PlayerId::B),
            lives_lost_player_a: self.lives_lost(PlayerId::A),
            lives_lost_player_b: self.lives_lost(PlayerId::B),
            gold_earned_player_a: self.gold_earned(PlayerId::A),
            gold_earned_player_b: self.gold_earned(PlayerId::B),
            truncated,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    pub fn kills_by(&self, player: PlayerId) -> u32 {
        self.kills_by_player[player.index()]
    }

    pub fn lives_lost(&self, player: PlayerId) -> u32 {
        self.lives_lost_by_player[player.index()]
    }

    pub fn gold_earned(&self, player: PlayerId) -> u32 {
        self.gold_earned_by_player[player.index()]
    }

    pub fn last_unit_inactive_tick(&self) -> Option<u32> {
        self.last_unit_inactive_tick
    }

    pub fn units(&self) -> &[SimUnit] {
        &self.units
    }

    pub fn towers(&self) -> &[SimTower] {
        &self.towers
    }

    /// Live units in spawn order
    pub fn active_units(&self) -> impl Iterator<Item = &SimUnit> {
        self.active_units.iter().map(|&idx| &self.units[idx])
    }
}
