//! Snapshot building for the start of combat

use crate::ws::protocol::{PlayerId, SimulationData, TowerSpec, UnitSpec};

use super::map;
use super::stats::CASTLE_TOWER;

/// Composes placed towers and queued units into one immutable snapshot.
///
/// Callers must hold the lock guarding the towers and units they pass in so
/// the snapshot is a consistent point-in-time view.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    castles: Vec<TowerSpec>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        let castles = PlayerId::ALL
            .into_iter()
            .map(|player| {
                let (position_x, position_y) = map::castle_position(player);
                TowerSpec {
                    player_id: player,
                    tower_type: CASTLE_TOWER.to_string(),
                    position_x,
                    position_y,
                    level: 1,
                }
            })
            .collect();
        Self { castles }
    }

    /// The fixed base-defense towers injected into every snapshot
    pub fn castles(&self) -> &[TowerSpec] {
        &self.castles
    }

    /// Build a snapshot: placed towers, then castles, then queued units
    pub fn build<'a>(
        &self,
        placed: impl IntoIterator<Item = &'a TowerSpec>,
        queued: &[UnitSpec],
        tick_rate: u32,
    ) -> SimulationData {
        let towers = placed
            .into_iter()
            .cloned()
            .chain(self.castles.iter().cloned())
            .collect();

        SimulationData {
            tick_rate,
            towers,
            units: queued.to_vec(),
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}
