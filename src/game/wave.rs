//! Wave queue: accumulates unit sends and assigns spawn ticks per route

use std::collections::BTreeMap;

use tracing::info;

use crate::ws::protocol::{PlayerId, UnitRequest, UnitSpec};

use super::map;
use super::stats::UnitStats;

/// Minimum same-route spacing in seconds of simulation time
pub const SPAWN_SPACING_SECS: f64 = 0.5;

/// Ticks between consecutive spawns on the same route.
///
/// Ties round to even so every replay of the schedule agrees.
pub fn spawn_delay_ticks(tick_rate: u32) -> u32 {
    let ticks = (SPAWN_SPACING_SECS * tick_rate as f64).round_ties_even() as u32;
    ticks.max(1)
}

/// Units queued for the next combat round
#[derive(Debug, Default, Clone)]
pub struct WaveQueue {
    units: Vec<UnitSpec>,
    /// Last spawn tick handed out on each route this round
    last_spawn_tick: BTreeMap<u32, u32>,
}

impl WaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate requests and price them without touching the queue.
    ///
    /// Unknown unit types and routes are dropped.
    pub fn prepare_units(&self, player: PlayerId, requests: &[UnitRequest]) -> (u32, Vec<UnitSpec>) {
        let mut total_cost: u32 = 0;
        let mut normalized = Vec::with_capacity(requests.len());

        for request in requests {
            let Some(stats) = UnitStats::for_type(&request.unit_type) else {
                info!(player = %player, unit_type = %request.unit_type, "Dropping unknown unit type");
                continue;
            };
            if !map::is_known_route(request.route) {
                info!(player = %player, route = request.route, "Dropping unit on unknown route");
                continue;
            }
            total_cost = total_cost.saturating_add(stats.cost);
            normalized.push(UnitSpec {
                player_id: player,
                unit_type: request.unit_type.clone(),
                route: request.route,
                spawn_tick: 0,
            });
        }

        (total_cost, normalized)
    }

    /// Schedule and append units. Returns the units with their final spawn ticks.
    ///
    /// A preset `spawn_tick` is a floor: it is honoured when it keeps at least
    /// one spawn delay after the previous unit on its route, and pushed back to
    /// that point otherwise. Unset ticks (0) take the next free slot.
    pub fn enqueue_units(&mut self, mut units: Vec<UnitSpec>, tick_rate: u32) -> Vec<UnitSpec> {
        let delay = spawn_delay_ticks(tick_rate);

        // Stable: units without a preset tick keep request order
        units.sort_by_key(|u| u.spawn_tick);

        for unit in units.iter_mut() {
            let last = self.last_spawn_tick.entry(unit.route).or_insert(0);
            let earliest = last.saturating_add(delay);
            unit.spawn_tick = unit.spawn_tick.max(earliest);
            *last = unit.spawn_tick;
        }

        self.units.extend(units.iter().cloned());
        units
    }

    pub fn units(&self) -> &[UnitSpec] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Drop all queued units and the per-route schedule
    pub fn clear(&mut self) {
        self.units.clear();
        self.last_spawn_tick.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(unit_type: &str, route: u32) -> UnitRequest {
        UnitRequest {
            unit_type: unit_type.to_string(),
            route,
        }
    }

    #[test]
    fn delay_is_half_a_second_and_at_least_one_tick() {
        assert_eq!(spawn_delay_ticks(20), 10);
        assert_eq!(spawn_delay_ticks(30), 15);
        assert_eq!(spawn_delay_ticks(1), 1);
        assert_eq!(spawn_delay_ticks(5), 2);
        assert_eq!(spawn_delay_ticks(7), 4);
    }

    #[test]
    fn prepare_filters_and_prices_without_mutation() {
        let queue = WaveQueue::new();
        let (cost, units) = queue.prepare_units(
            PlayerId::A,
            &[request("basic", 1), request("dragon", 1), request("tank", 7), request("fast", 2)],
        );
        assert_eq!(cost, 10 + 15);
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.spawn_tick == 0 && u.player_id == PlayerId::A));
        assert!(queue.is_empty());
    }

    #[test]
    fn same_route_units_are_spaced_and_schedule_persists() {
        let mut queue = WaveQueue::new();
        let (_, units) = queue.prepare_units(PlayerId::B, &[request("basic", 1), request("basic", 1)]);
        let first = queue.enqueue_units(units, 20);
        assert_eq!(first.iter().map(|u| u.spawn_tick).collect::<Vec<_>>(), vec![10, 20]);

        let (_, units) = queue.prepare_units(PlayerId::B, &[request("fast", 1)]);
        let second = queue.enqueue_units(units, 20);
        assert_eq!(second[0].spawn_tick, 30);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn routes_are_scheduled_independently() {
        let mut queue = WaveQueue::new();
        let (_, units) = queue.prepare_units(
            PlayerId::A,
            &[request("basic", 1), request("basic", 2), request("basic", 1)],
        );
        let scheduled = queue.enqueue_units(units, 20);
        let ticks: Vec<(u32, u32)> = scheduled.iter().map(|u| (u.route, u.spawn_tick)).collect();
        assert_eq!(ticks, vec![(1, 10), (2, 10), (1, 20)]);
    }

    fn preset(route: u32, spawn_tick: u32) -> UnitSpec {
        UnitSpec {
            player_id: PlayerId::A,
            unit_type: "basic".to_string(),
            route,
            spawn_tick,
        }
    }

    #[test]
    fn preset_ticks_are_ordered_and_keep_spacing() {
        let mut queue = WaveQueue::new();
        let scheduled = queue.enqueue_units(vec![preset(1, 25), preset(1, 0), preset(1, 12)], 20);
        let ticks: Vec<u32> = scheduled.iter().map(|u| u.spawn_tick).collect();
        assert_eq!(ticks, vec![10, 20, 30]);

        // A late preset tick is honoured and later units follow it
        let scheduled = queue.enqueue_units(vec![preset(1, 80), preset(2, 3)], 20);
        assert_eq!(scheduled[0].spawn_tick, 10);
        assert_eq!(scheduled[0].route, 2);
        assert_eq!(scheduled[1].spawn_tick, 80);
        let next = queue.enqueue_units(vec![preset(1, 0)], 20);
        assert_eq!(next[0].spawn_tick, 90);
    }

    #[test]
    fn clear_resets_the_schedule() {
        let mut queue = WaveQueue::new();
        let (_, units) = queue.prepare_units(PlayerId::A, &[request("basic", 3)]);
        queue.enqueue_units(units.clone(), 20);
        queue.clear();
        assert!(queue.is_empty());
        let again = queue.enqueue_units(units, 20);
        assert_eq!(again[0].spawn_tick, 10);
    }
}
