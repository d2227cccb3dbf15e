//! Runtime simulation entities: units and towers

use crate::ws::protocol::PlayerId;

use super::stats::{TowerStats, UnitStats};

/// Distance behind the first waypoint where a unit appears
pub const SPAWN_OFFSET_PX: f64 = 32.0;

/// Ticks the shooting animation flag stays up after a shot
pub const SHOOT_ANIM_TICKS: u32 = 6;

/// Euclidean distance via `sqrt`, which IEEE 754 rounds exactly
pub fn distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = bx - ax;
    let dy = by - ay;
    (dx * dx + dy * dy).sqrt()
}

/// A unit walking a route toward the opposing base
#[derive(Debug, Clone)]
pub struct SimUnit {
    pub entity_id: u32,
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub is_active: bool,

    pub unit_type: String,
    pub health: f64,
    pub max_health: f64,
    /// Pixels per second
    pub speed: f64,
    pub path: Vec<(f64, f64)>,
    /// Index of the waypoint currently being walked toward
    pub current_path_index: usize,
    pub base_damage: u32,
    pub bounty: u32,

    pub spawn_tick: u32,
    pub spawned: bool,
    pub reached_base: bool,

    // Entry easing, consumed by renderers only
    pub spawn_offset: f64,
    pub ease_progress: f64,
}

impl SimUnit {
    pub fn new(
        entity_id: u32,
        player_id: PlayerId,
        unit_type: &str,
        stats: &UnitStats,
        path: Vec<(f64, f64)>,
        spawn_tick: u32,
    ) -> Self {
        let (x, y) = path.first().copied().unwrap_or((0.0, 0.0));
        Self {
            entity_id,
            player_id,
            x,
            y,
            is_active: false,
            unit_type: unit_type.to_string(),
            health: stats.health,
            max_health: stats.health,
            speed: stats.speed,
            path,
            current_path_index: 0,
            base_damage: stats.base_damage,
            bounty: stats.bounty,
            spawn_tick,
            spawned: false,
            reached_base: false,
            spawn_offset: SPAWN_OFFSET_PX,
            ease_progress: 0.0,
        }
    }

    /// Place the unit behind its first waypoint and activate it
    pub fn spawn(&mut self) {
        self.spawned = true;
        self.is_active = true;

        let (start_x, start_y) = match self.path.first() {
            Some(&p) => p,
            None => {
                // An empty path has nowhere to go
                self.reached_base = true;
                self.is_active = false;
                return;
            }
        };

        let (dir_x, dir_y) = match self.path.get(1) {
            Some(&(nx, ny)) => {
                let len = distance(start_x, start_y, nx, ny);
                if len > 0.0 {
                    ((nx - start_x) / len, (ny - start_y) / len)
                } else {
                    (0.0, 0.0)
                }
            }
            None => (0.0, 0.0),
        };

        self.x = start_x - dir_x * self.spawn_offset;
        self.y = start_y - dir_y * self.spawn_offset;
        self.current_path_index = 0;
        self.ease_progress = if self.spawn_offset > 0.0 { 0.0 } else { 1.0 };
    }

    /// Walk `speed * dt` pixels along the path, crossing as many waypoints as
    /// the distance allows. Returns true if the unit reached the base.
    pub fn advance(&mut self, dt: f64) -> bool {
        let step = self.speed * dt;
        let mut remaining = step;

        while remaining > 0.0 && self.current_path_index < self.path.len() {
            let (tx, ty) = self.path[self.current_path_index];
            let dist = distance(self.x, self.y, tx, ty);
            if dist <= remaining {
                self.x = tx;
                self.y = ty;
                remaining -= dist;
                self.current_path_index += 1;
            } else {
                self.x += (tx - self.x) / dist * remaining;
                self.y += (ty - self.y) / dist * remaining;
                remaining = 0.0;
            }
        }

        if self.ease_progress < 1.0 {
            self.ease_progress = (self.ease_progress + step / self.spawn_offset).min(1.0);
        }

        if self.current_path_index >= self.path.len() {
            self.reached_base = true;
            self.is_active = false;
            return true;
        }
        false
    }

    /// Apply damage, clamping at zero. Returns true if this hit was lethal.
    pub fn take_damage(&mut self, amount: f64) -> bool {
        if !self.is_active {
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        if self.health <= 0.0 {
            self.is_active = false;
            return true;
        }
        false
    }
}

/// A stationary tower
#[derive(Debug, Clone)]
pub struct SimTower {
    pub entity_id: u32,
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub is_active: bool,

    pub tower_type: String,
    pub level: u32,
    pub damage: f64,
    pub range_px: f64,
    pub cooldown_ticks: u32,
    pub current_cooldown: u32,
    pub last_shot_target: Option<u32>,
    pub shoot_anim_timer: u32,
}

impl SimTower {
    pub fn new(
        entity_id: u32,
        player_id: PlayerId,
        tower_type: &str,
        stats: &TowerStats,
        x: f64,
        y: f64,
        level: u32,
    ) -> Self {
        Self {
            entity_id,
            player_id,
            x,
            y,
            is_active: true,
            tower_type: tower_type.to_string(),
            level,
            damage: stats.damage_at(level),
            range_px: stats.range_px,
            cooldown_ticks: stats.cooldown_ticks,
            current_cooldown: 0,
            last_shot_target: None,
            shoot_anim_timer: 0,
        }
    }

    /// Count down timers; returns true when the tower may fire this tick
    pub fn tick_cooldown(&mut self) -> bool {
        self.current_cooldown = self.current_cooldown.saturating_sub(1);
        self.shoot_anim_timer = self.shoot_anim_timer.saturating_sub(1);
        self.current_cooldown == 0
    }

    /// Nearest in-range enemy among `candidates`, scanned in order.
    ///
    /// A strictly smaller distance is required to replace the current best,
    /// so equidistant units resolve to the one earliest in the list.
    pub fn select_target(&self, units: &[SimUnit], candidates: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &idx in candidates {
            let unit = &units[idx];
            if !unit.is_active || unit.player_id == self.player_id {
                continue;
            }
            let dist = distance(self.x, self.y, unit.x, unit.y);
            if dist > self.range_px {
                continue;
            }
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((idx, dist)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Record a shot at `target_id` and restart the cooldown
    pub fn fire(&mut self, target_id: u32) {
        self.current_cooldown = self.cooldown_ticks;
        self.last_shot_target = Some(target_id);
        self.shoot_anim_timer = SHOOT_ANIM_TICKS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_unit(player: PlayerId, path: Vec<(f64, f64)>) -> SimUnit {
        let stats = UnitStats::for_type("basic").unwrap();
        SimUnit::new(1, player, "basic", &stats, path, 0)
    }

    #[test]
    fn spawn_starts_behind_first_waypoint() {
        let mut unit = basic_unit(PlayerId::A, vec![(100.0, 50.0), (200.0, 50.0)]);
        unit.spawn();
        assert!(unit.is_active);
        assert_eq!((unit.x, unit.y), (100.0 - SPAWN_OFFSET_PX, 50.0));
        assert_eq!(unit.ease_progress, 0.0);
    }

    #[test]
    fn advance_carries_leftover_distance_across_waypoints() {
        let mut unit = basic_unit(PlayerId::A, vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (10.0, 100.0)]);
        unit.spawn_offset = 0.0;
        unit.spawn();
        unit.speed = 25.0;
        assert!(!unit.advance(1.0));
        assert_eq!(unit.current_path_index, 3);
        assert_eq!((unit.x, unit.y), (10.0, 15.0));
    }

    #[test]
    fn advance_past_last_waypoint_reaches_base() {
        let mut unit = basic_unit(PlayerId::B, vec![(0.0, 0.0), (5.0, 0.0)]);
        unit.spawn_offset = 0.0;
        unit.spawn();
        assert!(unit.advance(1.0));
        assert!(unit.reached_base);
        assert!(!unit.is_active);
    }

    #[test]
    fn damage_clamps_at_zero_and_reports_kill_once() {
        let mut unit = basic_unit(PlayerId::A, vec![(0.0, 0.0), (5.0, 0.0)]);
        unit.spawn();
        assert!(!unit.take_damage(30.0));
        assert!(unit.take_damage(30.0));
        assert_eq!(unit.health, 0.0);
        assert!(!unit.take_damage(30.0));
    }

    #[test]
    fn towers_ignore_friendly_units_and_break_ties_by_order() {
        let stats = TowerStats::for_type("standard").unwrap();
        let tower = SimTower::new(1, PlayerId::A, "standard", &stats, 0.0, 0.0, 1);

        let mut friendly = basic_unit(PlayerId::A, vec![(1.0, 0.0)]);
        friendly.spawn_offset = 0.0;
        friendly.spawn();
        let mut left = basic_unit(PlayerId::B, vec![(-50.0, 0.0)]);
        left.spawn_offset = 0.0;
        left.spawn();
        let mut right = basic_unit(PlayerId::B, vec![(50.0, 0.0)]);
        right.spawn_offset = 0.0;
        right.spawn();

        let units = vec![friendly, right, left];
        assert_eq!(tower.select_target(&units, &[0, 1, 2]), Some(1));
        assert_eq!(tower.select_target(&units, &[0, 2, 1]), Some(2));
        assert_eq!(tower.select_target(&units, &[0]), None);
    }
}
