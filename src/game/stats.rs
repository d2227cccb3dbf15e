//! Static unit and tower stat tables

/// Extra damage fraction granted per tower level above 1
pub const LEVEL_DAMAGE_BONUS: f64 = 0.5;

/// Tower type injected at each base; never buildable
pub const CASTLE_TOWER: &str = "castle";

/// Unit stats per unit type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitStats {
    /// Starting (and maximum) health
    pub health: f64,
    /// Movement speed in pixels per second
    pub speed: f64,
    /// Gold charged to the sender
    pub cost: u32,
    /// Gold awarded to the player whose tower kills it
    pub bounty: u32,
    /// Lives removed from the defender when it reaches the base
    pub base_damage: u32,
}

impl UnitStats {
    pub fn for_type(unit_type: &str) -> Option<Self> {
        match unit_type {
            "basic" => Some(Self {
                health: 50.0,
                speed: 60.0,
                cost: 10,
                bounty: 5,
                base_damage: 1,
            }),
            "fast" => Some(Self {
                health: 30.0,
                speed: 110.0,
                cost: 15,
                bounty: 7,
                base_damage: 1,
            }),
            "tank" => Some(Self {
                health: 200.0,
                speed: 35.0,
                cost: 40,
                bounty: 20,
                base_damage: 3,
            }),
            _ => None,
        }
    }
}

/// Tower stats per tower type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TowerStats {
    /// Damage per shot at level 1
    pub damage: f64,
    /// Targeting radius in pixels
    pub range_px: f64,
    /// Ticks between shots
    pub cooldown_ticks: u32,
    /// Build cost at level 1; `None` for towers players cannot build
    pub cost: Option<u32>,
}

impl TowerStats {
    pub fn for_type(tower_type: &str) -> Option<Self> {
        match tower_type {
            "standard" => Some(Self {
                damage: 25.0,
                range_px: 120.0,
                cooldown_ticks: 10,
                cost: Some(50),
            }),
            "sniper" => Some(Self {
                damage: 60.0,
                range_px: 220.0,
                cooldown_ticks: 30,
                cost: Some(100),
            }),
            "rapid" => Some(Self {
                damage: 8.0,
                range_px: 90.0,
                cooldown_ticks: 3,
                cost: Some(75),
            }),
            CASTLE_TOWER => Some(Self {
                damage: 15.0,
                range_px: 140.0,
                cooldown_ticks: 15,
                cost: None,
            }),
            _ => None,
        }
    }

    /// Damage per shot at the given level
    pub fn damage_at(&self, level: u32) -> f64 {
        let bonus_levels = level.saturating_sub(1) as f64;
        self.damage * (1.0 + LEVEL_DAMAGE_BONUS * bonus_levels)
    }

    /// Gold needed to build at the given level, if buildable at all
    pub fn build_cost(&self, level: u32) -> Option<u32> {
        self.cost.and_then(|cost| cost.checked_mul(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_types_have_no_stats() {
        assert!(UnitStats::for_type("dragon").is_none());
        assert!(TowerStats::for_type("laser").is_none());
    }

    #[test]
    fn castle_is_not_buildable() {
        let castle = TowerStats::for_type(CASTLE_TOWER).unwrap();
        assert_eq!(castle.build_cost(1), None);
    }

    #[test]
    fn level_scales_damage_and_cost() {
        let standard = TowerStats::for_type("standard").unwrap();
        assert_eq!(standard.damage_at(1), 25.0);
        assert_eq!(standard.damage_at(3), 50.0);
        assert_eq!(standard.build_cost(2), Some(100));
    }
}
