//! Build grid and tower placement validation

use tracing::debug;

use crate::ws::protocol::{PlayerId, TowerSpec};

use super::map::{self, TileKind, GRID_COLS, GRID_ROWS};

/// State of one build cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Path,
    Blocked,
    Occupied,
}

impl From<TileKind> for CellState {
    fn from(tile: TileKind) -> Self {
        match tile {
            TileKind::Grass => Self::Empty,
            TileKind::Path => Self::Path,
            TileKind::Water => Self::Blocked,
        }
    }
}

#[derive(Debug, Clone)]
struct PlacedTower {
    row: usize,
    col: usize,
    spec: TowerSpec,
}

/// Grid shared by both players; zones are enforced by column range.
///
/// Mutations are transactional only relative to the caller's lock.
#[derive(Debug, Clone)]
pub struct PlacementValidator {
    grid: Vec<Vec<CellState>>,
    towers: Vec<PlacedTower>,
}

impl PlacementValidator {
    pub fn new(layout: &[Vec<TileKind>]) -> Self {
        let grid = layout
            .iter()
            .map(|row| row.iter().copied().map(CellState::from).collect())
            .collect();
        Self {
            grid,
            towers: Vec::new(),
        }
    }

    /// Grid derived from the standard match layout
    pub fn standard() -> Self {
        Self::new(&map::standard_layout())
    }

    pub fn cell(&self, row: i32, col: i32) -> Option<CellState> {
        let (row, col) = Self::index(row, col)?;
        self.grid.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn is_buildable(&self, row: i32, col: i32) -> bool {
        self.cell(row, col) == Some(CellState::Empty)
    }

    /// Buildable terrain inside the player's own zone
    pub fn validate_build(&self, player: PlayerId, row: i32, col: i32) -> bool {
        if !self.is_buildable(row, col) {
            return false;
        }
        // is_buildable already bounds-checked, so the cast is lossless
        map::zone_for(player).contains(&(col as usize))
    }

    /// Occupy a cell and record the tower. Returns `None` if the build is invalid.
    pub fn place_tower(
        &mut self,
        player: PlayerId,
        tower_type: &str,
        row: i32,
        col: i32,
        level: u32,
    ) -> Option<TowerSpec> {
        if !self.validate_build(player, row, col) {
            return None;
        }
        let (r, c) = Self::index(row, col)?;
        self.grid[r][c] = CellState::Occupied;

        let (position_x, position_y) = map::tile_center(r, c);
        let spec = TowerSpec {
            player_id: player,
            tower_type: tower_type.to_string(),
            position_x,
            position_y,
            level,
        };
        self.towers.push(PlacedTower {
            row: r,
            col: c,
            spec: spec.clone(),
        });
        debug!(player = %player, row, col, tower_type, "Tower placed on grid");
        Some(spec)
    }

    /// Roll back a placement
    pub fn clear_tower(&mut self, row: i32, col: i32) -> Option<TowerSpec> {
        let (r, c) = Self::index(row, col)?;
        let pos = self.towers.iter().position(|t| t.row == r && t.col == c)?;
        let removed = self.towers.remove(pos);
        self.grid[r][c] = CellState::Empty;
        Some(removed.spec)
    }

    /// Placed towers in build order
    pub fn towers(&self) -> impl Iterator<Item = &TowerSpec> {
        self.towers.iter().map(|t| &t.spec)
    }

    fn index(row: i32, col: i32) -> Option<(usize, usize)> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        (row < GRID_ROWS && col < GRID_COLS).then_some((row, col))
    }
}
