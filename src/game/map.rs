//! Static map: tile grid, player zones, and the route table

use std::ops::RangeInclusive;

use crate::ws::protocol::PlayerId;

/// Edge length of one tile in pixels
pub const TILE_SIZE: f64 = 32.0;
pub const GRID_ROWS: usize = 16;
pub const GRID_COLS: usize = 40;

/// Columns player A may build in
pub const PLAYER_A_ZONE: RangeInclusive<usize> = 0..=19;
/// Columns player B may build in
pub const PLAYER_B_ZONE: RangeInclusive<usize> = 20..=39;

const RIVER_COLS: RangeInclusive<usize> = 19..=20;
const LAKE_ROWS: RangeInclusive<usize> = 10..=11;
const LAKE_COLS: RangeInclusive<usize> = 8..=10;

/// Base-defense tower tiles (row, col)
const CASTLE_TILE_A: (usize, usize) = (6, 1);
const CASTLE_TILE_B: (usize, usize) = (6, 38);

/// Route waypoints as (row, col), written from A's base to B's base
const ROUTES: [(u32, &[(usize, usize)]); 3] = [
    (1, &[(8, 0), (8, 3), (3, 3), (3, 36), (8, 36), (8, 39)]),
    (2, &[(8, 0), (8, 39)]),
    (3, &[(8, 0), (8, 3), (13, 3), (13, 36), (8, 36), (8, 39)]),
];

/// Terrain of a single tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Grass,
    Path,
    Water,
}

/// Column range a player may build in
pub fn zone_for(player: PlayerId) -> RangeInclusive<usize> {
    match player {
        PlayerId::A => PLAYER_A_ZONE,
        PlayerId::B => PLAYER_B_ZONE,
    }
}

/// Pixel centre of a tile
pub fn tile_center(row: usize, col: usize) -> (f64, f64) {
    (
        col as f64 * TILE_SIZE + TILE_SIZE / 2.0,
        row as f64 * TILE_SIZE + TILE_SIZE / 2.0,
    )
}

/// Pixel centre of a player's castle
pub fn castle_position(player: PlayerId) -> (f64, f64) {
    let (row, col) = match player {
        PlayerId::A => CASTLE_TILE_A,
        PlayerId::B => CASTLE_TILE_B,
    };
    tile_center(row, col)
}

/// Tile waypoints for a route, or `None` if the route is unknown
pub fn route_waypoints(route: u32) -> Option<&'static [(usize, usize)]> {
    ROUTES
        .iter()
        .find(|(id, _)| *id == route)
        .map(|(_, waypoints)| *waypoints)
}

pub fn is_known_route(route: u32) -> bool {
    route_waypoints(route).is_some()
}

/// Pixel polyline a unit owned by `player` follows on `route`.
///
/// A's units walk toward B's base (left to right); B's units walk the
/// same tiles in reverse.
pub fn route_path(route: u32, player: PlayerId) -> Option<Vec<(f64, f64)>> {
    let waypoints = route_waypoints(route)?;
    let mut path: Vec<(f64, f64)> = waypoints
        .iter()
        .map(|&(row, col)| tile_center(row, col))
        .collect();
    if player == PlayerId::B {
        path.reverse();
    }
    Some(path)
}

/// The fixed tile layout every match is played on
pub fn standard_layout() -> Vec<Vec<TileKind>> {
    let mut tiles = vec![vec![TileKind::Grass; GRID_COLS]; GRID_ROWS];

    for row in tiles.iter_mut() {
        for col in RIVER_COLS {
            row[col] = TileKind::Water;
        }
    }
    for row in LAKE_ROWS {
        for col in LAKE_COLS {
            tiles[row][col] = TileKind::Water;
        }
    }

    // Paths are carved last so route crossings over the river become bridges
    for (_, waypoints) in ROUTES.iter() {
        for segment in waypoints.windows(2) {
            let (r0, c0) = segment[0];
            let (r1, c1) = segment[1];
            if r0 == r1 {
                for col in c0.min(c1)..=c0.max(c1) {
                    tiles[r0][col] = TileKind::Path;
                }
            } else {
                for row in r0.min(r1)..=r0.max(r1) {
                    tiles[row][c0] = TileKind::Path;
                }
            }
        }
    }

    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_are_axis_aligned_and_in_bounds() {
        for (_, waypoints) in ROUTES.iter() {
            for segment in waypoints.windows(2) {
                let (r0, c0) = segment[0];
                let (r1, c1) = segment[1];
                assert!(r0 == r1 || c0 == c1);
            }
            for &(row, col) in waypoints.iter() {
                assert!(row < GRID_ROWS && col < GRID_COLS);
            }
        }
    }

    #[test]
    fn player_b_walks_routes_in_reverse() {
        let forward = route_path(1, PlayerId::A).unwrap();
        let mut backward = route_path(1, PlayerId::B).unwrap();
        backward.reverse();
        assert_eq!(forward, backward);
        assert_eq!(forward[0], tile_center(8, 0));
    }

    #[test]
    fn unknown_route_has_no_path() {
        assert!(route_path(0, PlayerId::A).is_none());
        assert!(route_path(9, PlayerId::B).is_none());
    }

    #[test]
    fn layout_has_bridges_river_and_lake() {
        let tiles = standard_layout();
        assert_eq!(tiles[3][19], TileKind::Path);
        assert_eq!(tiles[0][19], TileKind::Water);
        assert_eq!(tiles[10][9], TileKind::Water);
        assert_eq!(tiles[4][15], TileKind::Grass);
        assert_eq!(tiles[3][15], TileKind::Path);
    }

    #[test]
    fn zones_split_the_map() {
        assert!(zone_for(PlayerId::A).contains(&15));
        assert!(!zone_for(PlayerId::A).contains(&25));
        assert!(zone_for(PlayerId::B).contains(&25));
        assert_eq!(*PLAYER_B_ZONE.end(), GRID_COLS - 1);
    }
}
