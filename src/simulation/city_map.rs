//! City tile grid and its presentation annotations
//!
//! The engine only cares about which tiles are roads; road directions and
//! building orientations are stored so a saved city renders the same way
//! after loading.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::catalog::ZoneType;
use super::types::GridPos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileType {
    #[default]
    Grass,
    Road,
    Warehouse,
    Zone(ZoneType),
}

impl TileType {
    fn from_char(c: char) -> Option<TileType> {
        let tile = match c {
            '.' => TileType::Grass,
            '#' => TileType::Road,
            'W' => TileType::Warehouse,
            'S' => TileType::Zone(ZoneType::Shop),
            'C' => TileType::Zone(ZoneType::School),
            'G' => TileType::Zone(ZoneType::Gym),
            'O' => TileType::Zone(ZoneType::Office),
            'H' => TileType::Zone(ZoneType::Hospital),
            'M' => TileType::Zone(ZoneType::Subway),
            'U' => TileType::Zone(ZoneType::University),
            'P' => TileType::Zone(ZoneType::Park),
            _ => return None,
        };
        Some(tile)
    }

    pub fn is_building(&self) -> bool {
        matches!(self, TileType::Warehouse | TileType::Zone(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadDirection {
    Horizontal,
    Vertical,
    Intersection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    North,
    East,
    South,
    West,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityMapState {
    pub width: u32,
    pub height: u32,
    /// Row-major, `width * height` entries
    pub tiles: Vec<TileType>,
    pub road_directions: BTreeMap<GridPos, RoadDirection>,
    pub building_orientations: BTreeMap<GridPos, Orientation>,
    pub warehouse_road_position: Option<GridPos>,
}

impl Default for CityMapState {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl CityMapState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![TileType::Grass; (width * height) as usize],
            road_directions: BTreeMap::new(),
            building_orientations: BTreeMap::new(),
            warehouse_road_position: None,
        }
    }

    /// Parse a map drawn one string per row
    ///
    /// `.` grass, `#` road, `W` warehouse, zone letters `S C G O H M U P`
    /// (shop, school, gym, office, hospital, subway, university, park).
    pub fn from_rows(rows: &[&str]) -> Result<Self> {
        let height = rows.len() as u32;
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0) as u32;
        let mut map = Self::new(width, height);

        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() as u32 != width {
                anyhow::bail!("row {} has {} tiles, expected {}", y, row.chars().count(), width);
            }
            for (x, c) in row.chars().enumerate() {
                let tile = TileType::from_char(c)
                    .ok_or_else(|| anyhow::anyhow!("unknown tile '{}' at ({}, {})", c, x, y))?;
                map.set_tile(GridPos::new(x as i32, y as i32), tile);
            }
        }

        map.derive_road_directions();
        map.derive_building_orientations();
        Ok(map)
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn tile(&self, pos: GridPos) -> Option<TileType> {
        self.index(pos).and_then(|i| self.tiles.get(i).copied())
    }

    /// Returns false if `pos` is off the map
    pub fn set_tile(&mut self, pos: GridPos, tile: TileType) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    fn positions(&self) -> impl Iterator<Item = GridPos> + '_ {
        (0..self.height as i32).flat_map(move |y| (0..self.width as i32).map(move |x| GridPos::new(x, y)))
    }

    /// Traversable tiles: every road tile plus the warehouse road entry
    pub fn road_tiles(&self) -> Vec<GridPos> {
        let mut tiles: Vec<GridPos> = self
            .positions()
            .filter(|pos| self.tile(*pos) == Some(TileType::Road))
            .collect();
        if let Some(entry) = self.warehouse_road_position {
            if !tiles.contains(&entry) {
                tiles.push(entry);
                tiles.sort();
            }
        }
        tiles
    }

    pub fn zone_tiles(&self) -> Vec<(GridPos, ZoneType)> {
        self.positions()
            .filter_map(|pos| match self.tile(pos) {
                Some(TileType::Zone(zone_type)) => Some((pos, zone_type)),
                _ => None,
            })
            .collect()
    }

    fn is_road(&self, pos: GridPos) -> bool {
        self.tile(pos) == Some(TileType::Road)
    }

    /// Recompute the direction annotation of every road tile
    pub fn derive_road_directions(&mut self) {
        let directions: BTreeMap<GridPos, RoadDirection> = self
            .positions()
            .filter(|pos| self.is_road(*pos))
            .map(|pos| {
                let horizontal = self.is_road(GridPos::new(pos.x - 1, pos.y))
                    || self.is_road(GridPos::new(pos.x + 1, pos.y));
                let vertical = self.is_road(GridPos::new(pos.x, pos.y - 1))
                    || self.is_road(GridPos::new(pos.x, pos.y + 1));
                let direction = match (horizontal, vertical) {
                    (true, true) => RoadDirection::Intersection,
                    (false, true) => RoadDirection::Vertical,
                    _ => RoadDirection::Horizontal,
                };
                (pos, direction)
            })
            .collect();
        self.road_directions = directions;
    }

    /// Turn every building to face its first adjacent road
    ///
    /// Buildings with no adjacent road keep their current orientation.
    pub fn derive_building_orientations(&mut self) {
        let updates: Vec<(GridPos, Orientation)> = self
            .positions()
            .filter(|pos| self.tile(*pos).is_some_and(|t| t.is_building()))
            .filter_map(|pos| {
                [
                    (GridPos::new(pos.x, pos.y + 1), Orientation::South),
                    (GridPos::new(pos.x + 1, pos.y), Orientation::East),
                    (GridPos::new(pos.x, pos.y - 1), Orientation::North),
                    (GridPos::new(pos.x - 1, pos.y), Orientation::West),
                ]
                .into_iter()
                .find(|(neighbour, _)| self.is_road(*neighbour))
                .map(|(_, orientation)| (pos, orientation))
            })
            .collect();
        self.building_orientations.extend(updates);
    }

    /// Whether the grid and its annotations agree with the map size
    pub fn is_consistent(&self) -> bool {
        self.tiles.len() == (self.width as usize) * (self.height as usize)
            && self.road_directions.keys().all(|pos| self.in_bounds(*pos))
            && self.building_orientations.keys().all(|pos| self.in_bounds(*pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CityMapState {
        CityMapState::from_rows(&[
            "W###.", //
            ".#.S.", //
            ".###.",
        ])
        .expect("valid map")
    }

    #[test]
    fn parses_rows_into_tiles() {
        let map = sample();
        assert_eq!((map.width, map.height), (5, 3));
        assert_eq!(map.tile(GridPos::new(0, 0)), Some(TileType::Warehouse));
        assert_eq!(map.tile(GridPos::new(3, 1)), Some(TileType::Zone(ZoneType::Shop)));
        assert_eq!(map.tile(GridPos::new(9, 9)), None);
        assert_eq!(map.zone_tiles(), vec![(GridPos::new(3, 1), ZoneType::Shop)]);
        assert_eq!(map.road_tiles().len(), 7);
    }

    #[test]
    fn rejects_bad_rows() {
        assert!(CityMapState::from_rows(&["##", "#"]).is_err());
        assert!(CityMapState::from_rows(&["#?"]).is_err());
    }

    #[test]
    fn road_directions_follow_neighbours() {
        let map = sample();
        assert_eq!(map.road_directions[&GridPos::new(2, 0)], RoadDirection::Horizontal);
        assert_eq!(map.road_directions[&GridPos::new(1, 0)], RoadDirection::Intersection);
        assert_eq!(map.road_directions[&GridPos::new(1, 1)], RoadDirection::Vertical);
    }

    #[test]
    fn buildings_face_a_road() {
        let map = sample();
        assert_eq!(map.building_orientations[&GridPos::new(3, 1)], Orientation::South);
        assert_eq!(map.building_orientations[&GridPos::new(0, 0)], Orientation::East);
    }

    #[test]
    fn warehouse_entry_counts_as_road() {
        let mut map = sample();
        map.warehouse_road_position = Some(GridPos::new(0, 1));
        let tiles = map.road_tiles();
        assert!(tiles.contains(&GridPos::new(0, 1)));
        assert!(tiles.windows(2).all(|w| w[0] < w[1]));
        assert!(map.is_consistent());
    }
}
