//! Road tile graph for truck pathfinding
//!
//! Every road tile is a node; orthogonally adjacent road tiles are joined by
//! an edge of weight 1.

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};

use super::types::{GridPos, Position};

/// Road layout and its pathfinding graph
#[derive(Debug, Default, Clone)]
pub struct SimRoadNetwork {
    /// The underlying petgraph undirected graph
    graph: UnGraph<GridPos, u32>,

    /// Maps road tiles to their node indices in the graph
    tile_to_node: HashMap<GridPos, NodeIndex>,

    /// Road tiles in row-major order
    tiles: BTreeSet<GridPos>,

    /// Cached path results
    path_cache: HashMap<(GridPos, GridPos), Vec<GridPos>>,
}

impl SimRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a set of road tiles
    ///
    /// Nodes are added in row-major order and each tile links right then
    /// down, so the graph (and every A* result on it) depends only on the
    /// tile set, not on the order tiles were supplied in.
    pub fn from_tiles(tiles: impl IntoIterator<Item = GridPos>) -> Self {
        let tiles: BTreeSet<GridPos> = tiles.into_iter().collect();
        let mut graph = UnGraph::with_capacity(tiles.len(), tiles.len() * 2);
        let mut tile_to_node = HashMap::with_capacity(tiles.len());

        for tile in &tiles {
            tile_to_node.insert(*tile, graph.add_node(*tile));
        }

        for tile in &tiles {
            let node = tile_to_node[tile];
            for neighbour in [GridPos::new(tile.x + 1, tile.y), GridPos::new(tile.x, tile.y + 1)] {
                if let Some(&other) = tile_to_node.get(&neighbour) {
                    graph.add_edge(node, other, 1);
                }
            }
        }

        Self {
            graph,
            tile_to_node,
            tiles,
            path_cache: HashMap::new(),
        }
    }

    pub fn is_road(&self, tile: GridPos) -> bool {
        self.tiles.contains(&tile)
    }

    pub fn tiles(&self) -> &BTreeSet<GridPos> {
        &self.tiles
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Road neighbours of a tile
    pub fn connected_tiles(&self, tile: GridPos) -> Vec<GridPos> {
        let Some(&node) = self.tile_to_node.get(&tile) else {
            return Vec::new();
        };
        let mut neighbours: Vec<GridPos> = self
            .graph
            .edges(node)
            .map(|edge| {
                let other = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                self.graph[other]
            })
            .collect();
        neighbours.sort();
        neighbours
    }

    /// Shortest path between two road tiles, excluding `start`
    pub fn find_path(&mut self, start: GridPos, end: GridPos) -> Option<Vec<GridPos>> {
        if start == end {
            return self.is_road(start).then(Vec::new);
        }

        if let Some(path) = self.path_cache.get(&(start, end)) {
            return Some(path.clone());
        }

        let start_node = *self.tile_to_node.get(&start)?;
        let end_node = *self.tile_to_node.get(&end)?;

        let (_, node_path) = astar(
            &self.graph,
            start_node,
            |node| node == end_node,
            |edge| *edge.weight(),
            |node| self.graph[node].manhattan(&end),
        )?;

        let path: Vec<GridPos> = node_path
            .iter()
            .skip(1)
            .map(|node| self.graph[*node])
            .collect();

        self.path_cache.insert((start, end), path.clone());

        Some(path)
    }

    /// Like [`find_path`](Self::find_path) but explains what went wrong
    pub fn path_between(&mut self, start: GridPos, end: GridPos) -> Result<Vec<GridPos>> {
        if !self.is_road(start) {
            anyhow::bail!("start tile {:?} is not a road", start);
        }
        if !self.is_road(end) {
            anyhow::bail!("end tile {:?} is not a road", end);
        }
        self.find_path(start, end)
            .with_context(|| format!("no road connects {:?} to {:?}", start, end))
    }

    /// The road tile closest to `position`, ties broken row-major
    pub fn nearest_road_tile(&self, position: &Position) -> Option<GridPos> {
        self.tiles
            .iter()
            .min_by_key(|tile| (OrderedFloat(position.distance(&tile.to_position())), **tile))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(y: i32, xs: std::ops::RangeInclusive<i32>) -> Vec<GridPos> {
        xs.map(|x| GridPos::new(x, y)).collect()
    }

    #[test]
    fn straight_road_path() {
        let mut network = SimRoadNetwork::from_tiles(row(0, 0..=4));
        let path = network
            .find_path(GridPos::new(0, 0), GridPos::new(4, 0))
            .unwrap();
        assert_eq!(path, row(0, 1..=4));
    }

    #[test]
    fn path_follows_roads_around_gaps() {
        // U shape: down column 0, across row 2, up column 2
        let mut tiles = vec![
            GridPos::new(0, 0),
            GridPos::new(0, 1),
            GridPos::new(2, 0),
            GridPos::new(2, 1),
        ];
        tiles.extend(row(2, 0..=2));
        let mut network = SimRoadNetwork::from_tiles(tiles);

        let path = network
            .find_path(GridPos::new(0, 0), GridPos::new(2, 0))
            .unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(path.last(), Some(&GridPos::new(2, 0)));
        let mut previous = GridPos::new(0, 0);
        for tile in &path {
            assert!(network.is_road(*tile));
            assert_eq!(previous.manhattan(tile), 1);
            previous = *tile;
        }
    }

    #[test]
    fn paths_are_deterministic() {
        let grid: Vec<GridPos> = (0..4)
            .flat_map(|y| (0..4).map(move |x| GridPos::new(x, y)))
            .collect();
        let mut reversed = grid.clone();
        reversed.reverse();

        let mut a = SimRoadNetwork::from_tiles(grid);
        let mut b = SimRoadNetwork::from_tiles(reversed);
        let from = GridPos::new(0, 0);
        let to = GridPos::new(3, 3);
        assert_eq!(a.find_path(from, to), b.find_path(from, to));
        assert_eq!(a.find_path(from, to).map(|p| p.len()), Some(6));
    }

    #[test]
    fn disconnected_tiles_have_no_path() {
        let mut network = SimRoadNetwork::from_tiles([GridPos::new(0, 0), GridPos::new(5, 5)]);
        assert!(network.find_path(GridPos::new(0, 0), GridPos::new(5, 5)).is_none());
        assert!(network
            .path_between(GridPos::new(0, 0), GridPos::new(9, 9))
            .is_err());
        assert_eq!(network.find_path(GridPos::new(5, 5), GridPos::new(5, 5)), Some(vec![]));
    }

    #[test]
    fn nearest_tile_prefers_lower_row_on_ties() {
        let network = SimRoadNetwork::from_tiles([GridPos::new(1, 0), GridPos::new(1, 2)]);
        assert_eq!(
            network.nearest_road_tile(&Position::new(1.0, 1.0)),
            Some(GridPos::new(1, 0))
        );
        assert!(network.connected_tiles(GridPos::new(1, 0)).is_empty());
    }
}
