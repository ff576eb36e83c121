//! Core types for the vending simulation
//!
//! Identifiers, grid coordinates and small value types shared by every
//! simulation module.

use serde::{Deserialize, Serialize};

/// Money in integer cents
pub type Cents = i64;

/// Count of product units
pub type Quantity = u32;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SimId(pub usize);

/// A wrapper type for machine IDs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MachineId(pub SimId);

/// A wrapper type for truck IDs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TruckId(pub SimId);

/// A wrapper type for marketing button IDs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MarketingButtonId(pub SimId);

/// An integer tile coordinate on the city grid
///
/// Ordering is row-major (`y` first, then `x`) so sorted collections of
/// tiles iterate the grid line by line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const ORIGIN: GridPos = GridPos { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: &GridPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn to_position(self) -> Position {
        Position::new(self.x as f32, self.y as f32)
    }
}

impl PartialOrd for GridPos {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GridPos {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

/// A continuous 2D position in tile units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Move up to `max_distance` towards `target`, stopping exactly on it
    pub fn move_towards(&self, target: &Position, max_distance: f32) -> Position {
        let distance = self.distance(target);
        if distance <= max_distance || distance <= f32::EPSILON {
            *target
        } else {
            self.lerp(target, max_distance / distance)
        }
    }

    /// The tile this position lies on
    pub fn to_grid(self) -> GridPos {
        GridPos::new(self.x.round() as i32, self.y.round() as i32)
    }
}

/// Finite state of a delivery truck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TruckStatus {
    /// Parked with no path
    #[default]
    Idle,
    /// Following its waypoint path
    Traveling,
    /// Unloading cargo into the machine at the current stop
    Restocking,
}
