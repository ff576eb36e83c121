//! Typed failures for player actions
//!
//! Every variant is recoverable: the action was rejected and nothing changed.

use super::catalog::{Product, ResearchKind, ZoneType};
use super::types::{Cents, MachineId, MarketingButtonId, Quantity, TruckId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("insufficient funds: need {needed} cents, have {available}")]
    InsufficientFunds { needed: Cents, available: Cents },

    #[error("position ({x}, {y}) is not a number")]
    InvalidPosition { x: f32, y: f32 },

    #[error("position ({x}, {y}) lies outside the city map")]
    OffMap { x: f32, y: f32 },

    #[error("a machine already stands at ({x}, {y})")]
    SlotOccupied { x: f32, y: f32 },

    #[error("zone type {0:?} is not in the catalog")]
    UnknownZone(ZoneType),

    #[error("truck {0:?} not found")]
    TruckNotFound(TruckId),

    #[error("machine {0:?} not found")]
    MachineNotFound(MachineId),

    #[error("marketing button {0:?} not found or expired")]
    MarketingButtonNotFound(MarketingButtonId),

    #[error("warehouse holds {available} {product:?}, requested {requested}")]
    InsufficientWarehouseStock {
        product: Product,
        requested: Quantity,
        available: Quantity,
    },

    #[error("truck holds {available} {product:?}, requested {requested}")]
    InsufficientTruckStock {
        product: Product,
        requested: Quantity,
        available: Quantity,
    },

    #[error("truck has room for {free} more units, requested {requested}")]
    TruckCapacityExceeded { requested: Quantity, free: Quantity },

    #[error("warehouse has room for {free} more units, requested {requested}")]
    CapacityExceeded { requested: Quantity, free: Quantity },

    #[error("machine slot for {product:?} has room for {free}, requested {requested}")]
    MachineCapacityExceeded {
        product: Product,
        requested: Quantity,
        free: Quantity,
    },

    #[error("route stop index {index} out of range for a route of {len} stops")]
    StopIndexOutOfRange { index: usize, len: usize },

    #[error("research {0:?} is already unlocked")]
    ResearchAlreadyUnlocked(ResearchKind),
}
