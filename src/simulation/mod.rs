//! Vending tycoon simulation core
//!
//! Everything here runs headless and deterministically: the presentation layer
//! calls into [`GameController`] and renders what [`GameSnapshot`] reports.

mod catalog;
mod city_map;
mod config;
mod controller;
mod engine;
mod error;
mod game_state;
mod machine;
mod road_network;
mod save;
mod truck;
mod types;
mod warehouse;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use catalog::{
    default_zones, Product, ResearchKind, ZoneSpec, ZoneType, FASTER_TRUCKS_SPEED_MULTIPLIER,
    REINFORCED_BREAKDOWN_MULTIPLIER, VIRAL_MARKETING_MULTIPLIER,
};
#[allow(unused_imports)]
pub use city_map::{CityMapState, Orientation, RoadDirection, TileType};
#[allow(unused_imports)]
pub use config::{ConfigError, SimConfig};
pub use controller::{GameController, MachineUpdate};
#[allow(unused_imports)]
pub use engine::{EngineState, MarketingButton, Modifiers, SimEngine, TickReport};
#[allow(unused_imports)]
pub use error::ValidationError;
#[allow(unused_imports)]
pub use game_state::{GameState, STARTING_CASH};
#[allow(unused_imports)]
pub use machine::{InventoryItem, SaleResult, SimMachine, Zone};
#[allow(unused_imports)]
pub use road_network::SimRoadNetwork;
#[allow(unused_imports)]
pub use save::{
    load, save, validate_snapshot, CorruptStateError, GameSnapshot, SaveError, SaveHeader,
    SAVE_MAGIC, SAVE_VERSION,
};
#[allow(unused_imports)]
pub use truck::{SimTruck, TruckUpdateResult, Waypoint};
#[allow(unused_imports)]
pub use types::{
    Cents, GridPos, MachineId, MarketingButtonId, Position, Quantity, SimId, TruckId, TruckStatus,
};
#[allow(unused_imports)]
pub use warehouse::Warehouse;
