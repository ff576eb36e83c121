//! Static game data: products, zone types and research
//!
//! Prices, zone parameters and research costs are looked up here rather than
//! matched on at each call site.

use serde::{Deserialize, Serialize};

use super::types::Cents;

/// A sellable good
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    Soda,
    Water,
    Chips,
    Candy,
    Coffee,
    Sandwich,
}

impl Product {
    pub const ALL: [Product; 6] = [
        Product::Soda,
        Product::Water,
        Product::Chips,
        Product::Candy,
        Product::Coffee,
        Product::Sandwich,
    ];

    /// Retail price customers pay at a machine
    pub fn base_price(&self) -> Cents {
        match self {
            Product::Soda => 200,
            Product::Water => 150,
            Product::Chips => 175,
            Product::Candy => 125,
            Product::Coffee => 250,
            Product::Sandwich => 400,
        }
    }

    /// Price the player pays to stock the warehouse
    pub fn wholesale_price(&self) -> Cents {
        self.base_price() / 2
    }

    pub fn name(&self) -> &'static str {
        match self {
            Product::Soda => "soda",
            Product::Water => "water",
            Product::Chips => "chips",
            Product::Candy => "candy",
            Product::Coffee => "coffee",
            Product::Sandwich => "sandwich",
        }
    }
}

/// A kind of city location a machine can be placed in
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Shop,
    School,
    Gym,
    Office,
    Hospital,
    Subway,
    University,
    Park,
}

impl ZoneType {
    pub const ALL: [ZoneType; 8] = [
        ZoneType::Shop,
        ZoneType::School,
        ZoneType::Gym,
        ZoneType::Office,
        ZoneType::Hospital,
        ZoneType::Subway,
        ZoneType::University,
        ZoneType::Park,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ZoneType::Shop => "shop",
            ZoneType::School => "school",
            ZoneType::Gym => "gym",
            ZoneType::Office => "office",
            ZoneType::Hospital => "hospital",
            ZoneType::Subway => "subway",
            ZoneType::University => "university",
            ZoneType::Park => "park",
        }
    }
}

/// Per-zone economic and display parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub zone_type: ZoneType,
    /// Cost of placing a machine in this zone
    pub price: Cents,
    pub icon: String,
    /// ARGB colour for the zone icon
    pub icon_color: u32,
    pub base_animation_index: u32,
    /// Relative customer foot traffic in `[0, 1]`
    pub foot_traffic: f32,
}

impl ZoneSpec {
    fn new(
        zone_type: ZoneType,
        price: Cents,
        icon: &str,
        icon_color: u32,
        base_animation_index: u32,
        foot_traffic: f32,
    ) -> Self {
        Self {
            zone_type,
            price,
            icon: icon.to_string(),
            icon_color,
            base_animation_index,
            foot_traffic,
        }
    }
}

/// The built-in zone table
pub fn default_zones() -> Vec<ZoneSpec> {
    vec![
        ZoneSpec::new(ZoneType::Shop, 30_000, "storefront", 0xFF4C_AF50, 0, 0.8),
        ZoneSpec::new(ZoneType::School, 25_000, "school", 0xFFFF_C107, 4, 0.7),
        ZoneSpec::new(ZoneType::Gym, 28_000, "fitness_center", 0xFFF4_4336, 8, 0.6),
        ZoneSpec::new(ZoneType::Office, 35_000, "business", 0xFF21_96F3, 12, 0.75),
        ZoneSpec::new(ZoneType::Hospital, 45_000, "local_hospital", 0xFFE9_1E63, 16, 0.9),
        ZoneSpec::new(ZoneType::Subway, 50_000, "subway", 0xFF9C_27B0, 20, 1.0),
        ZoneSpec::new(ZoneType::University, 40_000, "account_balance", 0xFF3F_51B5, 24, 0.85),
        ZoneSpec::new(ZoneType::Park, 20_000, "park", 0xFF8B_C34A, 28, 0.5),
    ]
}

/// One-time upgrades the player can buy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResearchKind {
    /// Trucks drive faster
    FasterTrucks,
    /// Machines break down less often
    ReinforcedMachines,
    /// Claimed marketing buttons boost interest more
    ViralMarketing,
}

impl ResearchKind {
    pub fn cost(&self) -> Cents {
        match self {
            ResearchKind::FasterTrucks => 100_000,
            ResearchKind::ReinforcedMachines => 80_000,
            ResearchKind::ViralMarketing => 60_000,
        }
    }
}

pub const FASTER_TRUCKS_SPEED_MULTIPLIER: f32 = 1.5;
pub const REINFORCED_BREAKDOWN_MULTIPLIER: f64 = 0.5;
pub const VIRAL_MARKETING_MULTIPLIER: f32 = 2.0;
