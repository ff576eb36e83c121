//! Tunable simulation parameters
//!
//! `SimConfig::default()` is the built-in game balance. A TOML file can
//! override any subset of fields; omitted fields keep their defaults.

use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::catalog::{default_zones, ZoneSpec, ZoneType};
use super::types::{Cents, Quantity};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub starting_cash: Cents,
    pub warehouse_capacity: Quantity,

    /// Distinct products a machine can carry
    pub machine_slots: usize,
    /// Units per product slot
    pub machine_slot_capacity: Quantity,
    /// Units per product moved from the warehouse into a newly bought machine
    pub machine_starting_stock: Quantity,
    /// Machines closer than this to an existing one are rejected
    pub placement_tolerance: f32,
    pub repair_cost: Cents,

    pub truck_price: Cents,
    pub truck_capacity: Quantity,
    /// Tiles per second
    pub truck_speed: f32,
    pub truck_fuel_capacity: f32,
    pub fuel_per_tile: f32,
    pub refuel_cost_per_unit: Cents,

    pub initial_interest: f32,
    /// Per second, towards equilibrium while stocked
    pub interest_growth_rate: f32,
    /// Per second, while out of stock
    pub interest_decay_rate: f32,
    /// Purchases per second per product at full foot traffic and interest
    pub purchase_rate: f64,
    /// Breakdowns per second per machine
    pub breakdown_rate: f64,

    /// Seconds a marketing button stays claimable
    pub marketing_button_lifetime: f32,
    pub marketing_interest_boost: f32,

    pub zones: Vec<ZoneSpec>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            starting_cash: 200_000,
            warehouse_capacity: 500,
            machine_slots: 4,
            machine_slot_capacity: 20,
            machine_starting_stock: 10,
            placement_tolerance: 0.5,
            repair_cost: 5_000,
            truck_price: 50_000,
            truck_capacity: 100,
            truck_speed: 2.0,
            truck_fuel_capacity: 100.0,
            fuel_per_tile: 0.5,
            refuel_cost_per_unit: 10,
            initial_interest: 0.5,
            interest_growth_rate: 0.05,
            interest_decay_rate: 0.1,
            purchase_rate: 0.2,
            breakdown_rate: 0.0005,
            marketing_button_lifetime: 10.0,
            marketing_interest_boost: 0.2,
            zones: default_zones(),
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn zone(&self, zone_type: ZoneType) -> Option<&ZoneSpec> {
        self.zones.iter().find(|z| z.zone_type == zone_type)
    }

    /// Foot traffic for a zone, zero for zones missing from the table
    pub fn foot_traffic(&self, zone_type: ZoneType) -> f32 {
        self.zone(zone_type).map(|z| z.foot_traffic).unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.to_string()))
        };

        if self.warehouse_capacity == 0 || self.truck_capacity == 0 {
            return invalid("warehouse and truck capacity must be positive");
        }
        if self.machine_slots == 0 || self.machine_slot_capacity == 0 {
            return invalid("machines need at least one slot with positive capacity");
        }
        if !(self.truck_speed > 0.0 && self.truck_fuel_capacity > 0.0)
            || !self.truck_speed.is_finite()
            || !self.truck_fuel_capacity.is_finite()
        {
            return invalid("truck speed and fuel capacity must be positive");
        }
        if !(0.0..=1.0).contains(&self.initial_interest) {
            return invalid("initial_interest must lie in [0, 1]");
        }

        let non_negative = [
            ("fuel_per_tile", self.fuel_per_tile as f64),
            ("placement_tolerance", self.placement_tolerance as f64),
            ("interest_growth_rate", self.interest_growth_rate as f64),
            ("interest_decay_rate", self.interest_decay_rate as f64),
            ("purchase_rate", self.purchase_rate),
            ("breakdown_rate", self.breakdown_rate),
            ("marketing_button_lifetime", self.marketing_button_lifetime as f64),
            ("marketing_interest_boost", self.marketing_interest_boost as f64),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite, non-negative number",
                    name
                )));
            }
        }

        if self.starting_cash < 0
            || self.repair_cost < 0
            || self.truck_price < 0
            || self.refuel_cost_per_unit < 0
        {
            return invalid("prices must not be negative");
        }
        for (i, zone) in self.zones.iter().enumerate() {
            if !(0.0..=1.0).contains(&zone.foot_traffic) {
                return Err(ConfigError::Invalid(format!(
                    "zone {} foot_traffic must lie in [0, 1]",
                    zone.zone_type.name()
                )));
            }
            if zone.price < 0 {
                return Err(ConfigError::Invalid(format!(
                    "zone {} price must not be negative",
                    zone.zone_type.name()
                )));
            }
            if self.zones[..i].iter().any(|z| z.zone_type == zone.zone_type) {
                return Err(ConfigError::Invalid(format!(
                    "zone {} listed twice",
                    zone.zone_type.name()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SimConfig::from_toml_str("truck_speed = 4.0\nrepair_cost = 100\n")
            .expect("valid config");
        assert_eq!(config.truck_speed, 4.0);
        assert_eq!(config.repair_cost, 100);
        assert_eq!(config.warehouse_capacity, SimConfig::default().warehouse_capacity);
        assert_eq!(config.zones.len(), ZoneType::ALL.len());
    }

    #[test]
    fn zone_table_can_be_restricted() {
        let text = r#"
            [[zones]]
            zone_type = "shop"
            price = 100
            icon = "store"
            icon_color = 4278190080
            base_animation_index = 0
            foot_traffic = 0.5
        "#;
        let config = SimConfig::from_toml_str(text).expect("valid config");
        assert_eq!(config.zones.len(), 1);
        assert!(config.zone(ZoneType::Shop).is_some());
        assert!(config.zone(ZoneType::Hospital).is_none());
        assert_eq!(config.foot_traffic(ZoneType::Hospital), 0.0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            SimConfig::from_toml_str("initial_interest = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SimConfig::from_toml_str("truck_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        for text in [
            "purchase_rate = nan",
            "breakdown_rate = inf",
            "interest_decay_rate = -0.5",
            "placement_tolerance = nan",
            "marketing_interest_boost = -1.0",
            "truck_speed = inf",
            "repair_cost = -1",
        ] {
            assert!(
                matches!(SimConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "{} should be rejected",
                text
            );
        }
        assert!(matches!(
            SimConfig::from_toml_str("truck_speed = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
