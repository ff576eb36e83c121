//! Central inventory pool trucks are loaded from

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::catalog::Product;
use super::error::ValidationError;
use super::types::Quantity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    inventory: BTreeMap<Product, Quantity>,
    capacity: Quantity,
}

impl Warehouse {
    pub fn new(capacity: Quantity) -> Self {
        Self {
            inventory: BTreeMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> Quantity {
        self.capacity
    }

    pub fn inventory(&self) -> &BTreeMap<Product, Quantity> {
        &self.inventory
    }

    pub fn quantity(&self, product: Product) -> Quantity {
        self.inventory.get(&product).copied().unwrap_or(0)
    }

    pub fn total(&self) -> Quantity {
        self.inventory.values().sum()
    }

    pub fn free_capacity(&self) -> Quantity {
        self.capacity.saturating_sub(self.total())
    }

    /// Take `qty` units out, all or nothing
    pub fn load(&mut self, product: Product, qty: Quantity) -> Result<(), ValidationError> {
        let available = self.quantity(product);
        if qty > available {
            return Err(ValidationError::InsufficientWarehouseStock {
                product,
                requested: qty,
                available,
            });
        }
        if qty == available {
            self.inventory.remove(&product);
        } else {
            self.inventory.insert(product, available - qty);
        }
        Ok(())
    }

    /// Put `qty` units back, all or nothing
    pub fn unload(&mut self, product: Product, qty: Quantity) -> Result<(), ValidationError> {
        let free = self.free_capacity();
        if qty > free {
            return Err(ValidationError::CapacityExceeded {
                requested: qty,
                free,
            });
        }
        if qty > 0 {
            *self.inventory.entry(product).or_insert(0) += qty;
        }
        Ok(())
    }

    /// Fill level in `[0, 1]` for display
    pub fn capacity_percent(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.total() as f32 / self.capacity as f32
    }

    pub fn is_within_capacity(&self) -> bool {
        self.total() <= self.capacity
    }
}
