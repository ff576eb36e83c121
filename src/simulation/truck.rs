//! Delivery truck movement and cargo
//!
//! Standalone state machine; the engine decides what happens at stops.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::catalog::Product;
use super::error::ValidationError;
use super::types::{GridPos, MachineId, Position, Quantity, TruckId, TruckStatus};

/// Distance under which a truck counts as standing on a waypoint
const ARRIVAL_EPSILON: f32 = 1e-4;

/// One tile of a truck's path, optionally a machine stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub tile: GridPos,
    pub stop: Option<MachineId>,
}

impl Waypoint {
    pub fn road(tile: GridPos) -> Self {
        Self { tile, stop: None }
    }

    pub fn stop(tile: GridPos, machine: MachineId) -> Self {
        Self {
            tile,
            stop: Some(machine),
        }
    }
}

/// Result of a truck update indicating what the engine should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruckUpdateResult {
    /// Still on the way (or parked)
    Continue,
    /// Out of fuel, position frozen
    Stalled,
    /// Reached a stop and switched to restocking
    ArrivedAtStop(MachineId),
    /// Walked the last waypoint and went idle
    ReachedEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimTruck {
    pub id: TruckId,
    pub name: String,
    capacity: Quantity,
    inventory: BTreeMap<Product, Quantity>,
    position: Position,
    target: Position,
    path: Vec<Waypoint>,
    path_index: usize,
    route: Vec<MachineId>,
    status: TruckStatus,
    /// Machine being restocked while `status` is `Restocking`
    servicing: Option<MachineId>,
    fuel: f32,
    fuel_capacity: f32,
}

impl SimTruck {
    pub fn new(
        id: TruckId,
        name: impl Into<String>,
        capacity: Quantity,
        position: Position,
        fuel_capacity: f32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
            inventory: BTreeMap::new(),
            position,
            target: position,
            path: Vec::new(),
            path_index: 0,
            route: Vec::new(),
            status: TruckStatus::Idle,
            servicing: None,
            fuel: fuel_capacity,
            fuel_capacity,
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

    pub fn cargo_total(&self) -> Quantity {
        self.inventory.values().sum()
    }

    pub fn free_capacity(&self) -> Quantity {
        self.capacity.saturating_sub(self.cargo_total())
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn target(&self) -> Position {
        self.target
    }

    pub fn path(&self) -> &[Waypoint] {
        &self.path
    }

    pub fn path_index(&self) -> usize {
        self.path_index
    }

    pub fn route(&self) -> &[MachineId] {
        &self.route
    }

    pub fn status(&self) -> TruckStatus {
        self.status
    }

    pub fn fuel(&self) -> f32 {
        self.fuel
    }

    pub fn fuel_capacity(&self) -> f32 {
        self.fuel_capacity
    }

    pub fn is_stalled(&self) -> bool {
        self.status == TruckStatus::Traveling && self.fuel <= 0.0
    }

    pub fn add_cargo(&mut self, product: Product, qty: Quantity) -> Result<(), ValidationError> {
        let free = self.free_capacity();
        if qty > free {
            return Err(ValidationError::TruckCapacityExceeded {
                requested: qty,
                free,
            });
        }
        if qty > 0 {
            *self.inventory.entry(product).or_insert(0) += qty;
        }
        Ok(())
    }

    pub fn remove_cargo(&mut self, product: Product, qty: Quantity) -> Result<(), ValidationError> {
        let available = self.quantity(product);
        if qty > available {
            return Err(ValidationError::InsufficientTruckStock {
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

    pub fn set_route(&mut self, route: Vec<MachineId>) {
        self.route = route;
    }

    /// Insert a stop at `index`, or append when `index` is `None`
    pub fn add_stop(&mut self, machine: MachineId, index: Option<usize>) -> Result<(), ValidationError> {
        match index {
            None => self.route.push(machine),
            Some(index) if index <= self.route.len() => self.route.insert(index, machine),
            Some(index) => {
                return Err(ValidationError::StopIndexOutOfRange {
                    index,
                    len: self.route.len(),
                })
            }
        }
        Ok(())
    }

    pub fn remove_stop(&mut self, index: usize) -> Result<MachineId, ValidationError> {
        if index >= self.route.len() {
            return Err(ValidationError::StopIndexOutOfRange {
                index,
                len: self.route.len(),
            });
        }
        Ok(self.route.remove(index))
    }

    /// Move the stop at `from` so it ends up at `to`
    pub fn reorder_stops(&mut self, from: usize, to: usize) -> Result<(), ValidationError> {
        let len = self.route.len();
        for index in [from, to] {
            if index >= len {
                return Err(ValidationError::StopIndexOutOfRange { index, len });
            }
        }
        let machine = self.route.remove(from);
        self.route.insert(to, machine);
        Ok(())
    }

    /// Start following `path` from its first waypoint
    pub fn set_path(&mut self, path: Vec<Waypoint>) {
        self.path = path;
        self.path_index = 0;
        match self.path.first() {
            Some(first) => {
                self.target = first.tile.to_position();
                self.status = TruckStatus::Traveling;
                self.servicing = None;
            }
            None => self.clear_path(),
        }
    }

    /// Swap in a freshly planned path
    ///
    /// A restocking truck finishes its current stop before following it.
    pub fn replace_path(&mut self, path: Vec<Waypoint>) {
        if self.status != TruckStatus::Restocking {
            self.set_path(path);
            return;
        }
        self.path = path;
        self.path_index = 0;
        if let Some(first) = self.path.first() {
            self.target = first.tile.to_position();
        }
    }

    /// Drop the path and park where the truck stands
    pub fn clear_path(&mut self) {
        self.path.clear();
        self.path_index = 0;
        self.target = self.position;
        self.status = TruckStatus::Idle;
        self.servicing = None;
    }

    /// Machine stops still ahead on the path
    pub fn remaining_stops(&self) -> Vec<MachineId> {
        self.path
            .iter()
            .skip(self.path_index)
            .filter_map(|waypoint| waypoint.stop)
            .collect()
    }

    /// The machine being restocked, if any
    pub fn current_stop(&self) -> Option<MachineId> {
        self.servicing
    }

    /// Leave a stop: continue along the path or go idle when it is done
    pub fn finish_restocking(&mut self) -> TruckUpdateResult {
        self.servicing = None;
        if self.path_index < self.path.len() {
            self.target = self.path[self.path_index].tile.to_position();
            self.status = TruckStatus::Traveling;
            TruckUpdateResult::Continue
        } else {
            self.clear_path();
            TruckUpdateResult::ReachedEnd
        }
    }

    /// Fill the tank, returning the fuel added
    pub fn refuel(&mut self) -> f32 {
        let added = (self.fuel_capacity - self.fuel).max(0.0);
        self.fuel = self.fuel_capacity;
        added
    }

    /// Relocate a parked truck
    pub fn park_at(&mut self, position: Position) {
        if self.status == TruckStatus::Idle {
            self.position = position;
            self.target = position;
        }
    }

    /// Advance along the path
    ///
    /// Moves `speed * delta_secs` tiles, burning `fuel_per_tile` per tile.
    /// Stops early on a machine stop; leftover movement is discarded.
    pub fn update(&mut self, delta_secs: f32, speed: f32, fuel_per_tile: f32) -> TruckUpdateResult {
        if self.status != TruckStatus::Traveling {
            return TruckUpdateResult::Continue;
        }

        // NaN and negative budgets become 0
        let mut budget = (speed * delta_secs).max(0.0);

        loop {
            let Some(waypoint) = self.path.get(self.path_index).copied() else {
                self.clear_path();
                return TruckUpdateResult::ReachedEnd;
            };

            let target = waypoint.tile.to_position();
            self.target = target;
            let distance = self.position.distance(&target);

            let reachable = if fuel_per_tile > 0.0 {
                self.fuel.max(0.0) / fuel_per_tile
            } else {
                f32::INFINITY
            };

            let arrives = distance <= ARRIVAL_EPSILON
                || (distance <= budget + ARRIVAL_EPSILON
                    && distance <= reachable + ARRIVAL_EPSILON);

            if arrives {
                self.position = target;
                budget = (budget - distance).max(0.0);
                self.burn_fuel(distance, fuel_per_tile);
                self.path_index += 1;

                if let Some(machine) = waypoint.stop {
                    self.status = TruckStatus::Restocking;
                    self.servicing = Some(machine);
                    return TruckUpdateResult::ArrivedAtStop(machine);
                }
                if self.path_index == self.path.len() {
                    self.clear_path();
                    return TruckUpdateResult::ReachedEnd;
                }
                if budget <= 0.0 {
                    return TruckUpdateResult::Continue;
                }
                continue;
            }

            if reachable <= 0.0 {
                return TruckUpdateResult::Stalled;
            }

            let step = budget.min(reachable);
            self.position = self.position.move_towards(&target, step);
            self.burn_fuel(step, fuel_per_tile);
            return if step < budget {
                TruckUpdateResult::Stalled
            } else {
                TruckUpdateResult::Continue
            };
        }
    }

    fn burn_fuel(&mut self, distance: f32, fuel_per_tile: f32) {
        self.fuel = (self.fuel - distance * fuel_per_tile).max(0.0);
    }

    /// Whether every field holds its invariants
    pub fn is_consistent(&self) -> bool {
        self.cargo_total() <= self.capacity
            && self.path_index <= self.path.len()
            && self.fuel >= 0.0
            && self.fuel <= self.fuel_capacity
            && (self.status != TruckStatus::Idle || self.path.is_empty())
            && (self.status == TruckStatus::Restocking) == self.servicing.is_some()
            && self.inventory.values().all(|qty| *qty > 0)
    }
}
