//! Player-facing game operations
//!
//! [`GameController`] is the one entry point a presentation layer talks to.
//! Every operation validates first and only then mutates, so a returned
//! error always means nothing changed.

use anyhow::Result;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

use super::catalog::{Product, ResearchKind, ZoneType};
use super::city_map::CityMapState;
use super::config::SimConfig;
use super::engine::{Modifiers, SimEngine, TickReport};
use super::error::ValidationError;
use super::game_state::GameState;
use super::machine::Zone;
use super::save::{self, CorruptStateError, GameSnapshot, SaveError};
use super::types::{
    Cents, GridPos, MachineId, MarketingButtonId, Position, Quantity, TruckId, TruckStatus,
};

/// A direct patch to one machine, applied outside the tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MachineUpdate {
    /// Record a sale as if a customer bought `quantity` units
    Sale { product: Product, quantity: Quantity },
    SetBroken(bool),
    /// Overwrite a product's customer interest, clamped to `[0, 1]`
    SetInterest { product: Product, value: f32 },
}

pub struct GameController {
    engine: SimEngine,
    game: GameState,
    city_map: CityMapState,
    rng: StdRng,
    seed: u64,
    running: bool,
}

impl GameController {
    pub fn new(config: SimConfig, seed: u64) -> Self {
        let game = GameState::new(config.starting_cash);
        Self {
            engine: SimEngine::new(config),
            game,
            city_map: CityMapState::default(),
            rng: StdRng::seed_from_u64(seed),
            seed,
            running: false,
        }
    }

    /// A small starter city with stock, three machines and one truck
    pub fn demo(config: SimConfig, seed: u64) -> Result<Self> {
        let mut controller = Self::new(config, seed);

        let mut map = CityMapState::from_rows(&[
            "##########",
            "W.S..O..U#",
            "#........#",
            "#.C..G..H#",
            "##########",
        ])?;
        map.warehouse_road_position = Some(GridPos::ORIGIN);
        controller.update_city_map_state(map);

        for (product, qty) in [
            (Product::Soda, 100),
            (Product::Water, 80),
            (Product::Chips, 80),
            (Product::Candy, 60),
        ] {
            controller.buy_warehouse_stock(product, qty)?;
        }
        for (zone_type, x, y) in [
            (ZoneType::Shop, 2.0, 1.0),
            (ZoneType::Office, 5.0, 1.0),
            (ZoneType::Gym, 5.0, 3.0),
        ] {
            controller.buy_machine_with_stock(zone_type, x, y)?;
        }
        controller.buy_truck("Truck 1")?;

        info!("Demo city ready: {}", controller.game.summary());
        Ok(controller)
    }

    /// Restore a game from save bytes
    ///
    /// The random generator is not part of a save; it is reseeded from `seed`.
    pub fn load(config: SimConfig, data: &[u8], seed: u64) -> Result<Self, CorruptStateError> {
        let snapshot = save::load(data)?;
        let mut engine = SimEngine::from_state(config, snapshot.engine);
        engine.set_modifiers(Modifiers::from_research(&snapshot.game.unlocked_research));
        info!("Loaded save at tick {}", engine.tick_count());
        Ok(Self {
            engine,
            game: snapshot.game,
            city_map: snapshot.city_map,
            rng: StdRng::seed_from_u64(seed),
            seed,
            running: false,
        })
    }

    pub fn save(&self) -> Result<Vec<u8>, SaveError> {
        save::save(&self.snapshot())
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            city_map: self.city_map.clone(),
            engine: self.engine.state().clone(),
            game: self.game.clone(),
        }
    }

    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    pub fn game_state(&self) -> &GameState {
        &self.game
    }

    pub fn city_map(&self) -> &CityMapState {
        &self.city_map
    }

    pub fn cash(&self) -> Cents {
        self.game.cash
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn start_simulation(&mut self) {
        self.running = true;
    }

    pub fn stop_simulation(&mut self) {
        self.running = false;
    }

    pub fn is_simulation_running(&self) -> bool {
        self.running
    }

    /// Advance the engine; does nothing while the simulation is stopped
    pub fn tick(&mut self, delta_secs: f32) -> Option<TickReport> {
        if !self.running {
            return None;
        }
        Some(self.engine.tick(delta_secs, &mut self.rng))
    }

    /// Buy a machine for a zone and seed it from the warehouse
    ///
    /// Up to `machine_starting_stock` units of each product the warehouse
    /// holds are moved in, in catalog order, until the slots are full.
    pub fn buy_machine_with_stock(
        &mut self,
        zone_type: ZoneType,
        x: f32,
        y: f32,
    ) -> Result<MachineId, ValidationError> {
        let config = self.engine.config();
        let price = config
            .zone(zone_type)
            .map(|zone| zone.price)
            .ok_or(ValidationError::UnknownZone(zone_type))?;
        if !x.is_finite() || !y.is_finite() {
            return Err(ValidationError::InvalidPosition { x, y });
        }
        let position = Position::new(x, y);
        let has_map = self.city_map.width > 0 && self.city_map.height > 0;
        if has_map && !self.city_map.in_bounds(position.to_grid()) {
            return Err(ValidationError::OffMap { x, y });
        }
        if self
            .engine
            .machine_near(&position, config.placement_tolerance)
            .is_some()
        {
            return Err(ValidationError::SlotOccupied { x, y });
        }

        let staged = self.engine.stage_machine(Zone { x, y, zone_type })?;
        let seeded = staged.seeded();
        self.game.spend(price)?;
        let id = self.engine.commit_machine(staged);

        info!(
            "Bought {} machine {:?} at ({:.1}, {:.1}) with {} units",
            zone_type.name(),
            id,
            x,
            y,
            seeded
        );
        Ok(id)
    }

    /// Buy a truck; it starts idle at the warehouse entry
    pub fn buy_truck(&mut self, name: &str) -> Result<TruckId, ValidationError> {
        self.game.spend(self.engine.config().truck_price)?;
        let id = self.engine.add_truck(name);
        info!("Bought truck {} ({:?})", name, id);
        Ok(id)
    }

    /// Buy stock at wholesale price into the warehouse
    pub fn buy_warehouse_stock(
        &mut self,
        product: Product,
        qty: Quantity,
    ) -> Result<Cents, ValidationError> {
        let free = self.engine.warehouse().free_capacity();
        if qty > free {
            return Err(ValidationError::CapacityExceeded {
                requested: qty,
                free,
            });
        }
        let cost = product.wholesale_price() * qty as Cents;
        self.game.spend(cost)?;
        self.engine.warehouse_mut().unload(product, qty)?;
        debug!("Bought {} x {} for {}", qty, product.name(), cost);
        Ok(cost)
    }

    /// Move stock from the warehouse into a truck, all or nothing
    pub fn load_truck(
        &mut self,
        truck_id: TruckId,
        product: Product,
        qty: Quantity,
    ) -> Result<(), ValidationError> {
        let free = self
            .engine
            .truck(truck_id)
            .map(|t| t.free_capacity())
            .ok_or(ValidationError::TruckNotFound(truck_id))?;
        let available = self.engine.warehouse().quantity(product);
        if qty > available {
            return Err(ValidationError::InsufficientWarehouseStock {
                product,
                requested: qty,
                available,
            });
        }
        if qty > free {
            return Err(ValidationError::TruckCapacityExceeded {
                requested: qty,
                free,
            });
        }

        self.engine.warehouse_mut().load(product, qty)?;
        if let Some(truck) = self.engine.truck_mut(truck_id) {
            truck.add_cargo(product, qty)?;
        }
        Ok(())
    }

    /// Move cargo from a truck back into the warehouse, all or nothing
    pub fn unload_truck(
        &mut self,
        truck_id: TruckId,
        product: Product,
        qty: Quantity,
    ) -> Result<(), ValidationError> {
        let available = self
            .engine
            .truck(truck_id)
            .map(|t| t.quantity(product))
            .ok_or(ValidationError::TruckNotFound(truck_id))?;
        if qty > available {
            return Err(ValidationError::InsufficientTruckStock {
                product,
                requested: qty,
                available,
            });
        }
        let free = self.engine.warehouse().free_capacity();
        if qty > free {
            return Err(ValidationError::CapacityExceeded {
                requested: qty,
                free,
            });
        }

        if let Some(truck) = self.engine.truck_mut(truck_id) {
            truck.remove_cargo(product, qty)?;
        }
        self.engine.warehouse_mut().unload(product, qty)?;
        Ok(())
    }

    fn ensure_machine(&self, id: MachineId) -> Result<(), ValidationError> {
        match self.engine.machine(id) {
            Some(_) => Ok(()),
            None => Err(ValidationError::MachineNotFound(id)),
        }
    }

    fn truck_mut(&mut self, id: TruckId) -> Result<&mut super::truck::SimTruck, ValidationError> {
        self.engine
            .truck_mut(id)
            .ok_or(ValidationError::TruckNotFound(id))
    }

    /// Replace a truck's route; the current path is left alone
    pub fn update_route(
        &mut self,
        truck_id: TruckId,
        route: Vec<MachineId>,
    ) -> Result<(), ValidationError> {
        if self.engine.truck(truck_id).is_none() {
            return Err(ValidationError::TruckNotFound(truck_id));
        }
        for machine in &route {
            self.ensure_machine(*machine)?;
        }
        self.truck_mut(truck_id)?.set_route(route);
        Ok(())
    }

    pub fn route(&self, truck_id: TruckId) -> Result<&[MachineId], ValidationError> {
        self.engine
            .truck(truck_id)
            .map(|t| t.route())
            .ok_or(ValidationError::TruckNotFound(truck_id))
    }

    /// Insert a stop at `index`, or append it
    pub fn add_stop(
        &mut self,
        truck_id: TruckId,
        machine: MachineId,
        index: Option<usize>,
    ) -> Result<(), ValidationError> {
        if self.engine.truck(truck_id).is_none() {
            return Err(ValidationError::TruckNotFound(truck_id));
        }
        self.ensure_machine(machine)?;
        self.truck_mut(truck_id)?.add_stop(machine, index)
    }

    pub fn remove_stop(
        &mut self,
        truck_id: TruckId,
        index: usize,
    ) -> Result<MachineId, ValidationError> {
        self.truck_mut(truck_id)?.remove_stop(index)
    }

    pub fn reorder_stops(
        &mut self,
        truck_id: TruckId,
        from: usize,
        to: usize,
    ) -> Result<(), ValidationError> {
        self.truck_mut(truck_id)?.reorder_stops(from, to)
    }

    /// Dispatch a truck along its route; `Ok(false)` if there is nothing to do
    pub fn go_stock(&mut self, truck_id: TruckId) -> Result<bool, ValidationError> {
        self.engine.go_stock(truck_id)
    }

    /// Fill a truck's tank at the configured price per unit
    pub fn refuel_truck(&mut self, truck_id: TruckId) -> Result<Cents, ValidationError> {
        let truck = self
            .engine
            .truck(truck_id)
            .ok_or(ValidationError::TruckNotFound(truck_id))?;
        let missing = (truck.fuel_capacity() - truck.fuel()).max(0.0).ceil() as Cents;
        let cost = missing * self.engine.config().refuel_cost_per_unit;
        self.game.spend(cost)?;
        self.truck_mut(truck_id)?.refuel();
        Ok(cost)
    }

    /// Fix a broken machine; repairing a working one is free and does nothing
    pub fn repair_machine(&mut self, id: MachineId) -> Result<(), ValidationError> {
        let is_broken = self
            .engine
            .machine(id)
            .map(|m| m.is_broken())
            .ok_or(ValidationError::MachineNotFound(id))?;
        if !is_broken {
            return Ok(());
        }
        self.game.spend(self.engine.config().repair_cost)?;
        if let Some(machine) = self.engine.machine_mut(id) {
            machine.repair();
        }
        info!("Repaired machine {:?}", id);
        Ok(())
    }

    /// Collect a machine's cash into the player's balance
    pub fn retrieve_cash(&mut self, id: MachineId) -> Result<Cents, ValidationError> {
        let amount = self
            .engine
            .machine_mut(id)
            .map(|m| m.retrieve_cash())
            .ok_or(ValidationError::MachineNotFound(id))?;
        self.game.collect(amount);
        Ok(amount)
    }

    pub fn update_machine(
        &mut self,
        id: MachineId,
        update: MachineUpdate,
    ) -> Result<(), ValidationError> {
        let machine = self
            .engine
            .machine_mut(id)
            .ok_or(ValidationError::MachineNotFound(id))?;
        match update {
            MachineUpdate::Sale { product, quantity } => {
                let sale = machine.sell(product, quantity);
                debug!("Machine {:?} recorded sale {:?}", id, sale);
            }
            MachineUpdate::SetBroken(true) => machine.breakdown(),
            MachineUpdate::SetBroken(false) => machine.repair(),
            MachineUpdate::SetInterest { product, value } => {
                if !machine.set_interest(product, value) {
                    debug!("Machine {:?} does not stock {}", id, product.name());
                }
            }
        }
        Ok(())
    }

    pub fn set_warehouse_road_position(&mut self, position: GridPos) {
        self.city_map.warehouse_road_position = Some(position);
        self.engine.set_warehouse_road_position(position);
    }

    pub fn set_map_layout(&mut self, road_tiles: impl IntoIterator<Item = GridPos>) {
        self.engine.set_map_layout(road_tiles);
    }

    /// Adopt a new city map and rebuild roads from it
    pub fn update_city_map_state(&mut self, mut state: CityMapState) {
        state.derive_road_directions();
        if let Some(entry) = state.warehouse_road_position {
            self.engine.set_warehouse_road_position(entry);
        }
        let road_tiles = state.road_tiles();
        self.city_map = state;
        self.engine.set_map_layout(road_tiles);
    }

    pub fn unlock_research(&mut self, kind: ResearchKind) -> Result<(), ValidationError> {
        self.game.unlock_research(kind)?;
        self.engine
            .set_modifiers(Modifiers::from_research(&self.game.unlocked_research));
        info!("Unlocked research {:?}", kind);
        Ok(())
    }

    pub fn spawn_marketing_button(&mut self) -> Option<MarketingButtonId> {
        self.engine.spawn_marketing_button(&mut self.rng)
    }

    pub fn claim_marketing_button(
        &mut self,
        id: MarketingButtonId,
    ) -> Result<MachineId, ValidationError> {
        self.engine.claim_marketing_button(id)
    }

    /// One round of hands-off play for the headless runner
    ///
    /// Collects cash, repairs what it can afford, then loads every idle truck
    /// parked at the warehouse with what its machines are missing and sends
    /// it out.
    pub fn autopilot(&mut self) {
        let machine_ids: Vec<MachineId> = self.engine.machines().map(|m| m.id).collect();
        for id in &machine_ids {
            if let Err(e) = self.retrieve_cash(*id) {
                debug!("Autopilot could not collect from {:?}: {}", id, e);
            }
            if let Err(e) = self.repair_machine(*id) {
                debug!("Autopilot skipped repair of {:?}: {}", id, e);
            }
        }

        let home = self.engine.warehouse_road_position();
        let idle: Vec<TruckId> = self
            .engine
            .trucks()
            .filter(|t| t.status() == TruckStatus::Idle && t.position().to_grid() == home)
            .map(|t| t.id)
            .collect();

        for truck_id in idle {
            if self.route(truck_id).is_ok_and(|route| route.is_empty()) {
                if let Err(e) = self.update_route(truck_id, machine_ids.clone()) {
                    debug!("Autopilot could not route {:?}: {}", truck_id, e);
                }
            }

            for (product, wanted) in self.route_deficit(truck_id) {
                let free = self.engine.truck(truck_id).map(|t| t.free_capacity()).unwrap_or(0);
                let qty = wanted
                    .min(self.engine.warehouse().quantity(product))
                    .min(free);
                if qty > 0 {
                    if let Err(e) = self.load_truck(truck_id, product, qty) {
                        debug!(
                            "Autopilot could not load {:?} onto {:?}: {}",
                            product, truck_id, e
                        );
                    }
                }
            }

            match self.go_stock(truck_id) {
                Ok(true) => debug!("Autopilot dispatched {:?}", truck_id),
                Ok(false) => {}
                Err(e) => debug!("Autopilot could not dispatch {:?}: {}", truck_id, e),
            }
        }
    }

    /// Units per product the machines on a truck's route can still take,
    /// minus what the truck already carries
    fn route_deficit(&self, truck_id: TruckId) -> BTreeMap<Product, Quantity> {
        let mut deficit = BTreeMap::new();
        let Some(truck) = self.engine.truck(truck_id) else {
            return deficit;
        };
        for machine in truck.route().iter().filter_map(|id| self.engine.machine(*id)) {
            for (product, item) in machine.inventory() {
                *deficit.entry(*product).or_insert(0) +=
                    machine.slot_capacity().saturating_sub(item.quantity);
            }
        }
        for (product, wanted) in deficit.iter_mut() {
            *wanted = wanted.saturating_sub(truck.quantity(*product));
        }
        deficit
    }

    /// Log the engine and player summary
    pub fn print_summary(&self) {
        self.engine.print_summary();
        info!("{}", self.game.summary());
    }

    pub fn draw_map(&self) -> String {
        self.engine.render_map()
    }
}
