//! Main simulation engine that ties everything together
//!
//! The engine owns every machine, truck and the warehouse, and advances them
//! one tick at a time. All randomness comes from the generator handed to
//! [`SimEngine::tick`], so a seeded generator replays a game exactly.

use anyhow::Result;
use log::{debug, info, warn};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::catalog::{
    Product, ResearchKind, FASTER_TRUCKS_SPEED_MULTIPLIER, REINFORCED_BREAKDOWN_MULTIPLIER,
    VIRAL_MARKETING_MULTIPLIER,
};
use super::config::SimConfig;
use super::error::ValidationError;
use super::machine::{probability, SaleResult, SimMachine, Zone};
use super::road_network::SimRoadNetwork;
use super::truck::{SimTruck, TruckUpdateResult, Waypoint};
use super::types::{
    GridPos, MachineId, MarketingButtonId, Position, Quantity, SimId, TruckId, TruckStatus,
};
use super::warehouse::Warehouse;

/// Tiles drawn around the road network by [`SimEngine::render_map`]
pub const RENDER_MARGIN: i64 = 2;

/// A claimable on-screen marketing bonus tied to one machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingButton {
    pub id: MarketingButtonId,
    pub machine: MachineId,
    /// Simulation time after which the button disappears
    pub expires_at: f32,
}

/// Research-driven multipliers applied by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modifiers {
    pub truck_speed: f32,
    pub breakdown_rate: f64,
    pub marketing_boost: f32,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            truck_speed: 1.0,
            breakdown_rate: 1.0,
            marketing_boost: 1.0,
        }
    }
}

impl Modifiers {
    pub fn from_research(unlocked: &BTreeSet<ResearchKind>) -> Self {
        let mut modifiers = Self::default();
        for kind in unlocked {
            match kind {
                ResearchKind::FasterTrucks => modifiers.truck_speed *= FASTER_TRUCKS_SPEED_MULTIPLIER,
                ResearchKind::ReinforcedMachines => {
                    modifiers.breakdown_rate *= REINFORCED_BREAKDOWN_MULTIPLIER
                }
                ResearchKind::ViralMarketing => modifiers.marketing_boost *= VIRAL_MARKETING_MULTIPLIER,
            }
        }
        modifiers
    }
}

/// Everything the engine owns that survives a save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub warehouse: Warehouse,
    pub warehouse_road_position: GridPos,
    /// Road tiles as last supplied, without the warehouse entry
    pub road_tiles: BTreeSet<GridPos>,
    pub machines: BTreeMap<MachineId, SimMachine>,
    pub trucks: BTreeMap<TruckId, SimTruck>,
    pub marketing_buttons: BTreeMap<MarketingButtonId, MarketingButton>,
    pub next_id: usize,
    pub time: f32,
    pub tick_count: u64,
}

/// A fully stocked machine waiting to be placed
#[derive(Debug, Clone)]
pub struct StagedMachine {
    warehouse: Warehouse,
    machine: SimMachine,
    seeded: Quantity,
}

impl StagedMachine {
    pub fn machine(&self) -> &SimMachine {
        &self.machine
    }

    /// Units moved out of the warehouse
    pub fn seeded(&self) -> Quantity {
        self.seeded
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub sales: SaleResult,
    pub breakdowns: Vec<MachineId>,
    pub arrivals: Vec<(TruckId, MachineId)>,
    pub units_restocked: Quantity,
    pub trucks_returned: Vec<TruckId>,
    pub expired_buttons: Vec<MarketingButtonId>,
}

/// The main simulation engine
pub struct SimEngine {
    config: SimConfig,
    state: EngineState,
    /// Pathfinding graph over `state.road_tiles` plus the warehouse entry
    road_network: SimRoadNetwork,
    modifiers: Modifiers,
}

impl SimEngine {
    pub fn new(config: SimConfig) -> Self {
        let state = EngineState {
            warehouse: Warehouse::new(config.warehouse_capacity),
            warehouse_road_position: GridPos::ORIGIN,
            road_tiles: BTreeSet::new(),
            machines: BTreeMap::new(),
            trucks: BTreeMap::new(),
            marketing_buttons: BTreeMap::new(),
            next_id: 0,
            time: 0.0,
            tick_count: 0,
        };
        Self::from_state(config, state)
    }

    /// Rebuild an engine around previously saved state
    pub fn from_state(config: SimConfig, state: EngineState) -> Self {
        let mut engine = Self {
            config,
            state,
            road_network: SimRoadNetwork::new(),
            modifiers: Modifiers::default(),
        };
        engine.rebuild_road_network();
        engine
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn road_network(&self) -> &SimRoadNetwork {
        &self.road_network
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.state.warehouse
    }

    pub fn warehouse_mut(&mut self) -> &mut Warehouse {
        &mut self.state.warehouse
    }

    pub fn warehouse_road_position(&self) -> GridPos {
        self.state.warehouse_road_position
    }

    pub fn machine(&self, id: MachineId) -> Option<&SimMachine> {
        self.state.machines.get(&id)
    }

    pub fn machine_mut(&mut self, id: MachineId) -> Option<&mut SimMachine> {
        self.state.machines.get_mut(&id)
    }

    pub fn machines(&self) -> impl Iterator<Item = &SimMachine> {
        self.state.machines.values()
    }

    pub fn truck(&self, id: TruckId) -> Option<&SimTruck> {
        self.state.trucks.get(&id)
    }

    pub fn truck_mut(&mut self, id: TruckId) -> Option<&mut SimTruck> {
        self.state.trucks.get_mut(&id)
    }

    pub fn trucks(&self) -> impl Iterator<Item = &SimTruck> {
        self.state.trucks.values()
    }

    pub fn marketing_buttons(&self) -> impl Iterator<Item = &MarketingButton> {
        self.state.marketing_buttons.values()
    }

    pub fn time(&self) -> f32 {
        self.state.time
    }

    pub fn tick_count(&self) -> u64 {
        self.state.tick_count
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.state.next_id);
        self.state.next_id += 1;
        id
    }

    /// Units held anywhere: warehouse, truck holds and machines
    pub fn total_goods(&self) -> u64 {
        let warehouse = self.state.warehouse.total() as u64;
        let trucks: u64 = self.trucks().map(|t| t.cargo_total() as u64).sum();
        let machines: u64 = self.machines().map(|m| m.total_stock() as u64).sum();
        warehouse + trucks + machines
    }

    /// Place a new, empty machine
    pub fn add_machine(&mut self, zone: Zone) -> MachineId {
        let id = MachineId(self.next_sim_id());
        let machine = SimMachine::new(
            id,
            zone,
            self.config.machine_slots,
            self.config.machine_slot_capacity,
            self.config.initial_interest,
        );
        self.state.machines.insert(id, machine);
        id
    }

    /// Build a machine seeded from the warehouse without touching the world
    ///
    /// Up to `machine_starting_stock` units of each product the warehouse
    /// holds are moved in, in catalog order, until the slots are full. Pass
    /// the result to [`commit_machine`](Self::commit_machine).
    pub fn stage_machine(&self, zone: Zone) -> Result<StagedMachine, ValidationError> {
        let mut warehouse = self.state.warehouse.clone();
        let mut machine = SimMachine::new(
            MachineId(SimId(self.state.next_id)),
            zone,
            self.config.machine_slots,
            self.config.machine_slot_capacity,
            self.config.initial_interest,
        );

        let mut seeded = 0;
        for product in Product::ALL {
            let qty = self
                .config
                .machine_starting_stock
                .min(warehouse.quantity(product))
                .min(machine.free_capacity(product));
            if qty == 0 {
                continue;
            }
            warehouse.load(product, qty)?;
            machine.restock(product, qty)?;
            seeded += qty;
        }

        Ok(StagedMachine {
            warehouse,
            machine,
            seeded,
        })
    }

    /// Install a staged machine and its drained warehouse
    pub fn commit_machine(&mut self, staged: StagedMachine) -> MachineId {
        let StagedMachine {
            warehouse,
            mut machine,
            ..
        } = staged;
        let id = MachineId(self.next_sim_id());
        machine.id = id;
        self.state.warehouse = warehouse;
        self.state.machines.insert(id, machine);
        id
    }

    /// Add a truck parked at the warehouse entry
    pub fn add_truck(&mut self, name: impl Into<String>) -> TruckId {
        let id = TruckId(self.next_sim_id());
        let truck = SimTruck::new(
            id,
            name,
            self.config.truck_capacity,
            self.state.warehouse_road_position.to_position(),
            self.config.truck_fuel_capacity,
        );
        self.state.trucks.insert(id, truck);
        id
    }

    /// Whether any machine stands within `tolerance` of `position`
    pub fn machine_near(&self, position: &Position, tolerance: f32) -> Option<MachineId> {
        self.machines()
            .find(|m| m.zone.position().distance(position) < tolerance)
            .map(|m| m.id)
    }

    /// Replace the road layout
    ///
    /// Trucks with a path left are re-planned from where they stand through
    /// their unvisited stops, so no truck keeps stale waypoints.
    pub fn set_map_layout(&mut self, road_tiles: impl IntoIterator<Item = GridPos>) {
        self.state.road_tiles = road_tiles.into_iter().collect();
        self.rebuild_road_network();
        info!(
            "Road layout replaced: {} tiles",
            self.road_network.tile_count()
        );
        self.replan_active_trucks();
    }

    /// Move the warehouse road entry; parked trucks move with it
    pub fn set_warehouse_road_position(&mut self, position: GridPos) {
        let old = self.state.warehouse_road_position;
        self.state.warehouse_road_position = position;
        self.rebuild_road_network();

        for truck in self.state.trucks.values_mut() {
            if truck.status() == TruckStatus::Idle && truck.position().to_grid() == old {
                truck.park_at(position.to_position());
            }
        }
        self.replan_active_trucks();
    }

    fn rebuild_road_network(&mut self) {
        let mut tiles = self.state.road_tiles.clone();
        tiles.insert(self.state.warehouse_road_position);
        self.road_network = SimRoadNetwork::from_tiles(tiles);
    }

    fn replan_active_trucks(&mut self) {
        let active: Vec<(TruckId, Position, Vec<MachineId>)> = self
            .trucks()
            .filter(|t| t.status() != TruckStatus::Idle)
            .map(|t| (t.id, t.position(), t.remaining_stops()))
            .collect();

        for (truck_id, position, stops) in active {
            let path = self.plan_path(position, &stops);
            if path.is_empty() {
                warn!(
                    "Truck {:?} has no path on the new layout, parking in place",
                    truck_id
                );
            }
            if let Some(truck) = self.state.trucks.get_mut(&truck_id) {
                truck.replace_path(path);
            }
        }
    }

    /// The road tile a truck stops at to service a machine
    pub fn access_tile(&self, machine: MachineId) -> Option<GridPos> {
        let machine = self.machine(machine)?;
        self.road_network.nearest_road_tile(&machine.zone.position())
    }

    /// Plan waypoints from `from` through `stops`, then back to the warehouse
    ///
    /// Stops that are missing or unreachable are skipped with a warning.
    pub fn plan_path(&mut self, from: Position, stops: &[MachineId]) -> Vec<Waypoint> {
        let Some(mut current) = self.road_network.nearest_road_tile(&from) else {
            warn!("No road tiles to plan a path on");
            return Vec::new();
        };

        let mut waypoints = Vec::new();
        if current.to_position() != from {
            waypoints.push(Waypoint::road(current));
        }

        for &machine_id in stops {
            let Some(access) = self.access_tile(machine_id) else {
                warn!("Skipping stop {:?}: machine not found", machine_id);
                continue;
            };
            match self.road_network.path_between(current, access) {
                Ok(leg) => {
                    let road_tiles = leg.len().saturating_sub(1);
                    waypoints.extend(leg[..road_tiles].iter().map(|tile| Waypoint::road(*tile)));
                    waypoints.push(Waypoint::stop(access, machine_id));
                    current = access;
                }
                Err(e) => warn!("Skipping stop {:?}: {:#}", machine_id, e),
            }
        }

        let home = self.state.warehouse_road_position;
        match self.road_network.path_between(current, home) {
            Ok(leg) => waypoints.extend(leg.into_iter().map(Waypoint::road)),
            Err(e) => warn!("No way back to the warehouse: {:#}", e),
        }

        waypoints
    }

    /// Send a truck along its route and back to the warehouse
    ///
    /// Returns `Ok(false)` without changes when the truck has no cargo, no
    /// route, or no reachable path.
    pub fn go_stock(&mut self, truck_id: TruckId) -> Result<bool, ValidationError> {
        let truck = self
            .truck(truck_id)
            .ok_or(ValidationError::TruckNotFound(truck_id))?;

        if truck.cargo_total() == 0 || truck.route().is_empty() {
            debug!("Truck {:?} has nothing to deliver", truck_id);
            return Ok(false);
        }

        let from = truck.position();
        let route = truck.route().to_vec();
        let path = self.plan_path(from, &route);
        if !path.iter().any(|waypoint| waypoint.stop.is_some()) {
            warn!("Truck {:?} cannot reach any stop on its route", truck_id);
            return Ok(false);
        }

        let stops = path.iter().filter(|w| w.stop.is_some()).count();
        if let Some(truck) = self.state.trucks.get_mut(&truck_id) {
            info!(
                "Dispatching {} ({:?}) to {} stops over {} tiles",
                truck.name,
                truck_id,
                stops,
                path.len()
            );
            truck.set_path(path);
        }
        Ok(true)
    }

    /// Put a marketing button on a random working machine
    pub fn spawn_marketing_button(&mut self, rng: &mut impl Rng) -> Option<MarketingButtonId> {
        let candidates: Vec<MachineId> = self
            .machines()
            .filter(|m| !m.is_broken())
            .map(|m| m.id)
            .collect();
        let machine = *candidates.choose(rng)?;

        let id = MarketingButtonId(self.next_sim_id());
        let button = MarketingButton {
            id,
            machine,
            expires_at: self.state.time + self.config.marketing_button_lifetime,
        };
        self.state.marketing_buttons.insert(id, button);
        debug!("Marketing button {:?} spawned on {:?}", id, machine);
        Some(id)
    }

    /// Consume a marketing button, boosting its machine's customer interest
    pub fn claim_marketing_button(
        &mut self,
        id: MarketingButtonId,
    ) -> Result<MachineId, ValidationError> {
        let button = self
            .state
            .marketing_buttons
            .remove(&id)
            .ok_or(ValidationError::MarketingButtonNotFound(id))?;

        let boost = self.config.marketing_interest_boost * self.modifiers.marketing_boost;
        match self.state.machines.get_mut(&button.machine) {
            Some(machine) => {
                machine.boost_interest(boost);
                Ok(button.machine)
            }
            None => Err(ValidationError::MachineNotFound(button.machine)),
        }
    }

    /// Advance every entity by `delta_secs`
    ///
    /// A negative, zero or non-finite step leaves the world untouched.
    pub fn tick(&mut self, delta_secs: f32, rng: &mut impl Rng) -> TickReport {
        let mut report = TickReport::default();
        if !delta_secs.is_finite() || delta_secs <= 0.0 {
            warn!("Ignoring tick with invalid delta {}", delta_secs);
            return report;
        }
        self.state.time += delta_secs;
        self.state.tick_count += 1;

        self.update_machines(delta_secs, rng, &mut report);
        self.update_trucks(delta_secs, &mut report);
        self.expire_marketing_buttons(&mut report);

        report
    }

    fn update_machines(&mut self, delta_secs: f32, rng: &mut impl Rng, report: &mut TickReport) {
        let breakdown_chance =
            probability(self.config.breakdown_rate * self.modifiers.breakdown_rate * delta_secs as f64);

        for machine in self.state.machines.values_mut() {
            let foot_traffic = self.config.foot_traffic(machine.zone.zone_type);

            machine.update_interest(
                delta_secs,
                foot_traffic,
                self.config.interest_growth_rate,
                self.config.interest_decay_rate,
            );

            let sales =
                machine.serve_customers(delta_secs, foot_traffic, self.config.purchase_rate, rng);
            report.sales.merge(sales);

            if !machine.is_broken() && rng.random_bool(breakdown_chance) {
                machine.breakdown();
                report.breakdowns.push(machine.id);
                info!("Machine {:?} broke down", machine.id);
            }
        }
    }

    fn update_trucks(&mut self, delta_secs: f32, report: &mut TickReport) {
        let speed = self.config.truck_speed * self.modifiers.truck_speed;
        let fuel_per_tile = self.config.fuel_per_tile;
        let truck_ids: Vec<TruckId> = self.state.trucks.keys().copied().collect();

        for truck_id in truck_ids {
            let Some(truck) = self.state.trucks.get_mut(&truck_id) else {
                continue;
            };

            let result = match truck.status() {
                TruckStatus::Idle => continue,
                TruckStatus::Restocking => {
                    match self.restock_current_stop(truck_id) {
                        Ok(units) => report.units_restocked += units,
                        Err(e) => warn!("Truck {:?} skipped a stop: {:#}", truck_id, e),
                    }
                    match self.state.trucks.get_mut(&truck_id) {
                        Some(truck) => truck.finish_restocking(),
                        None => continue,
                    }
                }
                TruckStatus::Traveling => {
                    let was_stalled = truck.is_stalled();
                    let result = truck.update(delta_secs, speed, fuel_per_tile);
                    if result == TruckUpdateResult::Stalled && !was_stalled {
                        warn!("Truck {:?} ran out of fuel", truck_id);
                    }
                    result
                }
            };

            match result {
                TruckUpdateResult::ArrivedAtStop(machine) => {
                    report.arrivals.push((truck_id, machine));
                }
                TruckUpdateResult::ReachedEnd => {
                    if self.on_truck_reached_end(truck_id) {
                        report.trucks_returned.push(truck_id);
                    }
                }
                TruckUpdateResult::Continue | TruckUpdateResult::Stalled => {}
            }
        }
    }

    /// Unload as much cargo as the machine at the truck's stop takes
    fn restock_current_stop(&mut self, truck_id: TruckId) -> Result<Quantity> {
        let truck = self
            .state
            .trucks
            .get_mut(&truck_id)
            .ok_or_else(|| anyhow::anyhow!("truck {:?} vanished", truck_id))?;
        let machine_id = truck
            .current_stop()
            .ok_or_else(|| anyhow::anyhow!("restocking without a stop"))?;
        let machine = self
            .state
            .machines
            .get_mut(&machine_id)
            .ok_or_else(|| anyhow::anyhow!("machine {:?} not found", machine_id))?;

        let mut unloaded = 0;
        let cargo: Vec<(Product, Quantity)> =
            truck.inventory().iter().map(|(p, q)| (*p, *q)).collect();
        for (product, carried) in cargo {
            let qty = carried.min(machine.free_capacity(product));
            if qty == 0 {
                continue;
            }
            truck.remove_cargo(product, qty)?;
            if let Err(e) = machine.restock(product, qty) {
                truck.add_cargo(product, qty)?;
                return Err(e.into());
            }
            unloaded += qty;
        }

        debug!(
            "Truck {:?} unloaded {} units into {:?}",
            truck_id, unloaded, machine_id
        );
        Ok(unloaded)
    }

    /// Refuel a truck whose path ended at the warehouse entry
    ///
    /// Returns false when the path ended anywhere else.
    fn on_truck_reached_end(&mut self, truck_id: TruckId) -> bool {
        let home = self.state.warehouse_road_position;
        let Some(truck) = self.state.trucks.get_mut(&truck_id) else {
            return false;
        };
        if truck.position().to_grid() != home {
            warn!("{} ({:?}) stopped short of the warehouse", truck.name, truck_id);
            return false;
        }
        truck.refuel();
        info!("{} ({:?}) returned to the warehouse", truck.name, truck_id);
        true
    }

    fn expire_marketing_buttons(&mut self, report: &mut TickReport) {
        let now = self.state.time;
        self.state.marketing_buttons.retain(|id, button| {
            let alive = button.expires_at > now;
            if !alive {
                report.expired_buttons.push(*id);
            }
            alive
        });
    }

    /// Log a summary of the current state
    pub fn print_summary(&self) {
        info!("=== Simulation Summary (t={:.1}s) ===", self.state.time);
        info!("Total ticks: {}", self.state.tick_count);
        info!(
            "Warehouse: {}/{} units ({:.0}%)",
            self.state.warehouse.total(),
            self.state.warehouse.capacity(),
            self.state.warehouse.capacity_percent() * 100.0
        );
        info!("Road tiles: {}", self.road_network.tile_count());

        for machine in self.machines() {
            info!(
                "  Machine {:?} ({}): stock={}/{}, cash={}, sales={}, {}",
                machine.id.0 .0,
                machine.zone.zone_type.name(),
                machine.total_stock(),
                machine.capacity(),
                machine.current_cash(),
                machine.total_sales(),
                if machine.is_broken() { "BROKEN" } else { "ok" }
            );
        }

        for truck in self.trucks() {
            info!(
                "  Truck {:?} {}: {:?}, cargo={}/{}, fuel={:.1}, position=({:.1}, {:.1}), path={}/{}",
                truck.id.0 .0,
                truck.name,
                truck.status(),
                truck.cargo_total(),
                truck.capacity(),
                truck.fuel(),
                truck.position().x,
                truck.position().y,
                truck.path_index(),
                truck.path().len()
            );
        }
    }

    /// Render roads, machines and trucks as a text grid
    ///
    /// The grid covers the roads and warehouse entry plus a
    /// [`RENDER_MARGIN`] border; anything further out is left off.
    pub fn render_map(&self) -> String {
        let mut roads: Vec<GridPos> = self.road_network.tiles().iter().copied().collect();
        roads.push(self.state.warehouse_road_position);

        let (Some(road_min_x), Some(road_max_x), Some(road_min_y), Some(road_max_y)) = (
            roads.iter().map(|t| t.x as i64).min(),
            roads.iter().map(|t| t.x as i64).max(),
            roads.iter().map(|t| t.y as i64).min(),
            roads.iter().map(|t| t.y as i64).max(),
        ) else {
            return String::new();
        };

        let near_roads = |tile: &GridPos| {
            (road_min_x - RENDER_MARGIN..=road_max_x + RENDER_MARGIN).contains(&(tile.x as i64))
                && (road_min_y - RENDER_MARGIN..=road_max_y + RENDER_MARGIN)
                    .contains(&(tile.y as i64))
        };
        let entities: Vec<GridPos> = self
            .machines()
            .map(|m| m.zone.tile())
            .chain(self.trucks().map(|t| t.position().to_grid()))
            .filter(|tile| near_roads(tile))
            .collect();

        let min_x = entities.iter().map(|t| t.x as i64).fold(road_min_x, i64::min);
        let max_x = entities.iter().map(|t| t.x as i64).fold(road_max_x, i64::max);
        let min_y = entities.iter().map(|t| t.y as i64).fold(road_min_y, i64::min);
        let max_y = entities.iter().map(|t| t.y as i64).fold(road_max_y, i64::max);

        let width = (max_x - min_x + 1) as usize;
        let height = (max_y - min_y + 1) as usize;
        let mut grid = vec![vec!['.'; width]; height];
        let mut put = |tile: GridPos, c: char| {
            let (x, y) = (tile.x as i64 - min_x, tile.y as i64 - min_y);
            if (0..width as i64).contains(&x) && (0..height as i64).contains(&y) {
                grid[y as usize][x as usize] = c;
            }
        };

        for tile in self.road_network.tiles() {
            put(*tile, '#');
        }
        put(self.state.warehouse_road_position, 'W');
        for machine in self.machines() {
            put(machine.zone.tile(), if machine.is_broken() { 'X' } else { 'M' });
        }
        for truck in self.trucks() {
            put(truck.position().to_grid(), 'T');
        }

        let mut out = String::from("Legend: W=Warehouse entry, M=Machine, X=Broken, T=Truck, #=Road\n");
        for row in grid {
            out.extend(row);
            out.push('\n');
        }
        out
    }
}
