//! Property-based tests for the game controller.
//!
//! Random action sequences must never create or destroy goods except through
//! sales, and must never push any container past its capacity.

use proptest::prelude::*;
use vending_tycoon::simulation::{
    GameController, GridPos, MachineUpdate, Product, SimConfig, ZoneType,
};

#[derive(Debug, Clone)]
enum Action {
    BuyStock(usize, u32),
    BuyMachine(usize, i32, i32),
    BuyTruck,
    Load(usize, usize, u32),
    Unload(usize, usize, u32),
    RouteAll(usize),
    GoStock(usize),
    Sale(usize, usize, u32),
    Retrieve(usize),
    DropRoad(i32),
    Tick(u8),
}

fn arb_actions(max_ops: usize) -> impl Strategy<Value = Vec<Action>> {
    proptest::collection::vec(
        prop_oneof![
            (0..6usize, 0..120u32).prop_map(|(p, q)| Action::BuyStock(p, q)),
            (0..8usize, 0..10i32, 0..4i32).prop_map(|(z, x, y)| Action::BuyMachine(z, x, y)),
            Just(Action::BuyTruck),
            (0..3usize, 0..6usize, 0..60u32).prop_map(|(t, p, q)| Action::Load(t, p, q)),
            (0..3usize, 0..6usize, 0..60u32).prop_map(|(t, p, q)| Action::Unload(t, p, q)),
            (0..3usize).prop_map(Action::RouteAll),
            (0..3usize).prop_map(Action::GoStock),
            (0..6usize, 0..6usize, 0..5u32).prop_map(|(m, p, q)| Action::Sale(m, p, q)),
            (0..6usize).prop_map(Action::Retrieve),
            (1..9i32).prop_map(Action::DropRoad),
            (1..40u8).prop_map(Action::Tick),
        ],
        1..=max_ops,
    )
}

fn nth<T: Copy>(items: &[T], index: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[index % items.len()])
    }
}

/// Roads along rows 0 and 4 joined at both ends
fn ring() -> Vec<GridPos> {
    let mut tiles: Vec<GridPos> = (0..10)
        .flat_map(|x| [GridPos::new(x, 0), GridPos::new(x, 4)])
        .collect();
    tiles.extend((1..4).flat_map(|y| [GridPos::new(0, y), GridPos::new(9, y)]));
    tiles
}

fn assert_capacities(game: &GameController) -> Result<(), TestCaseError> {
    let engine = game.engine();
    prop_assert!(engine.warehouse().is_within_capacity());
    for machine in engine.machines() {
        prop_assert!(machine.is_consistent(), "machine {:?}", machine.id);
    }
    for truck in engine.trucks() {
        prop_assert!(truck.is_consistent(), "truck {:?}", truck.id);
    }
    prop_assert!(game.cash() >= 0);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn goods_are_conserved_and_capacities_hold(actions in arb_actions(60)) {
        let mut game = GameController::new(SimConfig::default(), 17);
        game.set_warehouse_road_position(GridPos::ORIGIN);
        let mut roads = ring();
        game.set_map_layout(roads.clone());
        game.start_simulation();

        let mut purchased: u64 = 0;
        let mut sold: u64 = 0;

        for action in actions {
            let machines: Vec<_> = game.engine().machines().map(|m| m.id).collect();
            let trucks: Vec<_> = game.engine().trucks().map(|t| t.id).collect();

            match action {
                Action::BuyStock(p, qty) => {
                    if game.buy_warehouse_stock(Product::ALL[p], qty).is_ok() {
                        purchased += qty as u64;
                    }
                }
                Action::BuyMachine(z, x, y) => {
                    let _ = game.buy_machine_with_stock(ZoneType::ALL[z], x as f32, y as f32);
                }
                Action::BuyTruck => {
                    let _ = game.buy_truck("Prop");
                }
                Action::Load(t, p, qty) => {
                    if let Some(truck) = nth(&trucks, t) {
                        let _ = game.load_truck(truck, Product::ALL[p], qty);
                    }
                }
                Action::Unload(t, p, qty) => {
                    if let Some(truck) = nth(&trucks, t) {
                        let _ = game.unload_truck(truck, Product::ALL[p], qty);
                    }
                }
                Action::RouteAll(t) => {
                    if let Some(truck) = nth(&trucks, t) {
                        game.update_route(truck, machines.clone()).unwrap();
                    }
                }
                Action::GoStock(t) => {
                    if let Some(truck) = nth(&trucks, t) {
                        game.go_stock(truck).unwrap();
                    }
                }
                Action::Sale(m, p, qty) => {
                    if let Some(machine) = nth(&machines, m) {
                        let product = Product::ALL[p];
                        let before = game.engine().machine(machine).unwrap().quantity(product);
                        game.update_machine(machine, MachineUpdate::Sale { product, quantity: qty })
                            .unwrap();
                        let after = game.engine().machine(machine).unwrap().quantity(product);
                        sold += (before - after) as u64;
                    }
                }
                Action::Retrieve(m) => {
                    if let Some(machine) = nth(&machines, m) {
                        game.retrieve_cash(machine).unwrap();
                        prop_assert_eq!(game.retrieve_cash(machine).unwrap(), 0);
                    }
                }
                Action::DropRoad(x) => {
                    roads.retain(|tile| *tile != GridPos::new(x, 0));
                    game.set_map_layout(roads.clone());
                }
                Action::Tick(n) => {
                    for _ in 0..n {
                        if let Some(report) = game.tick(0.1) {
                            sold += report.sales.sold_qty as u64;
                        }
                    }
                }
            }

            prop_assert_eq!(game.engine().total_goods() + sold, purchased);
            assert_capacities(&game)?;
        }
    }

    #[test]
    fn route_round_trips(stops in proptest::collection::vec(0..5usize, 0..12)) {
        let mut game = GameController::new(SimConfig::default(), 1);
        let truck = game.buy_truck("Prop").unwrap();
        let machines: Vec<_> = (0..3)
            .map(|i| game.buy_machine_with_stock(ZoneType::Park, i as f32 * 2.0, 1.0).unwrap())
            .collect();

        let route: Vec<_> = stops.iter().map(|i| machines[i % machines.len()]).collect();
        game.update_route(truck, route.clone()).unwrap();
        prop_assert_eq!(game.route(truck).unwrap(), route.as_slice());
    }
}
