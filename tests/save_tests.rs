//! Save and load through the controller

use vending_tycoon::simulation::{
    load, save, CorruptStateError, GameController, GridPos, ResearchKind, SimConfig,
};

fn played_demo(seed: u64, ticks: u32) -> GameController {
    let mut game = GameController::demo(SimConfig::default(), seed).unwrap();
    game.start_simulation();
    for tick in 0..ticks {
        if tick % 10 == 0 {
            game.autopilot();
        }
        game.tick(0.1);
    }
    game
}

#[test]
fn test_save_load_round_trip() {
    let mut game = played_demo(21, 300);
    game.unlock_research(ResearchKind::ReinforcedMachines).ok();
    game.spawn_marketing_button();

    let bytes = game.save().unwrap();
    let restored = GameController::load(SimConfig::default(), &bytes, 21).unwrap();
    assert_eq!(restored.snapshot(), game.snapshot());
    assert!(!restored.is_simulation_running());
}

#[test]
fn test_loaded_games_continue_identically() {
    let bytes = played_demo(4, 200).save().unwrap();

    let resume = || {
        let mut game = GameController::load(SimConfig::default(), &bytes, 99).unwrap();
        game.start_simulation();
        for tick in 0..300 {
            if tick % 10 == 0 {
                game.autopilot();
            }
            game.tick(0.1);
        }
        game.snapshot()
    };
    assert_eq!(resume(), resume());
}

#[test]
fn test_loaded_game_keeps_road_network() {
    let game = played_demo(8, 10);
    let bytes = game.save().unwrap();
    let restored = GameController::load(SimConfig::default(), &bytes, 8).unwrap();

    assert_eq!(
        restored.engine().road_network().tiles(),
        game.engine().road_network().tiles()
    );
    assert_eq!(restored.engine().warehouse_road_position(), GridPos::ORIGIN);
    assert_eq!(restored.draw_map(), game.draw_map());
}

#[test]
fn test_corrupt_bytes_are_rejected() {
    let game = played_demo(2, 0);
    let mut bytes = game.save().unwrap();

    assert!(matches!(
        GameController::load(SimConfig::default(), &bytes[..bytes.len() / 2], 2),
        Err(CorruptStateError::Decode(_))
    ));

    bytes.truncate(0);
    assert!(load(&bytes).is_err());
}

#[test]
fn test_invalid_snapshot_is_rejected() {
    let game = played_demo(3, 0);
    let mut snapshot = game.snapshot();
    snapshot.game.cash = -5;
    let bytes = save(&snapshot).unwrap();
    assert!(matches!(load(&bytes), Err(CorruptStateError::Invalid(_))));
}
