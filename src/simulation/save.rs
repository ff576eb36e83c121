//! Save files for a running game
//!
//! A save is a bitcode-encoded [`SaveFile`]: a small header for format
//! detection followed by the full [`GameSnapshot`]. Loading checks the header
//! and every entity invariant before handing the snapshot back, so a caller
//! never sees half-valid state.

use serde::{Deserialize, Serialize};

use super::city_map::CityMapState;
use super::engine::EngineState;
use super::game_state::GameState;

/// Magic number identifying a vending tycoon save
pub const SAVE_MAGIC: u32 = 0x7E4D_0001;

/// Current save format version. Increment when breaking the layout.
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Why a save could not be loaded
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CorruptStateError {
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported save version: expected {}, got {}", SAVE_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("save from future version {0} (this build supports up to {SAVE_VERSION})")]
    FutureVersion(u32),
    #[error("invalid state: {0}")]
    Invalid(String),
}

/// Everything needed to restore a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub city_map: CityMapState,
    pub engine: EngineState,
    pub game: GameState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
    /// Engine tick count when the save was written
    pub tick: u64,
}

impl SaveHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: SAVE_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), CorruptStateError> {
        if self.magic != SAVE_MAGIC {
            return Err(CorruptStateError::InvalidMagic(self.magic));
        }
        if self.version > SAVE_VERSION {
            return Err(CorruptStateError::FutureVersion(self.version));
        }
        if self.version < SAVE_VERSION {
            return Err(CorruptStateError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SaveFile {
    header: SaveHeader,
    snapshot: GameSnapshot,
}

/// Encode a snapshot to bytes
pub fn save(snapshot: &GameSnapshot) -> Result<Vec<u8>, SaveError> {
    let file = SaveFile {
        header: SaveHeader::new(snapshot.engine.tick_count),
        snapshot: snapshot.clone(),
    };
    bitcode::serialize(&file).map_err(|e| SaveError::Encode(e.to_string()))
}

/// Decode and validate a snapshot
pub fn load(data: &[u8]) -> Result<GameSnapshot, CorruptStateError> {
    let file: SaveFile =
        bitcode::deserialize(data).map_err(|e| CorruptStateError::Decode(e.to_string()))?;
    file.header.validate()?;
    validate_snapshot(&file.snapshot)?;
    Ok(file.snapshot)
}

/// Check the invariants a freshly decoded snapshot must hold
pub fn validate_snapshot(snapshot: &GameSnapshot) -> Result<(), CorruptStateError> {
    let invalid = |msg: String| -> Result<(), CorruptStateError> {
        Err(CorruptStateError::Invalid(msg))
    };
    let engine = &snapshot.engine;

    if !snapshot.city_map.is_consistent() {
        return invalid("city map size does not match its tiles".to_string());
    }
    if !engine.warehouse.is_within_capacity() {
        return invalid(format!(
            "warehouse holds {} units over capacity {}",
            engine.warehouse.total(),
            engine.warehouse.capacity()
        ));
    }

    for (id, machine) in &engine.machines {
        if machine.id != *id || !machine.is_consistent() {
            return invalid(format!("machine {:?} is inconsistent", id));
        }
        if id.0 .0 >= engine.next_id {
            return invalid(format!("machine {:?} is ahead of the id counter", id));
        }
    }

    for (id, truck) in &engine.trucks {
        if truck.id != *id || !truck.is_consistent() {
            return invalid(format!("truck {:?} is inconsistent", id));
        }
        if id.0 .0 >= engine.next_id {
            return invalid(format!("truck {:?} is ahead of the id counter", id));
        }
    }

    for (id, button) in &engine.marketing_buttons {
        if button.id != *id || id.0 .0 >= engine.next_id {
            return invalid(format!("marketing button {:?} is inconsistent", id));
        }
    }

    if snapshot.game.cash < 0 {
        return invalid(format!("negative cash {}", snapshot.game.cash));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::catalog::{Product, ZoneType};
    use crate::simulation::config::SimConfig;
    use crate::simulation::engine::SimEngine;
    use crate::simulation::machine::Zone;
    use crate::simulation::types::GridPos;

    fn snapshot() -> GameSnapshot {
        let mut engine = SimEngine::new(SimConfig::default());
        engine.set_map_layout((0..4).map(|x| GridPos::new(x, 0)));
        engine.warehouse_mut().unload(Product::Chips, 40).unwrap();
        let machine = engine.add_machine(Zone {
            x: 2.0,
            y: 1.0,
            zone_type: ZoneType::Gym,
        });
        engine.machine_mut(machine).unwrap().restock(Product::Chips, 5).unwrap();
        engine.add_truck("Van");

        GameSnapshot {
            city_map: CityMapState::from_rows(&["W###", "..G."]).unwrap(),
            engine: engine.state().clone(),
            game: GameState::default(),
        }
    }

    #[test]
    fn header_rejects_wrong_magic_and_versions() {
        let mut header = SaveHeader::new(0);
        assert!(header.validate().is_ok());

        header.version = SAVE_VERSION + 1;
        assert_eq!(
            header.validate(),
            Err(CorruptStateError::FutureVersion(SAVE_VERSION + 1))
        );

        header.version = SAVE_VERSION;
        header.magic = 0xDEAD_BEEF;
        assert_eq!(header.validate(), Err(CorruptStateError::InvalidMagic(0xDEAD_BEEF)));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(load(&[]), Err(CorruptStateError::Decode(_))));
        assert!(matches!(load(&[1, 2, 3]), Err(CorruptStateError::Decode(_))));
    }

    #[test]
    fn round_trip_keeps_everything() {
        let original = snapshot();
        let bytes = save(&original).unwrap();
        assert_eq!(load(&bytes).unwrap(), original);
    }

    #[test]
    fn inconsistent_state_is_rejected() {
        let mut bad = snapshot();
        bad.engine.next_id = 0;
        let bytes = save(&bad).unwrap();
        assert!(matches!(load(&bytes), Err(CorruptStateError::Invalid(_))));

        let mut broke = snapshot();
        broke.game.cash = -1;
        assert!(validate_snapshot(&broke).is_err());
    }
}
