//! Vending Tycoon Simulation Library
//!
//! The deterministic economy and logistics core of a vending machine tycoon
//! game. A presentation layer drives it through [`simulation::GameController`]
//! and reads [`simulation::GameSnapshot`]s back.

pub mod simulation;
