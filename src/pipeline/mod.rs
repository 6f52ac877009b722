//! Frame orchestration: one owner for the device and both engines.

mod simulation;

pub use simulation::{FieldStats, SimError, Simulation};
