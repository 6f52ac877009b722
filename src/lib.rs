//! Interactive terrain deformation and surface-fluid simulation.
//!
//! This crate advances conserved material fields (soil, rock, lava) and the
//! derived fluid fields (flow, water depth, sediment, pooling, temperature)
//! on a uniform grid. Work is expressed as a per-frame command stream of
//! parallel compute kernels executed by a [`compute::ComputeDevice`].

pub mod grid;
pub mod compute;
pub mod fields;
pub mod material;
pub mod fluid;
pub mod pipeline;
pub mod config;

#[cfg(test)]
pub(crate) mod test_support;

pub use grid::{Falloff, Grid};
pub use compute::{BufferId, ComputeConfig, ComputeDevice, ComputeError, Frame, FrameStats};
pub use fields::{FieldHandle, FieldSnapshot};
pub use material::{BrushMode, BrushStroke, HandState, Material, MaterialConfig, MaterialEngine};
pub use fluid::{FluidConfig, FluidEngine, FluidStage, SourceError, SourceKind};
pub use pipeline::{FieldStats, SimError, Simulation};
pub use config::{ConfigError, SimConfig};
