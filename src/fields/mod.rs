//! Field store: the complete set of per-cell buffers, allocated up front.
//!
//! Every field exists from construction on. Engines hold the handles
//! ([`MaterialFields`], [`FluidFields`]) and resolve ping-pong sides through
//! them while encoding.

use crate::compute::{BufferId, ComputeDevice, PingPong};
use crate::grid::Grid;

/// Addresses one channel of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHandle {
    pub buffer: BufferId,
    /// Channel within the texel (0 for scalar fields).
    pub channel: u32,
    /// Channels per texel of the underlying buffer.
    pub channels: u32,
}

impl FieldHandle {
    pub fn scalar(buffer: BufferId) -> Self {
        Self { buffer, channel: 0, channels: 1 }
    }
}

/// Owned copy of one field channel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    label: String,
    grid: Grid,
    values: Vec<f32>,
}

impl FieldSnapshot {
    pub fn new(label: &str, grid: Grid, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), grid.cell_count());
        Self {
            label: label.to_string(),
            grid,
            values,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[self.grid.index(x, y)]
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().map(|&v| v as f64).sum()
    }

    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Raw little-endian `f32` bytes for renderer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.values)
    }
}

/// Material buffers.
///
/// `materials` packs soil, rock and lava depths into channels 0..2 of a
/// 4-channel texel. `scratch` is the output side of every material pass and
/// is copied back explicitly. `delta` collects brush transfers before the
/// apply pass. `height` holds `soil + rock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialFields {
    pub materials: BufferId,
    pub scratch: BufferId,
    pub delta: BufferId,
    pub height: BufferId,
}

impl MaterialFields {
    pub fn allocate(device: &mut ComputeDevice) -> Self {
        Self {
            materials: device.create_buffer("materials", 4, 0.0),
            scratch: device.create_buffer("materials_scratch", 4, 0.0),
            delta: device.create_buffer("material_delta", 4, 0.0),
            height: device.create_buffer("height", 1, 0.0),
        }
    }

    pub fn buffers(&self) -> [BufferId; 4] {
        [self.materials, self.scratch, self.delta, self.height]
    }
}

/// Fluid buffers. Everything that a stage both reads and writes is a
/// ping-pong pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluidFields {
    pub flow: PingPong,
    /// Read-only copy of the latest flow for the stages after the flow stage.
    pub flow_sampled: BufferId,
    pub accumulation: PingPong,
    pub water_depth: PingPong,
    pub sediment: PingPong,
    pub temperature: PingPong,
    pub pool_mask: BufferId,
}

impl FluidFields {
    /// Allocates every fluid buffer. Temperature starts at `ambient`.
    pub fn allocate(device: &mut ComputeDevice, ambient: f32) -> Self {
        let mut pair = |label: &str, channels: u32, init: f32| {
            PingPong::new(
                device.create_buffer(&format!("{label}_a"), channels, init),
                device.create_buffer(&format!("{label}_b"), channels, init),
            )
        };
        let flow = pair("flow", 2, 0.0);
        let accumulation = pair("flow_accumulation", 1, 0.0);
        let water_depth = pair("water_depth", 1, 0.0);
        let sediment = pair("sediment", 1, 0.0);
        let temperature = pair("temperature", 1, ambient);

        Self {
            flow,
            flow_sampled: device.create_buffer("flow_sampled", 2, 0.0),
            accumulation,
            water_depth,
            sediment,
            temperature,
            pool_mask: device.create_buffer("pool_mask", 1, 0.0),
        }
    }

    pub fn buffers(&self) -> Vec<BufferId> {
        let mut out = Vec::with_capacity(12);
        for pp in [self.flow, self.accumulation, self.water_depth, self.sediment, self.temperature] {
            out.extend(pp.buffers());
        }
        out.push(self.flow_sampled);
        out.push(self.pool_mask);
        out
    }
}

/// The complete field set of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldStore {
    pub material: MaterialFields,
    pub fluid: FluidFields,
}

impl FieldStore {
    pub fn new(device: &mut ComputeDevice, ambient_temperature: f32) -> Self {
        let material = MaterialFields::allocate(device);
        let fluid = FluidFields::allocate(device, ambient_temperature);
        log::debug!("allocated {} field buffers", device.live_buffers());
        Self { material, fluid }
    }
}
