//! Material engine: brush edits on soil, rock and lava plus the hand.
//!
//! Strokes are validated and queued by [`MaterialEngine::add_op`] and take
//! effect when [`MaterialEngine::execute`] encodes the frame's passes:
//!
//! 1. transfer (pickup/deposit into the delta buffer)
//! 2. apply (delta folded in, bounds enforced) and copy-back
//! 3. smooth, directional smooth and flatten, each with copy-back
//! 4. thermal relaxation
//! 5. height recombination

mod apply;
mod config;
mod hand;
mod ops;
mod sculpt;
mod thermal;
mod transfer;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::{
    Bindings, ComputeDevice, ComputeError, Frame, Kernel, KernelIo, WORKGROUP_CELLS,
};
use crate::fields::{FieldHandle, MaterialFields};
use crate::grid::{sample_bilinear, Grid};

pub use config::MaterialConfig;
pub use hand::{HandLedger, HandState, TransferBudget, GRAMS_PER_KG};
pub use ops::{BrushMode, BrushStroke, Direction, SculptOp, SculptTarget, TransferMode, TransferOp};
pub use thermal::THERMAL_ITERATIONS;

use apply::ApplyKernel;
use sculpt::SculptKernel;
use transfer::TransferKernel;

/// A terrain material. The discriminant is its channel in [`MaterialTexel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Soil = 0,
    Rock = 1,
    Lava = 2,
}

impl Material {
    pub const ALL: [Material; 3] = [Material::Soil, Material::Rock, Material::Lava];

    #[inline]
    pub fn channel(self) -> usize {
        self as usize
    }

    pub(crate) fn index(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_index(i: u8) -> Option<Self> {
        Self::ALL.get(i as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Material::Soil => "soil",
            Material::Rock => "rock",
            Material::Lava => "lava",
        }
    }
}

impl std::str::FromStr for Material {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown material '{s}'"))
    }
}

/// One cell of the packed material buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MaterialTexel {
    pub soil: f32,
    pub rock: f32,
    pub lava: f32,
    pub _pad: f32,
}

impl MaterialTexel {
    pub fn new(soil: f32, rock: f32, lava: f32) -> Self {
        Self { soil, rock, lava, _pad: 0.0 }
    }

    #[inline]
    pub fn get(&self, material: Material) -> f32 {
        match material {
            Material::Soil => self.soil,
            Material::Rock => self.rock,
            Material::Lava => self.lava,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, material: Material) -> &mut f32 {
        match material {
            Material::Soil => &mut self.soil,
            Material::Rock => &mut self.rock,
            Material::Lava => &mut self.lava,
        }
    }

    /// Terrain elevation (`soil + rock`).
    #[inline]
    pub fn height(&self) -> f32 {
        self.soil + self.rock
    }

    #[inline]
    pub fn total(&self) -> f32 {
        self.soil + self.rock + self.lava
    }

    /// Rescales all channels by one factor so the total fits `max_total`.
    #[inline]
    pub fn clamp_total(&mut self, max_total: f32) {
        let total = self.total();
        if total > max_total && total > 0.0 {
            let scale = max_total / total;
            self.soil *= scale;
            self.rock *= scale;
            self.lava *= scale;
        }
    }

    /// Raises (soil, within headroom) or lowers (soil first, then rock) the
    /// surface by `change` meters.
    #[inline]
    pub fn shift_height(&mut self, change: f32, max_total: f32) {
        if change > 0.0 {
            self.soil += change.min((max_total - self.total()).max(0.0));
        } else {
            let mut take = -change;
            let from_soil = take.min(self.soil);
            self.soil -= from_soil;
            take -= from_soil;
            self.rock -= take.min(self.rock);
        }
    }
}

/// Uniform block shared by the material passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ThermalParams {
    pub tan_repose: f32,
    pub cell_size: f32,
    pub max_total_height: f32,
    pub _pad: f32,
    /// `[soil, rock, lava, unused]` in kg/m^3.
    pub densities: [f32; 4],
}

impl ThermalParams {
    pub fn new(config: &MaterialConfig, grid: &Grid) -> Self {
        let [soil, rock, lava] = config.densities();
        Self {
            tan_repose: config.tan_repose(),
            cell_size: grid.cell_size,
            max_total_height: config.max_total_height,
            _pad: 0.0,
            densities: [soil, rock, lava, 0.0],
        }
    }
}

/// Passes encoded by [`MaterialEngine::execute`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialPass {
    Transfer,
    Apply,
    Smooth,
    SmoothDirectional,
    Flatten,
    Thermal,
    RecombineHeight,
}

impl MaterialPass {
    pub fn name(self) -> &'static str {
        match self {
            MaterialPass::Transfer => "material_transfer",
            MaterialPass::Apply => "material_apply",
            MaterialPass::Smooth => "smooth",
            MaterialPass::SmoothDirectional => "smooth_directional",
            MaterialPass::Flatten => "flatten",
            MaterialPass::Thermal => "thermal_relax",
            MaterialPass::RecombineHeight => "recombine_height",
        }
    }
}

/// Writes `height = soil + rock`.
///
/// Bindings: read `materials`; write `height`.
pub(crate) struct RecombineHeightKernel;

impl Kernel for RecombineHeightKernel {
    fn label(&self) -> &str {
        MaterialPass::RecombineHeight.name()
    }

    fn slots(&self) -> (usize, usize) {
        (1, 1)
    }

    fn run(&self, _grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([materials], [height]) = (reads, writes) else {
            return;
        };
        let src = materials.texels::<MaterialTexel>();
        height
            .texels_mut::<f32>()
            .par_iter_mut()
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, h)| *h = src[i].height());
    }
}

pub(crate) fn encode_recombine_height(frame: &mut Frame, fields: &MaterialFields) {
    frame.dispatch(
        RecombineHeightKernel,
        Bindings::new().read(fields.materials).write(fields.height),
    );
}

/// Owns the hand, the op queues and the material field handles.
pub struct MaterialEngine {
    config: MaterialConfig,
    params: ThermalParams,
    fields: MaterialFields,
    hand: Arc<HandLedger>,
    transfers: Vec<TransferOp>,
    smooth_ops: Vec<SculptOp>,
    directional_ops: Vec<SculptOp>,
    flatten_ops: Vec<SculptOp>,
}

impl MaterialEngine {
    pub fn new(config: MaterialConfig, fields: MaterialFields, grid: &Grid) -> Self {
        let params = ThermalParams::new(&config, grid);
        let hand = Arc::new(HandLedger::new(config.hand_capacity_kg));
        Self {
            config,
            params,
            fields,
            hand,
            transfers: Vec::new(),
            smooth_ops: Vec::new(),
            directional_ops: Vec::new(),
            flatten_ops: Vec::new(),
        }
    }

    pub fn config(&self) -> &MaterialConfig {
        &self.config
    }

    pub fn params(&self) -> ThermalParams {
        self.params
    }

    pub fn fields(&self) -> MaterialFields {
        self.fields
    }

    pub fn height_field(&self) -> FieldHandle {
        FieldHandle::scalar(self.fields.height)
    }

    pub fn material_field(&self, material: Material) -> FieldHandle {
        FieldHandle {
            buffer: self.fields.materials,
            channel: material.channel() as u32,
            channels: 4,
        }
    }

    pub fn hand_state(&self) -> HandState {
        self.hand.state()
    }

    /// Empties the hand and forgets its material.
    pub fn reset_hand(&mut self) {
        self.hand.reset();
    }

    #[cfg(test)]
    pub(crate) fn hand(&self) -> &HandLedger {
        &self.hand
    }

    /// Number of queued operations awaiting the next [`execute`](Self::execute).
    pub fn pending_ops(&self) -> usize {
        self.transfers.len() + self.smooth_ops.len() + self.directional_ops.len() + self.flatten_ops.len()
    }

    /// Queues a brush stroke. Returns `false` when the stroke was dropped.
    pub fn add_op(&mut self, stroke: BrushStroke) -> bool {
        if !stroke.is_well_formed() {
            log::trace!("dropping malformed {} stroke", stroke.mode.name());
            return false;
        }
        let center = stroke.center();

        let transfer = |mode| TransferOp {
            mode,
            material: stroke.material,
            center,
            radius: stroke.radius,
            strength_kg_per_s: stroke.strength,
            dt: stroke.dt,
        };
        let sculpt = |target| SculptOp {
            target,
            center,
            radius: stroke.radius,
            strength: (stroke.strength / self.config.smooth_strength_scale).clamp(0.0, 1.0),
            dt: stroke.dt,
        };

        match stroke.mode {
            BrushMode::Pickup => {
                let hand = self.hand.state();
                if !hand.is_empty() && hand.kind != Some(stroke.material) {
                    log::trace!(
                        "dropping pickup of {}: hand holds {:?}",
                        stroke.material.name(),
                        hand.kind
                    );
                    return false;
                }
                self.transfers.push(transfer(TransferMode::Pickup));
            }
            BrushMode::Deposit => {
                if self.hand.state().is_empty() {
                    log::trace!("dropping deposit: hand is empty");
                    return false;
                }
                self.transfers.push(transfer(TransferMode::Deposit));
            }
            BrushMode::Smooth => {
                let op = sculpt(SculptTarget::LocalAverage(Direction::Both));
                self.smooth_ops.push(op);
            }
            BrushMode::SmoothRaise => {
                let op = sculpt(SculptTarget::LocalAverage(Direction::RaiseOnly));
                self.directional_ops.push(op);
            }
            BrushMode::SmoothLower => {
                let op = sculpt(SculptTarget::LocalAverage(Direction::LowerOnly));
                self.directional_ops.push(op);
            }
            BrushMode::Flatten => {
                let op = sculpt(SculptTarget::Flatten(stroke.height_hint));
                self.flatten_ops.push(op);
            }
        }
        true
    }

    /// Encodes this frame's material passes and clears the queues.
    pub fn execute(&mut self, frame: &mut Frame) {
        let fields = self.fields;

        if !self.transfers.is_empty() {
            frame.clear_buffer(fields.delta);
            for op in &self.transfers {
                frame.dispatch(
                    TransferKernel {
                        op: *op,
                        params: self.params,
                        falloff: self.config.falloff,
                        hand: Arc::clone(&self.hand),
                    },
                    Bindings::new().read(fields.materials).write(fields.delta),
                );
            }
            frame.dispatch(
                ApplyKernel {
                    max_total_height: self.config.max_total_height,
                },
                Bindings::new()
                    .read(fields.materials)
                    .read(fields.delta)
                    .write(fields.scratch),
            );
            frame.copy_buffer_to_buffer(fields.scratch, fields.materials);
        }

        let sculpts = self
            .smooth_ops
            .iter()
            .chain(&self.directional_ops)
            .chain(&self.flatten_ops);
        for op in sculpts {
            frame.dispatch(
                SculptKernel {
                    op: *op,
                    falloff: self.config.falloff,
                    edit_rate: self.config.edit_rate,
                    max_total_height: self.config.max_total_height,
                },
                Bindings::new().read(fields.materials).write(fields.scratch),
            );
            frame.copy_buffer_to_buffer(fields.scratch, fields.materials);
        }

        thermal::encode(frame, &fields, self.params);
        encode_recombine_height(frame, &fields);

        log::trace!("material execute encoded {} ops", self.pending_ops());
        self.transfers.clear();
        self.smooth_ops.clear();
        self.directional_ops.clear();
        self.flatten_ops.clear();
    }

    /// Loads initial terrain and recomputes height on the host.
    pub fn upload_terrain(
        &self,
        device: &mut ComputeDevice,
        soil: &[f32],
        rock: &[f32],
    ) -> Result<(), ComputeError> {
        let cells = device.grid().cell_count();
        for (label, layer) in [("soil", soil), ("rock", rock)] {
            if layer.len() != cells {
                return Err(ComputeError::UploadSize {
                    buffer: label.to_string(),
                    expected: cells,
                    got: layer.len(),
                });
            }
        }

        let texels: Vec<MaterialTexel> = soil
            .iter()
            .zip(rock)
            .map(|(&s, &r)| {
                let mut t = MaterialTexel::new(s.max(0.0), r.max(0.0), 0.0);
                t.clamp_total(self.config.max_total_height);
                t
            })
            .collect();
        let height: Vec<f32> = texels.iter().map(MaterialTexel::height).collect();

        device.write_buffer(self.fields.materials, bytemuck::cast_slice(&texels))?;
        device.write_buffer(self.fields.height, &height)
    }

    /// Bilinear terrain height at world position `(x, z)`.
    pub fn height_at(&self, device: &ComputeDevice, x: f32, z: f32) -> Result<f32, ComputeError> {
        let grid = *device.grid();
        let height = device.read_buffer(self.fields.height)?.texels::<f32>();
        let cell = grid.world_to_cell(glam::Vec2::new(x, z));
        Ok(sample_bilinear(&grid, cell, |i| height[i]))
    }

    /// Frees the material buffers.
    pub fn destroy(self, device: &mut ComputeDevice) {
        for id in self.fields.buffers() {
            device.destroy_buffer(id);
        }
    }
}
