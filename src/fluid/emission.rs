//! Stage 1: rain, point sources and lava heat.

use glam::Vec2;
use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::{Falloff, Grid};
use crate::material::MaterialTexel;

use super::params::FluidParams;
use super::sources::{Source, SourceKind};
use super::FluidStage;

/// Lava thinner than this is treated as gone once it has cooled.
const LAVA_EPSILON: f32 = 1e-5;

/// A source resolved to world space for one frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Emitter {
    pub kind: SourceKind,
    pub world: Vec2,
    /// Volume emitted this frame (m^3).
    pub volume: f32,
    pub weight_sum: f32,
}

impl Emitter {
    /// Resolves `source` for a frame of length `dt`; `None` when it emits
    /// nothing or covers no cell center.
    pub fn resolve(source: &Source, grid: &Grid, radius: f32, dt: f32) -> Option<Self> {
        let volume = source.rate * dt;
        if volume <= 0.0 {
            return None;
        }
        let world = grid.normalized_to_world(source.position);
        let weight_sum = grid.brush_weight_sum(world, radius, Falloff::Gaussian);
        (weight_sum > 0.0).then_some(Self {
            kind: source.kind,
            world,
            volume,
            weight_sum,
        })
    }
}

/// Bindings: read `materials`, `temperature`, `water_depth`;
/// write `scratch`, `temperature'`, `water_depth'`.
pub(crate) struct EmissionKernel {
    pub params: FluidParams,
    pub emitters: Vec<Emitter>,
}

impl Kernel for EmissionKernel {
    fn label(&self) -> &str {
        FluidStage::Emission.name()
    }

    fn slots(&self) -> (usize, usize) {
        (3, 3)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([materials, temperature, water], [scratch, temperature_out, water_out]) = (reads, writes) else {
            return;
        };
        let src = materials.texels::<MaterialTexel>();
        let temp_in = temperature.texels::<f32>();
        let water_in = water.texels::<f32>();
        let p = self.params;
        let cell_area = grid.cell_area();

        scratch
            .texels_mut::<MaterialTexel>()
            .par_iter_mut()
            .zip(temperature_out.texels_mut::<f32>().par_iter_mut())
            .zip(water_out.texels_mut::<f32>().par_iter_mut())
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, ((cell, temp), depth))| {
                let (x, y) = grid.coords(i);
                let center = grid.cell_center(x, y);
                let mut t = src[i];
                let mut w = water_in[i] + p.rain * p.dt;
                let mut lava_in = 0.0;

                for e in &self.emitters {
                    let weight = Falloff::Gaussian.weight(center.distance(e.world), p.emitter_radius);
                    if weight <= 0.0 {
                        continue;
                    }
                    let added = e.volume * weight / (e.weight_sum * cell_area);
                    match e.kind {
                        SourceKind::Water => w += added,
                        SourceKind::Lava => lava_in += added,
                    }
                }
                lava_in = lava_in.min((p.max_total_height - t.total()).max(0.0));

                let previous = t.lava;
                t.lava += lava_in;
                let mut heat = if previous > 0.0 { temp_in[i] } else { p.ambient_temperature };
                if lava_in > 0.0 {
                    heat = (previous * heat + lava_in * p.eruption_temperature) / t.lava;
                }

                if t.lava > 0.0 {
                    heat = p.ambient_temperature
                        + (heat - p.ambient_temperature) * (-p.cooling_rate * p.dt).exp();
                    if heat < p.solidify_temperature {
                        let mut solid = t.lava * (p.solidify_rate * p.dt).min(1.0);
                        if t.lava - solid < LAVA_EPSILON {
                            solid = t.lava;
                        }
                        t.lava -= solid;
                        t.rock += solid;
                    }
                }
                if t.lava <= 0.0 {
                    t.lava = 0.0;
                    heat = p.ambient_temperature;
                }

                *cell = t;
                *temp = heat.max(p.ambient_temperature);
                *depth = w.max(0.0);
            });
    }
}
