//! Stage 6: hydraulic erosion and deposition between soil and sediment.

use glam::Vec2;
use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::{central_gradient, Grid};
use crate::material::MaterialTexel;

use super::params::FluidParams;
use super::FluidStage;

/// Sediment the flow can hold in one cell.
#[inline]
pub fn carrying_capacity(p: &FluidParams, speed: f32, slope: f32, water: f32) -> f32 {
    if water <= 0.0 {
        return 0.0;
    }
    p.sediment_capacity * speed * slope.max(p.min_slope) * water.min(p.capacity_depth)
}

/// Bindings: read `materials`, `height`, `flow_sampled`, `water_depth`,
/// `sediment`; write `scratch`, `sediment'`.
pub(crate) struct ErosionKernel {
    pub params: FluidParams,
}

impl Kernel for ErosionKernel {
    fn label(&self) -> &str {
        FluidStage::Erosion.name()
    }

    fn slots(&self) -> (usize, usize) {
        (5, 2)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([materials, height, flow, water, sediment], [scratch, sediment_out]) = (reads, writes) else {
            return;
        };
        let src = materials.texels::<MaterialTexel>();
        let height = height.texels::<f32>();
        let flow = flow.texels::<Vec2>();
        let water = water.texels::<f32>();
        let sediment = sediment.texels::<f32>();
        let p = self.params;
        let erode_k = (p.erosion_rate * p.dt).clamp(0.0, 1.0);
        let deposit_k = (p.deposition_rate * p.dt).clamp(0.0, 1.0);

        scratch
            .texels_mut::<MaterialTexel>()
            .par_iter_mut()
            .zip(sediment_out.texels_mut::<f32>().par_iter_mut())
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, (cell, sed_out))| {
                let (x, y) = grid.coords(i);
                let mut t = src[i];
                let mut sed = sediment[i];

                let slope = central_gradient(grid, x, y, |j| height[j]).length();
                let capacity = carrying_capacity(&p, flow[i].length(), slope, water[i]);

                if sed < capacity {
                    let eroded = (erode_k * (capacity - sed)).min(t.soil);
                    t.soil -= eroded;
                    sed += eroded;
                } else if sed > capacity {
                    let headroom = (p.max_total_height - t.total()).max(0.0);
                    let deposited = (deposit_k * (sed - capacity)).min(sed).min(headroom);
                    t.soil += deposited;
                    sed -= deposited;
                }

                *cell = t;
                *sed_out = sed;
            });
    }
}
