//! Stage 4: semi-Lagrangian transport of water and suspended sediment.

use glam::Vec2;
use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::{sample_bilinear, Grid};

use super::params::FluidParams;
use super::FluidStage;

/// Bindings: read `flow_sampled`, `water_depth`, `sediment`;
/// write `water_depth'`, `sediment'`.
pub(crate) struct AdvectionKernel {
    pub params: FluidParams,
}

impl Kernel for AdvectionKernel {
    fn label(&self) -> &str {
        FluidStage::Advection.name()
    }

    fn slots(&self) -> (usize, usize) {
        (3, 2)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([flow, water, sediment], [water_out, sediment_out]) = (reads, writes) else {
            return;
        };
        let flow = flow.texels::<Vec2>();
        let water = water.texels::<f32>();
        let sediment = sediment.texels::<f32>();
        let p = self.params;
        let evaporated = p.evaporation * p.dt;

        water_out
            .texels_mut::<f32>()
            .par_iter_mut()
            .zip(sediment_out.texels_mut::<f32>().par_iter_mut())
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, (w, s))| {
                let (x, y) = grid.coords(i);
                let back = backtrace(Vec2::new(x as f32, y as f32), flow[i], p.dt, p.cell_size);
                *w = (sample_bilinear(grid, back, |j| water[j]) - evaporated).max(0.0);
                *s = sample_bilinear(grid, back, |j| sediment[j]).max(0.0);
            });
    }
}

/// Departure point in cell coordinates, at most one cell upstream.
#[inline]
fn backtrace(cell: Vec2, velocity: Vec2, dt: f32, cell_size: f32) -> Vec2 {
    let displacement = (velocity * dt / cell_size).clamp_length_max(1.0);
    cell - displacement
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backtrace_limited_to_one_cell() {
        let p = backtrace(Vec2::new(5.0, 5.0), Vec2::new(100.0, 0.0), 1.0, 1.0);
        assert_eq!(p, Vec2::new(4.0, 5.0));
        let p = backtrace(Vec2::new(5.0, 5.0), Vec2::new(0.0, 1.0), 0.25, 0.5);
        assert_eq!(p, Vec2::new(5.0, 4.5));
    }
}
