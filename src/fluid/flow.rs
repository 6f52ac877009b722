//! Stage 2: flow velocity from the water surface gradient.

use glam::Vec2;
use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::{central_gradient, Grid};

use super::params::FluidParams;
use super::FluidStage;

/// Bindings: read `height`, `water_depth`, `flow`; write `flow'`.
pub(crate) struct FlowKernel {
    pub params: FluidParams,
}

impl Kernel for FlowKernel {
    fn label(&self) -> &str {
        FluidStage::Flow.name()
    }

    fn slots(&self) -> (usize, usize) {
        (3, 1)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([height, water, flow], [flow_out]) = (reads, writes) else {
            return;
        };
        let height = height.texels::<f32>();
        let water = water.texels::<f32>();
        let prev = flow.texels::<Vec2>();
        let p = self.params;

        flow_out
            .texels_mut::<Vec2>()
            .par_iter_mut()
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, v)| {
                let (x, y) = grid.coords(i);
                let slope = central_gradient(grid, x, y, |j| height[j] + water[j]);
                let target = -p.gravity * slope;
                *v = limit_speed(prev[i].lerp(target, 1.0 - p.flow_inertia), &p);
            });
    }
}

fn limit_speed(v: Vec2, p: &FluidParams) -> Vec2 {
    let speed = v.length();
    if !speed.is_finite() || speed < p.min_flow_speed {
        Vec2::ZERO
    } else if speed > p.max_flow_speed {
        v * (p.max_flow_speed / speed)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::FluidConfig;

    #[test]
    fn test_speed_limits() {
        let p = FluidParams::new(&FluidConfig::default(), &Grid::new(8, 1.0), 512.0);
        assert_eq!(limit_speed(Vec2::new(1e-4, 0.0), &p), Vec2::ZERO);
        assert_eq!(limit_speed(Vec2::new(0.0, 50.0), &p), Vec2::new(0.0, 10.0));
        assert_eq!(limit_speed(Vec2::new(1.0, 1.0), &p), Vec2::new(1.0, 1.0));
        assert_eq!(limit_speed(Vec2::new(f32::NAN, 1.0), &p), Vec2::ZERO);
    }
}
