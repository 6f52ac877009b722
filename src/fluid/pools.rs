//! Stage 5: pool detection from converging, slow flow.

use glam::Vec2;
use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::Grid;

use super::params::FluidParams;
use super::FluidStage;

/// Bindings: read `flow_sampled`; write `pool_mask`.
pub(crate) struct PoolKernel {
    pub params: FluidParams,
}

impl Kernel for PoolKernel {
    fn label(&self) -> &str {
        FluidStage::Pools.name()
    }

    fn slots(&self) -> (usize, usize) {
        (1, 1)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([flow], [mask]) = (reads, writes) else {
            return;
        };
        let flow = flow.texels::<Vec2>();
        let threshold = self.params.pool_speed_threshold;

        mask.texels_mut::<f32>()
            .par_iter_mut()
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, m)| {
                let (x, y) = grid.coords(i);
                let pooled = divergence(grid, flow, x, y) < 0.0 && flow[i].length() < threshold;
                *m = if pooled { 1.0 } else { 0.0 };
            });
    }
}

fn divergence(grid: &Grid, flow: &[Vec2], x: u32, y: u32) -> f32 {
    let (xi, yi) = (x as i32, y as i32);
    let dvx = flow[grid.clamped_index(xi + 1, yi)].x - flow[grid.clamped_index(xi - 1, yi)].x;
    let dvy = flow[grid.clamped_index(xi, yi + 1)].y - flow[grid.clamped_index(xi, yi - 1)].y;
    (dvx + dvy) / (2.0 * grid.cell_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Bindings, Frame};
    use crate::fluid::{FluidConfig, FluidParams};
    use crate::test_support::device;

    #[test]
    fn test_sink_is_pooled_and_source_is_not() {
        let mut dev = device(16, 1.0);
        let grid = *dev.grid();
        let flow = dev.create_buffer("flow", 2, 0.0);
        let mask = dev.create_buffer("pool_mask", 1, 0.0);

        // Converging toward (4, 4); diverging away from (12, 12).
        let mut field = vec![0.0f32; grid.cell_count() * 2];
        for i in 0..grid.cell_count() {
            let (x, y) = grid.coords(i);
            let p = Vec2::new(x as f32, y as f32);
            let v = if x < 8 && y < 8 {
                (Vec2::new(4.0, 4.0) - p) * 0.5
            } else {
                (p - Vec2::new(12.0, 12.0)) * 0.5
            };
            field[i * 2] = v.x;
            field[i * 2 + 1] = v.y;
        }
        dev.write_buffer(flow, &field).unwrap();

        let params = FluidParams::new(&FluidConfig::default(), &grid, 512.0);
        let mut frame = Frame::new("pools");
        frame.dispatch(PoolKernel { params }, Bindings::new().read(flow).write(mask));
        dev.submit(frame).unwrap();

        let m = dev.read_buffer(mask).unwrap().as_slice();
        assert_eq!(m[grid.index(4, 4)], 1.0);
        assert_eq!(m[grid.index(12, 12)], 0.0);
        // Converging but fast.
        assert_eq!(m[grid.index(1, 4)], 0.0);
    }
}
