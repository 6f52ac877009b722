//! Smooth, directional smooth and flatten edits.

use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::{sample_bilinear, Falloff, Grid};

use super::ops::{Direction, SculptOp, SculptTarget};
use super::{MaterialPass, MaterialTexel};

/// Bindings: read `materials`; write `scratch` (every cell).
pub(crate) struct SculptKernel {
    pub op: SculptOp,
    pub falloff: Falloff,
    pub edit_rate: f32,
    pub max_total_height: f32,
}

impl SculptKernel {
    fn pass(&self) -> MaterialPass {
        match self.op.target {
            SculptTarget::LocalAverage(Direction::Both) => MaterialPass::Smooth,
            SculptTarget::LocalAverage(_) => MaterialPass::SmoothDirectional,
            SculptTarget::Flatten(_) => MaterialPass::Flatten,
        }
    }
}

impl Kernel for SculptKernel {
    fn label(&self) -> &str {
        self.pass().name()
    }

    fn slots(&self) -> (usize, usize) {
        (1, 1)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([materials], [scratch]) = (reads, writes) else {
            return;
        };
        let src = materials.texels::<MaterialTexel>();
        let out = scratch.texels_mut::<MaterialTexel>();
        out.copy_from_slice(src);

        let op = self.op;
        let Some((x0, y0, x1, y1)) = grid.footprint(op.center, op.radius) else {
            return;
        };
        let rate = op.strength.clamp(0.0, 1.0) * (op.dt * self.edit_rate).min(1.0);

        let flatten_to = match op.target {
            SculptTarget::Flatten(Some(h)) => Some(h),
            SculptTarget::Flatten(None) => Some(sample_bilinear(
                grid,
                grid.world_to_cell(op.center),
                |i| src[i].height(),
            )),
            SculptTarget::LocalAverage(_) => None,
        };
        let direction = match op.target {
            SculptTarget::LocalAverage(d) => d,
            SculptTarget::Flatten(_) => Direction::Both,
        };

        out.par_iter_mut()
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, cell)| {
                let (x, y) = grid.coords(i);
                if x < x0 || x > x1 || y < y0 || y > y1 {
                    return;
                }
                let w = self.falloff.weight(grid.cell_center(x, y).distance(op.center), op.radius);
                if w <= 0.0 {
                    return;
                }

                let target = flatten_to.unwrap_or_else(|| local_average(grid, src, x, y));
                let change = (target - cell.height()) * rate * w;
                if change != 0.0 && direction.allows(change) {
                    cell.shift_height(change, self.max_total_height);
                }
            });
    }
}

/// Mean height over the 3x3 block around `(x, y)`, edges clamped.
fn local_average(grid: &Grid, src: &[MaterialTexel], x: u32, y: u32) -> f32 {
    let (xi, yi) = (x as i32, y as i32);
    let mut sum = 0.0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += src[grid.clamped_index(xi + dx, yi + dy)].height();
        }
    }
    sum / 9.0
}
