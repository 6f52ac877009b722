//! Thermal relaxation of loose soil toward its angle of repose.
//!
//! Written in gather form: each cell recomputes the outflow of itself and of
//! its neighbors, so every transfer is subtracted exactly once and added
//! exactly once without any cross-cell writes. When several donors drain
//! into one cell, their outflows are scaled down together.

use rayon::prelude::*;

use crate::compute::{Bindings, Frame, Kernel, KernelIo, PingPong, WORKGROUP_CELLS};
use crate::fields::MaterialFields;
use crate::grid::neighbors::{neighbors_8, offset_length};
use crate::grid::Grid;

use super::{MaterialPass, MaterialTexel, ThermalParams};

/// Relaxation iterations per execute.
pub const THERMAL_ITERATIONS: usize = 3;

/// Bindings: read source materials; write destination materials.
pub(crate) struct ThermalKernel {
    pub params: ThermalParams,
}

impl Kernel for ThermalKernel {
    fn label(&self) -> &str {
        MaterialPass::Thermal.name()
    }

    fn slots(&self) -> (usize, usize) {
        (1, 1)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([src], [dst]) = (reads, writes) else {
            return;
        };
        let src = src.texels::<MaterialTexel>();
        let params = self.params;

        dst.texels_mut::<MaterialTexel>()
            .par_iter_mut()
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, out)| {
                let (x, y) = grid.coords(i);
                let mut t = src[i];

                if let Some(flow) = outflow(grid, src, x, y, params.tan_repose) {
                    let (tx, ty) = grid.coords(flow.target);
                    t.soil -= flow.amount * inflow_scale(grid, src, tx, ty, params);
                }
                let scale = inflow_scale(grid, src, x, y, params);
                for (_, _, n) in neighbors_8(grid, x, y) {
                    let (nx, ny) = grid.coords(n);
                    if let Some(flow) = outflow(grid, src, nx, ny, params.tan_repose) {
                        if flow.target == i {
                            t.soil += flow.amount * scale;
                        }
                    }
                }
                t.soil = t.soil.max(0.0);
                *out = t;
            });
    }
}

/// Soil a cell wants to shed toward its steepest descending neighbor.
#[derive(Debug, Clone, Copy)]
struct Outflow {
    target: usize,
    /// Depth moved before the receiver's limit applies.
    amount: f32,
    /// Drop beyond the talus height difference.
    excess: f32,
}

/// Unscaled outflow of `(x, y)` this iteration.
///
/// Moving half the excess drop leaves a lone donor and its target exactly
/// at the talus slope.
fn outflow(grid: &Grid, src: &[MaterialTexel], x: u32, y: u32, tan_repose: f32) -> Option<Outflow> {
    let here = src[grid.index(x, y)];
    if here.soil <= 0.0 {
        return None;
    }
    let h = here.height();

    let mut steepest: Option<(usize, f32, f32)> = None;
    let mut best_slope = 0.0;
    for (dx, dy, n) in neighbors_8(grid, x, y) {
        let dist = offset_length(dx, dy) * grid.cell_size;
        let drop = h - src[n].height();
        let slope = drop / dist;
        if drop > 0.0 && slope > best_slope {
            best_slope = slope;
            steepest = Some((n, drop, dist));
        }
    }

    let (target, drop, dist) = steepest?;
    let excess = drop - tan_repose * dist;
    if excess <= 0.0 {
        return None;
    }
    Some(Outflow {
        target,
        amount: here.soil.min(excess * 0.5),
        excess,
    })
}

/// Factor applied to every outflow landing on `(x, y)`.
///
/// The receiver rises by at most half the smallest donor excess, so no
/// donor ends up closer than talus above it, and never past the total
/// height cap.
fn inflow_scale(grid: &Grid, src: &[MaterialTexel], x: u32, y: u32, params: ThermalParams) -> f32 {
    let i = grid.index(x, y);
    let mut requested = 0.0;
    let mut min_excess = f32::INFINITY;
    for (_, _, n) in neighbors_8(grid, x, y) {
        let (nx, ny) = grid.coords(n);
        if let Some(flow) = outflow(grid, src, nx, ny, params.tan_repose) {
            if flow.target == i {
                requested += flow.amount;
                min_excess = min_excess.min(flow.excess);
            }
        }
    }
    if requested <= 0.0 {
        return 1.0;
    }
    let headroom = (params.max_total_height - src[i].total()).max(0.0);
    let allowed = (min_excess * 0.5).min(headroom);
    if requested > allowed {
        allowed / requested
    } else {
        1.0
    }
}

/// Encodes the relaxation iterations and leaves the result in `materials`.
pub(crate) fn encode(frame: &mut Frame, fields: &MaterialFields, params: ThermalParams) {
    let mut pp = PingPong::new(fields.materials, fields.scratch);
    for _ in 0..THERMAL_ITERATIONS {
        frame.dispatch(
            ThermalKernel { params },
            Bindings::new().read(pp.current()).write(pp.next()),
        );
        pp.swap();
    }
    if !pp.active_is_a() {
        frame.copy_buffer_to_buffer(pp.current(), fields.materials);
    }
}
