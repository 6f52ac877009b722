//! Pickup and deposit: moves mass between the terrain and the hand.

use std::sync::Arc;

use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::{Falloff, Grid};

use super::hand::{HandLedger, TransferBudget, GRAMS_PER_KG};
use super::ops::{TransferMode, TransferOp};
use super::{MaterialPass, MaterialTexel, ThermalParams};

/// Accumulates one op's depth changes into the delta buffer.
///
/// Bindings: read `materials`, write `delta` (accumulated, not overwritten).
///
/// The hand budget is read when the kernel runs, so several ops queued in
/// one frame see each other's effect on the hand.
pub(crate) struct TransferKernel {
    pub op: TransferOp,
    pub params: ThermalParams,
    pub falloff: Falloff,
    pub hand: Arc<HandLedger>,
}

impl Kernel for TransferKernel {
    fn label(&self) -> &str {
        MaterialPass::Transfer.name()
    }

    fn slots(&self) -> (usize, usize) {
        (1, 1)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let op = self.op;
        let Some((x0, y0, x1, y1)) = grid.footprint(op.center, op.radius) else {
            return;
        };
        let weight_sum = grid.brush_weight_sum(op.center, op.radius, self.falloff);
        if weight_sum <= 0.0 {
            return;
        }

        let (material, budget_g) = match op.mode {
            TransferMode::Pickup => match self.hand.begin_pickup(op.material) {
                Some(free) => (op.material, free),
                None => {
                    log::trace!("pickup of {:?} skipped: hand holds other material", op.material);
                    return;
                }
            },
            TransferMode::Deposit => match self.hand.begin_deposit() {
                Some(held) => held,
                None => return,
            },
        };
        if budget_g <= 0 {
            return;
        }
        let budget = TransferBudget::new(budget_g);

        let kg_per_meter = self.params.densities[material.channel()] * grid.cell_area();
        let total_kg = op.requested_kg();
        let pickup = op.mode == TransferMode::Pickup;
        let max_total = self.params.max_total_height;

        let (reads, writes) = io.split();
        let ([materials], [delta]) = (reads, writes) else {
            return;
        };
        let src = materials.texels::<MaterialTexel>();

        let claimed: i64 = delta
            .texels_mut::<MaterialTexel>()
            .par_iter_mut()
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .map(|(i, d)| {
                let (x, y) = grid.coords(i);
                if x < x0 || x > x1 || y < y0 || y > y1 {
                    return 0;
                }
                let w = self.falloff.weight(grid.cell_center(x, y).distance(op.center), op.radius);
                if w <= 0.0 {
                    return 0;
                }

                let mut request = (f64::from(total_kg * w / weight_sum) * 1000.0).ceil() as i64;
                let available = if pickup {
                    (src[i].get(material) + d.get(material)).max(0.0)
                } else {
                    (max_total - src[i].total() - d.total()).max(0.0)
                };
                request = request.min(to_whole_grams(available, kg_per_meter));

                let granted = budget.claim(request);
                if granted > 0 {
                    let depth = granted as f32 / GRAMS_PER_KG / kg_per_meter;
                    let slot = d.get_mut(material);
                    if pickup {
                        *slot -= depth;
                    } else {
                        *slot += depth;
                    }
                }
                granted
            })
            .sum();

        if pickup {
            self.hand.credit(material, claimed);
        } else {
            self.hand.debit(claimed);
        }
        log::trace!(
            "{:?} {:?}: {} g of {} g budget",
            op.mode,
            material,
            claimed,
            budget_g
        );
    }
}

/// Whole grams held by `depth` meters of a cell, rounded down.
fn to_whole_grams(depth: f32, kg_per_meter: f32) -> i64 {
    (f64::from(depth) * f64::from(kg_per_meter) * 1000.0).floor() as i64
}
