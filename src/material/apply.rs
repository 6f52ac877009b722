//! Folds the transfer delta into the material fields and enforces bounds.

use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::Grid;

use super::{MaterialPass, MaterialTexel};

/// Bindings: read `materials`, `delta`; write `scratch`.
pub(crate) struct ApplyKernel {
    pub max_total_height: f32,
}

impl Kernel for ApplyKernel {
    fn label(&self) -> &str {
        MaterialPass::Apply.name()
    }

    fn slots(&self) -> (usize, usize) {
        (2, 1)
    }

    fn run(&self, _grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([materials, delta], [scratch]) = (reads, writes) else {
            return;
        };
        let src = materials.texels::<MaterialTexel>();
        let delta = delta.texels::<MaterialTexel>();
        let max_total = self.max_total_height;

        scratch
            .texels_mut::<MaterialTexel>()
            .par_iter_mut()
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, out)| {
                let mut t = MaterialTexel::new(
                    (src[i].soil + delta[i].soil).max(0.0),
                    (src[i].rock + delta[i].rock).max(0.0),
                    (src[i].lava + delta[i].lava).max(0.0),
                );
                t.clamp_total(max_total);
                *out = t;
            });
    }
}
