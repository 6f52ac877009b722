//! Stage 3: decaying flow accumulation (channel persistence).

use glam::Vec2;
use rayon::prelude::*;

use crate::compute::{Kernel, KernelIo, WORKGROUP_CELLS};
use crate::grid::neighbors::neighbors_4;
use crate::grid::Grid;

use super::params::FluidParams;
use super::FluidStage;

/// Fraction of a cell's accumulation routed along `dir` (a unit axis).
///
/// Shares over the four axis directions sum to 1 for any nonzero `v`.
#[inline]
fn route_share(v: Vec2, dir: Vec2) -> f32 {
    let l1 = v.x.abs() + v.y.abs();
    if l1 <= 0.0 {
        return 0.0;
    }
    v.dot(dir).max(0.0) / l1
}

/// Bindings: read `flow_sampled`, `accumulation`; write `accumulation'`.
pub(crate) struct AccumulationKernel {
    pub params: FluidParams,
}

impl Kernel for AccumulationKernel {
    fn label(&self) -> &str {
        FluidStage::Accumulation.name()
    }

    fn slots(&self) -> (usize, usize) {
        (2, 1)
    }

    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>) {
        let (reads, writes) = io.split();
        let ([flow, acc], [acc_out]) = (reads, writes) else {
            return;
        };
        let flow = flow.texels::<Vec2>();
        let acc = acc.texels::<f32>();
        let decay = self.params.accumulation_decay;
        let dt = self.params.dt;

        acc_out
            .texels_mut::<f32>()
            .par_iter_mut()
            .with_min_len(WORKGROUP_CELLS)
            .enumerate()
            .for_each(|(i, out)| {
                let (x, y) = grid.coords(i);
                let mut inflow = 0.0;
                for (dx, dy, n) in neighbors_4(grid, x, y) {
                    // Direction from the neighbor back to this cell.
                    let toward = Vec2::new(-dx as f32, -dy as f32);
                    inflow += acc[n] * route_share(flow[n], toward);
                }
                let local = flow[i].length() * dt;
                *out = (decay * acc[i] + (1.0 - decay) * (local + inflow)).max(0.0);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Bindings, Frame};
    use crate::fluid::FluidConfig;
    use crate::test_support::device;

    #[test]
    fn test_route_shares_sum_to_one() {
        let v = Vec2::new(0.3, -1.2);
        let dirs = [Vec2::X, -Vec2::X, Vec2::Y, -Vec2::Y];
        let total: f32 = dirs.iter().map(|&d| route_share(v, d)).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert_eq!(route_share(Vec2::ZERO, Vec2::X), 0.0);
    }

    #[test]
    fn test_accumulation_grows_downstream_on_ramp_channel() {
        let mut dev = device(16, 1.0);
        let grid = *dev.grid();
        let flow = dev.create_buffer("flow", 2, 0.0);
        let mut acc = crate::compute::PingPong::new(
            dev.create_buffer("acc_a", 1, 0.0),
            dev.create_buffer("acc_b", 1, 0.0),
        );

        // A single channel along row 8 flowing toward +x.
        let mut field = vec![0.0f32; grid.cell_count() * 2];
        for x in 0..16 {
            field[grid.index(x, 8) * 2] = 2.0;
        }
        dev.write_buffer(flow, &field).unwrap();

        let mut params = crate::fluid::FluidParams::new(&FluidConfig::default(), &grid, 512.0);
        params.dt = 0.1;
        params.accumulation_decay = 0.9;

        for step in 0..60 {
            let mut frame = Frame::new("acc");
            frame.dispatch(
                AccumulationKernel { params },
                Bindings::new().read(flow).read(acc.current()).write(acc.next()),
            );
            acc.swap();
            dev.submit(frame).unwrap();

            let values = dev.read_buffer(acc.current()).unwrap().as_slice().to_vec();
            assert!(values.iter().all(|&v| v >= 0.0), "negative at step {step}");
            for x in 1..16 {
                assert!(values[grid.index(x, 8)] >= values[grid.index(x - 1, 8)]);
            }
            assert_eq!(values[grid.index(4, 2)], 0.0);
        }

        let values = dev.read_buffer(acc.current()).unwrap().as_slice().to_vec();
        assert!(values[grid.index(15, 8)] > 2.0 * values[grid.index(1, 8)]);
    }

    #[test]
    fn test_accumulation_decays_without_flow() {
        let mut dev = device(8, 1.0);
        let flow = dev.create_buffer("flow", 2, 0.0);
        let a = dev.create_buffer("acc_a", 1, 1.0);
        let b = dev.create_buffer("acc_b", 1, 0.0);
        let grid = *dev.grid();
        let mut params = crate::fluid::FluidParams::new(&FluidConfig::default(), &grid, 512.0);
        params.dt = 0.1;

        let mut frame = Frame::new("decay");
        frame.dispatch(AccumulationKernel { params }, Bindings::new().read(flow).read(a).write(b));
        dev.submit(frame).unwrap();
        let out = dev.read_buffer(b).unwrap().as_slice();
        assert!(out.iter().all(|&v| (v - params.accumulation_decay).abs() < 1e-6));
    }
}
