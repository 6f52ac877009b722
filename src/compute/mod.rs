//! Compute backend: a buffer arena plus a per-frame command stream of
//! parallel kernel dispatches.
//!
//! The model follows a GPU device closely: buffers are addressed by handle,
//! kernels name their input and output buffers explicitly, and a frame is a
//! recorded list of dispatches, copies and clears that is executed in order by
//! [`ComputeDevice::submit`]. Inside a dispatch every cell runs concurrently on
//! the worker pool.

mod buffer;
mod context;
mod frame;

pub use buffer::{Buffer, BufferId, PingPong};
pub use context::{ComputeConfig, ComputeDevice, ComputeError, FrameStats};
pub use frame::{Bindings, Command, Frame, Kernel, KernelIo};

/// Cells per workgroup tile (8x8). Parallel iterators never split work
/// finer than this.
pub const WORKGROUP_CELLS: usize = 8 * 8;
