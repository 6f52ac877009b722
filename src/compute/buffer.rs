//! Grid buffers and ping-pong pairs.

use bytemuck::Pod;

/// Opaque handle to a buffer owned by a [`super::ComputeDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u32);

impl BufferId {
    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

/// A per-cell `f32` buffer with 1, 2 or 4 interleaved channels.
#[derive(Debug, Clone)]
pub struct Buffer {
    label: String,
    channels: u32,
    data: Vec<f32>,
}

impl Buffer {
    pub(crate) fn new(label: &str, channels: u32, cells: usize, init: f32) -> Self {
        debug_assert!(matches!(channels, 1 | 2 | 4));
        Self {
            label: label.to_string(),
            channels,
            data: vec![init; cells * channels as usize],
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Number of cells (values / channels).
    pub fn cells(&self) -> usize {
        self.data.len() / self.channels as usize
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Views the buffer as one `T` per cell.
    ///
    /// `T` must be a `Pod` type made of exactly `channels` floats, e.g.
    /// `f32`, `glam::Vec2` or a 4-float texel struct.
    pub fn texels<T: Pod>(&self) -> &[T] {
        debug_assert_eq!(std::mem::size_of::<T>(), self.channels as usize * 4);
        bytemuck::cast_slice(&self.data)
    }

    /// Mutable per-cell view; see [`Buffer::texels`].
    pub fn texels_mut<T: Pod>(&mut self) -> &mut [T] {
        debug_assert_eq!(std::mem::size_of::<T>(), self.channels as usize * 4);
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Raw bytes, suitable for uploading to a renderer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

/// Two physical buffers backing one logical field.
///
/// Passes read from [`PingPong::current`] and write to [`PingPong::next`],
/// then call [`PingPong::swap`] while encoding so later passes in the same
/// frame resolve the fresh side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    a: BufferId,
    b: BufferId,
    active_is_a: bool,
}

impl PingPong {
    pub fn new(a: BufferId, b: BufferId) -> Self {
        debug_assert_ne!(a, b);
        Self { a, b, active_is_a: true }
    }

    /// Buffer holding the latest value (read side).
    #[inline]
    pub fn current(&self) -> BufferId {
        if self.active_is_a {
            self.a
        } else {
            self.b
        }
    }

    /// Buffer the next pass writes into.
    #[inline]
    pub fn next(&self) -> BufferId {
        if self.active_is_a {
            self.b
        } else {
            self.a
        }
    }

    #[inline]
    pub fn swap(&mut self) {
        self.active_is_a = !self.active_is_a;
    }

    pub fn active_is_a(&self) -> bool {
        self.active_is_a
    }

    /// Both physical buffers, `a` first.
    pub fn buffers(&self) -> [BufferId; 2] {
        [self.a, self.b]
    }
}
