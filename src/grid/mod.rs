//! Uniform simulation grid.
//!
//! Provides cell indexing, world/cell coordinate mapping and brush falloff
//! weights shared by every kernel.
//!
//! World coordinates are meters with the origin at the grid corner. The
//! center of cell `(x, y)` sits at `((x + 0.5) * cell_size, (y + 0.5) * cell_size)`.
//! Continuous *cell coordinates* put that same center at `(x, y)`.

pub mod neighbors;
mod sampling;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use sampling::{central_gradient, sample_bilinear};

/// Dimensions of the square simulation grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Number of cells along each axis.
    pub size: u32,
    /// Edge length of one cell in meters.
    pub cell_size: f32,
}

impl Grid {
    pub fn new(size: u32, cell_size: f32) -> Self {
        debug_assert!(size >= 2);
        debug_assert!(cell_size > 0.0);
        Self { size, cell_size }
    }

    /// Total number of cells (`size * size`).
    #[inline]
    pub fn cell_count(&self) -> usize {
        (self.size as usize) * (self.size as usize)
    }

    /// Area of one cell in square meters.
    #[inline]
    pub fn cell_area(&self) -> f32 {
        self.cell_size * self.cell_size
    }

    /// World-space edge length of the whole grid.
    #[inline]
    pub fn extent(&self) -> f32 {
        self.size as f32 * self.cell_size
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.size && y < self.size);
        y as usize * self.size as usize + x as usize
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> (u32, u32) {
        let size = self.size as usize;
        ((idx % size) as u32, (idx / size) as u32)
    }

    /// Index of `(x, y)` with both coordinates clamped to the grid edge.
    #[inline]
    pub fn clamped_index(&self, x: i32, y: i32) -> usize {
        let max = self.size as i32 - 1;
        self.index(x.clamp(0, max) as u32, y.clamp(0, max) as u32)
    }

    /// World position of the center of cell `(x, y)`.
    #[inline]
    pub fn cell_center(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new((x as f32 + 0.5) * self.cell_size, (y as f32 + 0.5) * self.cell_size)
    }

    /// Converts a world position to continuous cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, world: Vec2) -> Vec2 {
        world / self.cell_size - Vec2::splat(0.5)
    }

    /// Converts a normalized grid position (`[0,1]` on both axes) to world space.
    #[inline]
    pub fn normalized_to_world(&self, normalized: Vec2) -> Vec2 {
        normalized * self.extent()
    }

    /// Index of the cell containing a world position, clamped to the grid.
    pub fn world_to_index(&self, world: Vec2) -> usize {
        let cell = (world / self.cell_size).floor();
        self.clamped_index(cell.x as i32, cell.y as i32)
    }

    /// Inclusive cell bounds `(x0, y0, x1, y1)` covering a disk, or `None` if
    /// the disk misses the grid entirely.
    pub fn footprint(&self, center: Vec2, radius: f32) -> Option<(u32, u32, u32, u32)> {
        let lo = self.world_to_cell(center - Vec2::splat(radius)).ceil();
        let hi = self.world_to_cell(center + Vec2::splat(radius)).floor();
        let max = self.size as f32 - 1.0;
        if hi.x < 0.0 || hi.y < 0.0 || lo.x > max || lo.y > max || lo.x > hi.x || lo.y > hi.y {
            return None;
        }
        Some((
            lo.x.max(0.0) as u32,
            lo.y.max(0.0) as u32,
            hi.x.min(max) as u32,
            hi.y.min(max) as u32,
        ))
    }

    /// Sum of falloff weights over every cell center inside the brush disk.
    ///
    /// Kernels divide by this to spread a fixed quantity exactly over the
    /// footprint. Returns 0 when no cell center falls inside the disk.
    pub fn brush_weight_sum(&self, center: Vec2, radius: f32, falloff: Falloff) -> f32 {
        let Some((x0, y0, x1, y1)) = self.footprint(center, radius) else {
            return 0.0;
        };
        let mut sum = 0.0f64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = self.cell_center(x, y).distance(center);
                sum += falloff.weight(d, radius) as f64;
            }
        }
        sum as f32
    }
}

/// Radial weighting profile for brushes and emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Falloff {
    /// Gaussian bump with sigma = radius / 2, cut off at the radius.
    #[default]
    Gaussian,
    /// Constant weight inside the radius.
    Disk,
}

impl Falloff {
    /// Weight for a point `distance` meters from the center; 0 outside `radius`.
    #[inline]
    pub fn weight(self, distance: f32, radius: f32) -> f32 {
        if radius <= 0.0 || distance > radius {
            return 0.0;
        }
        match self {
            Falloff::Disk => 1.0,
            Falloff::Gaussian => {
                let sigma = radius * 0.5;
                (-(distance * distance) / (2.0 * sigma * sigma)).exp()
            }
        }
    }
}
