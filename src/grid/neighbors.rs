//! Neighbor enumeration on the bounded grid.
//!
//! Neighbors outside the grid are simply absent; kernels that need a value
//! there use [`Grid::clamped_index`] instead.

use super::Grid;

/// Cardinal (von Neumann) offsets: +x, -x, +y, -y.
pub const OFFSETS_4: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Moore neighborhood offsets, cardinals first.
pub const OFFSETS_8: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

/// Distance to a Moore neighbor in cell units (1 or sqrt(2)).
#[inline]
pub fn offset_length(dx: i32, dy: i32) -> f32 {
    if dx != 0 && dy != 0 {
        std::f32::consts::SQRT_2
    } else {
        1.0
    }
}

/// Returns the neighbor of `(x, y)` at offset `(dx, dy)`, or `None` off-grid.
#[inline]
pub fn neighbor(grid: &Grid, x: u32, y: u32, dx: i32, dy: i32) -> Option<(u32, u32)> {
    let nx = x as i32 + dx;
    let ny = y as i32 + dy;
    let size = grid.size as i32;
    if nx < 0 || ny < 0 || nx >= size || ny >= size {
        None
    } else {
        Some((nx as u32, ny as u32))
    }
}

/// Iterates in-grid Moore neighbors as `(dx, dy, index)`.
pub fn neighbors_8(grid: &Grid, x: u32, y: u32) -> impl Iterator<Item = (i32, i32, usize)> + '_ {
    OFFSETS_8.iter().filter_map(move |&(dx, dy)| {
        neighbor(grid, x, y, dx, dy).map(|(nx, ny)| (dx, dy, grid.index(nx, ny)))
    })
}

/// Iterates in-grid cardinal neighbors as `(dx, dy, index)`.
pub fn neighbors_4(grid: &Grid, x: u32, y: u32) -> impl Iterator<Item = (i32, i32, usize)> + '_ {
    OFFSETS_4.iter().filter_map(move |&(dx, dy)| {
        neighbor(grid, x, y, dx, dy).map(|(nx, ny)| (dx, dy, grid.index(nx, ny)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_has_three_moore_neighbors() {
        let grid = Grid::new(4, 1.0);
        assert_eq!(neighbors_8(&grid, 0, 0).count(), 3);
        assert_eq!(neighbors_4(&grid, 0, 0).count(), 2);
    }

    #[test]
    fn test_interior_has_full_neighborhood() {
        let grid = Grid::new(4, 1.0);
        assert_eq!(neighbors_8(&grid, 1, 2).count(), 8);
        for (dx, dy, idx) in neighbors_8(&grid, 1, 2) {
            let (nx, ny) = grid.coords(idx);
            assert_eq!(nx as i32, 1 + dx);
            assert_eq!(ny as i32, 2 + dy);
        }
    }

    #[test]
    fn test_offset_length() {
        assert_eq!(offset_length(1, 0), 1.0);
        assert!((offset_length(-1, 1) - 2.0f32.sqrt()).abs() < 1e-6);
    }
}
