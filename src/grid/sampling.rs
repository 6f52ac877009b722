//! Bilinear sampling and finite-difference gradients over cell values.
//!
//! Both take a value accessor so they work on any channel of any packed
//! buffer (or on a sum of fields, e.g. terrain height plus water).

use glam::Vec2;

use super::Grid;

/// Bilinearly samples `value(index)` at continuous cell coordinates `pos`.
/// Coordinates outside the grid clamp to the edge cells.
pub fn sample_bilinear<F>(grid: &Grid, pos: Vec2, value: F) -> f32
where
    F: Fn(usize) -> f32,
{
    let max = (grid.size - 1) as f32;
    let p = pos.clamp(Vec2::ZERO, Vec2::splat(max));
    let x0 = p.x.floor() as i32;
    let y0 = p.y.floor() as i32;
    let tx = p.x - x0 as f32;
    let ty = p.y - y0 as f32;

    let v00 = value(grid.clamped_index(x0, y0));
    let v10 = value(grid.clamped_index(x0 + 1, y0));
    let v01 = value(grid.clamped_index(x0, y0 + 1));
    let v11 = value(grid.clamped_index(x0 + 1, y0 + 1));

    let a = v00 + (v10 - v00) * tx;
    let b = v01 + (v11 - v01) * tx;
    a + (b - a) * ty
}

/// Central-difference gradient (units of value per meter) at cell `(x, y)`.
/// Edge cells read their clamped neighbor, which halves the one-sided slope.
pub fn central_gradient<F>(grid: &Grid, x: u32, y: u32, value: F) -> Vec2
where
    F: Fn(usize) -> f32,
{
    let (xi, yi) = (x as i32, y as i32);
    let east = value(grid.clamped_index(xi + 1, yi));
    let west = value(grid.clamped_index(xi - 1, yi));
    let north = value(grid.clamped_index(xi, yi + 1));
    let south = value(grid.clamped_index(xi, yi - 1));
    let inv = 1.0 / (2.0 * grid.cell_size);
    Vec2::new((east - west) * inv, (north - south) * inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(grid: &Grid) -> Vec<f32> {
        (0..grid.cell_count())
            .map(|i| {
                let (x, y) = grid.coords(i);
                x as f32 * 2.0 + y as f32
            })
            .collect()
    }

    #[test]
    fn test_bilinear_hits_cell_values() {
        let grid = Grid::new(8, 1.0);
        let values = ramp(&grid);
        let v = sample_bilinear(&grid, Vec2::new(3.0, 4.0), |i| values[i]);
        assert!((v - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_interpolates_linear_field_exactly() {
        let grid = Grid::new(8, 1.0);
        let values = ramp(&grid);
        let v = sample_bilinear(&grid, Vec2::new(2.25, 5.5), |i| values[i]);
        assert!((v - (2.25 * 2.0 + 5.5)).abs() < 1e-5);
    }

    #[test]
    fn test_gradient_of_ramp() {
        let grid = Grid::new(8, 0.5);
        let values = ramp(&grid);
        let g = central_gradient(&grid, 4, 4, |i| values[i]);
        assert!((g.x - 4.0).abs() < 1e-5);
        assert!((g.y - 2.0).abs() < 1e-5);
    }
}
