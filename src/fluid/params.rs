//! Uniform block shared by every fluid kernel in a frame.

use bytemuck::{Pod, Zeroable};

use crate::grid::Grid;

use super::FluidConfig;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FluidParams {
    pub grid_size: u32,
    pub cell_size: f32,
    pub gravity: f32,
    pub erosion_rate: f32,

    pub deposition_rate: f32,
    pub sediment_capacity: f32,
    pub capacity_depth: f32,
    pub min_slope: f32,

    pub flow_inertia: f32,
    pub min_flow_speed: f32,
    pub max_flow_speed: f32,
    pub accumulation_decay: f32,

    pub dt: f32,
    pub time: f32,
    pub rain: f32,
    pub evaporation: f32,

    pub pool_speed_threshold: f32,
    pub ambient_temperature: f32,
    pub eruption_temperature: f32,
    pub cooling_rate: f32,

    pub solidify_temperature: f32,
    pub solidify_rate: f32,
    pub max_total_height: f32,
    pub emitter_radius: f32,
}

impl FluidParams {
    pub fn new(config: &FluidConfig, grid: &Grid, max_total_height: f32) -> Self {
        Self {
            grid_size: grid.size,
            cell_size: grid.cell_size,
            gravity: config.gravity,
            erosion_rate: config.erosion_rate,

            deposition_rate: config.deposition_rate,
            sediment_capacity: config.sediment_capacity,
            capacity_depth: config.capacity_depth,
            min_slope: config.min_slope,

            flow_inertia: config.flow_inertia.clamp(0.0, 1.0),
            min_flow_speed: config.min_flow_speed,
            max_flow_speed: config.max_flow_speed,
            accumulation_decay: config.accumulation_decay.clamp(0.0, 1.0),

            dt: 0.0,
            time: 0.0,
            rain: config.rain_intensity.max(0.0),
            evaporation: config.evaporation_rate.max(0.0),

            pool_speed_threshold: config.pool_speed_threshold,
            ambient_temperature: config.ambient_temperature,
            eruption_temperature: config.lava_eruption_temperature,
            cooling_rate: config.lava_cooling_rate,

            solidify_temperature: config.lava_solidify_temperature,
            solidify_rate: config.lava_solidify_rate,
            max_total_height,
            emitter_radius: config.emitter_radius_cells * grid.cell_size,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_block_is_16_byte_aligned() {
        let params = FluidParams::new(&FluidConfig::default(), &Grid::new(64, 0.5), 512.0);
        assert_eq!(params.as_bytes().len() % 16, 0);
        assert_eq!(params.emitter_radius, 1.0);
        assert_eq!(params.grid_size, 64);
    }
}
