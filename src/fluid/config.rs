//! Fluid engine configuration.

use serde::{Deserialize, Serialize};

/// Parameters for surface flow, hydraulic erosion and lava heat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    /// Gravitational acceleration driving flow (m/s^2).
    pub gravity: f32,
    /// Weight of the previous velocity in the flow blend (0-1).
    pub flow_inertia: f32,
    /// Speeds below this are zeroed (m/s).
    pub min_flow_speed: f32,
    /// Speeds above this are clamped (m/s).
    pub max_flow_speed: f32,
    /// Per-frame retention of flow accumulation (0-1).
    pub accumulation_decay: f32,

    /// Rain added to every cell (m/s).
    pub rain_intensity: f32,
    /// Water removed from every cell (m/s).
    pub evaporation_rate: f32,
    /// Gaussian radius of point sources, in cells.
    pub emitter_radius_cells: f32,

    /// Erosion rate (Ks, 1/s).
    pub erosion_rate: f32,
    /// Deposition rate (Kd, 1/s).
    pub deposition_rate: f32,
    /// Sediment capacity factor (Kc).
    pub sediment_capacity: f32,
    /// Water depth beyond which capacity stops growing (m).
    pub capacity_depth: f32,
    /// Slope floor in the capacity term so flat channels still carry sediment.
    pub min_slope: f32,

    /// Cells slower than this with converging flow count as pooled (m/s).
    pub pool_speed_threshold: f32,

    pub ambient_temperature: f32,
    pub lava_eruption_temperature: f32,
    /// Newtonian cooling rate toward ambient (1/s).
    pub lava_cooling_rate: f32,
    /// Lava below this temperature starts turning into rock.
    pub lava_solidify_temperature: f32,
    /// Fraction of cold lava converted to rock per second.
    pub lava_solidify_rate: f32,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            flow_inertia: 0.8,
            min_flow_speed: 1e-3,
            max_flow_speed: 10.0,
            accumulation_decay: 0.95,

            rain_intensity: 0.0,
            evaporation_rate: 1e-4,
            emitter_radius_cells: 2.0,

            erosion_rate: 0.3,
            deposition_rate: 0.3,
            sediment_capacity: 0.05,
            capacity_depth: 0.5,
            min_slope: 0.01,

            pool_speed_threshold: 0.05,

            ambient_temperature: 20.0,
            lava_eruption_temperature: 1200.0,
            lava_cooling_rate: 0.05,
            lava_solidify_temperature: 700.0,
            lava_solidify_rate: 0.1,
        }
    }
}
