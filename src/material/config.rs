//! Material engine configuration.

use serde::{Deserialize, Serialize};

use crate::grid::Falloff;

/// Parameters for brush edits, the hand and thermal relaxation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Soil density (kg/m^3).
    pub density_soil: f32,
    /// Rock density (kg/m^3).
    pub density_rock: f32,
    /// Lava density (kg/m^3).
    pub density_lava: f32,

    /// Mass the hand can carry (kg).
    pub hand_capacity_kg: f32,

    /// Angle of repose for loose soil, in degrees. Typical: 30-40.
    pub angle_of_repose_deg: f32,
    /// Upper bound on `soil + rock + lava` per cell (m).
    pub max_total_height: f32,

    /// Raw smoothing strength is divided by this to land in `[0, 1]`.
    pub smooth_strength_scale: f32,
    /// Sculpt blend rate (1/s); the per-frame factor is `min(1, dt * edit_rate)`.
    pub edit_rate: f32,
    /// Radial profile for brushes.
    pub falloff: Falloff,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            density_soil: 1600.0,
            density_rock: 2600.0,
            density_lava: 2700.0,

            hand_capacity_kg: 500.0,

            angle_of_repose_deg: 35.0,
            max_total_height: 512.0,

            smooth_strength_scale: 100.0,
            edit_rate: 8.0,
            falloff: Falloff::Gaussian,
        }
    }
}

impl MaterialConfig {
    /// Densities in channel order `[soil, rock, lava]`.
    pub fn densities(&self) -> [f32; 3] {
        [self.density_soil, self.density_rock, self.density_lava]
    }

    pub fn tan_repose(&self) -> f32 {
        self.angle_of_repose_deg.to_radians().tan()
    }
}
