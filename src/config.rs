//! Top-level simulation configuration, loadable from JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compute::ComputeConfig;
use crate::fluid::FluidConfig;
use crate::grid::Grid;
use crate::material::MaterialConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive and finite, got {value}")))
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must lie in [0, 1], got {value}")))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be non-negative, got {value}")))
    }
}

/// Everything needed to construct a [`crate::pipeline::Simulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Cells along each axis.
    pub grid_size: u32,
    /// Cell edge length in meters.
    pub cell_size: f32,
    pub compute: ComputeConfig,
    pub material: MaterialConfig,
    pub fluid: FluidConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_size: 256,
            cell_size: 1.0,
            compute: ComputeConfig::default(),
            material: MaterialConfig::default(),
            fluid: FluidConfig::default(),
        }
    }
}

impl SimConfig {
    /// Small grid for quick interactive runs and tests.
    pub fn preview() -> Self {
        Self {
            grid_size: 64,
            cell_size: 2.0,
            ..Self::default()
        }
    }

    /// Wetter preset with rain and stronger erosion.
    pub fn rainy() -> Self {
        Self {
            fluid: FluidConfig {
                rain_intensity: 2e-3,
                erosion_rate: 0.5,
                sediment_capacity: 0.1,
                ..FluidConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.grid_size, self.cell_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=8192).contains(&self.grid_size) {
            return Err(invalid("grid_size", format!("must be between 2 and 8192, got {}", self.grid_size)));
        }
        positive("cell_size", self.cell_size)?;
        if self.compute.threads == Some(0) {
            return Err(invalid("compute.threads", "must be at least 1"));
        }

        let m = &self.material;
        positive("material.density_soil", m.density_soil)?;
        positive("material.density_rock", m.density_rock)?;
        positive("material.density_lava", m.density_lava)?;
        positive("material.hand_capacity_kg", m.hand_capacity_kg)?;
        positive("material.max_total_height", m.max_total_height)?;
        positive("material.smooth_strength_scale", m.smooth_strength_scale)?;
        non_negative("material.edit_rate", m.edit_rate)?;
        if !(0.0..90.0).contains(&m.angle_of_repose_deg) {
            return Err(invalid(
                "material.angle_of_repose_deg",
                format!("must be in [0, 90), got {}", m.angle_of_repose_deg),
            ));
        }

        let f = &self.fluid;
        non_negative("fluid.gravity", f.gravity)?;
        unit_interval("fluid.flow_inertia", f.flow_inertia)?;
        unit_interval("fluid.accumulation_decay", f.accumulation_decay)?;
        non_negative("fluid.min_flow_speed", f.min_flow_speed)?;
        positive("fluid.max_flow_speed", f.max_flow_speed)?;
        if f.min_flow_speed > f.max_flow_speed {
            return Err(invalid("fluid.min_flow_speed", "must not exceed max_flow_speed"));
        }
        non_negative("fluid.rain_intensity", f.rain_intensity)?;
        non_negative("fluid.evaporation_rate", f.evaporation_rate)?;
        positive("fluid.emitter_radius_cells", f.emitter_radius_cells)?;
        non_negative("fluid.erosion_rate", f.erosion_rate)?;
        non_negative("fluid.deposition_rate", f.deposition_rate)?;
        non_negative("fluid.sediment_capacity", f.sediment_capacity)?;
        positive("fluid.capacity_depth", f.capacity_depth)?;
        non_negative("fluid.min_slope", f.min_slope)?;
        non_negative("fluid.pool_speed_threshold", f.pool_speed_threshold)?;
        non_negative("fluid.lava_cooling_rate", f.lava_cooling_rate)?;
        non_negative("fluid.lava_solidify_rate", f.lava_solidify_rate)?;
        if f.lava_eruption_temperature < f.ambient_temperature {
            return Err(invalid(
                "fluid.lava_eruption_temperature",
                "must not be below ambient_temperature",
            ));
        }
        Ok(())
    }

    /// Reads and validates a JSON config. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        SimConfig::default().validate().unwrap();
        SimConfig::preview().validate().unwrap();
        SimConfig::rainy().validate().unwrap();
    }

    #[test]
    fn test_invalid_fields_named() {
        let mut config = SimConfig::default();
        config.fluid.flow_inertia = 1.5;
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "fluid.flow_inertia"),
            other => panic!("unexpected {other:?}"),
        }

        let config = SimConfig {
            grid_size: 1,
            ..SimConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "grid_size", .. })));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{ "grid_size": 32, "fluid": { "gravity": 3.0 } }"#).unwrap();
        assert_eq!(config.grid_size, 32);
        assert_eq!(config.fluid.gravity, 3.0);
        assert_eq!(config.fluid.flow_inertia, FluidConfig::default().flow_inertia);
        assert_eq!(config.material, MaterialConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("terrasim-config-{}.json", std::process::id()));
        let config = SimConfig::preview();
        config.save(&path).unwrap();
        let loaded = SimConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);

        let missing = SimConfig::load(Path::new("/nonexistent/terrasim.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
