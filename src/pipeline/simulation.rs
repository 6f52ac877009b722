//! The simulation owner.

use std::fmt;

use thiserror::Error;

use crate::compute::{ComputeDevice, ComputeError, Frame, FrameStats};
use crate::config::{ConfigError, SimConfig};
use crate::fields::{FieldHandle, FieldSnapshot, FieldStore};
use crate::fluid::{FluidEngine, SourceError};
use crate::material::{BrushStroke, HandState, MaterialEngine, MaterialTexel};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Field totals for diagnostics. Volumes are in m^3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub frame: u64,
    pub time: f32,
    pub soil_volume: f64,
    pub rock_volume: f64,
    pub lava_volume: f64,
    pub water_volume: f64,
    pub sediment_volume: f64,
    pub pooled_cells: usize,
    pub max_height: f32,
    pub max_temperature: f32,
    pub hand: HandState,
}

impl fmt::Display for FieldStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {:>5} t={:>7.2}s soil={:.1} rock={:.1} lava={:.2} water={:.2} sediment={:.3} pools={} max_h={:.2} max_T={:.0} hand={:.2}/{:.0}kg",
            self.frame,
            self.time,
            self.soil_volume,
            self.rock_volume,
            self.lava_volume,
            self.water_volume,
            self.sediment_volume,
            self.pooled_cells,
            self.max_height,
            self.max_temperature,
            self.hand.mass_kg,
            self.hand.cap_kg,
        )
    }
}

/// Owns the compute device and both engines and sequences their frames.
///
/// Each [`step`](Self::step) records one frame: the material passes first,
/// then the six fluid stages, submitted as a single command stream.
pub struct Simulation {
    config: SimConfig,
    device: ComputeDevice,
    material: MaterialEngine,
    fluid: FluidEngine,
    frame: u64,
    time: f32,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let grid = config.grid();
        let mut device = ComputeDevice::new(grid, &config.compute)?;
        let store = FieldStore::new(&mut device, config.fluid.ambient_temperature);

        let material = MaterialEngine::new(config.material.clone(), store.material, &grid);
        let fluid = FluidEngine::new(
            config.fluid.clone(),
            store.fluid,
            store.material,
            &grid,
            config.material.max_total_height,
        );

        log::info!(
            "simulation ready: {}x{} cells of {} m",
            grid.size,
            grid.size,
            grid.cell_size
        );
        Ok(Self {
            config,
            device,
            material,
            fluid,
            frame: 0,
            time: 0.0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn device(&self) -> &ComputeDevice {
        &self.device
    }

    pub fn material(&self) -> &MaterialEngine {
        &self.material
    }

    pub fn material_mut(&mut self) -> &mut MaterialEngine {
        &mut self.material
    }

    pub fn fluid(&self) -> &FluidEngine {
        &self.fluid
    }

    pub fn fluid_mut(&mut self) -> &mut FluidEngine {
        &mut self.fluid
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Queues a brush stroke for the next step.
    pub fn add_stroke(&mut self, stroke: BrushStroke) -> bool {
        self.material.add_op(stroke)
    }

    pub fn upload_terrain(&mut self, soil: &[f32], rock: &[f32]) -> Result<(), SimError> {
        self.material.upload_terrain(&mut self.device, soil, rock)?;
        Ok(())
    }

    pub fn upload_water_depth(&mut self, depth: &[f32]) -> Result<(), SimError> {
        self.fluid.upload_water_depth(&mut self.device, depth)?;
        Ok(())
    }

    /// Terrain height at world position `(x, z)`.
    pub fn height_at(&self, x: f32, z: f32) -> Result<f32, SimError> {
        Ok(self.material.height_at(&self.device, x, z)?)
    }

    pub fn snapshot(&self, handle: FieldHandle) -> Result<FieldSnapshot, SimError> {
        Ok(self.device.snapshot(handle)?)
    }

    /// Advances one frame of `dt` seconds ending at simulated `time`.
    pub fn step(&mut self, dt: f32, time: f32) -> Result<FrameStats, SimError> {
        self.frame += 1;
        self.time = time;

        let mut frame = Frame::new(&format!("frame-{}", self.frame));
        self.material.execute(&mut frame);
        self.fluid.update(&mut frame, dt, time);
        Ok(self.device.submit(frame)?)
    }

    /// Runs `frames` steps of `dt`, calling `on_frame` after each.
    pub fn run_frames<F>(&mut self, frames: u64, dt: f32, mut on_frame: F) -> Result<FrameStats, SimError>
    where
        F: FnMut(&mut Self, &FrameStats) -> Result<(), SimError>,
    {
        let mut total = FrameStats::default();
        for _ in 0..frames {
            let time = self.time + dt;
            let stats = self.step(dt, time)?;
            total.dispatches += stats.dispatches;
            total.copies += stats.copies;
            total.clears += stats.clears;
            total.elapsed += stats.elapsed;
            on_frame(self, &stats)?;
        }
        Ok(total)
    }

    pub fn stats(&self) -> Result<FieldStats, SimError> {
        let area = f64::from(self.device.grid().cell_area());
        let materials = self
            .device
            .read_buffer(self.material.fields().materials)?
            .texels::<MaterialTexel>();

        let mut soil = 0.0;
        let mut rock = 0.0;
        let mut lava = 0.0;
        let mut max_height = f32::NEG_INFINITY;
        for t in materials {
            soil += f64::from(t.soil);
            rock += f64::from(t.rock);
            lava += f64::from(t.lava);
            max_height = max_height.max(t.height());
        }

        let water = self.snapshot(self.fluid.water_depth_texture())?;
        let sediment = self.snapshot(self.fluid.sediment_texture())?;
        let pools = self.snapshot(self.fluid.pool_mask_texture())?;
        let temperature = self.snapshot(self.fluid.temperature_texture())?;

        Ok(FieldStats {
            frame: self.frame,
            time: self.time,
            soil_volume: soil * area,
            rock_volume: rock * area,
            lava_volume: lava * area,
            water_volume: water.sum() * area,
            sediment_volume: sediment.sum() * area,
            pooled_cells: pools.values().iter().filter(|&&p| p > 0.5).count(),
            max_height,
            max_temperature: temperature.max(),
            hand: self.material.hand_state(),
        })
    }

    /// Frees every buffer and drops the engines.
    pub fn destroy(mut self) {
        self.material.destroy(&mut self.device);
        self.fluid.destroy(&mut self.device);
        log::debug!("simulation destroyed; {} buffers live", self.device.live_buffers());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{BrushMode, Material};

    fn flat_sim() -> Simulation {
        let config = SimConfig {
            grid_size: 16,
            cell_size: 1.0,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        let cells = sim.device().grid().cell_count();
        sim.upload_terrain(&vec![1.0; cells], &vec![3.0; cells]).unwrap();
        sim
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            cell_size: -1.0,
            ..SimConfig::default()
        };
        assert!(matches!(Simulation::new(config), Err(SimError::Config(_))));
    }

    #[test]
    fn test_step_runs_material_then_fluid() {
        let mut sim = flat_sim();
        sim.add_stroke(BrushStroke::new(BrushMode::Pickup, Material::Soil, 8.0, 8.0).with_strength(300.0));
        let stats = sim.step(1.0 / 60.0, 1.0 / 60.0).unwrap();
        // transfer + apply + 3 thermal + recombine, then six fluid stages and two recombines.
        assert_eq!(stats.dispatches, 1 + 1 + 3 + 1 + 6 + 2);
        assert_eq!(stats.clears, 1);
        assert!(sim.material().hand_state().mass_kg > 0.0);
        assert_eq!(sim.frame(), 1);
    }

    #[test]
    fn test_pickup_then_deposit_round_trip_conserves_soil() {
        let mut sim = flat_sim();
        let before = sim.stats().unwrap().soil_volume;

        sim.add_stroke(BrushStroke::new(BrushMode::Pickup, Material::Soil, 5.0, 5.0).with_strength(600.0));
        sim.run_frames(1, 0.05, |_, _| Ok(())).unwrap();
        let carried = sim.material().hand_state().mass_kg;
        assert!(carried > 0.0);

        sim.add_stroke(
            BrushStroke::new(BrushMode::Deposit, Material::Soil, 11.0, 11.0)
                .with_strength(10_000.0)
                .with_dt(0.05),
        );
        sim.run_frames(1, 0.05, |_, _| Ok(())).unwrap();
        let stats = sim.stats().unwrap();
        assert_eq!(stats.hand.mass_kg, 0.0);
        assert!((stats.soil_volume - before).abs() < 1e-3, "{} vs {}", stats.soil_volume, before);
    }

    #[test]
    fn test_run_frames_reports_each_frame() {
        let mut sim = flat_sim();
        sim.fluid_mut().set_rain_intensity(0.01);
        sim.fluid_mut().set_evaporation_rate(0.0);
        let mut seen = Vec::new();
        let total = sim
            .run_frames(4, 0.25, |sim, stats| {
                seen.push((sim.frame(), stats.dispatches));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[3].0, 4);
        assert_eq!(total.dispatches, seen.iter().map(|(_, d)| d).sum::<usize>());
        assert!((sim.time() - 1.0).abs() < 1e-6);

        let stats = sim.stats().unwrap();
        assert!((stats.water_volume - 16.0 * 16.0 * 0.01).abs() < 1e-3);
        assert!(stats.max_temperature <= sim.config().fluid.ambient_temperature);
    }

    #[test]
    fn test_height_query_and_destroy() {
        let sim = flat_sim();
        assert!((sim.height_at(3.2, 7.9).unwrap() - 4.0).abs() < 1e-6);
        sim.destroy();
    }
}
