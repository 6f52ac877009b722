//! Surface fluid engine: water and lava emission, flow, accumulation,
//! advection, pooling and hydraulic erosion.
//!
//! All six stages are encoded on every [`FluidEngine::update`], in
//! [`FluidStage`] order. Erosion writes soil back into the shared material
//! buffer and recombines height so later readers in the same frame see it.

mod accumulation;
mod advection;
mod config;
mod emission;
mod erosion;
mod flow;
mod params;
mod pools;
mod sources;

use crate::compute::{Bindings, ComputeDevice, ComputeError, Frame};
use crate::fields::{FieldHandle, FluidFields, MaterialFields};
use crate::grid::Grid;
use crate::material::encode_recombine_height;

pub use config::FluidConfig;
pub use erosion::carrying_capacity;
pub use params::FluidParams;
pub use sources::{Source, SourceError, SourceKind, SourceRegistry, MAX_SOURCES};

use accumulation::AccumulationKernel;
use advection::AdvectionKernel;
use emission::{EmissionKernel, Emitter};
use erosion::ErosionKernel;
use flow::FlowKernel;
use pools::PoolKernel;

/// Stages of one fluid update, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidStage {
    Emission,
    Flow,
    Accumulation,
    Advection,
    Pools,
    Erosion,
}

impl FluidStage {
    pub const ALL: [FluidStage; 6] = [
        FluidStage::Emission,
        FluidStage::Flow,
        FluidStage::Accumulation,
        FluidStage::Advection,
        FluidStage::Pools,
        FluidStage::Erosion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FluidStage::Emission => "fluid_emission",
            FluidStage::Flow => "fluid_flow",
            FluidStage::Accumulation => "flow_accumulation",
            FluidStage::Advection => "water_advection",
            FluidStage::Pools => "pool_detection",
            FluidStage::Erosion => "hydraulic_erosion",
        }
    }
}

pub struct FluidEngine {
    config: FluidConfig,
    params: FluidParams,
    grid: Grid,
    fields: FluidFields,
    materials: MaterialFields,
    sources: SourceRegistry,
    time: f32,
}

impl FluidEngine {
    /// `materials` are the buffers shared with the material engine;
    /// `max_total_height` bounds lava emission and deposition.
    pub fn new(
        config: FluidConfig,
        fields: FluidFields,
        materials: MaterialFields,
        grid: &Grid,
        max_total_height: f32,
    ) -> Self {
        let params = FluidParams::new(&config, grid, max_total_height);
        Self {
            config,
            params,
            grid: *grid,
            fields,
            materials,
            sources: SourceRegistry::new(),
            time: 0.0,
        }
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    /// Uniforms as of the last update.
    pub fn params(&self) -> FluidParams {
        self.params
    }

    pub fn fields(&self) -> FluidFields {
        self.fields
    }

    /// Simulated time passed to the last update.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn add_water_source(&mut self, id: u32, x: f32, z: f32, rate: f32) -> Result<(), SourceError> {
        self.add_source(id, SourceKind::Water, x, z, rate)
    }

    pub fn add_lava_source(&mut self, id: u32, x: f32, z: f32, rate: f32) -> Result<(), SourceError> {
        self.add_source(id, SourceKind::Lava, x, z, rate)
    }

    fn add_source(&mut self, id: u32, kind: SourceKind, x: f32, z: f32, rate: f32) -> Result<(), SourceError> {
        self.sources.upsert(id, kind, x, z, rate).map_err(|e| {
            log::warn!("{e}");
            e
        })
    }

    pub fn remove_source(&mut self, id: u32) -> bool {
        self.sources.remove(id)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn sources(&self) -> &[Source] {
        self.sources.as_slice()
    }

    /// Rain over every cell (m/s); negative values clamp to 0.
    pub fn set_rain_intensity(&mut self, value: f32) {
        self.params.rain = value.max(0.0);
    }

    /// Evaporation from every cell (m/s); negative values clamp to 0.
    pub fn set_evaporation_rate(&mut self, value: f32) {
        self.params.evaporation = value.max(0.0);
    }

    pub fn rain_intensity(&self) -> f32 {
        self.params.rain
    }

    pub fn evaporation_rate(&self) -> f32 {
        self.params.evaporation
    }

    /// Seeds the water depth field (e.g. lakes from the terrain generator).
    pub fn upload_water_depth(&self, device: &mut ComputeDevice, depth: &[f32]) -> Result<(), ComputeError> {
        let clamped: Vec<f32> = depth.iter().map(|d| d.max(0.0)).collect();
        device.write_buffer(self.fields.water_depth.current(), &clamped)
    }

    /// Encodes the six fluid stages for a step of `dt` seconds ending at `time`.
    pub fn update(&mut self, frame: &mut Frame, dt: f32, time: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.params.dt = dt;
        self.params.time = time;
        self.time = time;

        let emitters: Vec<Emitter> = self
            .sources
            .as_slice()
            .iter()
            .filter_map(|s| Emitter::resolve(s, &self.grid, self.params.emitter_radius, dt))
            .collect();

        let params = self.params;
        let m = self.materials;
        let f = &mut self.fields;

        frame.dispatch(
            EmissionKernel { params, emitters },
            Bindings::new()
                .read(m.materials)
                .read(f.temperature.current())
                .read(f.water_depth.current())
                .write(m.scratch)
                .write(f.temperature.next())
                .write(f.water_depth.next()),
        );
        f.temperature.swap();
        f.water_depth.swap();
        frame.copy_buffer_to_buffer(m.scratch, m.materials);
        encode_recombine_height(frame, &m);

        frame.dispatch(
            FlowKernel { params },
            Bindings::new()
                .read(m.height)
                .read(f.water_depth.current())
                .read(f.flow.current())
                .write(f.flow.next()),
        );
        f.flow.swap();
        frame.copy_buffer_to_buffer(f.flow.current(), f.flow_sampled);

        frame.dispatch(
            AccumulationKernel { params },
            Bindings::new()
                .read(f.flow_sampled)
                .read(f.accumulation.current())
                .write(f.accumulation.next()),
        );
        f.accumulation.swap();

        frame.dispatch(
            AdvectionKernel { params },
            Bindings::new()
                .read(f.flow_sampled)
                .read(f.water_depth.current())
                .read(f.sediment.current())
                .write(f.water_depth.next())
                .write(f.sediment.next()),
        );
        f.water_depth.swap();
        f.sediment.swap();

        frame.dispatch(
            PoolKernel { params },
            Bindings::new().read(f.flow_sampled).write(f.pool_mask),
        );

        frame.dispatch(
            ErosionKernel { params },
            Bindings::new()
                .read(m.materials)
                .read(m.height)
                .read(f.flow_sampled)
                .read(f.water_depth.current())
                .read(f.sediment.current())
                .write(m.scratch)
                .write(f.sediment.next()),
        );
        f.sediment.swap();
        frame.copy_buffer_to_buffer(m.scratch, m.materials);
        encode_recombine_height(frame, &m);
    }

    pub fn flow_texture(&self) -> FieldHandle {
        FieldHandle {
            buffer: self.fields.flow.current(),
            channel: 0,
            channels: 2,
        }
    }

    pub fn water_depth_texture(&self) -> FieldHandle {
        FieldHandle::scalar(self.fields.water_depth.current())
    }

    pub fn sediment_texture(&self) -> FieldHandle {
        FieldHandle::scalar(self.fields.sediment.current())
    }

    pub fn flow_accumulation_texture(&self) -> FieldHandle {
        FieldHandle::scalar(self.fields.accumulation.current())
    }

    pub fn pool_mask_texture(&self) -> FieldHandle {
        FieldHandle::scalar(self.fields.pool_mask)
    }

    pub fn temperature_texture(&self) -> FieldHandle {
        FieldHandle::scalar(self.fields.temperature.current())
    }

    /// Lava depth lives in channel 2 of the packed material buffer.
    pub fn lava_depth_texture(&self) -> FieldHandle {
        FieldHandle {
            buffer: self.materials.materials,
            channel: 2,
            channels: 4,
        }
    }

    pub fn height_texture(&self) -> FieldHandle {
        FieldHandle::scalar(self.materials.height)
    }

    /// Frees the fluid buffers. Material buffers belong to the material engine.
    pub fn destroy(self, device: &mut ComputeDevice) {
        for id in self.fields.buffers() {
            device.destroy_buffer(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fluid_fixture, read_materials, FluidFixture};

    fn step(fx: &mut FluidFixture, dt: f32) {
        let mut frame = Frame::new("fluid");
        fx.fluid.update(&mut frame, dt, fx.fluid.time() + dt);
        fx.device.submit(frame).unwrap();
    }

    fn scalar(fx: &FluidFixture, handle: FieldHandle) -> Vec<f32> {
        fx.device.snapshot(handle).unwrap().into_values()
    }

    #[test]
    fn test_knobs_clamp_negative_values() {
        let mut fx = fluid_fixture(8, 1.0, FluidConfig::default(), |_, _| (1.0, 1.0));
        fx.fluid.set_rain_intensity(-2.0);
        fx.fluid.set_evaporation_rate(-0.1);
        assert_eq!(fx.fluid.rain_intensity(), 0.0);
        assert_eq!(fx.fluid.evaporation_rate(), 0.0);
        fx.fluid.set_rain_intensity(0.01);
        assert_eq!(fx.fluid.rain_intensity(), 0.01);
    }

    #[test]
    fn test_update_encodes_six_stages_in_order() {
        let mut fx = fluid_fixture(8, 1.0, FluidConfig::default(), |_, _| (1.0, 1.0));
        let mut frame = Frame::new("fluid");
        fx.fluid.update(&mut frame, 0.1, 0.1);
        let dispatched: Vec<&str> = frame
            .command_labels()
            .into_iter()
            .filter(|l| FluidStage::ALL.iter().any(|s| s.name() == *l))
            .collect();
        let expected: Vec<&str> = FluidStage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(dispatched, expected);
        fx.device.submit(frame).unwrap();
        assert_eq!(fx.fluid.time(), 0.1);
    }

    #[test]
    fn test_rain_fills_flat_basin_and_evaporation_drains() {
        let config = FluidConfig {
            rain_intensity: 0.01,
            evaporation_rate: 0.0,
            ..FluidConfig::default()
        };
        let mut fx = fluid_fixture(8, 1.0, config, |_, _| (1.0, 2.0));
        for _ in 0..5 {
            step(&mut fx, 0.5);
        }
        let water = scalar(&fx, fx.fluid.water_depth_texture());
        assert!(water.iter().all(|&w| (w - 0.025).abs() < 1e-5));

        fx.fluid.set_rain_intensity(0.0);
        fx.fluid.set_evaporation_rate(1.0);
        step(&mut fx, 0.5);
        let water = scalar(&fx, fx.fluid.water_depth_texture());
        assert!(water.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_water_source_emits_its_volume() {
        // Without gravity the emitted water stays where it lands.
        let config = FluidConfig {
            gravity: 0.0,
            evaporation_rate: 0.0,
            ..FluidConfig::default()
        };
        let mut fx = fluid_fixture(32, 1.0, config, |_, _| (1.0, 2.0));
        fx.fluid.add_water_source(1, 0.5, 0.5, 4.0).unwrap();
        let mut frame = Frame::new("emit");
        fx.fluid.update(&mut frame, 0.5, 0.5);
        fx.device.submit(frame).unwrap();

        let water = fx.device.snapshot(fx.fluid.water_depth_texture()).unwrap();
        assert!((water.sum() - 2.0).abs() < 1e-3, "emitted {}", water.sum());
        assert!(water.get(16, 16) > 0.0);
        assert_eq!(water.get(16, 19), 0.0);
        assert_eq!(water.get(0, 0), 0.0);
    }

    #[test]
    fn test_lava_source_heats_then_solidifies() {
        let config = FluidConfig {
            lava_cooling_rate: 2.0,
            lava_solidify_rate: 1.0,
            ..FluidConfig::default()
        };
        let mut fx = fluid_fixture(16, 1.0, config, |_, _| (0.0, 5.0));
        fx.fluid.add_lava_source(3, 0.5, 0.5, 2.0).unwrap();
        step(&mut fx, 0.1);

        let grid = *fx.device.grid();
        let center = grid.index(8, 8);
        let lava = scalar(&fx, fx.fluid.lava_depth_texture());
        let temp = scalar(&fx, fx.fluid.temperature_texture());
        assert!(lava[center] > 0.0);
        assert!(temp[center] > 900.0);
        assert_eq!(temp[grid.index(0, 0)], 20.0);

        assert!(fx.fluid.remove_source(3));
        for _ in 0..40 {
            step(&mut fx, 0.5);
        }
        let texels = read_materials(&fx.device, &fx.materials);
        assert!(texels.iter().all(|t| t.lava == 0.0));
        assert!(texels[center].rock > 5.0);
        let temp = scalar(&fx, fx.fluid.temperature_texture());
        assert!(temp.iter().all(|&t| t == 20.0));
    }

    #[test]
    fn test_erosion_moves_soil_into_sediment_cell_by_cell() {
        let config = FluidConfig {
            erosion_rate: 1.0,
            sediment_capacity: 1.0,
            evaporation_rate: 0.0,
            ..FluidConfig::default()
        };
        // Ramp of 0.2 m per cell in rock, uniform soil on top.
        let mut fx = fluid_fixture(16, 1.0, config, |x, _| (1.0, 4.0 - 0.2 * x as f32));
        let cells = fx.device.grid().cell_count();
        fx.fluid.upload_water_depth(&mut fx.device, &vec![0.2; cells]).unwrap();

        let soil_before: Vec<f32> = read_materials(&fx.device, &fx.materials).iter().map(|t| t.soil).collect();
        let sed_before = scalar(&fx, fx.fluid.sediment_texture());
        step(&mut fx, 0.5);
        let soil_after: Vec<f32> = read_materials(&fx.device, &fx.materials).iter().map(|t| t.soil).collect();
        let sed_after = scalar(&fx, fx.fluid.sediment_texture());

        let mut eroded = 0.0;
        for i in 0..cells {
            let removed = soil_before[i] - soil_after[i];
            let gained = sed_after[i] - sed_before[i];
            assert!(removed >= 0.0);
            assert!((removed - gained).abs() < 1e-6, "cell {i}: removed {removed}, gained {gained}");
            eroded += removed;
        }
        assert!(eroded > 1e-3, "expected erosion, got {eroded}");

        // Height follows the eroded soil within the same frame.
        let height = scalar(&fx, fx.fluid.height_texture());
        let texels = read_materials(&fx.device, &fx.materials);
        for (h, t) in height.iter().zip(&texels) {
            assert_eq!(*h, t.height());
        }
    }

    #[test]
    fn test_still_water_deposits_sediment_cell_by_cell() {
        let config = FluidConfig {
            deposition_rate: 0.5,
            evaporation_rate: 0.0,
            ..FluidConfig::default()
        };
        let mut fx = fluid_fixture(8, 1.0, config, |_, _| (1.0, 2.0));
        let cells = fx.device.grid().cell_count();
        fx.fluid.upload_water_depth(&mut fx.device, &vec![0.3; cells]).unwrap();
        let sed = fx.fluid.fields().sediment.current();
        fx.device.write_buffer(sed, &vec![0.02; cells]).unwrap();

        step(&mut fx, 0.5);
        let soil: Vec<f32> = read_materials(&fx.device, &fx.materials).iter().map(|t| t.soil).collect();
        let sediment = scalar(&fx, fx.fluid.sediment_texture());
        for i in 0..cells {
            let gained = soil[i] - 1.0;
            let dropped = 0.02 - sediment[i];
            assert!(gained > 0.0);
            assert!((gained - dropped).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fields_stay_non_negative_under_sources() {
        let config = FluidConfig {
            rain_intensity: 0.001,
            evaporation_rate: 0.002,
            ..FluidConfig::default()
        };
        let mut fx = fluid_fixture(24, 1.0, config, |x, y| {
            let d = ((x as f32 - 12.0).powi(2) + (y as f32 - 12.0).powi(2)).sqrt();
            (0.5, 6.0 - 0.25 * d)
        });
        fx.fluid.add_water_source(1, 0.5, 0.5, 3.0).unwrap();
        fx.fluid.add_lava_source(2, 0.2, 0.8, 0.5).unwrap();
        for _ in 0..30 {
            step(&mut fx, 0.1);
        }
        for handle in [
            fx.fluid.water_depth_texture(),
            fx.fluid.sediment_texture(),
            fx.fluid.flow_accumulation_texture(),
            fx.fluid.lava_depth_texture(),
        ] {
            assert!(scalar(&fx, handle).iter().all(|&v| v >= 0.0 && v.is_finite()));
        }
        let pools = scalar(&fx, fx.fluid.pool_mask_texture());
        assert!(pools.iter().all(|&p| p == 0.0 || p == 1.0));
        let temp = scalar(&fx, fx.fluid.temperature_texture());
        assert!(temp.iter().all(|&t| t >= fx.fluid.config().ambient_temperature));
        let flow = fx.device.read_buffer(fx.fluid.flow_texture().buffer).unwrap();
        assert!(flow.as_slice().iter().all(|v| v.is_finite()));
    }
}
