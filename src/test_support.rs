//! Shared fixtures for unit tests.

use crate::compute::{ComputeConfig, ComputeDevice};
use crate::fields::FieldStore;
use crate::fluid::{FluidConfig, FluidEngine};
use crate::grid::Grid;
use crate::material::{MaterialConfig, MaterialEngine, MaterialTexel};

pub fn device(size: u32, cell_size: f32) -> ComputeDevice {
    ComputeDevice::new(Grid::new(size, cell_size), &ComputeConfig { threads: Some(4) })
        .expect("test worker pool")
}

fn terrain<F>(grid: &Grid, layers: F) -> (Vec<f32>, Vec<f32>)
where
    F: Fn(u32, u32) -> (f32, f32),
{
    (0..grid.cell_count())
        .map(|i| {
            let (x, y) = grid.coords(i);
            layers(x, y)
        })
        .unzip()
}

pub struct MaterialFixture {
    pub device: ComputeDevice,
    pub engine: MaterialEngine,
}

/// Material engine over terrain given as `(soil, rock)` per cell.
pub fn material_fixture<F>(size: u32, cell_size: f32, layers: F) -> MaterialFixture
where
    F: Fn(u32, u32) -> (f32, f32),
{
    let mut device = device(size, cell_size);
    let grid = *device.grid();
    let store = FieldStore::new(&mut device, 20.0);
    let engine = MaterialEngine::new(MaterialConfig::default(), store.material, &grid);
    let (soil, rock) = terrain(&grid, layers);
    engine.upload_terrain(&mut device, &soil, &rock).expect("terrain upload");
    MaterialFixture { device, engine }
}

pub struct FluidFixture {
    pub device: ComputeDevice,
    pub materials: MaterialEngine,
    pub fluid: FluidEngine,
}

/// Fluid engine (plus the material engine owning the terrain).
pub fn fluid_fixture<F>(size: u32, cell_size: f32, config: FluidConfig, layers: F) -> FluidFixture
where
    F: Fn(u32, u32) -> (f32, f32),
{
    let mut device = device(size, cell_size);
    let grid = *device.grid();
    let store = FieldStore::new(&mut device, config.ambient_temperature);
    let material_config = MaterialConfig::default();
    let max_total = material_config.max_total_height;
    let materials = MaterialEngine::new(material_config, store.material, &grid);
    let fluid = FluidEngine::new(config, store.fluid, store.material, &grid, max_total);
    let (soil, rock) = terrain(&grid, layers);
    materials.upload_terrain(&mut device, &soil, &rock).expect("terrain upload");
    FluidFixture { device, materials, fluid }
}

pub fn read_materials(device: &ComputeDevice, engine: &MaterialEngine) -> Vec<MaterialTexel> {
    device
        .read_buffer(engine.fields().materials)
        .expect("materials buffer")
        .texels::<MaterialTexel>()
        .to_vec()
}
