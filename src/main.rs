//! Terrasim CLI - headless terrain and surface-fluid simulation.
//!
//! Seeds a hilly demo terrain, registers water and lava sources, plays a
//! short scripted brush sequence and reports field totals as it runs.

use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use terrasim::{BrushMode, BrushStroke, Grid, Material, SimConfig, SimError, Simulation};

/// Interactive terrain deformation and surface-fluid simulator.
#[derive(Parser)]
#[command(name = "terrasim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation on a seeded demo terrain.
    Run {
        /// JSON configuration file. Flags below override its fields.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cells along each axis.
        #[arg(long)]
        grid_size: Option<u32>,

        /// Cell edge length in meters.
        #[arg(long)]
        cell_size: Option<f32>,

        /// Number of frames to simulate.
        #[arg(short, long, default_value = "600")]
        frames: u64,

        /// Seconds per frame.
        #[arg(long, default_value = "0.016666668")]
        dt: f32,

        /// Random seed for the demo terrain.
        #[arg(short, long)]
        seed: Option<u64>,

        /// Rain intensity in m/s.
        #[arg(long)]
        rain: Option<f32>,

        /// Water source as X,Z,RATE (normalized position, m^3/s). Repeatable.
        #[arg(long, value_name = "X,Z,RATE")]
        water_source: Vec<SourceArg>,

        /// Lava source as X,Z,RATE (normalized position, m^3/s). Repeatable.
        #[arg(long, value_name = "X,Z,RATE")]
        lava_source: Vec<SourceArg>,

        /// Print field totals every N frames.
        #[arg(long, default_value = "60")]
        report_every: u64,
    },

    /// Write the default configuration as JSON.
    Config {
        /// Output path. Prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy)]
struct SourceArg {
    x: f32,
    z: f32,
    rate: f32,
}

impl FromStr for SourceArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, z, rate] = parts.as_slice() else {
            return Err(format!("expected X,Z,RATE, got '{s}'"));
        };
        let parse = |v: &str| v.parse::<f32>().map_err(|e| format!("'{v}': {e}"));
        Ok(Self {
            x: parse(*x)?,
            z: parse(*z)?,
            rate: parse(*rate)?,
        })
    }
}

struct RunArgs {
    config: Option<PathBuf>,
    grid_size: Option<u32>,
    cell_size: Option<f32>,
    frames: u64,
    dt: f32,
    seed: Option<u64>,
    rain: Option<f32>,
    water_sources: Vec<SourceArg>,
    lava_sources: Vec<SourceArg>,
    report_every: u64,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            grid_size,
            cell_size,
            frames,
            dt,
            seed,
            rain,
            water_source,
            lava_source,
            report_every,
        } => run(RunArgs {
            config,
            grid_size,
            cell_size,
            frames,
            dt,
            seed,
            rain,
            water_sources: water_source,
            lava_sources: lava_source,
            report_every,
        }),
        Commands::Config { output } => write_config(output),
    };

    if let Err(e) = result {
        log::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn write_config(output: Option<PathBuf>) -> Result<(), SimError> {
    let config = SimConfig::default();
    match output {
        Some(path) => {
            config.save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        None => println!("{}", config.to_json()?),
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<(), SimError> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::preview(),
    };
    if let Some(size) = args.grid_size {
        config.grid_size = size;
    }
    if let Some(cell_size) = args.cell_size {
        config.cell_size = cell_size;
    }
    if let Some(rain) = args.rain {
        config.fluid.rain_intensity = rain;
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    let grid = config.grid();

    println!("Terrasim - Terrain and Fluid Simulation");
    println!("=======================================");
    println!("Grid: {}x{} cells of {} m", grid.size, grid.size, grid.cell_size);
    println!("Seed: {}", seed);
    println!("Frames: {} at dt={:.4}s", args.frames, args.dt);

    let start = Instant::now();
    let mut sim = Simulation::new(config)?;

    let (soil, rock) = hill_terrain(&grid, seed);
    sim.upload_terrain(&soil, &rock)?;

    let mut next_id = 0;
    for s in &args.water_sources {
        sim.fluid_mut().add_water_source(next_id, s.x, s.z, s.rate)?;
        next_id += 1;
    }
    for s in &args.lava_sources {
        sim.fluid_mut().add_lava_source(next_id, s.x, s.z, s.rate)?;
        next_id += 1;
    }
    println!("Sources: {} water, {} lava", args.water_sources.len(), args.lava_sources.len());
    println!("\n{}", sim.stats()?);

    let script = BrushScript::new(&grid, args.dt);
    let report_every = args.report_every.max(1);
    let dt = args.dt;
    let totals = sim.run_frames(args.frames, dt, |sim, _| {
        if let Some(stroke) = script.stroke_for(sim.frame()) {
            sim.add_stroke(stroke);
        }
        if sim.frame() % report_every == 0 {
            println!("{}", sim.stats()?);
        }
        Ok(())
    })?;

    let elapsed = start.elapsed();
    println!("\n{}", sim.stats()?);
    println!(
        "Done: {} dispatches, {} copies, {} clears ({:.2?} in kernels, {:.2?} total)",
        totals.dispatches, totals.copies, totals.clears, totals.elapsed, elapsed
    );
    sim.destroy();
    Ok(())
}

/// Soil over rock with a handful of randomly placed gaussian hills.
fn hill_terrain(grid: &Grid, seed: u64) -> (Vec<f32>, Vec<f32>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let extent = grid.extent();
    let hills: Vec<(f32, f32, f32, f32)> = (0..6)
        .map(|_| {
            (
                rng.gen_range(0.1..0.9) * extent,
                rng.gen_range(0.1..0.9) * extent,
                rng.gen_range(0.1..0.3) * extent,
                rng.gen_range(4.0..24.0),
            )
        })
        .collect();

    (0..grid.cell_count())
        .map(|i| {
            let (x, y) = grid.coords(i);
            let p = grid.cell_center(x, y);
            let relief: f32 = hills
                .iter()
                .map(|&(hx, hz, radius, height)| {
                    let d2 = (p.x - hx).powi(2) + (p.y - hz).powi(2);
                    height * (-d2 / (2.0 * radius * radius)).exp()
                })
                .sum();
            let rock = 2.0 + 0.7 * relief;
            let soil = 1.0 + 0.3 * relief;
            (soil, rock)
        })
        .unzip()
}

/// Scripted brush sequence: scoop soil from one spot, drop it on another,
/// then flatten a pad at the middle.
struct BrushScript {
    scoop: (f32, f32),
    drop: (f32, f32),
    pad: (f32, f32),
    radius: f32,
    dt: f32,
}

impl BrushScript {
    fn new(grid: &Grid, dt: f32) -> Self {
        let extent = grid.extent();
        Self {
            scoop: (0.3 * extent, 0.3 * extent),
            drop: (0.7 * extent, 0.6 * extent),
            pad: (0.5 * extent, 0.5 * extent),
            radius: 4.0 * grid.cell_size,
            dt,
        }
    }

    fn stroke_for(&self, frame: u64) -> Option<BrushStroke> {
        let (mode, (x, z)) = match frame {
            1..=30 => (BrushMode::Pickup, self.scoop),
            31..=60 => (BrushMode::Deposit, self.drop),
            61..=120 => (BrushMode::Flatten, self.pad),
            _ => return None,
        };
        Some(
            BrushStroke::new(mode, Material::Soil, x, z)
                .with_radius(self.radius)
                .with_strength(match mode {
                    BrushMode::Flatten => 60.0,
                    _ => 1200.0,
                })
                .with_dt(self.dt),
        )
    }
}
