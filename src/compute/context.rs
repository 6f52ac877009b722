//! Compute device: owns every grid buffer and the worker pool kernels run on.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fields::{FieldHandle, FieldSnapshot};
use crate::grid::Grid;

use super::buffer::{Buffer, BufferId};
use super::frame::{Bindings, Command, Frame, Kernel, KernelIo};

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to build compute worker pool: {0}")]
    WorkerPool(String),
    #[error("Unknown or destroyed buffer {0:?}")]
    UnknownBuffer(BufferId),
    #[error("Dispatch '{kernel}' binds buffer '{buffer}' for both reading and writing")]
    BindingAlias { kernel: String, buffer: String },
    #[error("Dispatch '{kernel}' expects {expected:?} (read, write) slots, got {got:?}")]
    SlotMismatch {
        kernel: String,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Copy from '{src}' ({src_len} values) into '{dst}' ({dst_len} values)")]
    SizeMismatch {
        src: String,
        src_len: usize,
        dst: String,
        dst_len: usize,
    },
    #[error("Upload of {got} values into '{buffer}' which holds {expected}")]
    UploadSize {
        buffer: String,
        expected: usize,
        got: usize,
    },
}

/// Worker pool configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Worker threads for kernel dispatches; `None` uses one per core.
    pub threads: Option<usize>,
}

/// Counters for one submitted frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub dispatches: usize,
    pub copies: usize,
    pub clears: usize,
    pub elapsed: Duration,
}

/// Owns all grid buffers and executes frames.
///
/// Buffers are only reachable through [`BufferId`] handles. Callers outside
/// the engines get read-only views ([`ComputeDevice::read_buffer`]) or owned
/// snapshots; mutation happens through submitted frames and the explicit
/// upload entry point.
pub struct ComputeDevice {
    grid: Grid,
    pool: rayon::ThreadPool,
    buffers: Vec<Option<Buffer>>,
    frames_submitted: u64,
}

impl ComputeDevice {
    /// Creates the device and its worker pool.
    ///
    /// Pool creation failure is not recoverable; callers report it and stop.
    pub fn new(grid: Grid, config: &ComputeConfig) -> Result<Self, ComputeError> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("terrasim-kernel-{i}"));
        if let Some(threads) = config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| ComputeError::WorkerPool(e.to_string()))?;

        log::debug!(
            "compute device ready: {}x{} cells, {} workers",
            grid.size,
            grid.size,
            pool.current_num_threads()
        );

        Ok(Self {
            grid,
            pool,
            buffers: Vec::new(),
            frames_submitted: 0,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Allocates a grid-sized buffer with every value set to `init`.
    pub fn create_buffer(&mut self, label: &str, channels: u32, init: f32) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers
            .push(Some(Buffer::new(label, channels, self.grid.cell_count(), init)));
        id
    }

    /// Frees a buffer. Its handle becomes invalid.
    pub fn destroy_buffer(&mut self, id: BufferId) {
        if let Some(slot) = self.buffers.get_mut(id.slot()) {
            *slot = None;
        }
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    pub fn read_buffer(&self, id: BufferId) -> Result<&Buffer, ComputeError> {
        self.buffers
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or(ComputeError::UnknownBuffer(id))
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut Buffer, ComputeError> {
        self.buffers
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .ok_or(ComputeError::UnknownBuffer(id))
    }

    /// Overwrites a whole buffer from the host (initial terrain, seeded water).
    pub fn write_buffer(&mut self, id: BufferId, values: &[f32]) -> Result<(), ComputeError> {
        let buffer = self.buffer_mut(id)?;
        let expected = buffer.as_slice().len();
        if values.len() != expected {
            return Err(ComputeError::UploadSize {
                buffer: buffer.label().to_string(),
                expected,
                got: values.len(),
            });
        }
        buffer.as_mut_slice().copy_from_slice(values);
        Ok(())
    }

    /// Extracts one channel of a field as an owned snapshot.
    pub fn snapshot(&self, handle: FieldHandle) -> Result<FieldSnapshot, ComputeError> {
        let buffer = self.read_buffer(handle.buffer)?;
        let stride = buffer.channels() as usize;
        let channel = (handle.channel as usize).min(stride - 1);
        let values = buffer
            .as_slice()
            .iter()
            .skip(channel)
            .step_by(stride)
            .copied()
            .collect();
        Ok(FieldSnapshot::new(buffer.label(), self.grid, values))
    }

    /// Executes every command of `frame` in recording order.
    pub fn submit(&mut self, frame: Frame) -> Result<FrameStats, ComputeError> {
        let start = Instant::now();
        let label = frame.label().to_string();
        let mut stats = FrameStats::default();

        for command in frame.into_commands() {
            match command {
                Command::Dispatch { kernel, bindings } => {
                    self.dispatch(kernel.as_ref(), &bindings)?;
                    stats.dispatches += 1;
                }
                Command::CopyBufferToBuffer { src, dst } => {
                    self.copy(src, dst)?;
                    stats.copies += 1;
                }
                Command::ClearBuffer { buffer } => {
                    self.buffer_mut(buffer)?.as_mut_slice().fill(0.0);
                    stats.clears += 1;
                }
            }
        }

        stats.elapsed = start.elapsed();
        self.frames_submitted += 1;
        log::debug!(
            "frame '{}' #{}: {} dispatches, {} copies, {} clears in {:?}",
            label,
            self.frames_submitted,
            stats.dispatches,
            stats.copies,
            stats.clears,
            stats.elapsed
        );
        Ok(stats)
    }

    fn validate(&self, kernel: &dyn Kernel, bindings: &Bindings) -> Result<(), ComputeError> {
        let got = (bindings.reads.len(), bindings.writes.len());
        if got != kernel.slots() {
            return Err(ComputeError::SlotMismatch {
                kernel: kernel.label().to_string(),
                expected: kernel.slots(),
                got,
            });
        }

        for &id in bindings.reads.iter().chain(bindings.writes.iter()) {
            self.read_buffer(id)?;
        }

        for (i, &w) in bindings.writes.iter().enumerate() {
            let aliased = bindings.reads.contains(&w) || bindings.writes[i + 1..].contains(&w);
            if aliased {
                return Err(ComputeError::BindingAlias {
                    kernel: kernel.label().to_string(),
                    buffer: self.read_buffer(w)?.label().to_string(),
                });
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, kernel: &dyn Kernel, bindings: &Bindings) -> Result<(), ComputeError> {
        self.validate(kernel, bindings)?;
        log::trace!("dispatch '{}'", kernel.label());

        // Outputs leave the arena for the duration of the dispatch so inputs
        // can be borrowed from it at the same time.
        let mut outputs: Vec<Buffer> = bindings
            .writes
            .iter()
            .filter_map(|id| self.buffers.get_mut(id.slot()).and_then(Option::take))
            .collect();

        {
            let reads: Vec<&Buffer> = bindings
                .reads
                .iter()
                .filter_map(|id| self.buffers.get(id.slot()).and_then(Option::as_ref))
                .collect();
            let writes: Vec<&mut Buffer> = outputs.iter_mut().collect();
            let mut io = KernelIo { reads, writes };
            let grid = self.grid;
            self.pool.install(|| kernel.run(&grid, &mut io));
        }

        for (id, buffer) in bindings.writes.iter().zip(outputs) {
            self.buffers[id.slot()] = Some(buffer);
        }
        Ok(())
    }

    fn copy(&mut self, src: BufferId, dst: BufferId) -> Result<(), ComputeError> {
        if src == dst {
            return Ok(());
        }
        let mut target = self
            .buffers
            .get_mut(dst.slot())
            .and_then(Option::take)
            .ok_or(ComputeError::UnknownBuffer(dst))?;

        let result = match self.read_buffer(src) {
            Ok(source) if source.as_slice().len() == target.as_slice().len() => {
                target.as_mut_slice().copy_from_slice(source.as_slice());
                Ok(())
            }
            Ok(source) => Err(ComputeError::SizeMismatch {
                src: source.label().to_string(),
                src_len: source.as_slice().len(),
                dst: target.label().to_string(),
                dst_len: target.as_slice().len(),
            }),
            Err(e) => Err(e),
        };

        self.buffers[dst.slot()] = Some(target);
        result
    }
}
