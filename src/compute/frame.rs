//! Frame command stream and the kernel interface.

use crate::grid::Grid;

use super::buffer::{Buffer, BufferId};

/// A per-cell compute function dispatched over the whole grid.
///
/// A kernel carries its own uniform parameters. It receives its bound
/// buffers through [`KernelIo`] and must only write the cell it is
/// processing, so every implementation iterates its outputs with a rayon
/// parallel iterator.
pub trait Kernel: Send + Sync {
    /// Short name used in logs and validation errors.
    fn label(&self) -> &str;

    /// Number of `(read, write)` buffer slots the kernel expects. Checked
    /// against the bindings when the frame is submitted.
    fn slots(&self) -> (usize, usize);

    /// Runs the kernel over every cell of `grid`.
    fn run(&self, grid: &Grid, io: &mut KernelIo<'_>);
}

/// Buffers bound to one dispatch, in slot order.
///
/// Write bindings keep their previous contents, so a kernel may accumulate
/// into its own cell of a write buffer. A buffer may not be bound for both
/// reading and writing in one dispatch.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub(crate) reads: Vec<BufferId>,
    pub(crate) writes: Vec<BufferId>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `id` as the next read slot.
    pub fn read(mut self, id: BufferId) -> Self {
        self.reads.push(id);
        self
    }

    /// Binds `id` as the next write slot.
    pub fn write(mut self, id: BufferId) -> Self {
        self.writes.push(id);
        self
    }

    pub fn reads(&self) -> &[BufferId] {
        &self.reads
    }

    pub fn writes(&self) -> &[BufferId] {
        &self.writes
    }
}

/// Resolved buffers handed to [`Kernel::run`].
pub struct KernelIo<'a> {
    pub(crate) reads: Vec<&'a Buffer>,
    pub(crate) writes: Vec<&'a mut Buffer>,
}

impl<'a> KernelIo<'a> {
    /// Read-only buffer bound at `slot`.
    pub fn read(&self, slot: usize) -> Option<&'a Buffer> {
        self.reads.get(slot).copied()
    }

    /// All read bindings and all write bindings at once, so a kernel can
    /// hold several outputs mutably while reading its inputs.
    pub fn split(&mut self) -> (&[&'a Buffer], &mut [&'a mut Buffer]) {
        (&self.reads, &mut self.writes)
    }
}

/// One recorded operation in a [`Frame`].
pub enum Command {
    Dispatch {
        kernel: Box<dyn Kernel>,
        bindings: Bindings,
    },
    CopyBufferToBuffer {
        src: BufferId,
        dst: BufferId,
    },
    ClearBuffer {
        buffer: BufferId,
    },
}

impl Command {
    /// Label of the command for logs and tests.
    pub fn label(&self) -> &str {
        match self {
            Command::Dispatch { kernel, .. } => kernel.label(),
            Command::CopyBufferToBuffer { .. } => "copy",
            Command::ClearBuffer { .. } => "clear",
        }
    }
}

/// The command stream for one simulation frame.
///
/// Engines encode into a shared frame; nothing runs until the frame is passed
/// to [`super::ComputeDevice::submit`], which executes commands strictly in
/// recording order.
pub struct Frame {
    label: String,
    commands: Vec<Command>,
}

impl Frame {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            commands: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Records a kernel dispatch over the whole grid.
    pub fn dispatch<K: Kernel + 'static>(&mut self, kernel: K, bindings: Bindings) {
        self.commands.push(Command::Dispatch {
            kernel: Box::new(kernel),
            bindings,
        });
    }

    /// Records a full-buffer copy.
    pub fn copy_buffer_to_buffer(&mut self, src: BufferId, dst: BufferId) {
        self.commands.push(Command::CopyBufferToBuffer { src, dst });
    }

    /// Records a zero-fill of `buffer`.
    pub fn clear_buffer(&mut self, buffer: BufferId) {
        self.commands.push(Command::ClearBuffer { buffer });
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Labels of the recorded commands, in order.
    pub fn command_labels(&self) -> Vec<&str> {
        self.commands.iter().map(Command::label).collect()
    }

    pub(crate) fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
