//! The target-control interface the session drives.
//!
//! The bridge never executes code itself; an emulator (or any other
//! debuggee) implements [`Target`] and the session calls into it.

use thiserror::Error;

use crate::registers::Registers;

/// Failures reported by a target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// The requested memory range is not backed by the target.
    #[error("memory range {address:#010x}+{length:#x} is not readable")]
    MemoryOutOfRange {
        /// First requested address.
        address: u32,
        /// Number of requested bytes.
        length: usize,
    },

    /// The target refused to arm or disarm a breakpoint.
    #[error("breakpoint at {0:#010x} rejected")]
    BreakpointRejected(u32),

    /// The target is gone (emulator exited, control channel closed).
    #[error("target disconnected")]
    Disconnected,

    /// Any other target-specific failure.
    #[error("{0}")]
    Other(String),
}

/// What the target reports when it halts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Register state at the halt.
    pub registers: Registers,
}

impl StopReport {
    /// Build a report from a register snapshot.
    pub fn new(registers: Registers) -> Self {
        Self { registers }
    }
}

/// Execution control and inspection of the debuggee.
///
/// Every method takes `&self`: while the session awaits a halt it must still
/// be able to call [`Target::interrupt`] on the same target, so implementors
/// keep their mutable state behind interior mutability.
///
/// `resume`, `step` and `interrupt` are fire-and-forget; their outcome is
/// observed through the next [`Target::await_halt`].
#[allow(async_fn_in_trait)]
pub trait Target {
    /// Entry point of the loaded program, if known.
    async fn entry_point(&self) -> Option<u32>;

    /// Current register snapshot.
    async fn read_registers(&self) -> Result<Registers, TargetError>;

    /// Read `length` bytes starting at `address`.
    async fn read_memory(&self, address: u32, length: usize) -> Result<Vec<u8>, TargetError>;

    /// Let the target run.
    fn resume(&self);

    /// Execute a single instruction.
    fn step(&self);

    /// Ask a running target to pause.
    fn interrupt(&self);

    /// Wait until the target halts and report its state.
    ///
    /// Used for the initial handshake and inside the run-loop race. Must be
    /// safe to keep pending while [`Target::interrupt`] is called.
    async fn await_halt(&self) -> Result<StopReport, TargetError>;

    /// Arm a breakpoint.
    async fn insert_breakpoint(&self, address: u32) -> Result<(), TargetError>;

    /// Disarm a breakpoint.
    async fn remove_breakpoint(&self, address: u32) -> Result<(), TargetError>;
}

/// A borrowed target, so one target can outlive many sessions.
impl<T: Target> Target for &T {
    async fn entry_point(&self) -> Option<u32> {
        (**self).entry_point().await
    }

    async fn read_registers(&self) -> Result<Registers, TargetError> {
        (**self).read_registers().await
    }

    async fn read_memory(&self, address: u32, length: usize) -> Result<Vec<u8>, TargetError> {
        (**self).read_memory(address, length).await
    }

    fn resume(&self) {
        (**self).resume()
    }

    fn step(&self) {
        (**self).step()
    }

    fn interrupt(&self) {
        (**self).interrupt()
    }

    async fn await_halt(&self) -> Result<StopReport, TargetError> {
        (**self).await_halt().await
    }

    async fn insert_breakpoint(&self, address: u32) -> Result<(), TargetError> {
        (**self).insert_breakpoint(address).await
    }

    async fn remove_breakpoint(&self, address: u32) -> Result<(), TargetError> {
        (**self).remove_breakpoint(address).await
    }
}
