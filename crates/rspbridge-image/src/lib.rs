//! rspbridge-image: a [`Target`] backed by a flat memory image.
//!
//! The image target does not execute instructions. It serves memory and a
//! fixed register file so a debugger can attach and inspect a program
//! without an emulator: `step` halts at once, `resume` runs until the next
//! `interrupt`, and breakpoints are only recorded.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use rspbridge_rsp::{Register, Registers, StopReport, Target, TargetError};

/// Status register after reset: supervisor mode, interrupts masked.
const RESET_SR: u32 = 0x2700;

/// Errors while building an image target.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The image file could not be read.
    #[error("failed to read image {path}: {source}")]
    Read {
        /// Path of the image.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The image would extend past the end of the 32-bit address space.
    #[error("image of {len} bytes does not fit at {base:#010x}")]
    TooLarge {
        /// Load address.
        base: u32,
        /// Image size in bytes.
        len: usize,
    },
}

/// A flat binary image loaded at a fixed address.
#[derive(Debug)]
pub struct ImageTarget {
    memory: Vec<u8>,
    base: u32,
    entry: Option<u32>,
    registers: Registers,
    breakpoints: Mutex<BTreeSet<u32>>,
    running: AtomicBool,
    halted: Notify,
}

impl ImageTarget {
    /// Place `memory` at `base`. The program counter starts at `base`.
    pub fn new(memory: Vec<u8>, base: u32) -> Result<Self, ImageError> {
        let fits = u32::try_from(memory.len())
            .ok()
            .and_then(|len| base.checked_add(len))
            .is_some();
        if !fits {
            return Err(ImageError::TooLarge {
                base,
                len: memory.len(),
            });
        }

        let mut registers = Registers::default();
        registers.set(Register::Pc, base);
        registers.set(Register::Sr, RESET_SR);

        Ok(Self {
            memory,
            base,
            entry: None,
            registers,
            breakpoints: Mutex::new(BTreeSet::new()),
            // Until a debugger attaches, the target counts as running.
            running: AtomicBool::new(true),
            halted: Notify::new(),
        })
    }

    /// Read an image file and place it at `base`.
    pub fn load(path: &Path, base: u32) -> Result<Self, ImageError> {
        let memory = std::fs::read(path).map_err(|source| ImageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded {} bytes from {}", memory.len(), path.display());
        Self::new(memory, base)
    }

    /// Set the program entry point; the program counter starts there.
    pub fn with_entry(mut self, entry: u32) -> Self {
        self.entry = Some(entry);
        self.registers.set(Register::Pc, entry);
        self
    }

    /// Set the initial stack pointer (A7).
    pub fn with_stack(mut self, stack: u32) -> Self {
        self.registers.set(Register::A7, stack);
        self
    }

    /// Whether the target currently counts as running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Addresses of the recorded breakpoints.
    pub async fn breakpoints(&self) -> Vec<u32> {
        self.breakpoints.lock().await.iter().copied().collect()
    }

    fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.halted.notify_waiters();
    }
}

impl Target for ImageTarget {
    async fn entry_point(&self) -> Option<u32> {
        self.entry
    }

    async fn read_registers(&self) -> Result<Registers, TargetError> {
        Ok(self.registers.clone())
    }

    async fn read_memory(&self, address: u32, length: usize) -> Result<Vec<u8>, TargetError> {
        let out_of_range = TargetError::MemoryOutOfRange { address, length };
        let start = address.checked_sub(self.base).ok_or(out_of_range.clone())? as usize;
        let end = start.checked_add(length).ok_or(out_of_range.clone())?;
        self.memory
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or(out_of_range)
    }

    fn resume(&self) {
        debug!("resume");
        self.running.store(true, Ordering::SeqCst);
    }

    fn step(&self) {
        debug!("step");
        self.halt();
    }

    fn interrupt(&self) {
        debug!("interrupt");
        self.halt();
    }

    async fn await_halt(&self) -> Result<StopReport, TargetError> {
        loop {
            let notified = self.halted.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_running() {
                return Ok(StopReport::new(self.registers.clone()));
            }
            notified.await;
        }
    }

    async fn insert_breakpoint(&self, address: u32) -> Result<(), TargetError> {
        self.breakpoints.lock().await.insert(address);
        Ok(())
    }

    async fn remove_breakpoint(&self, address: u32) -> Result<(), TargetError> {
        self.breakpoints.lock().await.remove(&address);
        Ok(())
    }
}
