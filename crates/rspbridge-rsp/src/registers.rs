//! The m68k register file as seen by the debugger.

use std::fmt;

/// A machine register, in the order declared by the target description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    D0,
    D1,
    D2,
    D3,
    D4,
    D5,
    D6,
    D7,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    /// Frame pointer.
    A6,
    /// Stack pointer.
    A7,
    /// Status register (16 bits).
    Sr,
    /// Program counter.
    Pc,
}

impl Register {
    /// Every register, in wire order. The position in this array is the
    /// register number used by `p` and by stop replies.
    pub const ALL: [Register; 18] = [
        Register::D0,
        Register::D1,
        Register::D2,
        Register::D3,
        Register::D4,
        Register::D5,
        Register::D6,
        Register::D7,
        Register::A0,
        Register::A1,
        Register::A2,
        Register::A3,
        Register::A4,
        Register::A5,
        Register::A6,
        Register::A7,
        Register::Sr,
        Register::Pc,
    ];

    /// Look up a register by its wire number.
    pub fn from_index(index: usize) -> Option<Register> {
        Self::ALL.get(index).copied()
    }

    /// Position in [`Register::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Width of the register in bits.
    pub fn bits(self) -> u32 {
        match self {
            Register::Sr => 16,
            _ => 32,
        }
    }

    /// Conventional upper-case name (`D0`, `A7`, `SR`, `PC`).
    pub fn name(self) -> &'static str {
        match self {
            Register::D0 => "D0",
            Register::D1 => "D1",
            Register::D2 => "D2",
            Register::D3 => "D3",
            Register::D4 => "D4",
            Register::D5 => "D5",
            Register::D6 => "D6",
            Register::D7 => "D7",
            Register::A0 => "A0",
            Register::A1 => "A1",
            Register::A2 => "A2",
            Register::A3 => "A3",
            Register::A4 => "A4",
            Register::A5 => "A5",
            Register::A6 => "A6",
            Register::A7 => "A7",
            Register::Sr => "SR",
            Register::Pc => "PC",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A register snapshot taken when the target halts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    values: [u32; 18],
}

impl Registers {
    /// Build a snapshot from values in wire order.
    pub fn from_values(values: [u32; 18]) -> Self {
        Self { values }
    }

    /// Value of a register. SR only keeps its low 16 bits.
    pub fn get(&self, reg: Register) -> u32 {
        let value = self.values[reg.index()];
        match reg.bits() {
            16 => value & 0xffff,
            _ => value,
        }
    }

    /// Overwrite a register.
    pub fn set(&mut self, reg: Register, value: u32) {
        self.values[reg.index()] = value;
    }

    /// Render a register as big-endian hex, zero-padded to its full width.
    pub fn as_hex(&self, reg: Register) -> String {
        let digits = (reg.bits() / 4) as usize;
        format!("{:0digits$x}", self.get(reg))
    }

    /// All registers concatenated in wire order (the `g` reply).
    pub fn dump(&self) -> String {
        Register::ALL.iter().map(|&reg| self.as_hex(reg)).collect()
    }

    /// `<n>:<value>;` pairs for every register, as carried by a `T` stop reply.
    pub fn stop_reply_fields(&self) -> String {
        Register::ALL
            .iter()
            .map(|&reg| format!("{:x}:{};", reg.index(), self.as_hex(reg)))
            .collect()
    }
}
