//! Breakpoints armed by the debugger.

use std::collections::BTreeSet;

/// The set of armed breakpoint addresses.
///
/// Keys are parsed addresses, so `Z0,1000` and `z0,00001000` name the same
/// breakpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointSet {
    addresses: BTreeSet<u32>,
}

impl BreakpointSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a breakpoint. Returns `false` if it was already armed.
    pub fn insert(&mut self, address: u32) -> bool {
        self.addresses.insert(address)
    }

    /// Disarm a breakpoint. Returns `false` if it was not armed.
    pub fn remove(&mut self, address: u32) -> bool {
        self.addresses.remove(&address)
    }

    /// Whether a breakpoint is armed at `address`.
    pub fn contains(&self, address: u32) -> bool {
        self.addresses.contains(&address)
    }

    /// Number of armed breakpoints.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Whether no breakpoint is armed.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Armed addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.addresses.iter().copied()
    }
}
