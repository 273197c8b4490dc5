//! rspbridge-rsp: GDB Remote Serial Protocol engine.
//!
//! This crate speaks RSP to an unmodified debugger on one side and drives a
//! [`Target`] on the other. It handles packet framing, acknowledgments,
//! command dispatch and the run loop that races a halting target against
//! the debugger's interrupt.

pub mod breakpoint;
pub mod command;
pub mod error;
pub mod features;
pub mod packet;
pub mod registers;
pub mod session;
pub mod target;
pub mod transport;

// Re-export key types for convenience.
pub use breakpoint::BreakpointSet;
pub use command::{Command, Query};
pub use error::RspError;
pub use registers::{Register, Registers};
pub use session::{run_session, Session, SessionEnd, SessionState};
pub use target::{StopReport, Target, TargetError};
pub use transport::{Incoming, RspConnection};
