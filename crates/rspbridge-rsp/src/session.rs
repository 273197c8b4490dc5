//! RSP session: handshake, command dispatch and the run loop.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::breakpoint::BreakpointSet;
use crate::command::{Command, Query};
use crate::error::RspError;
use crate::features::{features_reply, STOP_SIGNAL, SUPPORTED};
use crate::packet::encode_hex;
use crate::registers::Register;
use crate::target::{StopReport, Target, TargetError};
use crate::transport::{Incoming, RspConnection};

/// Breakpoint already armed (insert) or not armed (remove).
pub const E_BREAKPOINT_STATE: &str = "E01";
/// Register number outside the declared layout.
pub const E_BAD_REGISTER: &str = "E02";
/// The target rejected the request.
pub const E_TARGET: &str = "E03";
/// The command's arguments could not be parsed.
pub const E_MALFORMED: &str = "E04";

/// How many times a rejected reply is resent before giving up.
const MAX_RETRANSMITS: u32 = 3;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the debugger's opening `+`.
    AwaitHandshake,
    /// Waiting for the next debugger command.
    Interactive,
    /// The target executes until it halts or the debugger interrupts.
    Running,
    /// The debugger detached; the target was resumed.
    Detached,
    /// The debugger closed the stream.
    Closed,
}

/// How a session ended without a protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `D` was received.
    Detached,
    /// The stream was closed between packets.
    Closed,
}

/// What the interactive loop does after a command.
enum Flow {
    /// Send this reply and wait for its acknowledgment.
    Reply(String),
    /// Control went to the target; enter the run loop.
    Resume,
    /// The session is over.
    Detach,
}

/// One debugger connection driving one target.
pub struct Session<S, T> {
    conn: RspConnection<S>,
    target: T,
    breakpoints: BreakpointSet,
    state: SessionState,
    last_stop: Option<StopReport>,
}

impl<S, T> Session<S, T>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Target,
{
    /// Create a session over a freshly accepted stream.
    pub fn new(stream: S, target: T) -> Self {
        Self {
            conn: RspConnection::new(stream),
            target,
            breakpoints: BreakpointSet::new(),
            state: SessionState::AwaitHandshake,
            last_stop: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Breakpoints armed so far.
    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    /// The most recent halt report.
    pub fn last_stop(&self) -> Option<&StopReport> {
        self.last_stop.as_ref()
    }

    /// The target this session drives.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Serve the debugger until it detaches or hangs up.
    ///
    /// Returns an error only for protocol-fatal conditions; everything
    /// else is answered with an RSP error reply and the session goes on.
    pub async fn run(&mut self) -> Result<SessionEnd, RspError> {
        self.handshake().await?;
        loop {
            if let Some(end) = self.interactive().await? {
                info!(?end, "session finished");
                return Ok(end);
            }
            let report = self.run_until_halt().await?;
            self.report_stop(report).await?;
        }
    }

    async fn handshake(&mut self) -> Result<(), RspError> {
        self.state = SessionState::AwaitHandshake;
        if !self.conn.await_ack().await? {
            return Err(RspError::HandshakeRejected);
        }
        self.target.interrupt();
        let report = self.target.await_halt().await?;
        info!(
            "debugger attached, target paused at {:#010x}",
            report.registers.get(Register::Pc)
        );
        self.last_stop = Some(report);
        Ok(())
    }

    /// Process commands until one hands control to the target
    /// (`Ok(None)`) or the session ends.
    async fn interactive(&mut self) -> Result<Option<SessionEnd>, RspError> {
        self.state = SessionState::Interactive;
        loop {
            let payload = match self.conn.receive_packet().await? {
                Incoming::Packet(payload) => payload,
                Incoming::Corrupt => continue,
                Incoming::Closed => {
                    self.state = SessionState::Closed;
                    return Ok(Some(SessionEnd::Closed));
                }
            };

            match self.dispatch(&payload).await? {
                Flow::Reply(reply) => {
                    self.conn.send_ack(Some(&reply)).await?;
                    self.await_reply_ack(&reply).await?;
                }
                Flow::Resume => return Ok(None),
                Flow::Detach => {
                    self.state = SessionState::Detached;
                    return Ok(Some(SessionEnd::Detached));
                }
            }
        }
    }

    async fn dispatch(&mut self, payload: &str) -> Result<Flow, RspError> {
        let command = Command::parse(payload);
        debug!(?command, "dispatch");

        let reply = match command {
            Command::HaltReason => format!("S{STOP_SIGNAL:02x}"),
            Command::ExtendedMode | Command::SetThread => "OK".to_string(),
            Command::Query(query) => self.query(query).await,
            Command::Detach => {
                self.conn.send_ack(Some("OK")).await?;
                self.target.resume();
                return Ok(Flow::Detach);
            }
            Command::ReadRegisters => match self.target.read_registers().await {
                Ok(registers) => registers.dump(),
                Err(err) => target_failure(err),
            },
            Command::Continue => {
                self.target.resume();
                self.conn.send_ack(None).await?;
                return Ok(Flow::Resume);
            }
            Command::Step => {
                self.target.step();
                self.conn.send_ack(None).await?;
                return Ok(Flow::Resume);
            }
            Command::ReadRegister(index) => self.read_register(index).await,
            Command::ReadMemory { address, length } => {
                match self.target.read_memory(address, length).await {
                    Ok(bytes) => encode_hex(&bytes),
                    Err(err) => target_failure(err),
                }
            }
            Command::InsertBreakpoint(address) => self.insert_breakpoint(address).await,
            Command::RemoveBreakpoint(address) => self.remove_breakpoint(address).await,
            Command::ContActions => "vCont:".to_string(),
            Command::WriteMemory => {
                warn!("memory write not supported, discarding {payload:?}");
                "OK".to_string()
            }
            Command::Malformed(packet) => {
                warn!("malformed arguments in {packet:?}");
                E_MALFORMED.to_string()
            }
            Command::Unknown(packet) => {
                debug!("unsupported packet {packet:?}, replying empty");
                String::new()
            }
        };
        Ok(Flow::Reply(reply))
    }

    async fn query(&self, query: Query) -> String {
        match query {
            Query::CurrentThread => "QC0".to_string(),
            Query::Offsets => match self.target.entry_point().await {
                Some(entry) => format!("TextSeg={entry:08x}"),
                None => String::new(),
            },
            Query::Supported => SUPPORTED.to_string(),
            Query::Features => features_reply(),
            Query::TraceStatus => "T0".to_string(),
            Query::TraceList => String::new(),
            Query::FirstThreadInfo => "m0".to_string(),
            Query::NextThreadInfo => "l".to_string(),
            Query::Attached => "1".to_string(),
            Query::Symbol => "OK".to_string(),
            Query::Unknown(query) => {
                debug!("unsupported query {query:?}, replying empty");
                String::new()
            }
        }
    }

    async fn read_register(&self, index: usize) -> String {
        let Some(register) = Register::from_index(index) else {
            warn!(index, "register number out of range");
            return E_BAD_REGISTER.to_string();
        };
        match self.target.read_registers().await {
            Ok(registers) => registers.as_hex(register),
            Err(err) => target_failure(err),
        }
    }

    async fn insert_breakpoint(&mut self, address: u32) -> String {
        if self.breakpoints.contains(address) {
            return E_BREAKPOINT_STATE.to_string();
        }
        match self.target.insert_breakpoint(address).await {
            Ok(()) => {
                self.breakpoints.insert(address);
                debug!("breakpoint armed at {address:#010x}");
                "OK".to_string()
            }
            Err(err) => target_failure(err),
        }
    }

    async fn remove_breakpoint(&mut self, address: u32) -> String {
        if !self.breakpoints.contains(address) {
            return E_BREAKPOINT_STATE.to_string();
        }
        match self.target.remove_breakpoint(address).await {
            Ok(()) => {
                self.breakpoints.remove(address);
                debug!("breakpoint disarmed at {address:#010x}");
                "OK".to_string()
            }
            Err(err) => target_failure(err),
        }
    }

    /// Race the target halting on its own against the debugger's interrupt.
    ///
    /// The interrupt wait is cancel safe, so losing the race leaves the
    /// stream untouched. When the interrupt wins, the pending halt wait is
    /// kept and completes against the pause we request.
    async fn run_until_halt(&mut self) -> Result<StopReport, RspError> {
        self.state = SessionState::Running;
        let halt = self.target.await_halt();
        tokio::pin!(halt);

        let report = tokio::select! {
            biased;
            interrupt = self.conn.await_interrupt() => {
                interrupt?;
                info!("debugger interrupt, pausing target");
                self.target.interrupt();
                halt.await?
            }
            report = &mut halt => {
                debug!("target halted");
                report?
            }
        };

        self.state = SessionState::Interactive;
        Ok(report)
    }

    async fn report_stop(&mut self, report: StopReport) -> Result<(), RspError> {
        let reply = format!(
            "T{STOP_SIGNAL:02x}{}",
            report.registers.stop_reply_fields()
        );
        self.last_stop = Some(report);
        self.conn.send_packet(&reply).await?;
        self.await_reply_ack(&reply).await
    }

    /// Wait for `+`, resending `reply` on each `-`.
    async fn await_reply_ack(&mut self, reply: &str) -> Result<(), RspError> {
        let mut attempts = 0;
        while !self.conn.await_ack().await? {
            if attempts == MAX_RETRANSMITS {
                return Err(RspError::ReplyRejected(attempts));
            }
            attempts += 1;
            warn!(attempts, "debugger requested retransmission of {reply:?}");
            self.conn.send_packet(reply).await?;
        }
        Ok(())
    }
}

fn target_failure(err: TargetError) -> String {
    warn!("target rejected request: {err}");
    E_TARGET.to_string()
}

/// Serve one debugger connection against `target`.
pub async fn run_session<S, T>(stream: S, target: T) -> Result<SessionEnd, RspError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Target,
{
    Session::new(stream, target).run().await
}
