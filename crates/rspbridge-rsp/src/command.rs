//! Decoding packet payloads into commands.

use crate::packet::parse_hex;

/// A general query (`q…` packet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `qC`: current thread id.
    CurrentThread,
    /// `qOffsets`: section relocation offsets.
    Offsets,
    /// `qSupported[:…]`: feature negotiation.
    Supported,
    /// `qXfer:features:read:…`: target description.
    Features,
    /// `qTStatus`: trace experiment status.
    TraceStatus,
    /// `qTfV` / `qTfP`: trace state variables and tracepoints.
    TraceList,
    /// `qfThreadInfo`: first chunk of the thread list.
    FirstThreadInfo,
    /// `qsThreadInfo`: subsequent chunks of the thread list.
    NextThreadInfo,
    /// `qAttached`: attached to an existing process?
    Attached,
    /// `qSymbol::`: debugger ready to serve symbol lookups.
    Symbol,
    /// Any query the bridge does not know.
    Unknown(String),
}

impl Query {
    fn parse(body: &str) -> Self {
        match body {
            "C" => Query::CurrentThread,
            "Offsets" => Query::Offsets,
            "TStatus" => Query::TraceStatus,
            "TfV" | "TfP" => Query::TraceList,
            "fThreadInfo" => Query::FirstThreadInfo,
            "sThreadInfo" => Query::NextThreadInfo,
            "Attached" => Query::Attached,
            "Symbol::" => Query::Symbol,
            _ if body.starts_with("Supported") => Query::Supported,
            _ if body.starts_with("Xfer:features:read:") => Query::Features,
            _ => Query::Unknown(body.to_string()),
        }
    }
}

/// A command decoded from a packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `?`: why did the target halt?
    HaltReason,
    /// `!`: enable extended mode.
    ExtendedMode,
    /// `q…`: general query.
    Query(Query),
    /// `D`: detach and let the target run.
    Detach,
    /// `H…`: select the thread for subsequent operations.
    SetThread,
    /// `g`: read all registers.
    ReadRegisters,
    /// `c[addr]`: continue.
    Continue,
    /// `s[addr]`: single step.
    Step,
    /// `p<n>`: read one register.
    ReadRegister(usize),
    /// `m<addr>,<len>`: read memory.
    ReadMemory {
        /// First address.
        address: u32,
        /// Number of bytes.
        length: usize,
    },
    /// `Z0,<addr>,<kind>`: insert a software breakpoint.
    InsertBreakpoint(u32),
    /// `z0,<addr>,<kind>`: remove a software breakpoint.
    RemoveBreakpoint(u32),
    /// `vCont?`: which `vCont` actions are supported.
    ContActions,
    /// `X<addr>,<len>:<data>`: binary memory write, accepted and discarded.
    WriteMemory,
    /// A recognized command whose arguments could not be parsed.
    Malformed(String),
    /// Anything else, including other `v` packets.
    Unknown(String),
}

impl Command {
    /// Decode a packet payload.
    pub fn parse(payload: &str) -> Self {
        let Some(first) = payload.chars().next() else {
            return Command::Unknown(String::new());
        };
        let rest = &payload[first.len_utf8()..];

        match first {
            '?' => Command::HaltReason,
            '!' => Command::ExtendedMode,
            'q' => Command::Query(Query::parse(rest)),
            'D' => Command::Detach,
            'H' => Command::SetThread,
            'g' if rest.is_empty() => Command::ReadRegisters,
            'c' => Command::Continue,
            's' => Command::Step,
            'p' => parse_hex(rest)
                .and_then(|n| usize::try_from(n).ok())
                .map_or_else(|| Command::Malformed(payload.to_string()), Command::ReadRegister),
            'm' => parse_read_memory(rest).unwrap_or_else(|| Command::Malformed(payload.to_string())),
            'Z' | 'z' if rest.starts_with('0') => match parse_breakpoint(rest) {
                Some(address) if first == 'Z' => Command::InsertBreakpoint(address),
                Some(address) => Command::RemoveBreakpoint(address),
                None => Command::Malformed(payload.to_string()),
            },
            'v' if payload == "vCont?" => Command::ContActions,
            'X' => Command::WriteMemory,
            _ => Command::Unknown(payload.to_string()),
        }
    }

    /// Whether this command hands control to the target.
    pub fn resumes_target(&self) -> bool {
        matches!(self, Command::Continue | Command::Step)
    }
}

fn parse_address(text: &str) -> Option<u32> {
    parse_hex(text).and_then(|a| u32::try_from(a).ok())
}

/// `<addr>,<len>`
fn parse_read_memory(args: &str) -> Option<Command> {
    let (address, length) = args.split_once(',')?;
    Some(Command::ReadMemory {
        address: parse_address(address)?,
        length: usize::try_from(parse_hex(length)?).ok()?,
    })
}

/// `0,<addr>,<kind>[;cond…]`
fn parse_breakpoint(args: &str) -> Option<u32> {
    let mut fields = args.split(',');
    if fields.next()? != "0" {
        return None;
    }
    let address = parse_address(fields.next()?)?;
    let kind = fields.next()?;
    let kind = kind.split(';').next().unwrap_or(kind);
    parse_hex(kind)?;
    Some(address)
}
