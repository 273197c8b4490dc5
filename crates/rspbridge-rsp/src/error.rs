//! RSP error types.

use thiserror::Error;

use crate::target::TargetError;

/// Errors that end a debugging session.
///
/// Everything here is fatal: the protocol invariant is broken (or the stream
/// is gone) and the session terminates. Recoverable conditions such as a
/// checksum mismatch or a rejected breakpoint never surface as an `RspError`.
#[derive(Debug, Error)]
pub enum RspError {
    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A packet did not start with `$`.
    #[error("unexpected leading byte {0:#04x}, peer is not speaking RSP")]
    UnexpectedStart(u8),

    /// The two checksum characters after `#` were not hex digits.
    #[error("malformed checksum: {0:?}")]
    MalformedChecksum(String),

    /// An acknowledgment byte other than `+` or `-`.
    #[error("unexpected acknowledgment byte {0:#04x}")]
    UnexpectedAck(u8),

    /// A byte other than `0x03` while waiting for an interrupt.
    #[error("unexpected interrupt byte {0:#04x}")]
    UnexpectedInterrupt(u8),

    /// The debugger did not open the session with `+`.
    #[error("handshake rejected by debugger")]
    HandshakeRejected,

    /// The debugger kept answering `-` to the same reply.
    #[error("reply rejected after {0} retransmissions")]
    ReplyRejected(u32),

    /// The peer closed the stream in the middle of an exchange.
    #[error("connection closed while {0}")]
    ClosedDuring(&'static str),

    /// The target could not produce a stop report.
    #[error("target failure: {0}")]
    Target(#[from] TargetError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_unexpected_start_display() {
        let err = RspError::UnexpectedStart(b'x');
        assert_eq!(
            err.to_string(),
            "unexpected leading byte 0x78, peer is not speaking RSP"
        );
    }

    #[test]
    fn error_malformed_checksum_display() {
        let err = RspError::MalformedChecksum("zz".into());
        assert_eq!(err.to_string(), "malformed checksum: \"zz\"");
    }

    #[test]
    fn error_unexpected_ack_display() {
        let err = RspError::UnexpectedAck(b'$');
        assert_eq!(err.to_string(), "unexpected acknowledgment byte 0x24");
    }

    #[test]
    fn error_unexpected_interrupt_display() {
        let err = RspError::UnexpectedInterrupt(0x04);
        assert_eq!(err.to_string(), "unexpected interrupt byte 0x04");
    }

    #[test]
    fn error_closed_during_display() {
        let err = RspError::ClosedDuring("awaiting acknowledgment");
        assert_eq!(
            err.to_string(),
            "connection closed while awaiting acknowledgment"
        );
    }

    #[test]
    fn error_reply_rejected_display() {
        let err = RspError::ReplyRejected(3);
        assert_eq!(err.to_string(), "reply rejected after 3 retransmissions");
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let err: RspError = io_err.into();
        assert!(matches!(err, RspError::Io(_)));
        assert!(err.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_from_target_error() {
        let err: RspError = TargetError::Disconnected.into();
        assert!(matches!(err, RspError::Target(TargetError::Disconnected)));
    }
}
