//! RSP transport layer: packet exchange and acknowledgments over a byte stream.
//!
//! The transport owns the stream for the lifetime of a session and never
//! looks inside payloads.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tracing::{trace, warn};

use crate::error::RspError;
use crate::packet::{decode_packet, encode_packet, ACK, INTERRUPT, NACK, PACKET_END, PACKET_START};

/// Outcome of waiting for a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A packet with a valid checksum.
    Packet(String),
    /// A packet failed its checksum; `-` was sent and the peer is expected
    /// to retransmit.
    Corrupt,
    /// The peer closed the stream between packets.
    Closed,
}

/// A debugger connection speaking RSP.
#[derive(Debug)]
pub struct RspConnection<S> {
    stream: BufStream<S>,
}

impl<S> RspConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a freshly accepted stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
        }
    }

    /// Wait for the next packet.
    ///
    /// End of stream before the `$` is a clean close; anything other than `$`
    /// is fatal. A checksum mismatch is answered with `-` and reported as
    /// [`Incoming::Corrupt`], never as a packet.
    pub async fn receive_packet(&mut self) -> Result<Incoming, RspError> {
        let Some(first) = self.read_byte().await? else {
            return Ok(Incoming::Closed);
        };
        if first != PACKET_START {
            return Err(RspError::UnexpectedStart(first));
        }

        let mut raw = vec![PACKET_START];
        self.stream.read_until(PACKET_END, &mut raw).await?;
        if raw.last() != Some(&PACKET_END) {
            return Err(RspError::ClosedDuring("reading packet payload"));
        }

        let mut digits = [0u8; 2];
        self.stream
            .read_exact(&mut digits)
            .await
            .map_err(closed_during("reading packet checksum"))?;
        raw.extend_from_slice(&digits);

        let frame = decode_packet(&raw)?;
        if !frame.is_valid() {
            warn!(
                payload = %frame.payload,
                transmitted = frame.transmitted,
                computed = frame.computed,
                "checksum mismatch, requesting retransmission"
            );
            self.send_nack(None).await?;
            return Ok(Incoming::Corrupt);
        }

        trace!("<- {:?}", frame.payload);
        Ok(Incoming::Packet(frame.payload))
    }

    /// Send a framed packet.
    pub async fn send_packet(&mut self, payload: &str) -> Result<(), RspError> {
        trace!("-> {payload:?}");
        self.write_frame(&encode_packet(payload)).await
    }

    /// Send `+`, optionally followed by a packet in the same write.
    pub async fn send_ack(&mut self, payload: Option<&str>) -> Result<(), RspError> {
        self.send_marker(ACK, payload).await
    }

    /// Send `-`, optionally followed by a packet in the same write.
    pub async fn send_nack(&mut self, payload: Option<&str>) -> Result<(), RspError> {
        self.send_marker(NACK, payload).await
    }

    /// Read one acknowledgment byte. Returns `true` for `+`, `false` for `-`.
    pub async fn await_ack(&mut self) -> Result<bool, RspError> {
        let byte = self
            .read_byte()
            .await?
            .ok_or(RspError::ClosedDuring("awaiting acknowledgment"))?;
        trace!("<- {:?}", byte as char);
        match byte {
            ACK => Ok(true),
            NACK => Ok(false),
            other => Err(RspError::UnexpectedAck(other)),
        }
    }

    /// Wait for the debugger's out-of-band interrupt byte (`0x03`).
    ///
    /// Cancel safe: dropping the future before it completes consumes nothing
    /// from the stream.
    pub async fn await_interrupt(&mut self) -> Result<(), RspError> {
        let byte = self
            .read_byte()
            .await?
            .ok_or(RspError::ClosedDuring("awaiting interrupt"))?;
        trace!("<- {byte:#04x}");
        if byte != INTERRUPT {
            return Err(RspError::UnexpectedInterrupt(byte));
        }
        Ok(())
    }

    async fn send_marker(&mut self, marker: u8, payload: Option<&str>) -> Result<(), RspError> {
        trace!("-> {:?}", marker as char);
        let mut buf = vec![marker];
        if let Some(payload) = payload {
            trace!("-> {payload:?}");
            buf.extend_from_slice(&encode_packet(payload));
        }
        self.write_frame(&buf).await
    }

    async fn write_frame(&mut self, bytes: &[u8]) -> Result<(), RspError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read a single byte; `None` at end of stream. `AsyncReadExt::read` is
    /// cancel safe, which `await_interrupt` relies on.
    async fn read_byte(&mut self) -> Result<Option<u8>, RspError> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte).await? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

fn closed_during(context: &'static str) -> impl FnOnce(io::Error) -> RspError {
    move |err| match err.kind() {
        io::ErrorKind::UnexpectedEof => RspError::ClosedDuring(context),
        _ => RspError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, DuplexStream};

    fn pair() -> (RspConnection<DuplexStream>, DuplexStream) {
        let (server, client) = duplex(1024);
        (RspConnection::new(server), client)
    }

    async fn read_available(client: &mut DuplexStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        client.read_exact(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn receive_valid_packet() {
        let (mut conn, mut client) = pair();
        client.write_all(b"$qSupported#37").await.unwrap();
        assert_eq!(
            conn.receive_packet().await.unwrap(),
            Incoming::Packet("qSupported".into())
        );
    }

    #[tokio::test]
    async fn receive_closed_stream() {
        let (mut conn, client) = pair();
        drop(client);
        assert_eq!(conn.receive_packet().await.unwrap(), Incoming::Closed);
    }

    #[tokio::test]
    async fn receive_corrupt_packet_sends_nack() {
        let (mut conn, mut client) = pair();
        client.write_all(b"$?#00").await.unwrap();
        assert_eq!(conn.receive_packet().await.unwrap(), Incoming::Corrupt);
        assert_eq!(read_available(&mut client, 1).await, b"-");
    }

    #[tokio::test]
    async fn receive_retransmission_after_corrupt_packet() {
        let (mut conn, mut client) = pair();
        client.write_all(b"$?#00$?#3f").await.unwrap();
        assert_eq!(conn.receive_packet().await.unwrap(), Incoming::Corrupt);
        assert_eq!(
            conn.receive_packet().await.unwrap(),
            Incoming::Packet("?".into())
        );
    }

    #[tokio::test]
    async fn receive_rejects_non_packet_start() {
        let (mut conn, mut client) = pair();
        client.write_all(b"hello").await.unwrap();
        let err = conn.receive_packet().await.unwrap_err();
        assert!(matches!(err, RspError::UnexpectedStart(b'h')));
    }

    #[tokio::test]
    async fn receive_rejects_malformed_checksum() {
        let (mut conn, mut client) = pair();
        client.write_all(b"$?#g1").await.unwrap();
        let err = conn.receive_packet().await.unwrap_err();
        assert!(matches!(err, RspError::MalformedChecksum(_)), "got: {err}");
    }

    #[tokio::test]
    async fn receive_truncated_packet_is_fatal() {
        let (mut conn, mut client) = pair();
        client.write_all(b"$qSupp").await.unwrap();
        drop(client);
        let err = conn.receive_packet().await.unwrap_err();
        assert!(matches!(err, RspError::ClosedDuring(_)), "got: {err}");
    }

    #[tokio::test]
    async fn send_packet_frames_payload() {
        let (mut conn, mut client) = pair();
        conn.send_packet("OK").await.unwrap();
        assert_eq!(read_available(&mut client, 6).await, b"$OK#9a");
    }

    #[tokio::test]
    async fn send_ack_with_packet_is_one_write() {
        let (mut conn, mut client) = pair();
        conn.send_ack(Some("S05")).await.unwrap();
        conn.send_ack(None).await.unwrap();
        conn.send_nack(None).await.unwrap();
        assert_eq!(read_available(&mut client, 10).await, b"+$S05#b8+-");
    }

    #[tokio::test]
    async fn await_ack_accepts_plus_and_minus() {
        let (mut conn, mut client) = pair();
        client.write_all(b"+-").await.unwrap();
        assert!(conn.await_ack().await.unwrap());
        assert!(!conn.await_ack().await.unwrap());
    }

    #[tokio::test]
    async fn await_ack_rejects_other_bytes() {
        let (mut conn, mut client) = pair();
        client.write_all(b"$").await.unwrap();
        let err = conn.await_ack().await.unwrap_err();
        assert!(matches!(err, RspError::UnexpectedAck(b'$')));
    }

    #[tokio::test]
    async fn await_ack_on_closed_stream() {
        let (mut conn, client) = pair();
        drop(client);
        let err = conn.await_ack().await.unwrap_err();
        assert!(matches!(err, RspError::ClosedDuring(_)));
    }

    #[tokio::test]
    async fn await_interrupt_requires_ctrl_c() {
        let (mut conn, mut client) = pair();
        client.write_all(&[0x03, b'x']).await.unwrap();
        conn.await_interrupt().await.unwrap();
        let err = conn.await_interrupt().await.unwrap_err();
        assert!(matches!(err, RspError::UnexpectedInterrupt(b'x')));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_interrupt_wait_consumes_nothing() {
        let (mut conn, mut client) = pair();

        tokio::select! {
            _ = conn.await_interrupt() => panic!("no byte was sent"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }

        client.write_all(b"$g#67").await.unwrap();
        assert_eq!(
            conn.receive_packet().await.unwrap(),
            Incoming::Packet("g".into())
        );
    }
}
