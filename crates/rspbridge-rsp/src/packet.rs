//! RSP packet framing: `$<payload>#<checksum>`.
//!
//! Pure functions shared by the send and receive paths so that the checksum
//! written on the wire and the checksum required to accept a packet are
//! always computed the same way.

use crate::error::RspError;

/// Start-of-packet marker.
pub const PACKET_START: u8 = b'$';
/// End-of-payload marker, followed by two checksum digits.
pub const PACKET_END: u8 = b'#';
/// Positive acknowledgment.
pub const ACK: u8 = b'+';
/// Negative acknowledgment (retransmit request).
pub const NACK: u8 = b'-';
/// Out-of-band interrupt sent by the debugger while the target runs.
pub const INTERRUPT: u8 = 0x03;

/// A frame taken apart by [`decode_packet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The payload between `$` and `#`.
    pub payload: String,
    /// The checksum transmitted by the peer.
    pub transmitted: u8,
    /// The checksum recomputed over the payload.
    pub computed: u8,
}

impl Frame {
    /// Whether the transmitted checksum matches the payload.
    pub fn is_valid(&self) -> bool {
        self.transmitted == self.computed
    }
}

/// Sum of the payload bytes modulo 256.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Frame a payload as `$<payload>#<xx>`.
pub fn encode_packet(payload: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 4);
    buf.push(PACKET_START);
    buf.extend_from_slice(payload.as_bytes());
    buf.push(PACKET_END);
    buf.extend_from_slice(format!("{:02x}", checksum(payload.as_bytes())).as_bytes());
    buf
}

/// Decode a complete frame (`$…#xx`).
///
/// Fails on a missing start marker, a missing end marker or checksum digits
/// that are not hex. A checksum *mismatch* is not an error: check
/// [`Frame::is_valid`].
pub fn decode_packet(data: &[u8]) -> Result<Frame, RspError> {
    let (&first, rest) = data
        .split_first()
        .ok_or(RspError::ClosedDuring("reading packet start"))?;
    if first != PACKET_START {
        return Err(RspError::UnexpectedStart(first));
    }

    let end = rest
        .iter()
        .position(|&b| b == PACKET_END)
        .ok_or(RspError::ClosedDuring("reading packet payload"))?;
    let (body, tail) = rest.split_at(end);
    let digits = tail.get(1..3).ok_or_else(|| {
        RspError::MalformedChecksum(String::from_utf8_lossy(&tail[1..]).into_owned())
    })?;

    Ok(Frame {
        payload: String::from_utf8_lossy(body).into_owned(),
        transmitted: parse_checksum(digits)?,
        computed: checksum(body),
    })
}

/// Parse the two checksum digits that follow `#`.
pub fn parse_checksum(digits: &[u8]) -> Result<u8, RspError> {
    let text = std::str::from_utf8(digits)
        .map_err(|_| RspError::MalformedChecksum(String::from_utf8_lossy(digits).into_owned()))?;
    if text.len() != 2 {
        return Err(RspError::MalformedChecksum(text.to_string()));
    }
    u8::from_str_radix(text, 16).map_err(|_| RspError::MalformedChecksum(text.to_string()))
}

/// Encode bytes as lowercase hex, two digits per byte.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Parse a hex number as sent by the debugger (no prefix, any case,
/// any number of leading zeros).
pub fn parse_hex(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let significant = text.trim_start_matches('0');
    if significant.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(significant, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_sums_bytes_modulo_256() {
        assert_eq!(checksum(b""), 0);
        assert_eq!(checksum(b"?"), 0x3f);
        assert_eq!(checksum(b"OK"), 0x9a);
        // 3 * 0xff = 0x2fd -> 0xfd
        assert_eq!(checksum(&[0xff, 0xff, 0xff]), 0xfd);
    }

    #[test]
    fn encode_known_packets() {
        assert_eq!(encode_packet("OK"), b"$OK#9a".to_vec());
        assert_eq!(encode_packet("S05"), b"$S05#b8".to_vec());
        assert_eq!(encode_packet(""), b"$#00".to_vec());
    }

    #[test]
    fn encode_then_decode_preserves_payload() {
        for payload in ["", "?", "qSupported:multiprocess+;xmlRegisters=i386", "m1000,4"] {
            let frame = decode_packet(&encode_packet(payload)).unwrap();
            assert_eq!(frame.payload, payload);
            assert!(frame.is_valid());
        }
    }

    #[test]
    fn decode_reports_mismatch_without_failing() {
        let frame = decode_packet(b"$?#00").unwrap();
        assert_eq!(frame.payload, "?");
        assert_eq!(frame.transmitted, 0);
        assert_eq!(frame.computed, 0x3f);
        assert!(!frame.is_valid());
    }

    #[test]
    fn decode_accepts_uppercase_checksum() {
        let frame = decode_packet(b"$OK#9A").unwrap();
        assert!(frame.is_valid());
    }

    #[test]
    fn decode_rejects_wrong_start() {
        let err = decode_packet(b"+OK#9a").unwrap_err();
        assert!(matches!(err, RspError::UnexpectedStart(b'+')));
    }

    #[test]
    fn decode_rejects_non_hex_checksum() {
        let err = decode_packet(b"$OK#zz").unwrap_err();
        assert!(matches!(err, RspError::MalformedChecksum(_)), "got: {err}");
    }

    #[test]
    fn decode_rejects_short_checksum() {
        let err = decode_packet(b"$OK#9").unwrap_err();
        assert!(matches!(err, RspError::MalformedChecksum(_)), "got: {err}");
    }

    #[test]
    fn decode_rejects_missing_end_marker() {
        let err = decode_packet(b"$OK").unwrap_err();
        assert!(matches!(err, RspError::ClosedDuring(_)), "got: {err}");
    }

    #[test]
    fn hex_encoding_is_fixed_width() {
        assert_eq!(encode_hex(&[0x00, 0x0a, 0xff]), "000aff");
        assert_eq!(encode_hex(&[]), "");
    }

    #[test]
    fn parse_hex_normalizes_formatting() {
        assert_eq!(parse_hex("1000"), Some(0x1000));
        assert_eq!(parse_hex("00001000"), Some(0x1000));
        assert_eq!(parse_hex("aBcD"), Some(0xabcd));
        assert_eq!(parse_hex("0"), Some(0));
        assert_eq!(parse_hex("000000000000000000001"), Some(1));
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("xyz"), None);
        assert_eq!(parse_hex("0x10"), None);
    }
}
