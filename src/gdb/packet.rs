//! GDB remote-serial-protocol wire framing: `$<payload>#<hh>` in, `+`/`-` plus
//! a framed reply out. Parsing is incremental so a connection handler can
//! feed it arbitrary TCP read chunks without assuming one packet per `read`.

/// Outcome of scanning a receive buffer for one complete `$...#hh` frame.
pub enum ExtractedFrame {
    /// Checksum matched; payload is the bytes between `$` and `#`.
    Valid(String),
    /// A complete frame was found but its checksum did not match.
    BadChecksum,
}

/// Modulo-256 sum of `data`, as GDB's RSP checksum is defined.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Wraps `payload` as `$<payload>#<hh>`.
pub fn frame(payload: &str) -> String {
    format!("${payload}#{:02x}", checksum(payload.as_bytes()))
}

/// Scans `buf` for the next complete frame, draining every byte up to and
/// including it (plus any leading garbage). Returns `None` if no complete
/// frame is present yet, in which case `buf` is left untouched except that
/// a buffer containing no `$` at all (pure noise, e.g. stray `+`/`-` acks)
/// is cleared since it can never yield a packet.
pub fn extract_frame(buf: &mut Vec<u8>) -> Option<ExtractedFrame> {
    let Some(dollar) = buf.iter().position(|&b| b == b'$') else {
        buf.clear();
        return None;
    };
    let hash = dollar + buf[dollar..].iter().position(|&b| b == b'#')?;
    // Need the two hex checksum digits to follow '#'.
    if buf.len() < hash + 3 {
        return None;
    }
    let payload = buf[dollar + 1..hash].to_vec();
    let checksum_str = std::str::from_utf8(&buf[hash + 1..hash + 3]).ok();
    let parsed = checksum_str.and_then(|s| u8::from_str_radix(s, 16).ok());
    let consumed = hash + 3;
    let result = match parsed {
        Some(cs) if cs == checksum(&payload) => {
            ExtractedFrame::Valid(String::from_utf8_lossy(&payload).into_owned())
        }
        _ => ExtractedFrame::BadChecksum,
    };
    buf.drain(0..consumed);
    Some(result)
}

/// Encodes `value` as `width` little-endian bytes in lowercase hex.
pub fn encode_hex_le(value: u32, width: usize) -> String {
    let bytes = value.to_le_bytes();
    bytes[..width].iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes a little-endian hex string (as produced by [`encode_hex_le`])
/// back into a `u32`. Returns 0 on malformed input rather than failing the
/// whole packet — a single bad register value should not wedge the session.
pub fn decode_hex_le(hex: &str) -> u32 {
    let mut bytes = [0u8; 4];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let Some(pair) = hex.get(i * 2..i * 2 + 2) else {
            break;
        };
        *byte = u8::from_str_radix(pair, 16).unwrap_or(0);
    }
    u32::from_le_bytes(bytes)
}
