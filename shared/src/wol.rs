//! Wake-on-LAN packet codec
//!
//! The wake packet is the de-facto standard "magic packet":
//! ```text
//! [ 6 bytes: 0xFF ][ 16 x 6 bytes: target hardware address ]
//! ```
//!
//! Hardware addresses are accepted in colon (`AA:BB:CC:DD:EE:FF`), hyphen
//! (`AA-BB-CC-DD-EE-FF`), dotted (`AABB.CCDD.EEFF`) or bare hex notation.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Length of a hardware (MAC) address in bytes
pub const MAC_LEN: usize = 6;

/// Number of times the address is repeated after the sync stream
pub const MAC_REPETITIONS: usize = 16;

/// Total size of an encoded wake packet
pub const MAGIC_PACKET_LEN: usize = MAC_LEN + MAC_LEN * MAC_REPETITIONS;

/// Broadcast ports the packet is sent to (discard and echo)
pub const BROADCAST_PORTS: [u16; 2] = [9, 7];

/// Port used for the direct unicast copy sent to the device host
pub const UNICAST_PORT: u16 = 9;

/// Errors that can occur while parsing a hardware address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WolError {
    #[error("MAC address must contain exactly 12 hex digits, got {0:?}")]
    InvalidLength(String),

    #[error("MAC address contains non-hex characters: {0:?}")]
    InvalidDigit(String),
}

/// Normalize a hardware address to 12 upper-case hex characters
pub fn normalize_mac(input: &str) -> Result<String, WolError> {
    let stripped: String = input
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
        .collect();

    if !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WolError::InvalidDigit(input.to_string()));
    }

    if stripped.len() != MAC_LEN * 2 {
        return Err(WolError::InvalidLength(input.to_string()));
    }

    Ok(stripped.to_ascii_uppercase())
}

/// Parse a hardware address into its six raw bytes
pub fn parse_mac(input: &str) -> Result<[u8; MAC_LEN], WolError> {
    let normalized = normalize_mac(input)?;
    let mut mac = [0u8; MAC_LEN];

    for (i, byte) in mac.iter_mut().enumerate() {
        let pair = &normalized[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|_| WolError::InvalidDigit(input.to_string()))?;
    }

    Ok(mac)
}

/// Build the wake packet for raw address bytes
pub fn magic_packet(mac: &[u8; MAC_LEN]) -> Bytes {
    let mut buf = BytesMut::with_capacity(MAGIC_PACKET_LEN);

    // Sync stream
    buf.put_bytes(0xFF, MAC_LEN);

    for _ in 0..MAC_REPETITIONS {
        buf.put_slice(mac);
    }

    buf.freeze()
}

/// Parse an address string and encode its wake packet
pub fn encode(mac: &str) -> Result<Bytes, WolError> {
    Ok(magic_packet(&parse_mac(mac)?))
}
