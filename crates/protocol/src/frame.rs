//! # Transport Framing
//!
//! Every message on the wire is `{u16 length}{body}`. Once a session key is
//! known the body becomes `{u32 adler32}{xtea({u16 inner length}{payload}{padding})}`
//! with the checksum computed over the encrypted bytes.

use crate::checksum::adler32;
use crate::codecs::NetworkMessage;
use crate::error::{ProtocolError, Result};
use crate::xtea::{XteaKey, XTEA_BLOCK_BYTES};
use bytes::BytesMut;

/// Size of the little-endian length prefix
pub const LENGTH_PREFIX: usize = 2;
/// Size of the checksum that leads an encrypted body
pub const CHECKSUM_LENGTH: usize = 4;

/// Drop a leading checksum if it matches the rest of the body
///
/// A body whose first four bytes are not a valid checksum is returned
/// unchanged and decoded as an unchecksummed message.
pub fn strip_checksum(body: &[u8]) -> &[u8] {
    if body.len() < CHECKSUM_LENGTH {
        return body;
    }
    let (head, rest) = body.split_at(CHECKSUM_LENGTH);
    let claimed = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
    if claimed == adler32(rest) {
        rest
    } else {
        body
    }
}

/// Turn a received frame body into a message ready for decoding
///
/// # Arguments
/// * `body` - The frame without its length prefix
/// * `key` - Session key, `None` before the first message was accepted
///
/// # Returns
/// The plaintext payload. Fails on misaligned ciphertext or an inner length
/// larger than the decrypted data.
pub fn open(body: &[u8], key: Option<&XteaKey>) -> Result<NetworkMessage> {
    let payload = strip_checksum(body);
    let Some(key) = key else {
        return Ok(NetworkMessage::from_body(payload));
    };

    if payload.len() % XTEA_BLOCK_BYTES != 0 {
        return Err(ProtocolError::BlockAlignment(payload.len()));
    }

    let mut plain = payload.to_vec();
    key.decrypt_in_place(&mut plain)?;

    if plain.len() < LENGTH_PREFIX {
        return Err(ProtocolError::InnerLength {
            inner: 0,
            available: plain.len(),
        });
    }
    let inner = u16::from_le_bytes([plain[0], plain[1]]) as usize;
    let available = plain.len() - LENGTH_PREFIX;
    if inner > available {
        return Err(ProtocolError::InnerLength { inner, available });
    }

    Ok(NetworkMessage::from_body(
        &plain[LENGTH_PREFIX..LENGTH_PREFIX + inner],
    ))
}

/// Frame an outbound message, encrypting it when a key is present
///
/// # Errors
/// [`ProtocolError::FrameTooLarge`] if a length field would not fit in 16 bits.
pub fn seal(msg: &NetworkMessage, key: Option<&XteaKey>) -> Result<BytesMut> {
    let Some(key) = key else {
        let mut framed = BytesMut::with_capacity(LENGTH_PREFIX + msg.len());
        framed.extend_from_slice(&length_field(msg.len())?.to_le_bytes());
        framed.extend_from_slice(msg.body());
        return Ok(framed);
    };

    let mut out = NetworkMessage::new();
    out.add_u16(length_field(msg.len())?);
    out.append(msg);
    let padding = (XTEA_BLOCK_BYTES - out.len() % XTEA_BLOCK_BYTES) % XTEA_BLOCK_BYTES;
    out.add_padding(padding);

    key.encrypt_in_place(out.body_mut())?;
    let checksum = adler32(out.body());
    out.prepend_u32(checksum);
    out.prepend_u16(length_field(out.len())?);

    Ok(BytesMut::from(out.body()))
}

fn length_field(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| ProtocolError::FrameTooLarge(len))
}
