//! # Login Handshake
//!
//! Wire side of the game login: the challenge the server sends on connect
//! and the RSA-protected first message the client answers with.
//!
//! ## Challenge
//! ```text
//! {u32 adler32}{u16 6}{0x1F}{u32 timestamp}{u8 random}
//! ```
//! The checksum covers the eight bytes after it and is written last, by
//! seeking back over the reserved space.
//!
//! ## First message
//! ```text
//! {0x0A}{u16 os}{u16 version}{rsa block:
//!     {0x00}{u32 key[4]}{u8 gamemaster}{str account}{str character}
//!     {str password}{u32 timestamp}{u8 random}{padding}}
//! ```

use crate::checksum::adler32;
use crate::codecs::NetworkMessage;
use crate::error::{ProtocolError, Result};
use crate::packets::ServerOpcode;
use crate::rsa::{RsaDecryptor, RSA_BLOCK_SIZE};
use crate::xtea::XteaKey;
use ots_core::{ClientOs, GAME_PROTOCOL_ID};

/// Values the client must echo back in its first message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge {
    pub timestamp: u32,
    pub random: u8,
}

impl Challenge {
    pub fn new(timestamp: u32, random: u8) -> Self {
        Self { timestamp, random }
    }

    /// Build the unencrypted challenge body
    pub fn to_message(&self) -> NetworkMessage {
        let mut msg = NetworkMessage::new();
        msg.skip_bytes(4);
        msg.add_u16(0x0006);
        msg.add_u8(ServerOpcode::Challenge.as_u8());
        msg.add_u32(self.timestamp);
        msg.add_u8(self.random);

        msg.skip_bytes(-12);
        let checksum = msg.written_range(4, 8).map(adler32).unwrap_or_default();
        msg.add_u32(checksum);
        msg
    }

    /// True if the client echoed this challenge
    pub fn matches(&self, timestamp: u32, random: u8) -> bool {
        self.timestamp == timestamp && self.random == random
    }
}

/// Decoded first message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstMessage {
    pub os: ClientOs,
    pub version: u16,
    pub xtea_key: XteaKey,
    pub account_name: String,
    pub character_name: String,
    pub password: String,
    pub timestamp: u32,
    pub random: u8,
}

/// Parse the first message of a game connection
///
/// # Arguments
/// * `msg` - Frame body with any checksum already stripped
/// * `rsa` - Server private key
///
/// # Returns
/// The decoded fields. Only a wrong protocol id or a failed RSA block is an
/// error; truncated credentials decode as empty strings and are rejected by
/// the login checks that follow.
pub fn parse_first_message(msg: &mut NetworkMessage, rsa: &dyn RsaDecryptor) -> Result<FirstMessage> {
    let protocol_id = msg.get_u8();
    if protocol_id != GAME_PROTOCOL_ID {
        return Err(ProtocolError::UnknownProtocol(protocol_id));
    }

    let os = ClientOs(msg.get_u16());
    let version = msg.get_u16();

    if msg.is_overrun() || msg.remaining() < RSA_BLOCK_SIZE {
        return Err(ProtocolError::RsaBlockTooShort);
    }
    let block = msg
        .take_slice_mut(RSA_BLOCK_SIZE)
        .ok_or(ProtocolError::RsaBlockTooShort)?;
    rsa.decrypt_block(block)?;
    if block[0] != 0 {
        return Err(ProtocolError::RsaDecrypt);
    }
    // Continue reading inside the decrypted block
    msg.skip_bytes(-(RSA_BLOCK_SIZE as isize) + 1);

    let xtea_key = XteaKey::new([msg.get_u32(), msg.get_u32(), msg.get_u32(), msg.get_u32()]);
    msg.skip_bytes(1); // gamemaster flag

    let account_name = msg.get_string();
    let character_name = msg.get_string();
    let password = msg.get_string();
    let timestamp = msg.get_u32();
    let random = msg.get_u8();

    Ok(FirstMessage {
        os,
        version,
        xtea_key,
        account_name,
        character_name,
        password,
        timestamp,
        random,
    })
}
