//! # OTS Protocol Library
//!
//! Wire-level pieces of the 8.60 game protocol with byte-exact compatibility
//! with the stock client.
//!
//! ## Architecture
//!
//! The protocol is organized into several layers:
//!
//! ### 1. Codecs Layer ([`codecs`])
//! [`NetworkMessage`], a growable buffer with a read/write cursor and a
//! header reservation:
//! - little-endian `u8`/`u16`/`u32`/`u64`
//! - strings: `u16` length + Latin-1 bytes
//! - positions: `u16 x`, `u16 y`, `u8 z`
//! - items: client id plus an optional subtype byte
//!
//! Reads never fail; reading past the end sets an overrun flag instead.
//!
//! ### 2. Transport ([`frame`], [`checksum`], [`xtea`], [`rsa`])
//! Length prefix, adler32 checksum and XTEA encryption of every message
//! after the first, and the RSA block that carries the session key.
//!
//! ### 3. Opcodes ([`packets`])
//! The client-to-server and server-to-client opcode namespaces.
//!
//! ### 4. Decoding ([`decoder`], [`commands`], [`login`])
//! The opcode table, the session gate and the [`Command`] values handed to
//! the world loop; the challenge and first-message handshake.
//!
//! ### 5. Building ([`packet_builder`])
//! Server-to-client messages that need no viewport knowledge.

pub mod checksum;
pub mod codecs;
pub mod commands;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod login;
pub mod packet_builder;
pub mod packets;
pub mod rsa;
pub mod xtea;

pub use codecs::{fluid_to_client, ItemDescriptor, NetworkMessage, HEADER_LENGTH, MAX_MESSAGE_SIZE};
pub use commands::{Command, FightMode, Urgency};
pub use decoder::{DecodeContext, Dispatch, OpcodeHandler, OpcodeTable, SessionState};
pub use error::{ProtocolError, Result};
pub use login::{parse_first_message, Challenge, FirstMessage};
pub use packets::{ClientOpcode, MessageClass, ServerOpcode};
pub use rsa::{RsaDecryptor, RsaKey, RSA_BLOCK_SIZE};
pub use xtea::XteaKey;
