//! # OTS Networking Layer
//!
//! Tokio-based network context of the game server: one task per client
//! connection that frames, decrypts and decodes client messages and hands
//! them to the world loop as [`ots_game::WorldTask`]s.
//!
//! ## Modules
//!
//! - [`config`] - Listener and connection limits
//! - [`codec`] - Frame codec with optional XTEA
//! - [`handshake`] - Checks on the first message before login
//! - [`connection`] - Per-connection task
//! - [`server`] - Listener and connection table

pub mod codec;
pub mod config;
pub mod connection;
pub mod handshake;
pub mod server;

// Re-export commonly used items
pub use codec::GameCodec;
pub use config::NetworkConfig;
pub use connection::{ConnectionContext, ConnectionStats, GameConnection};
pub use handshake::{LoginGate, Refusal};
pub use server::{GameServer, ServerStats};
