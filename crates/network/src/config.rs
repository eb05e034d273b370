//! # Network Configuration
//!
//! Listener and per-connection limits for the game port.
//!
//! # Example
//!
//! ```rust
//! use ots_network::NetworkConfig;
//! use std::time::Duration;
//!
//! let config = NetworkConfig {
//!     bind_address: "127.0.0.1:7172".parse().unwrap(),
//!     max_connections: 200,
//!     idle_timeout: Duration::from_secs(30),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Standard game port of 8.60 servers
pub const DEFAULT_GAME_PORT: u16 = 7172;

/// Network layer options
///
/// # Fields
///
/// - `bind_address`: Address and port of the game listener
/// - `max_connections`: Sockets beyond this are closed on accept
/// - `idle_timeout`: A connection that sends nothing for this long is closed
/// - `handshake_timeout`: Time allowed between the challenge and the first message
/// - `listen_backlog`: Pending connection queue of the listening socket
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent sockets
    ///
    /// # Notes
    /// - Counts every socket, logged in or not
    /// - The world's player limit is enforced separately by the wait list
    pub max_connections: usize,

    pub idle_timeout: Duration,

    pub handshake_timeout: Duration,

    pub listen_backlog: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_GAME_PORT)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(10),
            listen_backlog: 1024,
        }
    }
}

impl NetworkConfig {
    /// Validate the configuration
    ///
    /// # Returns
    /// `Ok(())` if configuration is valid, `Err(String)` otherwise
    ///
    /// # Checks
    /// - `max_connections` must be > 0
    /// - `handshake_timeout` must not exceed `idle_timeout`
    /// - `listen_backlog` must be > 0
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        if self.handshake_timeout > self.idle_timeout {
            return Err("handshake_timeout must not exceed idle_timeout".to_string());
        }

        if self.listen_backlog == 0 {
            return Err("listen_backlog must be > 0".to_string());
        }

        Ok(())
    }
}
