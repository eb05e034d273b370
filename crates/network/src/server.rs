//! # Game Server Listener
//!
//! Accepts game connections and runs one task per connection.
//!
//! # Architecture
//!
//! 1. **TCP Listener** - bound through `socket2` so the backlog and address
//!    reuse can be set
//! 2. **Connection Map** - every live socket by [`ConnectionId`], in a
//!    `DashMap` shared with the connection tasks
//! 3. **Connection Context** - task queue, account store, RSA key and world
//!    state shared by all connections
//!
//! # Example
//!
//! ```rust,no_run
//! use ots_network::{ConnectionContext, GameServer};
//! use std::sync::Arc;
//!
//! # async fn demo(context: ConnectionContext) -> ots_core::Result<()> {
//! let server = GameServer::bind(Arc::new(context)).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::connection::{ConnectionContext, GameConnection};
use dashmap::DashMap;
use ots_core::{ConnectionId, OtsError, Result};
use ots_protocol::SessionState;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Grace period for connection tasks after the listener stops
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Game port listener
///
/// # Purpose
/// Owns the listening socket and the table of live connections.
///
/// # Shutdown
/// [`GameServer::run`] returns on Ctrl-C. Connection tasks keep running
/// until their sockets close or the runtime stops.
pub struct GameServer {
    listener: TcpListener,

    /// Key: connection id, Value: connection
    connections: Arc<DashMap<ConnectionId, Arc<GameConnection>>>,

    context: Arc<ConnectionContext>,

    next_id: AtomicU64,
}

impl GameServer {
    /// Bind the listener described by the context's network config
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the address
    /// cannot be bound.
    pub async fn bind(context: Arc<ConnectionContext>) -> Result<Self> {
        let config = &context.config;
        config
            .validate()
            .map_err(|e| OtsError::Config(format!("Invalid network configuration: {}", e)))?;

        let listener = listen(config.bind_address, config.listen_backlog).map_err(|e| {
            OtsError::Network(format!("Failed to bind to {}: {}", config.bind_address, e))
        })?;

        tracing::info!("Game server listening on {}", config.bind_address);
        tracing::info!("Configuration: max_connections={}", config.max_connections);

        Ok(Self {
            listener,
            connections: Arc::new(DashMap::new()),
            context,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Game server accepting connections");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((mut socket, addr)) => {
                            if self.connections.len() >= self.context.config.max_connections {
                                tracing::warn!(
                                    "Connection from {} rejected: {} sockets open",
                                    addr,
                                    self.connections.len()
                                );
                                let _ = socket.shutdown().await;
                                continue;
                            }

                            if let Err(e) = SockRef::from(&socket).set_keepalive(true) {
                                tracing::debug!("Keepalive not set for {}: {}", addr, e);
                            }
                            self.spawn_connection(socket, addr);
                        }
                        Err(e) => {
                            tracing::error!("Error accepting connection: {:?}", e);
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received, stopping listener");
                    break;
                }
            }
        }

        let remaining = self.connections.len();
        if remaining > 0 {
            tracing::info!("Waiting for {} connection tasks to finish", remaining);
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        }

        tracing::info!("Game server stopped");
        Ok(())
    }

    fn spawn_connection(&self, socket: tokio::net::TcpStream, addr: SocketAddr) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let connection = Arc::new(GameConnection::new(id, addr, Arc::clone(&self.context)));
        self.connections.insert(id, Arc::clone(&connection));
        tracing::info!("Connection {} accepted from {}", id.get(), addr);

        let connections = Arc::clone(&self.connections);
        tokio::spawn(async move {
            let result = connection.run(socket).await;
            connections.remove(&id);

            match result {
                Ok(()) => tracing::info!("Connection {} closed", id.get()),
                Err(e) => tracing::warn!("Connection {} failed: {}", id.get(), e),
            }
        });
    }

    /// Number of open sockets
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn get_connection(&self, id: ConnectionId) -> Option<Arc<GameConnection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of the connection table
    pub fn stats(&self) -> ServerStats {
        let mut stats = ServerStats::default();
        for entry in self.connections.iter() {
            let connection = entry.value();
            stats.connections += 1;
            if connection.state() != SessionState::Unauthenticated {
                stats.logged_in += 1;
            }
            stats.total_packets_received += connection.stats().received();
            stats.total_packets_sent += connection.stats().sent();
        }
        stats
    }
}

/// Bind a non-blocking listener with address reuse
fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as u32) as i32)?;
    TcpListener::from_std(socket.into())
}

/// Server statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Open sockets
    pub connections: usize,

    /// Sockets past the first message
    pub logged_in: usize,

    pub total_packets_received: u64,

    pub total_packets_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use futures::StreamExt;
    use ots_accounts::MemoryAccountStore;
    use ots_core::GameState;
    use ots_game::{TaskQueue, TaskReceiver};
    use parking_lot::RwLock;
    use tokio::net::TcpStream;
    use tokio_util::codec::Framed;

    fn context(max_connections: usize) -> (Arc<ConnectionContext>, TaskReceiver) {
        let (queue, receiver) = TaskQueue::new();
        let context = Arc::new(ConnectionContext {
            queue,
            accounts: Arc::new(MemoryAccountStore::new()),
            rsa: None,
            game_state: Arc::new(RwLock::new(GameState::Normal)),
            config: NetworkConfig {
                bind_address: "127.0.0.1:0".parse().unwrap(),
                max_connections,
                ..Default::default()
            },
        });
        (context, receiver)
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let (context, _receiver) = context(0);
        assert!(GameServer::bind(context).await.is_err());
    }

    #[tokio::test]
    async fn test_accepted_connection_gets_challenge() {
        let (context, _receiver) = context(10);
        let server = Arc::new(GameServer::bind(context).await.unwrap());
        let addr = server.local_addr().unwrap();
        let running = Arc::clone(&server);
        tokio::spawn(async move {
            let _ = running.run().await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Framed::new(stream, crate::codec::GameCodec::new());
        let mut challenge = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(challenge.get_u16(), 0x0006);
        assert_eq!(challenge.get_u8(), 0x1F);

        let stats = server.stats();
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.logged_in, 0);
    }
}
