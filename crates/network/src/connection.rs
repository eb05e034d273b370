//! # Game Connection
//!
//! Network half of one client connection. Each connection runs in its own
//! Tokio task; it reads frames, decrypts and decodes them, and hands the
//! resulting commands to the world loop. It never touches world state.
//!
//! # Lifecycle
//!
//! ```text
//! accept -> challenge -> first message -> Authenticating -> Active -> close
//!                             |                                  |
//!                          refused                        Release task
//! ```
//!
//! The decoder gate ([`SessionState`]) is shared with the world-side
//! [`ConnectionHandle`]: the login procedure moves it to `Active`, death or
//! removal moves it to `RemovedOrDead`.
//!
//! # Output
//!
//! The world loop pushes [`Outbound`] items into an unbounded channel; the
//! connection task frames and writes them in order. [`Outbound::Close`]
//! ends the task after everything queued before it was written.

use crate::codec::GameCodec;
use crate::config::NetworkConfig;
use crate::handshake::{LoginGate, Refusal};
use futures::{SinkExt, StreamExt};
use ots_accounts::AccountStore;
use ots_core::{ConnectionId, GameState, Result};
use ots_game::{ConnectionHandle, LoginRequest, Outbound, SharedGameState, TaskQueue, WorldTask};
use ots_protocol::packet_builder::{build_disconnect, build_extended_opcode_announcement};
use ots_protocol::{
    parse_first_message, Challenge, DecodeContext, Dispatch, NetworkMessage, OpcodeTable, RsaDecryptor,
    SessionState, Urgency,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

type Reader = FramedRead<OwnedReadHalf, GameCodec>;
type Writer = FramedWrite<OwnedWriteHalf, GameCodec>;

/// Collaborators shared by every connection of a listener
pub struct ConnectionContext {
    pub queue: TaskQueue,
    pub accounts: Arc<dyn AccountStore>,
    /// Server private key; `None` refuses every login
    pub rsa: Option<Arc<dyn RsaDecryptor>>,
    pub game_state: SharedGameState,
    pub config: NetworkConfig,
}

/// Message counters of one connection
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub packets_received: AtomicU64,
    pub packets_sent: AtomicU64,
}

impl ConnectionStats {
    pub fn received(&self) -> u64 {
        self.packets_received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }
}

/// Individual game connection
///
/// # Purpose
/// Owns the socket of one client from accept to close: sends the login
/// challenge, judges the first message, then shuttles frames between the
/// socket and the world loop.
///
/// # Thread Safety
/// The server keeps an `Arc` of every connection for its statistics; only
/// the connection's own task drives [`GameConnection::run`].
pub struct GameConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    state: Arc<Mutex<SessionState>>,
    stats: ConnectionStats,
    context: Arc<ConnectionContext>,
    connected_at: Instant,
}

impl GameConnection {
    pub fn new(id: ConnectionId, peer_addr: SocketAddr, context: Arc<ConnectionContext>) -> Self {
        tracing::debug!("New connection {}: {}", id.get(), peer_addr);
        Self {
            id,
            peer_addr,
            state: Arc::new(Mutex::new(SessionState::Unauthenticated)),
            stats: ConnectionStats::default(),
            context,
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Current decoder gate
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Run the connection until either side closes it
    ///
    /// # Lifecycle
    /// ```text
    /// 1. Send the challenge
    /// 2. Wait for the first message, judge it
    /// 3. Queue the login on the world loop
    /// 4. Decode frames and write world output until close
    /// 5. Queue the release of the session
    /// ```
    ///
    /// # Errors
    /// Socket write failures. Protocol violations close the connection
    /// without an error.
    pub async fn run(&self, stream: TcpStream) -> Result<()> {
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, GameCodec::new());
        let mut writer = FramedWrite::new(write_half, GameCodec::new());

        let challenge = Challenge::new(unix_now() as u32, rand::random());
        self.send(&mut writer, challenge.to_message()).await?;

        let handshake = tokio::time::timeout(self.context.config.handshake_timeout, reader.next()).await;
        let first = match handshake {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(err))) => {
                tracing::debug!("Connection {} sent a bad first frame: {}", self.id.get(), err);
                return Ok(());
            }
            Ok(None) => return Ok(()),
            Err(_) => {
                tracing::debug!("Connection {} never sent a first message", self.id.get());
                return Ok(());
            }
        };
        self.stats.packets_received.fetch_add(1, Ordering::Relaxed);

        let Some(outbound) = self
            .accept_first_message(first, challenge, &mut reader, &mut writer)
            .await?
        else {
            let _ = writer.close().await;
            return Ok(());
        };

        let result = self.serve(&mut reader, &mut writer, outbound).await;

        let release = WorldTask::Release { connection: self.id };
        if self.context.queue.enqueue(release, Urgency::Normal).is_err() {
            tracing::debug!("World loop gone; release of {} dropped", self.id.get());
        }
        let _ = writer.close().await;
        result
    }

    //=== Handshake ===//

    /// Judge the first message and queue the login
    ///
    /// # Returns
    /// The outbound receiver of the new session, or `None` if the connection
    /// should close. Refusals with a text have already sent it.
    async fn accept_first_message(
        &self,
        mut msg: NetworkMessage,
        challenge: Challenge,
        reader: &mut Reader,
        writer: &mut Writer,
    ) -> Result<Option<mpsc::UnboundedReceiver<Outbound>>> {
        let game_state = *self.context.game_state.read();
        if game_state == GameState::Shutdown {
            return Ok(None);
        }

        let Some(rsa) = self.context.rsa.as_deref() else {
            tracing::warn!("No RSA key configured; refusing login from {}", self.peer_addr);
            return Ok(None);
        };

        let first = match parse_first_message(&mut msg, rsa) {
            Ok(first) => first,
            Err(err) => {
                tracing::debug!("Connection {} first message refused: {}", self.id.get(), err);
                return Ok(None);
            }
        };

        reader.decoder_mut().install_key(first.xtea_key);
        writer.encoder_mut().install_key(first.xtea_key);

        if first.os.supports_extended_opcodes() {
            let mut announcement = NetworkMessage::new();
            build_extended_opcode_announcement(&mut announcement);
            self.send(writer, announcement).await?;
        }

        let gate = LoginGate {
            challenge,
            game_state,
            ip: Some(self.peer_addr.ip()),
            accounts: self.context.accounts.as_ref(),
            now: unix_now(),
        };
        let credentials = match gate.check(&first) {
            Ok(credentials) => credentials,
            Err(Refusal::Silent) => return Ok(None),
            Err(Refusal::Rejected(rejection)) => {
                tracing::info!("Login from {} rejected: {}", self.peer_addr, rejection);
                let mut refusal = NetworkMessage::new();
                build_disconnect(&mut refusal, &rejection.to_string());
                self.send(writer, refusal).await?;
                return Ok(None);
            }
        };

        *self.state.lock() = SessionState::Authenticating;
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ConnectionHandle::new(self.id, Some(self.peer_addr.ip()), tx, Arc::clone(&self.state));
        let request = LoginRequest {
            connection,
            guid: credentials.character,
            account_id: credentials.account_id,
            os: first.os,
            version: first.version,
        };
        self.context.queue.enqueue(WorldTask::Login(request), Urgency::Normal)?;

        tracing::debug!(
            "Connection {} authenticated as character {}",
            self.id.get(),
            credentials.character.get()
        );
        Ok(Some(rx))
    }

    //=== Session ===//

    async fn serve(
        &self,
        reader: &mut Reader,
        writer: &mut Writer,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
    ) -> Result<()> {
        let table = OpcodeTable::standard();
        let mut ctx = DecodeContext::default();
        let idle_timeout = self.context.config.idle_timeout;
        let idle = tokio::time::sleep(idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                frame = reader.next() => {
                    let mut msg = match frame {
                        Some(Ok(msg)) => msg,
                        Some(Err(err)) => {
                            tracing::warn!("Connection {} protocol violation: {}", self.id.get(), err);
                            return Ok(());
                        }
                        None => {
                            tracing::info!("Connection {} closed by client", self.id.get());
                            return Ok(());
                        }
                    };
                    self.stats.packets_received.fetch_add(1, Ordering::Relaxed);
                    idle.as_mut().reset(tokio::time::Instant::now() + idle_timeout);

                    if *self.context.game_state.read() == GameState::Shutdown {
                        continue;
                    }

                    let state = self.state();
                    match table.decode_packet(state, &mut msg, &mut ctx) {
                        Dispatch::Enqueue { command, urgency } => {
                            let task = WorldTask::Command { connection: self.id, command };
                            if self.context.queue.enqueue(task, urgency).is_err() {
                                tracing::warn!("World loop gone; closing connection {}", self.id.get());
                                return Ok(());
                            }
                        }
                        Dispatch::Ignore => {}
                        Dispatch::Close => {
                            tracing::debug!("Connection {} closed by protocol", self.id.get());
                            return Ok(());
                        }
                    }
                }

                item = outbound.recv() => match item {
                    Some(Outbound::Message(msg)) => self.send(writer, msg).await?,
                    Some(Outbound::Close) | None => {
                        tracing::debug!("Connection {} closed by the world", self.id.get());
                        return Ok(());
                    }
                },

                _ = &mut idle => {
                    tracing::info!("Connection {} timed out", self.id.get());
                    return Ok(());
                }
            }
        }
    }

    async fn send(&self, writer: &mut Writer, msg: NetworkMessage) -> Result<()> {
        writer.send(msg).await?;
        self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ots_accounts::MemoryAccountStore;
    use ots_core::{AccountType, ClientOs, Position};
    use ots_game::TaskReceiver;
    use ots_protocol::checksum::adler32;
    use ots_protocol::{Command, XteaKey, RSA_BLOCK_SIZE};
    use parking_lot::RwLock;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    const KEY: XteaKey = XteaKey::new([0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444]);

    /// Treats the key block as already decrypted
    struct PlainBlock;

    impl RsaDecryptor for PlainBlock {
        fn decrypt_block(&self, _block: &mut [u8]) -> ots_protocol::Result<()> {
            Ok(())
        }
    }

    type Client = Framed<TcpStream, GameCodec>;

    async fn start() -> (Client, TaskReceiver) {
        let accounts = MemoryAccountStore::new();
        accounts.add_account("tester", "secret", AccountType::Normal, false).unwrap();
        accounts
            .add_character("tester", "Knight", Position::new(100, 100, 7))
            .unwrap();

        let (queue, receiver) = TaskQueue::new();
        let context = Arc::new(ConnectionContext {
            queue,
            accounts: Arc::new(accounts),
            rsa: Some(Arc::new(PlainBlock)),
            game_state: Arc::new(RwLock::new(GameState::Normal)),
            config: NetworkConfig::default(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            let connection = GameConnection::new(ConnectionId::new(1), peer, context);
            let _ = connection.run(stream).await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        (Framed::new(stream, GameCodec::new()), receiver)
    }

    async fn next_frame(client: &mut Client) -> Option<NetworkMessage> {
        tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .map(|frame| frame.unwrap())
    }

    async fn next_task(receiver: &mut TaskReceiver) -> WorldTask {
        tokio::time::timeout(Duration::from_secs(5), receiver.next())
            .await
            .unwrap()
            .unwrap()
    }

    /// Read the challenge and answer it
    async fn handshake(client: &mut Client, version: u16) {
        answer_challenge(client, version, 0).await;
    }

    /// Answer the challenge with its random byte shifted by `skew`
    async fn answer_challenge(client: &mut Client, version: u16, skew: u8) {
        let mut challenge = next_frame(client).await.unwrap();
        assert_eq!(challenge.get_u16(), 0x0006);
        assert_eq!(challenge.get_u8(), 0x1F);
        let timestamp = challenge.get_u32();
        let random = challenge.get_u8().wrapping_add(skew);

        let mut block = NetworkMessage::new();
        block.add_u8(0);
        for word in KEY.words() {
            block.add_u32(word);
        }
        block.add_u8(0);
        block.add_string("tester");
        block.add_string("Knight");
        block.add_string("secret");
        block.add_u32(timestamp);
        block.add_u8(random);
        block.add_padding(RSA_BLOCK_SIZE - block.len());

        let mut first = NetworkMessage::new();
        first.add_u8(0x0A);
        first.add_u16(ClientOs::WINDOWS.0);
        first.add_u16(version);
        first.append(&block);
        first.prepend_u32(adler32(first.body()));

        client.send(first).await.unwrap();
        client.codec_mut().install_key(KEY);
    }

    #[tokio::test]
    async fn test_login_commands_and_release() {
        let (mut client, mut receiver) = start().await;
        handshake(&mut client, 860).await;

        let request = match next_task(&mut receiver).await {
            WorldTask::Login(request) => request,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(request.os, ClientOs::WINDOWS);
        assert_eq!(request.connection.state(), SessionState::Authenticating);

        let mut greeting = NetworkMessage::new();
        greeting.add_bytes(&[0x1E]);
        assert!(request.connection.send(greeting));
        assert_eq!(next_frame(&mut client).await.unwrap().body(), &[0x1E]);

        request.connection.set_state(SessionState::Active);
        let mut ping = NetworkMessage::new();
        ping.add_u8(0x1E);
        client.send(ping).await.unwrap();
        match next_task(&mut receiver).await {
            WorldTask::Command { connection, command } => {
                assert_eq!(connection, ConnectionId::new(1));
                assert_eq!(command, Command::ReceivePing);
            }
            other => panic!("unexpected {:?}", other),
        }

        drop(client);
        assert!(matches!(
            next_task(&mut receiver).await,
            WorldTask::Release { connection } if connection == ConnectionId::new(1)
        ));
    }

    #[tokio::test]
    async fn test_wrong_version_gets_encrypted_refusal() {
        let (mut client, _receiver) = start().await;
        handshake(&mut client, 854).await;

        let mut refusal = next_frame(&mut client).await.unwrap();
        assert_eq!(refusal.get_u8(), 0x14);
        assert_eq!(refusal.get_string(), "Only clients with protocol 8.60 allowed!");
        assert!(next_frame(&mut client).await.is_none());
    }

    #[tokio::test]
    async fn test_stale_challenge_closes_silently() {
        let (mut client, mut receiver) = start().await;
        answer_challenge(&mut client, 860, 1).await;

        let parts = client.into_parts();
        assert!(parts.read_buf.is_empty());
        let mut stream = parts.io;
        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);

        // No login reaches the world
        let task = tokio::time::timeout(Duration::from_millis(200), receiver.next()).await;
        assert!(!matches!(task, Ok(Some(WorldTask::Login(_)))));
    }

    #[tokio::test]
    async fn test_game_opcodes_ignored_until_active() {
        let (mut client, mut receiver) = start().await;
        handshake(&mut client, 860).await;
        let request = match next_task(&mut receiver).await {
            WorldTask::Login(request) => request,
            other => panic!("unexpected {:?}", other),
        };

        let mut ping = NetworkMessage::new();
        ping.add_u8(0x1E);
        client.send(ping).await.unwrap();

        let mut close = NetworkMessage::new();
        close.add_u8(0x0F);
        client.send(close).await.unwrap();

        // the ping was gated; the close opcode ends the connection
        assert!(matches!(next_task(&mut receiver).await, WorldTask::Release { .. }));
        drop(request);
    }

    #[tokio::test]
    async fn test_world_close_ends_connection() {
        let (mut client, mut receiver) = start().await;
        handshake(&mut client, 860).await;
        let request = match next_task(&mut receiver).await {
            WorldTask::Login(request) => request,
            other => panic!("unexpected {:?}", other),
        };

        let mut farewell = NetworkMessage::new();
        farewell.add_u8(0x14);
        farewell.add_string("bye");
        request.connection.send(farewell);
        request.connection.close();

        let mut msg = next_frame(&mut client).await.unwrap();
        assert_eq!(msg.get_u8(), 0x14);
        assert_eq!(msg.get_string(), "bye");
        assert!(next_frame(&mut client).await.is_none());
        assert!(matches!(next_task(&mut receiver).await, WorldTask::Release { .. }));
    }
}
