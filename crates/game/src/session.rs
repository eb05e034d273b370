//! # Game Session
//!
//! World-side half of one client connection. The network task owns the
//! socket; the world loop owns the [`GameSession`], which holds the player
//! identity, the known-creature set and the pending output. The two halves
//! talk through a [`ConnectionHandle`]: an outbound channel plus the shared
//! decoder state gate.

use crate::visibility::KnownCreatures;
use ots_core::{ClientOs, ConnectionId, CreatureId};
use ots_protocol::packet_builder::build_disconnect;
use ots_protocol::{NetworkMessage, SessionState, HEADER_LENGTH, MAX_MESSAGE_SIZE};
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Largest body batched into one outbound message, leaving room for framing
const MAX_OUTPUT_BODY: usize = MAX_MESSAGE_SIZE - HEADER_LENGTH - 16;

/// Work for the network task of a connection
#[derive(Debug)]
pub enum Outbound {
    Message(NetworkMessage),
    /// Flush what was sent so far, then close the socket
    Close,
}

/// Handle the world context keeps for a connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    ip: Option<IpAddr>,
    tx: mpsc::UnboundedSender<Outbound>,
    state: Arc<Mutex<SessionState>>,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnectionId,
        ip: Option<IpAddr>,
        tx: mpsc::UnboundedSender<Outbound>,
        state: Arc<Mutex<SessionState>>,
    ) -> Self {
        Self { id, ip, tx, state }
    }

    /// Handle plus the receiving end the network task drains
    pub fn channel(id: ConnectionId, ip: Option<IpAddr>) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self::new(id, ip, tx, Arc::new(Mutex::new(SessionState::Unauthenticated)));
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    /// Queue a message; `false` once the network task is gone
    pub fn send(&self, msg: NetworkMessage) -> bool {
        self.tx.send(Outbound::Message(msg)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// The network task has dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    /// Shared gate read by the decoder
    pub fn state_gate(&self) -> Arc<Mutex<SessionState>> {
        Arc::clone(&self.state)
    }
}

/// World-side state of one connection
#[derive(Debug)]
pub struct GameSession {
    connection: ConnectionHandle,
    player: Option<CreatureId>,
    pub(crate) os: ClientOs,
    pub(crate) version: u16,
    pub(crate) accept_packets: bool,
    /// A replacing login waits for the reconnect grace delay
    pub(crate) pending_connect: bool,
    pub(crate) known: KnownCreatures,
    output: NetworkMessage,
    disconnected: bool,
}

impl GameSession {
    pub fn new(connection: ConnectionHandle, os: ClientOs, version: u16) -> Self {
        Self {
            connection,
            player: None,
            os,
            version,
            accept_packets: false,
            pending_connect: false,
            known: KnownCreatures::new(),
            output: NetworkMessage::new(),
            disconnected: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn player(&self) -> Option<CreatureId> {
        self.player
    }

    pub fn os(&self) -> ClientOs {
        self.os
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn accepts_packets(&self) -> bool {
        self.accept_packets
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected || self.connection.is_closed()
    }

    pub(crate) fn attach(&mut self, player: CreatureId) {
        self.player = Some(player);
    }

    /// Drop the player identity; queued work for this session becomes a no-op
    pub(crate) fn detach(&mut self) -> Option<CreatureId> {
        self.accept_packets = false;
        self.player.take()
    }

    /// Append a complete message to the pending output
    pub(crate) fn write(&mut self, msg: &NetworkMessage) {
        if self.disconnected || msg.is_empty() {
            return;
        }
        if !self.output.is_empty() && self.output.len() + msg.len() > MAX_OUTPUT_BODY {
            self.flush();
        }
        self.output.append(msg);
    }

    /// Hand the pending output to the network task
    pub fn flush(&mut self) -> bool {
        if self.output.is_empty() {
            return false;
        }
        let output = std::mem::take(&mut self.output);
        self.connection.send(output)
    }

    /// Send `message` in a disconnect box, then close the connection
    pub fn disconnect_client(&mut self, message: &str) {
        let mut msg = NetworkMessage::new();
        build_disconnect(&mut msg, message);
        self.write(&msg);
        self.disconnect();
    }

    /// Flush and close without a message
    pub fn disconnect(&mut self) {
        if self.disconnected {
            return;
        }
        self.flush();
        self.disconnected = true;
        self.accept_packets = false;
        self.connection.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (GameSession, mpsc::UnboundedReceiver<Outbound>) {
        let (handle, rx) = ConnectionHandle::channel(ConnectionId::new(1), None);
        (GameSession::new(handle, ClientOs::WINDOWS, 860), rx)
    }

    #[test]
    fn test_output_is_batched_until_flush() {
        let (mut session, mut rx) = session();
        let mut msg = NetworkMessage::new();
        msg.add_u8(0x1E);
        session.write(&msg);
        session.write(&msg);
        assert!(rx.try_recv().is_err());

        assert!(session.flush());
        match rx.try_recv() {
            Ok(Outbound::Message(batch)) => assert_eq!(batch.body(), &[0x1E, 0x1E]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!session.flush());
    }

    #[test]
    fn test_disconnect_client_sends_message_then_close() {
        let (mut session, mut rx) = session();
        session.disconnect_client("You are already logged in.");

        match rx.try_recv() {
            Ok(Outbound::Message(batch)) => assert_eq!(batch.body()[0], 0x14),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Ok(Outbound::Close)));
        assert!(session.is_disconnected());

        // Nothing is written after the close
        let mut msg = NetworkMessage::new();
        msg.add_u8(0x1E);
        session.write(&msg);
        assert!(!session.flush());
    }

    #[test]
    fn test_state_gate_is_shared() {
        let (handle, _rx) = ConnectionHandle::channel(ConnectionId::new(2), None);
        let gate = handle.state_gate();
        handle.set_state(SessionState::Active);
        assert_eq!(*gate.lock(), SessionState::Active);
    }
}
