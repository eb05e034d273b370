//! # Session Manager
//!
//! This module keeps every [`GameSession`] owned by the world context.

use crate::session::GameSession;
use ots_core::{ConnectionId, CreatureId};
use std::collections::HashMap;

/// Session Manager
///
/// # Purpose
/// Tracks the world-side half of every logged-in connection and answers the
/// reverse lookup from a player to the connection controlling it.
///
/// # Ownership
/// Only the world context touches the manager; network tasks reach a session
/// by enqueuing a task that names its [`ConnectionId`].
#[derive(Debug, Default)]
pub struct SessionManager {
    /// Key: connection id, Value: session
    sessions: HashMap<ConnectionId, GameSession>,
}

impl SessionManager {
    /// Create a new session manager
    ///
    /// # Returns
    /// An empty manager ready to track sessions
    pub fn new() -> Self {
        tracing::debug!("Creating SessionManager");
        Self::default()
    }

    /// Add a session, replacing any session with the same connection id
    pub fn insert(&mut self, session: GameSession) {
        tracing::debug!("Adding session {}", session.id().get());
        self.sessions.insert(session.id(), session);
    }

    /// Remove a session
    ///
    /// # Returns
    /// The session if it was registered
    pub fn remove(&mut self, id: ConnectionId) -> Option<GameSession> {
        tracing::debug!("Removing session {}", id.get());
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&GameSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut GameSession> {
        self.sessions.get_mut(&id)
    }

    /// Session currently attached to `player`
    pub fn by_player(&self, player: CreatureId) -> Option<ConnectionId> {
        self.sessions
            .values()
            .find(|session| session.player() == Some(player))
            .map(GameSession::id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GameSession> {
        self.sessions.values_mut()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.sessions.keys().copied().collect()
    }

    /// Hand every session's pending output to its network task
    pub fn flush_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.flush();
        }
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
