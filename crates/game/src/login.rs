//! # Login Procedure
//!
//! Runs on the world context once the network context has validated the
//! first message and resolved a character. Each rejection sends its own
//! disconnect text; a full world queues the client instead of rejecting it.
//!
//! ## New character entering
//! 1. Preload the character and check name lock, closing/closed state,
//!    one-character-per-account and account bans
//! 2. Consult the wait list
//! 3. Load, place at the saved position or the temple, start accepting packets
//!
//! ## Character already online
//! A second login is refused unless replace-kick is enabled. With it, the
//! old connection is closed and the new one attaches to the same player
//! after [`RECONNECT_GRACE_MS`], or at once if the player had no connection.

use crate::composer::{MAGIC_EFFECT_POFF, MAGIC_EFFECT_TELEPORT};
use crate::dispatcher::{LoginRequest, WorldTask};
use crate::error::LoginRejection;
use crate::game::Game;
use crate::player::PlayerState;
use crate::session::GameSession;
use crate::waitlist::{WaitList, WaitListTicket};
use crate::world::{Creature, WorldView};
use ots_accounts::CharacterRecord;
use ots_core::{AccountId, AccountType, ConnectionId, CreatureId, CreatureKind, GameState, PlayerGuid, RECONNECT_GRACE_MS};
use ots_protocol::packet_builder::build_waiting_list;
use ots_protocol::{MessageClass, NetworkMessage, SessionState};
use std::time::Duration;

const CANNOT_LOGOUT_HERE: &str = "You can not logout here.";
const CANNOT_LOGOUT_IN_FIGHT: &str = "You may not logout during a fight.";

fn reject(mut session: GameSession, rejection: LoginRejection) {
    tracing::info!(connection = session.id().get(), "Login rejected: {:?}", rejection);
    session.disconnect_client(&rejection.to_string());
}

impl Game {
    /// Entry point of the login task
    pub(crate) fn login(&mut self, request: LoginRequest) {
        let LoginRequest {
            connection,
            guid,
            account_id,
            os,
            version,
        } = request;
        let session = GameSession::new(connection, os, version);

        match self.world.player_by_guid(guid) {
            Some(existing) if !self.settings.allow_clones => self.login_existing(session, existing),
            _ => {
                if let Err(rejection) = self.login_new(session, guid, account_id) {
                    tracing::debug!("Login of {} ended: {}", guid.get(), rejection);
                }
            }
        }
    }

    fn login_checks(&self, record: &CharacterRecord) -> Result<(), LoginRejection> {
        if self.accounts.is_namelocked(record.guid) {
            return Err(LoginRejection::Namelocked);
        }

        match self.game_state() {
            GameState::Closing if !record.can_always_login => return Err(LoginRejection::GoingDown),
            GameState::Closed if !record.can_always_login => return Err(LoginRejection::ServerClosed),
            _ => {}
        }

        if self.settings.one_player_on_account
            && record.account_type < AccountType::Gamemaster
            && !self.world.players_on_account(record.account_id).is_empty()
        {
            return Err(LoginRejection::OnePerAccount);
        }

        if !record.cannot_be_banned {
            if let Some(ban) = self.accounts.account_ban(record.account_id, Self::unix_now()) {
                return Err(LoginRejection::AccountBanned(ban));
            }
        }
        Ok(())
    }

    fn login_new(
        &mut self,
        mut session: GameSession,
        guid: PlayerGuid,
        account_id: AccountId,
    ) -> Result<(), LoginRejection> {
        let Some(record) = self
            .accounts
            .preload_character(guid)
            .filter(|record| record.account_id == account_id)
        else {
            reject(session, LoginRejection::CharacterLoadFailed);
            return Err(LoginRejection::CharacterLoadFailed);
        };

        if let Err(rejection) = self.login_checks(&record) {
            reject(session, rejection.clone());
            return Err(rejection);
        }

        let ticket = WaitListTicket {
            guid,
            premium: record.premium,
            bypass: record.can_always_login || record.is_privileged(),
        };
        let online = self.world.players_online();
        let now = self.now_ms();
        if let Some(slot) = self
            .wait_list
            .client_login(ticket, online, self.settings.max_players, now)
        {
            let retry = WaitList::wait_time(slot).min(u64::from(u8::MAX)) as u8;
            let mut msg = NetworkMessage::new();
            build_waiting_list(&mut msg, slot, retry);
            session.write(&msg);
            session.disconnect();
            return Ok(());
        }

        let Some(record) = self.accounts.load_character(guid) else {
            reject(session, LoginRejection::CharacterLoadFailed);
            return Err(LoginRejection::CharacterLoadFailed);
        };

        let id = self.ids.next(CreatureKind::Player);
        let mut creature = Creature::new(id, CreatureKind::Player, &record.name, record.login_position);
        creature.direction = record.direction;
        creature.outfit = record.outfit;
        creature.health = record.health;
        creature.max_health = record.max_health;
        creature.level = record.level;

        let vips = self.accounts.vip_entries(record.account_id);
        let mut player = PlayerState::from_record(id, &record, vips);
        player.os = session.os();
        player.extended_opcodes = session.os().supports_extended_opcodes();
        player.client = Some(session.id());

        let connection = session.id();
        let ip = session.connection().ip();
        session.attach(id);
        self.sessions.insert(session);
        self.world.add_player(creature, player);

        let placed = self
            .place_creature(id, record.login_position, Some(MAGIC_EFFECT_TELEPORT))
            .or_else(|_| self.place_creature(id, record.temple_position, Some(MAGIC_EFFECT_TELEPORT)));
        if placed.is_err() {
            self.world.remove_creature(id);
            if let Some(session) = self.sessions.remove(connection) {
                reject(session, LoginRejection::TemplePositionWrong);
            }
            return Err(LoginRejection::TemplePositionWrong);
        }

        let at = Self::unix_now();
        self.accounts.record_login(guid, ip, at);
        if let Some(player) = self.world.player_mut(id) {
            player.last_ip = ip;
            player.last_login = at.max(player.last_login + 1);
        }
        if let Some(session) = self.sessions.get_mut(connection) {
            session.accept_packets = true;
            session.connection().set_state(SessionState::Active);
        }

        tracing::info!("{} has logged in", record.name);
        self.notify_vip_status(guid, true);
        Ok(())
    }

    fn login_existing(&mut self, mut session: GameSession, existing: CreatureId) {
        let (old_client, connecting) = match self.world.player(existing) {
            Some(player) => (player.client, player.connecting),
            None => return reject(session, LoginRejection::CharacterLoadFailed),
        };

        if connecting || !self.settings.replace_kick_on_login {
            return reject(session, LoginRejection::AlreadyLoggedIn);
        }

        let connection = session.id();
        match old_client {
            Some(old) => {
                if let Some(mut old_session) = self.sessions.remove(old) {
                    old_session.detach();
                    old_session.disconnect();
                }
                if let Some(player) = self.world.player_mut(existing) {
                    player.client = None;
                    player.connecting = true;
                }

                session.pending_connect = true;
                self.sessions.insert(session);
                self.queue.enqueue_delayed(
                    WorldTask::Connect {
                        connection,
                        player: existing,
                    },
                    Duration::from_millis(RECONNECT_GRACE_MS),
                );
            }
            None => {
                self.sessions.insert(session);
                self.connect(connection, existing);
            }
        }
    }

    /// Attach a connection to a player already in the world
    pub(crate) fn connect(&mut self, connection: ConnectionId, player: CreatureId) {
        let Some(session) = self.sessions.get_mut(connection) else {
            // Released while waiting out the grace delay
            if let Some(state) = self.world.player_mut(player) {
                state.connecting = false;
            }
            return;
        };
        session.pending_connect = false;

        let available = self
            .world
            .player(player)
            .map(|state| state.client.is_none())
            .unwrap_or(false);
        if !available {
            if let Some(session) = self.sessions.remove(connection) {
                reject(session, LoginRejection::AlreadyLoggedIn);
            }
            return;
        }

        if session.is_disconnected() {
            self.sessions.remove(connection);
            if let Some(state) = self.world.player_mut(player) {
                state.connecting = false;
            }
            return;
        }

        let os = session.os();
        let ip = session.connection().ip();
        session.attach(player);

        let Some(state) = self.world.player_mut(player) else {
            return;
        };
        state.os = os;
        state.extended_opcodes = os.supports_extended_opcodes();
        state.connecting = false;
        state.client = Some(connection);
        state.last_ip = ip;
        let at = Self::unix_now().max(state.last_login + 1);
        state.last_login = at;
        let guid = state.guid;

        let world = &self.world;
        if let (Some(session), Some(pos)) = (
            self.sessions.get_mut(connection),
            world.creature(player).map(|creature| creature.position),
        ) {
            session.send_add_creature(world, player, pos, 0, None);
            session.accept_packets = true;
            session.connection().set_state(SessionState::Active);
        }
        self.accounts.record_login(guid, ip, at);
        tracing::info!(connection = connection.get(), "Player {} reconnected", player.get());
    }

    /// The connection's transport is gone
    pub(crate) fn release(&mut self, connection: ConnectionId) {
        let Some(mut session) = self.sessions.remove(connection) else {
            return;
        };
        if let Some(player) = session.detach() {
            if let Some(state) = self.world.player_mut(player) {
                if state.client == Some(connection) {
                    state.client = None;
                }
            }
        }
        tracing::debug!("Released session {}", connection.get());
    }

    /// Leave the world
    ///
    /// # Arguments
    /// * `display_effect` - Show the poff effect where the player stood
    /// * `forced` - Skip the no-logout tile and in-fight checks
    pub(crate) fn logout(&mut self, connection: ConnectionId, display_effect: bool, forced: bool) {
        let Some(player) = self.sessions.get(connection).and_then(GameSession::player) else {
            return;
        };
        let Some(creature) = self.world.creature(player) else {
            return;
        };

        if !creature.removed {
            let pos = creature.position;
            let ghost = creature.ghost;
            let (access, in_fight, dead) = self
                .world
                .player(player)
                .map(|state| (state.is_access(), state.in_fight, state.dead))
                .unwrap_or_default();
            let flags = self.world.tile(pos).map(|tile| tile.flags).unwrap_or_default();

            if !forced && !access {
                let refusal = if flags.no_logout {
                    Some(CANNOT_LOGOUT_HERE)
                } else if !flags.protection_zone && in_fight {
                    Some(CANNOT_LOGOUT_IN_FIGHT)
                } else {
                    None
                };
                if let Some(refusal) = refusal {
                    if let Some(session) = self.sessions.get_mut(connection) {
                        session.send_text_message(MessageClass::StatusSmall, refusal);
                    }
                    return;
                }
            }

            if display_effect && !dead && !ghost {
                self.add_magic_effect(pos, MAGIC_EFFECT_POFF);
            }
        }

        if let Some(mut session) = self.sessions.remove(connection) {
            session.detach();
            session.disconnect();
        }
        self.remove_creature(player);
    }
}
