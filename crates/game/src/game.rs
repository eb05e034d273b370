//! # World Context
//!
//! [`Game`] owns the world, every [`GameSession`] and the NPC agents. It runs
//! on one task and applies [`WorldTask`]s one at a time, so nothing inside it
//! needs a lock. Network tasks only see the [`TaskQueue`] and the shared
//! [`GameState`].
//!
//! The broadcast helpers here decide which sessions and NPCs hear about a
//! world change; the composer decides what each session's client is sent.

use crate::dispatcher::{TaskQueue, TaskReceiver, WorldTask};
use crate::error::Result;
use crate::manager::SessionManager;
use crate::player::{PlayerState, ShopSession};
use crate::session::GameSession;
use crate::state::WorldState;
use crate::visibility::{can_see, can_see_position, stackpos_for};
use crate::waitlist::WaitList;
use crate::world::{Creature, WorldView};
use ots_accounts::AccountStore;
use ots_core::{
    ConnectionId, CreatureId, CreatureIdAllocator, GameState, PlayerGuid, Position, SpeakClass,
    MAX_CLIENT_VIEWPORT_X, MAX_CLIENT_VIEWPORT_Y,
};
use ots_scripting::{CallbackRef, NpcAgent, ShopItem, ShopRequest, ShopRequestQueue, Spectator};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// World lifecycle state shared with the network context
pub type SharedGameState = Arc<RwLock<GameState>>;

/// Interval between NPC think ticks
pub const THINK_INTERVAL: Duration = Duration::from_millis(1000);

/// Login policy switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    /// 0 means unlimited
    pub max_players: usize,
    pub allow_clones: bool,
    pub replace_kick_on_login: bool,
    pub one_player_on_account: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_players: 900,
            allow_clones: false,
            replace_kick_on_login: true,
            one_player_on_account: true,
        }
    }
}

/// The world-mutation context
pub struct Game {
    pub(crate) world: WorldState,
    pub(crate) sessions: SessionManager,
    pub(crate) npcs: HashMap<CreatureId, NpcAgent>,
    pub(crate) wait_list: WaitList,
    pub(crate) settings: GameSettings,
    pub(crate) accounts: Arc<dyn AccountStore>,
    pub(crate) ids: Arc<CreatureIdAllocator>,
    pub(crate) queue: TaskQueue,
    state: SharedGameState,
    shop_requests: ShopRequestQueue,
    statement_id: u32,
    started: Instant,
}

impl Game {
    pub fn new(
        world: WorldState,
        settings: GameSettings,
        accounts: Arc<dyn AccountStore>,
        queue: TaskQueue,
        state: SharedGameState,
    ) -> Self {
        Self {
            world,
            sessions: SessionManager::new(),
            npcs: HashMap::new(),
            wait_list: WaitList::new(),
            settings,
            accounts,
            ids: Arc::new(CreatureIdAllocator::new()),
            queue,
            state,
            shop_requests: ShopRequestQueue::new(),
            statement_id: 0,
            started: Instant::now(),
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn ids(&self) -> Arc<CreatureIdAllocator> {
        Arc::clone(&self.ids)
    }

    /// Queue scripts push shop open/close requests into
    pub fn shop_requests(&self) -> ShopRequestQueue {
        self.shop_requests.clone()
    }

    pub fn game_state(&self) -> GameState {
        *self.state.read()
    }

    pub fn set_game_state(&self, state: GameState) {
        tracing::info!("Game state: {:?}", state);
        *self.state.write() = state;
    }

    /// Milliseconds since the world context started, for the wait list
    pub(crate) fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Wall clock in Unix seconds, for bans and login bookkeeping
    pub(crate) fn unix_now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0)
    }

    pub(crate) fn next_statement_id(&mut self) -> u32 {
        self.statement_id = self.statement_id.wrapping_add(1);
        self.statement_id
    }

    //=== Loop ===//

    /// Apply one task, then hand every session's output to its network task
    pub fn handle_task(&mut self, task: WorldTask) {
        match task {
            WorldTask::Login(request) => self.login(request),
            WorldTask::Connect { connection, player } => self.connect(connection, player),
            WorldTask::Command { connection, command } => self.handle_command(connection, command),
            WorldTask::Release { connection } => self.release(connection),
            WorldTask::Think => self.think(),
        }
        self.sessions.flush_all();
    }

    /// Run until every task sender is gone
    pub async fn run(mut self, mut receiver: TaskReceiver) {
        tracing::info!("World loop started");
        if self.game_state() == GameState::Startup {
            self.set_game_state(GameState::Normal);
        }

        let mut think = tokio::time::interval(THINK_INTERVAL);
        loop {
            tokio::select! {
                task = receiver.next() => match task {
                    Some(task) => self.handle_task(task),
                    None => break,
                },
                _ = think.tick() => self.handle_task(WorldTask::Think),
            }
        }

        tracing::info!("World loop stopped");
    }

    //=== Lookups ===//

    /// Session controlling `player`, through the player's back-reference
    pub(crate) fn session_of(&self, player: CreatureId) -> Option<ConnectionId> {
        let connection = self.world.player(player)?.client?;
        self.sessions.get(connection).map(GameSession::id)
    }

    /// Run `f` against the session controlling `player`, if any
    pub(crate) fn with_session(&mut self, player: CreatureId, f: impl FnOnce(&mut GameSession, &WorldState)) {
        let Some(connection) = self.session_of(player) else {
            return;
        };
        if let Some(session) = self.sessions.get_mut(connection) {
            f(session, &self.world);
        }
    }

    pub(crate) fn npcs_near(&mut self, pos: Position) -> impl Iterator<Item = &mut NpcAgent> {
        self.npcs
            .values_mut()
            .filter(move |npc| npc.position().is_in_range(&pos, MAX_CLIENT_VIEWPORT_X, MAX_CLIENT_VIEWPORT_Y))
    }

    /// Stack position of `creature` for every session that sees it
    pub(crate) fn stackpos_snapshot(&self, creature: CreatureId) -> HashMap<ConnectionId, usize> {
        let mut snapshot = HashMap::new();
        for id in self.sessions.ids() {
            let observer = self
                .sessions
                .get(id)
                .and_then(GameSession::player)
                .and_then(|viewer| self.world.observer(viewer));
            if let Some(stackpos) = observer.and_then(|observer| stackpos_for(&self.world, &observer, creature)) {
                snapshot.insert(id, stackpos);
            }
        }
        snapshot
    }

    //=== Broadcasts ===//

    /// Put a registered creature on the map and tell everyone who sees it
    pub fn place_creature(&mut self, id: CreatureId, pos: Position, effect: Option<u8>) -> Result<()> {
        self.world.place_creature(id, pos)?;
        let is_player = self.world.creature(id).map(Creature::is_player).unwrap_or(false);

        let stackpos = self.stackpos_snapshot(id);
        let world = &self.world;
        for session in self.sessions.iter_mut() {
            if let Some(&stackpos) = stackpos.get(&session.id()) {
                session.send_add_creature(world, id, pos, stackpos, effect);
            }
        }

        if let Some(npc) = self.npcs.get_mut(&id) {
            npc.set_position(pos);
        }
        for npc in self.npcs_near(pos) {
            npc.on_creature_appear(id, is_player);
        }
        Ok(())
    }

    /// Add an NPC to the world at `pos`
    pub fn add_npc(&mut self, creature: Creature, agent: NpcAgent) -> Result<()> {
        let (id, pos) = (creature.id, creature.position);
        self.world.add_creature(creature);
        self.npcs.insert(id, agent);
        self.place_creature(id, pos, None)
    }

    /// Move a creature and tell everyone who saw either end of the move
    pub fn move_creature(&mut self, id: CreatureId, to: Position, teleport: bool) -> Result<()> {
        let old_stackpos = self.stackpos_snapshot(id);
        let from = self.world.move_creature(id, to)?;
        let new_stackpos = self.stackpos_snapshot(id);
        let is_player = self.world.creature(id).map(Creature::is_player).unwrap_or(false);

        let world = &self.world;
        for session in self.sessions.iter_mut() {
            let old = old_stackpos.get(&session.id()).copied();
            let new = new_stackpos.get(&session.id()).copied();
            if old.is_none() && new.is_none() {
                continue;
            }
            session.send_move_creature(
                world,
                id,
                to,
                new.unwrap_or_default(),
                from,
                old.unwrap_or_default(),
                teleport,
            );
        }

        for npc in self.npcs.values_mut() {
            let near = |pos: Position| npc.position().is_in_range(&pos, MAX_CLIENT_VIEWPORT_X, MAX_CLIENT_VIEWPORT_Y);
            if npc.id() == id || near(from) || near(to) {
                npc.on_creature_move(id, is_player, from, to);
            }
        }
        Ok(())
    }

    /// Take a creature off the map, tell everyone who saw it and forget it
    pub fn remove_creature(&mut self, id: CreatureId) -> Option<(Creature, Option<PlayerState>)> {
        let stackpos = self.stackpos_snapshot(id);

        if let Some(shop) = self.world.player_mut(id).and_then(|player| player.shop.take()) {
            if let Some(npc) = self.npcs.get_mut(&shop.npc) {
                npc.on_player_end_trade(id, shop.buy, shop.sell);
            }
        }

        let (creature, player) = self.world.remove_creature(id)?;
        let pos = creature.position;

        let world = &self.world;
        for session in self.sessions.iter_mut() {
            if session.player() == Some(id) {
                continue;
            }
            if let Some(&stackpos) = stackpos.get(&session.id()) {
                session.send_remove_tile_creature(world, id, pos, stackpos);
            }
        }

        let mut closing = Vec::new();
        for npc in self.npcs.values_mut() {
            let near = npc.position().is_in_range(&pos, MAX_CLIENT_VIEWPORT_X, MAX_CLIENT_VIEWPORT_Y);
            if npc.id() == id || near {
                closing.extend(npc.on_creature_remove(id, creature.is_player()));
            }
        }
        for player in closing {
            self.close_shop(player, true);
        }
        self.npcs.remove(&id);

        if let Some(player) = &player {
            tracing::info!("{} has logged out", player.name);
            self.notify_vip_status(player.guid, false);
        }
        Some((creature, player))
    }

    /// Show a magic effect to every session that sees `pos`
    pub fn add_magic_effect(&mut self, pos: Position, effect: u8) {
        let world = &self.world;
        for session in self.sessions.iter_mut() {
            session.send_magic_effect(world, pos, effect);
        }
    }

    /// Tell every player listing `guid` as a VIP that it came or went
    pub(crate) fn notify_vip_status(&mut self, guid: PlayerGuid, online: bool) {
        let watchers: Vec<CreatureId> = self
            .world
            .player_ids()
            .into_iter()
            .filter(|&id| {
                self.world
                    .player(id)
                    .map(|player| player.guid != guid && player.vip_entries.iter().any(|entry| entry.guid == guid))
                    .unwrap_or(false)
            })
            .collect();

        for watcher in watchers {
            self.with_session(watcher, |session, _| session.send_updated_vip_status(guid, online));
        }
    }

    /// Speech heard by the sessions and NPCs in range of `speaker`
    ///
    /// Yells carry twice the viewport and across the floors a client can see;
    /// everything else stays on screen and on the speaker's floor. Whispers
    /// reach beyond the adjacent tiles only as "pspsps".
    pub(crate) fn creature_say(&mut self, speaker: CreatureId, class: SpeakClass, text: &str) {
        let Some(creature) = self.world.creature(speaker) else {
            return;
        };
        let pos = creature.position;
        let yell = matches!(class, SpeakClass::Yell | SpeakClass::MonsterYell);

        let world = &self.world;
        for session in self.sessions.iter_mut() {
            let Some(observer) = session.player().and_then(|viewer| world.observer(viewer)) else {
                continue;
            };
            if !observer.can_see_creature(creature) {
                continue;
            }

            let heard = if yell {
                let flat = Position { z: observer.position.z, ..pos };
                can_see(observer.position, i32::from(pos.x), i32::from(pos.y), i32::from(pos.z))
                    || (flat.is_in_range(&observer.position, 2 * MAX_CLIENT_VIEWPORT_X + 2, 2 * MAX_CLIENT_VIEWPORT_Y + 2)
                        && observer.position.z.abs_diff(pos.z) <= 2)
            } else {
                observer.position.z == pos.z && can_see_position(observer.position, pos)
            };
            if !heard {
                continue;
            }

            if class == SpeakClass::Whisper && !pos.is_in_range(&observer.position, 1, 1) {
                session.send_creature_say(world, speaker, class, "pspsps", None);
            } else {
                session.send_creature_say(world, speaker, class, text, None);
            }
        }

        for npc in self.npcs_near(pos) {
            npc.on_creature_say(speaker, class, text);
        }
    }

    //=== Shops ===//

    /// Open an NPC's shop for a player, closing any shop it already has open
    pub fn open_shop(
        &mut self,
        npc: CreatureId,
        player: CreatureId,
        items: Vec<ShopItem>,
        buy: Option<CallbackRef>,
        sell: Option<CallbackRef>,
    ) {
        if self.world.player(player).is_none() || !self.npcs.contains_key(&npc) {
            tracing::debug!("Shop request for unknown npc {} or player {}", npc.get(), player.get());
            return;
        }
        self.close_shop(player, false);

        if let Some(agent) = self.npcs.get_mut(&npc) {
            agent.open_shop(player);
        }
        if let Some(state) = self.world.player_mut(player) {
            state.shop = Some(ShopSession { npc, items, buy, sell });
        }
        self.send_shop_windows(player);
    }

    /// Shop window plus the sellable-items list
    pub(crate) fn send_shop_windows(&mut self, player: CreatureId) {
        self.with_session(player, |session, world| {
            let Some(state) = world.player(player) else {
                return;
            };
            let Some(shop) = &state.shop else {
                return;
            };
            session.send_shop(world, &shop.items);
            session.send_sale_item_list(world, &shop.items, state);
        });
    }

    pub(crate) fn send_sale_list(&mut self, player: CreatureId) {
        self.with_session(player, |session, world| {
            if let Some(state) = world.player(player) {
                if let Some(shop) = &state.shop {
                    session.send_sale_item_list(world, &shop.items, state);
                }
            }
        });
    }

    /// End a player's shop session and release its callbacks
    pub fn close_shop(&mut self, player: CreatureId, notify_client: bool) {
        let Some(shop) = self.world.player_mut(player).and_then(|state| state.shop.take()) else {
            return;
        };
        if let Some(npc) = self.npcs.get_mut(&shop.npc) {
            npc.on_player_end_trade(player, shop.buy, shop.sell);
        }
        if notify_client {
            self.with_session(player, |session, _| session.send_close_shop());
        }
    }

    fn apply_shop_requests(&mut self) {
        for request in self.shop_requests.drain() {
            match request {
                ShopRequest::Open { npc, player, items, buy, sell } => self.open_shop(npc, player, items, buy, sell),
                ShopRequest::Close { npc, player } => {
                    let owner = self.world.player(player).and_then(|state| state.shop.as_ref()).map(|shop| shop.npc);
                    if owner == Some(npc) {
                        self.close_shop(player, true);
                    }
                }
            }
        }
    }

    //=== Think ===//

    /// Periodic tick: shop requests, NPC think and cleanup of abandoned players
    pub(crate) fn think(&mut self) {
        self.apply_shop_requests();
        self.step_auto_walks();

        let creatures: Vec<Spectator> = self
            .world
            .creature_ids()
            .into_iter()
            .filter_map(|id| self.world.creature(id))
            .map(|creature| Spectator {
                id: creature.id,
                position: creature.position,
                is_player: creature.is_player(),
            })
            .collect();

        for npc in self.npcs.values_mut() {
            let pos = npc.position();
            let spectators: Vec<Spectator> = creatures
                .iter()
                .filter(|s| s.position.is_in_range(&pos, MAX_CLIENT_VIEWPORT_X, MAX_CLIENT_VIEWPORT_Y))
                .copied()
                .collect();
            npc.think(&spectators);
        }
        self.apply_shop_requests();

        let abandoned: Vec<CreatureId> = self
            .world
            .player_ids()
            .into_iter()
            .filter(|&id| {
                self.world
                    .player(id)
                    .map(|player| player.client.is_none() && !player.connecting && !player.in_fight)
                    .unwrap_or(false)
            })
            .collect();
        for id in abandoned {
            tracing::debug!("Removing player {} without a client", id.get());
            self.remove_creature(id);
        }
    }
}
