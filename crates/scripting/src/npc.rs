//! # NPC Agent
//!
//! World-facing wrapper around an [`NpcEventHandler`]: decides which world
//! events reach the script, keeps the sight cache and the shop set.

use crate::callbacks::CallbackRef;
use crate::events::NpcEventHandler;
use crate::shop::{ShopPlayers, TradeRequest};
use crate::sight::{npc_can_see, SightCache, Spectator, NPC_VIEWPORT_X, NPC_VIEWPORT_Y};
use ots_core::{CreatureId, Position, SpeakClass};
use tracing::debug;

pub struct NpcAgent {
    id: CreatureId,
    name: String,
    position: Position,
    idle: bool,
    sight: SightCache,
    shop_players: ShopPlayers,
    handler: Box<dyn NpcEventHandler>,
}

impl NpcAgent {
    pub fn new(
        id: CreatureId,
        name: impl Into<String>,
        position: Position,
        sight: SightCache,
        handler: Box<dyn NpcEventHandler>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            idle: true,
            sight,
            shop_players: ShopPlayers::new(),
            handler,
        }
    }

    pub fn id(&self) -> CreatureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn can_see(&self, pos: Position) -> bool {
        npc_can_see(self.position, pos)
    }

    pub fn shop_players(&self) -> &ShopPlayers {
        &self.shop_players
    }

    pub fn on_creature_appear(&mut self, creature: CreatureId, is_player: bool) {
        if creature == self.id || is_player {
            self.handler.on_creature_appear(creature);
        }
    }

    /// A creature left the world
    ///
    /// # Returns
    /// Players whose shop window must be closed, non-empty only when the NPC
    /// itself is the one removed
    pub fn on_creature_remove(&mut self, creature: CreatureId, is_player: bool) -> Vec<CreatureId> {
        if creature == self.id {
            let closing = self.shop_players.close_all();
            self.handler.on_creature_disappear(creature);
            return closing;
        }
        if is_player {
            self.handler.on_creature_disappear(creature);
        }
        Vec::new()
    }

    pub fn on_creature_move(
        &mut self,
        creature: CreatureId,
        is_player: bool,
        old_pos: Position,
        new_pos: Position,
    ) {
        if creature == self.id {
            self.position = new_pos;
        } else if !is_player {
            return;
        }
        self.handler.on_creature_move(creature, old_pos, new_pos);
    }

    pub fn on_creature_say(&mut self, creature: CreatureId, class: SpeakClass, text: &str) {
        if creature != self.id {
            self.handler.on_creature_say(creature, class, text);
        }
    }

    pub fn on_player_close_channel(&mut self, player: CreatureId) {
        self.handler.on_player_close_channel(player);
    }

    pub fn speech_bubble_for(&mut self, player: CreatureId, bubble: u8) -> u8 {
        self.handler.on_speech_bubble(player, bubble)
    }

    /// One think tick
    ///
    /// Fires `sight` for newly sighted creatures, then `think` unless no player
    /// is inside the viewport.
    pub fn think(&mut self, spectators: &[Spectator]) {
        for creature in self.sight.update(self.id, self.position, spectators) {
            self.handler.on_creature_sight(creature);
        }

        self.idle = !spectators.iter().any(|s| {
            s.is_player && self.position.is_in_range(&s.position, NPC_VIEWPORT_X, NPC_VIEWPORT_Y)
        });
        if self.idle {
            return;
        }
        self.handler.on_think();
    }

    /// Register `player` as having this NPC's shop open
    pub fn open_shop(&mut self, player: CreatureId) {
        self.shop_players.add(player);
    }

    pub fn on_player_trade(
        &mut self,
        player: CreatureId,
        callback: Option<CallbackRef>,
        request: &TradeRequest,
    ) {
        self.handler.on_player_trade(player, callback, request);
    }

    /// Close a shop session: release its callbacks, forget the player and
    /// fire `endtrade`
    pub fn on_player_end_trade(
        &mut self,
        player: CreatureId,
        buy: Option<CallbackRef>,
        sell: Option<CallbackRef>,
    ) {
        for callback in [buy, sell].into_iter().flatten() {
            self.handler.release_callback(callback);
        }
        if !self.shop_players.remove(player) {
            debug!(npc = %self.name, player = player.get(), "End trade without open shop");
        }
        self.handler.on_player_end_trade(player);
    }
}
