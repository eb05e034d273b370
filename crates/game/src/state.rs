//! # In-Memory World
//!
//! A plain map of tiles, creatures and players owned by the world context.
//! It implements [`WorldView`] for the composer and offers the handful of
//! mutations the login procedure and command handlers need: placing,
//! moving and removing creatures.

use crate::error::{GameError, Result};
use crate::player::PlayerState;
use crate::world::{Creature, ItemType, Tile, WorldView};
use ots_core::{AccountId, CreatureId, LightInfo, PlayerGuid, Position, WorldType};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct WorldState {
    tiles: HashMap<Position, Tile>,
    creatures: HashMap<CreatureId, Creature>,
    players: HashMap<CreatureId, PlayerState>,
    item_types: HashMap<u16, ItemType>,
    light: LightInfo,
    world_type: WorldType,
}

impl WorldState {
    pub fn new(world_type: WorldType) -> Self {
        Self {
            world_type,
            light: LightInfo::new(250, 215),
            ..Self::default()
        }
    }

    pub fn set_tile(&mut self, pos: Position, tile: Tile) {
        self.tiles.insert(pos, tile);
    }

    pub fn tile_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        self.tiles.get_mut(&pos)
    }

    pub fn add_item_type(&mut self, item_type: ItemType) {
        self.item_types.insert(item_type.id, item_type);
    }

    /// Server item id for a client id; unknown ids map to themselves
    pub fn server_item_id(&self, client_id: u16) -> u16 {
        self.item_types
            .values()
            .find(|item_type| item_type.client_id == client_id)
            .map(|item_type| item_type.id)
            .unwrap_or(client_id)
    }

    pub fn set_world_light(&mut self, light: LightInfo) {
        self.light = light;
    }

    pub fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    pub fn player_mut(&mut self, id: CreatureId) -> Option<&mut PlayerState> {
        self.players.get_mut(&id)
    }

    /// Register a creature that is not on the map yet
    pub fn add_creature(&mut self, mut creature: Creature) {
        creature.removed = true;
        self.creatures.insert(creature.id, creature);
    }

    /// Register a player and its creature, neither on the map yet
    pub fn add_player(&mut self, creature: Creature, player: PlayerState) {
        self.players.insert(player.id, player);
        self.add_creature(creature);
    }

    pub fn player_by_guid(&self, guid: PlayerGuid) -> Option<CreatureId> {
        self.players.values().find(|player| player.guid == guid).map(|player| player.id)
    }

    /// Case-insensitive name lookup
    pub fn player_by_name(&self, name: &str) -> Option<CreatureId> {
        self.players
            .values()
            .find(|player| player.name.eq_ignore_ascii_case(name))
            .map(|player| player.id)
    }

    pub fn players_on_account(&self, account: AccountId) -> Vec<CreatureId> {
        self.players
            .values()
            .filter(|player| player.account_id == account)
            .map(|player| player.id)
            .collect()
    }

    pub fn player_ids(&self) -> Vec<CreatureId> {
        self.players.keys().copied().collect()
    }

    pub fn players_online(&self) -> usize {
        self.players.len()
    }

    /// Creatures on the map
    pub fn creature_ids(&self) -> Vec<CreatureId> {
        self.creatures
            .values()
            .filter(|creature| !creature.removed)
            .map(|creature| creature.id)
            .collect()
    }

    /// Put a registered creature on the tile at `pos`
    ///
    /// # Returns
    /// The creature's stack position, counting every creature on the tile
    pub fn place_creature(&mut self, id: CreatureId, pos: Position) -> Result<usize> {
        let tile = self.tiles.get_mut(&pos).ok_or(GameError::NoTile(pos))?;
        if !tile.is_walkable() {
            return Err(GameError::TileBlocked(pos));
        }
        let creature = self.creatures.get_mut(&id).ok_or(GameError::CreatureNotFound(id))?;

        tile.creatures.push(id);
        creature.position = pos;
        creature.removed = false;
        Ok(usize::from(tile.ground.is_some()) + tile.top_items.len())
    }

    /// Move a creature onto the tile at `to`
    ///
    /// # Returns
    /// The position it left
    pub fn move_creature(&mut self, id: CreatureId, to: Position) -> Result<Position> {
        let from = self
            .creatures
            .get(&id)
            .filter(|creature| !creature.removed)
            .map(|creature| creature.position)
            .ok_or(GameError::CreatureNotFound(id))?;

        match self.tiles.get(&to) {
            Some(tile) if tile.is_walkable() => {}
            Some(_) => return Err(GameError::TileBlocked(to)),
            None => return Err(GameError::NoTile(to)),
        }

        if let Some(tile) = self.tiles.get_mut(&from) {
            tile.creatures.retain(|&other| other != id);
        }
        if let Some(tile) = self.tiles.get_mut(&to) {
            tile.creatures.push(id);
        }
        if let Some(creature) = self.creatures.get_mut(&id) {
            creature.position = to;
        }
        Ok(from)
    }

    /// Take a creature off the map and forget it, along with its player state
    pub fn remove_creature(&mut self, id: CreatureId) -> Option<(Creature, Option<PlayerState>)> {
        let mut creature = self.creatures.remove(&id)?;
        if let Some(tile) = self.tiles.get_mut(&creature.position) {
            tile.creatures.retain(|&other| other != id);
        }
        creature.removed = true;
        let player = self.players.remove(&id);
        Some((creature, player))
    }
}

impl WorldView for WorldState {
    fn tile(&self, pos: Position) -> Option<&Tile> {
        self.tiles.get(&pos)
    }

    fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    fn player(&self, id: CreatureId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    fn item_type(&self, id: u16) -> Option<&ItemType> {
        self.item_types.get(&id)
    }

    fn world_light(&self) -> LightInfo {
        self.light
    }

    fn world_type(&self) -> WorldType {
        self.world_type
    }

    fn is_player_online(&self, guid: PlayerGuid) -> bool {
        self.player_by_guid(guid).is_some()
    }
}
