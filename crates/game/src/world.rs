//! # World View
//!
//! The read-only face of world state that the composer and the map builder
//! consume: tiles, creatures, players, item types and a few observer-specific
//! questions (skull, shield and emblem colors, walkthrough). The in-memory
//! [`crate::state::WorldState`] implements it; a full simulation can plug in
//! its own implementation.

use crate::player::PlayerState;
use ots_core::{CreatureId, CreatureKind, Direction, LightInfo, Outfit, PlayerGuid, Position, WorldType};
use ots_protocol::ItemDescriptor;

/// Per-tile flags that affect login and logout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileFlags {
    pub protection_zone: bool,
    pub no_logout: bool,
    /// Nothing may stand here
    pub blocking: bool,
}

/// One map square
///
/// Rendering order is ground, top items, creatures (most recent first) and
/// then bottom items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tile {
    pub ground: Option<ItemDescriptor>,
    pub top_items: Vec<ItemDescriptor>,
    /// Creatures in arrival order; the client lists them newest first
    pub creatures: Vec<CreatureId>,
    pub bottom_items: Vec<ItemDescriptor>,
    pub flags: TileFlags,
}

impl Tile {
    pub fn with_ground(client_id: u16) -> Self {
        Self {
            ground: Some(ItemDescriptor::plain(client_id)),
            ..Self::default()
        }
    }

    /// Whether a creature may be placed here
    pub fn is_walkable(&self) -> bool {
        self.ground.is_some() && !self.flags.blocking
    }

    /// Stack position of `creature` as seen by an observer
    ///
    /// # Arguments
    /// * `visible` - Whether the observer can see a given creature; hidden
    ///   creatures above `creature` do not take a slot
    ///
    /// # Returns
    /// `None` if the creature is not on this tile
    pub fn creature_stackpos(&self, creature: CreatureId, visible: impl Fn(CreatureId) -> bool) -> Option<usize> {
        let mut stackpos = usize::from(self.ground.is_some()) + self.top_items.len();
        for &id in self.creatures.iter().rev() {
            if id == creature {
                return Some(stackpos);
            }
            if visible(id) {
                stackpos += 1;
            }
        }
        None
    }

    /// Number of things on the tile
    pub fn thing_count(&self) -> usize {
        usize::from(self.ground.is_some()) + self.top_items.len() + self.creatures.len() + self.bottom_items.len()
    }
}

/// Snapshot of a creature as the protocol layer needs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creature {
    pub id: CreatureId,
    pub kind: CreatureKind,
    pub name: String,
    pub position: Position,
    pub direction: Direction,
    pub health: i32,
    pub max_health: i32,
    pub health_hidden: bool,
    pub outfit: Outfit,
    pub light: LightInfo,
    pub speed: u16,
    pub skull: u8,
    pub shield: u8,
    pub emblem: u8,
    pub level: u16,
    pub ghost: bool,
    pub invisible: bool,
    pub removed: bool,
}

impl Creature {
    pub fn new(id: CreatureId, kind: CreatureKind, name: &str, position: Position) -> Self {
        Self {
            id,
            kind,
            name: name.to_string(),
            position,
            direction: Direction::South,
            health: 100,
            max_health: 100,
            health_hidden: false,
            outfit: Outfit::default(),
            light: LightInfo::default(),
            speed: 220,
            skull: 0,
            shield: 0,
            emblem: 0,
            level: 0,
            ghost: false,
            invisible: false,
            removed: false,
        }
    }

    pub fn is_player(&self) -> bool {
        self.kind == CreatureKind::Player
    }
}

/// The player a session renders for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observer {
    pub id: CreatureId,
    pub position: Position,
    /// Gamemasters and above: full brightness, ghost-mode creatures visible
    pub access: bool,
    pub see_invisible: bool,
}

impl Observer {
    /// Whether this observer may see `creature` at all, regardless of range
    pub fn can_see_creature(&self, creature: &Creature) -> bool {
        if creature.id == self.id {
            return true;
        }
        if creature.ghost && !self.access {
            return false;
        }
        if !creature.is_player() && creature.invisible && !self.see_invisible {
            return false;
        }
        true
    }
}

/// Item type data used by the shop and sale-list messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemType {
    /// Server-side item id
    pub id: u16,
    pub client_id: u16,
    pub name: String,
    pub weight: u32,
    pub stackable: bool,
    pub fluid_container: bool,
    pub splash: bool,
    /// Stackable, fluid or charged items carry a subtype
    pub has_sub_type: bool,
}

impl ItemType {
    pub fn new(id: u16, client_id: u16, name: &str) -> Self {
        Self {
            id,
            client_id,
            name: name.to_string(),
            weight: 0,
            stackable: false,
            fluid_container: false,
            splash: false,
            has_sub_type: false,
        }
    }

    pub fn is_fluid(&self) -> bool {
        self.fluid_container || self.splash
    }
}

/// Read-only world lookups for one world-context turn
pub trait WorldView {
    fn tile(&self, pos: Position) -> Option<&Tile>;

    fn creature(&self, id: CreatureId) -> Option<&Creature>;

    fn player(&self, id: CreatureId) -> Option<&PlayerState>;

    /// Look up by server item id
    fn item_type(&self, id: u16) -> Option<&ItemType>;

    fn world_light(&self) -> LightInfo;

    fn world_type(&self) -> WorldType;

    fn skull_for(&self, _observer: &Observer, creature: &Creature) -> u8 {
        creature.skull
    }

    fn shield_for(&self, _observer: &Observer, creature: &Creature) -> u8 {
        creature.shield
    }

    fn emblem_for(&self, _observer: &Observer, creature: &Creature) -> u8 {
        creature.emblem
    }

    /// Whether the character `guid` is logged in, for VIP lists
    fn is_player_online(&self, _guid: PlayerGuid) -> bool {
        false
    }

    /// Whether the observer may walk through `creature`
    fn can_walkthrough(&self, _observer: &Observer, _creature: &Creature) -> bool {
        false
    }

    /// Observer for the player `id`, if it is in the world
    fn observer(&self, id: CreatureId) -> Option<Observer> {
        let creature = self.creature(id)?;
        let access = self.player(id).map(|player| player.is_access()).unwrap_or(false);
        Some(Observer {
            id,
            position: creature.position,
            access,
            see_invisible: access,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creature(id: u32, kind: CreatureKind) -> Creature {
        Creature::new(CreatureId::new(id), kind, "Test", Position::new(100, 100, 7))
    }

    #[test]
    fn test_creature_stackpos() {
        let mut tile = Tile::with_ground(100);
        tile.top_items.push(ItemDescriptor::plain(200));
        tile.creatures = vec![CreatureId::new(1), CreatureId::new(2), CreatureId::new(3)];

        // Newest creature sits right above the top items
        assert_eq!(tile.creature_stackpos(CreatureId::new(3), |_| true), Some(2));
        assert_eq!(tile.creature_stackpos(CreatureId::new(1), |_| true), Some(4));
        // A hidden creature above does not take a slot
        assert_eq!(
            tile.creature_stackpos(CreatureId::new(1), |id| id != CreatureId::new(2)),
            Some(3)
        );
        assert_eq!(tile.creature_stackpos(CreatureId::new(9), |_| true), None);
    }

    #[test]
    fn test_can_see_creature_rules() {
        let observer = Observer {
            id: CreatureId::new(1),
            position: Position::new(100, 100, 7),
            access: false,
            see_invisible: false,
        };

        let mut ghost = creature(2, CreatureKind::Player);
        ghost.ghost = true;
        assert!(!observer.can_see_creature(&ghost));
        assert!(Observer { access: true, ..observer }.can_see_creature(&ghost));

        let mut invisible_monster = creature(3, CreatureKind::Monster);
        invisible_monster.invisible = true;
        assert!(!observer.can_see_creature(&invisible_monster));

        // Invisible players stay listed, only their outfit is blanked
        let mut invisible_player = creature(4, CreatureKind::Player);
        invisible_player.invisible = true;
        assert!(observer.can_see_creature(&invisible_player));

        let mut me = creature(1, CreatureKind::Player);
        me.ghost = true;
        assert!(observer.can_see_creature(&me));
    }
}
