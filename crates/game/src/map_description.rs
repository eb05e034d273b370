//! # Map Description Builder
//!
//! Serializes the tiles and creatures of a viewport for one observer.
//!
//! ## Floor walk
//! Tiles are walked column by column (x outer, y inner). A present tile is
//! written in full; runs of absent tiles are collapsed into a skip count
//! written as `{u8 skip}{0xFF}` before the next present tile. The run is
//! flushed at the end of every floor and whenever it reaches 254, so each
//! floor's bytes stand alone.
//!
//! ## Floors
//! From the surface (z <= 7) floors 7 down to 0 are described; underground
//! the two floors above and below the observer. Each floor is shifted
//! diagonally by its distance from the observer's floor.

use crate::appearance::appearance_for;
use crate::visibility::{is_creature_visible, KnownCreatures};
use crate::world::{Observer, Tile, WorldView};
use ots_core::{Position, GROUND_FLOOR, MAP_MAX_LAYERS, MAP_VIEW_HEIGHT, MAP_VIEW_WIDTH, MAX_CLIENT_VIEWPORT_X, MAX_CLIENT_VIEWPORT_Y, MAX_STACKPOS};
use ots_protocol::packet_builder::write_creature;
use ots_protocol::{NetworkMessage, ServerOpcode};

/// Run-length terminator byte
const SKIP_MARKER: u8 = 0xFF;
/// Longest run written as a single pair
const MAX_SKIP: i32 = 0xFE;

/// Viewport serializer bound to one observer and its known-creature set
pub struct MapDescriber<'a, W: WorldView + ?Sized> {
    world: &'a W,
    observer: Observer,
    known: &'a mut KnownCreatures,
}

impl<'a, W: WorldView + ?Sized> MapDescriber<'a, W> {
    pub fn new(world: &'a W, observer: Observer, known: &'a mut KnownCreatures) -> Self {
        Self { world, observer, known }
    }

    /// Write one tile's stack
    ///
    /// Ground and top items first, capped at [`MAX_STACKPOS`] things; then
    /// every creature the observer can see, newest first; then bottom items
    /// while the stack is below the cap.
    pub fn tile_description(&mut self, msg: &mut NetworkMessage, tile: &Tile) {
        let (world, observer) = (self.world, self.observer);
        let mut count = 0;
        if let Some(ground) = &tile.ground {
            msg.add_item(ground);
            count = 1;
        }

        for item in &tile.top_items {
            msg.add_item(item);
            count += 1;
            if count == MAX_STACKPOS {
                return;
            }
        }

        for &id in tile.creatures.iter().rev() {
            let Some(creature) = world.creature(id) else {
                continue;
            };
            if !observer.can_see_creature(creature) {
                continue;
            }

            let form = self.known.check(id, |known| is_creature_visible(world, &observer, known));
            write_creature(msg, &appearance_for(world, &observer, creature), form);
            count += 1;
        }

        if count < MAX_STACKPOS {
            for item in &tile.bottom_items {
                msg.add_item(item);
                count += 1;
                if count == MAX_STACKPOS {
                    return;
                }
            }
        }
    }

    /// Write one floor of a `width` × `height` area shifted by `offset`
    fn floor_description(&mut self, msg: &mut NetworkMessage, x: i32, y: i32, z: i32, width: i32, height: i32, offset: i32) {
        let world = self.world;
        let mut skip: i32 = -1;

        for nx in 0..width {
            for ny in 0..height {
                let tile = Position::from_signed(x + nx + offset, y + ny + offset, z).and_then(|pos| world.tile(pos));

                match tile {
                    Some(tile) => {
                        if skip >= 0 {
                            msg.add_u8(skip as u8);
                            msg.add_u8(SKIP_MARKER);
                        }
                        skip = 0;
                        self.tile_description(msg, tile);
                    }
                    None if skip == MAX_SKIP => {
                        msg.add_u8(SKIP_MARKER);
                        msg.add_u8(SKIP_MARKER);
                        skip = -1;
                    }
                    None => skip += 1,
                }
            }
        }

        if skip >= 0 {
            msg.add_u8(skip as u8);
            msg.add_u8(SKIP_MARKER);
        }
    }

    /// Write every floor visible from `z` for the area at (`x`, `y`)
    pub fn map_description(&mut self, msg: &mut NetworkMessage, x: i32, y: i32, z: u8, width: i32, height: i32) {
        let z = i32::from(z);
        let ground = i32::from(GROUND_FLOOR);

        if z > ground {
            let end = (MAP_MAX_LAYERS - 1).min(z + 2);
            for nz in (z - 2)..=end {
                self.floor_description(msg, x, y, nz, width, height, z - nz);
            }
        } else {
            for nz in (0..=ground).rev() {
                self.floor_description(msg, x, y, nz, width, height, z - nz);
            }
        }
    }

    /// Full screen (`0x64`) centered on `pos`
    pub fn full_map(&mut self, msg: &mut NetworkMessage, pos: Position) {
        msg.add_u8(ServerOpcode::MapDescription.as_u8());
        msg.add_position(pos);
        self.map_description(
            msg,
            i32::from(pos.x) - MAX_CLIENT_VIEWPORT_X,
            i32::from(pos.y) - MAX_CLIENT_VIEWPORT_Y,
            pos.z,
            MAP_VIEW_WIDTH,
            MAP_VIEW_HEIGHT,
        );
    }

    /// Rows and columns exposed by a step on the same floor
    pub fn movement_strips(&mut self, msg: &mut NetworkMessage, old: Position, new: Position) {
        let (old_x, old_y) = (i32::from(old.x), i32::from(old.y));
        let (new_x, new_y) = (i32::from(new.x), i32::from(new.y));

        if old_y > new_y {
            msg.add_u8(ServerOpcode::MapNorth.as_u8());
            self.map_description(msg, old_x - 8, new_y - 6, new.z, MAP_VIEW_WIDTH, 1);
        } else if old_y < new_y {
            msg.add_u8(ServerOpcode::MapSouth.as_u8());
            self.map_description(msg, old_x - 8, new_y + 7, new.z, MAP_VIEW_WIDTH, 1);
        }

        if old_x < new_x {
            msg.add_u8(ServerOpcode::MapEast.as_u8());
            self.map_description(msg, new_x + 9, new_y - 6, new.z, 1, MAP_VIEW_HEIGHT);
        } else if old_x > new_x {
            msg.add_u8(ServerOpcode::MapWest.as_u8());
            self.map_description(msg, new_x - 8, new_y - 6, new.z, 1, MAP_VIEW_HEIGHT);
        }
    }

    /// Floor change upwards (`0xBE`)
    ///
    /// # Packet Format
    /// ```text
    /// {0xBE}{newly visible floors}{0x68}{west strip}{0x65}{north strip}
    /// ```
    /// Arriving on the surface exposes floors 5 to 0; climbing underground
    /// exposes the floor three above the old one.
    pub fn floor_change_up(&mut self, msg: &mut NetworkMessage, old: Position, new: Position) {
        let (old_x, old_y) = (i32::from(old.x), i32::from(old.y));
        let ground = i32::from(GROUND_FLOOR);

        msg.add_u8(ServerOpcode::FloorChangeUp.as_u8());

        let new_z = i32::from(new.z);
        if new_z == ground {
            for floor in (0..=5).rev() {
                self.floor_description(msg, old_x - 8, old_y - 6, floor, MAP_VIEW_WIDTH, MAP_VIEW_HEIGHT, 8 - floor);
            }
        } else if new_z > ground {
            self.floor_description(msg, old_x - 8, old_y - 6, i32::from(old.z) - 3, MAP_VIEW_WIDTH, MAP_VIEW_HEIGHT, 3);
        }

        msg.add_u8(ServerOpcode::MapWest.as_u8());
        self.map_description(msg, old_x - 8, old_y - 5, new.z, 1, MAP_VIEW_HEIGHT);

        msg.add_u8(ServerOpcode::MapNorth.as_u8());
        self.map_description(msg, old_x - 8, old_y - 6, new.z, MAP_VIEW_WIDTH, 1);
    }

    /// Floor change downwards (`0xBF`)
    ///
    /// # Packet Format
    /// ```text
    /// {0xBF}{newly visible floors}{0x66}{east strip}{0x67}{south strip}
    /// ```
    /// Going underground exposes floors 8 to 10; descending further exposes
    /// the floor two below the new one, down to floor 15.
    pub fn floor_change_down(&mut self, msg: &mut NetworkMessage, old: Position, new: Position) {
        let (old_x, old_y) = (i32::from(old.x), i32::from(old.y));
        let (old_z, new_z) = (i32::from(old.z), i32::from(new.z));

        msg.add_u8(ServerOpcode::FloorChangeDown.as_u8());

        if new_z == i32::from(GROUND_FLOOR) + 1 {
            for i in 0..3 {
                self.floor_description(msg, old_x - 8, old_y - 6, new_z + i, MAP_VIEW_WIDTH, MAP_VIEW_HEIGHT, -i - 1);
            }
        } else if new_z > old_z && new_z > 8 && new_z < 14 {
            self.floor_description(msg, old_x - 8, old_y - 6, new_z + 2, MAP_VIEW_WIDTH, MAP_VIEW_HEIGHT, -3);
        }

        msg.add_u8(ServerOpcode::MapEast.as_u8());
        self.map_description(msg, old_x + 9, old_y - 7, new.z, 1, MAP_VIEW_HEIGHT);

        msg.add_u8(ServerOpcode::MapSouth.as_u8());
        self.map_description(msg, old_x - 8, old_y + 7, new.z, MAP_VIEW_WIDTH, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerState;
    use crate::world::{Creature, ItemType};
    use ots_core::{CreatureId, CreatureKind, LightInfo, WorldType};
    use ots_protocol::ItemDescriptor;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestWorld {
        tiles: HashMap<Position, Tile>,
        creatures: HashMap<CreatureId, Creature>,
    }

    impl WorldView for TestWorld {
        fn tile(&self, pos: Position) -> Option<&Tile> {
            self.tiles.get(&pos)
        }

        fn creature(&self, id: CreatureId) -> Option<&Creature> {
            self.creatures.get(&id)
        }

        fn player(&self, _id: CreatureId) -> Option<&PlayerState> {
            None
        }

        fn item_type(&self, _id: u16) -> Option<&ItemType> {
            None
        }

        fn world_light(&self) -> LightInfo {
            LightInfo::new(250, 215)
        }

        fn world_type(&self) -> WorldType {
            WorldType::Pvp
        }
    }

    fn observer(pos: Position) -> Observer {
        Observer {
            id: CreatureId::new(1),
            position: pos,
            access: false,
            see_invisible: false,
        }
    }

    fn describe(world: &TestWorld, pos: Position, width: i32, height: i32) -> Vec<u8> {
        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        MapDescriber::new(world, observer(pos), &mut known).map_description(
            &mut msg,
            i32::from(pos.x) - 8,
            i32::from(pos.y) - 6,
            pos.z,
            width,
            height,
        );
        msg.body().to_vec()
    }

    #[test]
    fn test_empty_viewport_one_pair_per_floor() {
        let world = TestWorld::default();

        let surface = describe(&world, Position::new(100, 100, 7), 18, 14);
        assert_eq!(surface, [251, 0xFF].repeat(8));

        let underground = describe(&world, Position::new(100, 100, 9), 18, 14);
        assert_eq!(underground, [251, 0xFF].repeat(5));

        // Floor 15 is the last layer
        let deepest = describe(&world, Position::new(100, 100, 14), 18, 14);
        assert_eq!(deepest, [251, 0xFF].repeat(4));
    }

    #[test]
    fn test_long_skip_run_is_split() {
        let world = TestWorld::default();
        let bytes = describe(&world, Position::new(100, 100, 15), 20, 14);

        // 280 empty tiles: 256 in the overflow pair, 24 in the flush
        let floor = [0xFF, 0xFF, 23, 0xFF];
        assert_eq!(bytes, floor.repeat(3));
    }

    #[test]
    fn test_skip_before_present_tile() {
        let mut world = TestWorld::default();
        // Third tile of the first column
        world.tiles.insert(Position::new(92, 96, 7), Tile::with_ground(0x0102));

        let bytes = describe(&world, Position::new(100, 100, 7), 1, 14);
        assert_eq!(&bytes[..6], &[1, 0xFF, 0x02, 0x01, 11, 0xFF]);
        assert_eq!(bytes.len(), 6 + 2 * 7);
    }

    #[test]
    fn test_tile_stack_cap() {
        let world = TestWorld::default();
        let mut tile = Tile::with_ground(500);
        tile.top_items = (0..12).map(|i| ItemDescriptor::plain(600 + i)).collect();
        tile.bottom_items.push(ItemDescriptor::plain(700));

        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        MapDescriber::new(&world, observer(Position::new(100, 100, 7)), &mut known).tile_description(&mut msg, &tile);

        // Ground plus nine top items
        assert_eq!(msg.len(), 20);
        assert_eq!(&msg.body()[18..20], &608u16.to_le_bytes());
    }

    #[test]
    fn test_tile_creatures_newest_first() {
        let mut world = TestWorld::default();
        let pos = Position::new(100, 100, 7);
        for id in [2, 3] {
            let creature = Creature::new(CreatureId::new(id), CreatureKind::Monster, "Rat", pos);
            world.creatures.insert(creature.id, creature);
        }
        let mut hidden = Creature::new(CreatureId::new(4), CreatureKind::Player, "Ghost", pos);
        hidden.ghost = true;
        world.creatures.insert(hidden.id, hidden);

        let mut tile = Tile::with_ground(500);
        tile.creatures = vec![CreatureId::new(2), CreatureId::new(3), CreatureId::new(4)];

        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        MapDescriber::new(&world, observer(pos), &mut known).tile_description(&mut msg, &tile);

        let body = msg.body();
        assert_eq!(&body[2..4], &0x61u16.to_le_bytes());
        assert_eq!(&body[8..12], &3u32.to_le_bytes());
        assert!(known.contains(CreatureId::new(2)));
        assert!(known.contains(CreatureId::new(3)));
        assert!(!known.contains(CreatureId::new(4)));

        // Second pass uses the short form
        let mut again = NetworkMessage::new();
        MapDescriber::new(&world, observer(pos), &mut known).tile_description(&mut again, &tile);
        assert_eq!(&again.body()[2..4], &0x62u16.to_le_bytes());
        assert_eq!(&again.body()[4..8], &3u32.to_le_bytes());
    }

    #[test]
    fn test_floor_change_down_to_underground() {
        let world = TestWorld::default();
        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        let old = Position::new(100, 100, 7);
        let new = Position::new(100, 100, 8);
        MapDescriber::new(&world, observer(new), &mut known).floor_change_down(&mut msg, old, new);

        let mut expected = vec![0xBF];
        expected.extend([251, 0xFF].repeat(3));
        // East column over floors 6..=10
        expected.push(0x66);
        expected.extend([13, 0xFF].repeat(5));
        expected.push(0x67);
        expected.extend([17, 0xFF].repeat(5));
        assert_eq!(msg.body(), expected.as_slice());
    }

    #[test]
    fn test_floor_change_up_to_surface() {
        let world = TestWorld::default();
        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        let old = Position::new(100, 100, 8);
        let new = Position::new(100, 100, 7);
        MapDescriber::new(&world, observer(new), &mut known).floor_change_up(&mut msg, old, new);

        let mut expected = vec![0xBE];
        expected.extend([251, 0xFF].repeat(6));
        expected.push(0x68);
        expected.extend([13, 0xFF].repeat(8));
        expected.push(0x65);
        expected.extend([17, 0xFF].repeat(8));
        assert_eq!(msg.body(), expected.as_slice());
    }

    const GROUND: [u8; 2] = [0x02, 0x01];

    fn world_with_ground(positions: &[Position]) -> TestWorld {
        let mut world = TestWorld::default();
        for &pos in positions {
            world.tiles.insert(pos, Tile::with_ground(0x0102));
        }
        world
    }

    #[test]
    fn test_diagonal_step_writes_north_then_east_strip() {
        // First tile of the north row on floors 7 and 6, last tile of the east column on floor 7
        let world = world_with_ground(&[
            Position::new(92, 93, 7),
            Position::new(93, 94, 6),
            Position::new(110, 106, 7),
        ]);
        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        let old = Position::new(100, 100, 7);
        let new = Position::new(101, 99, 7);
        MapDescriber::new(&world, observer(new), &mut known).movement_strips(&mut msg, old, new);

        let mut expected = vec![0x65];
        expected.extend(GROUND);
        expected.extend([17, 0xFF]);
        expected.extend(GROUND);
        expected.extend([17, 0xFF]);
        expected.extend([17, 0xFF].repeat(6));
        expected.push(0x66);
        expected.extend([12, 0xFF]);
        expected.extend(GROUND);
        expected.extend([0, 0xFF]);
        expected.extend([13, 0xFF].repeat(7));
        assert_eq!(msg.body(), expected.as_slice());
    }

    #[test]
    fn test_west_step_writes_only_west_strip() {
        let world = TestWorld::default();
        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        let old = Position::new(100, 100, 7);
        let new = Position::new(99, 100, 7);
        MapDescriber::new(&world, observer(new), &mut known).movement_strips(&mut msg, old, new);

        let mut expected = vec![0x68];
        expected.extend([13, 0xFF].repeat(8));
        assert_eq!(msg.body(), expected.as_slice());
    }

    #[test]
    fn test_floor_change_down_underground() {
        // New floor two below at offset -3, and floor 8 of the east column at offset 2
        let world = world_with_ground(&[Position::new(89, 91, 12), Position::new(111, 95, 8)]);
        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        let old = Position::new(100, 100, 9);
        let new = Position::new(100, 100, 10);
        MapDescriber::new(&world, observer(new), &mut known).floor_change_down(&mut msg, old, new);

        let mut expected = vec![0xBF];
        expected.extend(GROUND);
        expected.extend([251, 0xFF]);
        // East column over floors 8..=12
        expected.push(0x66);
        expected.extend(GROUND);
        expected.extend([13, 0xFF]);
        expected.extend([13, 0xFF].repeat(4));
        expected.push(0x67);
        expected.extend([17, 0xFF].repeat(5));
        assert_eq!(msg.body(), expected.as_slice());
    }

    #[test]
    fn test_floor_change_down_near_bottom_adds_no_floor() {
        let world = TestWorld::default();
        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        let old = Position::new(100, 100, 13);
        let new = Position::new(100, 100, 14);
        MapDescriber::new(&world, observer(new), &mut known).floor_change_down(&mut msg, old, new);

        // Floors 12..=15 only, no newly exposed floor
        let mut expected = vec![0xBF, 0x66];
        expected.extend([13, 0xFF].repeat(4));
        expected.push(0x67);
        expected.extend([17, 0xFF].repeat(4));
        assert_eq!(msg.body(), expected.as_slice());
    }

    #[test]
    fn test_floor_change_up_underground() {
        // Floor three above the old one at offset 3
        let world = world_with_ground(&[Position::new(95, 97, 7)]);
        let mut known = KnownCreatures::new();
        let mut msg = NetworkMessage::new();
        let old = Position::new(100, 100, 10);
        let new = Position::new(100, 100, 9);
        MapDescriber::new(&world, observer(new), &mut known).floor_change_up(&mut msg, old, new);

        let mut expected = vec![0xBE];
        expected.extend(GROUND);
        expected.extend([251, 0xFF]);
        // West column and north row over floors 7..=11
        expected.push(0x68);
        expected.extend([13, 0xFF].repeat(5));
        expected.push(0x65);
        expected.extend([17, 0xFF].repeat(5));
        assert_eq!(msg.body(), expected.as_slice());
    }
}
