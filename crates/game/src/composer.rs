//! # Outbound Message Composer
//!
//! One method per client-visible event. Each method checks whether the event
//! concerns this client (a position or creature on screen, a PvP world for
//! skulls), builds the message and queues it on the session's output. The
//! checks never touch world state.
//!
//! Builders that need no viewport knowledge live in
//! [`ots_protocol::packet_builder`]; this module adds the observer: the
//! known-creature set, visibility gating and the map description.

use crate::appearance::appearance_for;
use crate::map_description::MapDescriber;
use crate::player::CarriedItem;
use crate::sale::{write_sale_list, write_shop, ItemCounter};
use crate::session::GameSession;
use crate::visibility::{can_see_position, is_creature_visible};
use crate::world::{Observer, Tile, WorldView};
use ots_accounts::format_date_short;
use ots_core::{CreatureId, Direction, LightInfo, Outfit, PlayerGuid, Position, SpeakClass, WorldType, MAX_STACKPOS};
use ots_protocol::packet_builder::*;
use ots_protocol::packets::CREATURE_TURN;
use ots_protocol::{ItemDescriptor, MessageClass, NetworkMessage, ServerOpcode};
use ots_scripting::ShopItem;

/// Magic effect shown when a creature logs out or vanishes
pub const MAGIC_EFFECT_POFF: u8 = 3;
/// Magic effect shown on login and teleport
pub const MAGIC_EFFECT_TELEPORT: u8 = 11;

/// Look type offered to privileged players in the outfit window
const GAMEMASTER_LOOK_TYPE: u16 = 75;

/// Contents of an open container window
#[derive(Debug, Clone)]
pub struct ContainerView<'a> {
    pub item: &'a ItemDescriptor,
    pub name: &'a str,
    pub capacity: u8,
    pub items: &'a [ItemDescriptor],
}

impl GameSession {
    fn observer<W: WorldView + ?Sized>(&self, world: &W) -> Option<Observer> {
        self.player().and_then(|id| world.observer(id))
    }

    fn can_see<W: WorldView + ?Sized>(&self, world: &W, pos: Position) -> bool {
        self.observer(world)
            .map(|observer| can_see_position(observer.position, pos))
            .unwrap_or(false)
    }

    fn can_see_creature<W: WorldView + ?Sized>(&self, world: &W, creature: CreatureId) -> bool {
        self.observer(world)
            .map(|observer| is_creature_visible(world, &observer, creature))
            .unwrap_or(false)
    }

    fn is_access<W: WorldView + ?Sized>(&self, world: &W) -> bool {
        self.observer(world).map(|observer| observer.access).unwrap_or(false)
    }

    fn write_with(&mut self, build: impl FnOnce(&mut NetworkMessage)) {
        let mut msg = NetworkMessage::new();
        build(&mut msg);
        self.write(&msg);
    }

    //=== Map and creatures ===//

    /// Full screen around `pos` (`0x64`)
    pub fn send_map_description<W: WorldView + ?Sized>(&mut self, world: &W, pos: Position) {
        let Some(observer) = self.observer(world) else {
            return;
        };
        let mut msg = NetworkMessage::new();
        MapDescriber::new(world, observer, &mut self.known).full_map(&mut msg, pos);
        self.write(&msg);
    }

    /// A creature appeared at `pos`
    ///
    /// For this client's own player this is the login burst: self-appear,
    /// map, login effect, equipment, stats, skills, light, VIP list and icons.
    /// Other creatures are added to the tile (`0x6A`), or the tile is resent
    /// when the stack position is too deep to address.
    pub fn send_add_creature<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        creature_id: CreatureId,
        pos: Position,
        stackpos: usize,
        effect: Option<u8>,
    ) {
        let Some(observer) = self.observer(world) else {
            return;
        };
        if !can_see_position(observer.position, pos) {
            return;
        }

        if creature_id != observer.id {
            if stackpos >= MAX_STACKPOS {
                self.send_update_tile(world, pos);
            } else if let Some(creature) = world.creature(creature_id) {
                let mut msg = NetworkMessage::new();
                msg.add_u8(ServerOpcode::AddTileThing.as_u8());
                msg.add_position(pos);
                msg.add_u8(stackpos as u8);
                let form = self
                    .known
                    .check(creature_id, |known| is_creature_visible(world, &observer, known));
                write_creature(&mut msg, &appearance_for(world, &observer, creature), form);
                self.write(&msg);
            }

            if let Some(effect) = effect {
                self.send_magic_effect(world, pos, effect);
            }
            return;
        }

        let Some(player) = world.player(observer.id) else {
            return;
        };
        let Some(creature) = world.creature(observer.id) else {
            return;
        };

        self.write_with(|msg| build_self_appear(msg, observer.id, player.can_report_bugs()));
        self.send_map_description(world, pos);
        if effect.is_some() {
            self.send_magic_effect(world, pos, MAGIC_EFFECT_TELEPORT);
        }

        for slot in 1..=crate::player::INVENTORY_SLOTS as u8 {
            self.write_with(|msg| build_inventory_item(msg, slot, player.inventory_item(slot)));
        }

        self.write_with(|msg| {
            build_player_stats(msg, &player.stats(creature.health, creature.max_health));
            build_player_skills(msg, &player.skills);
            build_world_light(msg, world.world_light(), observer.access);
            build_creature_light(msg, observer.id, creature.light, observer.access);
        });

        for entry in &player.vip_entries {
            let online = world.is_player_online(entry.guid);
            self.write_with(|msg| build_vip_entry(msg, entry.guid, &entry.name, online));
        }
        self.write_with(|msg| build_icons(msg, player.icons));
    }

    /// A creature moved from `old_pos` to `new_pos`
    ///
    /// This client's own player gets the move plus every newly exposed strip
    /// and floor; other creatures are moved, added or removed depending on
    /// which end of the move is on screen.
    #[allow(clippy::too_many_arguments)]
    pub fn send_move_creature<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        creature_id: CreatureId,
        new_pos: Position,
        new_stackpos: usize,
        old_pos: Position,
        old_stackpos: usize,
        teleport: bool,
    ) {
        let Some(observer) = self.observer(world) else {
            return;
        };

        if creature_id == observer.id {
            if teleport {
                self.send_remove_tile_creature(world, creature_id, old_pos, old_stackpos);
                self.send_map_description(world, new_pos);
                return;
            }

            let mut msg = NetworkMessage::new();
            if old_pos.z == 7 && new_pos.z >= 8 {
                build_remove_tile_creature(&mut msg, creature_id, old_pos, old_stackpos);
            } else {
                msg.add_u8(ServerOpcode::MoveCreature.as_u8());
                write_thing_ref(&mut msg, old_pos, old_stackpos, creature_id);
                msg.add_position(new_pos);
            }

            let mut describer = MapDescriber::new(world, observer, &mut self.known);
            if new_pos.z > old_pos.z {
                describer.floor_change_down(&mut msg, old_pos, new_pos);
            } else if new_pos.z < old_pos.z {
                describer.floor_change_up(&mut msg, old_pos, new_pos);
            }
            describer.movement_strips(&mut msg, old_pos, new_pos);
            self.write(&msg);
            return;
        }

        let sees_old = can_see_position(observer.position, old_pos);
        let sees_new = can_see_position(observer.position, new_pos);

        if sees_old && sees_new {
            if teleport || (old_pos.z == 7 && new_pos.z >= 8) {
                self.send_remove_tile_creature(world, creature_id, old_pos, old_stackpos);
                self.send_add_creature(world, creature_id, new_pos, new_stackpos, None);
            } else {
                self.write_with(|msg| {
                    msg.add_u8(ServerOpcode::MoveCreature.as_u8());
                    write_thing_ref(msg, old_pos, old_stackpos, creature_id);
                    msg.add_position(new_pos);
                });
            }
        } else if sees_old {
            self.send_remove_tile_creature(world, creature_id, old_pos, old_stackpos);
        } else if sees_new {
            self.send_add_creature(world, creature_id, new_pos, new_stackpos, None);
        }
    }

    /// Remove a creature from a tile; deep stack positions address it by id
    pub fn send_remove_tile_creature<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        creature: CreatureId,
        pos: Position,
        stackpos: usize,
    ) {
        if stackpos < MAX_STACKPOS && !self.can_see(world, pos) {
            return;
        }
        self.write_with(|msg| build_remove_tile_creature(msg, creature, pos, stackpos));
    }

    /// Replace a creature in place (`0x6B`), always in its full form
    pub fn send_update_tile_creature<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        pos: Position,
        stackpos: usize,
        creature_id: CreatureId,
    ) {
        let Some(observer) = self.observer(world) else {
            return;
        };
        if !can_see_position(observer.position, pos) {
            return;
        }
        let Some(creature) = world.creature(creature_id) else {
            return;
        };

        let form = match self
            .known
            .check(creature_id, |known| is_creature_visible(world, &observer, known))
        {
            CreatureForm::Known => CreatureForm::New { evicted: 0 },
            form => form,
        };

        let mut msg = NetworkMessage::new();
        msg.add_u8(ServerOpcode::UpdateTileThing.as_u8());
        msg.add_position(pos);
        msg.add_u8(stackpos as u8);
        write_creature(&mut msg, &appearance_for(world, &observer, creature), form);
        self.write(&msg);
    }

    /// Resend one tile (`0x69`)
    pub fn send_update_tile<W: WorldView + ?Sized>(&mut self, world: &W, pos: Position) {
        let Some(observer) = self.observer(world) else {
            return;
        };
        if !can_see_position(observer.position, pos) {
            return;
        }

        let mut msg = NetworkMessage::new();
        msg.add_u8(ServerOpcode::UpdateTile.as_u8());
        msg.add_position(pos);
        match world.tile(pos) {
            Some(tile) => {
                MapDescriber::new(world, observer, &mut self.known).tile_description(&mut msg, tile);
                msg.add_u8(0x00);
                msg.add_u8(0xFF);
            }
            None => {
                msg.add_u8(0x01);
                msg.add_u8(0xFF);
            }
        }
        self.write(&msg);
    }

    /// Resend a tile the caller already holds
    pub fn send_tile<W: WorldView + ?Sized>(&mut self, world: &W, pos: Position, tile: &Tile) {
        let Some(observer) = self.observer(world) else {
            return;
        };
        if !can_see_position(observer.position, pos) {
            return;
        }
        let mut msg = NetworkMessage::new();
        msg.add_u8(ServerOpcode::UpdateTile.as_u8());
        msg.add_position(pos);
        MapDescriber::new(world, observer, &mut self.known).tile_description(&mut msg, tile);
        msg.add_u8(0x00);
        msg.add_u8(0xFF);
        self.write(&msg);
    }

    /// A creature changed direction
    pub fn send_creature_turn<W: WorldView + ?Sized>(&mut self, world: &W, creature_id: CreatureId, stackpos: usize) {
        if !self.can_see_creature(world, creature_id) {
            return;
        }
        let Some(creature) = world.creature(creature_id) else {
            return;
        };
        let (pos, direction) = (creature.position, creature.direction);

        self.write_with(|msg| {
            msg.add_u8(ServerOpcode::UpdateTileThing.as_u8());
            write_thing_ref(msg, pos, stackpos, creature_id);
            msg.add_u16(CREATURE_TURN);
            msg.add_u32(creature_id.get());
            msg.add_u8(direction.as_u8());
        });
    }

    //=== Tile items and effects ===//

    pub fn send_add_tile_item<W: WorldView + ?Sized>(&mut self, world: &W, pos: Position, stackpos: usize, item: &ItemDescriptor) {
        if self.can_see(world, pos) {
            self.write_with(|msg| build_add_tile_item(msg, pos, stackpos, item));
        }
    }

    pub fn send_update_tile_item<W: WorldView + ?Sized>(&mut self, world: &W, pos: Position, stackpos: usize, item: &ItemDescriptor) {
        if self.can_see(world, pos) {
            self.write_with(|msg| build_update_tile_item(msg, pos, stackpos, item));
        }
    }

    pub fn send_remove_tile_thing<W: WorldView + ?Sized>(&mut self, world: &W, pos: Position, stackpos: usize) {
        if self.can_see(world, pos) {
            self.write_with(|msg| build_remove_tile_thing(msg, pos, stackpos));
        }
    }

    pub fn send_magic_effect<W: WorldView + ?Sized>(&mut self, world: &W, pos: Position, effect: u8) {
        if self.can_see(world, pos) {
            self.write_with(|msg| build_magic_effect(msg, pos, effect));
        }
    }

    pub fn send_distance_shoot(&mut self, from: Position, to: Position, effect: u8) {
        self.write_with(|msg| build_distance_shoot(msg, from, to, effect));
    }

    pub fn send_animated_text<W: WorldView + ?Sized>(&mut self, world: &W, pos: Position, color: u8, text: &str) {
        if self.can_see(world, pos) {
            self.write_with(|msg| build_animated_text(msg, pos, color, text));
        }
    }

    //=== Creature updates ===//

    pub fn send_creature_health<W: WorldView + ?Sized>(&mut self, world: &W, creature_id: CreatureId) {
        let Some(creature) = world.creature(creature_id) else {
            return;
        };
        let percent = health_percent(creature.health, creature.max_health, creature.health_hidden);
        self.write_with(|msg| build_creature_health(msg, creature_id, percent));
    }

    pub fn send_creature_outfit<W: WorldView + ?Sized>(&mut self, world: &W, creature_id: CreatureId, outfit: &Outfit) {
        if self.can_see_creature(world, creature_id) {
            self.write_with(|msg| build_creature_outfit(msg, creature_id, outfit));
        }
    }

    pub fn send_creature_light<W: WorldView + ?Sized>(&mut self, world: &W, creature_id: CreatureId) {
        if !self.can_see_creature(world, creature_id) {
            return;
        }
        let Some(light) = world.creature(creature_id).map(|creature| creature.light) else {
            return;
        };
        let full_bright = self.is_access(world);
        self.write_with(|msg| build_creature_light(msg, creature_id, light, full_bright));
    }

    pub fn send_world_light<W: WorldView + ?Sized>(&mut self, world: &W, light: LightInfo) {
        let full_bright = self.is_access(world);
        self.write_with(|msg| build_world_light(msg, light, full_bright));
    }

    pub fn send_change_speed(&mut self, creature_id: CreatureId, speed: u16) {
        self.write_with(|msg| build_change_speed(msg, creature_id, speed));
    }

    /// Skull marker; only PvP worlds show skulls
    pub fn send_creature_skull<W: WorldView + ?Sized>(&mut self, world: &W, creature_id: CreatureId) {
        if world.world_type() != WorldType::Pvp || !self.can_see_creature(world, creature_id) {
            return;
        }
        let (Some(observer), Some(creature)) = (self.observer(world), world.creature(creature_id)) else {
            return;
        };
        let skull = world.skull_for(&observer, creature);
        self.write_with(|msg| build_creature_skull(msg, creature_id, skull));
    }

    pub fn send_creature_shield<W: WorldView + ?Sized>(&mut self, world: &W, creature_id: CreatureId) {
        if !self.can_see_creature(world, creature_id) {
            return;
        }
        let (Some(observer), Some(creature)) = (self.observer(world), world.creature(creature_id)) else {
            return;
        };
        let shield = world.shield_for(&observer, creature);
        self.write_with(|msg| build_creature_shield(msg, creature_id, shield));
    }

    pub fn send_creature_square<W: WorldView + ?Sized>(&mut self, world: &W, creature_id: CreatureId, color: u8) {
        if self.can_see_creature(world, creature_id) {
            self.write_with(|msg| build_creature_square(msg, creature_id, color));
        }
    }

    pub fn send_creature_walkthrough<W: WorldView + ?Sized>(&mut self, world: &W, creature_id: CreatureId, walkthrough: bool) {
        if self.can_see_creature(world, creature_id) {
            self.write_with(|msg| build_creature_walkthrough(msg, creature_id, walkthrough));
        }
    }

    //=== Player ===//

    pub fn send_stats<W: WorldView + ?Sized>(&mut self, world: &W) {
        let Some(id) = self.player() else {
            return;
        };
        let (Some(player), Some(creature)) = (world.player(id), world.creature(id)) else {
            return;
        };
        let stats = player.stats(creature.health, creature.max_health);
        self.write_with(|msg| build_player_stats(msg, &stats));
    }

    pub fn send_skills<W: WorldView + ?Sized>(&mut self, world: &W) {
        if let Some(player) = self.player().and_then(|id| world.player(id)) {
            let skills = player.skills;
            self.write_with(|msg| build_player_skills(msg, &skills));
        }
    }

    pub fn send_icons(&mut self, icons: u16) {
        self.write_with(|msg| build_icons(msg, icons));
    }

    pub fn send_fight_modes(&mut self, fight_mode: u8, chase: bool, secure: bool) {
        self.write_with(|msg| build_fight_modes(msg, fight_mode, chase, secure));
    }

    pub fn send_inventory_item(&mut self, slot: u8, item: Option<&ItemDescriptor>) {
        self.write_with(|msg| build_inventory_item(msg, slot, item));
    }

    pub fn send_cancel_walk(&mut self, direction: Direction) {
        self.write_with(|msg| build_cancel_walk(msg, direction));
    }

    pub fn send_cancel_target(&mut self) {
        self.write_with(build_cancel_target);
    }

    pub fn send_ping(&mut self) {
        self.write_with(build_ping);
    }

    pub fn send_relogin_window(&mut self) {
        self.write_with(build_relogin_window);
    }

    pub fn send_fyi_box(&mut self, message: &str) {
        self.write_with(|msg| build_fyi_box(msg, message));
    }

    pub fn send_text_message(&mut self, class: MessageClass, text: &str) {
        self.write_with(|msg| build_text_message(msg, class, text));
    }

    pub fn send_tutorial(&mut self, tutorial_id: u8) {
        self.write_with(|msg| build_tutorial(msg, tutorial_id));
    }

    pub fn send_map_marker(&mut self, pos: Position, mark_type: u8, description: &str) {
        self.write_with(|msg| build_map_marker(msg, pos, mark_type, description));
    }

    /// Outfit window (`0xC8`)
    ///
    /// A blank current outfit is replaced by the first available look type.
    /// Privileged players get a leading "Gamemaster" entry.
    pub fn send_outfit_window<W: WorldView + ?Sized>(&mut self, world: &W) {
        let Some(id) = self.player() else {
            return;
        };
        let (Some(player), Some(creature)) = (world.player(id), world.creature(id)) else {
            return;
        };
        let Some(first) = player.outfits.first() else {
            return;
        };

        let mut current = creature.outfit;
        if current.look_type == 0 {
            current = Outfit {
                look_type: first.look_type,
                ..Outfit::default()
            };
        }

        let mut entries = Vec::with_capacity(player.outfits.len() + 1);
        if player.is_access() {
            entries.push(OutfitEntry {
                look_type: GAMEMASTER_LOOK_TYPE,
                name: "Gamemaster".to_string(),
                addons: 0,
            });
        }
        entries.extend(player.outfits.iter().cloned());
        entries.truncate(MAX_OUTFIT_ENTRIES);

        self.write_with(|msg| build_outfit_window(msg, &current, &entries));
    }

    //=== Containers ===//

    /// Open a container window starting at `first_index`
    pub fn send_container(&mut self, cid: u8, container: &ContainerView<'_>, has_parent: bool, first_index: usize) {
        let items = container.items.get(first_index..).unwrap_or(&[]);
        self.write_with(|msg| {
            build_open_container(
                msg,
                cid,
                container.item,
                container.name,
                container.capacity,
                has_parent,
                items,
            )
        });
    }

    pub fn send_close_container(&mut self, cid: u8) {
        self.write_with(|msg| build_close_container(msg, cid));
    }

    pub fn send_add_container_item(&mut self, cid: u8, item: &ItemDescriptor) {
        self.write_with(|msg| build_add_container_item(msg, cid, item));
    }

    pub fn send_update_container_item(&mut self, cid: u8, slot: u8, item: &ItemDescriptor) {
        self.write_with(|msg| build_update_container_item(msg, cid, slot, item));
    }

    pub fn send_remove_container_item(&mut self, cid: u8, slot: u8) {
        self.write_with(|msg| build_remove_container_item(msg, cid, slot));
    }

    //=== Trade and shop ===//

    /// Trade offer; containers are listed breadth first with their contents
    pub fn send_trade_item_request(&mut self, trader: &str, item: &CarriedItem, own: bool) {
        let items = item.flatten();
        self.write_with(|msg| build_trade_items(msg, trader, &items, own));
    }

    pub fn send_close_trade(&mut self) {
        self.write_with(build_close_trade);
    }

    pub fn send_shop<W: WorldView + ?Sized>(&mut self, world: &W, items: &[ShopItem]) {
        self.write_with(|msg| write_shop(msg, world, items));
    }

    pub fn send_sale_item_list<W: WorldView + ?Sized>(&mut self, world: &W, items: &[ShopItem], counter: &dyn ItemCounter) {
        self.write_with(|msg| write_sale_list(msg, world, items, counter));
    }

    pub fn send_close_shop(&mut self) {
        self.write_with(build_close_shop);
    }

    //=== Text windows ===//

    /// Item text window; read-only windows advertise the text length as the limit
    #[allow(clippy::too_many_arguments)]
    pub fn send_text_window(
        &mut self,
        window_text_id: u32,
        item: &ItemDescriptor,
        max_length: u16,
        can_write: bool,
        text: &str,
        writer: &str,
        date: i64,
    ) {
        let limit = if can_write {
            max_length
        } else {
            text.len().min(usize::from(u16::MAX)) as u16
        };
        let date = if date != 0 { format_date_short(date) } else { String::new() };
        self.write_with(|msg| build_text_window(msg, window_text_id, item, limit, text, writer, &date));
    }

    /// Read-only text window for an item type rather than an item
    pub fn send_text_window_for_item_id(&mut self, window_text_id: u32, client_id: u16, text: &str) {
        let item = ItemDescriptor::with_subtype(client_id, 1);
        let length = text.len().min(usize::from(u16::MAX)) as u16;
        self.write_with(|msg| build_text_window(msg, window_text_id, &item, length, text, "", ""));
    }

    pub fn send_house_window(&mut self, window_text_id: u32, text: &str) {
        self.write_with(|msg| build_house_window(msg, window_text_id, text));
    }

    //=== Chat ===//

    /// Public speech at `pos`, or at the speaker's position
    pub fn send_creature_say<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        speaker: CreatureId,
        class: SpeakClass,
        text: &str,
        pos: Option<Position>,
    ) {
        let Some(creature) = world.creature(speaker) else {
            return;
        };
        let level = world.player(speaker).map(|player| player.level).unwrap_or(0);
        let pos = pos.unwrap_or(creature.position);
        let name = creature.name.clone();
        self.write_with(|msg| build_creature_say(msg, &name, level, class.as_u8(), pos, text));
    }

    /// Channel speech; the anonymous red class is shown without a name
    pub fn send_to_channel<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        speaker: CreatureId,
        class: SpeakClass,
        text: &str,
        channel_id: u16,
    ) {
        if class == SpeakClass::ChannelR2 {
            self.write_with(|msg| build_channel_say(msg, None, SpeakClass::ChannelR1.as_u8(), channel_id, text));
            return;
        }
        let Some(creature) = world.creature(speaker) else {
            return;
        };
        let level = world.player(speaker).map(|player| player.level).unwrap_or(0);
        let name = creature.name.clone();
        self.write_with(|msg| build_channel_say(msg, Some((&name, level)), class.as_u8(), channel_id, text));
    }

    /// Message from a named author that is not a creature
    pub fn send_channel_message(&mut self, author: &str, text: &str, class: SpeakClass, channel_id: u16) {
        self.write_with(|msg| build_channel_say(msg, Some((author, 0)), class.as_u8(), channel_id, text));
    }

    pub fn send_private_message(
        &mut self,
        statement_id: u32,
        speaker: Option<(&str, u16)>,
        class: SpeakClass,
        text: &str,
    ) {
        self.write_with(|msg| build_private_message(msg, statement_id, speaker, class.as_u8(), text));
    }

    pub fn send_channels_dialog(&mut self, channels: &[(u16, String)]) {
        self.write_with(|msg| build_channels_dialog(msg, channels));
    }

    pub fn send_channel(&mut self, channel_id: u16, name: &str) {
        self.write_with(|msg| build_channel(msg, channel_id, name));
    }

    pub fn send_open_private_channel(&mut self, receiver: &str) {
        self.write_with(|msg| build_open_private_channel(msg, receiver));
    }

    pub fn send_create_private_channel(&mut self, channel_id: u16, name: &str) {
        self.write_with(|msg| build_create_private_channel(msg, channel_id, name));
    }

    pub fn send_close_private_channel(&mut self, channel_id: u16) {
        self.write_with(|msg| build_close_private_channel(msg, channel_id));
    }

    //=== VIP ===//

    pub fn send_vip(&mut self, guid: PlayerGuid, name: &str, online: bool) {
        self.write_with(|msg| build_vip_entry(msg, guid, name, online));
    }

    pub fn send_updated_vip_status(&mut self, guid: PlayerGuid, online: bool) {
        self.write_with(|msg| build_vip_status(msg, guid, online));
    }

    //=== Session ===//

    /// Extended opcode payload; only OTClient-family clients understand it
    pub fn send_extended_opcode(&mut self, opcode: u8, buffer: &str) {
        if !self.os().supports_extended_opcodes() {
            return;
        }
        self.write_with(|msg| build_extended_opcode(msg, opcode, buffer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerState;
    use crate::session::{ConnectionHandle, Outbound};
    use crate::state::WorldState;
    use crate::world::Creature;
    use ots_accounts::CharacterRecord;
    use ots_core::{AccountId, AccountType, ClientOs, ConnectionId, CreatureKind};
    use tokio::sync::mpsc;

    const HOME: Position = Position::new(100, 100, 7);

    fn new_session(os: ClientOs) -> (GameSession, mpsc::UnboundedReceiver<Outbound>) {
        let (handle, rx) = ConnectionHandle::channel(ConnectionId::new(1), None);
        (GameSession::new(handle, os, 860), rx)
    }

    fn take(session: &mut GameSession, rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<u8> {
        session.flush();
        let mut bytes = Vec::new();
        while let Ok(outbound) = rx.try_recv() {
            if let Outbound::Message(msg) = outbound {
                bytes.extend_from_slice(msg.body());
            }
        }
        bytes
    }

    /// World with one player standing at `HOME`
    fn new_world(world_type: WorldType, account_type: AccountType) -> (WorldState, CreatureId) {
        let mut world = WorldState::new(world_type);
        for x in 95..=105 {
            world.set_tile(Position::new(x, 100, 7), Tile::with_ground(102));
        }

        let id = CreatureId::new(0x1000_0001);
        let mut record = CharacterRecord::new(PlayerGuid::new(1), AccountId::new(1), "Tester", HOME);
        record.account_type = account_type;
        let creature = Creature::new(id, CreatureKind::Player, &record.name, HOME);
        world.add_player(creature, PlayerState::from_record(id, &record, Vec::new()));
        world.place_creature(id, HOME).unwrap();
        (world, id)
    }

    fn add_monster(world: &mut WorldState, raw: u32, pos: Position, skull: u8) -> CreatureId {
        let id = CreatureId::new(raw);
        let mut creature = Creature::new(id, CreatureKind::Monster, "Rat", pos);
        creature.skull = skull;
        world.add_creature(creature);
        world.place_creature(id, pos).unwrap();
        id
    }

    #[test]
    fn test_outfit_window_lists_gamemaster_for_access() {
        let (world, player) = new_world(WorldType::Pvp, AccountType::Gamemaster);
        let (mut session, mut rx) = new_session(ClientOs::WINDOWS);
        session.attach(player);

        session.send_outfit_window(&world);
        let mut msg = NetworkMessage::from_body(&take(&mut session, &mut rx));
        assert_eq!(msg.get_u8(), ServerOpcode::OutfitWindow.as_u8());
        // Blank outfit falls back to the first offered look type
        assert_eq!(msg.get_u16(), 128);
        msg.skip_bytes(5);
        assert_eq!(msg.get_u8(), 5);
        assert_eq!(msg.get_u16(), GAMEMASTER_LOOK_TYPE);
        assert_eq!(msg.get_string(), "Gamemaster");
    }

    #[test]
    fn test_outfit_window_regular_player() {
        let (world, player) = new_world(WorldType::Pvp, AccountType::Normal);
        let (mut session, mut rx) = new_session(ClientOs::WINDOWS);
        session.attach(player);

        session.send_outfit_window(&world);
        let mut msg = NetworkMessage::from_body(&take(&mut session, &mut rx));
        msg.skip_bytes(1 + 7);
        assert_eq!(msg.get_u8(), 4);
        assert_eq!(msg.get_u16(), 128);
        assert_eq!(msg.get_string(), "Citizen");
    }

    #[test]
    fn test_skull_only_in_pvp_world() {
        let (mut world, player) = new_world(WorldType::Pvp, AccountType::Normal);
        let rat = add_monster(&mut world, 0x4000_0001, Position::new(102, 100, 7), 3);
        let (mut session, mut rx) = new_session(ClientOs::WINDOWS);
        session.attach(player);

        session.send_creature_skull(&world, rat);
        let bytes = take(&mut session, &mut rx);
        assert_eq!(bytes[0], ServerOpcode::CreatureSkull.as_u8());
        assert_eq!(&bytes[1..5], &0x4000_0001u32.to_le_bytes());
        assert_eq!(bytes[5], 3);

        let (mut world, player) = new_world(WorldType::NoPvp, AccountType::Normal);
        let rat = add_monster(&mut world, 0x4000_0001, Position::new(102, 100, 7), 3);
        let (mut session, mut rx) = new_session(ClientOs::WINDOWS);
        session.attach(player);
        session.send_creature_skull(&world, rat);
        assert!(take(&mut session, &mut rx).is_empty());
    }

    #[test]
    fn test_creature_turn_bytes() {
        let (mut world, player) = new_world(WorldType::Pvp, AccountType::Normal);
        let rat = add_monster(&mut world, 0x4000_0002, Position::new(101, 100, 7), 0);
        if let Some(creature) = world.creature_mut(rat) {
            creature.direction = Direction::West;
        }
        let (mut session, mut rx) = new_session(ClientOs::WINDOWS);
        session.attach(player);

        session.send_creature_turn(&world, rat, 1);
        let mut msg = NetworkMessage::from_body(&take(&mut session, &mut rx));
        assert_eq!(msg.get_u8(), 0x6B);
        assert_eq!(msg.get_position(), Position::new(101, 100, 7));
        assert_eq!(msg.get_u8(), 1);
        assert_eq!(msg.get_u16(), CREATURE_TURN);
        assert_eq!(msg.get_u32(), 0x4000_0002);
        assert_eq!(msg.get_u8(), Direction::West.as_u8());
    }

    #[test]
    fn test_events_for_unseen_creatures_are_dropped() {
        let (mut world, player) = new_world(WorldType::Pvp, AccountType::Normal);
        world.set_tile(Position::new(100, 100, 10), Tile::with_ground(102));
        let deep = add_monster(&mut world, 0x4000_0003, Position::new(100, 100, 10), 0);
        let (mut session, mut rx) = new_session(ClientOs::WINDOWS);
        session.attach(player);

        session.send_creature_turn(&world, deep, 1);
        assert!(take(&mut session, &mut rx).is_empty());
    }

    #[test]
    fn test_extended_opcode_needs_capable_client() {
        let (mut session, mut rx) = new_session(ClientOs::WINDOWS);
        session.send_extended_opcode(5, "hello");
        assert!(take(&mut session, &mut rx).is_empty());

        let (mut session, mut rx) = new_session(ClientOs::OTCLIENT_LINUX);
        session.send_extended_opcode(5, "hello");
        let mut msg = NetworkMessage::from_body(&take(&mut session, &mut rx));
        assert_eq!(msg.get_u8(), 0x32);
        assert_eq!(msg.get_u8(), 5);
        assert_eq!(msg.get_string(), "hello");
    }

    #[test]
    fn test_read_only_text_window_uses_text_length() {
        let (mut session, mut rx) = new_session(ClientOs::WINDOWS);
        let item = ItemDescriptor::plain(1949);
        session.send_text_window(7, &item, 512, false, "Beware", "", 0);

        let mut msg = NetworkMessage::from_body(&take(&mut session, &mut rx));
        assert_eq!(msg.get_u8(), ServerOpcode::TextWindow.as_u8());
        assert_eq!(msg.get_u32(), 7);
        assert_eq!(msg.get_u16(), 1949);
        assert_eq!(msg.get_u16(), 6);
        assert_eq!(msg.get_string(), "Beware");
        assert_eq!(msg.get_string(), "");
        assert_eq!(msg.get_string(), "");

        session.send_text_window(8, &item, 512, true, "", "", 0);
        let mut msg = NetworkMessage::from_body(&take(&mut session, &mut rx));
        msg.skip_bytes(1 + 4 + 2);
        assert_eq!(msg.get_u16(), 512);
    }
}
