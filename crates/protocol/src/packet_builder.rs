//! # Packet Builder
//!
//! Builders for server-to-client messages that need no knowledge of the
//! observer's viewport. Each builder appends one complete message (type byte
//! and payload) to a [`NetworkMessage`]; callers decide whether the client
//! should receive it.
//!
//! ## Usage
//!
//! ```rust
//! use ots_protocol::{packet_builder::*, NetworkMessage};
//!
//! let mut msg = NetworkMessage::new();
//! build_disconnect(&mut msg, "You are already logged in.");
//! assert_eq!(msg.body()[0], 0x14);
//! ```

use crate::codecs::{ItemDescriptor, NetworkMessage};
use crate::packets::{
    MessageClass, ServerOpcode, CREATURE_KNOWN, CREATURE_UNKNOWN, STACKPOS_BY_ID,
};
use ots_core::{CreatureId, Direction, LightInfo, Outfit, PlayerGuid, Position, MAX_STACKPOS};

/// Light level sent to privileged observers
pub const FULL_BRIGHTNESS: u8 = 0xFF;

/// Short or long creature form in tile and stack listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatureForm {
    /// Client already holds the creature; only the id is sent
    Known,
    /// First sighting; `evicted` names the known slot the client must free (0 for none)
    New { evicted: u32 },
}

/// Everything the client renders for one creature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatureAppearance {
    pub id: CreatureId,
    pub name: String,
    pub health_percent: u8,
    pub direction: Direction,
    pub outfit: Outfit,
    pub light: LightInfo,
    pub speed: u16,
    pub skull: u8,
    pub shield: u8,
    pub emblem: u8,
    pub walkthrough: bool,
}

/// Health bar value: 0 if hidden, else the ceiling of the percentage
pub fn health_percent(health: i32, max_health: i32, hidden: bool) -> u8 {
    if hidden {
        return 0;
    }
    let max = i64::from(max_health.max(1));
    let health = i64::from(health.max(0));
    let percent = (health * 100 + max - 1) / max;
    percent.min(u8::MAX as i64) as u8
}

/// Player stats block (`0xA0`), already clamped to wire widths by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerStats {
    pub health: u16,
    pub max_health: u16,
    pub free_capacity: u32,
    pub experience: u32,
    pub level: u16,
    pub level_percent: u8,
    pub mana: u16,
    pub max_mana: u16,
    pub magic_level: u8,
    pub magic_level_percent: u8,
    pub soul: u8,
    pub stamina_minutes: u16,
}

/// Seven skills as (level, percent): fist, club, sword, axe, distance, shielding, fishing
pub type PlayerSkills = [(u8, u8); 7];

/// One selectable outfit in the outfit window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutfitEntry {
    pub look_type: u16,
    pub name: String,
    pub addons: u8,
}

/// Most outfits the 8.60 client will list
pub const MAX_OUTFIT_ENTRIES: usize = 50;

/// Write an outfit: item sprite outfits carry the item id instead of colors
pub fn write_outfit(msg: &mut NetworkMessage, outfit: &Outfit) {
    msg.add_u16(outfit.look_type);
    if outfit.look_type != 0 {
        msg.add_u8(outfit.head);
        msg.add_u8(outfit.body);
        msg.add_u8(outfit.legs);
        msg.add_u8(outfit.feet);
        msg.add_u8(outfit.addons);
    } else {
        msg.add_item_id(outfit.look_type_ex);
    }
}

/// Write a creature in its known or new form
///
/// # Packet Format
/// ```text
/// known: {u16 0x62}{u32 id}
/// new:   {u16 0x61}{u32 evicted}{u32 id}{str name}
/// then:  {u8 health%}{u8 dir}{outfit}{u8 light}{u8 color}{u16 speed}
///        {u8 skull}{u8 shield}[{u8 emblem} new only]{u8 blocking}
/// ```
pub fn write_creature(msg: &mut NetworkMessage, creature: &CreatureAppearance, form: CreatureForm) {
    match form {
        CreatureForm::Known => {
            msg.add_u16(CREATURE_KNOWN);
            msg.add_u32(creature.id.get());
        }
        CreatureForm::New { evicted } => {
            msg.add_u16(CREATURE_UNKNOWN);
            msg.add_u32(evicted);
            msg.add_u32(creature.id.get());
            msg.add_string(&creature.name);
        }
    }

    msg.add_u8(creature.health_percent);
    msg.add_u8(creature.direction.as_u8());
    write_outfit(msg, &creature.outfit);
    msg.add_u8(creature.light.level);
    msg.add_u8(creature.light.color);
    msg.add_u16(creature.speed);
    msg.add_u8(creature.skull);
    msg.add_u8(creature.shield);
    if matches!(form, CreatureForm::New { .. }) {
        msg.add_u8(creature.emblem);
    }
    msg.add_u8(if creature.walkthrough { 0x00 } else { 0x01 });
}

/// Address a thing on a tile, or a creature by id when its stack position is too deep
pub fn write_thing_ref(msg: &mut NetworkMessage, pos: Position, stackpos: usize, creature: CreatureId) {
    if stackpos < MAX_STACKPOS {
        msg.add_position(pos);
        msg.add_u8(stackpos as u8);
    } else {
        msg.add_u16(STACKPOS_BY_ID);
        msg.add_u32(creature.get());
    }
}

//=== Session ===//

/// Build a disconnect message (`0x14`)
///
/// # Purpose
/// Shown by the client as a modal error before the connection closes. Every
/// login rejection is delivered this way.
///
/// # Packet Format
/// ```text
/// {0x14}{str message}
/// ```
pub fn build_disconnect(msg: &mut NetworkMessage, message: &str) {
    msg.add_u8(ServerOpcode::Disconnect.as_u8());
    msg.add_string(message);
}

/// Build a waiting list message (`0x16`)
///
/// # Purpose
/// Tells a client the world is full, its 1-based place in the queue and how
/// many seconds to wait before the automatic retry.
///
/// # Packet Format
/// ```text
/// {0x16}{str text}{u8 retry seconds}
/// ```
pub fn build_waiting_list(msg: &mut NetworkMessage, slot: usize, retry_seconds: u8) {
    msg.add_u8(ServerOpcode::WaitingList.as_u8());
    msg.add_string(&format!(
        "Too many players online.\nYou are at place {} on the waiting list.",
        slot
    ));
    msg.add_u8(retry_seconds);
}

/// Announce extended opcode support to clients that understand it
pub fn build_extended_opcode_announcement(msg: &mut NetworkMessage) {
    msg.add_u8(ServerOpcode::ExtendedOpcode.as_u8());
    msg.add_u8(0x00);
    msg.add_u16(0x0000);
}

/// Build an extended opcode message (`0x32`)
pub fn build_extended_opcode(msg: &mut NetworkMessage, opcode: u8, buffer: &str) {
    msg.add_u8(ServerOpcode::ExtendedOpcode.as_u8());
    msg.add_u8(opcode);
    msg.add_string(buffer);
}

/// Build the self-appear header (`0x0A`) that opens the login burst
///
/// # Packet Format
/// ```text
/// {0x0A}{u32 own id}{u16 beat duration}{u8 can report bugs}
/// ```
pub fn build_self_appear(msg: &mut NetworkMessage, player: CreatureId, can_report_bugs: bool) {
    msg.add_u8(ServerOpcode::SelfAppear.as_u8());
    msg.add_u32(player.get());
    msg.add_u16(0x32);
    msg.add_u8(u8::from(can_report_bugs));
}

pub fn build_ping(msg: &mut NetworkMessage) {
    msg.add_u8(ServerOpcode::Ping.as_u8());
}

pub fn build_relogin_window(msg: &mut NetworkMessage) {
    msg.add_u8(ServerOpcode::ReLoginWindow.as_u8());
}

pub fn build_fyi_box(msg: &mut NetworkMessage, message: &str) {
    msg.add_u8(ServerOpcode::FyiBox.as_u8());
    msg.add_string(message);
}

pub fn build_text_message(msg: &mut NetworkMessage, class: MessageClass, text: &str) {
    msg.add_u8(ServerOpcode::TextMessage.as_u8());
    msg.add_u8(class.as_u8());
    msg.add_string(text);
}

//=== Tiles and effects ===//

/// Build a remove-thing message (`0x6C`); nothing is written for deep stack positions
pub fn build_remove_tile_thing(msg: &mut NetworkMessage, pos: Position, stackpos: usize) {
    if stackpos >= MAX_STACKPOS {
        return;
    }
    msg.add_u8(ServerOpcode::RemoveTileThing.as_u8());
    msg.add_position(pos);
    msg.add_u8(stackpos as u8);
}

/// Build a remove-creature message, addressing the creature by id when needed
pub fn build_remove_tile_creature(
    msg: &mut NetworkMessage,
    creature: CreatureId,
    pos: Position,
    stackpos: usize,
) {
    if stackpos < MAX_STACKPOS {
        build_remove_tile_thing(msg, pos, stackpos);
        return;
    }
    msg.add_u8(ServerOpcode::RemoveTileThing.as_u8());
    msg.add_u16(STACKPOS_BY_ID);
    msg.add_u32(creature.get());
}

pub fn build_add_tile_item(msg: &mut NetworkMessage, pos: Position, stackpos: usize, item: &ItemDescriptor) {
    msg.add_u8(ServerOpcode::AddTileThing.as_u8());
    msg.add_position(pos);
    msg.add_u8(stackpos as u8);
    msg.add_item(item);
}

pub fn build_update_tile_item(msg: &mut NetworkMessage, pos: Position, stackpos: usize, item: &ItemDescriptor) {
    msg.add_u8(ServerOpcode::UpdateTileThing.as_u8());
    msg.add_position(pos);
    msg.add_u8(stackpos as u8);
    msg.add_item(item);
}

pub fn build_magic_effect(msg: &mut NetworkMessage, pos: Position, effect: u8) {
    msg.add_u8(ServerOpcode::MagicEffect.as_u8());
    msg.add_position(pos);
    msg.add_u8(effect);
}

pub fn build_distance_shoot(msg: &mut NetworkMessage, from: Position, to: Position, effect: u8) {
    msg.add_u8(ServerOpcode::DistanceShoot.as_u8());
    msg.add_position(from);
    msg.add_position(to);
    msg.add_u8(effect);
}

pub fn build_animated_text(msg: &mut NetworkMessage, pos: Position, color: u8, text: &str) {
    msg.add_u8(ServerOpcode::AnimatedText.as_u8());
    msg.add_position(pos);
    msg.add_u8(color);
    msg.add_string(text);
}

/// World light; `full_bright` overrides the level for privileged observers
pub fn build_world_light(msg: &mut NetworkMessage, light: LightInfo, full_bright: bool) {
    msg.add_u8(ServerOpcode::WorldLight.as_u8());
    msg.add_u8(if full_bright { FULL_BRIGHTNESS } else { light.level });
    msg.add_u8(light.color);
}

pub fn build_map_marker(msg: &mut NetworkMessage, pos: Position, mark_type: u8, description: &str) {
    msg.add_u8(ServerOpcode::MapMarker.as_u8());
    msg.add_position(pos);
    msg.add_u8(mark_type);
    msg.add_string(description);
}

pub fn build_tutorial(msg: &mut NetworkMessage, tutorial_id: u8) {
    msg.add_u8(ServerOpcode::Tutorial.as_u8());
    msg.add_u8(tutorial_id);
}

//=== Creatures ===//

pub fn build_creature_health(msg: &mut NetworkMessage, creature: CreatureId, percent: u8) {
    msg.add_u8(ServerOpcode::CreatureHealth.as_u8());
    msg.add_u32(creature.get());
    msg.add_u8(percent);
}

pub fn build_creature_light(msg: &mut NetworkMessage, creature: CreatureId, light: LightInfo, full_bright: bool) {
    msg.add_u8(ServerOpcode::CreatureLight.as_u8());
    msg.add_u32(creature.get());
    msg.add_u8(if full_bright { FULL_BRIGHTNESS } else { light.level });
    msg.add_u8(light.color);
}

pub fn build_creature_outfit(msg: &mut NetworkMessage, creature: CreatureId, outfit: &Outfit) {
    msg.add_u8(ServerOpcode::CreatureOutfit.as_u8());
    msg.add_u32(creature.get());
    write_outfit(msg, outfit);
}

pub fn build_change_speed(msg: &mut NetworkMessage, creature: CreatureId, speed: u16) {
    msg.add_u8(ServerOpcode::ChangeSpeed.as_u8());
    msg.add_u32(creature.get());
    msg.add_u16(speed);
}

pub fn build_creature_skull(msg: &mut NetworkMessage, creature: CreatureId, skull: u8) {
    msg.add_u8(ServerOpcode::CreatureSkull.as_u8());
    msg.add_u32(creature.get());
    msg.add_u8(skull);
}

pub fn build_creature_shield(msg: &mut NetworkMessage, creature: CreatureId, shield: u8) {
    msg.add_u8(ServerOpcode::CreatureShield.as_u8());
    msg.add_u32(creature.get());
    msg.add_u8(shield);
}

pub fn build_creature_square(msg: &mut NetworkMessage, creature: CreatureId, color: u8) {
    msg.add_u8(ServerOpcode::CreatureSquare.as_u8());
    msg.add_u32(creature.get());
    msg.add_u8(color);
}

/// Walkthrough flag is inverted on the wire: 0 means passable
pub fn build_creature_walkthrough(msg: &mut NetworkMessage, creature: CreatureId, walkthrough: bool) {
    msg.add_u8(ServerOpcode::CreatureWalkthrough.as_u8());
    msg.add_u32(creature.get());
    msg.add_u8(if walkthrough { 0x00 } else { 0x01 });
}

pub fn build_cancel_walk(msg: &mut NetworkMessage, direction: Direction) {
    msg.add_u8(ServerOpcode::CancelWalk.as_u8());
    msg.add_u8(direction.as_u8());
}

pub fn build_cancel_target(msg: &mut NetworkMessage) {
    msg.add_u8(ServerOpcode::CancelTarget.as_u8());
    msg.add_u32(0);
}

//=== Player ===//

/// Build the stats block (`0xA0`)
///
/// # Packet Format
/// ```text
/// {0xA0}{u16 hp}{u16 max hp}{u32 cap}{u32 exp}{u16 level}{u8 level%}
/// {u16 mana}{u16 max mana}{u8 magic level}{u8 magic%}{u8 soul}{u16 stamina}
/// ```
pub fn build_player_stats(msg: &mut NetworkMessage, stats: &PlayerStats) {
    msg.add_u8(ServerOpcode::PlayerStats.as_u8());
    msg.add_u16(stats.health);
    msg.add_u16(stats.max_health);
    msg.add_u32(stats.free_capacity);
    msg.add_u32(stats.experience.min(0x7FFF_FFFF));
    msg.add_u16(stats.level);
    msg.add_u8(stats.level_percent);
    msg.add_u16(stats.mana);
    msg.add_u16(stats.max_mana);
    msg.add_u8(stats.magic_level);
    msg.add_u8(stats.magic_level_percent);
    msg.add_u8(stats.soul);
    msg.add_u16(stats.stamina_minutes);
}

pub fn build_player_skills(msg: &mut NetworkMessage, skills: &PlayerSkills) {
    msg.add_u8(ServerOpcode::PlayerSkills.as_u8());
    for &(level, percent) in skills {
        msg.add_u8(level);
        msg.add_u8(percent);
    }
}

pub fn build_icons(msg: &mut NetworkMessage, icons: u16) {
    msg.add_u8(ServerOpcode::PlayerIcons.as_u8());
    msg.add_u16(icons);
}

pub fn build_fight_modes(msg: &mut NetworkMessage, fight_mode: u8, chase: bool, secure: bool) {
    msg.add_u8(ServerOpcode::FightModes.as_u8());
    msg.add_u8(fight_mode);
    msg.add_u8(u8::from(chase));
    msg.add_u8(u8::from(secure));
}

/// Inventory slot contents; an empty slot uses its own opcode
pub fn build_inventory_item(msg: &mut NetworkMessage, slot: u8, item: Option<&ItemDescriptor>) {
    match item {
        Some(item) => {
            msg.add_u8(ServerOpcode::InventoryItem.as_u8());
            msg.add_u8(slot);
            msg.add_item(item);
        }
        None => {
            msg.add_u8(ServerOpcode::InventoryEmpty.as_u8());
            msg.add_u8(slot);
        }
    }
}

/// Build the outfit window (`0xC8`), capped at [`MAX_OUTFIT_ENTRIES`]
pub fn build_outfit_window(msg: &mut NetworkMessage, current: &Outfit, entries: &[OutfitEntry]) {
    msg.add_u8(ServerOpcode::OutfitWindow.as_u8());
    write_outfit(msg, current);

    let count = entries.len().min(MAX_OUTFIT_ENTRIES);
    msg.add_u8(count as u8);
    for entry in &entries[..count] {
        msg.add_u16(entry.look_type);
        msg.add_string(&entry.name);
        msg.add_u8(entry.addons);
    }
}

//=== Containers ===//

/// Build an open-container message (`0x6E`)
///
/// # Packet Format
/// ```text
/// {0x6E}{u8 cid}{item container}{str name}{u8 capacity}{u8 has parent}
/// {u8 count}{item}*count
/// ```
pub fn build_open_container(
    msg: &mut NetworkMessage,
    cid: u8,
    container: &ItemDescriptor,
    name: &str,
    capacity: u8,
    has_parent: bool,
    items: &[ItemDescriptor],
) {
    msg.add_u8(ServerOpcode::OpenContainer.as_u8());
    msg.add_u8(cid);
    msg.add_item(container);
    msg.add_string(name);
    msg.add_u8(capacity);
    msg.add_u8(u8::from(has_parent));

    let count = items.len().min(0xFF);
    msg.add_u8(count as u8);
    for item in &items[..count] {
        msg.add_item(item);
    }
}

pub fn build_close_container(msg: &mut NetworkMessage, cid: u8) {
    msg.add_u8(ServerOpcode::CloseContainer.as_u8());
    msg.add_u8(cid);
}

pub fn build_add_container_item(msg: &mut NetworkMessage, cid: u8, item: &ItemDescriptor) {
    msg.add_u8(ServerOpcode::AddContainerItem.as_u8());
    msg.add_u8(cid);
    msg.add_item(item);
}

pub fn build_update_container_item(msg: &mut NetworkMessage, cid: u8, slot: u8, item: &ItemDescriptor) {
    msg.add_u8(ServerOpcode::UpdateContainerItem.as_u8());
    msg.add_u8(cid);
    msg.add_u8(slot);
    msg.add_item(item);
}

pub fn build_remove_container_item(msg: &mut NetworkMessage, cid: u8, slot: u8) {
    msg.add_u8(ServerOpcode::RemoveContainerItem.as_u8());
    msg.add_u8(cid);
    msg.add_u8(slot);
}

//=== Trade ===//

/// Trade offer (`0x7D` own, `0x7E` counter) with the flattened item list
pub fn build_trade_items(msg: &mut NetworkMessage, trader: &str, items: &[ItemDescriptor], own: bool) {
    let opcode = if own {
        ServerOpcode::TradeItemOwn
    } else {
        ServerOpcode::TradeItemCounter
    };
    msg.add_u8(opcode.as_u8());
    msg.add_string(trader);

    let count = items.len().min(0xFF);
    msg.add_u8(count as u8);
    for item in &items[..count] {
        msg.add_item(item);
    }
}

pub fn build_close_trade(msg: &mut NetworkMessage) {
    msg.add_u8(ServerOpcode::CloseTrade.as_u8());
}

pub fn build_close_shop(msg: &mut NetworkMessage) {
    msg.add_u8(ServerOpcode::CloseShop.as_u8());
}

//=== Text windows ===//

/// Readable or writable item text (`0x96`)
///
/// # Arguments
/// * `max_length` - Editable length; read-only windows pass the text length
/// * `writer` / `date` - Empty strings are sent as zero-length fields
pub fn build_text_window(
    msg: &mut NetworkMessage,
    window_text_id: u32,
    item: &ItemDescriptor,
    max_length: u16,
    text: &str,
    writer: &str,
    date: &str,
) {
    msg.add_u8(ServerOpcode::TextWindow.as_u8());
    msg.add_u32(window_text_id);
    msg.add_item(item);
    msg.add_u16(max_length);
    msg.add_string(text);
    msg.add_string(writer);
    msg.add_string(date);
}

pub fn build_house_window(msg: &mut NetworkMessage, window_text_id: u32, text: &str) {
    msg.add_u8(ServerOpcode::HouseWindow.as_u8());
    msg.add_u8(0x00);
    msg.add_u32(window_text_id);
    msg.add_string(text);
}

//=== Chat ===//

/// Public speech (`0xAA`) at a position
///
/// # Packet Format
/// ```text
/// {0xAA}{u32 0}{str name}{u16 level}{u8 class}{pos}{str text}
/// ```
pub fn build_creature_say(
    msg: &mut NetworkMessage,
    name: &str,
    level: u16,
    class: u8,
    pos: Position,
    text: &str,
) {
    msg.add_u8(ServerOpcode::CreatureSay.as_u8());
    msg.add_u32(0);
    msg.add_string(name);
    msg.add_u16(level);
    msg.add_u8(class);
    msg.add_position(pos);
    msg.add_string(text);
}

/// Channel speech (`0xAA`); an anonymous speaker writes only an empty name
pub fn build_channel_say(
    msg: &mut NetworkMessage,
    speaker: Option<(&str, u16)>,
    class: u8,
    channel_id: u16,
    text: &str,
) {
    msg.add_u8(ServerOpcode::CreatureSay.as_u8());
    msg.add_u32(0);
    match speaker {
        Some((name, level)) => {
            msg.add_string(name);
            msg.add_u16(level);
        }
        None => msg.add_string(""),
    }
    msg.add_u8(class);
    msg.add_u16(channel_id);
    msg.add_string(text);
}

/// Private message (`0xAA`) with a running statement id
pub fn build_private_message(
    msg: &mut NetworkMessage,
    statement_id: u32,
    speaker: Option<(&str, u16)>,
    class: u8,
    text: &str,
) {
    msg.add_u8(ServerOpcode::CreatureSay.as_u8());
    msg.add_u32(statement_id);
    match speaker {
        Some((name, level)) => {
            msg.add_string(name);
            msg.add_u16(level);
        }
        None => msg.add_u32(0),
    }
    msg.add_u8(class);
    msg.add_string(text);
}

pub fn build_channels_dialog(msg: &mut NetworkMessage, channels: &[(u16, String)]) {
    msg.add_u8(ServerOpcode::ChannelsDialog.as_u8());
    let count = channels.len().min(0xFF);
    msg.add_u8(count as u8);
    for (id, name) in &channels[..count] {
        msg.add_u16(*id);
        msg.add_string(name);
    }
}

pub fn build_channel(msg: &mut NetworkMessage, channel_id: u16, name: &str) {
    msg.add_u8(ServerOpcode::Channel.as_u8());
    msg.add_u16(channel_id);
    msg.add_string(name);
}

pub fn build_open_private_channel(msg: &mut NetworkMessage, receiver: &str) {
    msg.add_u8(ServerOpcode::OpenPrivateChannel.as_u8());
    msg.add_string(receiver);
}

pub fn build_create_private_channel(msg: &mut NetworkMessage, channel_id: u16, name: &str) {
    msg.add_u8(ServerOpcode::CreatePrivateChannel.as_u8());
    msg.add_u16(channel_id);
    msg.add_string(name);
}

pub fn build_close_private_channel(msg: &mut NetworkMessage, channel_id: u16) {
    msg.add_u8(ServerOpcode::ClosePrivateChannel.as_u8());
    msg.add_u16(channel_id);
}

//=== VIP ===//

pub fn build_vip_entry(msg: &mut NetworkMessage, guid: PlayerGuid, name: &str, online: bool) {
    msg.add_u8(ServerOpcode::VipEntry.as_u8());
    msg.add_u32(guid.get());
    msg.add_string(name);
    msg.add_u8(u8::from(online));
}

pub fn build_vip_status(msg: &mut NetworkMessage, guid: PlayerGuid, online: bool) {
    let opcode = if online {
        ServerOpcode::VipOnline
    } else {
        ServerOpcode::VipOffline
    };
    msg.add_u8(opcode.as_u8());
    msg.add_u32(guid.get());
}
