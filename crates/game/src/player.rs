//! # Player State
//!
//! World-side state of a logged-in character: the parts of the character
//! record the protocol renders, the non-owning back-reference to the
//! connection that currently controls it, and the open shop session.

use crate::sale::ItemCounter;
use ots_accounts::{CharacterRecord, VipEntry};
use ots_core::{AccountId, AccountType, ClientOs, ConnectionId, CreatureId, Direction, PlayerGuid};
use ots_protocol::packet_builder::{OutfitEntry, PlayerSkills, PlayerStats};
use ots_protocol::{FightMode, ItemDescriptor};
use ots_scripting::{CallbackRef, ShopItem};
use std::collections::{BTreeMap, VecDeque};
use std::net::IpAddr;

/// Equipment slots, numbered 1 (head) to 10 (ammunition) on the wire
pub const INVENTORY_SLOTS: usize = 10;

/// An item the player carries, with the contents of containers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarriedItem {
    /// Server-side item id
    pub item_id: u16,
    /// Client encoding
    pub descriptor: ItemDescriptor,
    /// Stack count, fluid kind or charges
    pub sub_type: i32,
    /// Units this item counts for: the stack size, else 1
    pub count: u32,
    pub contents: Vec<CarriedItem>,
}

impl CarriedItem {
    pub fn new(item_id: u16, client_id: u16) -> Self {
        Self {
            item_id,
            descriptor: ItemDescriptor::plain(client_id),
            sub_type: 0,
            count: 1,
            contents: Vec::new(),
        }
    }

    pub fn stack(item_id: u16, client_id: u16, count: u8) -> Self {
        Self {
            item_id,
            descriptor: ItemDescriptor::with_subtype(client_id, count),
            sub_type: i32::from(count),
            count: u32::from(count),
            contents: Vec::new(),
        }
    }

    pub fn with_contents(mut self, contents: Vec<CarriedItem>) -> Self {
        self.contents = contents;
        self
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a CarriedItem)) {
        f(self);
        for item in &self.contents {
            item.visit(f);
        }
    }

    /// Breadth-first listing of this item and everything inside it
    pub fn flatten(&self) -> Vec<ItemDescriptor> {
        let mut listed = Vec::new();
        let mut queue = std::collections::VecDeque::from([self]);
        while let Some(item) = queue.pop_front() {
            listed.push(item.descriptor);
            queue.extend(item.contents.iter());
        }
        listed
    }
}

/// An open NPC shop window
#[derive(Debug, Clone, PartialEq)]
pub struct ShopSession {
    pub npc: CreatureId,
    pub items: Vec<ShopItem>,
    pub buy: Option<CallbackRef>,
    pub sell: Option<CallbackRef>,
}

/// Experience needed to reach `level`
pub fn experience_for_level(level: u16) -> u64 {
    let level = u64::from(level.max(1)) - 1;
    (50 * level * level * level + 400 * level - 150 * level * level) / 3
}

/// Outfits every character may wear
pub fn default_outfits() -> Vec<OutfitEntry> {
    [(128, "Citizen"), (129, "Hunter"), (130, "Mage"), (131, "Knight")]
        .into_iter()
        .map(|(look_type, name)| OutfitEntry {
            look_type,
            name: name.to_string(),
            addons: 0,
        })
        .collect()
}

/// A character present in the world
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: CreatureId,
    pub guid: PlayerGuid,
    pub account_id: AccountId,
    pub account_type: AccountType,
    pub name: String,
    pub premium: bool,
    pub can_always_login: bool,
    pub cannot_be_banned: bool,

    /// Connection currently controlling this character
    pub client: Option<ConnectionId>,
    /// A replacing login is waiting out the reconnect grace delay
    pub connecting: bool,
    pub os: ClientOs,
    pub extended_opcodes: bool,

    pub level: u16,
    pub experience: u64,
    pub mana: i32,
    pub max_mana: i32,
    pub magic_level: u8,
    pub soul: u8,
    pub capacity: u32,
    pub stamina_minutes: u16,
    pub skills: PlayerSkills,
    pub icons: u16,

    pub fight_mode: FightMode,
    pub chase: bool,
    pub secure: bool,
    pub in_fight: bool,
    pub dead: bool,
    /// Remaining autowalk steps, one taken per think tick
    pub walk_queue: VecDeque<Direction>,
    /// World-clock milliseconds of the last ping answer
    pub last_pong: u64,

    pub inventory: [Option<CarriedItem>; INVENTORY_SLOTS],
    pub money: u64,
    pub outfits: Vec<OutfitEntry>,
    pub vip_entries: Vec<VipEntry>,
    pub shop: Option<ShopSession>,

    pub last_ip: Option<IpAddr>,
    pub last_login: i64,
}

impl PlayerState {
    /// Build the world state of a freshly loaded character
    pub fn from_record(id: CreatureId, record: &CharacterRecord, vip_entries: Vec<VipEntry>) -> Self {
        tracing::debug!("Creating player {}: {}", id.get(), record.name);

        Self {
            id,
            guid: record.guid,
            account_id: record.account_id,
            account_type: record.account_type,
            name: record.name.clone(),
            premium: record.premium,
            can_always_login: record.can_always_login,
            cannot_be_banned: record.cannot_be_banned,
            client: None,
            connecting: false,
            os: ClientOs::default(),
            extended_opcodes: false,
            level: record.level,
            experience: record.experience,
            mana: record.mana,
            max_mana: record.max_mana,
            magic_level: record.magic_level,
            soul: record.soul,
            capacity: record.capacity,
            stamina_minutes: record.stamina_minutes,
            skills: [(10, 0); 7],
            icons: 0,
            fight_mode: FightMode::Balanced,
            chase: false,
            secure: true,
            in_fight: false,
            dead: false,
            walk_queue: VecDeque::new(),
            last_pong: 0,
            inventory: Default::default(),
            money: 0,
            outfits: default_outfits(),
            vip_entries,
            shop: None,
            last_ip: record.last_ip,
            last_login: record.last_login,
        }
    }

    /// Gamemasters and above
    pub fn is_access(&self) -> bool {
        self.account_type.is_privileged()
    }

    pub fn can_report_bugs(&self) -> bool {
        self.account_type >= AccountType::Tutor
    }

    /// Progress towards the next level, in percent
    pub fn level_percent(&self) -> u8 {
        let current = experience_for_level(self.level);
        let next = experience_for_level(self.level.saturating_add(1));
        if next <= current || self.experience < current {
            return 0;
        }
        ((self.experience - current) * 100 / (next - current)).min(100) as u8
    }

    /// Stats block for `0xA0`
    pub fn stats(&self, health: i32, max_health: i32) -> PlayerStats {
        let clamp_u16 = |value: i32| value.clamp(0, i32::from(u16::MAX)) as u16;
        PlayerStats {
            health: clamp_u16(health),
            max_health: clamp_u16(max_health),
            free_capacity: self.capacity,
            experience: self.experience.min(u64::from(u32::MAX)) as u32,
            level: self.level,
            level_percent: self.level_percent(),
            mana: clamp_u16(self.mana),
            max_mana: clamp_u16(self.max_mana),
            magic_level: self.magic_level,
            magic_level_percent: 0,
            soul: self.soul,
            stamina_minutes: self.stamina_minutes,
        }
    }

    /// Client encoding of the item in a 1-based equipment slot
    pub fn inventory_item(&self, slot: u8) -> Option<&ItemDescriptor> {
        let index = usize::from(slot).checked_sub(1)?;
        self.inventory.get(index)?.as_ref().map(|item| &item.descriptor)
    }

    fn carried(&self) -> impl Iterator<Item = &CarriedItem> {
        let mut all = Vec::new();
        for item in self.inventory.iter().flatten() {
            item.visit(&mut |carried| all.push(carried));
        }
        all.into_iter()
    }
}

impl ItemCounter for PlayerState {
    fn item_type_count(&self, item_id: u16, sub_type: i32) -> u32 {
        self.carried()
            .filter(|item| item.item_id == item_id && (sub_type == -1 || item.sub_type == sub_type))
            .map(|item| item.count)
            .sum()
    }

    fn all_item_type_counts(&self) -> BTreeMap<u16, u32> {
        let mut counts = BTreeMap::new();
        for item in self.carried() {
            *counts.entry(item.item_id).or_insert(0) += item.count;
        }
        counts
    }

    fn money(&self) -> u64 {
        self.money
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ots_core::Position;

    fn player() -> PlayerState {
        let record = CharacterRecord::new(
            PlayerGuid::new(7),
            AccountId::new(1),
            "Tester",
            Position::new(100, 100, 7),
        );
        PlayerState::from_record(CreatureId::new(0x1000_0001), &record, Vec::new())
    }

    #[test]
    fn test_player_creation() {
        let player = player();
        assert_eq!(player.guid, PlayerGuid::new(7));
        assert_eq!(player.client, None);
        assert!(!player.is_access());
        assert!(!player.can_report_bugs());
        assert_eq!(player.outfits.len(), 4);
    }

    #[test]
    fn test_experience_table() {
        assert_eq!(experience_for_level(1), 0);
        assert_eq!(experience_for_level(2), 100);
        assert_eq!(experience_for_level(8), 4200);

        let mut player = player();
        player.level = 1;
        player.experience = 50;
        assert_eq!(player.level_percent(), 50);
    }

    #[test]
    fn test_item_counts_include_containers() {
        let mut player = player();
        let backpack = CarriedItem::new(1988, 2854).with_contents(vec![
            CarriedItem::stack(3031, 3031, 100),
            CarriedItem::stack(3031, 3031, 25),
            CarriedItem::new(3264, 3264),
        ]);
        player.inventory[2] = Some(backpack);
        player.inventory[5] = Some(CarriedItem::new(3264, 3264));

        assert_eq!(player.item_type_count(3031, -1), 125);
        assert_eq!(player.item_type_count(3031, 25), 25);
        assert_eq!(player.item_type_count(3264, -1), 2);

        let counts = player.all_item_type_counts();
        assert_eq!(counts.get(&1988), Some(&1));
        assert_eq!(counts.get(&3031), Some(&125));

        assert_eq!(player.inventory_item(3).map(|item| item.client_id), Some(2854));
        assert_eq!(player.inventory_item(0), None);
        assert_eq!(player.inventory_item(11), None);
    }

    #[test]
    fn test_flatten_is_breadth_first() {
        let inner = CarriedItem::new(2, 20).with_contents(vec![CarriedItem::new(4, 40)]);
        let outer = CarriedItem::new(1, 10).with_contents(vec![inner, CarriedItem::new(3, 30)]);

        let ids: Vec<u16> = outer.flatten().iter().map(|item| item.client_id).collect();
        assert_eq!(ids, vec![10, 20, 30, 40]);
    }
}
