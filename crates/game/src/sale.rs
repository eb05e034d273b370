//! # Shop Messages
//!
//! The NPC shop window (`0x7A`) and the player's sellable-items list (`0x7B`).
//!
//! ## Sale counts
//! Only shop entries with a sell price are considered. Items that carry a
//! subtype but do not stack (fluid containers, charged items) are matched on
//! the subtype the shop names. Small shops (five entries or fewer) query the
//! player's inventory once per entry; larger shops take one snapshot of every
//! carried count and only query again for entries with a subtype. Both paths
//! yield the same map.

use crate::world::{ItemType, WorldView};
use ots_protocol::{fluid_to_client, NetworkMessage, ServerOpcode};
use ots_scripting::ShopItem;
use std::collections::BTreeMap;

/// Shops up to this size are counted entry by entry
const SMALL_SHOP_SIZE: usize = 5;

/// Carried-item queries used to build the sale list
pub trait ItemCounter {
    /// Number of `item_id` carried; `sub_type` of `-1` matches any subtype
    fn item_type_count(&self, item_id: u16, sub_type: i32) -> u32;

    /// Carried count of every item id
    fn all_item_type_counts(&self) -> BTreeMap<u16, u32>;

    fn money(&self) -> u64;
}

fn wanted_sub_type(item_type: Option<&ItemType>, shop_item: &ShopItem) -> i32 {
    match item_type {
        Some(it) if it.has_sub_type && !it.stackable && shop_item.sub_type != 0 => shop_item.sub_type,
        _ => -1,
    }
}

/// Sellable counts keyed by server item id, for entries the player holds
pub fn sale_counts<W: WorldView + ?Sized>(world: &W, shop: &[ShopItem], counter: &dyn ItemCounter) -> BTreeMap<u16, u32> {
    let mut sale = BTreeMap::new();

    if shop.len() <= SMALL_SHOP_SIZE {
        for shop_item in shop.iter().filter(|item| item.sell_price != 0) {
            let sub_type = wanted_sub_type(world.item_type(shop_item.item_id), shop_item);
            let count = counter.item_type_count(shop_item.item_id, sub_type);
            if count > 0 {
                sale.insert(shop_item.item_id, count);
            }
        }
        return sale;
    }

    let carried = counter.all_item_type_counts();
    for shop_item in shop.iter().filter(|item| item.sell_price != 0) {
        let sub_type = wanted_sub_type(world.item_type(shop_item.item_id), shop_item);

        let count = if sub_type != -1 {
            counter.item_type_count(shop_item.item_id, sub_type)
        } else {
            carried.get(&shop_item.item_id).copied().unwrap_or(0)
        };

        if count > 0 {
            sale.insert(shop_item.item_id, count);
        }
    }
    sale
}

fn client_id<W: WorldView + ?Sized>(world: &W, item_id: u16) -> u16 {
    world.item_type(item_id).map(|it| it.client_id).unwrap_or(item_id)
}

/// Build the shop window (`0x7A`)
///
/// # Packet Format
/// ```text
/// {0x7A}{u8 count}
/// ({u16 client id}{u8 fluid}{str name}{u32 weight}{u32 buy}{u32 sell})*count
/// ```
pub fn write_shop<W: WorldView + ?Sized>(msg: &mut NetworkMessage, world: &W, items: &[ShopItem]) {
    msg.add_u8(ServerOpcode::ShopWindow.as_u8());

    let count = items.len().min(0xFF);
    msg.add_u8(count as u8);

    for item in &items[..count] {
        let item_type = world.item_type(item.item_id);
        msg.add_u16(client_id(world, item.item_id));

        let fluid = match item_type {
            Some(it) if it.is_fluid() => fluid_to_client(item.sub_type.clamp(0, i32::from(u16::MAX)) as u16),
            _ => 0x00,
        };
        msg.add_u8(fluid);

        msg.add_string(&item.name);
        msg.add_u32(item_type.map(|it| it.weight).unwrap_or(0));
        msg.add_u32(item.buy_price.clamp(0, i64::from(u32::MAX)) as u32);
        msg.add_u32(item.sell_price.clamp(0, i64::from(u32::MAX)) as u32);
    }
}

/// Build the sale list (`0x7B`)
///
/// # Packet Format
/// ```text
/// {0x7B}{u32 money}{u8 count}({u16 client id}{u8 count})*count
/// ```
/// Entries are ordered by server item id.
pub fn write_sale_list<W: WorldView + ?Sized>(
    msg: &mut NetworkMessage,
    world: &W,
    shop: &[ShopItem],
    counter: &dyn ItemCounter,
) {
    msg.add_u8(ServerOpcode::SaleItemList.as_u8());
    msg.add_u32(counter.money().min(u64::from(u32::MAX)) as u32);

    let sale = sale_counts(world, shop, counter);
    let count = sale.len().min(0xFF);
    msg.add_u8(count as u8);

    for (&item_id, &carried) in sale.iter().take(count) {
        msg.add_u16(client_id(world, item_id));
        msg.add_u8(carried.min(0xFF) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerState;
    use crate::world::{Creature, Tile};
    use ots_core::{CreatureId, LightInfo, Position, WorldType};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Catalog {
        types: HashMap<u16, ItemType>,
    }

    impl WorldView for Catalog {
        fn tile(&self, _pos: Position) -> Option<&Tile> {
            None
        }

        fn creature(&self, _id: CreatureId) -> Option<&Creature> {
            None
        }

        fn player(&self, _id: CreatureId) -> Option<&PlayerState> {
            None
        }

        fn item_type(&self, id: u16) -> Option<&ItemType> {
            self.types.get(&id)
        }

        fn world_light(&self) -> LightInfo {
            LightInfo::default()
        }

        fn world_type(&self) -> WorldType {
            WorldType::Pvp
        }
    }

    /// Carried items as (item id, subtype, count)
    struct Bag(Vec<(u16, i32, u32)>);

    impl ItemCounter for Bag {
        fn item_type_count(&self, item_id: u16, sub_type: i32) -> u32 {
            self.0
                .iter()
                .filter(|(id, st, _)| *id == item_id && (sub_type == -1 || *st == sub_type))
                .map(|(_, _, count)| count)
                .sum()
        }

        fn all_item_type_counts(&self) -> BTreeMap<u16, u32> {
            let mut counts = BTreeMap::new();
            for (id, _, count) in &self.0 {
                *counts.entry(*id).or_insert(0) += count;
            }
            counts
        }

        fn money(&self) -> u64 {
            1234
        }
    }

    fn shop_item(item_id: u16, sell_price: i64) -> ShopItem {
        ShopItem {
            item_id,
            sub_type: 0,
            buy_price: 10,
            sell_price,
            name: format!("item {}", item_id),
        }
    }

    #[test]
    fn test_small_shop_counts_priced_held_items() {
        let catalog = Catalog::default();
        let shop = vec![
            shop_item(100, 5),
            shop_item(101, 0),
            shop_item(102, 7),
            shop_item(103, 0),
            shop_item(104, 9),
        ];
        // 101 is held but unpriced
        let bag = Bag(vec![(100, 0, 3), (101, 0, 1), (102, 0, 1), (104, 0, 250)]);

        let sale = sale_counts(&catalog, &shop, &bag);
        assert_eq!(sale.into_iter().collect::<Vec<_>>(), vec![(100, 3), (102, 1), (104, 250)]);
    }

    #[test]
    fn test_small_and_large_shops_agree() {
        let mut catalog = Catalog::default();
        let mut vial = ItemType::new(200, 2006, "vial");
        vial.fluid_container = true;
        vial.has_sub_type = true;
        catalog.types.insert(200, vial);

        let mut vial_of_mana = shop_item(200, 5);
        vial_of_mana.sub_type = 7;
        let bag = Bag(vec![(100, 0, 2), (200, 7, 1), (200, 2, 4)]);

        let small = vec![shop_item(100, 1), vial_of_mana.clone()];
        let mut large = small.clone();
        large.extend((300..305).map(|id| shop_item(id, 1)));

        let expected = vec![(100, 2), (200, 1)];
        assert_eq!(sale_counts(&catalog, &small, &bag).into_iter().collect::<Vec<_>>(), expected);
        assert_eq!(sale_counts(&catalog, &large, &bag).into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_charged_items_counted_from_inventory() {
        let mut catalog = Catalog::default();
        let mut rod = ItemType::new(500, 3065, "rod");
        rod.has_sub_type = true;
        catalog.types.insert(500, rod);

        let mut charged_rod = shop_item(500, 40);
        charged_rod.sub_type = 3;
        let small = vec![shop_item(100, 1), charged_rod];
        let mut large = small.clone();
        large.extend((300..305).map(|id| shop_item(id, 1)));

        // No rod carried: neither path lists it
        let bag = Bag(vec![(100, 0, 2)]);
        let expected = vec![(100, 2)];
        assert_eq!(sale_counts(&catalog, &small, &bag).into_iter().collect::<Vec<_>>(), expected);
        assert_eq!(sale_counts(&catalog, &large, &bag).into_iter().collect::<Vec<_>>(), expected);

        // Only rods with the named charge count
        let bag = Bag(vec![(100, 0, 2), (500, 3, 1), (500, 1, 1)]);
        let expected = vec![(100, 2), (500, 1)];
        assert_eq!(sale_counts(&catalog, &small, &bag).into_iter().collect::<Vec<_>>(), expected);
        assert_eq!(sale_counts(&catalog, &large, &bag).into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_sale_list_bytes() {
        let mut catalog = Catalog::default();
        catalog.types.insert(100, ItemType::new(100, 3031, "gold"));

        let bag = Bag(vec![(100, 0, 300)]);
        let mut msg = NetworkMessage::new();
        write_sale_list(&mut msg, &catalog, &[shop_item(100, 1)], &bag);

        let mut expected = vec![0x7B];
        expected.extend(1234u32.to_le_bytes());
        expected.push(1);
        expected.extend(3031u16.to_le_bytes());
        expected.push(0xFF);
        assert_eq!(msg.body(), expected.as_slice());
    }

    #[test]
    fn test_shop_window_bytes() {
        let mut catalog = Catalog::default();
        let mut sword = ItemType::new(100, 3264, "sword");
        sword.weight = 3500;
        catalog.types.insert(100, sword);

        let mut item = shop_item(100, 25);
        item.buy_price = -5;
        let mut msg = NetworkMessage::new();
        write_shop(&mut msg, &catalog, &[item]);

        let body = msg.body();
        assert_eq!(&body[..5], &[0x7A, 1, 0xC0, 0x0C, 0x00]);
        // name, then weight, buy clamped to zero, sell
        let rest = &body[5 + 2 + "item 100".len()..];
        assert_eq!(&rest[..4], &3500u32.to_le_bytes());
        assert_eq!(&rest[4..8], &0u32.to_le_bytes());
        assert_eq!(&rest[8..12], &25u32.to_le_bytes());
    }
}
