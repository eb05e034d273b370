//! Shop windows opened by NPC scripts

use crate::callbacks::CallbackRef;
use ots_core::CreatureId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One line of an NPC's price list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItem {
    /// Server-side item type id
    pub item_id: u16,
    /// Fluid type or charge count, 0 when the item has none
    pub sub_type: i32,
    pub buy_price: i64,
    /// 0 means the NPC does not buy the item back
    pub sell_price: i64,
    pub name: String,
}

/// Purchase or sale forwarded to the shop's callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeRequest {
    pub item_id: u16,
    pub count: u8,
    pub amount: u16,
    pub ignore: bool,
    pub in_backpacks: bool,
}

/// Requests a script makes of the shop layer
#[derive(Debug, Clone, PartialEq)]
pub enum ShopRequest {
    Open {
        npc: CreatureId,
        player: CreatureId,
        items: Vec<ShopItem>,
        buy: Option<CallbackRef>,
        sell: Option<CallbackRef>,
    },
    Close {
        npc: CreatureId,
        player: CreatureId,
    },
}

/// Players that currently have this NPC's shop open
#[derive(Debug, Clone, Default)]
pub struct ShopPlayers {
    players: BTreeSet<CreatureId>,
}

impl ShopPlayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, player: CreatureId) {
        self.players.insert(player);
    }

    pub fn remove(&mut self, player: CreatureId) -> bool {
        self.players.remove(&player)
    }

    pub fn contains(&self, player: CreatureId) -> bool {
        self.players.contains(&player)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Empty the set; the caller closes each returned player's window
    pub fn close_all(&mut self) -> Vec<CreatureId> {
        std::mem::take(&mut self.players).into_iter().collect()
    }
}

/// Shop requests raised by scripts, drained by the world loop after each task
#[derive(Debug, Clone, Default)]
pub struct ShopRequestQueue {
    pending: Arc<Mutex<Vec<ShopRequest>>>,
}

impl ShopRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: ShopRequest) {
        self.pending.lock().push(request);
    }

    pub fn drain(&self) -> Vec<ShopRequest> {
        std::mem::take(&mut *self.pending.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_queue_shared_between_clones() {
        let queue = ShopRequestQueue::new();
        let script_side = queue.clone();
        script_side.push(ShopRequest::Close {
            npc: CreatureId(0x2000_0001),
            player: CreatureId(0x1000_0001),
        });

        assert_eq!(queue.drain().len(), 1);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_shop_players() {
        let mut shop = ShopPlayers::new();
        shop.add(CreatureId(0x1000_0002));
        shop.add(CreatureId(0x1000_0001));
        shop.add(CreatureId(0x1000_0001));
        assert_eq!(shop.len(), 2);
        assert!(shop.remove(CreatureId(0x1000_0002)));
        assert!(!shop.remove(CreatureId(0x1000_0002)));

        shop.add(CreatureId(0x1000_0003));
        assert_eq!(
            shop.close_all(),
            vec![CreatureId(0x1000_0001), CreatureId(0x1000_0003)]
        );
        assert!(shop.is_empty());
    }
}
