//! NPC awareness: viewport, sight cache and short-range vision

use ots_core::{CreatureId, Position};
use std::collections::HashSet;

/// Half-width of the area an NPC tracks creatures in
pub const NPC_VIEWPORT_X: i32 = 9;
/// Half-height of the area an NPC tracks creatures in
pub const NPC_VIEWPORT_Y: i32 = 7;
/// Range of [`npc_can_see`]
pub const NPC_VIEW_RANGE: i32 = 3;

/// A creature near the NPC as reported by the world on each think tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spectator {
    pub id: CreatureId,
    pub position: Position,
    pub is_player: bool,
}

/// Whether an NPC standing at `npc_pos` sees `pos`
pub fn npc_can_see(npc_pos: Position, pos: Position) -> bool {
    npc_pos.is_in_range(&pos, NPC_VIEW_RANGE, NPC_VIEW_RANGE)
}

/// Creatures already reported to the `sight` event
#[derive(Debug, Clone, Default)]
pub struct SightCache {
    range_x: i32,
    range_y: i32,
    seen: HashSet<CreatureId>,
}

impl SightCache {
    /// A zero range on both axes disables the cache
    pub fn new(range_x: i32, range_y: i32) -> Self {
        Self {
            range_x,
            range_y,
            seen: HashSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.range_x > 0 || self.range_y > 0
    }

    pub fn contains(&self, creature: CreatureId) -> bool {
        self.seen.contains(&creature)
    }

    /// Run one think tick
    ///
    /// Forgets creatures that left the viewport, then records creatures inside
    /// the sight range that were not cached yet.
    ///
    /// # Returns
    /// Newly sighted creatures other than the NPC itself, in `spectators` order
    pub fn update(
        &mut self,
        npc: CreatureId,
        npc_pos: Position,
        spectators: &[Spectator],
    ) -> Vec<CreatureId> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let in_viewport: HashSet<CreatureId> = spectators
            .iter()
            .filter(|s| npc_pos.is_in_range(&s.position, NPC_VIEWPORT_X, NPC_VIEWPORT_Y))
            .map(|s| s.id)
            .collect();
        self.seen.retain(|id| in_viewport.contains(id));

        let mut sighted = Vec::new();
        for spectator in spectators {
            if !npc_pos.is_in_range(&spectator.position, self.range_x, self.range_y) {
                continue;
            }
            if self.seen.insert(spectator.id) && spectator.id != npc {
                sighted.push(spectator.id);
            }
        }
        sighted
    }
}
