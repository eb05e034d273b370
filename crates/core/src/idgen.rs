//! Creature id allocation with segmented ranges

use crate::CreatureId;
use std::sync::atomic::{AtomicU32, Ordering};

/// Kind of creature an id is allocated for; each kind owns a disjoint range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreatureKind {
    Player,
    Npc,
    Monster,
}

impl CreatureKind {
    /// First id of the kind's segment
    pub const fn segment_start(&self) -> u32 {
        match self {
            Self::Player => 0x1000_0000,
            Self::Npc => 0x2000_0000,
            Self::Monster => 0x4000_0000,
        }
    }

    const fn segment_end(&self) -> u32 {
        match self {
            Self::Player => 0x2000_0000,
            Self::Npc => 0x4000_0000,
            Self::Monster => 0x8000_0000,
        }
    }

    /// Classify an id by the segment it falls into
    pub fn of(id: CreatureId) -> Option<Self> {
        [Self::Player, Self::Npc, Self::Monster]
            .into_iter()
            .find(|kind| (kind.segment_start()..kind.segment_end()).contains(&id.0))
    }
}

/// Thread-safe creature id generator
///
/// Ids wrap back to the start of their segment once exhausted.
pub struct CreatureIdAllocator {
    players: AtomicU32,
    npcs: AtomicU32,
    monsters: AtomicU32,
}

impl CreatureIdAllocator {
    pub fn new() -> Self {
        Self {
            players: AtomicU32::new(CreatureKind::Player.segment_start()),
            npcs: AtomicU32::new(CreatureKind::Npc.segment_start()),
            monsters: AtomicU32::new(CreatureKind::Monster.segment_start()),
        }
    }

    /// Get the next available id for `kind`
    pub fn next(&self, kind: CreatureKind) -> CreatureId {
        let counter = match kind {
            CreatureKind::Player => &self.players,
            CreatureKind::Npc => &self.npcs,
            CreatureKind::Monster => &self.monsters,
        };
        let start = kind.segment_start();
        let end = kind.segment_end();
        let raw = counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(if current + 1 >= end { start } else { current + 1 })
            })
            .unwrap_or(start);
        CreatureId(raw)
    }
}

impl Default for CreatureIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let gen = CreatureIdAllocator::new();
        let id1 = gen.next(CreatureKind::Player);
        let id2 = gen.next(CreatureKind::Player);
        assert_ne!(id1, id2);
        assert_eq!(id1, CreatureId(0x1000_0000));
    }

    #[test]
    fn test_segments_are_disjoint() {
        let gen = CreatureIdAllocator::new();
        let npc = gen.next(CreatureKind::Npc);
        let monster = gen.next(CreatureKind::Monster);
        assert_eq!(npc, CreatureId(0x2000_0000));
        assert_eq!(CreatureKind::of(npc), Some(CreatureKind::Npc));
        assert_eq!(CreatureKind::of(monster), Some(CreatureKind::Monster));
        assert_eq!(CreatureKind::of(CreatureId(5)), None);
    }
}
