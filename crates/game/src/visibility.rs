//! # Visibility Tracker
//!
//! Answers whether a position or creature is on a client's screen, and keeps
//! the per-connection set of creatures the client already holds a full
//! description for.
//!
//! ## Viewport
//! The window is 18×14 tiles around the observer, shifted diagonally by the
//! floor difference. From the surface (z <= 7) only floors 0..=7 are visible;
//! underground only floors within two of the observer's.

use crate::world::{Observer, WorldView};
use ots_core::{CreatureId, Position, GROUND_FLOOR, KNOWN_CREATURE_LIMIT, MAX_CLIENT_VIEWPORT_X, MAX_CLIENT_VIEWPORT_Y};
use ots_protocol::packet_builder::CreatureForm;
use std::collections::{HashSet, VecDeque};

/// Whether signed coordinates fall inside the viewport of an observer at `center`
pub fn can_see(center: Position, x: i32, y: i32, z: i32) -> bool {
    let my_z = i32::from(center.z);
    let ground = i32::from(GROUND_FLOOR);

    if my_z <= ground {
        if z > ground {
            return false;
        }
    } else if (my_z - z).abs() > 2 {
        return false;
    }

    let offset_z = my_z - z;
    let (my_x, my_y) = (i32::from(center.x), i32::from(center.y));

    x >= my_x - MAX_CLIENT_VIEWPORT_X + offset_z
        && x <= my_x + MAX_CLIENT_VIEWPORT_X + 1 + offset_z
        && y >= my_y - MAX_CLIENT_VIEWPORT_Y + offset_z
        && y <= my_y + MAX_CLIENT_VIEWPORT_Y + 1 + offset_z
}

#[inline]
pub fn can_see_position(center: Position, pos: Position) -> bool {
    can_see(center, i32::from(pos.x), i32::from(pos.y), i32::from(pos.z))
}

/// Whether `id` is a live creature the observer can currently see on screen
pub fn is_creature_visible<W: WorldView + ?Sized>(world: &W, observer: &Observer, id: CreatureId) -> bool {
    match world.creature(id) {
        Some(creature) if !creature.removed => {
            observer.can_see_creature(creature) && can_see_position(observer.position, creature.position)
        }
        _ => false,
    }
}

/// Stack position of `id` on its tile as the observer sees it
///
/// # Returns
/// `None` if the creature is unknown, off its tile or hidden from the observer
pub fn stackpos_for<W: WorldView + ?Sized>(world: &W, observer: &Observer, id: CreatureId) -> Option<usize> {
    let creature = world.creature(id)?;
    if !observer.can_see_creature(creature) {
        return None;
    }
    let tile = world.tile(creature.position)?;
    tile.creature_stackpos(id, |other| {
        world
            .creature(other)
            .map(|other| observer.can_see_creature(other))
            .unwrap_or(false)
    })
}

/// Creatures the client already knows, in insertion order
///
/// The client mirrors this set; every eviction must be reported through the
/// `evicted` id of a new creature description or the two drift apart.
#[derive(Debug, Default)]
pub struct KnownCreatures {
    order: VecDeque<CreatureId>,
    members: HashSet<CreatureId>,
}

impl KnownCreatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: CreatureId) -> bool {
        self.members.contains(&id)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Mark `id` as known and choose the description form
    ///
    /// # Arguments
    /// * `id` - Creature about to be described
    /// * `is_visible` - Whether a known creature is still on screen
    ///
    /// # Returns
    /// [`CreatureForm::Known`] if the client already holds `id`. Otherwise
    /// [`CreatureForm::New`] with the id freed to stay under the cap: the
    /// oldest creature no longer visible, else the oldest entry other than
    /// `id`, else 0.
    pub fn check(&mut self, id: CreatureId, is_visible: impl Fn(CreatureId) -> bool) -> CreatureForm {
        if !self.members.insert(id) {
            return CreatureForm::Known;
        }
        self.order.push_back(id);

        if self.order.len() <= KNOWN_CREATURE_LIMIT {
            return CreatureForm::New { evicted: 0 };
        }

        let victim = self
            .order
            .iter()
            .position(|&known| known != id && !is_visible(known))
            .or_else(|| self.order.iter().position(|&known| known != id));

        let evicted = match victim.and_then(|index| self.order.remove(index)) {
            Some(evicted) => {
                self.members.remove(&evicted);
                tracing::trace!("Evicted known creature {}", evicted.get());
                evicted.get()
            }
            None => 0,
        };
        CreatureForm::New { evicted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: Position = Position::new(100, 100, 7);

    #[test]
    fn test_can_see_surface() {
        assert!(can_see(CENTER, 92, 94, 7));
        assert!(can_see(CENTER, 109, 107, 7));
        assert!(!can_see(CENTER, 91, 100, 7));
        assert!(!can_see(CENTER, 110, 100, 7));
        assert!(!can_see(CENTER, 100, 93, 7));
        assert!(!can_see(CENTER, 100, 108, 7));

        // Observer at z=7 cannot see underground
        assert!(!can_see(CENTER, 100, 100, 8));
        // Upper floors shift the window by the floor difference
        assert!(can_see(CENTER, 110, 100, 6));
        assert!(!can_see(CENTER, 92, 100, 6));
        assert!(can_see(CENTER, 100, 100, 0));
    }

    #[test]
    fn test_can_see_underground() {
        let center = Position::new(100, 100, 9);
        for z in 7..=11 {
            assert!(can_see(center, 100, 100, z), "floor {}", z);
        }
        assert!(!can_see(center, 100, 100, 6));
        assert!(!can_see(center, 100, 100, 12));
    }

    #[test]
    fn test_can_see_translation() {
        let moved = Position::new(150, 120, 7);
        for (dx, dy) in [(-8, -6), (9, 7), (0, 0), (-9, 0), (0, 8)] {
            assert_eq!(
                can_see(CENTER, 100 + dx, 100 + dy, 7),
                can_see(moved, 150 + dx, 120 + dy, 7)
            );
        }
    }

    #[test]
    fn test_known_creatures_no_eviction_under_cap() {
        let mut known = KnownCreatures::new();
        for id in 1..=KNOWN_CREATURE_LIMIT as u32 {
            assert_eq!(known.check(CreatureId::new(id), |_| true), CreatureForm::New { evicted: 0 });
        }
        assert_eq!(known.len(), KNOWN_CREATURE_LIMIT);
        assert_eq!(known.check(CreatureId::new(7), |_| true), CreatureForm::Known);
    }

    #[test]
    fn test_known_creatures_evicts_first_invisible() {
        let mut known = KnownCreatures::new();
        for id in 1..=KNOWN_CREATURE_LIMIT as u32 {
            known.check(CreatureId::new(id), |_| true);
        }

        let hidden = [CreatureId::new(40), CreatureId::new(90)];
        let form = known.check(CreatureId::new(1000), |id| !hidden.contains(&id));
        assert_eq!(form, CreatureForm::New { evicted: 40 });
        assert_eq!(known.len(), KNOWN_CREATURE_LIMIT);
        assert!(!known.contains(CreatureId::new(40)));
        assert!(known.contains(CreatureId::new(1000)));
    }

    #[test]
    fn test_known_creatures_fallback_skips_inserted() {
        let mut known = KnownCreatures::new();
        for id in 1..=KNOWN_CREATURE_LIMIT as u32 {
            known.check(CreatureId::new(id), |_| true);
        }

        // Everything visible: the oldest entry goes
        let form = known.check(CreatureId::new(1000), |_| true);
        assert_eq!(form, CreatureForm::New { evicted: 1 });

        // The just-inserted id is never the victim, even when it alone is hidden
        let form = known.check(CreatureId::new(1001), |id| id != CreatureId::new(1001));
        assert_eq!(form, CreatureForm::New { evicted: 2 });
        assert!(known.contains(CreatureId::new(1001)));
    }
}
