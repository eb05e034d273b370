//! Creature appearance as rendered for one observer

use crate::world::{Creature, Observer, WorldView};
use ots_core::{LightInfo, Outfit};
use ots_protocol::packet_builder::{health_percent, CreatureAppearance, FULL_BRIGHTNESS};

/// Resolve everything the client draws for `creature` from `observer`'s point of view
///
/// Ghosts and invisible creatures get a blank outfit; privileged observers see
/// every creature at full brightness.
pub fn appearance_for<W: WorldView + ?Sized>(world: &W, observer: &Observer, creature: &Creature) -> CreatureAppearance {
    let outfit = if creature.ghost || creature.invisible {
        Outfit::default()
    } else {
        creature.outfit
    };

    let light = if observer.access {
        LightInfo::new(FULL_BRIGHTNESS, creature.light.color)
    } else {
        creature.light
    };

    CreatureAppearance {
        id: creature.id,
        name: creature.name.clone(),
        health_percent: health_percent(creature.health, creature.max_health, creature.health_hidden),
        direction: creature.direction,
        outfit,
        light,
        speed: creature.speed,
        skull: world.skull_for(observer, creature),
        shield: world.shield_for(observer, creature),
        emblem: world.emblem_for(observer, creature),
        walkthrough: world.can_walkthrough(observer, creature),
    }
}
