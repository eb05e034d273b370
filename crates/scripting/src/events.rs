//! # NPC Events
//!
//! The event names a script can bind and the handler contract the world
//! calls into.
//!
//! # Purpose
//! - [`NpcEvent`] parses the event names scripts register under
//! - [`NpcEventHandler`] is what the world invokes; every method defaults to a no-op
//! - [`ScriptedNpc`] routes bound events to a [`ScriptRuntime`](crate::ScriptRuntime)

use crate::callbacks::CallbackRef;
use crate::error::{Result, ScriptError};
use crate::runtime::SharedRuntime;
use crate::shop::TradeRequest;
use crate::value::ScriptValue;
use ots_core::{CreatureId, Position, SpeakClass};
use tracing::warn;

/// Events an NPC script can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NpcEvent {
    /// A creature entered the NPC's awareness
    Appear,
    Disappear,
    Move,
    Say,
    /// Fallback shop callback when the shop session carries none
    Trade,
    CloseChannel,
    EndTrade,
    Think,
    /// A creature came within the NPC's extended sight range
    Sight,
    SpeechBubble,
}

impl NpcEvent {
    pub const ALL: [NpcEvent; 10] = [
        Self::Appear,
        Self::Disappear,
        Self::Move,
        Self::Say,
        Self::Trade,
        Self::CloseChannel,
        Self::EndTrade,
        Self::Think,
        Self::Sight,
        Self::SpeechBubble,
    ];

    /// Parse an event name as scripts spell it
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "appear" => Ok(Self::Appear),
            "disappear" => Ok(Self::Disappear),
            "move" => Ok(Self::Move),
            "say" => Ok(Self::Say),
            "trade" => Ok(Self::Trade),
            "closechannel" => Ok(Self::CloseChannel),
            "endtrade" => Ok(Self::EndTrade),
            "think" => Ok(Self::Think),
            "sight" => Ok(Self::Sight),
            "speechbubble" => Ok(Self::SpeechBubble),
            _ => Err(ScriptError::UnknownEvent(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Appear => "appear",
            Self::Disappear => "disappear",
            Self::Move => "move",
            Self::Say => "say",
            Self::Trade => "trade",
            Self::CloseChannel => "closechannel",
            Self::EndTrade => "endtrade",
            Self::Think => "think",
            Self::Sight => "sight",
            Self::SpeechBubble => "speechbubble",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Callbacks the world invokes on an NPC
#[allow(unused_variables)]
pub trait NpcEventHandler: Send {
    fn on_creature_appear(&mut self, creature: CreatureId) {}

    fn on_creature_disappear(&mut self, creature: CreatureId) {}

    fn on_creature_move(&mut self, creature: CreatureId, old_pos: Position, new_pos: Position) {}

    fn on_creature_say(&mut self, creature: CreatureId, class: SpeakClass, text: &str) {}

    /// A player bought or sold through an open shop window
    fn on_player_trade(
        &mut self,
        player: CreatureId,
        callback: Option<CallbackRef>,
        request: &TradeRequest,
    ) {
    }

    fn on_player_close_channel(&mut self, player: CreatureId) {}

    fn on_player_end_trade(&mut self, player: CreatureId) {}

    fn on_think(&mut self) {}

    fn on_creature_sight(&mut self, creature: CreatureId) {}

    /// Speech bubble shown to `player`; returns the bubble to use
    fn on_speech_bubble(&mut self, player: CreatureId, bubble: u8) -> u8 {
        bubble
    }

    /// Give a callback handle back to whoever issued it
    fn release_callback(&mut self, callback: CallbackRef) {}
}

/// Which callback, if any, each event is bound to
#[derive(Debug, Clone, Default)]
pub struct EventBindings {
    slots: [Option<CallbackRef>; NpcEvent::ALL.len()],
}

impl EventBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind by name; unknown names are logged and ignored
    pub fn bind(&mut self, name: &str, callback: CallbackRef) -> bool {
        match NpcEvent::from_name(name) {
            Ok(event) => {
                self.bind_event(event, callback);
                true
            }
            Err(err) => {
                warn!(%err, callback = %callback, "Ignoring NPC event binding");
                false
            }
        }
    }

    /// Bind `event`, returning the callback it replaced
    pub fn bind_event(&mut self, event: NpcEvent, callback: CallbackRef) -> Option<CallbackRef> {
        self.slots[event.index()].replace(callback)
    }

    pub fn unbind(&mut self, event: NpcEvent) -> Option<CallbackRef> {
        self.slots[event.index()].take()
    }

    pub fn get(&self, event: NpcEvent) -> Option<CallbackRef> {
        self.slots[event.index()]
    }

    /// Every bound handle, for release on teardown
    pub fn drain(&mut self) -> Vec<CallbackRef> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

/// NPC whose events run through a script runtime
pub struct ScriptedNpc {
    npc: CreatureId,
    bindings: EventBindings,
    runtime: SharedRuntime,
}

impl ScriptedNpc {
    pub fn new(npc: CreatureId, bindings: EventBindings, runtime: SharedRuntime) -> Self {
        Self {
            npc,
            bindings,
            runtime,
        }
    }

    pub fn bindings(&self) -> &EventBindings {
        &self.bindings
    }

    fn fire(&mut self, event: NpcEvent, args: &[ScriptValue]) -> Option<ScriptValue> {
        let callback = self.bindings.get(event)?;
        self.invoke(event, callback, args)
    }

    fn invoke(
        &mut self,
        event: NpcEvent,
        callback: CallbackRef,
        args: &[ScriptValue],
    ) -> Option<ScriptValue> {
        match self.runtime.lock().call(callback, self.npc, args) {
            Ok(value) => value,
            Err(err) => {
                warn!(npc = self.npc.get(), event = event.name(), %err, "NPC script callback failed");
                None
            }
        }
    }
}

impl NpcEventHandler for ScriptedNpc {
    fn on_creature_appear(&mut self, creature: CreatureId) {
        self.fire(NpcEvent::Appear, &[creature.into()]);
    }

    fn on_creature_disappear(&mut self, creature: CreatureId) {
        self.fire(NpcEvent::Disappear, &[creature.into()]);
    }

    fn on_creature_move(&mut self, creature: CreatureId, old_pos: Position, new_pos: Position) {
        self.fire(NpcEvent::Move, &[creature.into(), old_pos.into(), new_pos.into()]);
    }

    fn on_creature_say(&mut self, creature: CreatureId, class: SpeakClass, text: &str) {
        self.fire(NpcEvent::Say, &[creature.into(), class.as_u8().into(), text.into()]);
    }

    fn on_player_trade(
        &mut self,
        player: CreatureId,
        callback: Option<CallbackRef>,
        request: &TradeRequest,
    ) {
        let Some(callback) = callback.or_else(|| self.bindings.get(NpcEvent::Trade)) else {
            return;
        };
        let args = [
            player.into(),
            request.item_id.into(),
            request.count.into(),
            request.amount.into(),
            request.ignore.into(),
            request.in_backpacks.into(),
        ];
        self.invoke(NpcEvent::Trade, callback, &args);
    }

    fn on_player_close_channel(&mut self, player: CreatureId) {
        self.fire(NpcEvent::CloseChannel, &[player.into()]);
    }

    fn on_player_end_trade(&mut self, player: CreatureId) {
        self.fire(NpcEvent::EndTrade, &[player.into()]);
    }

    fn on_think(&mut self) {
        self.fire(NpcEvent::Think, &[]);
    }

    fn on_creature_sight(&mut self, creature: CreatureId) {
        self.fire(NpcEvent::Sight, &[creature.into()]);
    }

    fn on_speech_bubble(&mut self, player: CreatureId, bubble: u8) -> u8 {
        self.fire(NpcEvent::SpeechBubble, &[player.into(), bubble.into()])
            .and_then(|value| value.as_number())
            .and_then(|n| u8::try_from(n).ok())
            .unwrap_or(bubble)
    }

    fn release_callback(&mut self, callback: CallbackRef) {
        self.runtime.lock().release(callback);
    }
}
