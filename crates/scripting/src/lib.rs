//! # OTS Scripting
//!
//! The boundary between the game protocol and the NPC scripting runtime.
//!
//! ## Features
//! - NPC event names and the [`NpcEventHandler`] contract
//! - Opaque [`CallbackRef`] handles with explicit release
//! - [`NpcAgent`]: event routing, sight cache and shop set per NPC
//! - Library and script loading that logs failures instead of aborting
//!
//! The server never interprets scripts. [`ScriptRuntime`] is the seam;
//! [`NativeRuntime`] backs it with Rust closures.

pub mod callbacks;
pub mod error;
pub mod events;
pub mod library;
pub mod npc;
pub mod runtime;
pub mod shop;
pub mod sight;
pub mod value;

pub use callbacks::{CallbackRef, CallbackRegistry};
pub use error::{Result, ScriptError};
pub use events::{EventBindings, NpcEvent, NpcEventHandler, ScriptedNpc};
pub use library::{load_npc_script, NpcLibrary, ScriptLoader, SourceLoader};
pub use npc::NpcAgent;
pub use runtime::{NativeRuntime, ScriptRuntime, SharedRuntime};
pub use shop::{ShopItem, ShopPlayers, ShopRequest, ShopRequestQueue, TradeRequest};
pub use sight::{npc_can_see, SightCache, Spectator};
pub use value::ScriptValue;
