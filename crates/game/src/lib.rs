//! # OTS World Context
//!
//! Everything that runs on the single world-mutation task: the world view,
//! per-session visibility, the map description builder, the outbound
//! message composer, the login procedure and the command handlers.
//!
//! ## Modules
//!
//! - `world` - Tiles, creatures and the read-only [`WorldView`] trait
//! - `state` - The in-memory [`WorldState`]
//! - `visibility` - Viewport rules and the known-creature set
//! - `map_description` - Full, strip and floor-change map descriptions
//! - `composer` - One send operation per client-visible event
//! - `sale` - Shop window and sale list
//! - `session` - World-side half of a connection
//! - `manager` - Session registry
//! - `dispatcher` - Task queue between the network and world contexts
//! - `game` - The world loop and its broadcasts
//! - `login` - Login, reconnect, release and logout
//! - `handlers` - Decoded client commands
//! - `waitlist` - Queue for a full world

mod appearance;
pub mod composer;
pub mod dispatcher;
pub mod error;
pub mod game;
mod handlers;
mod login;
pub mod manager;
pub mod map_description;
pub mod player;
pub mod sale;
pub mod session;
pub mod state;
pub mod visibility;
pub mod waitlist;
pub mod world;

// Re-export commonly used types
pub use composer::ContainerView;
pub use dispatcher::{LoginRequest, TaskQueue, TaskReceiver, WorldTask};
pub use error::{GameError, LoginRejection, Result};
pub use game::{Game, GameSettings, SharedGameState};
pub use manager::SessionManager;
pub use player::{CarriedItem, PlayerState};
pub use session::{ConnectionHandle, GameSession, Outbound};
pub use state::WorldState;
pub use waitlist::WaitList;
pub use world::{Creature, ItemType, Tile, TileFlags, WorldView};
