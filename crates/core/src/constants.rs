//! Protocol-wide constants shared by the codec, the map builder and the login path.

/// Lowest accepted client protocol version.
pub const CLIENT_VERSION_MIN: u16 = 860;
/// Highest accepted client protocol version.
pub const CLIENT_VERSION_MAX: u16 = 860;
/// Human-readable client version, used in the version rejection message.
pub const CLIENT_VERSION_STR: &str = "8.60";

/// Half-width of the client viewport, not counting the centre column.
pub const MAX_CLIENT_VIEWPORT_X: i32 = 8;
/// Half-height of the client viewport, not counting the centre row.
pub const MAX_CLIENT_VIEWPORT_Y: i32 = 6;
/// Width of a full map description (18).
pub const MAP_VIEW_WIDTH: i32 = MAX_CLIENT_VIEWPORT_X * 2 + 2;
/// Height of a full map description (14).
pub const MAP_VIEW_HEIGHT: i32 = MAX_CLIENT_VIEWPORT_Y * 2 + 2;

/// Number of floors in the map.
pub const MAP_MAX_LAYERS: i32 = 16;
/// Ground floor; floors above it are visible from the surface.
pub const GROUND_FLOOR: u8 = 7;
/// Highest stack position the client can address.
pub const MAX_STACKPOS: usize = 10;

/// Number of creatures a client keeps full descriptions for.
pub const KNOWN_CREATURE_LIMIT: usize = 250;

/// Perishable tasks older than this are dropped by the world loop.
pub const DISPATCHER_TASK_EXPIRATION_MS: u64 = 2000;
/// Delay before a replacing login takes over an existing character.
pub const RECONNECT_GRACE_MS: u64 = 1000;

/// Protocol identifier of the game protocol in the first frame.
pub const GAME_PROTOCOL_ID: u8 = 0x0A;
