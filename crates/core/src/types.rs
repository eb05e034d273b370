//! Core type definitions

use serde::{Deserialize, Serialize};

/// In-world creature id (players, NPCs and monsters share the namespace)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CreatureId(pub u32);

impl CreatureId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for CreatureId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Persistent character id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerGuid(pub u32);

impl PlayerGuid {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Persistent account id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u32);

impl AccountId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Transport connection id, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Client operating system as reported in the first message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClientOs(pub u16);

impl ClientOs {
    pub const LINUX: ClientOs = ClientOs(1);
    pub const WINDOWS: ClientOs = ClientOs(2);
    pub const FLASH: ClientOs = ClientOs(3);
    pub const OTCLIENT_LINUX: ClientOs = ClientOs(10);
    pub const OTCLIENT_WINDOWS: ClientOs = ClientOs(11);
    pub const OTCLIENT_MAC: ClientOs = ClientOs(12);

    /// OTClient builds understand the extended opcode channel
    pub fn supports_extended_opcodes(&self) -> bool {
        *self >= Self::OTCLIENT_LINUX
    }
}

/// Account privilege tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    Normal = 1,
    Tutor = 2,
    SeniorTutor = 3,
    Gamemaster = 4,
    God = 5,
}

impl AccountType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::Tutor),
            3 => Some(Self::SeniorTutor),
            4 => Some(Self::Gamemaster),
            5 => Some(Self::God),
            _ => None,
        }
    }

    /// Gamemasters and above bypass capacity and account limits
    pub fn is_privileged(&self) -> bool {
        *self >= Self::Gamemaster
    }
}

/// World lifecycle state, read by the login path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    #[default]
    Startup,
    Init,
    Normal,
    Closed,
    Shutdown,
    Closing,
    Maintain,
}

/// PvP ruleset of the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorldType {
    NoPvp,
    #[default]
    Pvp,
    PvpEnforced,
}

impl WorldType {
    pub fn from_name(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "no-pvp" | "nopvp" | "non-pvp" => Some(Self::NoPvp),
            "pvp" => Some(Self::Pvp),
            "pvp-enforced" | "enforced" => Some(Self::PvpEnforced),
            _ => None,
        }
    }
}

/// Speech classes understood by the 8.60 client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SpeakClass {
    Say = 1,
    Whisper = 2,
    Yell = 3,
    PrivatePn = 4,
    PrivateNp = 5,
    Private = 6,
    ChannelY = 7,
    ChannelW = 8,
    RvrChannel = 9,
    RvrAnswer = 10,
    RvrContinue = 11,
    Broadcast = 12,
    ChannelR1 = 13,
    PrivateRed = 14,
    ChannelO = 15,
    ChannelR2 = 17,
    MonsterSay = 19,
    MonsterYell = 20,
}

impl SpeakClass {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Say,
            2 => Self::Whisper,
            3 => Self::Yell,
            4 => Self::PrivatePn,
            5 => Self::PrivateNp,
            6 => Self::Private,
            7 => Self::ChannelY,
            8 => Self::ChannelW,
            9 => Self::RvrChannel,
            10 => Self::RvrAnswer,
            11 => Self::RvrContinue,
            12 => Self::Broadcast,
            13 => Self::ChannelR1,
            14 => Self::PrivateRed,
            15 => Self::ChannelO,
            17 => Self::ChannelR2,
            19 => Self::MonsterSay,
            20 => Self::MonsterYell,
            _ => return None,
        })
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Creature outfit as rendered by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Outfit {
    pub look_type: u16,
    pub look_type_ex: u16,
    pub head: u8,
    pub body: u8,
    pub legs: u8,
    pub feet: u8,
    pub addons: u8,
}

impl Outfit {
    pub const fn new(look_type: u16, head: u8, body: u8, legs: u8, feet: u8, addons: u8) -> Self {
        Self {
            look_type,
            look_type_ex: 0,
            head,
            body,
            legs,
            feet,
            addons,
        }
    }

    /// Outfit rendered as an item sprite
    pub const fn item(client_id: u16) -> Self {
        Self {
            look_type: 0,
            look_type_ex: client_id,
            head: 0,
            body: 0,
            legs: 0,
            feet: 0,
            addons: 0,
        }
    }
}

/// Light level and color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LightInfo {
    pub level: u8,
    pub color: u8,
}

impl LightInfo {
    pub const fn new(level: u8, color: u8) -> Self {
        Self { level, color }
    }
}
