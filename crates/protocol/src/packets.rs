//! # Opcode Namespaces
//!
//! Every client message starts with a [`ClientOpcode`] byte and every server
//! message with a [`ServerOpcode`] byte. The two namespaces overlap
//! numerically and are unrelated.
//!
//! Gaps in the client table are reserved: the dispatcher forwards unknown
//! bytes opaquely instead of rejecting them.

/// Opcodes sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientOpcode {
    /// Close the connection (accepted in every state)
    CloseConnection = 0x0F,
    Logout = 0x14,
    Ping = 0x1E,
    /// OTClient extended opcode: `{u8 opcode}{string buffer}`
    ExtendedOpcode = 0x32,

    //=== Movement ===//
    /// `{u8 count}{count * u8 compass code}`
    AutoWalk = 0x64,
    MoveNorth = 0x65,
    MoveEast = 0x66,
    MoveSouth = 0x67,
    MoveWest = 0x68,
    StopAutoWalk = 0x69,
    MoveNorthEast = 0x6A,
    MoveSouthEast = 0x6B,
    MoveSouthWest = 0x6C,
    MoveNorthWest = 0x6D,
    TurnNorth = 0x6F,
    TurnEast = 0x70,
    TurnSouth = 0x71,
    TurnWest = 0x72,

    //=== Items, shops and trade ===//
    Throw = 0x78,
    LookInShop = 0x79,
    Purchase = 0x7A,
    Sale = 0x7B,
    CloseShop = 0x7C,
    RequestTrade = 0x7D,
    LookInTrade = 0x7E,
    AcceptTrade = 0x7F,
    CloseTrade = 0x80,
    UseItem = 0x82,
    UseItemEx = 0x83,
    UseWithCreature = 0x84,
    RotateItem = 0x85,
    CloseContainer = 0x87,
    UpArrowContainer = 0x88,
    TextWindow = 0x89,
    HouseWindow = 0x8A,
    LookAt = 0x8C,
    LookInBattleList = 0x8D,
    JoinAggression = 0x8E,

    //=== Chat ===//
    Say = 0x96,
    RequestChannels = 0x97,
    OpenChannel = 0x98,
    CloseChannel = 0x99,
    OpenPrivateChannel = 0x9A,
    CloseNpcChannel = 0x9E,

    //=== Combat and party ===//
    FightModes = 0xA0,
    Attack = 0xA1,
    Follow = 0xA2,
    InviteToParty = 0xA3,
    JoinParty = 0xA4,
    RevokePartyInvite = 0xA5,
    PassPartyLeadership = 0xA6,
    LeaveParty = 0xA7,
    SharedPartyExperience = 0xA8,
    CreatePrivateChannel = 0xAA,
    ChannelInvite = 0xAB,
    ChannelExclude = 0xAC,
    CancelAttackAndFollow = 0xBE,

    //=== Misc ===//
    UpdateTile = 0xC9,
    UpdateContainer = 0xCA,
    RequestOutfit = 0xD2,
    SetOutfit = 0xD3,
    AddVip = 0xDC,
    RemoveVip = 0xDD,
    ThankYou = 0xE7,
    DebugAssert = 0xE8,
    RuleViolationReport = 0xF2,
    GetObjectInfo = 0xF3,
}

impl ClientOpcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        use ClientOpcode::*;
        Some(match value {
            0x0F => CloseConnection,
            0x14 => Logout,
            0x1E => Ping,
            0x32 => ExtendedOpcode,
            0x64 => AutoWalk,
            0x65 => MoveNorth,
            0x66 => MoveEast,
            0x67 => MoveSouth,
            0x68 => MoveWest,
            0x69 => StopAutoWalk,
            0x6A => MoveNorthEast,
            0x6B => MoveSouthEast,
            0x6C => MoveSouthWest,
            0x6D => MoveNorthWest,
            0x6F => TurnNorth,
            0x70 => TurnEast,
            0x71 => TurnSouth,
            0x72 => TurnWest,
            0x78 => Throw,
            0x79 => LookInShop,
            0x7A => Purchase,
            0x7B => Sale,
            0x7C => CloseShop,
            0x7D => RequestTrade,
            0x7E => LookInTrade,
            0x7F => AcceptTrade,
            0x80 => CloseTrade,
            0x82 => UseItem,
            0x83 => UseItemEx,
            0x84 => UseWithCreature,
            0x85 => RotateItem,
            0x87 => CloseContainer,
            0x88 => UpArrowContainer,
            0x89 => TextWindow,
            0x8A => HouseWindow,
            0x8C => LookAt,
            0x8D => LookInBattleList,
            0x8E => JoinAggression,
            0x96 => Say,
            0x97 => RequestChannels,
            0x98 => OpenChannel,
            0x99 => CloseChannel,
            0x9A => OpenPrivateChannel,
            0x9E => CloseNpcChannel,
            0xA0 => FightModes,
            0xA1 => Attack,
            0xA2 => Follow,
            0xA3 => InviteToParty,
            0xA4 => JoinParty,
            0xA5 => RevokePartyInvite,
            0xA6 => PassPartyLeadership,
            0xA7 => LeaveParty,
            0xA8 => SharedPartyExperience,
            0xAA => CreatePrivateChannel,
            0xAB => ChannelInvite,
            0xAC => ChannelExclude,
            0xBE => CancelAttackAndFollow,
            0xC9 => UpdateTile,
            0xCA => UpdateContainer,
            0xD2 => RequestOutfit,
            0xD3 => SetOutfit,
            0xDC => AddVip,
            0xDD => RemoveVip,
            0xE7 => ThankYou,
            0xE8 => DebugAssert,
            0xF2 => RuleViolationReport,
            0xF3 => GetObjectInfo,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Message type tags sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerOpcode {
    /// Self-appear: `{u32 id}{u16 0x32}{u8 can report bugs}`
    SelfAppear = 0x0A,
    /// `{string reason}`; connection closes afterwards
    Disconnect = 0x14,
    FyiBox = 0x15,
    /// `{string text}{u8 retry seconds}`
    WaitingList = 0x16,
    Ping = 0x1E,
    /// `{u32 timestamp}{u8 random}`
    Challenge = 0x1F,
    ReLoginWindow = 0x28,
    ExtendedOpcode = 0x32,
    MapDescription = 0x64,
    MapNorth = 0x65,
    MapEast = 0x66,
    MapSouth = 0x67,
    MapWest = 0x68,
    UpdateTile = 0x69,
    AddTileThing = 0x6A,
    UpdateTileThing = 0x6B,
    RemoveTileThing = 0x6C,
    MoveCreature = 0x6D,
    OpenContainer = 0x6E,
    CloseContainer = 0x6F,
    AddContainerItem = 0x70,
    UpdateContainerItem = 0x71,
    RemoveContainerItem = 0x72,
    InventoryItem = 0x78,
    InventoryEmpty = 0x79,
    ShopWindow = 0x7A,
    SaleItemList = 0x7B,
    CloseShop = 0x7C,
    TradeItemOwn = 0x7D,
    TradeItemCounter = 0x7E,
    CloseTrade = 0x7F,
    WorldLight = 0x82,
    MagicEffect = 0x83,
    AnimatedText = 0x84,
    DistanceShoot = 0x85,
    CreatureSquare = 0x86,
    CreatureHealth = 0x8C,
    CreatureLight = 0x8D,
    CreatureOutfit = 0x8E,
    ChangeSpeed = 0x8F,
    CreatureSkull = 0x90,
    CreatureShield = 0x91,
    CreatureWalkthrough = 0x92,
    TextWindow = 0x96,
    HouseWindow = 0x97,
    PlayerStats = 0xA0,
    PlayerSkills = 0xA1,
    PlayerIcons = 0xA2,
    CancelTarget = 0xA3,
    FightModes = 0xA7,
    CreatureSay = 0xAA,
    ChannelsDialog = 0xAB,
    Channel = 0xAC,
    OpenPrivateChannel = 0xAD,
    CreatePrivateChannel = 0xB2,
    ClosePrivateChannel = 0xB3,
    TextMessage = 0xB4,
    CancelWalk = 0xB5,
    FloorChangeUp = 0xBE,
    FloorChangeDown = 0xBF,
    OutfitWindow = 0xC8,
    VipEntry = 0xD2,
    VipOnline = 0xD3,
    VipOffline = 0xD4,
    Tutorial = 0xDC,
    MapMarker = 0xDD,
}

impl ServerOpcode {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Text message classes understood by the 8.60 client (`0xB4`)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    StatusConsoleRed = 0x12,
    EventOrange = 0x13,
    StatusConsoleOrange = 0x14,
    StatusWarning = 0x15,
    EventAdvance = 0x16,
    EventDefault = 0x17,
    StatusDefault = 0x18,
    InfoDescription = 0x19,
    StatusSmall = 0x1A,
    StatusConsoleBlue = 0x1B,
}

impl MessageClass {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Marker preceding a creature in a tile or stack listing
pub const CREATURE_UNKNOWN: u16 = 0x61;
pub const CREATURE_KNOWN: u16 = 0x62;
pub const CREATURE_TURN: u16 = 0x63;

/// Stack position placeholder addressing a creature by id instead
pub const STACKPOS_BY_ID: u16 = 0xFFFF;
