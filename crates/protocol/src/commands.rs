//! # Commands
//!
//! Value types produced by the decoder. A command owns every field it needs
//! (ids, positions, strings) so it can cross from the network task to the
//! world loop without referencing the message buffer it came from.

use ots_core::{CreatureId, Direction, Outfit, PlayerGuid, Position};

/// How the world loop treats a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    /// Always executed
    #[default]
    Normal,
    /// Dropped if it waited in the queue past the expiration window
    Perishable,
}

/// Combat stance chosen in the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FightMode {
    Attack,
    Balanced,
    Defense,
}

impl FightMode {
    /// 1 = attack, 2 = balanced, anything else = defense
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Attack,
            2 => Self::Balanced,
            _ => Self::Defense,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Attack => 1,
            Self::Balanced => 2,
            Self::Defense => 3,
        }
    }
}

/// Rule violation report kinds that carry extra fields
pub const REPORT_TYPE_NAME: u8 = 0;
pub const REPORT_TYPE_STATEMENT: u8 = 1;

/// One decoded client action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Logout,
    ReceivePing,
    ExtendedOpcode {
        opcode: u8,
        buffer: String,
    },
    AutoWalk {
        path: Vec<Direction>,
    },
    Move {
        direction: Direction,
    },
    StopAutoWalk,
    Turn {
        direction: Direction,
    },
    MoveThing {
        from: Position,
        sprite_id: u16,
        from_stackpos: u8,
        to: Position,
        count: u8,
    },
    LookInShop {
        item_id: u16,
        count: u8,
    },
    PurchaseItem {
        item_id: u16,
        count: u8,
        amount: u8,
        ignore_cap: bool,
        in_backpacks: bool,
    },
    SellItem {
        item_id: u16,
        count: u8,
        amount: u8,
        ignore_equipped: bool,
    },
    CloseShop,
    RequestTrade {
        pos: Position,
        sprite_id: u16,
        stackpos: u8,
        target: CreatureId,
    },
    LookInTrade {
        counter_offer: bool,
        index: u8,
    },
    AcceptTrade,
    CloseTrade,
    UseItem {
        pos: Position,
        sprite_id: u16,
        stackpos: u8,
        index: u8,
    },
    UseItemEx {
        from: Position,
        from_sprite_id: u16,
        from_stackpos: u8,
        to: Position,
        to_sprite_id: u16,
        to_stackpos: u8,
    },
    UseWithCreature {
        from: Position,
        sprite_id: u16,
        from_stackpos: u8,
        creature: CreatureId,
    },
    RotateItem {
        pos: Position,
        sprite_id: u16,
        stackpos: u8,
    },
    CloseContainer {
        cid: u8,
    },
    UpArrowContainer {
        cid: u8,
    },
    UpdateContainer {
        cid: u8,
    },
    WriteItem {
        window_text_id: u32,
        text: String,
    },
    UpdateHouseWindow {
        door_id: u8,
        window_text_id: u32,
        text: String,
    },
    LookAt {
        pos: Position,
        stackpos: u8,
    },
    LookInBattleList {
        creature: CreatureId,
    },
    Say {
        /// Raw speak class byte; see [`ots_core::SpeakClass`]
        speak_class: u8,
        channel_id: u16,
        receiver: String,
        text: String,
    },
    RequestChannels,
    OpenChannel {
        channel_id: u16,
    },
    CloseChannel {
        channel_id: u16,
    },
    OpenPrivateChannel {
        receiver: String,
    },
    CloseNpcChannel,
    SetFightModes {
        fight_mode: FightMode,
        chase: bool,
        secure: bool,
    },
    Attack {
        creature: CreatureId,
    },
    Follow {
        creature: CreatureId,
    },
    InviteToParty {
        target: CreatureId,
    },
    JoinParty {
        target: CreatureId,
    },
    RevokePartyInvite {
        target: CreatureId,
    },
    PassPartyLeadership {
        target: CreatureId,
    },
    LeaveParty,
    EnableSharedPartyExperience {
        active: bool,
    },
    CreatePrivateChannel,
    ChannelInvite {
        name: String,
    },
    ChannelExclude {
        name: String,
    },
    CancelAttackAndFollow,
    RequestOutfit,
    ChangeOutfit {
        outfit: Outfit,
    },
    AddVip {
        name: String,
    },
    RemoveVip {
        guid: PlayerGuid,
    },
    DebugAssert {
        assert_line: String,
        date: String,
        description: String,
        comment: String,
    },
    ReportRuleViolation {
        report_type: u8,
        reason: u8,
        target_name: String,
        comment: String,
        translation: String,
    },
    /// Opcode with no decoder; forwarded with its untouched payload
    Unknown {
        opcode: u8,
        payload: Vec<u8>,
    },
}
