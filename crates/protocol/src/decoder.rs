//! # Opcode Dispatcher
//!
//! Maps the leading opcode byte of a client message to a handler descriptor
//! and decodes the payload into a [`Command`]. Decoding is eager: every field
//! is copied out of the message before the command leaves this module.
//!
//! ## Session gate
//! Which opcodes are honoured depends on the [`SessionState`]:
//! - `Unauthenticated` / `Authenticating`: only the close opcode
//! - `Active`: the full table
//! - `RemovedOrDead`: close and logout only
//!
//! ## Failure handling
//! A payload that reads past the end of the message marks it overrun and the
//! caller must close the connection. A decoder may also drop a well-formed
//! message (an empty autowalk path, an oversized chat line); that is not an
//! error.

use crate::codecs::NetworkMessage;
use crate::commands::{Command, FightMode, Urgency, REPORT_TYPE_NAME, REPORT_TYPE_STATEMENT};
use crate::packets::ClientOpcode;
use ots_core::{CreatureId, Direction, Outfit, PlayerGuid, SpeakClass};
use std::sync::OnceLock;

/// Longest chat line forwarded to the world
pub const MAX_SAY_LENGTH: usize = 255;

/// Connection lifecycle as seen by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, first message not yet accepted
    #[default]
    Unauthenticated,
    /// Credentials accepted, login task queued on the world loop
    Authenticating,
    /// Player placed in the world
    Active,
    /// Player removed from the map or dead
    RemovedOrDead,
}

/// Per-connection decoder state
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    /// Debug reports are accepted once per session
    pub debug_assert_sent: bool,
}

/// Payload decoder; `None` drops the message without closing the connection
pub type DecodeFn = fn(&mut NetworkMessage, &mut DecodeContext) -> Option<Command>;

/// What the dispatcher does with one opcode
#[derive(Debug, Clone, Copy)]
pub enum OpcodeHandler {
    Decode { decode: DecodeFn, urgency: Urgency },
    /// Known opcode with no server-side meaning
    Ignore,
}

/// Outcome of dispatching one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Hand the command to the world loop
    Enqueue { command: Command, urgency: Urgency },
    /// Nothing to do
    Ignore,
    /// Close the connection without a message
    Close,
}

/// Opcode byte to handler lookup table
pub struct OpcodeTable {
    handlers: [Option<OpcodeHandler>; 256],
}

impl OpcodeTable {
    /// An empty table; every opcode is forwarded opaquely
    pub fn empty() -> Self {
        Self {
            handlers: [None; 256],
        }
    }

    /// The table for the 8.60 game protocol
    pub fn standard() -> &'static OpcodeTable {
        static TABLE: OnceLock<OpcodeTable> = OnceLock::new();
        TABLE.get_or_init(build_standard_table)
    }

    pub fn register(&mut self, opcode: ClientOpcode, handler: OpcodeHandler) {
        self.handlers[opcode.as_u8() as usize] = Some(handler);
    }

    pub fn handler(&self, opcode: u8) -> Option<OpcodeHandler> {
        self.handlers[opcode as usize]
    }

    /// Read the opcode, gate it on `state` and decode the payload
    pub fn decode_packet(
        &self,
        state: SessionState,
        msg: &mut NetworkMessage,
        ctx: &mut DecodeContext,
    ) -> Dispatch {
        if msg.is_empty() {
            return Dispatch::Ignore;
        }

        let opcode = msg.get_u8();
        if opcode == ClientOpcode::CloseConnection.as_u8() {
            return Dispatch::Close;
        }

        match state {
            SessionState::Unauthenticated | SessionState::Authenticating => {
                return Dispatch::Ignore;
            }
            SessionState::RemovedOrDead if opcode != ClientOpcode::Logout.as_u8() => {
                return Dispatch::Ignore;
            }
            _ => {}
        }

        let dispatch = match self.handler(opcode) {
            None => Dispatch::Enqueue {
                command: Command::Unknown {
                    opcode,
                    payload: msg.get_remaining(),
                },
                urgency: Urgency::Normal,
            },
            Some(OpcodeHandler::Ignore) => Dispatch::Ignore,
            Some(OpcodeHandler::Decode { decode, urgency }) => match decode(msg, ctx) {
                Some(command) => Dispatch::Enqueue { command, urgency },
                None => Dispatch::Ignore,
            },
        };

        if msg.is_overrun() {
            tracing::debug!("Opcode 0x{:02X} overran its message", opcode);
            return Dispatch::Close;
        }
        dispatch
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        build_standard_table()
    }
}

fn normal(decode: DecodeFn) -> OpcodeHandler {
    OpcodeHandler::Decode {
        decode,
        urgency: Urgency::Normal,
    }
}

fn perishable(decode: DecodeFn) -> OpcodeHandler {
    OpcodeHandler::Decode {
        decode,
        urgency: Urgency::Perishable,
    }
}

fn build_standard_table() -> OpcodeTable {
    use ClientOpcode as Op;

    let mut table = OpcodeTable::empty();

    table.register(Op::Logout, normal(|_, _| Some(Command::Logout)));
    table.register(Op::Ping, normal(|_, _| Some(Command::ReceivePing)));
    table.register(Op::ExtendedOpcode, normal(decode_extended_opcode));

    table.register(Op::AutoWalk, normal(decode_auto_walk));
    table.register(Op::MoveNorth, normal(|_, _| Some(step(Direction::North))));
    table.register(Op::MoveEast, normal(|_, _| Some(step(Direction::East))));
    table.register(Op::MoveSouth, normal(|_, _| Some(step(Direction::South))));
    table.register(Op::MoveWest, normal(|_, _| Some(step(Direction::West))));
    table.register(Op::StopAutoWalk, normal(|_, _| Some(Command::StopAutoWalk)));
    table.register(Op::MoveNorthEast, normal(|_, _| Some(step(Direction::NorthEast))));
    table.register(Op::MoveSouthEast, normal(|_, _| Some(step(Direction::SouthEast))));
    table.register(Op::MoveSouthWest, normal(|_, _| Some(step(Direction::SouthWest))));
    table.register(Op::MoveNorthWest, normal(|_, _| Some(step(Direction::NorthWest))));
    table.register(Op::TurnNorth, perishable(|_, _| Some(turn(Direction::North))));
    table.register(Op::TurnEast, perishable(|_, _| Some(turn(Direction::East))));
    table.register(Op::TurnSouth, perishable(|_, _| Some(turn(Direction::South))));
    table.register(Op::TurnWest, perishable(|_, _| Some(turn(Direction::West))));

    table.register(Op::Throw, perishable(decode_throw));
    table.register(Op::LookInShop, perishable(decode_look_in_shop));
    table.register(Op::Purchase, perishable(decode_purchase));
    table.register(Op::Sale, perishable(decode_sale));
    table.register(Op::CloseShop, normal(|_, _| Some(Command::CloseShop)));
    table.register(Op::RequestTrade, normal(decode_request_trade));
    table.register(Op::LookInTrade, perishable(decode_look_in_trade));
    table.register(Op::AcceptTrade, normal(|_, _| Some(Command::AcceptTrade)));
    table.register(Op::CloseTrade, normal(|_, _| Some(Command::CloseTrade)));
    table.register(Op::UseItem, perishable(decode_use_item));
    table.register(Op::UseItemEx, perishable(decode_use_item_ex));
    table.register(Op::UseWithCreature, perishable(decode_use_with_creature));
    table.register(Op::RotateItem, perishable(decode_rotate_item));
    table.register(Op::CloseContainer, normal(|msg, _| Some(Command::CloseContainer { cid: msg.get_u8() })));
    table.register(Op::UpArrowContainer, normal(|msg, _| Some(Command::UpArrowContainer { cid: msg.get_u8() })));
    table.register(Op::UpdateContainer, normal(|msg, _| Some(Command::UpdateContainer { cid: msg.get_u8() })));
    table.register(Op::TextWindow, normal(decode_text_window));
    table.register(Op::HouseWindow, normal(decode_house_window));
    table.register(Op::LookAt, perishable(decode_look_at));
    table.register(
        Op::LookInBattleList,
        perishable(|msg, _| Some(Command::LookInBattleList { creature: CreatureId(msg.get_u32()) })),
    );
    table.register(Op::JoinAggression, OpcodeHandler::Ignore);

    table.register(Op::Say, normal(decode_say));
    table.register(Op::RequestChannels, normal(|_, _| Some(Command::RequestChannels)));
    table.register(Op::OpenChannel, normal(|msg, _| Some(Command::OpenChannel { channel_id: msg.get_u16() })));
    table.register(Op::CloseChannel, normal(|msg, _| Some(Command::CloseChannel { channel_id: msg.get_u16() })));
    table.register(
        Op::OpenPrivateChannel,
        normal(|msg, _| Some(Command::OpenPrivateChannel { receiver: msg.get_string() })),
    );
    table.register(Op::CloseNpcChannel, normal(|_, _| Some(Command::CloseNpcChannel)));

    table.register(Op::FightModes, normal(decode_fight_modes));
    table.register(Op::Attack, normal(|msg, _| Some(Command::Attack { creature: CreatureId(msg.get_u32()) })));
    table.register(Op::Follow, normal(|msg, _| Some(Command::Follow { creature: CreatureId(msg.get_u32()) })));
    table.register(Op::InviteToParty, normal(|msg, _| Some(Command::InviteToParty { target: CreatureId(msg.get_u32()) })));
    table.register(Op::JoinParty, normal(|msg, _| Some(Command::JoinParty { target: CreatureId(msg.get_u32()) })));
    table.register(
        Op::RevokePartyInvite,
        normal(|msg, _| Some(Command::RevokePartyInvite { target: CreatureId(msg.get_u32()) })),
    );
    table.register(
        Op::PassPartyLeadership,
        normal(|msg, _| Some(Command::PassPartyLeadership { target: CreatureId(msg.get_u32()) })),
    );
    table.register(Op::LeaveParty, normal(|_, _| Some(Command::LeaveParty)));
    table.register(
        Op::SharedPartyExperience,
        normal(|msg, _| Some(Command::EnableSharedPartyExperience { active: msg.get_u8() == 1 })),
    );
    table.register(Op::CreatePrivateChannel, normal(|_, _| Some(Command::CreatePrivateChannel)));
    table.register(Op::ChannelInvite, normal(|msg, _| Some(Command::ChannelInvite { name: msg.get_string() })));
    table.register(Op::ChannelExclude, normal(|msg, _| Some(Command::ChannelExclude { name: msg.get_string() })));
    table.register(Op::CancelAttackAndFollow, normal(|_, _| Some(Command::CancelAttackAndFollow)));

    table.register(Op::UpdateTile, OpcodeHandler::Ignore);
    table.register(Op::RequestOutfit, normal(|_, _| Some(Command::RequestOutfit)));
    table.register(Op::SetOutfit, normal(decode_set_outfit));
    table.register(Op::AddVip, normal(|msg, _| Some(Command::AddVip { name: msg.get_string() })));
    table.register(Op::RemoveVip, normal(|msg, _| Some(Command::RemoveVip { guid: PlayerGuid(msg.get_u32()) })));
    table.register(Op::ThankYou, OpcodeHandler::Ignore);
    table.register(Op::DebugAssert, normal(decode_debug_assert));
    table.register(Op::RuleViolationReport, normal(decode_rule_violation));
    table.register(Op::GetObjectInfo, OpcodeHandler::Ignore);

    table
}

fn step(direction: Direction) -> Command {
    Command::Move { direction }
}

fn turn(direction: Direction) -> Command {
    Command::Turn { direction }
}

fn decode_extended_opcode(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let opcode = msg.get_u8();
    let buffer = msg.get_string();
    Some(Command::ExtendedOpcode { opcode, buffer })
}

/// `{u8 n}{n compass codes}`; the codes must fill the rest of the message.
///
/// Codes are read from the last byte backwards; unknown codes are skipped.
/// The resulting path is returned in walking order.
fn decode_auto_walk(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let count = msg.get_u8() as usize;
    if count == 0 || msg.remaining() != count {
        return None;
    }

    msg.skip_bytes(count as isize);

    let mut path = Vec::with_capacity(count);
    for _ in 0..count {
        if let Some(direction) = Direction::from_path_code(msg.get_previous_byte()) {
            path.push(direction);
        }
    }
    msg.skip_bytes(count as isize);

    if path.is_empty() {
        return None;
    }
    path.reverse();
    Some(Command::AutoWalk { path })
}

fn decode_throw(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let from = msg.get_position();
    let sprite_id = msg.get_u16();
    let from_stackpos = msg.get_u8();
    let to = msg.get_position();
    let count = msg.get_u8();

    if from == to {
        return None;
    }
    Some(Command::MoveThing {
        from,
        sprite_id,
        from_stackpos,
        to,
        count,
    })
}

fn decode_look_in_shop(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let item_id = msg.get_u16();
    let count = msg.get_u8();
    Some(Command::LookInShop { item_id, count })
}

fn decode_purchase(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let item_id = msg.get_u16();
    let count = msg.get_u8();
    let amount = msg.get_u8();
    let ignore_cap = msg.get_u8() != 0;
    let in_backpacks = msg.get_u8() != 0;
    Some(Command::PurchaseItem {
        item_id,
        count,
        amount,
        ignore_cap,
        in_backpacks,
    })
}

fn decode_sale(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let item_id = msg.get_u16();
    let count = msg.get_u8();
    let amount = msg.get_u8();
    let ignore_equipped = msg.get_u8() != 0;
    Some(Command::SellItem {
        item_id,
        count,
        amount,
        ignore_equipped,
    })
}

fn decode_request_trade(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let pos = msg.get_position();
    let sprite_id = msg.get_u16();
    let stackpos = msg.get_u8();
    let target = CreatureId(msg.get_u32());
    Some(Command::RequestTrade {
        pos,
        sprite_id,
        stackpos,
        target,
    })
}

fn decode_look_in_trade(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let counter_offer = msg.get_u8() == 0x01;
    let index = msg.get_u8();
    Some(Command::LookInTrade {
        counter_offer,
        index,
    })
}

fn decode_use_item(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let pos = msg.get_position();
    let sprite_id = msg.get_u16();
    let stackpos = msg.get_u8();
    let index = msg.get_u8();
    Some(Command::UseItem {
        pos,
        sprite_id,
        stackpos,
        index,
    })
}

fn decode_use_item_ex(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let from = msg.get_position();
    let from_sprite_id = msg.get_u16();
    let from_stackpos = msg.get_u8();
    let to = msg.get_position();
    let to_sprite_id = msg.get_u16();
    let to_stackpos = msg.get_u8();
    Some(Command::UseItemEx {
        from,
        from_sprite_id,
        from_stackpos,
        to,
        to_sprite_id,
        to_stackpos,
    })
}

fn decode_use_with_creature(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let from = msg.get_position();
    let sprite_id = msg.get_u16();
    let from_stackpos = msg.get_u8();
    let creature = CreatureId(msg.get_u32());
    Some(Command::UseWithCreature {
        from,
        sprite_id,
        from_stackpos,
        creature,
    })
}

fn decode_rotate_item(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let pos = msg.get_position();
    let sprite_id = msg.get_u16();
    let stackpos = msg.get_u8();
    Some(Command::RotateItem {
        pos,
        sprite_id,
        stackpos,
    })
}

fn decode_text_window(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let window_text_id = msg.get_u32();
    let text = msg.get_string();
    Some(Command::WriteItem {
        window_text_id,
        text,
    })
}

fn decode_house_window(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let door_id = msg.get_u8();
    let window_text_id = msg.get_u32();
    let text = msg.get_string();
    Some(Command::UpdateHouseWindow {
        door_id,
        window_text_id,
        text,
    })
}

fn decode_look_at(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let pos = msg.get_position();
    msg.skip_bytes(2); // sprite id
    let stackpos = msg.get_u8();
    Some(Command::LookAt { pos, stackpos })
}

fn decode_say(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let speak_class = msg.get_u8();
    let mut receiver = String::new();
    let mut channel_id = 0;

    match SpeakClass::from_u8(speak_class) {
        Some(SpeakClass::Private) | Some(SpeakClass::PrivateRed) => {
            receiver = msg.get_string();
        }
        Some(SpeakClass::ChannelY) | Some(SpeakClass::ChannelR1) | Some(SpeakClass::ChannelR2) => {
            channel_id = msg.get_u16();
        }
        _ => {}
    }

    let text = msg.get_string();
    if text.chars().count() > MAX_SAY_LENGTH {
        return None;
    }

    Some(Command::Say {
        speak_class,
        channel_id,
        receiver,
        text,
    })
}

fn decode_fight_modes(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let fight_mode = FightMode::from_u8(msg.get_u8());
    let chase = msg.get_u8() != 0;
    let secure = msg.get_u8() != 0;
    Some(Command::SetFightModes {
        fight_mode,
        chase,
        secure,
    })
}

fn decode_set_outfit(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let look_type = msg.get_u16();
    let head = msg.get_u8();
    let body = msg.get_u8();
    let legs = msg.get_u8();
    let feet = msg.get_u8();
    let addons = msg.get_u8();
    Some(Command::ChangeOutfit {
        outfit: Outfit::new(look_type, head, body, legs, feet, addons),
    })
}

fn decode_debug_assert(msg: &mut NetworkMessage, ctx: &mut DecodeContext) -> Option<Command> {
    if ctx.debug_assert_sent {
        return None;
    }
    ctx.debug_assert_sent = true;

    let assert_line = msg.get_string();
    let date = msg.get_string();
    let description = msg.get_string();
    let comment = msg.get_string();
    Some(Command::DebugAssert {
        assert_line,
        date,
        description,
        comment,
    })
}

fn decode_rule_violation(msg: &mut NetworkMessage, _: &mut DecodeContext) -> Option<Command> {
    let report_type = msg.get_u8();
    let reason = msg.get_u8();
    let target_name = msg.get_string();
    let comment = msg.get_string();
    let translation = match report_type {
        REPORT_TYPE_NAME => msg.get_string(),
        REPORT_TYPE_STATEMENT => {
            let translation = msg.get_string();
            msg.get_u32(); // statement id, not kept
            translation
        }
        _ => String::new(),
    };
    Some(Command::ReportRuleViolation {
        report_type,
        reason,
        target_name,
        comment,
        translation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ots_core::Position;

    fn message(bytes: &[u8]) -> NetworkMessage {
        NetworkMessage::from_body(bytes)
    }

    fn dispatch(state: SessionState, bytes: &[u8]) -> Dispatch {
        let mut ctx = DecodeContext::default();
        OpcodeTable::standard().decode_packet(state, &mut message(bytes), &mut ctx)
    }

    fn active(bytes: &[u8]) -> Dispatch {
        dispatch(SessionState::Active, bytes)
    }

    fn enqueued(bytes: &[u8]) -> (Command, Urgency) {
        match active(bytes) {
            Dispatch::Enqueue { command, urgency } => (command, urgency),
            other => panic!("expected a command, got {:?}", other),
        }
    }

    fn position_bytes(pos: Position) -> Vec<u8> {
        let mut msg = NetworkMessage::new();
        msg.add_position(pos);
        msg.body().to_vec()
    }

    #[test]
    fn test_move_north_unauthenticated_is_ignored() {
        assert_eq!(dispatch(SessionState::Unauthenticated, &[0x65]), Dispatch::Ignore);
        assert_eq!(dispatch(SessionState::Authenticating, &[0x65]), Dispatch::Ignore);
    }

    #[test]
    fn test_close_opcode_in_every_state() {
        for state in [
            SessionState::Unauthenticated,
            SessionState::Authenticating,
            SessionState::Active,
            SessionState::RemovedOrDead,
        ] {
            assert_eq!(dispatch(state, &[0x0F]), Dispatch::Close);
        }
    }

    #[test]
    fn test_removed_or_dead_only_allows_logout() {
        assert_eq!(dispatch(SessionState::RemovedOrDead, &[0x65]), Dispatch::Ignore);
        assert_eq!(
            dispatch(SessionState::RemovedOrDead, &[0x14]),
            Dispatch::Enqueue {
                command: Command::Logout,
                urgency: Urgency::Normal
            }
        );
    }

    #[test]
    fn test_empty_message_is_ignored() {
        assert_eq!(active(&[]), Dispatch::Ignore);
    }

    #[test]
    fn test_movement_opcodes() {
        let cases = [
            (0x65, Direction::North),
            (0x66, Direction::East),
            (0x67, Direction::South),
            (0x68, Direction::West),
            (0x6A, Direction::NorthEast),
            (0x6B, Direction::SouthEast),
            (0x6C, Direction::SouthWest),
            (0x6D, Direction::NorthWest),
        ];
        for (opcode, direction) in cases {
            assert_eq!(enqueued(&[opcode]), (Command::Move { direction }, Urgency::Normal));
        }
    }

    #[test]
    fn test_turns_are_perishable() {
        assert_eq!(
            enqueued(&[0x70]),
            (Command::Turn { direction: Direction::East }, Urgency::Perishable)
        );
    }

    #[test]
    fn test_autowalk_zero_steps_is_dropped() {
        assert_eq!(active(&[0x64, 0x00]), Dispatch::Ignore);
    }

    #[test]
    fn test_autowalk_length_mismatch_is_dropped() {
        assert_eq!(active(&[0x64, 0x03, 1, 3]), Dispatch::Ignore);
    }

    #[test]
    fn test_autowalk_skips_unknown_codes() {
        let (command, _) = enqueued(&[0x64, 0x04, 3, 9, 1, 7]);
        assert_eq!(
            command,
            Command::AutoWalk {
                path: vec![Direction::North, Direction::East, Direction::South]
            }
        );
    }

    #[test]
    fn test_autowalk_all_unknown_is_dropped() {
        assert_eq!(active(&[0x64, 0x02, 0, 9]), Dispatch::Ignore);
    }

    #[test]
    fn test_throw_to_same_position_is_dropped() {
        let pos = Position::new(100, 100, 7);
        let mut bytes = vec![0x78];
        bytes.extend(position_bytes(pos));
        bytes.extend([0x34, 0x12, 1]);
        bytes.extend(position_bytes(pos));
        bytes.push(5);
        assert_eq!(active(&bytes), Dispatch::Ignore);
    }

    #[test]
    fn test_throw() {
        let from = Position::new(100, 100, 7);
        let to = Position::new(101, 100, 7);
        let mut bytes = vec![0x78];
        bytes.extend(position_bytes(from));
        bytes.extend([0x34, 0x12, 1]);
        bytes.extend(position_bytes(to));
        bytes.push(5);
        assert_eq!(
            enqueued(&bytes),
            (
                Command::MoveThing {
                    from,
                    sprite_id: 0x1234,
                    from_stackpos: 1,
                    to,
                    count: 5
                },
                Urgency::Perishable
            )
        );
    }

    #[test]
    fn test_truncated_payload_closes() {
        assert_eq!(active(&[0xA1, 0x01, 0x02]), Dispatch::Close);
        assert_eq!(active(&[0x96, 0x01, 0x05, 0x00, b'h']), Dispatch::Close);
    }

    #[test]
    fn test_say_private_reads_receiver() {
        let mut msg = NetworkMessage::new();
        msg.add_u8(0x96);
        msg.add_u8(SpeakClass::Private.as_u8());
        msg.add_string("Bubble");
        msg.add_string("hi");
        let (command, _) = enqueued(msg.body());
        assert_eq!(
            command,
            Command::Say {
                speak_class: 6,
                channel_id: 0,
                receiver: "Bubble".into(),
                text: "hi".into()
            }
        );
    }

    #[test]
    fn test_say_channel_reads_channel_id() {
        let mut msg = NetworkMessage::new();
        msg.add_u8(0x96);
        msg.add_u8(SpeakClass::ChannelY.as_u8());
        msg.add_u16(5);
        msg.add_string("trade");
        let (command, _) = enqueued(msg.body());
        assert!(matches!(command, Command::Say { channel_id: 5, .. }));
    }

    #[test]
    fn test_say_too_long_is_dropped() {
        let mut msg = NetworkMessage::new();
        msg.add_u8(0x96);
        msg.add_u8(SpeakClass::Say.as_u8());
        msg.add_string(&"a".repeat(256));
        assert_eq!(active(msg.body()), Dispatch::Ignore);
    }

    #[test]
    fn test_fight_modes() {
        assert_eq!(
            enqueued(&[0xA0, 2, 1, 0]).0,
            Command::SetFightModes {
                fight_mode: FightMode::Balanced,
                chase: true,
                secure: false
            }
        );
    }

    #[test]
    fn test_ignored_opcodes() {
        for opcode in [0x8E, 0xC9, 0xE7, 0xF3] {
            assert_eq!(active(&[opcode]), Dispatch::Ignore);
        }
    }

    #[test]
    fn test_unknown_opcode_forwarded_with_payload() {
        assert_eq!(
            enqueued(&[0x6E, 1, 2, 3]),
            (
                Command::Unknown {
                    opcode: 0x6E,
                    payload: vec![1, 2, 3]
                },
                Urgency::Normal
            )
        );
    }

    #[test]
    fn test_debug_assert_accepted_once() {
        let mut msg = NetworkMessage::new();
        msg.add_u8(0xE8);
        for part in ["line", "date", "desc", "comment"] {
            msg.add_string(part);
        }
        let mut ctx = DecodeContext::default();
        let table = OpcodeTable::standard();
        let first = table.decode_packet(SessionState::Active, &mut message(msg.body()), &mut ctx);
        assert!(matches!(first, Dispatch::Enqueue { command: Command::DebugAssert { .. }, .. }));
        let second = table.decode_packet(SessionState::Active, &mut message(msg.body()), &mut ctx);
        assert_eq!(second, Dispatch::Ignore);
    }

    #[test]
    fn test_rule_violation_statement_reads_statement_id() {
        let mut msg = NetworkMessage::new();
        msg.add_u8(0xF2);
        msg.add_u8(REPORT_TYPE_STATEMENT);
        msg.add_u8(4);
        msg.add_string("Target");
        msg.add_string("rude");
        msg.add_string("translated");
        msg.add_u32(77);
        let (command, _) = enqueued(msg.body());
        assert_eq!(
            command,
            Command::ReportRuleViolation {
                report_type: REPORT_TYPE_STATEMENT,
                reason: 4,
                target_name: "Target".into(),
                comment: "rude".into(),
                translation: "translated".into()
            }
        );
    }

    #[test]
    fn test_set_outfit() {
        let (command, _) = enqueued(&[0xD3, 0x80, 0x00, 1, 2, 3, 4, 3]);
        assert_eq!(
            command,
            Command::ChangeOutfit {
                outfit: Outfit::new(128, 1, 2, 3, 4, 3)
            }
        );
    }

    #[test]
    fn test_look_at_skips_sprite() {
        let pos = Position::new(5, 6, 7);
        let mut bytes = vec![0x8C];
        bytes.extend(position_bytes(pos));
        bytes.extend([0xFF, 0xFF, 2]);
        assert_eq!(
            enqueued(&bytes),
            (Command::LookAt { pos, stackpos: 2 }, Urgency::Perishable)
        );
    }

    #[test]
    fn test_look_in_trade_counter_flag() {
        assert_eq!(
            enqueued(&[0x7E, 0x01, 3]).0,
            Command::LookInTrade {
                counter_offer: true,
                index: 3
            }
        );
        assert_eq!(
            enqueued(&[0x7E, 0x02, 3]).0,
            Command::LookInTrade {
                counter_offer: false,
                index: 3
            }
        );
    }
}
