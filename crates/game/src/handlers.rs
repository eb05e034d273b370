//! # Command Handlers
//!
//! Applies decoded client [`Command`]s on the world context. A command only
//! runs if its connection still has a player attached and accepts packets;
//! a command queued before its connection was released becomes a no-op.
//!
//! Movement legality here is limited to "is there a free walkable tile".
//! Commands that need the full simulation (combat, items, trade, parties)
//! are logged and dropped.

use crate::game::Game;
use crate::session::GameSession;
use crate::world::WorldView;
use ots_accounts::VipEntry;
use ots_core::{ConnectionId, CreatureId, Direction, Outfit, PlayerGuid, SpeakClass};
use ots_protocol::{Command, MessageClass};
use ots_scripting::TradeRequest;
use tracing::{debug, info, warn};

const VIP_LIMIT: usize = 20;
const VIP_LIMIT_PREMIUM: usize = 100;

/// Direction a creature faces after stepping `direction`
fn facing(direction: Direction) -> Direction {
    match direction {
        Direction::NorthEast | Direction::SouthEast => Direction::East,
        Direction::NorthWest | Direction::SouthWest => Direction::West,
        other => other,
    }
}

impl Game {
    /// Apply one command from `connection`
    pub(crate) fn handle_command(&mut self, connection: ConnectionId, command: Command) {
        let Some(player) = self
            .sessions
            .get(connection)
            .filter(|session| session.accepts_packets())
            .and_then(GameSession::player)
        else {
            debug!(connection = connection.get(), "Dropping command for inactive session");
            return;
        };

        match command {
            Command::Logout => self.logout(connection, true, false),
            Command::ReceivePing => {
                let now = self.now_ms();
                if let Some(state) = self.world.player_mut(player) {
                    state.last_pong = now;
                }
            }
            Command::ExtendedOpcode { opcode, buffer } => {
                debug!(player = player.get(), opcode, len = buffer.len(), "Extended opcode without handler");
            }

            Command::Move { direction } => {
                self.stop_auto_walk(player);
                self.walk(player, direction);
            }
            Command::AutoWalk { path } => {
                if let Some(state) = self.world.player_mut(player) {
                    state.walk_queue = path.into();
                }
            }
            Command::StopAutoWalk | Command::CancelAttackAndFollow => self.stop_auto_walk(player),
            Command::Turn { direction } => self.turn(player, direction),

            Command::Say {
                speak_class,
                channel_id,
                receiver,
                text,
            } => match SpeakClass::from_u8(speak_class) {
                Some(class) => self.say(player, class, channel_id, &receiver, &text),
                None => debug!(player = player.get(), speak_class, "Unknown speak class"),
            },
            Command::RequestChannels => self.with_session(player, |session, _| session.send_channels_dialog(&[])),
            Command::OpenPrivateChannel { receiver } => self.open_private_channel(player, &receiver),
            Command::CloseNpcChannel => {
                let pos = self.world.creature(player).map(|creature| creature.position);
                if let Some(pos) = pos {
                    for npc in self.npcs_near(pos) {
                        npc.on_player_close_channel(player);
                    }
                }
            }

            Command::SetFightModes {
                fight_mode,
                chase,
                secure,
            } => {
                if let Some(state) = self.world.player_mut(player) {
                    state.fight_mode = fight_mode;
                    state.chase = chase;
                    state.secure = secure;
                }
            }
            Command::Attack { creature } | Command::Follow { creature } => {
                let visible = self
                    .world
                    .observer(player)
                    .zip(self.world.creature(creature))
                    .map(|(observer, target)| observer.can_see_creature(target))
                    .unwrap_or(false);
                if !visible {
                    self.with_session(player, |session, _| session.send_cancel_target());
                }
            }

            Command::RequestOutfit => self.with_session(player, |session, world| session.send_outfit_window(world)),
            Command::ChangeOutfit { outfit } => self.change_outfit(player, outfit),
            Command::AddVip { name } => self.add_vip(player, &name),
            Command::RemoveVip { guid } => self.remove_vip(player, guid),

            Command::LookInShop { item_id, count } => self.look_in_shop(player, item_id, count),
            Command::PurchaseItem {
                item_id,
                count,
                amount,
                ignore_cap,
                in_backpacks,
            } => self.shop_trade(
                player,
                true,
                TradeRequest {
                    item_id,
                    count,
                    amount: u16::from(amount),
                    ignore: ignore_cap,
                    in_backpacks,
                },
            ),
            Command::SellItem {
                item_id,
                count,
                amount,
                ignore_equipped,
            } => self.shop_trade(
                player,
                false,
                TradeRequest {
                    item_id,
                    count,
                    amount: u16::from(amount),
                    ignore: ignore_equipped,
                    in_backpacks: false,
                },
            ),
            Command::CloseShop => self.close_shop(player, false),

            Command::LookInBattleList { creature } => self.look_at_creature(player, creature),
            Command::CloseContainer { cid } => self.with_session(player, |session, _| session.send_close_container(cid)),
            Command::CloseTrade => self.with_session(player, |session, _| session.send_close_trade()),

            Command::DebugAssert {
                assert_line,
                date,
                description,
                comment,
            } => {
                warn!(
                    player = player.get(),
                    %assert_line, %date, %description, %comment,
                    "Client debug report"
                );
            }
            Command::ReportRuleViolation {
                report_type,
                reason,
                target_name,
                comment,
                ..
            } => {
                info!(
                    player = player.get(),
                    report_type, reason, %target_name, %comment,
                    "Rule violation report"
                );
            }
            Command::Unknown { opcode, payload } => {
                debug!(player = player.get(), opcode, len = payload.len(), "Unhandled opcode");
            }
            other => debug!(player = player.get(), "No world handler for {:?}", other),
        }
    }

    //=== Movement ===//

    /// Take one step, or tell the client the step was refused
    fn walk(&mut self, player: CreatureId, direction: Direction) -> bool {
        let Some((from, current)) = self
            .world
            .creature(player)
            .filter(|creature| !creature.removed)
            .map(|creature| (creature.position, creature.direction))
        else {
            return false;
        };

        let target = from.step(direction).filter(|to| {
            self.world
                .tile(*to)
                .map(|tile| tile.is_walkable() && tile.creatures.is_empty())
                .unwrap_or(false)
        });
        let Some(to) = target else {
            self.stop_auto_walk(player);
            self.with_session(player, |session, _| session.send_cancel_walk(current));
            return false;
        };

        if let Some(creature) = self.world.creature_mut(player) {
            creature.direction = facing(direction);
        }
        self.move_creature(player, to, false).is_ok()
    }

    fn stop_auto_walk(&mut self, player: CreatureId) {
        if let Some(state) = self.world.player_mut(player) {
            state.walk_queue.clear();
        }
    }

    /// One queued autowalk step for every walking player
    pub(crate) fn step_auto_walks(&mut self) {
        let walking: Vec<(CreatureId, Direction)> = self
            .world
            .player_ids()
            .into_iter()
            .filter_map(|id| {
                let step = self.world.player_mut(id)?.walk_queue.pop_front()?;
                Some((id, step))
            })
            .collect();
        for (player, direction) in walking {
            self.walk(player, direction);
        }
    }

    fn turn(&mut self, player: CreatureId, direction: Direction) {
        match self.world.creature_mut(player) {
            Some(creature) if !creature.removed => creature.direction = direction,
            _ => return,
        }

        let stackpos = self.stackpos_snapshot(player);
        let world = &self.world;
        for session in self.sessions.iter_mut() {
            if let Some(&stackpos) = stackpos.get(&session.id()) {
                session.send_creature_turn(world, player, stackpos);
            }
        }
    }

    //=== Chat ===//

    fn say(&mut self, player: CreatureId, class: SpeakClass, channel_id: u16, receiver: &str, text: &str) {
        let access = self.world.player(player).map(|state| state.is_access()).unwrap_or(false);

        match class {
            SpeakClass::Say | SpeakClass::Whisper => self.creature_say(player, class, text),
            SpeakClass::Yell => self.creature_say(player, class, &text.to_uppercase()),
            SpeakClass::PrivatePn => {
                let Some(pos) = self.world.creature(player).map(|creature| creature.position) else {
                    return;
                };
                for npc in self.npcs_near(pos) {
                    npc.on_creature_say(player, class, text);
                }
            }
            SpeakClass::Private | SpeakClass::PrivateRed => {
                let class = if class == SpeakClass::PrivateRed && !access {
                    SpeakClass::Private
                } else {
                    class
                };
                self.private_message(player, class, receiver, text);
            }
            SpeakClass::Broadcast if access => {
                let ids = self.sessions.ids();
                for id in ids {
                    let world = &self.world;
                    if let Some(session) = self.sessions.get_mut(id) {
                        session.send_creature_say(world, player, class, text, None);
                    }
                }
            }
            _ => debug!(player = player.get(), channel_id, "Speech of class {:?} not delivered", class),
        }
    }

    fn private_message(&mut self, player: CreatureId, class: SpeakClass, receiver: &str, text: &str) {
        let Some(target) = self.world.player_by_name(receiver) else {
            self.with_session(player, |session, _| {
                session.send_text_message(MessageClass::StatusSmall, "A player with this name is not online.")
            });
            return;
        };

        let (name, level) = match self.world.player(player) {
            Some(state) => (state.name.clone(), state.level),
            None => return,
        };
        let statement_id = self.next_statement_id();
        self.with_session(target, |session, _| {
            session.send_private_message(statement_id, Some((&name, level)), class, text)
        });

        let target_name = self.world.player(target).map(|state| state.name.clone()).unwrap_or_default();
        self.with_session(player, |session, _| {
            session.send_text_message(MessageClass::StatusSmall, &format!("Message sent to {}.", target_name))
        });
    }

    fn open_private_channel(&mut self, player: CreatureId, receiver: &str) {
        match self.accounts.find_character(receiver) {
            Some(entry) => self.with_session(player, |session, _| session.send_open_private_channel(&entry.name)),
            None => self.with_session(player, |session, _| {
                session.send_text_message(MessageClass::StatusSmall, "A player with this name does not exist.")
            }),
        }
    }

    //=== Appearance and VIP ===//

    fn change_outfit(&mut self, player: CreatureId, outfit: Outfit) {
        let allowed = self
            .world
            .player(player)
            .map(|state| state.is_access() || state.outfits.iter().any(|entry| entry.look_type == outfit.look_type))
            .unwrap_or(false);
        if !allowed {
            debug!(player = player.get(), look_type = outfit.look_type, "Outfit not available");
            return;
        }

        match self.world.creature_mut(player) {
            Some(creature) => creature.outfit = outfit,
            None => return,
        }
        let world = &self.world;
        for session in self.sessions.iter_mut() {
            session.send_creature_outfit(world, player, &outfit);
        }
    }

    fn add_vip(&mut self, player: CreatureId, name: &str) {
        let Some(entry) = self.accounts.find_character(name) else {
            self.cancel(player, "A player with this name does not exist.");
            return;
        };

        let Some(state) = self.world.player(player) else {
            return;
        };
        let limit = if state.premium { VIP_LIMIT_PREMIUM } else { VIP_LIMIT };
        if state.vip_entries.iter().any(|known| known.guid == entry.guid) {
            self.cancel(player, "This player is already in your list.");
            return;
        }
        if state.vip_entries.len() >= limit {
            self.cancel(player, "You cannot add more buddies.");
            return;
        }

        let account = state.account_id;
        self.accounts.add_vip(account, entry.guid);
        let online = self.world.is_player_online(entry.guid);
        let VipEntry { guid, name } = entry;
        self.with_session(player, |session, _| session.send_vip(guid, &name, online));
        if let Some(state) = self.world.player_mut(player) {
            state.vip_entries.push(VipEntry { guid, name });
        }
    }

    fn remove_vip(&mut self, player: CreatureId, guid: PlayerGuid) {
        let Some(state) = self.world.player_mut(player) else {
            return;
        };
        state.vip_entries.retain(|entry| entry.guid != guid);
        let account = state.account_id;
        self.accounts.remove_vip(account, guid);
    }

    //=== Shop ===//

    fn look_in_shop(&mut self, player: CreatureId, client_id: u16, count: u8) {
        let item_id = self.world.server_item_id(client_id);
        let name = self
            .world
            .player(player)
            .and_then(|state| state.shop.as_ref())
            .and_then(|shop| shop.items.iter().find(|item| item.item_id == item_id))
            .map(|item| item.name.clone());
        let Some(name) = name else {
            return;
        };

        let text = if count > 1 && self.world.item_type(item_id).map(|it| it.stackable).unwrap_or(false) {
            format!("You see {} {}.", count, name)
        } else {
            format!("You see {}.", name)
        };
        self.with_session(player, |session, _| session.send_text_message(MessageClass::InfoDescription, &text));
    }

    /// Hand a purchase or sale to the NPC owning the open shop
    fn shop_trade(&mut self, player: CreatureId, buying: bool, mut request: TradeRequest) {
        request.item_id = self.world.server_item_id(request.item_id);
        let Some(shop) = self.world.player(player).and_then(|state| state.shop.as_ref()) else {
            return;
        };

        let listed = shop.items.iter().any(|item| {
            item.item_id == request.item_id && if buying { item.buy_price > 0 } else { item.sell_price > 0 }
        });
        if !listed {
            debug!(player = player.get(), item = request.item_id, "Trade for an item the shop does not list");
            return;
        }

        let (npc, callback) = (shop.npc, if buying { shop.buy } else { shop.sell });
        if let Some(agent) = self.npcs.get_mut(&npc) {
            agent.on_player_trade(player, callback, &request);
        }
        self.send_sale_list(player);
    }

    //=== Looking ===//

    fn look_at_creature(&mut self, player: CreatureId, creature: CreatureId) {
        let Some(observer) = self.world.observer(player) else {
            return;
        };
        let Some(target) = self.world.creature(creature).filter(|target| observer.can_see_creature(target)) else {
            return;
        };
        let text = if creature == player {
            "You see yourself.".to_string()
        } else {
            format!("You see {}.", target.name)
        };
        self.with_session(player, |session, _| session.send_text_message(MessageClass::InfoDescription, &text));
    }

    fn cancel(&mut self, player: CreatureId, message: &str) {
        self.with_session(player, |session, _| session.send_text_message(MessageClass::StatusSmall, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{LoginRequest, TaskQueue, WorldTask};
    use crate::game::{GameSettings, SharedGameState};
    use crate::session::{ConnectionHandle, Outbound};
    use crate::state::WorldState;
    use crate::world::Tile;
    use ots_accounts::{AccountStore, MemoryAccountStore};
    use ots_core::{AccountType, ClientOs, GameState, Position, WorldType};
    use ots_protocol::{FightMode, SessionState};
    use parking_lot::RwLock;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    const START: Position = Position::new(100, 100, 7);

    struct Client {
        connection: ConnectionId,
        player: CreatureId,
        rx: mpsc::UnboundedReceiver<Outbound>,
    }

    impl Client {
        fn take(&mut self) -> Vec<u8> {
            let mut bytes = Vec::new();
            while let Ok(outbound) = self.rx.try_recv() {
                if let Outbound::Message(msg) = outbound {
                    bytes.extend_from_slice(msg.body());
                }
            }
            bytes
        }
    }

    fn game() -> (Game, Arc<MemoryAccountStore>) {
        let mut world = WorldState::new(WorldType::Pvp);
        for x in 90..=110 {
            for y in 90..=110 {
                world.set_tile(Position::new(x, y, 7), Tile::with_ground(102));
            }
        }
        let store = Arc::new(MemoryAccountStore::new());
        let (queue, _receiver) = TaskQueue::new();
        let state: SharedGameState = Arc::new(RwLock::new(GameState::Normal));
        (Game::new(world, GameSettings::default(), store.clone(), queue, state), store)
    }

    fn enter(game: &mut Game, store: &MemoryAccountStore, name: &str, id: u64, pos: Position) -> Client {
        store.add_account(name, "secret", AccountType::Normal, false).unwrap();
        let guid = store.add_character(name, name, pos).unwrap();
        let account_id = store.character(guid).unwrap().account_id;

        let connection = ConnectionId::new(id);
        let (handle, rx) = ConnectionHandle::channel(connection, None);
        handle.set_state(SessionState::Authenticating);
        game.handle_task(WorldTask::Login(LoginRequest {
            connection: handle,
            guid,
            account_id,
            os: ClientOs::WINDOWS,
            version: 860,
        }));
        let player = game.world.player_by_guid(guid).unwrap();
        let mut client = Client { connection, player, rx };
        client.take();
        client
    }

    fn run(game: &mut Game, client: &Client, command: Command) {
        game.handle_task(WorldTask::Command {
            connection: client.connection,
            command,
        });
    }

    #[test]
    fn test_move_updates_both_clients() {
        let (mut game, store) = game();
        let mut walker = enter(&mut game, &store, "walker", 1, START);
        let mut watcher = enter(&mut game, &store, "watcher", 2, Position::new(103, 100, 7));
        walker.take();

        run(&mut game, &walker, Command::Move { direction: Direction::NorthEast });
        let pos = game.world.creature(walker.player).map(|c| (c.position, c.direction));
        assert_eq!(pos, Some((Position::new(101, 99, 7), Direction::East)));

        // The walker gets a move plus the exposed map strip, the watcher just the move
        let own = walker.take();
        assert_eq!(own[0], 0x6D);
        let seen = watcher.take();
        assert_eq!(seen[0], 0x6D);
    }

    #[test]
    fn test_blocked_step_cancels_walk() {
        let (mut game, store) = game();
        let mut client = enter(&mut game, &store, "walker", 1, Position::new(110, 100, 7));

        run(&mut game, &client, Command::Move { direction: Direction::East });
        assert_eq!(client.take(), vec![0xB5, Direction::South.as_u8()]);
        assert_eq!(
            game.world.creature(client.player).map(|c| c.position),
            Some(Position::new(110, 100, 7))
        );
    }

    #[test]
    fn test_auto_walk_steps_on_think() {
        let (mut game, store) = game();
        let client = enter(&mut game, &store, "walker", 1, START);

        run(
            &mut game,
            &client,
            Command::AutoWalk {
                path: vec![Direction::South, Direction::South],
            },
        );
        game.handle_task(WorldTask::Think);
        game.handle_task(WorldTask::Think);
        assert_eq!(game.world.creature(client.player).map(|c| c.position), Some(Position::new(100, 102, 7)));

        run(
            &mut game,
            &client,
            Command::AutoWalk {
                path: vec![Direction::South],
            },
        );
        run(&mut game, &client, Command::StopAutoWalk);
        game.handle_task(WorldTask::Think);
        assert_eq!(game.world.creature(client.player).map(|c| c.position), Some(Position::new(100, 102, 7)));
    }

    #[test]
    fn test_turn_is_broadcast() {
        let (mut game, store) = game();
        let mut turner = enter(&mut game, &store, "turner", 1, START);
        let mut watcher = enter(&mut game, &store, "watcher", 2, Position::new(102, 100, 7));
        turner.take();

        run(&mut game, &turner, Command::Turn { direction: Direction::West });
        let id = turner.player.get().to_le_bytes();
        let expected = [
            vec![0x6B, 100, 0, 100, 0, 7, 1, 0x63, 0x00],
            id.to_vec(),
            vec![Direction::West.as_u8()],
        ]
        .concat();
        assert_eq!(turner.take(), expected);
        assert_eq!(watcher.take(), expected);
    }

    #[test]
    fn test_private_message_and_unknown_receiver() {
        let (mut game, store) = game();
        let mut sender = enter(&mut game, &store, "sender", 1, START);
        let mut receiver = enter(&mut game, &store, "receiver", 2, Position::new(50, 50, 7));
        sender.take();

        run(
            &mut game,
            &sender,
            Command::Say {
                speak_class: SpeakClass::Private.as_u8(),
                channel_id: 0,
                receiver: "RECEIVER".into(),
                text: "hi".into(),
            },
        );
        let got = receiver.take();
        assert_eq!(got[0], 0xAA);
        assert_eq!(&got[1..5], &1u32.to_le_bytes());
        assert!(sender.take().ends_with(b"Message sent to receiver."));

        run(
            &mut game,
            &sender,
            Command::Say {
                speak_class: SpeakClass::Private.as_u8(),
                channel_id: 0,
                receiver: "nobody".into(),
                text: "hi".into(),
            },
        );
        assert!(sender.take().ends_with(b"A player with this name is not online."));
    }

    #[test]
    fn test_fight_modes_and_outfit() {
        let (mut game, store) = game();
        let mut client = enter(&mut game, &store, "knight", 1, START);

        run(
            &mut game,
            &client,
            Command::SetFightModes {
                fight_mode: FightMode::Attack,
                chase: true,
                secure: false,
            },
        );
        let state = game.world.player(client.player).unwrap();
        assert_eq!((state.fight_mode, state.chase, state.secure), (FightMode::Attack, true, false));

        // Not in the outfit list: ignored
        let outfit = Outfit {
            look_type: 266,
            ..Outfit::default()
        };
        run(&mut game, &client, Command::ChangeOutfit { outfit });
        assert!(client.take().is_empty());

        let outfit = Outfit {
            look_type: 129,
            head: 10,
            ..Outfit::default()
        };
        run(&mut game, &client, Command::ChangeOutfit { outfit });
        assert_eq!(game.world.creature(client.player).map(|c| c.outfit), Some(outfit));
        assert_eq!(client.take()[0], 0x8E);
    }

    #[test]
    fn test_vip_add_and_remove() {
        let (mut game, store) = game();
        let mut client = enter(&mut game, &store, "owner", 1, START);
        enter(&mut game, &store, "friend", 2, Position::new(50, 50, 7));

        run(&mut game, &client, Command::AddVip { name: "ghost".into() });
        assert!(client.take().ends_with(b"A player with this name does not exist."));

        run(&mut game, &client, Command::AddVip { name: "FRIEND".into() });
        let sent = client.take();
        assert_eq!(sent[0], 0xD2);
        assert_eq!(*sent.last().unwrap(), 1);
        let account = game.world.player(client.player).unwrap().account_id;
        assert_eq!(store.vip_entries(account).len(), 1);

        run(&mut game, &client, Command::AddVip { name: "friend".into() });
        assert!(client.take().ends_with(b"This player is already in your list."));

        let guid = store.vip_entries(account)[0].guid;
        run(&mut game, &client, Command::RemoveVip { guid });
        assert!(store.vip_entries(account).is_empty());
        assert!(game.world.player(client.player).unwrap().vip_entries.is_empty());
    }

    #[test]
    fn test_commands_after_release_are_ignored() {
        let (mut game, store) = game();
        let client = enter(&mut game, &store, "walker", 1, START);
        game.handle_task(WorldTask::Release {
            connection: client.connection,
        });

        run(&mut game, &client, Command::Move { direction: Direction::South });
        assert_eq!(game.world.creature(client.player).map(|c| c.position), Some(START));
    }
}
