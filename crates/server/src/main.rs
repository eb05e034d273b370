//! OTS - 8.60 game server
//!
//! Wires the configuration, the account store, the world loop and the
//! game port listener together.

use anyhow::Context;
use ots_accounts::MemoryAccountStore;
use ots_config::{ServerConfig, DEFAULT_CONFIG_PATH};
use ots_core::{GameState, Position};
use ots_game::{Game, GameSettings, TaskQueue, Tile, WorldState};
use ots_network::{ConnectionContext, GameServer, NetworkConfig};
use ots_protocol::{RsaDecryptor, RsaKey};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Where characters without a valid position are placed
const TEMPLE: Position = Position::new(1000, 1000, 7);
/// Half extent of the generated ground around the temple
const GROUND_RADIUS: u16 = 32;
const GRASS_CLIENT_ID: u16 = 106;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("OTS starting up (protocol {})", ots_core::CLIENT_VERSION_STR);

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match ServerConfig::load_from_file(&path) {
        Ok(config) => {
            info!("Configuration loaded from {}", path);
            config
        }
        Err(e) => {
            warn!("{}; using default configuration", e);
            ServerConfig::default()
        }
    };
    config.display();

    let rsa: Option<Arc<dyn RsaDecryptor>> = match config.rsa_key() {
        Some((modulus, exponent)) => {
            let key: Arc<dyn RsaDecryptor> =
                Arc::new(RsaKey::from_decimal(modulus, exponent).context("invalid RSA key in configuration")?);
            Some(key)
        }
        None => None,
    };

    let accounts = Arc::new(MemoryAccountStore::new());
    let game_state = Arc::new(RwLock::new(GameState::Startup));
    let (queue, receiver) = TaskQueue::new();

    let settings = GameSettings {
        max_players: config.max_players,
        allow_clones: config.allow_clones,
        replace_kick_on_login: config.replace_kick_on_login,
        one_player_on_account: config.one_player_on_account,
    };
    let game = Game::new(
        bootstrap_world(&config),
        settings,
        accounts.clone(),
        queue.clone(),
        Arc::clone(&game_state),
    );
    let world = tokio::spawn(game.run(receiver));

    let context = ConnectionContext {
        queue,
        accounts,
        rsa,
        game_state: Arc::clone(&game_state),
        config: NetworkConfig {
            bind_address: config.bind_address(),
            ..Default::default()
        },
    };
    let server = GameServer::bind(Arc::new(context))
        .await
        .context("cannot start the game listener")?;

    info!("Server is ready to accept connections");
    server.run().await.context("game listener failed")?;

    *game_state.write() = GameState::Shutdown;
    drop(server);
    world.abort();
    info!("Server shut down");
    Ok(())
}

/// Flat ground around the temple until a map loader provides the world
fn bootstrap_world(config: &ServerConfig) -> WorldState {
    let mut world = WorldState::new(config.world_type);
    for x in TEMPLE.x - GROUND_RADIUS..=TEMPLE.x + GROUND_RADIUS {
        for y in TEMPLE.y - GROUND_RADIUS..=TEMPLE.y + GROUND_RADIUS {
            world.set_tile(Position::new(x, y, TEMPLE.z), Tile::with_ground(GRASS_CLIENT_ID));
        }
    }
    info!(
        "Generated {}x{} ground tiles around {}",
        GROUND_RADIUS * 2 + 1,
        GROUND_RADIUS * 2 + 1,
        TEMPLE
    );
    world
}
