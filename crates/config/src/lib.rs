//! OTS Configuration Management
//!
//! Loads the game server options from a `key = value` text file. Lines
//! starting with `#` are comments; values may be wrapped in double quotes.
//! Unknown keys are ignored, malformed values keep their defaults.

use ots_core::{OtsError, Result, WorldType};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Default location of the options file
pub const DEFAULT_CONFIG_PATH: &str = "config.txt";

/// Game server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name (from "servername" option)
    pub server_name: String,
    /// Listen address (from "ip" option, default: 0.0.0.0)
    pub ip: IpAddr,
    /// Game port (from "gameport" option, default: 7172)
    pub game_port: u16,
    /// Players admitted before the wait list kicks in, 0 = unlimited
    /// (from "maxplayers" option)
    pub max_players: usize,
    /// Let one character log in more than once (from "allowclones" option)
    pub allow_clones: bool,
    /// A second login kicks the first one (from "replacekickonlogin" option)
    pub replace_kick_on_login: bool,
    /// One character per account at a time (from "oneplayeronaccount" option)
    pub one_player_on_account: bool,
    /// PvP ruleset (from "worldtype" option)
    pub world_type: WorldType,
    /// Message of the day (from "motd" option)
    pub motd: String,
    /// Seconds between status answers to one address (from "statustimeout" option)
    pub status_timeout: u64,

    // Private RSA key, decimal
    /// RSA modulus (from "rsamodulus" option)
    pub rsa_modulus: Option<String>,
    /// RSA private exponent (from "rsaexponent" option)
    pub rsa_exponent: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "Forgotten".into(),
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            game_port: 7172,
            max_players: 900,
            allow_clones: false,
            replace_kick_on_login: true,
            one_player_on_account: true,
            world_type: WorldType::Pvp,
            motd: "Welcome to The Forgotten Server!".into(),
            status_timeout: 5,
            rsa_modulus: None,
            rsa_exponent: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| OtsError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Ok(Self::parse(&content))
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                config.parse_option(&key.trim().to_lowercase(), unquote(value.trim()));
            }
        }

        config
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key {
            "servername" => self.server_name = value.into(),
            "ip" => self.ip = parse_or(key, value, self.ip),
            "gameport" => self.game_port = parse_or(key, value, self.game_port),
            "maxplayers" => self.max_players = parse_or(key, value, self.max_players),
            "allowclones" => self.allow_clones = parse_bool(key, value, self.allow_clones),
            "replacekickonlogin" => {
                self.replace_kick_on_login = parse_bool(key, value, self.replace_kick_on_login);
            }
            "oneplayeronaccount" => {
                self.one_player_on_account = parse_bool(key, value, self.one_player_on_account);
            }
            "worldtype" => match WorldType::from_name(value) {
                Some(world_type) => self.world_type = world_type,
                None => tracing::warn!("Unknown world type '{}', keeping {:?}", value, self.world_type),
            },
            "motd" => self.motd = value.into(),
            "statustimeout" => self.status_timeout = parse_or(key, value, self.status_timeout),
            "rsamodulus" => self.rsa_modulus = non_empty(value),
            "rsaexponent" => self.rsa_exponent = non_empty(value),
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
    }

    /// Get the bind address for the game listener
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.game_port)
    }

    /// Both halves of the private key, if configured
    pub fn rsa_key(&self) -> Option<(&str, &str)> {
        match (&self.rsa_modulus, &self.rsa_exponent) {
            (Some(modulus), Some(exponent)) => Some((modulus.as_str(), exponent.as_str())),
            _ => None,
        }
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Server configuration:");
        tracing::info!("    Name: {}", self.server_name);
        tracing::info!("    Bind: {}", self.bind_address());
        tracing::info!("    World type: {:?}", self.world_type);
        if self.max_players == 0 {
            tracing::info!("    Max players: unlimited");
        } else {
            tracing::info!("    Max players: {}", self.max_players);
        }
        tracing::info!(
            "    Clones: {}, replace kick: {}, one player per account: {}",
            self.allow_clones,
            self.replace_kick_on_login,
            self.one_player_on_account
        );
        tracing::info!("    Status timeout: {}s", self.status_timeout);
        tracing::info!("    MOTD: {}", self.motd);
        if self.rsa_key().is_some() {
            tracing::info!("    RSA key: configured");
        } else {
            tracing::warn!("    RSA key: missing, every login will be refused");
        }
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Debug>(key: &str, value: &str, current: T) -> T {
    value.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid value '{}' for {}, keeping {:?}", value, key, current);
        current
    })
}

fn parse_bool(key: &str, value: &str, current: bool) -> bool {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "1" => true,
        "no" | "false" | "0" => false,
        _ => {
            tracing::warn!("Invalid value '{}' for {}, keeping {}", value, key, current);
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.game_port, 7172);
        assert_eq!(config.bind_address(), "0.0.0.0:7172".parse().unwrap());
        assert!(config.rsa_key().is_none());
    }

    #[test]
    fn test_parse_simple_config() {
        let config_text = r#"
# world
servername = "Test Server"
gameport = 7272
maxplayers = 50
worldtype = no-pvp
allowclones = yes
replacekickonlogin = false
"#;
        let config = ServerConfig::parse(config_text);
        assert_eq!(config.server_name, "Test Server");
        assert_eq!(config.game_port, 7272);
        assert_eq!(config.max_players, 50);
        assert_eq!(config.world_type, WorldType::NoPvp);
        assert!(config.allow_clones);
        assert!(!config.replace_kick_on_login);
    }

    #[test]
    fn test_malformed_values_keep_defaults() {
        let config = ServerConfig::parse("gameport = many\nworldtype = chaos\nallowclones = maybe\nunknown = 1");
        assert_eq!(config.game_port, 7172);
        assert_eq!(config.world_type, WorldType::Pvp);
        assert!(!config.allow_clones);
    }

    #[test]
    fn test_rsa_key_needs_both_halves() {
        let config = ServerConfig::parse("rsamodulus = 3233");
        assert!(config.rsa_key().is_none());

        let config = ServerConfig::parse("rsamodulus = 3233\nrsaexponent = 2753");
        assert_eq!(config.rsa_key(), Some(("3233", "2753")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ip = 127.0.0.1").unwrap();
        writeln!(file, "motd = Hello").unwrap();

        let config = ServerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:7172".parse().unwrap());
        assert_eq!(config.motd, "Hello");
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load_from_file(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, OtsError::Config(_)));
    }
}
