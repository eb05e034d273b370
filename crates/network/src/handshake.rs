//! # Login Gate
//!
//! Checks a decoded first message before the world loop sees it. The
//! session key is already installed at this point, so every refusal that
//! carries a message goes out encrypted.
//!
//! Order of checks:
//!
//! ```text
//! account name -> challenge echo -> client version -> world state
//!              -> IP ban -> credentials
//! ```
//!
//! A wrong challenge echo closes the connection silently; every other
//! refusal sends a [`LoginRejection`] text first.

use ots_accounts::{AccountStore, Credentials};
use ots_core::{GameState, CLIENT_VERSION_MAX, CLIENT_VERSION_MIN};
use ots_game::LoginRejection;
use ots_protocol::{Challenge, FirstMessage};
use std::net::IpAddr;

/// Why a first message did not lead to a login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// Close without a message
    Silent,
    /// Send the rejection text, then close
    Rejected(LoginRejection),
}

impl From<LoginRejection> for Refusal {
    fn from(rejection: LoginRejection) -> Self {
        Refusal::Rejected(rejection)
    }
}

/// Everything the gate needs to judge one first message
pub struct LoginGate<'a> {
    pub challenge: Challenge,
    pub game_state: GameState,
    pub ip: Option<IpAddr>,
    pub accounts: &'a dyn AccountStore,
    /// Unix seconds, for ban expiry
    pub now: i64,
}

impl LoginGate<'_> {
    /// Run the checks in order
    ///
    /// # Returns
    /// The account and character the credentials resolved to, or the
    /// first refusal hit.
    pub fn check(&self, first: &FirstMessage) -> Result<Credentials, Refusal> {
        if first.account_name.is_empty() {
            return Err(LoginRejection::EmptyAccountName.into());
        }

        if !self.challenge.matches(first.timestamp, first.random) {
            tracing::debug!("Challenge echo mismatch from {:?}", self.ip);
            return Err(Refusal::Silent);
        }

        if first.version < CLIENT_VERSION_MIN || first.version > CLIENT_VERSION_MAX {
            return Err(LoginRejection::WrongVersion.into());
        }

        match self.game_state {
            GameState::Startup => return Err(LoginRejection::StartingUp.into()),
            GameState::Maintain => return Err(LoginRejection::Maintenance.into()),
            _ => {}
        }

        if let Some(ip) = self.ip {
            if let Some(ban) = self.accounts.ip_ban(ip, self.now) {
                return Err(LoginRejection::IpBanned(ban).into());
            }
        }

        self.accounts
            .verify_credentials(&first.account_name, &first.password, &first.character_name)
            .ok_or(Refusal::Rejected(LoginRejection::InvalidCredentials))
    }
}
