//! Error types for the world context

use ots_accounts::{format_date_short, BanInfo};
use ots_core::{ConnectionId, CreatureId, OtsError, Position, CLIENT_VERSION_STR};
use std::fmt;

/// Failures of world operations that are not login rejections
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("No tile at {0}")]
    NoTile(Position),

    #[error("Tile at {0} is blocked")]
    TileBlocked(Position),

    #[error("Creature not found: {0:?}")]
    CreatureNotFound(CreatureId),

    #[error("Session not found: {0:?}")]
    SessionNotFound(ConnectionId),

    #[error("Task queue closed")]
    QueueClosed,
}

impl From<GameError> for OtsError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::CreatureNotFound(_) | GameError::SessionNotFound(_) => OtsError::NotFound(err.to_string()),
            _ => OtsError::World(err.to_string()),
        }
    }
}

/// Result type for world operations
pub type Result<T> = std::result::Result<T, GameError>;

/// Reason a login is refused
///
/// `Display` renders the text shown to the player in the disconnect box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRejection {
    EmptyAccountName,
    WrongVersion,
    StartingUp,
    Maintenance,
    IpBanned(BanInfo),
    InvalidCredentials,
    CharacterLoadFailed,
    Namelocked,
    GoingDown,
    ServerClosed,
    OnePerAccount,
    AccountBanned(BanInfo),
    TemplePositionWrong,
    AlreadyLoggedIn,
}

impl fmt::Display for LoginRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAccountName => f.write_str("You must enter your account name."),
            Self::WrongVersion => write!(f, "Only clients with protocol {} allowed!", CLIENT_VERSION_STR),
            Self::StartingUp => f.write_str("Gameworld is starting up. Please wait."),
            Self::Maintenance => f.write_str("Gameworld is under maintenance. Please re-connect in a while."),
            Self::IpBanned(ban) => write!(
                f,
                "Your IP has been banned until {} by {}.\n\nReason specified:\n{}",
                format_date_short(ban.expires_at),
                ban.banned_by,
                ban.reason
            ),
            Self::InvalidCredentials => f.write_str("Account name or password is not correct."),
            Self::CharacterLoadFailed => f.write_str("Your character could not be loaded."),
            Self::Namelocked => f.write_str("Your character has been namelocked."),
            Self::GoingDown => f.write_str("The game is just going down.\nPlease try again later."),
            Self::ServerClosed => f.write_str("Server is currently closed.\nPlease try again later."),
            Self::OnePerAccount => {
                f.write_str("You may only login with one character\nof your account at the same time.")
            }
            Self::AccountBanned(ban) if ban.is_permanent() => write!(
                f,
                "Your account has been permanently banned by {}.\n\nReason specified:\n{}",
                ban.banned_by, ban.reason
            ),
            Self::AccountBanned(ban) => write!(
                f,
                "Your account has been banned until {} by {}.\n\nReason specified:\n{}",
                format_date_short(ban.expires_at),
                ban.banned_by,
                ban.reason
            ),
            Self::TemplePositionWrong => f.write_str("Temple position is wrong. Contact the administrator."),
            Self::AlreadyLoggedIn => f.write_str("You are already logged in."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ban(expires_at: i64) -> BanInfo {
        BanInfo {
            expires_at,
            banned_by: "Admin".to_string(),
            reason: "Botting".to_string(),
        }
    }

    #[test]
    fn test_account_ban_messages() {
        let permanent = LoginRejection::AccountBanned(ban(0)).to_string();
        assert_eq!(
            permanent,
            "Your account has been permanently banned by Admin.\n\nReason specified:\nBotting"
        );

        let temporary = LoginRejection::AccountBanned(ban(86_400)).to_string();
        assert_eq!(
            temporary,
            "Your account has been banned until 02 Jan 1970 by Admin.\n\nReason specified:\nBotting"
        );
    }

    #[test]
    fn test_version_message() {
        assert_eq!(
            LoginRejection::WrongVersion.to_string(),
            "Only clients with protocol 8.60 allowed!"
        );
    }
}
