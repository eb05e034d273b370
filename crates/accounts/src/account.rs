//! Account, character and ban records

use ots_core::{AccountId, AccountType, Direction, Outfit, PlayerGuid, Position};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt::Write;

/// Lowercase hex SHA-1 of a password, as stored with the account
pub fn hash_password(password: &str) -> String {
    let digest = Sha1::digest(password.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Normalize an account name for lookups
pub fn normalize_account_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Player account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// SHA-1 hex of the password
    pub password_hash: String,
    pub account_type: AccountType,
    pub premium: bool,
    pub characters: Vec<PlayerGuid>,
}

impl Account {
    pub fn check_password(&self, password: &str) -> bool {
        self.password_hash.eq_ignore_ascii_case(&hash_password(password))
    }
}

/// Persistent character data needed to place a player in the world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub guid: PlayerGuid,
    pub account_id: AccountId,
    pub name: String,
    pub account_type: AccountType,
    pub premium: bool,
    /// Bypasses capacity, closing and closed checks
    pub can_always_login: bool,
    pub cannot_be_banned: bool,
    pub deleted: bool,

    pub login_position: Position,
    pub temple_position: Position,
    pub direction: Direction,
    pub outfit: Outfit,

    pub level: u16,
    pub experience: u64,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub magic_level: u8,
    pub soul: u8,
    pub capacity: u32,
    pub stamina_minutes: u16,

    pub last_login: i64,
    pub last_ip: Option<std::net::IpAddr>,
}

impl CharacterRecord {
    /// A fresh level 1 character standing on its temple
    pub fn new(guid: PlayerGuid, account_id: AccountId, name: &str, temple: Position) -> Self {
        Self {
            guid,
            account_id,
            name: name.to_string(),
            account_type: AccountType::Normal,
            premium: false,
            can_always_login: false,
            cannot_be_banned: false,
            deleted: false,
            login_position: temple,
            temple_position: temple,
            direction: Direction::South,
            outfit: Outfit::new(128, 78, 69, 58, 76, 0),
            level: 1,
            experience: 0,
            health: 150,
            max_health: 150,
            mana: 0,
            max_mana: 0,
            magic_level: 0,
            soul: 100,
            capacity: 400,
            stamina_minutes: 2520,
            last_login: 0,
            last_ip: None,
        }
    }

    /// Gamemasters and above skip most login restrictions
    pub fn is_privileged(&self) -> bool {
        self.account_type.is_privileged()
    }
}

/// One friend-list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipEntry {
    pub guid: PlayerGuid,
    pub name: String,
}

/// Active ban
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanInfo {
    /// Unix seconds; 0 for a permanent ban
    pub expires_at: i64,
    pub banned_by: String,
    pub reason: String,
}

impl BanInfo {
    pub fn is_permanent(&self) -> bool {
        self.expires_at <= 0
    }

    /// Whether the ban still applies at `now` (Unix seconds)
    pub fn is_active(&self, now: i64) -> bool {
        self.is_permanent() || now < self.expires_at
    }
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Format Unix seconds as `16 Oct 2026` (UTC)
pub fn format_date_short(unix_seconds: i64) -> String {
    let days = unix_seconds.div_euclid(86_400);

    // Civil-from-days over 400-year eras
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    format!("{:02} {} {}", day, MONTHS[(month - 1) as usize], year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        assert_eq!(hash_password("test"), "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3");
    }

    #[test]
    fn test_check_password_ignores_hex_case() {
        let account = Account {
            id: AccountId(1),
            name: "acc".into(),
            password_hash: hash_password("test").to_uppercase(),
            account_type: AccountType::Normal,
            premium: false,
            characters: vec![],
        };
        assert!(account.check_password("test"));
        assert!(!account.check_password("Test"));
    }

    #[test]
    fn test_ban_expiry() {
        let temporary = BanInfo {
            expires_at: 100,
            banned_by: "GM".into(),
            reason: "spam".into(),
        };
        assert!(temporary.is_active(99));
        assert!(!temporary.is_active(100));

        let permanent = BanInfo {
            expires_at: 0,
            ..temporary
        };
        assert!(permanent.is_permanent());
        assert!(permanent.is_active(i64::MAX));
    }

    #[test]
    fn test_format_date_short() {
        assert_eq!(format_date_short(0), "01 Jan 1970");
        assert_eq!(format_date_short(951_782_400), "29 Feb 2000");
        assert_eq!(format_date_short(1_792_108_800), "16 Oct 2026");
    }

    #[test]
    fn test_normalize_account_name() {
        assert_eq!(normalize_account_name("  Admin "), "admin");
    }
}
