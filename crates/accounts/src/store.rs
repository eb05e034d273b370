//! Persistence collaborator consumed by the login path

use crate::account::{BanInfo, CharacterRecord, VipEntry};
use ots_core::{AccountId, PlayerGuid};
use std::net::IpAddr;

/// Resolved identity of a successful credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub account_id: AccountId,
    pub character: PlayerGuid,
}

/// Account and character persistence
///
/// Lookups are synchronous; the network context calls the credential and
/// IP-ban checks, the world context calls the rest.
pub trait AccountStore: Send + Sync {
    /// Match account name, password and a non-deleted character of that account
    fn verify_credentials(&self, account_name: &str, password: &str, character_name: &str) -> Option<Credentials>;

    /// Active ban on `ip` at `now` (Unix seconds)
    fn ip_ban(&self, ip: IpAddr, now: i64) -> Option<BanInfo>;

    /// Active ban on the account at `now` (Unix seconds)
    fn account_ban(&self, account: AccountId, now: i64) -> Option<BanInfo>;

    fn is_namelocked(&self, guid: PlayerGuid) -> bool;

    fn vip_entries(&self, account: AccountId) -> Vec<VipEntry>;

    /// Guid and stored spelling of a character name, matched case-insensitively
    fn find_character(&self, name: &str) -> Option<VipEntry>;

    fn add_vip(&self, account: AccountId, guid: PlayerGuid);

    fn remove_vip(&self, account: AccountId, guid: PlayerGuid);

    /// Lightweight load used for the login checks
    fn preload_character(&self, guid: PlayerGuid) -> Option<CharacterRecord>;

    /// Full load performed once the login checks have passed
    fn load_character(&self, guid: PlayerGuid) -> Option<CharacterRecord>;

    /// Last-login bookkeeping
    fn record_login(&self, guid: PlayerGuid, ip: Option<IpAddr>, at: i64);
}
