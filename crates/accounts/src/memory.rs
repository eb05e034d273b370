//! In-memory account store

use crate::account::{
    hash_password, normalize_account_name, Account, BanInfo, CharacterRecord, VipEntry,
};
use crate::error::{AccountError, Result};
use crate::store::{AccountStore, Credentials};
use ots_core::{AccountId, AccountType, PlayerGuid, Position};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use tracing::debug;

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    characters: HashMap<PlayerGuid, CharacterRecord>,
    ip_bans: HashMap<IpAddr, BanInfo>,
    account_bans: HashMap<AccountId, BanInfo>,
    namelocks: HashSet<PlayerGuid>,
    vips: HashMap<AccountId, Vec<PlayerGuid>>,
    next_account: u32,
    next_character: u32,
}

/// Account store kept entirely in memory
///
/// # Purpose
/// Backs tests and servers without a database. Accounts are keyed by their
/// lowercase name; characters by guid.
#[derive(Default)]
pub struct MemoryAccountStore {
    tables: RwLock<Tables>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account and return its id
    pub fn add_account(
        &self,
        name: &str,
        password: &str,
        account_type: AccountType,
        premium: bool,
    ) -> Result<AccountId> {
        let key = normalize_account_name(name);
        if key.is_empty() {
            return Err(AccountError::InvalidData("empty account name".into()));
        }

        let mut tables = self.tables.write();
        if tables.accounts.contains_key(&key) {
            return Err(AccountError::Duplicate(name.to_string()));
        }

        tables.next_account += 1;
        let id = AccountId(tables.next_account);
        tables.accounts.insert(
            key,
            Account {
                id,
                name: name.to_string(),
                password_hash: hash_password(password),
                account_type,
                premium,
                characters: Vec::new(),
            },
        );
        debug!("Added account {} ({})", name, id.get());
        Ok(id)
    }

    /// Create a character on an existing account
    ///
    /// The character inherits the account's type and premium status.
    pub fn add_character(&self, account_name: &str, character_name: &str, temple: Position) -> Result<PlayerGuid> {
        let key = normalize_account_name(account_name);
        let mut tables = self.tables.write();
        let guid = PlayerGuid(tables.next_character + 1);

        let account = tables
            .accounts
            .get_mut(&key)
            .ok_or_else(|| AccountError::NotFound(account_name.to_string()))?;
        account.characters.push(guid);

        let mut record = CharacterRecord::new(guid, account.id, character_name, temple);
        record.account_type = account.account_type;
        record.premium = account.premium;
        tables.next_character = guid.get();
        tables.characters.insert(guid, record);
        Ok(guid)
    }

    /// Replace a stored character record
    pub fn update_character(&self, record: CharacterRecord) -> Result<()> {
        let mut tables = self.tables.write();
        match tables.characters.get_mut(&record.guid) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(AccountError::CharacterNotFound(record.guid.get())),
        }
    }

    pub fn character(&self, guid: PlayerGuid) -> Option<CharacterRecord> {
        self.tables.read().characters.get(&guid).cloned()
    }

    pub fn ban_ip(&self, ip: IpAddr, ban: BanInfo) {
        self.tables.write().ip_bans.insert(ip, ban);
    }

    pub fn ban_account(&self, account: AccountId, ban: BanInfo) {
        self.tables.write().account_bans.insert(account, ban);
    }

    pub fn namelock(&self, guid: PlayerGuid) {
        self.tables.write().namelocks.insert(guid);
    }

    pub fn account_count(&self) -> usize {
        self.tables.read().accounts.len()
    }
}

impl AccountStore for MemoryAccountStore {
    fn verify_credentials(&self, account_name: &str, password: &str, character_name: &str) -> Option<Credentials> {
        let tables = self.tables.read();
        let account = tables.accounts.get(&normalize_account_name(account_name))?;
        if !account.check_password(password) {
            return None;
        }

        account
            .characters
            .iter()
            .filter_map(|guid| tables.characters.get(guid))
            .find(|record| !record.deleted && record.name == character_name)
            .map(|record| Credentials {
                account_id: account.id,
                character: record.guid,
            })
    }

    fn ip_ban(&self, ip: IpAddr, now: i64) -> Option<BanInfo> {
        let tables = self.tables.read();
        tables.ip_bans.get(&ip).filter(|ban| ban.is_active(now)).cloned()
    }

    fn account_ban(&self, account: AccountId, now: i64) -> Option<BanInfo> {
        let tables = self.tables.read();
        tables
            .account_bans
            .get(&account)
            .filter(|ban| ban.is_active(now))
            .cloned()
    }

    fn is_namelocked(&self, guid: PlayerGuid) -> bool {
        self.tables.read().namelocks.contains(&guid)
    }

    fn vip_entries(&self, account: AccountId) -> Vec<VipEntry> {
        let tables = self.tables.read();
        let Some(list) = tables.vips.get(&account) else {
            return Vec::new();
        };
        list.iter()
            .filter_map(|guid| tables.characters.get(guid))
            .map(|record| VipEntry {
                guid: record.guid,
                name: record.name.clone(),
            })
            .collect()
    }

    fn find_character(&self, name: &str) -> Option<VipEntry> {
        let tables = self.tables.read();
        tables
            .characters
            .values()
            .find(|record| !record.deleted && record.name.eq_ignore_ascii_case(name))
            .map(|record| VipEntry {
                guid: record.guid,
                name: record.name.clone(),
            })
    }

    fn add_vip(&self, account: AccountId, guid: PlayerGuid) {
        let mut tables = self.tables.write();
        let list = tables.vips.entry(account).or_default();
        if !list.contains(&guid) {
            list.push(guid);
        }
    }

    fn remove_vip(&self, account: AccountId, guid: PlayerGuid) {
        if let Some(list) = self.tables.write().vips.get_mut(&account) {
            list.retain(|&entry| entry != guid);
        }
    }

    fn preload_character(&self, guid: PlayerGuid) -> Option<CharacterRecord> {
        self.character(guid).filter(|record| !record.deleted)
    }

    fn load_character(&self, guid: PlayerGuid) -> Option<CharacterRecord> {
        self.character(guid).filter(|record| !record.deleted)
    }

    fn record_login(&self, guid: PlayerGuid, ip: Option<IpAddr>, at: i64) {
        let mut tables = self.tables.write();
        if let Some(record) = tables.characters.get_mut(&guid) {
            record.last_login = at.max(record.last_login + 1);
            record.last_ip = ip;
        }
    }
}
