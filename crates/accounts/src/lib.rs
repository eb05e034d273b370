//! # OTS Account Management
//!
//! Persistence collaborator for the login path: credential checks, bans,
//! name locks, VIP lists and character records.
//!
//! ## Usage
//!
//! ```rust
//! use ots_accounts::{AccountStore, MemoryAccountStore};
//! use ots_core::{AccountType, Position};
//!
//! let store = MemoryAccountStore::new();
//! store.add_account("tester", "secret", AccountType::Normal, false).unwrap();
//! store.add_character("tester", "Knight", Position::new(100, 100, 7)).unwrap();
//!
//! assert!(store.verify_credentials("tester", "secret", "Knight").is_some());
//! ```

mod account;
mod error;
mod memory;
mod store;

pub use account::{
    format_date_short, hash_password, normalize_account_name, Account, BanInfo, CharacterRecord,
    VipEntry,
};
pub use error::{AccountError, Result};
pub use memory::MemoryAccountStore;
pub use store::{AccountStore, Credentials};
