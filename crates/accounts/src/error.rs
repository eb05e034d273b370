//! Account-related errors

use ots_core::OtsError;
use thiserror::Error;

/// Account-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Character not found: {0}")]
    CharacterNotFound(u32),

    #[error("Account already exists: {0}")]
    Duplicate(String),

    #[error("Invalid account data: {0}")]
    InvalidData(String),
}

impl From<AccountError> for OtsError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(name) => OtsError::NotFound(name),
            AccountError::CharacterNotFound(guid) => OtsError::NotFound(format!("character {guid}")),
            other => OtsError::InvalidData(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;
