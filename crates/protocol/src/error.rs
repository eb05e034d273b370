//! Protocol-level errors

use ots_core::OtsError;

/// Errors raised while framing, decrypting or decoding client traffic
///
/// Every variant is a protocol violation: the offending connection is
/// closed without a message.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message overrun")]
    Overrun,

    #[error("frame length {0} exceeds the maximum message size")]
    FrameTooLarge(usize),

    #[error("encrypted body length {0} is not a multiple of 8")]
    BlockAlignment(usize),

    #[error("inner length {inner} exceeds decrypted body of {available} bytes")]
    InnerLength { inner: usize, available: usize },

    #[error("RSA block missing or truncated")]
    RsaBlockTooShort,

    #[error("RSA decryption failed")]
    RsaDecrypt,

    #[error("invalid RSA key: {0}")]
    RsaKey(String),

    #[error("unexpected protocol id 0x{0:02X}")]
    UnknownProtocol(u8),
}

impl From<ProtocolError> for OtsError {
    fn from(err: ProtocolError) -> Self {
        OtsError::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
