//! Error type shared across the OTS crates
//!
//! Each crate keeps its own detailed error enum and converts into
//! [`OtsError`] where results cross crate boundaries.

#[derive(thiserror::Error, Debug)]
pub enum OtsError {
    /// Malformed frame or message; fatal to the one connection
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// NPC library or script failure
    #[error("script failure: {0}")]
    Script(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Listener or socket setup failed
    #[error("network error: {0}")]
    Network(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown account, character, creature or session
    #[error("not found: {0}")]
    NotFound(String),

    /// A world mutation was refused (blocked tile, missing ground)
    #[error("world error: {0}")]
    World(String),

    /// Persisted data failed validation
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, OtsError>;
