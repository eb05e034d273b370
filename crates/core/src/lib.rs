//! OTS Core - Fundamental types and protocol constants

mod error;
mod types;
mod idgen;
mod positions;
mod constants;

pub use error::*;
pub use types::*;
pub use idgen::*;
pub use positions::*;
pub use constants::*;
