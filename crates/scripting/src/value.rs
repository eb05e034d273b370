//! Positional arguments handed to script callbacks

use ots_core::{CreatureId, Position};

/// One argument or return value of a script call
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Creature(CreatureId),
    Position(Position),
    Number(i64),
    Bool(bool),
    String(String),
}

impl ScriptValue {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Bool(value) => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_creature(&self) -> Option<CreatureId> {
        match self {
            Self::Creature(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<CreatureId> for ScriptValue {
    fn from(id: CreatureId) -> Self {
        Self::Creature(id)
    }
}

impl From<Position> for ScriptValue {
    fn from(pos: Position) -> Self {
        Self::Position(pos)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ScriptValue {
            fn from(value: $ty) -> Self {
                Self::Number(value as i64)
            }
        })*
    };
}

number_from!(u8, u16, u32, i32, i64);
