//! Map positions and facing directions

use serde::{Deserialize, Serialize};

/// Absolute map position: 16-bit x/y, 8-bit floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

impl Position {
    pub const fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Build a position from signed coordinates, `None` if any axis is out of range
    pub fn from_signed(x: i32, y: i32, z: i32) -> Option<Self> {
        Some(Self {
            x: u16::try_from(x).ok()?,
            y: u16::try_from(y).ok()?,
            z: u8::try_from(z).ok()?,
        })
    }

    /// Neighbouring position one step towards `direction`
    pub fn step(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.delta();
        Self::from_signed(self.x as i32 + dx, self.y as i32 + dy, self.z as i32)
    }

    /// Whether `other` lies within `range_x`/`range_y` tiles on the same floor
    pub fn is_in_range(&self, other: &Position, range_x: i32, range_y: i32) -> bool {
        self.z == other.z
            && (self.x as i32 - other.x as i32).abs() <= range_x
            && (self.y as i32 - other.y as i32).abs() <= range_y
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Facing and movement direction, valued as the client encodes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    East = 1,
    #[default]
    South = 2,
    West = 3,
    SouthWest = 4,
    SouthEast = 5,
    NorthWest = 6,
    NorthEast = 7,
}

impl Direction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::North),
            1 => Some(Self::East),
            2 => Some(Self::South),
            3 => Some(Self::West),
            4 => Some(Self::SouthWest),
            5 => Some(Self::SouthEast),
            6 => Some(Self::NorthWest),
            7 => Some(Self::NorthEast),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Map a compass code from an autowalk path (1 = east, counter-clockwise to 8 = south-east)
    pub fn from_path_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::East),
            2 => Some(Self::NorthEast),
            3 => Some(Self::North),
            4 => Some(Self::NorthWest),
            5 => Some(Self::West),
            6 => Some(Self::SouthWest),
            7 => Some(Self::South),
            8 => Some(Self::SouthEast),
            _ => None,
        }
    }

    /// Unit step as (dx, dy)
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
            Self::SouthWest => (-1, 1),
            Self::SouthEast => (1, 1),
            Self::NorthWest => (-1, -1),
            Self::NorthEast => (1, -1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_signed_rejects_negative() {
        assert_eq!(Position::from_signed(-1, 5, 7), None);
        assert_eq!(Position::from_signed(1, 5, 300), None);
        assert_eq!(Position::from_signed(1, 5, 7), Some(Position::new(1, 5, 7)));
    }

    #[test]
    fn test_step() {
        let pos = Position::new(100, 100, 7);
        assert_eq!(pos.step(Direction::North), Some(Position::new(100, 99, 7)));
        assert_eq!(pos.step(Direction::SouthEast), Some(Position::new(101, 101, 7)));
        assert_eq!(Position::new(0, 0, 7).step(Direction::West), None);
    }

    #[test]
    fn test_path_codes() {
        assert_eq!(Direction::from_path_code(1), Some(Direction::East));
        assert_eq!(Direction::from_path_code(3), Some(Direction::North));
        assert_eq!(Direction::from_path_code(8), Some(Direction::SouthEast));
        assert_eq!(Direction::from_path_code(0), None);
        assert_eq!(Direction::from_path_code(9), None);
    }

    #[test]
    fn test_in_range() {
        let a = Position::new(100, 100, 7);
        assert!(a.is_in_range(&Position::new(103, 97, 7), 3, 3));
        assert!(!a.is_in_range(&Position::new(104, 100, 7), 3, 3));
        assert!(!a.is_in_range(&Position::new(100, 100, 6), 3, 3));
    }
}
