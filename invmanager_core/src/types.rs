// Core types shared across the manager core.
//
// Defines block positions (`BlockPos`), the six fixed neighbour directions
// (`Direction`), the inventory side selector used by remote callers
// (`InventorySide`), compact integer IDs for callers and players, and the
// `ItemStack` value type. All types derive `Serialize` and `Deserialize` so
// they can travel inside envelopes and persisted records.
//
// **Direction ordinals are part of the persisted format.** Bit *i* of an
// adjacency mask refers to `Direction::ALL[i]`; reordering the enum would
// silently corrupt every saved mask.
//
// See also: `scanner.rs` for the adjacency masks built from `Direction`,
// `dispatch.rs` for `InventorySide` parsing of call arguments,
// `inventory.rs` for the `Inventory` trait that moves `ItemStack`s.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A block position in the host world.
///
/// - X: east  (positive) / west  (negative)
/// - Y: up    (positive) / down  (negative)
/// - Z: south (positive) / north (negative)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The position one block away in `direction`. `None` past the edge of
    /// the coordinate range.
    pub fn offset(self, direction: Direction) -> Option<Self> {
        let (dx, dy, dz) = direction.offset();
        Some(Self::new(
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.z.checked_add(dz)?,
        ))
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six fixed neighbour directions, in ordinal order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    /// All six directions, indexed by ordinal.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// The single mask bit for this direction.
    pub fn bit(self) -> u8 {
        1 << self.ordinal()
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    /// Unit offset `(dx, dy, dz)`.
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::North => "north",
            Direction::South => "south",
            Direction::West => "west",
            Direction::East => "east",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Inventory side selector
// ---------------------------------------------------------------------------

/// Which inventory a remote call addresses: one of the six neighbours, or the
/// player standing on a plate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventorySide {
    Down,
    Up,
    North,
    South,
    East,
    West,
    Player,
}

impl InventorySide {
    /// Parse the exact lowercase selector a script passes.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "down" => Some(Self::Down),
            "up" => Some(Self::Up),
            "north" => Some(Self::North),
            "south" => Some(Self::South),
            "east" => Some(Self::East),
            "west" => Some(Self::West),
            "player" => Some(Self::Player),
            _ => None,
        }
    }

    /// The neighbour direction this side refers to. `None` for `Player`.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Down => Some(Direction::Down),
            Self::Up => Some(Direction::Up),
            Self::North => Some(Direction::North),
            Self::South => Some(Direction::South),
            Self::East => Some(Direction::East),
            Self::West => Some(Direction::West),
            Self::Player => None,
        }
    }
}

impl fmt::Display for InventorySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction() {
            Some(direction) => direction.fmt(f),
            None => f.write_str("player"),
        }
    }
}

// ---------------------------------------------------------------------------
// IDs
// ---------------------------------------------------------------------------

/// Caller ID assigned by the remote caller's own runtime (not by this crate).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallerId(pub u32);

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "caller#{}", self.0)
    }
}

/// Host-assigned player ID. The plate stores this instead of a reference to
/// the player so the world keeps sole ownership of player state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A stack of identical items in one inventory slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    #[serde(rename = "id")]
    pub item_id: u32,
    pub count: u32,
    pub damage: u32,
}

impl ItemStack {
    pub const fn new(item_id: u32, count: u32, damage: u32) -> Self {
        Self {
            item_id,
            count,
            damage,
        }
    }

    /// True if `other` can be merged into this stack (same item, same damage).
    pub fn is_stackable_with(&self, other: &ItemStack) -> bool {
        self.item_id == other.item_id && self.damage == other.damage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_ordinals_match_all() {
        for (i, d) in Direction::ALL.iter().enumerate() {
            assert_eq!(d.ordinal(), i);
            assert_eq!(Direction::from_ordinal(i), Some(*d));
        }
        assert_eq!(Direction::from_ordinal(6), None);
    }

    #[test]
    fn offset_and_opposite_cancel() {
        let origin = BlockPos::new(4, 64, -3);
        for d in Direction::ALL {
            assert_eq!(origin.offset(d).and_then(|p| p.offset(d.opposite())), Some(origin));
        }
        assert_eq!(origin.offset(Direction::Down), Some(BlockPos::new(4, 63, -3)));
    }

    #[test]
    fn offset_stops_at_the_coordinate_edge() {
        let edge = BlockPos::new(i32::MAX, i32::MIN, 0);
        assert_eq!(edge.offset(Direction::East), None);
        assert_eq!(edge.offset(Direction::Down), None);
        assert_eq!(edge.offset(Direction::West), Some(BlockPos::new(i32::MAX - 1, i32::MIN, 0)));
        assert_eq!(edge.offset(Direction::Up), Some(BlockPos::new(i32::MAX, i32::MIN + 1, 0)));
    }

    #[test]
    fn inventory_side_parse() {
        assert_eq!(InventorySide::parse("player"), Some(InventorySide::Player));
        assert_eq!(InventorySide::parse("west"), Some(InventorySide::West));
        assert_eq!(InventorySide::parse("West"), None);
        assert_eq!(InventorySide::parse(""), None);
        assert_eq!(InventorySide::Player.direction(), None);
        assert_eq!(InventorySide::Down.direction(), Some(Direction::Down));
    }

    #[test]
    fn item_stack_serializes_with_short_id_key() {
        let stack = ItemStack::new(264, 3, 0);
        let json = serde_json::to_value(stack).unwrap();
        assert_eq!(json, serde_json::json!({"id": 264, "count": 3, "damage": 0}));
    }
}
