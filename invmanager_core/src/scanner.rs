// Neighbour connection scanner.
//
// Recomputes, from scratch, which of the six neighbours of a block are
// computer-like and which are inventory-like, and reports whether either
// answer changed since the previous scan. The result is a pair of 6-bit
// masks: bit *i* is set when the neighbour in `Direction::ALL[i]` satisfies
// the predicate. A single neighbour may set both bits, one, or neither.
//
// `scan` is pure: it reads the world only through `NeighborLookup` and the
// two predicates, and never mutates anything. Whether a scan should happen
// at all (it should not on a replica) is decided by the caller, which simply
// does not call it.
//
// See also: `state.rs` for `EntityStateSync`, which stores the masks and
// turns `changed` into a dirty flag, `manager.rs` for
// `BaseManager::recompute_connections`, the per-entity entry point.

use serde::{Deserialize, Serialize};

use crate::types::{BlockPos, Direction};

/// Read-only neighbour access into the host world.
pub trait NeighborLookup {
    /// Whatever the world stores at a position (a block, a tile entity...).
    type Neighbor: ?Sized;

    /// The occupant of `origin.offset(direction)`, if any. `None` when that
    /// position is past the edge of the world.
    fn neighbor(&self, origin: BlockPos, direction: Direction) -> Option<&Self::Neighbor>;
}

/// The two adjacency masks, packed one bit per `Direction` ordinal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjacencyState {
    pub computer_mask: u8,
    pub inventory_mask: u8,
}

impl AdjacencyState {
    pub fn has_computer(self, direction: Direction) -> bool {
        self.computer_mask & direction.bit() != 0
    }

    pub fn has_inventory(self, direction: Direction) -> bool {
        self.inventory_mask & direction.bit() != 0
    }

    pub fn computer_count(self) -> u32 {
        self.computer_mask.count_ones()
    }

    pub fn inventory_count(self) -> u32 {
        self.inventory_mask.count_ones()
    }
}

/// Result of one scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanOutcome {
    pub state: AdjacencyState,
    /// True iff either mask differs from the previous state.
    pub changed: bool,
}

/// Recompute both masks for the block at `origin`.
pub fn scan<L, C, I>(
    lookup: &L,
    origin: BlockPos,
    previous: AdjacencyState,
    is_computer_like: C,
    is_inventory_like: I,
) -> ScanOutcome
where
    L: NeighborLookup + ?Sized,
    C: Fn(&L::Neighbor) -> bool,
    I: Fn(&L::Neighbor) -> bool,
{
    let mut state = AdjacencyState::default();
    for direction in Direction::ALL {
        let Some(neighbor) = lookup.neighbor(origin, direction) else {
            continue;
        };
        if is_computer_like(neighbor) {
            state.computer_mask |= direction.bit();
        }
        if is_inventory_like(neighbor) {
            state.inventory_mask |= direction.bit();
        }
    }
    ScanOutcome {
        state,
        changed: state != previous,
    }
}
