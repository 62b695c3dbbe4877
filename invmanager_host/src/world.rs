// In-memory host world.
//
// A sparse block map plus a player table: just enough world for managers to
// scan neighbours, resolve inventories, and fire their block-update hooks.
// Chests and player inventories are `SlotInventory` values owned here; the
// managers only ever borrow them for the length of one command.
//
// The three hooks (`notify_neighbor_changed`, `mark_block_for_update`,
// `mark_for_render_update`) are recorded into ordered sets that the host
// loop takes once per tick. A `remote` world stands in for a client's view:
// managers skip scanning on it and replicas request render refreshes on it.
//
// Maps are `BTreeMap`/`BTreeSet` so snapshots and hook order are stable.
//
// See also: `server.rs` for the tick loop that owns two of these (the
// authoritative world and the client view), `invmanager_core::manager` for
// the `HostWorld` trait.

use std::collections::{BTreeMap, BTreeSet};

use invmanager_core::inventory::{Inventory, SlotInventory};
use invmanager_core::manager::HostWorld;
use invmanager_core::scanner::NeighborLookup;
use invmanager_core::types::{BlockPos, Direction, PlayerId};

/// Main inventory plus armour, the layout `ManagerConfig::armor_slots` expects.
pub const PLAYER_INVENTORY_SLOTS: usize = 40;

/// Default chest size.
pub const CHEST_SLOTS: usize = 27;

/// What occupies a position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    /// A scripting computer. Computer-like, no inventory.
    Computer,
    /// A turtle: a computer that also carries an inventory.
    Turtle(SlotInventory),
    Chest(SlotInventory),
    /// An inventory manager or plate. Neither computer- nor inventory-like.
    Manager,
    Solid,
}

impl Block {
    pub fn chest() -> Self {
        Block::Chest(SlotInventory::new("chest", CHEST_SLOTS))
    }

    pub fn inventory(&self) -> Option<&SlotInventory> {
        match self {
            Block::Chest(inv) | Block::Turtle(inv) => Some(inv),
            _ => None,
        }
    }

    fn inventory_mut(&mut self) -> Option<&mut SlotInventory> {
        match self {
            Block::Chest(inv) | Block::Turtle(inv) => Some(inv),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryWorld {
    blocks: BTreeMap<BlockPos, Block>,
    players: BTreeMap<PlayerId, SlotInventory>,
    remote: bool,
    neighbor_changes: BTreeSet<BlockPos>,
    block_updates: BTreeSet<BlockPos>,
    render_updates: BTreeSet<BlockPos>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty client-side view.
    pub fn remote() -> Self {
        Self {
            remote: true,
            ..Self::default()
        }
    }

    pub fn place(&mut self, pos: BlockPos, block: Block) -> Option<Block> {
        self.blocks.insert(pos, block)
    }

    pub fn remove(&mut self, pos: BlockPos) -> Option<Block> {
        self.blocks.remove(&pos)
    }

    pub fn block(&self, pos: BlockPos) -> Option<&Block> {
        self.blocks.get(&pos)
    }

    pub fn blocks(&self) -> &BTreeMap<BlockPos, Block> {
        &self.blocks
    }

    pub fn add_player(&mut self, player: PlayerId, inventory: SlotInventory) {
        self.players.insert(player, inventory);
    }

    pub fn player(&self, player: PlayerId) -> Option<&SlotInventory> {
        self.players.get(&player)
    }

    pub fn players(&self) -> &BTreeMap<PlayerId, SlotInventory> {
        &self.players
    }

    /// Positions whose neighbours changed since the last call.
    pub fn take_neighbor_changes(&mut self) -> BTreeSet<BlockPos> {
        std::mem::take(&mut self.neighbor_changes)
    }

    /// Positions flagged for a state-sync push since the last call.
    pub fn take_block_updates(&mut self) -> BTreeSet<BlockPos> {
        std::mem::take(&mut self.block_updates)
    }

    /// Positions flagged for a render refresh since the last call.
    pub fn take_render_updates(&mut self) -> BTreeSet<BlockPos> {
        std::mem::take(&mut self.render_updates)
    }
}

impl NeighborLookup for MemoryWorld {
    type Neighbor = Block;

    fn neighbor(&self, origin: BlockPos, direction: Direction) -> Option<&Block> {
        self.blocks.get(&origin.offset(direction)?)
    }
}

impl HostWorld for MemoryWorld {
    fn is_computer_like(&self, neighbor: &Block) -> bool {
        matches!(neighbor, Block::Computer | Block::Turtle(_))
    }

    fn is_inventory_like(&self, neighbor: &Block) -> bool {
        neighbor.inventory().is_some()
    }

    fn inventory_at(&mut self, pos: BlockPos) -> Option<Box<dyn Inventory + '_>> {
        let inventory = self.blocks.get_mut(&pos)?.inventory_mut()?;
        Some(Box::new(inventory) as Box<dyn Inventory + '_>)
    }

    fn player_inventory(&mut self, player: PlayerId) -> Option<Box<dyn Inventory + '_>> {
        let inventory = self.players.get_mut(&player)?;
        Some(Box::new(inventory) as Box<dyn Inventory + '_>)
    }

    fn notify_neighbor_changed(&mut self, pos: BlockPos) {
        self.neighbor_changes.insert(pos);
    }

    fn mark_block_for_update(&mut self, pos: BlockPos) {
        self.block_updates.insert(pos);
    }

    fn mark_for_render_update(&mut self, pos: BlockPos) {
        self.render_updates.insert(pos);
    }

    fn is_remote(&self) -> bool {
        self.remote
    }
}

#[cfg(test)]
mod tests {
    use invmanager_core::types::ItemStack;

    use super::*;

    const ORIGIN: BlockPos = BlockPos::new(0, 64, 0);

    #[test]
    fn predicates_classify_blocks() {
        let world = MemoryWorld::new();
        assert!(world.is_computer_like(&Block::Computer));
        assert!(!world.is_inventory_like(&Block::Computer));
        let turtle = Block::Turtle(SlotInventory::new("turtle", 16));
        assert!(world.is_computer_like(&turtle));
        assert!(world.is_inventory_like(&turtle));
        assert!(world.is_inventory_like(&Block::chest()));
        assert!(!world.is_computer_like(&Block::Manager));
        assert!(!world.is_inventory_like(&Block::Solid));
    }

    #[test]
    fn inventory_at_borrows_the_stored_chest() {
        let mut world = MemoryWorld::new();
        let pos = ORIGIN.offset(Direction::North).unwrap();
        world.place(pos, Block::chest());
        if let Some(mut inv) = world.inventory_at(pos) {
            inv.set_slot_contents(3, Some(ItemStack::new(1, 7, 0)));
        }
        assert_eq!(
            world.block(pos).and_then(Block::inventory).map(|inv| inv.stack_in_slot(3)),
            Some(Some(ItemStack::new(1, 7, 0)))
        );
        assert!(world.inventory_at(ORIGIN).is_none());
        assert!(world.player_inventory(PlayerId(9)).is_none());
    }

    #[test]
    fn hooks_accumulate_until_taken() {
        let mut world = MemoryWorld::new();
        world.mark_block_for_update(ORIGIN);
        world.mark_block_for_update(ORIGIN);
        world.notify_neighbor_changed(ORIGIN.offset(Direction::Up).unwrap());
        assert_eq!(world.take_block_updates().into_iter().collect::<Vec<_>>(), vec![ORIGIN]);
        assert!(world.take_block_updates().is_empty());
        assert_eq!(world.take_neighbor_changes().len(), 1);
        assert!(MemoryWorld::remote().is_remote());
    }
}
