// Inventory collaborator interface.
//
// Concrete inventory storage belongs to the host world; this crate only sees
// it through the `Inventory` trait, which mirrors the slot-level surface a
// chest or a player inventory offers. Commands reach inventories through an
// `InventoryResolver`, which maps a script's side selector ("down", "player",
// ...) to whatever inventory the executing entity is allowed to use.
//
// `SlotInventory` is a plain `Vec<Option<ItemStack>>` implementation. Hosts
// without their own storage (and every test) use it directly.
//
// See also: `ops.rs` for the size/read/move operations written against these
// traits, `manager.rs` and `plate.rs` for the two resolution policies.

use crate::types::{InventorySide, ItemStack};

/// Default per-slot stack limit.
pub const DEFAULT_STACK_LIMIT: u32 = 64;

/// Slot-level access to one inventory.
pub trait Inventory {
    fn size(&self) -> usize;

    fn stack_in_slot(&self, slot: usize) -> Option<ItemStack>;

    /// Remove up to `amount` items from `slot`, returning what was removed.
    fn decr_stack_size(&mut self, slot: usize, amount: u32) -> Option<ItemStack>;

    /// Take the whole stack out of `slot` (used when a container closes).
    fn stack_on_closing(&mut self, slot: usize) -> Option<ItemStack>;

    fn set_slot_contents(&mut self, slot: usize, stack: Option<ItemStack>);

    fn name(&self) -> Option<String>;

    fn stack_limit(&self) -> u32;
}

impl<I: Inventory + ?Sized> Inventory for &mut I {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn stack_in_slot(&self, slot: usize) -> Option<ItemStack> {
        (**self).stack_in_slot(slot)
    }

    fn decr_stack_size(&mut self, slot: usize, amount: u32) -> Option<ItemStack> {
        (**self).decr_stack_size(slot, amount)
    }

    fn stack_on_closing(&mut self, slot: usize) -> Option<ItemStack> {
        (**self).stack_on_closing(slot)
    }

    fn set_slot_contents(&mut self, slot: usize, stack: Option<ItemStack>) {
        (**self).set_slot_contents(slot, stack)
    }

    fn name(&self) -> Option<String> {
        (**self).name()
    }

    fn stack_limit(&self) -> u32 {
        (**self).stack_limit()
    }
}

/// Maps a side selector to the inventory an executing command may touch.
pub trait InventoryResolver {
    fn resolve_inventory(&mut self, side: InventorySide) -> Option<Box<dyn Inventory + '_>>;
}

/// A fixed-size inventory backed by a vector of slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotInventory {
    name: String,
    slots: Vec<Option<ItemStack>>,
    stack_limit: u32,
}

impl SlotInventory {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            slots: vec![None; size],
            stack_limit: DEFAULT_STACK_LIMIT,
        }
    }

    pub fn with_stack_limit(mut self, stack_limit: u32) -> Self {
        self.stack_limit = stack_limit;
        self
    }

    /// Builder-style slot fill, for setting up hosts and tests.
    pub fn with_stack(mut self, slot: usize, stack: ItemStack) -> Self {
        self.set_slot_contents(slot, Some(stack));
        self
    }
}

impl Inventory for SlotInventory {
    fn size(&self) -> usize {
        self.slots.len()
    }

    fn stack_in_slot(&self, slot: usize) -> Option<ItemStack> {
        self.slots.get(slot).copied().flatten()
    }

    fn decr_stack_size(&mut self, slot: usize, amount: u32) -> Option<ItemStack> {
        let entry = self.slots.get_mut(slot)?;
        let stack = entry.as_mut()?;
        let taken = amount.min(stack.count);
        if taken == 0 {
            return None;
        }
        let removed = ItemStack { count: taken, ..*stack };
        stack.count -= taken;
        if stack.count == 0 {
            *entry = None;
        }
        Some(removed)
    }

    fn stack_on_closing(&mut self, slot: usize) -> Option<ItemStack> {
        self.slots.get_mut(slot)?.take()
    }

    fn set_slot_contents(&mut self, slot: usize, stack: Option<ItemStack>) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = stack.filter(|s| s.count > 0);
        }
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn stack_limit(&self) -> u32 {
        self.stack_limit
    }
}
