// Inventory operations behind the remote methods.
//
// Each function here is the body of one queued command: it decodes the
// script's arguments, resolves the inventories it names through the
// executing entity's `InventoryResolver`, and returns a scripting value.
// They only ever run on the simulation thread (inside `CommandBus::drain`),
// so they touch inventories without any locking.
//
// Argument conventions (scripts pass loosely-typed values):
// - sides are the lowercase strings parsed by `InventorySide::parse`;
// - slots are 0-based non-negative integers (integral floats accepted, since
//   script numbers usually arrive as doubles);
// - `move`'s trailing amount is optional and defaults to the whole stack.
//
// Every failure is a `CommandError`, which the bus turns into a failure
// envelope carrying the error text.
//
// See also: `dispatch.rs` for the method table that wraps these in actions,
// `inventory.rs` for the traits they are written against.

use serde_json::{Value, json};

use crate::error::CommandError;
use crate::inventory::{Inventory, InventoryResolver};
use crate::types::{InventorySide, ItemStack};

/// `size(side)` → number of slots in the inventory on `side`.
pub fn size(ctx: &mut dyn InventoryResolver, args: &[Value]) -> Result<Value, CommandError> {
    let side = side_arg(args, 0, "side")?;
    let inventory = resolve(ctx, side)?;
    Ok(json!(inventory.size()))
}

/// `read(side, slot)` → `{id, count, damage}` for the stack in `slot`, or
/// `null` when the slot is empty.
pub fn read(ctx: &mut dyn InventoryResolver, args: &[Value]) -> Result<Value, CommandError> {
    let side = side_arg(args, 0, "side")?;
    let slot = slot_arg(args, 1, "slot")?;
    let inventory = resolve(ctx, side)?;
    check_slot(&*inventory, slot)?;
    Ok(match inventory.stack_in_slot(slot) {
        Some(stack) => json!(stack),
        None => Value::Null,
    })
}

/// `move(from, from_slot, to, to_slot[, amount])` → number of items moved.
///
/// The target slot must be empty or hold a stackable item; the amount is
/// clamped to what the source holds and what the target can still take.
pub fn move_items(
    ctx: &mut dyn InventoryResolver,
    args: &[Value],
) -> Result<Value, CommandError> {
    let from = side_arg(args, 0, "from")?;
    let from_slot = slot_arg(args, 1, "from slot")?;
    let to = side_arg(args, 2, "to")?;
    let to_slot = slot_arg(args, 3, "to slot")?;
    let requested = match args.get(4) {
        None | Some(Value::Null) => None,
        Some(_) => Some(count_arg(args, 4, "amount")?),
    };

    if from == to && from_slot == to_slot {
        return Ok(json!(0));
    }

    let source = {
        let inventory = resolve(ctx, from)?;
        check_slot(&*inventory, from_slot)?;
        inventory
            .stack_in_slot(from_slot)
            .ok_or(CommandError::EmptySlot { slot: from_slot })?
    };

    let (limit, existing) = {
        let inventory = resolve(ctx, to)?;
        check_slot(&*inventory, to_slot)?;
        (inventory.stack_limit(), inventory.stack_in_slot(to_slot))
    };
    if existing.is_some_and(|e| !e.is_stackable_with(&source)) {
        return Err(CommandError::TargetOccupied { slot: to_slot });
    }

    let room = limit.saturating_sub(existing.map_or(0, |s| s.count));
    let amount = requested
        .unwrap_or(source.count)
        .min(source.count)
        .min(room);
    if amount == 0 {
        return Ok(json!(0));
    }

    let Some(taken) = resolve(ctx, from)?.decr_stack_size(from_slot, amount) else {
        return Ok(json!(0));
    };
    let merged = match existing {
        Some(existing) => ItemStack {
            count: existing.count + taken.count,
            ..taken
        },
        None => taken,
    };
    resolve(ctx, to)?.set_slot_contents(to_slot, Some(merged));
    Ok(json!(taken.count))
}

fn resolve(
    ctx: &mut dyn InventoryResolver,
    side: InventorySide,
) -> Result<Box<dyn Inventory + '_>, CommandError> {
    ctx.resolve_inventory(side)
        .ok_or(CommandError::NoInventory(side))
}

fn check_slot(inventory: &dyn Inventory, slot: usize) -> Result<(), CommandError> {
    let size = inventory.size();
    if slot >= size {
        return Err(CommandError::SlotOutOfRange { slot, size });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Argument decoding
// ---------------------------------------------------------------------------

fn arg<'a>(args: &'a [Value], index: usize, name: &'static str) -> Result<&'a Value, CommandError> {
    args.get(index)
        .ok_or(CommandError::MissingArgument { index, name })
}

fn side_arg(
    args: &[Value],
    index: usize,
    name: &'static str,
) -> Result<InventorySide, CommandError> {
    let value = arg(args, index, name)?;
    let text = value.as_str().ok_or(CommandError::InvalidArgument {
        index,
        expected: "string",
    })?;
    InventorySide::parse(text).ok_or_else(|| CommandError::UnknownSide(text.to_string()))
}

fn slot_arg(args: &[Value], index: usize, name: &'static str) -> Result<usize, CommandError> {
    let n = non_negative_integer(arg(args, index, name)?).ok_or(CommandError::InvalidArgument {
        index,
        expected: "non-negative integer",
    })?;
    usize::try_from(n).map_err(|_| CommandError::InvalidArgument {
        index,
        expected: "non-negative integer",
    })
}

fn count_arg(args: &[Value], index: usize, name: &'static str) -> Result<u32, CommandError> {
    let n = non_negative_integer(arg(args, index, name)?).ok_or(CommandError::InvalidArgument {
        index,
        expected: "non-negative integer",
    })?;
    Ok(u32::try_from(n).unwrap_or(u32::MAX))
}

fn non_negative_integer(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = f as u64;
        Some(n)
    } else {
        None
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MapResolver;
    use super::*;
    use crate::inventory::SlotInventory;

    fn resolver() -> MapResolver {
        MapResolver::default()
            .with(
                "north",
                SlotInventory::new("chest", 27)
                    .with_stack(0, ItemStack::new(1, 40, 0))
                    .with_stack(1, ItemStack::new(2, 5, 0)),
            )
            .with(
                "south",
                SlotInventory::new("chest", 9).with_stack(0, ItemStack::new(1, 60, 0)),
            )
    }

    #[test]
    fn size_reports_slot_count() {
        let mut r = resolver();
        assert_eq!(size(&mut r, &[json!("north")]).unwrap(), json!(27));
        assert_eq!(
            size(&mut r, &[json!("east")]).unwrap_err(),
            CommandError::NoInventory(InventorySide::East)
        );
        assert_eq!(
            size(&mut r, &[]).unwrap_err(),
            CommandError::MissingArgument { index: 0, name: "side" }
        );
        assert_eq!(
            size(&mut r, &[json!("sideways")]).unwrap_err(),
            CommandError::UnknownSide("sideways".into())
        );
    }

    #[test]
    fn read_returns_stack_or_null() {
        let mut r = resolver();
        assert_eq!(
            read(&mut r, &[json!("north"), json!(1)]).unwrap(),
            json!({"id": 2, "count": 5, "damage": 0})
        );
        assert_eq!(read(&mut r, &[json!("north"), json!(2.0)]).unwrap(), Value::Null);
        assert_eq!(
            read(&mut r, &[json!("north"), json!(27)]).unwrap_err(),
            CommandError::SlotOutOfRange { slot: 27, size: 27 }
        );
        assert!(matches!(
            read(&mut r, &[json!("north"), json!(-1)]).unwrap_err(),
            CommandError::InvalidArgument { index: 1, .. }
        ));
        assert!(matches!(
            read(&mut r, &[json!("north"), json!(1.5)]).unwrap_err(),
            CommandError::InvalidArgument { index: 1, .. }
        ));
    }

    #[test]
    fn move_into_empty_slot() {
        let mut r = resolver();
        let moved = move_items(
            &mut r,
            &[json!("north"), json!(1), json!("south"), json!(3)],
        )
        .unwrap();
        assert_eq!(moved, json!(5));
        assert_eq!(r.inventories["north"].stack_in_slot(1), None);
        assert_eq!(
            r.inventories["south"].stack_in_slot(3),
            Some(ItemStack::new(2, 5, 0))
        );
    }

    #[test]
    fn move_merges_up_to_stack_limit() {
        let mut r = resolver();
        let moved = move_items(
            &mut r,
            &[json!("north"), json!(0), json!("south"), json!(0)],
        )
        .unwrap();
        assert_eq!(moved, json!(4));
        assert_eq!(
            r.inventories["north"].stack_in_slot(0),
            Some(ItemStack::new(1, 36, 0))
        );
        assert_eq!(
            r.inventories["south"].stack_in_slot(0),
            Some(ItemStack::new(1, 64, 0))
        );
    }

    #[test]
    fn move_with_explicit_amount_within_one_inventory() {
        let mut r = resolver();
        let moved = move_items(
            &mut r,
            &[json!("north"), json!(0), json!("north"), json!(5), json!(10)],
        )
        .unwrap();
        assert_eq!(moved, json!(10));
        let north = &r.inventories["north"];
        assert_eq!(north.stack_in_slot(0), Some(ItemStack::new(1, 30, 0)));
        assert_eq!(north.stack_in_slot(5), Some(ItemStack::new(1, 10, 0)));
    }

    #[test]
    fn move_rejects_incompatible_target_and_empty_source() {
        let mut r = resolver();
        assert_eq!(
            move_items(&mut r, &[json!("north"), json!(1), json!("south"), json!(0)])
                .unwrap_err(),
            CommandError::TargetOccupied { slot: 0 }
        );
        assert_eq!(
            move_items(&mut r, &[json!("north"), json!(9), json!("south"), json!(1)])
                .unwrap_err(),
            CommandError::EmptySlot { slot: 9 }
        );
        // Nothing changed.
        assert_eq!(
            r.inventories["north"].stack_in_slot(1),
            Some(ItemStack::new(2, 5, 0))
        );
    }

    #[test]
    fn move_onto_itself_is_a_no_op() {
        let mut r = resolver();
        let moved = move_items(
            &mut r,
            &[json!("north"), json!(0), json!("north"), json!(0)],
        )
        .unwrap();
        assert_eq!(moved, json!(0));
        assert_eq!(
            r.inventories["north"].stack_in_slot(0),
            Some(ItemStack::new(1, 40, 0))
        );
    }
}
