// invmanager_core — inventory manager peripheral core.
//
// This crate contains the engine-independent half of the inventory manager:
// a block that remote scripting computers attach to and drive through three
// methods (`size`, `read`, `move`) to inspect and shuffle items between the
// inventories around it. The "player plate" variant exposes the inventory of
// a player standing on it instead, optionally gated on a computer being
// connected.
//
// Module overview:
// - `types.rs`:     BlockPos, Direction (ordinal = mask bit), InventorySide, IDs, ItemStack.
// - `error.rs`:     DispatchError / CommandError / RecordError (thiserror).
// - `config.rs`:    ManagerConfig + MountConfig: event names, peripheral type, armour slots.
// - `envelope.rs`:  CommandResult, the success/failure envelope callers receive.
// - `caller.rs`:    RemoteCaller trait + CallerRegistry (concurrent attach/detach/broadcast).
// - `bus.rs`:       CommandBus, a cross-thread command queue drained on the simulation thread.
// - `inventory.rs`: Inventory / InventoryResolver traits + SlotInventory.
// - `ops.rs`:       size/read/move bodies and argument decoding.
// - `dispatch.rs`:  Method table: selector → action, unknown selectors rejected up front.
// - `scanner.rs`:   NeighborLookup + pure adjacency scan producing the two 6-bit masks.
// - `state.rs`:     ManagerRecord (save/sync snapshot) + EntityStateSync (masks + dirty flag).
// - `manager.rs`:   HostWorld trait, PeripheralHandle, BaseManager, ManagerReplica.
// - `plate.rs`:     PlayerManager, the gated plate facade.
//
// **Threading model.** Remote callers run on their own threads and only ever
// touch `PeripheralHandle` (which forwards to the bus and the registry).
// Everything else runs on one simulation thread owned by the host: commands
// execute there, inside `update_entity`, and never concurrently with each
// other or with a scan. Callers never block and never get a return value;
// every accepted call is answered by exactly one task event.
//
// The companion crate `invmanager_host` provides an in-memory world, a
// channel-backed caller, and the tick loop that drives managers.

pub mod bus;
pub mod caller;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod inventory;
pub mod manager;
pub mod ops;
pub mod plate;
pub mod scanner;
pub mod state;
pub mod types;
