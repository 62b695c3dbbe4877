// Manager entities: the authoritative `BaseManager`, the thread-safe
// `PeripheralHandle` handed to remote callers, and the `ManagerReplica` that
// mirrors synced state on non-authoritative copies.
//
// A manager sits at one block position. Remote callers (computers running
// on their own threads) talk to it only through a `PeripheralHandle`: they
// attach, detach, and call methods, and every method call becomes a command
// on the manager's `CommandBus`. The host's simulation thread owns the
// `BaseManager` itself and calls, once per tick:
//
//   - `update_entity(world)`: drain the bus. Commands run against a
//     resolver that maps side selectors to the inventories next to the
//     manager (`world.inventory_at(pos + side)`); `"player"` is never
//     accepted here.
//   - `recompute_connections(world)`: rescan neighbours; returns true when
//     the adjacency masks changed and observers need a new `description()`.
//     On a remote (replica-side) world this is skipped and returns false.
//
// Replicas never own a command bus and never execute commands; they only
// apply the records the authoritative side pushes (`on_data_packet`).
//
// `HostWorld` is the whole world surface the core needs. It extends
// `NeighborLookup` (used by the scanner) with capability predicates,
// inventory lookup, and the three block-update hooks.
//
// See also: `plate.rs` for `PlayerManager`, the gated variant, `bus.rs` for
// the command queue, `caller.rs` for the registry shared with handles,
// `state.rs` for the record format.

use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use crate::bus::{CommandBus, CommandSubmitter};
use crate::caller::{CallerRegistry, RemoteCaller};
use crate::config::ManagerConfig;
use crate::dispatch::{self, METHOD_NAMES};
use crate::error::DispatchError;
use crate::inventory::{Inventory, InventoryResolver};
use crate::scanner::{self, AdjacencyState, NeighborLookup};
use crate::state::{EntityStateSync, ManagerRecord};
use crate::types::{BlockPos, CallerId, Direction, InventorySide, PlayerId};

/// Every side accepts attachment.
pub(crate) const ALL_SIDES: u8 = 0x3f;

/// The host world as seen by a manager.
pub trait HostWorld: NeighborLookup {
    fn is_computer_like(&self, neighbor: &Self::Neighbor) -> bool;

    fn is_inventory_like(&self, neighbor: &Self::Neighbor) -> bool;

    /// The inventory at `pos`, if the block there has one.
    fn inventory_at(&mut self, pos: BlockPos) -> Option<Box<dyn Inventory + '_>>;

    /// A player's main inventory (armour slots last).
    fn player_inventory(&mut self, player: PlayerId) -> Option<Box<dyn Inventory + '_>>;

    /// Tell the block at `pos` that a neighbour's state changed.
    fn notify_neighbor_changed(&mut self, pos: BlockPos);

    /// Schedule a state-sync push for the block at `pos`.
    fn mark_block_for_update(&mut self, pos: BlockPos);

    /// Schedule a visual refresh of the block at `pos`.
    fn mark_for_render_update(&mut self, pos: BlockPos);

    /// True on a non-authoritative copy of the world.
    fn is_remote(&self) -> bool;
}

// ---------------------------------------------------------------------------
// PeripheralHandle
// ---------------------------------------------------------------------------

/// What a remote caller holds. Cheap to clone, safe to use from any thread.
#[derive(Clone)]
pub struct PeripheralHandle {
    submitter: CommandSubmitter,
    registry: Arc<CallerRegistry>,
    config: Arc<ManagerConfig>,
    attach_mask: u8,
}

impl PeripheralHandle {
    pub fn peripheral_type(&self) -> &str {
        &self.config.peripheral_type
    }

    pub fn method_names(&self) -> &'static [&'static str] {
        &METHOD_NAMES
    }

    /// Queue a method call. Only an unknown selector fails here; everything
    /// else is reported later through the caller's task event.
    pub fn call_method(
        &self,
        caller: Arc<dyn RemoteCaller>,
        selector: usize,
        args: Vec<Value>,
    ) -> Result<(), DispatchError> {
        dispatch::call_method(&self.submitter, caller, selector, args)
    }

    pub fn can_attach_to_side(&self, side: Direction) -> bool {
        self.attach_mask & side.bit() != 0
    }

    /// Attach `caller` from `side`, mounting the helper scripts into it.
    pub fn attach(
        &self,
        caller: Arc<dyn RemoteCaller>,
        side: Direction,
    ) -> Result<(), DispatchError> {
        if !self.can_attach_to_side(side) {
            debug!("{} refused: cannot attach from {side}", caller.id());
            return Err(DispatchError::SideRejected { side });
        }
        self.registry.attach(caller);
        Ok(())
    }

    pub fn detach(&self, id: CallerId) {
        self.registry.detach(id);
    }
}

// ---------------------------------------------------------------------------
// BaseManager
// ---------------------------------------------------------------------------

/// The authoritative manager entity. Lives on the simulation thread.
pub struct BaseManager {
    pos: BlockPos,
    bus: CommandBus,
    registry: Arc<CallerRegistry>,
    sync: EntityStateSync,
    config: Arc<ManagerConfig>,
    attach_mask: u8,
}

impl BaseManager {
    pub fn new(pos: BlockPos, config: ManagerConfig) -> Self {
        Self::with_attach_mask(pos, config, ALL_SIDES)
    }

    pub(crate) fn with_attach_mask(pos: BlockPos, config: ManagerConfig, attach_mask: u8) -> Self {
        let registry = Arc::new(CallerRegistry::new(config.mount.clone()));
        Self {
            pos,
            bus: CommandBus::with_task_event(config.task_event.clone()),
            registry,
            sync: EntityStateSync::default(),
            config: Arc::new(config),
            attach_mask,
        }
    }

    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CallerRegistry> {
        &self.registry
    }

    pub fn adjacency(&self) -> AdjacencyState {
        self.sync.adjacency()
    }

    /// Commands waiting for the next `update_entity`.
    pub fn pending_commands(&self) -> usize {
        self.bus.pending()
    }

    pub fn handle(&self) -> PeripheralHandle {
        PeripheralHandle {
            submitter: self.bus.submitter(),
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
            attach_mask: self.attach_mask,
        }
    }

    /// Per-tick entry point: run every queued command against the
    /// inventories next to this manager. Returns how many ran.
    pub fn update_entity<W: HostWorld + ?Sized>(&mut self, world: &mut W) -> usize {
        let mut site = NeighborSite {
            origin: self.pos,
            world,
        };
        self.drain_with(&mut site)
    }

    pub(crate) fn drain_with(&self, resolver: &mut dyn InventoryResolver) -> usize {
        self.bus.drain(resolver, &self.registry)
    }

    /// Rescan neighbours. Returns true when either adjacency mask changed.
    /// Always false (and no scan) on a remote world.
    pub fn recompute_connections<W: HostWorld + ?Sized>(&mut self, world: &W) -> bool {
        if world.is_remote() {
            return false;
        }
        let outcome = scanner::scan(
            world,
            self.pos,
            self.sync.adjacency(),
            |n| world.is_computer_like(n),
            |n| world.is_inventory_like(n),
        );
        if outcome.changed {
            debug!(
                "manager at {} connections now computers={:06b} chests={:06b}",
                self.pos, outcome.state.computer_mask, outcome.state.inventory_mask
            );
        }
        self.sync.apply_scan(outcome)
    }

    /// Clear and return the "description changed" flag.
    pub fn take_dirty(&mut self) -> bool {
        self.sync.take_dirty()
    }

    /// Broadcast an event to every attached caller.
    pub fn queue_event(&self, event: &str, args: &[Value]) -> usize {
        self.registry.broadcast(event, args)
    }

    /// Send an event to one caller only.
    pub fn queue_event_to(&self, event: &str, args: &[Value], target: &dyn RemoteCaller) {
        self.registry.unicast(event, args, target);
    }

    pub fn write_record(&self, record: &mut ManagerRecord) {
        self.sync.write_record(record);
    }

    pub fn read_record(&mut self, record: &ManagerRecord) {
        self.sync.read_record(record);
    }

    /// The snapshot pushed to observers.
    pub fn description(&self) -> ManagerRecord {
        let mut record = ManagerRecord::default();
        self.write_record(&mut record);
        record
    }
}

/// Base resolution policy: the six neighbours, never the player.
struct NeighborSite<'w, W: ?Sized> {
    origin: BlockPos,
    world: &'w mut W,
}

impl<W: HostWorld + ?Sized> InventoryResolver for NeighborSite<'_, W> {
    fn resolve_inventory(&mut self, side: InventorySide) -> Option<Box<dyn Inventory + '_>> {
        let direction = side.direction()?;
        self.world.inventory_at(self.origin.offset(direction)?)
    }
}

// ---------------------------------------------------------------------------
// ManagerReplica
// ---------------------------------------------------------------------------

/// A non-authoritative copy of a manager. Applies synced records; never
/// executes commands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagerReplica {
    pos: BlockPos,
    sync: EntityStateSync,
    record: ManagerRecord,
}

impl ManagerReplica {
    pub fn new(pos: BlockPos) -> Self {
        Self {
            pos,
            ..Self::default()
        }
    }

    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    pub fn adjacency(&self) -> AdjacencyState {
        self.sync.adjacency()
    }

    /// Latest synced values, merged field by field.
    pub fn record(&self) -> &ManagerRecord {
        &self.record
    }

    /// Apply a pushed description and request a render refresh.
    pub fn on_data_packet<W: HostWorld + ?Sized>(&mut self, world: &mut W, record: &ManagerRecord) {
        self.sync.read_record(record);
        merge_record(&mut self.record, record);
        info!("replica at {} synced", self.pos);
        world.mark_for_render_update(self.pos);
    }
}

fn merge_record(into: &mut ManagerRecord, from: &ManagerRecord) {
    if from.computer_connections.is_some() {
        into.computer_connections = from.computer_connections;
    }
    if from.chest_connections.is_some() {
        into.chest_connections = from.chest_connections;
    }
    if from.plate_type.is_some() {
        into.plate_type = from.plate_type;
    }
    if from.connections.is_some() {
        into.connections = from.connections;
    }
}
