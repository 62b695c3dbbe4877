// Player plate: a manager that exposes the inventory of whoever stands on it.
//
// `PlayerManager` wraps a `BaseManager` (same bus, registry, scanner and
// records) and adds the plate's own state: its variant, a connection count,
// and the player currently on it (by `PlayerId`; the world owns players).
//
// Gating. Every inventory-facing operation first asks `check_mode()`:
//   - `Basic` plates always pass;
//   - `Gated` plates pass only while `connections > 0`.
// A failed gate is routine, not an error: sizes read 0, slots read empty,
// mutations do nothing, and `set_player` reports `false`. Inside a command,
// a failed gate means no side resolves at all, so scripts see the usual
// "no inventory found" failure.
//
// Resolution. While the gate passes, commands on a plate may address only
// `"player"` (the `PlateInventory` facade over the standing player's
// inventory, minus the trailing armour slots) and `"down"` (the block under
// the plate). Plates refuse attachment from above.
//
// `connections` belongs to the host. Only `set_connections` and
// `read_record` change it; a rescan updates the adjacency masks and leaves
// the count alone.
//
// See also: `manager.rs` for `BaseManager`, `HostWorld` and the replica,
// `state.rs` for `PlateVariant` and the persisted `type`/`connections` keys.

use log::{debug, info};
use serde_json::json;

use crate::config::ManagerConfig;
use crate::inventory::{Inventory, InventoryResolver};
use crate::manager::{ALL_SIDES, BaseManager, HostWorld, PeripheralHandle};
use crate::scanner::AdjacencyState;
use crate::state::{ManagerRecord, PlateVariant};
use crate::types::{BlockPos, Direction, InventorySide, ItemStack, PlayerId};

/// The plate-specific half of a `PlayerManager`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlateState {
    pub variant: PlateVariant,
    pub connections: i32,
    pub player: Option<PlayerId>,
}

impl PlateState {
    /// The gating predicate.
    pub fn check_mode(&self) -> bool {
        match self.variant {
            PlateVariant::Basic => true,
            PlateVariant::Gated => self.connections > 0,
        }
    }
}

/// Gated view of the standing player's inventory. Empty when the gate
/// failed or nobody is on the plate; never exposes the armour slots.
pub struct PlateInventory<'a> {
    inner: Option<Box<dyn Inventory + 'a>>,
    armor_slots: usize,
}

impl PlateInventory<'_> {
    fn exposes(&self, slot: usize) -> bool {
        slot < self.size()
    }
}

impl Inventory for PlateInventory<'_> {
    fn size(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inv| inv.size().saturating_sub(self.armor_slots))
    }

    fn stack_in_slot(&self, slot: usize) -> Option<ItemStack> {
        if !self.exposes(slot) {
            return None;
        }
        self.inner.as_ref()?.stack_in_slot(slot)
    }

    fn decr_stack_size(&mut self, slot: usize, amount: u32) -> Option<ItemStack> {
        if !self.exposes(slot) {
            return None;
        }
        self.inner.as_mut()?.decr_stack_size(slot, amount)
    }

    fn stack_on_closing(&mut self, slot: usize) -> Option<ItemStack> {
        if !self.exposes(slot) {
            return None;
        }
        self.inner.as_mut()?.stack_on_closing(slot)
    }

    fn set_slot_contents(&mut self, slot: usize, stack: Option<ItemStack>) {
        if !self.exposes(slot) {
            return;
        }
        if let Some(inv) = self.inner.as_mut() {
            inv.set_slot_contents(slot, stack);
        }
    }

    fn name(&self) -> Option<String> {
        self.inner.as_ref()?.name()
    }

    fn stack_limit(&self) -> u32 {
        self.inner.as_ref().map_or(0, |inv| inv.stack_limit())
    }
}

fn open_inventory<'w, W: HostWorld + ?Sized>(
    plate: &PlateState,
    armor_slots: usize,
    world: &'w mut W,
) -> PlateInventory<'w> {
    let inner = match plate.player {
        Some(player) if plate.check_mode() => world.player_inventory(player),
        _ => None,
    };
    PlateInventory { inner, armor_slots }
}

/// A manager that sits under a player.
pub struct PlayerManager {
    base: BaseManager,
    plate: PlateState,
}

impl PlayerManager {
    pub fn new(pos: BlockPos, variant: PlateVariant, config: ManagerConfig) -> Self {
        Self {
            base: BaseManager::with_attach_mask(pos, config, ALL_SIDES & !Direction::Up.bit()),
            plate: PlateState {
                variant,
                ..PlateState::default()
            },
        }
    }

    pub fn base(&self) -> &BaseManager {
        &self.base
    }

    pub fn pos(&self) -> BlockPos {
        self.base.pos()
    }

    pub fn handle(&self) -> PeripheralHandle {
        self.base.handle()
    }

    pub fn plate_state(&self) -> PlateState {
        self.plate
    }

    pub fn variant(&self) -> PlateVariant {
        self.plate.variant
    }

    pub fn connections(&self) -> i32 {
        self.plate.connections
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.plate.player
    }

    pub fn adjacency(&self) -> AdjacencyState {
        self.base.adjacency()
    }

    pub fn check_mode(&self) -> bool {
        self.plate.check_mode()
    }

    pub fn is_player_on(&self) -> bool {
        self.plate.player.is_some()
    }

    /// Put `player` on the plate (or clear it with `None`). Refused, with
    /// `false`, while the gate fails. On success the six neighbours are
    /// notified and every attached caller gets the player event.
    pub fn set_player<W: HostWorld + ?Sized>(
        &mut self,
        world: &mut W,
        player: Option<PlayerId>,
    ) -> bool {
        if !self.check_mode() {
            debug!("plate at {} is gated, ignoring player change", self.pos());
            return false;
        }
        self.plate.player = player;
        let pos = self.pos();
        for neighbor in Direction::ALL.into_iter().filter_map(|d| pos.offset(d)) {
            world.notify_neighbor_changed(neighbor);
        }
        match player {
            Some(id) => info!("player {} stepped on plate at {pos}", id.0),
            None => info!("plate at {pos} cleared"),
        }
        let event = &self.base.config().player_event;
        self.base.queue_event(event, &[json!(player.is_some())]);
        true
    }

    /// Store a new connection count. On the authoritative side this also
    /// schedules a state-sync push.
    pub fn set_connections<W: HostWorld + ?Sized>(&mut self, world: &mut W, connections: i32) {
        self.plate.connections = connections;
        if !world.is_remote() {
            world.mark_block_for_update(self.pos());
        }
    }

    /// The gated inventory facade, for hosts that treat the plate itself as
    /// an inventory block.
    pub fn inventory<'w, W: HostWorld + ?Sized>(&self, world: &'w mut W) -> PlateInventory<'w> {
        open_inventory(&self.plate, self.base.config().armor_slots, world)
    }

    /// Per-tick entry point: drain queued commands under plate resolution.
    pub fn update_entity<W: HostWorld + ?Sized>(&mut self, world: &mut W) -> usize {
        let mut site = PlateSite {
            origin: self.base.pos(),
            plate: &self.plate,
            armor_slots: self.base.config().armor_slots,
            world,
        };
        self.base.drain_with(&mut site)
    }

    /// Rescan neighbours. Returns true when either adjacency mask changed.
    pub fn recompute_connections<W: HostWorld + ?Sized>(&mut self, world: &W) -> bool {
        self.base.recompute_connections(world)
    }

    pub fn take_dirty(&mut self) -> bool {
        self.base.take_dirty()
    }

    pub fn write_record(&self, record: &mut ManagerRecord) {
        record.plate_type = Some(self.plate.variant);
        record.connections = Some(self.plate.connections);
        self.base.write_record(record);
    }

    pub fn read_record(&mut self, record: &ManagerRecord) {
        self.base.read_record(record);
        if let Some(variant) = record.plate_type {
            self.plate.variant = variant;
        }
        if let Some(connections) = record.connections {
            self.plate.connections = connections;
        }
    }

    pub fn description(&self) -> ManagerRecord {
        let mut record = ManagerRecord::default();
        self.write_record(&mut record);
        record
    }
}

/// Plate resolution policy: `"player"` and `"down"` only, and only while the
/// gate passes.
struct PlateSite<'s, W: ?Sized> {
    origin: BlockPos,
    plate: &'s PlateState,
    armor_slots: usize,
    world: &'s mut W,
}

impl<W: HostWorld + ?Sized> InventoryResolver for PlateSite<'_, W> {
    fn resolve_inventory(&mut self, side: InventorySide) -> Option<Box<dyn Inventory + '_>> {
        if !self.plate.check_mode() {
            return None;
        }
        match side {
            InventorySide::Player => {
                let inventory = open_inventory(self.plate, self.armor_slots, &mut *self.world);
                Some(Box::new(inventory) as Box<dyn Inventory + '_>)
            }
            InventorySide::Down => self.world.inventory_at(self.origin.offset(Direction::Down)?),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::caller::testing::RecordingCaller;
    use crate::envelope::CommandResult;
    use crate::error::DispatchError;
    use crate::inventory::SlotInventory;
    use crate::manager::testing::{Block, TestWorld};

    const POS: BlockPos = BlockPos::new(4, 70, 4);
    const STEVE: PlayerId = PlayerId(1);

    /// 36 main slots plus 4 armour slots, a helmet in the first armour slot.
    fn player_inventory() -> SlotInventory {
        SlotInventory::new("Inventory", 40)
            .with_stack(0, ItemStack::new(276, 1, 12))
            .with_stack(9, ItemStack::new(4, 32, 0))
            .with_stack(36, ItemStack::new(310, 1, 0))
    }

    fn world() -> TestWorld {
        let mut world = TestWorld::default();
        world.players.insert(STEVE, player_inventory());
        world.blocks.insert(
            POS.offset(Direction::Down).unwrap(),
            Block::Chest(SlotInventory::new("chest", 27)),
        );
        world
    }

    fn results(caller: &RecordingCaller) -> Vec<CommandResult> {
        caller
            .events()
            .into_iter()
            .filter(|(event, _)| event == "invmanager_task")
            .map(|(_, args)| serde_json::from_value(args[0].clone()).unwrap())
            .collect()
    }

    #[test]
    fn gated_plate_without_connections_is_empty() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Gated, ManagerConfig::default());
        assert!(!plate.check_mode());
        assert!(!plate.set_player(&mut world, Some(STEVE)));
        assert!(!plate.is_player_on());

        let mut inv = plate.inventory(&mut world);
        assert_eq!(inv.size(), 0);
        for slot in [0, 9, 35, 36] {
            assert_eq!(inv.stack_in_slot(slot), None);
        }
        assert_eq!(inv.decr_stack_size(9, 1), None);
        assert_eq!(inv.stack_limit(), 0);
        assert_eq!(inv.name(), None);
        drop(inv);
        assert!(world.neighbor_notifications.is_empty());
    }

    #[test]
    fn gated_plate_with_connection_delegates_to_player() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Gated, ManagerConfig::default());
        plate.set_connections(&mut world, 1);
        assert!(plate.set_player(&mut world, Some(STEVE)));

        let mut inv = plate.inventory(&mut world);
        assert_eq!(inv.size(), 36);
        assert_eq!(inv.stack_in_slot(9), Some(ItemStack::new(4, 32, 0)));
        assert_eq!(inv.name().as_deref(), Some("Inventory"));
        // Armour stays hidden.
        assert_eq!(inv.stack_in_slot(36), None);
        assert_eq!(inv.decr_stack_size(36, 1), None);

        assert_eq!(inv.decr_stack_size(9, 2), Some(ItemStack::new(4, 2, 0)));
        drop(inv);
        assert_eq!(
            world.players[&STEVE].stack_in_slot(9),
            Some(ItemStack::new(4, 30, 0))
        );
    }

    #[test]
    fn dropping_connections_closes_the_gate_again() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Gated, ManagerConfig::default());
        plate.set_connections(&mut world, 2);
        plate.set_player(&mut world, Some(STEVE));
        plate.set_connections(&mut world, 0);
        assert!(plate.is_player_on());
        assert_eq!(plate.inventory(&mut world).size(), 0);
        assert!(!plate.set_player(&mut world, None));
        assert!(plate.is_player_on());
    }

    #[test]
    fn basic_plate_is_always_open() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Basic, ManagerConfig::default());
        assert_eq!(plate.inventory(&mut world).size(), 0);
        assert!(plate.set_player(&mut world, Some(STEVE)));
        assert_eq!(plate.inventory(&mut world).size(), 36);
    }

    #[test]
    fn set_player_notifies_neighbours_and_callers() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Basic, ManagerConfig::default());
        let caller = RecordingCaller::new(7);
        plate.handle().attach(caller.clone(), Direction::North).unwrap();

        plate.set_player(&mut world, Some(STEVE));
        plate.set_player(&mut world, None);

        assert_eq!(world.neighbor_notifications.len(), 12);
        for direction in Direction::ALL {
            assert!(world.neighbor_notifications.contains(&POS.offset(direction).unwrap()));
        }
        assert_eq!(
            caller.events(),
            vec![
                ("player".to_string(), vec![Value::Bool(true)]),
                ("player".to_string(), vec![Value::Bool(false)]),
            ]
        );
    }

    #[test]
    fn set_connections_marks_block_only_when_authoritative() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Gated, ManagerConfig::default());
        plate.set_connections(&mut world, 1);
        assert_eq!(world.block_updates, vec![POS]);

        world.remote = true;
        plate.set_connections(&mut world, 3);
        assert_eq!(plate.connections(), 3);
        assert_eq!(world.block_updates, vec![POS]);
    }

    #[test]
    fn plate_refuses_attach_from_above() {
        let plate = PlayerManager::new(POS, PlateVariant::Basic, ManagerConfig::default());
        let handle = plate.handle();
        assert!(!handle.can_attach_to_side(Direction::Up));
        assert_eq!(
            handle.attach(RecordingCaller::new(1), Direction::Up),
            Err(DispatchError::SideRejected { side: Direction::Up })
        );
        assert!(plate.base().registry().is_empty());
        assert!(handle.attach(RecordingCaller::new(1), Direction::Down).is_ok());
    }

    #[test]
    fn commands_resolve_only_player_and_down() {
        let mut world = world();
        world.blocks.insert(
            POS.offset(Direction::North).unwrap(),
            Block::Chest(SlotInventory::new("chest", 27)),
        );
        let mut plate = PlayerManager::new(POS, PlateVariant::Basic, ManagerConfig::default());
        plate.set_player(&mut world, Some(STEVE));
        let handle = plate.handle();
        let caller = RecordingCaller::new(1);

        handle.call_method(caller.clone(), 0, vec![json!("player")]).unwrap();
        handle.call_method(caller.clone(), 0, vec![json!("north")]).unwrap();
        let move_args = vec![json!("player"), json!(9), json!("down"), json!(0), json!(8)];
        handle.call_method(caller.clone(), 2, move_args).unwrap();
        // Armour slot is out of range through the facade.
        handle.call_method(caller.clone(), 1, vec![json!("player"), json!(36)]).unwrap();
        plate.update_entity(&mut world);

        assert_eq!(
            results(&caller),
            vec![
                CommandResult::success(json!(36)),
                CommandResult::failure("no inventory found for side 'north'"),
                CommandResult::success(json!(8)),
                CommandResult::failure("slot 36 out of range (inventory has 36 slots)"),
            ]
        );
        assert_eq!(
            world.chest(POS.offset(Direction::Down).unwrap()).stack_in_slot(0),
            Some(ItemStack::new(4, 8, 0))
        );
    }

    #[test]
    fn gated_commands_see_no_inventories() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Gated, ManagerConfig::default());
        let caller = RecordingCaller::new(1);
        plate.handle().call_method(caller.clone(), 0, vec![json!("down")]).unwrap();
        plate.update_entity(&mut world);
        assert_eq!(
            results(&caller),
            vec![CommandResult::failure("no inventory found for side 'down'")]
        );
    }

    #[test]
    fn host_set_connections_survive_rescans() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Gated, ManagerConfig::default());
        plate.set_connections(&mut world, 3);
        assert!(plate.check_mode());

        world.blocks.insert(
            POS.offset(Direction::North).unwrap(),
            Block::Chest(SlotInventory::new("chest", 9)),
        );
        assert!(plate.recompute_connections(&world));
        assert_eq!(plate.connections(), 3);
        assert!(plate.check_mode());

        // Computers coming and going change the mask, not the count.
        world.blocks.insert(POS.offset(Direction::East).unwrap(), Block::Computer);
        assert!(plate.recompute_connections(&world));
        assert_eq!(plate.adjacency().computer_count(), 1);
        assert_eq!(plate.connections(), 3);
        world.blocks.remove(&POS.offset(Direction::East).unwrap());
        assert!(plate.recompute_connections(&world));
        assert_eq!(plate.connections(), 3);
        assert_eq!(world.block_updates, vec![POS]);
    }

    #[test]
    fn plate_at_the_coordinate_edge_does_not_overflow() {
        let edge = BlockPos::new(i32::MAX, 64, 0);
        let mut world = world();
        world.blocks.insert(
            edge.offset(Direction::West).unwrap(),
            Block::Chest(SlotInventory::new("chest", 9)),
        );
        let mut plate = PlayerManager::new(edge, PlateVariant::Basic, ManagerConfig::default());
        assert!(plate.recompute_connections(&world));
        assert_eq!(plate.adjacency().inventory_mask, Direction::West.bit());

        assert!(plate.set_player(&mut world, Some(STEVE)));
        assert_eq!(world.neighbor_notifications.len(), 5);

        let caller = RecordingCaller::new(1);
        plate.handle().call_method(caller.clone(), 0, vec![json!("down")]).unwrap();
        plate.update_entity(&mut world);
        assert_eq!(
            results(&caller),
            vec![CommandResult::failure("no inventory found for side 'down'")]
        );
    }

    #[test]
    fn record_carries_type_and_connections() {
        let mut world = world();
        let mut plate = PlayerManager::new(POS, PlateVariant::Gated, ManagerConfig::default());
        plate.set_connections(&mut world, 2);
        let json = plate.description().to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], json!("COMPUTER"));
        assert_eq!(value["connections"], json!(2));
        assert_eq!(value["computerConnections"], json!(0));

        let mut restored = PlayerManager::new(POS, PlateVariant::Basic, ManagerConfig::default());
        restored.read_record(&ManagerRecord::from_json(&json).unwrap());
        assert_eq!(restored.variant(), PlateVariant::Gated);
        assert_eq!(restored.connections(), 2);

        // A record without plate keys keeps the current values.
        restored.read_record(&ManagerRecord::from_json("{}").unwrap());
        assert_eq!(restored.variant(), PlateVariant::Gated);
    }
}
