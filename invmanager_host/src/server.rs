// Simulation thread and tick loop for the headless host.
//
// Architecture: one simulation thread, any number of caller threads.
//
// - **Caller threads** hold `PeripheralHandle`s (from `HostHandle::manager`
//   and `HostHandle::plate`) and `ChannelCaller`s. They attach, call
//   methods, and read result events from their inboxes. They never touch
//   the world.
// - **Control events** (`HostEvent`: place/remove blocks, add players, step
//   on or off the plate, snapshot requests) travel over a crossbeam channel
//   to the simulation thread, which applies them between ticks.
// - **Simulation thread** owns the authoritative `MemoryWorld`, one
//   `BaseManager`, one `PlayerManager`, and the client side: a remote
//   `MemoryWorld` plus a `ManagerReplica` for each manager. It waits on the
//   control channel with `recv_timeout` and, whenever the tick deadline
//   passes, runs one tick.
//
// One tick, for each manager in turn:
//   1. `recompute_connections`; when the plate's masks change, the host
//      sets its `connections` to the number of adjacent computers;
//   2. `update_entity`, draining that manager's command queue;
//   3. if the scan changed anything or the manager flagged its block for
//      update, push `description()` to its replica.
//
// Shutdown: `HostHandle::stop` clears `keep_running` and joins the thread.
// Commands still queued at that point are discarded with the managers.
//
// See also: `world.rs` for `MemoryWorld`, `caller.rs` for the callers that
// read results, `main.rs` for the CLI that builds a `HostConfig`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use invmanager_core::config::ManagerConfig;
use invmanager_core::inventory::SlotInventory;
use invmanager_core::manager::{BaseManager, ManagerReplica, PeripheralHandle};
use invmanager_core::plate::{PlateState, PlayerManager};
use invmanager_core::state::{ManagerRecord, PlateVariant};
use invmanager_core::types::{BlockPos, PlayerId};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::world::{Block, MemoryWorld};

/// Control events applied on the simulation thread between ticks.
pub enum HostEvent {
    PlaceBlock { pos: BlockPos, block: Block },
    RemoveBlock { pos: BlockPos },
    AddPlayer { player: PlayerId, inventory: SlotInventory },
    /// Step onto the plate (`Some`) or off it (`None`).
    StepOnPlate { player: Option<PlayerId> },
    Snapshot { reply: Sender<HostSnapshot> },
}

/// A copy of host state, taken on the simulation thread.
#[derive(Clone, Debug)]
pub struct HostSnapshot {
    pub tick: u64,
    pub world: MemoryWorld,
    pub manager: ManagerRecord,
    pub plate: ManagerRecord,
    pub plate_state: PlateState,
    pub manager_replica: ManagerRecord,
    pub plate_replica: ManagerRecord,
}

/// Host configuration. Every field has a default; a JSON config file only
/// needs to name what it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Milliseconds between simulation ticks.
    pub tick_millis: u64,
    /// Demo caller threads spawned by the binary.
    pub callers: u32,
    pub manager_pos: BlockPos,
    pub plate_pos: BlockPos,
    pub plate_variant: PlateVariant,
    pub manager: ManagerConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_millis: 50,
            callers: 2,
            manager_pos: BlockPos::new(0, 64, 0),
            plate_pos: BlockPos::new(8, 64, 0),
            plate_variant: PlateVariant::Gated,
            manager: ManagerConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Handle returned by `start_host` to reach and stop the running host.
pub struct HostHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    events: Sender<HostEvent>,
    manager: PeripheralHandle,
    plate: PeripheralHandle,
}

impl HostHandle {
    /// The base manager's peripheral surface.
    pub fn manager(&self) -> PeripheralHandle {
        self.manager.clone()
    }

    /// The plate's peripheral surface.
    pub fn plate(&self) -> PeripheralHandle {
        self.plate.clone()
    }

    /// Queue a control event for the next loop iteration. False once the
    /// simulation thread has exited.
    pub fn send(&self, event: HostEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Ask the simulation thread for a snapshot, waiting up to `timeout`.
    pub fn snapshot(&self, timeout: Duration) -> Option<HostSnapshot> {
        let (reply, rx) = bounded(1);
        if !self.send(HostEvent::Snapshot { reply }) {
            return None;
        }
        rx.recv_timeout(timeout).ok()
    }

    /// Signal the host to stop and wait for it to shut down.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Start the host on a background thread, taking ownership of `world`.
pub fn start_host(config: HostConfig, world: MemoryWorld) -> std::io::Result<HostHandle> {
    let manager = BaseManager::new(config.manager_pos, config.manager.clone());
    let plate = PlayerManager::new(
        config.plate_pos,
        config.plate_variant,
        config.manager.clone(),
    );
    let manager_handle = manager.handle();
    let plate_handle = plate.handle();

    let (events, rx) = unbounded();
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();
    let tick = Duration::from_millis(config.tick_millis.max(1));

    let mut state = SimState {
        tick: 0,
        world,
        client: MemoryWorld::remote(),
        manager_replica: ManagerReplica::new(manager.pos()),
        plate_replica: ManagerReplica::new(plate.pos()),
        manager,
        plate,
    };
    state.world.place(config.manager_pos, Block::Manager);
    state.world.place(config.plate_pos, Block::Manager);

    let thread = thread::Builder::new()
        .name("invmanager-sim".into())
        .spawn(move || run_host(state, rx, tick, keep_running_clone))?;

    info!(
        "host started: manager at {}, {:?} plate at {}, tick {}ms",
        config.manager_pos,
        config.plate_variant,
        config.plate_pos,
        tick.as_millis()
    );

    Ok(HostHandle {
        keep_running,
        thread: Some(thread),
        events,
        manager: manager_handle,
        plate: plate_handle,
    })
}

/// Everything the simulation thread owns.
struct SimState {
    tick: u64,
    world: MemoryWorld,
    client: MemoryWorld,
    manager: BaseManager,
    plate: PlayerManager,
    manager_replica: ManagerReplica,
    plate_replica: ManagerReplica,
}

/// Main host loop. Runs until `keep_running` is cleared or every sender is
/// gone.
fn run_host(
    mut state: SimState,
    rx: Receiver<HostEvent>,
    tick: Duration,
    keep_running: Arc<AtomicBool>,
) {
    let mut next_tick = Instant::now() + tick;
    while keep_running.load(Ordering::SeqCst) {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(event) => {
                handle_event(&mut state, event);
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut state, event);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if Instant::now() >= next_tick {
            run_tick(&mut state);
            next_tick = Instant::now() + tick;
        }
    }
    info!("host stopped after {} ticks", state.tick);
}

fn handle_event(state: &mut SimState, event: HostEvent) {
    match event {
        HostEvent::PlaceBlock { pos, block } => {
            debug!("placing {block:?} at {pos}");
            state.world.place(pos, block);
        }
        HostEvent::RemoveBlock { pos } => {
            debug!("removing block at {pos}");
            state.world.remove(pos);
        }
        HostEvent::AddPlayer { player, inventory } => {
            state.world.add_player(player, inventory);
        }
        HostEvent::StepOnPlate { player } => {
            if !state.plate.set_player(&mut state.world, player) {
                warn!("plate at {} refused player change", state.plate.pos());
            }
        }
        HostEvent::Snapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
    }
}

/// One simulation step.
fn run_tick(state: &mut SimState) {
    state.tick += 1;

    state.manager.recompute_connections(&state.world);
    let ran = state.manager.update_entity(&mut state.world);

    if state.plate.recompute_connections(&state.world) {
        state.sync_plate_connections();
    }
    let ran = ran + state.plate.update_entity(&mut state.world);

    let block_updates = state.world.take_block_updates();
    let neighbor_changes = state.world.take_neighbor_changes();
    if !neighbor_changes.is_empty() {
        trace!("{} neighbour notification(s)", neighbor_changes.len());
    }
    state.sync_replicas(&block_updates);

    if ran > 0 {
        trace!("tick {}: {ran} command(s)", state.tick);
    }
}

impl SimState {
    /// Host policy: a plate's connection count is the number of computers
    /// next to it.
    fn sync_plate_connections(&mut self) {
        let computers = i32::try_from(self.plate.adjacency().computer_count()).unwrap_or(i32::MAX);
        if computers != self.plate.connections() {
            debug!("plate at {} now has {computers} connection(s)", self.plate.pos());
            self.plate.set_connections(&mut self.world, computers);
        }
    }

    /// Push descriptions to replicas whose managers changed this tick.
    fn sync_replicas(&mut self, block_updates: &BTreeSet<BlockPos>) {
        if self.manager.take_dirty() || block_updates.contains(&self.manager.pos()) {
            let record = self.manager.description();
            self.manager_replica.on_data_packet(&mut self.client, &record);
        }
        if self.plate.take_dirty() || block_updates.contains(&self.plate.pos()) {
            let record = self.plate.description();
            self.plate_replica.on_data_packet(&mut self.client, &record);
        }
        for pos in self.client.take_render_updates() {
            trace!("client re-render at {pos}");
        }
    }

    fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            tick: self.tick,
            world: self.world.clone(),
            manager: self.manager.description(),
            plate: self.plate.description(),
            plate_state: self.plate.plate_state(),
            manager_replica: self.manager_replica.record().clone(),
            plate_replica: self.plate_replica.record().clone(),
        }
    }
}
