// invmanager_host — headless host for inventory managers.
//
// Owns an in-memory world, ticks one base manager and one player plate on a
// simulation thread, and lets any number of caller threads attach to them,
// call methods, and read result events back. It plays the part a game server
// plays for the managers: block storage, neighbour lookups, block-update
// hooks, and a client-side view that the managers' replicas sync into.
//
// Module overview:
// - `world.rs`:   `MemoryWorld`, a sparse block map plus player inventories.
//                 Implements `HostWorld` so managers can scan and resolve.
// - `caller.rs`:  `ChannelCaller`, a `RemoteCaller` that delivers events into
//                 a crossbeam channel, and the `CallerInbox` a thread reads.
// - `server.rs`:  The simulation thread, its control events, snapshots, and
//                 `HostConfig`.
//
// Dependencies: `invmanager_core` for every manager type. The binary
// (`main.rs`) runs a short scripted demo against a small world.

pub mod caller;
pub mod server;
pub mod world;

pub use server::{HostConfig, HostEvent, HostHandle, start_host};
