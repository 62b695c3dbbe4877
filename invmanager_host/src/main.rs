// CLI entry point for the headless inventory-manager host.
//
// Builds a small demo world, starts the host, and runs a scripted session
// against it: several caller threads attach to the base manager and read and
// move items between its neighbouring chests, then one caller attaches to the
// plate, a player steps on, and the caller reads the player's inventory.
// Results are logged as they arrive; the run ends with a snapshot of both
// replicas and a clean shutdown.
//
// Demo layout (M = manager, P = plate):
//   M below: chest with cobblestone and coal     M east: empty chest
//   M west:  computer                            P below: empty chest
//   P east:  computer (opens a gated plate)
//
// Usage:
//   invmanager-host [OPTIONS]
//     --config <PATH>         JSON host config (later flags override it)
//     --tick-ms <N>           Milliseconds per tick (default: 50)
//     --callers <N>           Caller threads on the base manager (default: 2)
//     --variant <basic|gated> Plate variant (default: gated)
//
// Log level comes from `RUST_LOG` (default: info).

use std::thread;
use std::time::Duration;

use invmanager_core::caller::RemoteCaller;
use invmanager_core::envelope::CommandResult;
use invmanager_core::inventory::SlotInventory;
use invmanager_core::manager::PeripheralHandle;
use invmanager_core::state::PlateVariant;
use invmanager_core::types::{BlockPos, Direction, ItemStack, PlayerId};
use invmanager_host::caller::{CallerInbox, ChannelCaller};
use invmanager_host::server::{HostConfig, HostEvent, start_host};
use invmanager_host::world::{Block, MemoryWorld, PLAYER_INVENTORY_SLOTS};
use log::{error, info, warn};
use serde_json::{Value, json};

const RESULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEMO_PLAYER: PlayerId = PlayerId(1);

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let config = parse_args();

    let world = demo_world(&config);
    let handle = match start_host(config.clone(), world) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start host: {e}");
            std::process::exit(1);
        }
    };

    let workers: Vec<_> = (0..config.callers)
        .map(|i| {
            let manager = handle.manager();
            thread::spawn(move || run_manager_caller(i + 1, manager))
        })
        .collect();
    for worker in workers {
        if worker.join().is_err() {
            error!("caller thread panicked");
        }
    }

    run_plate_caller(config.callers + 1, handle.plate(), |event| {
        handle.send(event);
    });

    match handle.snapshot(RESULT_TIMEOUT) {
        Some(snapshot) => {
            info!("stopped at tick {}", snapshot.tick);
            for (label, record) in [
                ("manager replica", &snapshot.manager_replica),
                ("plate replica", &snapshot.plate_replica),
            ] {
                match record.to_json() {
                    Ok(json) => info!("{label}: {json}"),
                    Err(e) => warn!("{label}: {e}"),
                }
            }
        }
        None => warn!("host did not answer the snapshot request"),
    }

    handle.stop();
}

fn demo_world(config: &HostConfig) -> MemoryWorld {
    let m = config.manager_pos;
    let p = config.plate_pos;
    let mut world = MemoryWorld::new();
    place_beside(
        &mut world,
        m,
        Direction::Down,
        Block::Chest(
            SlotInventory::new("chest", 27)
                .with_stack(0, ItemStack::new(4, 64, 0))
                .with_stack(1, ItemStack::new(263, 32, 0)),
        ),
    );
    place_beside(&mut world, m, Direction::East, Block::chest());
    place_beside(&mut world, m, Direction::West, Block::Computer);
    place_beside(&mut world, p, Direction::Down, Block::chest());
    place_beside(&mut world, p, Direction::East, Block::Computer);
    world.add_player(
        DEMO_PLAYER,
        SlotInventory::new("Inventory", PLAYER_INVENTORY_SLOTS)
            .with_stack(0, ItemStack::new(276, 1, 0))
            .with_stack(1, ItemStack::new(364, 12, 0)),
    );
    world
}

fn place_beside(world: &mut MemoryWorld, origin: BlockPos, direction: Direction, block: Block) {
    match origin.offset(direction) {
        Some(pos) => {
            world.place(pos, block);
        }
        None => warn!("no room {direction} of {origin}, skipping {block:?}"),
    }
}

/// Attach to the base manager and run a few calls, logging each result.
fn run_manager_caller(id: u32, manager: PeripheralHandle) {
    let (caller, mut inbox) = ChannelCaller::new(id);
    if let Err(e) = manager.attach(caller.clone(), Direction::West) {
        error!("{} could not attach: {e}", caller.id());
        return;
    }
    info!(
        "{} attached to {} ({})",
        caller.id(),
        manager.peripheral_type(),
        manager.method_names().join(", ")
    );

    let calls: [(&str, usize, Vec<Value>); 3] = [
        ("size", 0, vec![json!("down")]),
        ("read", 1, vec![json!("down"), json!(1)]),
        (
            "move",
            2,
            vec![json!("down"), json!(1), json!("east"), json!(id), json!(8)],
        ),
    ];
    for (name, selector, args) in calls {
        if let Err(e) = manager.call_method(caller.clone(), selector, args) {
            warn!("{} {name}: {e}", caller.id());
            continue;
        }
        log_result(&*caller, name, &mut inbox);
    }
    manager.detach(caller.id());
}

/// Attach to the plate, put the demo player on it, and read their inventory.
fn run_plate_caller(id: u32, plate: PeripheralHandle, send: impl Fn(HostEvent)) {
    let (caller, mut inbox) = ChannelCaller::new(id);
    if let Err(e) = plate.attach(caller.clone(), Direction::North) {
        error!("{} could not attach to plate: {e}", caller.id());
        return;
    }

    // Give the plate a tick to count its computer before stepping on.
    thread::sleep(Duration::from_millis(200));
    send(HostEvent::StepOnPlate {
        player: Some(DEMO_PLAYER),
    });
    match inbox.next_event(RESULT_TIMEOUT) {
        Some(event) => info!("{} got '{}' {:?}", caller.id(), event.name, event.args),
        None => warn!("plate never reported a player (still gated?)"),
    }

    let calls: [(&str, usize, Vec<Value>); 2] = [
        ("size", 0, vec![json!("player")]),
        ("read", 1, vec![json!("player"), json!(1)]),
    ];
    for (name, selector, args) in calls {
        if let Err(e) = plate.call_method(caller.clone(), selector, args) {
            warn!("{} {name}: {e}", caller.id());
            continue;
        }
        log_result(&*caller, name, &mut inbox);
    }

    send(HostEvent::StepOnPlate { player: None });
    plate.detach(caller.id());
}

fn log_result(caller: &dyn RemoteCaller, name: &str, inbox: &mut CallerInbox) {
    match inbox.next_task(RESULT_TIMEOUT) {
        Some(CommandResult::Success { data }) => info!("{} {name} -> {data}", caller.id()),
        Some(CommandResult::Failure { message }) => {
            warn!("{} {name} failed: {message}", caller.id());
        }
        None => warn!("{} {name}: no result", caller.id()),
    }
}

/// Parse command-line arguments into a `HostConfig`. Uses simple
/// `std::env::args()` matching, no clap dependency.
fn parse_args() -> HostConfig {
    let mut config = HostConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("--config requires a path");
                    std::process::exit(1);
                };
                config = load_config(path);
            }
            "--tick-ms" => {
                i += 1;
                config.tick_millis =
                    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                        eprintln!("--tick-ms requires a valid number");
                        std::process::exit(1);
                    });
            }
            "--callers" => {
                i += 1;
                config.callers = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--callers requires a valid number");
                    std::process::exit(1);
                });
            }
            "--variant" => {
                i += 1;
                config.plate_variant = match args.get(i).map(String::as_str) {
                    Some("basic") => PlateVariant::Basic,
                    Some("gated") => PlateVariant::Gated,
                    _ => {
                        eprintln!("--variant must be 'basic' or 'gated'");
                        std::process::exit(1);
                    }
                };
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn load_config(path: &str) -> HostConfig {
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Cannot read {path}: {e}");
        std::process::exit(1);
    });
    HostConfig::from_json(&text).unwrap_or_else(|e| {
        eprintln!("Invalid config {path}: {e}");
        std::process::exit(1);
    })
}

fn print_usage() {
    println!("Usage: invmanager-host [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <PATH>          JSON host config (later flags override it)");
    println!("  --tick-ms <N>            Milliseconds per tick (default: 50)");
    println!("  --callers <N>            Caller threads on the base manager (default: 2)");
    println!("  --variant <basic|gated>  Plate variant (default: gated)");
    println!("  --help, -h               Show this help");
}
