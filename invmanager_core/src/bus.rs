// Cross-thread command bus.
//
// Remote callers run on their own threads and must never touch simulation
// state directly. Instead they submit a `Command`: an action closure plus the
// caller that submitted it. The simulation thread drains the queue once per
// step, runs each action against a context it alone may mutate, wraps the
// outcome in a `CommandResult`, and delivers it back to the originator as an
// `"invmanager_task"` event. There is no return channel; the event is the
// only way a caller learns the outcome.
//
// The flow for one remote call:
//   caller thread → `dispatch::call_method` → `CommandSubmitter::submit`
//   (non-blocking, returns immediately) → next tick on the simulation thread
//   → `CommandBus::drain` → action runs → envelope → `CallerRegistry::unicast`.
//
// Queue: an unbounded multi-producer channel (`crossbeam-channel`). `submit`
// never blocks and never drops a command while the bus is alive. `drain`
// snapshots the queue length when it starts and pops at most that many
// commands, so anything submitted mid-drain (including by an action) waits
// for the next drain: nothing is skipped, nothing runs twice.
//
// Isolation: an action returning `Err` becomes a failure envelope; an action
// that panics is caught and also becomes a failure envelope. Neither stops
// the drain or affects other queued commands.
//
// Actions receive the executing entity's `InventoryResolver` for the length
// of one call only. The resolver usually borrows the host world, which is why
// `Action` is higher-ranked over that borrow instead of naming a context type.
//
// See also: `dispatch.rs` for the actions remote methods build,
// `caller.rs` for delivery, `envelope.rs` for the result wire shape,
// `manager.rs` for the per-tick `update_entity` that calls `drain`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use serde_json::Value;

use crate::caller::{CallerRegistry, RemoteCaller};
use crate::envelope::CommandResult;
use crate::error::CommandError;
use crate::inventory::InventoryResolver;

/// Default event name for result envelopes.
pub const TASK_EVENT: &str = "invmanager_task";

/// A zero-argument unit of work, run once on the simulation thread.
pub type Action =
    Box<dyn FnOnce(&mut dyn InventoryResolver) -> Result<Value, CommandError> + Send>;

/// A queued unit of work and the caller waiting for its result.
pub struct Command {
    pub originator: Arc<dyn RemoteCaller>,
    pub action: Action,
}

/// Thread-safe submission half of a `CommandBus`. Cheap to clone; hand one
/// to every remote-caller thread.
#[derive(Clone)]
pub struct CommandSubmitter {
    tx: Sender<Command>,
}

impl CommandSubmitter {
    /// Queue `action` for the next drain. Never blocks.
    pub fn submit<F>(&self, originator: Arc<dyn RemoteCaller>, action: F)
    where
        F: FnOnce(&mut dyn InventoryResolver) -> Result<Value, CommandError> + Send + 'static,
    {
        self.submit_boxed(originator, Box::new(action));
    }

    pub fn submit_boxed(&self, originator: Arc<dyn RemoteCaller>, action: Action) {
        let id = originator.id();
        match self.tx.send(Command { originator, action }) {
            Ok(()) => debug!("queued command from {id}"),
            // Only possible once the owning bus has been dropped (teardown).
            Err(_) => debug!("bus torn down, discarding command from {id}"),
        }
    }
}

/// The single-consumer side: owned by the entity, drained on the simulation
/// thread.
pub struct CommandBus {
    tx: Sender<Command>,
    rx: Receiver<Command>,
    task_event: String,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::with_task_event(TASK_EVENT)
    }

    pub fn with_task_event(task_event: impl Into<String>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            task_event: task_event.into(),
        }
    }

    pub fn submitter(&self) -> CommandSubmitter {
        CommandSubmitter {
            tx: self.tx.clone(),
        }
    }

    /// Commands waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run every command that was queued when the drain began, in FIFO order,
    /// delivering one envelope per command to its originator. Returns the
    /// number of commands executed.
    ///
    /// Must only be called from the simulation thread, never re-entrantly.
    pub fn drain(&self, ctx: &mut dyn InventoryResolver, registry: &CallerRegistry) -> usize {
        let queued = self.rx.len();
        let mut executed = 0;
        while executed < queued {
            let Ok(command) = self.rx.try_recv() else {
                break;
            };
            executed += 1;
            let id = command.originator.id();
            let result = execute(command.action, ctx);
            if let CommandResult::Failure { message } = &result {
                warn!("command from {id} failed: {message}");
            }
            registry.unicast(
                &self.task_event,
                &[result.to_value()],
                command.originator.as_ref(),
            );
        }
        if executed > 0 {
            debug!("drained {executed} command(s), {} left queued", self.rx.len());
        }
        executed
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one action, converting errors and panics into failure envelopes.
fn execute(action: Action, ctx: &mut dyn InventoryResolver) -> CommandResult {
    match panic::catch_unwind(AssertUnwindSafe(|| action(ctx))) {
        Ok(Ok(data)) => CommandResult::success(data),
        Ok(Err(err)) => CommandResult::failure(err.to_string()),
        Err(payload) => CommandResult::failure(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "command panicked".to_string()
    }
}
