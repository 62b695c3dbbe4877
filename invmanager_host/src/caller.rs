// Channel-backed remote caller.
//
// Stands in for a scripting computer's runtime: `queue_event` pushes into a
// crossbeam channel, and whichever thread plays the computer reads events
// back out through its `CallerInbox`. Nothing here ever blocks the
// simulation thread; if the inbox is gone, events are dropped.
//
// `CallerInbox::next_task` waits for the next result envelope. Events of any
// other name that arrive meanwhile are stashed, not lost, and come back out
// of `next_event`/`drain` in arrival order.
//
// See also: `invmanager_core::caller` for the `RemoteCaller` trait and the
// registry that delivers to it, `main.rs` and `tests/smoke_test.rs` for the
// threads that drive these.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use invmanager_core::bus::TASK_EVENT;
use invmanager_core::caller::RemoteCaller;
use invmanager_core::envelope::CommandResult;
use invmanager_core::types::CallerId;
use log::{trace, warn};
use serde_json::Value;

/// One delivered event.
#[derive(Clone, Debug, PartialEq)]
pub struct CallerEvent {
    pub name: String,
    pub args: Vec<Value>,
}

/// A mount request received on attach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mount {
    pub name: String,
    pub path: String,
    pub read_only: bool,
}

pub struct ChannelCaller {
    id: CallerId,
    tx: Sender<CallerEvent>,
    mounts: Mutex<Vec<Mount>>,
}

impl ChannelCaller {
    /// A caller using the default task event name.
    pub fn new(id: u32) -> (Arc<Self>, CallerInbox) {
        Self::with_task_event(id, TASK_EVENT)
    }

    pub fn with_task_event(id: u32, task_event: impl Into<String>) -> (Arc<Self>, CallerInbox) {
        let (tx, rx) = unbounded();
        let caller = Arc::new(Self {
            id: CallerId(id),
            tx,
            mounts: Mutex::new(Vec::new()),
        });
        let inbox = CallerInbox {
            rx,
            stash: VecDeque::new(),
            task_event: task_event.into(),
        };
        (caller, inbox)
    }

    pub fn mounts(&self) -> Vec<Mount> {
        match self.mounts.lock() {
            Ok(mounts) => mounts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RemoteCaller for ChannelCaller {
    fn id(&self) -> CallerId {
        self.id
    }

    fn queue_event(&self, event: &str, args: &[Value]) {
        let event = CallerEvent {
            name: event.to_string(),
            args: args.to_vec(),
        };
        if self.tx.send(event).is_err() {
            trace!("{} inbox closed, dropping event", self.id);
        }
    }

    fn mount_fixed_dir(&self, mount: &str, path: &str, read_only: bool, _space: u64) {
        let mount = Mount {
            name: mount.to_string(),
            path: path.to_string(),
            read_only,
        };
        match self.mounts.lock() {
            Ok(mut mounts) => mounts.push(mount),
            Err(poisoned) => poisoned.into_inner().push(mount),
        }
    }
}

/// The receiving end a caller thread reads from.
pub struct CallerInbox {
    rx: Receiver<CallerEvent>,
    stash: VecDeque<CallerEvent>,
    task_event: String,
}

impl CallerInbox {
    /// The next event of any name, waiting up to `timeout`.
    pub fn next_event(&mut self, timeout: Duration) -> Option<CallerEvent> {
        if let Some(event) = self.stash.pop_front() {
            return Some(event);
        }
        self.rx.recv_timeout(timeout).ok()
    }

    /// The next result envelope, waiting up to `timeout`. Other events seen
    /// on the way are stashed for `next_event`.
    pub fn next_task(&mut self, timeout: Duration) -> Option<CommandResult> {
        if let Some(i) = self.stash.iter().position(|e| e.name == self.task_event) {
            let event = self.stash.remove(i)?;
            return decode_task(event);
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(event) if event.name == self.task_event => return decode_task(event),
                Ok(event) => self.stash.push_back(event),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Every event delivered so far that has not been read yet.
    pub fn drain(&mut self) -> Vec<CallerEvent> {
        let mut events: Vec<CallerEvent> = self.stash.drain(..).collect();
        events.extend(self.rx.try_iter());
        events
    }
}

fn decode_task(event: CallerEvent) -> Option<CommandResult> {
    let value = event.args.into_iter().next()?;
    match serde_json::from_value(value) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!("undecodable task envelope: {e}");
            None
        }
    }
}
