// Remote callers and the registry that routes events to them.
//
// A remote caller is a scripting computer running on its own thread. The
// core never owns one: it only holds an `Arc<dyn RemoteCaller>` while the
// caller is attached, and uses it to queue events into the caller's own
// event loop. Several callers may be attached to one entity at once.
//
// `CallerRegistry` is the only routing table. It is shared between the
// remote-caller threads (attach/detach) and the simulation thread
// (broadcast, and unicast for command results), so it sits on a concurrent
// map (`DashMap`) rather than behind an external lock. Broadcast clones a
// membership snapshot first and delivers outside any shard lock: a caller
// queueing events re-entrantly, or detaching mid-broadcast, cannot deadlock
// or fault the loop.
//
// Attach has one side effect beyond membership: it mounts the helper-script
// directory into the caller (`MountConfig`).
//
// See also: `bus.rs` for unicast delivery of result envelopes,
// `manager.rs` for `PeripheralHandle`, which exposes attach/detach to
// callers, `config.rs` for `MountConfig`.

use std::sync::Arc;

use dashmap::DashMap;
use log::{info, trace};
use serde_json::Value;

use crate::config::MountConfig;
use crate::types::CallerId;

/// The capability surface a remote caller's runtime provides.
pub trait RemoteCaller: Send + Sync {
    /// Runtime-assigned ID, unique among callers attached to one entity.
    fn id(&self) -> CallerId;

    /// Queue an event into the caller's event loop. Must not block.
    fn queue_event(&self, event: &str, args: &[Value]);

    /// Mount a host directory into the caller's filesystem.
    fn mount_fixed_dir(&self, mount: &str, path: &str, read_only: bool, space: u64);
}

/// Concurrent routing table of attached callers.
pub struct CallerRegistry {
    callers: DashMap<CallerId, Arc<dyn RemoteCaller>>,
    mount: MountConfig,
}

impl CallerRegistry {
    pub fn new(mount: MountConfig) -> Self {
        Self {
            callers: DashMap::new(),
            mount,
        }
    }

    /// Register `caller` under its ID, replacing any previous registration,
    /// and mount the helper scripts into it.
    pub fn attach(&self, caller: Arc<dyn RemoteCaller>) {
        let id = caller.id();
        if self.callers.insert(id, Arc::clone(&caller)).is_some() {
            info!("{id} re-attached, replacing previous handle");
        } else {
            info!("{id} attached");
        }
        caller.mount_fixed_dir(
            &self.mount.name,
            &self.mount.path,
            self.mount.read_only,
            self.mount.space,
        );
    }

    /// Remove `id` if present. Unknown IDs are ignored.
    pub fn detach(&self, id: CallerId) {
        if self.callers.remove(&id).is_some() {
            info!("{id} detached");
        }
    }

    /// Deliver an event to every attached caller. Returns how many callers
    /// the snapshot contained.
    pub fn broadcast(&self, event: &str, args: &[Value]) -> usize {
        let snapshot: Vec<Arc<dyn RemoteCaller>> = self
            .callers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for caller in &snapshot {
            trace!("broadcast '{event}' -> {}", caller.id());
            caller.queue_event(event, args);
        }
        snapshot.len()
    }

    /// Deliver an event to one caller, whether or not it is still attached.
    pub fn unicast(&self, event: &str, args: &[Value], caller: &dyn RemoteCaller) {
        trace!("unicast '{event}' -> {}", caller.id());
        caller.queue_event(event, args);
    }

    pub fn contains(&self, id: CallerId) -> bool {
        self.callers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }

    /// Attached IDs in ascending order.
    pub fn caller_ids(&self) -> Vec<CallerId> {
        let mut ids: Vec<CallerId> = self.callers.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }
}

impl Default for CallerRegistry {
    fn default() -> Self {
        Self::new(MountConfig::default())
    }
}


#[cfg(test)]
mod tests {
    use std::thread;

    use super::testing::RecordingCaller;
    use super::*;

    #[test]
    fn attach_broadcast_detach() {
        let registry = CallerRegistry::default();
        let caller = RecordingCaller::new(5);
        registry.attach(caller.clone());

        assert_eq!(registry.broadcast("ping", &[]), 1);
        assert_eq!(caller.events(), vec![("ping".to_string(), Vec::<Value>::new())]);

        registry.detach(CallerId(5));
        assert_eq!(registry.broadcast("ping", &[]), 0);
        assert_eq!(caller.events().len(), 1);
    }

    #[test]
    fn attach_mounts_helper_scripts() {
        let registry = CallerRegistry::default();
        let caller = RecordingCaller::new(1);
        registry.attach(caller.clone());
        let mounts = caller.mounts.lock().unwrap().clone();
        assert_eq!(
            mounts,
            vec![("invmanager".to_string(), "mods/invmanager-lua".to_string())]
        );
    }

    #[test]
    fn reattach_same_id_overwrites() {
        let registry = CallerRegistry::default();
        let first = RecordingCaller::new(3);
        let second = RecordingCaller::new(3);
        registry.attach(first.clone());
        registry.attach(second.clone());
        assert_eq!(registry.len(), 1);

        registry.broadcast("tick", &[Value::from(1)]);
        assert!(first.events().is_empty());
        assert_eq!(second.events().len(), 1);
    }

    #[test]
    fn detach_is_idempotent() {
        let registry = CallerRegistry::default();
        registry.attach(RecordingCaller::new(1));
        registry.detach(CallerId(99));
        assert!(registry.contains(CallerId(1)));
        assert_eq!(registry.caller_ids(), vec![CallerId(1)]);
        registry.detach(CallerId(1));
        registry.detach(CallerId(1));
        assert!(registry.is_empty());
        assert!(registry.caller_ids().is_empty());
    }

    #[test]
    fn unicast_bypasses_membership() {
        let registry = CallerRegistry::default();
        let stranger = RecordingCaller::new(8);
        registry.unicast("invmanager_task", &[Value::Null], stranger.as_ref());
        assert_eq!(stranger.events().len(), 1);
        assert!(!registry.contains(CallerId(8)));
    }

    #[test]
    fn concurrent_attach_detach_during_broadcast() {
        let registry = Arc::new(CallerRegistry::default());
        let workers: Vec<_> = (0..4u32)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..200u32 {
                        let id = t * 1000 + i;
                        registry.attach(RecordingCaller::new(id));
                        registry.detach(CallerId(id));
                    }
                })
            })
            .collect();
        for _ in 0..200 {
            registry.broadcast("noise", &[]);
        }
        for w in workers {
            w.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
