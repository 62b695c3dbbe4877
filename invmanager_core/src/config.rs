// Data-driven manager configuration.
//
// Every name and constant the managers expose to remote callers lives in
// `ManagerConfig`: the event names scripts listen for, the peripheral type
// string, the script mount that attach installs, and the number of armour
// slots the plate hides. Logic reads these from the config rather than
// hard-coding them, so a pack can rename events or remount the helper
// scripts without recompiling.
//
// Loaded from JSON (`from_json`) or built from `Default`, which holds the
// values the shipped helper scripts expect. Missing keys in a JSON config
// fall back to their defaults (`#[serde(default)]`), so a config file only
// needs to name what it changes.
//
// See also: `caller.rs` for where `MountConfig` is applied on attach,
// `bus.rs` for `task_event`, `plate.rs` for `player_event` and
// `armor_slots`.

use serde::{Deserialize, Serialize};

/// Read-only directory mounted into a remote caller's filesystem on attach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Mount point name inside the caller's filesystem.
    pub name: String,
    /// Host-side path of the helper scripts.
    pub path: String,
    pub read_only: bool,
    /// Space budget passed to the caller's mount call.
    pub space: u64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            name: "invmanager".into(),
            path: "mods/invmanager-lua".into(),
            read_only: true,
            space: 0,
        }
    }
}

/// Top-level manager configuration. Loaded once, never mutated at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Type string reported to remote callers.
    pub peripheral_type: String,

    /// Event name carrying each command's result envelope.
    pub task_event: String,

    /// Event name broadcast when a player steps on or off a plate.
    pub player_event: String,

    /// Trailing player-inventory slots the plate never exposes (armour).
    pub armor_slots: usize,

    /// Helper-script mount installed on every attach.
    pub mount: MountConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            peripheral_type: "InventoryManager".into(),
            task_event: "invmanager_task".into(),
            player_event: "player".into(),
            armor_slots: 4,
            mount: MountConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
