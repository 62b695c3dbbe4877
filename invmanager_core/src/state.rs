// Persisted and synced manager state.
//
// `ManagerRecord` is the one snapshot format for both persistence (save and
// load) and state sync (the description pushed from the authoritative
// entity to replicas). Field names match the keys existing saves use:
//
//   {"computerConnections": 5, "chestConnections": 1,
//    "type": "COMPUTER", "connections": 2}
//
// Every field is optional on read; an absent field leaves the current value
// alone. Base managers write only the two masks, plates add `type` and
// `connections`.
//
// `EntityStateSync` holds the live adjacency masks and a dirty flag. A scan
// that changes either mask sets the flag; the host takes it once per tick to
// decide whether to push a fresh description to observers.
//
// See also: `scanner.rs` for `AdjacencyState`/`ScanOutcome`, `manager.rs` for
// `BaseManager::description` and `ManagerReplica::on_data_packet`, `plate.rs`
// for the plate fields.

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::scanner::{AdjacencyState, ScanOutcome};

/// Masks only ever use the low six bits.
const MASK_BITS: i32 = 0x3f;

/// Plate behaviour variant. Persisted as the uppercase names existing saves
/// use; an unrecognised name is a read error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlateVariant {
    /// Inventory access always permitted.
    #[default]
    #[serde(rename = "BASIC")]
    Basic,
    /// Inventory access only while at least one computer is connected.
    #[serde(rename = "COMPUTER", alias = "GATED")]
    Gated,
}

/// Save/sync snapshot of one manager.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerRecord {
    #[serde(
        rename = "computerConnections",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub computer_connections: Option<i32>,

    #[serde(
        rename = "chestConnections",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub chest_connections: Option<i32>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub plate_type: Option<PlateVariant>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<i32>,
}

impl ManagerRecord {
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Live adjacency masks plus the "push a new description" flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityStateSync {
    adjacency: AdjacencyState,
    dirty: bool,
}

impl EntityStateSync {
    pub fn adjacency(&self) -> AdjacencyState {
        self.adjacency
    }

    /// Store a scan result. Returns `outcome.changed`, and marks the state
    /// dirty when it is true.
    pub fn apply_scan(&mut self, outcome: ScanOutcome) -> bool {
        self.adjacency = outcome.state;
        if outcome.changed {
            self.dirty = true;
        }
        outcome.changed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn write_record(&self, record: &mut ManagerRecord) {
        record.computer_connections = Some(i32::from(self.adjacency.computer_mask));
        record.chest_connections = Some(i32::from(self.adjacency.inventory_mask));
    }

    /// Restore whichever masks `record` carries.
    pub fn read_record(&mut self, record: &ManagerRecord) {
        if let Some(mask) = record.computer_connections {
            self.adjacency.computer_mask = mask_from_record(mask);
        }
        if let Some(mask) = record.chest_connections {
            self.adjacency.inventory_mask = mask_from_record(mask);
        }
    }
}

fn mask_from_record(mask: i32) -> u8 {
    u8::try_from(mask & MASK_BITS).unwrap_or_default()
}
