// Result envelopes delivered to remote callers.
//
// Every command drained by the bus produces exactly one `CommandResult`,
// which travels as the single argument of the `"invmanager_task"` event. The
// enum shape makes the "exactly one of data/message" rule structural: a
// success carries only `data`, a failure carries only `message`.
//
// Wire shape (what scripts see after value marshaling):
//   {"result": "success", "data": <value>}
//   {"result": "failure", "message": "<text>"}
//
// See also: `bus.rs` for where envelopes are built, `error.rs` for the
// `CommandError` whose text becomes `message`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope status, exposed separately for callers that only branch on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// The structured outcome of one executed command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum CommandResult {
    Success { data: Value },
    Failure { message: String },
}

impl CommandResult {
    pub fn success(data: Value) -> Self {
        Self::Success { data }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Success { .. } => Status::Success,
            Self::Failure { .. } => Status::Failure,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message } => Some(message),
        }
    }

    /// The scripting-value form handed to `RemoteCaller::queue_event`.
    pub fn to_value(&self) -> Value {
        // Tagged enum of a `Value` and a `String` cannot fail to serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
