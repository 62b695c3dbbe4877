// Method dispatch table for remote callers.
//
// Remote callers address methods by index into a fixed, ordered list of
// names: `["size", "read", "move"]`. `Method` is the closed set behind those
// indexes; anything outside it is rejected synchronously with
// `DispatchError::UnknownMethod` before a command is built.
//
// A call never returns a result. `call_method` builds an action that closes
// over the call arguments, submits it to the bus, and returns. Arguments are
// decoded inside the action, so a malformed argument list shows up later as
// a failure envelope like any other domain error; only the selector is
// checked up front.
//
// See also: `ops.rs` for what each method does once drained, `bus.rs` for
// submission, `manager.rs` for `PeripheralHandle::call_method`, the entry
// point remote-caller threads actually use.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::bus::{Action, CommandSubmitter};
use crate::caller::RemoteCaller;
use crate::error::DispatchError;
use crate::inventory::InventoryResolver;
use crate::ops;

/// Method names exposed to remote callers, in selector order.
pub const METHOD_NAMES: [&str; 3] = ["size", "read", "move"];

/// The remote methods, in selector order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Size,
    Read,
    Move,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Size, Method::Read, Method::Move];

    /// Map an external selector to a method.
    pub fn resolve(selector: usize) -> Result<Self, DispatchError> {
        Self::ALL
            .get(selector)
            .copied()
            .ok_or(DispatchError::UnknownMethod { selector })
    }

    pub fn selector(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        METHOD_NAMES[self.selector()]
    }

    /// Build the action for one call. Nothing runs until the bus drains it.
    pub fn build(self, args: Vec<Value>) -> Action {
        match self {
            Method::Size => Box::new(move |ctx: &mut dyn InventoryResolver| ops::size(ctx, &args)),
            Method::Read => Box::new(move |ctx: &mut dyn InventoryResolver| ops::read(ctx, &args)),
            Method::Move => {
                Box::new(move |ctx: &mut dyn InventoryResolver| ops::move_items(ctx, &args))
            }
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validate `selector`, build its action, and queue it for the next drain.
/// Returns as soon as the command is queued; the outcome arrives later as an
/// event addressed to `caller`.
pub fn call_method(
    submitter: &CommandSubmitter,
    caller: Arc<dyn RemoteCaller>,
    selector: usize,
    args: Vec<Value>,
) -> Result<(), DispatchError> {
    let method = Method::resolve(selector)?;
    submitter.submit_boxed(caller, method.build(args));
    Ok(())
}
