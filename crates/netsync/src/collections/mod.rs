//! # Synchronizing Collections
//!
//! Wrappers around native collections that replicate every mutation as a
//! [`MemberCommandMessage`] scoped to `(object, member)`.
//!
//! ## Dual path
//! - Public mutating calls check their preconditions, publish one
//!   `local = true` command when a bus is assigned, then mutate.
//! - Inbound `local = false` commands for the same `(object, member)` mutate
//!   the wrapped collection directly and never publish.
//!
//! Construction does not subscribe. Assign a bus, then [`activate`].
//!
//! [`activate`]: SyncList::activate

mod dictionary;
mod list;
pub mod ops;
mod set;

pub use dictionary::SyncDictionary;
pub use list::SyncList;
pub use set::SyncSet;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::debug;

use crate::bus::Bus;
use crate::bus::BusExt;
use crate::bus::SubscriptionId;
use crate::error::Error;
use crate::error::Result;
use crate::message::MemberCommandMessage;
use crate::value::Dynamic;
use crate::value::Value;

/// Identity, bus and subscription shared by all collection kinds.
struct MemberChannel {
    object_id: String,
    member_id: String,
    bus: Option<Arc<dyn Bus>>,
    subscription: Option<SubscriptionId>,
}

impl MemberChannel {
    fn new(object_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self { object_id: object_id.into(), member_id: member_id.into(), bus: None, subscription: None }
    }

    fn set_bus(&mut self, bus: Option<Arc<dyn Bus>>) {
        self.deactivate();
        self.bus = bus;
    }

    fn publish(&self, operation: &str, arguments: Vec<Value>) -> Result<()> {
        match &self.bus {
            Some(bus) => bus.trigger(MemberCommandMessage::local(
                self.object_id.as_str(),
                self.member_id.as_str(),
                operation,
                arguments,
            )),
            None => Ok(()),
        }
    }

    fn activate(&mut self, apply: impl Fn(&MemberCommandMessage) -> Result<()> + Send + Sync + 'static) -> Result<()> {
        let Some(bus) = self.bus.clone() else {
            return Err(Error::NoBus { object: self.object_id.clone(), member: self.member_id.clone() });
        };
        self.deactivate();

        let object_id = self.object_id.clone();
        let member_id = self.member_id.clone();
        let id = bus.subscribe::<MemberCommandMessage>(move |msg| {
            if msg.local || msg.object_id != object_id || msg.member_id != member_id {
                return Ok(());
            }
            debug!("replaying {}.{} {}", msg.object_id, msg.member_id, msg.operation);
            apply(msg)
        });
        self.subscription = Some(id);
        Ok(())
    }

    fn deactivate(&mut self) {
        if let (Some(bus), Some(id)) = (&self.bus, self.subscription.take()) {
            bus.unsubscribe::<MemberCommandMessage>(id);
        }
    }

    fn is_active(&self) -> bool {
        self.subscription.is_some()
    }
}

impl Drop for MemberChannel {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn lock<T>(target: &Mutex<T>) -> MutexGuard<'_, T> {
    target.lock().unwrap_or_else(PoisonError::into_inner)
}

fn invalid_operation(msg: &MemberCommandMessage) -> Error {
    Error::InvalidOperation {
        object: msg.object_id.clone(),
        member: msg.member_id.clone(),
        operation: msg.operation.clone(),
    }
}

/// Reads and converts argument `index` of an inbound command.
fn arg<T: Dynamic>(msg: &MemberCommandMessage, index: usize) -> Result<T> {
    let Some(value) = msg.arguments.get(index) else {
        return Err(Error::ArgumentMismatch {
            operation: msg.operation.clone(),
            details: format!("expected at least {} arguments, got {}", index + 1, msg.arguments.len()),
        });
    };
    T::from_value(value).ok_or_else(|| Error::ArgumentMismatch {
        operation: msg.operation.clone(),
        details: format!("argument {} has unexpected kind {}", index, value.kind()),
    })
}

fn index_arg(msg: &MemberCommandMessage, position: usize) -> Result<usize> {
    match msg.arguments.get(position).and_then(Value::as_index) {
        Some(index) => Ok(index),
        None => Err(Error::ArgumentMismatch {
            operation: msg.operation.clone(),
            details: format!("argument {} is not a valid index", position),
        }),
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len { Ok(()) } else { Err(Error::IndexOutOfRange { index, len }) }
}
