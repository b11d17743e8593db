//! # Message Model
//!
//! The three shapes that travel over the bus. Pure data.
//!
//! ## Invariants
//! - `local = true`: the change was already applied in this process. It may be
//!   forwarded by a transport but must never be re-applied.
//! - `local = false`: the change arrived from elsewhere and must be applied.

use std::any::Any;
use std::fmt::Debug;

use crate::value::Value;

/// Anything routable over a [`crate::bus::Bus`].
pub trait Message: Any + Send + Sync + Clone + Debug {
    fn is_local(&self) -> bool;
    fn set_local(&mut self, local: bool);
    /// Identity of the object the message addresses.
    fn object_id(&self) -> &str;

    /// Same message, relabelled as arriving from elsewhere.
    fn into_remote(mut self) -> Self {
        self.set_local(false);
        self
    }
}

/// "Member `member_id` of object `object_id` was set to `value`."
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChangeMessage {
    pub object_id: String,
    pub member_id: String,
    pub value: Value,
    pub local: bool,
}

impl PropertyChangeMessage {
    pub fn local(object_id: impl Into<String>, member_id: impl Into<String>, value: Value) -> Self {
        Self { object_id: object_id.into(), member_id: member_id.into(), value, local: true }
    }

    pub fn remote(object_id: impl Into<String>, member_id: impl Into<String>, value: Value) -> Self {
        Self { object_id: object_id.into(), member_id: member_id.into(), value, local: false }
    }
}

/// An invocation to replay under a logical alias.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodCallMessage {
    pub object_id: String,
    pub method_alias: String,
    pub arguments: Vec<Value>,
    pub local: bool,
}

impl MethodCallMessage {
    pub fn local(object_id: impl Into<String>, method_alias: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self { object_id: object_id.into(), method_alias: method_alias.into(), arguments, local: true }
    }

    pub fn remote(object_id: impl Into<String>, method_alias: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self { object_id: object_id.into(), method_alias: method_alias.into(), arguments, local: false }
    }
}

/// A single mutating operation on a named collection member.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberCommandMessage {
    pub object_id: String,
    pub member_id: String,
    pub operation: String,
    pub arguments: Vec<Value>,
    pub local: bool,
}

impl MemberCommandMessage {
    pub fn local(
        object_id: impl Into<String>,
        member_id: impl Into<String>,
        operation: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            member_id: member_id.into(),
            operation: operation.into(),
            arguments,
            local: true,
        }
    }
}

macro_rules! impl_message {
    ($($ty:ty),*) => {
        $(
            impl Message for $ty {
                fn is_local(&self) -> bool { self.local }
                fn set_local(&mut self, local: bool) { self.local = local; }
                fn object_id(&self) -> &str { &self.object_id }
            }
        )*
    };
}

impl_message!(PropertyChangeMessage, MethodCallMessage, MemberCommandMessage);
