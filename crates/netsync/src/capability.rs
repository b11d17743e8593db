//! # Network Capability
//!
//! The two-operation interface woven code calls into. Woven objects hold a
//! possibly-absent reference to one of these; when it is absent the original
//! member body runs untouched.

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use crate::error::Result;
use crate::value::Value;

/// The network capability.
///
/// `object` is the object's network name, `member` the property name or the
/// method alias.
pub trait NetworkInterceptor: Send + Sync {
    fn write_value(&self, object: &str, member: &str, value: Value) -> Result<()>;
    fn call_function(&self, object: &str, alias: &str, arguments: Vec<Value>) -> Result<()>;
}

/// A capability that forwards to an optional inner capability.
///
/// Useful when the real interceptor is attached after the object is built.
#[derive(Default)]
pub struct InterceptorSlot {
    target: RwLock<Option<Arc<dyn NetworkInterceptor>>>,
}

impl InterceptorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, target: Option<Arc<dyn NetworkInterceptor>>) {
        *self.target.write().unwrap_or_else(PoisonError::into_inner) = target;
    }

    pub fn get(&self) -> Option<Arc<dyn NetworkInterceptor>> {
        self.target.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl NetworkInterceptor for InterceptorSlot {
    fn write_value(&self, object: &str, member: &str, value: Value) -> Result<()> {
        match self.get() {
            Some(target) => target.write_value(object, member, value),
            None => Ok(()),
        }
    }

    fn call_function(&self, object: &str, alias: &str, arguments: Vec<Value>) -> Result<()> {
        match self.get() {
            Some(target) => target.call_function(object, alias, arguments),
            None => Ok(()),
        }
    }
}
