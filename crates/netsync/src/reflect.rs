//! # Reflection Contract
//!
//! What the interceptor needs to know about the object it serves: the
//! object's network name, its properties, and its methods with their
//! synchronization annotations. The weaver and the object host agree on the
//! attribute names below.

use crate::error::Result;
use crate::value::Value;

/// Marks a type or method as synchronized. Optional named argument `Name`.
pub const SYNC_ATTRIBUTE: &str = "NetSync.NetSyncAttribute";
/// Excludes a property from weaving.
pub const IGNORE_ATTRIBUTE: &str = "NetSync.NetSyncIgnoreAttribute";
/// Named argument carrying the override name.
pub const NAME_ARGUMENT: &str = "Name";
/// Module that defines the capability type.
pub const CAPABILITY_MODULE: &str = "NetSync";
pub const CAPABILITY_NAMESPACE: &str = "NetSync";
pub const CAPABILITY_NAME: &str = "INetworkInterceptor";
pub const WRITE_VALUE: &str = "WriteValue";
pub const CALL_FUNCTION: &str = "CallFunction";

/// Resolves the network name of a type or method: the override when one is
/// given and non-empty, otherwise the declared name.
pub fn network_name<'a>(declared: &'a str, name_override: Option<&'a str>) -> &'a str {
    match name_override {
        Some(name) if !name.is_empty() => name,
        _ => declared,
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct PropertyId(pub usize);

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct MethodId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub writable: bool,
    pub ignored: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDescriptor {
    pub name: String,
    /// `None`: not synchronized. `Some(None)`: synchronized under its own
    /// name. `Some(Some(n))`: synchronized under `n`.
    pub sync: Option<Option<String>>,
    pub arity: usize,
}

impl MethodDescriptor {
    /// The logical name this method replicates under, if synchronized.
    pub fn alias(&self) -> Option<&str> {
        self.sync.as_ref().map(|name| network_name(&self.name, name.as_deref()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub sync_name: Option<String>,
    pub properties: Vec<PropertyDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    pub fn network_name(&self) -> &str {
        network_name(&self.name, self.sync_name.as_deref())
    }

    pub fn property(&self, name: &str) -> Option<(PropertyId, &PropertyDescriptor)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
            .map(|(i, p)| (PropertyId(i), p))
    }

    pub fn method(&self, id: MethodId) -> Option<&MethodDescriptor> {
        self.methods.get(id.0)
    }
}

/// An object the interceptor can apply inbound changes to.
pub trait Replicated: Send + Sync {
    fn descriptor(&self) -> &TypeDescriptor;
    /// Runs the property's setter. Woven setters publish through the
    /// capability as usual; the interceptor suppresses the echo.
    fn set_property(&self, property: PropertyId, value: Value) -> Result<()>;
    fn invoke(&self, method: MethodId, arguments: &[Value]) -> Result<Value>;
}
