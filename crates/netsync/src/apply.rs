//! Strategies for applying an inbound property value to the owning object.
//!
//! Only writable, non-ignored properties are applied. Ignored properties are
//! never woven, so no peer publishes them.

use std::collections::HashMap;

use crate::error::Error;
use crate::error::Result;
use crate::reflect::PropertyId;
use crate::reflect::Replicated;
use crate::reflect::TypeDescriptor;
use crate::value::Value;

/// How inbound property changes are applied.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ApplyMode {
    /// Resolve the property by name on every change.
    #[default]
    Dynamic,
    /// Resolve every writable property once, at interceptor construction.
    Cached,
}

impl ApplyMode {
    pub fn build(self, descriptor: &TypeDescriptor) -> Box<dyn PropertyApplier> {
        match self {
            ApplyMode::Dynamic => Box::new(DynamicApplier),
            ApplyMode::Cached => Box::new(CachedApplier::new(descriptor)),
        }
    }
}

pub trait PropertyApplier: Send + Sync {
    /// Whether `name` names a property this strategy can set on `owner`.
    fn resolves(&self, owner: &dyn Replicated, name: &str) -> bool;
    fn apply_property(&self, owner: &dyn Replicated, name: &str, value: Value) -> Result<()>;
}

pub struct DynamicApplier;

impl PropertyApplier for DynamicApplier {
    fn resolves(&self, owner: &dyn Replicated, name: &str) -> bool {
        matches!(owner.descriptor().property(name), Some((_, p)) if p.writable && !p.ignored)
    }

    fn apply_property(&self, owner: &dyn Replicated, name: &str, value: Value) -> Result<()> {
        let descriptor = owner.descriptor();
        match descriptor.property(name) {
            Some((id, property)) if property.writable && !property.ignored => owner.set_property(id, value),
            _ => Err(Error::UnknownProperty {
                object: descriptor.network_name().to_string(),
                member: name.to_string(),
            }),
        }
    }
}

type Setter = Box<dyn Fn(&dyn Replicated, Value) -> Result<()> + Send + Sync>;

/// Setter thunks resolved ahead of time.
pub struct CachedApplier {
    object: String,
    setters: HashMap<String, Setter>,
}

impl CachedApplier {
    pub fn new(descriptor: &TypeDescriptor) -> Self {
        let mut setters: HashMap<String, Setter> = HashMap::new();
        for (i, property) in descriptor.properties.iter().enumerate() {
            if !property.writable || property.ignored {
                continue;
            }
            let id = PropertyId(i);
            setters.insert(property.name.clone(), Box::new(move |owner, value| owner.set_property(id, value)));
        }
        Self { object: descriptor.network_name().to_string(), setters }
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }
}

impl PropertyApplier for CachedApplier {
    fn resolves(&self, _owner: &dyn Replicated, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    fn apply_property(&self, owner: &dyn Replicated, name: &str, value: Value) -> Result<()> {
        match self.setters.get(name) {
            Some(setter) => setter(owner, value),
            None => Err(Error::UnknownProperty { object: self.object.clone(), member: name.to_string() }),
        }
    }
}
