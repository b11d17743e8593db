//! # Instances
//!
//! A live object of a module type. Fields sit behind one mutex that is only
//! held for a single load or store; member bodies run on a fresh
//! [`Machine`](crate::machine::Machine) per top-level call.
//!
//! Instances implement [`Replicated`], so a `netsync::DefaultInterceptor`
//! can apply inbound changes by running the (woven) setters and methods.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::Weak;

use netsync::MethodId;
use netsync::NetworkInterceptor;
use netsync::PropertyId;
use netsync::Replicated;
use netsync::TypeDescriptor;
use netsync::Value;
use netsync::reflect;
use netsync::reflect::MethodDescriptor;
use netsync::reflect::PropertyDescriptor;
use netweave::il::TypeRef;
use netweave::module::MethodDef;
use netweave::module::TypeDef;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;
use crate::host::Program;
use crate::machine::Machine;
use crate::slot::Slot;

pub struct Instance {
    program: Arc<Program>,
    type_name: String,
    fields: Mutex<HashMap<String, Slot>>,
    descriptor: TypeDescriptor,
    /// Descriptor property index to type property index.
    properties: Vec<usize>,
    this: Weak<Instance>,
}

impl Instance {
    pub(crate) fn new(program: Arc<Program>, type_name: &str) -> Result<Arc<Self>> {
        let ty = program.type_def(type_name)?;
        let fields = ty.fields.iter().map(|f| (f.name.clone(), Slot::default_for(&f.ty))).collect();
        let (descriptor, properties) = describe(ty, &program.config.capability_type);
        debug!("instantiated {} as '{}'", type_name, descriptor.network_name());

        Ok(Arc::new_cyclic(|this| Self {
            type_name: type_name.to_string(),
            fields: Mutex::new(fields),
            descriptor,
            properties,
            this: this.clone(),
            program,
        }))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn type_def(&self) -> Result<&TypeDef> {
        self.program.type_def(&self.type_name)
    }

    fn this(&self) -> Result<Slot> {
        self.this.upgrade().map(Slot::Object).ok_or(Error::NullReference { op: "this" })
    }

    /// Raw field read. Does not run any accessor.
    pub fn load(&self, field: &str) -> Result<Slot> {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields
            .get(field)
            .cloned()
            .ok_or_else(|| Error::MissingField { ty: self.type_name.clone(), field: field.to_string() })
    }

    /// Raw field write. Does not run any accessor.
    pub fn store(&self, field: &str, value: Slot) -> Result<()> {
        let mut fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = fields
            .get_mut(field)
            .ok_or_else(|| Error::MissingField { ty: self.type_name.clone(), field: field.to_string() })?;
        *slot = value;
        Ok(())
    }

    /// A field in uniform form.
    pub fn field(&self, name: &str) -> Result<Value> {
        self.load(name).map(|slot| slot.to_value())
    }

    fn run(&self, method: &MethodDef, mut args: Vec<Slot>) -> Result<Slot> {
        if !method.is_static {
            args.insert(0, self.this()?);
        }
        Machine::new(&self.program).run(&self.type_name, method, args, 0)
    }

    fn accessor(&self, property: &str, setter: bool) -> Result<(&MethodDef, &TypeRef)> {
        let ty = self.type_def()?;
        let prop = ty
            .property(property)
            .ok_or_else(|| Error::MissingProperty { ty: self.type_name.clone(), property: property.to_string() })?;
        let (index, prefix) = if setter { (prop.setter, "set_") } else { (prop.getter, "get_") };
        index
            .and_then(|i| ty.methods.get(i))
            .map(|m| (m, &prop.ty))
            .ok_or_else(|| Error::MissingMethod { ty: self.type_name.clone(), method: format!("{}{}", prefix, property) })
    }

    /// Runs the property's getter.
    pub fn get(&self, property: &str) -> Result<Value> {
        let (getter, _) = self.accessor(property, false)?;
        Ok(self.run(getter, Vec::new())?.to_value())
    }

    /// Runs the property's setter, prologue included.
    pub fn set(&self, property: &str, value: Value) -> Result<()> {
        let (setter, ty) = self.accessor(property, true)?;
        let value = Slot::from_value(value).coerce(ty)?;
        self.run(setter, vec![value]).map(|_| ())
    }

    /// Calls the first instance method named `method` whose parameters
    /// accept `args`.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        let ty = self.type_def()?;
        for candidate in ty.methods.iter().filter(|m| m.name == method && !m.is_static && m.params.len() == args.len()) {
            let Ok(slots) = coerce_args(candidate, args) else {
                continue;
            };
            return Ok(self.run(candidate, slots)?.to_value());
        }
        Err(Error::MissingMethod { ty: self.type_name.clone(), method: method.to_string() })
    }

    fn capability_property(&self) -> Result<String> {
        let capability = TypeRef::named(&self.program.config.capability_type);
        self.type_def()?
            .properties
            .iter()
            .find(|p| p.ty == capability)
            .map(|p| p.name.clone())
            .ok_or_else(|| Error::MissingProperty {
                ty: self.type_name.clone(),
                property: self.program.config.capability_type.clone(),
            })
    }

    /// Stores `capability` through the capability property's setter.
    pub fn attach(&self, capability: Arc<dyn NetworkInterceptor>) -> Result<()> {
        let property = self.capability_property()?;
        let (setter, _) = self.accessor(&property, true)?;
        debug!("attaching capability to {}", self.type_name);
        self.run(setter, vec![Slot::Capability(capability)]).map(|_| ())
    }

    pub fn detach(&self) -> Result<()> {
        let property = self.capability_property()?;
        let (setter, _) = self.accessor(&property, true)?;
        self.run(setter, vec![Slot::Null]).map(|_| ())
    }

    fn host_error(&self, member: &str, e: Error) -> netsync::Error {
        match e {
            Error::Interceptor(inner) => inner,
            other => netsync::Error::Host {
                object: self.descriptor.network_name().to_string(),
                member: member.to_string(),
                details: other.to_string(),
            },
        }
    }
}

impl Replicated for Instance {
    fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    fn set_property(&self, property: PropertyId, value: Value) -> netsync::Result<()> {
        let ty = self.type_def().map_err(|e| self.host_error("", e))?;
        let name = self
            .properties
            .get(property.0)
            .and_then(|&i| ty.properties.get(i))
            .map(|p| p.name.clone())
            .ok_or_else(|| netsync::Error::UnknownProperty {
                object: self.descriptor.network_name().to_string(),
                member: format!("#{}", property.0),
            })?;
        self.set(&name, value).map_err(|e| self.host_error(&name, e))
    }

    fn invoke(&self, method: MethodId, arguments: &[Value]) -> netsync::Result<Value> {
        let ty = self.type_def().map_err(|e| self.host_error("", e))?;
        let Some(def) = ty.methods.get(method.0) else {
            return Err(self.host_error("", Error::MissingMethod { ty: self.type_name.clone(), method: format!("#{}", method.0) }));
        };
        if def.params.len() != arguments.len() {
            return Err(netsync::Error::ArgumentMismatch {
                operation: def.name.clone(),
                details: format!("expected {} arguments, got {}", def.params.len(), arguments.len()),
            });
        }
        let slots = coerce_args(def, arguments).map_err(|e| netsync::Error::ArgumentMismatch {
            operation: def.name.clone(),
            details: e.to_string(),
        })?;
        self.run(def, slots).map(|slot| slot.to_value()).map_err(|e| self.host_error(&def.name, e))
    }
}

fn coerce_args(method: &MethodDef, args: &[Value]) -> Result<Vec<Slot>> {
    method.params.iter().zip(args).map(|(p, v)| Slot::from_value(v.clone()).coerce(&p.ty)).collect()
}

/// Reflection view of `ty`. The capability property is not replicated state
/// and is left out.
fn describe(ty: &TypeDef, capability_type: &str) -> (TypeDescriptor, Vec<usize>) {
    let capability = TypeRef::named(capability_type);
    let mut properties = Vec::new();
    let mut map = Vec::new();
    for (i, p) in ty.properties.iter().enumerate() {
        if p.ty == capability {
            continue;
        }
        properties.push(PropertyDescriptor {
            name: p.name.clone(),
            writable: p.setter.is_some(),
            ignored: p.attribute(reflect::IGNORE_ATTRIBUTE).is_some(),
        });
        map.push(i);
    }
    let methods = ty
        .methods
        .iter()
        .map(|m| MethodDescriptor {
            name: m.name.clone(),
            sync: m
                .attribute(reflect::SYNC_ATTRIBUTE)
                .map(|a| a.str_arg(reflect::NAME_ARGUMENT).map(str::to_string)),
            arity: m.params.len(),
        })
        .collect();
    let descriptor = TypeDescriptor {
        name: ty.name.clone(),
        sync_name: ty
            .attribute(reflect::SYNC_ATTRIBUTE)
            .and_then(|a| a.str_arg(reflect::NAME_ARGUMENT))
            .map(str::to_string),
        properties,
        methods,
    };
    (descriptor, map)
}
