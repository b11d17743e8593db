//! # Capability Definition
//!
//! The interface woven prologues call into. A definition found on the search
//! path must match the built-in shape exactly; when none is found the
//! built-in one is used.

use std::path::PathBuf;

use tracing::debug;

use crate::config::WeaveConfig;
use crate::error::Error;
use crate::error::Result;
use crate::il::MethodRef;
use crate::il::TypeRef;
use crate::module::MethodDef;
use crate::module::ModuleDef;
use crate::module::ParamDef;
use crate::module::TypeDef;
use crate::module::TypeKind;
use crate::resolver::ModuleResolver;

/// Call targets for the two capability operations, plus where the defining
/// module lives when it was found on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct Capability {
    pub type_name: String,
    pub write_value: MethodRef,
    pub call_function: MethodRef,
    pub location: Option<PathBuf>,
}

impl Capability {
    pub fn builtin(config: &WeaveConfig) -> Self {
        let type_name = config.capability_full_name();
        let write_value = MethodRef {
            declaring_type: type_name.clone(),
            name: config.write_value.clone(),
            params: vec![TypeRef::String, TypeRef::String, TypeRef::Object],
            ret: TypeRef::Void,
            has_this: true,
        };
        let call_function = MethodRef {
            declaring_type: type_name.clone(),
            name: config.call_function.clone(),
            params: vec![TypeRef::String, TypeRef::String, TypeRef::array(TypeRef::Object)],
            ret: TypeRef::Void,
            has_this: true,
        };
        Self { type_name, write_value, call_function, location: None }
    }

    /// Locates the capability module through `resolver` and validates it.
    pub fn resolve(config: &WeaveConfig, resolver: &mut ModuleResolver) -> Result<Self> {
        let mut capability = Self::builtin(config);
        let Some((path, module)) = resolver.resolve(&config.capability_module)? else {
            debug!(module = %config.capability_module, "capability module not on search path, using built-in definition");
            return Ok(capability);
        };
        let ty = module.find_type(&capability.type_name).ok_or_else(|| {
            Error::CapabilityMismatch(format!("{} does not define {}", path.display(), capability.type_name))
        })?;
        capability.validate(ty)?;
        capability.location = Some(path);
        Ok(capability)
    }

    /// Checks that `ty` declares both operations with the expected signatures.
    pub fn validate(&self, ty: &TypeDef) -> Result<()> {
        if ty.kind != TypeKind::Interface {
            return Err(Error::CapabilityMismatch(format!("{} is not an interface", self.type_name)));
        }
        for expected in [&self.write_value, &self.call_function] {
            let found = ty
                .methods
                .iter()
                .find(|m| m.name == expected.name)
                .ok_or_else(|| Error::CapabilityMismatch(format!("{} has no {}", self.type_name, expected.name)))?;
            let params: Vec<&TypeRef> = found.params.iter().map(|p| &p.ty).collect();
            let wanted: Vec<&TypeRef> = expected.params.iter().collect();
            if found.is_static || found.ret != expected.ret || params != wanted {
                return Err(Error::CapabilityMismatch(format!(
                    "{}::{} is {}, expected {}",
                    self.type_name,
                    found.name,
                    found.signature(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// A module defining the capability interface, as a host would ship it.
    pub fn module(&self, config: &WeaveConfig) -> ModuleDef {
        let mut ty = TypeDef::new(&config.capability_namespace, &config.capability_name, TypeKind::Interface);
        for (target, last) in [(&self.write_value, "value"), (&self.call_function, "arguments")] {
            let names = ["objectName", "memberName", last];
            ty.methods.push(MethodDef {
                name: target.name.clone(),
                params: target
                    .params
                    .iter()
                    .zip(names)
                    .map(|(ty, name)| ParamDef { name: name.to_string(), ty: ty.clone() })
                    .collect(),
                ret: target.ret.clone(),
                is_static: false,
                attributes: Vec::new(),
                body: None,
            });
        }
        let mut module = ModuleDef::new(&config.capability_module);
        module.types.push(ty);
        module
    }
}
