//! # Weaving
//!
//! Rewrites every class that carries a capability property so its setters
//! and synchronized methods report themselves before running.
//!
//! ## Prologues
//!
//! Both prologues start with the same guard, inserted before the original
//! first instruction `first`:
//!
//! ```text
//!     ldarg 0
//!     call <capability getter>
//!     dup
//!     brtrue main
//!     pop
//!     br first
//! main:
//!     ...report...
//!     callvirt <capability operation>
//! first:
//!     <original body, unchanged>
//! ```
//!
//! A null capability leaves the stack as it was and jumps straight into the
//! original body, so an object without one behaves exactly as if unwoven.
//!
//! ## Invariants
//! - Instrumentation is additive. Original instructions keep their ids, so
//!   original branches still target what they did.
//! - Every rewritten body passes [`verify`](crate::verify::verify) before
//!   anything is persisted.
//! - A failing type aborts the whole module. Nothing is written back.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use netsync::reflect::network_name;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::capability::Capability;
use crate::config::WeaveConfig;
use crate::error::Error;
use crate::error::Result;
use crate::il::InstrId;
use crate::il::MethodRef;
use crate::il::OpCode;
use crate::il::TypeRef;
use crate::image;
use crate::module::ModuleDef;
use crate::module::TypeDef;
use crate::processor::BodyEditor;
use crate::resolver::ModuleResolver;
use crate::resolver::canonical;
use crate::verify::verify;

/// What was done to one type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WovenType {
    pub type_name: String,
    pub network_name: String,
    /// Properties whose setters got a prologue.
    pub properties: Vec<String>,
    /// `(method, alias)` for every method that got a prologue.
    pub methods: Vec<(String, String)>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WeaveReport {
    pub types: Vec<WovenType>,
}

impl WeaveReport {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn find(&self, type_name: &str) -> Option<&WovenType> {
        self.types.iter().find(|t| t.type_name == type_name)
    }
}

/// Result of [`Weaver::weave_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The target is the weaver or the capability module.
    Refused(PathBuf),
    /// No candidate types. The file was left alone.
    Unchanged,
    /// The file was rewritten.
    Woven(WeaveReport),
}

pub struct Weaver {
    config: WeaveConfig,
}

impl Weaver {
    pub fn new(config: WeaveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    /// Weaves the image at `target` in place, resolving references from
    /// `include_dir` and the configured search directories.
    pub fn weave_file(&self, target: &Path, include_dir: &Path) -> Result<Outcome> {
        let mut resolver = ModuleResolver::new();
        for dir in &self.config.search_dirs {
            resolver.add_search_dir(dir);
        }
        resolver.add_search_dir(include_dir);
        let capability = Capability::resolve(&self.config, &mut resolver)?;

        let target_path = canonical(target);
        let protected = [self.config.self_location.as_deref(), capability.location.as_deref()];
        if protected.into_iter().flatten().any(|p| canonical(p) == target_path) {
            info!(target = %target.display(), "refusing to weave the weaver or the capability module");
            return Ok(Outcome::Refused(target.to_path_buf()));
        }

        let mut module = image::read_file(target)?;
        if module.find_type(&capability.type_name).is_some() {
            info!(target = %target.display(), "module defines the capability type, refusing to weave it");
            return Ok(Outcome::Refused(target.to_path_buf()));
        }

        info!(module = %module.name, "weave begin");
        let report = self.weave_module(&mut module, &capability)?;
        if report.is_empty() {
            info!(module = %module.name, "no synchronized types, leaving module untouched");
            return Ok(Outcome::Unchanged);
        }
        image::write_file(target, &module)?;
        info!(module = %module.name, types = report.types.len(), "weave end");
        Ok(Outcome::Woven(report))
    }

    /// Weaves `module` in memory. On error `module` is left untouched.
    pub fn weave_module(&self, module: &mut ModuleDef, capability: &Capability) -> Result<WeaveReport> {
        let mut work = module.clone();
        let mut report = WeaveReport::default();

        for ty in &mut work.types {
            let outer = ty.full_name();
            if let Some(woven) = self.weave_type(ty, &outer, capability)? {
                report.types.push(woven);
            }
            for nested in &mut ty.nested {
                let full_name = format!("{}/{}", outer, nested.name);
                if let Some(woven) = self.weave_type(nested, &full_name, capability)? {
                    report.types.push(woven);
                }
            }
        }

        if !report.is_empty() {
            work.add_reference(&self.config.capability_module);
            *module = work;
        }
        Ok(report)
    }

    /// Selects and rewrites one type. `Ok(None)` when the type is not a
    /// candidate or is ignored.
    fn weave_type(&self, ty: &mut TypeDef, full_name: &str, capability: &Capability) -> Result<Option<WovenType>> {
        if !ty.is_class() {
            return Ok(None);
        }
        let capability_ty = TypeRef::named(&capability.type_name);
        let slots: Vec<usize> = ty
            .properties
            .iter()
            .enumerate()
            .filter(|(_, p)| p.ty == capability_ty)
            .map(|(i, _)| i)
            .collect();
        let sync = ty.attribute(&self.config.sync_attribute);

        if slots.is_empty() && sync.is_none() {
            return Ok(None);
        }
        if ty.attribute(&self.config.ignore_attribute).is_some() {
            debug!(ty = full_name, "type is ignored");
            return Ok(None);
        }
        let object = network_name(&ty.name, sync.and_then(|a| a.str_arg(&self.config.name_argument))).to_string();

        let slot = match slots.as_slice() {
            [one] => *one,
            [] => return Err(Error::MissingCapability { ty: full_name.to_string() }),
            many => return Err(Error::AmbiguousCapability { ty: full_name.to_string(), count: many.len() }),
        };
        let getter_name = ty.properties[slot]
            .getter
            .and_then(|i| ty.methods.get(i))
            .map(|m| m.name.clone())
            .ok_or_else(|| Error::MissingCapability { ty: full_name.to_string() })?;
        let getter = MethodRef {
            declaring_type: full_name.to_string(),
            name: getter_name,
            params: Vec::new(),
            ret: capability_ty,
            has_this: true,
        };

        info!(ty = full_name, network_name = %object, "injecting");
        let mut woven = WovenType {
            type_name: full_name.to_string(),
            network_name: object.clone(),
            properties: Vec::new(),
            methods: Vec::new(),
        };

        self.weave_setters(ty, full_name, slot, &object, &getter, capability, &mut woven)?;
        self.weave_methods(ty, full_name, &object, &getter, capability, &mut woven)?;

        for method in &ty.methods {
            verify(full_name, method)?;
        }
        Ok(Some(woven))
    }

    #[allow(clippy::too_many_arguments)]
    fn weave_setters(
        &self,
        ty: &mut TypeDef,
        full_name: &str,
        slot: usize,
        object: &str,
        getter: &MethodRef,
        capability: &Capability,
        woven: &mut WovenType,
    ) -> Result<()> {
        let targets: Vec<(String, TypeRef, usize)> = ty
            .properties
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != slot)
            .filter(|(_, p)| p.attribute(&self.config.ignore_attribute).is_none())
            .filter_map(|(_, p)| p.setter.map(|s| (p.name.clone(), p.ty.clone(), s)))
            .collect();

        for (property, property_ty, setter) in targets {
            let Some(method) = ty.methods.get_mut(setter) else {
                return Err(Error::NoBody { ty: full_name.to_string(), method: format!("set_{}", property) });
            };
            if method.is_static {
                warn!(ty = full_name, property = %property, "static setter, skipping");
                continue;
            }
            let method_name = method.name.clone();
            let body = method
                .body
                .as_mut()
                .ok_or_else(|| Error::NoBody { ty: full_name.to_string(), method: method_name.clone() })?;
            debug!(ty = full_name, property = %property, ty_ref = %property_ty, "intercepting setter");

            let mut editor = BodyEditor::new(body);
            let first = editor.first().ok_or_else(|| Error::NoBody { ty: full_name.to_string(), method: method_name })?;
            let main = editor.create(OpCode::LdStr(object.to_string()));
            guard(&mut editor, first, main.id, getter);
            editor.insert_before(first, main);
            for op in [
                OpCode::LdStr(property.clone()),
                BodyEditor::ld_arg(1),
                OpCode::Box(property_ty),
                OpCode::CallVirt(capability.write_value.clone()),
            ] {
                editor.emit_before(first, op);
            }
            woven.properties.push(property);
        }
        Ok(())
    }

    fn weave_methods(
        &self,
        ty: &mut TypeDef,
        full_name: &str,
        object: &str,
        getter: &MethodRef,
        capability: &Capability,
        woven: &mut WovenType,
    ) -> Result<()> {
        let mut aliases: HashMap<String, String> = HashMap::new();

        for method in &mut ty.methods {
            let Some(sync) = method.attribute(&self.config.sync_attribute) else {
                continue;
            };
            let alias = network_name(&method.name, sync.str_arg(&self.config.name_argument)).to_string();
            debug!(ty = full_name, method = %method.name, alias = %alias, "initializing");

            if method.params.len() > self.config.max_parameters {
                return Err(Error::TooManyParameters {
                    method: method.signature(),
                    alias,
                    object: object.to_string(),
                    max: self.config.max_parameters,
                });
            }
            if let Some(previous) = aliases.insert(alias.clone(), method.name.clone()) {
                debug!(ty = full_name, alias = %alias, first = %previous, second = %method.name, "alias collision");
                return Err(Error::DuplicateAlias { object: object.to_string(), alias });
            }
            if method.is_static {
                warn!(ty = full_name, method = %method.name, "static method cannot reach the capability, skipping");
                continue;
            }

            let method_name = method.name.clone();
            let params: Vec<TypeRef> = method.params.iter().map(|p| p.ty.clone()).collect();
            let no_body = || Error::NoBody { ty: full_name.to_string(), method: method_name.clone() };
            let body = method.body.as_mut().ok_or_else(no_body)?;

            let mut editor = BodyEditor::new(body);
            let first = editor.first().ok_or_else(no_body)?;
            let array = editor.add_local(TypeRef::array(TypeRef::Object));

            let main = editor.create(BodyEditor::ldc_i4(params.len() as i32));
            guard(&mut editor, first, main.id, getter);
            editor.insert_before(first, main);
            editor.emit_before(first, OpCode::NewArr(TypeRef::Object));
            editor.emit_before(first, BodyEditor::st_loc(array));
            for (i, param) in params.into_iter().enumerate() {
                for op in [
                    BodyEditor::ld_loc(array),
                    BodyEditor::ldc_i4(i as i32),
                    BodyEditor::ld_arg(i as u16 + 1),
                    OpCode::Box(param),
                    OpCode::StElem,
                ] {
                    editor.emit_before(first, op);
                }
            }
            for op in [
                OpCode::LdStr(object.to_string()),
                OpCode::LdStr(alias.clone()),
                BodyEditor::ld_loc(array),
                OpCode::CallVirt(capability.call_function.clone()),
            ] {
                editor.emit_before(first, op);
            }
            woven.methods.push((method_name, alias));
        }
        Ok(())
    }
}

/// Emits the null-checked capability load before `first`. Control reaches
/// `main` with the capability on the stack, or `first` with nothing pushed.
fn guard(editor: &mut BodyEditor<'_>, first: InstrId, main: InstrId, getter: &MethodRef) {
    for op in [
        BodyEditor::ld_arg(0),
        OpCode::Call(getter.clone()),
        OpCode::Dup,
        OpCode::BrTrue(main),
        OpCode::Pop,
        OpCode::Br(first),
    ] {
        editor.emit_before(first, op);
    }
}
