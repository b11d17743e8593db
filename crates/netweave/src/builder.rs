//! # Module Builder
//!
//! Fluent construction of [`ModuleDef`]s, for hosts and tests that need
//! modules without an external compiler.
//!
//! Auto-properties get a backing field named `<Name>k__BackingField` and
//! accessors `get_Name` / `set_Name`. Explicit bodies are written as opcode
//! lists whose branch operands are instruction indices.

use netsync::reflect;

use crate::il::FieldRef;
use crate::il::OpCode;
use crate::il::TypeRef;
use crate::module::Attribute;
use crate::module::FieldDef;
use crate::module::MethodBody;
use crate::module::MethodDef;
use crate::module::ModuleDef;
use crate::module::ParamDef;
use crate::module::PropertyDef;
use crate::module::TypeDef;
use crate::module::TypeKind;

pub struct ModuleBuilder {
    module: ModuleDef,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { module: ModuleDef::new(name) }
    }

    pub fn reference(mut self, module: &str) -> Self {
        self.module.add_reference(module);
        self
    }

    pub fn add_type(mut self, ty: TypeBuilder) -> Self {
        self.module.types.push(ty.build_in(None));
        self
    }

    pub fn build(self) -> ModuleDef {
        self.module
    }
}

enum Accessor {
    Missing,
    Auto,
    Body(MethodBody),
}

/// A property and how its accessors are produced.
pub struct PropertyBuilder {
    name: String,
    ty: TypeRef,
    attributes: Vec<Attribute>,
    getter: Accessor,
    setter: Accessor,
}

impl PropertyBuilder {
    /// Backing field plus trivial getter and setter.
    pub fn auto(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty, attributes: Vec::new(), getter: Accessor::Auto, setter: Accessor::Auto }
    }

    /// No accessors until [`getter`](Self::getter) / [`setter`](Self::setter) add them.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty, attributes: Vec::new(), getter: Accessor::Missing, setter: Accessor::Missing }
    }

    pub fn getter(mut self, body: MethodBody) -> Self {
        self.getter = Accessor::Body(body);
        self
    }

    pub fn setter(mut self, body: MethodBody) -> Self {
        self.setter = Accessor::Body(body);
        self
    }

    /// Drops the setter. A backing field is still emitted for auto getters.
    pub fn read_only(mut self) -> Self {
        self.setter = Accessor::Missing;
        self
    }

    pub fn ignore(mut self) -> Self {
        self.attributes.push(Attribute::new(reflect::IGNORE_ATTRIBUTE));
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

pub struct MethodBuilder {
    def: MethodDef,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            def: MethodDef {
                name: name.into(),
                params: Vec::new(),
                ret: TypeRef::Void,
                is_static: false,
                attributes: Vec::new(),
                body: None,
            },
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.def.params.push(ParamDef { name: name.into(), ty });
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.def.ret = ty;
        self
    }

    pub fn is_static(mut self) -> Self {
        self.def.is_static = true;
        self
    }

    /// Synchronized under its own name.
    pub fn sync(mut self) -> Self {
        self.def.attributes.push(Attribute::new(reflect::SYNC_ATTRIBUTE));
        self
    }

    /// Synchronized under `alias`.
    pub fn sync_as(mut self, alias: impl Into<String>) -> Self {
        self.def.attributes.push(Attribute::new(reflect::SYNC_ATTRIBUTE).with_str(reflect::NAME_ARGUMENT, alias));
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.def.attributes.push(attribute);
        self
    }

    pub fn body(mut self, locals: Vec<TypeRef>, ops: Vec<OpCode>) -> Self {
        self.def.body = Some(MethodBody::from_ops(locals, ops));
        self
    }

    pub fn build(self) -> MethodDef {
        self.def
    }
}

pub struct TypeBuilder {
    namespace: String,
    name: String,
    kind: TypeKind,
    attributes: Vec<Attribute>,
    fields: Vec<FieldDef>,
    properties: Vec<PropertyBuilder>,
    methods: Vec<MethodDef>,
    nested: Vec<TypeBuilder>,
}

impl TypeBuilder {
    fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            attributes: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Class)
    }

    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Interface)
    }

    pub fn sync(mut self) -> Self {
        self.attributes.push(Attribute::new(reflect::SYNC_ATTRIBUTE));
        self
    }

    /// Synchronized under the network name `name`.
    pub fn sync_as(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(reflect::SYNC_ATTRIBUTE).with_str(reflect::NAME_ARGUMENT, name));
        self
    }

    pub fn ignore(mut self) -> Self {
        self.attributes.push(Attribute::new(reflect::IGNORE_ATTRIBUTE));
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldDef { name: name.into(), ty });
        self
    }

    pub fn auto_property(self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.property(PropertyBuilder::auto(name, ty))
    }

    /// Auto-property of the well-known capability type.
    pub fn capability_property(self, name: impl Into<String>) -> Self {
        let ty = TypeRef::named(format!("{}.{}", reflect::CAPABILITY_NAMESPACE, reflect::CAPABILITY_NAME));
        self.auto_property(name, ty)
    }

    pub fn property(mut self, property: PropertyBuilder) -> Self {
        self.properties.push(property);
        self
    }

    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method.build());
        self
    }

    pub fn nested(mut self, ty: TypeBuilder) -> Self {
        self.nested.push(ty);
        self
    }

    pub fn build(self) -> TypeDef {
        self.build_in(None)
    }

    fn build_in(self, outer: Option<&str>) -> TypeDef {
        let mut ty = TypeDef::new(self.namespace, self.name, self.kind);
        let full_name = match outer {
            Some(outer) => format!("{}/{}", outer, ty.name),
            None => ty.full_name(),
        };
        ty.attributes = self.attributes;
        ty.fields = self.fields;

        for property in self.properties {
            let field = FieldRef {
                declaring_type: full_name.clone(),
                name: backing_field(&property.name),
                ty: property.ty.clone(),
            };
            let wants_field = matches!(property.getter, Accessor::Auto) || matches!(property.setter, Accessor::Auto);
            if wants_field && ty.field(&field.name).is_none() {
                ty.fields.push(FieldDef { name: field.name.clone(), ty: field.ty.clone() });
            }

            let getter = accessor_body(property.getter, || {
                vec![OpCode::LdArg(0), OpCode::LdFld(field.clone()), OpCode::Ret]
            })
            .map(|body| {
                ty.methods.push(MethodDef {
                    name: format!("get_{}", property.name),
                    params: Vec::new(),
                    ret: property.ty.clone(),
                    is_static: false,
                    attributes: Vec::new(),
                    body: Some(body),
                });
                ty.methods.len() - 1
            });
            let setter = accessor_body(property.setter, || {
                vec![OpCode::LdArg(0), OpCode::LdArg(1), OpCode::StFld(field.clone()), OpCode::Ret]
            })
            .map(|body| {
                ty.methods.push(MethodDef {
                    name: format!("set_{}", property.name),
                    params: vec![ParamDef { name: "value".to_string(), ty: property.ty.clone() }],
                    ret: TypeRef::Void,
                    is_static: false,
                    attributes: Vec::new(),
                    body: Some(body),
                });
                ty.methods.len() - 1
            });

            ty.properties.push(PropertyDef {
                name: property.name,
                ty: property.ty,
                getter,
                setter,
                attributes: property.attributes,
            });
        }

        ty.methods.extend(self.methods);
        ty.nested = self.nested.into_iter().map(|n| n.build_in(Some(&full_name))).collect();
        ty
    }
}

fn accessor_body(accessor: Accessor, auto: impl FnOnce() -> Vec<OpCode>) -> Option<MethodBody> {
    match accessor {
        Accessor::Missing => None,
        Accessor::Auto => Some(MethodBody::from_ops(Vec::new(), auto())),
        Accessor::Body(body) => Some(body),
    }
}

/// Name of the compiler-generated field behind an auto-property.
pub fn backing_field(property: &str) -> String {
    format!("<{}>k__BackingField", property)
}

/// A reference to a field of `declaring_type`, for hand-written bodies.
pub fn field_ref(declaring_type: &str, name: &str, ty: TypeRef) -> FieldRef {
    FieldRef { declaring_type: declaring_type.to_string(), name: name.to_string(), ty }
}
