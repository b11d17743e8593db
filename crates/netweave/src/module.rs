//! # Module Model
//!
//! In-memory form of a compiled module: types with their attributes, fields,
//! properties and methods. Property accessors refer to methods of the same
//! type by index.

use crate::il::InstrId;
use crate::il::Instruction;
use crate::il::OpCode;
use crate::il::TypeRef;

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleDef {
    pub name: String,
    /// Names of modules this one refers to.
    pub references: Vec<String>,
    pub types: Vec<TypeDef>,
}

impl ModuleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), references: Vec::new(), types: Vec::new() }
    }

    pub fn add_reference(&mut self, module: &str) {
        if !self.references.iter().any(|r| r == module) {
            self.references.push(module.to_string());
        }
    }

    /// Finds a top-level or nested type by full name.
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        for ty in &self.types {
            if ty.full_name() == full_name {
                return Some(ty);
            }
            for nested in &ty.nested {
                if nested.nested_full_name(ty) == full_name {
                    return Some(nested);
                }
            }
        }
        None
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    pub attributes: Vec<Attribute>,
    pub fields: Vec<FieldDef>,
    pub properties: Vec<PropertyDef>,
    pub methods: Vec<MethodDef>,
    pub nested: Vec<TypeDef>,
}

impl TypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
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

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() { self.name.clone() } else { format!("{}.{}", self.namespace, self.name) }
    }

    /// Full name of this type when nested inside `outer`.
    pub fn nested_full_name(&self, outer: &TypeDef) -> String {
        format!("{}/{}", outer.full_name(), self.name)
    }

    pub fn is_class(&self) -> bool {
        self.kind == TypeKind::Class
    }

    pub fn attribute(&self, ty: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, ty)
    }

    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub ty: TypeRef,
    pub getter: Option<usize>,
    pub setter: Option<usize>,
    pub attributes: Vec<Attribute>,
}

impl PropertyDef {
    pub fn attribute(&self, ty: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, ty)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub ret: TypeRef,
    pub is_static: bool,
    pub attributes: Vec<Attribute>,
    /// `None` for interface and abstract members.
    pub body: Option<MethodBody>,
}

impl MethodDef {
    pub fn attribute(&self, ty: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, ty)
    }

    /// Argument slots: parameters plus `this` for instance methods.
    pub fn arg_count(&self) -> usize {
        self.params.len() + usize::from(!self.is_static)
    }

    /// Human-readable signature for diagnostics.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
        format!("{} {}({})", self.ret, self.name, params.join(","))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MethodBody {
    pub locals: Vec<TypeRef>,
    pub init_locals: bool,
    pub instructions: Vec<Instruction>,
    next_id: u32,
}

impl MethodBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a body from opcodes. Branch operands must already name the ids
    /// the instructions receive here, which are `0..ops.len()` in order.
    pub fn from_ops(locals: Vec<TypeRef>, ops: Vec<OpCode>) -> Self {
        let mut body = Self { locals, ..Self::default() };
        for op in ops {
            let id = body.fresh_id();
            body.instructions.push(Instruction { id, op });
        }
        body
    }

    pub fn fresh_id(&mut self) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.instructions.iter().position(|i| i.id == id)
    }

    /// Assembles a body whose instruction ids were assigned elsewhere.
    pub(crate) fn from_parts(locals: Vec<TypeRef>, init_locals: bool, instructions: Vec<Instruction>) -> Self {
        let next_id = instructions.iter().map(|i| i.id.0 + 1).max().unwrap_or(0);
        Self { locals, init_locals, instructions, next_id }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    I32(i32),
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamedArg {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    /// Full name of the attribute type.
    pub ty: String,
    pub named_args: Vec<NamedArg>,
}

impl Attribute {
    pub fn new(ty: impl Into<String>) -> Self {
        Self { ty: ty.into(), named_args: Vec::new() }
    }

    pub fn with_str(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named_args.push(NamedArg { name: name.into(), value: AttrValue::Str(value.into()) });
        self
    }

    /// A named string argument. `None` when absent, null or not a string.
    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.named_args.iter().find(|a| a.name == name).and_then(|a| match &a.value {
            AttrValue::Str(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

fn find_attribute<'a>(attributes: &'a [Attribute], ty: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.ty == ty)
}
