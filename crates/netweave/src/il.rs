//! # Instruction Model
//!
//! A small stack-machine instruction set. Method bodies are ordered sequences
//! of [`Instruction`]s; each carries an [`InstrId`] that stays stable when
//! other instructions are inserted around it, so branch targets survive
//! rewriting.

use std::fmt;

/// Static type of a slot, parameter, field or return value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Void,
    Bool,
    I32,
    I64,
    F64,
    String,
    /// The uniform reference type ("any").
    Object,
    /// A class or interface by full name.
    Named(String),
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(full_name: impl Into<String>) -> Self {
        TypeRef::Named(full_name.into())
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// Value types need boxing to become the uniform reference form.
    pub fn is_value_type(&self) -> bool {
        matches!(self, TypeRef::Bool | TypeRef::I32 | TypeRef::I64 | TypeRef::F64)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => f.write_str("void"),
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::I32 => f.write_str("int32"),
            TypeRef::I64 => f.write_str("int64"),
            TypeRef::F64 => f.write_str("float64"),
            TypeRef::String => f.write_str("string"),
            TypeRef::Object => f.write_str("object"),
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

/// A call target with its full signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub declaring_type: String,
    pub name: String,
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
    pub has_this: bool,
}

impl MethodRef {
    /// Evaluation-stack slots consumed by a call.
    pub fn pops(&self) -> usize {
        self.params.len() + usize::from(self.has_this)
    }

    pub fn pushes(&self) -> usize {
        usize::from(self.ret != TypeRef::Void)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}(", self.ret, self.declaring_type, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", p)?;
        }
        f.write_str(")")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub declaring_type: String,
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OpCode {
    Nop,
    LdArg(u16),
    StArg(u16),
    LdLoc(u16),
    StLoc(u16),
    LdcI4(i32),
    LdcI8(i64),
    LdcR8(f64),
    LdStr(String),
    LdNull,
    LdFld(FieldRef),
    StFld(FieldRef),
    Dup,
    Pop,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Ceq,
    Clt,
    Cgt,
    /// Pops two values, pushes their string concatenation.
    Concat,
    /// Pops a value, pushes its string form.
    ToStr,
    Br(InstrId),
    BrTrue(InstrId),
    BrFalse(InstrId),
    Switch(Vec<InstrId>),
    Call(MethodRef),
    CallVirt(MethodRef),
    NewArr(TypeRef),
    StElem,
    LdElem,
    LdLen,
    Box(TypeRef),
    UnboxAny(TypeRef),
    Ret,
}

impl OpCode {
    /// `(pops, pushes)` on the evaluation stack. `Ret` is handled by the
    /// verifier since it depends on the method signature.
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            OpCode::Nop | OpCode::Br(_) | OpCode::Ret => (0, 0),
            OpCode::LdArg(_) | OpCode::LdLoc(_) => (0, 1),
            OpCode::StArg(_) | OpCode::StLoc(_) | OpCode::Pop => (1, 0),
            OpCode::LdcI4(_) | OpCode::LdcI8(_) | OpCode::LdcR8(_) | OpCode::LdStr(_) | OpCode::LdNull => (0, 1),
            OpCode::LdFld(_) => (1, 1),
            OpCode::StFld(_) => (2, 0),
            OpCode::Dup => (1, 2),
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::Ceq
            | OpCode::Clt
            | OpCode::Cgt
            | OpCode::Concat => (2, 1),
            OpCode::Neg | OpCode::ToStr => (1, 1),
            OpCode::BrTrue(_) | OpCode::BrFalse(_) | OpCode::Switch(_) => (1, 0),
            OpCode::Call(m) | OpCode::CallVirt(m) => (m.pops(), m.pushes()),
            OpCode::NewArr(_) => (1, 1),
            OpCode::StElem => (3, 0),
            OpCode::LdElem => (2, 1),
            OpCode::LdLen => (1, 1),
            OpCode::Box(_) | OpCode::UnboxAny(_) => (1, 1),
        }
    }

    /// Branch targets named by this instruction.
    pub fn targets(&self) -> Vec<InstrId> {
        match self {
            OpCode::Br(t) | OpCode::BrTrue(t) | OpCode::BrFalse(t) => vec![*t],
            OpCode::Switch(ts) => ts.clone(),
            _ => Vec::new(),
        }
    }

    /// Control never reaches the next instruction.
    pub fn ends_flow(&self) -> bool {
        matches!(self, OpCode::Br(_) | OpCode::Ret)
    }

    /// Mnemonic, for listings and diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::LdArg(_) => "ldarg",
            OpCode::StArg(_) => "starg",
            OpCode::LdLoc(_) => "ldloc",
            OpCode::StLoc(_) => "stloc",
            OpCode::LdcI4(_) => "ldc.i4",
            OpCode::LdcI8(_) => "ldc.i8",
            OpCode::LdcR8(_) => "ldc.r8",
            OpCode::LdStr(_) => "ldstr",
            OpCode::LdNull => "ldnull",
            OpCode::LdFld(_) => "ldfld",
            OpCode::StFld(_) => "stfld",
            OpCode::Dup => "dup",
            OpCode::Pop => "pop",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Rem => "rem",
            OpCode::Neg => "neg",
            OpCode::Ceq => "ceq",
            OpCode::Clt => "clt",
            OpCode::Cgt => "cgt",
            OpCode::Concat => "concat",
            OpCode::ToStr => "tostr",
            OpCode::Br(_) => "br",
            OpCode::BrTrue(_) => "brtrue",
            OpCode::BrFalse(_) => "brfalse",
            OpCode::Switch(_) => "switch",
            OpCode::Call(_) => "call",
            OpCode::CallVirt(_) => "callvirt",
            OpCode::NewArr(_) => "newarr",
            OpCode::StElem => "stelem.ref",
            OpCode::LdElem => "ldelem.ref",
            OpCode::LdLen => "ldlen",
            OpCode::Box(_) => "box",
            OpCode::UnboxAny(_) => "unbox.any",
            OpCode::Ret => "ret",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub id: InstrId,
    pub op: OpCode,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.op.mnemonic())?;
        match &self.op {
            OpCode::LdArg(i) | OpCode::StArg(i) | OpCode::LdLoc(i) | OpCode::StLoc(i) => write!(f, " {}", i),
            OpCode::LdcI4(v) => write!(f, " {}", v),
            OpCode::LdcI8(v) => write!(f, " {}", v),
            OpCode::LdcR8(v) => write!(f, " {}", v),
            OpCode::LdStr(s) => write!(f, " \"{}\"", s),
            OpCode::LdFld(r) | OpCode::StFld(r) => write!(f, " {}::{}", r.declaring_type, r.name),
            OpCode::Br(t) | OpCode::BrTrue(t) | OpCode::BrFalse(t) => write!(f, " {}", t),
            OpCode::Switch(ts) => {
                let names: Vec<String> = ts.iter().map(ToString::to_string).collect();
                write!(f, " ({})", names.join(", "))
            }
            OpCode::Call(m) | OpCode::CallVirt(m) => write!(f, " {}", m),
            OpCode::NewArr(t) | OpCode::Box(t) | OpCode::UnboxAny(t) => write!(f, " {}", t),
            _ => Ok(()),
        }
    }
}
