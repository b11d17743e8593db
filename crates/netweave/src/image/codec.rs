//! Module <-> image mapping.
//!
//! Records are lists with fields in declaration order. Enums are variants
//! named after the case. Optional values use the `None` marker.

use std::collections::HashMap;

use super::Decoder;
use super::Encoder;
use super::Error;
use super::MAGIC;
use super::Result;
use super::VERSION;
use crate::il::FieldRef;
use crate::il::InstrId;
use crate::il::Instruction;
use crate::il::MethodRef;
use crate::il::OpCode;
use crate::il::TypeRef;
use crate::module::AttrValue;
use crate::module::Attribute;
use crate::module::FieldDef;
use crate::module::MethodBody;
use crate::module::MethodDef;
use crate::module::ModuleDef;
use crate::module::NamedArg;
use crate::module::ParamDef;
use crate::module::PropertyDef;
use crate::module::TypeDef;
use crate::module::TypeKind;

// ============================================================================
//  ENCODE
// ============================================================================

pub fn encode_module(module: &ModuleDef) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(6);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&VERSION.to_le_bytes());

    let mut enc = Encoder::with_prefix(&header);
    enc.list_begin()?;
    enc.str(&module.name)?;
    enc.list_begin()?;
    for reference in &module.references {
        enc.str(reference)?;
    }
    enc.list_end()?;
    enc.list_begin()?;
    for ty in &module.types {
        write_type(&mut enc, ty)?;
    }
    enc.list_end()?;
    enc.list_end()?;
    enc.into_bytes()
}

fn write_type(enc: &mut Encoder, ty: &TypeDef) -> Result<()> {
    enc.list_begin()?;
    enc.str(&ty.namespace)?;
    enc.str(&ty.name)?;
    enc.u8(match ty.kind {
        TypeKind::Class => 0,
        TypeKind::Interface => 1,
        TypeKind::Struct => 2,
    })?;
    write_attributes(enc, &ty.attributes)?;

    enc.list_begin()?;
    for field in &ty.fields {
        enc.list_begin()?;
        enc.str(&field.name)?;
        write_type_ref(enc, &field.ty)?;
        enc.list_end()?;
    }
    enc.list_end()?;

    enc.list_begin()?;
    for property in &ty.properties {
        enc.list_begin()?;
        enc.str(&property.name)?;
        write_type_ref(enc, &property.ty)?;
        write_accessor(enc, property.getter)?;
        write_accessor(enc, property.setter)?;
        write_attributes(enc, &property.attributes)?;
        enc.list_end()?;
    }
    enc.list_end()?;

    enc.list_begin()?;
    for method in &ty.methods {
        write_method(enc, method)?;
    }
    enc.list_end()?;

    enc.list_begin()?;
    for nested in &ty.nested {
        write_type(enc, nested)?;
    }
    enc.list_end()?;
    enc.list_end()
}

fn write_accessor(enc: &mut Encoder, index: Option<usize>) -> Result<()> {
    match index {
        Some(i) => enc.u32(u32::try_from(i).map_err(|_| Error::BlobTooLarge(i))?),
        None => enc.none(),
    }
}

fn write_attributes(enc: &mut Encoder, attributes: &[Attribute]) -> Result<()> {
    enc.list_begin()?;
    for attribute in attributes {
        enc.list_begin()?;
        enc.str(&attribute.ty)?;
        enc.list_begin()?;
        for arg in &attribute.named_args {
            enc.list_begin()?;
            enc.str(&arg.name)?;
            match &arg.value {
                AttrValue::Null => enc.tag_only("Null")?,
                AttrValue::Bool(b) => {
                    enc.variant_begin("Bool")?;
                    enc.bool(*b)?;
                    enc.variant_end()?;
                }
                AttrValue::I32(v) => {
                    enc.variant_begin("I32")?;
                    enc.s32(*v)?;
                    enc.variant_end()?;
                }
                AttrValue::Str(s) => {
                    enc.variant_begin("Str")?;
                    enc.str(s)?;
                    enc.variant_end()?;
                }
            }
            enc.list_end()?;
        }
        enc.list_end()?;
        enc.list_end()?;
    }
    enc.list_end()
}

fn write_type_ref(enc: &mut Encoder, ty: &TypeRef) -> Result<()> {
    match ty {
        TypeRef::Void => enc.tag_only("Void"),
        TypeRef::Bool => enc.tag_only("Bool"),
        TypeRef::I32 => enc.tag_only("I32"),
        TypeRef::I64 => enc.tag_only("I64"),
        TypeRef::F64 => enc.tag_only("F64"),
        TypeRef::String => enc.tag_only("String"),
        TypeRef::Object => enc.tag_only("Object"),
        TypeRef::Named(name) => {
            enc.variant_begin("Named")?;
            enc.str(name)?;
            enc.variant_end()
        }
        TypeRef::Array(elem) => {
            enc.variant_begin("Array")?;
            write_type_ref(enc, elem)?;
            enc.variant_end()
        }
    }
}

fn write_type_list(enc: &mut Encoder, types: &[TypeRef]) -> Result<()> {
    enc.list_begin()?;
    for ty in types {
        write_type_ref(enc, ty)?;
    }
    enc.list_end()
}

fn write_method(enc: &mut Encoder, method: &MethodDef) -> Result<()> {
    enc.list_begin()?;
    enc.str(&method.name)?;
    enc.list_begin()?;
    for param in &method.params {
        enc.list_begin()?;
        enc.str(&param.name)?;
        write_type_ref(enc, &param.ty)?;
        enc.list_end()?;
    }
    enc.list_end()?;
    write_type_ref(enc, &method.ret)?;
    enc.bool(method.is_static)?;
    write_attributes(enc, &method.attributes)?;
    match &method.body {
        Some(body) => write_body(enc, body)?,
        None => enc.none()?,
    }
    enc.list_end()
}

fn write_body(enc: &mut Encoder, body: &MethodBody) -> Result<()> {
    let index: HashMap<InstrId, u32> = body
        .instructions
        .iter()
        .enumerate()
        .map(|(i, instr)| (instr.id, i as u32))
        .collect();
    let target = |id: &InstrId| index.get(id).copied().ok_or(Error::DanglingBranch(id.0));

    enc.list_begin()?;
    write_type_list(enc, &body.locals)?;
    enc.bool(body.init_locals)?;
    enc.list_begin()?;
    for instr in &body.instructions {
        let op = &instr.op;
        enc.variant_begin(op.mnemonic())?;
        match op {
            OpCode::LdArg(i) | OpCode::StArg(i) | OpCode::LdLoc(i) | OpCode::StLoc(i) => enc.u16(*i)?,
            OpCode::LdcI4(v) => enc.s32(*v)?,
            OpCode::LdcI8(v) => enc.s64(*v)?,
            OpCode::LdcR8(v) => enc.f64(*v)?,
            OpCode::LdStr(s) => enc.str(s)?,
            OpCode::LdFld(f) | OpCode::StFld(f) => write_field_ref(enc, f)?,
            OpCode::Br(t) | OpCode::BrTrue(t) | OpCode::BrFalse(t) => enc.u32(target(t)?)?,
            OpCode::Switch(ts) => {
                enc.list_begin()?;
                for t in ts {
                    enc.u32(target(t)?)?;
                }
                enc.list_end()?;
            }
            OpCode::Call(m) | OpCode::CallVirt(m) => write_method_ref(enc, m)?,
            OpCode::NewArr(t) | OpCode::Box(t) | OpCode::UnboxAny(t) => write_type_ref(enc, t)?,
            _ => enc.unit()?,
        }
        enc.variant_end()?;
    }
    enc.list_end()?;
    enc.list_end()
}

fn write_field_ref(enc: &mut Encoder, field: &FieldRef) -> Result<()> {
    enc.list_begin()?;
    enc.str(&field.declaring_type)?;
    enc.str(&field.name)?;
    write_type_ref(enc, &field.ty)?;
    enc.list_end()
}

fn write_method_ref(enc: &mut Encoder, method: &MethodRef) -> Result<()> {
    enc.list_begin()?;
    enc.str(&method.declaring_type)?;
    enc.str(&method.name)?;
    write_type_list(enc, &method.params)?;
    write_type_ref(enc, &method.ret)?;
    enc.bool(method.has_this)?;
    enc.list_end()
}

// ============================================================================
//  DECODE
// ============================================================================

pub fn decode_module(bytes: &[u8]) -> Result<ModuleDef> {
    if bytes.len() < 6 || &bytes[..4] != MAGIC {
        return Err(Error::BadMagic);
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let mut dec = Decoder::new(&bytes[6..]);
    let mut body = dec.list()?;
    dec.finish()?;

    let mut fields = body.next_item()?.ok_or(Error::UnexpectedEnd)?;
    let name = fields.str()?.to_string();
    let mut fields = body.next_item()?.ok_or(Error::UnexpectedEnd)?;
    let references = fields.list()?.collect_with(|d| Ok(d.str()?.to_string()))?;
    let mut fields = body.next_item()?.ok_or(Error::UnexpectedEnd)?;
    let types = fields.list()?.collect_with(read_type)?;

    Ok(ModuleDef { name, references, types })
}

fn read_type(dec: &mut Decoder) -> Result<TypeDef> {
    let mut it = dec.list()?;
    let namespace = item(&mut it)?.str()?.to_string();
    let name = item(&mut it)?.str()?.to_string();
    let kind = match item(&mut it)?.u8()? {
        0 => TypeKind::Class,
        1 => TypeKind::Interface,
        2 => TypeKind::Struct,
        other => return Err(Error::UnknownVariant { context: "type kind", name: other.to_string() }),
    };
    let attributes = read_attributes(&mut item(&mut it)?)?;
    let fields = item(&mut it)?.list()?.collect_with(|d| {
        let mut it = d.list()?;
        let name = item(&mut it)?.str()?.to_string();
        let ty = read_type_ref(&mut item(&mut it)?)?;
        Ok(FieldDef { name, ty })
    })?;
    let properties = item(&mut it)?.list()?.collect_with(|d| {
        let mut it = d.list()?;
        let name = item(&mut it)?.str()?.to_string();
        let ty = read_type_ref(&mut item(&mut it)?)?;
        let getter = read_accessor(&mut item(&mut it)?)?;
        let setter = read_accessor(&mut item(&mut it)?)?;
        let attributes = read_attributes(&mut item(&mut it)?)?;
        Ok(PropertyDef { name, ty, getter, setter, attributes })
    })?;
    let methods = item(&mut it)?.list()?.collect_with(read_method)?;
    let nested = item(&mut it)?.list()?.collect_with(read_type)?;

    Ok(TypeDef { namespace, name, kind, attributes, fields, properties, methods, nested })
}

fn item<'a>(it: &mut super::ListIter<'a>) -> Result<Decoder<'a>> {
    it.next_item()?.ok_or(Error::UnexpectedEnd)
}

fn read_accessor(dec: &mut Decoder) -> Result<Option<usize>> {
    if dec.none()? {
        return Ok(None);
    }
    Ok(Some(dec.u32()? as usize))
}

fn read_attributes(dec: &mut Decoder) -> Result<Vec<Attribute>> {
    dec.list()?.collect_with(|d| {
        let mut it = d.list()?;
        let ty = item(&mut it)?.str()?.to_string();
        let named_args = item(&mut it)?.list()?.collect_with(|d| {
            let mut it = d.list()?;
            let name = item(&mut it)?.str()?.to_string();
            let (case, mut payload) = item(&mut it)?.variant()?;
            let value = match case {
                "Null" => {
                    payload.unit()?;
                    AttrValue::Null
                }
                "Bool" => AttrValue::Bool(payload.bool()?),
                "I32" => AttrValue::I32(payload.s32()?),
                "Str" => AttrValue::Str(payload.str()?.to_string()),
                other => return Err(Error::UnknownVariant { context: "attribute value", name: other.into() }),
            };
            Ok(NamedArg { name, value })
        })?;
        Ok(Attribute { ty, named_args })
    })
}

fn read_type_ref(dec: &mut Decoder) -> Result<TypeRef> {
    let (case, mut payload) = dec.variant()?;
    let ty = match case {
        "Named" => TypeRef::Named(payload.str()?.to_string()),
        "Array" => TypeRef::Array(Box::new(read_type_ref(&mut payload)?)),
        simple => {
            payload.unit()?;
            match simple {
                "Void" => TypeRef::Void,
                "Bool" => TypeRef::Bool,
                "I32" => TypeRef::I32,
                "I64" => TypeRef::I64,
                "F64" => TypeRef::F64,
                "String" => TypeRef::String,
                "Object" => TypeRef::Object,
                other => return Err(Error::UnknownVariant { context: "type", name: other.into() }),
            }
        }
    };
    payload.finish()?;
    Ok(ty)
}

fn read_type_list(dec: &mut Decoder) -> Result<Vec<TypeRef>> {
    dec.list()?.collect_with(read_type_ref)
}

fn read_method(dec: &mut Decoder) -> Result<MethodDef> {
    let mut it = dec.list()?;
    let name = item(&mut it)?.str()?.to_string();
    let params = item(&mut it)?.list()?.collect_with(|d| {
        let mut it = d.list()?;
        let name = item(&mut it)?.str()?.to_string();
        let ty = read_type_ref(&mut item(&mut it)?)?;
        Ok(ParamDef { name, ty })
    })?;
    let ret = read_type_ref(&mut item(&mut it)?)?;
    let is_static = item(&mut it)?.bool()?;
    let attributes = read_attributes(&mut item(&mut it)?)?;
    let mut body = item(&mut it)?;
    let body = if body.none()? { None } else { Some(read_body(&mut body)?) };

    Ok(MethodDef { name, params, ret, is_static, attributes, body })
}

fn read_body(dec: &mut Decoder) -> Result<MethodBody> {
    let mut it = dec.list()?;
    let locals = read_type_list(&mut item(&mut it)?)?;
    let init_locals = item(&mut it)?.bool()?;
    let ops = item(&mut it)?.list()?.collect_with(read_op)?;

    let count = ops.len() as u32;
    let mut instructions = Vec::with_capacity(ops.len());
    for (i, op) in ops.into_iter().enumerate() {
        if let Some(bad) = op.targets().into_iter().find(|t| t.0 >= count) {
            return Err(Error::DanglingBranch(bad.0));
        }
        instructions.push(Instruction { id: InstrId(i as u32), op });
    }
    Ok(MethodBody::from_parts(locals, init_locals, instructions))
}

fn read_op(dec: &mut Decoder) -> Result<OpCode> {
    let (name, mut p) = dec.variant()?;
    let op = match name {
        "ldarg" => OpCode::LdArg(p.u16()?),
        "starg" => OpCode::StArg(p.u16()?),
        "ldloc" => OpCode::LdLoc(p.u16()?),
        "stloc" => OpCode::StLoc(p.u16()?),
        "ldc.i4" => OpCode::LdcI4(p.s32()?),
        "ldc.i8" => OpCode::LdcI8(p.s64()?),
        "ldc.r8" => OpCode::LdcR8(p.f64()?),
        "ldstr" => OpCode::LdStr(p.str()?.to_string()),
        "ldfld" => OpCode::LdFld(read_field_ref(&mut p)?),
        "stfld" => OpCode::StFld(read_field_ref(&mut p)?),
        "br" => OpCode::Br(InstrId(p.u32()?)),
        "brtrue" => OpCode::BrTrue(InstrId(p.u32()?)),
        "brfalse" => OpCode::BrFalse(InstrId(p.u32()?)),
        "switch" => OpCode::Switch(p.list()?.collect_with(|d| Ok(InstrId(d.u32()?)))?),
        "call" => OpCode::Call(read_method_ref(&mut p)?),
        "callvirt" => OpCode::CallVirt(read_method_ref(&mut p)?),
        "newarr" => OpCode::NewArr(read_type_ref(&mut p)?),
        "box" => OpCode::Box(read_type_ref(&mut p)?),
        "unbox.any" => OpCode::UnboxAny(read_type_ref(&mut p)?),
        simple => {
            p.unit()?;
            match simple {
                "nop" => OpCode::Nop,
                "ldnull" => OpCode::LdNull,
                "dup" => OpCode::Dup,
                "pop" => OpCode::Pop,
                "add" => OpCode::Add,
                "sub" => OpCode::Sub,
                "mul" => OpCode::Mul,
                "div" => OpCode::Div,
                "rem" => OpCode::Rem,
                "neg" => OpCode::Neg,
                "ceq" => OpCode::Ceq,
                "clt" => OpCode::Clt,
                "cgt" => OpCode::Cgt,
                "concat" => OpCode::Concat,
                "tostr" => OpCode::ToStr,
                "stelem.ref" => OpCode::StElem,
                "ldelem.ref" => OpCode::LdElem,
                "ldlen" => OpCode::LdLen,
                "ret" => OpCode::Ret,
                other => return Err(Error::UnknownVariant { context: "opcode", name: other.into() }),
            }
        }
    };
    p.finish()?;
    Ok(op)
}

fn read_field_ref(dec: &mut Decoder) -> Result<FieldRef> {
    let mut it = dec.list()?;
    let declaring_type = item(&mut it)?.str()?.to_string();
    let name = item(&mut it)?.str()?.to_string();
    let ty = read_type_ref(&mut item(&mut it)?)?;
    Ok(FieldRef { declaring_type, name, ty })
}

fn read_method_ref(dec: &mut Decoder) -> Result<MethodRef> {
    let mut it = dec.list()?;
    let declaring_type = item(&mut it)?.str()?.to_string();
    let name = item(&mut it)?.str()?.to_string();
    let params = read_type_list(&mut item(&mut it)?)?;
    let ret = read_type_ref(&mut item(&mut it)?)?;
    let has_this = item(&mut it)?.bool()?;
    Ok(MethodRef { declaring_type, name, params, ret, has_this })
}
