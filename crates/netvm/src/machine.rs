//! # Interpreter
//!
//! Executes method bodies one frame at a time on an operand stack.
//!
//! ## Invariants
//! - `callvirt` on the capability type goes to the attached
//!   [`NetworkInterceptor`](netsync::NetworkInterceptor); every other call
//!   runs a body from the module.
//! - One [`Machine`] counts steps across all frames of a top-level member.
//! - No lock is held across a call, so a capability may re-enter the
//!   instance that called it.

use std::collections::HashMap;

use netsync::reflect;
use netweave::il::InstrId;
use netweave::il::MethodRef;
use netweave::il::OpCode;
use netweave::il::TypeRef;
use netweave::module::MethodBody;
use netweave::module::MethodDef;
use netweave::module::TypeDef;

use crate::error::Error;
use crate::error::Result;
use crate::host::Program;
use crate::slot::ArrayRef;
use crate::slot::Slot;

struct Frame {
    name: String,
    targets: HashMap<InstrId, usize>,
    args: Vec<Slot>,
    locals: Vec<Slot>,
    stack: Vec<Slot>,
    pc: usize,
}

impl Frame {
    fn new(name: String, body: &MethodBody, args: Vec<Slot>) -> Self {
        Self {
            name,
            targets: body.instructions.iter().enumerate().map(|(i, instr)| (instr.id, i)).collect(),
            args,
            locals: body.locals.iter().map(Slot::default_for).collect(),
            stack: Vec::new(),
            pc: 0,
        }
    }

    fn underflow(&self) -> Error {
        Error::StackUnderflow { method: self.name.clone(), at: self.pc }
    }

    fn pop(&mut self) -> Result<Slot> {
        self.stack.pop().ok_or_else(|| self.underflow())
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Slot>> {
        if self.stack.len() < n {
            return Err(self.underflow());
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn push(&mut self, slot: Slot) {
        self.stack.push(slot);
    }

    fn target(&self, id: InstrId) -> Result<usize> {
        self.targets.get(&id).copied().ok_or_else(|| Error::BadBranch { method: self.name.clone(), target: id.0 })
    }

    fn arg(&mut self, index: u16) -> Result<&mut Slot> {
        let name = &self.name;
        self.args.get_mut(usize::from(index)).ok_or_else(|| Error::BadSlot { method: name.clone(), slot: index })
    }

    fn local(&mut self, index: u16) -> Result<&mut Slot> {
        let name = &self.name;
        self.locals.get_mut(usize::from(index)).ok_or_else(|| Error::BadSlot { method: name.clone(), slot: index })
    }
}

pub(crate) struct Machine<'p> {
    program: &'p Program,
    steps: u64,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program, steps: 0 }
    }

    /// Runs `method` of `owner`. `args[0]` is `this` for instance methods.
    pub fn run(&mut self, owner: &str, method: &'p MethodDef, args: Vec<Slot>, depth: usize) -> Result<Slot> {
        if depth > self.program.config.max_depth {
            return Err(Error::CallDepth(self.program.config.max_depth));
        }
        let body = method
            .body
            .as_ref()
            .ok_or_else(|| Error::MissingMethod { ty: owner.to_string(), method: method.name.clone() })?;
        let mut frame = Frame::new(format!("{}::{}", owner, method.name), body, args);

        loop {
            let Some(instr) = body.instructions.get(frame.pc) else {
                return Err(Error::FellThrough { method: frame.name });
            };
            self.steps += 1;
            if self.steps > self.program.config.max_steps {
                return Err(Error::StepLimit(self.program.config.max_steps));
            }
            let mut next = frame.pc + 1;

            match &instr.op {
                OpCode::Nop => {}
                OpCode::LdArg(i) => {
                    let slot = frame.arg(*i)?.clone();
                    frame.push(slot);
                }
                OpCode::StArg(i) => {
                    let value = frame.pop()?;
                    *frame.arg(*i)? = value;
                }
                OpCode::LdLoc(i) => {
                    let slot = frame.local(*i)?.clone();
                    frame.push(slot);
                }
                OpCode::StLoc(i) => {
                    let value = frame.pop()?;
                    *frame.local(*i)? = value;
                }
                OpCode::LdcI4(v) => frame.push(Slot::I32(*v)),
                OpCode::LdcI8(v) => frame.push(Slot::I64(*v)),
                OpCode::LdcR8(v) => frame.push(Slot::F64(*v)),
                OpCode::LdStr(s) => frame.push(Slot::Str(s.clone())),
                OpCode::LdNull => frame.push(Slot::Null),
                OpCode::LdFld(field) => {
                    let object = frame.pop()?;
                    let value = instance(object, "ldfld")?.load(&field.name)?;
                    frame.push(value);
                }
                OpCode::StFld(field) => {
                    let value = frame.pop()?;
                    let object = frame.pop()?;
                    instance(object, "stfld")?.store(&field.name, value)?;
                }
                OpCode::Dup => {
                    let top = frame.pop()?;
                    frame.push(top.clone());
                    frame.push(top);
                }
                OpCode::Pop => {
                    frame.pop()?;
                }
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Rem => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(arithmetic(&instr.op, a, b)?);
                }
                OpCode::Neg => {
                    let value = match frame.pop()? {
                        Slot::I32(i) => Slot::I32(i.wrapping_neg()),
                        Slot::I64(i) => Slot::I64(i.wrapping_neg()),
                        Slot::F64(x) => Slot::F64(-x),
                        other => return Err(mismatch("neg", "number", &other)),
                    };
                    frame.push(value);
                }
                OpCode::Ceq | OpCode::Clt | OpCode::Cgt => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(Slot::I32(i32::from(compare(&instr.op, &a, &b)?)));
                }
                OpCode::Concat => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(Slot::Str(format!("{}{}", a, b)));
                }
                OpCode::ToStr => {
                    let value = frame.pop()?;
                    frame.push(Slot::Str(value.to_string()));
                }
                OpCode::Br(target) => next = frame.target(*target)?,
                OpCode::BrTrue(target) => {
                    if frame.pop()?.is_truthy() {
                        next = frame.target(*target)?;
                    }
                }
                OpCode::BrFalse(target) => {
                    if !frame.pop()?.is_truthy() {
                        next = frame.target(*target)?;
                    }
                }
                OpCode::Switch(targets) => {
                    let selector = frame.pop()?;
                    let index = selector.as_i64().ok_or_else(|| mismatch("switch", "int32", &selector))?;
                    if let Some(target) = usize::try_from(index).ok().and_then(|i| targets.get(i)) {
                        next = frame.target(*target)?;
                    }
                }
                OpCode::Call(target) | OpCode::CallVirt(target) => {
                    let args = frame.pop_n(target.pops())?;
                    let result = self.call(target, args, depth)?;
                    if target.ret != TypeRef::Void {
                        frame.push(result);
                    }
                }
                OpCode::NewArr(elem) => {
                    let count = frame.pop()?;
                    let n = count.as_i64().ok_or_else(|| mismatch("newarr", "int32", &count))?;
                    let len = usize::try_from(n).map_err(|_| Error::IndexOutOfRange { index: n, len: 0 })?;
                    frame.push(Slot::Array(ArrayRef::new(vec![Slot::default_for(elem); len])));
                }
                OpCode::StElem => {
                    let value = frame.pop()?;
                    let index = frame.pop()?;
                    let array = frame.pop()?;
                    let i = index.as_i64().ok_or_else(|| mismatch("stelem", "int32", &index))?;
                    array_ref(array, "stelem")?.set(i, value)?;
                }
                OpCode::LdElem => {
                    let index = frame.pop()?;
                    let array = frame.pop()?;
                    let i = index.as_i64().ok_or_else(|| mismatch("ldelem", "int32", &index))?;
                    let value = array_ref(array, "ldelem")?.get(i)?;
                    frame.push(value);
                }
                OpCode::LdLen => {
                    let array = frame.pop()?;
                    let len = array_ref(array, "ldlen")?.len();
                    frame.push(Slot::I32(i32::try_from(len).unwrap_or(i32::MAX)));
                }
                OpCode::Box(_) => {
                    // Slots are already in uniform form.
                    let value = frame.pop()?;
                    frame.push(value);
                }
                OpCode::UnboxAny(ty) => {
                    let value = frame.pop()?;
                    if value.is_null() && ty.is_value_type() {
                        return Err(Error::NullReference { op: "unbox.any" });
                    }
                    frame.push(value.coerce(ty)?);
                }
                OpCode::Ret => {
                    return if method.ret == TypeRef::Void { Ok(Slot::Null) } else { frame.pop() };
                }
            }
            frame.pc = next;
        }
    }

    fn call(&mut self, target: &MethodRef, args: Vec<Slot>, depth: usize) -> Result<Slot> {
        let program = self.program;
        if target.declaring_type == program.config.capability_type {
            capability_call(target, args)?;
            return Ok(Slot::Null);
        }
        if target.has_this && args.first().is_none_or(Slot::is_null) {
            return Err(Error::NullReference { op: "call" });
        }
        let ty = program.type_def(&target.declaring_type)?;
        let callee = resolve(ty, target)
            .ok_or_else(|| Error::MissingMethod { ty: target.declaring_type.clone(), method: target.to_string() })?;
        self.run(&target.declaring_type, callee, args, depth + 1)
    }
}

/// The method of `ty` matching `target` by name, signature and staticness.
fn resolve<'t>(ty: &'t TypeDef, target: &MethodRef) -> Option<&'t MethodDef> {
    ty.methods.iter().find(|m| {
        m.name == target.name
            && m.is_static != target.has_this
            && m.ret == target.ret
            && m.params.len() == target.params.len()
            && m.params.iter().zip(&target.params).all(|(p, t)| p.ty == *t)
    })
}

fn capability_call(target: &MethodRef, args: Vec<Slot>) -> Result<()> {
    let [receiver, object, member, payload] = <[Slot; 4]>::try_from(args).map_err(|args| Error::TypeMismatch {
        op: "callvirt",
        expected: "receiver and three arguments",
        found: format!("{} values", args.len()),
    })?;
    let capability = match receiver {
        Slot::Capability(c) => c,
        Slot::Null => return Err(Error::NullReference { op: "callvirt" }),
        other => return Err(mismatch("callvirt", "capability", &other)),
    };
    let object = object.as_str().ok_or_else(|| mismatch("callvirt", "string", &object))?;
    let member = member.as_str().ok_or_else(|| mismatch("callvirt", "string", &member))?;

    match target.name.as_str() {
        reflect::WRITE_VALUE => capability.write_value(object, member, payload.to_value())?,
        reflect::CALL_FUNCTION => {
            let arguments = match payload {
                Slot::Array(items) => items.snapshot().iter().map(Slot::to_value).collect(),
                Slot::Null => Vec::new(),
                other => return Err(mismatch("callvirt", "array", &other)),
            };
            capability.call_function(object, member, arguments)?
        }
        _ => return Err(Error::MissingMethod { ty: target.declaring_type.clone(), method: target.name.clone() }),
    }
    Ok(())
}

fn instance(slot: Slot, op: &'static str) -> Result<std::sync::Arc<crate::instance::Instance>> {
    match slot {
        Slot::Object(o) => Ok(o),
        Slot::Null => Err(Error::NullReference { op }),
        other => Err(mismatch(op, "object", &other)),
    }
}

fn array_ref(slot: Slot, op: &'static str) -> Result<ArrayRef> {
    match slot {
        Slot::Array(a) => Ok(a),
        Slot::Null => Err(Error::NullReference { op }),
        other => Err(mismatch(op, "array", &other)),
    }
}

fn mismatch(op: &'static str, expected: &'static str, found: &Slot) -> Error {
    Error::TypeMismatch { op, expected, found: found.kind().to_string() }
}

fn arithmetic(op: &OpCode, a: Slot, b: Slot) -> Result<Slot> {
    let name = op.mnemonic();
    match (&a, &b) {
        (Slot::I32(x), Slot::I32(y)) => {
            let (x, y) = (*x, *y);
            if matches!(op, OpCode::Div | OpCode::Rem) && y == 0 {
                return Err(Error::DivideByZero);
            }
            Ok(Slot::I32(match op {
                OpCode::Add => x.wrapping_add(y),
                OpCode::Sub => x.wrapping_sub(y),
                OpCode::Mul => x.wrapping_mul(y),
                OpCode::Div => x.wrapping_div(y),
                _ => x.wrapping_rem(y),
            }))
        }
        (Slot::F64(_), _) | (_, Slot::F64(_)) => {
            let x = a.as_f64().ok_or_else(|| mismatch(name, "number", &a))?;
            let y = b.as_f64().ok_or_else(|| mismatch(name, "number", &b))?;
            Ok(Slot::F64(match op {
                OpCode::Add => x + y,
                OpCode::Sub => x - y,
                OpCode::Mul => x * y,
                OpCode::Div => x / y,
                _ => x % y,
            }))
        }
        _ => {
            let x = a.as_i64().ok_or_else(|| mismatch(name, "number", &a))?;
            let y = b.as_i64().ok_or_else(|| mismatch(name, "number", &b))?;
            if matches!(op, OpCode::Div | OpCode::Rem) && y == 0 {
                return Err(Error::DivideByZero);
            }
            Ok(Slot::I64(match op {
                OpCode::Add => x.wrapping_add(y),
                OpCode::Sub => x.wrapping_sub(y),
                OpCode::Mul => x.wrapping_mul(y),
                OpCode::Div => x.wrapping_div(y),
                _ => x.wrapping_rem(y),
            }))
        }
    }
}

fn compare(op: &OpCode, a: &Slot, b: &Slot) -> Result<bool> {
    if *op == OpCode::Ceq {
        return Ok(a.same(b));
    }
    let ordering = match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => {
            let x = a.as_f64().ok_or_else(|| mismatch(op.mnemonic(), "number", a))?;
            let y = b.as_f64().ok_or_else(|| mismatch(op.mnemonic(), "number", b))?;
            x.partial_cmp(&y)
        }
    };
    Ok(match op {
        OpCode::Clt => ordering == Some(std::cmp::Ordering::Less),
        _ => ordering == Some(std::cmp::Ordering::Greater),
    })
}
