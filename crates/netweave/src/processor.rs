//! Instruction-level editing of a method body.

use crate::il::InstrId;
use crate::il::Instruction;
use crate::il::OpCode;
use crate::il::TypeRef;
use crate::module::MethodBody;

/// Edits one body in place. Inserted instructions get fresh ids; existing
/// instructions keep theirs, so branches into the original code still land
/// where they did.
pub struct BodyEditor<'a> {
    body: &'a mut MethodBody,
}

impl<'a> BodyEditor<'a> {
    pub fn new(body: &'a mut MethodBody) -> Self {
        Self { body }
    }

    pub fn first(&self) -> Option<InstrId> {
        self.body.instructions.first().map(|i| i.id)
    }

    /// Allocates an instruction without placing it. Useful as a forward
    /// branch target.
    pub fn create(&mut self, op: OpCode) -> Instruction {
        Instruction { id: self.body.fresh_id(), op }
    }

    /// Places `instr` immediately before `anchor`. Returns the inserted id,
    /// or `None` if `anchor` is not in the body.
    pub fn insert_before(&mut self, anchor: InstrId, instr: Instruction) -> Option<InstrId> {
        let at = self.body.position(anchor)?;
        let id = instr.id;
        self.body.instructions.insert(at, instr);
        Some(id)
    }

    /// Creates and places an instruction before `anchor`.
    pub fn emit_before(&mut self, anchor: InstrId, op: OpCode) -> Option<InstrId> {
        let instr = self.create(op);
        self.insert_before(anchor, instr)
    }

    /// Adds a local slot and returns its index.
    pub fn add_local(&mut self, ty: TypeRef) -> u16 {
        self.body.locals.push(ty);
        self.body.init_locals = true;
        (self.body.locals.len() - 1) as u16
    }

    pub fn ld_arg(index: u16) -> OpCode {
        OpCode::LdArg(index)
    }

    pub fn ld_loc(index: u16) -> OpCode {
        OpCode::LdLoc(index)
    }

    pub fn st_loc(index: u16) -> OpCode {
        OpCode::StLoc(index)
    }

    pub fn ldc_i4(value: i32) -> OpCode {
        OpCode::LdcI4(value)
    }
}
