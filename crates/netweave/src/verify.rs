//! # Stack Verification
//!
//! Abstract interpretation of a method body over its control-flow graph.
//!
//! ## Invariants
//! - Every branch target exists in the body.
//! - Evaluation-stack depth never goes negative.
//! - Depth agrees at every merge point.
//! - `ret` leaves exactly the return arity on the stack.
//! - Control never runs off the end of the body.
//! - Argument and local slots are in range.

use std::collections::HashMap;

use crate::error::Error;
use crate::error::Result;
use crate::il::OpCode;
use crate::il::TypeRef;
use crate::module::MethodDef;

/// Verifies `method`. Methods without a body trivially pass.
pub fn verify(owner: &str, method: &MethodDef) -> Result<()> {
    let Some(body) = &method.body else {
        return Ok(());
    };
    let name = format!("{}::{}", owner, method.name);
    let fail = |at: usize, details: String| Error::UnbalancedStack { method: name.clone(), at, details };

    let instrs = &body.instructions;
    if instrs.is_empty() {
        return Err(fail(0, "empty body".into()));
    }
    let index: HashMap<_, _> = instrs.iter().enumerate().map(|(i, instr)| (instr.id, i)).collect();
    let ret_arity = usize::from(method.ret != TypeRef::Void);
    let arg_count = method.arg_count();

    let mut depth: Vec<Option<usize>> = vec![None; instrs.len()];
    let mut work = vec![(0usize, 0usize)];

    while let Some((at, incoming)) = work.pop() {
        match depth[at] {
            Some(known) if known == incoming => continue,
            Some(known) => {
                return Err(fail(at, format!("stack depth {} here, {} on another path", known, incoming)));
            }
            None => depth[at] = Some(incoming),
        }

        let op = &instrs[at].op;
        match op {
            OpCode::LdArg(i) | OpCode::StArg(i) if usize::from(*i) >= arg_count => {
                return Err(fail(at, format!("argument {} out of range", i)));
            }
            OpCode::LdLoc(i) | OpCode::StLoc(i) if usize::from(*i) >= body.locals.len() => {
                return Err(fail(at, format!("local {} out of range", i)));
            }
            _ => {}
        }

        if *op == OpCode::Ret {
            if incoming != ret_arity {
                return Err(fail(at, format!("ret with stack depth {}, expected {}", incoming, ret_arity)));
            }
            continue;
        }

        let (pops, pushes) = op.stack_effect();
        if incoming < pops {
            return Err(fail(at, format!("{} needs {} values, stack has {}", op.mnemonic(), pops, incoming)));
        }
        let out = incoming - pops + pushes;

        for target in op.targets() {
            let Some(&to) = index.get(&target) else {
                return Err(fail(at, format!("branch to missing {}", target)));
            };
            work.push((to, out));
        }
        if !op.ends_flow() {
            if at + 1 >= instrs.len() {
                return Err(fail(at, "control runs off the end of the body".into()));
            }
            work.push((at + 1, out));
        }
    }
    Ok(())
}
