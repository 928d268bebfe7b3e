//! Block invariant verification.

use rustc_hash::FxHashMap;

use crate::block::Block;
use crate::opcode::Opcode;
use crate::value::Value;

/// Check the structural invariants of a block, panicking on violation:
///
/// - every operand's type matches the opcode signature;
/// - every referenced instruction is defined earlier in program order;
/// - pseudo operations reference a producer from their allowed set;
/// - recorded use counts equal the actual number of references.
///
/// Debug builds run this after the optimisation pipeline; it is also
/// available to tests.
pub fn verification_pass(block: &Block) {
    let mut actual_uses: FxHashMap<crate::Inst, u32> = FxHashMap::default();
    let mut seen = Vec::new();

    for inst in block.iter() {
        let data = &block[inst];
        let arg_types = data.opcode.arg_types();

        for (index, (&arg, &slot_ty)) in data.args().iter().zip(arg_types).enumerate() {
            let arg_ty = arg.ty(block);
            assert!(
                arg_ty.matches(slot_ty),
                "operand {index} of {} has type {arg_ty}, expected {slot_ty}",
                data.opcode.name(),
            );

            if let Value::Inst(dep) = arg {
                assert!(
                    seen.contains(&dep),
                    "%{} uses %{} before its definition",
                    inst.index(),
                    dep.index(),
                );
                *actual_uses.entry(dep).or_insert(0) += 1;
            }
        }

        match data.opcode {
            Opcode::GetCarryFromOp => check_producer(block, inst, Opcode::may_produce_carry),
            Opcode::GetOverflowFromOp => {
                check_producer(block, inst, Opcode::may_produce_overflow)
            }
            Opcode::GetNZCVFromOp => check_producer(block, inst, Opcode::may_produce_nzcv),
            _ => {}
        }

        seen.push(inst);
    }

    for inst in block.iter() {
        let expected = actual_uses.get(&inst).copied().unwrap_or(0);
        assert_eq!(
            block[inst].use_count,
            expected,
            "%{} records {} uses but has {expected}",
            inst.index(),
            block[inst].use_count,
        );
    }

    assert!(block.has_terminal(), "block has no terminal");
}

fn check_producer(block: &Block, inst: crate::Inst, allowed: impl Fn(Opcode) -> bool) {
    let producer = block[inst].args[0]
        .inst()
        .expect("pseudo operation operand must be an instruction");
    assert!(
        allowed(block[producer].opcode),
        "pseudo operation {} attached to disallowed producer {}",
        block[inst].opcode.name(),
        block[producer].opcode.name(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{A32Reg, IrEmitter, LocationDescriptor, Terminal};

    #[test]
    fn accepts_well_formed_blocks() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let a = ir.a32_get_register(A32Reg::R1);
        let sum = ir.add_32(a, ir.imm32(1));
        let carry = ir.carry_from(sum);
        ir.a32_set_register(A32Reg::R0, sum);
        ir.a32_set_c_flag(carry);
        ir.set_term(Terminal::ReturnToDispatch);

        verification_pass(&ir.block);
    }

    #[test]
    #[should_panic(expected = "expected")]
    fn rejects_type_mismatches() {
        let mut block = Block::new(LocationDescriptor::new(0));
        block.append(Opcode::A32SetRegister, &[Value::A32Reg(A32Reg::R0), Value::U64(1)]);
        block.set_terminal(Terminal::ReturnToDispatch);
        verification_pass(&block);
    }

    #[test]
    #[should_panic(expected = "disallowed producer")]
    fn rejects_bad_pseudo_op_producers(){
        let mut block = Block::new(LocationDescriptor::new(0));
        let not = block.append(Opcode::Not32, &[Value::U32(1)]);
        let carry = block.append(Opcode::GetCarryFromOp, &[Value::Inst(not)]);
        block.append(Opcode::A32SetCFlag, &[Value::Inst(carry)]);
        block.set_terminal(Terminal::ReturnToDispatch);
        verification_pass(&block);
    }

    #[test]
    #[should_panic(expected = "no terminal")]
    fn rejects_missing_terminal() {
        let block = Block::new(LocationDescriptor::new(0));
        verification_pass(&block);
    }
}
