//! Dead code elimination.

use crate::block::Block;

/// Remove instructions whose results are unused and which have no side
/// effects. Instructions are visited in reverse order, since removing one
/// can strip the last use of an earlier one.
pub fn dead_code_elimination(block: &mut Block) {
    let insts: Vec<_> = block.iter().collect();
    for &inst in insts.iter().rev() {
        if !block[inst].has_uses() && !block[inst].opcode.has_side_effects() {
            block.invalidate(inst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{A32Reg, Block, LocationDescriptor, Opcode, Value};

    #[test]
    fn removes_unused_chains_but_keeps_side_effects() {
        let mut block = Block::new(LocationDescriptor::new(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::A32Reg(A32Reg::R0)]);
        let add = block.append(Opcode::Add32, &[Value::Inst(get), Value::U32(1), Value::U1(false)]);
        let _unused =
            block.append(Opcode::Add32, &[Value::Inst(add), Value::U32(2), Value::U1(false)]);
        block.append(Opcode::A32SetRegister, &[Value::A32Reg(A32Reg::R1), Value::Inst(add)]);

        dead_code_elimination(&mut block);

        let live: Vec<_> = block.iter().map(|i| block[i].opcode).collect();
        assert_eq!(
            live,
            vec![Opcode::A32GetRegister, Opcode::Add32, Opcode::A32SetRegister]
        );
    }

    #[test]
    fn is_idempotent() {
        let mut block = Block::new(LocationDescriptor::new(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::A32Reg(A32Reg::R0)]);
        block.append(Opcode::Not32, &[Value::Inst(get)]);

        dead_code_elimination(&mut block);
        let after_once: Vec<_> = block.iter().collect();
        dead_code_elimination(&mut block);
        let after_twice: Vec<_> = block.iter().collect();
        assert_eq!(after_once, after_twice);
        assert!(after_once.is_empty());
    }
}
