//! Get/set elimination over the A64 guest state.

use crate::block::{Block, Inst};
use crate::opcode::Opcode;
use crate::types::Type;
use crate::value::Value;

#[derive(Clone, Copy, Default)]
struct SlotInfo {
    value: Option<Value>,
    last_set: Option<Inst>,
}

impl SlotInfo {
    fn reset(&mut self) {
        *self = SlotInfo::default();
    }
}

/// Forward sets to gets over X/W registers, SP, the vector registers (S/D/Q
/// views alias) and the NZCV bundle. A narrower view read after a wider
/// write is not forwarded; a wider read after a narrower write is not
/// forwarded either (the upper bits are unknown here).
pub fn a64_get_set_elimination(block: &mut Block) {
    let mut regs = [SlotInfo::default(); 31];
    let mut vecs = [SlotInfo::default(); 32];
    let mut sp = SlotInfo::default();
    let mut nzcv = SlotInfo::default();

    fn do_set(block: &mut Block, info: &mut SlotInfo, value: Value, set_inst: Inst) {
        if let Some(previous) = info.last_set.take() {
            block.invalidate(previous);
        }
        info.value = Some(value);
        info.last_set = Some(set_inst);
    }

    fn do_get(block: &mut Block, info: &mut SlotInfo, get_inst: Inst) {
        let get_ty = block[get_inst].opcode.result_type();
        match info.value {
            None => info.value = Some(Value::Inst(get_inst)),
            Some(value) if value.ty(block) == get_ty => {
                block.replace_uses_with(get_inst, value);
            }
            Some(_) => {
                // Width mismatch: remember the wider of the two views so
                // later same-width gets can still forward.
                let known_ty = info.value.unwrap().ty(block);
                if width_rank(get_ty) > width_rank(known_ty) && info.last_set.is_none() {
                    info.value = Some(Value::Inst(get_inst));
                }
            }
        }
    }

    fn width_rank(ty: Type) -> u32 {
        match ty {
            Type::U32 => 0,
            Type::U64 => 1,
            Type::U128 => 2,
            _ => 0,
        }
    }

    let insts: Vec<_> = block.iter().collect();
    for inst in insts {
        match block[inst].opcode {
            Opcode::A64GetW | Opcode::A64GetX => {
                let index = block[inst].args[0].a64_reg().index();
                do_get(block, &mut regs[index], inst);
            }
            Opcode::A64GetS | Opcode::A64GetD | Opcode::A64GetQ => {
                let index = block[inst].args[0].a64_vec().index();
                do_get(block, &mut vecs[index], inst);
            }
            Opcode::A64GetSP => do_get(block, &mut sp, inst),
            Opcode::A64SetW | Opcode::A64SetX => {
                let index = block[inst].args[0].a64_reg().index();
                let value = block[inst].args[1];
                // A W set zeroes the upper half, so dropping a pending X set
                // in its favour is still correct; the inverse also holds
                // because the whole register is overwritten either way.
                do_set(block, &mut regs[index], value, inst);
            }
            Opcode::A64SetS | Opcode::A64SetD | Opcode::A64SetQ => {
                let index = block[inst].args[0].a64_vec().index();
                let value = block[inst].args[1];
                do_set(block, &mut vecs[index], value, inst);
            }
            Opcode::A64SetSP => {
                let value = block[inst].args[0];
                do_set(block, &mut sp, value, inst);
            }
            Opcode::A64SetNZCV => {
                let value = block[inst].args[0];
                do_set(block, &mut nzcv, value, inst);
            }
            Opcode::A64GetNZCVRaw
            | Opcode::A64SetNZCVRaw
            | Opcode::A64GetCFlag
            | Opcode::ConditionalSelect32
            | Opcode::ConditionalSelect64
            | Opcode::ConditionalSelectNZCV => {
                // Reads of the flag state (or raw writes) end NZCV tracking.
                nzcv.reset();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::dead_code_elimination;
    use crate::{A64Reg, A64Vec, IrEmitter, LocationDescriptor};

    #[test]
    fn forwards_x_set_to_x_get() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let v = ir.imm64(99);
        ir.a64_set_x(A64Reg(3), v);
        let got = ir.a64_get_x(A64Reg(3));
        ir.a64_set_x(A64Reg(4), got);

        let mut block = ir.block;
        a64_get_set_elimination(&mut block);
        dead_code_elimination(&mut block);

        let ops: Vec<_> = block.iter().map(|i| block[i].opcode).collect();
        assert_eq!(ops, vec![Opcode::A64SetX, Opcode::A64SetX]);
    }

    #[test]
    fn does_not_forward_across_width_mismatch() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let v = ir.imm32(7);
        ir.a64_set_w(A64Reg(0), v);
        let got = ir.a64_get_x(A64Reg(0));
        ir.a64_set_x(A64Reg(1), got);

        let mut block = ir.block;
        a64_get_set_elimination(&mut block);

        assert!(block.iter().any(|i| block[i].opcode == Opcode::A64GetX));
    }

    #[test]
    fn vector_views_alias() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let v = ir.imm64(0x4000_0000_0000_0000);
        ir.a64_set_d(A64Vec(0), v);
        let got = ir.a64_get_d(A64Vec(0));
        ir.a64_set_d(A64Vec(1), got);
        let narrow = ir.a64_get_s(A64Vec(0));
        ir.a64_set_s(A64Vec(2), narrow);

        let mut block = ir.block;
        a64_get_set_elimination(&mut block);
        dead_code_elimination(&mut block);

        // The D get forwards; the S get does not.
        assert!(!block.iter().any(|i| block[i].opcode == Opcode::A64GetD));
        assert!(block.iter().any(|i| block[i].opcode == Opcode::A64GetS));
    }
}
