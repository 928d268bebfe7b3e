//! Get/set elimination over the A32 guest state.

use crate::block::{Block, Inst};
use crate::opcode::Opcode;
use crate::reg::{A32ExtReg, A32Reg};
use crate::value::Value;

#[derive(Clone, Copy, Default)]
struct SlotInfo {
    /// Most recent value known to be in the slot.
    value: Option<Value>,
    /// The set instruction that stored it, still eligible for removal.
    last_set: Option<Inst>,
}

impl SlotInfo {
    fn reset(&mut self) {
        *self = SlotInfo::default();
    }
}

/// Forward the most recent `Set` of each register or flag to later `Get`s of
/// the same slot, and drop `Set`s that are overwritten before any observable
/// exit. Extension registers track the overlap between the S and D views:
/// writing either view invalidates tracking for the other.
pub fn a32_get_set_elimination(block: &mut Block) {
    // R0-R14; PC writes go through BXWritePC or SetRegister(PC) and are
    // never forwarded.
    let mut regs = [SlotInfo::default(); 15];
    // One entry per single; doubles alias pairs.
    let mut ext_regs = [SlotInfo::default(); 64];
    let mut n_flag = SlotInfo::default();
    let mut z_flag = SlotInfo::default();
    let mut c_flag = SlotInfo::default();
    let mut v_flag = SlotInfo::default();

    fn do_set(block: &mut Block, info: &mut SlotInfo, value: Value, set_inst: Inst) {
        if let Some(previous) = info.last_set.take() {
            block.invalidate(previous);
        }
        info.value = Some(value);
        info.last_set = Some(set_inst);
    }

    fn do_get(block: &mut Block, info: &mut SlotInfo, get_inst: Inst) {
        match info.value {
            None => info.value = Some(Value::Inst(get_inst)),
            Some(value) => block.replace_uses_with(get_inst, value),
        }
    }

    let insts: Vec<_> = block.iter().collect();
    for inst in insts {
        match block[inst].opcode {
            Opcode::A32SetRegister => {
                let reg = block[inst].args[0].a32_reg();
                if reg == A32Reg::PC {
                    continue;
                }
                let value = block[inst].args[1];
                do_set(block, &mut regs[reg.index()], value, inst);
            }
            Opcode::A32GetRegister => {
                let reg = block[inst].args[0].a32_reg();
                debug_assert!(reg != A32Reg::PC);
                do_get(block, &mut regs[reg.index()], inst);
            }
            Opcode::A32SetExtendedRegister32 => {
                let value = block[inst].args[1];
                match block[inst].args[0].a32_ext_reg() {
                    A32ExtReg::S(n) => {
                        let n = usize::from(n);
                        // A pending D write only partially overlaps; it must
                        // survive this set.
                        let pending_double = ext_regs[n]
                            .last_set
                            .map(|i| block[i].opcode == Opcode::A32SetExtendedRegister64)
                            .unwrap_or(false);
                        if pending_double {
                            ext_regs[n].reset();
                        }
                        do_set(block, &mut ext_regs[n], value, inst);
                        // The overlapping single's tracking is stale now.
                        ext_regs[n ^ 1].reset();
                    }
                    A32ExtReg::D(_) => unreachable!(),
                }
            }
            Opcode::A32GetExtendedRegister32 => {
                let n = block[inst].args[0].a32_ext_reg().number();
                // Only forward when the tracked value is a single; a D write
                // leaves a U64 here.
                match ext_regs[n].value {
                    Some(value) if value.ty(block) == crate::Type::U32 => {
                        do_get(block, &mut ext_regs[n], inst);
                    }
                    Some(_) => {}
                    None => ext_regs[n].value = Some(Value::Inst(inst)),
                }
            }
            Opcode::A32SetExtendedRegister64 => {
                let value = block[inst].args[1];
                match block[inst].args[0].a32_ext_reg() {
                    A32ExtReg::D(n) => {
                        // The D view lives in the even slot; writing it
                        // clobbers both singles, so neither single's pending
                        // set may be removed afterwards.
                        let lo = usize::from(n) * 2;
                        ext_regs[lo].reset();
                        ext_regs[lo + 1].reset();
                        do_set(block, &mut ext_regs[lo], value, inst);
                    }
                    A32ExtReg::S(_) => unreachable!(),
                }
            }
            Opcode::A32GetExtendedRegister64 => {
                let n = block[inst].args[0].a32_ext_reg().number() * 2;
                // Only forward when the tracked value is the full double.
                match ext_regs[n].value {
                    Some(value) if value.ty(block) == crate::Type::U64 => {
                        do_get(block, &mut ext_regs[n], inst);
                    }
                    Some(_) => {}
                    None => ext_regs[n].value = Some(Value::Inst(inst)),
                }
            }
            Opcode::A32SetNFlag => {
                let value = block[inst].args[0];
                do_set(block, &mut n_flag, value, inst);
            }
            Opcode::A32GetNFlag => do_get(block, &mut n_flag, inst),
            Opcode::A32SetZFlag => {
                let value = block[inst].args[0];
                do_set(block, &mut z_flag, value, inst);
            }
            Opcode::A32GetZFlag => do_get(block, &mut z_flag, inst),
            Opcode::A32SetCFlag => {
                let value = block[inst].args[0];
                do_set(block, &mut c_flag, value, inst);
            }
            Opcode::A32GetCFlag => do_get(block, &mut c_flag, inst),
            Opcode::A32SetVFlag => {
                let value = block[inst].args[0];
                do_set(block, &mut v_flag, value, inst);
            }
            Opcode::A32GetVFlag => do_get(block, &mut v_flag, inst),
            Opcode::A32GetCpsr
            | Opcode::A32SetCpsr
            | Opcode::A32SetCpsrNZCVRaw
            | Opcode::ConditionalSelect32
            | Opcode::ConditionalSelect64
            | Opcode::ConditionalSelectNZCV => {
                n_flag.reset();
                z_flag.reset();
                c_flag.reset();
                v_flag.reset();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::dead_code_elimination;
    use crate::{IrEmitter, LocationDescriptor};

    #[test]
    fn forwards_set_to_get() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let v = ir.imm32(7);
        ir.a32_set_register(A32Reg::R0, v);
        let got = ir.a32_get_register(A32Reg::R0);
        ir.a32_set_register(A32Reg::R1, got);

        let mut block = ir.block;
        a32_get_set_elimination(&mut block);
        dead_code_elimination(&mut block);

        // The get disappears; R1's set uses the constant directly.
        let ops: Vec<_> = block.iter().map(|i| block[i].opcode).collect();
        assert_eq!(ops, vec![Opcode::A32SetRegister, Opcode::A32SetRegister]);
        let last = block.iter().last().unwrap();
        assert_eq!(block[last].args[1], Value::U32(7));
    }

    #[test]
    fn drops_overwritten_sets() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let a = ir.imm32(1);
        let b = ir.imm32(2);
        ir.a32_set_register(A32Reg::R0, a);
        ir.a32_set_register(A32Reg::R0, b);

        let mut block = ir.block;
        a32_get_set_elimination(&mut block);

        let sets: Vec<_> = block.iter().collect();
        assert_eq!(sets.len(), 1);
        assert_eq!(block[sets[0]].args[1], Value::U32(2));
    }

    #[test]
    fn double_view_write_blocks_single_forwarding() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let s0 = ir.imm32(10);
        ir.a32_set_ext_reg_32(A32ExtReg::S(0), s0);
        let d0 = ir.imm64(0xDEAD_BEEF_0000_0000);
        ir.a32_set_ext_reg_64(A32ExtReg::D(0), d0);
        let got = ir.a32_get_ext_reg_32(A32ExtReg::S(0));
        ir.a32_set_register(A32Reg::R0, got);

        let mut block = ir.block;
        a32_get_set_elimination(&mut block);

        // The S0 read must survive: its value now comes from the D0 write.
        assert!(block.iter().any(|i| block[i].opcode == Opcode::A32GetExtendedRegister32));
        // And both sets must survive.
        assert!(block.iter().any(|i| block[i].opcode == Opcode::A32SetExtendedRegister32));
        assert!(block.iter().any(|i| block[i].opcode == Opcode::A32SetExtendedRegister64));
    }

    #[test]
    fn flag_forwarding() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let t = ir.imm1(true);
        ir.a32_set_c_flag(t);
        let c = ir.a32_get_c_flag();
        ir.a32_set_n_flag(c);

        let mut block = ir.block;
        a32_get_set_elimination(&mut block);
        dead_code_elimination(&mut block);

        let ops: Vec<_> = block.iter().map(|i| block[i].opcode).collect();
        assert_eq!(ops, vec![Opcode::A32SetCFlag, Opcode::A32SetNFlag]);
        let last = block.iter().last().unwrap();
        assert_eq!(block[last].args[0], Value::U1(true));
    }
}
