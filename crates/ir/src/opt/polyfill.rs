//! Replacement of micro-ops the host cannot emit natively.

use crate::block::{Block, Inst};
use crate::opcode::Opcode;
use crate::value::Value;

/// Which host capabilities are available; anything absent gets an IR-level
/// substitute here, so the emitters can assume support.
#[derive(Clone, Copy, Debug)]
pub struct PolyfillOptions {
    /// Host has a native leading-zero count.
    pub lzcnt: bool,
}

impl Default for PolyfillOptions {
    fn default() -> PolyfillOptions {
        PolyfillOptions { lzcnt: true }
    }
}

/// Run the polyfill pass.
pub fn polyfill_pass(block: &mut Block, options: PolyfillOptions) {
    if options.lzcnt {
        return;
    }

    let insts: Vec<_> = block.iter().collect();
    for inst in insts {
        match block[inst].opcode {
            Opcode::CountLeadingZeros32 => polyfill_clz32(block, inst),
            Opcode::CountLeadingZeros64 => polyfill_clz64(block, inst),
            _ => {}
        }
    }
}

/// Branch-free count-leading-zeros: smear the highest set bit rightwards,
/// then count the set bits with the SWAR population count. The replacement
/// sequence is inserted in place of the original instruction.
fn polyfill_clz32(block: &mut Block, inst: Inst) {
    let x = block[inst].args[0];
    let ins = |block: &mut Block, opcode, args: &[Value]| {
        Value::Inst(block.insert_before(inst, opcode, args))
    };

    let mut smear = x;
    for shift in [1u8, 2, 4, 8, 16] {
        let shifted = ins(
            block,
            Opcode::LogicalShiftRight32,
            &[smear, Value::U8(shift), Value::U1(false)],
        );
        smear = ins(block, Opcode::Or32, &[smear, shifted]);
    }

    // SWAR popcount: pairwise, then nibblewise, then a horizontal sum by
    // multiplication.
    let shr1 = ins(block, Opcode::LogicalShiftRight32, &[smear, Value::U8(1), Value::U1(false)]);
    let and1 = ins(block, Opcode::And32, &[shr1, Value::U32(0x5555_5555)]);
    let x1 = ins(block, Opcode::Sub32, &[smear, and1, Value::U1(true)]);

    let lo = ins(block, Opcode::And32, &[x1, Value::U32(0x3333_3333)]);
    let shr2 = ins(block, Opcode::LogicalShiftRight32, &[x1, Value::U8(2), Value::U1(false)]);
    let hi = ins(block, Opcode::And32, &[shr2, Value::U32(0x3333_3333)]);
    let x2 = ins(block, Opcode::Add32, &[lo, hi, Value::U1(false)]);

    let shr4 = ins(block, Opcode::LogicalShiftRight32, &[x2, Value::U8(4), Value::U1(false)]);
    let sum = ins(block, Opcode::Add32, &[x2, shr4, Value::U1(false)]);
    let x3 = ins(block, Opcode::And32, &[sum, Value::U32(0x0F0F_0F0F)]);

    let scaled = ins(block, Opcode::Mul32, &[x3, Value::U32(0x0101_0101)]);
    let ones =
        ins(block, Opcode::LogicalShiftRight32, &[scaled, Value::U8(24), Value::U1(false)]);

    let result = ins(block, Opcode::Sub32, &[Value::U32(32), ones, Value::U1(true)]);
    block.replace_uses_with(inst, result);
}

fn polyfill_clz64(block: &mut Block, inst: Inst) {
    let x = block[inst].args[0];
    let ins = |block: &mut Block, opcode, args: &[Value]| {
        Value::Inst(block.insert_before(inst, opcode, args))
    };

    let mut smear = x;
    for shift in [1u8, 2, 4, 8, 16, 32] {
        let shifted = ins(block, Opcode::LogicalShiftRight64, &[smear, Value::U8(shift)]);
        smear = ins(block, Opcode::Or64, &[smear, shifted]);
    }

    let shr1 = ins(block, Opcode::LogicalShiftRight64, &[smear, Value::U8(1)]);
    let and1 = ins(block, Opcode::And64, &[shr1, Value::U64(0x5555_5555_5555_5555)]);
    let x1 = ins(block, Opcode::Sub64, &[smear, and1, Value::U1(true)]);

    let lo = ins(block, Opcode::And64, &[x1, Value::U64(0x3333_3333_3333_3333)]);
    let shr2 = ins(block, Opcode::LogicalShiftRight64, &[x1, Value::U8(2)]);
    let hi = ins(block, Opcode::And64, &[shr2, Value::U64(0x3333_3333_3333_3333)]);
    let x2 = ins(block, Opcode::Add64, &[lo, hi, Value::U1(false)]);

    let shr4 = ins(block, Opcode::LogicalShiftRight64, &[x2, Value::U8(4)]);
    let sum = ins(block, Opcode::Add64, &[x2, shr4, Value::U1(false)]);
    let x3 = ins(block, Opcode::And64, &[sum, Value::U64(0x0F0F_0F0F_0F0F_0F0F)]);

    let scaled = ins(block, Opcode::Mul64, &[x3, Value::U64(0x0101_0101_0101_0101)]);
    let ones = ins(block, Opcode::LogicalShiftRight64, &[scaled, Value::U8(56)]);

    let result = ins(block, Opcode::Sub64, &[Value::U64(64), ones, Value::U1(true)]);
    block.replace_uses_with(inst, result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::{
        constant_propagation, dead_code_elimination, verification_pass, ConstPropOptions,
    };
    use crate::{A32Reg, IrEmitter, LocationDescriptor, Terminal};

    #[test]
    fn clz_polyfill_computes_the_same_value() {
        for input in [0u32, 1, 0x80, 0xFFFF_FFFF, 0x0001_0000, 0x7FFF_FFFF] {
            let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
            let clz = ir.count_leading_zeros_32(ir.imm32(input));
            ir.a32_set_register(A32Reg::R0, clz);
            ir.set_term(Terminal::ReturnToDispatch);

            let mut block = ir.block;
            polyfill_pass(&mut block, PolyfillOptions { lzcnt: false });
            assert!(!block.iter().any(|i| block[i].opcode == Opcode::CountLeadingZeros32));
            verification_pass(&block);

            // The whole polyfill is foldable, which also proves the
            // substitution exact.
            constant_propagation(&mut block, ConstPropOptions::default());
            dead_code_elimination(&mut block);
            let set = block.iter().next().unwrap();
            assert_eq!(block[set].args[1], Value::U32(input.leading_zeros()));
        }
    }

    #[test]
    fn clz64_polyfill_computes_the_same_value() {
        for input in [0u64, 1, 1 << 63, u64::MAX, 0xDEAD_BEEF] {
            let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
            let clz = ir.count_leading_zeros_64(ir.imm64(input));
            let low = ir.least_significant_word(clz);
            ir.a32_set_register(A32Reg::R0, low);
            ir.set_term(Terminal::ReturnToDispatch);

            let mut block = ir.block;
            polyfill_pass(&mut block, PolyfillOptions { lzcnt: false });
            verification_pass(&block);
            constant_propagation(&mut block, ConstPropOptions::default());
            dead_code_elimination(&mut block);
            let set = block.iter().next().unwrap();
            assert_eq!(block[set].args[1], Value::U32(input.leading_zeros()));
        }
    }
}
