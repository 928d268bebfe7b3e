//! Constant propagation and folding.

use armjit_fp::{Fpcr, Fpsr, RoundingMode};

use crate::block::{Block, Inst};
use crate::cond::Cond;
use crate::opcode::Opcode;
use crate::value::Value;

/// Context for the pass.
#[derive(Clone, Copy, Default)]
pub struct ConstPropOptions {
    /// FPCR value in force for this block (from the location descriptor).
    /// Floating point folds evaluate under it and are only committed when
    /// they would not have raised any exception, since a folded operation
    /// can no longer accumulate FPSR bits at run time.
    pub fpcr: u32,
}

/// Fold instructions whose operands are compile-time constants, forward
/// identity operations, and resolve the carry/overflow/NZCV pseudo
/// operations of folded producers.
pub fn constant_propagation(block: &mut Block, options: ConstPropOptions) {
    let fpcr = Fpcr::new(options.fpcr);
    let insts: Vec<_> = block.iter().collect();
    for inst in insts {
        // Pseudo operations are handled when their producer folds.
        if block[inst].opcode == Opcode::Void || block[inst].opcode.is_pseudo_operation() {
            continue;
        }
        fold_inst(block, inst, fpcr);
    }
}

fn all_args_immediate(block: &Block, inst: Inst) -> bool {
    block[inst].args().iter().all(|arg| arg.is_immediate())
}

/// Replace a folded producer, resolving any attached pseudo operations.
fn replace_with_flags(
    block: &mut Block,
    inst: Inst,
    result: Value,
    carry: Option<bool>,
    overflow: Option<bool>,
    nzcv_host: Option<u32>,
) {
    if let Some(carry_inst) = block.associated_pseudo_op(inst, Opcode::GetCarryFromOp) {
        if let Some(carry) = carry {
            block.replace_uses_with(carry_inst, Value::U1(carry));
        }
    }
    if let Some(overflow_inst) = block.associated_pseudo_op(inst, Opcode::GetOverflowFromOp) {
        if let Some(overflow) = overflow {
            block.replace_uses_with(overflow_inst, Value::U1(overflow));
        }
    }
    if let Some(nzcv_inst) = block.associated_pseudo_op(inst, Opcode::GetNZCVFromOp) {
        if let Some(nzcv) = nzcv_host {
            // Rewrite the pseudo op into a packed-flag materialisation.
            block[nzcv_inst].opcode = Opcode::NZCVFromPackedFlags;
            block.set_arg(nzcv_inst, 0, Value::U32(nzcv));
        } else {
            return;
        }
    }

    // Any pseudo op that could not be resolved keeps the producer alive.
    if block.associated_pseudo_op(inst, Opcode::GetCarryFromOp).is_some()
        || block.associated_pseudo_op(inst, Opcode::GetOverflowFromOp).is_some()
    {
        return;
    }

    block.replace_uses_with(inst, result);
}

/// ARM packed NZCV (bits 31-28) for a 32-bit result with explicit C and V.
fn nzcv_packed(n: bool, z: bool, c: bool, v: bool) -> u32 {
    u32::from(n) << 31 | u32::from(z) << 30 | u32::from(c) << 29 | u32::from(v) << 28
}

fn fold_inst(block: &mut Block, inst: Inst, fpcr: Fpcr) {
    let opcode = block[inst].opcode;
    match opcode {
        Opcode::A32SetCFlag => {
            // Writing back the flag just read is a no-op.
            let arg = block[inst].args[0];
            if let Some(producer) = arg.inst() {
                if block[producer].opcode == Opcode::A32GetCFlag && block[inst].use_count == 0 {
                    block.invalidate(inst);
                }
            }
        }

        Opcode::LogicalShiftLeft32
        | Opcode::LogicalShiftRight32
        | Opcode::ArithmeticShiftRight32
        | Opcode::RotateRight32 => fold_shift_32(block, inst),

        Opcode::LogicalShiftLeft64
        | Opcode::LogicalShiftRight64
        | Opcode::ArithmeticShiftRight64
        | Opcode::RotateRight64 => fold_shift_64(block, inst),

        Opcode::Add32 | Opcode::Sub32 => fold_add_sub_32(block, inst),
        Opcode::Add64 | Opcode::Sub64 => fold_add_sub_64(block, inst),

        Opcode::And32 | Opcode::Or32 | Opcode::Eor32 => fold_bitwise_32(block, inst),
        Opcode::And64 | Opcode::Or64 | Opcode::Eor64 => fold_bitwise_64(block, inst),

        Opcode::Not32 => {
            if all_args_immediate(block, inst) {
                let value = !block[inst].args[0].u32();
                block.replace_uses_with(inst, Value::U32(value));
            }
        }
        Opcode::Not64 => {
            if all_args_immediate(block, inst) {
                let value = !block[inst].args[0].u64();
                block.replace_uses_with(inst, Value::U64(value));
            }
        }

        Opcode::Mul32 => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u32().wrapping_mul(block[inst].args[1].u32());
                block.replace_uses_with(inst, Value::U32(value));
            }
        }
        Opcode::Mul64 => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u64().wrapping_mul(block[inst].args[1].u64());
                block.replace_uses_with(inst, Value::U64(value));
            }
        }

        Opcode::UnsignedDiv32 => {
            if all_args_immediate(block, inst) {
                let (a, b) = (block[inst].args[0].u32(), block[inst].args[1].u32());
                block.replace_uses_with(inst, Value::U32(a.checked_div(b).unwrap_or(0)));
            }
        }
        Opcode::SignedDiv32 => {
            if all_args_immediate(block, inst) {
                let (a, b) = (block[inst].args[0].u32() as i32, block[inst].args[1].u32() as i32);
                let q = if b == 0 { 0 } else { a.wrapping_div(b) };
                block.replace_uses_with(inst, Value::U32(q as u32));
            }
        }
        Opcode::UnsignedDiv64 => {
            if all_args_immediate(block, inst) {
                let (a, b) = (block[inst].args[0].u64(), block[inst].args[1].u64());
                block.replace_uses_with(inst, Value::U64(a.checked_div(b).unwrap_or(0)));
            }
        }
        Opcode::SignedDiv64 => {
            if all_args_immediate(block, inst) {
                let (a, b) = (block[inst].args[0].u64() as i64, block[inst].args[1].u64() as i64);
                let q = if b == 0 { 0 } else { a.wrapping_div(b) };
                block.replace_uses_with(inst, Value::U64(q as u64));
            }
        }

        Opcode::SignExtendByteToWord => fold_unary_32(block, inst, |v| v as u8 as i8 as i32 as u32),
        Opcode::SignExtendHalfToWord => {
            fold_unary_32(block, inst, |v| v as u16 as i16 as i32 as u32)
        }
        Opcode::ZeroExtendByteToWord => fold_unary_32(block, inst, |v| v & 0xFF),
        Opcode::ZeroExtendHalfToWord => fold_unary_32(block, inst, |v| v & 0xFFFF),
        Opcode::SignExtendWordToLong => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u32() as i32 as i64 as u64;
                block.replace_uses_with(inst, Value::U64(value));
            }
        }
        Opcode::SignExtendByteToLong => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u8() as i8 as i64 as u64;
                block.replace_uses_with(inst, Value::U64(value));
            }
        }
        Opcode::SignExtendHalfToLong => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u16() as i16 as i64 as u64;
                block.replace_uses_with(inst, Value::U64(value));
            }
        }
        Opcode::ZeroExtendWordToLong => {
            if all_args_immediate(block, inst) {
                let value = u64::from(block[inst].args[0].u32());
                block.replace_uses_with(inst, Value::U64(value));
            }
        }

        Opcode::ByteReverseWord => fold_unary_32(block, inst, u32::swap_bytes),
        Opcode::ByteReverseHalf => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u16().swap_bytes();
                block.replace_uses_with(inst, Value::U16(value));
            }
        }
        Opcode::ByteReverseDual => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u64().swap_bytes();
                block.replace_uses_with(inst, Value::U64(value));
            }
        }
        Opcode::CountLeadingZeros32 => fold_unary_32(block, inst, |v| v.leading_zeros()),
        Opcode::CountLeadingZeros64 => {
            if all_args_immediate(block, inst) {
                let value = u64::from(block[inst].args[0].u64().leading_zeros());
                block.replace_uses_with(inst, Value::U64(value));
            }
        }

        Opcode::Pack2x32To1x64 => {
            if all_args_immediate(block, inst) {
                let lo = u64::from(block[inst].args[0].u32());
                let hi = u64::from(block[inst].args[1].u32());
                block.replace_uses_with(inst, Value::U64(hi << 32 | lo));
            }
        }
        Opcode::LeastSignificantWord => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u64() as u32;
                block.replace_uses_with(inst, Value::U32(value));
            }
        }
        Opcode::MostSignificantWord => {
            if all_args_immediate(block, inst) {
                let value = (block[inst].args[0].u64() >> 32) as u32;
                block.replace_uses_with(inst, Value::U32(value));
            }
        }
        Opcode::LeastSignificantHalf => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u32() as u16;
                block.replace_uses_with(inst, Value::U16(value));
            }
        }
        Opcode::LeastSignificantByte => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u32() as u8;
                block.replace_uses_with(inst, Value::U8(value));
            }
        }
        Opcode::MostSignificantBit => fold_unary_to_u1(block, inst, |v| v >> 31 != 0),
        Opcode::IsZero32 => fold_unary_to_u1(block, inst, |v| v == 0),
        Opcode::IsZero64 => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u64() == 0;
                block.replace_uses_with(inst, Value::U1(value));
            }
        }
        Opcode::TestBit => {
            if all_args_immediate(block, inst) {
                let value = block[inst].args[0].u64() >> block[inst].args[1].u8() & 1 != 0;
                block.replace_uses_with(inst, Value::U1(value));
            }
        }

        Opcode::ConditionalSelect32 | Opcode::ConditionalSelect64
        | Opcode::ConditionalSelectNZCV => {
            // AL needs no flags; both arms identical needs no flags either.
            let cond = block[inst].args[0].cond();
            if cond == Cond::AL {
                let then_ = block[inst].args[1];
                block.replace_uses_with(inst, then_);
            } else if block[inst].args[1] == block[inst].args[2] {
                let arm = block[inst].args[1];
                block.replace_uses_with(inst, arm);
            }
        }

        _ => fold_fp(block, inst, fpcr),
    }
}

fn fold_unary_32(block: &mut Block, inst: Inst, f: impl Fn(u32) -> u32) {
    if all_args_immediate(block, inst) {
        let value = f(block[inst].args[0].u32());
        block.replace_uses_with(inst, Value::U32(value));
    }
}

fn fold_unary_to_u1(block: &mut Block, inst: Inst, f: impl Fn(u32) -> bool) {
    if all_args_immediate(block, inst) {
        let value = f(block[inst].args[0].u32());
        block.replace_uses_with(inst, Value::U1(value));
    }
}

/// ARM barrel shifter semantics for the 32-bit shift ops, including the
/// carry-out. The shift amount is a byte: amounts of 32 and up behave as the
/// architecture specifies, not as the host would.
fn shift_32(opcode: Opcode, value: u32, shift: u32, carry_in: bool) -> (u32, bool) {
    match opcode {
        Opcode::LogicalShiftLeft32 => {
            if shift == 0 {
                (value, carry_in)
            } else if shift < 32 {
                (value << shift, value >> (32 - shift) & 1 != 0)
            } else if shift == 32 {
                (0, value & 1 != 0)
            } else {
                (0, false)
            }
        }
        Opcode::LogicalShiftRight32 => {
            if shift == 0 {
                (value, carry_in)
            } else if shift < 32 {
                (value >> shift, value >> (shift - 1) & 1 != 0)
            } else if shift == 32 {
                (0, value >> 31 != 0)
            } else {
                (0, false)
            }
        }
        Opcode::ArithmeticShiftRight32 => {
            if shift == 0 {
                (value, carry_in)
            } else if shift < 32 {
                ((value as i32 >> shift) as u32, value >> (shift - 1) & 1 != 0)
            } else {
                let sign = value >> 31 != 0;
                ((value as i32 >> 31) as u32, sign)
            }
        }
        Opcode::RotateRight32 => {
            if shift == 0 {
                (value, carry_in)
            } else if shift % 32 == 0 {
                (value, value >> 31 != 0)
            } else {
                let result = value.rotate_right(shift % 32);
                (result, result >> 31 != 0)
            }
        }
        _ => unreachable!(),
    }
}

fn fold_shift_32(block: &mut Block, inst: Inst) {
    // When no one wants the carry, drop the carry-in operand so the value
    // operands alone decide foldability and the emitter can use the simple
    // form.
    if block.associated_pseudo_op(inst, Opcode::GetCarryFromOp).is_none() {
        if !block[inst].args[2].is_immediate() {
            block.set_arg(inst, 2, Value::U1(false));
        }

        let shift_amount = block[inst].args[1];
        if shift_amount.is_immediate() && shift_amount.u8() == 0 {
            let value = block[inst].args[0];
            block.replace_uses_with(inst, value);
            return;
        }
    } else {
        let shift_amount = block[inst].args[1];
        if shift_amount.is_immediate() && shift_amount.u8() == 0 {
            let carry_inst = block.associated_pseudo_op(inst, Opcode::GetCarryFromOp).unwrap();
            let carry_in = block[inst].args[2];
            let value = block[inst].args[0];
            block.replace_uses_with(carry_inst, carry_in);
            block.replace_uses_with(inst, value);
            return;
        }
    }

    if all_args_immediate(block, inst) {
        let opcode = block[inst].opcode;
        let value = block[inst].args[0].u32();
        let shift = u32::from(block[inst].args[1].u8());
        let carry_in = block[inst].args[2].u1();
        let (result, carry) = shift_32(opcode, value, shift, carry_in);
        replace_with_flags(block, inst, Value::U32(result), Some(carry), None, None);
    }
}

fn fold_shift_64(block: &mut Block, inst: Inst) {
    if all_args_immediate(block, inst) {
        let value = block[inst].args[0].u64();
        let shift = u32::from(block[inst].args[1].u8());
        let result = match block[inst].opcode {
            Opcode::LogicalShiftLeft64 => {
                if shift >= 64 {
                    0
                } else {
                    value << shift
                }
            }
            Opcode::LogicalShiftRight64 => {
                if shift >= 64 {
                    0
                } else {
                    value >> shift
                }
            }
            Opcode::ArithmeticShiftRight64 => (value as i64 >> shift.min(63)) as u64,
            Opcode::RotateRight64 => value.rotate_right(shift % 64),
            _ => unreachable!(),
        };
        block.replace_uses_with(inst, Value::U64(result));
    }
}

fn fold_add_sub_32(block: &mut Block, inst: Inst) {
    if !all_args_immediate(block, inst) {
        return;
    }

    let a = block[inst].args[0].u32();
    let b = block[inst].args[1].u32();
    let carry_in = block[inst].args[2].u1();

    // Subtraction is addition of the complement with the ARM not-borrow
    // carry convention.
    let b = if block[inst].opcode == Opcode::Sub32 { !b } else { b };
    let wide = u64::from(a) + u64::from(b) + u64::from(carry_in);
    let result = wide as u32;
    let carry = wide >> 32 != 0;
    let overflow = (a ^ result) & (b ^ result) & 0x8000_0000 != 0;
    let nzcv = nzcv_packed(result >> 31 != 0, result == 0, carry, overflow);
    replace_with_flags(block, inst, Value::U32(result), Some(carry), Some(overflow), Some(nzcv));
}

fn fold_add_sub_64(block: &mut Block, inst: Inst) {
    if !all_args_immediate(block, inst) {
        return;
    }

    let a = block[inst].args[0].u64();
    let b = block[inst].args[1].u64();
    let carry_in = block[inst].args[2].u1();

    let b = if block[inst].opcode == Opcode::Sub64 { !b } else { b };
    let wide = u128::from(a) + u128::from(b) + u128::from(carry_in);
    let result = wide as u64;
    let carry = wide >> 64 != 0;
    let overflow = (a ^ result) & (b ^ result) & 0x8000_0000_0000_0000 != 0;
    let nzcv = nzcv_packed(result >> 63 != 0, result == 0, carry, overflow);
    replace_with_flags(block, inst, Value::U64(result), Some(carry), Some(overflow), Some(nzcv));
}

fn fold_bitwise_32(block: &mut Block, inst: Inst) {
    if !all_args_immediate(block, inst) {
        return;
    }

    let a = block[inst].args[0].u32();
    let b = block[inst].args[1].u32();
    let result = match block[inst].opcode {
        Opcode::And32 => a & b,
        Opcode::Or32 => a | b,
        Opcode::Eor32 => a ^ b,
        _ => unreachable!(),
    };
    let nzcv = nzcv_packed(result >> 31 != 0, result == 0, false, false);
    replace_with_flags(block, inst, Value::U32(result), None, None, Some(nzcv));
}

fn fold_bitwise_64(block: &mut Block, inst: Inst) {
    if !all_args_immediate(block, inst) {
        return;
    }

    let a = block[inst].args[0].u64();
    let b = block[inst].args[1].u64();
    let result = match block[inst].opcode {
        Opcode::And64 => a & b,
        Opcode::Or64 => a | b,
        Opcode::Eor64 => a ^ b,
        _ => unreachable!(),
    };
    let nzcv = nzcv_packed(result >> 63 != 0, result == 0, false, false);
    replace_with_flags(block, inst, Value::U64(result), None, None, Some(nzcv));
}

/// Fold floating point operations through the reference library. A fold is
/// committed only when the evaluation raises no exception, since a folded
/// instruction cannot update the cumulative FPSR bits at run time.
fn fold_fp(block: &mut Block, inst: Inst, fpcr: Fpcr) {
    use armjit_fp::op;

    if !all_args_immediate(block, inst) {
        return;
    }

    let mut fpsr = Fpsr::default();
    let args = block[inst].args;

    let result: Option<Value> = match block[inst].opcode {
        Opcode::FPAbs32 => Some(Value::U32(args[0].u32() & 0x7FFF_FFFF)),
        Opcode::FPAbs64 => Some(Value::U64(args[0].u64() & 0x7FFF_FFFF_FFFF_FFFF)),
        Opcode::FPNeg32 => Some(Value::U32(args[0].u32() ^ 0x8000_0000)),
        Opcode::FPNeg64 => Some(Value::U64(args[0].u64() ^ 0x8000_0000_0000_0000)),
        Opcode::FPAdd32 => Some(Value::U32(op::add(args[0].u32(), args[1].u32(), fpcr, &mut fpsr))),
        Opcode::FPAdd64 => Some(Value::U64(op::add(args[0].u64(), args[1].u64(), fpcr, &mut fpsr))),
        Opcode::FPSub32 => Some(Value::U32(op::sub(args[0].u32(), args[1].u32(), fpcr, &mut fpsr))),
        Opcode::FPSub64 => Some(Value::U64(op::sub(args[0].u64(), args[1].u64(), fpcr, &mut fpsr))),
        Opcode::FPMul32 => Some(Value::U32(op::mul(args[0].u32(), args[1].u32(), fpcr, &mut fpsr))),
        Opcode::FPMul64 => Some(Value::U64(op::mul(args[0].u64(), args[1].u64(), fpcr, &mut fpsr))),
        Opcode::FPDiv32 => Some(Value::U32(op::div(args[0].u32(), args[1].u32(), fpcr, &mut fpsr))),
        Opcode::FPDiv64 => Some(Value::U64(op::div(args[0].u64(), args[1].u64(), fpcr, &mut fpsr))),
        Opcode::FPSqrt32 => Some(Value::U32(op::sqrt(args[0].u32(), fpcr, &mut fpsr))),
        Opcode::FPSqrt64 => Some(Value::U64(op::sqrt(args[0].u64(), fpcr, &mut fpsr))),
        Opcode::FPMulAdd32 => Some(Value::U32(op::mul_add(
            args[0].u32(),
            args[1].u32(),
            args[2].u32(),
            fpcr,
            &mut fpsr,
        ))),
        Opcode::FPMulAdd64 => Some(Value::U64(op::mul_add(
            args[0].u64(),
            args[1].u64(),
            args[2].u64(),
            fpcr,
            &mut fpsr,
        ))),
        Opcode::FPSingleToDouble => Some(Value::U64(op::convert::<u64, u32>(
            args[0].u32(),
            fpcr,
            fpcr.rmode(),
            &mut fpsr,
        ))),
        Opcode::FPDoubleToSingle => Some(Value::U32(op::convert::<u32, u64>(
            args[0].u64(),
            fpcr,
            fpcr.rmode(),
            &mut fpsr,
        ))),
        Opcode::FPRecipEstimate32 => {
            Some(Value::U32(op::recip_estimate(args[0].u32(), fpcr, &mut fpsr)))
        }
        Opcode::FPRecipEstimate64 => {
            Some(Value::U64(op::recip_estimate(args[0].u64(), fpcr, &mut fpsr)))
        }
        Opcode::FPRSqrtEstimate32 => {
            Some(Value::U32(op::rsqrt_estimate(args[0].u32(), fpcr, &mut fpsr)))
        }
        Opcode::FPRSqrtEstimate64 => {
            Some(Value::U64(op::rsqrt_estimate(args[0].u64(), fpcr, &mut fpsr)))
        }
        Opcode::FPSingleToFixedS32 => rounding_from_imm(args[2], fpcr).map(|rounding| {
            let v =
                op::to_fixed(args[0].u32(), 32, u32::from(args[1].u8()), false, fpcr, rounding, &mut fpsr);
            Value::U32(v as u32)
        }),
        Opcode::FPSingleToFixedU32 => rounding_from_imm(args[2], fpcr).map(|rounding| {
            let v =
                op::to_fixed(args[0].u32(), 32, u32::from(args[1].u8()), true, fpcr, rounding, &mut fpsr);
            Value::U32(v as u32)
        }),
        Opcode::FPDoubleToFixedS32 => rounding_from_imm(args[2], fpcr).map(|rounding| {
            let v =
                op::to_fixed(args[0].u64(), 32, u32::from(args[1].u8()), false, fpcr, rounding, &mut fpsr);
            Value::U32(v as u32)
        }),
        Opcode::FPDoubleToFixedU32 => rounding_from_imm(args[2], fpcr).map(|rounding| {
            let v =
                op::to_fixed(args[0].u64(), 32, u32::from(args[1].u8()), true, fpcr, rounding, &mut fpsr);
            Value::U32(v as u32)
        }),
        _ => None,
    };

    if let Some(result) = result {
        if fpsr.value() == 0 {
            block.replace_uses_with(inst, result);
        }
    }
}

/// Decode a rounding-mode immediate; `0xFF` defers to the FPCR mode.
fn rounding_from_imm(value: Value, fpcr: Fpcr) -> Option<RoundingMode> {
    match value.u8() {
        0 => Some(RoundingMode::ToNearestTieEven),
        1 => Some(RoundingMode::TowardsPlusInfinity),
        2 => Some(RoundingMode::TowardsMinusInfinity),
        3 => Some(RoundingMode::TowardsZero),
        4 => Some(RoundingMode::ToNearestTieAwayFromZero),
        5 => Some(RoundingMode::ToOdd),
        0xFF => Some(fpcr.rmode()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::dead_code_elimination;
    use crate::{A32Reg, IrEmitter, LocationDescriptor};

    fn run(block: &mut Block) {
        constant_propagation(block, ConstPropOptions::default());
        dead_code_elimination(block);
    }

    #[test]
    fn folds_arithmetic_chains() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let a = ir.imm32(10);
        let b = ir.imm32(32);
        let sum = ir.add_32(a, b);
        let shifted = ir.logical_shift_left_32(sum, ir.imm8(1), ir.imm1(false));
        ir.a32_set_register(A32Reg::R0, shifted);

        let mut block = ir.block;
        run(&mut block);

        let insts: Vec<_> = block.iter().collect();
        assert_eq!(insts.len(), 1);
        assert_eq!(block[insts[0]].args[1], Value::U32(84));
    }

    #[test]
    fn shift_by_zero_forwards_carry_in() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let x = ir.a32_get_register(A32Reg::R1);
        let c = ir.a32_get_c_flag();
        let rc = ir.logical_shift_left_with_carry_32(x, ir.imm8(0), c);
        ir.a32_set_register(A32Reg::R0, rc.result);
        ir.a32_set_c_flag(rc.carry);

        let mut block = ir.block;
        run(&mut block);

        // Neither the shift nor its pseudo op survive; the register and
        // carry flow straight through.
        assert!(!block.iter().any(|i| block[i].opcode == Opcode::LogicalShiftLeft32));
        assert!(!block.iter().any(|i| block[i].opcode == Opcode::GetCarryFromOp));
    }

    #[test]
    fn folds_flags_for_subtraction() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let a = ir.imm32(5);
        let b = ir.imm32(5);
        let result = ir.sub_32(a, b);
        let carry = ir.carry_from(result);
        let overflow = ir.overflow_from(result);
        ir.a32_set_register(A32Reg::R0, result);
        ir.a32_set_c_flag(carry);
        ir.a32_set_v_flag(overflow);

        let mut block = ir.block;
        run(&mut block);

        let sets: Vec<_> = block.iter().collect();
        assert_eq!(sets.len(), 3);
        assert_eq!(block[sets[0]].args[1], Value::U32(0));
        // 5 - 5: no borrow, so ARM carry is set; no overflow.
        assert_eq!(block[sets[1]].args[0], Value::U1(true));
        assert_eq!(block[sets[2]].args[0], Value::U1(false));
    }

    #[test]
    fn fp_folds_only_without_exceptions() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        // 1.5 + 2.5 is exact: folds.
        let exact = ir.fp_add_32(ir.imm32(0x3FC0_0000), ir.imm32(0x4020_0000));
        ir.a32_set_ext_reg_32(crate::A32ExtReg::S(0), exact);
        // 1e30 * 1e30 overflows: must stay for run time FPSR accumulation.
        let overflowing = ir.fp_mul_32(ir.imm32(0x7149_F2CA), ir.imm32(0x7149_F2CA));
        ir.a32_set_ext_reg_32(crate::A32ExtReg::S(1), overflowing);

        let mut block = ir.block;
        run(&mut block);

        let first_set = block
            .iter()
            .find(|&i| block[i].opcode == Opcode::A32SetExtendedRegister32)
            .unwrap();
        assert_eq!(block[first_set].args[1], Value::U32(0x4080_0000));
        assert!(block.iter().any(|i| block[i].opcode == Opcode::FPMul32));
    }

    #[test]
    fn is_idempotent() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let x = ir.a32_get_register(A32Reg::R2);
        let sum = ir.add_32(x, ir.imm32(4));
        ir.a32_set_register(A32Reg::R0, sum);

        let mut block = ir.block;
        run(&mut block);
        let once = format!("{block}");
        run(&mut block);
        let twice = format!("{block}");
        assert_eq!(once, twice);
    }
}
