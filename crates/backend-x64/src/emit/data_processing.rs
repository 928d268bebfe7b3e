//! Emitters for the architecture-neutral integer micro-ops.

use armjit_ir::{Inst, Opcode, Value};

use crate::abi::Gpr;
use crate::assembler::{Cc, Mem};
use crate::jitstate::nzcv_arm_to_host;

use super::terminal::cond_to_cc;
use super::EmitContext;

/// Host-format NZCV mask: SF, ZF, CF (LAHF byte) and OF (SETO byte).
const NZCV_HOST_MASK: u32 = 0xC101;

pub(super) fn try_emit(ctx: &mut EmitContext<'_>, inst: Inst, op: Opcode) -> bool {
    match op {
        Opcode::NZCVFromPackedFlags => emit_nzcv_from_packed(ctx, inst),
        Opcode::SetCheckBit => emit_set_check_bit(ctx, inst),

        Opcode::Pack2x32To1x64 => emit_pack_2x32(ctx, inst),
        Opcode::LeastSignificantWord => {
            let v = arg(ctx, inst, 0);
            let src = ctx.ra.use_gpr(&mut ctx.e, v);
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_rr32(d, src); // also zero extends
        }
        Opcode::MostSignificantWord => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.shr_i64(d, 32);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::LeastSignificantHalf => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.movzx_r32_r16(d, d);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::LeastSignificantByte => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.movzx_r32_r8(d, d);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::MostSignificantBit => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.shr_i32(d, 31);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::IsZero32 => emit_is_zero(ctx, inst, false),
        Opcode::IsZero64 => emit_is_zero(ctx, inst, true),
        Opcode::TestBit => emit_test_bit(ctx, inst),

        Opcode::ConditionalSelect32 | Opcode::ConditionalSelectNZCV => {
            emit_conditional_select(ctx, inst, false)
        }
        Opcode::ConditionalSelect64 => emit_conditional_select(ctx, inst, true),

        Opcode::LogicalShiftLeft32 => emit_shift32(ctx, inst, ShiftKind::Lsl),
        Opcode::LogicalShiftRight32 => emit_shift32(ctx, inst, ShiftKind::Lsr),
        Opcode::ArithmeticShiftRight32 => emit_shift32(ctx, inst, ShiftKind::Asr),
        Opcode::RotateRight32 => emit_rotate32(ctx, inst),
        Opcode::RotateRightExtended => emit_rrx(ctx, inst),
        Opcode::LogicalShiftLeft64 => emit_shift64(ctx, inst, ShiftKind::Lsl),
        Opcode::LogicalShiftRight64 => emit_shift64(ctx, inst, ShiftKind::Lsr),
        Opcode::ArithmeticShiftRight64 => emit_shift64(ctx, inst, ShiftKind::Asr),
        Opcode::RotateRight64 => emit_shift64(ctx, inst, ShiftKind::Ror),

        Opcode::Add32 => emit_add_sub(ctx, inst, false, false),
        Opcode::Add64 => emit_add_sub(ctx, inst, true, false),
        Opcode::Sub32 => emit_add_sub(ctx, inst, false, true),
        Opcode::Sub64 => emit_add_sub(ctx, inst, true, true),

        Opcode::Mul32 => {
            let (a, b) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, a);
            let rb = ctx.ra.use_gpr(&mut ctx.e, b);
            ctx.e.imul_rr32(d, rb);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::Mul64 => {
            let (a, b) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, a);
            let rb = ctx.ra.use_gpr(&mut ctx.e, b);
            ctx.e.imul_rr64(d, rb);
            ctx.ra.def_fixed_gpr(inst, d);
        }

        Opcode::UnsignedDiv32 => emit_div(ctx, inst, false, false),
        Opcode::UnsignedDiv64 => emit_div(ctx, inst, true, false),
        Opcode::SignedDiv32 => emit_div(ctx, inst, false, true),
        Opcode::SignedDiv64 => emit_div(ctx, inst, true, true),

        Opcode::And32 | Opcode::And64 | Opcode::Or32 | Opcode::Or64 | Opcode::Eor32
        | Opcode::Eor64 => emit_bitwise(ctx, inst, op),

        Opcode::Not32 => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.not32(d);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::Not64 => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.not64(d);
            ctx.ra.def_fixed_gpr(inst, d);
        }

        Opcode::SignExtendByteToWord => emit_extend(ctx, inst, Ext::SxtB32),
        Opcode::SignExtendHalfToWord => emit_extend(ctx, inst, Ext::SxtH32),
        Opcode::SignExtendWordToLong => emit_extend(ctx, inst, Ext::SxtW64),
        Opcode::SignExtendByteToLong => emit_extend(ctx, inst, Ext::SxtB64),
        Opcode::SignExtendHalfToLong => emit_extend(ctx, inst, Ext::SxtH64),
        Opcode::ZeroExtendByteToWord
        | Opcode::ZeroExtendHalfToWord
        | Opcode::ZeroExtendWordToLong => {
            // Values are kept zero extended; reuse the operand's location.
            let v = arg(ctx, inst, 0);
            ctx.ra.def_as_existing_gpr(&mut ctx.e, inst, v);
        }

        Opcode::ByteReverseWord => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.bswap32(d);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::ByteReverseHalf => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.bswap32(d);
            ctx.e.shr_i32(d, 16);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::ByteReverseDual => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.bswap64(d);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::CountLeadingZeros32 => {
            let v = arg(ctx, inst, 0);
            let src = ctx.ra.use_gpr(&mut ctx.e, v);
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.lzcnt32(d, src);
        }
        Opcode::CountLeadingZeros64 => {
            let v = arg(ctx, inst, 0);
            let src = ctx.ra.use_gpr(&mut ctx.e, v);
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.lzcnt64(d, src);
        }

        _ => return false,
    }
    true
}

pub(super) fn arg(ctx: &EmitContext<'_>, inst: Inst, index: usize) -> Value {
    ctx.block[inst].args[index]
}

/// Materialise the attached flag pseudo-ops of `inst` right after the host
/// instruction that produced the flags. Register moves the allocator emits
/// here never touch the flags.
fn materialise_flags(ctx: &mut EmitContext<'_>, inst: Inst) {
    let carry = ctx.block.associated_pseudo_op(inst, Opcode::GetCarryFromOp);
    let overflow = ctx.block.associated_pseudo_op(inst, Opcode::GetOverflowFromOp);
    let nzcv = ctx.block.associated_pseudo_op(inst, Opcode::GetNZCVFromOp);

    if let Some(nzcv_inst) = nzcv {
        // The pseudo op's operand reference is consumed here, not through a
        // register request.
        ctx.ra.consume(Value::Inst(inst));
        let rax = ctx.ra.claim_fixed_gpr(&mut ctx.e, Gpr::Rax);
        debug_assert_eq!(rax, Gpr::Rax);
        ctx.e.lahf();
        ctx.e.setcc(Cc::O, Gpr::Rax); // al = OF
        ctx.e.and_ri32(Gpr::Rax, NZCV_HOST_MASK as i32);
        ctx.ra.def_fixed_gpr(nzcv_inst, Gpr::Rax);
    }
    if let Some(carry_inst) = carry {
        ctx.ra.consume(Value::Inst(inst));
        let d = ctx.ra.def_gpr(&mut ctx.e, carry_inst);
        ctx.e.setcc(Cc::B, d);
        ctx.e.movzx_r32_r8(d, d);
    }
    if let Some(overflow_inst) = overflow {
        ctx.ra.consume(Value::Inst(inst));
        let d = ctx.ra.def_gpr(&mut ctx.e, overflow_inst);
        ctx.e.setcc(Cc::O, d);
        ctx.e.movzx_r32_r8(d, d);
    }
}

fn emit_nzcv_from_packed(ctx: &mut EmitContext<'_>, inst: Inst) {
    let v = arg(ctx, inst, 0);
    if v.is_immediate() {
        let host = nzcv_arm_to_host(v.u32());
        let d = ctx.ra.def_gpr(&mut ctx.e, inst);
        ctx.e.mov_ri32(d, host);
        return;
    }

    // host = ((a >> 16) & 0xC000) | ((a >> 21) & 0x100) | (a >> 28 & 1)
    let a = ctx.ra.use_gpr(&mut ctx.e, v);
    let d = ctx.ra.def_gpr(&mut ctx.e, inst);
    let t = ctx.ra.scratch_gpr(&mut ctx.e);
    ctx.e.mov_rr32(d, a);
    ctx.e.shr_i32(d, 16);
    ctx.e.and_ri32(d, 0xC000);
    ctx.e.mov_rr32(t, a);
    ctx.e.shr_i32(t, 21);
    ctx.e.and_ri32(t, 0x100);
    ctx.e.or_rr32(d, t);
    ctx.e.mov_rr32(t, a);
    ctx.e.shr_i32(t, 28);
    ctx.e.and_ri32(t, 1);
    ctx.e.or_rr32(d, t);
}

fn emit_set_check_bit(ctx: &mut EmitContext<'_>, inst: Inst) {
    let v = arg(ctx, inst, 0);
    let offset = ctx.jsi().offsetof_check_bit;
    if v.is_immediate() {
        let t = ctx.ra.scratch_gpr(&mut ctx.e);
        ctx.e.mov_ri32(t, u32::from(v.u1()));
        ctx.e.mov_m8_r8(Mem::base_disp(crate::abi::STATE, offset), t);
    } else {
        let r = ctx.ra.use_gpr(&mut ctx.e, v);
        ctx.e.mov_m8_r8(Mem::base_disp(crate::abi::STATE, offset), r);
    }
}

fn emit_pack_2x32(ctx: &mut EmitContext<'_>, inst: Inst) {
    let (lo, hi) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, lo);
    let h = ctx.ra.use_scratch_gpr(&mut ctx.e, hi);
    ctx.e.mov_rr32(d, d); // ensure clean upper half
    ctx.e.shl_i64(h, 32);
    ctx.e.or_rr64(d, h);
    ctx.ra.def_fixed_gpr(inst, d);
}

fn emit_is_zero(ctx: &mut EmitContext<'_>, inst: Inst, wide: bool) {
    let v = arg(ctx, inst, 0);
    let src = ctx.ra.use_gpr(&mut ctx.e, v);
    let d = ctx.ra.def_gpr(&mut ctx.e, inst);
    if wide {
        ctx.e.test_rr64(src, src);
    } else {
        ctx.e.test_rr32(src, src);
    }
    ctx.e.setcc(Cc::E, d);
    ctx.e.movzx_r32_r8(d, d);
}

fn emit_test_bit(ctx: &mut EmitContext<'_>, inst: Inst) {
    let (v, bit) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
    if bit.is_immediate() {
        let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
        let amount = bit.u8();
        if amount != 0 {
            ctx.e.shr_i64(d, amount);
        }
        ctx.e.and_ri64(d, 1);
        ctx.ra.def_fixed_gpr(inst, d);
    } else {
        let cl = ctx.ra.use_fixed_gpr(&mut ctx.e, bit, Gpr::Rcx);
        debug_assert_eq!(cl, Gpr::Rcx);
        let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
        ctx.e.shr_cl64(d);
        ctx.e.and_ri64(d, 1);
        ctx.ra.def_fixed_gpr(inst, d);
    }
}

fn emit_conditional_select(ctx: &mut EmitContext<'_>, inst: Inst, wide: bool) {
    let cond = arg(ctx, inst, 0).cond();
    let (then_v, else_v) = (arg(ctx, inst, 1), arg(ctx, inst, 2));

    // Load the guest flags through RAX, then select.
    let rax = ctx.ra.claim_fixed_gpr(&mut ctx.e, Gpr::Rax);
    debug_assert_eq!(rax, Gpr::Rax);
    let then_r = ctx.ra.use_gpr(&mut ctx.e, then_v);
    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, else_v);

    let offset = ctx.config.offsetof_cpsr_nzcv;
    ctx.e.mov_r32_m32(Gpr::Rax, Mem::base_disp(crate::abi::STATE, offset));
    ctx.e.put1(0x04); // add al, 0x7F
    ctx.e.put1(0x7F);
    ctx.e.sahf();

    let (cc, needs_cmc) = cond_to_cc(cond);
    if needs_cmc {
        ctx.e.cmc();
    }
    if wide {
        ctx.e.cmovcc64(cc, d, then_r);
    } else {
        ctx.e.cmovcc32(cc, d, then_r);
    }
    ctx.ra.def_fixed_gpr(inst, d);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

/// 32-bit shifts with the ARM barrel shifter's carry and out-of-range
/// semantics, computed over a 64-bit widened value with the amount clamped
/// to 63.
fn emit_shift32(ctx: &mut EmitContext<'_>, inst: Inst, kind: ShiftKind) {
    let value = arg(ctx, inst, 0);
    let amount = arg(ctx, inst, 1);
    let carry_in = arg(ctx, inst, 2);
    let carry_out = ctx.block.associated_pseudo_op(inst, Opcode::GetCarryFromOp);

    // Without a carry consumer the carry-in is never read.
    if carry_out.is_none() {
        ctx.ra.consume(carry_in);
    }

    // Immediate amounts avoid the general path.
    if let (true, None) = (amount.is_immediate(), carry_out) {
        let amt = amount.u8();
        let d = ctx.ra.use_scratch_gpr(&mut ctx.e, value);
        match kind {
            ShiftKind::Lsl => {
                if amt >= 32 {
                    ctx.e.xor_rr32(d, d);
                } else if amt > 0 {
                    ctx.e.shl_i32(d, amt);
                }
            }
            ShiftKind::Lsr => {
                if amt >= 32 {
                    ctx.e.xor_rr32(d, d);
                } else if amt > 0 {
                    ctx.e.shr_i32(d, amt);
                }
            }
            ShiftKind::Asr => {
                ctx.e.sar_i32(d, amt.min(31));
            }
            ShiftKind::Ror => unreachable!("rotates take the dedicated path"),
        }
        ctx.ra.def_fixed_gpr(inst, d);
        return;
    }

    // General path: widen, clamp, shift in 64 bits.
    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, value);
    let rcx = ctx.ra.use_fixed_gpr(&mut ctx.e, amount, Gpr::Rcx);
    debug_assert_eq!(rcx, Gpr::Rcx);

    match kind {
        ShiftKind::Lsl | ShiftKind::Lsr => ctx.e.mov_rr32(d, d), // zero extend
        ShiftKind::Asr => ctx.e.movsxd(d, d),
        ShiftKind::Ror => unreachable!(),
    }

    // Clamp the amount to 63; a 32-bit value shifted by 33..63 yields the
    // architecturally-correct zeros (or sign bits).
    let t = ctx.ra.scratch_gpr(&mut ctx.e);
    ctx.e.mov_ri32(t, 63);
    ctx.e.cmp_ri32(Gpr::Rcx, 63);
    ctx.e.cmovcc32(Cc::A, Gpr::Rcx, t);

    let carry_reg = carry_out.map(|carry_inst| {
        ctx.ra.consume(Value::Inst(inst));
        let cr = ctx.ra.def_gpr(&mut ctx.e, carry_inst);
        match kind {
            ShiftKind::Lsl => {
                // carry = bit 32 of (value << amount)
                ctx.e.mov_rr64(cr, d);
                ctx.e.shl_cl64(cr);
                ctx.e.shr_i64(cr, 32);
                ctx.e.and_ri32(cr, 1);
            }
            ShiftKind::Lsr | ShiftKind::Asr => {
                // carry = bit (amount - 1) of the widened value
                ctx.e.mov_rr64(cr, d);
                ctx.e.add_ri32(Gpr::Rcx, -1);
                ctx.e.and_ri32(Gpr::Rcx, 63);
                ctx.e.shr_cl64(cr);
                ctx.e.and_ri32(cr, 1);
                ctx.e.add_ri32(Gpr::Rcx, 1);
                ctx.e.and_ri32(Gpr::Rcx, 63);
            }
            ShiftKind::Ror => unreachable!(),
        }
        cr
    });

    match kind {
        ShiftKind::Lsl => ctx.e.shl_cl64(d),
        ShiftKind::Lsr => ctx.e.shr_cl64(d),
        ShiftKind::Asr => ctx.e.sar_cl64(d),
        ShiftKind::Ror => unreachable!(),
    }
    ctx.e.mov_rr32(d, d); // truncate back to a clean 32-bit value
    ctx.ra.def_fixed_gpr(inst, d);

    // Amount of zero passes the carry-in through.
    if let (Some(cr), Some(_)) = (carry_reg, carry_out) {
        let cin = ctx.ra.use_gpr(&mut ctx.e, carry_in);
        ctx.e.test_rr32(Gpr::Rcx, Gpr::Rcx);
        ctx.e.cmovcc32(Cc::E, cr, cin);
    }
}

fn emit_rotate32(ctx: &mut EmitContext<'_>, inst: Inst) {
    let value = arg(ctx, inst, 0);
    let amount = arg(ctx, inst, 1);
    let carry_in = arg(ctx, inst, 2);
    let carry_out = ctx.block.associated_pseudo_op(inst, Opcode::GetCarryFromOp);

    // The carry-in is only read at run time for a dynamic amount of zero.
    if carry_out.is_none() || amount.is_immediate() {
        ctx.ra.consume(carry_in);
    }

    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, value);
    if amount.is_immediate() {
        // An immediate amount of zero folds away in the optimiser, so a
        // carry-out here always comes from the result's top bit.
        let amt = amount.u8();
        debug_assert!(carry_out.is_none() || amt != 0);
        if amt % 32 != 0 {
            ctx.e.ror_i32(d, amt % 32);
        }
        ctx.ra.def_fixed_gpr(inst, d);
        if let Some(carry_inst) = carry_out {
            ctx.ra.consume(Value::Inst(inst));
            let cr = ctx.ra.def_gpr(&mut ctx.e, carry_inst);
            ctx.e.mov_rr32(cr, d);
            ctx.e.shr_i32(cr, 31);
        }
        return;
    }

    let rcx = ctx.ra.use_fixed_gpr(&mut ctx.e, amount, Gpr::Rcx);
    debug_assert_eq!(rcx, Gpr::Rcx);
    ctx.e.ror_cl32(d); // hardware masks the amount to 31, as ROR wants
    ctx.ra.def_fixed_gpr(inst, d);

    if let Some(carry_inst) = carry_out {
        ctx.ra.consume(Value::Inst(inst));
        let cr = ctx.ra.def_gpr(&mut ctx.e, carry_inst);
        ctx.e.mov_rr32(cr, d);
        ctx.e.shr_i32(cr, 31);
        let cin = ctx.ra.use_gpr(&mut ctx.e, carry_in);
        ctx.e.test_rr32(Gpr::Rcx, Gpr::Rcx);
        ctx.e.cmovcc32(Cc::E, cr, cin);
    }
}

fn emit_rrx(ctx: &mut EmitContext<'_>, inst: Inst) {
    let value = arg(ctx, inst, 0);
    let carry_in = arg(ctx, inst, 1);
    let carry_out = ctx.block.associated_pseudo_op(inst, Opcode::GetCarryFromOp);

    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, value);

    if let Some(carry_inst) = carry_out {
        ctx.ra.consume(Value::Inst(inst));
        let cr = ctx.ra.def_gpr(&mut ctx.e, carry_inst);
        ctx.e.mov_rr32(cr, d);
        ctx.e.and_ri32(cr, 1);
    }

    let cin = ctx.ra.use_scratch_gpr(&mut ctx.e, carry_in);
    ctx.e.shr_i32(d, 1);
    ctx.e.shl_i32(cin, 31);
    ctx.e.or_rr32(d, cin);
    ctx.ra.def_fixed_gpr(inst, d);
}

fn emit_shift64(ctx: &mut EmitContext<'_>, inst: Inst, kind: ShiftKind) {
    let value = arg(ctx, inst, 0);
    let amount = arg(ctx, inst, 1);

    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, value);
    if amount.is_immediate() {
        let amt = amount.u8() & 63;
        if amt != 0 {
            match kind {
                ShiftKind::Lsl => ctx.e.shl_i64(d, amt),
                ShiftKind::Lsr => ctx.e.shr_i64(d, amt),
                ShiftKind::Asr => ctx.e.sar_i64(d, amt),
                ShiftKind::Ror => ctx.e.ror_i64(d, amt),
            }
        }
    } else {
        let rcx = ctx.ra.use_fixed_gpr(&mut ctx.e, amount, Gpr::Rcx);
        debug_assert_eq!(rcx, Gpr::Rcx);
        match kind {
            ShiftKind::Lsl => ctx.e.shl_cl64(d),
            ShiftKind::Lsr => ctx.e.shr_cl64(d),
            ShiftKind::Asr => ctx.e.sar_cl64(d),
            ShiftKind::Ror => ctx.e.ror_cl64(d),
        }
    }
    ctx.ra.def_fixed_gpr(inst, d);
}

/// Add and subtract share one path: subtraction adds the complement, which
/// makes the host carry equal the ARM not-borrow convention directly.
fn emit_add_sub(ctx: &mut EmitContext<'_>, inst: Inst, wide: bool, subtract: bool) {
    let (a, b, carry_in) = (arg(ctx, inst, 0), arg(ctx, inst, 1), arg(ctx, inst, 2));

    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, a);

    // Complemented immediates fold at emission time.
    enum Operand {
        Reg(Gpr),
        Imm(u64),
    }
    let rhs = match (b.is_immediate(), subtract) {
        (true, false) => Operand::Imm(b.immediate_u64()),
        (true, true) => {
            let raw = b.immediate_u64();
            Operand::Imm(if wide { !raw } else { u64::from(!(raw as u32)) })
        }
        (false, _) => {
            if subtract {
                let t = ctx.ra.use_scratch_gpr(&mut ctx.e, b);
                if wide {
                    ctx.e.not64(t);
                } else {
                    ctx.e.not32(t);
                }
                Operand::Reg(t)
            } else {
                Operand::Reg(ctx.ra.use_gpr(&mut ctx.e, b))
            }
        }
    };

    // Immediate-reachable rhs values with no carry-in go through plain
    // add; everything else sets CF first and uses adc.
    let rhs_reg = match rhs {
        Operand::Reg(reg) => reg,
        Operand::Imm(imm) => {
            let t = ctx.ra.scratch_gpr(&mut ctx.e);
            ctx.e.mov_ri64(t, imm);
            t
        }
    };

    match carry_in {
        Value::U1(false) => {
            if wide {
                ctx.e.add_rr64(d, rhs_reg);
            } else {
                ctx.e.add_rr32(d, rhs_reg);
            }
        }
        Value::U1(true) => {
            ctx.e.stc();
            if wide {
                ctx.e.adc_rr64(d, rhs_reg);
            } else {
                ctx.e.adc_rr32(d, rhs_reg);
            }
        }
        carry => {
            let cin = ctx.ra.use_scratch_gpr(&mut ctx.e, carry);
            // CF = (cin != 0) without disturbing the operands.
            ctx.e.add_ri32(cin, -1);
            if wide {
                ctx.e.adc_rr64(d, rhs_reg);
            } else {
                ctx.e.adc_rr32(d, rhs_reg);
            }
        }
    }

    ctx.ra.def_fixed_gpr(inst, d);
    materialise_flags(ctx, inst);
}

fn emit_div(ctx: &mut EmitContext<'_>, inst: Inst, wide: bool, signed: bool) {
    let (a, b) = (arg(ctx, inst, 0), arg(ctx, inst, 1));

    let rax = ctx.ra.use_fixed_gpr(&mut ctx.e, a, Gpr::Rax);
    debug_assert_eq!(rax, Gpr::Rax);
    let divisor = ctx.ra.use_fixed_gpr(&mut ctx.e, b, Gpr::Rcx);
    debug_assert_eq!(divisor, Gpr::Rcx);
    let rdx = ctx.ra.claim_fixed_gpr(&mut ctx.e, Gpr::Rdx);
    debug_assert_eq!(rdx, Gpr::Rdx);

    let done = ctx.e.new_label();
    let zero = ctx.e.new_label();

    if wide {
        ctx.e.test_rr64(Gpr::Rcx, Gpr::Rcx);
    } else {
        ctx.e.test_rr32(Gpr::Rcx, Gpr::Rcx);
    }
    ctx.e.jcc_label(Cc::E, zero);

    if signed {
        // INT_MIN / -1 is defined on the guest: the result is INT_MIN,
        // which is already in RAX. The host would fault.
        let do_div = ctx.e.new_label();
        if wide {
            let t = Gpr::Rdx;
            ctx.e.mov_ri64(t, 0x8000_0000_0000_0000);
            ctx.e.cmp_rr64(Gpr::Rax, t);
            ctx.e.jcc_label(Cc::Ne, do_div);
            ctx.e.cmp_ri64(Gpr::Rcx, -1);
        } else {
            ctx.e.cmp_ri32(Gpr::Rax, i32::MIN);
            ctx.e.jcc_label(Cc::Ne, do_div);
            ctx.e.cmp_ri32(Gpr::Rcx, -1);
        }
        ctx.e.jcc_label(Cc::E, done);
        ctx.e.bind(do_div);
        if wide {
            ctx.e.cqo();
            ctx.e.idiv64(Gpr::Rcx);
        } else {
            ctx.e.cdq();
            ctx.e.idiv32(Gpr::Rcx);
        }
        ctx.e.jmp_label(done);
    } else {
        ctx.e.xor_rr32(Gpr::Rdx, Gpr::Rdx);
        if wide {
            ctx.e.div64(Gpr::Rcx);
        } else {
            ctx.e.div32(Gpr::Rcx);
        }
        ctx.e.jmp_label(done);
    }

    ctx.e.bind(zero);
    ctx.e.xor_rr32(Gpr::Rax, Gpr::Rax);
    ctx.e.bind(done);
    if !wide {
        ctx.e.mov_rr32(Gpr::Rax, Gpr::Rax);
    }
    ctx.ra.def_fixed_gpr(inst, Gpr::Rax);
}

fn emit_bitwise(ctx: &mut EmitContext<'_>, inst: Inst, op: Opcode) {
    let (a, b) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, a);
    let rb = ctx.ra.use_gpr(&mut ctx.e, b);
    match op {
        Opcode::And32 => ctx.e.and_rr32(d, rb),
        Opcode::And64 => ctx.e.and_rr64(d, rb),
        Opcode::Or32 => ctx.e.or_rr32(d, rb),
        Opcode::Or64 => ctx.e.or_rr64(d, rb),
        Opcode::Eor32 => ctx.e.xor_rr32(d, rb),
        Opcode::Eor64 => ctx.e.xor_rr64(d, rb),
        _ => unreachable!(),
    }
    ctx.ra.def_fixed_gpr(inst, d);
    materialise_flags(ctx, inst);
}

#[derive(Clone, Copy)]
enum Ext {
    SxtB32,
    SxtH32,
    SxtB64,
    SxtH64,
    SxtW64,
}

fn emit_extend(ctx: &mut EmitContext<'_>, inst: Inst, ext: Ext) {
    let v = arg(ctx, inst, 0);
    let src = ctx.ra.use_gpr(&mut ctx.e, v);
    let d = ctx.ra.def_gpr(&mut ctx.e, inst);
    match ext {
        Ext::SxtB32 => ctx.e.movsx_r32_r8(d, src),
        Ext::SxtH32 => ctx.e.movsx_r32_r16(d, src),
        Ext::SxtB64 => ctx.e.movsx_r64_r8(d, src),
        Ext::SxtH64 => ctx.e.movsx_r64_r16(d, src),
        Ext::SxtW64 => ctx.e.movsxd(d, src),
    }
    // 32-bit sign extensions leave a signed value whose upper half must be
    // cleared to respect the zero-extension invariant.
    if matches!(ext, Ext::SxtB32 | Ext::SxtH32) {
        ctx.e.mov_rr32(d, d);
    }
}
