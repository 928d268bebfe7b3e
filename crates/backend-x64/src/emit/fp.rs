//! Floating point emission.
//!
//! Scalar FP micro-ops lower to reference-library callouts: exactness under
//! the guest FPCR (rounding, FZ, DN, FPSR accumulation) is the binding
//! requirement, and the library is the single source of truth for it —
//! the same code constant folding uses. Pure bit manipulations (abs, neg)
//! emit natively.

use armjit_ir::{Inst, Opcode, Value};

use crate::abi::{Gpr, STATE};
use crate::assembler::Mem;

use super::fp_helpers as helpers;
use super::{data_processing::arg, EmitContext};

pub(super) fn try_emit(ctx: &mut EmitContext<'_>, inst: Inst, op: Opcode) -> bool {
    match op {
        Opcode::FPAbs32 => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.and_ri32(d, 0x7FFF_FFFF);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::FPAbs64 => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            ctx.e.shl_i64(d, 1);
            ctx.e.shr_i64(d, 1);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::FPNeg32 => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            let t = ctx.ra.scratch_gpr(&mut ctx.e);
            ctx.e.mov_ri32(t, 0x8000_0000);
            ctx.e.xor_rr32(d, t);
            ctx.ra.def_fixed_gpr(inst, d);
        }
        Opcode::FPNeg64 => {
            let v = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
            let t = ctx.ra.scratch_gpr(&mut ctx.e);
            ctx.e.mov_ri64(t, 0x8000_0000_0000_0000);
            ctx.e.xor_rr64(d, t);
            ctx.ra.def_fixed_gpr(inst, d);
        }

        Opcode::FPAdd32 => binary(ctx, inst, helpers::fp_add_32 as usize),
        Opcode::FPAdd64 => binary(ctx, inst, helpers::fp_add_64 as usize),
        Opcode::FPSub32 => binary(ctx, inst, helpers::fp_sub_32 as usize),
        Opcode::FPSub64 => binary(ctx, inst, helpers::fp_sub_64 as usize),
        Opcode::FPMul32 => binary(ctx, inst, helpers::fp_mul_32 as usize),
        Opcode::FPMul64 => binary(ctx, inst, helpers::fp_mul_64 as usize),
        Opcode::FPDiv32 => binary(ctx, inst, helpers::fp_div_32 as usize),
        Opcode::FPDiv64 => binary(ctx, inst, helpers::fp_div_64 as usize),

        Opcode::FPSqrt32 => unary(ctx, inst, helpers::fp_sqrt_32 as usize),
        Opcode::FPSqrt64 => unary(ctx, inst, helpers::fp_sqrt_64 as usize),
        Opcode::FPRecipEstimate32 => unary(ctx, inst, helpers::fp_recip_estimate_32 as usize),
        Opcode::FPRecipEstimate64 => unary(ctx, inst, helpers::fp_recip_estimate_64 as usize),
        Opcode::FPRSqrtEstimate32 => unary(ctx, inst, helpers::fp_rsqrt_estimate_32 as usize),
        Opcode::FPRSqrtEstimate64 => unary(ctx, inst, helpers::fp_rsqrt_estimate_64 as usize),
        Opcode::FPSingleToDouble => unary(ctx, inst, helpers::fp_single_to_double as usize),
        Opcode::FPDoubleToSingle => unary(ctx, inst, helpers::fp_double_to_single as usize),

        Opcode::FPMulAdd32 => ternary(ctx, inst, helpers::fp_mul_add_32 as usize),
        Opcode::FPMulAdd64 => ternary(ctx, inst, helpers::fp_mul_add_64 as usize),

        Opcode::FPCompare32 => compare(ctx, inst, helpers::fp_compare_32 as usize),
        Opcode::FPCompare64 => compare(ctx, inst, helpers::fp_compare_64 as usize),

        Opcode::FPSingleToFixedS32 => fixed(ctx, inst, helpers::fp_single_to_fixed_s32 as usize),
        Opcode::FPSingleToFixedU32 => fixed(ctx, inst, helpers::fp_single_to_fixed_u32 as usize),
        Opcode::FPSingleToFixedS64 => fixed(ctx, inst, helpers::fp_single_to_fixed_s64 as usize),
        Opcode::FPSingleToFixedU64 => fixed(ctx, inst, helpers::fp_single_to_fixed_u64 as usize),
        Opcode::FPDoubleToFixedS32 => fixed(ctx, inst, helpers::fp_double_to_fixed_s32 as usize),
        Opcode::FPDoubleToFixedU32 => fixed(ctx, inst, helpers::fp_double_to_fixed_u32 as usize),
        Opcode::FPDoubleToFixedS64 => fixed(ctx, inst, helpers::fp_double_to_fixed_s64 as usize),
        Opcode::FPDoubleToFixedU64 => fixed(ctx, inst, helpers::fp_double_to_fixed_u64 as usize),
        Opcode::FPFixedS32ToSingle => fixed(ctx, inst, helpers::fp_fixed_s32_to_single as usize),
        Opcode::FPFixedU32ToSingle => fixed(ctx, inst, helpers::fp_fixed_u32_to_single as usize),
        Opcode::FPFixedS32ToDouble => fixed(ctx, inst, helpers::fp_fixed_s32_to_double as usize),
        Opcode::FPFixedU32ToDouble => fixed(ctx, inst, helpers::fp_fixed_u32_to_double as usize),
        Opcode::FPFixedS64ToSingle => fixed(ctx, inst, helpers::fp_fixed_s64_to_single as usize),
        Opcode::FPFixedU64ToSingle => fixed(ctx, inst, helpers::fp_fixed_u64_to_single as usize),
        Opcode::FPFixedS64ToDouble => fixed(ctx, inst, helpers::fp_fixed_s64_to_double as usize),
        Opcode::FPFixedU64ToDouble => fixed(ctx, inst, helpers::fp_fixed_u64_to_double as usize),

        _ => return false,
    }
    true
}

/// Load the effective FPCR into `dst` and the FPSR pointer into `ptr`.
fn load_fp_env(ctx: &mut EmitContext<'_>, fpcr_dst: Gpr, fpsr_ptr: Gpr) {
    ctx.e.mov_r32_m32(fpcr_dst, Mem::base_disp(STATE, ctx.config.offsetof_fpcr));
    if ctx.config.fpcr_mask != u32::MAX {
        let mask = ctx.config.fpcr_mask as i32;
        ctx.e.and_ri32(fpcr_dst, mask);
    }
    ctx.e.mov_rr64(fpsr_ptr, STATE);
    ctx.e.add_ri64(fpsr_ptr, ctx.config.offsetof_fpsr);
}

fn call_helper(ctx: &mut EmitContext<'_>, inst: Inst, helper: usize) {
    ctx.e.mov_ri64(Gpr::Rax, helper as u64);
    ctx.e.call_r64(Gpr::Rax);
    // Narrow results only define the low half of RAX.
    if ctx.block[inst].opcode.result_type() != armjit_ir::Type::U64 {
        ctx.e.mov_rr32(Gpr::Rax, Gpr::Rax);
    }
    ctx.ra.def_fixed_gpr(inst, Gpr::Rax);
}

fn unary(ctx: &mut EmitContext<'_>, inst: Inst, helper: usize) {
    let a = arg(ctx, inst, 0);
    ctx.ra.prepare_for_call(&mut ctx.e, &[a], 0);
    load_fp_env(ctx, Gpr::Rsi, Gpr::Rdx);
    call_helper(ctx, inst, helper);
}

fn binary(ctx: &mut EmitContext<'_>, inst: Inst, helper: usize) {
    let (a, b) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
    ctx.ra.prepare_for_call(&mut ctx.e, &[a, b], 0);
    load_fp_env(ctx, Gpr::Rdx, Gpr::Rcx);
    call_helper(ctx, inst, helper);
}

fn ternary(ctx: &mut EmitContext<'_>, inst: Inst, helper: usize) {
    let (a, b, c) = (arg(ctx, inst, 0), arg(ctx, inst, 1), arg(ctx, inst, 2));
    ctx.ra.prepare_for_call(&mut ctx.e, &[a, b, c], 0);
    load_fp_env(ctx, Gpr::Rcx, Gpr::R8);
    call_helper(ctx, inst, helper);
}

fn compare(ctx: &mut EmitContext<'_>, inst: Inst, helper: usize) {
    let (a, b, exc) = (arg(ctx, inst, 0), arg(ctx, inst, 1), arg(ctx, inst, 2));
    ctx.ra.prepare_for_call(&mut ctx.e, &[a, b, exc], 0);
    load_fp_env(ctx, Gpr::Rcx, Gpr::R8);
    call_helper(ctx, inst, helper);
}

/// The fixed-point conversions: (value, fbits, rounding, fpcr, fpsr*).
fn fixed(ctx: &mut EmitContext<'_>, inst: Inst, helper: usize) {
    let (v, fbits, rmode) = (arg(ctx, inst, 0), arg(ctx, inst, 1), arg(ctx, inst, 2));
    ctx.ra.prepare_for_call(&mut ctx.e, &[v, fbits, rmode], 0);
    load_fp_env(ctx, Gpr::Rcx, Gpr::R8);
    call_helper(ctx, inst, helper);
}
