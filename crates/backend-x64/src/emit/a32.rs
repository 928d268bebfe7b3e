//! Emitters for the A32 guest-state micro-ops.

use armjit_ir::{A32ExtReg, Inst, Opcode};

use crate::abi::{Gpr, STATE};
use crate::assembler::Mem;
use crate::callbacks::LinkTarget;
use crate::jitstate::{A32JitState, NZCV_C_HOST, NZCV_N_HOST, NZCV_V_HOST, NZCV_Z_HOST};

use super::data_processing::arg;
use super::memory::{self, ExclusiveInfo};
use super::{BlockRelocation, EmitContext};

fn off(field_offset: usize) -> i32 {
    field_offset as i32
}

fn reg_mem(index: usize) -> Mem {
    Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, regs)) + (index * 4) as i32)
}

fn ext_reg_mem(reg: A32ExtReg) -> Mem {
    let base = off(core::mem::offset_of!(A32JitState, ext_regs));
    match reg {
        A32ExtReg::S(n) => Mem::base_disp(STATE, base + i32::from(n) * 4),
        A32ExtReg::D(n) => Mem::base_disp(STATE, base + i32::from(n) * 8),
    }
}

fn nzcv_mem() -> Mem {
    Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, cpsr_nzcv)))
}

fn excl_info() -> ExclusiveInfo {
    ExclusiveInfo {
        offsetof_state: off(core::mem::offset_of!(A32JitState, exclusive_state)),
        offsetof_address: off(core::mem::offset_of!(A32JitState, exclusive_address)),
        granule_mask: -8,
        wide_address: false,
    }
}

pub(super) fn try_emit(ctx: &mut EmitContext<'_>, inst: Inst, op: Opcode) -> bool {
    match op {
        Opcode::A32GetRegister => {
            let reg = arg(ctx, inst, 0).a32_reg();
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r32_m32(d, reg_mem(reg.index()));
        }
        Opcode::A32SetRegister => {
            let reg = arg(ctx, inst, 0).a32_reg();
            let v = arg(ctx, inst, 1);
            if let Some(imm) = immediate_u32(ctx, inst, 1) {
                ctx.e.mov_m32_i32(reg_mem(reg.index()), imm);
            } else {
                let r = ctx.ra.use_gpr(&mut ctx.e, v);
                ctx.e.mov_m32_r32(reg_mem(reg.index()), r);
            }
        }
        Opcode::A32GetExtendedRegister32 => {
            let reg = arg(ctx, inst, 0).a32_ext_reg();
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r32_m32(d, ext_reg_mem(reg));
        }
        Opcode::A32SetExtendedRegister32 => {
            let reg = arg(ctx, inst, 0).a32_ext_reg();
            let operand = arg(ctx, inst, 1);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m32_r32(ext_reg_mem(reg), r);
        }
        Opcode::A32GetExtendedRegister64 => {
            let reg = arg(ctx, inst, 0).a32_ext_reg();
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r64_m64(d, ext_reg_mem(reg));
        }
        Opcode::A32SetExtendedRegister64 => {
            let reg = arg(ctx, inst, 0).a32_ext_reg();
            let operand = arg(ctx, inst, 1);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m64_r64(ext_reg_mem(reg), r);
        }

        Opcode::A32GetNFlag => emit_get_flag(ctx, inst, NZCV_N_HOST),
        Opcode::A32GetZFlag => emit_get_flag(ctx, inst, NZCV_Z_HOST),
        Opcode::A32GetCFlag => emit_get_flag(ctx, inst, NZCV_C_HOST),
        Opcode::A32GetVFlag => emit_get_flag(ctx, inst, NZCV_V_HOST),
        Opcode::A32SetNFlag => emit_set_flag(ctx, inst, NZCV_N_HOST),
        Opcode::A32SetZFlag => emit_set_flag(ctx, inst, NZCV_Z_HOST),
        Opcode::A32SetCFlag => emit_set_flag(ctx, inst, NZCV_C_HOST),
        Opcode::A32SetVFlag => emit_set_flag(ctx, inst, NZCV_V_HOST),

        Opcode::A32OrQFlag => {
            let v = arg(ctx, inst, 0);
            let q = Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, cpsr_q)));
            let r = ctx.ra.use_gpr(&mut ctx.e, v);
            ctx.e.or_m32_r32(q, r);
        }
        Opcode::A32GetGEFlags => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r32_m32(
                d,
                Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, cpsr_ge))),
            );
        }
        Opcode::A32SetGEFlags => {
            let operand = arg(ctx, inst, 0);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m32_r32(
                Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, cpsr_ge))),
                r,
            );
        }
        Opcode::A32SetGEFlagsCompressed => {
            // Expand packed GE bits 19:16 into byte-wise flags: spread one
            // bit per byte with a multiply, then widen each to 0xFF.
            let operand = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, operand);
            let t = ctx.ra.scratch_gpr(&mut ctx.e);
            ctx.e.shr_i32(d, 16);
            ctx.e.and_ri32(d, 0xF);
            ctx.e.mov_ri32(t, 0x0020_4081);
            ctx.e.imul_rr32(d, t);
            ctx.e.and_ri32(d, 0x0101_0101);
            ctx.e.mov_rr32(t, d);
            ctx.e.shl_i32(d, 8);
            ctx.e.sub_rr32(d, t);
            ctx.e.mov_m32_r32(
                Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, cpsr_ge))),
                d,
            );
        }

        Opcode::A32GetCpsr => {
            ctx.ra.prepare_for_call(&mut ctx.e, &[], 0);
            ctx.e.mov_rr64(Gpr::Rdi, STATE);
            ctx.e.mov_ri64(Gpr::Rax, helper_a32_get_cpsr as usize as u64);
            ctx.e.call_r64(Gpr::Rax);
            ctx.e.mov_rr32(Gpr::Rax, Gpr::Rax);
            ctx.ra.def_fixed_gpr(inst, Gpr::Rax);
        }
        Opcode::A32SetCpsr => {
            let v = arg(ctx, inst, 0);
            ctx.ra.prepare_for_call(&mut ctx.e, &[v], 1);
            ctx.e.mov_rr64(Gpr::Rdi, STATE);
            ctx.e.mov_ri64(Gpr::Rax, helper_a32_set_cpsr as usize as u64);
            ctx.e.call_r64(Gpr::Rax);
        }
        Opcode::A32SetCpsrNZCVRaw => {
            // ARM-packed bits 31-28 into the host-format word.
            let operand = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, operand);
            let t = ctx.ra.scratch_gpr(&mut ctx.e);
            let u = ctx.ra.scratch_gpr(&mut ctx.e);
            emit_arm_to_host_nzcv(ctx, d, t, u);
            ctx.e.mov_m32_r32(nzcv_mem(), d);
        }

        Opcode::A32BXWritePC => emit_bx_write_pc(ctx, inst),

        Opcode::A32UpdateUpperLocationDescriptor => {
            let upper = arg(ctx, inst, 0).u32();
            ctx.e.mov_m32_i32(
                Mem::base_disp(
                    STATE,
                    off(core::mem::offset_of!(A32JitState, upper_location_descriptor)),
                ),
                upper,
            );
        }

        Opcode::A32PushRSB => emit_push_rsb(ctx, inst),

        Opcode::A32CallSupervisor => {
            let v = arg(ctx, inst, 0);
            ctx.ra.prepare_for_call(&mut ctx.e, &[v], 1);
            ctx.call_link_target(LinkTarget::CallSVC);
        }
        Opcode::A32ExceptionRaised => {
            let (pc, kind) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
            ctx.ra.prepare_for_call(&mut ctx.e, &[pc, kind], 1);
            ctx.call_link_target(LinkTarget::ExceptionRaised);
        }

        Opcode::A32GetFpscr => {
            ctx.ra.prepare_for_call(&mut ctx.e, &[], 0);
            ctx.e.mov_rr64(Gpr::Rdi, STATE);
            ctx.e.mov_ri64(Gpr::Rax, helper_a32_get_fpscr as usize as u64);
            ctx.e.call_r64(Gpr::Rax);
            ctx.e.mov_rr32(Gpr::Rax, Gpr::Rax);
            ctx.ra.def_fixed_gpr(inst, Gpr::Rax);
        }
        Opcode::A32SetFpscr => {
            let v = arg(ctx, inst, 0);
            ctx.ra.prepare_for_call(&mut ctx.e, &[v], 1);
            ctx.e.mov_rr64(Gpr::Rdi, STATE);
            ctx.e.mov_ri64(Gpr::Rax, helper_a32_set_fpscr as usize as u64);
            ctx.e.call_r64(Gpr::Rax);
            // The stored guest MXCSR may have changed.
            ctx.e.ldmxcsr(Mem::base_disp(STATE, ctx.jsi().offsetof_guest_mxcsr));
        }
        Opcode::A32GetFpscrNZCV => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r32_m32(
                d,
                Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, fpscr_nzcv))),
            );
        }
        Opcode::A32SetFpscrNZCV => {
            // Host-format operand; store in ARM packing.
            let operand = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, operand);
            let t = ctx.ra.scratch_gpr(&mut ctx.e);
            let u = ctx.ra.scratch_gpr(&mut ctx.e);
            emit_host_to_arm_nzcv(ctx, d, t, u);
            ctx.e.mov_m32_r32(
                Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, fpscr_nzcv))),
                d,
            );
        }

        Opcode::A32DataSynchronizationBarrier
        | Opcode::A32DataMemoryBarrier => ctx.e.mfence(),
        Opcode::A32InstructionSynchronizationBarrier => {}

        Opcode::A32ClearExclusive => {
            ctx.e.mov_m32_i32(
                Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, exclusive_state))),
                0,
            );
        }

        Opcode::A32ReadMemory8 => read(ctx, inst, 8),
        Opcode::A32ReadMemory16 => read(ctx, inst, 16),
        Opcode::A32ReadMemory32 => read(ctx, inst, 32),
        Opcode::A32ReadMemory64 => read(ctx, inst, 64),
        Opcode::A32ExclusiveReadMemory8 => exclusive_read(ctx, inst, 8),
        Opcode::A32ExclusiveReadMemory16 => exclusive_read(ctx, inst, 16),
        Opcode::A32ExclusiveReadMemory32 => exclusive_read(ctx, inst, 32),
        Opcode::A32ExclusiveReadMemory64 => exclusive_read(ctx, inst, 64),
        Opcode::A32WriteMemory8 => write(ctx, inst, 8),
        Opcode::A32WriteMemory16 => write(ctx, inst, 16),
        Opcode::A32WriteMemory32 => write(ctx, inst, 32),
        Opcode::A32WriteMemory64 => write(ctx, inst, 64),
        Opcode::A32ExclusiveWriteMemory8 => exclusive_write(ctx, inst, 8),
        Opcode::A32ExclusiveWriteMemory16 => exclusive_write(ctx, inst, 16),
        Opcode::A32ExclusiveWriteMemory32 => exclusive_write(ctx, inst, 32),
        Opcode::A32ExclusiveWriteMemory64 => exclusive_write(ctx, inst, 64),

        _ => return false,
    }
    true
}

fn immediate_u32(ctx: &EmitContext<'_>, inst: Inst, index: usize) -> Option<u32> {
    match ctx.block[inst].args[index] {
        armjit_ir::Value::U32(v) => Some(v),
        _ => None,
    }
}

fn read(ctx: &mut EmitContext<'_>, inst: Inst, bits: u32) {
    let vaddr = arg(ctx, inst, 0);
    let acc = arg(ctx, inst, 1).acc_type();
    memory::emit_read(ctx, inst, vaddr, bits, acc);
}

fn write(ctx: &mut EmitContext<'_>, inst: Inst, bits: u32) {
    let vaddr = arg(ctx, inst, 0);
    let value = arg(ctx, inst, 1);
    let acc = arg(ctx, inst, 2).acc_type();
    memory::emit_write(ctx, inst, vaddr, value, bits, acc);
}

fn exclusive_read(ctx: &mut EmitContext<'_>, inst: Inst, bits: u32) {
    let vaddr = arg(ctx, inst, 0);
    memory::emit_exclusive_read(ctx, inst, vaddr, bits, &excl_info());
}

fn exclusive_write(ctx: &mut EmitContext<'_>, inst: Inst, bits: u32) {
    let vaddr = arg(ctx, inst, 0);
    let value = arg(ctx, inst, 1);
    memory::emit_exclusive_write(ctx, inst, vaddr, value, bits, &excl_info());
}

fn emit_get_flag(ctx: &mut EmitContext<'_>, inst: Inst, mask: u32) {
    let d = ctx.ra.def_gpr(&mut ctx.e, inst);
    ctx.e.mov_r32_m32(d, nzcv_mem());
    let shift = mask.trailing_zeros();
    if shift != 0 {
        ctx.e.shr_i32(d, shift as u8);
    }
    ctx.e.and_ri32(d, 1);
}

fn emit_set_flag(ctx: &mut EmitContext<'_>, inst: Inst, mask: u32) {
    let v = arg(ctx, inst, 0);
    let shift = mask.trailing_zeros();
    let t = ctx.ra.scratch_gpr(&mut ctx.e);
    ctx.e.mov_r32_m32(t, nzcv_mem());
    ctx.e.and_ri32(t, !(mask as i32) & 0xFFFF);

    match v {
        armjit_ir::Value::U1(set) => {
            if set {
                ctx.e.or_ri32(t, mask as i32);
            }
        }
        value => {
            let r = ctx.ra.use_scratch_gpr(&mut ctx.e, value);
            if shift != 0 {
                ctx.e.shl_i32(r, shift as u8);
            }
            ctx.e.or_rr32(t, r);
        }
    }
    ctx.e.mov_m32_r32(nzcv_mem(), t);
}

/// `d` holds ARM-packed NZCV (bits 31-28); rewrite it to host format, using
/// `t` and `u` as scratch.
pub(super) fn emit_arm_to_host_nzcv(ctx: &mut EmitContext<'_>, d: Gpr, t: Gpr, u: Gpr) {
    // host = ((a >> 16) & 0xC000) | ((a >> 21) & 0x100) | ((a >> 28) & 1)
    ctx.e.mov_rr32(t, d);
    ctx.e.mov_rr32(u, d);
    ctx.e.shr_i32(d, 16);
    ctx.e.and_ri32(d, 0xC000);
    ctx.e.shr_i32(t, 21);
    ctx.e.and_ri32(t, 0x100);
    ctx.e.or_rr32(d, t);
    ctx.e.shr_i32(u, 28);
    ctx.e.and_ri32(u, 1);
    ctx.e.or_rr32(d, u);
}

/// `d` holds host-format NZCV; rewrite it to ARM packing (bits 31-28), using
/// `t` and `u` as scratch.
pub(super) fn emit_host_to_arm_nzcv(ctx: &mut EmitContext<'_>, d: Gpr, t: Gpr, u: Gpr) {
    // arm = ((h & 0xC000) << 16) | ((h & 0x100) << 21) | ((h & 1) << 28)
    ctx.e.mov_rr32(t, d);
    ctx.e.and_ri32(t, 0xC000);
    ctx.e.shl_i32(t, 16);
    ctx.e.mov_rr32(u, d);
    ctx.e.and_ri32(u, 0x100);
    ctx.e.shl_i32(u, 21);
    ctx.e.or_rr32(t, u);
    ctx.e.and_ri32(d, 1);
    ctx.e.shl_i32(d, 28);
    ctx.e.or_rr32(d, t);
}

fn emit_bx_write_pc(ctx: &mut EmitContext<'_>, inst: Inst) {
    let v = arg(ctx, inst, 0);
    let upper =
        Mem::base_disp(STATE, off(core::mem::offset_of!(A32JitState, upper_location_descriptor)));

    let d = ctx.ra.use_scratch_gpr(&mut ctx.e, v);
    let t = ctx.ra.scratch_gpr(&mut ctx.e);
    let u = ctx.ra.scratch_gpr(&mut ctx.e);

    // New T bit from bit 0 of the target; an interworking branch also ends
    // any IT block, so those bits clear.
    ctx.e.mov_rr32(t, d);
    ctx.e.and_ri32(t, 1);
    ctx.e.mov_r32_m32(u, upper);
    ctx.e.and_ri32(u, !0xFF01);
    ctx.e.or_rr32(u, t);
    ctx.e.mov_m32_r32(upper, u);

    // Alignment mask: ~1 for Thumb targets, ~3 for ARM targets.
    ctx.e.shl_i32(t, 1);
    ctx.e.or_ri32(t, 0xFFFF_FFFCu32 as i32);
    ctx.e.and_rr32(d, t);
    ctx.e.mov_m32_r32(reg_mem(15), d);
}

fn emit_push_rsb(ctx: &mut EmitContext<'_>, inst: Inst) {
    if !ctx.config.enable_rsb {
        return;
    }
    let descriptor = arg(ctx, inst, 0).u64();
    let jsi = ctx.jsi();

    let t = ctx.ra.scratch_gpr(&mut ctx.e);
    let d = ctx.ra.scratch_gpr(&mut ctx.e);

    ctx.e.mov_r32_m32(t, Mem::base_disp(STATE, jsi.offsetof_rsb_ptr));
    ctx.e.add_ri32(t, 1);
    ctx.e.and_ri32(t, crate::jitstate::RSB_PTR_MASK as i32);
    ctx.e.mov_m32_r32(Mem::base_disp(STATE, jsi.offsetof_rsb_ptr), t);
    ctx.e.shl_i32(t, 3);

    ctx.e.mov_ri64(d, descriptor);
    ctx.e.mov_m64_r64(
        Mem { base: STATE, index: Some(t), disp: jsi.offsetof_rsb_location_descriptors },
        d,
    );

    // The code pointer is an imm64 patched by the linker; until the target
    // exists it points at the dispatcher re-entry path.
    let imm_at = ctx.e.pos();
    ctx.e.mov_ri64_abs(d, 0);
    ctx.block_link(
        armjit_ir::LocationDescriptor::new(descriptor),
        BlockRelocation::Imm64(imm_at),
    );
    ctx.e.mov_m64_r64(
        Mem { base: STATE, index: Some(t), disp: jsi.offsetof_rsb_codeptrs },
        d,
    );
}

// Host-call helpers for the CPSR/FPSCR compositions.

extern "C" fn helper_a32_get_cpsr(state: *mut A32JitState) -> u32 {
    unsafe { (*state).cpsr() }
}

extern "C" fn helper_a32_set_cpsr(state: *mut A32JitState, value: u32) {
    unsafe { (*state).set_cpsr(value) };
}

extern "C" fn helper_a32_get_fpscr(state: *mut A32JitState) -> u32 {
    unsafe { (*state).fpscr() }
}

extern "C" fn helper_a32_set_fpscr(state: *mut A32JitState, value: u32) {
    unsafe { (*state).set_fpscr(value) };
}
