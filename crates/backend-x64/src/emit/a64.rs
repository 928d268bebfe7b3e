//! Emitters for the A64 guest-state micro-ops.

use armjit_ir::{Inst, Opcode};

use crate::abi::{Gpr, STATE};
use crate::assembler::Mem;
use crate::callbacks::LinkTarget;
use crate::jitstate::{A64JitState, NZCV_C_HOST};

use super::a32::{emit_arm_to_host_nzcv, emit_host_to_arm_nzcv};
use super::data_processing::arg;
use super::memory::{self, ExclusiveInfo};
use super::{BlockRelocation, EmitContext};

fn off(field_offset: usize) -> i32 {
    field_offset as i32
}

fn reg_mem(index: usize) -> Mem {
    Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, regs)) + (index * 8) as i32)
}

fn vec_mem(index: usize) -> Mem {
    Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, vec)) + (index * 16) as i32)
}

fn nzcv_mem() -> Mem {
    Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, cpsr_nzcv)))
}

fn excl_info() -> ExclusiveInfo {
    ExclusiveInfo {
        offsetof_state: off(core::mem::offset_of!(A64JitState, exclusive_state)),
        offsetof_address: off(core::mem::offset_of!(A64JitState, exclusive_address)),
        granule_mask: -8,
        wide_address: true,
    }
}

pub(super) fn try_emit(ctx: &mut EmitContext<'_>, inst: Inst, op: Opcode) -> bool {
    match op {
        Opcode::A64GetW | Opcode::A64GetX => {
            let reg = arg(ctx, inst, 0).a64_reg();
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            if op == Opcode::A64GetW {
                ctx.e.mov_r32_m32(d, reg_mem(reg.index()));
            } else {
                ctx.e.mov_r64_m64(d, reg_mem(reg.index()));
            }
        }
        Opcode::A64SetW | Opcode::A64SetX => {
            let reg = arg(ctx, inst, 0).a64_reg();
            let operand = arg(ctx, inst, 1);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            // W values are zero extended, so a 64-bit store covers both.
            ctx.e.mov_m64_r64(reg_mem(reg.index()), r);
        }
        Opcode::A64GetSP => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r64_m64(d, Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, sp))));
        }
        Opcode::A64SetSP => {
            let operand = arg(ctx, inst, 0);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m64_r64(Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, sp))), r);
        }
        Opcode::A64SetPC => {
            let operand = arg(ctx, inst, 0);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m64_r64(Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, pc))), r);
        }

        Opcode::A64GetS => {
            let vec = arg(ctx, inst, 0).a64_vec();
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r32_m32(d, vec_mem(vec.index()));
        }
        Opcode::A64GetD => {
            let vec = arg(ctx, inst, 0).a64_vec();
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r64_m64(d, vec_mem(vec.index()));
        }
        Opcode::A64GetQ => {
            let vec = arg(ctx, inst, 0).a64_vec();
            let d = ctx.ra.def_xmm(&mut ctx.e, inst);
            ctx.e.movdqu_xmm_m(d, vec_mem(vec.index()));
        }
        Opcode::A64SetS => {
            // Scalar writes zero the remainder of the vector register.
            let vec = arg(ctx, inst, 0).a64_vec();
            let operand = arg(ctx, inst, 1);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m64_r64(vec_mem(vec.index()), r);
            let mut hi = vec_mem(vec.index());
            hi.disp += 8;
            ctx.e.mov_m64_i32(hi, 0);
        }
        Opcode::A64SetD => {
            let vec = arg(ctx, inst, 0).a64_vec();
            let operand = arg(ctx, inst, 1);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m64_r64(vec_mem(vec.index()), r);
            let mut hi = vec_mem(vec.index());
            hi.disp += 8;
            ctx.e.mov_m64_i32(hi, 0);
        }
        Opcode::A64SetQ => {
            let vec = arg(ctx, inst, 0).a64_vec();
            let operand = arg(ctx, inst, 1);
            let x = ctx.ra.use_xmm(&mut ctx.e, operand);
            ctx.e.movdqu_m_xmm(vec_mem(vec.index()), x);
        }

        Opcode::A64GetCFlag => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r32_m32(d, nzcv_mem());
            ctx.e.shr_i32(d, NZCV_C_HOST.trailing_zeros() as u8);
            ctx.e.and_ri32(d, 1);
        }
        Opcode::A64GetNZCVRaw => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            let t = ctx.ra.scratch_gpr(&mut ctx.e);
            let u = ctx.ra.scratch_gpr(&mut ctx.e);
            ctx.e.mov_r32_m32(d, nzcv_mem());
            emit_host_to_arm_nzcv(ctx, d, t, u);
        }
        Opcode::A64SetNZCVRaw => {
            let operand = arg(ctx, inst, 0);
            let d = ctx.ra.use_scratch_gpr(&mut ctx.e, operand);
            let t = ctx.ra.scratch_gpr(&mut ctx.e);
            let u = ctx.ra.scratch_gpr(&mut ctx.e);
            emit_arm_to_host_nzcv(ctx, d, t, u);
            ctx.e.mov_m32_r32(nzcv_mem(), d);
        }
        Opcode::A64SetNZCV => {
            let operand = arg(ctx, inst, 0);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m32_r32(nzcv_mem(), r);
        }

        Opcode::A64GetFpcr => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r32_m32(d, Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, fpcr))));
        }
        Opcode::A64SetFpcr => {
            let v = arg(ctx, inst, 0);
            ctx.ra.prepare_for_call(&mut ctx.e, &[v], 1);
            ctx.e.mov_rr64(Gpr::Rdi, STATE);
            ctx.e.mov_ri64(Gpr::Rax, helper_a64_set_fpcr as usize as u64);
            ctx.e.call_r64(Gpr::Rax);
            ctx.e.ldmxcsr(Mem::base_disp(STATE, ctx.jsi().offsetof_guest_mxcsr));
        }
        Opcode::A64GetFpsr => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_r32_m32(d, Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, fpsr))));
        }
        Opcode::A64SetFpsr => {
            let operand = arg(ctx, inst, 0);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m32_r32(Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, fpsr))), r);
        }

        Opcode::A64GetTPIDR => emit_get_u64(ctx, inst, core::mem::offset_of!(A64JitState, tpidr)),
        Opcode::A64GetTPIDRRO => {
            emit_get_u64(ctx, inst, core::mem::offset_of!(A64JitState, tpidrro))
        }
        Opcode::A64SetTPIDR => {
            let operand = arg(ctx, inst, 0);
            let r = ctx.ra.use_gpr(&mut ctx.e, operand);
            ctx.e.mov_m64_r64(
                Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, tpidr))),
                r,
            );
        }
        Opcode::A64GetCNTFRQ => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_ri32(d, ctx.config.cntfrq_el0);
        }
        Opcode::A64GetCTR => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_ri32(d, ctx.config.ctr_el0);
        }
        Opcode::A64GetDCZID => {
            let d = ctx.ra.def_gpr(&mut ctx.e, inst);
            ctx.e.mov_ri32(d, ctx.config.dczid_el0);
        }
        Opcode::A64GetCNTPCT => {
            ctx.ra.prepare_for_call(&mut ctx.e, &[], 1);
            ctx.call_link_target(LinkTarget::GetCNTPCT);
            ctx.ra.def_fixed_gpr(inst, Gpr::Rax);
        }

        Opcode::A64PushRSB => emit_push_rsb(ctx, inst),

        Opcode::A64CallSupervisor => {
            let v = arg(ctx, inst, 0);
            ctx.ra.prepare_for_call(&mut ctx.e, &[v], 1);
            ctx.call_link_target(LinkTarget::CallSVC);
        }
        Opcode::A64ExceptionRaised => {
            let (pc, kind) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
            ctx.ra.prepare_for_call(&mut ctx.e, &[pc, kind], 1);
            ctx.call_link_target(LinkTarget::ExceptionRaised);
        }
        Opcode::A64DataCacheOperationRaised => {
            let (op_imm, vaddr) = (arg(ctx, inst, 0), arg(ctx, inst, 1));
            ctx.ra.prepare_for_call(&mut ctx.e, &[op_imm, vaddr], 1);
            ctx.call_link_target(LinkTarget::DataCacheOperationRaised);
        }
        Opcode::A64InstructionCacheOperationRaised => {
            let vaddr = arg(ctx, inst, 0);
            ctx.ra.prepare_for_call(&mut ctx.e, &[vaddr], 1);
            ctx.call_link_target(LinkTarget::InstructionCacheOperationRaised);
        }

        Opcode::A64DataSynchronizationBarrier | Opcode::A64DataMemoryBarrier => ctx.e.mfence(),
        Opcode::A64InstructionSynchronizationBarrier => {}

        Opcode::A64ClearExclusive => {
            ctx.e.mov_m32_i32(
                Mem::base_disp(STATE, off(core::mem::offset_of!(A64JitState, exclusive_state))),
                0,
            );
        }

        Opcode::A64ReadMemory8 => read(ctx, inst, 8),
        Opcode::A64ReadMemory16 => read(ctx, inst, 16),
        Opcode::A64ReadMemory32 => read(ctx, inst, 32),
        Opcode::A64ReadMemory64 => read(ctx, inst, 64),
        Opcode::A64ReadMemory128 => read(ctx, inst, 128),
        Opcode::A64ExclusiveReadMemory8 => exclusive_read(ctx, inst, 8),
        Opcode::A64ExclusiveReadMemory16 => exclusive_read(ctx, inst, 16),
        Opcode::A64ExclusiveReadMemory32 => exclusive_read(ctx, inst, 32),
        Opcode::A64ExclusiveReadMemory64 => exclusive_read(ctx, inst, 64),
        Opcode::A64ExclusiveReadMemory128 => exclusive_read(ctx, inst, 128),
        Opcode::A64WriteMemory8 => write(ctx, inst, 8),
        Opcode::A64WriteMemory16 => write(ctx, inst, 16),
        Opcode::A64WriteMemory32 => write(ctx, inst, 32),
        Opcode::A64WriteMemory64 => write(ctx, inst, 64),
        Opcode::A64WriteMemory128 => write(ctx, inst, 128),
        Opcode::A64ExclusiveWriteMemory8 => exclusive_write(ctx, inst, 8),
        Opcode::A64ExclusiveWriteMemory16 => exclusive_write(ctx, inst, 16),
        Opcode::A64ExclusiveWriteMemory32 => exclusive_write(ctx, inst, 32),
        Opcode::A64ExclusiveWriteMemory64 => exclusive_write(ctx, inst, 64),
        Opcode::A64ExclusiveWriteMemory128 => exclusive_write(ctx, inst, 128),

        _ => return false,
    }
    true
}

fn emit_get_u64(ctx: &mut EmitContext<'_>, inst: Inst, field_offset: usize) {
    let d = ctx.ra.def_gpr(&mut ctx.e, inst);
    ctx.e.mov_r64_m64(d, Mem::base_disp(STATE, off(field_offset)));
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

    let imm_at = ctx.e.pos();
    ctx.e.mov_ri64_abs(d, 0);
    ctx.block_link(
        armjit_ir::LocationDescriptor::new(descriptor),
        BlockRelocation::Imm64(imm_at),
    );
    ctx.e.mov_m64_r64(Mem { base: STATE, index: Some(t), disp: jsi.offsetof_rsb_codeptrs }, d);
}

extern "C" fn helper_a64_set_fpcr(state: *mut A64JitState, value: u32) {
    unsafe { (*state).set_fpcr(value) };
}
