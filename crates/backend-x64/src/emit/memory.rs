//! Memory access emission: the callback path, the fastmem path with its
//! fault thunks, and the exclusive-monitor contract.

use armjit_ir::{AccType, Inst, Value};

use crate::abi::{Gpr, Xmm, CALLER_SAVED_GPRS, FASTMEM_BASE, STATE};
use crate::assembler::{Cc, Mem};
use crate::callbacks::LinkTarget;

use super::{EmitContext, FastmemPatch};

/// Size of the thunk's XMM save area.
const XMM_AREA: i32 = 16 * 16;

pub(super) struct ExclusiveInfo {
    pub offsetof_state: i32,
    pub offsetof_address: i32,
    /// Sign-extendable granule mask (-8 for the 8-byte granule).
    pub granule_mask: i32,
    /// Whether the reservation address field is 64-bit.
    pub wide_address: bool,
}

fn read_target(bits: u32) -> LinkTarget {
    match bits {
        8 => LinkTarget::ReadMemory8,
        16 => LinkTarget::ReadMemory16,
        32 => LinkTarget::ReadMemory32,
        64 => LinkTarget::ReadMemory64,
        128 => LinkTarget::ReadMemory128,
        _ => unreachable!(),
    }
}

fn write_target(bits: u32) -> LinkTarget {
    match bits {
        8 => LinkTarget::WriteMemory8,
        16 => LinkTarget::WriteMemory16,
        32 => LinkTarget::WriteMemory32,
        64 => LinkTarget::WriteMemory64,
        128 => LinkTarget::WriteMemory128,
        _ => unreachable!(),
    }
}

fn exclusive_read_target(bits: u32) -> LinkTarget {
    match bits {
        8 => LinkTarget::ExclusiveReadMemory8,
        16 => LinkTarget::ExclusiveReadMemory16,
        32 => LinkTarget::ExclusiveReadMemory32,
        64 => LinkTarget::ExclusiveReadMemory64,
        128 => LinkTarget::ExclusiveReadMemory128,
        _ => unreachable!(),
    }
}

fn exclusive_write_target(bits: u32) -> LinkTarget {
    match bits {
        8 => LinkTarget::ExclusiveWriteMemory8,
        16 => LinkTarget::ExclusiveWriteMemory16,
        32 => LinkTarget::ExclusiveWriteMemory32,
        64 => LinkTarget::ExclusiveWriteMemory64,
        128 => LinkTarget::ExclusiveWriteMemory128,
        _ => unreachable!(),
    }
}

/// Emit a guest memory read of `bits` bits.
pub(super) fn emit_read(
    ctx: &mut EmitContext<'_>,
    inst: Inst,
    vaddr: Value,
    bits: u32,
    acc: AccType,
) {
    if ctx.config.fastmem && acc == AccType::Normal {
        emit_fastmem_read(ctx, inst, vaddr, bits);
        return;
    }

    ctx.ra.prepare_for_call(&mut ctx.e, &[vaddr], 1);
    ctx.call_link_target(read_target(bits));
    define_read_result(ctx, inst, bits);
    // Loads are acquire on the host's memory model already.
}

/// Emit a guest memory write of `bits` bits.
pub(super) fn emit_write(
    ctx: &mut EmitContext<'_>,
    _inst: Inst,
    vaddr: Value,
    value: Value,
    bits: u32,
    acc: AccType,
) {
    if ctx.config.fastmem && acc == AccType::Normal && bits != 128 {
        emit_fastmem_write(ctx, vaddr, value, bits);
        return;
    }

    if bits == 128 {
        // The value was spilled by the call preparation; marshal its halves
        // into the (rdx, rcx) pair straight from the slot.
        ctx.ra.prepare_for_call(&mut ctx.e, &[vaddr], 1);
        let mut slot = ctx.ra.spill_mem_of(value);
        ctx.e.mov_r64_m64(Gpr::Rdx, slot);
        slot.disp += 8;
        ctx.e.mov_r64_m64(Gpr::Rcx, slot);
        ctx.ra.consume(value);
    } else {
        ctx.ra.prepare_for_call(&mut ctx.e, &[vaddr, value], 1);
    }
    ctx.call_link_target(write_target(bits));

    if matches!(acc, AccType::Ordered | AccType::OrderedRw) {
        // Store-release needs nothing extra on TSO; a full barrier after
        // keeps the sequentially-consistent cases honest.
        ctx.e.mfence();
    }
}

fn define_read_result(ctx: &mut EmitContext<'_>, inst: Inst, bits: u32) {
    if bits == 128 {
        let d = ctx.ra.def_xmm(&mut ctx.e, inst);
        let hi = ctx.ra.scratch_xmm(&mut ctx.e);
        ctx.e.movq_xmm_r64(d, Gpr::Rax);
        ctx.e.movq_xmm_r64(hi, Gpr::Rdx);
        ctx.e.punpcklqdq(d, hi);
    } else {
        // Narrow returns only define the low bits of RAX; re-establish the
        // zero-extension invariant.
        match bits {
            8 => ctx.e.movzx_r32_r8(Gpr::Rax, Gpr::Rax),
            16 => ctx.e.movzx_r32_r16(Gpr::Rax, Gpr::Rax),
            32 => ctx.e.mov_rr32(Gpr::Rax, Gpr::Rax),
            _ => {}
        }
        ctx.ra.def_fixed_gpr(inst, Gpr::Rax);
    }
}

/// Direct host load off the pinned guest base, with a far-code thunk the
/// exception handler diverts to on a fault.
fn emit_fastmem_read(ctx: &mut EmitContext<'_>, inst: Inst, vaddr: Value, bits: u32) {
    let v = ctx.ra.use_gpr(&mut ctx.e, vaddr);
    let mem = Mem::base_index(FASTMEM_BASE, v);

    // Allocate the destination first: the faulting instruction itself must
    // be the last thing before the recorded offset.
    let (d_gpr, d_xmm) = if bits == 128 {
        (None, Some(ctx.ra.def_xmm(&mut ctx.e, inst)))
    } else {
        (Some(ctx.ra.def_gpr(&mut ctx.e, inst)), None)
    };

    let load_offset = ctx.e.pos();
    match (d_gpr, d_xmm) {
        (_, Some(d)) => ctx.e.movdqu_xmm_m(d, mem),
        (Some(d), _) => match bits {
            8 => ctx.e.movzx_r32_m8(d, mem),
            16 => ctx.e.movzx_r32_m16(d, mem),
            32 => ctx.e.mov_r32_m32(d, mem),
            64 => ctx.e.mov_r64_m64(d, mem),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    }
    let load_len = ctx.e.pos() - load_offset;

    ctx.switch_to_far_code();
    let thunk_offset = ctx.e.pos();
    {
        // Save first so the pops restore pre-fault register state, then
        // marshal the argument (saves do not disturb registers).
        let saved = push_thunk_context(ctx, d_gpr);
        if v != Gpr::Rsi {
            ctx.e.mov_rr64(Gpr::Rsi, v);
        }
        ctx.call_link_target(read_target(bits));
        if let Some(d) = d_xmm {
            let hi = if d.0 == 0 { Xmm(1) } else { Xmm(0) };
            ctx.e.movq_xmm_r64(d, Gpr::Rax);
            ctx.e.movq_xmm_r64(hi, Gpr::Rdx);
            ctx.e.punpcklqdq(d, hi);
        } else if let Some(d) = d_gpr {
            // Match the zero extension the inline load performs.
            match bits {
                8 => ctx.e.movzx_r32_r8(d, Gpr::Rax),
                16 => ctx.e.movzx_r32_r16(d, Gpr::Rax),
                32 => ctx.e.mov_rr32(d, Gpr::Rax),
                _ => {
                    if d != Gpr::Rax {
                        ctx.e.mov_rr64(d, Gpr::Rax);
                    }
                }
            }
        }
        pop_thunk_context(ctx, saved, d_xmm);
        ctx.e.ret();
    }
    ctx.switch_to_near_code();

    ctx.fastmem_patches.push(FastmemPatch { load_offset, load_len, thunk_offset });
}

fn emit_fastmem_write(ctx: &mut EmitContext<'_>, vaddr: Value, value: Value, bits: u32) {
    let v = ctx.ra.use_gpr(&mut ctx.e, vaddr);
    let val = ctx.ra.use_gpr(&mut ctx.e, value);
    let mem = Mem::base_index(FASTMEM_BASE, v);

    let load_offset = ctx.e.pos();
    match bits {
        8 => ctx.e.mov_m8_r8(mem, val),
        16 => ctx.e.mov_m16_r16(mem, val),
        32 => ctx.e.mov_m32_r32(mem, val),
        64 => ctx.e.mov_m64_r64(mem, val),
        _ => unreachable!(),
    }
    let load_len = ctx.e.pos() - load_offset;

    ctx.switch_to_far_code();
    let thunk_offset = ctx.e.pos();
    {
        // Save first so the pops restore pre-fault register state, then
        // marshal (vaddr, value) -> (rsi, rdx) via temporaries chosen to
        // avoid both source registers.
        let saved = push_thunk_context(ctx, None);
        let mut temps = [Gpr::Rax, Gpr::R10, Gpr::R11, Gpr::R9]
            .into_iter()
            .filter(|&t| t != v && t != val);
        let t1 = temps.next().unwrap();
        let t2 = temps.next().unwrap();
        ctx.e.mov_rr64(t1, v);
        ctx.e.mov_rr64(t2, val);
        ctx.e.mov_rr64(Gpr::Rsi, t1);
        ctx.e.mov_rr64(Gpr::Rdx, t2);
        ctx.call_link_target(write_target(bits));
        pop_thunk_context(ctx, saved, None);
        ctx.e.ret();
    }
    ctx.switch_to_near_code();

    ctx.fastmem_patches.push(FastmemPatch { load_offset, load_len, thunk_offset });
}

/// Save caller-saved GPRs (minus the result register) and every XMM
/// register around the thunk's call. Returns the pushed register list.
fn push_thunk_context(ctx: &mut EmitContext<'_>, result: Option<Gpr>) -> Vec<Gpr> {
    let pushed: Vec<Gpr> =
        CALLER_SAVED_GPRS.into_iter().filter(|&r| Some(r) != result).collect();
    for &reg in &pushed {
        ctx.e.push(reg);
    }
    // Entered by a fake call: rsp is 8 off from 16-alignment, so pad when
    // the push count is even.
    let area = if pushed.len() % 2 == 0 { XMM_AREA + 8 } else { XMM_AREA };
    ctx.e.sub_ri64(Gpr::Rsp, area);
    for i in 0..16 {
        ctx.e.movdqu_m_xmm(Mem::base_disp(Gpr::Rsp, i * 16), Xmm(i as u8));
    }
    pushed
}

fn pop_thunk_context(ctx: &mut EmitContext<'_>, pushed: Vec<Gpr>, skip_xmm: Option<Xmm>) {
    for i in 0..16 {
        if Some(Xmm(i as u8)) == skip_xmm {
            continue;
        }
        ctx.e.movdqu_xmm_m(Xmm(i as u8), Mem::base_disp(Gpr::Rsp, i * 16));
    }
    let area = if pushed.len() % 2 == 0 { XMM_AREA + 8 } else { XMM_AREA };
    ctx.e.add_ri64(Gpr::Rsp, area);
    for &reg in pushed.iter().rev() {
        ctx.e.pop(reg);
    }
}

/// Exclusive read: set the reservation, then read through the exclusive
/// callback (which marks the global monitor).
pub(super) fn emit_exclusive_read(
    ctx: &mut EmitContext<'_>,
    inst: Inst,
    vaddr: Value,
    bits: u32,
    excl: &ExclusiveInfo,
) {
    ctx.ra.prepare_for_call(&mut ctx.e, &[vaddr], 1);

    ctx.e.mov_m32_i32(Mem::base_disp(STATE, excl.offsetof_state), 1);
    ctx.e.mov_rr64(Gpr::Rax, Gpr::Rsi);
    ctx.e.and_ri64(Gpr::Rax, excl.granule_mask);
    if excl.wide_address {
        ctx.e.mov_m64_r64(Mem::base_disp(STATE, excl.offsetof_address), Gpr::Rax);
    } else {
        ctx.e.mov_m32_r32(Mem::base_disp(STATE, excl.offsetof_address), Gpr::Rax);
    }

    ctx.call_link_target(exclusive_read_target(bits));
    define_read_result(ctx, inst, bits);
}

/// Exclusive write: fail fast unless the reservation is held for this
/// granule; otherwise clear it and attempt the store through the exclusive
/// callback, which returns the architectural status.
pub(super) fn emit_exclusive_write(
    ctx: &mut EmitContext<'_>,
    inst: Inst,
    vaddr: Value,
    value: Value,
    bits: u32,
    excl: &ExclusiveInfo,
) {
    if bits == 128 {
        ctx.ra.prepare_for_call(&mut ctx.e, &[vaddr], 1);
        let mut slot = ctx.ra.spill_mem_of(value);
        ctx.e.mov_r64_m64(Gpr::Rdx, slot);
        slot.disp += 8;
        ctx.e.mov_r64_m64(Gpr::Rcx, slot);
        ctx.ra.consume(value);
    } else {
        ctx.ra.prepare_for_call(&mut ctx.e, &[vaddr, value], 1);
    }

    let fail = ctx.e.new_label();
    let done = ctx.e.new_label();

    ctx.e.cmp_m32_i32(Mem::base_disp(STATE, excl.offsetof_state), 0);
    ctx.e.jcc_label(Cc::E, fail);

    ctx.e.mov_rr64(Gpr::Rax, Gpr::Rsi);
    ctx.e.and_ri64(Gpr::Rax, excl.granule_mask);
    if excl.wide_address {
        ctx.e.cmp_r64_m64(Gpr::Rax, Mem::base_disp(STATE, excl.offsetof_address));
    } else {
        let t = Gpr::R10;
        ctx.e.mov_r32_m32(t, Mem::base_disp(STATE, excl.offsetof_address));
        ctx.e.cmp_rr64(Gpr::Rax, t);
    }
    ctx.e.jcc_label(Cc::Ne, fail);

    ctx.e.mov_m32_i32(Mem::base_disp(STATE, excl.offsetof_state), 0);
    ctx.call_link_target(exclusive_write_target(bits));
    ctx.e.jmp_label(done);

    ctx.e.bind(fail);
    ctx.e.mov_ri32(Gpr::Rax, 1);
    ctx.e.bind(done);
    ctx.e.mov_rr32(Gpr::Rax, Gpr::Rax);
    ctx.ra.def_fixed_gpr(inst, Gpr::Rax);
}
