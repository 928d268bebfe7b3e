//! Terminal emission: how a block hands control onward.

use armjit_ir::{Block, Cond, LocationDescriptor, Terminal};

use crate::abi::{Gpr, STATE};
use crate::assembler::{Cc, Label, Mem};
use crate::callbacks::LinkTarget;
use crate::jitstate::RSB_PTR_MASK;

use super::{BlockRelocation, EmitContext, GuestArch};

/// Map an ARM condition onto a host condition over the loaded flags; some
/// conditions need the carry flag inverted first.
pub(super) fn cond_to_cc(cond: Cond) -> (Cc, bool) {
    match cond {
        Cond::EQ => (Cc::E, false),
        Cond::NE => (Cc::Ne, false),
        Cond::CS => (Cc::B, false),
        Cond::CC => (Cc::Ae, false),
        Cond::MI => (Cc::S, false),
        Cond::PL => (Cc::Ns, false),
        Cond::VS => (Cc::O, false),
        Cond::VC => (Cc::No, false),
        Cond::HI => (Cc::A, true),
        Cond::LS => (Cc::Be, true),
        Cond::GE => (Cc::Ge, false),
        Cond::LT => (Cc::L, false),
        Cond::GT => (Cc::G, false),
        Cond::LE => (Cc::Le, false),
        Cond::AL | Cond::NV => unreachable!("AL/NV are not conditional"),
    }
}

/// Load the guest NZCV into the host flags: SF/ZF/CF from the LAHF byte via
/// SAHF, OF recovered from bit 0 with the `add al, 0x7F` trick. Clobbers
/// RAX.
pub(super) fn load_guest_flags(ctx: &mut EmitContext<'_>) {
    let offset = ctx.config.offsetof_cpsr_nzcv;
    ctx.e.mov_r32_m32(Gpr::Rax, Mem::base_disp(STATE, offset));
    ctx.e.put1(0x04); // add al, imm8
    ctx.e.put1(0x7F);
    ctx.e.sahf();
}

/// Emit the conditional-block prelude: if the block condition fails, branch
/// to the cond-failed exit (emitted after the terminal). Returns the label
/// of that exit.
pub(super) fn emit_block_cond_prelude(ctx: &mut EmitContext<'_>) -> Label {
    let fail = ctx.e.new_label();
    load_guest_flags(ctx);
    let (cc, needs_cmc) = cond_to_cc(ctx.block.cond.invert());
    if needs_cmc {
        ctx.e.cmc();
    }
    ctx.e.jcc_label(cc, fail);
    fail
}

/// The exit taken when the block condition fails: link to `cond_failed`.
pub(super) fn emit_cond_failed_exit(ctx: &mut EmitContext<'_>, fail: Label, block: &Block) {
    ctx.e.bind(fail);
    let next = block.cond_failed.expect("conditional block without a cond_failed location");
    emit_terminal(ctx, &Terminal::LinkBlock { next }, block.location());
}

/// Emit code for a terminal.
pub(super) fn emit_terminal(
    ctx: &mut EmitContext<'_>,
    terminal: &Terminal,
    initial_location: LocationDescriptor,
) {
    match terminal {
        Terminal::Invalid => panic!("cannot emit an invalid terminal"),

        Terminal::Interpret { next, num_instructions } => {
            emit_set_pc_and_upper(ctx, initial_location, *next);
            let pc = guest_pc(ctx.config.arch, *next);
            ctx.e.mov_ri64(Gpr::Rsi, pc);
            ctx.e.mov_ri64(Gpr::Rdx, *num_instructions as u64);
            ctx.call_link_target(LinkTarget::InterpreterFallback);
            ctx.jump_link_target(LinkTarget::ReturnToDispatcher);
        }

        Terminal::ReturnToDispatch => {
            // With the fast-dispatch table enabled, indirect exits try the
            // hashed lookup before falling back to the dispatcher.
            if ctx.config.fast_dispatch_table.is_null() {
                ctx.jump_link_target(LinkTarget::ReturnToDispatcher);
            } else {
                emit_fast_dispatch(ctx);
            }
        }

        Terminal::LinkBlock { next } => {
            emit_halt_check(ctx);
            emit_set_upper_if_changed(ctx, initial_location, *next);
            // Budget check, then the patchable direct jump; on a miss (or
            // while unpatched) store the PC and go through the dispatcher.
            let miss = ctx.e.new_label();
            if ctx.config.enable_cycle_counting {
                ctx.e.cmp_m64_i32(
                    Mem::base_disp(STATE, ctx.jsi().offsetof_cycles_remaining),
                    0,
                );
                ctx.e.jcc_label(Cc::Le, miss);
            }
            if ctx.config.enable_block_linking {
                let slot = ctx.e.jmp_rel32_placeholder();
                ctx.e.patch_nop5(slot);
                ctx.block_link(*next, BlockRelocation::Branch(slot));
            }
            ctx.e.bind(miss);
            emit_store_pc(ctx, *next);
            ctx.jump_link_target(LinkTarget::ReturnToDispatcher);
        }

        Terminal::LinkBlockFast { next } => {
            emit_halt_check(ctx);
            emit_set_upper_if_changed(ctx, initial_location, *next);
            if ctx.config.enable_block_linking {
                let slot = ctx.e.jmp_rel32_placeholder();
                ctx.e.patch_nop5(slot);
                ctx.block_link(*next, BlockRelocation::Branch(slot));
            }
            emit_store_pc(ctx, *next);
            ctx.jump_link_target(LinkTarget::ReturnToDispatcher);
        }

        Terminal::PopRSBHint => {
            emit_halt_check(ctx);
            if !ctx.config.enable_rsb {
                ctx.jump_link_target(LinkTarget::ReturnToDispatcher);
                return;
            }
            // rcx = current descriptor, rdx = decremented RSB index.
            emit_compose_descriptor(ctx, Gpr::Rcx);
            let jsi = ctx.jsi();
            ctx.e.mov_r32_m32(Gpr::Rdx, Mem::base_disp(STATE, jsi.offsetof_rsb_ptr));
            ctx.e.add_ri32(Gpr::Rdx, -1);
            ctx.e.and_ri32(Gpr::Rdx, RSB_PTR_MASK as i32);
            ctx.e.mov_m32_r32(Mem::base_disp(STATE, jsi.offsetof_rsb_ptr), Gpr::Rdx);
            ctx.e.shl_i32(Gpr::Rdx, 3);
            ctx.e.cmp_r64_m64(
                Gpr::Rcx,
                Mem {
                    base: STATE,
                    index: Some(Gpr::Rdx),
                    disp: jsi.offsetof_rsb_location_descriptors,
                },
            );
            let miss = ctx.e.new_label();
            ctx.e.jcc_label(Cc::Ne, miss);
            ctx.e.jmp_m64(Mem {
                base: STATE,
                index: Some(Gpr::Rdx),
                disp: jsi.offsetof_rsb_codeptrs,
            });
            ctx.e.bind(miss);
            ctx.jump_link_target(LinkTarget::ReturnToDispatcher);
        }

        Terminal::FastDispatchHint => {
            if ctx.config.fast_dispatch_table.is_null() {
                emit_halt_check(ctx);
                ctx.jump_link_target(LinkTarget::ReturnToDispatcher);
                return;
            }
            emit_fast_dispatch(ctx);
        }

        Terminal::If { cond, then_, else_ } => {
            load_guest_flags(ctx);
            let (cc, needs_cmc) = cond_to_cc(cond.invert());
            if needs_cmc {
                ctx.e.cmc();
            }
            let else_label = ctx.e.new_label();
            ctx.e.jcc_label(cc, else_label);
            emit_terminal(ctx, then_, initial_location);
            ctx.e.bind(else_label);
            emit_terminal(ctx, else_, initial_location);
        }

        Terminal::CheckBit { then_, else_ } => {
            let offset = ctx.jsi().offsetof_check_bit;
            ctx.e.movzx_r32_m8(Gpr::Rax, Mem::base_disp(STATE, offset));
            ctx.e.test_rr32(Gpr::Rax, Gpr::Rax);
            let else_label = ctx.e.new_label();
            ctx.e.jcc_label(Cc::E, else_label);
            emit_terminal(ctx, then_, initial_location);
            ctx.e.bind(else_label);
            emit_terminal(ctx, else_, initial_location);
        }

        Terminal::CheckHalt { else_ } => {
            emit_halt_check(ctx);
            emit_terminal(ctx, else_, initial_location);
        }
    }
}

/// Hashed direct-mapped lookup over the fast dispatch table; each entry is
/// 16 bytes of (descriptor, code pointer). Misses and exhausted budgets go
/// through the dispatcher.
fn emit_fast_dispatch(ctx: &mut EmitContext<'_>) {
    emit_halt_check(ctx);
    let miss = ctx.e.new_label();
    if ctx.config.enable_cycle_counting {
        ctx.e.cmp_m64_i32(Mem::base_disp(STATE, ctx.jsi().offsetof_cycles_remaining), 0);
        ctx.e.jcc_label(Cc::Le, miss);
    }

    emit_compose_descriptor(ctx, Gpr::Rcx);
    ctx.e.mov_rr64(Gpr::Rdx, Gpr::Rcx);
    ctx.e.shr_i64(Gpr::Rdx, 13);
    ctx.e.xor_rr64(Gpr::Rdx, Gpr::Rcx);
    ctx.e.and_ri64(Gpr::Rdx, ctx.config.fast_dispatch_table_mask as i32);
    ctx.e.shl_i64(Gpr::Rdx, 4);
    ctx.e.mov_ri64(Gpr::Rax, ctx.config.fast_dispatch_table as u64);
    ctx.e.add_rr64(Gpr::Rdx, Gpr::Rax);
    ctx.e.cmp_r64_m64(Gpr::Rcx, Mem::base(Gpr::Rdx));
    ctx.e.jcc_label(Cc::Ne, miss);
    ctx.e.cmp_m64_i32(Mem::base_disp(Gpr::Rdx, 8), 0);
    ctx.e.jcc_label(Cc::E, miss);
    ctx.e.jmp_m64(Mem::base_disp(Gpr::Rdx, 8));
    ctx.e.bind(miss);
    ctx.jump_link_target(LinkTarget::ReturnToDispatcher);
}

/// Branch to return-from-run-code when a halt has been requested. Every
/// block boundary passes through one of these.
fn emit_halt_check(ctx: &mut EmitContext<'_>) {
    ctx.e.cmp_m32_i32(Mem::base_disp(STATE, ctx.jsi().offsetof_halt_reason), 0);
    let ok = ctx.e.new_label();
    ctx.e.jcc_label(Cc::E, ok);
    ctx.jump_link_target(LinkTarget::ReturnFromRunCode);
    ctx.e.bind(ok);
}

fn guest_pc(arch: GuestArch, location: LocationDescriptor) -> u64 {
    match arch {
        GuestArch::A32 => location.value() >> 32,
        GuestArch::A64 => {
            let pc = location.value() & 0x00FF_FFFF_FFFF_FFFF;
            ((pc << 8) as i64 >> 8) as u64
        }
    }
}

/// Store the target PC into the state record.
fn emit_store_pc(ctx: &mut EmitContext<'_>, target: LocationDescriptor) {
    match ctx.config.arch {
        GuestArch::A32 => {
            let pc = (target.value() >> 32) as u32;
            let offset = core::mem::offset_of!(crate::jitstate::A32JitState, regs) as i32 + 15 * 4;
            ctx.e.mov_m32_i32(Mem::base_disp(STATE, offset), pc);
        }
        GuestArch::A64 => {
            let pc = guest_pc(GuestArch::A64, target);
            let offset = core::mem::offset_of!(crate::jitstate::A64JitState, pc) as i32;
            ctx.e.mov_ri64(Gpr::Rax, pc);
            ctx.e.mov_m64_r64(Mem::base_disp(STATE, offset), Gpr::Rax);
        }
    }
}

/// Update the stored non-PC descriptor bits if the target differs from the
/// block's own context (A32: Thumb/IT/FPSCR changes).
fn emit_set_upper_if_changed(
    ctx: &mut EmitContext<'_>,
    from: LocationDescriptor,
    to: LocationDescriptor,
) {
    if ctx.config.arch != GuestArch::A32 {
        return;
    }
    let from_upper = from.value() as u32;
    let to_upper = to.value() as u32;
    if from_upper != to_upper {
        let offset =
            core::mem::offset_of!(crate::jitstate::A32JitState, upper_location_descriptor) as i32;
        ctx.e.mov_m32_i32(Mem::base_disp(STATE, offset), to_upper);
    }
}

fn emit_set_pc_and_upper(
    ctx: &mut EmitContext<'_>,
    from: LocationDescriptor,
    to: LocationDescriptor,
) {
    emit_set_upper_if_changed(ctx, from, to);
    emit_store_pc(ctx, to);
}

/// Compose the current runtime descriptor into `dst` from the state record.
fn emit_compose_descriptor(ctx: &mut EmitContext<'_>, dst: Gpr) {
    match ctx.config.arch {
        GuestArch::A32 => {
            let pc_offset =
                core::mem::offset_of!(crate::jitstate::A32JitState, regs) as i32 + 15 * 4;
            let upper_offset =
                core::mem::offset_of!(crate::jitstate::A32JitState, upper_location_descriptor)
                    as i32;
            ctx.e.mov_r32_m32(dst, Mem::base_disp(STATE, pc_offset));
            ctx.e.shl_i64(dst, 32);
            ctx.e.mov_r32_m32(Gpr::Rax, Mem::base_disp(STATE, upper_offset));
            ctx.e.or_rr64(dst, Gpr::Rax);
        }
        GuestArch::A64 => {
            let pc_offset = core::mem::offset_of!(crate::jitstate::A64JitState, pc) as i32;
            let fpcr_bits_offset =
                core::mem::offset_of!(crate::jitstate::A64JitState, fpcr_descriptor_bits) as i32;
            ctx.e.mov_ri64(dst, 0x00FF_FFFF_FFFF_FFFF);
            ctx.e.mov_r64_m64(Gpr::Rax, Mem::base_disp(STATE, pc_offset));
            ctx.e.and_rr64(dst, Gpr::Rax);
            ctx.e.mov_r64_m64(Gpr::Rax, Mem::base_disp(STATE, fpcr_bits_offset));
            ctx.e.or_rr64(dst, Gpr::Rax);
        }
    }
}
