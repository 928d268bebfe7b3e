//! IR-to-x64 emission.
//!
//! One emitter per IR opcode walks the optimised block in order; the
//! register allocator supplies operands. Terminals are emitted last, with
//! patchable branch slots recorded for the linker.

mod a32;
mod a64;
mod data_processing;
mod fp;
mod memory;
mod terminal;

pub(crate) mod fp_helpers;

use armjit_ir::{Block, Inst, LocationDescriptor, Opcode};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::assembler::CodeEmitter;
use crate::callbacks::{JitStateInfo, LinkTarget};
use crate::regalloc::RegAlloc;

/// Which guest architecture a block belongs to; selects state layout and a
/// few terminal details.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuestArch {
    A32,
    A64,
}

/// Everything emission needs beyond the IR itself.
#[derive(Clone, Copy)]
pub struct EmitConfig {
    pub arch: GuestArch,
    pub jsi: JitStateInfo,
    /// Offset of the host-format NZCV word in the state record.
    pub offsetof_cpsr_nzcv: i32,
    /// Offset and mask locating the FPCR bits for reference-library calls.
    pub offsetof_fpcr: i32,
    pub fpcr_mask: u32,
    /// Offset of the raw FPSR accumulation word.
    pub offsetof_fpsr: i32,
    /// Fastmem: emitted loads/stores go straight through the pinned base
    /// register; faults divert to the callback path.
    pub fastmem: bool,
    /// Fast dispatch table (pointer to entries of `(descriptor, code)`),
    /// null when the optimisation is disabled.
    pub fast_dispatch_table: *const u8,
    pub fast_dispatch_table_mask: u32,
    /// A64 read-only system register values.
    pub cntfrq_el0: u32,
    pub ctr_el0: u32,
    pub dczid_el0: u32,
    pub enable_cycle_counting: bool,
    /// Gates from the optimisation bitmask.
    pub enable_block_linking: bool,
    pub enable_rsb: bool,
}

/// A patchable block-to-block link site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockRelocation {
    /// A 5-byte `jmp rel32` slot; patched to the target or to a NOP.
    Branch(usize),
    /// A `mov r64, imm64` whose immediate is a code address; patched to the
    /// target entry point or to the dispatcher re-entry point.
    Imm64(usize),
}

/// A fastmem access site: the offset of the faulting instruction and the
/// far-code thunk that performs the callback path.
#[derive(Clone, Copy, Debug)]
pub struct FastmemPatch {
    pub load_offset: usize,
    pub load_len: usize,
    pub thunk_offset: usize,
}

/// Everything the linker needs to know about an emitted block.
pub struct EmittedBlockInfo {
    /// Arena offset of the entry point.
    pub entry_offset: usize,
    /// Total bytes of near code.
    pub size: usize,
    /// Trampoline/prelude relocations: `call`/`jmp rel32` sites by arena
    /// offset.
    pub relocations: Vec<(usize, LinkTarget)>,
    /// Block link sites grouped by the descriptor they await.
    pub block_relocations: FxHashMap<LocationDescriptor, SmallVec<[BlockRelocation; 2]>>,
    /// Fastmem sites registered with the exception handler.
    pub fastmem_patches: Vec<FastmemPatch>,
    /// Guest address range this block translates, for range invalidation.
    pub guest_range: (u64, u64),
}

/// Mutable emission state threaded through the per-opcode emitters.
pub struct EmitContext<'a> {
    pub e: CodeEmitter,
    pub ra: RegAlloc,
    pub block: &'a Block,
    pub config: &'a EmitConfig,
    pub relocations: Vec<(usize, LinkTarget)>,
    pub block_relocations: FxHashMap<LocationDescriptor, SmallVec<[BlockRelocation; 2]>>,
    pub fastmem_patches: Vec<FastmemPatch>,
    near_pos_saved: usize,
    far_pos: usize,
    pub in_far: bool,
}

impl<'a> EmitContext<'a> {
    /// Record a `call rel32` to a prelude trampoline.
    pub fn call_link_target(&mut self, target: LinkTarget) {
        let at = self.e.call_rel32_placeholder();
        self.relocations.push((at, target));
    }

    /// Record a `jmp rel32` to a prelude entry point.
    pub fn jump_link_target(&mut self, target: LinkTarget) {
        let at = self.e.jmp_rel32_placeholder();
        self.relocations.push((at, target));
    }

    /// Record a patchable block link slot.
    pub fn block_link(&mut self, target: LocationDescriptor, relocation: BlockRelocation) {
        self.block_relocations.entry(target).or_default().push(relocation);
    }

    /// Move emission to the far (cold) area.
    pub fn switch_to_far_code(&mut self) {
        assert!(!self.in_far);
        self.near_pos_saved = self.e.pos();
        let far = self.far_pos;
        self.e.set_pos(far);
        self.in_far = true;
    }

    pub fn switch_to_near_code(&mut self) {
        assert!(self.in_far);
        self.far_pos = self.e.pos();
        let near = self.near_pos_saved;
        self.e.set_pos(near);
        self.in_far = false;
    }

    /// Offset of the state spill area plus `slot * 8`.
    pub fn jsi(&self) -> JitStateInfo {
        self.config.jsi
    }
}

/// Emit one block at the current near cursor. The caller is responsible for
/// the pre-block space check and W^X bracketing.
pub fn emit_block(
    e: CodeEmitter,
    far_pos: usize,
    block: &Block,
    config: &EmitConfig,
) -> (EmittedBlockInfo, usize, usize) {
    let entry_offset = e.pos();
    let ra = RegAlloc::new(block, config.jsi, config.fastmem);

    let mut ctx = EmitContext {
        e,
        ra,
        block,
        config,
        relocations: Vec::new(),
        block_relocations: FxHashMap::default(),
        fastmem_patches: Vec::new(),
        near_pos_saved: 0,
        far_pos,
        in_far: false,
    };

    // Charge the block's cycles up front.
    if config.enable_cycle_counting && block.cycle_count != 0 {
        let mem = crate::assembler::Mem::base_disp(
            crate::abi::STATE,
            config.jsi.offsetof_cycles_remaining,
        );
        ctx.e.sub_m64_i32(mem, block.cycle_count as i32);
    }

    // A conditional block body only runs when the block condition passes;
    // otherwise control continues at `cond_failed`.
    let cond_exit = if block.cond != armjit_ir::Cond::AL {
        Some(terminal::emit_block_cond_prelude(&mut ctx))
    } else {
        None
    };

    for inst in block.iter() {
        emit_inst(&mut ctx, inst);
        ctx.ra.end_of_instruction();
    }
    ctx.ra.assert_all_dead();

    terminal::emit_terminal(&mut ctx, block.terminal(), block.location());

    if let Some(label) = cond_exit {
        terminal::emit_cond_failed_exit(&mut ctx, label, block);
    }

    ctx.e.assert_labels_resolved();

    let end = ctx.e.pos();
    let info = EmittedBlockInfo {
        entry_offset,
        size: end - entry_offset,
        relocations: ctx.relocations,
        block_relocations: ctx.block_relocations,
        fastmem_patches: ctx.fastmem_patches,
        guest_range: guest_range_of(block, config.arch),
    };
    (info, end, ctx.far_pos)
}

fn guest_range_of(block: &Block, arch: GuestArch) -> (u64, u64) {
    match arch {
        GuestArch::A32 => {
            let start = block.location().value() >> 32;
            let end = block.end_location().value() >> 32;
            (start, end.saturating_sub(start).max(4))
        }
        GuestArch::A64 => {
            let mask = 0x00FF_FFFF_FFFF_FFFF;
            let start = block.location().value() & mask;
            let end = block.end_location().value() & mask;
            (start, end.saturating_sub(start).max(4))
        }
    }
}

fn emit_inst(ctx: &mut EmitContext<'_>, inst: Inst) {
    let opcode = ctx.block[inst].opcode;
    match opcode {
        // Pseudo operations are defined by their producer's emitter.
        Opcode::GetCarryFromOp | Opcode::GetOverflowFromOp | Opcode::GetNZCVFromOp => {}
        Opcode::Void => {}
        op => {
            if a32::try_emit(ctx, inst, op) {
                return;
            }
            if a64::try_emit(ctx, inst, op) {
                return;
            }
            if fp::try_emit(ctx, inst, op) {
                return;
            }
            if data_processing::try_emit(ctx, inst, op) {
                return;
            }
            panic!("no emitter for {}", op.name());
        }
    }
}
