//! The register allocator.
//!
//! Linear, block-local allocation: each IR value is assigned a host GPR (or
//! an XMM register for 128-bit values) on definition and tracked until its
//! last use, spilling into the state record's numbered spill slots under
//! pressure with LRU victim choice. Emitters request operands through the
//! `use_*`/`scratch_*`/`def_*` protocol and must consume exactly what they
//! declare; `end_of_instruction` releases dead values and unlocks registers
//! between micro-ops.

use armjit_ir::{Block, Inst, Value};

use crate::abi::{Gpr, Xmm, ABI_ARGS, ALLOCATABLE_GPRS, ALLOCATABLE_XMMS, CALLER_SAVED_GPRS};
use crate::assembler::{CodeEmitter, Mem};
use crate::callbacks::JitStateInfo;
use crate::hostloc::HostLoc;
use crate::jitstate::SPILL_COUNT;

#[derive(Clone, Copy, Default)]
struct ValueInfo {
    location: Option<HostLoc>,
    remaining_uses: u32,
}

#[derive(Clone, Copy, Default)]
struct RegState {
    value: Option<Inst>,
    locked: bool,
    last_touch: u64,
}

pub struct RegAlloc {
    jsi: JitStateInfo,
    fastmem_enabled: bool,
    values: Vec<ValueInfo>,
    gprs: [RegState; 16],
    xmms: [RegState; 16],
    spill_slots: [Option<Inst>; SPILL_COUNT],
    clock: u64,
}

impl RegAlloc {
    pub fn new(block: &Block, jsi: JitStateInfo, fastmem_enabled: bool) -> RegAlloc {
        let mut values = vec![ValueInfo::default(); block.len()];
        for inst in block.iter() {
            values[inst.index()].remaining_uses = block[inst].use_count;
        }
        RegAlloc {
            jsi,
            fastmem_enabled,
            values,
            gprs: [RegState::default(); 16],
            xmms: [RegState::default(); 16],
            spill_slots: [None; SPILL_COUNT],
            clock: 0,
        }
    }

    fn allocatable_gprs(&self) -> impl Iterator<Item = Gpr> + '_ {
        ALLOCATABLE_GPRS
            .into_iter()
            .filter(move |&reg| !(self.fastmem_enabled && reg == crate::abi::FASTMEM_BASE))
    }

    fn spill_mem(&self, slot: usize) -> Mem {
        Mem::base_disp(crate::abi::STATE, self.jsi.offsetof_spill + (slot * 8) as i32)
    }

    fn touch_gpr(&mut self, reg: Gpr) {
        self.clock += 1;
        self.gprs[reg.encoding() as usize].last_touch = self.clock;
    }

    fn touch_xmm(&mut self, reg: Xmm) {
        self.clock += 1;
        self.xmms[reg.encoding() as usize].last_touch = self.clock;
    }

    // ------------------------------------------------------------ GPR side

    /// A free (or freed-by-eviction) GPR, locked for this instruction.
    pub fn scratch_gpr(&mut self, e: &mut CodeEmitter) -> Gpr {
        let reg = self.free_gpr(e);
        self.gprs[reg.encoding() as usize].locked = true;
        self.touch_gpr(reg);
        reg
    }

    fn free_gpr(&mut self, e: &mut CodeEmitter) -> Gpr {
        // Prefer an empty unlocked register.
        if let Some(reg) = self
            .allocatable_gprs()
            .find(|&r| self.gprs[r.encoding() as usize].value.is_none() && !self.gprs[r.encoding() as usize].locked)
        {
            return reg;
        }

        // Evict the least recently touched unlocked register.
        let victim = self
            .allocatable_gprs()
            .filter(|&r| !self.gprs[r.encoding() as usize].locked)
            .min_by_key(|&r| self.gprs[r.encoding() as usize].last_touch)
            .expect("all registers locked by one instruction");
        self.spill_gpr(e, victim);
        victim
    }

    fn spill_gpr(&mut self, e: &mut CodeEmitter, reg: Gpr) {
        let state = &mut self.gprs[reg.encoding() as usize];
        let value = state.value.take().expect("spilling an empty register");
        let slot = self
            .spill_slots
            .iter()
            .position(|s| s.is_none())
            .expect("out of spill slots");
        self.spill_slots[slot] = Some(value);
        self.values[value.index()].location = Some(HostLoc::Spill(slot));
        e.mov_m64_r64(self.spill_mem(slot), reg);
    }

    /// Materialise `value` into a GPR for reading. The register stays bound
    /// to the value; the emitter must not write to it.
    pub fn use_gpr(&mut self, e: &mut CodeEmitter, value: Value) -> Gpr {
        match value.inst() {
            None => {
                let reg = self.scratch_gpr(e);
                e.mov_ri64(reg, value.immediate_u64());
                reg
            }
            Some(inst) => {
                let reg = self.ensure_in_gpr(e, inst);
                self.gprs[reg.encoding() as usize].locked = true;
                self.values[inst.index()].remaining_uses -= 1;
                reg
            }
        }
    }

    /// Materialise `value` into a GPR the emitter may clobber. If the value
    /// has further uses, a copy is preserved elsewhere first.
    pub fn use_scratch_gpr(&mut self, e: &mut CodeEmitter, value: Value) -> Gpr {
        match value.inst() {
            None => {
                let reg = self.scratch_gpr(e);
                e.mov_ri64(reg, value.immediate_u64());
                reg
            }
            Some(inst) => {
                let reg = self.ensure_in_gpr(e, inst);
                self.gprs[reg.encoding() as usize].locked = true;
                self.values[inst.index()].remaining_uses -= 1;

                if self.values[inst.index()].remaining_uses > 0 {
                    // Keep the canonical copy alive in another register.
                    let copy = self.free_gpr(e);
                    e.mov_rr64(copy, reg);
                    self.gprs[copy.encoding() as usize].value = Some(inst);
                    self.touch_gpr(copy);
                    self.values[inst.index()].location = Some(HostLoc::Gpr(copy));
                } else {
                    self.values[inst.index()].location = None;
                }
                self.gprs[reg.encoding() as usize].value = None;
                reg
            }
        }
    }

    /// Materialise `value` into a specific register (for instructions with
    /// fixed operands, e.g. CL shifts), evicting any current occupant.
    pub fn use_fixed_gpr(&mut self, e: &mut CodeEmitter, value: Value, fixed: Gpr) -> Gpr {
        self.evacuate_gpr(e, fixed);
        self.gprs[fixed.encoding() as usize].locked = true;
        self.touch_gpr(fixed);

        match value.inst() {
            None => {
                e.mov_ri64(fixed, value.immediate_u64());
            }
            Some(inst) => {
                match self.values[inst.index()].location {
                    Some(HostLoc::Gpr(reg)) if reg == fixed => {}
                    Some(HostLoc::Gpr(reg)) => e.mov_rr64(fixed, reg),
                    Some(HostLoc::Spill(slot)) => e.mov_r64_m64(fixed, self.spill_mem(slot)),
                    other => panic!("value in unexpected location {other:?}"),
                }
                self.values[inst.index()].remaining_uses -= 1;
            }
        }
        fixed
    }

    /// Move whatever occupies `reg` elsewhere; leaves `reg` empty and
    /// unlocked.
    fn evacuate_gpr(&mut self, e: &mut CodeEmitter, reg: Gpr) {
        assert!(!self.gprs[reg.encoding() as usize].locked, "evacuating a locked register");
        if let Some(value) = self.gprs[reg.encoding() as usize].value {
            // Try another free register first, else spill.
            self.gprs[reg.encoding() as usize].locked = true;
            let dest = self
                .allocatable_gprs()
                .find(|&r| {
                    self.gprs[r.encoding() as usize].value.is_none()
                        && !self.gprs[r.encoding() as usize].locked
                });
            self.gprs[reg.encoding() as usize].locked = false;
            match dest {
                Some(dest) => {
                    e.mov_rr64(dest, reg);
                    self.gprs[dest.encoding() as usize].value = Some(value);
                    self.touch_gpr(dest);
                    self.values[value.index()].location = Some(HostLoc::Gpr(dest));
                }
                None => self.spill_gpr(e, reg),
            }
            self.gprs[reg.encoding() as usize].value = None;
        }
    }

    fn ensure_in_gpr(&mut self, e: &mut CodeEmitter, inst: Inst) -> Gpr {
        match self.values[inst.index()].location {
            Some(HostLoc::Gpr(reg)) => {
                self.touch_gpr(reg);
                reg
            }
            Some(HostLoc::Spill(slot)) => {
                let reg = self.free_gpr(e);
                e.mov_r64_m64(reg, self.spill_mem(slot));
                self.spill_slots[slot] = None;
                self.gprs[reg.encoding() as usize].value = Some(inst);
                self.values[inst.index()].location = Some(HostLoc::Gpr(reg));
                self.touch_gpr(reg);
                reg
            }
            other => panic!("%{} is not live in a GPR (at {other:?})", inst.index()),
        }
    }

    /// Bind the result of `inst` to a fresh register.
    pub fn def_gpr(&mut self, e: &mut CodeEmitter, inst: Inst) -> Gpr {
        let reg = self.scratch_gpr(e);
        self.bind_gpr(inst, reg);
        reg
    }

    fn bind_gpr(&mut self, inst: Inst, reg: Gpr) {
        self.gprs[reg.encoding() as usize].value = Some(inst);
        self.gprs[reg.encoding() as usize].locked = true;
        self.values[inst.index()].location = Some(HostLoc::Gpr(reg));
        self.touch_gpr(reg);
    }

    /// Bind the result of `inst` to a specific register holding it already
    /// (e.g. RAX after a call).
    pub fn def_fixed_gpr(&mut self, inst: Inst, reg: Gpr) {
        debug_assert!(self.gprs[reg.encoding() as usize].value.is_none());
        self.bind_gpr(inst, reg);
    }

    /// Reserve a specific register as an unbound scratch for this
    /// instruction, moving any current occupant out of the way — even a
    /// value this instruction just defined (its binding and lock travel
    /// with it). Only register moves are emitted, so host flags survive.
    pub fn claim_fixed_gpr(&mut self, e: &mut CodeEmitter, reg: Gpr) -> Gpr {
        let state = self.gprs[reg.encoding() as usize];
        if state.locked && state.value.is_some() {
            let value = state.value.unwrap();
            let dest = self.free_gpr(e);
            e.mov_rr64(dest, reg);
            self.gprs[dest.encoding() as usize].value = Some(value);
            self.gprs[dest.encoding() as usize].locked = true;
            self.touch_gpr(dest);
            self.values[value.index()].location = Some(HostLoc::Gpr(dest));
            self.gprs[reg.encoding() as usize].value = None;
            self.gprs[reg.encoding() as usize].locked = false;
        } else {
            assert!(!state.locked, "claiming a register locked as a scratch");
            self.evacuate_gpr(e, reg);
        }
        self.gprs[reg.encoding() as usize].locked = true;
        self.touch_gpr(reg);
        reg
    }

    /// Alias the result of `inst` to the operand's location when the
    /// operand dies here; otherwise copy.
    pub fn def_as_existing_gpr(&mut self, e: &mut CodeEmitter, inst: Inst, value: Value) {
        let reg = self.use_scratch_gpr(e, value);
        self.gprs[reg.encoding() as usize].value = Some(inst);
        self.values[inst.index()].location = Some(HostLoc::Gpr(reg));
    }

    // ------------------------------------------------------------ XMM side

    pub fn scratch_xmm(&mut self, e: &mut CodeEmitter) -> Xmm {
        let reg = self.free_xmm(e);
        self.xmms[reg.encoding() as usize].locked = true;
        self.touch_xmm(reg);
        reg
    }

    fn free_xmm(&mut self, e: &mut CodeEmitter) -> Xmm {
        if let Some(reg) = ALLOCATABLE_XMMS.into_iter().find(|&r| {
            self.xmms[r.encoding() as usize].value.is_none()
                && !self.xmms[r.encoding() as usize].locked
        }) {
            return reg;
        }

        let victim = ALLOCATABLE_XMMS
            .into_iter()
            .filter(|&r| !self.xmms[r.encoding() as usize].locked)
            .min_by_key(|&r| self.xmms[r.encoding() as usize].last_touch)
            .expect("all xmm registers locked by one instruction");
        self.spill_xmm(e, victim);
        victim
    }

    fn spill_xmm(&mut self, e: &mut CodeEmitter, reg: Xmm) {
        let value = self.xmms[reg.encoding() as usize]
            .value
            .take()
            .expect("spilling an empty xmm register");
        // 128-bit values take an aligned pair of slots.
        let slot = (0..SPILL_COUNT - 1)
            .step_by(2)
            .find(|&s| self.spill_slots[s].is_none() && self.spill_slots[s + 1].is_none())
            .expect("out of spill slots");
        self.spill_slots[slot] = Some(value);
        self.spill_slots[slot + 1] = Some(value);
        self.values[value.index()].location = Some(HostLoc::Spill(slot));
        e.movdqu_m_xmm(self.spill_mem(slot), reg);
    }

    pub fn use_xmm(&mut self, e: &mut CodeEmitter, value: Value) -> Xmm {
        let inst = value.inst().expect("128-bit operands are never immediates");
        let reg = self.ensure_in_xmm(e, inst);
        self.xmms[reg.encoding() as usize].locked = true;
        self.values[inst.index()].remaining_uses -= 1;
        reg
    }

    pub fn use_scratch_xmm(&mut self, e: &mut CodeEmitter, value: Value) -> Xmm {
        let inst = value.inst().expect("128-bit operands are never immediates");
        let reg = self.ensure_in_xmm(e, inst);
        self.xmms[reg.encoding() as usize].locked = true;
        self.values[inst.index()].remaining_uses -= 1;

        if self.values[inst.index()].remaining_uses > 0 {
            let copy = self.free_xmm(e);
            e.movaps_rr(copy, reg);
            self.xmms[copy.encoding() as usize].value = Some(inst);
            self.touch_xmm(copy);
            self.values[inst.index()].location = Some(HostLoc::Xmm(copy));
        } else {
            self.values[inst.index()].location = None;
        }
        self.xmms[reg.encoding() as usize].value = None;
        reg
    }

    fn ensure_in_xmm(&mut self, e: &mut CodeEmitter, inst: Inst) -> Xmm {
        match self.values[inst.index()].location {
            Some(HostLoc::Xmm(reg)) => {
                self.touch_xmm(reg);
                reg
            }
            Some(HostLoc::Spill(slot)) => {
                let reg = self.free_xmm(e);
                e.movdqu_xmm_m(reg, self.spill_mem(slot));
                self.spill_slots[slot] = None;
                self.spill_slots[slot + 1] = None;
                self.xmms[reg.encoding() as usize].value = Some(inst);
                self.values[inst.index()].location = Some(HostLoc::Xmm(reg));
                self.touch_xmm(reg);
                reg
            }
            other => panic!("%{} is not live in an XMM (at {other:?})", inst.index()),
        }
    }

    pub fn def_xmm(&mut self, e: &mut CodeEmitter, inst: Inst) -> Xmm {
        let reg = self.scratch_xmm(e);
        self.xmms[reg.encoding() as usize].value = Some(inst);
        self.values[inst.index()].location = Some(HostLoc::Xmm(reg));
        reg
    }

    pub fn def_fixed_xmm(&mut self, inst: Inst, reg: Xmm) {
        debug_assert!(self.xmms[reg.encoding() as usize].value.is_none());
        self.xmms[reg.encoding() as usize].value = Some(inst);
        self.xmms[reg.encoding() as usize].locked = true;
        self.values[inst.index()].location = Some(HostLoc::Xmm(reg));
        self.touch_xmm(reg);
    }

    // --------------------------------------------------------------- calls

    /// Spill every value living in a caller-saved register, then marshal
    /// `args` into the ABI argument registers starting at `first_slot`
    /// (slot 0 is RDI; trampoline calls start at slot 1 because the
    /// trampoline supplies the user-data word itself).
    pub fn prepare_for_call(&mut self, e: &mut CodeEmitter, args: &[Value], first_slot: usize) {
        for reg in CALLER_SAVED_GPRS {
            if self.gprs[reg.encoding() as usize].value.is_some() {
                assert!(!self.gprs[reg.encoding() as usize].locked);
                self.spill_gpr(e, reg);
            }
        }
        for reg in ALLOCATABLE_XMMS {
            if self.xmms[reg.encoding() as usize].value.is_some() {
                assert!(!self.xmms[reg.encoding() as usize].locked);
                self.spill_xmm(e, reg);
            }
        }

        for (i, &arg) in args.iter().enumerate() {
            let slot = ABI_ARGS[first_slot + i];
            self.gprs[slot.encoding() as usize].locked = true;
            match arg.inst() {
                None => e.mov_ri64(slot, arg.immediate_u64()),
                Some(inst) => {
                    match self.values[inst.index()].location {
                        Some(HostLoc::Gpr(reg)) => e.mov_rr64(slot, reg),
                        Some(HostLoc::Spill(s)) => e.mov_r64_m64(slot, self.spill_mem(s)),
                        other => panic!("call argument in unexpected location {other:?}"),
                    }
                    self.values[inst.index()].remaining_uses -= 1;
                }
            }
        }
    }

    /// The spill slot a value currently occupies. Valid only after
    /// `prepare_for_call`, which spills every caller-saved register; used to
    /// marshal 128-bit call operands straight from memory.
    pub fn spill_mem_of(&self, value: Value) -> Mem {
        let inst = value.inst().expect("only instruction results are spilled");
        match self.values[inst.index()].location {
            Some(HostLoc::Spill(slot)) => self.spill_mem(slot),
            other => panic!("%{} is not in a spill slot (at {other:?})", inst.index()),
        }
    }

    /// Account for a use without materialising the value.
    pub fn consume(&mut self, value: Value) {
        if let Some(inst) = value.inst() {
            self.values[inst.index()].remaining_uses -= 1;
        }
    }

    /// Release dead values and unlock everything. Called between IR
    /// instructions.
    pub fn end_of_instruction(&mut self) {
        for i in 0..16 {
            self.gprs[i].locked = false;
            if let Some(value) = self.gprs[i].value {
                if self.values[value.index()].remaining_uses == 0 {
                    self.gprs[i].value = None;
                    self.values[value.index()].location = None;
                }
            }
            self.xmms[i].locked = false;
            if let Some(value) = self.xmms[i].value {
                if self.values[value.index()].remaining_uses == 0 {
                    self.xmms[i].value = None;
                    self.values[value.index()].location = None;
                }
            }
        }
        for slot in 0..SPILL_COUNT {
            if let Some(value) = self.spill_slots[slot] {
                if self.values[value.index()].remaining_uses == 0 {
                    self.spill_slots[slot] = None;
                    self.values[value.index()].location = None;
                }
            }
        }
    }

    /// Every value must be dead once the block's instructions are done.
    pub fn assert_all_dead(&self) {
        for (index, info) in self.values.iter().enumerate() {
            assert!(
                info.remaining_uses == 0,
                "%{index} still has {} uses at end of block",
                info.remaining_uses
            );
        }
    }
}
