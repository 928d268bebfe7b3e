//! The executable arena: one mapping holding the constant pool, the
//! dispatcher prelude and its trampolines, near (hot) code and far (cold)
//! code.

use core::ffi::c_void;

use rustc_hash::FxHashMap;

use crate::abi::{Gpr, FASTMEM_BASE, STATE};
use crate::assembler::{Cc, CodeEmitter, Mem};
use crate::callbacks::{JitStateInfo, LinkTarget, RuntimeCallbacks};
use crate::constant_pool::ConstantPool;

/// A pointer into the arena's executable region.
pub type CodePtr = *const u8;

const CONSTANT_POOL_SIZE: usize = 2 * 1024 * 1024;

type RunCodeFn = unsafe extern "C" fn(CodePtr, *mut c_void) -> u32;

/// Addresses generated once at startup.
pub struct PreludeInfo {
    run_code: CodePtr,
    step_code: CodePtr,
    pub return_to_dispatcher: CodePtr,
    pub return_from_run_code: CodePtr,
    trampolines: FxHashMap<LinkTarget, CodePtr>,
    pub end_of_prelude: usize,
}

impl PreludeInfo {
    /// Address a relocation against `target` must branch to.
    pub fn link_target_addr(&self, target: LinkTarget) -> CodePtr {
        match target {
            LinkTarget::ReturnToDispatcher => self.return_to_dispatcher,
            LinkTarget::ReturnFromRunCode => self.return_from_run_code,
            other => *self
                .trampolines
                .get(&other)
                .unwrap_or_else(|| panic!("no trampoline generated for {other:?}")),
        }
    }
}

/// The arena. Near code grows from the end of the prelude; far code grows
/// from `far_offset`; both share the remaining space between them.
pub struct BlockOfCode {
    base: *mut u8,
    total_size: usize,
    pub pool: ConstantPool,
    near_begin: usize,
    far_begin: usize,
    pub near_ptr: usize,
    pub far_ptr: usize,
    pub prelude: PreludeInfo,
    pub jsi: JitStateInfo,
    writable: bool,
}

// The arena is owned by a single JIT instance; the raw pointer is the
// mapping itself.
unsafe impl Send for BlockOfCode {}

impl BlockOfCode {
    pub fn new(
        total_size: usize,
        far_offset: usize,
        jsi: JitStateInfo,
        callbacks: &RuntimeCallbacks,
        step_halt_bit: u32,
        enable_cycle_counting: bool,
        fastmem_base: Option<u64>,
    ) -> BlockOfCode {
        assert!(far_offset < total_size);
        assert!(CONSTANT_POOL_SIZE < far_offset);

        let base = unsafe {
            rustix::mm::mmap_anonymous(
                core::ptr::null_mut(),
                total_size,
                rustix::mm::ProtFlags::READ | rustix::mm::ProtFlags::WRITE,
                rustix::mm::MapFlags::PRIVATE,
            )
            .expect("failed to map the code cache arena")
        }
        .cast::<u8>();

        let pool = unsafe { ConstantPool::new(base, CONSTANT_POOL_SIZE) };

        let mut this = BlockOfCode {
            base,
            total_size,
            pool,
            near_begin: 0,
            far_begin: far_offset,
            near_ptr: 0,
            far_ptr: far_offset,
            prelude: PreludeInfo {
                run_code: core::ptr::null(),
                step_code: core::ptr::null(),
                return_to_dispatcher: core::ptr::null(),
                return_from_run_code: core::ptr::null(),
                trampolines: FxHashMap::default(),
                end_of_prelude: 0,
            },
            jsi,
            writable: true,
        };

        this.generate_prelude(callbacks, step_halt_bit, enable_cycle_counting, fastmem_base);
        this.near_begin = this.prelude.end_of_prelude;
        this.near_ptr = this.near_begin;
        this.disable_writing();
        this
    }

    pub fn base(&self) -> *const u8 {
        self.base
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// An emitter positioned at an arbitrary offset. The caller writes the
    /// cursor back when done.
    pub fn emitter_at(&mut self, pos: usize) -> CodeEmitter {
        debug_assert!(self.writable, "emitting while the arena is execute-only");
        unsafe { CodeEmitter::new(self.base, self.total_size, pos) }
    }

    /// Reset both code pointers, forgetting every emitted block. The prelude
    /// is never erased.
    pub fn clear_cache(&mut self) {
        self.near_ptr = self.near_begin;
        self.far_ptr = self.far_begin;
    }

    /// Underestimate of the space left for new code.
    pub fn space_remaining(&self) -> usize {
        if self.near_ptr > self.far_begin || self.far_ptr > self.total_size {
            return 0;
        }
        usize::min(self.far_begin - self.near_ptr, self.total_size - self.far_ptr)
    }

    /// Map the arena writable for an emission window.
    pub fn enable_writing(&mut self) {
        unsafe {
            rustix::mm::mprotect(
                self.base.cast(),
                self.total_size,
                rustix::mm::MprotectFlags::READ | rustix::mm::MprotectFlags::WRITE,
            )
            .expect("mprotect(rw) failed");
        }
        self.writable = true;
    }

    /// Flip back to execute-only after invalidating modified ranges.
    pub fn disable_writing(&mut self) {
        self.invalidate_icache(self.base, self.total_size);
        unsafe {
            rustix::mm::mprotect(
                self.base.cast(),
                self.total_size,
                rustix::mm::MprotectFlags::READ | rustix::mm::MprotectFlags::EXEC,
            )
            .expect("mprotect(rx) failed");
        }
        self.writable = false;
    }

    /// Instruction cache maintenance for a modified range. x86-64 keeps the
    /// instruction cache coherent with stores, so this only serves as a
    /// compiler fence here.
    pub fn invalidate_icache(&self, _ptr: *const u8, _size: usize) {
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }

    pub fn run_code(&self, state: *mut c_void, entry: CodePtr) -> u32 {
        let f: RunCodeFn = unsafe { core::mem::transmute(self.prelude.run_code) };
        unsafe { f(entry, state) }
    }

    pub fn step_code(&self, state: *mut c_void, entry: CodePtr) -> u32 {
        let f: RunCodeFn = unsafe { core::mem::transmute(self.prelude.step_code) };
        unsafe { f(entry, state) }
    }

    fn state_mem(&self, offset: i32) -> Mem {
        Mem::base_disp(STATE, offset)
    }

    /// Generate run/step entry code, the dispatcher re-entry point, the
    /// return path, and one trampoline per host callback.
    fn generate_prelude(
        &mut self,
        cb: &RuntimeCallbacks,
        step_halt_bit: u32,
        enable_cycle_counting: bool,
        fastmem_base: Option<u64>,
    ) {
        let jsi = self.jsi;
        let mut e = unsafe { CodeEmitter::new(self.base, self.total_size, CONSTANT_POOL_SIZE) };

        // Trampolines. Each swaps to host floating point state, loads the
        // user-data word from its literal pair, makes the call, and swaps
        // back. The literal pairs are interned in the constant pool.
        let ud = cb.user_data as u64;
        let mut tramp = |e: &mut CodeEmitter,
                         pool: &mut ConstantPool,
                         target: LinkTarget,
                         fn_ptr: u64|
         -> (LinkTarget, CodePtr) {
            e.align16();
            let entry = e.current_addr();
            let literal = pool.intern(ud, fn_ptr);
            // Keep the call site 16-aligned for the callee.
            e.sub_ri64(Gpr::Rsp, 8);
            e.stmxcsr(Mem::base_disp(STATE, jsi.offsetof_guest_mxcsr));
            e.ldmxcsr(Mem::base_disp(STATE, jsi.offsetof_save_host_mxcsr));
            e.mov_r64_riprel(Gpr::Rdi, literal);
            e.mov_r64_riprel(Gpr::Rax, unsafe { literal.add(8) });
            e.call_r64(Gpr::Rax);
            e.ldmxcsr(Mem::base_disp(STATE, jsi.offsetof_guest_mxcsr));
            e.add_ri64(Gpr::Rsp, 8);
            e.ret();
            (target, entry)
        };

        let pairs = [
            (LinkTarget::ReadMemory8, cb.memory_read_8 as u64),
            (LinkTarget::ReadMemory16, cb.memory_read_16 as u64),
            (LinkTarget::ReadMemory32, cb.memory_read_32 as u64),
            (LinkTarget::ReadMemory64, cb.memory_read_64 as u64),
            (LinkTarget::ReadMemory128, cb.memory_read_128 as u64),
            (LinkTarget::ExclusiveReadMemory8, cb.exclusive_read_8 as u64),
            (LinkTarget::ExclusiveReadMemory16, cb.exclusive_read_16 as u64),
            (LinkTarget::ExclusiveReadMemory32, cb.exclusive_read_32 as u64),
            (LinkTarget::ExclusiveReadMemory64, cb.exclusive_read_64 as u64),
            (LinkTarget::ExclusiveReadMemory128, cb.exclusive_read_128 as u64),
            (LinkTarget::WriteMemory8, cb.memory_write_8 as u64),
            (LinkTarget::WriteMemory16, cb.memory_write_16 as u64),
            (LinkTarget::WriteMemory32, cb.memory_write_32 as u64),
            (LinkTarget::WriteMemory64, cb.memory_write_64 as u64),
            (LinkTarget::WriteMemory128, cb.memory_write_128 as u64),
            (LinkTarget::ExclusiveWriteMemory8, cb.exclusive_write_8 as u64),
            (LinkTarget::ExclusiveWriteMemory16, cb.exclusive_write_16 as u64),
            (LinkTarget::ExclusiveWriteMemory32, cb.exclusive_write_32 as u64),
            (LinkTarget::ExclusiveWriteMemory64, cb.exclusive_write_64 as u64),
            (LinkTarget::ExclusiveWriteMemory128, cb.exclusive_write_128 as u64),
            (LinkTarget::CallSVC, cb.call_svc as u64),
            (LinkTarget::ExceptionRaised, cb.exception_raised as u64),
            (LinkTarget::InterpreterFallback, cb.interpreter_fallback as u64),
            (LinkTarget::InstructionSynchronizationBarrierRaised, cb.isb_raised as u64),
            (LinkTarget::InstructionCacheOperationRaised, cb.ic_raised as u64),
            (LinkTarget::DataCacheOperationRaised, cb.dc_raised as u64),
            (LinkTarget::GetCNTPCT, cb.get_cntpct as u64),
            (LinkTarget::AddTicks, cb.add_ticks as u64),
            (LinkTarget::GetTicksRemaining, cb.get_ticks_remaining as u64),
        ];
        for (target, fn_ptr) in pairs {
            let (target, entry) = tramp(&mut e, &mut self.pool, target, fn_ptr);
            self.prelude.trampolines.insert(target, entry);
        }

        // Raw (host floating point state) call helper used below.
        let call_raw = |e: &mut CodeEmitter, fn_ptr: u64, user_data: u64| {
            e.mov_ri64(Gpr::Rdi, user_data);
            e.mov_ri64(Gpr::Rax, fn_ptr);
            e.call_r64(Gpr::Rax);
        };

        let return_from_run_code = e.new_label();

        // run_code(entry = rdi, state = rsi).
        e.align16();
        self.prelude.run_code = e.current_addr();
        {
            for reg in [Gpr::Rbx, Gpr::Rbp, Gpr::R12, Gpr::R13, Gpr::R14, Gpr::R15] {
                e.push(reg);
            }
            // Align the stack so emitted code can assume call sites are
            // 16-aligned.
            e.sub_ri64(Gpr::Rsp, 8);
            e.mov_rr64(STATE, Gpr::Rsi);
            e.mov_rr64(Gpr::Rbx, Gpr::Rdi);
            if let Some(base) = fastmem_base {
                e.mov_ri64(FASTMEM_BASE, base);
            }

            if enable_cycle_counting {
                call_raw(&mut e, cb.get_ticks_remaining as u64, ud);
            } else {
                e.mov_ri64(Gpr::Rax, i64::MAX as u64 / 2);
            }
            e.mov_m64_r64(self.state_mem(jsi.offsetof_cycles_to_run), Gpr::Rax);
            e.mov_m64_r64(self.state_mem(jsi.offsetof_cycles_remaining), Gpr::Rax);

            e.stmxcsr(self.state_mem(jsi.offsetof_save_host_mxcsr));
            e.ldmxcsr(self.state_mem(jsi.offsetof_guest_mxcsr));

            e.cmp_m32_i32(self.state_mem(jsi.offsetof_halt_reason), 0);
            e.jcc_label(Cc::Ne, return_from_run_code);
            if enable_cycle_counting {
                // An empty budget returns without running any guest code.
                e.cmp_m64_i32(self.state_mem(jsi.offsetof_cycles_remaining), 0);
                e.jcc_label(Cc::Le, return_from_run_code);
            }
            e.jmp_r64(Gpr::Rbx);
        }

        // step_code(entry = rdi, state = rsi): one-cycle budget plus the
        // step halt bit, so the first block boundary returns.
        e.align16();
        self.prelude.step_code = e.current_addr();
        {
            for reg in [Gpr::Rbx, Gpr::Rbp, Gpr::R12, Gpr::R13, Gpr::R14, Gpr::R15] {
                e.push(reg);
            }
            e.sub_ri64(Gpr::Rsp, 8);
            e.mov_rr64(STATE, Gpr::Rsi);
            e.mov_rr64(Gpr::Rbx, Gpr::Rdi);
            if let Some(base) = fastmem_base {
                e.mov_ri64(FASTMEM_BASE, base);
            }

            e.mov_ri64(Gpr::Rax, 1);
            e.mov_m64_r64(self.state_mem(jsi.offsetof_cycles_to_run), Gpr::Rax);
            e.mov_m64_r64(self.state_mem(jsi.offsetof_cycles_remaining), Gpr::Rax);

            e.stmxcsr(self.state_mem(jsi.offsetof_save_host_mxcsr));
            e.ldmxcsr(self.state_mem(jsi.offsetof_guest_mxcsr));

            e.cmp_m32_i32(self.state_mem(jsi.offsetof_halt_reason), 0);
            e.jcc_label(Cc::Ne, return_from_run_code);
            e.lock_or_m32_i32(self.state_mem(jsi.offsetof_halt_reason), step_halt_bit as i32);
            e.jmp_r64(Gpr::Rbx);
        }

        // return_to_dispatcher: block boundary with no direct link. Checks
        // halt and budget, then asks the host for (or to compile) the next
        // block and tail-jumps to it.
        e.align16();
        self.prelude.return_to_dispatcher = e.current_addr();
        {
            e.cmp_m32_i32(self.state_mem(jsi.offsetof_halt_reason), 0);
            e.jcc_label(Cc::Ne, return_from_run_code);
            e.cmp_m64_i32(self.state_mem(jsi.offsetof_cycles_remaining), 0);
            e.jcc_label(Cc::Le, return_from_run_code);

            // The lookup runs host code (including translation); give it the
            // host floating point environment.
            e.stmxcsr(self.state_mem(jsi.offsetof_guest_mxcsr));
            e.ldmxcsr(self.state_mem(jsi.offsetof_save_host_mxcsr));
            call_raw(&mut e, cb.lookup_block as u64, ud);
            e.ldmxcsr(self.state_mem(jsi.offsetof_guest_mxcsr));
            e.jmp_r64(Gpr::Rax);
        }

        // return_from_run_code: account ticks, restore host floating point
        // state, atomically consume the halt reason, return it.
        e.align16();
        self.prelude.return_from_run_code = e.current_addr();
        {
            e.bind(return_from_run_code);

            e.stmxcsr(self.state_mem(jsi.offsetof_guest_mxcsr));
            e.ldmxcsr(self.state_mem(jsi.offsetof_save_host_mxcsr));

            if enable_cycle_counting {
                e.mov_r64_m64(Gpr::Rsi, self.state_mem(jsi.offsetof_cycles_to_run));
                e.mov_r64_m64(Gpr::Rdx, self.state_mem(jsi.offsetof_cycles_remaining));
                e.sub_rr64(Gpr::Rsi, Gpr::Rdx);
                call_raw(&mut e, cb.add_ticks as u64, ud);
            }

            e.xor_rr32(Gpr::Rax, Gpr::Rax);
            e.xchg_m32_r32(self.state_mem(jsi.offsetof_halt_reason), Gpr::Rax);

            e.add_ri64(Gpr::Rsp, 8);
            for reg in [Gpr::R15, Gpr::R14, Gpr::R13, Gpr::R12, Gpr::Rbp, Gpr::Rbx] {
                e.pop(reg);
            }
            e.ret();
        }

        e.assert_labels_resolved();
        self.prelude.end_of_prelude = e.pos();
    }
}

impl Drop for BlockOfCode {
    fn drop(&mut self) {
        unsafe {
            let _ = rustix::mm::munmap(self.base.cast(), self.total_size);
        }
    }
}
