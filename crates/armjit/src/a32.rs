//! The A32 (ARM/Thumb) JIT interface.

use core::ffi::c_void;
use std::sync::{Arc, Mutex};

use armjit_backend_x64::{
    A32JitState, AddressSpace, EmitConfig, GuestArch, HostFeatures, JitStateInfo,
    RuntimeCallbacks,
};
use armjit_frontend::a32::{self, A32LocationDescriptor, Exception};
use armjit_frontend::TranslationOptions;
use armjit_ir::{opt, Block, LocationDescriptor};

use crate::config::{A32UserConfig, Optimizations};
use crate::error::{validate_cache_sizes, Error};
use crate::halt::{HaltHandle, HaltReason};
use crate::monitor::ExclusiveMonitor;
use crate::shared::{InvalidationHandle, InvalidationRequests};

/// Host-side collaborators of an A32 JIT. All callbacks are synchronous and
/// must not re-enter the JIT; `memory_write_exclusive_*` must honour the
/// compare-with-expected contract when a global monitor is in use.
#[allow(unused_variables)]
pub trait A32UserCallbacks {
    /// Instruction fetch. Defaults to a data-side read.
    fn memory_read_code(&mut self, vaddr: u32) -> u32 {
        self.memory_read_32(vaddr)
    }

    fn memory_read_8(&mut self, vaddr: u32) -> u8;
    fn memory_read_16(&mut self, vaddr: u32) -> u16;
    fn memory_read_32(&mut self, vaddr: u32) -> u32;
    fn memory_read_64(&mut self, vaddr: u32) -> u64;

    fn memory_write_8(&mut self, vaddr: u32, value: u8);
    fn memory_write_16(&mut self, vaddr: u32, value: u16);
    fn memory_write_32(&mut self, vaddr: u32, value: u32);
    fn memory_write_64(&mut self, vaddr: u32, value: u64);

    /// Conditional store for the exclusive path: write only while the
    /// location still holds `expected`, returning success. The defaults
    /// store unconditionally, which is correct for a single core.
    fn memory_write_exclusive_8(&mut self, vaddr: u32, value: u8, expected: u8) -> bool {
        self.memory_write_8(vaddr, value);
        true
    }
    fn memory_write_exclusive_16(&mut self, vaddr: u32, value: u16, expected: u16) -> bool {
        self.memory_write_16(vaddr, value);
        true
    }
    fn memory_write_exclusive_32(&mut self, vaddr: u32, value: u32, expected: u32) -> bool {
        self.memory_write_32(vaddr, value);
        true
    }
    fn memory_write_exclusive_64(&mut self, vaddr: u32, value: u64, expected: u64) -> bool {
        self.memory_write_64(vaddr, value);
        true
    }

    /// Whether constant-address reads may be folded at translation time.
    fn is_read_only_memory(&mut self, vaddr: u32) -> bool {
        false
    }

    fn interpreter_fallback(&mut self, pc: u32, num_instructions: usize);
    fn call_svc(&mut self, swi: u32);
    fn exception_raised(&mut self, pc: u32, exception: Exception);
    fn add_ticks(&mut self, ticks: u64);
    fn get_ticks_remaining(&mut self) -> u64;
}

struct A32Impl {
    jit_state: A32JitState,
    callbacks: Box<dyn A32UserCallbacks>,
    address_space: Option<AddressSpace>,
    translation_options: TranslationOptions,
    optimizations: Optimizations,
    monitor: Option<Arc<ExclusiveMonitor>>,
    processor_id: usize,
    host_features: HostFeatures,
    requests: Arc<Mutex<InvalidationRequests>>,
    is_executing: bool,
    last_generation: u64,
}

/// An A32 JIT instance.
pub struct A32Jit {
    impl_: Box<A32Impl>,
}

/// A deep copy of the guest-observable state, without the code cache.
#[derive(Clone)]
pub struct A32Context {
    jit_state: A32JitState,
    invalid_cache_generation: u64,
}

impl A32Jit {
    pub fn new(callbacks: Box<dyn A32UserCallbacks>, config: A32UserConfig) -> Result<A32Jit, Error> {
        validate_cache_sizes(config.code_cache_size, config.far_code_offset)?;

        let mut impl_ = Box::new(A32Impl {
            jit_state: A32JitState::default(),
            callbacks,
            address_space: None,
            translation_options: TranslationOptions {
                define_unpredictable_behaviour: config.define_unpredictable_behaviour,
                hook_hint_instructions: config.hook_hint_instructions,
                ..TranslationOptions::default()
            },
            optimizations: config.optimizations,
            monitor: config.global_monitor.clone(),
            processor_id: config.processor_id,
            host_features: HostFeatures::detect(),
            requests: Arc::new(Mutex::new(InvalidationRequests::default())),
            is_executing: false,
            last_generation: 0,
        });

        let user_data = (&mut *impl_ as *mut A32Impl).cast::<c_void>();
        let runtime_callbacks = shims::runtime_callbacks(user_data);

        let emit_config = EmitConfig {
            arch: GuestArch::A32,
            jsi: JitStateInfo::for_a32(),
            offsetof_cpsr_nzcv: core::mem::offset_of!(A32JitState, cpsr_nzcv) as i32,
            offsetof_fpcr: core::mem::offset_of!(A32JitState, upper_location_descriptor) as i32,
            fpcr_mask: 0x07F7_0000,
            offsetof_fpsr: core::mem::offset_of!(A32JitState, fpsr) as i32,
            fastmem: config.fastmem_pointer.is_some(),
            fast_dispatch_table: core::ptr::null(),
            fast_dispatch_table_mask: 0,
            cntfrq_el0: 0,
            ctr_el0: 0,
            dczid_el0: 0,
            enable_cycle_counting: config.enable_cycle_counting,
            enable_block_linking: config.optimizations.contains(Optimizations::BLOCK_LINKING),
            enable_rsb: config.optimizations.contains(Optimizations::RETURN_STACK_BUFFER),
        };

        impl_.address_space = Some(AddressSpace::new(
            GuestArch::A32,
            JitStateInfo::for_a32(),
            emit_config,
            &runtime_callbacks,
            config.code_cache_size,
            config.far_code_offset,
            HaltReason::STEP.bits(),
            config.fastmem_pointer,
            config.optimizations.contains(Optimizations::FAST_DISPATCH),
        ));

        Ok(A32Jit { impl_ })
    }

    /// Run until the cycle budget is spent or a halt is requested.
    pub fn run(&mut self) -> HaltReason {
        let impl_ = &mut *self.impl_;
        assert!(!impl_.is_executing, "run called while already running");
        impl_.is_executing = true;

        let entry = impl_.entry_with_rsb_peek();
        let state = (&mut impl_.jit_state as *mut A32JitState).cast::<c_void>();
        let raw = impl_.address_space.as_ref().unwrap().run_code(state, entry);

        impl_.is_executing = false;
        impl_.perform_deferred_invalidation();
        HaltReason::from_bits_truncate(raw)
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> HaltReason {
        let impl_ = &mut *self.impl_;
        assert!(!impl_.is_executing, "step called while already running");
        impl_.is_executing = true;

        let descriptor: LocationDescriptor =
            A32LocationDescriptor::from(impl_.jit_state.location_descriptor())
                .set_single_stepping(true)
                .into();
        let entry = impl_.get_or_emit(descriptor);
        let state = (&mut impl_.jit_state as *mut A32JitState).cast::<c_void>();
        let raw = impl_.address_space.as_ref().unwrap().step_code(state, entry);

        impl_.is_executing = false;
        impl_.perform_deferred_invalidation();
        HaltReason::from_bits_truncate(raw)
    }

    /// Request a full cache clear; deferred while a run is on the stack.
    pub fn clear_cache(&mut self) {
        self.invalidation_handle().clear_cache();
        self.impl_.perform_deferred_invalidation();
    }

    /// Drop all blocks translating any instruction in
    /// `[start, start+length)`; deferred while a run is on the stack.
    pub fn invalidate_cache_range(&mut self, start: u32, length: u64) {
        self.invalidation_handle().invalidate_range(u64::from(start), length);
        self.impl_.perform_deferred_invalidation();
    }

    /// Zero the guest state. Must not be called while running.
    pub fn reset(&mut self) {
        assert!(!self.impl_.is_executing, "reset called while running");
        self.impl_.jit_state = A32JitState::default();
    }

    /// Request a halt; execution returns at the next block boundary.
    pub fn halt(&self, reason: HaltReason) {
        self.halt_handle().halt(reason);
    }

    /// A handle for halting from other threads or from inside callbacks.
    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle::new(&self.impl_.jit_state.halt_reason as *const u32)
    }

    /// A handle for cache invalidation from inside callbacks.
    pub fn invalidation_handle(&self) -> InvalidationHandle {
        InvalidationHandle { requests: self.impl_.requests.clone(), halt: self.halt_handle() }
    }

    pub fn regs(&self) -> &[u32; 16] {
        &self.impl_.jit_state.regs
    }

    pub fn regs_mut(&mut self) -> &mut [u32; 16] {
        &mut self.impl_.jit_state.regs
    }

    pub fn ext_regs(&self) -> &[u32; 64] {
        &self.impl_.jit_state.ext_regs
    }

    pub fn ext_regs_mut(&mut self) -> &mut [u32; 64] {
        &mut self.impl_.jit_state.ext_regs
    }

    pub fn cpsr(&self) -> u32 {
        self.impl_.jit_state.cpsr()
    }

    pub fn set_cpsr(&mut self, cpsr: u32) {
        self.impl_.jit_state.set_cpsr(cpsr);
    }

    pub fn fpscr(&self) -> u32 {
        self.impl_.jit_state.fpscr()
    }

    pub fn set_fpscr(&mut self, fpscr: u32) {
        self.impl_.jit_state.set_fpscr(fpscr);
    }

    /// Drop any held exclusive reservation.
    pub fn clear_exclusive_state(&mut self) {
        self.impl_.jit_state.exclusive_state = 0;
        if let Some(monitor) = &self.impl_.monitor {
            monitor.clear_processor(self.impl_.processor_id);
        }
    }

    pub fn save_context(&self) -> A32Context {
        A32Context {
            jit_state: self.impl_.jit_state.clone(),
            invalid_cache_generation: self.impl_.last_generation,
        }
    }

    pub fn load_context(&mut self, context: &A32Context) {
        let reset_rsb = context.invalid_cache_generation != self.impl_.last_generation;
        self.impl_.jit_state = context.jit_state.clone();
        if reset_rsb {
            self.impl_.jit_state.reset_rsb();
        }
    }

    /// Print the host code currently in the cache. Debug aid.
    #[cfg(feature = "disas")]
    pub fn dump_disassembly(&self) {
        let code = self.impl_.address_space.as_ref().unwrap().code();
        let begin = code.prelude.end_of_prelude;
        let end = code.near_ptr;
        let bytes =
            unsafe { core::slice::from_raw_parts(code.base().add(begin), end - begin) };
        for line in armjit_backend_x64::disassemble(bytes, code.base() as u64 + begin as u64) {
            println!("{line}");
        }
    }
}

impl A32Impl {
    /// Dispatch entry for a fresh `run`, taking the RSB's word for it when
    /// the top entry matches the current location.
    fn entry_with_rsb_peek(&mut self) -> *const u8 {
        let descriptor = self.jit_state.location_descriptor();
        let new_rsb_ptr =
            self.jit_state.rsb_ptr.wrapping_sub(1) & armjit_backend_x64::RSB_PTR_MASK;
        if self.jit_state.rsb_location_descriptors[new_rsb_ptr as usize] == descriptor.value() {
            self.jit_state.rsb_ptr = new_rsb_ptr;
            return self.jit_state.rsb_codeptrs[new_rsb_ptr as usize] as *const u8;
        }
        self.get_or_emit(descriptor)
    }

    fn get_or_emit(&mut self, descriptor: LocationDescriptor) -> *const u8 {
        let callbacks = &mut self.callbacks;
        let options = self.translation_options;
        let optimizations = self.optimizations;
        let lzcnt = self.host_features.lzcnt;

        let address_space = self.address_space.as_mut().unwrap();
        let entry = address_space.get_or_emit(descriptor, &mut |d| {
            generate_ir(callbacks.as_mut(), options, optimizations, lzcnt, d)
        });

        let generation = address_space.invalid_cache_generation();
        if generation != self.last_generation {
            self.jit_state.reset_rsb();
            self.last_generation = generation;
        }
        entry as *const u8
    }

    fn perform_deferred_invalidation(&mut self) {
        let (entire, ranges) = {
            let mut requests = self.requests.lock().unwrap();
            let entire = core::mem::take(&mut requests.entire_cache);
            let ranges = core::mem::take(&mut requests.ranges);
            (entire, ranges)
        };

        let address_space = self.address_space.as_mut().unwrap();
        if entire {
            self.jit_state.reset_rsb();
            address_space.clear_cache();
        } else if !ranges.is_empty() {
            self.jit_state.reset_rsb();
            address_space.invalidate_cache_ranges(&ranges);
        }
        self.last_generation = address_space.invalid_cache_generation();

        if entire || !ranges.is_empty() {
            // Requests made between runs leave their halt bit pending;
            // consume it now that the work is done.
            let atomic = unsafe {
                core::sync::atomic::AtomicU32::from_ptr(&mut self.jit_state.halt_reason)
            };
            atomic.fetch_and(
                !HaltReason::CACHE_INVALIDATION.bits(),
                core::sync::atomic::Ordering::SeqCst,
            );
        }
    }
}

/// Translate and optimise one block.
fn generate_ir(
    callbacks: &mut dyn A32UserCallbacks,
    options: TranslationOptions,
    optimizations: Optimizations,
    lzcnt: bool,
    descriptor: LocationDescriptor,
) -> Block {
    let location = A32LocationDescriptor::from(descriptor);
    let mut read_code = |vaddr: u32| callbacks.memory_read_code(vaddr);
    let mut block = a32::translate(location, &mut read_code, options);
    drop(read_code);

    opt::polyfill_pass(&mut block, opt::PolyfillOptions { lzcnt });
    if optimizations.contains(Optimizations::GET_SET_ELIMINATION) {
        opt::a32_get_set_elimination(&mut block);
        opt::dead_code_elimination(&mut block);
    }
    if optimizations.contains(Optimizations::CONST_PROP) {
        opt::a32_constant_memory_reads(&mut block, &mut ConstMemoryAdapter(callbacks));
        opt::constant_propagation(
            &mut block,
            opt::ConstPropOptions { fpcr: location.fpscr_mode() },
        );
        opt::dead_code_elimination(&mut block);
    }
    if cfg!(debug_assertions) {
        opt::verification_pass(&block);
    }
    block
}

struct ConstMemoryAdapter<'a>(&'a mut dyn A32UserCallbacks);

impl opt::A32ConstMemoryCallbacks for ConstMemoryAdapter<'_> {
    fn is_read_only_memory(&mut self, vaddr: u32) -> bool {
        self.0.is_read_only_memory(vaddr)
    }
    fn read8(&mut self, vaddr: u32) -> u8 {
        self.0.memory_read_8(vaddr)
    }
    fn read16(&mut self, vaddr: u32) -> u16 {
        self.0.memory_read_16(vaddr)
    }
    fn read32(&mut self, vaddr: u32) -> u32 {
        self.0.memory_read_32(vaddr)
    }
    fn read64(&mut self, vaddr: u32) -> u64 {
        self.0.memory_read_64(vaddr)
    }
}

/// The devirtualised callback record: plain functions over the boxed
/// implementation pointer.
mod shims {
    use super::*;

    unsafe fn this<'a>(user_data: *mut c_void) -> &'a mut A32Impl {
        &mut *user_data.cast::<A32Impl>()
    }

    pub(super) fn runtime_callbacks(user_data: *mut c_void) -> RuntimeCallbacks {
        RuntimeCallbacks {
            user_data,
            lookup_block,
            add_ticks,
            get_ticks_remaining,
            memory_read_8,
            memory_read_16,
            memory_read_32,
            memory_read_64,
            memory_read_128,
            memory_write_8,
            memory_write_16,
            memory_write_32,
            memory_write_64,
            memory_write_128,
            exclusive_read_8,
            exclusive_read_16,
            exclusive_read_32,
            exclusive_read_64,
            exclusive_read_128,
            exclusive_write_8,
            exclusive_write_16,
            exclusive_write_32,
            exclusive_write_64,
            exclusive_write_128,
            call_svc,
            exception_raised,
            interpreter_fallback,
            isb_raised,
            ic_raised,
            dc_raised,
            get_cntpct,
        }
    }

    extern "C" fn lookup_block(user_data: *mut c_void) -> *const u8 {
        let this = unsafe { this(user_data) };
        this.get_or_emit(this.jit_state.location_descriptor())
    }

    extern "C" fn add_ticks(user_data: *mut c_void, ticks: u64) {
        let this = unsafe { this(user_data) };
        this.callbacks.add_ticks(ticks);
    }

    extern "C" fn get_ticks_remaining(user_data: *mut c_void) -> u64 {
        let this = unsafe { this(user_data) };
        this.callbacks.get_ticks_remaining()
    }

    macro_rules! read_shim {
        ($name:ident, $ty:ty, $method:ident) => {
            extern "C" fn $name(user_data: *mut c_void, vaddr: u64) -> $ty {
                let this = unsafe { this(user_data) };
                this.callbacks.$method(vaddr as u32)
            }
        };
    }

    macro_rules! write_shim {
        ($name:ident, $ty:ty, $method:ident) => {
            extern "C" fn $name(user_data: *mut c_void, vaddr: u64, value: $ty) {
                let this = unsafe { this(user_data) };
                this.callbacks.$method(vaddr as u32, value);
            }
        };
    }

    read_shim!(memory_read_8, u8, memory_read_8);
    read_shim!(memory_read_16, u16, memory_read_16);
    read_shim!(memory_read_32, u32, memory_read_32);
    read_shim!(memory_read_64, u64, memory_read_64);
    write_shim!(memory_write_8, u8, memory_write_8);
    write_shim!(memory_write_16, u16, memory_write_16);
    write_shim!(memory_write_32, u32, memory_write_32);
    write_shim!(memory_write_64, u64, memory_write_64);

    extern "C" fn memory_read_128(_user_data: *mut c_void, _vaddr: u64) -> u128 {
        unreachable!("A32 has no 128-bit accesses")
    }

    extern "C" fn memory_write_128(_user_data: *mut c_void, _vaddr: u64, _value: u128) {
        unreachable!("A32 has no 128-bit accesses")
    }

    macro_rules! exclusive_read_shim {
        ($name:ident, $ty:ty, $method:ident) => {
            extern "C" fn $name(user_data: *mut c_void, vaddr: u64) -> $ty {
                let this = unsafe { this(user_data) };
                match this.monitor.clone() {
                    Some(monitor) => {
                        let callbacks = &mut this.callbacks;
                        monitor.read_and_mark(this.processor_id, vaddr, || {
                            u128::from(callbacks.$method(vaddr as u32))
                        }) as $ty
                    }
                    None => this.callbacks.$method(vaddr as u32),
                }
            }
        };
    }

    macro_rules! exclusive_write_shim {
        ($name:ident, $ty:ty, $method:ident, $plain:ident) => {
            extern "C" fn $name(user_data: *mut c_void, vaddr: u64, value: $ty) -> u32 {
                let this = unsafe { this(user_data) };
                let success = match this.monitor.clone() {
                    Some(monitor) => {
                        let callbacks = &mut this.callbacks;
                        monitor.do_exclusive_operation(this.processor_id, vaddr, |expected| {
                            callbacks.$method(vaddr as u32, value, expected as $ty)
                        })
                    }
                    None => {
                        this.callbacks.$plain(vaddr as u32, value);
                        true
                    }
                };
                u32::from(!success)
            }
        };
    }

    exclusive_read_shim!(exclusive_read_8, u8, memory_read_8);
    exclusive_read_shim!(exclusive_read_16, u16, memory_read_16);
    exclusive_read_shim!(exclusive_read_32, u32, memory_read_32);
    exclusive_read_shim!(exclusive_read_64, u64, memory_read_64);
    exclusive_write_shim!(exclusive_write_8, u8, memory_write_exclusive_8, memory_write_8);
    exclusive_write_shim!(exclusive_write_16, u16, memory_write_exclusive_16, memory_write_16);
    exclusive_write_shim!(exclusive_write_32, u32, memory_write_exclusive_32, memory_write_32);
    exclusive_write_shim!(exclusive_write_64, u64, memory_write_exclusive_64, memory_write_64);

    extern "C" fn exclusive_read_128(_user_data: *mut c_void, _vaddr: u64) -> u128 {
        unreachable!("A32 has no 128-bit accesses")
    }

    extern "C" fn exclusive_write_128(_user_data: *mut c_void, _vaddr: u64, _value: u128) -> u32 {
        unreachable!("A32 has no 128-bit accesses")
    }

    extern "C" fn call_svc(user_data: *mut c_void, swi: u32) {
        let this = unsafe { this(user_data) };
        this.callbacks.call_svc(swi);
    }

    extern "C" fn exception_raised(user_data: *mut c_void, pc: u64, exception: u64) {
        let this = unsafe { this(user_data) };
        this.callbacks.exception_raised(pc as u32, Exception::from_code(exception));
    }

    extern "C" fn interpreter_fallback(user_data: *mut c_void, pc: u64, num: u64) {
        let this = unsafe { this(user_data) };
        this.callbacks.interpreter_fallback(pc as u32, num as usize);
    }

    extern "C" fn isb_raised(_user_data: *mut c_void) {}

    extern "C" fn ic_raised(_user_data: *mut c_void, _vaddr: u64) {}

    extern "C" fn dc_raised(_user_data: *mut c_void, _op: u64, _vaddr: u64) {}

    extern "C" fn get_cntpct(_user_data: *mut c_void) -> u64 {
        0
    }
}
