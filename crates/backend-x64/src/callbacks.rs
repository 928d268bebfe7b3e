//! The devirtualised host-callback capability record, the per-architecture
//! state layout description, and the link-target taxonomy.

use core::ffi::c_void;

/// Host callbacks as plain function pointers, each taking the opaque user
/// data word first. The interface layer builds this from the user's callback
/// trait object; emitted code reaches these only through the prelude
/// trampolines.
#[derive(Clone, Copy)]
pub struct RuntimeCallbacks {
    pub user_data: *mut c_void,

    pub lookup_block: extern "C" fn(*mut c_void) -> *const u8,
    pub add_ticks: extern "C" fn(*mut c_void, u64),
    pub get_ticks_remaining: extern "C" fn(*mut c_void) -> u64,

    pub memory_read_8: extern "C" fn(*mut c_void, u64) -> u8,
    pub memory_read_16: extern "C" fn(*mut c_void, u64) -> u16,
    pub memory_read_32: extern "C" fn(*mut c_void, u64) -> u32,
    pub memory_read_64: extern "C" fn(*mut c_void, u64) -> u64,
    pub memory_read_128: extern "C" fn(*mut c_void, u64) -> u128,
    pub memory_write_8: extern "C" fn(*mut c_void, u64, u8),
    pub memory_write_16: extern "C" fn(*mut c_void, u64, u16),
    pub memory_write_32: extern "C" fn(*mut c_void, u64, u32),
    pub memory_write_64: extern "C" fn(*mut c_void, u64, u64),
    pub memory_write_128: extern "C" fn(*mut c_void, u64, u128),

    pub exclusive_read_8: extern "C" fn(*mut c_void, u64) -> u8,
    pub exclusive_read_16: extern "C" fn(*mut c_void, u64) -> u16,
    pub exclusive_read_32: extern "C" fn(*mut c_void, u64) -> u32,
    pub exclusive_read_64: extern "C" fn(*mut c_void, u64) -> u64,
    pub exclusive_read_128: extern "C" fn(*mut c_void, u64) -> u128,
    pub exclusive_write_8: extern "C" fn(*mut c_void, u64, u8) -> u32,
    pub exclusive_write_16: extern "C" fn(*mut c_void, u64, u16) -> u32,
    pub exclusive_write_32: extern "C" fn(*mut c_void, u64, u32) -> u32,
    pub exclusive_write_64: extern "C" fn(*mut c_void, u64, u64) -> u32,
    pub exclusive_write_128: extern "C" fn(*mut c_void, u64, u128) -> u32,

    pub call_svc: extern "C" fn(*mut c_void, u32),
    pub exception_raised: extern "C" fn(*mut c_void, u64, u64),
    pub interpreter_fallback: extern "C" fn(*mut c_void, u64, u64),
    pub isb_raised: extern "C" fn(*mut c_void),
    pub ic_raised: extern "C" fn(*mut c_void, u64),
    pub dc_raised: extern "C" fn(*mut c_void, u64, u64),
    pub get_cntpct: extern "C" fn(*mut c_void) -> u64,
}

/// Where a relocation in an emitted block wants to branch. Block-to-block
/// links are tracked separately, keyed by descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum LinkTarget {
    ReturnToDispatcher,
    ReturnFromRunCode,
    ReadMemory8,
    ReadMemory16,
    ReadMemory32,
    ReadMemory64,
    ReadMemory128,
    ExclusiveReadMemory8,
    ExclusiveReadMemory16,
    ExclusiveReadMemory32,
    ExclusiveReadMemory64,
    ExclusiveReadMemory128,
    WriteMemory8,
    WriteMemory16,
    WriteMemory32,
    WriteMemory64,
    WriteMemory128,
    ExclusiveWriteMemory8,
    ExclusiveWriteMemory16,
    ExclusiveWriteMemory32,
    ExclusiveWriteMemory64,
    ExclusiveWriteMemory128,
    CallSVC,
    ExceptionRaised,
    InterpreterFallback,
    InstructionSynchronizationBarrierRaised,
    InstructionCacheOperationRaised,
    DataCacheOperationRaised,
    GetCNTPCT,
    AddTicks,
    GetTicksRemaining,
}

/// Offsets into the guest state record the emitters and prelude need.
/// Computed per architecture with `offset_of!` and handed to the backend, so
/// the same emission code serves both state layouts.
#[derive(Clone, Copy, Debug)]
pub struct JitStateInfo {
    pub offsetof_guest_mxcsr: i32,
    pub offsetof_save_host_mxcsr: i32,
    pub offsetof_cycles_to_run: i32,
    pub offsetof_cycles_remaining: i32,
    pub offsetof_halt_reason: i32,
    pub offsetof_check_bit: i32,
    pub offsetof_spill: i32,
    pub offsetof_rsb_ptr: i32,
    pub offsetof_rsb_location_descriptors: i32,
    pub offsetof_rsb_codeptrs: i32,
}

impl JitStateInfo {
    pub fn for_a32() -> JitStateInfo {
        use crate::jitstate::A32JitState as S;
        JitStateInfo {
            offsetof_guest_mxcsr: core::mem::offset_of!(S, guest_mxcsr) as i32,
            offsetof_save_host_mxcsr: core::mem::offset_of!(S, save_host_mxcsr) as i32,
            offsetof_cycles_to_run: core::mem::offset_of!(S, cycles_to_run) as i32,
            offsetof_cycles_remaining: core::mem::offset_of!(S, cycles_remaining) as i32,
            offsetof_halt_reason: core::mem::offset_of!(S, halt_reason) as i32,
            offsetof_check_bit: core::mem::offset_of!(S, check_bit) as i32,
            offsetof_spill: core::mem::offset_of!(S, spill) as i32,
            offsetof_rsb_ptr: core::mem::offset_of!(S, rsb_ptr) as i32,
            offsetof_rsb_location_descriptors: core::mem::offset_of!(
                S,
                rsb_location_descriptors
            ) as i32,
            offsetof_rsb_codeptrs: core::mem::offset_of!(S, rsb_codeptrs) as i32,
        }
    }

    pub fn for_a64() -> JitStateInfo {
        use crate::jitstate::A64JitState as S;
        JitStateInfo {
            offsetof_guest_mxcsr: core::mem::offset_of!(S, guest_mxcsr) as i32,
            offsetof_save_host_mxcsr: core::mem::offset_of!(S, save_host_mxcsr) as i32,
            offsetof_cycles_to_run: core::mem::offset_of!(S, cycles_to_run) as i32,
            offsetof_cycles_remaining: core::mem::offset_of!(S, cycles_remaining) as i32,
            offsetof_halt_reason: core::mem::offset_of!(S, halt_reason) as i32,
            offsetof_check_bit: core::mem::offset_of!(S, check_bit) as i32,
            offsetof_spill: core::mem::offset_of!(S, spill) as i32,
            offsetof_rsb_ptr: core::mem::offset_of!(S, rsb_ptr) as i32,
            offsetof_rsb_location_descriptors: core::mem::offset_of!(
                S,
                rsb_location_descriptors
            ) as i32,
            offsetof_rsb_codeptrs: core::mem::offset_of!(S, rsb_codeptrs) as i32,
        }
    }
}
