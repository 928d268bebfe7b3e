//! Block index and link table bookkeeping, without executing guest code.

#![cfg(target_arch = "x86_64")]

use core::ffi::c_void;

use armjit_backend_x64::{
    AddressSpace, EmitConfig, GuestArch, JitStateInfo, RuntimeCallbacks,
};
use armjit_ir::{A32Reg, Block, IrEmitter, LocationDescriptor, Terminal};

// Inert callbacks: bookkeeping tests never run emitted code.
mod stubs {
    use super::*;

    pub extern "C" fn lookup(_: *mut c_void) -> *const u8 {
        core::ptr::null()
    }
    pub extern "C" fn add_ticks(_: *mut c_void, _: u64) {}
    pub extern "C" fn ticks_remaining(_: *mut c_void) -> u64 {
        0
    }
    pub extern "C" fn r8(_: *mut c_void, _: u64) -> u8 {
        0
    }
    pub extern "C" fn r16(_: *mut c_void, _: u64) -> u16 {
        0
    }
    pub extern "C" fn r32(_: *mut c_void, _: u64) -> u32 {
        0
    }
    pub extern "C" fn r64(_: *mut c_void, _: u64) -> u64 {
        0
    }
    pub extern "C" fn r128(_: *mut c_void, _: u64) -> u128 {
        0
    }
    pub extern "C" fn w8(_: *mut c_void, _: u64, _: u8) {}
    pub extern "C" fn w16(_: *mut c_void, _: u64, _: u16) {}
    pub extern "C" fn w32(_: *mut c_void, _: u64, _: u32) {}
    pub extern "C" fn w64(_: *mut c_void, _: u64, _: u64) {}
    pub extern "C" fn w128(_: *mut c_void, _: u64, _: u128) {}
    pub extern "C" fn xw8(_: *mut c_void, _: u64, _: u8) -> u32 {
        0
    }
    pub extern "C" fn xw16(_: *mut c_void, _: u64, _: u16) -> u32 {
        0
    }
    pub extern "C" fn xw32(_: *mut c_void, _: u64, _: u32) -> u32 {
        0
    }
    pub extern "C" fn xw64(_: *mut c_void, _: u64, _: u64) -> u32 {
        0
    }
    pub extern "C" fn xw128(_: *mut c_void, _: u64, _: u128) -> u32 {
        0
    }
    pub extern "C" fn svc(_: *mut c_void, _: u32) {}
    pub extern "C" fn exception(_: *mut c_void, _: u64, _: u64) {}
    pub extern "C" fn interp(_: *mut c_void, _: u64, _: u64) {}
    pub extern "C" fn isb(_: *mut c_void) {}
    pub extern "C" fn ic(_: *mut c_void, _: u64) {}
    pub extern "C" fn dc(_: *mut c_void, _: u64, _: u64) {}
    pub extern "C" fn cntpct(_: *mut c_void) -> u64 {
        0
    }
}

fn runtime_callbacks() -> RuntimeCallbacks {
    RuntimeCallbacks {
        user_data: core::ptr::null_mut(),
        lookup_block: stubs::lookup,
        add_ticks: stubs::add_ticks,
        get_ticks_remaining: stubs::ticks_remaining,
        memory_read_8: stubs::r8,
        memory_read_16: stubs::r16,
        memory_read_32: stubs::r32,
        memory_read_64: stubs::r64,
        memory_read_128: stubs::r128,
        memory_write_8: stubs::w8,
        memory_write_16: stubs::w16,
        memory_write_32: stubs::w32,
        memory_write_64: stubs::w64,
        memory_write_128: stubs::w128,
        exclusive_read_8: stubs::r8,
        exclusive_read_16: stubs::r16,
        exclusive_read_32: stubs::r32,
        exclusive_read_64: stubs::r64,
        exclusive_read_128: stubs::r128,
        exclusive_write_8: stubs::xw8,
        exclusive_write_16: stubs::xw16,
        exclusive_write_32: stubs::xw32,
        exclusive_write_64: stubs::xw64,
        exclusive_write_128: stubs::xw128,
        call_svc: stubs::svc,
        exception_raised: stubs::exception,
        interpreter_fallback: stubs::interp,
        isb_raised: stubs::isb,
        ic_raised: stubs::ic,
        dc_raised: stubs::dc,
        get_cntpct: stubs::cntpct,
    }
}

fn address_space() -> AddressSpace {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = EmitConfig {
        arch: GuestArch::A32,
        jsi: JitStateInfo::for_a32(),
        offsetof_cpsr_nzcv: core::mem::offset_of!(armjit_backend_x64::A32JitState, cpsr_nzcv)
            as i32,
        offsetof_fpcr: core::mem::offset_of!(
            armjit_backend_x64::A32JitState,
            upper_location_descriptor
        ) as i32,
        fpcr_mask: 0x07F7_0000,
        offsetof_fpsr: core::mem::offset_of!(armjit_backend_x64::A32JitState, fpsr) as i32,
        fastmem: false,
        fast_dispatch_table: core::ptr::null(),
        fast_dispatch_table_mask: 0,
        cntfrq_el0: 0,
        ctr_el0: 0,
        dczid_el0: 0,
        enable_cycle_counting: true,
        enable_block_linking: true,
        enable_rsb: true,
    };
    AddressSpace::new(
        GuestArch::A32,
        JitStateInfo::for_a32(),
        config,
        &runtime_callbacks(),
        32 * 1024 * 1024,
        24 * 1024 * 1024,
        1,
        None,
        true,
    )
}

/// A trivial block at `pc` linking on to `next_pc`.
fn linking_block(pc: u32, next_pc: u32) -> Block {
    let location = LocationDescriptor::new(u64::from(pc) << 32);
    let mut ir = IrEmitter::new(Block::new(location));
    let value = ir.imm32(pc);
    ir.a32_set_register(A32Reg::R0, value);
    ir.set_term(Terminal::LinkBlock {
        next: LocationDescriptor::new(u64::from(next_pc) << 32),
    });
    let mut block = ir.block;
    block.cycle_count = 1;
    block.set_end_location(LocationDescriptor::new(u64::from(pc + 4) << 32));
    block
}

#[test]
fn blocks_are_indexed_and_reused() {
    let mut aspace = address_space();
    let descriptor = LocationDescriptor::new(0x1000_0000_0000);

    assert!(aspace.get(descriptor).is_none());

    let mut calls = 0;
    let entry = aspace.get_or_emit(descriptor, &mut |d| {
        calls += 1;
        linking_block((d.value() >> 32) as u32, 0x2000)
    });
    assert!(!entry.is_null());
    assert_eq!(aspace.get(descriptor), Some(entry));

    // A second request must reuse the block.
    let entry2 = aspace.get_or_emit(descriptor, &mut |_| unreachable!("must be cached"));
    assert_eq!(entry, entry2);
    assert_eq!(calls, 1);
}

#[test]
fn entries_live_inside_the_arena() {
    let mut aspace = address_space();
    let descriptor = LocationDescriptor::new(0x4000_0000_0000);
    let entry =
        aspace.get_or_emit(descriptor, &mut |d| linking_block((d.value() >> 32) as u32, 0x2000));

    let base = aspace.code().base() as usize;
    let size = aspace.code().total_size();
    assert!((entry as usize) >= base && (entry as usize) < base + size);
}

#[test]
fn clear_cache_forgets_blocks_and_bumps_the_generation() {
    let mut aspace = address_space();
    let descriptor = LocationDescriptor::new(0x1234_0000_0000);
    aspace.get_or_emit(descriptor, &mut |d| linking_block((d.value() >> 32) as u32, 0x2000));

    let generation = aspace.invalid_cache_generation();
    aspace.clear_cache();

    assert!(aspace.get(descriptor).is_none());
    assert_ne!(aspace.invalid_cache_generation(), generation);

    // The arena is reusable afterwards.
    let entry = aspace
        .get_or_emit(descriptor, &mut |d| linking_block((d.value() >> 32) as u32, 0x2000));
    assert!(!entry.is_null());
}

#[test]
fn range_invalidation_is_selective() {
    let mut aspace = address_space();
    let at_1000 = LocationDescriptor::new(0x1000u64 << 32);
    let at_2000 = LocationDescriptor::new(0x2000u64 << 32);
    aspace.get_or_emit(at_1000, &mut |_| linking_block(0x1000, 0x2000));
    aspace.get_or_emit(at_2000, &mut |_| linking_block(0x2000, 0x3000));

    aspace.invalidate_cache_ranges(&[(0x1000, 4)]);

    assert!(aspace.get(at_1000).is_none());
    assert!(aspace.get(at_2000).is_some());
}

#[test]
fn linking_patches_callers_when_the_target_appears() {
    let mut aspace = address_space();
    let caller = LocationDescriptor::new(0x1000u64 << 32);
    let target = LocationDescriptor::new(0x2000u64 << 32);

    let caller_entry = aspace.get_or_emit(caller, &mut |_| linking_block(0x1000, 0x2000));
    // Emitting the target must revisit the caller's link sites without
    // disturbing its entry.
    let target_entry = aspace.get_or_emit(target, &mut |_| linking_block(0x2000, 0x3000));

    assert_ne!(caller_entry, target_entry);
    assert_eq!(aspace.get(caller), Some(caller_entry));
    assert_eq!(aspace.get(target), Some(target_entry));
}
