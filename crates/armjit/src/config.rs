//! User configuration.

use std::sync::Arc;

use crate::monitor::ExclusiveMonitor;

bitflags::bitflags! {
    /// Optimisations that may be toggled per JIT instance. All are on by
    /// default; turning them off is mostly useful for debugging and
    /// differential testing.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Optimizations: u32 {
        const GET_SET_ELIMINATION = 1;
        const CONST_PROP = 1 << 1;
        const MISC_IR_OPT = 1 << 2;
        const RETURN_STACK_BUFFER = 1 << 3;
        const FAST_DISPATCH = 1 << 4;
        const BLOCK_LINKING = 1 << 5;
    }
}

impl Default for Optimizations {
    fn default() -> Optimizations {
        Optimizations::all()
    }
}

/// Configuration for an A32 JIT instance.
pub struct A32UserConfig {
    /// Arena size for emitted code.
    pub code_cache_size: usize,
    /// Where the far (cold) code area begins within the arena.
    pub far_code_offset: usize,
    pub optimizations: Optimizations,
    /// Use `GetTicksRemaining`/`AddTicks` to bound each `run`; without it a
    /// run only ends on an explicit halt.
    pub enable_cycle_counting: bool,
    /// Give UNPREDICTABLE encodings a defined behaviour instead of raising.
    pub define_unpredictable_behaviour: bool,
    /// Report hint instructions (YIELD, WFE, ...) through `exception_raised`.
    pub hook_hint_instructions: bool,
    /// Base of a contiguous host mapping of the whole guest address space;
    /// enables the fastmem paths. The mapping must cover 4 GiB.
    pub fastmem_pointer: Option<u64>,
    /// This core's identity towards the shared exclusive monitor.
    pub processor_id: usize,
    /// Monitor shared among cooperating cores. Without one, exclusive
    /// writes degrade to plain stores that always succeed.
    pub global_monitor: Option<Arc<ExclusiveMonitor>>,
}

impl Default for A32UserConfig {
    fn default() -> A32UserConfig {
        A32UserConfig {
            code_cache_size: 128 * 1024 * 1024,
            far_code_offset: 100 * 1024 * 1024,
            optimizations: Optimizations::default(),
            enable_cycle_counting: true,
            define_unpredictable_behaviour: false,
            hook_hint_instructions: false,
            fastmem_pointer: None,
            processor_id: 0,
            global_monitor: None,
        }
    }
}

/// Configuration for an A64 JIT instance.
pub struct A64UserConfig {
    pub code_cache_size: usize,
    pub far_code_offset: usize,
    pub optimizations: Optimizations,
    pub enable_cycle_counting: bool,
    pub define_unpredictable_behaviour: bool,
    pub hook_hint_instructions: bool,
    pub fastmem_pointer: Option<u64>,
    pub processor_id: usize,
    pub global_monitor: Option<Arc<ExclusiveMonitor>>,

    /// Values returned for the corresponding system registers.
    pub tpidr_el0: u64,
    pub tpidrro_el0: u64,
    pub cntfrq_el0: u32,
    pub ctr_el0: u32,
    pub dczid_el0: u32,
}

impl Default for A64UserConfig {
    fn default() -> A64UserConfig {
        A64UserConfig {
            code_cache_size: 128 * 1024 * 1024,
            far_code_offset: 100 * 1024 * 1024,
            optimizations: Optimizations::default(),
            enable_cycle_counting: true,
            define_unpredictable_behaviour: false,
            hook_hint_instructions: false,
            fastmem_pointer: None,
            processor_id: 0,
            global_monitor: None,
            tpidr_el0: 0,
            tpidrro_el0: 0,
            cntfrq_el0: 600_000_000,
            ctr_el0: 0x8444_c004,
            dczid_el0: 4,
        }
    }
}
