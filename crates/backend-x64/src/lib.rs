//! x86-64 host backend: translates optimised IR blocks into native code in a
//! bounded executable arena, and owns everything needed to run it — the
//! dispatcher prelude, the block index and link tables, the register
//! allocator, the guest state records and the host-memory exception handler.

mod abi;
mod address_space;
mod assembler;
mod block_of_code;
mod callbacks;
mod constant_pool;
mod emit;
mod exception_handler;
mod hostloc;
mod jitstate;
mod regalloc;

#[cfg(feature = "disas")]
mod disas;

pub use crate::address_space::AddressSpace;
pub use crate::block_of_code::{BlockOfCode, CodePtr};
pub use crate::callbacks::{JitStateInfo, RuntimeCallbacks};
pub use crate::emit::{EmitConfig, GuestArch};
pub use crate::exception_handler::{register_code_range, unregister_code_range, FakeCall};
pub use crate::jitstate::{A32JitState, A64JitState, RSB_PTR_MASK, RSB_SIZE};

#[cfg(feature = "disas")]
pub use crate::disas::disassemble;

/// Host capabilities relevant to emission, detected once at startup.
#[derive(Clone, Copy, Debug)]
pub struct HostFeatures {
    pub lzcnt: bool,
}

impl HostFeatures {
    pub fn detect() -> HostFeatures {
        #[cfg(target_arch = "x86_64")]
        {
            HostFeatures { lzcnt: std::arch::is_x86_feature_detected!("lzcnt") }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            HostFeatures { lzcnt: false }
        }
    }
}
