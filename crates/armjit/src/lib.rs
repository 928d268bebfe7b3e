//! armjit is a dynamic recompiler ("JIT") for 32-bit and 64-bit ARM guest
//! code. Guest programs are user-mode instruction streams supplied by the
//! host application through callbacks; the library translates them one basic
//! block at a time into native host code held in a bounded executable cache,
//! and exposes an execution loop, register file access, cache invalidation
//! hooks and an exclusive-monitor contract.
//!
//! A JIT instance ([`A32Jit`] or [`A64Jit`]) is single threaded: one host
//! thread owns `run`/`step` at a time. Execution can be interrupted from
//! anywhere through a [`HaltHandle`], and the code cache can be invalidated
//! from inside callbacks through an [`InvalidationHandle`]; both requests
//! take effect at the next block boundary.

mod a32;
mod a64;
mod config;
mod error;
mod halt;
mod monitor;
mod shared;

pub use crate::a32::{A32Context, A32Jit, A32UserCallbacks};
pub use crate::a64::{A64Context, A64Jit, A64UserCallbacks};
pub use crate::config::{A32UserConfig, A64UserConfig, Optimizations};
pub use crate::error::Error;
pub use crate::halt::{HaltHandle, HaltReason};
pub use crate::monitor::ExclusiveMonitor;
pub use crate::shared::InvalidationHandle;

pub use armjit_frontend::a32::Exception as A32Exception;
pub use armjit_frontend::a64::Exception as A64Exception;
