//! The optimisation pipeline.
//!
//! Passes run in a fixed order between translation and emission; every pass
//! is idempotent and preserves the observable behaviour of the block
//! (memory accesses are never reordered or dropped).

mod constant_memory_reads;
mod constant_propagation;
mod dead_code_elimination;
mod get_set_elimination_a32;
mod get_set_elimination_a64;
mod merge_interpret_blocks;
mod polyfill;
mod verification;

pub use self::constant_memory_reads::{a32_constant_memory_reads, A32ConstMemoryCallbacks};
pub use self::constant_propagation::{constant_propagation, ConstPropOptions};
pub use self::dead_code_elimination::dead_code_elimination;
pub use self::get_set_elimination_a32::a32_get_set_elimination;
pub use self::get_set_elimination_a64::a64_get_set_elimination;
pub use self::merge_interpret_blocks::merge_interpret_blocks;
pub use self::polyfill::{polyfill_pass, PolyfillOptions};
pub use self::verification::verification_pass;
