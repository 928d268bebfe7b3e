//! Guest frontends: fetch, decode and translate one basic block of A32,
//! Thumb or A64 code into IR.
//!
//! Decoding is table driven. Each instruction family contributes entries
//! built from bit-pattern strings; dispatch scans for the first match and
//! calls the handler, which extracts its fields from the raw word and
//! appends IR through [`armjit_ir::IrEmitter`].

mod bit_util;
mod decoder;

pub mod a32;
pub mod a64;

pub use crate::decoder::{DecodeEntry, Pattern};

/// Knobs shared by the frontends.
#[derive(Clone, Copy, Debug)]
pub struct TranslationOptions {
    /// Give UNPREDICTABLE encodings a concrete interpretation instead of
    /// raising a guest exception.
    pub define_unpredictable_behaviour: bool,
    /// Report hint instructions (YIELD, WFE, ...) through the exception
    /// callback rather than treating them as NOPs.
    pub hook_hint_instructions: bool,
    /// Upper bound on guest instructions per translated block.
    pub max_block_instructions: usize,
}

impl Default for TranslationOptions {
    fn default() -> TranslationOptions {
        TranslationOptions {
            define_unpredictable_behaviour: false,
            hook_hint_instructions: false,
            max_block_instructions: 128,
        }
    }
}
