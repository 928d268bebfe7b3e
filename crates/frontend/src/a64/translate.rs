//! The A64 translation loop.

use armjit_ir::{A64Reg, Block, IrEmitter, Terminal, Value};

use super::location::A64LocationDescriptor;
use super::Exception;
use crate::decoder::lookup;
use crate::TranslationOptions;

/// Reads a 32-bit code word at a guest address.
pub type ReadCodeFn<'a> = dyn FnMut(u64) -> u32 + 'a;

pub(super) struct A64Translator {
    pub ir: IrEmitter,
    pub options: TranslationOptions,
    pub current: A64LocationDescriptor,
}

impl A64Translator {
    pub fn pc(&self) -> u64 {
        self.current.pc()
    }

    /// W-register read; X31 reads as zero.
    pub fn get_w(&mut self, reg: u32) -> Value {
        if reg == 31 {
            self.ir.imm32(0)
        } else {
            self.ir.a64_get_w(A64Reg(reg as u8))
        }
    }

    /// X-register read; X31 reads as zero.
    pub fn get_x(&mut self, reg: u32) -> Value {
        if reg == 31 {
            self.ir.imm64(0)
        } else {
            self.ir.a64_get_x(A64Reg(reg as u8))
        }
    }

    /// Register read where index 31 names the stack pointer.
    pub fn get_x_or_sp(&mut self, reg: u32) -> Value {
        if reg == 31 {
            self.ir.a64_get_sp()
        } else {
            self.ir.a64_get_x(A64Reg(reg as u8))
        }
    }

    /// W-register write; writes to W31 vanish.
    pub fn set_w(&mut self, reg: u32, value: Value) {
        if reg != 31 {
            self.ir.a64_set_w(A64Reg(reg as u8), value);
        }
    }

    pub fn set_x(&mut self, reg: u32, value: Value) {
        if reg != 31 {
            self.ir.a64_set_x(A64Reg(reg as u8), value);
        }
    }

    pub fn set_x_or_sp(&mut self, reg: u32, value: Value) {
        if reg == 31 {
            self.ir.a64_set_sp(value);
        } else {
            self.ir.a64_set_x(A64Reg(reg as u8), value);
        }
    }

    pub fn next_location(&self) -> A64LocationDescriptor {
        self.current.advance_pc(4)
    }

    pub fn raise_exception(&mut self, exception: Exception) -> bool {
        let pc = self.pc();
        self.ir.a64_exception_raised(pc, exception.code());
        let next = self.next_location();
        self.ir.set_term(Terminal::check_halt(Terminal::LinkBlock { next: next.into() }));
        false
    }

    pub fn undefined_instruction(&mut self) -> bool {
        self.raise_exception(Exception::UndefinedInstruction)
    }

    pub fn unpredictable_instruction(&mut self) -> bool {
        if self.options.define_unpredictable_behaviour {
            return true;
        }
        self.raise_exception(Exception::UnpredictableInstruction)
    }

    /// Fall back to the host's interpreter for this instruction.
    pub fn interpret_fallback(&mut self) -> bool {
        self.ir.set_term(Terminal::Interpret {
            next: self.current.into(),
            num_instructions: 1,
        });
        false
    }

    pub fn push_rsb(&mut self, return_location: A64LocationDescriptor) {
        let descriptor: armjit_ir::LocationDescriptor = return_location.into();
        self.ir.a64_push_rsb(descriptor.value());
    }
}

/// Translate one basic block starting at `descriptor`.
pub fn translate(
    descriptor: A64LocationDescriptor,
    read_code: &mut ReadCodeFn<'_>,
    options: TranslationOptions,
) -> Block {
    let mut translator = A64Translator {
        ir: IrEmitter::new(Block::new(descriptor.into())),
        options,
        current: descriptor,
    };

    let single_step = descriptor.single_stepping();
    let mut should_continue = true;
    let mut instruction_count = 0usize;

    while should_continue {
        let word = read_code(translator.current.pc());
        should_continue = dispatch(&mut translator, word);
        translator.ir.block.cycle_count += 1;
        translator.current = translator.current.advance_pc(4);
        instruction_count += 1;

        if single_step || instruction_count >= options.max_block_instructions {
            break;
        }
    }

    let current = translator.current;
    if should_continue {
        if single_step {
            let pc = translator.ir.imm64(current.pc());
            translator.ir.a64_set_pc(pc);
            translator.ir.set_term(Terminal::ReturnToDispatch);
        } else {
            translator.ir.set_term(Terminal::LinkBlock { next: current.into() });
        }
    }

    let mut block = translator.ir.block;
    block.set_end_location(current.into());
    block
}

/// Append the translation of a single instruction to `block`, for tests and
/// the merge-interpret probe.
pub fn translate_single_instruction(
    block: Block,
    descriptor: A64LocationDescriptor,
    instruction: u32,
) -> (Block, bool) {
    let mut translator = A64Translator {
        ir: IrEmitter::new(block),
        options: TranslationOptions::default(),
        current: descriptor,
    };
    let should_continue = dispatch(&mut translator, instruction);
    (translator.ir.block, should_continue)
}

fn dispatch(translator: &mut A64Translator, word: u32) -> bool {
    match lookup(super::table::table(), word) {
        Some(entry) => {
            log::trace!("a64: {word:08x} {}", entry.name);
            (entry.handler)(translator, word)
        }
        None => translator.interpret_fallback(),
    }
}
