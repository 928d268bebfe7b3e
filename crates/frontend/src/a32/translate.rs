//! The A32/Thumb translation loop.

use armjit_ir::{Block, Cond, IrEmitter, Terminal, Value};

use super::location::A32LocationDescriptor;
use super::Exception;
use crate::decoder::lookup;
use crate::TranslationOptions;

/// Reads a 32-bit code word at a guest address.
pub type ReadCodeFn<'a> = dyn FnMut(u32) -> u32 + 'a;

/// Translation context threaded through every handler.
pub(super) struct A32Translator {
    pub ir: IrEmitter,
    pub options: TranslationOptions,
    /// Location of the instruction currently being translated.
    pub current: A32LocationDescriptor,
    /// 4 in ARM state, 2 for a 16-bit Thumb instruction.
    pub instruction_size: u32,
}

impl A32Translator {
    /// The architectural PC value as seen by the current instruction.
    pub fn arm_pc(&self) -> u32 {
        let offset = if self.current.t_flag() { 4 } else { 8 };
        self.current.pc().wrapping_add(offset)
    }

    /// Register read; reads of PC yield the architectural constant.
    pub fn get_register(&mut self, reg: armjit_ir::A32Reg) -> Value {
        if reg == armjit_ir::A32Reg::PC {
            let pc = self.arm_pc();
            self.ir.imm32(pc)
        } else {
            self.ir.a32_get_register(reg)
        }
    }

    pub fn set_register(&mut self, reg: armjit_ir::A32Reg, value: Value) {
        self.ir.a32_set_register(reg, value);
    }

    /// Write an ALU result to the PC. From ARMv7 this interworks.
    pub fn alu_write_pc(&mut self, value: Value) {
        self.ir.a32_bx_write_pc(value);
    }

    pub fn load_write_pc(&mut self, value: Value) {
        self.ir.a32_bx_write_pc(value);
    }

    /// Raise a guest exception for this instruction and stop the block.
    pub fn raise_exception(&mut self, exception: Exception) -> bool {
        let pc = self.current.pc();
        self.ir.a32_exception_raised(pc, exception.code());
        let next = self.next_location();
        self.ir.set_term(Terminal::check_halt(Terminal::LinkBlock { next: next.into() }));
        false
    }

    pub fn undefined_instruction(&mut self) -> bool {
        self.raise_exception(Exception::UndefinedInstruction)
    }

    pub fn unpredictable_instruction(&mut self) -> bool {
        if self.options.define_unpredictable_behaviour {
            // Defined as a NOP; the spec for each site chooses tighter
            // behaviour where it matters.
            return true;
        }
        self.raise_exception(Exception::UnpredictableInstruction)
    }

    /// Descriptor of the next instruction in sequence, IT state advanced.
    pub fn next_location(&self) -> A32LocationDescriptor {
        self.current
            .advance_pc(self.instruction_size as i32)
            .set_it_state(self.current.it_state().advance())
    }

    /// Descriptor for a branch to `pc` in the current instruction set state.
    /// Branches permitted inside an IT block are its last instruction, so
    /// the advanced IT state is always empty.
    pub fn branch_target(&self, pc: u32) -> A32LocationDescriptor {
        self.current.set_pc(pc).set_it_state(self.current.it_state().advance())
    }

    /// RSB entry for a call made by the current instruction.
    pub fn push_rsb(&mut self, return_location: A32LocationDescriptor) {
        let descriptor: armjit_ir::LocationDescriptor = return_location.into();
        self.ir.a32_push_rsb(descriptor.value());
    }
}

/// Translate one basic block starting at `descriptor`.
pub fn translate(
    descriptor: A32LocationDescriptor,
    read_code: &mut ReadCodeFn<'_>,
    options: TranslationOptions,
) -> Block {
    if descriptor.t_flag() {
        translate_thumb(descriptor, read_code, options)
    } else {
        translate_arm(descriptor, read_code, options)
    }
}

/// Append the translation of a single instruction to `block`. Returns
/// whether translation may continue. Used by tests and by the merge pass
/// probe.
pub fn translate_single_instruction(
    block: Block,
    descriptor: A32LocationDescriptor,
    instruction: u32,
) -> (Block, bool) {
    let mut translator = A32Translator {
        ir: IrEmitter::new(block),
        options: TranslationOptions::default(),
        current: descriptor,
        instruction_size: if descriptor.t_flag() { 2 } else { 4 },
    };

    let should_continue = if descriptor.t_flag() {
        dispatch_thumb(&mut translator, instruction)
    } else {
        dispatch_arm(&mut translator, instruction)
    };
    (translator.ir.block, should_continue)
}

fn dispatch_arm(translator: &mut A32Translator, word: u32) -> bool {
    match lookup(super::arm::table(), word) {
        Some(entry) => {
            log::trace!("a32: {:08x} {}", word, entry.name);
            (entry.handler)(translator, word)
        }
        None => translator.undefined_instruction(),
    }
}

fn dispatch_thumb(translator: &mut A32Translator, word: u32) -> bool {
    match lookup(super::thumb::table(), word) {
        Some(entry) => {
            log::trace!("thumb: {:08x} {}", word, entry.name);
            (entry.handler)(translator, word)
        }
        None => translator.undefined_instruction(),
    }
}

fn translate_arm(
    descriptor: A32LocationDescriptor,
    read_code: &mut ReadCodeFn<'_>,
    options: TranslationOptions,
) -> Block {
    let mut translator = A32Translator {
        ir: IrEmitter::new(Block::new(descriptor.into())),
        options,
        current: descriptor,
        instruction_size: 4,
    };

    let single_step = descriptor.single_stepping();
    let mut block_cond: Option<Cond> = None;
    let mut should_continue = true;
    let mut instruction_count = 0usize;

    while should_continue {
        let word = read_code(translator.current.pc());
        // The cond=NV space is unconditional from ARMv5 on.
        let cond = match word >> 28 {
            0b1111 => Cond::AL,
            bits => Cond::from_bits(bits),
        };

        match block_cond {
            None => {
                if cond != Cond::AL {
                    translator.ir.block.cond = cond;
                }
                block_cond = Some(cond);
            }
            Some(current) if cond != current => break,
            Some(_) => {}
        }

        should_continue = dispatch_arm(&mut translator, word);
        translator.ir.block.cycle_count += 1;
        translator.current = translator.current.advance_pc(4);
        instruction_count += 1;

        if single_step || instruction_count >= options.max_block_instructions {
            break;
        }
    }

    finish_block(translator, block_cond, should_continue, single_step)
}

fn translate_thumb(
    descriptor: A32LocationDescriptor,
    read_code: &mut ReadCodeFn<'_>,
    options: TranslationOptions,
) -> Block {
    let mut translator = A32Translator {
        ir: IrEmitter::new(Block::new(descriptor.into())),
        options,
        current: descriptor,
        instruction_size: 2,
    };

    let single_step = descriptor.single_stepping();
    let mut block_cond: Option<Cond> = None;
    let mut should_continue = true;
    let mut instruction_count = 0usize;

    while should_continue {
        let pc = translator.current.pc();
        let word = read_code(pc & !3);
        let halfword = if pc & 2 == 0 { word & 0xFFFF } else { word >> 16 };

        let it = translator.current.it_state();
        let cond = if it.is_in_it_block() { it.cond() } else { Cond::AL };

        match block_cond {
            None => {
                if cond != Cond::AL {
                    translator.ir.block.cond = cond;
                }
                block_cond = Some(cond);
            }
            Some(current) if cond != current => break,
            Some(_) => {}
        }

        if is_thumb32_prefix(halfword) {
            // 32-bit encoding: fetch the second halfword.
            let pc2 = pc.wrapping_add(2);
            let word2 = read_code(pc2 & !3);
            let halfword2 = if pc2 & 2 == 0 { word2 & 0xFFFF } else { word2 >> 16 };
            let combined = halfword << 16 | halfword2;
            translator.instruction_size = 4;
            should_continue = match lookup(super::thumb::table32(), combined) {
                Some(entry) => {
                    log::trace!("thumb32: {combined:08x} {}", entry.name);
                    (entry.handler)(&mut translator, combined)
                }
                None => translator.undefined_instruction(),
            };
            translator.current = translator.current.advance_pc(4);
            translator.instruction_size = 2;
        } else {
            should_continue = dispatch_thumb(&mut translator, halfword);
            translator.current = translator.current.advance_pc(2);
        }
        translator.ir.block.cycle_count += 1;
        instruction_count += 1;

        // Advancing the IT state changes the decode context; end the block
        // whenever the state was active or has just been set up.
        if it.is_in_it_block() {
            translator.current = translator.current.set_it_state(it.advance());
            break;
        }
        if translator.current.it_state().is_in_it_block() {
            // An IT instruction just executed.
            break;
        }

        if single_step || instruction_count >= options.max_block_instructions {
            break;
        }
    }

    finish_block(translator, block_cond, should_continue, single_step)
}

fn is_thumb32_prefix(halfword: u32) -> bool {
    matches!(halfword >> 11, 0b11101 | 0b11110 | 0b11111)
}

fn finish_block(
    translator: A32Translator,
    block_cond: Option<Cond>,
    should_continue: bool,
    single_step: bool,
) -> Block {
    let mut translator = translator;
    let current = translator.current;
    if should_continue {
        if single_step {
            translator.ir.a32_update_upper_location_descriptor(current.upper_half());
            let pc = translator.ir.imm32(current.pc());
            translator.ir.a32_set_register(armjit_ir::A32Reg::PC, pc);
            translator.ir.set_term(Terminal::ReturnToDispatch);
        } else {
            translator
                .ir
                .set_term(Terminal::LinkBlock { next: current.into() });
        }
    }

    let mut block = translator.ir.block;
    block.set_end_location(current.into());
    if block_cond.map(|c| c != Cond::AL).unwrap_or(false) {
        block.cond_failed = Some(current.into());
    }
    block
}
