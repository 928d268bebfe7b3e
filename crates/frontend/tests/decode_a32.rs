//! A32/Thumb decode-to-IR tests.

use armjit_frontend::a32::{translate, A32LocationDescriptor};
use armjit_frontend::TranslationOptions;
use armjit_ir::{opt, Block, Cond, Opcode, Terminal};

fn translate_words(pc: u32, cpsr: u32, words: &[u32]) -> Block {
    let descriptor = A32LocationDescriptor::new(pc, cpsr, 0);
    let base = pc;
    let mut read = |addr: u32| {
        let index = (addr.wrapping_sub(base) / 4) as usize;
        words.get(index).copied().unwrap_or(0xE7FE_DEF0)
    };
    let block = translate(descriptor, &mut read, TranslationOptions::default());
    opt::verification_pass(&block);
    block
}

fn thumb(pc: u32, halfwords: &[u16]) -> Block {
    let mut words = Vec::new();
    for pair in halfwords.chunks(2) {
        let lo = u32::from(pair[0]);
        let hi = u32::from(pair.get(1).copied().unwrap_or(0xE7FE));
        words.push(hi << 16 | lo);
    }
    translate_words(pc, 0x30, &words)
}

fn has_op(block: &Block, opcode: Opcode) -> bool {
    block.iter().any(|i| block[i].opcode == opcode)
}

#[test]
fn arm_add_immediate() {
    // add r1, r0, #1
    let block = translate_words(0, 0, &[0xE280_1001, 0xEAFF_FFFE]);
    assert!(has_op(&block, Opcode::A32GetRegister));
    assert!(has_op(&block, Opcode::Add32));
    assert!(has_op(&block, Opcode::A32SetRegister));
}

#[test]
fn arm_branch_terminates_with_link() {
    // b +8 (to 0x10 from pc 0: 0 + 8 + 8)
    let block = translate_words(0, 0, &[0xEA00_0002]);
    match block.terminal() {
        Terminal::LinkBlock { next } => assert_eq!(next.value() >> 32, 0x10),
        other => panic!("unexpected terminal {other:?}"),
    }
    assert_eq!(block.cycle_count, 1);
}

#[test]
fn arm_conditional_instructions_set_block_cond() {
    // addeq r0, r0, #1; unconditional next instruction breaks the block
    let block = translate_words(0, 0, &[0x0280_0001, 0xE280_0001]);
    assert_eq!(block.cond, Cond::EQ);
    assert_eq!(block.cond_failed.unwrap().value() >> 32, 4);
}

#[test]
fn arm_bl_pushes_rsb_and_sets_lr() {
    // bl +0
    let block = translate_words(0x100, 0, &[0xEB00_0000]);
    assert!(has_op(&block, Opcode::A32PushRSB));
    let set_lr = block
        .iter()
        .find(|&i| block[i].opcode == Opcode::A32SetRegister)
        .unwrap();
    assert_eq!(block[set_lr].args[1], armjit_ir::Value::U32(0x104));
}

#[test]
fn arm_bx_lr_is_a_return() {
    // bx lr
    let block = translate_words(0, 0, &[0xE12F_FF1E]);
    assert!(has_op(&block, Opcode::A32BXWritePC));
    assert_eq!(*block.terminal(), Terminal::PopRSBHint);
}

#[test]
fn arm_ldrex_strex_pair() {
    // ldrex r0, [r1]; strex r2, r3, [r1]
    let block = translate_words(0, 0, &[0xE191_0F9F, 0xE181_2F93, 0xEAFF_FFFE]);
    assert!(has_op(&block, Opcode::A32ExclusiveReadMemory32));
    assert!(has_op(&block, Opcode::A32ExclusiveWriteMemory32));
}

#[test]
fn arm_svc_calls_supervisor() {
    let block = translate_words(0, 0, &[0xEF00_002A]);
    assert!(has_op(&block, Opcode::A32CallSupervisor));
    assert!(matches!(block.terminal(), Terminal::CheckHalt { .. }));
}

#[test]
fn arm_undefined_instruction_raises() {
    let block = translate_words(0, 0, &[0xE7F0_00F0]);
    assert!(has_op(&block, Opcode::A32ExceptionRaised));
}

#[test]
fn arm_vfp_add() {
    // vadd.f32 s0, s0, s1
    let block = translate_words(0, 0, &[0xEE30_0A20, 0xEAFF_FFFE]);
    assert!(has_op(&block, Opcode::FPAdd32));
}

#[test]
fn thumb_lsls_sets_flags() {
    // lsls r0, r1, #31 (0x07C8)
    let block = thumb(0, &[0x07C8, 0xE7FE]);
    assert!(has_op(&block, Opcode::LogicalShiftLeft32));
    assert!(has_op(&block, Opcode::GetCarryFromOp));
    assert!(has_op(&block, Opcode::A32SetNFlag));
    assert!(has_op(&block, Opcode::A32SetCFlag));
}

#[test]
fn thumb_it_block_ends_the_block() {
    // it eq; moveq r0, #1
    let block = thumb(0, &[0xBF08, 0x2001]);
    // The IT instruction itself ends the block with the new IT state in the
    // successor descriptor.
    match block.terminal() {
        Terminal::LinkBlock { next } => {
            let loc = A32LocationDescriptor::from(*next);
            assert!(loc.it_state().is_in_it_block());
            assert_eq!(loc.it_state().cond(), Cond::EQ);
        }
        other => panic!("unexpected terminal {other:?}"),
    }
}

#[test]
fn thumb_in_it_block_is_conditional() {
    // Block at an IT-guarded location: moveq r0, #1
    let descriptor = A32LocationDescriptor::new(2, 0x30, 0).set_it_state(
        armjit_frontend::a32::ItState::new(0b0000_1000),
    );
    let mut read = |_addr: u32| 0x2001_2001u32;
    let block = translate(descriptor, &mut read, TranslationOptions::default());
    assert_eq!(block.cond, Cond::EQ);
    // A single IT-guarded instruction per block.
    assert_eq!(block.cycle_count, 1);
}

#[test]
fn thumb_cbz_uses_check_bit() {
    // cbz r0, +4
    let block = thumb(0, &[0xB110]);
    assert!(has_op(&block, Opcode::SetCheckBit));
    assert!(matches!(block.terminal(), Terminal::CheckBit { .. }));
}

#[test]
fn thumb_bl_is_32_bit() {
    // bl +0x100: F000 F880
    let block = thumb(0, &[0xF000, 0xF87E]);
    assert!(has_op(&block, Opcode::A32PushRSB));
    match block.terminal() {
        Terminal::LinkBlock { next } => {
            let loc = A32LocationDescriptor::from(*next);
            assert_eq!(loc.pc(), 0x100);
            assert!(loc.t_flag());
        }
        other => panic!("unexpected terminal {other:?}"),
    }
}

#[test]
fn conditional_branch_uses_if_terminal() {
    // beq +2
    let block = thumb(0, &[0xD001]);
    assert!(matches!(block.terminal(), Terminal::If { cond: Cond::EQ, .. }));
}
