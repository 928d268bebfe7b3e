//! A64 decode-to-IR tests.

use armjit_frontend::a64::{translate, A64LocationDescriptor};
use armjit_frontend::TranslationOptions;
use armjit_ir::{opt, Block, Cond, Opcode, Terminal};

fn translate_words(pc: u64, words: &[u32]) -> Block {
    let descriptor = A64LocationDescriptor::new(pc, 0);
    let mut read = |addr: u64| {
        let index = (addr.wrapping_sub(pc) / 4) as usize;
        words.get(index).copied().unwrap_or(0x1400_0000)
    };
    let block = translate(descriptor, &mut read, TranslationOptions::default());
    opt::verification_pass(&block);
    block
}

fn has_op(block: &Block, opcode: Opcode) -> bool {
    block.iter().any(|i| block[i].opcode == opcode)
}

#[test]
fn add_shifted_register() {
    // add x0, x1, x2 (0x8b020020)
    let block = translate_words(0, &[0x8B02_0020, 0x1400_0000]);
    assert!(has_op(&block, Opcode::A64GetX));
    assert!(has_op(&block, Opcode::Add64));
    assert!(has_op(&block, Opcode::A64SetX));
}

#[test]
fn branch_to_self_terminates() {
    // b . (0x14000000)
    let block = translate_words(0x40, &[0x1400_0000]);
    assert_eq!(block.cycle_count, 1);
    match block.terminal() {
        Terminal::LinkBlock { next } => {
            assert_eq!(A64LocationDescriptor::from(*next).pc(), 0x40);
        }
        other => panic!("unexpected terminal {other:?}"),
    }
}

#[test]
fn adds_attaches_nzcv() {
    // adds x0, x1, x2
    let block = translate_words(0, &[0xAB02_0020, 0x1400_0000]);
    assert!(has_op(&block, Opcode::GetNZCVFromOp));
    assert!(has_op(&block, Opcode::A64SetNZCV));
}

#[test]
fn conditional_branch_uses_if_terminal() {
    // b.eq +8
    let block = translate_words(0, &[0x5400_0040]);
    assert!(matches!(block.terminal(), Terminal::If { cond: Cond::EQ, .. }));
}

#[test]
fn cbz_uses_check_bit() {
    // cbz x0, +8
    let block = translate_words(0, &[0xB400_0040]);
    assert!(has_op(&block, Opcode::IsZero64));
    assert!(matches!(block.terminal(), Terminal::CheckBit { .. }));
}

#[test]
fn ret_pops_the_rsb() {
    // ret (x30)
    let block = translate_words(0, &[0xD65F_03C0]);
    assert!(has_op(&block, Opcode::A64SetPC));
    assert_eq!(*block.terminal(), Terminal::PopRSBHint);
}

#[test]
fn bl_pushes_the_rsb() {
    // bl +4
    let block = translate_words(0, &[0x9400_0001]);
    assert!(has_op(&block, Opcode::A64PushRSB));
    let set_lr = block.iter().find(|&i| block[i].opcode == Opcode::A64SetX).unwrap();
    assert_eq!(block[set_lr].args[1], armjit_ir::Value::U64(4));
}

#[test]
fn logical_immediate_decodes_the_bitmask() {
    // and x0, x1, #0xFF
    let block = translate_words(0, &[0x9240_1C20, 0x1400_0000]);
    let and = block.iter().find(|&i| block[i].opcode == Opcode::And64).unwrap();
    assert_eq!(block[and].args[1], armjit_ir::Value::U64(0xFF));
}

#[test]
fn movz_materialises_immediates() {
    // movz x0, #0x1234, lsl #16
    let block = translate_words(0, &[0xD2A2_4680, 0x1400_0000]);
    let set = block.iter().find(|&i| block[i].opcode == Opcode::A64SetX).unwrap();
    assert_eq!(block[set].args[1], armjit_ir::Value::U64(0x1234_0000));
}

#[test]
fn ldxr_stxr_use_exclusive_ops() {
    // ldxr x0, [x1]; stxr w2, x3, [x1]
    let block = translate_words(0, &[0xC85F_7C20, 0xC802_7C23, 0x1400_0000]);
    assert!(has_op(&block, Opcode::A64ExclusiveReadMemory64));
    assert!(has_op(&block, Opcode::A64ExclusiveWriteMemory64));
}

#[test]
fn ldr_unsigned_offset() {
    // ldr x0, [x1, #16]
    let block = translate_words(0, &[0xF940_0820, 0x1400_0000]);
    assert!(has_op(&block, Opcode::A64ReadMemory64));
}

#[test]
fn stp_writes_two_registers_with_writeback() {
    // stp x29, x30, [sp, #-16]!
    let block = translate_words(0, &[0xA9BF_7BFD, 0x1400_0000]);
    let writes: Vec<_> =
        block.iter().filter(|&i| block[i].opcode == Opcode::A64WriteMemory64).collect();
    assert_eq!(writes.len(), 2);
    assert!(has_op(&block, Opcode::A64SetSP));
}

#[test]
fn fadd_scalar() {
    // fadd s0, s1, s2
    let block = translate_words(0, &[0x1E22_2820, 0x1400_0000]);
    assert!(has_op(&block, Opcode::FPAdd32));
}

#[test]
fn fcmp_sets_nzcv() {
    // fcmp d0, d1
    let block = translate_words(0, &[0x1E61_2000, 0x1400_0000]);
    assert!(has_op(&block, Opcode::FPCompare64));
    assert!(has_op(&block, Opcode::A64SetNZCV));
}

#[test]
fn svc_calls_supervisor() {
    // svc #0
    let block = translate_words(0, &[0xD400_0001]);
    assert!(has_op(&block, Opcode::A64CallSupervisor));
}

#[test]
fn unknown_encodings_fall_back_to_the_interpreter() {
    // An SVE encoding this frontend does not know.
    let block = translate_words(0x200, &[0x0420_0000]);
    match block.terminal() {
        Terminal::Interpret { next, num_instructions } => {
            assert_eq!(A64LocationDescriptor::from(*next).pc(), 0x200);
            assert_eq!(*num_instructions, 1);
        }
        other => panic!("unexpected terminal {other:?}"),
    }
}

#[test]
fn mrs_nzcv_roundtrip_ops() {
    // mrs x0, nzcv; msr nzcv, x0
    let block = translate_words(0, &[0xD53B_4200, 0xD51B_4200, 0x1400_0000]);
    assert!(has_op(&block, Opcode::A64GetNZCVRaw));
    assert!(has_op(&block, Opcode::A64SetNZCVRaw));
}

#[test]
fn csel_uses_conditional_select() {
    // csel x0, x1, x2, eq
    let block = translate_words(0, &[0x9A82_0020, 0x1400_0000]);
    assert!(has_op(&block, Opcode::ConditionalSelect64));
}
