//! A32/Thumb end-to-end tests.

#![cfg(target_arch = "x86_64")]

use std::sync::{Arc, Mutex};

use armjit::{
    A32Exception, A32Jit, A32UserCallbacks, A32UserConfig, ExclusiveMonitor, HaltReason,
};

const MEMORY_SIZE: usize = 64 * 1024;

struct TestEnv {
    memory: Vec<u8>,
    ticks_left: u64,
    svc_calls: Vec<u32>,
    exceptions: Vec<(u32, A32Exception)>,
}

impl TestEnv {
    fn new() -> TestEnv {
        TestEnv {
            memory: vec![0u8; MEMORY_SIZE],
            ticks_left: 0,
            svc_calls: Vec::new(),
            exceptions: Vec::new(),
        }
    }

    fn load_code(&mut self, base: u32, code: &[u32]) {
        for (i, word) in code.iter().enumerate() {
            let addr = base as usize + i * 4;
            self.memory[addr..addr + 4].copy_from_slice(&word.to_le_bytes());
        }
    }

    fn load_thumb(&mut self, base: u32, code: &[u16]) {
        for (i, half) in code.iter().enumerate() {
            let addr = base as usize + i * 2;
            self.memory[addr..addr + 2].copy_from_slice(&half.to_le_bytes());
        }
    }

    fn read<const N: usize>(&self, vaddr: u32) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.memory[(vaddr as usize + i) % MEMORY_SIZE];
        }
        out
    }

    fn write_bytes(&mut self, vaddr: u32, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            let addr = (vaddr as usize + i) % MEMORY_SIZE;
            self.memory[addr] = byte;
        }
    }
}

impl A32UserCallbacks for TestEnv {
    fn memory_read_code(&mut self, vaddr: u32) -> u32 {
        if (vaddr as usize) < MEMORY_SIZE {
            u32::from_le_bytes(self.read(vaddr))
        } else {
            0xEAFF_FFFE // b .
        }
    }

    fn memory_read_8(&mut self, vaddr: u32) -> u8 {
        u8::from_le_bytes(self.read(vaddr))
    }
    fn memory_read_16(&mut self, vaddr: u32) -> u16 {
        u16::from_le_bytes(self.read(vaddr))
    }
    fn memory_read_32(&mut self, vaddr: u32) -> u32 {
        u32::from_le_bytes(self.read(vaddr))
    }
    fn memory_read_64(&mut self, vaddr: u32) -> u64 {
        u64::from_le_bytes(self.read(vaddr))
    }

    fn memory_write_8(&mut self, vaddr: u32, value: u8) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }
    fn memory_write_16(&mut self, vaddr: u32, value: u16) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }
    fn memory_write_32(&mut self, vaddr: u32, value: u32) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }
    fn memory_write_64(&mut self, vaddr: u32, value: u64) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }

    fn memory_write_exclusive_32(&mut self, vaddr: u32, value: u32, expected: u32) -> bool {
        if self.memory_read_32(vaddr) == expected {
            self.memory_write_32(vaddr, value);
            true
        } else {
            false
        }
    }

    fn interpreter_fallback(&mut self, pc: u32, _num_instructions: usize) {
        panic!("unexpected interpreter fallback at {pc:#x}");
    }

    fn call_svc(&mut self, swi: u32) {
        self.svc_calls.push(swi);
    }

    fn exception_raised(&mut self, pc: u32, exception: A32Exception) {
        self.exceptions.push((pc, exception));
    }

    fn add_ticks(&mut self, ticks: u64) {
        self.ticks_left = self.ticks_left.saturating_sub(ticks);
    }

    fn get_ticks_remaining(&mut self) -> u64 {
        self.ticks_left
    }
}

#[derive(Clone)]
struct SharedEnv(Arc<Mutex<TestEnv>>);

impl A32UserCallbacks for SharedEnv {
    fn memory_read_code(&mut self, vaddr: u32) -> u32 {
        self.0.lock().unwrap().memory_read_code(vaddr)
    }
    fn memory_read_8(&mut self, vaddr: u32) -> u8 {
        self.0.lock().unwrap().memory_read_8(vaddr)
    }
    fn memory_read_16(&mut self, vaddr: u32) -> u16 {
        self.0.lock().unwrap().memory_read_16(vaddr)
    }
    fn memory_read_32(&mut self, vaddr: u32) -> u32 {
        self.0.lock().unwrap().memory_read_32(vaddr)
    }
    fn memory_read_64(&mut self, vaddr: u32) -> u64 {
        self.0.lock().unwrap().memory_read_64(vaddr)
    }
    fn memory_write_8(&mut self, vaddr: u32, value: u8) {
        self.0.lock().unwrap().memory_write_8(vaddr, value);
    }
    fn memory_write_16(&mut self, vaddr: u32, value: u16) {
        self.0.lock().unwrap().memory_write_16(vaddr, value);
    }
    fn memory_write_32(&mut self, vaddr: u32, value: u32) {
        self.0.lock().unwrap().memory_write_32(vaddr, value);
    }
    fn memory_write_64(&mut self, vaddr: u32, value: u64) {
        self.0.lock().unwrap().memory_write_64(vaddr, value);
    }
    fn memory_write_exclusive_32(&mut self, vaddr: u32, value: u32, expected: u32) -> bool {
        self.0.lock().unwrap().memory_write_exclusive_32(vaddr, value, expected)
    }
    fn interpreter_fallback(&mut self, pc: u32, num_instructions: usize) {
        self.0.lock().unwrap().interpreter_fallback(pc, num_instructions);
    }
    fn call_svc(&mut self, swi: u32) {
        self.0.lock().unwrap().call_svc(swi);
    }
    fn exception_raised(&mut self, pc: u32, exception: A32Exception) {
        self.0.lock().unwrap().exception_raised(pc, exception);
    }
    fn add_ticks(&mut self, ticks: u64) {
        self.0.lock().unwrap().add_ticks(ticks);
    }
    fn get_ticks_remaining(&mut self) -> u64 {
        self.0.lock().unwrap().get_ticks_remaining()
    }
}

fn arm_jit(code: &[u32], ticks: u64) -> (A32Jit, SharedEnv) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut env = TestEnv::new();
    env.load_code(0, code);
    env.ticks_left = ticks;
    let shared = SharedEnv(Arc::new(Mutex::new(env)));
    let jit = A32Jit::new(Box::new(shared.clone()), A32UserConfig::default()).unwrap();
    (jit, shared)
}

#[test]
fn arm_add_immediate() {
    // add r1, r0, #1 ; b .
    let (mut jit, _env) = arm_jit(&[0xE280_1001, 0xEAFF_FFFE], 2);
    jit.regs_mut()[0] = 41;
    jit.run();
    assert_eq!(jit.regs()[1], 42);
    assert_eq!(jit.regs()[15], 4);
}

#[test]
fn thumb_shift_sets_flags() {
    // lsls r0, r1, #31 ; b .
    let mut env = TestEnv::new();
    env.load_thumb(0, &[0x07C8, 0xE7FE]);
    env.ticks_left = 2;
    let shared = SharedEnv(Arc::new(Mutex::new(env)));
    let mut jit = A32Jit::new(Box::new(shared), A32UserConfig::default()).unwrap();

    jit.regs_mut()[1] = 0xFFFF_FFFF;
    jit.set_cpsr(0x0000_0030); // Thumb

    jit.run();

    assert_eq!(jit.regs()[0], 0x8000_0000);
    assert_eq!(jit.regs()[15], 2);
    assert_eq!(jit.cpsr(), 0xA000_0030); // N and C set, still Thumb
}

#[test]
fn conditional_execution() {
    // cmp r0, #0 ; moveq r1, #1 ; movne r2, #1 ; b .
    let code = [0xE350_0000, 0x03A0_1001, 0x13A0_2001, 0xEAFF_FFFE];
    let (mut jit, _env) = arm_jit(&code, 8);
    jit.regs_mut()[0] = 0;
    jit.run();
    assert_eq!(jit.regs()[1], 1);
    assert_eq!(jit.regs()[2], 0);

    let (mut jit, _env) = arm_jit(&code, 8);
    jit.regs_mut()[0] = 5;
    jit.run();
    assert_eq!(jit.regs()[1], 0);
    assert_eq!(jit.regs()[2], 1);
}

#[test]
fn exclusive_round_trip() {
    // ldrex r0, [r1] ; strex r2, r3, [r1] ; b .
    let code = [0xE191_0F9F, 0xE181_2F93, 0xEAFF_FFFE];
    let mut env = TestEnv::new();
    env.load_code(0, &code);
    env.ticks_left = 3;
    env.write_bytes(0x1000, &7u32.to_le_bytes());
    let shared = SharedEnv(Arc::new(Mutex::new(env)));
    let config = A32UserConfig {
        global_monitor: Some(Arc::new(ExclusiveMonitor::new(1))),
        ..A32UserConfig::default()
    };
    let mut jit = A32Jit::new(Box::new(shared.clone()), config).unwrap();

    jit.regs_mut()[1] = 0x1000;
    jit.regs_mut()[3] = 1234;

    jit.run();

    assert_eq!(jit.regs()[0], 7);
    assert_eq!(jit.regs()[2], 0); // success
    let env = shared.0.lock().unwrap();
    assert_eq!(u32::from_le_bytes(env.read(0x1000)), 1234);
}

#[test]
fn cache_invalidation_after_self_modification() {
    // At 0x1004: mov r2, #1 ; b .
    let mut env = TestEnv::new();
    env.load_code(0x1004, &[0xE3A0_2001, 0xEAFF_FFFE]);
    env.ticks_left = 4;
    let shared = SharedEnv(Arc::new(Mutex::new(env)));
    let mut jit = A32Jit::new(Box::new(shared.clone()), A32UserConfig::default()).unwrap();

    jit.regs_mut()[15] = 0x1004;
    jit.run();
    assert_eq!(jit.regs()[2], 1);

    // The guest (or host) rewrites the instruction: mov r2, #2.
    shared.0.lock().unwrap().write_bytes(0x1004, &0xE3A0_2002u32.to_le_bytes());

    // Without invalidation the stale translation still runs.
    jit.regs_mut()[2] = 0;
    jit.regs_mut()[15] = 0x1004;
    shared.0.lock().unwrap().ticks_left = 4;
    jit.run();
    assert_eq!(jit.regs()[2], 1);

    // After invalidating the range, the executed code reflects the write.
    jit.invalidate_cache_range(0x1004, 4);
    jit.regs_mut()[2] = 0;
    jit.regs_mut()[15] = 0x1004;
    shared.0.lock().unwrap().ticks_left = 4;
    jit.run();
    assert_eq!(jit.regs()[2], 2);
}

#[test]
fn vfp_default_nan_substitution() {
    // vadd.f32 s0, s1, s2 ; b .
    let code = [0xEE30_0A81, 0xEAFF_FFFE];
    let (mut jit, _env) = arm_jit(&code, 2);

    jit.set_fpscr(1 << 25); // DN
    jit.ext_regs_mut()[1] = 0x7F80_0001; // signalling NaN
    jit.ext_regs_mut()[2] = 0x3F80_0000; // 1.0

    jit.run();

    assert_eq!(jit.ext_regs()[0], 0x7FC0_0000);
    assert_eq!(jit.fpscr() & 1, 1); // IOC accumulated
}

#[test]
fn vfp_add_computes() {
    // vadd.f32 s0, s1, s2 ; b .
    let code = [0xEE30_0A81, 0xEAFF_FFFE];
    let (mut jit, _env) = arm_jit(&code, 2);
    jit.ext_regs_mut()[1] = f32::to_bits(1.25);
    jit.ext_regs_mut()[2] = f32::to_bits(2.5);
    jit.run();
    assert_eq!(f32::from_bits(jit.ext_regs()[0]), 3.75);
}

#[test]
fn svc_and_exception_callbacks() {
    // svc #7 ; udf ; b .
    let code = [0xEF00_0007, 0xE7F0_00F0, 0xEAFF_FFFE];
    let (mut jit, env) = arm_jit(&code, 6);
    jit.run();
    let env = env.0.lock().unwrap();
    assert_eq!(env.svc_calls, vec![7]);
    assert_eq!(env.exceptions, vec![(4, A32Exception::UndefinedInstruction)]);
}

#[test]
fn bl_then_bx_lr_returns() {
    // 0x00: mov r0, #5
    // 0x04: bl 0x20
    // 0x08: add r0, r0, #1 ; b .
    // 0x20: add r0, r0, #10 ; bx lr
    let mut code = vec![0u32; 16];
    code[0] = 0xE3A0_0005; // mov r0, #5
    code[1] = 0xEB00_0005; // bl 0x20 (offset 0x20 - 0x04 - 8 = 0x14 -> imm24 = 5)
    code[2] = 0xE280_0001; // add r0, r0, #1
    code[3] = 0xEAFF_FFFE; // b .
    code[8] = 0xE280_000A; // add r0, r0, #10
    code[9] = 0xE12F_FF1E; // bx lr
    let (mut jit, _env) = arm_jit(&code, 16);
    jit.run();
    assert_eq!(jit.regs()[0], 16);
    assert_eq!(jit.regs()[14], 8);
}

#[test]
fn ldm_stm_round_trip() {
    // stmdb sp!, {r0-r3} ; ldmia sp!, {r4-r7} ; b .
    let code = [0xE92D_000F, 0xE8BD_00F0, 0xEAFF_FFFE];
    let (mut jit, _env) = arm_jit(&code, 3);
    jit.regs_mut()[0] = 10;
    jit.regs_mut()[1] = 20;
    jit.regs_mut()[2] = 30;
    jit.regs_mut()[3] = 40;
    jit.regs_mut()[13] = 0x4000;

    jit.run();

    assert_eq!(jit.regs()[4], 10);
    assert_eq!(jit.regs()[5], 20);
    assert_eq!(jit.regs()[6], 30);
    assert_eq!(jit.regs()[7], 40);
    assert_eq!(jit.regs()[13], 0x4000);
}

#[test]
fn set_cpsr_is_an_involution() {
    let (mut jit, _env) = arm_jit(&[0xEAFF_FFFE], 1);
    for value in [0x0000_0010u32, 0xA000_0030, 0xF80F_0130 & 0xFF0F_FFFF, 0x6000_0210] {
        jit.set_cpsr(value);
        assert_eq!(jit.cpsr(), value, "cpsr {value:#010x}");
    }
}

#[test]
fn set_fpscr_is_an_involution() {
    let (mut jit, _env) = arm_jit(&[0xEAFF_FFFE], 1);
    for value in [0x0000_0000u32, 0x0300_0000, 0xF000_009F, 0x0800_0012 & 0x0877_009F] {
        jit.set_fpscr(value);
        assert_eq!(jit.fpscr(), value, "fpscr {value:#010x}");
    }
}

#[test]
fn reset_zeroes_guest_state() {
    let (mut jit, _env) = arm_jit(&[0xE280_1001, 0xEAFF_FFFE], 2);
    jit.regs_mut()[0] = 9;
    jit.run();
    jit.reset();
    assert_eq!(jit.regs()[0], 0);
    assert_eq!(jit.regs()[15], 0);
    assert_eq!(jit.cpsr() & 0xF000_0000, 0);
}

#[test]
fn deferred_invalidation_from_a_handle() {
    let (mut jit, _env) = arm_jit(&[0xE280_1001, 0xEAFF_FFFE], 2);
    let handle = jit.invalidation_handle();
    handle.clear_cache();
    // The request was recorded with a halt; the next run drains it and
    // still executes correctly with a fresh translation.
    let reason = jit.run();
    assert!(reason.contains(HaltReason::CACHE_INVALIDATION) || reason.is_empty());
    jit.regs_mut()[15] = 0;
    let mut guard = _env.0.lock().unwrap();
    guard.ticks_left = 2;
    drop(guard);
    jit.run();
    assert_eq!(jit.regs()[15], 4);
}
