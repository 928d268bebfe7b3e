//! A64 end-to-end tests, in the style of a minimal host environment driving
//! the JIT through the callback traits.

#![cfg(target_arch = "x86_64")]

use std::sync::{Arc, Mutex};

use armjit::{
    A64Exception, A64Jit, A64UserCallbacks, A64UserConfig, ExclusiveMonitor, HaltHandle,
    HaltReason,
};

const MEMORY_SIZE: usize = 64 * 1024;

/// A flat little-endian test environment: code lives at address 0, data
/// anywhere in the first 64 KiB, everything beyond reads as an infinite
/// `b .`.
struct TestEnv {
    memory: Vec<u8>,
    ticks_left: u64,
    svc_calls: Vec<u32>,
    exceptions: Vec<(u64, A64Exception)>,
    interpreter_calls: Vec<(u64, usize)>,
    halt_on_read: Option<(u64, HaltHandle)>,
}

impl TestEnv {
    fn new(code: &[u32]) -> TestEnv {
        let mut memory = vec![0u8; MEMORY_SIZE];
        for (i, word) in code.iter().enumerate() {
            memory[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        TestEnv {
            memory,
            ticks_left: 0,
            svc_calls: Vec::new(),
            exceptions: Vec::new(),
            interpreter_calls: Vec::new(),
            halt_on_read: None,
        }
    }

    fn read<const N: usize>(&mut self, vaddr: u64) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, byte) in out.iter_mut().enumerate() {
            let addr = (vaddr as usize + i) % MEMORY_SIZE;
            *byte = self.memory[addr];
        }
        out
    }

    fn write_bytes(&mut self, vaddr: u64, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            let addr = (vaddr as usize + i) % MEMORY_SIZE;
            self.memory[addr] = byte;
        }
    }
}

impl A64UserCallbacks for TestEnv {
    fn memory_read_code(&mut self, vaddr: u64) -> u32 {
        if (vaddr as usize) < MEMORY_SIZE {
            u32::from_le_bytes(self.read(vaddr))
        } else {
            0x1400_0000 // b .
        }
    }

    fn memory_read_8(&mut self, vaddr: u64) -> u8 {
        self.check_halt_hook(vaddr);
        u8::from_le_bytes(self.read(vaddr))
    }
    fn memory_read_16(&mut self, vaddr: u64) -> u16 {
        self.check_halt_hook(vaddr);
        u16::from_le_bytes(self.read(vaddr))
    }
    fn memory_read_32(&mut self, vaddr: u64) -> u32 {
        self.check_halt_hook(vaddr);
        u32::from_le_bytes(self.read(vaddr))
    }
    fn memory_read_64(&mut self, vaddr: u64) -> u64 {
        self.check_halt_hook(vaddr);
        u64::from_le_bytes(self.read(vaddr))
    }
    fn memory_read_128(&mut self, vaddr: u64) -> u128 {
        u128::from_le_bytes(self.read(vaddr))
    }

    fn memory_write_8(&mut self, vaddr: u64, value: u8) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }
    fn memory_write_16(&mut self, vaddr: u64, value: u16) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }
    fn memory_write_32(&mut self, vaddr: u64, value: u32) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }
    fn memory_write_64(&mut self, vaddr: u64, value: u64) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }
    fn memory_write_128(&mut self, vaddr: u64, value: u128) {
        self.write_bytes(vaddr, &value.to_le_bytes());
    }

    fn memory_write_exclusive_64(&mut self, vaddr: u64, value: u64, expected: u64) -> bool {
        if self.memory_read_64(vaddr) == expected {
            self.memory_write_64(vaddr, value);
            true
        } else {
            false
        }
    }

    fn interpreter_fallback(&mut self, pc: u64, num_instructions: usize) {
        self.interpreter_calls.push((pc, num_instructions));
    }

    fn call_svc(&mut self, swi: u32) {
        self.svc_calls.push(swi);
    }

    fn exception_raised(&mut self, pc: u64, exception: A64Exception) {
        self.exceptions.push((pc, exception));
    }

    fn add_ticks(&mut self, ticks: u64) {
        self.ticks_left = self.ticks_left.saturating_sub(ticks);
    }

    fn get_ticks_remaining(&mut self) -> u64 {
        self.ticks_left
    }
}

impl TestEnv {
    fn check_halt_hook(&mut self, vaddr: u64) {
        if let Some((trigger, handle)) = &self.halt_on_read {
            if *trigger == vaddr {
                handle.halt(HaltReason::USER_DEFINED_1);
            }
        }
    }
}

/// Shared-environment plumbing so tests can inspect state the JIT owns.
#[derive(Clone)]
struct SharedEnv(Arc<Mutex<TestEnv>>);

impl A64UserCallbacks for SharedEnv {
    fn memory_read_code(&mut self, vaddr: u64) -> u32 {
        self.0.lock().unwrap().memory_read_code(vaddr)
    }
    fn memory_read_8(&mut self, vaddr: u64) -> u8 {
        self.0.lock().unwrap().memory_read_8(vaddr)
    }
    fn memory_read_16(&mut self, vaddr: u64) -> u16 {
        self.0.lock().unwrap().memory_read_16(vaddr)
    }
    fn memory_read_32(&mut self, vaddr: u64) -> u32 {
        self.0.lock().unwrap().memory_read_32(vaddr)
    }
    fn memory_read_64(&mut self, vaddr: u64) -> u64 {
        self.0.lock().unwrap().memory_read_64(vaddr)
    }
    fn memory_read_128(&mut self, vaddr: u64) -> u128 {
        self.0.lock().unwrap().memory_read_128(vaddr)
    }
    fn memory_write_8(&mut self, vaddr: u64, value: u8) {
        self.0.lock().unwrap().memory_write_8(vaddr, value);
    }
    fn memory_write_16(&mut self, vaddr: u64, value: u16) {
        self.0.lock().unwrap().memory_write_16(vaddr, value);
    }
    fn memory_write_32(&mut self, vaddr: u64, value: u32) {
        self.0.lock().unwrap().memory_write_32(vaddr, value);
    }
    fn memory_write_64(&mut self, vaddr: u64, value: u64) {
        self.0.lock().unwrap().memory_write_64(vaddr, value);
    }
    fn memory_write_128(&mut self, vaddr: u64, value: u128) {
        self.0.lock().unwrap().memory_write_128(vaddr, value);
    }
    fn memory_write_exclusive_64(&mut self, vaddr: u64, value: u64, expected: u64) -> bool {
        self.0.lock().unwrap().memory_write_exclusive_64(vaddr, value, expected)
    }
    fn interpreter_fallback(&mut self, pc: u64, num_instructions: usize) {
        self.0.lock().unwrap().interpreter_fallback(pc, num_instructions);
    }
    fn call_svc(&mut self, swi: u32) {
        self.0.lock().unwrap().call_svc(swi);
    }
    fn exception_raised(&mut self, pc: u64, exception: A64Exception) {
        self.0.lock().unwrap().exception_raised(pc, exception);
    }
    fn add_ticks(&mut self, ticks: u64) {
        self.0.lock().unwrap().add_ticks(ticks);
    }
    fn get_ticks_remaining(&mut self) -> u64 {
        self.0.lock().unwrap().get_ticks_remaining()
    }
}

fn jit_with(code: &[u32], ticks: u64) -> (A64Jit, SharedEnv) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut env = TestEnv::new(code);
    env.ticks_left = ticks;
    let shared = SharedEnv(Arc::new(Mutex::new(env)));
    let jit = A64Jit::new(Box::new(shared.clone()), A64UserConfig::default()).unwrap();
    (jit, shared)
}

#[test]
fn add_registers() {
    // add x0, x1, x2; b .
    let (mut jit, _env) = jit_with(&[0x8B02_0020, 0x1400_0000], 2);
    jit.regs_mut()[1] = 1;
    jit.regs_mut()[2] = 2;

    jit.run();

    assert_eq!(jit.regs()[0], 3);
    assert_eq!(jit.regs()[1], 1);
    assert_eq!(jit.regs()[2], 2);
    assert_eq!(jit.pc(), 4);
}

#[test]
fn zero_cycle_budget_executes_nothing() {
    let (mut jit, _env) = jit_with(&[0x8B02_0020, 0x1400_0000], 0);
    jit.regs_mut()[1] = 10;
    jit.regs_mut()[2] = 20;

    let reason = jit.run();

    assert_eq!(reason, HaltReason::empty());
    assert_eq!(jit.regs()[0], 0);
    assert_eq!(jit.pc(), 0);
}

#[test]
fn step_executes_one_instruction() {
    // add x0, x0, #1 four times over
    let code = [0x9100_0400u32, 0x9100_0400, 0x9100_0400, 0x1400_0000];
    let (mut jit, _env) = jit_with(&code, 100);

    let reason = jit.step();
    assert_eq!(reason, HaltReason::STEP);
    assert_eq!(jit.regs()[0], 1);
    assert_eq!(jit.pc(), 4);

    let reason = jit.step();
    assert_eq!(reason, HaltReason::STEP);
    assert_eq!(jit.regs()[0], 2);
    assert_eq!(jit.pc(), 8);
}

#[test]
fn movz_movk_materialise_constants() {
    // movz x0, #0x1234, lsl #16 ; movk x0, #0x5678 ; b .
    let (mut jit, _env) = jit_with(&[0xD2A2_4680, 0xF28A_CF00, 0x1400_0000], 3);
    jit.run();
    assert_eq!(jit.regs()[0], 0x1234_5678);
}

#[test]
fn flags_and_conditional_select() {
    // subs x0, x1, x2 ; csel x3, x4, x5, eq ; b .
    let (mut jit, _env) = jit_with(&[0xEB02_0020, 0x9A85_0083, 0x1400_0000], 3);
    jit.regs_mut()[1] = 5;
    jit.regs_mut()[2] = 5;
    jit.regs_mut()[4] = 111;
    jit.regs_mut()[5] = 222;

    jit.run();

    assert_eq!(jit.regs()[0], 0);
    // 5 - 5: Z and C set.
    assert_eq!(jit.cpsr(), 0x6000_0000);
    assert_eq!(jit.regs()[3], 111);
}

#[test]
fn loads_and_stores() {
    // str x1, [x2, #16] ; ldr x0, [x2, #16] ; b .
    let (mut jit, env) = jit_with(&[0xF900_0841, 0xF940_0840, 0x1400_0000], 3);
    jit.regs_mut()[1] = 0xDEAD_BEEF_CAFE_F00D;
    jit.regs_mut()[2] = 0x8000;

    jit.run();

    assert_eq!(jit.regs()[0], 0xDEAD_BEEF_CAFE_F00D);
    let mut env = env.0.lock().unwrap();
    assert_eq!(u64::from_le_bytes(env.read(0x8010)), 0xDEAD_BEEF_CAFE_F00D);
}

#[test]
fn exclusive_round_trip() {
    // ldxr x0, [x1] ; stxr w2, x3, [x1] ; b .
    let code = [0xC85F_7C20, 0xC802_7C23, 0x1400_0000];
    let mut env = TestEnv::new(&code);
    env.ticks_left = 3;
    let shared = SharedEnv(Arc::new(Mutex::new(env)));
    let config = A64UserConfig {
        global_monitor: Some(Arc::new(ExclusiveMonitor::new(1))),
        ..A64UserConfig::default()
    };
    let mut jit = A64Jit::new(Box::new(shared.clone()), config).unwrap();

    jit.regs_mut()[1] = 0x9000;
    jit.regs_mut()[3] = 0x1122_3344_5566_7788;
    shared.0.lock().unwrap().write_bytes(0x9000, &42u64.to_le_bytes());

    jit.run();

    assert_eq!(jit.regs()[0], 42); // loaded original value
    assert_eq!(jit.regs()[2], 0); // store succeeded
    let mut env = shared.0.lock().unwrap();
    assert_eq!(u64::from_le_bytes(env.read(0x9000)), 0x1122_3344_5566_7788);
}

#[test]
fn svc_reaches_the_host() {
    // svc #42 ; b .
    let (mut jit, env) = jit_with(&[0xD400_0541, 0x1400_0000], 4);
    jit.run();
    assert_eq!(env.0.lock().unwrap().svc_calls, vec![42]);
    assert_eq!(jit.pc(), 4);
}

#[test]
fn halt_mid_run_returns_user_reason() {
    // loop: ldr x0, [x1] ; b loop
    let (mut jit, env) = jit_with(&[0xF940_0020, 0x17FF_FFFF], 1_000_000);
    jit.regs_mut()[1] = 0x8000;
    let handle = jit.halt_handle();
    env.0.lock().unwrap().halt_on_read = Some((0x8000, handle));

    let reason = jit.run();

    assert_eq!(reason, HaltReason::USER_DEFINED_1);
}

#[test]
fn fp_add_with_default_nan() {
    // fadd s0, s1, s2 ; b .
    let (mut jit, _env) = jit_with(&[0x1E22_2820, 0x1400_0000], 2);
    jit.set_fpcr(1 << 25); // DN
    jit.vecs_mut()[2] = 0x7F80_0001; // signalling NaN in s1
    jit.vecs_mut()[4] = 0x3F80_0000; // 1.0 in s2

    jit.run();

    assert_eq!(jit.vecs()[0] as u32, 0x7FC0_0000);
    assert_eq!(jit.fpsr() & 1, 1); // IOC
}

#[test]
fn fp_arithmetic_is_exact() {
    // fmov s1 <- w1 ; fmov s2 <- w2 ; fadd s0, s1, s2 ; fmov w0 <- s0 ; b .
    let code = [0x1E27_0021, 0x1E27_0042, 0x1E22_2820, 0x1E26_0000, 0x1400_0000];
    let (mut jit, _env) = jit_with(&code, 5);
    jit.regs_mut()[1] = f32::to_bits(1.25) as u64;
    jit.regs_mut()[2] = f32::to_bits(2.5) as u64;

    jit.run();

    assert_eq!(f32::from_bits(jit.regs()[0] as u32), 3.75);
}

#[test]
fn save_and_load_context_round_trips() {
    let (mut jit, _env) = jit_with(&[0x8B02_0020, 0x1400_0000], 2);
    jit.regs_mut()[1] = 7;
    jit.regs_mut()[2] = 35;
    jit.set_fpcr(0x0040_0000);
    jit.set_cpsr(0x9000_0000);

    let context = jit.save_context();
    jit.run();
    assert_eq!(jit.regs()[0], 42);

    jit.load_context(&context);
    assert_eq!(jit.regs()[0], 0);
    assert_eq!(jit.regs()[1], 7);
    assert_eq!(jit.pc(), 0);
    assert_eq!(jit.fpcr(), 0x0040_0000);
    assert_eq!(jit.cpsr(), 0x9000_0000);
}

#[test]
fn bl_and_ret_round_trip() {
    // 0x00: bl 0x10
    // 0x04: add x0, x0, #1
    // 0x08: b .
    // 0x10: mov x1, #99 ; ret
    let code = [
        0x9400_0004u32, // bl +16
        0x9100_0400,    // add x0, x0, #1
        0x1400_0000,    // b .
        0x1400_0000,
        0xD280_0C61, // mov x1, #99
        0xD65F_03C0, // ret
    ];
    let (mut jit, _env) = jit_with(&code, 10);
    jit.run();
    assert_eq!(jit.regs()[1], 99);
    assert_eq!(jit.regs()[0], 1);
    assert_eq!(jit.regs()[30], 4);
}

#[test]
fn unknown_instructions_hit_the_interpreter_fallback() {
    // An SVE encoding, then b .
    let (mut jit, env) = jit_with(&[0x0420_0000, 0x1400_0000], 4);
    jit.run();
    let env = env.0.lock().unwrap();
    assert_eq!(env.interpreter_calls, vec![(0, 1)]);
}

#[test]
fn brk_raises_an_exception() {
    let (mut jit, env) = jit_with(&[0xD420_0000, 0x1400_0000], 4);
    jit.run();
    let env = env.0.lock().unwrap();
    assert_eq!(env.exceptions, vec![(0, A64Exception::Breakpoint)]);
}

#[test]
fn set_cpsr_is_an_involution() {
    let (mut jit, _env) = jit_with(&[0x1400_0000], 1);
    for value in [0x0000_0000u32, 0x1000_0000, 0x6000_0000, 0xF000_0000] {
        jit.set_cpsr(value);
        assert_eq!(jit.cpsr(), value);
    }
}
