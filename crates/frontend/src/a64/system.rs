//! A64 system instructions.

use armjit_ir::Terminal;

use super::translate::A64Translator;
use super::Exception;
use crate::bit_util::{bit, bits};

/// System register encodings (op0:op1:CRn:CRm:op2 with op0 in two bits).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SysReg {
    Nzcv,
    Fpcr,
    Fpsr,
    TpidrEl0,
    TpidrroEl0,
    CntfrqEl0,
    CntpctEl0,
    CtrEl0,
    DczidEl0,
}

fn decode_sysreg(w: u32) -> Option<SysReg> {
    let o0 = 2 | u32::from(bit(w, 19));
    let op1 = bits(w, 16, 18);
    let crn = bits(w, 12, 15);
    let crm = bits(w, 8, 11);
    let op2 = bits(w, 5, 7);

    match (o0, op1, crn, crm, op2) {
        (3, 3, 4, 2, 0) => Some(SysReg::Nzcv),
        (3, 3, 4, 4, 0) => Some(SysReg::Fpcr),
        (3, 3, 4, 4, 1) => Some(SysReg::Fpsr),
        (3, 3, 13, 0, 2) => Some(SysReg::TpidrEl0),
        (3, 3, 13, 0, 3) => Some(SysReg::TpidrroEl0),
        (3, 3, 14, 0, 0) => Some(SysReg::CntfrqEl0),
        (3, 3, 14, 0, 1) => Some(SysReg::CntpctEl0),
        (3, 3, 0, 0, 1) => Some(SysReg::CtrEl0),
        (3, 3, 0, 0, 7) => Some(SysReg::DczidEl0),
        _ => None,
    }
}

impl A64Translator {
    pub(super) fn a64_svc(&mut self, w: u32) -> bool {
        let imm16 = bits(w, 5, 20);

        // The callback observes the state after this instruction.
        let pc = self.ir.imm64(self.pc().wrapping_add(4));
        self.ir.a64_set_pc(pc);
        let svc = self.ir.imm32(imm16);
        self.ir.a64_call_supervisor(svc);
        let next = self.next_location();
        self.ir.set_term(Terminal::check_halt(Terminal::LinkBlock { next: next.into() }));
        false
    }

    pub(super) fn a64_brk(&mut self, _w: u32) -> bool {
        self.raise_exception(Exception::Breakpoint)
    }

    pub(super) fn a64_hint(&mut self, w: u32) -> bool {
        let op = bits(w, 5, 11);
        if !self.options.hook_hint_instructions {
            return true;
        }
        match op {
            1 => self.raise_exception(Exception::Yield),
            2 => self.raise_exception(Exception::WaitForEvent),
            3 => self.raise_exception(Exception::WaitForInterrupt),
            4 => self.raise_exception(Exception::SendEvent),
            5 => self.raise_exception(Exception::SendEventLocal),
            _ => true, // NOP and hints we do not hook
        }
    }

    pub(super) fn a64_dsb_op(&mut self) -> bool {
        self.ir.a64_dsb();
        true
    }

    pub(super) fn a64_dmb_op(&mut self) -> bool {
        self.ir.a64_dmb();
        true
    }

    pub(super) fn a64_isb_op(&mut self) -> bool {
        self.ir.a64_isb();
        let pc = self.ir.imm64(self.next_location().pc());
        self.ir.a64_set_pc(pc);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    pub(super) fn a64_mrs(&mut self, w: u32) -> bool {
        let t = bits(w, 0, 4);
        let Some(reg) = decode_sysreg(w) else {
            return self.interpret_fallback();
        };

        match reg {
            SysReg::Nzcv => {
                let value = self.ir.a64_get_nzcv_raw();
                let wide = self.ir.zero_extend_word_to_long(value);
                self.set_x(t, wide);
            }
            SysReg::Fpcr => {
                let value = self.ir.a64_get_fpcr();
                let wide = self.ir.zero_extend_word_to_long(value);
                self.set_x(t, wide);
            }
            SysReg::Fpsr => {
                let value = self.ir.a64_get_fpsr();
                let wide = self.ir.zero_extend_word_to_long(value);
                self.set_x(t, wide);
            }
            SysReg::TpidrEl0 => {
                let value = self.ir.a64_get_tpidr();
                self.set_x(t, value);
            }
            SysReg::TpidrroEl0 => {
                let value = self.ir.a64_get_tpidrro();
                self.set_x(t, value);
            }
            SysReg::CntfrqEl0 => {
                let value = self.ir.a64_get_cntfrq();
                let wide = self.ir.zero_extend_word_to_long(value);
                self.set_x(t, wide);
            }
            SysReg::CntpctEl0 => {
                let value = self.ir.a64_get_cntpct();
                self.set_x(t, value);
            }
            SysReg::CtrEl0 => {
                let value = self.ir.a64_get_ctr();
                let wide = self.ir.zero_extend_word_to_long(value);
                self.set_x(t, wide);
            }
            SysReg::DczidEl0 => {
                let value = self.ir.a64_get_dczid();
                let wide = self.ir.zero_extend_word_to_long(value);
                self.set_x(t, wide);
            }
        }
        true
    }

    pub(super) fn a64_msr(&mut self, w: u32) -> bool {
        let t = bits(w, 0, 4);
        let Some(reg) = decode_sysreg(w) else {
            return self.interpret_fallback();
        };

        match reg {
            SysReg::Nzcv => {
                let value = self.get_x(t);
                let word = self.ir.least_significant_word(value);
                self.ir.a64_set_nzcv_raw(word);
                true
            }
            SysReg::Fpcr => {
                let value = self.get_x(t);
                let word = self.ir.least_significant_word(value);
                self.ir.a64_set_fpcr(word);
                // FPCR mode bits live in the location descriptor.
                let pc = self.ir.imm64(self.next_location().pc());
                self.ir.a64_set_pc(pc);
                self.ir.set_term(Terminal::ReturnToDispatch);
                false
            }
            SysReg::Fpsr => {
                let value = self.get_x(t);
                let word = self.ir.least_significant_word(value);
                self.ir.a64_set_fpsr(word);
                true
            }
            SysReg::TpidrEl0 => {
                let value = self.get_x(t);
                self.ir.a64_set_tpidr(value);
                true
            }
            SysReg::TpidrroEl0
            | SysReg::CntfrqEl0
            | SysReg::CntpctEl0
            | SysReg::CtrEl0
            | SysReg::DczidEl0 => self.undefined_instruction(),
        }
    }

    pub(super) fn a64_sys_cache(&mut self, w: u32) -> bool {
        let op1 = bits(w, 16, 18);
        let crm = bits(w, 8, 11);
        let op2 = bits(w, 5, 7);
        let t = bits(w, 0, 4);

        let vaddr = self.get_x(t);
        match (op1, crm) {
            // IC IVAU and friends.
            (3, 0b0101) | (0, 0b0001) | (0, 0b0101) => {
                self.ir.a64_instruction_cache_operation_raised(vaddr);
                // The following code may change; re-dispatch.
                let pc = self.ir.imm64(self.next_location().pc());
                self.ir.a64_set_pc(pc);
                self.ir.set_term(Terminal::check_halt(Terminal::ReturnToDispatch));
                false
            }
            // DC ZVA, CVAC, CVAU, CIVAC, IVAC...
            _ => {
                let op = u64::from(op1) << 7 | u64::from(crm) << 3 | u64::from(op2);
                let op_imm = self.ir.imm64(op);
                self.ir.a64_data_cache_operation_raised(op_imm, vaddr);
                true
            }
        }
    }
}
