//! Miscellaneous ARM instructions: wide moves, CLZ, extension, reversal,
//! hints and exception generation.

use armjit_ir::{A32Reg, Terminal};

use crate::a32::translate::A32Translator;
use crate::a32::Exception;
use crate::bit_util::bits;

impl A32Translator {
    pub(super) fn arm_movw(&mut self, w: u32) -> bool {
        let d = A32Reg::from_index(bits(w, 12, 15));
        let imm16 = bits(w, 16, 19) << 12 | bits(w, 0, 11);

        if d == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        let value = self.ir.imm32(imm16);
        self.set_register(d, value);
        true
    }

    pub(super) fn arm_movt(&mut self, w: u32) -> bool {
        let d = A32Reg::from_index(bits(w, 12, 15));
        let imm16 = bits(w, 16, 19) << 12 | bits(w, 0, 11);

        if d == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        let old = self.get_register(d);
        let low = self.ir.and_32(old, self.ir.imm32(0xFFFF));
        let result = self.ir.or_32(low, self.ir.imm32(imm16 << 16));
        self.set_register(d, result);
        true
    }

    pub(super) fn arm_clz(&mut self, w: u32) -> bool {
        let d = A32Reg::from_index(bits(w, 12, 15));
        let m = A32Reg::from_index(bits(w, 0, 3));

        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        let rm = self.get_register(m);
        let result = self.ir.count_leading_zeros_32(rm);
        self.set_register(d, result);
        true
    }

    fn extension(&mut self, w: u32, signed: bool, half: bool) -> bool {
        let d = A32Reg::from_index(bits(w, 12, 15));
        let rotate = bits(w, 10, 11);
        let m = A32Reg::from_index(bits(w, 0, 3));

        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let rm = self.get_register(m);
        let rotated = if rotate == 0 {
            rm
        } else {
            let f = self.ir.imm1(false);
            self.ir.rotate_right_32(rm, self.ir.imm8((rotate * 8) as u8), f)
        };

        let result = match (signed, half) {
            (true, false) => {
                let byte = self.ir.least_significant_byte(rotated);
                self.ir.sign_extend_byte_to_word(byte)
            }
            (true, true) => {
                let half = self.ir.least_significant_half(rotated);
                self.ir.sign_extend_half_to_word(half)
            }
            (false, false) => {
                let byte = self.ir.least_significant_byte(rotated);
                self.ir.zero_extend_byte_to_word(byte)
            }
            (false, true) => {
                let half = self.ir.least_significant_half(rotated);
                self.ir.zero_extend_half_to_word(half)
            }
        };
        self.set_register(d, result);
        true
    }

    pub(super) fn arm_sxtb(&mut self, w: u32) -> bool {
        self.extension(w, true, false)
    }

    pub(super) fn arm_sxth(&mut self, w: u32) -> bool {
        self.extension(w, true, true)
    }

    pub(super) fn arm_uxtb(&mut self, w: u32) -> bool {
        self.extension(w, false, false)
    }

    pub(super) fn arm_uxth(&mut self, w: u32) -> bool {
        self.extension(w, false, true)
    }

    pub(super) fn arm_rev(&mut self, w: u32) -> bool {
        let d = A32Reg::from_index(bits(w, 12, 15));
        let m = A32Reg::from_index(bits(w, 0, 3));

        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        let rm = self.get_register(m);
        let result = self.ir.byte_reverse_word(rm);
        self.set_register(d, result);
        true
    }

    pub(super) fn arm_rev16(&mut self, w: u32) -> bool {
        let d = A32Reg::from_index(bits(w, 12, 15));
        let m = A32Reg::from_index(bits(w, 0, 3));

        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        // Swap bytes within each halfword.
        let rm = self.get_register(m);
        let f = self.ir.imm1(false);
        let hi = self.ir.logical_shift_left_32(rm, self.ir.imm8(8), f);
        let hi = self.ir.and_32(hi, self.ir.imm32(0xFF00_FF00));
        let lo = self.ir.logical_shift_right_32(rm, self.ir.imm8(8), f);
        let lo = self.ir.and_32(lo, self.ir.imm32(0x00FF_00FF));
        let result = self.ir.or_32(hi, lo);
        self.set_register(d, result);
        true
    }

    pub(super) fn arm_sel(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = A32Reg::from_index(bits(w, 12, 15));
        let m = A32Reg::from_index(bits(w, 0, 3));

        if d == A32Reg::PC || n == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        // The GE flags are stored byte-wise, so they select bytes directly.
        let ge = self.ir.a32_get_ge_flags();
        let rn = self.get_register(n);
        let rm = self.get_register(m);
        let from_n = self.ir.and_32(ge, rn);
        let not_ge = self.ir.not_32(ge);
        let from_m = self.ir.and_32(not_ge, rm);
        let result = self.ir.or_32(from_n, from_m);
        self.set_register(d, result);
        true
    }

    pub(super) fn arm_hint(&mut self, w: u32) -> bool {
        let op = bits(w, 0, 7);
        if !self.options.hook_hint_instructions {
            return true;
        }
        match op {
            1 => self.raise_exception(Exception::Yield),
            2 => self.raise_exception(Exception::WaitForEvent),
            3 => self.raise_exception(Exception::WaitForInterrupt),
            4 => self.raise_exception(Exception::SendEvent),
            _ => true, // NOP and reserved hints
        }
    }

    pub(super) fn arm_bkpt(&mut self, _w: u32) -> bool {
        self.raise_exception(Exception::Breakpoint)
    }

    pub(super) fn arm_svc(&mut self, w: u32) -> bool {
        let imm24 = bits(w, 0, 23);

        // The callback observes the state after this instruction.
        let svc = self.ir.imm32(imm24);
        self.ir.a32_call_supervisor(svc);
        let next = self.next_location();
        self.ir.set_term(Terminal::check_halt(Terminal::LinkBlock { next: next.into() }));
        false
    }

    pub(super) fn arm_clrex(&mut self) -> bool {
        self.ir.a32_clear_exclusive();
        true
    }

    pub(super) fn arm_dsb(&mut self) -> bool {
        self.ir.a32_dsb();
        true
    }

    pub(super) fn arm_dmb(&mut self) -> bool {
        self.ir.a32_dmb();
        true
    }

    pub(super) fn arm_isb(&mut self) -> bool {
        self.ir.a32_isb();
        // Later code may have been modified; go back through the dispatcher.
        let next = self.next_location();
        self.ir.a32_update_upper_location_descriptor(next.upper_half());
        let next_pc = self.ir.imm32(next.pc());
        self.set_register(A32Reg::PC, next_pc);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }
}
