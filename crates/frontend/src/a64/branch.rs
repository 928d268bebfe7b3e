//! A64 branch instructions.

use armjit_ir::{A64Reg, Cond, Terminal};

use super::translate::A64Translator;
use crate::bit_util::{bits, sign_extend_64};

impl A64Translator {
    pub(super) fn a64_b(&mut self, w: u32) -> bool {
        let imm26 = bits(w, 0, 25);
        let offset = sign_extend_64(u64::from(imm26) << 2, 28);

        let target = self.current.set_pc(self.pc().wrapping_add(offset));
        self.ir.set_term(Terminal::LinkBlock { next: target.into() });
        false
    }

    pub(super) fn a64_bl(&mut self, w: u32) -> bool {
        let imm26 = bits(w, 0, 25);
        let offset = sign_extend_64(u64::from(imm26) << 2, 28);

        let return_location = self.next_location();
        self.push_rsb(return_location);
        let lr = self.ir.imm64(self.pc().wrapping_add(4));
        self.set_x(30, lr);

        let target = self.current.set_pc(self.pc().wrapping_add(offset));
        self.ir.set_term(Terminal::LinkBlock { next: target.into() });
        false
    }

    pub(super) fn a64_b_cond(&mut self, w: u32) -> bool {
        let cond = Cond::from_bits(bits(w, 0, 3));
        let imm19 = bits(w, 5, 23);
        let offset = sign_extend_64(u64::from(imm19) << 2, 21);

        let target = self.current.set_pc(self.pc().wrapping_add(offset));
        let next = self.next_location();
        if cond == Cond::AL || cond == Cond::NV {
            // 0b111x is "always" in this encoding.
            self.ir.set_term(Terminal::LinkBlock { next: target.into() });
        } else {
            self.ir.set_term(Terminal::if_(
                cond,
                Terminal::LinkBlock { next: target.into() },
                Terminal::LinkBlock { next: next.into() },
            ));
        }
        false
    }

    pub(super) fn a64_cbz(&mut self, w: u32, nonzero: bool) -> bool {
        let sf = w >> 31 != 0;
        let imm19 = bits(w, 5, 23);
        let t = bits(w, 0, 4);
        let offset = sign_extend_64(u64::from(imm19) << 2, 21);

        let value = if sf { self.get_x(t) } else { self.get_w(t) };
        let is_zero =
            if sf { self.ir.is_zero_64(value) } else { self.ir.is_zero_32(value) };
        self.ir.set_check_bit(is_zero);

        let target = self.current.set_pc(self.pc().wrapping_add(offset));
        let next = self.next_location();
        let (taken, not_taken) = (
            Terminal::LinkBlock { next: target.into() },
            Terminal::LinkBlock { next: next.into() },
        );
        let term = if nonzero {
            Terminal::check_bit(not_taken, taken)
        } else {
            Terminal::check_bit(taken, not_taken)
        };
        self.ir.set_term(term);
        false
    }

    pub(super) fn a64_tbz(&mut self, w: u32, nonzero: bool) -> bool {
        let b5 = w >> 31;
        let b40 = bits(w, 19, 23);
        let imm14 = bits(w, 5, 18);
        let t = bits(w, 0, 4);
        let bit_pos = b5 << 5 | b40;
        let offset = sign_extend_64(u64::from(imm14) << 2, 16);

        let value = self.get_x(t);
        let tested = self.ir.test_bit(value, self.ir.imm8(bit_pos as u8));
        self.ir.set_check_bit(tested);

        let target = self.current.set_pc(self.pc().wrapping_add(offset));
        let next = self.next_location();
        let taken = Terminal::LinkBlock { next: target.into() };
        let not_taken = Terminal::LinkBlock { next: next.into() };
        // The check-bit terminal takes its first arm when the bit is set.
        let term = if nonzero {
            Terminal::check_bit(taken, not_taken)
        } else {
            Terminal::check_bit(not_taken, taken)
        };
        self.ir.set_term(term);
        false
    }

    pub(super) fn a64_br(&mut self, w: u32) -> bool {
        let n = bits(w, 5, 9);
        let target = self.get_x(n);
        self.ir.a64_set_pc(target);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    pub(super) fn a64_blr(&mut self, w: u32) -> bool {
        let n = bits(w, 5, 9);

        let return_location = self.next_location();
        self.push_rsb(return_location);
        let target = self.get_x(n);
        self.ir.a64_set_pc(target);
        let lr = self.ir.imm64(self.pc().wrapping_add(4));
        self.set_x(30, lr);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    pub(super) fn a64_ret(&mut self, w: u32) -> bool {
        let n = bits(w, 5, 9);
        let target = self.ir.a64_get_x(A64Reg(n as u8));
        self.ir.a64_set_pc(target);
        self.ir.set_term(Terminal::PopRSBHint);
        false
    }
}
