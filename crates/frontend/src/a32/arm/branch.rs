//! ARM branch instructions.

use armjit_ir::{A32Reg, Terminal};

use crate::a32::translate::A32Translator;
use crate::bit_util::{bit, bits, sign_extend};

impl A32Translator {
    pub(super) fn arm_b(&mut self, w: u32) -> bool {
        let imm24 = bits(w, 0, 23);
        let offset = sign_extend(imm24 << 2, 26).wrapping_add(8);

        let target = self.branch_target(self.current.pc().wrapping_add(offset));
        self.ir.set_term(Terminal::LinkBlock { next: target.into() });
        false
    }

    pub(super) fn arm_bl(&mut self, w: u32) -> bool {
        let imm24 = bits(w, 0, 23);
        let offset = sign_extend(imm24 << 2, 26).wrapping_add(8);

        let return_location = self.next_location();
        self.push_rsb(return_location);
        let lr = self.ir.imm32(self.current.pc().wrapping_add(4));
        self.set_register(A32Reg::LR, lr);

        let target = self.branch_target(self.current.pc().wrapping_add(offset));
        self.ir.set_term(Terminal::LinkBlock { next: target.into() });
        false
    }

    pub(super) fn arm_blx_imm(&mut self, w: u32) -> bool {
        let h = bit(w, 24);
        let imm24 = bits(w, 0, 23);
        let offset = sign_extend(imm24 << 2, 26)
            .wrapping_add(if h { 2 } else { 0 })
            .wrapping_add(8);

        let return_location = self.next_location();
        self.push_rsb(return_location);
        let lr = self.ir.imm32(self.current.pc().wrapping_add(4));
        self.set_register(A32Reg::LR, lr);

        // Target is Thumb.
        let target = self
            .branch_target(self.current.pc().wrapping_add(offset))
            .set_t_flag(true);
        self.ir.set_term(Terminal::LinkBlock { next: target.into() });
        false
    }

    pub(super) fn arm_blx_reg(&mut self, w: u32) -> bool {
        let m = A32Reg::from_index(bits(w, 0, 3));
        if m == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let return_location = self.next_location();
        self.push_rsb(return_location);
        let target = self.get_register(m);
        self.ir.a32_bx_write_pc(target);
        let lr = self.ir.imm32(self.current.pc().wrapping_add(4));
        self.set_register(A32Reg::LR, lr);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    pub(super) fn arm_bx(&mut self, w: u32) -> bool {
        let m = A32Reg::from_index(bits(w, 0, 3));

        let target = self.get_register(m);
        self.ir.a32_bx_write_pc(target);
        if m == A32Reg::LR {
            self.ir.set_term(Terminal::PopRSBHint);
        } else {
            self.ir.set_term(Terminal::ReturnToDispatch);
        }
        false
    }
}
