//! MRS/MSR.

use armjit_ir::A32Reg;

use crate::a32::translate::A32Translator;
use crate::bit_util::{arm_expand_imm, bit, bits};

impl A32Translator {
    pub(super) fn arm_mrs(&mut self, w: u32) -> bool {
        let d = A32Reg::from_index(bits(w, 12, 15));
        if d == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        let cpsr = self.ir.a32_get_cpsr();
        self.set_register(d, cpsr);
        true
    }

    pub(super) fn arm_msr_reg(&mut self, w: u32) -> bool {
        let write_f = bit(w, 19);
        let write_s = bit(w, 18);
        let n = A32Reg::from_index(bits(w, 0, 3));

        if n == A32Reg::PC || (!write_f && !write_s) {
            return self.unpredictable_instruction();
        }
        let value = self.get_register(n);
        self.write_apsr(value, write_f, write_s)
    }

    pub(super) fn arm_msr_imm(&mut self, w: u32) -> bool {
        let write_f = bit(w, 19);
        let write_s = bit(w, 18);
        let rotate = bits(w, 8, 11);
        let imm8 = bits(w, 0, 7);

        if !write_f && !write_s {
            return self.unpredictable_instruction();
        }
        let value = self.ir.imm32(arm_expand_imm(rotate, imm8));
        self.write_apsr(value, write_f, write_s)
    }

    /// Merge the writable APSR fields (f: NZCVQ, s: GE) into the CPSR.
    fn write_apsr(&mut self, value: armjit_ir::Value, write_f: bool, write_s: bool) -> bool {
        let mut mask = 0u32;
        if write_f {
            mask |= 0xF800_0000;
        }
        if write_s {
            mask |= 0x000F_0000;
        }

        let old = self.ir.a32_get_cpsr();
        let kept = self.ir.and_32(old, self.ir.imm32(!mask));
        let incoming = self.ir.and_32(value, self.ir.imm32(mask));
        let merged = self.ir.or_32(kept, incoming);
        self.ir.a32_set_cpsr(merged);
        true
    }
}
