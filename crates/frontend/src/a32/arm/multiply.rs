//! ARM multiply instructions.

use armjit_ir::A32Reg;

use crate::a32::translate::A32Translator;
use crate::bit_util::{bit, bits};

impl A32Translator {
    pub(super) fn arm_mul(&mut self, w: u32) -> bool {
        let s = bit(w, 20);
        let d = A32Reg::from_index(bits(w, 16, 19));
        let m = A32Reg::from_index(bits(w, 8, 11));
        let n = A32Reg::from_index(bits(w, 0, 3));

        if d == A32Reg::PC || n == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let rn = self.get_register(n);
        let rm = self.get_register(m);
        let result = self.ir.mul_32(rn, rm);
        self.set_register(d, result);
        if s {
            self.set_nz(result);
        }
        true
    }

    pub(super) fn arm_mla(&mut self, w: u32) -> bool {
        let s = bit(w, 20);
        let d = A32Reg::from_index(bits(w, 16, 19));
        let a = A32Reg::from_index(bits(w, 12, 15));
        let m = A32Reg::from_index(bits(w, 8, 11));
        let n = A32Reg::from_index(bits(w, 0, 3));

        if d == A32Reg::PC || a == A32Reg::PC || n == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let rn = self.get_register(n);
        let rm = self.get_register(m);
        let ra = self.get_register(a);
        let product = self.ir.mul_32(rn, rm);
        let result = self.ir.add_32(product, ra);
        self.set_register(d, result);
        if s {
            self.set_nz(result);
        }
        true
    }

    pub(super) fn arm_umull(&mut self, w: u32) -> bool {
        self.long_multiply(w, false, false)
    }

    pub(super) fn arm_umlal(&mut self, w: u32) -> bool {
        self.long_multiply(w, false, true)
    }

    pub(super) fn arm_smull(&mut self, w: u32) -> bool {
        self.long_multiply(w, true, false)
    }

    pub(super) fn arm_smlal(&mut self, w: u32) -> bool {
        self.long_multiply(w, true, true)
    }

    fn long_multiply(&mut self, w: u32, signed: bool, accumulate: bool) -> bool {
        let s = bit(w, 20);
        let hi = A32Reg::from_index(bits(w, 16, 19));
        let lo = A32Reg::from_index(bits(w, 12, 15));
        let m = A32Reg::from_index(bits(w, 8, 11));
        let n = A32Reg::from_index(bits(w, 0, 3));

        if hi == A32Reg::PC || lo == A32Reg::PC || n == A32Reg::PC || m == A32Reg::PC || hi == lo
        {
            return self.unpredictable_instruction();
        }

        let rn = self.get_register(n);
        let rm = self.get_register(m);
        let (wide_n, wide_m) = if signed {
            (self.ir.sign_extend_word_to_long(rn), self.ir.sign_extend_word_to_long(rm))
        } else {
            (self.ir.zero_extend_word_to_long(rn), self.ir.zero_extend_word_to_long(rm))
        };
        let mut result = self.ir.mul_64(wide_n, wide_m);

        if accumulate {
            let acc_lo = self.get_register(lo);
            let acc_hi = self.get_register(hi);
            let acc = self.ir.pack_2x32_to_1x64(acc_lo, acc_hi);
            result = self.ir.add_64(result, acc);
        }

        let result_lo = self.ir.least_significant_word(result);
        let result_hi = self.ir.most_significant_word(result);
        self.set_register(lo, result_lo);
        self.set_register(hi, result_hi);

        if s {
            let n_flag = self.ir.most_significant_bit(result_hi);
            self.ir.a32_set_n_flag(n_flag);
            let z_flag = self.ir.is_zero_64(result);
            self.ir.a32_set_z_flag(z_flag);
        }
        true
    }

    pub(super) fn set_nz(&mut self, result: armjit_ir::Value) {
        let n_flag = self.ir.most_significant_bit(result);
        self.ir.a32_set_n_flag(n_flag);
        let z_flag = self.ir.is_zero_32(result);
        self.ir.a32_set_z_flag(z_flag);
    }
}
