//! A64 scalar floating point.

use armjit_ir::{A64Vec, Opcode, Value};

use super::translate::A64Translator;
use crate::bit_util::{bit, bits};

impl A64Translator {
    fn fp_read(&mut self, double: bool, reg: u32) -> Value {
        let vec = A64Vec(reg as u8);
        if double {
            self.ir.a64_get_d(vec)
        } else {
            self.ir.a64_get_s(vec)
        }
    }

    fn fp_write(&mut self, double: bool, reg: u32, value: Value) {
        let vec = A64Vec(reg as u8);
        if double {
            self.ir.a64_set_d(vec, value);
        } else {
            self.ir.a64_set_s(vec, value);
        }
    }

    /// The `type` field: 00 single, 01 double, the rest unsupported here.
    fn fp_type(&mut self, w: u32) -> Option<bool> {
        match bits(w, 22, 23) {
            0b00 => Some(false),
            0b01 => Some(true),
            _ => None,
        }
    }

    pub(super) fn a64_fmov_reg(&mut self, w: u32) -> bool {
        let Some(double) = self.fp_type(w) else {
            return self.interpret_fallback();
        };
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let value = self.fp_read(double, n);
        self.fp_write(double, d, value);
        true
    }

    pub(super) fn a64_fp_unary(&mut self, w: u32) -> bool {
        let Some(double) = self.fp_type(w) else {
            return self.interpret_fallback();
        };
        let opcode = bits(w, 15, 16); // o:r from the pattern
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let value = self.fp_read(double, n);
        let result = match (opcode, double) {
            (0b01, false) => self.ir.fp_abs_32(value),
            (0b01, true) => self.ir.fp_abs_64(value),
            (0b10, false) => self.ir.fp_neg_32(value),
            (0b10, true) => self.ir.fp_neg_64(value),
            (0b11, false) => self.ir.fp_sqrt_32(value),
            (0b11, true) => self.ir.fp_sqrt_64(value),
            _ => return self.interpret_fallback(),
        };
        self.fp_write(double, d, result);
        true
    }

    pub(super) fn a64_fp_add_sub(&mut self, w: u32) -> bool {
        let Some(double) = self.fp_type(w) else {
            return self.interpret_fallback();
        };
        let subtract = bit(w, 12);
        let m = bits(w, 16, 20);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let a = self.fp_read(double, n);
        let b = self.fp_read(double, m);
        let result = match (subtract, double) {
            (false, false) => self.ir.fp_add_32(a, b),
            (false, true) => self.ir.fp_add_64(a, b),
            (true, false) => self.ir.fp_sub_32(a, b),
            (true, true) => self.ir.fp_sub_64(a, b),
        };
        self.fp_write(double, d, result);
        true
    }

    pub(super) fn a64_fp_mul_div(&mut self, w: u32) -> bool {
        let Some(double) = self.fp_type(w) else {
            return self.interpret_fallback();
        };
        let divide = bit(w, 12);
        let m = bits(w, 16, 20);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let a = self.fp_read(double, n);
        let b = self.fp_read(double, m);
        let result = match (divide, double) {
            (false, false) => self.ir.fp_mul_32(a, b),
            (false, true) => self.ir.fp_mul_64(a, b),
            (true, false) => self.ir.fp_div_32(a, b),
            (true, true) => self.ir.fp_div_64(a, b),
        };
        self.fp_write(double, d, result);
        true
    }

    pub(super) fn a64_fmadd(&mut self, w: u32) -> bool {
        let Some(double) = self.fp_type(w) else {
            return self.interpret_fallback();
        };
        let negate_product = bit(w, 15); // FMSUB
        let m = bits(w, 16, 20);
        let a = bits(w, 10, 14);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let addend = self.fp_read(double, a);
        let op1 = self.fp_read(double, n);
        let op1 = if negate_product {
            if double {
                self.ir.fp_neg_64(op1)
            } else {
                self.ir.fp_neg_32(op1)
            }
        } else {
            op1
        };
        let op2 = self.fp_read(double, m);

        let result = if double {
            self.ir.fp_mul_add_64(addend, op1, op2)
        } else {
            self.ir.fp_mul_add_32(addend, op1, op2)
        };
        self.fp_write(double, d, result);
        true
    }

    pub(super) fn a64_fcmp(&mut self, w: u32) -> bool {
        let Some(double) = self.fp_type(w) else {
            return self.interpret_fallback();
        };
        let m = bits(w, 16, 20);
        let n = bits(w, 5, 9);
        let signal = bit(w, 4);
        let with_zero = bit(w, 3);

        let a = self.fp_read(double, n);
        let b = if with_zero {
            if double {
                self.ir.imm64(0)
            } else {
                self.ir.imm32(0)
            }
        } else {
            self.fp_read(double, m)
        };

        let e = self.ir.imm1(signal);
        let nzcv =
            if double { self.ir.fp_compare_64(a, b, e) } else { self.ir.fp_compare_32(a, b, e) };
        self.ir.a64_set_nzcv(nzcv);
        true
    }

    pub(super) fn a64_fcvt(&mut self, w: u32) -> bool {
        let to_double = bit(w, 15);
        let source_double = match bits(w, 22, 23) {
            0b00 => false,
            0b01 => true,
            _ => return self.interpret_fallback(),
        };
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        if to_double == source_double {
            return self.undefined_instruction();
        }

        let value = self.fp_read(source_double, n);
        let result = if to_double {
            self.ir.fp_single_to_double(value)
        } else {
            self.ir.fp_double_to_single(value)
        };
        self.fp_write(to_double, d, result);
        true
    }

    pub(super) fn a64_cvtf(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let Some(double) = self.fp_type(w) else {
            return self.interpret_fallback();
        };
        let unsigned = bit(w, 16);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let value = if sf { self.get_x(n) } else { self.get_w(n) };
        let opcode = match (sf, unsigned, double) {
            (false, false, false) => Opcode::FPFixedS32ToSingle,
            (false, true, false) => Opcode::FPFixedU32ToSingle,
            (false, false, true) => Opcode::FPFixedS32ToDouble,
            (false, true, true) => Opcode::FPFixedU32ToDouble,
            (true, false, false) => Opcode::FPFixedS64ToSingle,
            (true, true, false) => Opcode::FPFixedU64ToSingle,
            (true, false, true) => Opcode::FPFixedS64ToDouble,
            (true, true, true) => Opcode::FPFixedU64ToDouble,
        };
        let result = self.ir.fp_to_fixed(opcode, value, 0, 0xFF);
        self.fp_write(double, d, result);
        true
    }

    pub(super) fn a64_fcvtz(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let Some(double) = self.fp_type(w) else {
            return self.interpret_fallback();
        };
        let unsigned = bit(w, 16);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let value = self.fp_read(double, n);
        let opcode = match (double, unsigned, sf) {
            (false, false, false) => Opcode::FPSingleToFixedS32,
            (false, true, false) => Opcode::FPSingleToFixedU32,
            (false, false, true) => Opcode::FPSingleToFixedS64,
            (false, true, true) => Opcode::FPSingleToFixedU64,
            (true, false, false) => Opcode::FPDoubleToFixedS32,
            (true, true, false) => Opcode::FPDoubleToFixedU32,
            (true, false, true) => Opcode::FPDoubleToFixedS64,
            (true, true, true) => Opcode::FPDoubleToFixedU64,
        };
        let result = self.ir.fp_to_fixed(opcode, value, 0, 3);
        if sf {
            self.set_x(d, result);
        } else {
            self.set_w(d, result);
        }
        true
    }

    pub(super) fn a64_fmov_core(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let ty = bits(w, 22, 23);
        let to_fp = bit(w, 16);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        // W<->S and X<->D only.
        match (sf, ty) {
            (false, 0b00) => {
                if to_fp {
                    let value = self.get_w(n);
                    self.fp_write(false, d, value);
                } else {
                    let value = self.fp_read(false, n);
                    self.set_w(d, value);
                }
            }
            (true, 0b01) => {
                if to_fp {
                    let value = self.get_x(n);
                    self.fp_write(true, d, value);
                } else {
                    let value = self.fp_read(true, n);
                    self.set_x(d, value);
                }
            }
            _ => return self.interpret_fallback(),
        }
        true
    }
}
