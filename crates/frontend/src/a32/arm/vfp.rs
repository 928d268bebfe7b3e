//! VFP scalar instructions.

use armjit_ir::{A32ExtReg, A32Reg, AccType, Terminal, Value};

use crate::a32::translate::A32Translator;
use crate::bit_util::{bit, bits};

/// Destination/source decode for the `Vx:x` register fields.
fn single(v: u32, extra: bool) -> A32ExtReg {
    A32ExtReg::S((v << 1 | u32::from(extra)) as u8)
}

fn double(v: u32, extra: bool) -> A32ExtReg {
    A32ExtReg::D((u32::from(extra) << 4 | v) as u8)
}

impl A32Translator {
    fn vfp_d(&self, w: u32, dp: bool) -> A32ExtReg {
        let vd = bits(w, 12, 15);
        if dp {
            double(vd, bit(w, 22))
        } else {
            single(vd, bit(w, 22))
        }
    }

    fn vfp_n(&self, w: u32, dp: bool) -> A32ExtReg {
        let vn = bits(w, 16, 19);
        if dp {
            double(vn, bit(w, 7))
        } else {
            single(vn, bit(w, 7))
        }
    }

    fn vfp_m(&self, w: u32, dp: bool) -> A32ExtReg {
        let vm = bits(w, 0, 3);
        if dp {
            double(vm, bit(w, 5))
        } else {
            single(vm, bit(w, 5))
        }
    }

    fn vfp_read(&mut self, reg: A32ExtReg) -> Value {
        match reg {
            A32ExtReg::S(_) => self.ir.a32_get_ext_reg_32(reg),
            A32ExtReg::D(_) => self.ir.a32_get_ext_reg_64(reg),
        }
    }

    fn vfp_write(&mut self, reg: A32ExtReg, value: Value) {
        match reg {
            A32ExtReg::S(_) => self.ir.a32_set_ext_reg_32(reg, value),
            A32ExtReg::D(_) => self.ir.a32_set_ext_reg_64(reg, value),
        }
    }

    fn vfp_binary(
        &mut self,
        w: u32,
        op32: fn(&mut armjit_ir::IrEmitter, Value, Value) -> Value,
        op64: fn(&mut armjit_ir::IrEmitter, Value, Value) -> Value,
    ) -> bool {
        let dp = bit(w, 8);
        let d = self.vfp_d(w, dp);
        let n = self.vfp_n(w, dp);
        let m = self.vfp_m(w, dp);

        let a = self.vfp_read(n);
        let b = self.vfp_read(m);
        let result = if dp { op64(&mut self.ir, a, b) } else { op32(&mut self.ir, a, b) };
        self.vfp_write(d, result);
        true
    }

    pub(super) fn vfp_vadd(&mut self, w: u32) -> bool {
        self.vfp_binary(w, |ir, a, b| ir.fp_add_32(a, b), |ir, a, b| ir.fp_add_64(a, b))
    }

    pub(super) fn vfp_vsub(&mut self, w: u32) -> bool {
        self.vfp_binary(w, |ir, a, b| ir.fp_sub_32(a, b), |ir, a, b| ir.fp_sub_64(a, b))
    }

    pub(super) fn vfp_vmul(&mut self, w: u32) -> bool {
        self.vfp_binary(w, |ir, a, b| ir.fp_mul_32(a, b), |ir, a, b| ir.fp_mul_64(a, b))
    }

    pub(super) fn vfp_vdiv(&mut self, w: u32) -> bool {
        self.vfp_binary(w, |ir, a, b| ir.fp_div_32(a, b), |ir, a, b| ir.fp_div_64(a, b))
    }

    /// VMLA/VMLS round the product before accumulating.
    fn vfp_mul_accumulate(&mut self, w: u32, negate_product: bool) -> bool {
        let dp = bit(w, 8);
        let d = self.vfp_d(w, dp);
        let n = self.vfp_n(w, dp);
        let m = self.vfp_m(w, dp);

        let a = self.vfp_read(n);
        let b = self.vfp_read(m);
        let acc = self.vfp_read(d);
        let result = if dp {
            let mut product = self.ir.fp_mul_64(a, b);
            if negate_product {
                product = self.ir.fp_neg_64(product);
            }
            self.ir.fp_add_64(acc, product)
        } else {
            let mut product = self.ir.fp_mul_32(a, b);
            if negate_product {
                product = self.ir.fp_neg_32(product);
            }
            self.ir.fp_add_32(acc, product)
        };
        self.vfp_write(d, result);
        true
    }

    pub(super) fn vfp_vmla(&mut self, w: u32) -> bool {
        self.vfp_mul_accumulate(w, false)
    }

    pub(super) fn vfp_vmls(&mut self, w: u32) -> bool {
        self.vfp_mul_accumulate(w, true)
    }

    pub(super) fn vfp_vmov_reg(&mut self, w: u32) -> bool {
        let dp = bit(w, 8);
        let d = self.vfp_d(w, dp);
        let m = self.vfp_m(w, dp);
        let value = self.vfp_read(m);
        self.vfp_write(d, value);
        true
    }

    pub(super) fn vfp_vabs(&mut self, w: u32) -> bool {
        let dp = bit(w, 8);
        let d = self.vfp_d(w, dp);
        let m = self.vfp_m(w, dp);
        let value = self.vfp_read(m);
        let result = if dp { self.ir.fp_abs_64(value) } else { self.ir.fp_abs_32(value) };
        self.vfp_write(d, result);
        true
    }

    pub(super) fn vfp_vneg(&mut self, w: u32) -> bool {
        let dp = bit(w, 8);
        let d = self.vfp_d(w, dp);
        let m = self.vfp_m(w, dp);
        let value = self.vfp_read(m);
        let result = if dp { self.ir.fp_neg_64(value) } else { self.ir.fp_neg_32(value) };
        self.vfp_write(d, result);
        true
    }

    pub(super) fn vfp_vsqrt(&mut self, w: u32) -> bool {
        let dp = bit(w, 8);
        let d = self.vfp_d(w, dp);
        let m = self.vfp_m(w, dp);
        let value = self.vfp_read(m);
        let result = if dp { self.ir.fp_sqrt_64(value) } else { self.ir.fp_sqrt_32(value) };
        self.vfp_write(d, result);
        true
    }

    pub(super) fn vfp_vcmp(&mut self, w: u32) -> bool {
        let dp = bit(w, 8);
        let exc_on_qnan = bit(w, 7);
        let d = self.vfp_d(w, dp);
        let m = self.vfp_m(w, dp);

        let a = self.vfp_read(d);
        let b = self.vfp_read(m);
        let e = self.ir.imm1(exc_on_qnan);
        let nzcv =
            if dp { self.ir.fp_compare_64(a, b, e) } else { self.ir.fp_compare_32(a, b, e) };
        self.ir.a32_set_fpscr_nzcv(nzcv);
        true
    }

    pub(super) fn vfp_vcmp_zero(&mut self, w: u32) -> bool {
        let dp = bit(w, 8);
        let exc_on_qnan = bit(w, 7);
        let d = self.vfp_d(w, dp);

        let a = self.vfp_read(d);
        let e = self.ir.imm1(exc_on_qnan);
        let nzcv = if dp {
            let zero = self.ir.imm64(0);
            self.ir.fp_compare_64(a, zero, e)
        } else {
            let zero = self.ir.imm32(0);
            self.ir.fp_compare_32(a, zero, e)
        };
        self.ir.a32_set_fpscr_nzcv(nzcv);
        true
    }

    pub(super) fn vfp_vcvt_f2f(&mut self, w: u32) -> bool {
        let source_dp = bit(w, 8);
        if source_dp {
            let d = self.vfp_d(w, false);
            let m = self.vfp_m(w, true);
            let value = self.vfp_read(m);
            let result = self.ir.fp_double_to_single(value);
            self.vfp_write(d, result);
        } else {
            let d = self.vfp_d(w, true);
            let m = self.vfp_m(w, false);
            let value = self.vfp_read(m);
            let result = self.ir.fp_single_to_double(value);
            self.vfp_write(d, result);
        }
        true
    }

    pub(super) fn vfp_vcvt_from_int(&mut self, w: u32) -> bool {
        use armjit_ir::Opcode;

        let dp = bit(w, 8);
        let signed = bit(w, 7);
        let d = self.vfp_d(w, dp);
        let m = self.vfp_m(w, false); // integer source is always a single

        let value = self.vfp_read(m);
        let opcode = match (dp, signed) {
            (false, true) => Opcode::FPFixedS32ToSingle,
            (false, false) => Opcode::FPFixedU32ToSingle,
            (true, true) => Opcode::FPFixedS32ToDouble,
            (true, false) => Opcode::FPFixedU32ToDouble,
        };
        // Rounding mode 0xFF selects the FPSCR mode at run time.
        let result = self.ir.fp_to_fixed(opcode, value, 0, 0xFF);
        self.vfp_write(d, result);
        true
    }

    pub(super) fn vfp_vcvt_to_int(&mut self, w: u32) -> bool {
        use armjit_ir::Opcode;

        let dp = bit(w, 8);
        let to_signed = bit(w, 16);
        let round_towards_zero = bit(w, 7);
        let d = self.vfp_d(w, false); // integer result is always a single
        let m = self.vfp_m(w, dp);

        let value = self.vfp_read(m);
        let opcode = match (dp, to_signed) {
            (false, true) => Opcode::FPSingleToFixedS32,
            (false, false) => Opcode::FPSingleToFixedU32,
            (true, true) => Opcode::FPDoubleToFixedS32,
            (true, false) => Opcode::FPDoubleToFixedU32,
        };
        // Rounding mode: 0xFF selects the FPSCR mode at run time.
        let rounding = if round_towards_zero { 3 } else { 0xFF };
        let result = self.ir.fp_to_fixed(opcode, value, 0, rounding);
        self.vfp_write(d, result);
        true
    }

    pub(super) fn vfp_vldr(&mut self, w: u32) -> bool {
        let add = bit(w, 23);
        let dp = bit(w, 8);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = self.vfp_d(w, dp);
        let imm32 = bits(w, 0, 7) << 2;

        let base = if n == A32Reg::PC {
            self.ir.imm32(self.arm_pc() & !3)
        } else {
            self.get_register(n)
        };
        let offset = self.ir.imm32(imm32);
        let address =
            if add { self.ir.add_32(base, offset) } else { self.ir.sub_32(base, offset) };

        if dp {
            let value = self.ir.a32_read_memory_64(address, AccType::Normal);
            self.vfp_write(d, value);
        } else {
            let value = self.ir.a32_read_memory_32(address, AccType::Normal);
            self.vfp_write(d, value);
        }
        true
    }

    pub(super) fn vfp_vstr(&mut self, w: u32) -> bool {
        let add = bit(w, 23);
        let dp = bit(w, 8);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = self.vfp_d(w, dp);
        let imm32 = bits(w, 0, 7) << 2;

        if n == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        let base = self.get_register(n);
        let offset = self.ir.imm32(imm32);
        let address =
            if add { self.ir.add_32(base, offset) } else { self.ir.sub_32(base, offset) };

        let value = self.vfp_read(d);
        if dp {
            self.ir.a32_write_memory_64(address, value, AccType::Normal);
        } else {
            self.ir.a32_write_memory_32(address, value, AccType::Normal);
        }
        true
    }

    pub(super) fn vfp_vmov_core_single(&mut self, w: u32) -> bool {
        let to_core = bit(w, 20);
        let s = single(bits(w, 16, 19), bit(w, 7));
        let t = A32Reg::from_index(bits(w, 12, 15));

        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        if to_core {
            let value = self.ir.a32_get_ext_reg_32(s);
            self.set_register(t, value);
        } else {
            let value = self.get_register(t);
            self.ir.a32_set_ext_reg_32(s, value);
        }
        true
    }

    pub(super) fn vfp_vmov_two_core_double(&mut self, w: u32) -> bool {
        let to_core = bit(w, 20);
        let t2 = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        let m = double(bits(w, 0, 3), bit(w, 5));

        if t == A32Reg::PC || t2 == A32Reg::PC || (to_core && t == t2) {
            return self.unpredictable_instruction();
        }

        if to_core {
            let value = self.ir.a32_get_ext_reg_64(m);
            let lo = self.ir.least_significant_word(value);
            let hi = self.ir.most_significant_word(value);
            self.set_register(t, lo);
            self.set_register(t2, hi);
        } else {
            let lo = self.get_register(t);
            let hi = self.get_register(t2);
            let value = self.ir.pack_2x32_to_1x64(lo, hi);
            self.ir.a32_set_ext_reg_64(m, value);
        }
        true
    }

    pub(super) fn vfp_vmrs(&mut self, w: u32) -> bool {
        let t = bits(w, 12, 15);

        if t == 15 {
            // VMRS APSR_nzcv, FPSCR
            let flags = self.ir.a32_get_fpscr_nzcv();
            self.ir.a32_set_cpsr_nzcv_raw(flags);
        } else {
            let fpscr = self.ir.a32_get_fpscr();
            self.set_register(A32Reg::from_index(t), fpscr);
        }
        true
    }

    pub(super) fn vfp_vmsr(&mut self, w: u32) -> bool {
        let t = A32Reg::from_index(bits(w, 12, 15));
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let value = self.get_register(t);
        // The IT/T half of the context is static; the FPSCR mode bits are
        // merged in by the store below.
        let next = self.next_location();
        self.ir.a32_update_upper_location_descriptor(next.upper_half());
        self.ir.a32_set_fpscr(value);
        let next_pc = self.ir.imm32(next.pc());
        self.set_register(A32Reg::PC, next_pc);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }
}
