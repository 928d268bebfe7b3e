//! A64 data processing instructions.

use armjit_ir::{Cond, Value};

use super::translate::A64Translator;
use crate::bit_util::{bit, bits};

/// The `DecodeBitMasks` pseudocode function for logical immediates and
/// bitfield operations. Returns `(wmask, tmask)`, or `None` for reserved
/// encodings.
pub(super) fn decode_bit_masks(
    n: bool,
    imms: u32,
    immr: u32,
    immediate: bool,
    reg_size: u32,
) -> Option<(u64, u64)> {
    let combined = (u32::from(n) << 6) | (!imms & 0x3F);
    if combined == 0 {
        return None;
    }
    let len = 31 - combined.leading_zeros();
    if (1 << len) > reg_size {
        return None;
    }

    let levels = (1u32 << len) - 1;
    if immediate && (imms & levels) == levels {
        return None;
    }

    let s = imms & levels;
    let r = immr & levels;
    let diff = s.wrapping_sub(r) & levels;

    let esize = 1u32 << len;
    let welem = ones64(s + 1);
    let telem = ones64(diff + 1);

    let wmask = replicate(rotate_right_within(welem, esize, r), esize, reg_size);
    let tmask = replicate(telem, esize, reg_size);
    Some((wmask, tmask))
}

fn ones64(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

fn rotate_right_within(value: u64, width: u32, amount: u32) -> u64 {
    let value = value & ones64(width);
    if amount == 0 {
        return value;
    }
    (value >> amount | value << (width - amount)) & ones64(width)
}

fn replicate(element: u64, esize: u32, reg_size: u32) -> u64 {
    let mut result = 0;
    let mut shift = 0;
    while shift < reg_size {
        result |= element << shift;
        shift += esize;
    }
    result & ones64(reg_size)
}

impl A64Translator {
    fn read_operand(&mut self, sf: bool, reg: u32) -> Value {
        if sf {
            self.get_x(reg)
        } else {
            self.get_w(reg)
        }
    }

    fn write_result(&mut self, sf: bool, reg: u32, value: Value) {
        if sf {
            self.set_x(reg, value);
        } else {
            self.set_w(reg, value);
        }
    }

    fn set_flags_from(&mut self, result: Value) {
        let nzcv = self.ir.nzcv_from(result);
        self.ir.a64_set_nzcv(nzcv);
    }

    pub(super) fn a64_add_sub_imm(&mut self, w: u32, subtract: bool) -> bool {
        let sf = w >> 31 != 0;
        let set_flags = bit(w, 29);
        let shift = bit(w, 22);
        let imm12 = bits(w, 10, 21);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let imm = u64::from(imm12) << if shift { 12 } else { 0 };
        // Rn of 31 names the stack pointer in this encoding class.
        let operand1 = self.get_x_or_sp_sized(sf, n);
        let operand2 = if sf { self.ir.imm64(imm) } else { self.ir.imm32(imm as u32) };

        let result = self.add_sub(sf, operand1, operand2, subtract);
        if set_flags {
            self.set_flags_from(result);
            self.write_result(sf, d, result); // d == 31 discards
        } else {
            // Without flags, Rd of 31 names the stack pointer.
            self.write_sp_result(sf, d, result);
        }
        true
    }

    fn get_x_or_sp_sized(&mut self, sf: bool, reg: u32) -> Value {
        let wide = self.get_x_or_sp(reg);
        if sf {
            wide
        } else {
            self.ir.least_significant_word(wide)
        }
    }

    fn write_sp_result(&mut self, sf: bool, reg: u32, value: Value) {
        if reg == 31 {
            let wide =
                if sf { value } else { self.ir.zero_extend_word_to_long(value) };
            self.ir.a64_set_sp(wide);
        } else {
            self.write_result(sf, reg, value);
        }
    }

    fn add_sub(&mut self, sf: bool, a: Value, b: Value, subtract: bool) -> Value {
        match (sf, subtract) {
            (false, false) => self.ir.add_32(a, b),
            (false, true) => self.ir.sub_32(a, b),
            (true, false) => self.ir.add_64(a, b),
            (true, true) => self.ir.sub_64(a, b),
        }
    }

    pub(super) fn a64_add_sub_reg(&mut self, w: u32, subtract: bool) -> bool {
        let sf = w >> 31 != 0;
        let set_flags = bit(w, 29);
        let shift_type = bits(w, 22, 23);
        let m = bits(w, 16, 20);
        let imm6 = bits(w, 10, 15);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        if shift_type == 0b11 || (!sf && imm6 >= 32) {
            return self.undefined_instruction();
        }

        let operand1 = self.read_operand(sf, n);
        let operand2 = {
            let raw = self.read_operand(sf, m);
            self.shifted_operand(sf, raw, shift_type, imm6)
        };

        let result = self.add_sub(sf, operand1, operand2, subtract);
        if set_flags {
            self.set_flags_from(result);
        }
        self.write_result(sf, d, result);
        true
    }

    fn shifted_operand(&mut self, sf: bool, value: Value, shift_type: u32, amount: u32) -> Value {
        if amount == 0 {
            return value;
        }
        let amount_imm = self.ir.imm8(amount as u8);
        let f = self.ir.imm1(false);
        match (sf, shift_type) {
            (false, 0b00) => self.ir.logical_shift_left_32(value, amount_imm, f),
            (false, 0b01) => self.ir.logical_shift_right_32(value, amount_imm, f),
            (false, 0b10) => self.ir.arithmetic_shift_right_32(value, amount_imm, f),
            (false, 0b11) => self.ir.rotate_right_32(value, amount_imm, f),
            (true, 0b00) => self.ir.logical_shift_left_64(value, amount_imm),
            (true, 0b01) => self.ir.logical_shift_right_64(value, amount_imm),
            (true, 0b10) => self.ir.arithmetic_shift_right_64(value, amount_imm),
            (true, 0b11) => self.ir.rotate_right_64(value, amount_imm),
            _ => unreachable!(),
        }
    }

    pub(super) fn a64_logical_imm(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let opc = bits(w, 29, 30);
        let n_bit = bit(w, 22);
        let immr = bits(w, 16, 21);
        let imms = bits(w, 10, 15);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        if !sf && n_bit {
            return self.undefined_instruction();
        }
        let reg_size = if sf { 64 } else { 32 };
        let Some((wmask, _)) = decode_bit_masks(n_bit, imms, immr, true, reg_size) else {
            return self.undefined_instruction();
        };

        let operand1 = self.read_operand(sf, n);
        let imm = if sf { self.ir.imm64(wmask) } else { self.ir.imm32(wmask as u32) };

        let (result, set_flags) = match (opc, sf) {
            (0b00, false) => (self.ir.and_32(operand1, imm), false),
            (0b00, true) => (self.ir.and_64(operand1, imm), false),
            (0b01, false) => (self.ir.or_32(operand1, imm), false),
            (0b01, true) => (self.ir.or_64(operand1, imm), false),
            (0b10, false) => (self.ir.eor_32(operand1, imm), false),
            (0b10, true) => (self.ir.eor_64(operand1, imm), false),
            (0b11, false) => (self.ir.and_32(operand1, imm), true),
            (0b11, true) => (self.ir.and_64(operand1, imm), true),
            _ => unreachable!(),
        };

        if set_flags {
            self.set_flags_from(result);
            self.write_result(sf, d, result);
        } else {
            // AND/ORR/EOR immediate can target the stack pointer.
            self.write_sp_result(sf, d, result);
        }
        true
    }

    pub(super) fn a64_logical_reg(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let opc = bits(w, 29, 30);
        let shift_type = bits(w, 22, 23);
        let invert = bit(w, 21);
        let m = bits(w, 16, 20);
        let imm6 = bits(w, 10, 15);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        if !sf && imm6 >= 32 {
            return self.undefined_instruction();
        }

        let operand1 = self.read_operand(sf, n);
        let mut operand2 = {
            let raw = self.read_operand(sf, m);
            self.shifted_operand(sf, raw, shift_type, imm6)
        };
        if invert {
            operand2 =
                if sf { self.ir.not_64(operand2) } else { self.ir.not_32(operand2) };
        }

        let (result, set_flags) = match (opc, sf) {
            (0b00, false) => (self.ir.and_32(operand1, operand2), false),
            (0b00, true) => (self.ir.and_64(operand1, operand2), false),
            (0b01, false) => (self.ir.or_32(operand1, operand2), false),
            (0b01, true) => (self.ir.or_64(operand1, operand2), false),
            (0b10, false) => (self.ir.eor_32(operand1, operand2), false),
            (0b10, true) => (self.ir.eor_64(operand1, operand2), false),
            (0b11, false) => (self.ir.and_32(operand1, operand2), true),
            (0b11, true) => (self.ir.and_64(operand1, operand2), true),
            _ => unreachable!(),
        };

        if set_flags {
            self.set_flags_from(result);
        }
        self.write_result(sf, d, result);
        true
    }

    pub(super) fn a64_move_wide(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let opc = bits(w, 29, 30);
        let hw = bits(w, 21, 22);
        let imm16 = bits(w, 5, 20);
        let d = bits(w, 0, 4);

        if opc == 0b01 || (!sf && hw >= 2) {
            return self.undefined_instruction();
        }
        let shift = hw * 16;

        match opc {
            0b00 => {
                // MOVN
                let value = !(u64::from(imm16) << shift);
                let imm = if sf {
                    self.ir.imm64(value)
                } else {
                    self.ir.imm32(value as u32)
                };
                self.write_result(sf, d, imm);
            }
            0b10 => {
                // MOVZ
                let value = u64::from(imm16) << shift;
                let imm =
                    if sf { self.ir.imm64(value) } else { self.ir.imm32(value as u32) };
                self.write_result(sf, d, imm);
            }
            0b11 => {
                // MOVK
                let old = self.read_operand(sf, d);
                let merged = if sf {
                    let kept = self.ir.and_64(old, self.ir.imm64(!(0xFFFFu64 << shift)));
                    self.ir.or_64(kept, self.ir.imm64(u64::from(imm16) << shift))
                } else {
                    let kept = self.ir.and_32(old, self.ir.imm32(!(0xFFFFu32 << shift)));
                    self.ir.or_32(kept, self.ir.imm32(imm16 << shift))
                };
                self.write_result(sf, d, merged);
            }
            _ => unreachable!(),
        }
        true
    }

    /// UBFM/SBFM, lowered to shift pairs. With `imms >= immr` this is a
    /// field extract; otherwise a field insert into zeroes.
    pub(super) fn a64_bitfield(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let opc = bits(w, 29, 30);
        let n_bit = bit(w, 22);
        let immr = bits(w, 16, 21);
        let imms = bits(w, 10, 15);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        if n_bit != sf || (!sf && (immr >= 32 || imms >= 32)) {
            return self.undefined_instruction();
        }
        let signed = match opc {
            0b00 => true,  // SBFM
            0b10 => false, // UBFM
            _ => return self.interpret_fallback(), // BFM
        };

        let reg_size = if sf { 64 } else { 32 };
        let src = self.read_operand(sf, n);

        // Left-align the field so the following right shift extends it.
        let up = (reg_size - 1 - imms) as u8;
        let aligned = self.shift_left(sf, src, up);
        let result = if imms >= immr {
            // Extract: shift the field down to bit 0.
            let down = (up + immr as u8) as u8;
            self.shift_right(sf, aligned, down, signed)
        } else {
            // Insert: extend the field at bit 0, then move it up into place.
            let extended = self.shift_right(sf, aligned, up, signed);
            self.shift_left(sf, extended, (reg_size - immr) as u8)
        };

        self.write_result(sf, d, result);
        true
    }

    fn shift_left(&mut self, sf: bool, value: Value, amount: u8) -> Value {
        if amount == 0 {
            return value;
        }
        let amount = self.ir.imm8(amount);
        if sf {
            self.ir.logical_shift_left_64(value, amount)
        } else {
            let f = self.ir.imm1(false);
            self.ir.logical_shift_left_32(value, amount, f)
        }
    }

    fn shift_right(&mut self, sf: bool, value: Value, amount: u8, arithmetic: bool) -> Value {
        if amount == 0 {
            return value;
        }
        let amount = self.ir.imm8(amount);
        match (sf, arithmetic) {
            (false, false) => {
                let f = self.ir.imm1(false);
                self.ir.logical_shift_right_32(value, amount, f)
            }
            (false, true) => {
                let f = self.ir.imm1(false);
                self.ir.arithmetic_shift_right_32(value, amount, f)
            }
            (true, false) => self.ir.logical_shift_right_64(value, amount),
            (true, true) => self.ir.arithmetic_shift_right_64(value, amount),
        }
    }

    pub(super) fn a64_shift_variable(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let m = bits(w, 16, 20);
        let op2 = bits(w, 10, 11);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let value = self.read_operand(sf, n);
        let shift_reg = self.read_operand(sf, m);
        // The shift amount is taken modulo the register width.
        let amount = {
            let shift_w = if sf { self.ir.least_significant_word(shift_reg) } else { shift_reg };
            let masked = self.ir.and_32(shift_w, self.ir.imm32(if sf { 63 } else { 31 }));
            self.ir.least_significant_byte(masked)
        };

        let f = self.ir.imm1(false);
        let result = match (sf, op2) {
            (false, 0b00) => self.ir.logical_shift_left_32(value, amount, f),
            (false, 0b01) => self.ir.logical_shift_right_32(value, amount, f),
            (false, 0b10) => self.ir.arithmetic_shift_right_32(value, amount, f),
            (false, 0b11) => self.ir.rotate_right_32(value, amount, f),
            (true, 0b00) => self.ir.logical_shift_left_64(value, amount),
            (true, 0b01) => self.ir.logical_shift_right_64(value, amount),
            (true, 0b10) => self.ir.arithmetic_shift_right_64(value, amount),
            (true, 0b11) => self.ir.rotate_right_64(value, amount),
            _ => unreachable!(),
        };
        self.write_result(sf, d, result);
        true
    }

    pub(super) fn a64_div(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let signed = bit(w, 10);
        let m = bits(w, 16, 20);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let a = self.read_operand(sf, n);
        let b = self.read_operand(sf, m);
        let result = match (sf, signed) {
            (false, false) => self.ir.unsigned_div_32(a, b),
            (false, true) => self.ir.signed_div_32(a, b),
            (true, false) => self.ir.unsigned_div_64(a, b),
            (true, true) => self.ir.signed_div_64(a, b),
        };
        self.write_result(sf, d, result);
        true
    }

    pub(super) fn a64_clz(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let value = self.read_operand(sf, n);
        let result = if sf {
            self.ir.count_leading_zeros_64(value)
        } else {
            self.ir.count_leading_zeros_32(value)
        };
        self.write_result(sf, d, result);
        true
    }

    pub(super) fn a64_rev32(&mut self, w: u32) -> bool {
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);
        let value = self.get_w(n);
        let result = self.ir.byte_reverse_word(value);
        self.set_w(d, result);
        true
    }

    pub(super) fn a64_rev64(&mut self, w: u32) -> bool {
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);
        let value = self.get_x(n);
        let result = self.ir.byte_reverse_dual(value);
        self.set_x(d, result);
        true
    }

    pub(super) fn a64_madd(&mut self, w: u32, subtract: bool) -> bool {
        let sf = w >> 31 != 0;
        let m = bits(w, 16, 20);
        let a = bits(w, 10, 14);
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let rn = self.read_operand(sf, n);
        let rm = self.read_operand(sf, m);
        let ra = self.read_operand(sf, a);
        let product = if sf { self.ir.mul_64(rn, rm) } else { self.ir.mul_32(rn, rm) };
        let result = match (sf, subtract) {
            (false, false) => self.ir.add_32(ra, product),
            (false, true) => self.ir.sub_32(ra, product),
            (true, false) => self.ir.add_64(ra, product),
            (true, true) => self.ir.sub_64(ra, product),
        };
        self.write_result(sf, d, result);
        true
    }

    pub(super) fn a64_csel(&mut self, w: u32) -> bool {
        let sf = w >> 31 != 0;
        let negate = bit(w, 30); // CSINV/CSNEG group
        let m = bits(w, 16, 20);
        let cond = Cond::from_bits(bits(w, 12, 15));
        let increment = bit(w, 10); // CSINC/CSNEG
        let n = bits(w, 5, 9);
        let d = bits(w, 0, 4);

        let then_ = self.read_operand(sf, n);
        let mut else_ = self.read_operand(sf, m);

        if negate {
            else_ = if sf { self.ir.not_64(else_) } else { self.ir.not_32(else_) };
        }
        if increment {
            let one = if sf { self.ir.imm64(1) } else { self.ir.imm32(1) };
            else_ = if sf { self.ir.add_64(else_, one) } else { self.ir.add_32(else_, one) };
        }

        let result = if sf {
            self.ir.conditional_select_64(cond, then_, else_)
        } else {
            self.ir.conditional_select_32(cond, then_, else_)
        };
        self.write_result(sf, d, result);
        true
    }

    pub(super) fn a64_ccmp_reg(&mut self, w: u32) -> bool {
        let m = bits(w, 16, 20);
        let operand2_of = move |t: &mut A64Translator, sf: bool| t.read_operand(sf, m);
        self.conditional_compare(w, operand2_of)
    }

    pub(super) fn a64_ccmp_imm(&mut self, w: u32) -> bool {
        let imm5 = bits(w, 16, 20);
        let operand2_of = move |t: &mut A64Translator, sf: bool| {
            if sf {
                t.ir.imm64(u64::from(imm5))
            } else {
                t.ir.imm32(imm5)
            }
        };
        self.conditional_compare(w, operand2_of)
    }

    fn conditional_compare(
        &mut self,
        w: u32,
        operand2_of: impl FnOnce(&mut A64Translator, bool) -> Value,
    ) -> bool {
        let sf = w >> 31 != 0;
        let negative = !bit(w, 30); // op: 1 = CCMP (subtract), 0 = CCMN (add)
        let cond = Cond::from_bits(bits(w, 12, 15));
        let n = bits(w, 5, 9);
        let nzcv_imm = bits(w, 0, 3);

        let operand1 = self.read_operand(sf, n);
        let operand2 = operand2_of(self, sf);

        let result = match (sf, negative) {
            (false, true) => self.ir.sub_32(operand1, operand2),
            (false, false) => self.ir.add_32(operand1, operand2),
            (true, true) => self.ir.sub_64(operand1, operand2),
            (true, false) => self.ir.add_64(operand1, operand2),
        };
        let compared = self.ir.nzcv_from(result);
        let fallback = {
            let packed = self.ir.imm32(nzcv_imm << 28);
            self.ir.nzcv_from_packed_flags(packed)
        };
        let merged = self.ir.conditional_select_nzcv(cond, compared, fallback);
        self.ir.a64_set_nzcv(merged);
        true
    }

    pub(super) fn a64_adr(&mut self, w: u32, page: bool) -> bool {
        let immlo = bits(w, 29, 30);
        let immhi = bits(w, 5, 23);
        let d = bits(w, 0, 4);

        let raw = u64::from(immhi) << 2 | u64::from(immlo);
        let imm = crate::bit_util::sign_extend_64(raw, 21);
        let value = if page {
            (self.pc() & !0xFFF).wrapping_add(imm << 12)
        } else {
            self.pc().wrapping_add(imm)
        };
        let imm_value = self.ir.imm64(value);
        self.set_x(d, imm_value);
        true
    }
}
