//! ARM data-processing instructions.

use armjit_ir::{A32Reg, Terminal, Value};

use crate::a32::translate::A32Translator;
use crate::bit_util::{arm_expand_imm, bit, bits};

/// The sixteen data-processing operations, in encoding order.
#[derive(Clone, Copy, PartialEq, Eq)]
enum DpOp {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl DpOp {
    fn from_bits(op: u32) -> DpOp {
        match op {
            0 => DpOp::And,
            1 => DpOp::Eor,
            2 => DpOp::Sub,
            3 => DpOp::Rsb,
            4 => DpOp::Add,
            5 => DpOp::Adc,
            6 => DpOp::Sbc,
            7 => DpOp::Rsc,
            8 => DpOp::Tst,
            9 => DpOp::Teq,
            10 => DpOp::Cmp,
            11 => DpOp::Cmn,
            12 => DpOp::Orr,
            13 => DpOp::Mov,
            14 => DpOp::Bic,
            15 => DpOp::Mvn,
            _ => unreachable!(),
        }
    }

    fn is_comparison(self) -> bool {
        matches!(self, DpOp::Tst | DpOp::Teq | DpOp::Cmp | DpOp::Cmn)
    }

    fn uses_rn(self) -> bool {
        !matches!(self, DpOp::Mov | DpOp::Mvn)
    }
}

/// A shifted operand together with its carry-out.
struct Shifted {
    value: Value,
    carry: Value,
}

impl A32Translator {
    pub(super) fn arm_data_processing_imm(&mut self, w: u32) -> bool {
        let op = DpOp::from_bits(bits(w, 21, 24));
        let s = bit(w, 20);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = A32Reg::from_index(bits(w, 12, 15));
        let rotate = bits(w, 8, 11);
        let imm8 = bits(w, 0, 7);

        let imm32 = arm_expand_imm(rotate, imm8);
        let carry = if rotate == 0 {
            None
        } else {
            Some(self.ir.imm1(imm32 >> 31 != 0))
        };

        let operand = Shifted {
            value: self.ir.imm32(imm32),
            carry: match carry {
                Some(c) => c,
                None => Value::Void, // replaced with the C flag on demand
            },
        };
        self.data_processing(op, s, n, d, operand)
    }

    pub(super) fn arm_data_processing_reg(&mut self, w: u32) -> bool {
        let op = DpOp::from_bits(bits(w, 21, 24));
        let s = bit(w, 20);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = A32Reg::from_index(bits(w, 12, 15));
        let imm5 = bits(w, 7, 11);
        let shift_type = bits(w, 5, 6);
        let m = A32Reg::from_index(bits(w, 0, 3));

        let needs_carry = s || op_uses_shift_carry(op);
        let operand = self.emit_imm_shift(m, shift_type, imm5, needs_carry);
        self.data_processing(op, s, n, d, operand)
    }

    pub(super) fn arm_data_processing_rsr(&mut self, w: u32) -> bool {
        let op = DpOp::from_bits(bits(w, 21, 24));
        let s = bit(w, 20);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = A32Reg::from_index(bits(w, 12, 15));
        let s_reg = A32Reg::from_index(bits(w, 8, 11));
        let shift_type = bits(w, 5, 6);
        let m = A32Reg::from_index(bits(w, 0, 3));

        // Register-controlled shifts of the PC are unpredictable.
        if d == A32Reg::PC
            || n == A32Reg::PC
            || m == A32Reg::PC
            || s_reg == A32Reg::PC
        {
            return self.unpredictable_instruction();
        }

        let operand = self.emit_reg_shift(m, shift_type, s_reg);
        self.data_processing(op, s, n, d, operand)
    }

    /// Shift by immediate, with the ARM decode quirks (LSR/ASR #0 mean #32,
    /// ROR #0 is RRX).
    fn emit_imm_shift(&mut self, m: A32Reg, shift_type: u32, imm5: u32, want_carry: bool) -> Shifted {
        let value = self.get_register(m);
        let carry_in = if want_carry {
            self.ir.a32_get_c_flag()
        } else {
            self.ir.imm1(false)
        };

        match (shift_type, imm5) {
            (0b00, 0) => Shifted { value, carry: carry_in },
            (0b00, amount) => {
                let rc = self.ir.logical_shift_left_with_carry_32(
                    value,
                    self.ir.imm8(amount as u8),
                    carry_in,
                );
                Shifted { value: rc.result, carry: rc.carry }
            }
            (0b01, amount) => {
                let amount = if amount == 0 { 32 } else { amount };
                let rc = self.ir.logical_shift_right_with_carry_32(
                    value,
                    self.ir.imm8(amount as u8),
                    carry_in,
                );
                Shifted { value: rc.result, carry: rc.carry }
            }
            (0b10, amount) => {
                let amount = if amount == 0 { 32 } else { amount };
                let rc = self.ir.arithmetic_shift_right_with_carry_32(
                    value,
                    self.ir.imm8(amount as u8),
                    carry_in,
                );
                Shifted { value: rc.result, carry: rc.carry }
            }
            (0b11, 0) => {
                // RRX always consumes the C flag.
                let carry_in = self.ir.a32_get_c_flag();
                let rc = self.ir.rotate_right_extended(value, carry_in);
                Shifted { value: rc.result, carry: rc.carry }
            }
            (0b11, amount) => {
                let rc = self.ir.rotate_right_with_carry_32(
                    value,
                    self.ir.imm8(amount as u8),
                    carry_in,
                );
                Shifted { value: rc.result, carry: rc.carry }
            }
            _ => unreachable!(),
        }
    }

    /// Shift by the bottom byte of a register.
    fn emit_reg_shift(&mut self, m: A32Reg, shift_type: u32, s_reg: A32Reg) -> Shifted {
        let value = self.get_register(m);
        let shift_reg = self.get_register(s_reg);
        let amount = self.ir.least_significant_byte(shift_reg);
        let carry_in = self.ir.a32_get_c_flag();

        let rc = match shift_type {
            0b00 => self.ir.logical_shift_left_with_carry_32(value, amount, carry_in),
            0b01 => self.ir.logical_shift_right_with_carry_32(value, amount, carry_in),
            0b10 => self.ir.arithmetic_shift_right_with_carry_32(value, amount, carry_in),
            0b11 => self.ir.rotate_right_with_carry_32(value, amount, carry_in),
            _ => unreachable!(),
        };
        Shifted { value: rc.result, carry: rc.carry }
    }

    fn operand_carry(&mut self, operand: &Shifted) -> Value {
        match operand.carry {
            Value::Void => self.ir.a32_get_c_flag(),
            carry => carry,
        }
    }

    fn data_processing(&mut self, op: DpOp, s: bool, n: A32Reg, d: A32Reg, operand: Shifted) -> bool {
        if op.is_comparison() && !s {
            // Comparison encodings with S clear belong to system spaces this
            // recompiler does not implement.
            return self.undefined_instruction();
        }

        let rn = if op.uses_rn() { Some(self.get_register(n)) } else { None };

        // Result plus how the flags come about: arithmetic ops take C/V from
        // the operation, logical ops take C from the shifter.
        let (result, arithmetic) = match op {
            DpOp::And | DpOp::Tst => {
                let value = self.ir.and_32(rn.unwrap(), operand.value);
                (value, false)
            }
            DpOp::Eor | DpOp::Teq => {
                let value = self.ir.eor_32(rn.unwrap(), operand.value);
                (value, false)
            }
            DpOp::Sub | DpOp::Cmp => {
                let value = self.ir.sub_32(rn.unwrap(), operand.value);
                (value, true)
            }
            DpOp::Rsb => {
                let value = self.ir.sub_32(operand.value, rn.unwrap());
                (value, true)
            }
            DpOp::Add | DpOp::Cmn => {
                let value = self.ir.add_32(rn.unwrap(), operand.value);
                (value, true)
            }
            DpOp::Adc => {
                let carry = self.ir.a32_get_c_flag();
                let value = self.ir.add_with_carry_32(rn.unwrap(), operand.value, carry);
                (value, true)
            }
            DpOp::Sbc => {
                let carry = self.ir.a32_get_c_flag();
                let value = self.ir.sub_with_carry_32(rn.unwrap(), operand.value, carry);
                (value, true)
            }
            DpOp::Rsc => {
                let carry = self.ir.a32_get_c_flag();
                let value = self.ir.sub_with_carry_32(operand.value, rn.unwrap(), carry);
                (value, true)
            }
            DpOp::Orr => {
                let value = self.ir.or_32(rn.unwrap(), operand.value);
                (value, false)
            }
            DpOp::Mov => (operand.value, false),
            DpOp::Bic => {
                let inverted = self.ir.not_32(operand.value);
                let value = self.ir.and_32(rn.unwrap(), inverted);
                (value, false)
            }
            DpOp::Mvn => {
                let value = self.ir.not_32(operand.value);
                (value, false)
            }
        };

        if s {
            let n_flag = self.ir.most_significant_bit(result);
            self.ir.a32_set_n_flag(n_flag);
            let z_flag = self.ir.is_zero_32(result);
            self.ir.a32_set_z_flag(z_flag);
            if arithmetic {
                let c = self.ir.carry_from(result);
                self.ir.a32_set_c_flag(c);
                let v = self.ir.overflow_from(result);
                self.ir.a32_set_v_flag(v);
            } else {
                let c = self.operand_carry(&operand);
                self.ir.a32_set_c_flag(c);
            }
        }

        if op.is_comparison() {
            return true;
        }

        if d == A32Reg::PC {
            if s {
                // SUBS PC, LR: exception return; user mode has no banked
                // SPSR to restore.
                return self.unpredictable_instruction();
            }
            self.alu_write_pc(result);
            self.ir.set_term(Terminal::ReturnToDispatch);
            return false;
        }

        self.set_register(d, result);
        true
    }
}

fn op_uses_shift_carry(op: DpOp) -> bool {
    // Logical ops put the shifter carry into C when S is set; the carry-in
    // also feeds RRX.
    matches!(
        op,
        DpOp::And | DpOp::Eor | DpOp::Tst | DpOp::Teq | DpOp::Orr | DpOp::Mov | DpOp::Bic | DpOp::Mvn
    )
}
