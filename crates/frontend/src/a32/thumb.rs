//! Thumb-16 (and the Thumb-32 BL) decoding and translation.

use std::sync::LazyLock;

use armjit_ir::{A32Reg, AccType, Cond, Terminal, Value};

use super::itstate::ItState;
use super::translate::A32Translator;
use super::Exception;
use crate::bit_util::{bit, bits, sign_extend};
use crate::decoder::DecodeEntry;

type Entry = DecodeEntry<A32Translator>;

pub(super) fn table() -> &'static [Entry] {
    static TABLE: LazyLock<Vec<Entry>> = LazyLock::new(build_table16);
    &TABLE
}

pub(super) fn table32() -> &'static [Entry] {
    static TABLE: LazyLock<Vec<Entry>> = LazyLock::new(build_table32);
    &TABLE
}

fn build_table16() -> Vec<Entry> {
    vec![
        // Shift (immediate), add, subtract, move and compare.
        Entry::new("00000vvvvvmmmddd", "LSLS (imm)", |t, w| t.thumb_shift_imm(w, 0b00)),
        Entry::new("00001vvvvvmmmddd", "LSRS (imm)", |t, w| t.thumb_shift_imm(w, 0b01)),
        Entry::new("00010vvvvvmmmddd", "ASRS (imm)", |t, w| t.thumb_shift_imm(w, 0b10)),
        Entry::new("0001100mmmnnnddd", "ADDS (reg)", |t, w| t.thumb_add_sub_reg(w, false)),
        Entry::new("0001101mmmnnnddd", "SUBS (reg)", |t, w| t.thumb_add_sub_reg(w, true)),
        Entry::new("0001110vvvnnnddd", "ADDS (imm3)", |t, w| t.thumb_add_sub_imm3(w, false)),
        Entry::new("0001111vvvnnnddd", "SUBS (imm3)", |t, w| t.thumb_add_sub_imm3(w, true)),
        Entry::new("00100dddvvvvvvvv", "MOVS (imm)", |t, w| t.thumb_mov_imm(w)),
        Entry::new("00101nnnvvvvvvvv", "CMP (imm)", |t, w| t.thumb_cmp_imm(w)),
        Entry::new("00110dddvvvvvvvv", "ADDS (imm8)", |t, w| t.thumb_add_sub_imm8(w, false)),
        Entry::new("00111dddvvvvvvvv", "SUBS (imm8)", |t, w| t.thumb_add_sub_imm8(w, true)),

        // Data processing (register).
        Entry::new("0100000000mmmddd", "ANDS", |t, w| t.thumb_dp(w, 0x0)),
        Entry::new("0100000001mmmddd", "EORS", |t, w| t.thumb_dp(w, 0x1)),
        Entry::new("0100000010mmmddd", "LSLS (reg)", |t, w| t.thumb_dp(w, 0x2)),
        Entry::new("0100000011mmmddd", "LSRS (reg)", |t, w| t.thumb_dp(w, 0x3)),
        Entry::new("0100000100mmmddd", "ASRS (reg)", |t, w| t.thumb_dp(w, 0x4)),
        Entry::new("0100000101mmmddd", "ADCS", |t, w| t.thumb_dp(w, 0x5)),
        Entry::new("0100000110mmmddd", "SBCS", |t, w| t.thumb_dp(w, 0x6)),
        Entry::new("0100000111mmmddd", "RORS", |t, w| t.thumb_dp(w, 0x7)),
        Entry::new("0100001000mmmddd", "TST", |t, w| t.thumb_dp(w, 0x8)),
        Entry::new("0100001001mmmddd", "RSBS", |t, w| t.thumb_dp(w, 0x9)),
        Entry::new("0100001010mmmddd", "CMP (reg)", |t, w| t.thumb_dp(w, 0xA)),
        Entry::new("0100001011mmmddd", "CMN (reg)", |t, w| t.thumb_dp(w, 0xB)),
        Entry::new("0100001100mmmddd", "ORRS", |t, w| t.thumb_dp(w, 0xC)),
        Entry::new("0100001101mmmddd", "MULS", |t, w| t.thumb_dp(w, 0xD)),
        Entry::new("0100001110mmmddd", "BICS", |t, w| t.thumb_dp(w, 0xE)),
        Entry::new("0100001111mmmddd", "MVNS", |t, w| t.thumb_dp(w, 0xF)),

        // Special data processing and branch/exchange.
        Entry::new("01000100dmmmmddd", "ADD (hi reg)", |t, w| t.thumb_add_hi(w)),
        Entry::new("01000101nmmmmnnn", "CMP (hi reg)", |t, w| t.thumb_cmp_hi(w)),
        Entry::new("01000110dmmmmddd", "MOV (hi reg)", |t, w| t.thumb_mov_hi(w)),
        Entry::new("010001110mmmm000", "BX", |t, w| t.thumb_bx(w)),
        Entry::new("010001111mmmm000", "BLX (reg)", |t, w| t.thumb_blx_reg(w)),

        // Loads and stores.
        Entry::new("01001dddvvvvvvvv", "LDR (literal)", |t, w| t.thumb_ldr_literal(w)),
        Entry::new("0101000mmmnnnddd", "STR (reg)", |t, w| t.thumb_load_store_reg(w, 0)),
        Entry::new("0101001mmmnnnddd", "STRH (reg)", |t, w| t.thumb_load_store_reg(w, 1)),
        Entry::new("0101010mmmnnnddd", "STRB (reg)", |t, w| t.thumb_load_store_reg(w, 2)),
        Entry::new("0101011mmmnnnddd", "LDRSB (reg)", |t, w| t.thumb_load_store_reg(w, 3)),
        Entry::new("0101100mmmnnnddd", "LDR (reg)", |t, w| t.thumb_load_store_reg(w, 4)),
        Entry::new("0101101mmmnnnddd", "LDRH (reg)", |t, w| t.thumb_load_store_reg(w, 5)),
        Entry::new("0101110mmmnnnddd", "LDRB (reg)", |t, w| t.thumb_load_store_reg(w, 6)),
        Entry::new("0101111mmmnnnddd", "LDRSH (reg)", |t, w| t.thumb_load_store_reg(w, 7)),
        Entry::new("01100vvvvvnnnddd", "STR (imm)", |t, w| t.thumb_load_store_imm(w, false, 4)),
        Entry::new("01101vvvvvnnnddd", "LDR (imm)", |t, w| t.thumb_load_store_imm(w, true, 4)),
        Entry::new("01110vvvvvnnnddd", "STRB (imm)", |t, w| t.thumb_load_store_imm(w, false, 1)),
        Entry::new("01111vvvvvnnnddd", "LDRB (imm)", |t, w| t.thumb_load_store_imm(w, true, 1)),
        Entry::new("10000vvvvvnnnddd", "STRH (imm)", |t, w| t.thumb_load_store_imm(w, false, 2)),
        Entry::new("10001vvvvvnnnddd", "LDRH (imm)", |t, w| t.thumb_load_store_imm(w, true, 2)),
        Entry::new("10010dddvvvvvvvv", "STR (sp rel)", |t, w| t.thumb_load_store_sp(w, false)),
        Entry::new("10011dddvvvvvvvv", "LDR (sp rel)", |t, w| t.thumb_load_store_sp(w, true)),

        // Address generation and SP arithmetic.
        Entry::new("10100dddvvvvvvvv", "ADR", |t, w| t.thumb_adr(w)),
        Entry::new("10101dddvvvvvvvv", "ADD (sp + imm)", |t, w| t.thumb_add_sp_imm(w)),
        Entry::new("101100000vvvvvvv", "ADD SP", |t, w| t.thumb_adjust_sp(w, false)),
        Entry::new("101100001vvvvvvv", "SUB SP", |t, w| t.thumb_adjust_sp(w, true)),

        // Misc 16-bit.
        Entry::new("1011001000mmmddd", "SXTH", |t, w| t.thumb_extend(w, true, true)),
        Entry::new("1011001001mmmddd", "SXTB", |t, w| t.thumb_extend(w, true, false)),
        Entry::new("1011001010mmmddd", "UXTH", |t, w| t.thumb_extend(w, false, true)),
        Entry::new("1011001011mmmddd", "UXTB", |t, w| t.thumb_extend(w, false, false)),
        Entry::new("1011o0i1vvvvvnnn", "CBZ/CBNZ", |t, w| t.thumb_cbz(w)),
        Entry::new("1011010rrrrrrrrr", "PUSH", |t, w| t.thumb_push(w)),
        Entry::new("1011110rrrrrrrrr", "POP", |t, w| t.thumb_pop(w)),
        Entry::new("1011101000mmmddd", "REV", |t, w| t.thumb_rev(w)),
        Entry::new("1011101001mmmddd", "REV16", |t, w| t.thumb_rev16(w)),
        Entry::new("10111111vvvv0000", "hints", |t, w| t.thumb_hint(w)),
        Entry::new("10111111ccccmmmm", "IT", |t, w| t.thumb_it(w)),

        // Store/load multiple.
        Entry::new("11000nnnrrrrrrrr", "STMIA", |t, w| t.thumb_stmia(w)),
        Entry::new("11001nnnrrrrrrrr", "LDMIA", |t, w| t.thumb_ldmia(w)),

        // Branches and supervisor calls.
        Entry::new("11011111vvvvvvvv", "SVC", |t, w| t.thumb_svc(w)),
        Entry::new("11011110vvvvvvvv", "UDF", |t, _| t.undefined_instruction()),
        Entry::new("1101ccccvvvvvvvv", "B (cond)", |t, w| t.thumb_b_cond(w)),
        Entry::new("11100vvvvvvvvvvv", "B", |t, w| t.thumb_b(w)),
    ]
}

fn build_table32() -> Vec<Entry> {
    vec![Entry::new("11110vvvvvvvvvvv11v1vvvvvvvvvvvv", "BL", |t, w| t.thumb32_bl(w))]
}

impl A32Translator {
    fn low_reg(&self, value: u32) -> A32Reg {
        A32Reg::from_index(value & 7)
    }

    fn thumb_set_nzc(&mut self, result: Value, carry: Value) {
        self.set_nz_thumb(result);
        self.ir.a32_set_c_flag(carry);
    }

    fn set_nz_thumb(&mut self, result: Value) {
        let n = self.ir.most_significant_bit(result);
        self.ir.a32_set_n_flag(n);
        let z = self.ir.is_zero_32(result);
        self.ir.a32_set_z_flag(z);
    }

    /// Thumb flag-setting ops only set flags outside an IT block.
    fn sets_flags(&self) -> bool {
        !self.current.it_state().is_in_it_block()
    }

    fn set_nzcv_from(&mut self, result: Value) {
        self.set_nz_thumb(result);
        let c = self.ir.carry_from(result);
        self.ir.a32_set_c_flag(c);
        let v = self.ir.overflow_from(result);
        self.ir.a32_set_v_flag(v);
    }

    fn thumb_shift_imm(&mut self, w: u32, shift_type: u32) -> bool {
        let imm5 = bits(w, 6, 10);
        let m = self.low_reg(bits(w, 3, 5));
        let d = self.low_reg(bits(w, 0, 2));

        let value = self.get_register(m);
        let carry_in = self.ir.a32_get_c_flag();
        let rc = match (shift_type, imm5) {
            (0b00, 0) => {
                // MOVS with a plain register operand.
                armjit_ir::ResultAndCarry { result: value, carry: carry_in }
            }
            (0b00, amount) => self.ir.logical_shift_left_with_carry_32(
                value,
                self.ir.imm8(amount as u8),
                carry_in,
            ),
            (0b01, amount) => {
                let amount = if amount == 0 { 32 } else { amount };
                self.ir.logical_shift_right_with_carry_32(
                    value,
                    self.ir.imm8(amount as u8),
                    carry_in,
                )
            }
            (0b10, amount) => {
                let amount = if amount == 0 { 32 } else { amount };
                self.ir.arithmetic_shift_right_with_carry_32(
                    value,
                    self.ir.imm8(amount as u8),
                    carry_in,
                )
            }
            _ => unreachable!(),
        };

        self.set_register(d, rc.result);
        if self.sets_flags() {
            self.thumb_set_nzc(rc.result, rc.carry);
        }
        true
    }

    fn thumb_add_sub_reg(&mut self, w: u32, sub: bool) -> bool {
        let m = self.low_reg(bits(w, 6, 8));
        let n = self.low_reg(bits(w, 3, 5));
        let d = self.low_reg(bits(w, 0, 2));

        let rn = self.get_register(n);
        let rm = self.get_register(m);
        let result = if sub { self.ir.sub_32(rn, rm) } else { self.ir.add_32(rn, rm) };
        self.set_register(d, result);
        if self.sets_flags() {
            self.set_nzcv_from(result);
        }
        true
    }

    fn thumb_add_sub_imm3(&mut self, w: u32, sub: bool) -> bool {
        let imm3 = bits(w, 6, 8);
        let n = self.low_reg(bits(w, 3, 5));
        let d = self.low_reg(bits(w, 0, 2));

        let rn = self.get_register(n);
        let imm = self.ir.imm32(imm3);
        let result = if sub { self.ir.sub_32(rn, imm) } else { self.ir.add_32(rn, imm) };
        self.set_register(d, result);
        if self.sets_flags() {
            self.set_nzcv_from(result);
        }
        true
    }

    fn thumb_mov_imm(&mut self, w: u32) -> bool {
        let d = self.low_reg(bits(w, 8, 10));
        let imm8 = bits(w, 0, 7);

        let value = self.ir.imm32(imm8);
        self.set_register(d, value);
        if self.sets_flags() {
            self.set_nz_thumb(value);
        }
        true
    }

    fn thumb_cmp_imm(&mut self, w: u32) -> bool {
        let n = self.low_reg(bits(w, 8, 10));
        let imm8 = bits(w, 0, 7);

        let rn = self.get_register(n);
        let imm = self.ir.imm32(imm8);
        let result = self.ir.sub_32(rn, imm);
        self.set_nzcv_from(result);
        true
    }

    fn thumb_add_sub_imm8(&mut self, w: u32, sub: bool) -> bool {
        let d = self.low_reg(bits(w, 8, 10));
        let imm8 = bits(w, 0, 7);

        let rd = self.get_register(d);
        let imm = self.ir.imm32(imm8);
        let result = if sub { self.ir.sub_32(rd, imm) } else { self.ir.add_32(rd, imm) };
        self.set_register(d, result);
        if self.sets_flags() {
            self.set_nzcv_from(result);
        }
        true
    }

    fn thumb_dp(&mut self, w: u32, op: u32) -> bool {
        let m = self.low_reg(bits(w, 3, 5));
        let d = self.low_reg(bits(w, 0, 2));

        let rd = self.get_register(d);
        let rm = self.get_register(m);
        let s = self.sets_flags();

        match op {
            0x0 => {
                let result = self.ir.and_32(rd, rm);
                self.set_register(d, result);
                if s {
                    self.set_nz_thumb(result);
                }
            }
            0x1 => {
                let result = self.ir.eor_32(rd, rm);
                self.set_register(d, result);
                if s {
                    self.set_nz_thumb(result);
                }
            }
            0x2 | 0x3 | 0x4 | 0x7 => {
                let amount = self.ir.least_significant_byte(rm);
                let carry_in = self.ir.a32_get_c_flag();
                let rc = match op {
                    0x2 => self.ir.logical_shift_left_with_carry_32(rd, amount, carry_in),
                    0x3 => self.ir.logical_shift_right_with_carry_32(rd, amount, carry_in),
                    0x4 => self.ir.arithmetic_shift_right_with_carry_32(rd, amount, carry_in),
                    0x7 => self.ir.rotate_right_with_carry_32(rd, amount, carry_in),
                    _ => unreachable!(),
                };
                self.set_register(d, rc.result);
                if s {
                    self.thumb_set_nzc(rc.result, rc.carry);
                }
            }
            0x5 => {
                let carry = self.ir.a32_get_c_flag();
                let result = self.ir.add_with_carry_32(rd, rm, carry);
                self.set_register(d, result);
                if s {
                    self.set_nzcv_from(result);
                }
            }
            0x6 => {
                let carry = self.ir.a32_get_c_flag();
                let result = self.ir.sub_with_carry_32(rd, rm, carry);
                self.set_register(d, result);
                if s {
                    self.set_nzcv_from(result);
                }
            }
            0x8 => {
                let result = self.ir.and_32(rd, rm);
                self.set_nz_thumb(result);
            }
            0x9 => {
                let zero = self.ir.imm32(0);
                let result = self.ir.sub_32(zero, rm);
                self.set_register(d, result);
                if s {
                    self.set_nzcv_from(result);
                }
            }
            0xA => {
                let result = self.ir.sub_32(rd, rm);
                self.set_nzcv_from(result);
            }
            0xB => {
                let result = self.ir.add_32(rd, rm);
                self.set_nzcv_from(result);
            }
            0xC => {
                let result = self.ir.or_32(rd, rm);
                self.set_register(d, result);
                if s {
                    self.set_nz_thumb(result);
                }
            }
            0xD => {
                let result = self.ir.mul_32(rd, rm);
                self.set_register(d, result);
                if s {
                    self.set_nz_thumb(result);
                }
            }
            0xE => {
                let inverted = self.ir.not_32(rm);
                let result = self.ir.and_32(rd, inverted);
                self.set_register(d, result);
                if s {
                    self.set_nz_thumb(result);
                }
            }
            0xF => {
                let result = self.ir.not_32(rm);
                self.set_register(d, result);
                if s {
                    self.set_nz_thumb(result);
                }
            }
            _ => unreachable!(),
        }
        true
    }

    fn thumb_add_hi(&mut self, w: u32) -> bool {
        let d = A32Reg::from_index(bits(w, 0, 2) | bits(w, 7, 7) << 3);
        let m = A32Reg::from_index(bits(w, 3, 6));

        let rd = self.get_register(d);
        let rm = self.get_register(m);
        let result = self.ir.add_32(rd, rm);
        if d == A32Reg::PC {
            self.alu_write_pc(result);
            self.ir.set_term(Terminal::ReturnToDispatch);
            return false;
        }
        self.set_register(d, result);
        true
    }

    fn thumb_cmp_hi(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 0, 2) | bits(w, 7, 7) << 3);
        let m = A32Reg::from_index(bits(w, 3, 6));
        if n == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let rn = self.get_register(n);
        let rm = self.get_register(m);
        let result = self.ir.sub_32(rn, rm);
        self.set_nzcv_from(result);
        true
    }

    fn thumb_mov_hi(&mut self, w: u32) -> bool {
        let d = A32Reg::from_index(bits(w, 0, 2) | bits(w, 7, 7) << 3);
        let m = A32Reg::from_index(bits(w, 3, 6));

        let rm = self.get_register(m);
        if d == A32Reg::PC {
            self.alu_write_pc(rm);
            if m == A32Reg::LR {
                self.ir.set_term(Terminal::PopRSBHint);
            } else {
                self.ir.set_term(Terminal::ReturnToDispatch);
            }
            return false;
        }
        self.set_register(d, rm);
        true
    }

    fn thumb_bx(&mut self, w: u32) -> bool {
        let m = A32Reg::from_index(bits(w, 3, 6));

        let target = self.get_register(m);
        self.ir.a32_bx_write_pc(target);
        if m == A32Reg::LR {
            self.ir.set_term(Terminal::PopRSBHint);
        } else {
            self.ir.set_term(Terminal::ReturnToDispatch);
        }
        false
    }

    fn thumb_blx_reg(&mut self, w: u32) -> bool {
        let m = A32Reg::from_index(bits(w, 3, 6));
        if m == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let return_location = self.next_location();
        self.push_rsb(return_location);
        let target = self.get_register(m);
        self.ir.a32_bx_write_pc(target);
        let lr = self.ir.imm32(self.current.pc().wrapping_add(2) | 1);
        self.set_register(A32Reg::LR, lr);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    fn thumb_ldr_literal(&mut self, w: u32) -> bool {
        let t = self.low_reg(bits(w, 8, 10));
        let imm8 = bits(w, 0, 7);

        let base = self.arm_pc() & !3;
        let address = self.ir.imm32(base.wrapping_add(imm8 * 4));
        let value = self.ir.a32_read_memory_32(address, AccType::Normal);
        self.set_register(t, value);
        true
    }

    fn thumb_load_store_reg(&mut self, w: u32, op: u32) -> bool {
        let m = self.low_reg(bits(w, 6, 8));
        let n = self.low_reg(bits(w, 3, 5));
        let t = self.low_reg(bits(w, 0, 2));

        let rn = self.get_register(n);
        let rm = self.get_register(m);
        let address = self.ir.add_32(rn, rm);

        match op {
            0 => {
                let value = self.get_register(t);
                self.ir.a32_write_memory_32(address, value, AccType::Normal);
            }
            1 => {
                let value = self.get_register(t);
                let value = self.ir.least_significant_half(value);
                self.ir.a32_write_memory_16(address, value, AccType::Normal);
            }
            2 => {
                let value = self.get_register(t);
                let value = self.ir.least_significant_byte(value);
                self.ir.a32_write_memory_8(address, value, AccType::Normal);
            }
            3 => {
                let raw = self.ir.a32_read_memory_8(address, AccType::Normal);
                let value = self.ir.sign_extend_byte_to_word(raw);
                self.set_register(t, value);
            }
            4 => {
                let value = self.ir.a32_read_memory_32(address, AccType::Normal);
                self.set_register(t, value);
            }
            5 => {
                let raw = self.ir.a32_read_memory_16(address, AccType::Normal);
                let value = self.ir.zero_extend_half_to_word(raw);
                self.set_register(t, value);
            }
            6 => {
                let raw = self.ir.a32_read_memory_8(address, AccType::Normal);
                let value = self.ir.zero_extend_byte_to_word(raw);
                self.set_register(t, value);
            }
            7 => {
                let raw = self.ir.a32_read_memory_16(address, AccType::Normal);
                let value = self.ir.sign_extend_half_to_word(raw);
                self.set_register(t, value);
            }
            _ => unreachable!(),
        }
        true
    }

    fn thumb_load_store_imm(&mut self, w: u32, load: bool, size: u32) -> bool {
        let imm5 = bits(w, 6, 10);
        let n = self.low_reg(bits(w, 3, 5));
        let t = self.low_reg(bits(w, 0, 2));

        let rn = self.get_register(n);
        let offset = self.ir.imm32(imm5 * size);
        let address = self.ir.add_32(rn, offset);

        match (load, size) {
            (false, 4) => {
                let value = self.get_register(t);
                self.ir.a32_write_memory_32(address, value, AccType::Normal);
            }
            (true, 4) => {
                let value = self.ir.a32_read_memory_32(address, AccType::Normal);
                self.set_register(t, value);
            }
            (false, 2) => {
                let value = self.get_register(t);
                let value = self.ir.least_significant_half(value);
                self.ir.a32_write_memory_16(address, value, AccType::Normal);
            }
            (true, 2) => {
                let raw = self.ir.a32_read_memory_16(address, AccType::Normal);
                let value = self.ir.zero_extend_half_to_word(raw);
                self.set_register(t, value);
            }
            (false, 1) => {
                let value = self.get_register(t);
                let value = self.ir.least_significant_byte(value);
                self.ir.a32_write_memory_8(address, value, AccType::Normal);
            }
            (true, 1) => {
                let raw = self.ir.a32_read_memory_8(address, AccType::Normal);
                let value = self.ir.zero_extend_byte_to_word(raw);
                self.set_register(t, value);
            }
            _ => unreachable!(),
        }
        true
    }

    fn thumb_load_store_sp(&mut self, w: u32, load: bool) -> bool {
        let t = self.low_reg(bits(w, 8, 10));
        let imm8 = bits(w, 0, 7);

        let sp = self.get_register(A32Reg::SP);
        let offset = self.ir.imm32(imm8 * 4);
        let address = self.ir.add_32(sp, offset);
        if load {
            let value = self.ir.a32_read_memory_32(address, AccType::Normal);
            self.set_register(t, value);
        } else {
            let value = self.get_register(t);
            self.ir.a32_write_memory_32(address, value, AccType::Normal);
        }
        true
    }

    fn thumb_adr(&mut self, w: u32) -> bool {
        let d = self.low_reg(bits(w, 8, 10));
        let imm8 = bits(w, 0, 7);

        let value = self.ir.imm32((self.arm_pc() & !3).wrapping_add(imm8 * 4));
        self.set_register(d, value);
        true
    }

    fn thumb_add_sp_imm(&mut self, w: u32) -> bool {
        let d = self.low_reg(bits(w, 8, 10));
        let imm8 = bits(w, 0, 7);

        let sp = self.get_register(A32Reg::SP);
        let result = self.ir.add_32(sp, self.ir.imm32(imm8 * 4));
        self.set_register(d, result);
        true
    }

    fn thumb_adjust_sp(&mut self, w: u32, sub: bool) -> bool {
        let imm7 = bits(w, 0, 6);

        let sp = self.get_register(A32Reg::SP);
        let imm = self.ir.imm32(imm7 * 4);
        let result = if sub { self.ir.sub_32(sp, imm) } else { self.ir.add_32(sp, imm) };
        self.set_register(A32Reg::SP, result);
        true
    }

    fn thumb_extend(&mut self, w: u32, signed: bool, half: bool) -> bool {
        let m = self.low_reg(bits(w, 3, 5));
        let d = self.low_reg(bits(w, 0, 2));

        let rm = self.get_register(m);
        let result = match (signed, half) {
            (true, true) => {
                let v = self.ir.least_significant_half(rm);
                self.ir.sign_extend_half_to_word(v)
            }
            (true, false) => {
                let v = self.ir.least_significant_byte(rm);
                self.ir.sign_extend_byte_to_word(v)
            }
            (false, true) => {
                let v = self.ir.least_significant_half(rm);
                self.ir.zero_extend_half_to_word(v)
            }
            (false, false) => {
                let v = self.ir.least_significant_byte(rm);
                self.ir.zero_extend_byte_to_word(v)
            }
        };
        self.set_register(d, result);
        true
    }

    fn thumb_cbz(&mut self, w: u32) -> bool {
        let nonzero = bit(w, 11);
        let imm = bits(w, 9, 9) << 6 | bits(w, 3, 7) << 1;
        let n = self.low_reg(bits(w, 0, 2));

        if self.current.it_state().is_in_it_block() {
            return self.unpredictable_instruction();
        }

        let rn = self.get_register(n);
        let is_zero = self.ir.is_zero_32(rn);
        self.ir.set_check_bit(is_zero);

        let target = self.branch_target(self.arm_pc().wrapping_add(imm));
        let next = self.next_location();
        let (then_, else_) = if nonzero {
            // CBNZ: branch when the check bit (zero-ness) is clear.
            (
                Terminal::LinkBlock { next: next.into() },
                Terminal::LinkBlock { next: target.into() },
            )
        } else {
            (
                Terminal::LinkBlock { next: target.into() },
                Terminal::LinkBlock { next: next.into() },
            )
        };
        self.ir.set_term(Terminal::check_bit(then_, else_));
        false
    }

    fn thumb_push(&mut self, w: u32) -> bool {
        let m = bit(w, 8);
        let mut list = bits(w, 0, 7);
        if m {
            list |= 1 << 14;
        }
        if list == 0 {
            return self.unpredictable_instruction();
        }

        let count = list.count_ones();
        let sp = self.get_register(A32Reg::SP);
        let new_sp = self.ir.sub_32(sp, self.ir.imm32(4 * count));

        let mut address = new_sp;
        for i in 0..16 {
            if list >> i & 1 == 0 {
                continue;
            }
            let value = self.get_register(A32Reg::from_index(i));
            self.ir.a32_write_memory_32(address, value, AccType::Normal);
            address = self.ir.add_32(address, self.ir.imm32(4));
        }
        self.set_register(A32Reg::SP, new_sp);
        true
    }

    fn thumb_pop(&mut self, w: u32) -> bool {
        let p = bit(w, 8);
        let mut list = bits(w, 0, 7);
        if p {
            list |= 1 << 15;
        }
        if list == 0 {
            return self.unpredictable_instruction();
        }

        let count = list.count_ones();
        let sp = self.get_register(A32Reg::SP);

        let mut address = sp;
        let mut pc_value = None;
        for i in 0..16 {
            if list >> i & 1 == 0 {
                continue;
            }
            let value = self.ir.a32_read_memory_32(address, AccType::Normal);
            let reg = A32Reg::from_index(i);
            if reg == A32Reg::PC {
                pc_value = Some(value);
            } else {
                self.set_register(reg, value);
            }
            address = self.ir.add_32(address, self.ir.imm32(4));
        }

        let new_sp = self.ir.add_32(sp, self.ir.imm32(4 * count));
        self.set_register(A32Reg::SP, new_sp);

        if let Some(value) = pc_value {
            self.load_write_pc(value);
            self.ir.set_term(Terminal::PopRSBHint);
            return false;
        }
        true
    }

    fn thumb_rev(&mut self, w: u32) -> bool {
        let m = self.low_reg(bits(w, 3, 5));
        let d = self.low_reg(bits(w, 0, 2));

        let rm = self.get_register(m);
        let result = self.ir.byte_reverse_word(rm);
        self.set_register(d, result);
        true
    }

    fn thumb_rev16(&mut self, w: u32) -> bool {
        let m = self.low_reg(bits(w, 3, 5));
        let d = self.low_reg(bits(w, 0, 2));

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

    fn thumb_hint(&mut self, w: u32) -> bool {
        let op = bits(w, 4, 7);
        if !self.options.hook_hint_instructions {
            return true;
        }
        match op {
            1 => self.raise_exception(Exception::Yield),
            2 => self.raise_exception(Exception::WaitForEvent),
            3 => self.raise_exception(Exception::WaitForInterrupt),
            4 => self.raise_exception(Exception::SendEvent),
            _ => true,
        }
    }

    fn thumb_it(&mut self, w: u32) -> bool {
        let it_state = ItState::new(bits(w, 0, 7) as u8);
        if !it_state.is_in_it_block() {
            // Decode tables route mask == 0 to the hint space first.
            return self.unpredictable_instruction();
        }
        if it_state.cond() == Cond::AL && it_state.mask() & 0b0111 != 0 {
            // AL with an else is unpredictable.
            return self.unpredictable_instruction();
        }
        if self.current.it_state().is_in_it_block() {
            return self.unpredictable_instruction();
        }

        self.current = self.current.set_it_state(it_state);
        true
    }

    fn thumb_stmia(&mut self, w: u32) -> bool {
        let n = self.low_reg(bits(w, 8, 10));
        let list = bits(w, 0, 7);
        if list == 0 {
            return self.unpredictable_instruction();
        }

        let count = list.count_ones();
        let base = self.get_register(n);
        let mut address = base;
        for i in 0..8 {
            if list >> i & 1 == 0 {
                continue;
            }
            let value = self.get_register(A32Reg::from_index(i));
            self.ir.a32_write_memory_32(address, value, AccType::Normal);
            address = self.ir.add_32(address, self.ir.imm32(4));
        }
        let new_base = self.ir.add_32(base, self.ir.imm32(4 * count));
        self.set_register(n, new_base);
        true
    }

    fn thumb_ldmia(&mut self, w: u32) -> bool {
        let n = self.low_reg(bits(w, 8, 10));
        let list = bits(w, 0, 7);
        if list == 0 {
            return self.unpredictable_instruction();
        }

        let count = list.count_ones();
        let base = self.get_register(n);
        let mut address = base;
        for i in 0..8 {
            if list >> i & 1 == 0 {
                continue;
            }
            let value = self.ir.a32_read_memory_32(address, AccType::Normal);
            self.set_register(A32Reg::from_index(i), value);
            address = self.ir.add_32(address, self.ir.imm32(4));
        }
        // Writeback only when the base is not loaded.
        if list >> n.index() & 1 == 0 {
            let new_base = self.ir.add_32(base, self.ir.imm32(4 * count));
            self.set_register(n, new_base);
        }
        true
    }

    fn thumb_svc(&mut self, w: u32) -> bool {
        let imm8 = bits(w, 0, 7);

        let svc = self.ir.imm32(imm8);
        self.ir.a32_call_supervisor(svc);
        let next = self.next_location();
        self.ir.set_term(Terminal::check_halt(Terminal::LinkBlock { next: next.into() }));
        false
    }

    fn thumb_b_cond(&mut self, w: u32) -> bool {
        let cond = Cond::from_bits(bits(w, 8, 11));
        let imm8 = bits(w, 0, 7);

        if self.current.it_state().is_in_it_block() {
            return self.unpredictable_instruction();
        }
        debug_assert!(cond != Cond::AL && cond != Cond::NV);

        let offset = sign_extend(imm8 << 1, 9);
        let target = self.branch_target(self.arm_pc().wrapping_add(offset));
        let next = self.next_location();
        self.ir.set_term(Terminal::if_(
            cond,
            Terminal::LinkBlock { next: target.into() },
            Terminal::LinkBlock { next: next.into() },
        ));
        false
    }

    fn thumb_b(&mut self, w: u32) -> bool {
        let imm11 = bits(w, 0, 10);
        let offset = sign_extend(imm11 << 1, 12);

        let target = self.branch_target(self.arm_pc().wrapping_add(offset));
        self.ir.set_term(Terminal::LinkBlock { next: target.into() });
        false
    }

    fn thumb32_bl(&mut self, w: u32) -> bool {
        // BL: S:I1:I2:imm10:imm11:0 where I1 = NOT(J1 EOR S), I2 likewise.
        let s = bit(w, 26);
        let imm10 = bits(w, 16, 25);
        let j1 = bit(w, 13);
        let j2 = bit(w, 11);
        let imm11 = bits(w, 0, 10);

        let i1 = !(j1 ^ s);
        let i2 = !(j2 ^ s);
        let raw = u32::from(s) << 24
            | u32::from(i1) << 23
            | u32::from(i2) << 22
            | imm10 << 12
            | imm11 << 1;
        let offset = sign_extend(raw, 25);

        let return_location = self.next_location();
        self.push_rsb(return_location);
        let lr = self.ir.imm32(self.current.pc().wrapping_add(4) | 1);
        self.set_register(A32Reg::LR, lr);

        let target = self.branch_target(self.arm_pc().wrapping_add(offset));
        self.ir.set_term(Terminal::LinkBlock { next: target.into() });
        false
    }
}
