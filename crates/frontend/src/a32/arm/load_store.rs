//! ARM load/store instructions.

use armjit_ir::{A32Reg, AccType, Terminal, Value};

use crate::a32::translate::A32Translator;
use crate::bit_util::{bit, bits};

impl A32Translator {
    /// Compute the operand address and perform any writeback for the
    /// P/U/W addressing forms. Returns the address to access.
    fn emit_addressing(
        &mut self,
        n: A32Reg,
        offset: Value,
        p: bool,
        u: bool,
        w: bool,
    ) -> Value {
        let base = self.get_register(n);
        let offset_address = if u {
            self.ir.add_32(base, offset)
        } else {
            self.ir.sub_32(base, offset)
        };
        let address = if p { offset_address } else { base };

        if !p || w {
            debug_assert!(n != A32Reg::PC);
            self.set_register(n, offset_address);
        }

        address
    }

    pub(super) fn arm_load_store_imm(&mut self, w: u32) -> bool {
        let p = bit(w, 24);
        let u = bit(w, 23);
        let byte = bit(w, 22);
        let writeback = bit(w, 21);
        let load = bit(w, 20);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        let imm12 = bits(w, 0, 11);

        if !p && writeback {
            // LDRT/STRT: unprivileged forms are the same access here.
        }
        if (!p || writeback) && (n == t || n == A32Reg::PC) {
            return self.unpredictable_instruction();
        }

        let offset = self.ir.imm32(imm12);
        let address = self.emit_addressing(n, offset, p, u, !p || writeback);
        self.load_store_word_byte(load, byte, t, address)
    }

    pub(super) fn arm_load_store_reg(&mut self, w: u32) -> bool {
        let p = bit(w, 24);
        let u = bit(w, 23);
        let byte = bit(w, 22);
        let writeback = bit(w, 21);
        let load = bit(w, 20);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        let imm5 = bits(w, 7, 11);
        let shift_type = bits(w, 5, 6);
        let m = A32Reg::from_index(bits(w, 0, 3));

        if m == A32Reg::PC || ((!p || writeback) && (n == t || n == A32Reg::PC)) {
            return self.unpredictable_instruction();
        }

        let offset = self.emit_shift_for_address(m, shift_type, imm5);
        let address = self.emit_addressing(n, offset, p, u, !p || writeback);
        self.load_store_word_byte(load, byte, t, address)
    }

    /// Immediate shifts for addressing; no carry is needed.
    fn emit_shift_for_address(&mut self, m: A32Reg, shift_type: u32, imm5: u32) -> Value {
        let value = self.get_register(m);
        let f = self.ir.imm1(false);
        match (shift_type, imm5) {
            (0b00, 0) => value,
            (0b00, amount) => self.ir.logical_shift_left_32(value, self.ir.imm8(amount as u8), f),
            (0b01, amount) => {
                let amount = if amount == 0 { 32 } else { amount };
                self.ir.logical_shift_right_32(value, self.ir.imm8(amount as u8), f)
            }
            (0b10, amount) => {
                let amount = if amount == 0 { 32 } else { amount };
                self.ir.arithmetic_shift_right_32(value, self.ir.imm8(amount as u8), f)
            }
            (0b11, 0) => {
                let carry = self.ir.a32_get_c_flag();
                self.ir.rotate_right_extended(value, carry).result
            }
            (0b11, amount) => self.ir.rotate_right_32(value, self.ir.imm8(amount as u8), f),
            _ => unreachable!(),
        }
    }

    fn load_store_word_byte(&mut self, load: bool, byte: bool, t: A32Reg, address: Value) -> bool {
        match (load, byte) {
            (true, false) => {
                let value = self.ir.a32_read_memory_32(address, AccType::Normal);
                if t == A32Reg::PC {
                    self.load_write_pc(value);
                    self.ir.set_term(Terminal::ReturnToDispatch);
                    return false;
                }
                self.set_register(t, value);
            }
            (true, true) => {
                if t == A32Reg::PC {
                    return self.unpredictable_instruction();
                }
                let value = self.ir.a32_read_memory_8(address, AccType::Normal);
                let value = self.ir.zero_extend_byte_to_word(value);
                self.set_register(t, value);
            }
            (false, false) => {
                let value = self.get_register(t);
                self.ir.a32_write_memory_32(address, value, AccType::Normal);
            }
            (false, true) => {
                if t == A32Reg::PC {
                    return self.unpredictable_instruction();
                }
                let value = self.get_register(t);
                let value = self.ir.least_significant_byte(value);
                self.ir.a32_write_memory_8(address, value, AccType::Normal);
            }
        }
        true
    }

    pub(super) fn arm_load_store_half_imm(&mut self, w: u32) -> bool {
        let p = bit(w, 24);
        let u = bit(w, 23);
        let writeback = bit(w, 21);
        let load = bit(w, 20);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        let imm8 = bits(w, 8, 11) << 4 | bits(w, 0, 3);

        if t == A32Reg::PC || ((!p || writeback) && (n == t || n == A32Reg::PC)) {
            return self.unpredictable_instruction();
        }

        let offset = self.ir.imm32(imm8);
        let address = self.emit_addressing(n, offset, p, u, !p || writeback);
        self.load_store_half(load, t, address)
    }

    pub(super) fn arm_load_store_half_reg(&mut self, w: u32) -> bool {
        let p = bit(w, 24);
        let u = bit(w, 23);
        let writeback = bit(w, 21);
        let load = bit(w, 20);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        let m = A32Reg::from_index(bits(w, 0, 3));

        if t == A32Reg::PC || m == A32Reg::PC || ((!p || writeback) && (n == t || n == A32Reg::PC))
        {
            return self.unpredictable_instruction();
        }

        let offset = self.get_register(m);
        let address = self.emit_addressing(n, offset, p, u, !p || writeback);
        self.load_store_half(load, t, address)
    }

    fn load_store_half(&mut self, load: bool, t: A32Reg, address: Value) -> bool {
        if load {
            let value = self.ir.a32_read_memory_16(address, AccType::Normal);
            let value = self.ir.zero_extend_half_to_word(value);
            self.set_register(t, value);
        } else {
            let value = self.get_register(t);
            let value = self.ir.least_significant_half(value);
            self.ir.a32_write_memory_16(address, value, AccType::Normal);
        }
        true
    }

    pub(super) fn arm_ldrsb_imm(&mut self, w: u32) -> bool {
        self.load_signed_imm(w, true)
    }

    pub(super) fn arm_ldrsh_imm(&mut self, w: u32) -> bool {
        self.load_signed_imm(w, false)
    }

    fn load_signed_imm(&mut self, w: u32, byte: bool) -> bool {
        let p = bit(w, 24);
        let u = bit(w, 23);
        let writeback = bit(w, 21);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        let imm8 = bits(w, 8, 11) << 4 | bits(w, 0, 3);

        if t == A32Reg::PC || ((!p || writeback) && (n == t || n == A32Reg::PC)) {
            return self.unpredictable_instruction();
        }

        let offset = self.ir.imm32(imm8);
        let address = self.emit_addressing(n, offset, p, u, !p || writeback);
        self.load_signed(byte, t, address)
    }

    pub(super) fn arm_ldrsb_reg(&mut self, w: u32) -> bool {
        self.load_signed_reg(w, true)
    }

    pub(super) fn arm_ldrsh_reg(&mut self, w: u32) -> bool {
        self.load_signed_reg(w, false)
    }

    fn load_signed_reg(&mut self, w: u32, byte: bool) -> bool {
        let p = bit(w, 24);
        let u = bit(w, 23);
        let writeback = bit(w, 21);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        let m = A32Reg::from_index(bits(w, 0, 3));

        if t == A32Reg::PC || m == A32Reg::PC || ((!p || writeback) && (n == t || n == A32Reg::PC))
        {
            return self.unpredictable_instruction();
        }

        let offset = self.get_register(m);
        let address = self.emit_addressing(n, offset, p, u, !p || writeback);
        self.load_signed(byte, t, address)
    }

    fn load_signed(&mut self, byte: bool, t: A32Reg, address: Value) -> bool {
        let value = if byte {
            let raw = self.ir.a32_read_memory_8(address, AccType::Normal);
            self.ir.sign_extend_byte_to_word(raw)
        } else {
            let raw = self.ir.a32_read_memory_16(address, AccType::Normal);
            self.ir.sign_extend_half_to_word(raw)
        };
        self.set_register(t, value);
        true
    }

    pub(super) fn arm_ldm(&mut self, w: u32) -> bool {
        let p = bit(w, 24);
        let u = bit(w, 23);
        let s = bit(w, 22);
        let writeback = bit(w, 21);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let list = bits(w, 0, 15);

        if s {
            // User-register and exception-return forms need banked state.
            return self.undefined_instruction();
        }
        if n == A32Reg::PC || list == 0 {
            return self.unpredictable_instruction();
        }

        let count = list.count_ones();
        let base = self.get_register(n);
        // Lowest register goes with the lowest address regardless of
        // direction.
        let start = if u {
            if p {
                self.ir.add_32(base, self.ir.imm32(4))
            } else {
                base
            }
        } else if p {
            self.ir.sub_32(base, self.ir.imm32(4 * count))
        } else {
            let offset = self.ir.imm32(4 * count);
            let low = self.ir.sub_32(base, offset);
            self.ir.add_32(low, self.ir.imm32(4))
        };

        let mut address = start;
        let mut loads_pc = false;
        for i in 0..16 {
            if list >> i & 1 == 0 {
                continue;
            }
            let value = self.ir.a32_read_memory_32(address, AccType::Normal);
            let reg = A32Reg::from_index(i);
            if reg == A32Reg::PC {
                loads_pc = true;
                self.load_write_pc(value);
            } else if writeback && reg == n {
                // Loading the base with writeback is unpredictable; take the
                // loaded value.
                self.set_register(reg, value);
            } else {
                self.set_register(reg, value);
            }
            address = self.ir.add_32(address, self.ir.imm32(4));
        }

        if writeback && list >> n.index() & 1 == 0 {
            let amount = self.ir.imm32(4 * count);
            let new_base =
                if u { self.ir.add_32(base, amount) } else { self.ir.sub_32(base, amount) };
            self.set_register(n, new_base);
        }

        if loads_pc {
            // Popping into the PC is overwhelmingly a return.
            self.ir.set_term(Terminal::PopRSBHint);
            return false;
        }
        true
    }

    pub(super) fn arm_stm(&mut self, w: u32) -> bool {
        let p = bit(w, 24);
        let u = bit(w, 23);
        let s = bit(w, 22);
        let writeback = bit(w, 21);
        let n = A32Reg::from_index(bits(w, 16, 19));
        let list = bits(w, 0, 15);

        if s {
            return self.undefined_instruction();
        }
        if n == A32Reg::PC || list == 0 {
            return self.unpredictable_instruction();
        }

        let count = list.count_ones();
        let base = self.get_register(n);
        let start = if u {
            if p {
                self.ir.add_32(base, self.ir.imm32(4))
            } else {
                base
            }
        } else if p {
            self.ir.sub_32(base, self.ir.imm32(4 * count))
        } else {
            let offset = self.ir.imm32(4 * count);
            let low = self.ir.sub_32(base, offset);
            self.ir.add_32(low, self.ir.imm32(4))
        };

        let mut address = start;
        for i in 0..16 {
            if list >> i & 1 == 0 {
                continue;
            }
            let value = self.get_register(A32Reg::from_index(i));
            self.ir.a32_write_memory_32(address, value, AccType::Normal);
            address = self.ir.add_32(address, self.ir.imm32(4));
        }

        if writeback {
            let amount = self.ir.imm32(4 * count);
            let new_base =
                if u { self.ir.add_32(base, amount) } else { self.ir.sub_32(base, amount) };
            self.set_register(n, new_base);
        }
        true
    }
}
