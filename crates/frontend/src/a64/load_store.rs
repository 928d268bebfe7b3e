//! A64 loads and stores.

use armjit_ir::{AccType, A64Vec, Value};

use super::translate::A64Translator;
use crate::bit_util::{bit, bits, sign_extend_64};

impl A64Translator {
    fn read_sized(&mut self, address: Value, size: u32, acc: AccType) -> Value {
        match size {
            0 => self.ir.a64_read_memory_8(address, acc),
            1 => self.ir.a64_read_memory_16(address, acc),
            2 => self.ir.a64_read_memory_32(address, acc),
            3 => self.ir.a64_read_memory_64(address, acc),
            _ => unreachable!(),
        }
    }

    /// Store `value` (a W value for sizes below 3, X for size 3).
    fn write_sized(&mut self, address: Value, value: Value, size: u32, acc: AccType) {
        match size {
            0 => {
                let byte = self.ir.least_significant_byte(value);
                self.ir.a64_write_memory_8(address, byte, acc);
            }
            1 => {
                let half = self.ir.least_significant_half(value);
                self.ir.a64_write_memory_16(address, half, acc);
            }
            2 => self.ir.a64_write_memory_32(address, value, acc),
            3 => self.ir.a64_write_memory_64(address, value, acc),
            _ => unreachable!(),
        }
    }

    /// Zero-extend a loaded value into the W/X destination.
    fn extend_load(&mut self, raw: Value, size: u32, opc: u32, t: u32) {
        match (size, opc) {
            // Plain loads zero extend into W (X for size 3).
            (0, 0b01) => {
                let value = self.ir.zero_extend_byte_to_word(raw);
                self.set_w(t, value);
            }
            (1, 0b01) => {
                let value = self.ir.zero_extend_half_to_word(raw);
                self.set_w(t, value);
            }
            (2, 0b01) => self.set_w(t, raw),
            (3, 0b01) => self.set_x(t, raw),
            // Sign-extending loads: opc 10 targets X, opc 11 targets W.
            (0, 0b10) => {
                let value = self.ir.sign_extend_byte_to_long(raw);
                self.set_x(t, value);
            }
            (0, 0b11) => {
                let value = self.ir.sign_extend_byte_to_word(raw);
                self.set_w(t, value);
            }
            (1, 0b10) => {
                let value = self.ir.sign_extend_half_to_long(raw);
                self.set_x(t, value);
            }
            (1, 0b11) => {
                let value = self.ir.sign_extend_half_to_word(raw);
                self.set_w(t, value);
            }
            (2, 0b10) => {
                let value = self.ir.sign_extend_word_to_long(raw);
                self.set_x(t, value);
            }
            _ => unreachable!(),
        }
    }

    fn store_source(&mut self, size: u32, t: u32) -> Value {
        if size == 3 {
            self.get_x(t)
        } else {
            self.get_w(t)
        }
    }

    pub(super) fn a64_load_store_imm_unsigned(&mut self, w: u32) -> bool {
        let size = bits(w, 30, 31);
        let opc = bits(w, 22, 23);
        let imm12 = bits(w, 10, 21);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        if opc == 0b11 && size >= 2 {
            return self.undefined_instruction();
        }
        if opc == 0b10 && size == 3 {
            // PRFM: treat as a NOP.
            return true;
        }

        let base = self.get_x_or_sp(n);
        let offset = self.ir.imm64(u64::from(imm12) << size);
        let address = self.ir.add_64(base, offset);

        if opc == 0b00 {
            let value = self.store_source(size, t);
            self.write_sized(address, value, size, AccType::Normal);
        } else {
            let raw = self.read_sized(address, size, AccType::Normal);
            self.extend_load(raw, size, opc, t);
        }
        true
    }

    pub(super) fn a64_load_store_unscaled(&mut self, w: u32) -> bool {
        let size = bits(w, 30, 31);
        let opc = bits(w, 22, 23);
        let imm9 = bits(w, 12, 20);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        if opc == 0b11 && size >= 2 {
            return self.undefined_instruction();
        }
        if opc == 0b10 && size == 3 {
            return true; // PRFUM
        }

        let base = self.get_x_or_sp(n);
        let offset = self.ir.imm64(sign_extend_64(u64::from(imm9), 9));
        let address = self.ir.add_64(base, offset);

        if opc == 0b00 {
            let value = self.store_source(size, t);
            self.write_sized(address, value, size, AccType::Normal);
        } else {
            let raw = self.read_sized(address, size, AccType::Normal);
            self.extend_load(raw, size, opc, t);
        }
        true
    }

    pub(super) fn a64_load_store_imm_indexed(&mut self, w: u32, pre: bool) -> bool {
        let size = bits(w, 30, 31);
        let opc = bits(w, 22, 23);
        let imm9 = bits(w, 12, 20);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        if opc == 0b11 && size >= 2 {
            return self.undefined_instruction();
        }
        if opc != 0b00 && n == t && n != 31 {
            return self.unpredictable_instruction();
        }

        let base = self.get_x_or_sp(n);
        let offset = self.ir.imm64(sign_extend_64(u64::from(imm9), 9));
        let new_base = self.ir.add_64(base, offset);
        let address = if pre { new_base } else { base };

        if opc == 0b00 {
            let value = self.store_source(size, t);
            self.write_sized(address, value, size, AccType::Normal);
        } else {
            let raw = self.read_sized(address, size, AccType::Normal);
            self.extend_load(raw, size, opc, t);
        }
        self.set_x_or_sp(n, new_base);
        true
    }

    pub(super) fn a64_load_store_reg_offset(&mut self, w: u32) -> bool {
        let size = bits(w, 30, 31);
        let opc = bits(w, 22, 23);
        let m = bits(w, 16, 20);
        let option = bits(w, 13, 15);
        let scale = bit(w, 12);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        if opc == 0b11 && size >= 2 {
            return self.undefined_instruction();
        }
        if option & 0b010 == 0 {
            // Sub-word options are reserved.
            return self.undefined_instruction();
        }

        let base = self.get_x_or_sp(n);
        let index = match option {
            0b010 => {
                let wm = self.get_w(m);
                self.ir.zero_extend_word_to_long(wm)
            }
            0b011 => self.get_x(m),
            0b110 => {
                let wm = self.get_w(m);
                self.ir.sign_extend_word_to_long(wm)
            }
            0b111 => self.get_x(m),
            _ => return self.undefined_instruction(),
        };
        let shift = if scale { size as u8 } else { 0 };
        let scaled = if shift == 0 {
            index
        } else {
            self.ir.logical_shift_left_64(index, self.ir.imm8(shift))
        };
        let address = self.ir.add_64(base, scaled);

        if opc == 0b00 {
            let value = self.store_source(size, t);
            self.write_sized(address, value, size, AccType::Normal);
        } else {
            let raw = self.read_sized(address, size, AccType::Normal);
            self.extend_load(raw, size, opc, t);
        }
        true
    }

    pub(super) fn a64_ldr_literal(&mut self, w: u32) -> bool {
        let opc = bits(w, 30, 31);
        let imm19 = bits(w, 5, 23);
        let t = bits(w, 0, 4);
        let offset = sign_extend_64(u64::from(imm19) << 2, 21);

        let address = self.ir.imm64(self.pc().wrapping_add(offset));
        match opc {
            0b00 => {
                let value = self.ir.a64_read_memory_32(address, AccType::Normal);
                self.set_w(t, value);
            }
            0b01 => {
                let value = self.ir.a64_read_memory_64(address, AccType::Normal);
                self.set_x(t, value);
            }
            0b10 => {
                let raw = self.ir.a64_read_memory_32(address, AccType::Normal);
                let value = self.ir.sign_extend_word_to_long(raw);
                self.set_x(t, value);
            }
            _ => return self.undefined_instruction(),
        }
        true
    }

    pub(super) fn a64_load_store_pair(&mut self, w: u32) -> bool {
        let opc = bits(w, 30, 31);
        let index = bits(w, 23, 24);
        let load = bit(w, 22);
        let imm7 = bits(w, 15, 21);
        let t2 = bits(w, 10, 14);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        let sf = match opc {
            0b00 => false,
            0b10 => true,
            _ => return self.interpret_fallback(), // LDPSW / SIMD pairs
        };
        let (pre, writeback) = match index {
            0b01 => (false, true),
            0b10 => (false, false),
            0b11 => (true, true),
            _ => return self.undefined_instruction(),
        };
        if load && t == t2 {
            return self.unpredictable_instruction();
        }
        if writeback && !load && (n == t || n == t2) && n != 31 {
            return self.unpredictable_instruction();
        }

        let scale = if sf { 3 } else { 2 };
        let offset = sign_extend_64(u64::from(imm7), 7) << scale;

        let base = self.get_x_or_sp(n);
        let new_base = self.ir.add_64(base, self.ir.imm64(offset));
        // Post-index accesses the original base; the other forms apply the
        // offset up front.
        let address0 = if pre || !writeback { new_base } else { base };
        let size: u64 = if sf { 8 } else { 4 };
        let address1 = self.ir.add_64(address0, self.ir.imm64(size));

        if load {
            let size_code = if sf { 3 } else { 2 };
            let raw0 = self.read_sized(address0, size_code, AccType::Normal);
            let raw1 = self.read_sized(address1, size_code, AccType::Normal);
            if sf {
                self.set_x(t, raw0);
                self.set_x(t2, raw1);
            } else {
                self.set_w(t, raw0);
                self.set_w(t2, raw1);
            }
        } else {
            let v0 = self.store_source(if sf { 3 } else { 2 }, t);
            let v1 = self.store_source(if sf { 3 } else { 2 }, t2);
            let size_code = if sf { 3 } else { 2 };
            self.write_sized(address0, v0, size_code, AccType::Normal);
            self.write_sized(address1, v1, size_code, AccType::Normal);
        }

        if writeback {
            self.set_x_or_sp(n, new_base);
        }
        true
    }

    pub(super) fn a64_load_store_fp_imm_unsigned(&mut self, w: u32) -> bool {
        let size = bits(w, 30, 31);
        let opc = bits(w, 22, 23);
        let imm12 = bits(w, 10, 21);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);
        let vec = A64Vec(t as u8);

        // Access size: B/H/S/D from `size`, Q selected by opc<1>.
        let quad = opc & 0b10 != 0;
        let load = opc & 0b01 != 0;
        if quad && size != 0 {
            return self.undefined_instruction();
        }

        let scale = if quad { 4 } else { size };
        let base = self.get_x_or_sp(n);
        let offset = self.ir.imm64(u64::from(imm12) << scale);
        let address = self.ir.add_64(base, offset);

        match (quad, size) {
            (true, _) => {
                if load {
                    let value = self.ir.a64_read_memory_128(address, AccType::Normal);
                    self.ir.a64_set_q(vec, value);
                } else {
                    let value = self.ir.a64_get_q(vec);
                    self.ir.a64_write_memory_128(address, value, AccType::Normal);
                }
            }
            (false, 2) => {
                if load {
                    let value = self.ir.a64_read_memory_32(address, AccType::Normal);
                    self.ir.a64_set_s(vec, value);
                } else {
                    let value = self.ir.a64_get_s(vec);
                    self.ir.a64_write_memory_32(address, value, AccType::Normal);
                }
            }
            (false, 3) => {
                if load {
                    let value = self.ir.a64_read_memory_64(address, AccType::Normal);
                    self.ir.a64_set_d(vec, value);
                } else {
                    let value = self.ir.a64_get_d(vec);
                    self.ir.a64_write_memory_64(address, value, AccType::Normal);
                }
            }
            _ => return self.interpret_fallback(), // B/H element accesses
        }
        true
    }

    pub(super) fn a64_ldxr(&mut self, w: u32, acquire: bool) -> bool {
        let size = bits(w, 30, 31);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        let acc = if acquire { AccType::Ordered } else { AccType::Atomic };
        let address = self.get_x_or_sp(n);
        let raw = match size {
            0 => self.ir.a64_exclusive_read_memory_8(address, acc),
            1 => self.ir.a64_exclusive_read_memory_16(address, acc),
            2 => self.ir.a64_exclusive_read_memory_32(address, acc),
            3 => self.ir.a64_exclusive_read_memory_64(address, acc),
            _ => unreachable!(),
        };
        match size {
            0 => {
                let value = self.ir.zero_extend_byte_to_word(raw);
                self.set_w(t, value);
            }
            1 => {
                let value = self.ir.zero_extend_half_to_word(raw);
                self.set_w(t, value);
            }
            2 => self.set_w(t, raw),
            3 => self.set_x(t, raw),
            _ => unreachable!(),
        }
        true
    }

    pub(super) fn a64_stxr(&mut self, w: u32, release: bool) -> bool {
        let size = bits(w, 30, 31);
        let s = bits(w, 16, 20);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        if s == t || (s == n && n != 31) {
            return self.unpredictable_instruction();
        }

        if release {
            // Release semantics order prior accesses before the store.
            self.ir.a64_dmb();
        }
        let address = self.get_x_or_sp(n);
        let status = match size {
            0 => {
                let v = self.get_w(t);
                let v = self.ir.least_significant_byte(v);
                self.ir.a64_exclusive_write_memory_8(address, v)
            }
            1 => {
                let v = self.get_w(t);
                let v = self.ir.least_significant_half(v);
                self.ir.a64_exclusive_write_memory_16(address, v)
            }
            2 => {
                let v = self.get_w(t);
                self.ir.a64_exclusive_write_memory_32(address, v)
            }
            3 => {
                let v = self.get_x(t);
                self.ir.a64_exclusive_write_memory_64(address, v)
            }
            _ => unreachable!(),
        };
        self.set_w(s, status);
        true
    }

    pub(super) fn a64_ldar(&mut self, w: u32) -> bool {
        let size = bits(w, 30, 31);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        let address = self.get_x_or_sp(n);
        let raw = self.read_sized(address, size, AccType::Ordered);
        self.extend_load(raw, size, 0b01, t);
        true
    }

    pub(super) fn a64_stlr(&mut self, w: u32) -> bool {
        let size = bits(w, 30, 31);
        let n = bits(w, 5, 9);
        let t = bits(w, 0, 4);

        let address = self.get_x_or_sp(n);
        let value = self.store_source(size, t);
        self.write_sized(address, value, size, AccType::Ordered);
        true
    }
}
