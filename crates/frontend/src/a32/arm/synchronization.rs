//! Load/store exclusive.

use armjit_ir::{A32Reg, AccType};

use crate::a32::translate::A32Translator;
use crate::bit_util::bits;

impl A32Translator {
    pub(super) fn arm_ldrex(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        if t == A32Reg::PC || n == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let address = self.get_register(n);
        let value = self.ir.a32_exclusive_read_memory_32(address, AccType::Atomic);
        self.set_register(t, value);
        true
    }

    pub(super) fn arm_ldrexb(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        if t == A32Reg::PC || n == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let address = self.get_register(n);
        let value = self.ir.a32_exclusive_read_memory_8(address, AccType::Atomic);
        let value = self.ir.zero_extend_byte_to_word(value);
        self.set_register(t, value);
        true
    }

    pub(super) fn arm_ldrexh(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        if t == A32Reg::PC || n == A32Reg::PC {
            return self.unpredictable_instruction();
        }

        let address = self.get_register(n);
        let value = self.ir.a32_exclusive_read_memory_16(address, AccType::Atomic);
        let value = self.ir.zero_extend_half_to_word(value);
        self.set_register(t, value);
        true
    }

    pub(super) fn arm_ldrexd(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let t = A32Reg::from_index(bits(w, 12, 15));
        // Rt must be even and not R14.
        if t == A32Reg::PC || n == A32Reg::PC || t.index() % 2 != 0 || t == A32Reg::LR {
            return self.unpredictable_instruction();
        }
        let t2 = A32Reg::from_index(t.index() as u32 + 1);

        let address = self.get_register(n);
        let value = self.ir.a32_exclusive_read_memory_64(address, AccType::Atomic);
        let lo = self.ir.least_significant_word(value);
        let hi = self.ir.most_significant_word(value);
        self.set_register(t, lo);
        self.set_register(t2, hi);
        true
    }

    pub(super) fn arm_strex(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = A32Reg::from_index(bits(w, 12, 15));
        let t = A32Reg::from_index(bits(w, 0, 3));
        if d == A32Reg::PC || t == A32Reg::PC || n == A32Reg::PC || d == n || d == t {
            return self.unpredictable_instruction();
        }

        let address = self.get_register(n);
        let value = self.get_register(t);
        let status = self.ir.a32_exclusive_write_memory_32(address, value);
        self.set_register(d, status);
        true
    }

    pub(super) fn arm_strexb(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = A32Reg::from_index(bits(w, 12, 15));
        let t = A32Reg::from_index(bits(w, 0, 3));
        if d == A32Reg::PC || t == A32Reg::PC || n == A32Reg::PC || d == n || d == t {
            return self.unpredictable_instruction();
        }

        let address = self.get_register(n);
        let value = self.get_register(t);
        let value = self.ir.least_significant_byte(value);
        let status = self.ir.a32_exclusive_write_memory_8(address, value);
        self.set_register(d, status);
        true
    }

    pub(super) fn arm_strexh(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = A32Reg::from_index(bits(w, 12, 15));
        let t = A32Reg::from_index(bits(w, 0, 3));
        if d == A32Reg::PC || t == A32Reg::PC || n == A32Reg::PC || d == n || d == t {
            return self.unpredictable_instruction();
        }

        let address = self.get_register(n);
        let value = self.get_register(t);
        let value = self.ir.least_significant_half(value);
        let status = self.ir.a32_exclusive_write_memory_16(address, value);
        self.set_register(d, status);
        true
    }

    pub(super) fn arm_strexd(&mut self, w: u32) -> bool {
        let n = A32Reg::from_index(bits(w, 16, 19));
        let d = A32Reg::from_index(bits(w, 12, 15));
        let t = A32Reg::from_index(bits(w, 0, 3));
        if d == A32Reg::PC
            || n == A32Reg::PC
            || t.index() % 2 != 0
            || t == A32Reg::LR
            || d == n
            || d == t
        {
            return self.unpredictable_instruction();
        }
        let t2 = A32Reg::from_index(t.index() as u32 + 1);

        let address = self.get_register(n);
        let lo = self.get_register(t);
        let hi = self.get_register(t2);
        let value = self.ir.pack_2x32_to_1x64(lo, hi);
        let status = self.ir.a32_exclusive_write_memory_64(address, value);
        self.set_register(d, status);
        true
    }
}
