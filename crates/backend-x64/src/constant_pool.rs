//! Interned constants inside the arena.

use rustc_hash::FxHashMap;

/// Manages a fixed slice of the arena holding 128-bit constants. Repeated
/// requests for the same value return the same address, so emitted code can
/// share RIP-relative loads and trampolines can share literal pairs.
pub struct ConstantPool {
    base: *mut u8,
    capacity: usize,
    used: usize,
    interned: FxHashMap<(u64, u64), usize>,
}

impl ConstantPool {
    /// # Safety
    /// `base..base+capacity` must stay writable while constants are added.
    pub unsafe fn new(base: *mut u8, capacity: usize) -> ConstantPool {
        ConstantPool { base, capacity, used: 0, interned: FxHashMap::default() }
    }

    /// Address of the 16-byte-aligned constant `(low, high)`.
    pub fn intern(&mut self, low: u64, high: u64) -> *const u8 {
        if let Some(&offset) = self.interned.get(&(low, high)) {
            return unsafe { self.base.add(offset) };
        }

        assert!(self.used + 16 <= self.capacity, "constant pool exhausted");
        let offset = self.used;
        unsafe {
            let ptr = self.base.add(offset);
            ptr.cast::<u64>().write_unaligned(low);
            ptr.add(8).cast::<u64>().write_unaligned(high);
        }
        self.used += 16;
        self.interned.insert((low, high), offset);
        unsafe { self.base.add(offset) }
    }
}
