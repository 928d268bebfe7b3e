//! Opaque location descriptors.

use core::fmt;

/// Uniquely identifies a translation context: the guest program counter plus
/// every bit of architectural state that affects how instructions decode
/// (instruction set, IT state, FPCR mode, endianness, single-stepping).
///
/// The frontends define the actual bit layouts; the rest of the system
/// treats the descriptor as an opaque 64-bit key. Two guest states that
/// decode differently must produce different descriptors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationDescriptor(u64);

impl LocationDescriptor {
    pub fn new(value: u64) -> LocationDescriptor {
        LocationDescriptor(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocationDescriptor({:#018x})", self.0)
    }
}

impl fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
