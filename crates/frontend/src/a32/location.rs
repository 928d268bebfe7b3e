//! A32 location descriptors.

use armjit_ir::LocationDescriptor;

use super::itstate::ItState;

/// Describes an A32 translation context: PC plus everything that changes how
/// instructions decode. Packs into the opaque 64-bit descriptor as
///
/// ```text
/// bits 32-63  PC
/// bits 16-26  FPSCR mode bits (AHP/DN/FZ/RMode/stride/len), pre-masked
/// bits  8-15  IT state
/// bit      2  single stepping
/// bit      1  endianness (E)
/// bit      0  Thumb (T)
/// ```
///
/// The low half must match what the backend's state record composes at run
/// time for dispatch and RSB comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct A32LocationDescriptor {
    pc: u32,
    upper: u32,
}

/// FPSCR bits that change decoding/emission: AHP, DN, FZ, RMode, stride and
/// length.
pub const FPSCR_MODE_MASK: u32 = 0x07F7_0000;

const THUMB_BIT: u32 = 1;
const ENDIAN_BIT: u32 = 1 << 1;
const STEP_BIT: u32 = 1 << 2;
const IT_SHIFT: u32 = 8;

impl A32LocationDescriptor {
    pub fn new(pc: u32, cpsr: u32, fpscr: u32) -> A32LocationDescriptor {
        let mut upper = 0;
        if cpsr >> 5 & 1 != 0 {
            upper |= THUMB_BIT;
        }
        if cpsr >> 9 & 1 != 0 {
            upper |= ENDIAN_BIT;
        }
        // CPSR IT bits live at [15:10] and [26:25].
        let it = (cpsr >> 8 & 0xFC) | (cpsr >> 25 & 0x3);
        upper |= it << IT_SHIFT;
        upper |= fpscr & FPSCR_MODE_MASK;
        A32LocationDescriptor { pc, upper }
    }

    pub fn pc(self) -> u32 {
        self.pc
    }

    pub fn t_flag(self) -> bool {
        self.upper & THUMB_BIT != 0
    }

    pub fn e_flag(self) -> bool {
        self.upper & ENDIAN_BIT != 0
    }

    pub fn single_stepping(self) -> bool {
        self.upper & STEP_BIT != 0
    }

    pub fn it_state(self) -> ItState {
        ItState::new((self.upper >> IT_SHIFT) as u8)
    }

    pub fn fpscr_mode(self) -> u32 {
        self.upper & FPSCR_MODE_MASK
    }

    pub fn set_pc(self, pc: u32) -> A32LocationDescriptor {
        A32LocationDescriptor { pc, ..self }
    }

    pub fn advance_pc(self, amount: i32) -> A32LocationDescriptor {
        A32LocationDescriptor { pc: self.pc.wrapping_add(amount as u32), ..self }
    }

    pub fn set_t_flag(self, t: bool) -> A32LocationDescriptor {
        let upper = (self.upper & !THUMB_BIT) | u32::from(t);
        A32LocationDescriptor { upper, ..self }
    }

    pub fn set_it_state(self, it: ItState) -> A32LocationDescriptor {
        let upper = (self.upper & !(0xFF << IT_SHIFT)) | (u32::from(it.value()) << IT_SHIFT);
        A32LocationDescriptor { upper, ..self }
    }

    pub fn set_single_stepping(self, step: bool) -> A32LocationDescriptor {
        let upper = (self.upper & !STEP_BIT) | if step { STEP_BIT } else { 0 };
        A32LocationDescriptor { upper, ..self }
    }

    /// The non-PC half, as the backend state record maintains it.
    pub fn upper_half(self) -> u32 {
        self.upper
    }

    pub fn from_parts(pc: u32, upper: u32) -> A32LocationDescriptor {
        A32LocationDescriptor { pc, upper }
    }
}

impl From<A32LocationDescriptor> for LocationDescriptor {
    fn from(loc: A32LocationDescriptor) -> LocationDescriptor {
        LocationDescriptor::new(u64::from(loc.pc) << 32 | u64::from(loc.upper))
    }
}

impl From<LocationDescriptor> for A32LocationDescriptor {
    fn from(loc: LocationDescriptor) -> A32LocationDescriptor {
        A32LocationDescriptor { pc: (loc.value() >> 32) as u32, upper: loc.value() as u32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_opaque_form() {
        let loc = A32LocationDescriptor::new(0x8000, 0x20, 0x0300_0000);
        assert!(loc.t_flag());
        assert_eq!(loc.fpscr_mode(), 0x0300_0000 & FPSCR_MODE_MASK);

        let opaque: LocationDescriptor = loc.into();
        let back: A32LocationDescriptor = opaque.into();
        assert_eq!(back, loc);
    }

    #[test]
    fn distinct_decode_state_means_distinct_descriptors() {
        let arm = A32LocationDescriptor::new(0x1000, 0, 0);
        let thumb = A32LocationDescriptor::new(0x1000, 0x20, 0);
        let stepping = arm.set_single_stepping(true);
        let a: LocationDescriptor = arm.into();
        let b: LocationDescriptor = thumb.into();
        let c: LocationDescriptor = stepping.into();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
