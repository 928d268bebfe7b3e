//! Rounding modes.

/// Rounding modes understood by [`round`](crate::round) and the conversion
/// operations. The first four are encodable in FPCR.RMode; the last two only
/// appear as explicit operands of specific instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RoundingMode {
    /// Round to nearest, ties to even. FPCR.RMode = 0b00.
    ToNearestTieEven = 0,
    /// Round towards positive infinity. FPCR.RMode = 0b01.
    TowardsPlusInfinity = 1,
    /// Round towards negative infinity. FPCR.RMode = 0b10.
    TowardsMinusInfinity = 2,
    /// Round towards zero. FPCR.RMode = 0b11.
    TowardsZero = 3,
    /// Round to nearest, ties away from zero.
    ToNearestTieAwayFromZero = 4,
    /// Von Neumann rounding: set the LSB when any precision was lost.
    ToOdd = 5,
}

impl RoundingMode {
    /// Decode the two FPCR.RMode bits.
    pub fn from_fpcr_bits(bits: u32) -> RoundingMode {
        match bits & 0b11 {
            0b00 => RoundingMode::ToNearestTieEven,
            0b01 => RoundingMode::TowardsPlusInfinity,
            0b10 => RoundingMode::TowardsMinusInfinity,
            0b11 => RoundingMode::TowardsZero,
            _ => unreachable!(),
        }
    }
}
