//! Conversion between floating point and fixed point integers.

use crate::fpcr::Fpcr;
use crate::fpsr::Fpsr;
use crate::info::FloatInfo;
use crate::mantissa_util::{
    arithmetic_shift_left, highest_set_bit, negate, ones, residual_error_on_right_shift,
    ResidualError,
};
use crate::process_exception::{process_exception, FpExc};
use crate::rounding::RoundingMode;
use crate::unpacked::{round_with_mode, FpType, FpUnpacked};

/// Convert to a fixed point integer of `ibits` total bits with `fbits`
/// fraction bits, saturating on overflow. The result occupies the low
/// `ibits` of the return value.
pub fn to_fixed<F: FloatInfo>(
    op: F,
    ibits: u32,
    fbits: u32,
    unsigned: bool,
    fpcr: Fpcr,
    rounding: RoundingMode,
    fpsr: &mut Fpsr,
) -> u64 {
    assert!(rounding != RoundingMode::ToOdd);
    assert!(ibits <= 64);
    assert!(fbits <= ibits);

    let (ty, sign, mut value) = crate::unpack(op, fpcr, fpsr);

    if ty == FpType::SNaN || ty == FpType::QNaN {
        process_exception(FpExc::InvalidOp, fpcr, fpsr);
    }

    if value.mantissa == 0 {
        return 0;
    }

    if sign && unsigned {
        process_exception(FpExc::InvalidOp, fpcr, fpsr);
        return 0;
    }

    // value *= 2^fbits
    value.exponent += fbits as i32;

    let mut int_result = if sign { negate(value.mantissa) } else { value.mantissa };
    let error = residual_error_on_right_shift(int_result, -value.exponent);
    int_result = arithmetic_shift_left(int_result, value.exponent);

    let round_up = match rounding {
        RoundingMode::ToNearestTieEven => {
            error > ResidualError::Half || (error == ResidualError::Half && int_result & 1 != 0)
        }
        RoundingMode::TowardsPlusInfinity => error != ResidualError::Zero,
        RoundingMode::TowardsMinusInfinity => false,
        RoundingMode::TowardsZero => error != ResidualError::Zero && int_result >> 63 != 0,
        RoundingMode::ToNearestTieAwayFromZero => {
            error > ResidualError::Half || (error == ResidualError::Half && int_result >> 63 == 0)
        }
        RoundingMode::ToOdd => unreachable!(),
    };

    if round_up {
        int_result = int_result.wrapping_add(1);
    }

    // Detect overflow of the target width.
    let rounded_highest =
        highest_set_bit(value.mantissa + u64::from(round_up));
    let min_exponent_for_overflow =
        ibits as i32 - rounded_highest - if unsigned { 0 } else { 1 };
    if value.exponent >= min_exponent_for_overflow {
        // Positive overflow.
        if unsigned || !sign {
            process_exception(FpExc::InvalidOp, fpcr, fpsr);
            return ones(ibits - u32::from(!unsigned));
        }

        // Negative overflow, unless the value is exactly the minimum.
        let min_value = negate(1u64 << (ibits - 1));
        if !(value.exponent == min_exponent_for_overflow && int_result == min_value) {
            process_exception(FpExc::InvalidOp, fpcr, fpsr);
            return 1u64 << (ibits - 1);
        }
    }

    if error != ResidualError::Zero {
        process_exception(FpExc::Inexact, fpcr, fpsr);
    }
    int_result & ones(ibits)
}

/// Convert a fixed point integer to floating point (SCVTF/UCVTF).
pub fn from_fixed<F: FloatInfo>(
    value: u64,
    signed: bool,
    fbits: u32,
    fpcr: Fpcr,
    rounding: RoundingMode,
    fpsr: &mut Fpsr,
) -> F {
    if value == 0 {
        return F::zero(false);
    }

    let sign = signed && value >> 63 != 0;
    let mantissa = if sign { negate(value) } else { value };
    let unpacked = FpUnpacked { sign, exponent: -(fbits as i32), mantissa };
    round_with_mode(unpacked, fpcr, rounding, fpsr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix32(bits: u32, ibits: u32, unsigned: bool, rounding: RoundingMode) -> u64 {
        let mut fpsr = Fpsr::default();
        to_fixed(bits, ibits, 0, unsigned, Fpcr::default(), rounding, &mut fpsr)
    }

    #[test]
    fn basic_conversions() {
        assert_eq!(fix32(0x4220_0000, 32, false, RoundingMode::TowardsZero), 40);
        assert_eq!(fix32(0xC220_0000, 32, false, RoundingMode::TowardsZero), 0xFFFF_FFD8); // -40
        assert_eq!(fix32(0x3FC0_0000, 32, false, RoundingMode::TowardsZero), 1); // 1.5
        assert_eq!(fix32(0x3FC0_0000, 32, false, RoundingMode::ToNearestTieEven), 2);
        assert_eq!(fix32(0xBF00_0000, 32, false, RoundingMode::TowardsMinusInfinity), u64::from(u32::MAX)); // -0.5 -> -1
    }

    #[test]
    fn saturation() {
        let mut fpsr = Fpsr::default();
        // 2^40 saturates a signed 32-bit conversion.
        let big = 0x5380_0000u32;
        assert_eq!(
            to_fixed(big, 32, 0, false, Fpcr::default(), RoundingMode::TowardsZero, &mut fpsr),
            0x7FFF_FFFF
        );
        assert!(fpsr.ioc());

        let mut fpsr = Fpsr::default();
        let big_neg = 0xD380_0000u32;
        assert_eq!(
            to_fixed(big_neg, 32, 0, false, Fpcr::default(), RoundingMode::TowardsZero, &mut fpsr),
            0x8000_0000
        );
        assert!(fpsr.ioc());

        // INT32_MIN itself converts exactly.
        let mut fpsr = Fpsr::default();
        let int_min = 0xCF00_0000u32; // -2^31
        assert_eq!(
            to_fixed(int_min, 32, 0, false, Fpcr::default(), RoundingMode::TowardsZero, &mut fpsr),
            0x8000_0000
        );
        assert!(!fpsr.ioc());
    }

    #[test]
    fn unsigned_rejects_negatives() {
        let mut fpsr = Fpsr::default();
        assert_eq!(
            to_fixed(0xBF80_0000u32, 32, 0, true, Fpcr::default(), RoundingMode::TowardsZero, &mut fpsr),
            0
        );
        assert!(fpsr.ioc());
    }

    #[test]
    fn nan_input_is_invalid_and_zero() {
        let mut fpsr = Fpsr::default();
        assert_eq!(
            to_fixed(0x7FC0_0000u32, 32, 0, false, Fpcr::default(), RoundingMode::TowardsZero, &mut fpsr),
            0
        );
        assert!(fpsr.ioc());
    }

    #[test]
    fn fixed_point_fraction_bits() {
        let mut fpsr = Fpsr::default();
        // 1.5 as Q16: 0x18000
        assert_eq!(
            to_fixed(0x3FC0_0000u32, 32, 16, false, Fpcr::default(), RoundingMode::TowardsZero, &mut fpsr),
            0x0001_8000
        );
    }

    #[test]
    fn from_fixed_round_trip() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();
        let f: u32 = from_fixed(40, false, 0, fpcr, RoundingMode::ToNearestTieEven, &mut fpsr);
        assert_eq!(f, 0x4220_0000);
        let f: u32 =
            from_fixed((-40i64) as u64, true, 0, fpcr, RoundingMode::ToNearestTieEven, &mut fpsr);
        assert_eq!(f, 0xC220_0000);
        // 2^64 - 1 unsigned is inexact.
        let f: u32 = from_fixed(u64::MAX, false, 0, fpcr, RoundingMode::ToNearestTieEven, &mut fpsr);
        assert_eq!(f, 0x5F80_0000);
        assert!(fpsr.ixc());
    }
}
