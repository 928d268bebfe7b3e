//! Rounding to an integral floating point value.

use crate::fpcr::Fpcr;
use crate::fpsr::Fpsr;
use crate::info::FloatInfo;
use crate::mantissa_util::{arithmetic_shift_left, negate, residual_error_on_right_shift, ResidualError};
use crate::process_exception::{process_exception, FpExc};
use crate::rounding::RoundingMode;
use crate::unpacked::{round_with_mode, FpType, FpUnpacked};

/// Round `op` to an integral value in the same format (FRINT*). `exact`
/// requests the Inexact exception when precision is lost (FRINTX).
pub fn round_int<F: FloatInfo>(
    op: F,
    fpcr: Fpcr,
    rounding: RoundingMode,
    exact: bool,
    fpsr: &mut Fpsr,
) -> F {
    assert!(rounding != RoundingMode::ToOdd);

    let (ty, sign, value) = crate::unpack(op, fpcr, fpsr);

    match ty {
        FpType::SNaN | FpType::QNaN => return crate::process_nan(ty, op, fpcr, fpsr),
        FpType::Infinity => return F::infinity(sign),
        FpType::Zero => return F::zero(sign),
        FpType::Nonzero => {}
    }

    if value.exponent >= 0 {
        // Already an integer.
        return op;
    }

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

    let abs_int_result = if int_result >> 63 != 0 { negate(int_result) } else { int_result };

    let result = if int_result == 0 {
        F::zero(sign)
    } else {
        let unpacked = FpUnpacked { sign, exponent: 0, mantissa: abs_int_result };
        round_with_mode(unpacked, fpcr, RoundingMode::TowardsZero, fpsr)
    };

    if error != ResidualError::Zero && exact {
        process_exception(FpExc::Inexact, fpcr, fpsr);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ri(bits: u32, rounding: RoundingMode) -> u32 {
        let mut fpsr = Fpsr::default();
        round_int(bits, Fpcr::default(), rounding, false, &mut fpsr)
    }

    #[test]
    fn rounding_modes() {
        let half = 0x3F00_0000; // 0.5
        let one_and_half = 0x3FC0_0000; // 1.5
        let minus_half = 0xBF00_0000;

        assert_eq!(ri(half, RoundingMode::ToNearestTieEven), 0x0000_0000); // 0.5 -> 0
        assert_eq!(ri(one_and_half, RoundingMode::ToNearestTieEven), 0x4000_0000); // 1.5 -> 2
        assert_eq!(ri(half, RoundingMode::ToNearestTieAwayFromZero), 0x3F80_0000); // 0.5 -> 1
        assert_eq!(ri(half, RoundingMode::TowardsPlusInfinity), 0x3F80_0000);
        assert_eq!(ri(half, RoundingMode::TowardsMinusInfinity), 0x0000_0000);
        assert_eq!(ri(minus_half, RoundingMode::TowardsMinusInfinity), 0xBF80_0000); // -0.5 -> -1
        assert_eq!(ri(minus_half, RoundingMode::TowardsZero), 0x8000_0000); // -0.5 -> -0
        assert_eq!(ri(minus_half, RoundingMode::ToNearestTieAwayFromZero), 0xBF80_0000);
    }

    #[test]
    fn already_integral_is_identity() {
        assert_eq!(ri(0x4220_0000, RoundingMode::TowardsZero), 0x4220_0000); // 40.0
        assert_eq!(ri(0x7F80_0000, RoundingMode::TowardsZero), 0x7F80_0000); // inf
    }

    #[test]
    fn exact_flag() {
        let mut fpsr = Fpsr::default();
        round_int(0x3FC0_0000u32, Fpcr::default(), RoundingMode::TowardsZero, true, &mut fpsr);
        assert!(fpsr.ixc());
    }
}
