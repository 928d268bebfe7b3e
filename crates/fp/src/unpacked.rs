//! Unpacking raw bit patterns into exact `(sign, exponent, mantissa)` form
//! and rounding them back.

use crate::fpcr::Fpcr;
use crate::fpsr::Fpsr;
use crate::info::FloatInfo;
use crate::mantissa_util::{
    highest_set_bit, logical_shift_right, logical_shift_right_double, ones,
};
use crate::process_exception::{process_exception, FpExc};
use crate::rounding::RoundingMode;

/// Classification of an unpacked operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FpType {
    Zero,
    Nonzero,
    Infinity,
    QNaN,
    SNaN,
}

/// An exact value `(-1)^sign * mantissa * 2^exponent`. The mantissa is a
/// plain integer; its alignment is arbitrary and [`round`] renormalises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FpUnpacked {
    pub sign: bool,
    pub exponent: i32,
    pub mantissa: u64,
}

/// Sentinel exponent stored for unpacked infinities.
const INFINITY_EXPONENT: i32 = 1_000_000;

/// Decompose `op`. Denormal inputs are flushed to zero under FPCR.FZ (FZ16
/// for half precision), raising InputDenorm for the non-FZ16 case.
pub fn unpack<F: FloatInfo>(op: F, fpcr: Fpcr, fpsr: &mut Fpsr) -> (FpType, bool, FpUnpacked) {
    let bits = op.to_bits();
    let sign_bit = F::EXPONENT_WIDTH + F::EXPLICIT_MANTISSA_WIDTH;
    let denormal_exponent = F::EXPONENT_MIN - F::EXPLICIT_MANTISSA_WIDTH as i32;

    let sign = bits >> sign_bit & 1 != 0;
    let exp_raw = bits >> F::EXPLICIT_MANTISSA_WIDTH & ones(F::EXPONENT_WIDTH);
    let frac_raw = bits & F::MANTISSA_MASK;

    if exp_raw == 0 {
        let flush = if F::TOTAL_WIDTH == 16 { fpcr.fz16() } else { fpcr.fz() };
        if frac_raw == 0 || flush {
            if frac_raw != 0 && F::TOTAL_WIDTH != 16 {
                process_exception(FpExc::InputDenorm, fpcr, fpsr);
            }
            return (FpType::Zero, sign, FpUnpacked { sign, exponent: 0, mantissa: 0 });
        }

        return (
            FpType::Nonzero,
            sign,
            FpUnpacked { sign, exponent: denormal_exponent, mantissa: frac_raw },
        );
    }

    if exp_raw == ones(F::EXPONENT_WIDTH) {
        if frac_raw == 0 {
            return (
                FpType::Infinity,
                sign,
                FpUnpacked { sign, exponent: INFINITY_EXPONENT, mantissa: 1 },
            );
        }

        let is_quiet = frac_raw >> (F::EXPLICIT_MANTISSA_WIDTH - 1) & 1 != 0;
        let ty = if is_quiet { FpType::QNaN } else { FpType::SNaN };
        return (ty, sign, FpUnpacked { sign, exponent: 0, mantissa: 0 });
    }

    let exponent = exp_raw as i32 - F::EXPONENT_BIAS - F::EXPLICIT_MANTISSA_WIDTH as i32;
    let mantissa = frac_raw | F::IMPLICIT_LEADING_BIT;
    (FpType::Nonzero, sign, FpUnpacked { sign, exponent, mantissa })
}

/// Align the mantissa so its leading bit sits at position `f`, returning the
/// discarded low bits left-aligned in a separate error word.
fn normalize(op: FpUnpacked, f: u32) -> (bool, i32, u64, u64) {
    let highest = highest_set_bit(op.mantissa);
    let shift_amount = highest - f as i32;
    let mantissa = logical_shift_right(op.mantissa, shift_amount);
    let error = logical_shift_right_double(op.mantissa, 0, shift_amount);
    let exponent = op.exponent + highest;
    (op.sign, exponent, mantissa, error)
}

/// Round an exact nonzero value to format `F` using the FPCR rounding mode.
pub fn round<F: FloatInfo>(op: FpUnpacked, fpcr: Fpcr, fpsr: &mut Fpsr) -> F {
    round_with_mode(op, fpcr, fpcr.rmode(), fpsr)
}

/// Round an exact nonzero value to format `F` with an explicit rounding mode.
pub fn round_with_mode<F: FloatInfo>(
    op: FpUnpacked,
    fpcr: Fpcr,
    rounding: RoundingMode,
    fpsr: &mut Fpsr,
) -> F {
    assert!(op.mantissa != 0);
    assert!(rounding != RoundingMode::ToNearestTieAwayFromZero);

    let minimum_exp = F::EXPONENT_MIN;
    let e = F::EXPONENT_WIDTH;
    let f = F::EXPLICIT_MANTISSA_WIDTH;
    let is_fp16 = F::TOTAL_WIDTH == 16;

    let (sign, exponent, mut mantissa, mut error) = normalize(op, f);

    if ((!is_fp16 && fpcr.fz()) || (is_fp16 && fpcr.fz16())) && exponent < minimum_exp {
        fpsr.set_ufc(true);
        return F::zero(sign);
    }

    let mut biased_exp = (exponent - minimum_exp + 1).max(0);
    if biased_exp == 0 {
        error = logical_shift_right_double(mantissa, error, minimum_exp - exponent);
        mantissa = logical_shift_right(mantissa, minimum_exp - exponent);
    }

    if biased_exp == 0 && (error != 0 || fpcr.ufe()) {
        process_exception(FpExc::Underflow, fpcr, fpsr);
    }

    let (round_up, overflow_to_inf) = match rounding {
        RoundingMode::ToNearestTieEven => {
            let half = 1u64 << 63;
            (error > half || (error == half && mantissa & 1 != 0), true)
        }
        RoundingMode::TowardsPlusInfinity => (error != 0 && !sign, !sign),
        RoundingMode::TowardsMinusInfinity => (error != 0 && sign, sign),
        _ => (false, false),
    };

    if round_up {
        if mantissa & F::MANTISSA_MASK == F::MANTISSA_MASK {
            // Rounding up overflows the fraction field.
            if mantissa == F::MANTISSA_MASK {
                // Denormal becomes the smallest normal.
                mantissa += 1;
            } else {
                mantissa = (mantissa + 1) / 2;
            }
            biased_exp += 1;
        } else {
            mantissa += 1;
        }
    }

    if error != 0 && rounding == RoundingMode::ToOdd {
        mantissa |= 1;
    }

    let sign_bits = if sign { 1u64 } else { 0 };
    if !is_fp16 || !fpcr.ahp() {
        let max_biased_exp = (1i32 << e) - 1;
        if biased_exp >= max_biased_exp {
            let result = if overflow_to_inf { F::infinity(sign) } else { F::max_normal(sign) };
            process_exception(FpExc::Overflow, fpcr, fpsr);
            process_exception(FpExc::Inexact, fpcr, fpsr);
            result
        } else {
            let bits =
                (((sign_bits << e) + biased_exp as u64) << f) | (mantissa & F::MANTISSA_MASK);
            if error != 0 {
                process_exception(FpExc::Inexact, fpcr, fpsr);
            }
            F::from_bits(bits)
        }
    } else {
        // Alternative half-precision: no infinities; overflow saturates and
        // raises InvalidOp.
        let max_biased_exp = 1i32 << e;
        if biased_exp >= max_biased_exp {
            process_exception(FpExc::InvalidOp, fpcr, fpsr);
            F::from_bits(if sign { 0xFFFF } else { 0x7FFF })
        } else {
            let bits =
                (((sign_bits << e) + biased_exp as u64) << f) | (mantissa & F::MANTISSA_MASK);
            if error != 0 {
                process_exception(FpExc::Inexact, fpcr, fpsr);
            }
            F::from_bits(bits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpack_round_identity<F: FloatInfo>(value: F) -> F {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();
        let (ty, _sign, unpacked) = unpack(value, fpcr, &mut fpsr);
        assert_eq!(ty, FpType::Nonzero);
        round(unpacked, fpcr, &mut fpsr)
    }

    #[test]
    fn round_is_inverse_of_unpack_f32() {
        for bits in [
            0x0000_0001u32, // smallest denormal
            0x007F_FFFF,    // largest denormal
            0x0080_0000,    // smallest normal
            0x3F80_0000,    // 1.0
            0x3F80_0001,
            0x4049_0FDB, // pi
            0x7F7F_FFFF, // largest normal
            0xBF80_0000, // -1.0
            0x8000_0001,
        ] {
            assert_eq!(unpack_round_identity(bits), bits, "bits {bits:#010x}");
        }
    }

    #[test]
    fn round_is_inverse_of_unpack_f64() {
        for bits in [
            0x0000_0000_0000_0001u64,
            0x000F_FFFF_FFFF_FFFF,
            0x0010_0000_0000_0000,
            0x3FF0_0000_0000_0000,
            0x4009_21FB_5444_2D18,
            0x7FEF_FFFF_FFFF_FFFF,
            0xBFF0_0000_0000_0000,
        ] {
            assert_eq!(unpack_round_identity(bits), bits, "bits {bits:#018x}");
        }
    }

    #[test]
    fn fz_flushes_denormals_and_raises_input_denorm() {
        let fpcr = Fpcr::new(1 << 24);
        let mut fpsr = Fpsr::default();
        let (ty, sign, _) = unpack(0x8000_0001u32, fpcr, &mut fpsr);
        assert_eq!(ty, FpType::Zero);
        assert!(sign);
        assert!(fpsr.idc());
    }

    #[test]
    fn nan_classification() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();
        assert_eq!(unpack(0x7FC0_0000u32, fpcr, &mut fpsr).0, FpType::QNaN);
        assert_eq!(unpack(0x7F80_0001u32, fpcr, &mut fpsr).0, FpType::SNaN);
        assert_eq!(unpack(0x7F80_0000u32, fpcr, &mut fpsr).0, FpType::Infinity);
    }

    #[test]
    fn round_to_odd_sets_lsb_on_inexact() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();
        // 1 + 2^-30 is inexact in f32; ToOdd forces the result odd.
        let op = FpUnpacked { sign: false, exponent: -30, mantissa: (1 << 30) + 1 };
        let rounded: u32 = round_with_mode(op, fpcr, RoundingMode::ToOdd, &mut fpsr);
        assert_eq!(rounded, 0x3F80_0001);
        assert!(fpsr.ixc());
    }
}
