//! Fused multiply-add with full NaN and infinity semantics.

use crate::fpcr::Fpcr;
use crate::fpsr::Fpsr;
use crate::fused::fused_mul_add;
use crate::info::FloatInfo;
use crate::process_exception::{process_exception, FpExc};
use crate::process_nan::process_nans_3;
use crate::rounding::RoundingMode;
use crate::unpacked::{round, FpType};

/// Compute `addend + op1 * op2` with a single rounding.
pub fn mul_add<F: FloatInfo>(addend: F, op1: F, op2: F, fpcr: Fpcr, fpsr: &mut Fpsr) -> F {
    let (type_a, sign_a, value_a) = crate::unpack(addend, fpcr, fpsr);
    let (type1, sign1, value1) = crate::unpack(op1, fpcr, fpsr);
    let (type2, sign2, value2) = crate::unpack(op2, fpcr, fpsr);

    let inf1 = type1 == FpType::Infinity;
    let inf2 = type2 == FpType::Infinity;
    let zero1 = type1 == FpType::Zero;
    let zero2 = type2 == FpType::Zero;

    // A quiet NaN addend still counts as an invalid operation when the
    // product is inf * 0.
    if type_a == FpType::QNaN && ((inf1 && zero2) || (zero1 && inf2)) {
        process_exception(FpExc::InvalidOp, fpcr, fpsr);
        return F::default_nan();
    }

    if let Some(result) = process_nans_3(type_a, type1, type2, addend, op1, op2, fpcr, fpsr) {
        return result;
    }

    let inf_a = type_a == FpType::Infinity;
    let zero_a = type_a == FpType::Zero;
    let sign_p = sign1 != sign2;
    let inf_p = inf1 || inf2;
    let zero_p = zero1 || zero2;

    if (inf1 && zero2) || (zero1 && inf2) || (inf_a && inf_p && sign_a != sign_p) {
        process_exception(FpExc::InvalidOp, fpcr, fpsr);
        return F::default_nan();
    }

    if (inf_a && !sign_a) || (inf_p && !sign_p) {
        return F::infinity(false);
    }
    if (inf_a && sign_a) || (inf_p && sign_p) {
        return F::infinity(true);
    }

    if zero_a && zero_p && sign_a == sign_p {
        return F::zero(sign_a);
    }

    let result = fused_mul_add(value_a, value1, value2);
    if result.mantissa == 0 {
        return F::zero(fpcr.rmode() == RoundingMode::TowardsMinusInfinity);
    }
    round(result, fpcr, fpsr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rounding() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();

        // fma(1.0, 2^-80, 2^-80) != 1.0 under a single rounding? No: the
        // product 2^-160 is absorbed, but the sticky bit makes the result
        // inexact rather than exactly 1.0 + something representable.
        let one = 0x3F80_0000u32;
        let tiny = 0x0780_0000u32; // 2^-112
        let result = mul_add(one, tiny, tiny, fpcr, &mut fpsr);
        assert_eq!(result, one);
        assert!(fpsr.ixc());
    }

    #[test]
    fn fused_differs_from_separate_rounding() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();

        // a = 1 + 2^-23, computing a*a - 1 exactly requires the fused path:
        // a*a = 1 + 2^-22 + 2^-46, so fma(-1, a, a) = 2^-22 + 2^-46.
        let a = 0x3F80_0001u32;
        let minus_one = 0xBF80_0000u32;
        let result = mul_add(minus_one, a, a, fpcr, &mut fpsr);
        // 2^-22 + 2^-46 = 2^-22 * (1 + 2^-24), inexact in f32: rounds to 2^-22.
        assert_eq!(result, 0x3480_0000);
        assert!(fpsr.ixc());
    }

    #[test]
    fn inf_times_zero_with_qnan_addend_is_invalid() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();
        let result = mul_add(0x7FC0_1234u32, 0x7F80_0000, 0x0000_0000, fpcr, &mut fpsr);
        assert_eq!(result, 0x7FC0_0000);
        assert!(fpsr.ioc());
    }
}
