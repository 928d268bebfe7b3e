//! NaN quieting, propagation and default-NaN substitution.

use crate::fpcr::Fpcr;
use crate::fpsr::Fpsr;
use crate::info::FloatInfo;
use crate::process_exception::{process_exception, FpExc};
use crate::unpacked::FpType;

/// Quiet a NaN operand: signalling NaNs raise InvalidOp and have their quiet
/// bit set; FPCR.DN substitutes the default NaN.
pub fn process_nan<F: FloatInfo>(ty: FpType, op: F, fpcr: Fpcr, fpsr: &mut Fpsr) -> F {
    assert!(ty == FpType::QNaN || ty == FpType::SNaN);

    let topfrac = F::EXPLICIT_MANTISSA_WIDTH - 1;

    let mut result = op;

    if ty == FpType::SNaN {
        result = F::from_bits(op.to_bits() | 1 << topfrac);
        process_exception(FpExc::InvalidOp, fpcr, fpsr);
    }

    if fpcr.dn() {
        result = F::default_nan();
    }

    result
}

/// Two-operand NaN selection: signalling NaNs take priority over quiet ones,
/// first operand over second. Returns the propagated result if either operand
/// is a NaN.
pub fn process_nans<F: FloatInfo>(
    type1: FpType,
    type2: FpType,
    op1: F,
    op2: F,
    fpcr: Fpcr,
    fpsr: &mut Fpsr,
) -> Option<F> {
    if type1 == FpType::SNaN {
        Some(process_nan(type1, op1, fpcr, fpsr))
    } else if type2 == FpType::SNaN {
        Some(process_nan(type2, op2, fpcr, fpsr))
    } else if type1 == FpType::QNaN {
        Some(process_nan(type1, op1, fpcr, fpsr))
    } else if type2 == FpType::QNaN {
        Some(process_nan(type2, op2, fpcr, fpsr))
    } else {
        None
    }
}

/// Three-operand NaN selection with the same priority scheme.
pub fn process_nans_3<F: FloatInfo>(
    type1: FpType,
    type2: FpType,
    type3: FpType,
    op1: F,
    op2: F,
    op3: F,
    fpcr: Fpcr,
    fpsr: &mut Fpsr,
) -> Option<F> {
    if type1 == FpType::SNaN {
        Some(process_nan(type1, op1, fpcr, fpsr))
    } else if type2 == FpType::SNaN {
        Some(process_nan(type2, op2, fpcr, fpsr))
    } else if type3 == FpType::SNaN {
        Some(process_nan(type3, op3, fpcr, fpsr))
    } else if type1 == FpType::QNaN {
        Some(process_nan(type1, op1, fpcr, fpsr))
    } else if type2 == FpType::QNaN {
        Some(process_nan(type2, op2, fpcr, fpsr))
    } else if type3 == FpType::QNaN {
        Some(process_nan(type3, op3, fpcr, fpsr))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snan_is_quieted_and_raises_invalid_op() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();
        let result = process_nan(FpType::SNaN, 0x7F80_0001u32, fpcr, &mut fpsr);
        assert_eq!(result, 0x7FC0_0001);
        assert!(fpsr.ioc());
    }

    #[test]
    fn default_nan_substitution() {
        let fpcr = Fpcr::new(1 << 25);
        let mut fpsr = Fpsr::default();
        let result = process_nan(FpType::QNaN, 0xFFC1_2345u32, fpcr, &mut fpsr);
        assert_eq!(result, 0x7FC0_0000);
        assert!(!fpsr.ioc());
    }
}
