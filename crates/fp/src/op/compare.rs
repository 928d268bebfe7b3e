//! Floating point comparison producing ARM NZCV condition bits.

use core::cmp::Ordering;

use crate::fpcr::Fpcr;
use crate::fpsr::Fpsr;
use crate::info::FloatInfo;
use crate::mantissa_util::highest_set_bit;
use crate::process_exception::{process_exception, FpExc};
use crate::unpacked::{FpType, FpUnpacked};

/// NZCV result nibble (N at bit 3) of comparing `op1` with `op2`:
/// `0b0110` equal, `0b1000` less, `0b0010` greater, `0b0011` unordered.
/// Quiet NaN operands additionally raise InvalidOp when `exc_on_qnan` is set
/// (the FCMPE/VCMPE forms).
pub fn compare<F: FloatInfo>(
    op1: F,
    op2: F,
    exc_on_qnan: bool,
    fpcr: Fpcr,
    fpsr: &mut Fpsr,
) -> u8 {
    let (type1, sign1, value1) = crate::unpack(op1, fpcr, fpsr);
    let (type2, sign2, value2) = crate::unpack(op2, fpcr, fpsr);

    let nan1 = type1 == FpType::SNaN || type1 == FpType::QNaN;
    let nan2 = type2 == FpType::SNaN || type2 == FpType::QNaN;

    if nan1 || nan2 {
        if type1 == FpType::SNaN || type2 == FpType::SNaN || exc_on_qnan {
            process_exception(FpExc::InvalidOp, fpcr, fpsr);
        }
        return 0b0011;
    }

    match cmp_values(type1, sign1, value1, type2, sign2, value2) {
        Ordering::Equal => 0b0110,
        Ordering::Less => 0b1000,
        Ordering::Greater => 0b0010,
    }
}

fn cmp_values(
    type1: FpType,
    sign1: bool,
    value1: FpUnpacked,
    type2: FpType,
    sign2: bool,
    value2: FpUnpacked,
) -> Ordering {
    let zero1 = type1 == FpType::Zero;
    let zero2 = type2 == FpType::Zero;

    // +0 and -0 compare equal.
    if zero1 && zero2 {
        return Ordering::Equal;
    }
    if zero1 {
        return if sign2 { Ordering::Greater } else { Ordering::Less };
    }
    if zero2 {
        return if sign1 { Ordering::Less } else { Ordering::Greater };
    }

    if sign1 != sign2 {
        return if sign1 { Ordering::Less } else { Ordering::Greater };
    }

    let magnitude = match (type1 == FpType::Infinity, type2 == FpType::Infinity) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let e1 = value1.exponent + highest_set_bit(value1.mantissa);
            let e2 = value2.exponent + highest_set_bit(value2.mantissa);
            e1.cmp(&e2).then_with(|| {
                let m1 = value1.mantissa << (62 - highest_set_bit(value1.mantissa));
                let m2 = value2.mantissa << (62 - highest_set_bit(value2.mantissa));
                m1.cmp(&m2)
            })
        }
    };

    if sign1 {
        magnitude.reverse()
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: u32, b: u32) -> u8 {
        let mut fpsr = Fpsr::default();
        compare(a, b, false, Fpcr::default(), &mut fpsr)
    }

    #[test]
    fn ordering() {
        assert_eq!(cmp(0x3F80_0000, 0x3F80_0000), 0b0110); // 1 == 1
        assert_eq!(cmp(0x3F80_0000, 0x4000_0000), 0b1000); // 1 < 2
        assert_eq!(cmp(0x4000_0000, 0x3F80_0000), 0b0010); // 2 > 1
        assert_eq!(cmp(0xBF80_0000, 0x3F80_0000), 0b1000); // -1 < 1
        assert_eq!(cmp(0xC000_0000, 0xBF80_0000), 0b1000); // -2 < -1
        assert_eq!(cmp(0x0000_0000, 0x8000_0000), 0b0110); // +0 == -0
        assert_eq!(cmp(0x7F80_0000, 0x7F80_0000), 0b0110); // inf == inf
        assert_eq!(cmp(0xFF80_0000, 0x7F80_0000), 0b1000); // -inf < inf
    }

    #[test]
    fn unordered_with_nan() {
        assert_eq!(cmp(0x7FC0_0000, 0x3F80_0000), 0b0011);

        let mut fpsr = Fpsr::default();
        compare(0x7FC0_0000u32, 0x3F80_0000, false, Fpcr::default(), &mut fpsr);
        assert!(!fpsr.ioc());
        compare(0x7FC0_0000u32, 0x3F80_0000, true, Fpcr::default(), &mut fpsr);
        assert!(fpsr.ioc());
    }
}
