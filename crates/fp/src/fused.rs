//! Exact fused multiply-add over unpacked operands.
//!
//! The product is computed in a 128-bit intermediate and folded into the
//! addend with sticky-LSB shifts, so the single final rounding observes every
//! discarded bit. This is what makes FMLA-family results bit-exact.

use crate::mantissa_util::{highest_set_bit, sticky_logical_shift_right};
use crate::unpacked::FpUnpacked;

const NORMALIZED_POINT_POSITION: i32 = 62;
const PRODUCT_POINT_POSITION: i32 = NORMALIZED_POINT_POSITION * 2;

fn normalize_unpacked(mut op: FpUnpacked) -> FpUnpacked {
    if op.mantissa == 0 {
        return op;
    }

    let highest_bit = highest_set_bit(op.mantissa);
    debug_assert!(highest_bit < NORMALIZED_POINT_POSITION);

    let offset = NORMALIZED_POINT_POSITION - highest_bit;
    op.mantissa <<= offset;
    op.exponent -= offset;
    op
}

/// Compute `addend + op1 * op2` exactly, up to a sticky LSB in the result
/// mantissa. Operands must come straight from `unpack` (mantissas below bit
/// 62); zero mantissas are legal and a zero mantissa result indicates exact
/// cancellation, which the caller must special-case before rounding.
pub fn fused_mul_add(addend: FpUnpacked, op1: FpUnpacked, op2: FpUnpacked) -> FpUnpacked {
    let addend = normalize_unpacked(addend);
    let op1 = normalize_unpacked(op1);
    let op2 = normalize_unpacked(op2);

    let product_sign = op1.sign != op2.sign;
    let (product_exponent, product_value) = {
        let mut exponent = op1.exponent + op2.exponent;
        let mut value = u128::from(op1.mantissa) * u128::from(op2.mantissa);
        if value >> (PRODUCT_POINT_POSITION + 1) & 1 != 0 {
            value >>= 1;
            exponent += 1;
        }
        (exponent, value)
    };

    if product_value == 0 {
        return addend;
    }

    if addend.mantissa == 0 {
        return FpUnpacked {
            sign: product_sign,
            exponent: product_exponent + 64,
            mantissa: (product_value >> 64) as u64 | u64::from(product_value as u64 != 0),
        };
    }

    let exp_diff = product_exponent - (addend.exponent - NORMALIZED_POINT_POSITION);

    if product_sign == addend.sign {
        // Addition.

        if exp_diff <= 0 {
            // addend > product
            let result = addend.mantissa
                + sticky_logical_shift_right(product_value, NORMALIZED_POINT_POSITION - exp_diff)
                    as u64;
            return FpUnpacked { sign: addend.sign, exponent: addend.exponent, mantissa: result };
        }

        // addend < product
        let result = product_value
            + sticky_logical_shift_right(
                u128::from(addend.mantissa),
                exp_diff - NORMALIZED_POINT_POSITION,
            );
        return FpUnpacked {
            sign: product_sign,
            exponent: product_exponent + 64,
            mantissa: (result >> 64) as u64 | u64::from(result as u64 != 0),
        };
    }

    // Subtraction.

    let addend_long = u128::from(addend.mantissa) << NORMALIZED_POINT_POSITION;

    let result_sign;
    let mut result;
    let mut result_exponent;

    if exp_diff == 0 && product_value > addend_long {
        result_sign = product_sign;
        result_exponent = product_exponent;
        result = product_value - addend_long;
    } else if exp_diff <= 0 {
        result_sign = !product_sign;
        result_exponent = addend.exponent - NORMALIZED_POINT_POSITION;
        result = addend_long - sticky_logical_shift_right(product_value, -exp_diff);
    } else {
        result_sign = product_sign;
        result_exponent = product_exponent;
        result = product_value - sticky_logical_shift_right(addend_long, exp_diff);
    }

    if result >> 64 == 0 {
        return FpUnpacked {
            sign: result_sign,
            exponent: result_exponent,
            mantissa: result as u64,
        };
    }

    let required_shift = NORMALIZED_POINT_POSITION - highest_set_bit((result >> 64) as u64);
    result <<= required_shift;
    result_exponent -= required_shift;
    FpUnpacked {
        sign: result_sign,
        exponent: result_exponent + 64,
        mantissa: (result >> 64) as u64 | u64::from(result as u64 != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fpcr::Fpcr;
    use crate::fpsr::Fpsr;
    use crate::unpacked::{round, unpack};

    fn exact(bits: u64) -> FpUnpacked {
        let mut fpsr = Fpsr::default();
        unpack(bits, Fpcr::default(), &mut fpsr).2
    }

    #[test]
    fn product_plus_zero() {
        // 2.0 * 3.0 + 0.0 == 6.0
        let result = fused_mul_add(
            FpUnpacked { sign: false, exponent: 0, mantissa: 0 },
            exact(0x4000_0000_0000_0000),
            exact(0x4008_0000_0000_0000),
        );
        let mut fpsr = Fpsr::default();
        let bits: u64 = round(result, Fpcr::default(), &mut fpsr);
        assert_eq!(bits, 0x4018_0000_0000_0000);
    }

    #[test]
    fn exact_cancellation_yields_zero_mantissa() {
        // 1.0 * 1.0 - 1.0 cancels exactly.
        let one = exact(0x3FF0_0000_0000_0000);
        let minus_one = exact(0xBFF0_0000_0000_0000);
        let result = fused_mul_add(minus_one, one, one);
        assert_eq!(result.mantissa, 0);
    }

    #[test]
    fn sticky_bit_survives_alignment() {
        // 2^100 + 1.0 * 1.0: the addend dwarfs the product but the result
        // must still round up away from 2^100 under round-to-plus-infinity.
        let big = exact(0x4630_0000_0000_0000);
        let one = exact(0x3FF0_0000_0000_0000);
        let result = fused_mul_add(big, one, one);
        let mut fpsr = Fpsr::default();
        let up: u64 = crate::unpacked::round_with_mode(
            result,
            Fpcr::default(),
            crate::RoundingMode::TowardsPlusInfinity,
            &mut fpsr,
        );
        assert_eq!(up, 0x4630_0000_0000_0001);
        assert!(fpsr.ixc());
    }
}
