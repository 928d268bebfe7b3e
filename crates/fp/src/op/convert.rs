//! Precision conversion.

use crate::fpcr::Fpcr;
use crate::fpsr::Fpsr;
use crate::info::FloatInfo;
use crate::mantissa_util::ones;
use crate::process_exception::{process_exception, FpExc};
use crate::rounding::RoundingMode;
use crate::unpacked::{round_with_mode, FpType};

/// Transport a NaN payload between formats. Payloads live in a common 51-bit
/// domain, top-aligned; narrowing truncates low bits, widening zero-extends.
fn convert_nan<TO: FloatInfo, FROM: FloatInfo>(op: FROM) -> TO {
    let bits = op.to_bits();
    let sign = bits >> (FROM::TOTAL_WIDTH - 1) & 1;

    let frac51 = (bits & ones(FROM::EXPLICIT_MANTISSA_WIDTH - 1)) << (52 - FROM::EXPLICIT_MANTISSA_WIDTH);

    let shifted_sign = sign << (TO::TOTAL_WIDTH - 1);
    // Exponent field plus the quiet bit, all ones.
    let exponent = ones(TO::TOTAL_WIDTH - TO::EXPLICIT_MANTISSA_WIDTH);
    let frac_out = frac51 >> (52 - TO::EXPLICIT_MANTISSA_WIDTH);

    TO::from_bits(shifted_sign | exponent << (TO::EXPLICIT_MANTISSA_WIDTH - 1) | frac_out)
}

/// Convert `op` to format `TO` under `rounding`, with AHP, default-NaN and
/// payload-transport semantics.
pub fn convert<TO: FloatInfo, FROM: FloatInfo>(
    op: FROM,
    fpcr: Fpcr,
    rounding: RoundingMode,
    fpsr: &mut Fpsr,
) -> TO {
    let (ty, sign, value) = crate::unpack(op, fpcr, fpsr);
    let is_althp = TO::TOTAL_WIDTH == 16 && fpcr.ahp();

    if ty == FpType::SNaN || ty == FpType::QNaN {
        let result = if is_althp {
            TO::zero(sign)
        } else if fpcr.dn() {
            TO::default_nan()
        } else {
            convert_nan::<TO, FROM>(op)
        };

        if ty == FpType::SNaN || is_althp {
            process_exception(FpExc::InvalidOp, fpcr, fpsr);
        }

        return result;
    }

    if ty == FpType::Infinity {
        if is_althp {
            process_exception(FpExc::InvalidOp, fpcr, fpsr);
            let sign_bit = if sign { 1u64 << 15 } else { 0 };
            return TO::from_bits(sign_bit | 0x7FFF);
        }

        return TO::infinity(sign);
    }

    if ty == FpType::Zero {
        return TO::zero(sign);
    }

    round_with_mode(value, fpcr, rounding, fpsr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_and_narrow() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();

        // 1.5f32 -> 1.5f64, exactly.
        let wide: u64 = convert(0x3FC0_0000u32, fpcr, RoundingMode::ToNearestTieEven, &mut fpsr);
        assert_eq!(wide, 0x3FF8_0000_0000_0000);

        // And back.
        let narrow: u32 = convert(wide, fpcr, RoundingMode::ToNearestTieEven, &mut fpsr);
        assert_eq!(narrow, 0x3FC0_0000);
        assert_eq!(fpsr.value(), 0);

        // 0.1f64 -> f32 is inexact.
        let narrow: u32 =
            convert(0x3FB9_9999_9999_999Au64, fpcr, RoundingMode::ToNearestTieEven, &mut fpsr);
        assert_eq!(narrow, 0x3DCC_CCCD);
        assert!(fpsr.ixc());
    }

    #[test]
    fn nan_payload_transport() {
        let fpcr = Fpcr::default();
        let mut fpsr = Fpsr::default();

        // Quiet NaN with payload survives widening with the payload
        // top-aligned into the double fraction.
        let wide: u64 = convert(0x7FC1_2345u32, fpcr, RoundingMode::ToNearestTieEven, &mut fpsr);
        assert_eq!(wide, 0x7FF8_2468_A000_0000);
        assert!(!fpsr.ioc());

        // Signalling NaN is quieted and raises InvalidOp.
        let wide: u64 = convert(0x7F80_0001u32, fpcr, RoundingMode::ToNearestTieEven, &mut fpsr);
        assert_eq!(wide, 0x7FF8_0000_2000_0000);
        assert!(fpsr.ioc());
    }
}
