//! `extern "C"` shims over the reference floating point library, called
//! directly from emitted code. Each takes the operands, the effective FPCR
//! word, and a pointer to the raw FPSR accumulation word in the state
//! record.

use armjit_fp::{op, Fpcr, Fpsr, RoundingMode};

use crate::jitstate::nzcv_arm_to_host;

#[inline]
fn with_fpsr<R>(fpcr: u32, fpsr: *mut u32, f: impl FnOnce(Fpcr, &mut Fpsr) -> R) -> R {
    let fpcr = Fpcr::new(fpcr);
    let mut status = Fpsr::new(unsafe { fpsr.read() });
    let result = f(fpcr, &mut status);
    unsafe { fpsr.write(status.value()) };
    result
}

fn rounding(imm: u8, fpcr: Fpcr) -> RoundingMode {
    match imm {
        0 => RoundingMode::ToNearestTieEven,
        1 => RoundingMode::TowardsPlusInfinity,
        2 => RoundingMode::TowardsMinusInfinity,
        3 => RoundingMode::TowardsZero,
        4 => RoundingMode::ToNearestTieAwayFromZero,
        5 => RoundingMode::ToOdd,
        0xFF => fpcr.rmode(),
        other => panic!("bad rounding immediate {other}"),
    }
}

macro_rules! binary_helper {
    ($name:ident, $ty:ty, $op:path) => {
        pub extern "C" fn $name(a: $ty, b: $ty, fpcr: u32, fpsr: *mut u32) -> $ty {
            with_fpsr(fpcr, fpsr, |fpcr, status| $op(a, b, fpcr, status))
        }
    };
}

macro_rules! unary_helper {
    ($name:ident, $ty:ty, $op:path) => {
        pub extern "C" fn $name(a: $ty, fpcr: u32, fpsr: *mut u32) -> $ty {
            with_fpsr(fpcr, fpsr, |fpcr, status| $op(a, fpcr, status))
        }
    };
}

binary_helper!(fp_add_32, u32, op::add);
binary_helper!(fp_add_64, u64, op::add);
binary_helper!(fp_sub_32, u32, op::sub);
binary_helper!(fp_sub_64, u64, op::sub);
binary_helper!(fp_mul_32, u32, op::mul);
binary_helper!(fp_mul_64, u64, op::mul);
binary_helper!(fp_div_32, u32, op::div);
binary_helper!(fp_div_64, u64, op::div);

unary_helper!(fp_sqrt_32, u32, op::sqrt);
unary_helper!(fp_sqrt_64, u64, op::sqrt);
unary_helper!(fp_recip_estimate_32, u32, op::recip_estimate);
unary_helper!(fp_recip_estimate_64, u64, op::recip_estimate);
unary_helper!(fp_rsqrt_estimate_32, u32, op::rsqrt_estimate);
unary_helper!(fp_rsqrt_estimate_64, u64, op::rsqrt_estimate);

pub extern "C" fn fp_mul_add_32(addend: u32, op1: u32, op2: u32, fpcr: u32, fpsr: *mut u32) -> u32 {
    with_fpsr(fpcr, fpsr, |fpcr, status| op::mul_add(addend, op1, op2, fpcr, status))
}

pub extern "C" fn fp_mul_add_64(addend: u64, op1: u64, op2: u64, fpcr: u32, fpsr: *mut u32) -> u64 {
    with_fpsr(fpcr, fpsr, |fpcr, status| op::mul_add(addend, op1, op2, fpcr, status))
}

/// Returns host-format NZCV.
pub extern "C" fn fp_compare_32(a: u32, b: u32, exc_on_qnan: u32, fpcr: u32, fpsr: *mut u32) -> u32 {
    let nibble =
        with_fpsr(fpcr, fpsr, |fpcr, status| op::compare(a, b, exc_on_qnan != 0, fpcr, status));
    nzcv_arm_to_host(u32::from(nibble) << 28)
}

pub extern "C" fn fp_compare_64(a: u64, b: u64, exc_on_qnan: u32, fpcr: u32, fpsr: *mut u32) -> u32 {
    let nibble =
        with_fpsr(fpcr, fpsr, |fpcr, status| op::compare(a, b, exc_on_qnan != 0, fpcr, status));
    nzcv_arm_to_host(u32::from(nibble) << 28)
}

pub extern "C" fn fp_single_to_double(a: u32, fpcr: u32, fpsr: *mut u32) -> u64 {
    with_fpsr(fpcr, fpsr, |fpcr, status| {
        op::convert::<u64, u32>(a, fpcr, fpcr.rmode(), status)
    })
}

pub extern "C" fn fp_double_to_single(a: u64, fpcr: u32, fpsr: *mut u32) -> u32 {
    with_fpsr(fpcr, fpsr, |fpcr, status| {
        op::convert::<u32, u64>(a, fpcr, fpcr.rmode(), status)
    })
}

macro_rules! to_fixed_helper {
    ($name:ident, $from:ty, $ret:ty, $ibits:expr, $unsigned:expr) => {
        pub extern "C" fn $name(a: $from, fbits: u32, rmode: u32, fpcr: u32, fpsr: *mut u32) -> $ret {
            with_fpsr(fpcr, fpsr, |fpcr, status| {
                op::to_fixed(a, $ibits, fbits, $unsigned, fpcr, rounding(rmode as u8, fpcr), status)
                    as $ret
            })
        }
    };
}

to_fixed_helper!(fp_single_to_fixed_s32, u32, u32, 32, false);
to_fixed_helper!(fp_single_to_fixed_u32, u32, u32, 32, true);
to_fixed_helper!(fp_single_to_fixed_s64, u32, u64, 64, false);
to_fixed_helper!(fp_single_to_fixed_u64, u32, u64, 64, true);
to_fixed_helper!(fp_double_to_fixed_s32, u64, u32, 32, false);
to_fixed_helper!(fp_double_to_fixed_u32, u64, u32, 32, true);
to_fixed_helper!(fp_double_to_fixed_s64, u64, u64, 64, false);
to_fixed_helper!(fp_double_to_fixed_u64, u64, u64, 64, true);

macro_rules! from_fixed_helper {
    ($name:ident, $ret:ty, $signed:expr, $widen:expr) => {
        pub extern "C" fn $name(a: u64, fbits: u32, rmode: u32, fpcr: u32, fpsr: *mut u32) -> $ret {
            let value = if $widen { a } else { widen_32(a, $signed) };
            with_fpsr(fpcr, fpsr, |fpcr, status| {
                op::from_fixed::<$ret>(value, $signed, fbits, fpcr, rounding(rmode as u8, fpcr), status)
            })
        }
    };
}

fn widen_32(a: u64, signed: bool) -> u64 {
    if signed {
        a as u32 as i32 as i64 as u64
    } else {
        u64::from(a as u32)
    }
}

from_fixed_helper!(fp_fixed_s32_to_single, u32, true, false);
from_fixed_helper!(fp_fixed_u32_to_single, u32, false, false);
from_fixed_helper!(fp_fixed_s32_to_double, u64, true, false);
from_fixed_helper!(fp_fixed_u32_to_double, u64, false, false);
from_fixed_helper!(fp_fixed_s64_to_single, u32, true, true);
from_fixed_helper!(fp_fixed_u64_to_single, u32, false, true);
from_fixed_helper!(fp_fixed_s64_to_double, u64, true, true);
from_fixed_helper!(fp_fixed_u64_to_double, u64, false, true);
