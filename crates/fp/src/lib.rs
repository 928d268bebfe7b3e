//! Software reference implementation of IEEE-754 binary floating point with
//! the ARM-specific extensions the guest architecture requires: FPCR rounding
//! modes, flush-to-zero, default-NaN substitution, alternate half precision,
//! and cumulative FPSR exception accumulation.
//!
//! Values under computation are held in an unpacked `(sign, exponent,
//! mantissa)` form; all arithmetic is exact up to a final [`round`], so results
//! are bit-identical to the architected behaviour regardless of the host's
//! floating point environment. The JIT uses this library twice over: the
//! optimiser folds constant FP operations through it, and the backend lowers
//! FP micro-ops to callouts into it.

mod fpcr;
mod fpsr;
mod fused;
mod info;
mod mantissa_util;
mod process_exception;
mod process_nan;
mod rounding;
mod unpacked;

pub mod op;

pub use crate::fpcr::Fpcr;
pub use crate::fpsr::Fpsr;
pub use crate::fused::fused_mul_add;
pub use crate::info::FloatInfo;
pub use crate::mantissa_util::{residual_error_on_right_shift, ResidualError};
pub use crate::process_exception::{process_exception, FpExc};
pub use crate::process_nan::{process_nan, process_nans, process_nans_3};
pub use crate::rounding::RoundingMode;
pub use crate::unpacked::{round, round_with_mode, unpack, FpType, FpUnpacked};
