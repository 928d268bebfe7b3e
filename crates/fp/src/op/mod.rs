//! The architected floating point operations, expressed over the unpacked
//! exact form with a single final rounding.

mod arith;
mod compare;
mod convert;
mod estimate;
mod mul_add;
mod round_int;
mod to_fixed;

pub use self::arith::{add, div, mul, sqrt, sub};
pub use self::compare::compare;
pub use self::convert::convert;
pub use self::estimate::{recip_estimate, rsqrt_estimate};
pub use self::mul_add::mul_add;
pub use self::round_int::round_int;
pub use self::to_fixed::{from_fixed, to_fixed};
