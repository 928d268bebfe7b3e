//! Floating point exception accumulation.

use crate::fpcr::Fpcr;
use crate::fpsr::Fpsr;

/// A floating point exception raised during an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FpExc {
    InvalidOp,
    DivideByZero,
    Overflow,
    Underflow,
    Inexact,
    InputDenorm,
}

/// Accumulate `exception` into the FPSR. Trapped exceptions (enable bit set
/// in the FPCR) have no architected user-mode handler here; raising one is a
/// guest configuration this recompiler does not implement.
pub fn process_exception(exception: FpExc, fpcr: Fpcr, fpsr: &mut Fpsr) {
    match exception {
        FpExc::InvalidOp => {
            if fpcr.ioe() {
                unimplemented!("trapped floating point exception: InvalidOp");
            }
            fpsr.set_ioc(true);
        }
        FpExc::DivideByZero => {
            if fpcr.dze() {
                unimplemented!("trapped floating point exception: DivideByZero");
            }
            fpsr.set_dzc(true);
        }
        FpExc::Overflow => {
            if fpcr.ofe() {
                unimplemented!("trapped floating point exception: Overflow");
            }
            fpsr.set_ofc(true);
        }
        FpExc::Underflow => {
            if fpcr.ufe() {
                unimplemented!("trapped floating point exception: Underflow");
            }
            fpsr.set_ufc(true);
        }
        FpExc::Inexact => {
            if fpcr.ixe() {
                unimplemented!("trapped floating point exception: Inexact");
            }
            fpsr.set_ixc(true);
        }
        FpExc::InputDenorm => {
            if fpcr.ide() {
                unimplemented!("trapped floating point exception: InputDenorm");
            }
            fpsr.set_idc(true);
        }
    }
}
