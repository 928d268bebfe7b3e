//! The A32/Thumb frontend.

mod arm;
mod itstate;
mod location;
mod thumb;
mod translate;

pub use self::itstate::ItState;
pub use self::location::A32LocationDescriptor;
pub use self::translate::{translate, translate_single_instruction};

/// Guest exceptions the A32 frontend can raise at run time through the
/// `ExceptionRaised` callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum Exception {
    UndefinedInstruction,
    UnpredictableInstruction,
    Breakpoint,
    WaitForInterrupt,
    WaitForEvent,
    SendEvent,
    Yield,
}

impl Exception {
    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn from_code(code: u64) -> Exception {
        match code {
            0 => Exception::UndefinedInstruction,
            1 => Exception::UnpredictableInstruction,
            2 => Exception::Breakpoint,
            3 => Exception::WaitForInterrupt,
            4 => Exception::WaitForEvent,
            5 => Exception::SendEvent,
            6 => Exception::Yield,
            other => panic!("unknown exception code {other}"),
        }
    }
}
