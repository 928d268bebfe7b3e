//! The A64 frontend.

mod branch;
mod data_processing;
mod fp;
mod load_store;
mod location;
mod system;
mod table;
mod translate;

pub use self::location::A64LocationDescriptor;
pub use self::translate::{translate, translate_single_instruction};

/// Guest exceptions the A64 frontend can raise at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum Exception {
    UndefinedInstruction,
    UnpredictableInstruction,
    Breakpoint,
    WaitForInterrupt,
    WaitForEvent,
    SendEvent,
    SendEventLocal,
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
            6 => Exception::SendEventLocal,
            7 => Exception::Yield,
            other => panic!("unknown exception code {other}"),
        }
    }
}
