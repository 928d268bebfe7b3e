//! Guest register names referenced by IR operands.

use core::fmt;

/// A32 core register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum A32Reg {
    R0, R1, R2, R3, R4, R5, R6, R7,
    R8, R9, R10, R11, R12, SP, LR, PC,
}

impl A32Reg {
    pub fn from_index(index: u32) -> A32Reg {
        assert!(index < 16);
        // Discriminants are the architectural register numbers.
        unsafe { core::mem::transmute(index as u8) }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for A32Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A32Reg::SP => f.write_str("sp"),
            A32Reg::LR => f.write_str("lr"),
            A32Reg::PC => f.write_str("pc"),
            _ => write!(f, "r{}", self.index()),
        }
    }
}

/// A32 extension register: S0-S31 viewed as singles, D0-D31 as doubles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum A32ExtReg {
    S(u8),
    D(u8),
}

impl A32ExtReg {
    pub fn number(self) -> usize {
        match self {
            A32ExtReg::S(n) | A32ExtReg::D(n) => usize::from(n),
        }
    }
}

impl fmt::Display for A32ExtReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A32ExtReg::S(n) => write!(f, "s{n}"),
            A32ExtReg::D(n) => write!(f, "d{n}"),
        }
    }
}

/// A64 general purpose register number (X0-X30).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct A64Reg(pub u8);

impl A64Reg {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for A64Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A64 SIMD/FP register number (V0-V31).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct A64Vec(pub u8);

impl A64Vec {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for A64Vec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
