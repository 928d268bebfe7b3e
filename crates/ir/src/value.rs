//! IR values: immediates and references to instruction results.

use core::fmt;

use crate::acc_type::AccType;
use crate::block::{Block, Inst};
use crate::cond::Cond;
use crate::reg::{A32ExtReg, A32Reg, A64Reg, A64Vec};
use crate::types::Type;

/// An operand: either an immediate or the result of an earlier instruction
/// in the same block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value {
    Void,
    Inst(Inst),
    U1(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Cond(Cond),
    AccType(AccType),
    A32Reg(A32Reg),
    A32ExtReg(A32ExtReg),
    A64Reg(A64Reg),
    A64Vec(A64Vec),
}

impl Value {
    pub fn is_immediate(self) -> bool {
        !matches!(self, Value::Inst(_))
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Value::Void)
    }

    /// The instruction this value references, if any.
    pub fn inst(self) -> Option<Inst> {
        match self {
            Value::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    /// The type of this value. Instruction references take the type of the
    /// producing opcode.
    pub fn ty(self, block: &Block) -> Type {
        match self {
            Value::Void => Type::Void,
            Value::Inst(inst) => block[inst].opcode.result_type(),
            Value::U1(_) => Type::U1,
            Value::U8(_) => Type::U8,
            Value::U16(_) => Type::U16,
            Value::U32(_) => Type::U32,
            Value::U64(_) => Type::U64,
            Value::Cond(_) => Type::Cond,
            Value::AccType(_) => Type::AccType,
            Value::A32Reg(_) => Type::A32Reg,
            Value::A32ExtReg(_) => Type::A32ExtReg,
            Value::A64Reg(_) => Type::A64Reg,
            Value::A64Vec(_) => Type::A64Vec,
        }
    }

    pub fn u1(self) -> bool {
        match self {
            Value::U1(v) => v,
            _ => panic!("expected a u1 immediate, got {self:?}"),
        }
    }

    pub fn u8(self) -> u8 {
        match self {
            Value::U8(v) => v,
            _ => panic!("expected a u8 immediate, got {self:?}"),
        }
    }

    pub fn u16(self) -> u16 {
        match self {
            Value::U16(v) => v,
            _ => panic!("expected a u16 immediate, got {self:?}"),
        }
    }

    pub fn u32(self) -> u32 {
        match self {
            Value::U32(v) => v,
            _ => panic!("expected a u32 immediate, got {self:?}"),
        }
    }

    pub fn u64(self) -> u64 {
        match self {
            Value::U64(v) => v,
            _ => panic!("expected a u64 immediate, got {self:?}"),
        }
    }

    /// Any integer immediate, zero extended to 64 bits.
    pub fn immediate_u64(self) -> u64 {
        match self {
            Value::U1(v) => u64::from(v),
            Value::U8(v) => u64::from(v),
            Value::U16(v) => u64::from(v),
            Value::U32(v) => u64::from(v),
            Value::U64(v) => v,
            _ => panic!("expected an integer immediate, got {self:?}"),
        }
    }

    pub fn cond(self) -> Cond {
        match self {
            Value::Cond(v) => v,
            _ => panic!("expected a condition immediate, got {self:?}"),
        }
    }

    pub fn acc_type(self) -> AccType {
        match self {
            Value::AccType(v) => v,
            _ => panic!("expected an access type immediate, got {self:?}"),
        }
    }

    pub fn a32_reg(self) -> A32Reg {
        match self {
            Value::A32Reg(v) => v,
            _ => panic!("expected an A32 register immediate, got {self:?}"),
        }
    }

    pub fn a32_ext_reg(self) -> A32ExtReg {
        match self {
            Value::A32ExtReg(v) => v,
            _ => panic!("expected an A32 extension register immediate, got {self:?}"),
        }
    }

    pub fn a64_reg(self) -> A64Reg {
        match self {
            Value::A64Reg(v) => v,
            _ => panic!("expected an A64 register immediate, got {self:?}"),
        }
    }

    pub fn a64_vec(self) -> A64Vec {
        match self {
            Value::A64Vec(v) => v,
            _ => panic!("expected an A64 vector immediate, got {self:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("<void>"),
            Value::Inst(inst) => write!(f, "%{}", inst.index()),
            Value::U1(v) => write!(f, "{}", u8::from(*v)),
            Value::U8(v) => write!(f, "{v:#x}"),
            Value::U16(v) => write!(f, "{v:#x}"),
            Value::U32(v) => write!(f, "{v:#x}"),
            Value::U64(v) => write!(f, "{v:#x}"),
            Value::Cond(v) => write!(f, "{v}"),
            Value::AccType(v) => write!(f, "{v:?}"),
            Value::A32Reg(v) => write!(f, "{v}"),
            Value::A32ExtReg(v) => write!(f, "{v}"),
            Value::A64Reg(v) => write!(f, "{v}"),
            Value::A64Vec(v) => write!(f, "{v}"),
        }
    }
}
