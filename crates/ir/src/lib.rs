//! Intermediate representation for translated guest code.
//!
//! Guest instructions decode into a linear, block-local IR: a sequence of
//! typed micro-ops in SSA form (each value defined once, used only by later
//! instructions in the same block) followed by exactly one [`Terminal`]
//! describing how control leaves the block. The representation is linear
//! rather than tree-shaped so that memory accesses keep their program order.
//!
//! The [`opt`] module holds the optimisation pipeline run between translation
//! and emission.

mod acc_type;
mod block;
mod cond;
mod emitter;
mod location;
mod opcode;
mod reg;
mod terminal;
mod types;
mod value;

pub mod opt;

pub use crate::acc_type::AccType;
pub use crate::block::{Block, Inst, InstData};
pub use crate::cond::Cond;
pub use crate::emitter::{IrEmitter, ResultAndCarry};
pub use crate::location::LocationDescriptor;
pub use crate::opcode::Opcode;
pub use crate::reg::{A32ExtReg, A32Reg, A64Reg, A64Vec};
pub use crate::terminal::Terminal;
pub use crate::types::Type;
pub use crate::value::Value;
