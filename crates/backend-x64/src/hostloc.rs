//! Locations a value can live in over a block.

use crate::abi::{Gpr, Xmm};

/// Where an IR value currently resides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostLoc {
    Gpr(Gpr),
    Xmm(Xmm),
    /// Index into the state record's spill area.
    Spill(usize),
}

impl HostLoc {
    pub fn gpr(self) -> Gpr {
        match self {
            HostLoc::Gpr(reg) => reg,
            other => panic!("expected a GPR location, got {other:?}"),
        }
    }

    pub fn xmm(self) -> Xmm {
        match self {
            HostLoc::Xmm(reg) => reg,
            other => panic!("expected an XMM location, got {other:?}"),
        }
    }
}
