//! Block terminals: how control leaves a translated block.

use crate::cond::Cond;
use crate::location::LocationDescriptor;

/// The outgoing edge of a block. Emitted after all of the block's
/// instructions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// Placeholder before translation decides the real terminal.
    Invalid,

    /// Hand `num_instructions` guest instructions starting at `next` to the
    /// host's interpreter fallback, then return to the dispatcher.
    Interpret { next: LocationDescriptor, num_instructions: usize },

    /// Return to the dispatcher, which will either jump to previously
    /// compiled code or compile the block at the current location.
    ReturnToDispatch,

    /// Jump to the block at `next`, patched directly once that block exists.
    /// Checks the cycle budget before the jump.
    LinkBlock { next: LocationDescriptor },

    /// Jump to the block at `next`, without a cycle check. On a miss the
    /// terminal falls through to a dispatcher return.
    LinkBlockFast { next: LocationDescriptor },

    /// Pop the return stack buffer and jump to the popped host address if
    /// its descriptor matches the current location; otherwise return to the
    /// dispatcher.
    PopRSBHint,

    /// Look the current location up in the fast dispatch table; on a miss,
    /// return to the dispatcher.
    FastDispatchHint,

    /// Conditional choice between two terminals.
    If { cond: Cond, then_: Box<Terminal>, else_: Box<Terminal> },

    /// Choose a terminal based on the state's check bit (set by the
    /// SetCheckBit micro-op earlier in the block).
    CheckBit { then_: Box<Terminal>, else_: Box<Terminal> },

    /// Continue with `else_` only if no halt has been requested; otherwise
    /// return from run code.
    CheckHalt { else_: Box<Terminal> },
}

impl Terminal {
    /// Convenience constructor for [`Terminal::If`].
    pub fn if_(cond: Cond, then_: Terminal, else_: Terminal) -> Terminal {
        Terminal::If { cond, then_: Box::new(then_), else_: Box::new(else_) }
    }

    /// Convenience constructor for [`Terminal::CheckBit`].
    pub fn check_bit(then_: Terminal, else_: Terminal) -> Terminal {
        Terminal::CheckBit { then_: Box::new(then_), else_: Box::new(else_) }
    }

    /// Convenience constructor for [`Terminal::CheckHalt`].
    pub fn check_halt(else_: Terminal) -> Terminal {
        Terminal::CheckHalt { else_: Box::new(else_) }
    }
}
