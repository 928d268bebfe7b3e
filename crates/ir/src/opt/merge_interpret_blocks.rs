//! Widening of interpreter fallback hops.

use crate::block::Block;
use crate::location::LocationDescriptor;
use crate::terminal::Terminal;

/// If the block ends in an interpreter hop and the instructions that follow
/// would each also translate to a lone interpreter hop, merge the run into a
/// single multi-instruction fallback to cut dispatcher churn.
///
/// `is_interpret_only` asks the frontend whether the single instruction at
/// the given location translates to nothing but an interpreter terminal for
/// itself; `advance` steps a descriptor over `n` instructions.
pub fn merge_interpret_blocks(
    block: &mut Block,
    advance: impl Fn(LocationDescriptor, usize) -> LocationDescriptor,
    mut is_interpret_only: impl FnMut(LocationDescriptor) -> bool,
) {
    let next = match block.terminal() {
        Terminal::Interpret { next, .. } => *next,
        _ => return,
    };

    let mut num_instructions = 1;
    while is_interpret_only(advance(next, num_instructions)) {
        num_instructions += 1;
    }

    if num_instructions > 1 {
        log::debug!("merged {num_instructions} interpreted instructions at {next}");
    }
    block.replace_terminal(Terminal::Interpret { next, num_instructions });
    block.cycle_count += num_instructions as u64 - 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widens_runs_of_interpret_instructions() {
        let mut block = Block::new(LocationDescriptor::new(0x1000));
        block.cycle_count = 1;
        block.set_terminal(Terminal::Interpret {
            next: LocationDescriptor::new(0x1000),
            num_instructions: 1,
        });

        // Three following instructions interpret; the fourth does not.
        merge_interpret_blocks(
            &mut block,
            |loc, n| LocationDescriptor::new(loc.value() + 4 * n as u64),
            |loc| loc.value() < 0x1010,
        );

        assert_eq!(
            *block.terminal(),
            Terminal::Interpret { next: LocationDescriptor::new(0x1000), num_instructions: 4 }
        );
        assert_eq!(block.cycle_count, 4);
    }

    #[test]
    fn leaves_other_terminals_alone() {
        let mut block = Block::new(LocationDescriptor::new(0));
        block.set_terminal(Terminal::ReturnToDispatch);
        merge_interpret_blocks(
            &mut block,
            |loc, n| LocationDescriptor::new(loc.value() + 4 * n as u64),
            |_| true,
        );
        assert_eq!(*block.terminal(), Terminal::ReturnToDispatch);
    }
}
