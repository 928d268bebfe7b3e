//! Basic blocks: instruction storage and use tracking.

use core::fmt;
use core::ops::{Index, IndexMut};

use crate::cond::Cond;
use crate::location::LocationDescriptor;
use crate::opcode::Opcode;
use crate::terminal::Terminal;
use crate::value::Value;

/// Reference to an instruction within its block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);

impl Inst {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Inst {
        Inst(index as u32)
    }
}

impl fmt::Debug for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inst{}", self.0)
    }
}

/// One micro-op: opcode, operands, and a count of how many later operands
/// reference its result.
#[derive(Clone, Debug)]
pub struct InstData {
    pub opcode: Opcode,
    pub args: [Value; 4],
    pub use_count: u32,
}

impl InstData {
    /// The populated operand slots.
    pub fn args(&self) -> &[Value] {
        &self.args[..self.opcode.arg_types().len()]
    }

    pub fn has_uses(&self) -> bool {
        self.use_count > 0
    }
}

/// A basic block: zero or more instructions followed by exactly one
/// terminal.
///
/// Instruction storage and program order are separate: `insts` never moves
/// (so `Inst` references stay valid) while `order` carries the layout,
/// allowing passes to insert replacement sequences before an existing
/// instruction. Removed instructions become `Void` tombstones; iteration and
/// emission skip them.
#[derive(Clone, Debug)]
pub struct Block {
    location: LocationDescriptor,
    end_location: LocationDescriptor,
    /// Condition to pass for the block body to execute (A32 conditional
    /// instructions translate into conditional blocks).
    pub cond: Cond,
    /// Where to continue when `cond` fails.
    pub cond_failed: Option<LocationDescriptor>,
    insts: Vec<InstData>,
    order: Vec<Inst>,
    terminal: Terminal,
    /// Number of guest cycles this block accounts for.
    pub cycle_count: u64,
}

impl Block {
    pub fn new(location: LocationDescriptor) -> Block {
        Block {
            location,
            end_location: location,
            cond: Cond::AL,
            cond_failed: None,
            insts: Vec::new(),
            order: Vec::new(),
            terminal: Terminal::Invalid,
            cycle_count: 0,
        }
    }

    /// Descriptor of the first instruction in the block.
    pub fn location(&self) -> LocationDescriptor {
        self.location
    }

    /// Descriptor one past the last translated instruction.
    pub fn end_location(&self) -> LocationDescriptor {
        self.end_location
    }

    pub fn set_end_location(&mut self, location: LocationDescriptor) {
        self.end_location = location;
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    pub fn set_terminal(&mut self, terminal: Terminal) {
        debug_assert!(
            matches!(self.terminal, Terminal::Invalid),
            "only one terminal per block is allowed"
        );
        self.terminal = terminal;
    }

    pub fn replace_terminal(&mut self, terminal: Terminal) {
        self.terminal = terminal;
    }

    pub fn has_terminal(&self) -> bool {
        !matches!(self.terminal, Terminal::Invalid)
    }

    fn push_data(&mut self, opcode: Opcode, args: &[Value]) -> Inst {
        debug_assert_eq!(
            args.len(),
            opcode.arg_types().len(),
            "wrong operand count for {}",
            opcode.name()
        );

        let mut stored = [Value::Void; 4];
        for (slot, &arg) in stored.iter_mut().zip(args) {
            *slot = arg;
            if let Value::Inst(inst) = arg {
                self.insts[inst.index()].use_count += 1;
            }
        }

        let inst = Inst::from_index(self.insts.len());
        self.insts.push(InstData { opcode, args: stored, use_count: 0 });
        inst
    }

    /// Append an instruction, bumping the use counts of its operands.
    pub fn append(&mut self, opcode: Opcode, args: &[Value]) -> Inst {
        let inst = self.push_data(opcode, args);
        self.order.push(inst);
        inst
    }

    /// Insert an instruction into the layout just before `before`. Used by
    /// passes that replace one instruction with a sequence.
    pub fn insert_before(&mut self, before: Inst, opcode: Opcode, args: &[Value]) -> Inst {
        let inst = self.push_data(opcode, args);
        let position = self
            .order
            .iter()
            .position(|&i| i == before)
            .expect("insertion point is not in the block layout");
        self.order.insert(position, inst);
        inst
    }

    /// Number of instruction slots, tombstones included.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Live instructions in program order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Inst> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|&inst| self.insts[inst.index()].opcode != Opcode::Void)
    }

    /// Replace operand `index` of `inst`, keeping use counts coherent.
    pub fn set_arg(&mut self, inst: Inst, index: usize, value: Value) {
        let old = self.insts[inst.index()].args[index];
        if let Value::Inst(dep) = old {
            self.insts[dep.index()].use_count -= 1;
        }
        if let Value::Inst(dep) = value {
            self.insts[dep.index()].use_count += 1;
        }
        self.insts[inst.index()].args[index] = value;
    }

    /// Rewrite every use of `inst`'s result to `replacement` and invalidate
    /// `inst`.
    pub fn replace_uses_with(&mut self, inst: Inst, replacement: Value) {
        debug_assert!(replacement.inst() != Some(inst));

        for user_index in 0..self.insts.len() {
            let user = Inst::from_index(user_index);
            for arg_index in 0..self.insts[user_index].args().len() {
                if self.insts[user_index].args[arg_index] == Value::Inst(inst) {
                    self.set_arg(user, arg_index, replacement);
                }
            }
        }

        self.invalidate(inst);
    }

    /// Turn `inst` into a tombstone, releasing its operands.
    pub fn invalidate(&mut self, inst: Inst) {
        debug_assert_eq!(
            self.insts[inst.index()].use_count,
            0,
            "invalidating an instruction that still has uses"
        );

        for arg_index in 0..self.insts[inst.index()].args().len() {
            self.set_arg(inst, arg_index, Value::Void);
        }
        self.insts[inst.index()].opcode = Opcode::Void;
    }

    /// Find the pseudo operation of kind `opcode` attached to `inst`, if
    /// any.
    pub fn associated_pseudo_op(&self, inst: Inst, opcode: Opcode) -> Option<Inst> {
        debug_assert!(opcode.is_pseudo_operation());
        self.iter().find(|&candidate| {
            self.insts[candidate.index()].opcode == opcode
                && self.insts[candidate.index()].args[0] == Value::Inst(inst)
        })
    }
}

impl Index<Inst> for Block {
    type Output = InstData;

    fn index(&self, inst: Inst) -> &InstData {
        &self.insts[inst.index()]
    }
}

impl IndexMut<Inst> for Block {
    fn index_mut(&mut self, inst: Inst) -> &mut InstData {
        &mut self.insts[inst.index()]
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "block @ {} (cycles: {})", self.location, self.cycle_count)?;
        if self.cond != Cond::AL {
            writeln!(f, "  cond: {} (failed -> {:?})", self.cond, self.cond_failed)?;
        }
        for inst in self.iter() {
            let data = &self[inst];
            write!(f, "  %{:<3} = {}", inst.index(), data.opcode.name())?;
            for arg in data.args() {
                write!(f, " {arg}")?;
            }
            writeln!(f, " (uses: {})", data.use_count)?;
        }
        writeln!(f, "  terminal: {:?}", self.terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationDescriptor;

    #[test]
    fn use_counts_track_references() {
        let mut block = Block::new(LocationDescriptor::new(0));
        let a = block.append(Opcode::A32GetRegister, &[Value::A32Reg(crate::A32Reg::R0)]);
        let b = block.append(Opcode::Add32, &[Value::Inst(a), Value::U32(1), Value::U1(false)]);
        assert_eq!(block[a].use_count, 1);
        assert_eq!(block[b].use_count, 0);

        let c = block.append(
            Opcode::Add32,
            &[Value::Inst(b), Value::Inst(b), Value::U1(false)],
        );
        assert_eq!(block[b].use_count, 2);

        block.set_arg(c, 1, Value::U32(5));
        assert_eq!(block[b].use_count, 1);
    }

    #[test]
    fn replace_uses_rewrites_and_invalidates() {
        let mut block = Block::new(LocationDescriptor::new(0));
        let a = block.append(Opcode::A32GetRegister, &[Value::A32Reg(crate::A32Reg::R1)]);
        let b = block.append(Opcode::Add32, &[Value::Inst(a), Value::U32(2), Value::U1(false)]);
        block.append(Opcode::A32SetRegister, &[Value::A32Reg(crate::A32Reg::R0), Value::Inst(b)]);

        block.replace_uses_with(b, Value::U32(42));
        assert_eq!(block[a].use_count, 0);
        assert_eq!(block[b].opcode, Opcode::Void);

        let set = block.iter().last().unwrap();
        assert_eq!(block[set].args[1], Value::U32(42));
    }

    #[test]
    fn associated_pseudo_ops_are_found() {
        let mut block = Block::new(LocationDescriptor::new(0));
        let add = block.append(Opcode::Add32, &[Value::U32(1), Value::U32(2), Value::U1(false)]);
        let carry = block.append(Opcode::GetCarryFromOp, &[Value::Inst(add)]);
        assert_eq!(block.associated_pseudo_op(add, Opcode::GetCarryFromOp), Some(carry));
        assert_eq!(block.associated_pseudo_op(add, Opcode::GetOverflowFromOp), None);
    }
}
