//! Replacement of reads from read-only guest memory with their values.

use crate::block::Block;
use crate::opcode::Opcode;
use crate::value::Value;

/// What the pass needs from the host: a read-only query and code-address
/// readers. Reads performed here happen at translation time, so the host
/// must answer them without side effects.
pub trait A32ConstMemoryCallbacks {
    fn is_read_only_memory(&mut self, vaddr: u32) -> bool;
    fn read8(&mut self, vaddr: u32) -> u8;
    fn read16(&mut self, vaddr: u32) -> u16;
    fn read32(&mut self, vaddr: u32) -> u32;
    fn read64(&mut self, vaddr: u32) -> u64;
}

/// For every memory read at a compile-time constant address which the host
/// reports as read-only, read the value once now and substitute it.
pub fn a32_constant_memory_reads(block: &mut Block, cb: &mut dyn A32ConstMemoryCallbacks) {
    let insts: Vec<_> = block.iter().collect();
    for inst in insts {
        let opcode = block[inst].opcode;
        let replacement = match opcode {
            Opcode::A32ReadMemory8 | Opcode::A32ReadMemory16 | Opcode::A32ReadMemory32
            | Opcode::A32ReadMemory64 => {
                let vaddr = match block[inst].args[0] {
                    Value::U32(vaddr) => vaddr,
                    _ => continue,
                };
                if !cb.is_read_only_memory(vaddr) {
                    continue;
                }
                match opcode {
                    Opcode::A32ReadMemory8 => Value::U8(cb.read8(vaddr)),
                    Opcode::A32ReadMemory16 => Value::U16(cb.read16(vaddr)),
                    Opcode::A32ReadMemory32 => Value::U32(cb.read32(vaddr)),
                    Opcode::A32ReadMemory64 => Value::U64(cb.read64(vaddr)),
                    _ => unreachable!(),
                }
            }
            _ => continue,
        };

        log::trace!(
            "constant memory read at {:#x} folded to {replacement}",
            block[inst].args[0].u32()
        );
        block.replace_uses_with(inst, replacement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{A32Reg, AccType, IrEmitter, LocationDescriptor};

    struct RomBelow0x1000;

    impl A32ConstMemoryCallbacks for RomBelow0x1000 {
        fn is_read_only_memory(&mut self, vaddr: u32) -> bool {
            vaddr < 0x1000
        }
        fn read8(&mut self, _vaddr: u32) -> u8 {
            0xAB
        }
        fn read16(&mut self, _vaddr: u32) -> u16 {
            0xABCD
        }
        fn read32(&mut self, vaddr: u32) -> u32 {
            0x1000_0000 | vaddr
        }
        fn read64(&mut self, _vaddr: u32) -> u64 {
            0xDEAD_BEEF
        }
    }

    #[test]
    fn read_only_reads_fold_and_writable_reads_stay() {
        let mut ir = IrEmitter::new(Block::new(LocationDescriptor::new(0)));
        let rom = ir.a32_read_memory_32(ir.imm32(0x100), AccType::Normal);
        ir.a32_set_register(A32Reg::R0, rom);
        let ram = ir.a32_read_memory_32(ir.imm32(0x2000), AccType::Normal);
        ir.a32_set_register(A32Reg::R1, ram);
        let dynamic = ir.a32_get_register(A32Reg::R2);
        let indirect = ir.a32_read_memory_32(dynamic, AccType::Normal);
        ir.a32_set_register(A32Reg::R3, indirect);

        let mut block = ir.block;
        a32_constant_memory_reads(&mut block, &mut RomBelow0x1000);

        let reads: Vec<_> =
            block.iter().filter(|&i| block[i].opcode == Opcode::A32ReadMemory32).collect();
        assert_eq!(reads.len(), 2);

        let r0_set = block.iter().find(|&i| block[i].opcode == Opcode::A32SetRegister).unwrap();
        assert_eq!(block[r0_set].args[1], Value::U32(0x1000_0100));
    }
}
