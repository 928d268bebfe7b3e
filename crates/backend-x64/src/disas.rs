//! Host-code disassembly for debugging, behind the `disas` feature.

use capstone::arch::x86::ArchMode;
use capstone::arch::BuildsCapstone;
use capstone::Capstone;

/// Disassemble `code` as x86-64, one formatted line per instruction.
pub fn disassemble(code: &[u8], base: u64) -> Vec<String> {
    let cs = Capstone::new()
        .x86()
        .mode(ArchMode::Mode64)
        .build()
        .expect("failed to construct the disassembler");

    let Ok(insns) = cs.disasm_all(code, base) else {
        return vec!["<disassembly failed>".to_string()];
    };
    insns
        .iter()
        .map(|i| {
            format!(
                "{:#018x}  {:8} {}",
                i.address(),
                i.mnemonic().unwrap_or(""),
                i.op_str().unwrap_or("")
            )
        })
        .collect()
}
