//! The A64 decode table.

use std::sync::LazyLock;

use super::translate::A64Translator;
use crate::decoder::DecodeEntry;

type Entry = DecodeEntry<A64Translator>;

pub(super) fn table() -> &'static [Entry] {
    static TABLE: LazyLock<Vec<Entry>> = LazyLock::new(build_table);
    &TABLE
}

fn build_table() -> Vec<Entry> {
    vec![
        // Branches.
        Entry::new("000101vvvvvvvvvvvvvvvvvvvvvvvvvv", "B", |t, w| t.a64_b(w)),
        Entry::new("100101vvvvvvvvvvvvvvvvvvvvvvvvvv", "BL", |t, w| t.a64_bl(w)),
        Entry::new("01010100vvvvvvvvvvvvvvvvvvv0cccc", "B.cond", |t, w| t.a64_b_cond(w)),
        Entry::new("z0110100vvvvvvvvvvvvvvvvvvvttttt", "CBZ", |t, w| t.a64_cbz(w, false)),
        Entry::new("z0110101vvvvvvvvvvvvvvvvvvvttttt", "CBNZ", |t, w| t.a64_cbz(w, true)),
        Entry::new("b0110110bbbbbvvvvvvvvvvvvvvttttt", "TBZ", |t, w| t.a64_tbz(w, false)),
        Entry::new("b0110111bbbbbvvvvvvvvvvvvvvttttt", "TBNZ", |t, w| t.a64_tbz(w, true)),
        Entry::new("1101011000011111000000nnnnn00000", "BR", |t, w| t.a64_br(w)),
        Entry::new("1101011000111111000000nnnnn00000", "BLR", |t, w| t.a64_blr(w)),
        Entry::new("1101011001011111000000nnnnn00000", "RET", |t, w| t.a64_ret(w)),

        // Exception generation and system.
        Entry::new("11010100000vvvvvvvvvvvvvvvv00001", "SVC", |t, w| t.a64_svc(w)),
        Entry::new("11010100001vvvvvvvvvvvvvvvv00000", "BRK", |t, w| t.a64_brk(w)),
        Entry::new("11010101000000110010vvvvvvv11111", "HINT", |t, w| t.a64_hint(w)),
        Entry::new("11010101000000110011vvvv10011111", "DSB", |t, _| t.a64_dsb_op()),
        Entry::new("11010101000000110011vvvv10111111", "DMB", |t, _| t.a64_dmb_op()),
        Entry::new("11010101000000110011vvvv11011111", "ISB", |t, _| t.a64_isb_op()),
        Entry::new("110101010001ooooooooooooooottttt", "MSR", |t, w| t.a64_msr(w)),
        Entry::new("110101010011ooooooooooooooottttt", "MRS", |t, w| t.a64_mrs(w)),
        Entry::new("1101010100001ooo0111vvvvooottttt", "SYS (cache)", |t, w| t.a64_sys_cache(w)),

        // PC-relative addressing.
        Entry::new("0vv10000vvvvvvvvvvvvvvvvvvvddddd", "ADR", |t, w| t.a64_adr(w, false)),
        Entry::new("1vv10000vvvvvvvvvvvvvvvvvvvddddd", "ADRP", |t, w| t.a64_adr(w, true)),

        // Data processing (immediate).
        Entry::new("z0s100010hvvvvvvvvvvvvnnnnnddddd", "ADD/ADDS (imm)", |t, w| {
            t.a64_add_sub_imm(w, false)
        }),
        Entry::new("z1s100010hvvvvvvvvvvvvnnnnnddddd", "SUB/SUBS (imm)", |t, w| {
            t.a64_add_sub_imm(w, true)
        }),
        Entry::new("zoo100100grrrrrrssssssnnnnnddddd", "logical (imm)", |t, w| {
            t.a64_logical_imm(w)
        }),
        Entry::new("zoo100101hhvvvvvvvvvvvvvvvvddddd", "MOVN/MOVZ/MOVK", |t, w| t.a64_move_wide(w)),
        Entry::new("zoo100110grrrrrrssssssnnnnnddddd", "UBFM/SBFM", |t, w| {
            t.a64_bitfield(w)
        }),

        // Data processing (register).
        Entry::new("z0s01011tt0mmmmmvvvvvvnnnnnddddd", "ADD/ADDS (reg)", |t, w| {
            t.a64_add_sub_reg(w, false)
        }),
        Entry::new("z1s01011tt0mmmmmvvvvvvnnnnnddddd", "SUB/SUBS (reg)", |t, w| {
            t.a64_add_sub_reg(w, true)
        }),
        Entry::new("zoo01010ttgmmmmmvvvvvvnnnnnddddd", "logical (reg)", |t, w| {
            t.a64_logical_reg(w)
        }),
        Entry::new("z0011010110mmmmm0010oonnnnnddddd", "LSLV family", |t, w| {
            t.a64_shift_variable(w)
        }),
        Entry::new("z0011010110mmmmm00001onnnnnddddd", "UDIV/SDIV", |t, w| t.a64_div(w)),
        Entry::new("z101101011000000000100nnnnnddddd", "CLZ", |t, w| t.a64_clz(w)),
        Entry::new("0101101011000000000010nnnnnddddd", "REV (w)", |t, w| t.a64_rev32(w)),
        Entry::new("1101101011000000000011nnnnnddddd", "REV (x)", |t, w| t.a64_rev64(w)),
        Entry::new("z0011011000mmmmm0aaaaannnnnddddd", "MADD", |t, w| t.a64_madd(w, false)),
        Entry::new("z0011011000mmmmm1aaaaannnnnddddd", "MSUB", |t, w| t.a64_madd(w, true)),
        Entry::new("zo011010100mmmmmcccc0gnnnnnddddd", "CSEL family", |t, w| t.a64_csel(w)),
        Entry::new("zo111010010mmmmmcccc00nnnnn0vvvv", "CCMN/CCMP (reg)", |t, w| {
            t.a64_ccmp_reg(w)
        }),
        Entry::new("zo111010010vvvvvcccc10nnnnn0vvvv", "CCMN/CCMP (imm)", |t, w| {
            t.a64_ccmp_imm(w)
        }),

        // Load/store exclusive and acquire/release.
        Entry::new("ss00100001011111011111nnnnnttttt", "LDXR", |t, w| t.a64_ldxr(w, false)),
        Entry::new("ss00100001011111111111nnnnnttttt", "LDAXR", |t, w| t.a64_ldxr(w, true)),
        Entry::new("ss001000000sssss011111nnnnnttttt", "STXR", |t, w| t.a64_stxr(w, false)),
        Entry::new("ss001000000sssss111111nnnnnttttt", "STLXR", |t, w| t.a64_stxr(w, true)),
        Entry::new("ss00100010011111111111nnnnnttttt", "STLR", |t, w| t.a64_stlr(w)),
        Entry::new("ss00100011011111111111nnnnnttttt", "LDAR", |t, w| t.a64_ldar(w)),

        // Load/store register.
        Entry::new("ss111001oovvvvvvvvvvvvnnnnnttttt", "LDR/STR (unsigned imm)", |t, w| {
            t.a64_load_store_imm_unsigned(w)
        }),
        Entry::new("ss111000oo0vvvvvvvvv00nnnnnttttt", "LDUR/STUR", |t, w| {
            t.a64_load_store_unscaled(w)
        }),
        Entry::new("ss111000oo0vvvvvvvvv01nnnnnttttt", "LDR/STR (post)", |t, w| {
            t.a64_load_store_imm_indexed(w, false)
        }),
        Entry::new("ss111000oo0vvvvvvvvv11nnnnnttttt", "LDR/STR (pre)", |t, w| {
            t.a64_load_store_imm_indexed(w, true)
        }),
        Entry::new("ss111000oo1mmmmmeeeg10nnnnnttttt", "LDR/STR (reg)", |t, w| {
            t.a64_load_store_reg_offset(w)
        }),
        Entry::new("oo011000vvvvvvvvvvvvvvvvvvvttttt", "LDR (literal)", |t, w| {
            t.a64_ldr_literal(w)
        }),
        Entry::new("oo10100iiLvvvvvvveeeeennnnnttttt", "LDP/STP", |t, w| t.a64_load_store_pair(w)),
        Entry::new("ss111101oovvvvvvvvvvvvnnnnnttttt", "LDR/STR (SIMD, unsigned imm)", |t, w| {
            t.a64_load_store_fp_imm_unsigned(w)
        }),

        // Scalar floating point.
        Entry::new("00011110ff100000010000nnnnnddddd", "FMOV (reg)", |t, w| t.a64_fmov_reg(w)),
        Entry::new("00011110ff10000or10000nnnnnddddd", "FABS/FNEG/FSQRT", |t, w| {
            t.a64_fp_unary(w)
        }),
        Entry::new("00011110ff1mmmmm001o10nnnnnddddd", "FADD/FSUB", |t, w| t.a64_fp_add_sub(w)),
        Entry::new("00011110ff1mmmmm000o10nnnnnddddd", "FMUL/FDIV", |t, w| t.a64_fp_mul_div(w)),
        Entry::new("00011111ff0mmmmmoaaaaannnnnddddd", "FMADD/FMSUB", |t, w| t.a64_fmadd(w)),
        Entry::new("00011110ff1mmmmm001000nnnnneg000", "FCMP", |t, w| t.a64_fcmp(w)),
        Entry::new("00011110ff100010o10000nnnnnddddd", "FCVT (f2f)", |t, w| t.a64_fcvt(w)),
        Entry::new("z0011110ff10001o000000nnnnnddddd", "SCVTF/UCVTF", |t, w| t.a64_cvtf(w)),
        Entry::new("z0011110ff11100o000000nnnnnddddd", "FCVTZS/FCVTZU", |t, w| t.a64_fcvtz(w)),
        Entry::new("z0011110ff10011o000000nnnnnddddd", "FMOV (core/fp)", |t, w| {
            t.a64_fmov_core(w)
        }),
    ]
}
