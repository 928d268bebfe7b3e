//! ARM (A32) instruction decoding and translation.
//!
//! One decode-table entry per instruction family; handlers extract their
//! fields from the raw word. Entries earlier in the table win, so specific
//! encodings (MOVW, MSR, hints) sit above the generic data-processing rows.

mod branch;
mod data_processing;
mod load_store;
mod misc;
mod multiply;
mod status_register;
mod synchronization;
mod vfp;

use std::sync::LazyLock;

use super::translate::A32Translator;
use crate::decoder::DecodeEntry;

type Entry = DecodeEntry<A32Translator>;

pub(super) fn table() -> &'static [Entry] {
    static TABLE: LazyLock<Vec<Entry>> = LazyLock::new(build_table);
    &TABLE
}

fn build_table() -> Vec<Entry> {
    vec![
        // Unconditional space.
        Entry::new("1111101hvvvvvvvvvvvvvvvvvvvvvvvv", "BLX (imm)", |t, w| t.arm_blx_imm(w)),
        Entry::new("11110101011111111111000000011111", "CLREX", |t, _| t.arm_clrex()),
        Entry::new("1111010101111111111100000100vvvv", "DSB", |t, _| t.arm_dsb()),
        Entry::new("1111010101111111111100000101vvvv", "DMB", |t, _| t.arm_dmb()),
        Entry::new("1111010101111111111100000110vvvv", "ISB", |t, _| t.arm_isb()),

        // Miscellaneous (must precede data processing).
        Entry::new("cccc00110000vvvvddddvvvvvvvvvvvv", "MOVW", |t, w| t.arm_movw(w)),
        Entry::new("cccc00110100vvvvddddvvvvvvvvvvvv", "MOVT", |t, w| t.arm_movt(w)),
        Entry::new("cccc00110010000011110000vvvvvvvv", "hints", |t, w| t.arm_hint(w)),
        Entry::new("cccc000100101111111111110001mmmm", "BX", |t, w| t.arm_bx(w)),
        Entry::new("cccc000100101111111111110011mmmm", "BLX (reg)", |t, w| t.arm_blx_reg(w)),
        Entry::new("cccc000101101111dddd11110001mmmm", "CLZ", |t, w| t.arm_clz(w)),
        Entry::new("cccc00010010vvvvvvvvvvvv0111vvvv", "BKPT", |t, w| t.arm_bkpt(w)),
        Entry::new("cccc000100001111dddd000000000000", "MRS", |t, w| t.arm_mrs(w)),
        Entry::new("cccc00010010mm00111100000000nnnn", "MSR (reg)", |t, w| t.arm_msr_reg(w)),
        Entry::new("cccc00110010mm001111rrrrvvvvvvvv", "MSR (imm)", |t, w| t.arm_msr_imm(w)),

        // Synchronization.
        Entry::new("cccc00011001nnnndddd111110011111", "LDREX", |t, w| t.arm_ldrex(w)),
        Entry::new("cccc00011101nnnndddd111110011111", "LDREXB", |t, w| t.arm_ldrexb(w)),
        Entry::new("cccc00011111nnnndddd111110011111", "LDREXH", |t, w| t.arm_ldrexh(w)),
        Entry::new("cccc00011011nnnndddd111110011111", "LDREXD", |t, w| t.arm_ldrexd(w)),
        Entry::new("cccc00011000nnnndddd11111001mmmm", "STREX", |t, w| t.arm_strex(w)),
        Entry::new("cccc00011100nnnndddd11111001mmmm", "STREXB", |t, w| t.arm_strexb(w)),
        Entry::new("cccc00011110nnnndddd11111001mmmm", "STREXH", |t, w| t.arm_strexh(w)),
        Entry::new("cccc00011010nnnndddd11111001mmmm", "STREXD", |t, w| t.arm_strexd(w)),

        // Multiplies.
        Entry::new("cccc0000000Sdddd0000ssss1001mmmm", "MUL", |t, w| t.arm_mul(w)),
        Entry::new("cccc0000001Sddddaaaassss1001mmmm", "MLA", |t, w| t.arm_mla(w)),
        Entry::new("cccc0000100Shhhhllllssss1001mmmm", "UMULL", |t, w| t.arm_umull(w)),
        Entry::new("cccc0000101Shhhhllllssss1001mmmm", "UMLAL", |t, w| t.arm_umlal(w)),
        Entry::new("cccc0000110Shhhhllllssss1001mmmm", "SMULL", |t, w| t.arm_smull(w)),
        Entry::new("cccc0000111Shhhhllllssss1001mmmm", "SMLAL", |t, w| t.arm_smlal(w)),

        // Extension and reversal.
        Entry::new("cccc011010101111ddddrr000111mmmm", "SXTB", |t, w| t.arm_sxtb(w)),
        Entry::new("cccc011010111111ddddrr000111mmmm", "SXTH", |t, w| t.arm_sxth(w)),
        Entry::new("cccc011011101111ddddrr000111mmmm", "UXTB", |t, w| t.arm_uxtb(w)),
        Entry::new("cccc011011111111ddddrr000111mmmm", "UXTH", |t, w| t.arm_uxth(w)),
        Entry::new("cccc011010111111dddd11110011mmmm", "REV", |t, w| t.arm_rev(w)),
        Entry::new("cccc011010111111dddd11111011mmmm", "REV16", |t, w| t.arm_rev16(w)),
        Entry::new("cccc01101000nnnndddd11111011mmmm", "SEL", |t, w| t.arm_sel(w)),

        // VFP.
        Entry::new("cccc11100d00nnnndddd101zn0m0mmmm", "VMLA", |t, w| t.vfp_vmla(w)),
        Entry::new("cccc11100d00nnnndddd101zn1m0mmmm", "VMLS", |t, w| t.vfp_vmls(w)),
        Entry::new("cccc11100d11nnnndddd101zn0m0mmmm", "VADD", |t, w| t.vfp_vadd(w)),
        Entry::new("cccc11100d11nnnndddd101zn1m0mmmm", "VSUB", |t, w| t.vfp_vsub(w)),
        Entry::new("cccc11100d10nnnndddd101zn0m0mmmm", "VMUL", |t, w| t.vfp_vmul(w)),
        Entry::new("cccc11101d00nnnndddd101zn0m0mmmm", "VDIV", |t, w| t.vfp_vdiv(w)),
        Entry::new("cccc11101d110000dddd101z01m0mmmm", "VMOV (reg)", |t, w| t.vfp_vmov_reg(w)),
        Entry::new("cccc11101d110000dddd101z11m0mmmm", "VABS", |t, w| t.vfp_vabs(w)),
        Entry::new("cccc11101d110001dddd101z01m0mmmm", "VNEG", |t, w| t.vfp_vneg(w)),
        Entry::new("cccc11101d110001dddd101z11m0mmmm", "VSQRT", |t, w| t.vfp_vsqrt(w)),
        Entry::new("cccc11101d110100dddd101ze1m0mmmm", "VCMP", |t, w| t.vfp_vcmp(w)),
        Entry::new("cccc11101d110101dddd101ze1000000", "VCMP (zero)", |t, w| t.vfp_vcmp_zero(w)),
        Entry::new("cccc11101d110111dddd101z11m0mmmm", "VCVT (f2f)", |t, w| t.vfp_vcvt_f2f(w)),
        Entry::new("cccc11101d111000dddd101zo1m0mmmm", "VCVT (int to fp)", |t, w| t.vfp_vcvt_from_int(w)),
        Entry::new("cccc11101d11110odddd101zr1m0mmmm", "VCVT (fp to int)", |t, w| t.vfp_vcvt_to_int(w)),
        Entry::new("cccc1101ud01nnnndddd101zvvvvvvvv", "VLDR", |t, w| t.vfp_vldr(w)),
        Entry::new("cccc1101ud00nnnndddd101zvvvvvvvv", "VSTR", |t, w| t.vfp_vstr(w)),
        Entry::new("cccc1110000onnnntttt1010n0010000", "VMOV (core/S)", |t, w| t.vfp_vmov_core_single(w)),
        Entry::new("cccc1100010otttteeee101100m1mmmm", "VMOV (2 core/D)", |t, w| t.vfp_vmov_two_core_double(w)),
        Entry::new("cccc111011110001tttt101000010000", "VMRS", |t, w| t.vfp_vmrs(w)),
        Entry::new("cccc111011100001tttt101000010000", "VMSR", |t, w| t.vfp_vmsr(w)),

        // Branches.
        Entry::new("cccc1010vvvvvvvvvvvvvvvvvvvvvvvv", "B", |t, w| t.arm_b(w)),
        Entry::new("cccc1011vvvvvvvvvvvvvvvvvvvvvvvv", "BL", |t, w| t.arm_bl(w)),

        // Load/store.
        Entry::new("cccc010pubw1nnnnddddvvvvvvvvvvvv", "LDR/LDRB (imm)", |t, w| {
            t.arm_load_store_imm(w)
        }),
        Entry::new("cccc010pubw0nnnnddddvvvvvvvvvvvv", "STR/STRB (imm)", |t, w| {
            t.arm_load_store_imm(w)
        }),
        Entry::new("cccc011pubw1nnnnddddvvvvvrr0mmmm", "LDR/LDRB (reg)", |t, w| {
            t.arm_load_store_reg(w)
        }),
        Entry::new("cccc011pubw0nnnnddddvvvvvrr0mmmm", "STR/STRB (reg)", |t, w| {
            t.arm_load_store_reg(w)
        }),
        Entry::new("cccc000pu1wlnnnnddddvvvv1011vvvv", "LDRH/STRH (imm)", |t, w| {
            t.arm_load_store_half_imm(w)
        }),
        Entry::new("cccc000pu0wlnnnndddd00001011mmmm", "LDRH/STRH (reg)", |t, w| {
            t.arm_load_store_half_reg(w)
        }),
        Entry::new("cccc000pu1w1nnnnddddvvvv1101vvvv", "LDRSB (imm)", |t, w| {
            t.arm_ldrsb_imm(w)
        }),
        Entry::new("cccc000pu0w1nnnndddd00001101mmmm", "LDRSB (reg)", |t, w| {
            t.arm_ldrsb_reg(w)
        }),
        Entry::new("cccc000pu1w1nnnnddddvvvv1111vvvv", "LDRSH (imm)", |t, w| {
            t.arm_ldrsh_imm(w)
        }),
        Entry::new("cccc000pu0w1nnnndddd00001111mmmm", "LDRSH (reg)", |t, w| {
            t.arm_ldrsh_reg(w)
        }),
        Entry::new("cccc100pusw1nnnnrrrrrrrrrrrrrrrr", "LDM", |t, w| t.arm_ldm(w)),
        Entry::new("cccc100pusw0nnnnrrrrrrrrrrrrrrrr", "STM", |t, w| t.arm_stm(w)),

        // Data processing. The S=0 comparison rows never reach here because
        // the miscellaneous space above claims them.
        Entry::new("cccc001ooooSnnnnddddrrrrvvvvvvvv", "data processing (imm)", |t, w| {
            t.arm_data_processing_imm(w)
        }),
        Entry::new("cccc000ooooSnnnnddddvvvvvrr0mmmm", "data processing (reg)", |t, w| {
            t.arm_data_processing_reg(w)
        }),
        Entry::new("cccc000ooooSnnnnddddssss0rr1mmmm", "data processing (rsr)", |t, w| {
            t.arm_data_processing_rsr(w)
        }),

        // Exception generation.
        Entry::new("cccc1111vvvvvvvvvvvvvvvvvvvvvvvv", "SVC", |t, w| t.arm_svc(w)),
        Entry::new("111001111111vvvvvvvvvvvv1111vvvv", "UDF", |t, _| t.undefined_instruction()),
    ]
}
