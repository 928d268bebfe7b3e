//! Table-driven instruction decoding.
//!
//! Tables are built from bit-pattern strings such as
//! `"cccc0000100Snnnnddddvvvvvtt0mmmm"`: `0` and `1` are fixed bits forming
//! the mask/expect pair, any other character is a named field the handler
//! extracts itself. Pattern strings are checked when the table is built;
//! dispatch picks the first matching entry.

use core::fmt;

/// A (mask, expect) pair derived from a pattern string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub mask: u32,
    pub expect: u32,
    pub bit_count: u32,
}

impl Pattern {
    /// Parse a pattern string of `bit_count` characters (16 or 32).
    pub fn parse(pattern: &str) -> Pattern {
        let bit_count = pattern.len() as u32;
        assert!(bit_count == 16 || bit_count == 32, "bad pattern width: {pattern:?}");

        let mut mask = 0u32;
        let mut expect = 0u32;
        for ch in pattern.chars() {
            mask <<= 1;
            expect <<= 1;
            match ch {
                '0' => mask |= 1,
                '1' => {
                    mask |= 1;
                    expect |= 1;
                }
                c if c.is_ascii_alphanumeric() => {}
                c => panic!("bad pattern character {c:?} in {pattern:?}"),
            }
        }

        Pattern { mask, expect, bit_count }
    }

    pub fn matches(&self, word: u32) -> bool {
        word & self.mask == self.expect
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern(mask: {:#010x}, expect: {:#010x})", self.mask, self.expect)
    }
}

/// One table row: pattern, mnemonic (for logs) and handler. The handler
/// appends IR for the instruction and returns whether translation may
/// continue into the following instruction.
pub struct DecodeEntry<V> {
    pub pattern: Pattern,
    pub name: &'static str,
    pub handler: fn(&mut V, u32) -> bool,
}

impl<V> DecodeEntry<V> {
    pub fn new(pattern: &str, name: &'static str, handler: fn(&mut V, u32) -> bool) -> Self {
        DecodeEntry { pattern: Pattern::parse(pattern), name, handler }
    }
}

/// Find the first entry matching `word`.
pub fn lookup<'a, V>(table: &'a [DecodeEntry<V>], word: u32) -> Option<&'a DecodeEntry<V>> {
    table.iter().find(|entry| entry.pattern.matches(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mask_and_expect() {
        let p = Pattern::parse("cccc0010100Snnnnddddrrrrvvvvvvvv");
        assert_eq!(p.mask, 0x0FE0_0000);
        assert_eq!(p.expect, 0x0280_0000);
        assert!(p.matches(0xE280_1001)); // add r1, r0, #1
        assert!(!p.matches(0xE240_1001)); // sub
    }

    #[test]
    fn sixteen_bit_patterns() {
        let p = Pattern::parse("00000vvvvvmmmddd");
        assert_eq!(p.bit_count, 16);
        assert!(p.matches(0x07C8)); // lsls r0, r1, #31
    }

    #[test]
    #[should_panic(expected = "bad pattern")]
    fn rejects_malformed_patterns() {
        Pattern::parse("0101");
    }

    #[test]
    fn first_match_wins() {
        struct V;
        let table = [
            DecodeEntry::<V>::new("1111111111111111", "specific", |_, _| false),
            DecodeEntry::<V>::new("1111111111111111", "shadowed", |_, _| true),
        ];
        let entry = lookup(&table, 0xFFFF).unwrap();
        assert_eq!(entry.name, "specific");
    }
}
