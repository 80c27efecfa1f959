//! Fixed-width routine walker for word-aligned architectures.
//!
//! Reads one instruction word at a time in the profile's byte order and acts
//! on the first matching non-generic word rule: prologues split routines,
//! returns end them, calls and branches yield operand offsets when their
//! relative target lands inside the source.

use crate::scan::ByteRange;
use crate::sigdb::profile::{read_word, ArchitectureProfile, RuleKind};

pub(crate) fn walk(
    data: &[u8],
    base: u64,
    source_len: u64,
    profile: &ArchitectureProfile,
    limit: usize,
) -> (Vec<ByteRange>, Vec<u64>) {
    let width = profile.alignment;
    let mut routines: Vec<ByteRange> = Vec::new();
    let mut targets: Vec<u64> = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0usize;

    while i + width <= data.len() && routines.len() < limit {
        let word = read_word(&data[i..i + width], profile.info.endianness);

        if start.is_none() {
            // Zero-word padding between routines.
            if word == 0 {
                i += width;
                continue;
            }
            start = Some(i);
        }

        match profile.classify_word(word).map(|r| r.kind) {
            Some(RuleKind::Prologue) => {
                // A prologue word at the open routine's own start does not
                // split it.
                if let Some(s) = start.filter(|&s| i > s) {
                    routines.push(ByteRange::new(base + s as u64, base + i as u64));
                    start = Some(i);
                }
            }
            Some(RuleKind::Return) => {
                if let Some(s) = start.take() {
                    routines.push(ByteRange::new(base + s as u64, base + (i + width) as u64));
                }
            }
            Some(RuleKind::Call) | Some(RuleKind::Branch) => {
                if let Some(imm) = &profile.call_imm {
                    let target = (base + i as u64) as i64 + imm.pc_bias + imm.displacement(word);
                    if target >= 0 && (target as u64) < source_len {
                        targets.push(base + i as u64);
                    }
                }
            }
            _ => {}
        }
        i += width;
    }

    // A trailing partial word or an unterminated stream closes the final
    // routine at the region end.
    if let Some(s) = start {
        if routines.len() < limit {
            routines.push(ByteRange::new(base + s as u64, base + data.len() as u64));
        }
    }

    (routines, targets)
}
