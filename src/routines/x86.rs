//! Byte-stream routine walker for Intel instruction streams.
//!
//! A deliberately small decoder: just enough opcode knowledge to find
//! routine boundaries (prologues, returns, unconditional jumps) and the file
//! offsets of relative call/branch operands. It is not a disassembler; any
//! byte it does not recognize advances the cursor by one.

use crate::scan::ByteRange;

/// Legacy, segment, and REX prefixes skipped before the opcode byte.
fn is_prefix(b: u8) -> bool {
    matches!(
        b,
        0x26 | 0x2E | 0x36 | 0x3E | 0x64 | 0x65 | 0x66 | 0x67 | 0xF0 | 0xF2 | 0xF3
    ) || (0x40..=0x4F).contains(&b)
}

fn starts_prologue(data: &[u8], p: usize, prologues: &[Vec<u8>]) -> bool {
    prologues
        .iter()
        .any(|pat| !pat.is_empty() && data[p..].starts_with(pat))
}

fn rel32(data: &[u8], at: usize) -> i64 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as i64
}

/// Walk `data` (at absolute offset `base`) and return discovered routines
/// plus the file offsets of call/branch operands whose computed target lands
/// inside the source (`0 <= target < source_len`).
pub(crate) fn walk(
    data: &[u8],
    base: u64,
    source_len: u64,
    prologues: &[Vec<u8>],
    limit: usize,
) -> (Vec<ByteRange>, Vec<u64>) {
    let mut routines: Vec<ByteRange> = Vec::new();
    let mut targets: Vec<u64> = Vec::new();
    let mut start: Option<usize> = None;
    let mut p = 0usize;

    while p < data.len() && routines.len() < limit {
        match start {
            None => {
                // Inter-routine padding.
                if data[p] == 0x90 || data[p] == 0x00 {
                    p += 1;
                    continue;
                }
                start = Some(p);
            }
            Some(s) if p > s && starts_prologue(data, p, prologues) => {
                // A routine that falls through into the next prologue ends
                // where the new one begins.
                routines.push(ByteRange::new(base + s as u64, base + p as u64));
                start = Some(p);
                if routines.len() == limit {
                    break;
                }
            }
            Some(_) => {}
        }

        let mut q = p;
        let mut prefixes = 0usize;
        while q < data.len() && prefixes < 4 && is_prefix(data[q]) {
            q += 1;
            prefixes += 1;
        }
        if q >= data.len() {
            break;
        }

        let mut close = false;
        let next = match data[q] {
            // call rel32 / jmp rel32
            0xE8 | 0xE9 if q + 5 <= data.len() => {
                let rel = rel32(data, q + 1);
                let target = (base + q as u64 + 5) as i64 + rel;
                if target >= 0 && (target as u64) < source_len {
                    targets.push(base + q as u64 + 1);
                }
                close = data[q] == 0xE9;
                q + 5
            }
            // jmp rel8
            0xEB if q + 2 <= data.len() => {
                close = true;
                q + 2
            }
            // ret / retf
            0xC3 | 0xCB => {
                close = true;
                q + 1
            }
            // ret imm16 / retf imm16
            0xC2 | 0xCA => {
                close = true;
                (q + 3).min(data.len())
            }
            // jcc rel8
            0x70..=0x7F => (q + 2).min(data.len()),
            // jcc rel32
            0x0F if q + 6 <= data.len() && (0x80..=0x8F).contains(&data[q + 1]) => {
                let rel = rel32(data, q + 2);
                let target = (base + q as u64 + 6) as i64 + rel;
                if target >= 0 && (target as u64) < source_len {
                    targets.push(base + q as u64 + 2);
                }
                q + 6
            }
            0x0F => (q + 2).min(data.len()),
            _ => q + 1,
        };

        if close {
            if let Some(s) = start.take() {
                routines.push(ByteRange::new(base + s as u64, base + next as u64));
            }
        }
        p = next;
    }

    // A stream that ends mid-routine still yields the partial routine.
    if let Some(s) = start {
        if routines.len() < limit && s < data.len() {
            routines.push(ByteRange::new(base + s as u64, base + data.len() as u64));
        }
    }

    (routines, targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROLOGUE64: &[u8] = &[0x55, 0x48, 0x89, 0xE5];

    fn prologues() -> Vec<Vec<u8>> {
        vec![PROLOGUE64.to_vec()]
    }

    #[test]
    fn test_two_routines_split_by_ret() {
        // push rbp; mov rbp, rsp; call -9 (to own start); pop rbp; ret -- twice.
        let unit: &[u8] = &[
            0x55, 0x48, 0x89, 0xE5, 0xE8, 0xF7, 0xFF, 0xFF, 0xFF, 0x5D, 0xC3,
        ];
        let mut data = unit.to_vec();
        data.extend_from_slice(unit);

        let (routines, targets) = walk(&data, 0, data.len() as u64, &prologues(), 1000);
        assert_eq!(
            routines,
            vec![
                ByteRange::new(0, unit.len() as u64),
                ByteRange::new(unit.len() as u64, 2 * unit.len() as u64)
            ]
        );
        // Operand offsets of the two calls; both targets land in the source.
        assert_eq!(targets, vec![5, 5 + unit.len() as u64]);
    }

    #[test]
    fn test_out_of_source_target_not_recorded() {
        // call +0x1000 in a 16-byte source.
        let data = [
            0x55, 0x48, 0x89, 0xE5, 0xE8, 0x00, 0x10, 0x00, 0x00, 0x5D, 0xC3, 0x90, 0x90, 0x90,
            0x90, 0x90,
        ];
        let (routines, targets) = walk(&data, 0, data.len() as u64, &prologues(), 1000);
        assert_eq!(routines, vec![ByteRange::new(0, 11)]);
        assert!(targets.is_empty());
    }

    #[test]
    fn test_prologue_splits_fallthrough() {
        // No return between the two prologues.
        let data = [
            0x55, 0x48, 0x89, 0xE5, 0x90, 0x90, // routine 1, falls through
            0x55, 0x48, 0x89, 0xE5, 0x5D, 0xC3, // routine 2
        ];
        let (routines, _) = walk(&data, 0, data.len() as u64, &prologues(), 1000);
        assert_eq!(
            routines,
            vec![ByteRange::new(0, 6), ByteRange::new(6, 12)]
        );
    }

    #[test]
    fn test_padding_between_routines_skipped() {
        let data = [
            0xC3, // routine 1
            0x00, 0x00, 0x90, 0x90, // padding
            0x55, 0x48, 0x89, 0xE5, 0xC3, // routine 2
        ];
        let (routines, _) = walk(&data, 100, 1000, &prologues(), 1000);
        assert_eq!(
            routines,
            vec![ByteRange::new(100, 101), ByteRange::new(105, 110)]
        );
    }

    #[test]
    fn test_truncated_tail_is_partial_routine() {
        // call with only two of four displacement bytes present.
        let data = [0x55, 0x48, 0x89, 0xE5, 0xE8, 0x01, 0x02];
        let (routines, targets) = walk(&data, 0, 7, &prologues(), 1000);
        assert_eq!(routines, vec![ByteRange::new(0, 7)]);
        assert!(targets.is_empty());
    }

    #[test]
    fn test_routine_cap() {
        let data = vec![0xC3u8; 1200];
        let (routines, _) = walk(&data, 0, 1200, &prologues(), 1000);
        assert_eq!(routines.len(), 1000);
        assert_eq!(routines[999], ByteRange::new(999, 1000));
    }
}
