//! Byte-statistics primitives used by the region classifier.
//!
//! Provides Shannon entropy plus the per-cell statistics (zero fraction,
//! printable fraction, normalized entropy) the classifier tags sub-ranges
//! with.

/// Calculates the Shannon entropy of a byte slice.
///
/// Returns a value between 0.0 and 8.0, where:
/// - 0.0 represents no randomness (e.g., all bytes are the same)
/// - 8.0 represents maximum randomness (uniform distribution)
#[inline]
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    // Build histogram in a single pass
    let mut histogram = [0usize; 256];
    for &byte in data {
        histogram[byte as usize] += 1;
    }

    let len = data.len() as f64;
    let mut entropy = 0.0;
    for &count in &histogram {
        if count == 0 {
            continue;
        }
        let p = (count as f64) / len;
        entropy -= p * p.log2();
    }

    entropy
}

/// Entropy scaled to `[0, 1]` by the maximum achievable for the slice
/// length, so short windows are comparable to long ones.
///
/// A 64-byte window can reach at most `log2(64) = 6` bits, not 8; dividing
/// by the raw maximum would make short random windows look non-random.
#[inline]
pub fn normalized_entropy(data: &[u8]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let max = (data.len() as f64).log2().min(8.0);
    (shannon_entropy(data) / max).clamp(0.0, 1.0)
}

/// Whether a byte counts as printable for ASCII-region detection.
#[inline]
pub fn is_printable(b: u8) -> bool {
    b.is_ascii_graphic() || matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Local statistics for one classification cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStats {
    /// Fraction of bytes equal to zero.
    pub zero_fraction: f64,
    /// Fraction of printable-ASCII bytes (graphic plus space/tab/CR/LF).
    pub printable_fraction: f64,
    /// Shannon entropy normalized to `[0, 1]` for the cell length.
    pub entropy_norm: f64,
}

impl CellStats {
    /// Compute statistics over one cell.
    pub fn compute(cell: &[u8]) -> Self {
        if cell.is_empty() {
            return Self {
                zero_fraction: 0.0,
                printable_fraction: 0.0,
                entropy_norm: 0.0,
            };
        }
        let mut zeros = 0usize;
        let mut printable = 0usize;
        for &b in cell {
            if b == 0 {
                zeros += 1;
            }
            if is_printable(b) {
                printable += 1;
            }
        }
        let len = cell.len() as f64;
        Self {
            zero_fraction: zeros as f64 / len,
            printable_fraction: printable as f64 / len,
            entropy_norm: normalized_entropy(cell),
        }
    }
}
