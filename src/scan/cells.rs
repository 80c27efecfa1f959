//! Cell-level classification primitives.
//!
//! The classifier cuts a region into fixed-size cells, tags each cell from
//! its local byte statistics, and later coalesces runs of equally-tagged
//! cells into output ranges.

use crate::arch::CodeInfo;
use crate::entropy::CellStats;

/// Classification cell size in bytes. The final cell of a region may be
/// shorter.
pub const CELL_SIZE: usize = 64;

/// Printable fraction at or above which a cell counts as ASCII text.
pub const ASCII_THRESHOLD: f64 = 0.95;

/// Normalized entropy at or above which a cell counts as high entropy.
pub const HIGH_ENTROPY_THRESHOLD: f64 = 0.90;

/// Classification of one cell or coalesced run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Zero,
    Ascii,
    HighEntropy,
    Generic,
    Code(CodeInfo),
}

impl Class {
    pub fn is_code(&self) -> bool {
        matches!(self, Class::Code(_))
    }
}

/// Tag a cell from its statistics.
///
/// Precedence below code (which is decided over whole candidate runs, not
/// single cells): zero block, then ASCII, then high entropy, then generic
/// data. A cell counts as zero only when every byte is zero, so that the
/// zero/non-zero cut is exact at cell granularity and can be refined to byte
/// granularity afterwards.
pub fn tag_cell(stats: &CellStats) -> Class {
    if stats.zero_fraction >= 1.0 {
        Class::Zero
    } else if stats.printable_fraction >= ASCII_THRESHOLD {
        Class::Ascii
    } else if stats.entropy_norm >= HIGH_ENTROPY_THRESHOLD {
        Class::HighEntropy
    } else {
        Class::Generic
    }
}
