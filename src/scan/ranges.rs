//! Byte-range types shared by the classifier and routine scanner.

use crate::arch::CodeInfo;
use serde::{Deserialize, Serialize};

/// A half-open byte range `[from, to)` of the scanned source.
///
/// Code ranges carry their architecture facts in `code`; for every other
/// classification the field is `None`. This encodes the output invariant
/// that bitness, endianness, and architecture are set jointly or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub from: u64,
    pub to: u64,
    pub code: Option<CodeInfo>,
}

impl ByteRange {
    /// A data (non-code) range.
    pub fn new(from: u64, to: u64) -> Self {
        Self {
            from,
            to,
            code: None,
        }
    }

    /// A code range tagged with architecture facts.
    pub fn code(from: u64, to: u64, info: CodeInfo) -> Self {
        Self {
            from,
            to,
            code: Some(info),
        }
    }

    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.from && offset < self.to
    }
}

/// Caller-supplied input region.
///
/// `to == 0` means "scan to the end of the source". This is an input-only
/// convention inherited from the external contract; output ranges never use
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanRegion {
    pub from: u64,
    pub to: u64,
}

impl ScanRegion {
    /// The whole source.
    pub const WHOLE: ScanRegion = ScanRegion { from: 0, to: 0 };

    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }
}

impl From<ByteRange> for ScanRegion {
    fn from(r: ByteRange) -> Self {
        Self {
            from: r.from,
            to: r.to,
        }
    }
}

/// The five-way classification of a scanned region.
///
/// Restricted to the requested region, the union of all five sequences is an
/// exact partition: non-overlapping, no gaps, no double classification.
/// Each sequence is ordered by ascending start offset; there is no global
/// cross-sequence ordering guarantee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub ascii: Vec<ByteRange>,
    pub zeroblock: Vec<ByteRange>,
    pub high_entropy: Vec<ByteRange>,
    pub generic_data: Vec<ByteRange>,
    pub coderegions: Vec<ByteRange>,
}

impl ScanResult {
    /// All ranges across the five sequences, in no particular order.
    pub fn all_ranges(&self) -> impl Iterator<Item = &ByteRange> {
        self.ascii
            .iter()
            .chain(self.zeroblock.iter())
            .chain(self.high_entropy.iter())
            .chain(self.generic_data.iter())
            .chain(self.coderegions.iter())
    }

    /// Total number of classified ranges.
    pub fn len(&self) -> usize {
        self.ascii.len()
            + self.zeroblock.len()
            + self.high_entropy.len()
            + self.generic_data.len()
            + self.coderegions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the partition invariant over `[from, to)`.
    ///
    /// Returns a description of the first violation found, or `None` if the
    /// sequences exactly cover the region without overlap.
    pub fn partition_violation(&self, from: u64, to: u64) -> Option<String> {
        let mut ranges: Vec<&ByteRange> = self.all_ranges().collect();
        if ranges.is_empty() {
            return Some(format!("no ranges cover [{}, {})", from, to));
        }
        ranges.sort_by_key(|r| (r.from, r.to));

        for r in &ranges {
            if r.is_empty() {
                return Some(format!("empty range at {}", r.from));
            }
        }
        if let Some(r) = self.coderegions.iter().find(|r| r.code.is_none()) {
            return Some(format!("untagged code range at {}", r.from));
        }
        if let Some(r) = self
            .ascii
            .iter()
            .chain(self.zeroblock.iter())
            .chain(self.high_entropy.iter())
            .chain(self.generic_data.iter())
            .find(|r| r.code.is_some())
        {
            return Some(format!("architecture tag on non-code range at {}", r.from));
        }
        if ranges[0].from != from {
            return Some(format!(
                "partition starts at {} instead of {}",
                ranges[0].from, from
            ));
        }
        for pair in ranges.windows(2) {
            if pair[0].to != pair[1].from {
                return Some(format!(
                    "gap or overlap between {} and {}",
                    pair[0].to, pair[1].from
                ));
            }
        }
        let last = ranges[ranges.len() - 1];
        if last.to != to {
            return Some(format!("partition ends at {} instead of {}", last.to, to));
        }
        None
    }
}
