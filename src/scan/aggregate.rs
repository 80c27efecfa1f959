//! Result aggregation: turns coalesced classification runs into the
//! five-way [`ScanResult`] and enforces the partition invariant.

use crate::error::{Result, ScanError};
use crate::scan::cells::Class;
use crate::scan::ranges::{ByteRange, ScanResult};
use tracing::error;

/// One coalesced run of equally-classified bytes, in absolute file offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Run {
    pub class: Class,
    pub from: u64,
    pub to: u64,
}

impl Run {
    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }
}

/// Build the final result from contiguous runs covering `[from, to)`.
///
/// Validates the partition invariant before returning; a violation is an
/// engine defect and surfaces as `InternalInvariant`, never as a silently
/// inconsistent result.
pub(crate) fn build(from: u64, to: u64, runs: &[Run]) -> Result<ScanResult> {
    let mut result = ScanResult::default();
    for run in runs {
        if run.is_empty() {
            continue;
        }
        match run.class {
            Class::Zero => result.zeroblock.push(ByteRange::new(run.from, run.to)),
            Class::Ascii => result.ascii.push(ByteRange::new(run.from, run.to)),
            Class::HighEntropy => result.high_entropy.push(ByteRange::new(run.from, run.to)),
            Class::Generic => result.generic_data.push(ByteRange::new(run.from, run.to)),
            Class::Code(info) => result.coderegions.push(ByteRange::code(run.from, run.to, info)),
        }
    }

    if let Some(violation) = result.partition_violation(from, to) {
        error!("partition invariant violated: {}", violation);
        return Err(ScanError::InternalInvariant(violation));
    }
    Ok(result)
}
