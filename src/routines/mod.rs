//! Routine discovery inside code regions.
//!
//! Splits a code region into routine-sized byte ranges and collects the file
//! offsets of relative call/branch operands whose targets land inside the
//! source. Routines lie inside the requested region and do not overlap, but
//! unlike the classifier they make no partition promise: padding between
//! routines is simply not covered.

mod word;
mod x86;

use crate::arch::{matcher, Arch};
use crate::error::{Result, ScanError};
use crate::io::ByteSource;
use crate::scan::{self, ByteRange, ScanRegion};
use crate::sigdb::{ArchitectureProfile, SignatureDatabase};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Upper bound on routines returned per scan. The walk stops when the cap
/// is reached; truncation is observable, not an error.
pub const MAX_ROUTINES: usize = 1000;

/// Bytes of the region fed to the matcher when the caller did not tag the
/// region with an architecture.
const INFER_WINDOW: usize = 4096;

/// Result of a routine scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutineScan {
    /// Discovered routines, in ascending start order, architecture untagged.
    pub routines: Vec<ByteRange>,
    /// File offsets of call/branch operands with in-source targets, in
    /// discovery order.
    pub call_targets: Vec<u64>,
}

/// Discover routines in `region`; the reduced form of [`scan_routines_ex`]
/// without operand offsets.
pub fn scan_routines(
    source: &dyn ByteSource,
    region: ByteRange,
    db: &SignatureDatabase,
) -> Result<Vec<ByteRange>> {
    Ok(scan_routines_ex(source, region, db)?.routines)
}

/// Discover routines and call/branch operand offsets in `region`.
///
/// When `region.code` is set (the normal case, a code range from a previous
/// classification) its architecture drives the walk directly. An untagged
/// region is first run through the matcher aggressively; if even that finds
/// no architecture the region is rejected as not code.
pub fn scan_routines_ex(
    source: &dyn ByteSource,
    region: ByteRange,
    db: &SignatureDatabase,
) -> Result<RoutineScan> {
    let (from, to) = scan::resolve_region(source, ScanRegion::from(region))?;
    let data = scan::read_region(source, from, to)?;

    let info = match region.code {
        Some(info) => info,
        None => {
            let window = &data[..data.len().min(INFER_WINDOW)];
            matcher::match_window(window, db, true).ok_or_else(|| {
                ScanError::InvalidRegion(format!(
                    "region [{}, {}) does not look like code of any known architecture",
                    from, to
                ))
            })?
        }
    };
    debug!(from, to, %info, "scanning routines");

    let (routines, call_targets) = match db.profile_for(&info) {
        Some(p) if p.alignment >= 2 => word::walk(&data, from, source.len(), p, MAX_ROUTINES),
        Some(p) if info.arch == Arch::Intel => {
            x86::walk(&data, from, source.len(), &p.prologues, MAX_ROUTINES)
        }
        Some(p) => generic_walk(&data, from, p, MAX_ROUTINES),
        // No profile knows this architecture; the region is one opaque
        // routine.
        None => (vec![ByteRange::new(from, to)], Vec::new()),
    };

    if routines.len() == MAX_ROUTINES {
        warn!(from, to, "routine cap ({}) reached; walk truncated", MAX_ROUTINES);
    }

    Ok(RoutineScan {
        routines,
        call_targets,
    })
}

/// Pattern-only walker for byte-stream architectures without a dedicated
/// decoder. Prologue shapes split routines, return shapes end them; no
/// operand offsets are extracted.
fn generic_walk(
    data: &[u8],
    base: u64,
    profile: &ArchitectureProfile,
    limit: usize,
) -> (Vec<ByteRange>, Vec<u64>) {
    let mut routines: Vec<ByteRange> = Vec::new();
    let mut start: Option<usize> = None;
    let mut p = 0usize;

    while p < data.len() && routines.len() < limit {
        if start.is_none() {
            if data[p] == 0 {
                p += 1;
                continue;
            }
            start = Some(p);
        }
        if let Some(s) = start {
            if p > s
                && profile
                    .prologues
                    .iter()
                    .any(|pat| !pat.is_empty() && data[p..].starts_with(pat))
            {
                routines.push(ByteRange::new(base + s as u64, base + p as u64));
                start = Some(p);
                if routines.len() == limit {
                    break;
                }
            }
        }
        if let Some(ret) = profile
            .returns
            .iter()
            .find(|pat| !pat.is_empty() && data[p..].starts_with(pat))
        {
            let end = p + ret.len();
            if let Some(s) = start.take() {
                routines.push(ByteRange::new(base + s as u64, base + end as u64));
            }
            p = end;
        } else {
            p += 1;
        }
    }

    if let Some(s) = start {
        if routines.len() < limit {
            routines.push(ByteRange::new(base + s as u64, base + data.len() as u64));
        }
    }

    (routines, Vec::new())
}
