//! Region classification: partition a byte range into typed sub-regions.
//!
//! The classifier walks the requested range in fixed cells, tags each cell
//! from local byte statistics, delegates code detection to the architecture
//! matcher, and coalesces equal runs into the five-way [`ScanResult`]. The
//! output is always an exact partition of the resolved region: no gaps, no
//! overlap, down to the first and last byte.

mod aggregate;
mod cells;
pub mod ranges;

pub use ranges::{ByteRange, ScanRegion, ScanResult};

use crate::arch::matcher;
use crate::entropy::{is_printable, CellStats};
use crate::error::{Result, ScanError};
use crate::io::ByteSource;
use crate::sigdb::SignatureDatabase;
use aggregate::Run;
use cells::{tag_cell, Class, CELL_SIZE};
use tracing::{debug, warn};

/// Upper bound on code regions returned per scan. Overflow runs are
/// re-tagged as generic data; truncation is observable, not an error.
pub const MAX_CODE_REGIONS: usize = 20;

/// Largest window handed to the architecture matcher per candidate run.
const MATCH_WINDOW_MAX: usize = 4096;

/// A zero gap of at most this many bytes between two code runs of the same
/// architecture is absorbed into the code region (alignment padding).
const CODE_GAP_MAX: u64 = 128;

/// Resolve a caller-supplied region against the source length.
///
/// `to == 0` means "to end of source". The resolved region must be
/// non-empty and inside the source.
pub(crate) fn resolve_region(source: &dyn ByteSource, region: ScanRegion) -> Result<(u64, u64)> {
    let len = source.len();
    if len == 0 {
        return Err(ScanError::SourceUnavailable("byte source is empty".into()));
    }
    let to = if region.to == 0 { len } else { region.to };
    if to > len {
        return Err(ScanError::InvalidRegion(format!(
            "region end {} beyond source length {}",
            to, len
        )));
    }
    if region.from >= to {
        return Err(ScanError::InvalidRegion(format!(
            "region start {} not below end {}",
            region.from, to
        )));
    }
    Ok((region.from, to))
}

/// Read the resolved region into memory.
pub(crate) fn read_region(source: &dyn ByteSource, from: u64, to: u64) -> Result<Vec<u8>> {
    let data = source.read(from, (to - from) as usize)?;
    if data.len() as u64 != to - from {
        return Err(ScanError::SourceUnavailable(format!(
            "short read: wanted {} bytes at {}, got {}",
            to - from,
            from,
            data.len()
        )));
    }
    Ok(data)
}

/// Classify `region` of `source` into the five-way partition.
///
/// `aggressive` lowers the matcher's acceptance threshold, trading more
/// code-region recall for more false positives. The call holds no shared
/// mutable state and is safe to run concurrently with any other call.
pub fn classify(
    source: &dyn ByteSource,
    region: ScanRegion,
    aggressive: bool,
    db: &SignatureDatabase,
) -> Result<ScanResult> {
    let (from, to) = resolve_region(source, region)?;
    let data = read_region(source, from, to)?;
    debug!(from, to, aggressive, "classifying region");

    // Per-cell statistical tags.
    let mut tags: Vec<Class> = data
        .chunks(CELL_SIZE)
        .map(|cell| tag_cell(&CellStats::compute(cell)))
        .collect();

    // Code detection over maximal runs of non-zero cells. Code takes
    // precedence over the statistical tags: strings or padding embedded in
    // an instruction stream must not break the region apart.
    let n_cells = tags.len();
    let mut c = 0usize;
    while c < n_cells {
        if tags[c] == Class::Zero {
            c += 1;
            continue;
        }
        let first = c;
        while c < n_cells && tags[c] != Class::Zero {
            c += 1;
        }
        let start = first * CELL_SIZE;
        let end = (c * CELL_SIZE).min(data.len());
        let window = &data[start..end.min(start + MATCH_WINDOW_MAX)];
        if let Some(info) = matcher::match_window(window, db, aggressive) {
            debug!(start, end, %info, "code candidate accepted");
            for tag in &mut tags[first..c] {
                *tag = Class::Code(info);
            }
        }
    }

    let mut runs = coalesce(&tags, from, data.len());
    bridge_code_gaps(&mut runs);
    runs = merge_adjacent(runs);
    cap_code_regions(&mut runs);
    runs = merge_adjacent(runs);
    refine_boundaries(&mut runs, &data, from);

    aggregate::build(from, to, &runs)
}

/// Coalesce per-cell tags into absolute-offset runs.
fn coalesce(tags: &[Class], base: u64, data_len: usize) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (i, &class) in tags.iter().enumerate() {
        let cell_from = base + (i * CELL_SIZE) as u64;
        let cell_to = base + ((i + 1) * CELL_SIZE).min(data_len) as u64;
        match runs.last_mut() {
            Some(last) if last.class == class => last.to = cell_to,
            _ => runs.push(Run {
                class,
                from: cell_from,
                to: cell_to,
            }),
        }
    }
    runs
}

fn merge_adjacent(runs: Vec<Run>) -> Vec<Run> {
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(last) if last.class == run.class && last.to == run.from => last.to = run.to,
            _ => merged.push(run),
        }
    }
    merged
}

/// Absorb short zero gaps sandwiched between code runs of the same
/// architecture.
fn bridge_code_gaps(runs: &mut [Run]) {
    if runs.len() < 3 {
        return;
    }
    for i in 1..runs.len() - 1 {
        if runs[i].class != Class::Zero || runs[i].to - runs[i].from > CODE_GAP_MAX {
            continue;
        }
        if let (Class::Code(a), Class::Code(b)) = (runs[i - 1].class, runs[i + 1].class) {
            if a == b {
                runs[i].class = Class::Code(a);
            }
        }
    }
}

/// Enforce the fixed upper bound on code regions per scan.
fn cap_code_regions(runs: &mut [Run]) {
    let mut kept = 0usize;
    for run in runs.iter_mut() {
        if !run.class.is_code() {
            continue;
        }
        if kept < MAX_CODE_REGIONS {
            kept += 1;
        } else {
            warn!(
                from = run.from,
                to = run.to,
                "code region cap ({}) reached; excess re-tagged as generic data",
                MAX_CODE_REGIONS
            );
            run.class = Class::Generic;
        }
    }
}

/// Move run boundaries from cell granularity to byte granularity.
///
/// Only boundaries between two non-code runs move, and only within the one
/// cell that contains the transition: a zero run absorbs adjacent literal
/// zero bytes, then an ASCII run absorbs adjacent printable bytes. Code
/// boundaries stay where the matcher put them.
fn refine_boundaries(runs: &mut Vec<Run>, data: &[u8], base: u64) {
    let cell = CELL_SIZE as u64;
    for i in 1..runs.len() {
        let (a, b) = (runs[i - 1], runs[i]);
        if a.class.is_code() || b.class.is_code() {
            continue;
        }
        let mut off = b.from;
        if a.class == Class::Zero && b.class != Class::Zero {
            let limit = b.to.min(b.from + cell);
            while off < limit && data[(off - base) as usize] == 0 {
                off += 1;
            }
        } else if b.class == Class::Zero && a.class != Class::Zero {
            let limit = a.from.max(b.from.saturating_sub(cell));
            while off > limit && data[(off - 1 - base) as usize] == 0 {
                off -= 1;
            }
        } else if a.class == Class::Ascii && b.class != Class::Ascii {
            let limit = b.to.min(b.from + cell);
            while off < limit && is_printable(data[(off - base) as usize]) {
                off += 1;
            }
        } else if b.class == Class::Ascii && a.class != Class::Ascii {
            let limit = a.from.max(b.from.saturating_sub(cell));
            while off > limit && is_printable(data[(off - 1 - base) as usize]) {
                off -= 1;
            }
        } else {
            continue;
        }
        runs[i - 1].to = off;
        runs[i].from = off;
    }
    runs.retain(|r| !r.is_empty());
    *runs = merge_adjacent(std::mem::take(runs));
}
