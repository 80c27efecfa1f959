//! codescan: content classification and routine discovery for raw binaries.
//!
//! The engine answers two questions about an arbitrary byte range of a file
//! or buffer, without relying on any container format:
//!
//! - **What is in this range?** [`classify`] partitions the range exactly
//!   into ASCII text, zero blocks, high-entropy data, generic data, and code
//!   regions tagged with architecture, bitness, and endianness.
//! - **Where are the routines?** [`scan_routines_ex`] splits a code region
//!   into routine-sized ranges and reports the file offsets of relative
//!   call/branch operands whose targets land inside the source.
//!
//! Detection is driven by a [`SignatureDatabase`] loaded once from a
//! `languages` directory of JSON profiles; all scanning entry points are
//! read-only and safe to call concurrently.
//!
//! ```
//! use codescan::{classify, load_signature_database, ScanRegion};
//!
//! # fn main() -> codescan::Result<()> {
//! let db = load_signature_database(env!("CARGO_MANIFEST_DIR"))?;
//! let data = vec![0u8; 4096];
//! let result = classify(&data, ScanRegion::WHOLE, false, &db)?;
//! assert_eq!(result.zeroblock.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod arch;
pub mod entropy;
pub mod error;
pub mod io;
pub mod logging;
pub mod routines;
pub mod scan;
pub mod sigdb;

pub use arch::{Arch, Bitness, CodeInfo, Endianness};
pub use error::{status_of, Result, ScanError, StatusCode};
pub use io::{ByteSource, FileSource, IoLimits};
pub use routines::{scan_routines, scan_routines_ex, RoutineScan, MAX_ROUTINES};
pub use scan::{classify, ByteRange, ScanRegion, ScanResult, MAX_CODE_REGIONS};
pub use sigdb::SignatureDatabase;

use std::path::Path;
use std::sync::Arc;

/// Load the signature database rooted at `path` (the `languages` directory
/// or its parent). Repeated loads of the same path share one instance.
pub fn load_signature_database<P: AsRef<Path>>(path: P) -> Result<Arc<SignatureDatabase>> {
    SignatureDatabase::load(path)
}

fn open_source(path: &Path) -> Result<FileSource> {
    FileSource::open(path)
        .map_err(|e| ScanError::SourceUnavailable(format!("{}: {}", path.display(), e)))
}

/// Classify a region of an on-disk file. See [`classify`].
pub fn classify_file<P: AsRef<Path>>(
    path: P,
    region: ScanRegion,
    aggressive: bool,
    db: &SignatureDatabase,
) -> Result<ScanResult> {
    let source = open_source(path.as_ref())?;
    classify(&source, region, aggressive, db)
}

/// Discover routines in a region of an on-disk file. See [`scan_routines`].
pub fn scan_routines_file<P: AsRef<Path>>(
    path: P,
    region: ByteRange,
    db: &SignatureDatabase,
) -> Result<Vec<ByteRange>> {
    let source = open_source(path.as_ref())?;
    scan_routines(&source, region, db)
}

/// Discover routines and call/branch operand offsets in a region of an
/// on-disk file. See [`scan_routines_ex`].
pub fn scan_routines_ex_file<P: AsRef<Path>>(
    path: P,
    region: ByteRange,
    db: &SignatureDatabase,
) -> Result<RoutineScan> {
    let source = open_source(path.as_ref())?;
    scan_routines_ex(&source, region, db)
}
