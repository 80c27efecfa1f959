//! Byte source collaborators and bounded file reading.
//!
//! The engine never opens, sizes, or closes files on its own; it consumes an
//! abstract "read bytes in range" capability. [`FileSource`] is the standard
//! on-disk implementation with resource limits; in-memory buffers implement
//! the same trait for tests and embedded callers.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Resource limits for file-backed sources.
#[derive(Debug, Clone)]
pub struct IoLimits {
    /// Maximum number of bytes a single `read` call may return.
    pub max_read_bytes: u64,
    /// Maximum size of a file accepted by [`FileSource::open`].
    pub max_file_size: u64,
}

impl Default for IoLimits {
    fn default() -> Self {
        Self {
            max_read_bytes: 64 * 1024 * 1024,  // 64MB per read
            max_file_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// Read-only random access over a byte sequence of known length.
///
/// Implementations must be safe for concurrent calls; the engine holds no
/// shared mutable state between reads.
pub trait ByteSource: Sync {
    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    /// Read up to `len` bytes starting at `offset`. A read past the end of
    /// the source is truncated; a read entirely past the end returns an
    /// empty buffer.
    fn read(&self, offset: u64, len: usize) -> io::Result<Vec<u8>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let start = (offset as usize).min(<[u8]>::len(self));
        let end = start.saturating_add(len).min(<[u8]>::len(self));
        Ok(self[start..end].to_vec())
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        ByteSource::read(self.as_slice(), offset, len)
    }
}

/// File-backed byte source with safety limits.
///
/// The file handle is guarded by a mutex because positioned reads go through
/// seek + read; the source itself stays logically immutable.
pub struct FileSource {
    file: Mutex<File>,
    path: PathBuf,
    size: u64,
    limits: IoLimits,
}

impl FileSource {
    /// Open a file with default limits.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::open_with_limits(path, IoLimits::default())
    }

    /// Open a file with explicit limits.
    pub fn open_with_limits<P: AsRef<Path>>(path: P, limits: IoLimits) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("opening byte source: {:?}", path);

        let file = File::open(&path)?;
        let size = file.metadata()?.len();

        if size > limits.max_file_size {
            warn!(
                "file too large: {} bytes (limit: {})",
                size, limits.max_file_size
            );
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file too large: {} bytes (limit: {})", size, limits.max_file_size),
            ));
        }

        Ok(Self {
            file: Mutex::new(file),
            path,
            size,
            limits,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limits(&self) -> &IoLimits {
        &self.limits
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.size
    }

    fn read(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        if offset >= self.size {
            return Ok(Vec::new());
        }
        let capped = (len as u64)
            .min(self.size - offset)
            .min(self.limits.max_read_bytes) as usize;

        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("byte source lock poisoned"))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; capped];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_slice_source() {
        let data = b"Hello, World!".to_vec();
        assert_eq!(ByteSource::len(&data), 13);
        assert_eq!(data.read(0, 5).unwrap(), b"Hello");
        assert_eq!(data.read(7, 100).unwrap(), b"World!");
        assert!(data.read(20, 4).unwrap().is_empty());
    }

    #[test]
    fn test_file_source_ranged_reads() {
        let payload = b"The quick brown fox jumps over the lazy dog";
        let tmp = NamedTempFile::new().unwrap();
        tmp.as_file().write_all(payload).unwrap();

        let src = FileSource::open(tmp.path()).unwrap();
        assert_eq!(src.len(), payload.len() as u64);
        assert_eq!(src.read(4, 5).unwrap(), b"quick");
        assert_eq!(src.read(40, 100).unwrap(), b"dog");
        assert!(src.read(1000, 10).unwrap().is_empty());

        // Reads are repeatable
        assert_eq!(src.read(4, 5).unwrap(), b"quick");
    }

    #[test]
    fn test_file_size_limit() {
        let tmp = NamedTempFile::new().unwrap();
        tmp.as_file().write_all(&[0u8; 100]).unwrap();

        let limits = IoLimits {
            max_read_bytes: 1000,
            max_file_size: 50,
        };
        assert!(FileSource::open_with_limits(tmp.path(), limits).is_err());
    }
}
