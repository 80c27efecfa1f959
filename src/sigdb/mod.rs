//! The signature database: a load-once, immutable set of architecture
//! profiles.
//!
//! Profiles live as JSON files in a directory that must be named
//! `languages` (the caller may pass either the `languages` directory itself
//! or its parent). Absence or malformed content is a load-time error, never a
//! per-scan error. Once loaded, a database is never mutated and is safe for
//! unlimited concurrent reads; repeated loads of the same resolved path
//! return the same shared instance.

pub mod profile;

use crate::arch::{Arch, CodeInfo};
use crate::error::{Result, ScanError, MAX_SIGNATURE_PATH};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

pub use profile::{ArchitectureProfile, CallImm, RuleKind, WordRule};

/// Fixed name of the signature directory.
const LANGUAGES_DIR: &str = "languages";

static DB_CACHE: Lazy<RwLock<HashMap<PathBuf, Arc<SignatureDatabase>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Immutable, process-wide set of [`ArchitectureProfile`]s.
#[derive(Debug)]
pub struct SignatureDatabase {
    root: PathBuf,
    profiles: Vec<ArchitectureProfile>,
}

impl SignatureDatabase {
    /// Load the database rooted at `path`.
    ///
    /// `path` must either be the `languages` directory itself or a directory
    /// containing one. Results are cached per resolved path: loading the
    /// same path again returns the already-built database.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let dir = resolve_languages_dir(path.as_ref())?;

        if let Some(db) = DB_CACHE
            .read()
            .map_err(|_| ScanError::InternalInvariant("signature cache lock poisoned".into()))?
            .get(&dir)
        {
            debug!("signature database cache hit: {:?}", dir);
            return Ok(Arc::clone(db));
        }

        let db = Arc::new(Self::load_dir(&dir)?);
        let mut cache = DB_CACHE
            .write()
            .map_err(|_| ScanError::InternalInvariant("signature cache lock poisoned".into()))?;
        // A racing loader may have inserted first; keep whichever arrived.
        let entry = cache.entry(dir).or_insert_with(|| Arc::clone(&db));
        Ok(Arc::clone(entry))
    }

    fn load_dir(dir: &Path) -> Result<Self> {
        let mut names: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| ScanError::InvalidPath {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        // Deterministic profile order regardless of directory enumeration.
        names.sort();

        let mut profiles = Vec::with_capacity(names.len());
        for path in &names {
            let text = std::fs::read_to_string(path).map_err(|e| ScanError::CorruptSignature {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let profile =
                ArchitectureProfile::parse(&text).map_err(|message| ScanError::CorruptSignature {
                    path: path.clone(),
                    message,
                })?;
            debug!("loaded signature profile {:?} from {:?}", profile.name, path);
            profiles.push(profile);
        }

        if profiles.is_empty() {
            return Err(ScanError::CorruptSignature {
                path: dir.to_path_buf(),
                message: "no signature profiles found".into(),
            });
        }

        info!("signature database loaded: {} profiles from {:?}", profiles.len(), dir);
        Ok(Self {
            root: dir.to_path_buf(),
            profiles,
        })
    }

    /// The resolved `languages` directory this database was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All loaded profiles, in deterministic (file name) order.
    pub fn profiles(&self) -> &[ArchitectureProfile] {
        &self.profiles
    }

    /// The profile matching `info` exactly, or failing that, the first
    /// profile of the same architecture family.
    pub fn profile_for(&self, info: &CodeInfo) -> Option<&ArchitectureProfile> {
        self.profiles
            .iter()
            .find(|p| p.info == *info)
            .or_else(|| self.profiles.iter().find(|p| p.info.arch == info.arch))
    }

    /// The generic-code fallback profile, if one is loaded.
    pub fn generic_profile(&self) -> Option<&ArchitectureProfile> {
        self.profiles
            .iter()
            .find(|p| p.info.arch == Arch::GenericCode)
    }
}

/// Resolve and validate the `languages` directory for `path`.
fn resolve_languages_dir(path: &Path) -> Result<PathBuf> {
    let raw_len = path.as_os_str().len();
    if raw_len == 0 || raw_len > MAX_SIGNATURE_PATH {
        return Err(ScanError::PathTooLong { len: raw_len });
    }

    let candidate = if path.file_name().is_some_and(|n| n == LANGUAGES_DIR) {
        path.to_path_buf()
    } else {
        path.join(LANGUAGES_DIR)
    };

    if !candidate.is_dir() {
        return Err(ScanError::InvalidPath {
            path: candidate,
            message: format!("not a directory named {:?}", LANGUAGES_DIR),
        });
    }

    let resolved = candidate.canonicalize().map_err(|e| ScanError::InvalidPath {
        path: candidate.clone(),
        message: e.to_string(),
    })?;
    if resolved.as_os_str().len() > MAX_SIGNATURE_PATH {
        return Err(ScanError::PathTooLong {
            len: resolved.as_os_str().len(),
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;
    use std::io::Write;

    const MINIMAL_PROFILE: &str = r#"{
        "name": "intel-64",
        "architecture": "Intel",
        "bitness": 64,
        "endianness": "little",
        "alignment": 1,
        "opcode_bytes": ["55", "48", "C3"],
        "prologues": ["554889E5"],
        "returns": ["C3"]
    }"#;

    fn write_profile(dir: &Path, name: &str, text: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_from_parent_and_languages_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let lang = tmp.path().join("languages");
        std::fs::create_dir(&lang).unwrap();
        write_profile(&lang, "intel_64.json", MINIMAL_PROFILE);

        let via_parent = SignatureDatabase::load(tmp.path()).unwrap();
        assert_eq!(via_parent.profiles().len(), 1);
        assert_eq!(via_parent.profiles()[0].name, "intel-64");

        // Loading via the languages directory itself resolves to the same
        // cached database.
        let via_dir = SignatureDatabase::load(&lang).unwrap();
        assert!(Arc::ptr_eq(&via_parent, &via_dir));
    }

    #[test]
    fn test_missing_directory_is_invalid_path() {
        let tmp = tempfile::tempdir().unwrap();
        let err = SignatureDatabase::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidPath { .. }));
        assert_eq!(err.status_code(), StatusCode::SignaturePathLength);
    }

    #[test]
    fn test_misnamed_directory_is_invalid_path() {
        let tmp = tempfile::tempdir().unwrap();
        let wrong = tmp.path().join("signatures");
        std::fs::create_dir(&wrong).unwrap();
        write_profile(&wrong, "intel_64.json", MINIMAL_PROFILE);

        assert!(SignatureDatabase::load(&wrong).is_err());
    }

    #[test]
    fn test_corrupt_profile_is_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let lang = tmp.path().join("languages");
        std::fs::create_dir(&lang).unwrap();
        write_profile(&lang, "broken.json", "{ this is not json");

        let err = SignatureDatabase::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ScanError::CorruptSignature { .. }));
    }

    #[test]
    fn test_empty_languages_dir_is_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let lang = tmp.path().join("languages");
        std::fs::create_dir(&lang).unwrap();

        let err = SignatureDatabase::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ScanError::CorruptSignature { .. }));
    }

    #[test]
    fn test_overlong_path_rejected() {
        let long = "x".repeat(MAX_SIGNATURE_PATH + 1);
        let err = SignatureDatabase::load(Path::new(&long)).unwrap_err();
        assert!(matches!(err, ScanError::PathTooLong { .. }));
    }
}
