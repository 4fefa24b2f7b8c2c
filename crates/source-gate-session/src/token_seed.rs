// crates/source-gate-session/src/token_seed.rs
// ============================================================================
// Module: Token Seed Store
// Description: Host-scoped random seeds persisted under a seed directory.
// Purpose: Give every process the same per-host seed across restarts.
// Dependencies: source-gate-core, fs2, rand, serde_json, tempfile, tracing
// ============================================================================

//! ## Overview
//! [`TokenSeedStore`] hands out one 16-byte seed per host. Each call is a
//! single transaction: take the in-process cache lock, take an advisory
//! exclusive lock on `.token_seed.lock`, read and merge `.token_seed`, create
//! the host's seed if it is missing, write the merged state back atomically,
//! and release both locks.
//!
//! The advisory lock is only ever tried without blocking. A contended lock is
//! retried up to [`LOCK_RETRY_ATTEMPTS`] times, [`LOCK_RETRY_DELAY`] apart. A
//! holder that keeps it longer is logged and the transaction runs unlocked.
//!
//! Persistence is best effort. A read-only or permission-restricted seed
//! directory, a filesystem without `flock`, and a torn seed file all degrade
//! to in-memory seeds with a `warn!`; they are never reported as errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use fs2::FileExt;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use source_gate_core::SeedError;
use source_gate_core::SeedProvider;
use tempfile::NamedTempFile;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Seed state file name.
pub const SEED_FILE_NAME: &str = ".token_seed";
/// Advisory lock file name.
pub const LOCK_FILE_NAME: &str = ".token_seed.lock";
/// Seed length in bytes.
pub const SEED_LEN: usize = 16;
/// Non-blocking lock attempts made before giving up on a contended lock.
pub const LOCK_RETRY_ATTEMPTS: u32 = 40;
/// Pause between contended lock attempts.
pub const LOCK_RETRY_DELAY: Duration = Duration::from_millis(25);
/// Maximum host name length accepted.
const MAX_HOST_LENGTH: usize = 255;

// ============================================================================
// SECTION: Persisted Format
// ============================================================================

/// One persisted seed entry.
#[derive(Debug, Serialize, Deserialize)]
struct SeedRecord {
    /// Base64-encoded seed bytes.
    seed: String,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// File-backed, host-scoped seed store.
pub struct TokenSeedStore {
    /// Directory holding the seed and lock files.
    dir: PathBuf,
    /// Seeds known to this process, keyed by host.
    cache: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl TokenSeedStore {
    /// Creates a store rooted at `dir`. Nothing is touched until first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the seed directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the seed state file path.
    #[must_use]
    pub fn seed_path(&self) -> PathBuf {
        self.dir.join(SEED_FILE_NAME)
    }

    /// Runs one lock, merge, create, write transaction for `host`.
    fn load_or_create(&self, host: &str) -> Result<Vec<u8>, SeedError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| SeedError::Io("seed cache lock poisoned".to_string()))?;

        if let Err(err) = create_seed_dir(&self.dir) {
            degrade("create seed directory", &self.dir, &err)?;
            return Ok(cache.entry(host.to_string()).or_insert_with(new_seed).clone());
        }

        let _guard = self.acquire_lock()?;
        let path = self.seed_path();
        merge_persisted(&path, &mut cache)?;

        let seed = cache.entry(host.to_string()).or_insert_with(new_seed).clone();
        let bytes = encode_state(&cache)?;
        if let Err(err) = atomic_write(&self.dir, &path, &bytes) {
            degrade("write seed file", &path, &err)?;
        }
        Ok(seed)
    }

    /// Takes the advisory lock, returning `None` when locking is unavailable.
    fn acquire_lock(&self) -> Result<Option<LockGuard>, SeedError> {
        let path = self.dir.join(LOCK_FILE_NAME);
        let file = match open_lock_file(&path) {
            Ok(file) => file,
            Err(err) => {
                degrade("open lock file", &path, &err)?;
                return Ok(None);
            }
        };
        let mut attempts = 1;
        let locked = loop {
            match file.try_lock_exclusive() {
                Err(err) if is_contended(&err) && attempts < LOCK_RETRY_ATTEMPTS => {
                    attempts += 1;
                    thread::sleep(LOCK_RETRY_DELAY);
                }
                other => break other,
            }
        };
        match locked {
            Ok(()) => Ok(Some(LockGuard {
                file,
            })),
            Err(err) if is_contended(&err) => {
                warn!(
                    path = %path.display(),
                    attempts,
                    "seed lock still held; continuing without exclusion"
                );
                Ok(None)
            }
            Err(err) => {
                degrade("lock seed directory", &path, &err)?;
                Ok(None)
            }
        }
    }
}

impl SeedProvider for TokenSeedStore {
    fn seed(&self, host: &str) -> Result<Vec<u8>, SeedError> {
        validate_host(host)?;
        self.load_or_create(host)
    }
}

/// Releases the advisory lock on drop.
struct LockGuard {
    /// Locked file handle.
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty, oversized, or control-character host names.
fn validate_host(host: &str) -> Result<(), SeedError> {
    if host.is_empty() || host.len() > MAX_HOST_LENGTH || host.chars().any(char::is_control) {
        return Err(SeedError::InvalidHost(host.to_string()));
    }
    Ok(())
}

/// Generates a fresh seed from the OS RNG.
fn new_seed() -> Vec<u8> {
    let mut seed = vec![0u8; SEED_LEN];
    OsRng.fill_bytes(&mut seed);
    seed
}

/// Returns true when another holder has the advisory lock.
fn is_contended(err: &io::Error) -> bool {
    err.kind() == fs2::lock_contended_error().kind()
}

/// Returns true for errors that mean "persistence is unavailable here".
fn is_degradable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::ReadOnlyFilesystem
            | io::ErrorKind::Unsupported
            | io::ErrorKind::NotADirectory
    )
}

/// Logs a degradable failure, or converts any other failure into an error.
fn degrade(action: &str, path: &Path, err: &io::Error) -> Result<(), SeedError> {
    if is_degradable(err) {
        warn!(path = %path.display(), error = %err, "cannot {action}; continuing without persistence");
        Ok(())
    } else {
        Err(SeedError::Io(format!("cannot {action} {}: {err}", path.display())))
    }
}

/// Creates the seed directory (mode 0755 on unix).
fn create_seed_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}

/// Opens (creating if needed) the lock file.
fn open_lock_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Merges persisted seeds into `cache`; persisted entries win.
///
/// A missing or unreadable file contributes nothing. A torn or corrupt file
/// is ignored as a whole; entries with undecodable seeds are skipped.
fn merge_persisted(path: &Path, cache: &mut BTreeMap<String, Vec<u8>>) -> Result<(), SeedError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            degrade("read seed file", path, &err)?;
            return Ok(());
        }
    };
    let records: BTreeMap<String, SeedRecord> = match serde_json::from_slice(&bytes) {
        Ok(records) => records,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable seed file");
            return Ok(());
        }
    };
    for (host, record) in records {
        match STANDARD.decode(record.seed.as_bytes()) {
            Ok(seed) if seed.len() == SEED_LEN => {
                cache.insert(host, seed);
            }
            _ => warn!(host = host.as_str(), "ignoring malformed seed entry"),
        }
    }
    Ok(())
}

/// Serializes the cache to the persisted JSON form.
fn encode_state(cache: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, SeedError> {
    let records: BTreeMap<&str, SeedRecord> = cache
        .iter()
        .map(|(host, seed)| {
            (host.as_str(), SeedRecord {
                seed: STANDARD.encode(seed),
            })
        })
        .collect();
    serde_json::to_vec_pretty(&records).map_err(|err| SeedError::Encoding(err.to_string()))
}

/// Writes `bytes` to `path` through a synced temp file and rename.
fn atomic_write(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file().set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    temp.as_file_mut().write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
