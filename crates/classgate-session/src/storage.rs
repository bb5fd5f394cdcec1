//! Key-value persistence for the session pair.
//!
//! The session is exactly two entries:
//!
//! ```text
//!   "token" → raw token string
//!   "user"  → JSON of StoredUser { username, role, unitId }
//! ```
//!
//! They are written and cleared together by the [`SessionManager`]; a
//! reader never sees one without the other once a write has returned.
//!
//! Three backends are provided:
//! - [`MemoryStorage`]: a map behind a mutex. Tests and ephemeral runs.
//! - [`FileStorage`]: one JSON object on disk, rewritten atomically.
//! - [`FallbackStorage`]: wraps another backend and degrades to memory the
//!   first time it fails, for the rest of the process.
//!
//! [`SessionManager`]: crate::SessionManager

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::StorageError;

/// Storage key holding the raw token.
pub const TOKEN_KEY: &str = "token";
/// Storage key holding the serialized [`StoredUser`](classgate_protocol::StoredUser).
pub const USER_KEY: &str = "user";

/// A string-keyed, string-valued store.
pub trait Storage: Send + Sync {
    /// Returns the value under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Stores all `entries` in one operation.
    ///
    /// The default writes key by key and, on failure, removes the keys it
    /// already wrote. Backends that can write a batch at once override it.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(error) = self.set(key, value) {
                for (key, _) in &entries[..written] {
                    if let Err(rollback) = self.remove(key) {
                        tracing::error!(key, %rollback, "could not roll back partial write");
                    }
                }
                return Err(error);
            }
        }
        Ok(())
    }

    /// Removes all `keys` in one operation.
    ///
    /// The default removes key by key, attempting every key; the first
    /// error wins.
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        keys.iter()
            .map(|key| self.remove(key))
            .fold(Ok(()), |acc, result| acc.and(result))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-process storage. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let mut map = lock(&self.entries);
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut map = lock(&self.entries);
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

/// Storage backed by a single JSON object file.
///
/// Every operation re-reads the file, so a session written by another
/// process is visible on the next read. Writes go to a sibling temp file
/// that is then renamed over the original, so a crash mid-write leaves the
/// previous contents intact.
///
/// A missing file reads as empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of `path` with `.tmp` appended, so it never equals `path`.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(StorageError::Corrupt),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(entries).map_err(StorageError::Serialize)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = lock(&self.guard);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = lock(&self.guard);
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = lock(&self.guard);
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    fn set_many(&self, batch: &[(&str, &str)]) -> Result<(), StorageError> {
        let _guard = lock(&self.guard);
        let mut entries = self.load()?;
        for (key, value) in batch {
            entries.insert(key.to_string(), value.to_string());
        }
        self.save(&entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = lock(&self.guard);
        let mut entries = self.load()?;
        let before = entries.len();
        for key in keys {
            entries.remove(*key);
        }
        if entries.len() != before {
            self.save(&entries)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FallbackStorage
// ---------------------------------------------------------------------------

/// Wraps a primary backend and switches to memory on its first failure.
///
/// ```text
///   primary ok ───────────────→ primary
///   primary fails (once) ──┐
///                          └──→ memory, for the rest of the process
/// ```
///
/// Once degraded, the primary is never consulted again: a session written
/// to memory must not be shadowed by a stale one still on disk. On the
/// switch, a complete token/user pair still readable from the primary is
/// copied into memory first, so the live session survives it.
pub struct FallbackStorage {
    primary: Box<dyn Storage>,
    memory: MemoryStorage,
    degraded: AtomicBool,
}

impl FallbackStorage {
    pub fn new(primary: impl Storage + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            memory: MemoryStorage::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// `true` once the primary has failed and memory is in use.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn degrade(&self, op: &str, error: &StorageError) {
        if self.degraded.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!(op, %error, "session storage failed, falling back to memory");
        self.carry_over();
    }

    /// Copies the session pair from the primary, only if both halves read.
    fn carry_over(&self) {
        let token = self.primary.get(TOKEN_KEY);
        let user = self.primary.get(USER_KEY);
        if let (Ok(Some(token)), Ok(Some(user))) = (token, user) {
            // Memory never fails.
            let _ = self
                .memory
                .set_many(&[(TOKEN_KEY, token.as_str()), (USER_KEY, user.as_str())]);
            tracing::debug!("session carried over to memory");
        }
    }
}

impl Storage for FallbackStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if !self.is_degraded() {
            match self.primary.get(key) {
                Ok(value) => return Ok(value),
                Err(e) => self.degrade("get", &e),
            }
        }
        self.memory.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if !self.is_degraded() {
            match self.primary.set(key, value) {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade("set", &e),
            }
        }
        self.memory.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if !self.is_degraded() {
            match self.primary.remove(key) {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade("remove", &e),
            }
        }
        self.memory.remove(key)
    }

    /// A failed batch is redone whole in memory, and its keys are
    /// removed from the primary so no half batch is left behind there.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        if !self.is_degraded() {
            match self.primary.set_many(entries) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.degrade("set_many", &e);
                    let keys: Vec<&str> = entries.iter().map(|(key, _)| *key).collect();
                    if let Err(error) = self.primary.remove_many(&keys) {
                        tracing::warn!(%error, "could not scrub partial write from primary");
                    }
                }
            }
        }
        self.memory.set_many(entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        if !self.is_degraded() {
            match self.primary.remove_many(keys) {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade("remove_many", &e),
            }
        }
        self.memory.remove_many(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A backend that fails every call.
    struct Broken;

    impl Storage for Broken {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
    }

    /// Shares its map with the test; writes to `key` fail.
    struct FailOn {
        inner: std::sync::Arc<MemoryStorage>,
        key: &'static str,
    }

    impl Storage for FailOn {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.key {
                return Err(StorageError::Unavailable("quota exceeded".into()));
            }
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn fail_on(key: &'static str) -> (FailOn, std::sync::Arc<MemoryStorage>) {
        let inner = std::sync::Arc::new(MemoryStorage::new());
        let storage = FailOn {
            inner: inner.clone(),
            key,
        };
        (storage, inner)
    }

    // =====================================================================
    // Storage::set_many() default
    // =====================================================================

    #[test]
    fn test_set_many_default_rolls_back_written_keys() {
        let (storage, inner) = fail_on(USER_KEY);

        let result = storage.set_many(&[(TOKEN_KEY, "abc"), (USER_KEY, "{}")]);

        assert!(result.is_err());
        assert!(inner.is_empty());
    }

    #[test]
    fn test_remove_many_default_removes_every_key() {
        let (storage, inner) = fail_on("none");
        inner.set(TOKEN_KEY, "abc").unwrap();
        inner.set(USER_KEY, "{}").unwrap();

        storage.remove_many(&[TOKEN_KEY, USER_KEY]).unwrap();

        assert!(inner.is_empty());
    }

    // =====================================================================
    // MemoryStorage
    // =====================================================================

    #[test]
    fn test_memory_set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        storage.remove(TOKEN_KEY).unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_memory_remove_missing_key_is_ok() {
        assert!(MemoryStorage::new().remove("nope").is_ok());
    }

    // =====================================================================
    // FileStorage
    // =====================================================================

    #[test]
    fn test_file_missing_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        FileStorage::new(&path).set(TOKEN_KEY, "abc").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_file_remove_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        storage.set(TOKEN_KEY, "abc").unwrap();
        storage.set(USER_KEY, "{}").unwrap();

        storage.remove(TOKEN_KEY).unwrap();

        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(USER_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_file_set_many_and_remove_many_keep_pair_together() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::new(&path);
        storage.set("theme", "dark").unwrap();

        storage.set_many(&[(TOKEN_KEY, "abc"), (USER_KEY, "{}")]).unwrap();

        let on_disk: HashMap<String, String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.get(TOKEN_KEY).map(String::as_str), Some("abc"));
        assert_eq!(on_disk.get(USER_KEY).map(String::as_str), Some("{}"));

        storage.remove_many(&[TOKEN_KEY, USER_KEY]).unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(reopened.get(USER_KEY).unwrap(), None);
        assert_eq!(reopened.get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_file_path_ending_in_tmp_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.tmp");
        let storage = FileStorage::new(&path);

        storage.set(TOKEN_KEY, "abc").unwrap();

        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert!(!dir.path().join("session.tmp.tmp").exists());
    }

    #[test]
    fn test_file_corrupt_contents_return_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"not json").unwrap();

        let result = FileStorage::new(&path).get(TOKEN_KEY);
        assert!(matches!(result, Err(StorageError::Corrupt(_))));
    }

    // =====================================================================
    // FallbackStorage
    // =====================================================================

    #[test]
    fn test_fallback_uses_primary_while_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FallbackStorage::new(FileStorage::new(&path));

        storage.set(TOKEN_KEY, "abc").unwrap();

        assert!(!storage.is_degraded());
        assert!(path.exists());
    }

    #[test]
    fn test_fallback_degrades_to_memory_on_failure() {
        let storage = FallbackStorage::new(Broken);

        storage.set(TOKEN_KEY, "abc").unwrap();

        assert!(storage.is_degraded());
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        storage.remove(TOKEN_KEY).unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_fallback_failed_batch_is_redone_whole_in_memory() {
        let (primary, inner) = fail_on(USER_KEY);
        let storage = FallbackStorage::new(primary);

        storage.set_many(&[(TOKEN_KEY, "abc"), (USER_KEY, "{}")]).unwrap();

        assert!(storage.is_degraded());
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(storage.get(USER_KEY).unwrap().as_deref(), Some("{}"));
        // No half pair left on the primary.
        assert_eq!(inner.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_fallback_carries_existing_pair_into_memory() {
        let (primary, inner) = fail_on("theme");
        inner.set(TOKEN_KEY, "abc").unwrap();
        inner.set(USER_KEY, "{}").unwrap();
        let storage = FallbackStorage::new(primary);

        storage.set("theme", "dark").unwrap();

        assert!(storage.is_degraded());
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(storage.get(USER_KEY).unwrap().as_deref(), Some("{}"));
        assert_eq!(storage.get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_fallback_does_not_carry_half_pair() {
        let (primary, inner) = fail_on("theme");
        inner.set(TOKEN_KEY, "abc").unwrap();
        let storage = FallbackStorage::new(primary);

        storage.set("theme", "dark").unwrap();

        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }
}
