//! Local durable cache: a key -> JSON string store.
//!
//! The cache is a convenience, not a guarantee. Typed reads treat missing
//! keys, unreadable files and malformed JSON as absent; typed writes log and
//! swallow every failure.

use crate::{Identity, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

pub const SESSION_KEY: &str = "lift-session-v1";
pub const HISTORY_KEY: &str = "lift-history-v1";
pub const WORKOUTS_KEY: &str = "lift-workouts-v1";
pub const SELECTED_WORKOUT_KEY: &str = "lift-selected-workout-v1";

/// Namespace a record kind by user, e.g. `lift-session-v1-ada`
pub fn cache_key(base: &str, identity: &Identity) -> String {
    format!("{}-{}", base, identity.cache_segment())
}

/// Raw string storage behind the cache
pub trait LocalCache: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a cached value; any failure reads as `None`
pub fn read_json<T: DeserializeOwned>(cache: &dyn LocalCache, key: &str) -> Option<T> {
    let raw = match cache.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::debug!("Cache read of '{}' failed: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Ignoring malformed cache entry '{}': {}", key, e);
            None
        }
    }
}

/// Encode and store a value, best effort
pub fn write_json<T: Serialize + ?Sized>(cache: &dyn LocalCache, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(crate::Error::from)
        .and_then(|raw| cache.write(key, &raw));
    match result {
        Ok(()) => tracing::debug!("Cached '{}'", key),
        Err(e) => tracing::debug!("Cache write of '{}' failed: {}", key, e),
    }
}

/// Drop a cached value, best effort
pub fn forget(cache: &dyn LocalCache, key: &str) {
    if let Err(e) = cache.remove(key) {
        tracing::debug!("Cache removal of '{}' failed: {}", key, e);
    }
}

/// Replace `path` with `contents` via a locked temp file and rename
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "cache path missing parent")
    })?;
    std::fs::create_dir_all(dir)?;

    // Temp file in the same directory so the rename is atomic
    let temp = NamedTempFile::new_in(dir)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        writer.write_all(contents)?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// One JSON file per key inside a directory, written atomically
#[derive(Clone, Debug)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl LocalCache for FileCache {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        Ok(Some(contents))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        write_atomically(&self.path_for(key), value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-process cache, for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::builder::build_session;
    use crate::catalog::default_workouts;
    use crate::{Error, Session};

    /// A cache whose storage is full
    pub(crate) struct FullCache;

    impl LocalCache for FullCache {
        fn read(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Other("storage unavailable".into()))
        }
        fn write(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Other("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::Other("storage unavailable".into()))
        }
    }

    #[test]
    fn test_cache_key_namespacing() {
        assert_eq!(
            cache_key(SESSION_KEY, &Identity::User("ada".into())),
            "lift-session-v1-ada"
        );
        assert_eq!(cache_key(HISTORY_KEY, &Identity::Anonymous), "lift-history-v1-anon");
    }

    #[test]
    fn test_file_cache_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(temp_dir.path().join("cache"));
        let session = build_session(&default_workouts()[0]);

        write_json(&cache, "lift-session-v1-ada", &session);
        let loaded: Session = read_json(&cache, "lift-session-v1-ada").unwrap();
        assert_eq!(loaded, session);

        forget(&cache, "lift-session-v1-ada");
        assert!(read_json::<Session>(&cache, "lift-session-v1-ada").is_none());
        // removing twice is fine
        cache.remove("lift-session-v1-ada").unwrap();
    }

    #[test]
    fn test_file_cache_sanitizes_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(temp_dir.path());
        cache.write("a/../b c", "1").unwrap();
        assert!(temp_dir.path().join("a_.._b_c.json").exists());
        assert_eq!(cache.read("a/../b c").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_malformed_entry_reads_as_absent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(temp_dir.path());
        cache.write("lift-session-v1-anon", "{ invalid json }").unwrap();
        assert!(read_json::<Session>(&cache, "lift-session-v1-anon").is_none());
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(temp_dir.path());
        cache.write("k", "first").unwrap();
        cache.write("k", "second").unwrap();

        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["k.json"]);
        assert_eq!(cache.read("k").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_failing_cache_is_swallowed() {
        write_json(&FullCache, "k", &vec![1, 2, 3]);
        forget(&FullCache, "k");
        assert!(read_json::<Vec<u32>>(&FullCache, "k").is_none());
    }
}
