//! File Backend Module
//!
//! Persists one JSON record per key under a storage directory and keeps an
//! in-memory index of which keys have a record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::codec::CacheRecord;
use crate::cache::{sanitize_key, CacheBackend, CacheEntry, EntryIndex, KeyPattern, Status};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Extension of every record file.
pub const RECORD_EXTENSION: &str = ".json";

const TEMP_EXTENSION: &str = ".tmp";

// == File State ==
#[derive(Debug)]
struct FileState {
    /// Storage directory
    root: PathBuf,
    /// Sanitized keys with a record on disk
    index: EntryIndex,
}

impl FileState {
    fn record_path(&self, token: &str) -> PathBuf {
        self.root.join(format!("{}{}", token, RECORD_EXTENSION))
    }
}

// == File Backend ==
/// File-backed cache engine.
///
/// Keys are sanitized into file names, so `user/1` and `user1` share a
/// record. Expiration is lazy: an expired record stays on disk until it is
/// next read, or until [`CacheBackend::purge_expired`] runs.
#[derive(Debug, Default)]
pub struct FileBackend {
    state: RwLock<Option<FileState>>,
}

impl FileBackend {
    /// Creates an uninitialized backend. Call `init` before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend and initializes it with `config`.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let backend = Self::new();
        backend.init(config).await?;
        Ok(backend)
    }

    /// Storage directory, once initialized.
    pub async fn root(&self) -> Option<PathBuf> {
        self.state.read().await.as_ref().map(|s| s.root.clone())
    }

    /// Number of indexed keys.
    pub async fn len(&self) -> usize {
        self.state
            .read()
            .await
            .as_ref()
            .map_or(0, |s| s.index.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Token Operations ==
    // Everything below works on sanitized keys. Removals decided under the
    // read lock are re-checked under the write lock, since a `set` may have
    // committed in between.

    async fn get_token(&self, token: &str) -> Result<Option<Value>> {
        let record = {
            let guard = self.state.read().await;
            let state = guard.as_ref().ok_or(CacheError::NotInitialized)?;
            if !state.index.contains(token) {
                return Ok(None);
            }
            read_record(&state.record_path(token)).await?
        };

        let Some(record) = record else {
            self.forget_if_missing(token).await;
            return Ok(None);
        };

        if record.is_expired()? {
            debug!(key = token, "Cache record expired");
            if let Err(e) = self.remove_if_expired(token).await {
                warn!(key = token, error = %e, "Failed to remove expired cache record");
            }
            return Ok(None);
        }

        record.payload().map(Some)
    }

    async fn remove_token(&self, token: &str) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        let path = state.record_path(token);
        match fs::remove_file(&path).await {
            Ok(()) => debug!(key = token, "Removed cache record"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(path, e)),
        }

        state.index.unmark(token);
        Ok(())
    }

    /// Deletes the record only if it is still expired once the write lock
    /// is held.
    async fn remove_if_expired(&self, token: &str) -> Result<bool> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        let path = state.record_path(token);
        match read_record(&path).await? {
            Some(record) if !record.is_expired()? => {
                debug!(key = token, "Cache record rewritten before removal, keeping it");
                return Ok(false);
            }
            Some(_) => match fs::remove_file(&path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    return Err(CacheError::io(path, e))
                }
                _ => debug!(key = token, "Removed expired cache record"),
            },
            None => {}
        }

        state.index.unmark(token);
        Ok(true)
    }

    /// Drops `token` from the index if its record is still missing.
    async fn forget_if_missing(&self, token: &str) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else {
            return;
        };

        let path = state.record_path(token);
        match fs::try_exists(&path).await {
            Ok(false) => {
                warn!(key = token, "Cache record missing on disk, repairing index");
                state.index.unmark(token);
            }
            Ok(true) => {}
            Err(e) => warn!(key = token, error = %e, "Failed to check cache record"),
        }
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn init(&self, config: &CacheConfig) -> Result<()> {
        let root = config.file.path.clone();

        fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::io(&root, e))?;

        let tokens = list_records(&root).await?;
        info!(
            path = %root.display(),
            entries = tokens.len(),
            "File cache initialized"
        );

        *self.state.write().await = Some(FileState {
            root,
            index: EntryIndex::seeded(tokens),
        });
        Ok(())
    }

    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<Value> {
        if value.is_null() {
            return Err(CacheError::Validation(format!(
                "cannot cache a null value for key '{}'",
                key
            )));
        }

        let token = sanitize_key(key);
        if token.is_empty() {
            return Err(CacheError::Validation(format!(
                "key '{}' has no characters usable in a file name",
                key
            )));
        }

        let bytes = CacheRecord::new(&value, ttl_seconds)?.encode()?;

        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        // Readers only ever see a complete record: write aside, then rename
        let path = state.record_path(&token);
        let temp = temp_path(&path);
        fs::write(&temp, &bytes)
            .await
            .map_err(|e| CacheError::io(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::io(path, e));
        }

        state.index.mark(&token);
        debug!(key = %token, ttl = ttl_seconds, "Stored cache record");
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let token = sanitize_key(key);
        if token.is_empty() {
            return Ok(None);
        }
        self.get_token(&token).await
    }

    async fn has(&self, key: &str) -> bool {
        let token = sanitize_key(key);
        if token.is_empty() {
            return false;
        }

        let record = {
            let guard = self.state.read().await;
            let Some(state) = guard.as_ref() else {
                return false;
            };
            if !state.index.contains(&token) {
                return false;
            }
            read_record(&state.record_path(&token)).await
        };

        // Only the expiry is checked, the payload stays encoded
        match record {
            Ok(Some(record)) => matches!(record.is_expired(), Ok(false)),
            Ok(None) => {
                self.forget_if_missing(&token).await;
                false
            }
            Err(e) => {
                warn!(key = %token, error = %e, "Failed to read cache record");
                false
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<Status> {
        let token = sanitize_key(key);
        if !token.is_empty() {
            self.remove_token(&token).await?;
        }
        Ok(Status::DONE)
    }

    async fn remove_by_pattern(&self, pattern: &str) -> Result<Status> {
        let pattern = KeyPattern::new(pattern)?;

        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        // Matched against the file name as stored, extension included
        let matches: Vec<String> = list_file_names(&state.root)
            .await?
            .into_iter()
            .filter(|name| name.ends_with(RECORD_EXTENSION) && pattern.is_match(name))
            .collect();

        let mut deletes = JoinSet::new();
        for name in matches {
            let path = state.root.join(&name);
            deletes.spawn(async move {
                let outcome = match fs::remove_file(&path).await {
                    Err(e) if e.kind() != ErrorKind::NotFound => Err(CacheError::io(path, e)),
                    _ => Ok(()),
                };
                (name, outcome)
            });
        }

        let mut removed = 0usize;
        let mut first_error = None;
        while let Some(joined) = deletes.join_next().await {
            let (name, outcome) = joined
                .map_err(|e| CacheError::io(&state.root, std::io::Error::other(e)))?;
            match outcome {
                Ok(()) => {
                    let token = name.strip_suffix(RECORD_EXTENSION).unwrap_or(&name);
                    state.index.unmark(token);
                    removed += 1;
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        debug!(pattern = pattern.as_str(), removed, "Removed cache records by pattern");
        match first_error {
            Some(e) => Err(e),
            None => Ok(Status::DONE),
        }
    }

    async fn clear(&self) -> Result<Status> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        match fs::remove_dir_all(&state.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(&state.root, e)),
        }
        fs::create_dir_all(&state.root)
            .await
            .map_err(|e| CacheError::io(&state.root, e))?;

        state.index.reset();
        info!(path = %state.root.display(), "File cache cleared");
        Ok(Status::DONE)
    }

    async fn get_all(&self) -> Result<Vec<CacheEntry>> {
        let tokens = {
            let guard = self.state.read().await;
            guard
                .as_ref()
                .ok_or(CacheError::NotInitialized)?
                .index
                .keys()
        };

        let mut entries = Vec::with_capacity(tokens.len());
        for token in tokens {
            if let Some(value) = self.get_token(&token).await? {
                entries.push(CacheEntry { key: token, value });
            }
        }
        Ok(entries)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        let mut purged = 0;
        for token in state.index.keys() {
            let path = state.record_path(&token);
            let expired = match read_record(&path).await {
                Ok(Some(record)) => record.is_expired().unwrap_or(false),
                Ok(None) => {
                    state.index.unmark(&token);
                    continue;
                }
                Err(e) => {
                    warn!(key = %token, error = %e, "Skipping unreadable cache record");
                    continue;
                }
            };

            if expired {
                match fs::remove_file(&path).await {
                    Err(e) if e.kind() != ErrorKind::NotFound => {
                        return Err(CacheError::io(path, e))
                    }
                    _ => {}
                }
                state.index.unmark(&token);
                purged += 1;
            }
        }
        Ok(purged)
    }
}

// == Storage Helpers ==

/// Reads and decodes a record, `None` when the file does not exist.
async fn read_record(path: &Path) -> Result<Option<CacheRecord>> {
    match fs::read(path).await {
        Ok(bytes) => CacheRecord::decode(&bytes).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Lists plain file names in `root`.
async fn list_file_names(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut dir = fs::read_dir(root)
        .await
        .map_err(|e| CacheError::io(root, e))?;

    while let Some(entry) = dir.next_entry().await.map_err(|e| CacheError::io(root, e))? {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Lists record keys in `root`, file names without the extension.
async fn list_records(root: &Path) -> Result<Vec<String>> {
    Ok(list_file_names(root)
        .await?
        .into_iter()
        .filter_map(|name| name.strip_suffix(RECORD_EXTENSION).map(str::to_string))
        .collect())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_EXTENSION);
    PathBuf::from(name)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn open_backend(dir: &TempDir) -> FileBackend {
        FileBackend::open(&CacheConfig::file(dir.path())).await.unwrap()
    }

    #[tokio::test]
    async fn test_init_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("cache");

        let backend = FileBackend::open(&CacheConfig::file(&root)).await.unwrap();

        assert!(root.is_dir());
        assert_eq!(backend.root().await, Some(root));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_uninitialized_backend() {
        let backend = FileBackend::new();

        let result = backend.set("foo", json!("bar"), 60).await;
        assert!(matches!(result, Err(CacheError::NotInitialized)));
        assert!(!backend.has("foo").await);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        let stored = backend.set("foo", json!("bar"), 60).await.unwrap();
        assert_eq!(stored, json!("bar"));
        assert_eq!(backend.get("foo").await.unwrap(), Some(json!("bar")));
        assert!(backend.has("foo").await);
    }

    #[tokio::test]
    async fn test_record_file_format() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("foo1", json!({"bar": "baz"}), 60).await.unwrap();

        let bytes = std::fs::read(dir.path().join("foo1.json")).unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["value"], json!(r#"{"bar":"baz"}"#));
        assert!(doc["expire"].as_str().unwrap().parse::<u64>().is_ok());
        assert!(!dir.path().join("foo1.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_set_null_rejected() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        let result = backend.set("foo", Value::Null, 60).await;
        assert!(matches!(result, Err(CacheError::Validation(_))));
        assert!(!backend.has("foo").await);
    }

    #[tokio::test]
    async fn test_unusable_key_rejected_on_set_absent_on_read() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        let result = backend.set("..", json!(1), 60).await;
        assert!(matches!(result, Err(CacheError::Validation(_))));
        assert_eq!(backend.get("..").await.unwrap(), None);
        assert_eq!(backend.remove("..").await.unwrap(), Status::DONE);
    }

    #[tokio::test]
    async fn test_sanitized_key_shared_between_read_and_write() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("../users/1", json!("alice"), 60).await.unwrap();

        assert!(dir.path().join("..users1.json").exists());
        assert_eq!(
            backend.get("../users/1").await.unwrap(),
            Some(json!("alice"))
        );
    }

    #[tokio::test]
    async fn test_expired_record_removed_on_read() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("short", json!("lived"), 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        // Still on disk until observed
        assert!(dir.path().join("short.json").exists());
        assert!(!backend.has("short").await);
        assert!(dir.path().join("short.json").exists());

        assert_eq!(backend.get("short").await.unwrap(), None);
        assert!(!dir.path().join("short.json").exists());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_index_drift_self_heals() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("foo", json!("bar"), 60).await.unwrap();
        std::fs::remove_file(dir.path().join("foo.json")).unwrap();

        assert!(!backend.has("foo").await);
        assert_eq!(backend.get("foo").await.unwrap(), None);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_has_repairs_index_drift() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("foo", json!("bar"), 60).await.unwrap();
        std::fs::remove_file(dir.path().join("foo.json")).unwrap();

        assert!(!backend.has("foo").await);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_expiry_removal_keeps_rewritten_record() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("k", json!("stale"), 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;

        // A write landing between the expired read and its removal survives
        backend.set("k", json!("fresh"), 60).await.unwrap();
        assert!(!backend.remove_if_expired("k").await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some(json!("fresh")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_expired_read_and_write() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(open_backend(&dir).await);

        for round in 0..200 {
            backend.set("k", json!("stale"), 0).await.unwrap();
            tokio::time::sleep(Duration::from_millis(3)).await;

            let reader = {
                let backend = backend.clone();
                tokio::spawn(async move { backend.get("k").await })
            };
            let writer = {
                let backend = backend.clone();
                tokio::spawn(async move { backend.set("k", json!(round), 60).await })
            };
            reader.await.unwrap().unwrap();
            writer.await.unwrap().unwrap();

            assert_eq!(
                backend.get("k").await.unwrap(),
                Some(json!(round)),
                "write of round {} was lost",
                round
            );
            assert!(backend.has("k").await);
        }
    }

    #[tokio::test]
    async fn test_corrupt_record_is_deserialization_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{ nope").unwrap();
        let backend = open_backend(&dir).await;

        let result = backend.get("broken").await;
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("foo", json!("bar"), 60).await.unwrap();
        assert_eq!(backend.remove("foo").await.unwrap(), Status::DONE);
        assert_eq!(backend.remove("foo").await.unwrap(), Status::DONE);
        assert_eq!(backend.remove("never_set").await.unwrap(), Status::DONE);
        assert_eq!(backend.get("foo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_by_pattern_is_selective() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        for key in ["other_foo", "pattern_foo", "pattern_foo2", "pattern_foo3"] {
            backend.set(key, json!("bar"), 60).await.unwrap();
        }

        let status = backend.remove_by_pattern("pattern").await.unwrap();
        assert_eq!(status, Status::DONE);

        for key in ["pattern_foo", "pattern_foo2", "pattern_foo3"] {
            assert_eq!(backend.get(key).await.unwrap(), None);
            assert!(!dir.path().join(format!("{}.json", key)).exists());
        }
        assert_eq!(backend.get("other_foo").await.unwrap(), Some(json!("bar")));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_by_pattern_sees_extension() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("a", json!(1), 60).await.unwrap();
        backend.set("b", json!(2), 60).await.unwrap();

        backend.remove_by_pattern(r"^a\.json$").await.unwrap();

        assert_eq!(backend.get("a").await.unwrap(), None);
        assert_eq!(backend.get("b").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_remove_by_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        let result = backend.remove_by_pattern("[").await;
        assert!(matches!(result, Err(CacheError::InvalidPattern(_))));
    }

    #[tokio::test]
    async fn test_clear_twice() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("foo", json!("bar"), 60).await.unwrap();
        assert_eq!(backend.clear().await.unwrap(), Status::DONE);
        assert_eq!(backend.clear().await.unwrap(), Status::DONE);

        assert!(dir.path().is_dir());
        assert_eq!(backend.get("foo").await.unwrap(), None);
        assert!(!backend.has("foo").await);
    }

    #[tokio::test]
    async fn test_get_all() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        assert!(backend.get_all().await.unwrap().is_empty());

        backend.set("a", json!(1), 60).await.unwrap();
        backend.set("b", json!({"x": true}), 60).await.unwrap();

        let entries = backend.get_all().await.unwrap();
        assert_eq!(
            entries,
            vec![
                CacheEntry { key: "a".to_string(), value: json!(1) },
                CacheEntry { key: "b".to_string(), value: json!({"x": true}) },
            ]
        );
    }

    #[tokio::test]
    async fn test_reinit_rescans_storage() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;
        backend.set("kept", json!("value"), 60).await.unwrap();

        let restarted = open_backend(&dir).await;
        assert_eq!(restarted.len().await, 1);
        assert_eq!(restarted.get("kept").await.unwrap(), Some(json!("value")));

        // Re-init on the same instance replaces the index wholesale
        std::fs::remove_file(dir.path().join("kept.json")).unwrap();
        backend.init(&CacheConfig::file(dir.path())).await.unwrap();
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_init_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub.json")).unwrap();

        let backend = open_backend(&dir).await;
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let dir = TempDir::new().unwrap();
        let backend = open_backend(&dir).await;

        backend.set("short", json!(1), 1).await.unwrap();
        backend.set("long", json!(2), 60).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(backend.purge_expired().await.unwrap(), 1);
        assert!(!dir.path().join("short.json").exists());
        assert_eq!(backend.get("long").await.unwrap(), Some(json!(2)));
    }
}
