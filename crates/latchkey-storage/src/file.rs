//! File-backed storage implementation.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::traits::SessionStorage;
use crate::{StorageError, StorageResult};

/// File-backed storage: one JSON document holding every key.
///
/// The document is read once at construction and held in memory; every
/// mutation rewrites the file through a temp-file-and-rename so a crash
/// mid-write never leaves a torn document behind.
pub struct FileStorage {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens the document at `path`, creating an empty store if the file
    /// does not exist yet.
    pub fn new(path: PathBuf) -> StorageResult<Self> {
        let cache = Self::read_document(&path)?;
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    fn read_document(path: &Path) -> StorageResult<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };
        match serde_json::from_str(&raw) {
            Ok(document) => Ok(document),
            Err(e) => {
                // An unreadable document would block every login, so start
                // empty and let the next write replace it.
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Session store document unreadable, starting empty"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist(&self, document: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(document)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        Self::atomic_write(&self.path, &content)?;
        Ok(())
    }

    fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("file");
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let tmp = parent.join(format!(".{}.tmp.{}", file_name, nanos));

        let result = (|| {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

impl SessionStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(key.to_string(), value.to_string());
        self.persist(&cache)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let cache = self.cache.lock().unwrap();
        Ok(cache.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut cache = self.cache.lock().unwrap();
        let existed = cache.remove(key).is_some();
        if existed {
            self.persist(&cache)?;
        }
        Ok(existed)
    }

    fn list_keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let cache = self.cache.lock().unwrap();
        Ok(cache
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
