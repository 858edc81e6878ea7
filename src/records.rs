//! Memoization store for enriched records.
//!
//! Records are keyed by `<stem>.json` and written whole: the new JSON is
//! written to a hidden temporary file in the same directory and renamed
//! over the previous record, so a reader sees either the old record or the
//! new one, never a torn write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::StoreError;
use crate::models::{file_stem, EnrichedRecord, StoredRecord};

/// Keyed store of enriched records.
pub trait RecordStore: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// `Ok(None)` when absent; `Err(RecordDecode)` when present but unparseable.
    fn read(&self, key: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Atomically replace whatever is stored under `key`.
    fn write(&self, key: &str, record: &EnrichedRecord) -> Result<(), StoreError>;

    /// All record keys, sorted.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// JSON files in a directory, one per record.
pub struct FsRecordStore {
    dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.starts_with('.') || key.contains(|c: char| c == '/' || c == '\\') {
            return Err(StoreError::Backend(format!("invalid record key: {:?}", key)));
        }
        Ok(self.dir.join(key))
    }
}

fn io_err(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::RecordIo {
        key: key.to_string(),
        source,
    }
}

impl RecordStore for FsRecordStore {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(key)?.is_file())
    }

    fn read(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(key)(e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::RecordDecode {
                key: key.to_string(),
                source,
            })
    }

    fn write(&self, key: &str, record: &EnrichedRecord) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(io_err(key))?;

        let json = serde_json::to_string_pretty(record).map_err(|e| StoreError::RecordIo {
            key: key.to_string(),
            source: e.into(),
        })?;

        let tmp_path = self.dir.join(format!(".{}.tmp", key));
        {
            let mut file = fs::File::create(&tmp_path).map_err(io_err(key))?;
            file.write_all(json.as_bytes()).map_err(io_err(key))?;
            file.sync_all().map_err(io_err(key))?;
        }
        if let Err(e) = fs::rename(&tmp_path, &path) {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                warn!(record = %key, tmp = %tmp_path.display(), error = %cleanup, "cannot remove temporary record");
            }
            return Err(io_err(key)(e));
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err("<dir>")(e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err("<dir>"))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            if entry.path().is_file() {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Load every readable record, oldest format included.
///
/// Unparseable records are logged and left out; a legacy record without a
/// digest is returned with an empty `content_hash`.
pub fn load_records(store: &dyn RecordStore) -> Result<Vec<EnrichedRecord>, StoreError> {
    let mut records = Vec::new();
    for key in store.keys()? {
        match store.read(&key) {
            Ok(Some(stored)) => records.push(into_enriched(&key, stored)),
            Ok(None) => {}
            Err(e @ StoreError::RecordDecode { .. }) => {
                warn!(record = %key, error = %e, "skipping unreadable record");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(records)
}

fn into_enriched(key: &str, stored: StoredRecord) -> EnrichedRecord {
    let stem = file_stem(key);
    EnrichedRecord {
        title: stored.title.unwrap_or_else(|| stem.clone()),
        text: stored.text.unwrap_or_default(),
        filename: stored.filename.unwrap_or_else(|| format!("{}.txt", stem)),
        content_hash: stored.source_hash.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> EnrichedRecord {
        EnrichedRecord {
            title: "Title".to_string(),
            text: text.to_string(),
            filename: "a.txt".to_string(),
            content_hash: "h1".to_string(),
        }
    }

    #[test]
    fn test_write_read_replace() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(tmp.path().join("out"));

        assert!(!store.exists("a.json").unwrap());
        assert_eq!(store.read("a.json").unwrap(), None);

        store.write("a.json", &record("first")).unwrap();
        store.write("a.json", &record("second")).unwrap();

        let stored = store.read("a.json").unwrap().unwrap();
        assert_eq!(stored.text.as_deref(), Some("second"));
        assert_eq!(stored.source_hash.as_deref(), Some("h1"));
        assert_eq!(store.keys().unwrap(), vec!["a.json".to_string()]);
    }

    #[test]
    fn test_written_json_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(tmp.path());
        store.write("a.json", &record("café")).unwrap();

        let raw = fs::read_to_string(tmp.path().join("a.json")).unwrap();
        assert!(raw.contains("\"source_hash\": \"h1\""));
        assert!(raw.contains("café"));
    }

    #[test]
    fn test_failed_replace_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(tmp.path());
        // A directory in the record's place makes the rename fail.
        fs::create_dir_all(tmp.path().join("a.json/inner")).unwrap();

        let err = store.write("a.json", &record("body")).unwrap_err();
        assert!(matches!(err, StoreError::RecordIo { .. }));
        assert!(!tmp.path().join(".a.json.tmp").exists());
        assert!(tmp.path().join("a.json").is_dir());
    }

    #[test]
    fn test_corrupt_record_is_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.json"), "{not json").unwrap();
        let store = FsRecordStore::new(tmp.path());
        assert!(matches!(
            store.read("a.json"),
            Err(StoreError::RecordDecode { .. })
        ));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let store = FsRecordStore::new("/tmp");
        assert!(store.read("../etc.json").is_err());
        assert!(store.read(".hidden.json").is_err());
    }

    #[test]
    fn test_load_records_skips_corrupt_and_keeps_legacy() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("bad.json"), "[1, 2").unwrap();
        fs::write(
            tmp.path().join("old.json"),
            r#"{"title": "Old", "text": "legacy body", "filename": "old.txt"}"#,
        )
        .unwrap();
        fs::write(tmp.path().join("ignored.txt"), "not a record").unwrap();

        let store = FsRecordStore::new(tmp.path());
        let records = load_records(&store).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "legacy body");
        assert_eq!(records[0].content_hash, "");
    }

    #[test]
    fn test_keys_on_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(tmp.path().join("never-created"));
        assert!(store.keys().unwrap().is_empty());
    }
}
