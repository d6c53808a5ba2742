//! Single-record JSON persistence with file locking.
//!
//! Each store owns one JSON document on disk (the active timer, the
//! notification settings, the notification spool). Reads take a shared lock
//! and degrade to "absent" on any failure; writes go through a sidecar lock
//! file and an atomic temp-file rename so readers never observe a partial
//! document.

use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A JSON file holding zero or one record of type `T`
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record with shared locking
    ///
    /// Returns `None` if the file doesn't exist. Unreadable or corrupted
    /// files are logged and treated as absent.
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            tracing::debug!("No record at {:?}", self.path);
            return Ok(None);
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open {:?}: {}. Treating as absent.", self.path, e);
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock {:?}: {}. Treating as absent.", self.path, e);
            return Ok(None);
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read {:?}: {}. Treating as absent.", self.path, e);
            return Ok(None);
        }

        file.unlock()?;

        match serde_json::from_str::<T>(&contents) {
            Ok(record) => {
                tracing::debug!("Loaded record from {:?}", self.path);
                Ok(Some(record))
            }
            Err(e) => {
                tracing::warn!("Failed to parse {:?}: {}. Treating as absent.", self.path, e);
                Ok(None)
            }
        }
    }

    /// Persist the record, replacing any previous one
    pub fn save(&self, record: &T) -> Result<()> {
        let guard = self.write_lock()?;
        let result = self.write_unlocked(record);
        guard.unlock()?;
        result
    }

    /// Remove the record. A missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        let guard = self.write_lock()?;
        let result = match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Cleared record at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "failed to remove {:?}: {}",
                self.path, e
            ))),
        };
        guard.unlock()?;
        result
    }

    /// Load the record, modify it, and save it back under one write lock
    ///
    /// Returns `Ok(None)` without writing anything when no record exists, so
    /// an update racing a `clear` never brings the record back.
    pub fn update<F>(&self, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let guard = self.write_lock()?;
        let result = (|| -> Result<Option<T>> {
            let Some(mut record) = self.load()? else {
                return Ok(None);
            };
            f(&mut record)?;
            self.write_unlocked(&record)?;
            Ok(Some(record))
        })();
        guard.unlock()?;
        result
    }

    /// Write `record` only if no record exists yet
    ///
    /// The check and the write happen under one write lock. On conflict the
    /// existing record is returned and nothing is written. An unreadable
    /// file counts as absent and is replaced.
    pub fn insert_if_absent(&self, record: &T) -> Result<Option<T>> {
        let guard = self.write_lock()?;
        let result = (|| -> Result<Option<T>> {
            if let Some(existing) = self.load()? {
                return Ok(Some(existing));
            }
            self.write_unlocked(record)?;
            Ok(None)
        })();
        guard.unlock()?;
        result
    }

    /// Like [`update`](Self::update), but starts from `default()` when no
    /// record exists
    pub fn update_or_insert_with<D, F>(&self, default: D, f: F) -> Result<T>
    where
        D: FnOnce() -> T,
        F: FnOnce(&mut T) -> Result<()>,
    {
        let guard = self.write_lock()?;
        let result = (|| -> Result<T> {
            let mut record = self.load()?.unwrap_or_else(default);
            f(&mut record)?;
            self.write_unlocked(&record)?;
            Ok(record)
        })();
        guard.unlock()?;
        result
    }

    /// Remove the record and return what it held, under one write lock
    ///
    /// A corrupted file is removed too and reported as `None`.
    pub fn take(&self) -> Result<Option<T>> {
        let guard = self.write_lock()?;
        let result = (|| -> Result<Option<T>> {
            let record = self.load()?;
            match std::fs::remove_file(&self.path) {
                Ok(()) => tracing::debug!("Took record from {:?}", self.path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::Storage(format!(
                        "failed to remove {:?}: {}",
                        self.path, e
                    )))
                }
            }
            Ok(record)
        })();
        guard.unlock()?;
        result
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Serializes writers across processes. Held for the whole of a
    /// save/clear/update.
    fn write_lock(&self) -> Result<File> {
        std::fs::create_dir_all(parent_dir(&self.path))?;
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;
        Ok(lock)
    }

    fn write_unlocked(&self, record: &T) -> Result<()> {
        let temp = NamedTempFile::new_in(parent_dir(&self.path))?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(record)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved record to {:?}", self.path);
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        label: String,
        value: u32,
    }

    fn counter(value: u32) -> Counter {
        Counter {
            label: "naps".into(),
            value,
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("counter.json"));

        store.save(&counter(3)).unwrap();

        assert_eq!(store.load().unwrap(), Some(counter(3)));
    }

    #[test]
    fn test_load_nonexistent_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("missing.json"));

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_corrupted_record_is_absent() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("corrupted.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let store = JsonFileStore::<Counter>::new(&path);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("deeper").join("c.json");
        let store = JsonFileStore::<Counter>::new(&path);

        store.save(&counter(1)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_clear_removes_record_and_tolerates_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("counter.json"));

        store.save(&counter(1)).unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);

        // Second clear is a no-op
        store.clear().unwrap();
    }

    #[test]
    fn test_update_modifies_existing_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("counter.json"));
        store.save(&counter(1)).unwrap();

        let updated = store
            .update(|c| {
                c.value += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(updated, Some(counter(2)));
        assert_eq!(store.load().unwrap(), Some(counter(2)));
    }

    #[test]
    fn test_update_does_not_resurrect_cleared_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("counter.json"));

        let updated = store
            .update(|c| {
                c.value = 99;
                Ok(())
            })
            .unwrap();

        assert_eq!(updated, None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_failed_update_leaves_record_untouched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("counter.json"));
        store.save(&counter(5)).unwrap();

        let result = store.update(|c| {
            c.value = 0;
            Err(Error::Other("abort".into()))
        });

        assert!(result.is_err());
        assert_eq!(store.load().unwrap(), Some(counter(5)));
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("counter.json"));

        store.save(&counter(1)).unwrap();
        store.save(&counter(2)).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "counter.json" && e.file_name() != "counter.json.lock")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only counter.json and its lock, found extras: {:?}",
            extras
        );
    }

    #[test]
    fn test_insert_if_absent_keeps_existing_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("counter.json"));

        assert_eq!(store.insert_if_absent(&counter(1)).unwrap(), None);
        assert_eq!(store.insert_if_absent(&counter(2)).unwrap(), Some(counter(1)));
        assert_eq!(store.load().unwrap(), Some(counter(1)));
    }

    #[test]
    fn test_concurrent_inserts_have_one_winner() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("counter.json");
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let store = JsonFileStore::<Counter>::new(path);
                    barrier.wait();
                    store.insert_if_absent(&counter(i)).unwrap().is_none()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_concurrent_update_or_insert_loses_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("list.json");
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(4));

        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let store = JsonFileStore::<Vec<u32>>::new(path);
                    barrier.wait();
                    store
                        .update_or_insert_with(Vec::new, |list| {
                            list.push(i);
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut list = JsonFileStore::<Vec<u32>>::new(&path).load().unwrap().unwrap();
        list.sort();
        assert_eq!(list, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_take_returns_and_removes_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Counter>::new(temp_dir.path().join("counter.json"));
        store.save(&counter(7)).unwrap();

        assert_eq!(store.take().unwrap(), Some(counter(7)));
        assert!(!store.path().exists());
        assert_eq!(store.take().unwrap(), None);
    }

    #[test]
    fn test_take_removes_corrupted_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("counter.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::<Counter>::new(&path);
        assert_eq!(store.take().unwrap(), None);
        assert!(!path.exists());
    }
}
