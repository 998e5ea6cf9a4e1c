//! Generic, versioned, atomically-persisted collection of `Record`s.
//!
//! On-disk shape is a single JSON document per collection:
//! `{ "version": u64, "updated_at": i64, "records": { "<id>": T, ... } }`.
//!
//! `save` never leaves a half-written file on disk: it serialises to
//! `<collection>.json.tmp-<pid>` in the same directory, `fsync`s that file,
//! then `rename`s it over the canonical path (rename is atomic on the same
//! filesystem). `open` sweeps the directory for stale `.tmp-*` siblings
//! before reading the canonical file, so a kill mid-save never leaves
//! garbage that a later run might mistake for the real document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::filter::Filter;
use crate::record::{Record, now_ms};
use crate::sqlite_index::SecondaryIndex;

pub type SnapshotId = String;

#[derive(Serialize, Deserialize)]
struct StoreDocument<T> {
    version: u64,
    updated_at: i64,
    records: HashMap<String, T>,
}

pub struct Store<T: Record> {
    dir: PathBuf,
    version: u64,
    records: HashMap<String, T>,
    index: SecondaryIndex,
}

impl<T: Record> Store<T> {
    fn doc_path(dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", T::collection()))
    }

    fn snapshots_dir(dir: &Path) -> PathBuf {
        dir.join("snapshots")
    }

    /// Open (creating if absent) the collection rooted at `dir`.
    ///
    /// Sweeps leftover `*.tmp-*` files from a previous interrupted save
    /// before reading the canonical document.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        sweep_stale_temp_files(&dir)?;

        let doc_path = Self::doc_path(&dir);
        let doc: StoreDocument<T> = match read_json(&doc_path)? {
            Some(doc) => doc,
            None => StoreDocument {
                version: 0,
                updated_at: now_ms(),
                records: HashMap::new(),
            },
        };

        let index = SecondaryIndex::open_in_memory().map_err(StoreError::Index)?;
        for record in doc.records.values() {
            index
                .put(T::collection(), record.id(), &record.index_fields())
                .map_err(StoreError::Index)?;
        }

        Ok(Self {
            dir,
            version: doc.version,
            records: doc.records,
            index,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    /// List records matching every filter (AND). Empty filter list lists all.
    pub fn list(&self, filters: &[Filter]) -> Result<Vec<&T>, StoreError> {
        let ids = self.index.query(T::collection(), filters).map_err(StoreError::Index)?;
        Ok(ids.iter().filter_map(|id| self.records.get(id)).collect())
    }

    /// Insert or overwrite a record in memory (does not persist - call `save`).
    pub fn put(&mut self, record: T) -> Result<(), StoreError> {
        self.index
            .put(T::collection(), record.id(), &record.index_fields())
            .map_err(StoreError::Index)?;
        self.records.insert(record.id().to_string(), record);
        Ok(())
    }

    /// Remove a record in memory (does not persist - call `save`).
    pub fn remove(&mut self, id: &str) -> Result<Option<T>, StoreError> {
        self.index.remove(T::collection(), id).map_err(StoreError::Index)?;
        Ok(self.records.remove(id))
    }

    /// Persist the current in-memory records as the next version.
    ///
    /// Rejects (without writing anything) if a concurrent writer already
    /// advanced the on-disk version past what this in-memory copy expects -
    /// the single-writer-per-process model means this should only trip if
    /// the directory is shared across processes unexpectedly.
    pub fn save(&mut self) -> Result<u64, StoreError> {
        let doc_path = Self::doc_path(&self.dir);
        let on_disk_version = read_json::<StoreDocument<T>>(&doc_path)?.map(|d| d.version).unwrap_or(0);

        let attempted = self.version + 1;
        if on_disk_version >= attempted {
            return Err(StoreError::StaleVersion {
                on_disk: on_disk_version,
                attempted,
            });
        }

        let doc = StoreDocument {
            version: attempted,
            updated_at: now_ms(),
            records: self.records.clone(),
        };
        atomic_write_json(&doc_path, &doc)?;
        self.version = attempted;
        Ok(attempted)
    }

    /// Copy the current on-disk document to `snapshots/<label>_<ts>.json`.
    pub fn snapshot(&self, label: &str) -> Result<SnapshotId, StoreError> {
        let doc_path = Self::doc_path(&self.dir);
        let snapshots_dir = Self::snapshots_dir(&self.dir);
        std::fs::create_dir_all(&snapshots_dir)?;

        let ts = now_ms();
        let snapshot_name = format!("{}_{}.json", label, ts);
        let snapshot_path = snapshots_dir.join(&snapshot_name);

        if doc_path.exists() {
            std::fs::copy(&doc_path, &snapshot_path)?;
        } else {
            atomic_write_json(
                &snapshot_path,
                &StoreDocument::<T> {
                    version: self.version,
                    updated_at: now_ms(),
                    records: self.records.clone(),
                },
            )?;
        }

        Ok(snapshot_name)
    }
}

/// Write `value` atomically: serialise to a temp sibling, fsync, rename over `path`.
pub fn atomic_write_json<V: Serialize>(path: &Path, value: &V) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let tmp_path = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("store"),
        std::process::id()
    ));

    let bytes = serde_json::to_vec_pretty(value)?;
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        use std::io::Write;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read and deserialise `path`, returning `None` if it doesn't exist.
pub fn read_json<V: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<V>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Remove any `.tmp-*` files left behind by a save that never completed its rename.
fn sweep_stale_temp_files(dir: &Path) -> Result<(), StoreError> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Ok(());
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.contains(".tmp-") {
            let _ = std::fs::remove_file(entry.path());
        }
    }
    Ok(())
}
