//! Batch stores for memory-bounded streaming.
//!
//! Records are kept as newline-delimited JSON, one `Publication` per line.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ahash::AHashMap;
use tracing::debug;

use crate::error::BatchStoreError;
use crate::publication::Publication;

/// Opaque storage for batches of records, addressed by batch id.
pub trait BatchStore {
    fn store(&self, batch_id: usize, records: &[Publication]) -> Result<(), BatchStoreError>;

    fn load(&self, batch_id: usize) -> Result<Vec<Publication>, BatchStoreError>;
}

/// In-memory store, mostly for tests and small runs.
#[derive(Debug, Default)]
pub struct MemoryBatchStore {
    batches: Mutex<AHashMap<usize, Vec<Publication>>>,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BatchStore for MemoryBatchStore {
    fn store(&self, batch_id: usize, records: &[Publication]) -> Result<(), BatchStoreError> {
        // Poisoning leaves the map intact
        let mut batches = self
            .batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        batches.insert(batch_id, records.to_vec());
        Ok(())
    }

    fn load(&self, batch_id: usize) -> Result<Vec<Publication>, BatchStoreError> {
        let batches = self
            .batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        batches
            .get(&batch_id)
            .cloned()
            .ok_or(BatchStoreError::Missing(batch_id))
    }
}

/// Directory of `batch_{id:05}.jsonl` files.
#[derive(Debug, Clone)]
pub struct JsonLinesBatchStore {
    dir: PathBuf,
}

impl JsonLinesBatchStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn batch_path(&self, batch_id: usize) -> PathBuf {
        self.dir.join(format!("batch_{batch_id:05}.jsonl"))
    }
}

impl BatchStore for JsonLinesBatchStore {
    fn store(&self, batch_id: usize, records: &[Publication]) -> Result<(), BatchStoreError> {
        let path = self.batch_path(batch_id);
        let io_err = |source| BatchStoreError::Io { batch_id, source };

        let mut writer = BufWriter::new(File::create(&path).map_err(io_err)?);
        for (line, record) in records.iter().enumerate() {
            serde_json::to_writer(&mut writer, record).map_err(|source| {
                BatchStoreError::Encode {
                    batch_id,
                    line: line + 1,
                    source,
                }
            })?;
            writer.write_all(b"\n").map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;

        debug!(batch_id, records = records.len(), path = %path.display(), "stored batch");
        Ok(())
    }

    fn load(&self, batch_id: usize) -> Result<Vec<Publication>, BatchStoreError> {
        let path = self.batch_path(batch_id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BatchStoreError::Missing(batch_id))
            }
            Err(source) => return Err(BatchStoreError::Io { batch_id, source }),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| BatchStoreError::Io { batch_id, source })?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| BatchStoreError::Decode {
                batch_id,
                line: index + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(records)
    }
}
