//! JSON file table store.
//!
//! The element's tables live in one JSON document keyed by table id. Every
//! write goes to the in-memory store first and then rewrites the file, so
//! the file always reflects the last successful sync.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use flowsync_core::{CoreError, MemoryTableStore, TableId, TableRow, TableStore};

use crate::error::CliError;

type Snapshot = BTreeMap<TableId, Vec<TableRow>>;

#[derive(Debug)]
pub struct JsonTableStore {
    path: PathBuf,
    inner: MemoryTableStore,
}

impl JsonTableStore {
    /// Open the store at `path`. A missing file starts empty.
    pub fn open(path: &Path) -> Result<Self, CliError> {
        let inner = match std::fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => MemoryTableStore::new(),
            Ok(raw) => {
                let snapshot: Snapshot =
                    serde_json::from_str(&raw).map_err(|source| CliError::InvalidJson {
                        path: path.to_path_buf(),
                        source,
                    })?;
                MemoryTableStore::from_snapshot(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "table file absent, starting empty");
                MemoryTableStore::new()
            }
            Err(e) => return Err(CliError::io(path, e)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    fn persist(&self, table: TableId) -> Result<(), CoreError> {
        let unavailable = |message: String| CoreError::Table { table, message };

        let body = serde_json::to_string_pretty(&self.inner.snapshot())
            .map_err(|e| unavailable(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }
        std::fs::write(&self.path, body)
            .map_err(|e| unavailable(format!("{}: {e}", self.path.display())))?;
        debug!(%table, path = %self.path.display(), "tables persisted");
        Ok(())
    }
}

impl TableStore for JsonTableStore {
    fn read(&self, table: TableId) -> Result<Vec<TableRow>, CoreError> {
        self.inner.read(table)
    }

    fn replace(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError> {
        self.inner.replace(table, rows)?;
        self.persist(table)
    }

    fn set_columns(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError> {
        self.inner.set_columns(table, rows)?;
        self.persist(table)
    }

    fn update_columns(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError> {
        self.inner.update_columns(table, rows)?;
        self.persist(table)
    }

    fn row_count(&self, table: TableId) -> Result<usize, CoreError> {
        self.inner.row_count(table)
    }
}
