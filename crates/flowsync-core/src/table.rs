// ── Persisted table boundary ──
//
// The element's tabular persistence is an external collaborator. The
// engine only needs keyed rows of loosely-typed cells, a full replace and
// a column-subset write. `MemoryTableStore` is the in-process backend.

use std::collections::BTreeMap;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::CoreError;

/// Tables the engine reads and writes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
pub enum TableId {
    #[strum(to_string = "incoming flows")]
    IncomingFlows,
    #[strum(to_string = "outgoing flows")]
    OutgoingFlows,
    #[strum(to_string = "provisioned flows")]
    ProvisionedFlows,
    #[strum(to_string = "interfaces")]
    Interfaces,
    #[strum(to_string = "dcf interfaces")]
    DcfInterfaces,
}

// ── Cell ─────────────────────────────────────────────────────────────

/// A single table cell. Accessors are lenient: numeric cells convert
/// between integer and real, and booleans are stored as 0/1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Int(_) | Self::Real(_) => None,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Real(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_i64().map(|v| v != 0)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Self::Int(i64::from(v))
    }
}

// ── TableRow ─────────────────────────────────────────────────────────

/// One keyed row: primary key plus named cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub key: String,
    #[serde(default)]
    pub cells: BTreeMap<String, Cell>,
}

impl TableRow {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Builder-style cell setter.
    pub fn with(mut self, column: &str, value: impl Into<Cell>) -> Self {
        self.cells.insert(column.to_owned(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Cell::as_text)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Cell::as_i64)
    }

    pub fn real(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Cell::as_f64)
    }

    pub fn flag(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Cell::as_bool)
    }
}

// ── TableStore ───────────────────────────────────────────────────────

/// Opaque key-value table persistence.
///
/// `replace` and `set_columns` delete rows whose key is not part of the
/// supplied set, mirroring a "set columns, delete old rows" table write.
/// `update_columns` never deletes; it is for tables another writer owns.
pub trait TableStore: Send + Sync {
    /// Read every row of a table in storage order.
    fn read(&self, table: TableId) -> Result<Vec<TableRow>, CoreError>;

    /// Replace the complete row set of a table.
    fn replace(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError>;

    /// Write only the supplied cells of each row, keeping other columns
    /// of existing rows.
    fn set_columns(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError>;

    /// Merge the supplied cells into rows that already exist. Rows with
    /// an unknown key are skipped and no row is deleted.
    fn update_columns(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError>;

    fn row_count(&self, table: TableId) -> Result<usize, CoreError>;
}

/// In-memory table store backed by `DashMap`, rows kept in write order.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: DashMap<TableId, IndexMap<String, TableRow>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a previously captured snapshot.
    pub fn from_snapshot(snapshot: BTreeMap<TableId, Vec<TableRow>>) -> Self {
        let store = Self::new();
        for (table, rows) in snapshot {
            store.tables.insert(table, index_rows(rows));
        }
        store
    }

    /// Capture every table, ordered by table id.
    pub fn snapshot(&self) -> BTreeMap<TableId, Vec<TableRow>> {
        self.tables
            .iter()
            .map(|entry| (*entry.key(), entry.value().values().cloned().collect()))
            .collect()
    }

    /// Single-row lookup, mostly for tests and the CLI.
    pub fn row(&self, table: TableId, key: &str) -> Option<TableRow> {
        self.tables.get(&table)?.get(key).cloned()
    }
}

fn index_rows(rows: Vec<TableRow>) -> IndexMap<String, TableRow> {
    rows.into_iter().map(|r| (r.key.clone(), r)).collect()
}

impl TableStore for MemoryTableStore {
    fn read(&self, table: TableId) -> Result<Vec<TableRow>, CoreError> {
        Ok(self
            .tables
            .get(&table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    fn replace(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError> {
        self.tables.insert(table, index_rows(rows));
        Ok(())
    }

    fn set_columns(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError> {
        let mut existing = self.tables.entry(table).or_default();
        let mut merged = IndexMap::with_capacity(rows.len());
        for row in rows {
            let mut target = existing
                .shift_remove(&row.key)
                .unwrap_or_else(|| TableRow::new(row.key.clone()));
            target.cells.extend(row.cells);
            merged.insert(target.key.clone(), target);
        }
        *existing = merged;
        Ok(())
    }

    fn update_columns(&self, table: TableId, rows: Vec<TableRow>) -> Result<(), CoreError> {
        let Some(mut existing) = self.tables.get_mut(&table) else {
            return Ok(());
        };
        for row in rows {
            if let Some(target) = existing.get_mut(&row.key) {
                target.cells.extend(row.cells);
            }
        }
        Ok(())
    }

    fn row_count(&self, table: TableId) -> Result<usize, CoreError> {
        Ok(self.tables.get(&table).map_or(0, |t| t.len()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cell_accessors_are_lenient() {
        assert_eq!(Cell::Real(3.0).as_i64(), Some(3));
        assert_eq!(Cell::Real(3.5).as_i64(), None);
        assert_eq!(Cell::Int(2).as_f64(), Some(2.0));
        assert_eq!(Cell::from("42").as_i64(), Some(42));
        assert_eq!(Cell::from(true).as_bool(), Some(true));
        assert_eq!(Cell::Int(7).as_text(), None);
    }

    #[test]
    fn cell_json_keeps_integer_and_real_apart() {
        let cells: Vec<Cell> = serde_json::from_str(r#"[1, 1.5, "x"]"#).unwrap();
        assert_eq!(cells, vec![Cell::Int(1), Cell::Real(1.5), Cell::from("x")]);
    }

    #[test]
    fn replace_drops_rows_not_supplied() {
        let store = MemoryTableStore::new();
        store
            .replace(TableId::Interfaces, vec![TableRow::new("a"), TableRow::new("b")])
            .unwrap();
        store
            .replace(TableId::Interfaces, vec![TableRow::new("b")])
            .unwrap();

        let rows = store.read(TableId::Interfaces).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "b");
    }

    #[test]
    fn set_columns_merges_cells_and_deletes_old_rows() {
        let store = MemoryTableStore::new();
        store
            .replace(
                TableId::IncomingFlows,
                vec![
                    TableRow::new("a").with("Label", "cam").with("Bitrate", 1.0),
                    TableRow::new("b").with("Label", "gone"),
                ],
            )
            .unwrap();

        store
            .set_columns(
                TableId::IncomingFlows,
                vec![TableRow::new("a").with("Bitrate", 2.0)],
            )
            .unwrap();

        let row = store.row(TableId::IncomingFlows, "a").unwrap();
        assert_eq!(row.text("Label"), Some("cam"));
        assert_eq!(row.real("Bitrate"), Some(2.0));
        assert!(store.row(TableId::IncomingFlows, "b").is_none());
        assert_eq!(store.row_count(TableId::IncomingFlows).unwrap(), 1);
    }

    #[test]
    fn update_columns_keeps_rows_and_skips_unknown_keys() {
        let store = MemoryTableStore::new();
        store
            .replace(
                TableId::Interfaces,
                vec![
                    TableRow::new("eth0").with("Description", "uplink"),
                    TableRow::new("eth1").with("Description", "spare"),
                ],
            )
            .unwrap();

        store
            .update_columns(
                TableId::Interfaces,
                vec![
                    TableRow::new("eth0").with("Rx Flows", 3),
                    TableRow::new("eth9").with("Rx Flows", 1),
                ],
            )
            .unwrap();

        let eth0 = store.row(TableId::Interfaces, "eth0").unwrap();
        assert_eq!(eth0.text("Description"), Some("uplink"));
        assert_eq!(eth0.int("Rx Flows"), Some(3));
        let eth1 = store.row(TableId::Interfaces, "eth1").unwrap();
        assert_eq!(eth1.text("Description"), Some("spare"));
        assert!(store.row(TableId::Interfaces, "eth9").is_none());
        assert_eq!(store.row_count(TableId::Interfaces).unwrap(), 2);
    }

    #[test]
    fn update_columns_on_missing_table_is_a_no_op() {
        let store = MemoryTableStore::new();
        store
            .update_columns(TableId::Interfaces, vec![TableRow::new("eth0")])
            .unwrap();
        assert_eq!(store.row_count(TableId::Interfaces).unwrap(), 0);
    }

    #[test]
    fn snapshot_round_trips() {
        let store = MemoryTableStore::new();
        store
            .replace(TableId::OutgoingFlows, vec![TableRow::new("x").with("IsPresent", 1)])
            .unwrap();

        let copy = MemoryTableStore::from_snapshot(store.snapshot());
        assert_eq!(
            copy.read(TableId::OutgoingFlows).unwrap(),
            store.read(TableId::OutgoingFlows).unwrap()
        );
    }

    #[test]
    fn unknown_table_reads_empty() {
        let store = MemoryTableStore::new();
        assert!(store.read(TableId::DcfInterfaces).unwrap().is_empty());
        assert_eq!(store.row_count(TableId::DcfInterfaces).unwrap(), 0);
    }
}
