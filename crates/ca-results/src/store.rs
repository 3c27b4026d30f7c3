//! Table storage API.

use crate::types::{OverwritePolicy, PersistOutcome, Row, row_matches};
use crate::{ResultsError, ResultsResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Keyed tables of analysis results.
///
/// `persist` only updates an existing row; a missing row is reported through
/// [`PersistOutcome::row_found`] and nothing is written.
pub trait ResultStore {
    fn fetch_row(&self, table: &str, where_keys: &Row) -> ResultsResult<Option<Row>>;

    fn persist(
        &mut self,
        table: &str,
        where_keys: &Row,
        data: &Row,
        policy: OverwritePolicy,
    ) -> ResultsResult<PersistOutcome>;

    fn insert_row(&mut self, table: &str, row: Row) -> ResultsResult<()>;
}

/// Merge `data` into `existing` under `policy`.
pub fn apply_update(
    table: &str,
    existing: &mut Row,
    data: &Row,
    policy: OverwritePolicy,
) -> ResultsResult<PersistOutcome> {
    let occupied: Vec<String> = data
        .keys()
        .filter(|k| existing.get(*k).is_some_and(|v| !v.is_null()))
        .cloned()
        .collect();
    let mut outcome = PersistOutcome {
        row_found: true,
        ..Default::default()
    };
    match policy {
        OverwritePolicy::Abort if !occupied.is_empty() => {
            return Err(ResultsError::WouldOverwrite {
                table: table.to_string(),
                columns: occupied,
            });
        }
        OverwritePolicy::PreferExisting => outcome.kept = occupied,
        _ => {}
    }
    for (k, v) in data {
        if !outcome.kept.contains(k) {
            existing.insert(k.clone(), v.clone());
            outcome.written.push(k.clone());
        }
    }
    Ok(outcome)
}

fn update_tables(
    tables: &mut BTreeMap<String, Vec<Row>>,
    table: &str,
    where_keys: &Row,
    data: &Row,
    policy: OverwritePolicy,
) -> ResultsResult<PersistOutcome> {
    let row = tables
        .get_mut(table)
        .and_then(|rows| rows.iter_mut().find(|r| row_matches(r, where_keys)));
    match row {
        Some(row) => apply_update(table, row, data, policy),
        None => Ok(PersistOutcome::default()),
    }
}

/// In-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryTableStore {
    tables: BTreeMap<String, Vec<Row>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl ResultStore for MemoryTableStore {
    fn fetch_row(&self, table: &str, where_keys: &Row) -> ResultsResult<Option<Row>> {
        Ok(self
            .rows(table)
            .iter()
            .find(|r| row_matches(r, where_keys))
            .cloned())
    }

    fn persist(
        &mut self,
        table: &str,
        where_keys: &Row,
        data: &Row,
        policy: OverwritePolicy,
    ) -> ResultsResult<PersistOutcome> {
        update_tables(&mut self.tables, table, where_keys, data, policy)
    }

    fn insert_row(&mut self, table: &str, row: Row) -> ResultsResult<()> {
        self.tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }
}

/// One JSON file per table under a root directory.
#[derive(Clone)]
pub struct JsonTableStore {
    root_dir: PathBuf,
}

impl JsonTableStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    fn table_path(&self, table: &str) -> ResultsResult<PathBuf> {
        let ok = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !ok {
            return Err(ResultsError::InvalidTable {
                table: table.to_string(),
            });
        }
        Ok(self.root_dir.join(format!("{table}.json")))
    }

    pub fn load_table(&self, table: &str) -> ResultsResult<Vec<Row>> {
        let path = self.table_path(table)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_table(&self, table: &str, rows: &[Row]) -> ResultsResult<()> {
        let path = self.table_path(table)?;
        fs::write(path, serde_json::to_string_pretty(rows)?)?;
        Ok(())
    }
}

impl ResultStore for JsonTableStore {
    fn fetch_row(&self, table: &str, where_keys: &Row) -> ResultsResult<Option<Row>> {
        Ok(self
            .load_table(table)?
            .into_iter()
            .find(|r| row_matches(r, where_keys)))
    }

    fn persist(
        &mut self,
        table: &str,
        where_keys: &Row,
        data: &Row,
        policy: OverwritePolicy,
    ) -> ResultsResult<PersistOutcome> {
        let mut tables = BTreeMap::from([(table.to_string(), self.load_table(table)?)]);
        let outcome = update_tables(&mut tables, table, where_keys, data, policy)?;
        if !outcome.written.is_empty() {
            self.save_table(table, &tables[table])?;
        }
        debug!(table, written = outcome.written.len(), kept = outcome.kept.len(), "persisted");
        Ok(outcome)
    }

    fn insert_row(&mut self, table: &str, row: Row) -> ResultsResult<()> {
        let mut rows = self.load_table(table)?;
        rows.push(row);
        self.save_table(table, &rows)
    }
}

/// `{key: value}` row from pairs.
pub fn row<I, K>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
