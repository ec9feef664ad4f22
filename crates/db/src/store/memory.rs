//! In-memory [`DataStore`] for tests, with failure injection and a write log.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use serde_json::Value;

use super::{DataStore, OrderBy, Record, StoreError, Table, key_string, prepare_insert};

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert { table: Table, record: Record },
    Update { table: Table, id: String, patch: Record },
    Delete { table: Table, id: String },
}

#[derive(Default)]
struct State {
    tables: HashMap<Table, Vec<Record>>,
    failing_reads: HashSet<Table>,
    failing_writes: HashSet<Table>,
    writes: Vec<WriteOp>,
    lookups: Vec<(Table, Vec<String>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn injected(table: Table) -> StoreError {
    StoreError::Remote {
        status: 503,
        body: format!("injected failure on {table}"),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        let entry = state.tables.entry(table).or_default();
        entry.extend(rows.into_iter().filter_map(|v| v.as_object().cloned()));
    }

    pub fn fail_reads(&self, table: Table) {
        self.state.lock().unwrap().failing_reads.insert(table);
    }

    pub fn fail_writes(&self, table: Table) {
        self.state.lock().unwrap().failing_writes.insert(table);
    }

    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_reads.clear();
        state.failing_writes.clear();
    }

    pub fn rows(&self, table: Table) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<WriteOp> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Every `fetch_where_in` call as (table, requested values).
    pub fn lookups(&self) -> Vec<(Table, Vec<String>)> {
        self.state.lock().unwrap().lookups.clone()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn fetch_by_id(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.failing_reads.contains(&table) {
            return Err(injected(table));
        }
        Ok(state.tables.get(&table).and_then(|rows| {
            rows.iter()
                .find(|row| key_string(row.get("id")).as_deref() == Some(id))
                .cloned()
        }))
    }

    async fn fetch_all(&self, table: Table, order: &OrderBy) -> Result<Vec<Record>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.failing_reads.contains(&table) {
            return Err(injected(table));
        }
        let mut rows = state.tables.get(&table).cloned().unwrap_or_default();
        rows.sort_by(|a, b| {
            let a = a.get(order.column).map(Value::to_string).unwrap_or_default();
            let b = b.get(order.column).map(Value::to_string).unwrap_or_default();
            if order.descending { b.cmp(&a) } else { a.cmp(&b) }
        });
        Ok(rows)
    }

    async fn fetch_where_in(
        &self,
        table: Table,
        column: &str,
        values: &[String],
    ) -> Result<Vec<Record>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.lookups.push((table, values.to_vec()));
        if state.failing_reads.contains(&table) {
            return Err(injected(table));
        }
        Ok(state
            .tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        key_string(row.get(column)).is_some_and(|key| values.contains(&key))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError> {
        let record = prepare_insert(record)?;
        let mut state = self.state.lock().unwrap();
        state.writes.push(WriteOp::Insert {
            table,
            record: record.clone(),
        });
        if state.failing_writes.contains(&table) {
            return Err(injected(table));
        }
        state.tables.entry(table).or_default().push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: Table, id: &str, patch: Record) -> Result<Record, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(WriteOp::Update {
            table,
            id: id.to_string(),
            patch: patch.clone(),
        });
        if state.failing_writes.contains(&table) {
            return Err(injected(table));
        }
        let row = state
            .tables
            .get_mut(&table)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| key_string(row.get("id")).as_deref() == Some(id))
            })
            .ok_or_else(|| StoreError::NotFound {
                table,
                id: id.to_string(),
            })?;
        row.extend(patch);
        Ok(row.clone())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(WriteOp::Delete {
            table,
            id: id.to_string(),
        });
        if state.failing_writes.contains(&table) {
            return Err(injected(table));
        }
        let Some(rows) = state.tables.get_mut(&table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| key_string(row.get("id")).as_deref() != Some(id));
        Ok((before - rows.len()) as u64)
    }
}
