//! Resolves foreign identifiers on primary records into display values.
//!
//! Joins are declared, not coded per screen: a [`JoinSpec`] names the key
//! field on the primary record, the field the display value lands in, and one
//! or more [`JoinPath`]s tried in order. A path may hop through intermediate
//! tables (payment -> order -> couple) by carrying a field of each
//! intermediate row forward.

use std::collections::{BTreeSet, HashMap};

use db::store::{DataStore, Record, StoreError, Table, key_string};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

pub const NOT_AVAILABLE: &str = "N/A";
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub table: Table,
    /// Column on `table` compared against the incoming key.
    pub match_column: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPath {
    first: Step,
    /// (field of the previous row to carry forward, next step)
    rest: Vec<(&'static str, Step)>,
    display_column: &'static str,
}

impl JoinPath {
    pub fn to(table: Table, match_column: &'static str) -> Self {
        Self {
            first: Step {
                table,
                match_column,
            },
            rest: Vec::new(),
            display_column: "name",
        }
    }

    pub fn then(mut self, carry: &'static str, table: Table, match_column: &'static str) -> Self {
        self.rest.push((
            carry,
            Step {
                table,
                match_column,
            },
        ));
        self
    }

    pub fn display(mut self, column: &'static str) -> Self {
        self.display_column = column;
        self
    }

    pub fn hop_count(&self) -> usize {
        1 + self.rest.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub target_field: &'static str,
    pub key_field: &'static str,
    pub paths: Vec<JoinPath>,
    pub placeholder: &'static str,
}

impl JoinSpec {
    pub fn new(target_field: &'static str, key_field: &'static str, path: JoinPath) -> Self {
        Self {
            target_field,
            key_field,
            paths: vec![path],
            placeholder: NOT_AVAILABLE,
        }
    }

    /// Fallback path for keys the earlier paths could not resolve.
    pub fn or_else(mut self, path: JoinPath) -> Self {
        self.paths.push(path);
        self
    }

    pub fn placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = placeholder;
        self
    }
}

/// How lookups are issued against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// One `IN (...)` lookup per step, for list screens.
    Batched,
    /// One lookup per identifier, issued concurrently, for a single record.
    PerRecord,
}

/// target field -> (key -> display value)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceMap {
    entries: HashMap<&'static str, HashMap<String, String>>,
}

impl ReferenceMap {
    pub fn insert(&mut self, target_field: &'static str, key: String, display: String) {
        self.entries
            .entry(target_field)
            .or_default()
            .insert(key, display);
    }

    pub fn get(&self, target_field: &str, key: &str) -> Option<&str> {
        self.entries
            .get(target_field)
            .and_then(|values| values.get(key))
            .map(String::as_str)
    }

    pub fn len(&self, target_field: &str) -> usize {
        self.entries.get(target_field).map_or(0, HashMap::len)
    }
}

pub fn display_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub struct ReferenceResolver<'a> {
    store: &'a dyn DataStore,
    mode: ResolveMode,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a dyn DataStore, mode: ResolveMode) -> Self {
        Self { store, mode }
    }

    /// Resolves every join for `records`. Failed lookups are logged and leave
    /// their keys unresolved; they never fail the call.
    pub async fn resolve(&self, joins: &[JoinSpec], records: &[Record]) -> ReferenceMap {
        let resolved = join_all(joins.iter().map(|join| self.resolve_join(join, records))).await;

        let mut map = ReferenceMap::default();
        for (join, values) in joins.iter().zip(resolved) {
            for (key, display) in values {
                map.insert(join.target_field, key, display);
            }
        }
        map
    }

    async fn resolve_join(&self, join: &JoinSpec, records: &[Record]) -> HashMap<String, String> {
        let mut pending: BTreeSet<String> = records
            .iter()
            .filter_map(|record| key_string(record.get(join.key_field)))
            .collect();
        let mut resolved = HashMap::new();

        for path in &join.paths {
            if pending.is_empty() {
                break;
            }
            let found = self.follow(path, &pending).await;
            for key in found.keys() {
                pending.remove(key);
            }
            resolved.extend(found);
        }

        debug!(
            target_field = join.target_field,
            resolved = resolved.len(),
            unresolved = pending.len(),
            "Resolved references"
        );
        resolved
    }

    async fn follow(&self, path: &JoinPath, keys: &BTreeSet<String>) -> HashMap<String, String> {
        // origin key -> key used for the current step
        let mut frontier: HashMap<String, String> =
            keys.iter().map(|key| (key.clone(), key.clone())).collect();

        let mut step = &path.first;
        let mut carries = path.rest.iter();
        loop {
            let wanted: BTreeSet<String> = frontier.values().cloned().collect();
            let rows = self.lookup(step, &wanted).await;
            let mut by_key: HashMap<String, Record> = HashMap::new();
            for row in rows {
                if let Some(key) = key_string(row.get(step.match_column)) {
                    by_key.entry(key).or_insert(row);
                }
            }

            match carries.next() {
                Some((carry, next)) => {
                    frontier = frontier
                        .into_iter()
                        .filter_map(|(origin, current)| {
                            let row = by_key.get(&current)?;
                            key_string(row.get(*carry)).map(|next_key| (origin, next_key))
                        })
                        .collect();
                    if frontier.is_empty() {
                        return HashMap::new();
                    }
                    step = next;
                }
                None => {
                    return frontier
                        .into_iter()
                        .filter_map(|(origin, current)| {
                            let row = by_key.get(&current)?;
                            display_value(row.get(path.display_column))
                                .map(|display| (origin, display))
                        })
                        .collect();
                }
            }
        }
    }

    async fn lookup(&self, step: &Step, keys: &BTreeSet<String>) -> Vec<Record> {
        if keys.is_empty() {
            return Vec::new();
        }
        match self.mode {
            ResolveMode::Batched => {
                let keys: Vec<String> = keys.iter().cloned().collect();
                self.fetch_or_degrade(step, &keys).await
            }
            ResolveMode::PerRecord => {
                let lookups = keys
                    .iter()
                    .map(|key| self.fetch_or_degrade_one(step, key.clone()));
                join_all(lookups).await.into_iter().flatten().collect()
            }
        }
    }

    async fn fetch_or_degrade_one(&self, step: &Step, key: String) -> Vec<Record> {
        self.fetch_or_degrade(step, std::slice::from_ref(&key)).await
    }

    async fn fetch_or_degrade(&self, step: &Step, keys: &[String]) -> Vec<Record> {
        match self
            .store
            .fetch_where_in(step.table, step.match_column, keys)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                log_lookup_failure(step, keys.len(), &e);
                Vec::new()
            }
        }
    }
}

fn log_lookup_failure(step: &Step, key_count: usize, error: &StoreError) {
    warn!(
        table = %step.table,
        column = step.match_column,
        key_count,
        error = %error,
        "Reference lookup failed, falling back to placeholder"
    );
}
