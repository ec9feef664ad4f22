//! Inline single-field editing.
//!
//! Each field has its own `Viewing -> Editing -> Viewing` state. A save
//! writes only that field plus `updated_at`; a failed save leaves the field
//! in `Editing` with the draft intact so it can be retried.

use std::collections::HashMap;

use db::store::{DataStore, Record, StoreError, Table, timestamp_now, validate_column};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

use super::registry::EntitySpec;

pub const READ_ONLY_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    #[default]
    Viewing,
    Editing,
}

#[derive(Debug, Error)]
pub enum FieldEditError {
    #[error("field {0} is read-only")]
    ReadOnly(String),
    #[error("field {0} is not being edited")]
    NotEditing(String),
    #[error("record has no id")]
    MissingId,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Identifier, timestamps and the entity's computed fields cannot be written.
fn check_editable(table: Table, field: &str) -> Result<(), FieldEditError> {
    if READ_ONLY_FIELDS.contains(&field)
        || EntitySpec::for_table(table).computed_fields().contains(&field)
    {
        return Err(FieldEditError::ReadOnly(field.to_string()));
    }
    validate_column(field)?;
    Ok(())
}

/// Writes `{field: value, updated_at: now}` and returns the stored row.
pub async fn save_field(
    store: &dyn DataStore,
    table: Table,
    id: &str,
    field: &str,
    value: Value,
) -> Result<Record, FieldEditError> {
    check_editable(table, field)?;
    let mut patch = Record::new();
    patch.insert(field.to_string(), value);
    patch.insert("updated_at".to_string(), Value::String(timestamp_now()));

    match store.update(table, id, patch).await {
        Ok(row) => {
            info!(table = %table, id, field, "Saved field");
            Ok(row)
        }
        Err(err) => {
            warn!(table = %table, id, field, error = %err, "Field save failed");
            Err(err.into())
        }
    }
}

/// Editing session over one loaded record.
#[derive(Debug, Clone)]
pub struct FieldEditor {
    table: Table,
    record: Record,
    states: HashMap<String, FieldState>,
    drafts: HashMap<String, Value>,
}

impl FieldEditor {
    pub fn new(table: Table, record: Record) -> Self {
        Self {
            table,
            record,
            states: HashMap::new(),
            drafts: HashMap::new(),
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn state(&self, field: &str) -> FieldState {
        self.states.get(field).copied().unwrap_or_default()
    }

    pub fn draft(&self, field: &str) -> Option<&Value> {
        self.drafts.get(field)
    }

    /// Enters `Editing`, seeding the draft with the current value.
    pub fn begin_edit(&mut self, field: &str) -> Result<(), FieldEditError> {
        check_editable(self.table, field)?;
        let current = self.record.get(field).cloned().unwrap_or(Value::Null);
        self.drafts.entry(field.to_string()).or_insert(current);
        self.states.insert(field.to_string(), FieldState::Editing);
        Ok(())
    }

    pub fn set_draft(&mut self, field: &str, value: Value) -> Result<(), FieldEditError> {
        if self.state(field) != FieldState::Editing {
            return Err(FieldEditError::NotEditing(field.to_string()));
        }
        self.drafts.insert(field.to_string(), value);
        Ok(())
    }

    /// Discards the draft; nothing is written.
    pub fn cancel(&mut self, field: &str) {
        self.drafts.remove(field);
        self.states.insert(field.to_string(), FieldState::Viewing);
    }

    /// Persists the draft. On success the local record takes the new value
    /// and the returned `updated_at`, and the field goes back to `Viewing`.
    pub async fn save(&mut self, store: &dyn DataStore, field: &str) -> Result<(), FieldEditError> {
        if self.state(field) != FieldState::Editing {
            return Err(FieldEditError::NotEditing(field.to_string()));
        }
        let id = db::store::key_string(self.record.get("id")).ok_or(FieldEditError::MissingId)?;
        let value = self.drafts.get(field).cloned().unwrap_or(Value::Null);

        let stored = save_field(store, self.table, &id, field, value.clone()).await?;

        self.record.insert(field.to_string(), value);
        if let Some(updated_at) = stored.get("updated_at") {
            self.record.insert("updated_at".to_string(), updated_at.clone());
        }
        self.drafts.remove(field);
        self.states.insert(field.to_string(), FieldState::Viewing);
        Ok(())
    }
}
