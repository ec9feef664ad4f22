//! Table-scoped record access shared by every admin screen.
//!
//! Rows travel as JSON objects so that one resolver, decorator and list
//! pipeline can serve all marketplace tables. Typed views of the few rows that
//! carry business rules live in [`crate::models`].

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use ts_rs::TS;

pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

/// One row of any marketplace table.
pub type Record = Map<String, Value>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    Ads,
    BlogPosts,
    Couples,
    Events,
    Faqs,
    Issues,
    Jobs,
    Orders,
    Payments,
    Products,
    SupportReviews,
    Timelines,
    Users,
    Vendors,
    Venues,
    VenueInsurance,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Ads => "ads",
            Table::BlogPosts => "blog_posts",
            Table::Couples => "couples",
            Table::Events => "events",
            Table::Faqs => "faqs",
            Table::Issues => "issues",
            Table::Jobs => "jobs",
            Table::Orders => "orders",
            Table::Payments => "payments",
            Table::Products => "products",
            Table::SupportReviews => "support_reviews",
            Table::Timelines => "timelines",
            Table::Users => "users",
            Table::Vendors => "vendors",
            Table::Venues => "venues",
            Table::VenueInsurance => "venue_insurance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

impl OrderBy {
    pub const fn newest_first() -> Self {
        Self {
            column: "created_at",
            descending: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid column name: {0}")]
    InvalidColumn(String),
    #[error("empty update for {table}/{id}")]
    EmptyPatch { table: Table, id: String },
    #[error("{table}/{id} not found")]
    NotFound { table: Table, id: String },
    #[error("backend http {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("unexpected backend payload: {0}")]
    Payload(String),
}

/// Read/write access to the relational backend.
///
/// Implemented by the local SQLite store and by the hosted REST backend.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn fetch_by_id(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError>;

    async fn fetch_all(&self, table: Table, order: &OrderBy) -> Result<Vec<Record>, StoreError>;

    /// Bulk lookup of rows whose `column` equals any of `values`.
    async fn fetch_where_in(
        &self,
        table: Table,
        column: &str,
        values: &[String],
    ) -> Result<Vec<Record>, StoreError>;

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError>;

    /// Partial update: only the columns present in `patch` are written.
    async fn update(&self, table: Table, id: &str, patch: Record) -> Result<Record, StoreError>;

    async fn delete(&self, table: Table, id: &str) -> Result<u64, StoreError>;
}

pub fn validate_column(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidColumn(name.to_string()))
    }
}

pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fills `id`, `created_at` and `updated_at` when the caller left them out.
pub fn prepare_insert(mut record: Record) -> Result<Record, StoreError> {
    for column in record.keys() {
        validate_column(column)?;
    }
    if !record.get("id").is_some_and(|v| !v.is_null()) {
        record.insert(
            "id".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    let now = timestamp_now();
    for column in ["created_at", "updated_at"] {
        if !record.get(column).is_some_and(|v| !v.is_null()) {
            record.insert(column.to_string(), Value::String(now.clone()));
        }
    }
    Ok(record)
}

/// String form of a key-like value; empty strings and nulls are absent.
pub fn key_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_table_names_round_trip_through_strum() {
        use strum::IntoEnumIterator;
        for table in Table::iter() {
            assert_eq!(table.to_string(), table.as_str());
            assert_eq!(Table::from_str(table.as_str()).unwrap(), table);
        }
    }

    #[test]
    fn test_validate_column_rejects_injection() {
        assert!(validate_column("event_date").is_ok());
        assert!(validate_column("_hidden").is_ok());
        assert!(validate_column("name; DROP TABLE users").is_err());
        assert!(validate_column("Name").is_err());
        assert!(validate_column("1st").is_err());
        assert!(validate_column("").is_err());
    }

    #[test]
    fn test_prepare_insert_fills_identity_and_timestamps() {
        let record = json!({ "name": "Rose Hall" }).as_object().cloned().unwrap();
        let prepared = prepare_insert(record).unwrap();
        assert!(key_string(prepared.get("id")).is_some());
        assert!(prepared.contains_key("created_at"));
        assert_eq!(prepared.get("created_at"), prepared.get("updated_at"));
    }

    #[test]
    fn test_prepare_insert_keeps_explicit_id() {
        let record = json!({ "id": "fixed", "name": "x" }).as_object().cloned().unwrap();
        let prepared = prepare_insert(record).unwrap();
        assert_eq!(prepared["id"], "fixed");
    }

    #[test]
    fn test_key_string() {
        assert_eq!(key_string(Some(&json!("abc"))), Some("abc".to_string()));
        assert_eq!(key_string(Some(&json!(42))), Some("42".to_string()));
        assert_eq!(key_string(Some(&json!(""))), None);
        assert_eq!(key_string(Some(&Value::Null)), None);
        assert_eq!(key_string(None), None);
    }
}
