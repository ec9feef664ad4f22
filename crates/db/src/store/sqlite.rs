use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::{
    Column, Row, Sqlite, SqlitePool, TypeInfo, ValueRef,
    query::Query,
    sqlite::{SqliteArguments, SqliteRow},
};

use super::{
    DataStore, OrderBy, Record, StoreError, Table, prepare_insert, timestamp_now, validate_column,
};

/// [`DataStore`] over the local SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        // nested structures are stored as JSON text
        other => query.bind(other.to_string()),
    }
}

fn row_to_record(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for column in row.columns() {
        let ordinal = column.ordinal();
        let raw = row.try_get_raw(ordinal)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" => {
                    let i: i64 = row.try_get(ordinal)?;
                    if column.type_info().name() == "BOOLEAN" {
                        Value::Bool(i != 0)
                    } else {
                        Value::from(i)
                    }
                }
                "REAL" => {
                    let f: f64 = row.try_get(ordinal)?;
                    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
                }
                "BLOB" => {
                    let bytes: Vec<u8> = row.try_get(ordinal)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::String(row.try_get::<String, _>(ordinal)?),
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn fetch_by_id(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", table.as_str());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_record).transpose()?)
    }

    async fn fetch_all(&self, table: Table, order: &OrderBy) -> Result<Vec<Record>, StoreError> {
        validate_column(order.column)?;
        let sql = format!(
            "SELECT * FROM {} ORDER BY {} {}",
            table.as_str(),
            order.column,
            if order.descending { "DESC" } else { "ASC" }
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn fetch_where_in(
        &self,
        table: Table,
        column: &str,
        values: &[String],
    ) -> Result<Vec<Record>, StoreError> {
        validate_column(column)?;
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "SELECT * FROM {} WHERE {} IN ({})",
            table.as_str(),
            column,
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError> {
        let record = prepare_insert(record)?;
        let columns: Vec<&str> = record.keys().map(String::as_str).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table.as_str(),
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let mut query = sqlx::query(&sql);
        for value in record.values() {
            query = bind_value(query, value);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row_to_record(&row)?)
    }

    async fn update(&self, table: Table, id: &str, mut patch: Record) -> Result<Record, StoreError> {
        patch.remove("id");
        if patch.is_empty() {
            return Err(StoreError::EmptyPatch {
                table,
                id: id.to_string(),
            });
        }
        for column in patch.keys() {
            validate_column(column)?;
        }
        if !patch.contains_key("updated_at") {
            patch.insert("updated_at".to_string(), Value::String(timestamp_now()));
        }
        let assignments = patch
            .keys()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING *",
            table.as_str(),
            assignments
        );
        let mut query = sqlx::query(&sql);
        for value in patch.values() {
            query = bind_value(query, value);
        }
        let row = query
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                table,
                id: id.to_string(),
            })?;
        Ok(row_to_record(&row)?)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", table.as_str());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
