//! [`DataStore`] over the hosted backend's PostgREST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use db::store::{
    DataStore, OrderBy, Record, StoreError, Table, prepare_insert, timestamp_now, validate_column,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

pub struct RestStore {
    http: Client,
    base_url: String,
    service_key: SecretString,
}

/// `in.(...)` filter value; every item is quoted so commas and parentheses
/// inside identifiers stay literal.
pub fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|value| format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

pub fn eq_filter(value: &str) -> String {
    format!("eq.{value}")
}

pub fn order_param(order: &OrderBy) -> String {
    let direction = if order.descending { "desc" } else { "asc" };
    format!("{}.{direction}", order.column)
}

impl RestStore {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: &str, service_key: SecretString) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("marketplace-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        let key = self.service_key.expose_secret();
        self.http
            .request(method, format!("{}/rest/v1/{}", self.base_url, table.as_str()))
            .header("apikey", key)
            .bearer_auth(key)
    }

    async fn rows(&self, builder: RequestBuilder) -> Result<Vec<Record>, StoreError> {
        let res = builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let res = check_status(res).await?;
        let rows: Vec<Value> = res
            .json()
            .await
            .map_err(|e| StoreError::Payload(e.to_string()))?;
        rows.into_iter()
            .map(|row| match row {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::Payload(format!("expected a row object, got {other}"))),
            })
            .collect()
    }
}

async fn check_status(res: Response) -> Result<Response, StoreError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(StoreError::Remote { status, body })
}

#[async_trait]
impl DataStore for RestStore {
    async fn fetch_by_id(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError> {
        let rows = self
            .rows(
                self.request(Method::GET, table)
                    .query(&[("select", "*".to_string()), ("id", eq_filter(id))]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_all(&self, table: Table, order: &OrderBy) -> Result<Vec<Record>, StoreError> {
        validate_column(order.column)?;
        let rows = self
            .rows(
                self.request(Method::GET, table)
                    .query(&[("select", "*".to_string()), ("order", order_param(order))]),
            )
            .await?;
        debug!(table = %table, rows = rows.len(), "Fetched table");
        Ok(rows)
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
        self.rows(
            self.request(Method::GET, table)
                .query(&[("select", "*".to_string()), (column, in_filter(values))]),
        )
        .await
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError> {
        let record = prepare_insert(record)?;
        let rows = self
            .rows(
                self.request(Method::POST, table)
                    .header("Prefer", "return=representation")
                    .json(&record),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Payload("insert returned no row".to_string()))
    }

    async fn update(&self, table: Table, id: &str, mut patch: Record) -> Result<Record, StoreError> {
        patch.remove("id");
        for column in patch.keys() {
            validate_column(column)?;
        }
        if patch.is_empty() {
            return Err(StoreError::EmptyPatch {
                table,
                id: id.to_string(),
            });
        }
        patch
            .entry("updated_at")
            .or_insert_with(|| Value::String(timestamp_now()));

        let rows = self
            .rows(
                self.request(Method::PATCH, table)
                    .query(&[("id", eq_filter(id))])
                    .header("Prefer", "return=representation")
                    .json(&patch),
            )
            .await?;
        rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            table,
            id: id.to_string(),
        })
    }

    async fn delete(&self, table: Table, id: &str) -> Result<u64, StoreError> {
        let rows = self
            .rows(
                self.request(Method::DELETE, table)
                    .query(&[("id", eq_filter(id))])
                    .header("Prefer", "return=representation"),
            )
            .await?;
        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_filter_quotes_every_value() {
        let values = vec!["a1".to_string(), "b,2".to_string(), "say \"hi\"".to_string()];
        assert_eq!(in_filter(&values), r#"in.("a1","b,2","say \"hi\"")"#);
    }

    #[test]
    fn test_order_param_uses_direction_suffix() {
        assert_eq!(order_param(&OrderBy::newest_first()), "created_at.desc");
        assert_eq!(
            order_param(&OrderBy {
                column: "name",
                descending: false
            }),
            "name.asc"
        );
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq_filter("o-1"), "eq.o-1");
    }
}
