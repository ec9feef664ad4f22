//! Single-record screens: fetch the primary row, resolve its references one
//! by one, decorate, derive.

use chrono::{DateTime, Utc};
use db::store::{DataStore, Record, StoreError, Table};
use thiserror::Error;
use tracing::{info, warn};

use super::{
    decorator::{ViewModel, decorate},
    list_aggregator::apply_derived_fields,
    load_scope::{LoadError, LoadScope},
    reference_resolver::{ReferenceResolver, ResolveMode},
    registry::EntitySpec,
};

#[derive(Debug, Error)]
pub enum DetailError {
    #[error("{table} {id} not found")]
    NotFound { table: Table, id: String },
    #[error("could not load {table} {id}: {source}")]
    Fetch {
        table: Table,
        id: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl DetailError {
    /// The list screen the caller should return to.
    pub fn parent_list(&self) -> Option<String> {
        match self {
            DetailError::NotFound { table, .. } | DetailError::Fetch { table, .. } => {
                Some(format!("/records/{table}"))
            }
            DetailError::Load(_) => None,
        }
    }
}

/// One attempt, no retry.
pub async fn fetch_primary(
    store: &dyn DataStore,
    table: Table,
    id: &str,
) -> Result<Record, DetailError> {
    match store.fetch_by_id(table, id).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(DetailError::NotFound {
            table,
            id: id.to_string(),
        }),
        Err(source) => {
            warn!(table = %table, id, error = %source, "Primary record fetch failed");
            Err(DetailError::Fetch {
                table,
                id: id.to_string(),
                source,
            })
        }
    }
}

/// Loads the view model for one record inside `scope`. Secondary lookup
/// failures degrade to placeholders; only the primary fetch is fatal.
pub async fn load_detail(
    store: &dyn DataStore,
    spec: &EntitySpec,
    id: &str,
    scope: &LoadScope,
    reference_instant: DateTime<Utc>,
) -> Result<ViewModel, DetailError> {
    let record = scope.run(fetch_primary(store, spec.table, id)).await??;

    let resolver = ReferenceResolver::new(store, ResolveMode::PerRecord);
    let records = [record];
    let refs = scope
        .child()
        .run(resolver.resolve(&spec.joins, &records))
        .await?;
    let [record] = records;

    let mut view = decorate(record, &spec.joins, &refs);
    apply_derived_fields(&mut view, spec, reference_instant);
    info!(table = %spec.table, id, "Loaded record");
    Ok(view)
}
