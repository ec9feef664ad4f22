use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use axum_extra::extract::WithRejection;
use db::store::{Record, StoreError, Table};
use deployment::Deployment;
use serde::Deserialize;
use serde_json::Value;
use services::services::{
    access::Capability,
    decorator::ViewModel,
    detail::load_detail,
    field_editor::save_field,
    list_aggregator::{ListAggregator, ListPage, ListQuery},
    load_scope::LoadScope,
    registry::EntitySpec,
};
use tracing::info;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, auth::AdminSession, error::ApiError};

fn parse_table(raw: &str) -> Result<Table, ApiError> {
    Table::from_str(raw).map_err(|_| ApiError::BadRequest(format!("unknown table {raw}")))
}

#[derive(Debug, Deserialize)]
pub struct FieldValue {
    pub value: Value,
}

/// GET /api/records/{table}?q=&page=
pub async fn list_records(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Path(table), _): WithRejection<Path<String>, ApiError>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ListPage>>, ApiError> {
    session.require(Capability::ViewRecords)?;
    let spec = EntitySpec::for_table(parse_table(&table)?);

    let scope = LoadScope::new();
    let _guard = scope.guard();
    let page = ListAggregator::new(deployment.store().as_ref())
        .load(&spec, &query, &scope, deployment.reference_instant())
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// GET /api/records/{table}/{id}
pub async fn get_record(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Path((table, id)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ViewModel>>, ApiError> {
    session.require(Capability::ViewRecords)?;
    let spec = EntitySpec::for_table(parse_table(&table)?);

    let scope = LoadScope::new();
    let _guard = scope.guard();
    let view = load_detail(
        deployment.store().as_ref(),
        &spec,
        &id,
        &scope,
        deployment.reference_instant(),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

/// POST /api/records/{table}
pub async fn create_record(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Path(table), _): WithRejection<Path<String>, ApiError>,
    WithRejection(Json(record), _): WithRejection<Json<Record>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Record>>, ApiError> {
    let claims = session.require(Capability::EditRecords)?;
    let table = parse_table(&table)?;
    let stored = deployment.store().insert(table, record).await?;
    info!(table = %table, by = %claims.sub, "Created record");
    Ok(ResponseJson(ApiResponse::success_with_message(
        stored,
        "Record created",
    )))
}

/// PATCH /api/records/{table}/{id}/fields/{field}
pub async fn update_field(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Path((table, id, field)), _): WithRejection<Path<(String, String, String)>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<FieldValue>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Record>>, ApiError> {
    session.require(Capability::EditRecords)?;
    let table = parse_table(&table)?;
    let stored = save_field(deployment.store().as_ref(), table, &id, &field, payload.value).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        stored,
        format!("{field} updated"),
    )))
}

/// DELETE /api/records/{table}/{id}
pub async fn delete_record(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Path((table, id)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let claims = session.require(Capability::DeleteRecords)?;
    let table = parse_table(&table)?;
    if deployment.store().delete(table, &id).await? == 0 {
        return Err(StoreError::NotFound { table, id }.into());
    }
    info!(table = %table, id = %id, by = %claims.sub, "Deleted record");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/records/{table}",
        Router::new()
            .route("/", get(list_records).post(create_record))
            .route("/{id}", get(get_record).delete(delete_record))
            .route("/{id}/fields/{field}", patch(update_field)),
    )
}
