use axum::{
    Router,
    body::Bytes,
    extract::State,
    response::Json as ResponseJson,
    routing::post,
};
use deployment::Deployment;
use services::services::{
    access::Capability,
    bulk_import::{ImportReport, import_couples, import_jobs},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, auth::AdminSession, error::ApiError};

fn summary(report: &ImportReport) -> String {
    format!("{} imported, {} failed", report.succeeded, report.failed)
}

/// POST /api/imports/jobs (text/csv, no header row). The body stays raw
/// bytes; a badly encoded row fails on its own.
pub async fn import_job_board(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    body: Bytes,
) -> Result<ResponseJson<ApiResponse<ImportReport>>, ApiError> {
    session.require(Capability::ImportData)?;
    let report = import_jobs(deployment.store().as_ref(), &body).await?;
    let message = summary(&report);
    Ok(ResponseJson(ApiResponse::success_with_message(report, message)))
}

/// POST /api/imports/couples (text/csv with header row)
pub async fn import_couple_accounts(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    body: Bytes,
) -> Result<ResponseJson<ApiResponse<ImportReport>>, ApiError> {
    session.require(Capability::ImportData)?;
    let report = import_couples(
        deployment.store().as_ref(),
        deployment.identity().as_ref(),
        &body,
    )
    .await?;
    let message = summary(&report);
    Ok(ResponseJson(ApiResponse::success_with_message(report, message)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/imports",
        Router::new()
            .route("/jobs", post(import_job_board))
            .route("/couples", post(import_couple_accounts)),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use db::store::Table;
    use services::services::access::Role;

    use crate::routes::test_helpers::TestApp;

    #[tokio::test]
    async fn test_job_import_reports_each_row() {
        let app = TestApp::new();
        let csv = "Photographer,,photo,Lisbon,2026-09-12,2500,Ana,ana@example.com\n\
                   Florist,,flowers,Braga,2026-09-12,lots,Rita,rita@example.com\n"
            .to_string();
        let (status, body) = app
            .send("POST", "/api/imports/jobs", Some(Role::Admin), Some(("text/csv", csv)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "1 imported, 1 failed");
        assert_eq!(body["data"]["outcomes"][1]["row"], 2);
        assert_eq!(body["data"]["outcomes"][1]["success"], false);
        assert_eq!(app.store.rows(Table::Jobs).len(), 1);
    }

    #[tokio::test]
    async fn test_badly_encoded_row_does_not_sink_the_upload() {
        let app = TestApp::new();
        let csv = b"Photographer,,photo,Lisbon,2026-09-12,2500,Ana,ana@example.com\n\
Flor\xffist,,flowers,Braga,2026-09-12,800,Rita,rita@example.com\n\
Caterer,,food,Faro,2026-11-20,9000,Joao,joao@example.com\n"
            .to_vec();
        let (status, body) = app
            .send_bytes("POST", "/api/imports/jobs", Some(Role::Admin), Some(("text/csv", csv)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["succeeded"], 2);
        assert_eq!(body["data"]["failed"], 1);
        assert_eq!(body["data"]["outcomes"][1]["row"], 2);
        assert_eq!(body["data"]["outcomes"][1]["success"], false);
        assert_eq!(app.store.rows(Table::Jobs).len(), 2);
    }

    #[tokio::test]
    async fn test_couple_import_uses_identity_service() {
        let app = TestApp::new();
        let csv = "name,partner_name,email,phone,wedding_date\nAna,Luis,ana@example.com,,2026-09-12\n"
            .to_string();
        let (status, body) = app
            .send("POST", "/api/imports/couples", Some(Role::SuperAdmin), Some(("text/csv", csv)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["succeeded"], 1);
        assert_eq!(app.identity.created().len(), 1);
    }

    #[tokio::test]
    async fn test_couple_file_without_required_header_is_rejected() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                "POST",
                "/api/imports/couples",
                Some(Role::Admin),
                Some(("text/csv", "name\nAna\n".to_string())),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_support_cannot_import() {
        let app = TestApp::new();
        let (status, _) = app
            .send("POST", "/api/imports/jobs", Some(Role::Support), Some(("text/csv", String::new())))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
