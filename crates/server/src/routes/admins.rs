use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, post},
};
use axum_extra::extract::WithRejection;
use db::store::Record;
use deployment::Deployment;
use services::services::{
    access::Capability,
    accounts::{NewAdmin, PasswordResetRequest, create_admin, delete_admin, request_password_reset},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, auth::AdminSession, error::ApiError};

/// POST /api/admins
pub async fn create_admin_account(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Json(request), _): WithRejection<Json<NewAdmin>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Record>>, ApiError> {
    session.require(Capability::ManageAdmins)?;
    let user = create_admin(
        deployment.store().as_ref(),
        deployment.identity().as_ref(),
        &request,
        &deployment.config().app_url,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        user,
        "Admin created; a password reset link was sent",
    )))
}

/// DELETE /api/admins/{id}
pub async fn delete_admin_account(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Path(id), _): WithRejection<Path<String>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let claims = session.require(Capability::ManageAdmins)?;
    delete_admin(
        deployment.store().as_ref(),
        deployment.identity().as_ref(),
        claims,
        &id,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/admins/password-reset
pub async fn reset_password(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Json(request), _): WithRejection<Json<PasswordResetRequest>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    session.require(Capability::ManageAdmins)?;
    request_password_reset(
        deployment.identity().as_ref(),
        &request,
        &deployment.config().app_url,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Password reset link sent",
    )))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/admins",
        Router::new()
            .route("/", post(create_admin_account))
            .route("/password-reset", post(reset_password))
            .route("/{id}", delete(delete_admin_account)),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use db::store::Table;
    use serde_json::json;
    use services::services::access::Role;

    use crate::routes::test_helpers::TestApp;

    #[tokio::test]
    async fn test_only_super_admin_manages_admins() {
        let app = TestApp::new();
        let request = json!({ "email": "New@Example.com", "display_name": null, "role": "support" });

        let (status, _) = app
            .send_json("POST", "/api/admins", Role::Admin, request.clone())
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(app.identity.created().is_empty());

        let (status, body) = app
            .send_json("POST", "/api/admins", Role::SuperAdmin, request)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "new@example.com");
        assert_eq!(body["data"]["role"], "support");
        assert_eq!(
            app.identity.resets(),
            vec![(
                "new@example.com".to_string(),
                "https://admin.example.com/reset-password".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_non_staff_role_is_rejected() {
        let app = TestApp::new();
        let (status, _) = app
            .send_json(
                "POST",
                "/api/admins",
                Role::SuperAdmin,
                json!({ "email": "vendor@example.com", "display_name": null, "role": "vendor" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.store.rows(Table::Users).is_empty());
    }

    #[tokio::test]
    async fn test_delete_admin() {
        let app = TestApp::new();
        app.store.seed(
            Table::Users,
            vec![
                json!({ "id": "staff-1", "email": "staff@example.com", "role": "super_admin" }),
                json!({ "id": "staff-2", "email": "other@example.com", "role": "admin" }),
            ],
        );

        let (status, _) = app
            .send("DELETE", "/api/admins/staff-1", Some(Role::SuperAdmin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send("DELETE", "/api/admins/staff-2", Some(Role::SuperAdmin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.identity.deleted(), vec!["staff-2".to_string()]);
        assert_eq!(app.store.rows(Table::Users).len(), 1);

        let (status, _) = app
            .send("DELETE", "/api/admins/staff-2", Some(Role::SuperAdmin), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_couple_account_cannot_be_deleted_as_admin() {
        let app = TestApp::new();
        app.store.seed(
            Table::Users,
            vec![json!({ "id": "u9", "email": "ana@example.com", "role": "couple" })],
        );
        app.store.seed(Table::Couples, vec![json!({ "id": "c1", "user_id": "u9" })]);

        let (status, body) = app
            .send("DELETE", "/api/admins/u9", Some(Role::SuperAdmin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(app.store.rows(Table::Users).len(), 1);
        assert!(app.identity.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_requires_valid_email() {
        let app = TestApp::new();
        let (status, _) = app
            .send_json(
                "POST",
                "/api/admins/password-reset",
                Role::SuperAdmin,
                json!({ "email": "nobody" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.identity.resets().is_empty());
    }
}
