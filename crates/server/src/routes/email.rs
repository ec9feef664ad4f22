use axum::{Json, Router, extract::State, response::Json as ResponseJson, routing::post};
use axum_extra::extract::WithRejection;
use deployment::Deployment;
use services::services::{
    access::Capability,
    email::{SendEmailRequest, send_templated},
};
use tracing::info;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, auth::AdminSession, error::ApiError};

/// POST /api/send-email
pub async fn send_email(
    State(deployment): State<DeploymentImpl>,
    session: AdminSession,
    WithRejection(Json(request), _): WithRejection<Json<SendEmailRequest>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let claims = session.require(Capability::SendEmail)?;
    send_templated(
        deployment.email().as_ref(),
        &request,
        &deployment.config().app_url,
    )
    .await?;
    info!(kind = %request.kind, by = %claims.sub, "Email sent");
    Ok(ResponseJson(ApiResponse::success_with_message((), "Email sent")))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/send-email", post(send_email))
}
