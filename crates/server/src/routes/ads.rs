use axum::{
    Router,
    extract::Query,
    response::Json as ResponseJson,
    routing::get,
};
use axum_extra::extract::WithRejection;
use db::models::ad::AdPlacement;
use serde::Deserialize;
use services::services::{
    access::Capability,
    ad_pricing::{AdQuote, quote},
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, auth::AdminSession, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct QuoteQuery {
    pub placement: AdPlacement,
    pub weeks: u32,
}

/// GET /api/ads/quote?placement=&weeks=
pub async fn quote_ad(
    session: AdminSession,
    WithRejection(Query(query), _): WithRejection<Query<QuoteQuery>, ApiError>,
) -> Result<ResponseJson<ApiResponse<AdQuote>>, ApiError> {
    session.require(Capability::ViewRecords)?;
    Ok(ResponseJson(ApiResponse::success(quote(
        query.placement,
        query.weeks,
    )?)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/ads/quote", get(quote_ad))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use services::services::access::Role;

    use crate::routes::test_helpers::TestApp;

    #[tokio::test]
    async fn test_quote_applies_duration_discount() {
        let app = TestApp::new();
        let (status, body) = app
            .send("GET", "/api/ads/quote?placement=homepage&weeks=12", Some(Role::Support), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["discount_percent"], 20);
        assert_eq!(body["data"]["total_cents"], 144_000);
    }

    #[tokio::test]
    async fn test_out_of_range_duration_is_rejected() {
        let app = TestApp::new();
        let (status, body) = app
            .send("GET", "/api/ads/quote?placement=featured&weeks=0", Some(Role::Admin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
