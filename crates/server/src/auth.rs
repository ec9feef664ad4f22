use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use deployment::Deployment;
use services::services::access::{AccessError, Capability, SessionClaims, bearer_token, verify};

use crate::{DeploymentImpl, error::ApiError};

/// Verified session of the dashboard user making the request.
#[derive(Debug, Clone)]
pub struct AdminSession(pub SessionClaims);

impl AdminSession {
    pub fn require(&self, capability: Capability) -> Result<&SessionClaims, ApiError> {
        self.0.require(capability)?;
        Ok(&self.0)
    }
}

impl FromRequestParts<DeploymentImpl> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| AccessError::InvalidToken("non-ascii header".to_string()))?,
            ),
            None => None,
        };
        let token = bearer_token(header)?;
        let claims = verify(token, &deployment.config().jwt_secret)?;
        Ok(AdminSession(claims))
    }
}
