//! Session tokens and the role -> capability table.

use chrono::{Duration, Utc};
pub use db::models::user::UserRole as Role;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewRecords,
    EditRecords,
    DeleteRecords,
    ImportData,
    SendEmail,
    ManageAdmins,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("session expired")]
    Expired,
    #[error("invalid session token: {0}")]
    InvalidToken(String),
    #[error("role {role} may not {capability}")]
    Forbidden { role: Role, capability: Capability },
    #[error("could not sign session: {0}")]
    Signing(String),
}

pub trait Capabilities {
    fn can(&self, capability: Capability) -> bool;
}

impl Capabilities for Role {
    fn can(&self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::SuperAdmin => true,
            Role::Admin => capability != ManageAdmins,
            Role::Support => matches!(capability, ViewRecords | EditRecords | SendEmail),
            Role::Couple | Role::Vendor => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(sub: impl Into<String>, email: impl Into<String>, role: Role, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            email: email.into(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn require(&self, capability: Capability) -> Result<(), AccessError> {
        if self.role.can(capability) {
            Ok(())
        } else {
            Err(AccessError::Forbidden {
                role: self.role,
                capability,
            })
        }
    }
}

pub fn issue(claims: &SessionClaims, secret: &SecretString) -> Result<String, AccessError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AccessError::Signing(e.to_string()))
}

pub fn verify(token: &str, secret: &SecretString) -> Result<SessionClaims, AccessError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AccessError::Expired,
        _ => AccessError::InvalidToken(e.to_string()),
    })
}

/// Token from an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AccessError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AccessError::MissingToken)
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test-secret-with-enough-length".to_string())
    }

    #[test]
    fn test_issued_token_verifies_with_same_secret() {
        let claims = SessionClaims::new("u1", "ops@example.com", Role::Admin, Duration::hours(1));
        let token = issue(&claims, &secret()).unwrap();
        assert_eq!(verify(&token, &secret()).unwrap(), claims);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let claims = SessionClaims::new("u1", "ops@example.com", Role::Admin, Duration::hours(1));
        let token = issue(&claims, &SecretString::from("another-secret".to_string())).unwrap();
        assert!(matches!(verify(&token, &secret()), Err(AccessError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let claims = SessionClaims::new("u1", "ops@example.com", Role::Admin, Duration::hours(-2));
        let token = issue(&claims, &secret()).unwrap();
        assert_eq!(verify(&token, &secret()), Err(AccessError::Expired));
    }

    #[test]
    fn test_only_super_admins_manage_admins() {
        for role in [Role::Couple, Role::Vendor, Role::Support, Role::Admin] {
            assert!(!role.can(Capability::ManageAdmins), "{role}");
        }
        assert!(Capability::iter().all(|capability| Role::SuperAdmin.can(capability)));
    }

    #[test]
    fn test_support_can_view_and_edit_but_not_delete() {
        assert!(Role::Support.can(Capability::ViewRecords));
        assert!(Role::Support.can(Capability::EditRecords));
        assert!(!Role::Support.can(Capability::DeleteRecords));
        assert!(!Role::Support.can(Capability::ImportData));
    }

    #[test]
    fn test_marketplace_users_have_no_dashboard_access() {
        for capability in Capability::iter() {
            assert!(!Role::Couple.can(capability));
            assert!(!Role::Vendor.can(capability));
        }
    }

    #[test]
    fn test_require_reports_role_and_capability() {
        let claims = SessionClaims::new("u1", "help@example.com", Role::Support, Duration::hours(1));
        assert_eq!(
            claims.require(Capability::DeleteRecords),
            Err(AccessError::Forbidden {
                role: Role::Support,
                capability: Capability::DeleteRecords
            })
        );
        assert!(claims.require(Capability::ViewRecords).is_ok());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AccessError::MissingToken));
        assert_eq!(bearer_token(Some("Bearer   ")), Err(AccessError::MissingToken));
        assert_eq!(bearer_token(None), Err(AccessError::MissingToken));
    }
}
