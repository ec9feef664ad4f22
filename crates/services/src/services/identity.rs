//! Identity service admin API (user accounts behind the login screen).

use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, distributions::Alphanumeric};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

const TEMPORARY_PASSWORD_LEN: usize = 20;

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("identity service is not configured")]
    Unconfigured,
    #[error("network error: {0}")]
    Transport(String),
    #[error("an account already exists for {0}")]
    AlreadyExists(String),
    #[error("identity account {0} not found")]
    NotFound(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IdentityUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_user(&self, user: &NewIdentity) -> Result<IdentityUser, IdentityError>;

    async fn delete_user(&self, id: &str) -> Result<(), IdentityError>;

    /// Asks the service to email a reset link that lands on `redirect_to`.
    async fn send_password_reset(&self, email: &str, redirect_to: &str)
    -> Result<(), IdentityError>;
}

/// Random alphanumeric password for accounts created on someone's behalf.
pub fn temporary_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Used when no hosted backend is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredIdentity;

#[async_trait]
impl IdentityProvider for UnconfiguredIdentity {
    async fn create_user(&self, _user: &NewIdentity) -> Result<IdentityUser, IdentityError> {
        Err(IdentityError::Unconfigured)
    }

    async fn delete_user(&self, _id: &str) -> Result<(), IdentityError> {
        Err(IdentityError::Unconfigured)
    }

    async fn send_password_reset(
        &self,
        _email: &str,
        _redirect_to: &str,
    ) -> Result<(), IdentityError> {
        Err(IdentityError::Unconfigured)
    }
}

#[derive(Debug)]
pub struct AuthAdminClient {
    http: Client,
    base_url: String,
    service_key: SecretString,
}

impl AuthAdminClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: &str, service_key: SecretString) -> Result<Self, IdentityError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("marketplace-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let key = self.service_key.expose_secret();
        self.http
            .request(method, format!("{}/auth/v1/{path}", self.base_url))
            .header("apikey", key)
            .bearer_auth(key)
    }
}

async fn error_for(res: reqwest::Response) -> IdentityError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    IdentityError::Http { status, body }
}

#[async_trait]
impl IdentityProvider for AuthAdminClient {
    async fn create_user(&self, user: &NewIdentity) -> Result<IdentityUser, IdentityError> {
        let body = json!({
            "email": user.email,
            "password": user.password,
            "email_confirm": true,
            "user_metadata": { "display_name": user.display_name },
        });
        let res = self
            .request(reqwest::Method::POST, "admin/users")
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        match res.status() {
            s if s.is_success() => {
                let created = res
                    .json::<IdentityUser>()
                    .await
                    .map_err(|e| IdentityError::Serde(e.to_string()))?;
                info!(user_id = %created.id, "Created identity account");
                Ok(created)
            }
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
                Err(IdentityError::AlreadyExists(user.email.clone()))
            }
            _ => Err(error_for(res).await),
        }
    }

    async fn delete_user(&self, id: &str) -> Result<(), IdentityError> {
        let res = self
            .request(reqwest::Method::DELETE, &format!("admin/users/{id}"))
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        match res.status() {
            s if s.is_success() => {
                info!(user_id = id, "Deleted identity account");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(IdentityError::NotFound(id.to_string())),
            _ => {
                let err = error_for(res).await;
                warn!(user_id = id, error = %err, "Identity delete failed");
                Err(err)
            }
        }
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), IdentityError> {
        let res = self
            .request(reqwest::Method::POST, "recover")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        if res.status().is_success() {
            info!("Password reset requested");
            Ok(())
        } else {
            Err(error_for(res).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_passwords_are_alphanumeric_and_distinct() {
        let first = temporary_password();
        let second = temporary_password();
        assert_eq!(first.len(), TEMPORARY_PASSWORD_LEN);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_unconfigured_identity_refuses_every_call() {
        let identity = UnconfiguredIdentity;
        let new = NewIdentity {
            email: "a@b.c".to_string(),
            password: temporary_password(),
            display_name: None,
        };
        assert!(matches!(
            identity.create_user(&new).await,
            Err(IdentityError::Unconfigured)
        ));
        assert!(matches!(
            identity.send_password_reset("a@b.c", "http://x").await,
            Err(IdentityError::Unconfigured)
        ));
    }
}
