//! Transactional email through the provider's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("email sending is not configured")]
    Unconfigured,
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
}

impl EmailError {
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailKind {
    PasswordReset,
    LoginNotice,
}

/// Body of `POST /api/send-email`.
#[derive(Debug, Clone, Deserialize, Serialize, TS)]
pub struct SendEmailRequest {
    pub email: String,
    #[serde(rename = "type")]
    pub kind: EmailKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: &'static str,
    pub html: String,
}

/// Fixed HTML template for `kind`; `app_url` is where the links point.
pub fn render(kind: EmailKind, app_url: &str) -> RenderedEmail {
    match kind {
        EmailKind::PasswordReset => RenderedEmail {
            subject: "Reset your password",
            html: format!(
                "<h1>Reset your password</h1>\
                 <p>We received a request to reset the password for your account.</p>\
                 <p><a href=\"{app_url}/reset-password\">Choose a new password</a></p>\
                 <p>If you did not ask for this, you can ignore this email.</p>"
            ),
        },
        EmailKind::LoginNotice => RenderedEmail {
            subject: "New sign-in to your account",
            html: format!(
                "<h1>New sign-in</h1>\
                 <p>Your account was just used to sign in to the admin dashboard.</p>\
                 <p>If this wasn't you, <a href=\"{app_url}/reset-password\">reset your password</a> now.</p>"
            ),
        },
    }
}

pub fn validate_recipient(email: &str) -> Result<(), EmailError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(EmailError::InvalidRecipient(email.to_string()))
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, email: &RenderedEmail) -> Result<(), EmailError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredEmail;

#[async_trait]
impl EmailSender for UnconfiguredEmail {
    async fn send(&self, _to: &str, _email: &RenderedEmail) -> Result<(), EmailError> {
        Err(EmailError::Unconfigured)
    }
}

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Resend-style `POST {api_url}/emails` client.
#[derive(Debug)]
pub struct ResendClient {
    http: Client,
    api_url: String,
    api_key: SecretString,
    from: String,
}

impl ResendClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(api_url: &str, api_key: SecretString, from: String) -> Result<Self, EmailError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("marketplace-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            from,
        })
    }

    async fn post(&self, payload: &OutgoingEmail<'_>) -> Result<(), EmailError> {
        let res = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(EmailError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(EmailError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(EmailError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> EmailError {
    if e.is_timeout() {
        EmailError::Timeout
    } else {
        EmailError::Transport(e.to_string())
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, to: &str, email: &RenderedEmail) -> Result<(), EmailError> {
        let payload = OutgoingEmail {
            from: &self.from,
            to: [to],
            subject: email.subject,
            html: &email.html,
        };

        (|| async { self.post(&payload).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &EmailError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Email provider call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;
        info!(subject = email.subject, "Sent email");
        Ok(())
    }
}

/// Validates, renders and sends one templated email.
pub async fn send_templated(
    sender: &dyn EmailSender,
    request: &SendEmailRequest,
    app_url: &str,
) -> Result<(), EmailError> {
    validate_recipient(&request.email)?;
    let rendered = render(request.kind, app_url);
    sender.send(request.email.trim(), &rendered).await
}
