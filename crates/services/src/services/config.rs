//! Process configuration read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use url::Url;
use utils::dates::parse_instant;

const DEFAULT_DATABASE_URL: &str = "sqlite://marketplace-admin.db";
const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com";
const DEFAULT_EMAIL_FROM: &str = "Marketplace <no-reply@marketplace.local>";
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Which relational backend serves the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "lowercase")]
pub enum DataBackend {
    #[default]
    Sqlite,
    Rest,
}

/// Hosted backend (REST tables + identity admin API).
#[derive(Debug)]
pub struct BackendConfig {
    pub url: String,
    pub service_key: SecretString,
}

#[derive(Debug)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub from: String,
}

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub data_backend: DataBackend,
    pub backend: Option<BackendConfig>,
    pub jwt_secret: SecretString,
    pub email: Option<EmailConfig>,
    pub app_url: String,
    /// Fixed "now" for status derivation; `None` means the request time.
    pub reference_instant: Option<DateTime<Utc>>,
    pub listen_addr: SocketAddr,
    pub sentry_dsn: Option<String>,
}

/// An absolute http(s) URL without its trailing slash.
fn http_url(key: &'static str, value: String) -> Result<String, ConfigError> {
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(value.trim_end_matches('/').to_string())
        }
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_backend = match get("DATA_BACKEND") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "DATA_BACKEND",
                value,
            })?,
            None => DataBackend::default(),
        };

        let backend = match (get("BACKEND_URL"), get("BACKEND_SERVICE_KEY")) {
            (Some(url), Some(key)) => Some(BackendConfig {
                url: http_url("BACKEND_URL", url)?,
                service_key: SecretString::from(key),
            }),
            (Some(_), None) => return Err(ConfigError::Missing("BACKEND_SERVICE_KEY")),
            _ => None,
        };
        if data_backend == DataBackend::Rest && backend.is_none() {
            return Err(ConfigError::Missing("BACKEND_URL"));
        }

        let jwt_secret = get("JWT_SECRET")
            .map(SecretString::from)
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let email = match get("EMAIL_API_KEY") {
            Some(key) => Some(EmailConfig {
                api_url: http_url(
                    "EMAIL_API_URL",
                    get("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string()),
                )?,
                api_key: SecretString::from(key),
                from: get("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            }),
            None => None,
        };

        let reference_instant = match get("REFERENCE_INSTANT") {
            Some(value) => Some(parse_instant(&value).ok_or(ConfigError::Invalid {
                key: "REFERENCE_INSTANT",
                value,
            })?),
            None => None,
        };

        let host: IpAddr = match get("HOST") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "HOST",
                value,
            })?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };
        let port: u16 = match get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            data_backend,
            backend,
            jwt_secret,
            email,
            app_url: http_url(
                "APP_URL",
                get("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            )?,
            reference_instant,
            listen_addr: SocketAddr::new(host, port),
            sentry_dsn: get("SENTRY_DSN"),
        })
    }

    /// The instant status derivation compares against.
    pub fn reference_instant(&self) -> DateTime<Utc> {
        self.reference_instant.unwrap_or_else(Utc::now)
    }
}
