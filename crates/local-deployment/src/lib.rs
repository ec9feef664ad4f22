use std::sync::Arc;

use async_trait::async_trait;
use db::{
    DBService,
    store::{DataStore, sqlite::SqliteStore},
};
use deployment::{Deployment, DeploymentError};
use secrecy::{ExposeSecret, SecretString};
use services::services::{
    config::{Config, ConfigError, DataBackend},
    email::{EmailSender, ResendClient, UnconfiguredEmail},
    identity::{AuthAdminClient, IdentityProvider, UnconfiguredIdentity},
    rest_store::RestStore,
};
use tracing::{info, warn};

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    store: Arc<dyn DataStore>,
    identity: Arc<dyn IdentityProvider>,
    email: Arc<dyn EmailSender>,
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

impl LocalDeployment {
    pub fn from_parts(
        config: Config,
        store: Arc<dyn DataStore>,
        identity: Arc<dyn IdentityProvider>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            identity,
            email,
        }
    }

    async fn open_store(config: &Config) -> Result<Arc<dyn DataStore>, DeploymentError> {
        match config.data_backend {
            DataBackend::Sqlite => {
                let db = DBService::new(&config.database_url).await?;
                Ok(Arc::new(SqliteStore::new(db.pool)))
            }
            DataBackend::Rest => {
                let backend = config
                    .backend
                    .as_ref()
                    .ok_or(ConfigError::Missing("BACKEND_URL"))?;
                Ok(Arc::new(RestStore::new(
                    &backend.url,
                    copy_secret(&backend.service_key),
                )?))
            }
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new(config: Config) -> Result<Self, DeploymentError> {
        let store = Self::open_store(&config).await?;

        let identity: Arc<dyn IdentityProvider> = match &config.backend {
            Some(backend) => Arc::new(AuthAdminClient::new(
                &backend.url,
                copy_secret(&backend.service_key),
            )?),
            None => {
                warn!("BACKEND_URL not set; account management is disabled");
                Arc::new(UnconfiguredIdentity)
            }
        };

        let email: Arc<dyn EmailSender> = match &config.email {
            Some(email) => Arc::new(ResendClient::new(
                &email.api_url,
                copy_secret(&email.api_key),
                email.from.clone(),
            )?),
            None => {
                warn!("EMAIL_API_KEY not set; outgoing email is disabled");
                Arc::new(UnconfiguredEmail)
            }
        };

        info!(backend = %config.data_backend, "Deployment ready");
        Ok(Self::from_parts(config, store, identity, email))
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    fn email(&self) -> &Arc<dyn EmailSender> {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};
    use services::services::email::{EmailKind, render};

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_deployment_without_backend_disables_outbound_services() {
        let deployment = LocalDeployment::new(config(&[
            ("JWT_SECRET", "x"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("REFERENCE_INSTANT", "2026-03-15T12:00:00Z"),
        ]))
        .await
        .unwrap();

        assert_eq!(
            deployment.reference_instant(),
            Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
        );
        let email = render(EmailKind::LoginNotice, &deployment.config().app_url);
        assert!(deployment.email().send("a@b.co", &email).await.is_err());
        assert!(deployment.identity().delete_user("u1").await.is_err());
    }
}
