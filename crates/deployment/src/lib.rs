use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::store::{DataStore, StoreError};
use services::services::{
    config::{Config, ConfigError},
    email::{EmailError, EmailSender},
    identity::{IdentityError, IdentityProvider},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Email(#[from] EmailError),
}

/// Handles a running admin service hands to its request handlers.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new(config: Config) -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn store(&self) -> &Arc<dyn DataStore>;

    fn identity(&self) -> &Arc<dyn IdentityProvider>;

    fn email(&self) -> &Arc<dyn EmailSender>;

    /// "Now" for status derivation: the configured instant if one is set,
    /// otherwise the wall clock.
    fn reference_instant(&self) -> DateTime<Utc> {
        self.config().reference_instant()
    }
}
