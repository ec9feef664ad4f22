//! Cancellation scope for one data-loading lifecycle.
//!
//! A scope is opened when a screen's data starts loading and cancelled when
//! the caller goes away. Anything that completes after cancellation is
//! dropped instead of being applied.

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("load cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct LoadScope {
    token: CancellationToken,
}

impl LoadScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope cancelled together with this one.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the scope when the guard is dropped, e.g. when a request
    /// handler's future is abandoned.
    pub fn guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Runs `work` unless the scope is cancelled first. A result that races
    /// the cancellation is discarded.
    pub async fn run<F, T>(&self, work: F) -> Result<T, LoadError>
    where
        F: Future<Output = T>,
    {
        let output = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(LoadError::Cancelled),
            output = work => output,
        };
        if self.token.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        Ok(output)
    }
}
