//! Dashboard staff accounts: identity account plus a `users` row.

use db::{
    models::{to_record, user::CreateUser},
    store::{DataStore, Record, StoreError, Table},
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;

use super::{
    access::{Role, SessionClaims},
    bulk_import::undo_identity,
    email::validate_recipient,
    identity::{IdentityError, IdentityProvider, NewIdentity, temporary_password},
};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Invalid(String),
    #[error("admins cannot delete their own account")]
    SelfDelete,
    #[error("user {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct NewAdmin {
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct PasswordResetRequest {
    pub email: String,
}

fn reset_redirect(app_url: &str) -> String {
    format!("{app_url}/reset-password")
}

/// Creates the identity account with a throwaway password, inserts the
/// `users` row, then mails a reset link so the admin picks their own
/// password. The identity account is removed if the row insert fails.
fn is_staff(role: Role) -> bool {
    matches!(role, Role::Support | Role::Admin | Role::SuperAdmin)
}

pub async fn create_admin(
    store: &dyn DataStore,
    identity: &dyn IdentityProvider,
    request: &NewAdmin,
    app_url: &str,
) -> Result<Record, AccountError> {
    if !is_staff(request.role) {
        return Err(AccountError::Invalid(format!(
            "{} is not a staff role",
            request.role
        )));
    }
    let email = request.email.trim().to_lowercase();
    validate_recipient(&email).map_err(|e| AccountError::Invalid(e.to_string()))?;

    let account = identity
        .create_user(&NewIdentity {
            email: email.clone(),
            password: temporary_password(),
            display_name: request.display_name.clone(),
        })
        .await?;

    let user = CreateUser {
        id: account.id.clone(),
        email: email.clone(),
        role: request.role,
    };
    let record = to_record(&user).map_err(|e| StoreError::Payload(e.to_string()))?;
    let stored = match store.insert(Table::Users, record).await {
        Ok(stored) => stored,
        Err(err) => {
            undo_identity(identity, &account.id).await;
            return Err(err.into());
        }
    };

    identity
        .send_password_reset(&email, &reset_redirect(app_url))
        .await?;
    info!(user_id = %account.id, role = %request.role, "Created admin account");
    Ok(stored)
}

pub async fn delete_admin(
    store: &dyn DataStore,
    identity: &dyn IdentityProvider,
    acting: &SessionClaims,
    id: &str,
) -> Result<(), AccountError> {
    if acting.sub == id {
        return Err(AccountError::SelfDelete);
    }
    let user = store
        .fetch_by_id(Table::Users, id)
        .await?
        .ok_or_else(|| AccountError::NotFound(id.to_string()))?;
    let role = user
        .get("role")
        .and_then(Value::as_str)
        .and_then(|role| role.parse::<Role>().ok());
    if !role.is_some_and(is_staff) {
        return Err(AccountError::Invalid(format!("user {id} is not a staff account")));
    }
    if store.delete(Table::Users, id).await? == 0 {
        return Err(AccountError::NotFound(id.to_string()));
    }
    match identity.delete_user(id).await {
        Ok(()) | Err(IdentityError::NotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }
    info!(user_id = id, "Deleted admin account");
    Ok(())
}

pub async fn request_password_reset(
    identity: &dyn IdentityProvider,
    request: &PasswordResetRequest,
    app_url: &str,
) -> Result<(), AccountError> {
    validate_recipient(&request.email).map_err(|e| AccountError::Invalid(e.to_string()))?;
    identity
        .send_password_reset(request.email.trim(), &reset_redirect(app_url))
        .await?;
    Ok(())
}
