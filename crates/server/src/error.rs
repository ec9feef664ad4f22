use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::store::StoreError;
use serde_json::{Value, json};
use services::services::{
    access::AccessError, accounts::AccountError, ad_pricing::PricingError,
    bulk_import::ImportError, detail::DetailError, email::EmailError,
    field_editor::FieldEditError, identity::IdentityError, list_aggregator::ListError,
    load_scope::LoadError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Detail(#[from] DetailError),
    #[error(transparent)]
    List(#[from] ListError),
    #[error(transparent)]
    FieldEdit(#[from] FieldEditError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    JsonBody(#[from] JsonRejection),
    #[error(transparent)]
    QueryString(#[from] QueryRejection),
    #[error(transparent)]
    PathParams(#[from] PathRejection),
    #[error("{0}")]
    BadRequest(String),
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::InvalidColumn(_) | StoreError::EmptyPatch { .. } => StatusCode::BAD_REQUEST,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Remote { status, .. } if (400..500).contains(status) => {
            StatusCode::BAD_REQUEST
        }
        StoreError::Remote { .. } | StoreError::Transport(_) => StatusCode::BAD_GATEWAY,
        StoreError::Database(_) | StoreError::Payload(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn identity_status(err: &IdentityError) -> StatusCode {
    match err {
        IdentityError::Unconfigured => StatusCode::SERVICE_UNAVAILABLE,
        IdentityError::AlreadyExists(_) => StatusCode::CONFLICT,
        IdentityError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Detail(DetailError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Detail(DetailError::Fetch { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Detail(DetailError::Load(_)) | ApiError::List(ListError::Load(_)) => {
                StatusCode::REQUEST_TIMEOUT
            }
            ApiError::List(ListError::Fetch { source, .. }) => store_status(source),
            ApiError::FieldEdit(FieldEditError::Store(err)) | ApiError::Store(err) => {
                store_status(err)
            }
            ApiError::FieldEdit(_) => StatusCode::BAD_REQUEST,
            ApiError::Import(_) => StatusCode::BAD_REQUEST,
            ApiError::Email(EmailError::InvalidRecipient(_)) => StatusCode::BAD_REQUEST,
            ApiError::Email(EmailError::Unconfigured) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Email(_) => StatusCode::BAD_GATEWAY,
            ApiError::Identity(err) => identity_status(err),
            ApiError::Account(AccountError::Invalid(_) | AccountError::SelfDelete) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Account(AccountError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Account(AccountError::Identity(err)) => identity_status(err),
            ApiError::Account(AccountError::Store(err)) => store_status(err),
            ApiError::Access(AccessError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            ApiError::Access(AccessError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Access(_) => StatusCode::UNAUTHORIZED,
            ApiError::Pricing(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Load(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::JsonBody(rejection) => rejection.status(),
            ApiError::QueryString(rejection) => rejection.status(),
            ApiError::PathParams(rejection) => rejection.status(),
        }
    }

    /// Where the dashboard should navigate after showing the error.
    fn redirect(&self) -> Option<String> {
        match self {
            ApiError::Detail(err) => err.parent_list(),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let message = self.to_string();
        let body = match self.redirect() {
            Some(redirect) => {
                ApiResponse::<(), Value>::error_with_data(&message, json!({ "redirect": redirect }))
            }
            None => ApiResponse::<(), Value>::error(&message),
        };
        (status, Json(body)).into_response()
    }
}
