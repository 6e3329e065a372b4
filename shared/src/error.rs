use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::{error, warn};
use thiserror::Error;

use crate::i18n::{Language, MessageKey};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<serde_dynamo::Error> for StoreError {
    fn from(err: serde_dynamo::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum IdentityError {
    /// The provider refused the submitted data, message is safe to show.
    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("Identity provider is missing configuration: {0}")]
    NotConfigured(&'static str),

    #[error("Identity provider request failed: {0}")]
    Transport(String),

    #[error("Unexpected identity provider response: {0}")]
    UnexpectedResponse(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        IdentityError::Transport(err.to_string())
    }
}

/// Error returned by every HTTP handler, rendered as `{"message": ...}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub key: Option<MessageKey>,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn new(status: StatusCode, key: MessageKey) -> Self {
        Self {
            status,
            message: key.translate(Language::default()).to_string(),
            key: Some(key),
        }
    }

    /// Free-text message passed through untranslated.
    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            key: None,
        }
    }

    pub fn bad_request(key: MessageKey) -> Self {
        Self::new(StatusCode::BAD_REQUEST, key)
    }

    pub fn unauthorized(key: MessageKey) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, key)
    }

    pub fn forbidden(key: MessageKey) -> Self {
        Self::new(StatusCode::FORBIDDEN, key)
    }

    pub fn not_found(key: MessageKey) -> Self {
        Self::new(StatusCode::NOT_FOUND, key)
    }

    pub fn conflict(key: MessageKey) -> Self {
        Self::new(StatusCode::CONFLICT, key)
    }

    pub fn internal(key: MessageKey) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, key)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response =
            (self.status, Json(serde_json::json!({ "message": self.message }))).into_response();
        if let Some(key) = self.key {
            response.extensions_mut().insert(key);
        }
        response
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => {
                warn!("Store lookup missed: {}", what);
                AppError::not_found(MessageKey::ResourceNotFound)
            }
            StoreError::Conflict(what) => {
                warn!("Store rejected conflicting write: {}", what);
                AppError::conflict(MessageKey::Conflict)
            }
            other => {
                error!("Store failure: {}", other);
                AppError::internal(MessageKey::InternalError)
            }
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected(message) => {
                warn!("Identity provider rejected request: {}", message);
                AppError::with_message(StatusCode::BAD_REQUEST, message)
            }
            IdentityError::InvalidCredentials => {
                AppError::bad_request(MessageKey::InvalidCredentials)
            }
            IdentityError::InvalidToken(reason) => {
                warn!("Rejected access token: {}", reason);
                AppError::unauthorized(MessageKey::Unauthenticated)
            }
            other => {
                error!("Identity provider failure: {}", other);
                AppError::internal(MessageKey::InternalError)
            }
        }
    }
}
