//! Typed errors and HTTP mapping.

use crate::response::message;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Raised while synthesizing routes or building the registry, before serving starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid table name: '{0}' (expected [A-Za-z0-9_-]+)")]
    InvalidTableName(String),
    #[error("duplicate route name: {0}")]
    DuplicateRoute(String),
    #[error("invalid route pattern for {name}: {pattern}")]
    InvalidPattern { name: String, pattern: String },
    #[error("config load: {0}")]
    Load(String),
}

/// Authentication / authorization denials. Resolved inside the gate; never reaches a handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing auth token")]
    MissingToken,
    #[error("Invalid/Malformed auth token")]
    MalformedToken,
    #[error("Malformed authentication token")]
    InvalidToken,
    #[error("Token is not valid.")]
    ExpiredToken,
    #[error("Authorization required")]
    InsufficientRights,
}

/// Failures reported by the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("row decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("row must be a JSON object")]
    NotAnObject,
    #[error("no row with {pk} = {id} in {table}")]
    Missing { table: String, pk: String, id: u64 },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("validation failed")]
    Validation(serde_json::Value),
    #[error("bad payload: {0}")]
    BadPayload(String),
    #[error("error while retrieving data")]
    Retrieval,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            AppError::Config(e) => {
                tracing::error!(error = %e, "configuration error at request time");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
            AppError::Auth(e) => (StatusCode::FORBIDDEN, e.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            // Details are the type author's own payload and go back verbatim.
            AppError::Validation(details) => {
                return (StatusCode::NOT_ACCEPTABLE, Json(details)).into_response();
            }
            AppError::BadPayload(e) => (StatusCode::NOT_ACCEPTABLE, format!("Error : {}", e)),
            AppError::Retrieval => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error while retrieving data".to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!(error = %e, "persistence failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Error saving".to_string())
            }
        };
        (status, Json(message(false, msg))).into_response()
    }
}
