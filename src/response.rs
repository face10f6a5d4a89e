//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// `{success, message}`: error bodies and bare acknowledgements.
#[derive(Serialize, Debug, Clone)]
pub struct Message {
    pub success: bool,
    pub message: String,
}

pub fn message(success: bool, message: impl Into<String>) -> Message {
    Message {
        success,
        message: message.into(),
    }
}

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    pub total_nb_values: i64,
    pub current_page: i64,
    pub size_page: i64,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            success: true,
            message: "success".into(),
            data,
        }),
    )
}

pub fn success_many<T: Serialize>(
    data: Vec<T>,
    total: i64,
    current_page: i64,
    size_page: i64,
) -> (StatusCode, Json<SuccessMany<T>>) {
    (
        StatusCode::OK,
        Json(SuccessMany {
            success: true,
            message: "data returned".into(),
            data,
            total_nb_values: total,
            current_page,
            size_page,
        }),
    )
}

pub fn acknowledged(msg: &str) -> (StatusCode, Json<Message>) {
    (StatusCode::OK, Json(message(true, msg)))
}
