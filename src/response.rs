use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Envelope shared by every endpoint. Errors carry `data: null`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub status_message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK with data.
    pub fn ok(data: T) -> Self {
        Self::success(StatusCode::OK, data)
    }

    /// 201 Created with data, used when a record came into existence with this call.
    pub fn created(data: T) -> Self {
        Self::success(StatusCode::CREATED, data)
    }

    pub fn success(status: StatusCode, data: T) -> Self {
        ApiResponse {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or("Success").to_string(),
            data: Some(data),
        }
    }

    pub fn error(status: StatusCode, message: String) -> Self {
        ApiResponse {
            status_code: status.as_u16(),
            status_message: message,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(self)).into_response()
    }
}
