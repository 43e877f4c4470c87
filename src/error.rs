use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Unprocessable(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn view_not_found() -> Self {
        ApiError::NotFound("VIEW_NOT_FOUND", "Map view not found".into())
    }

    pub fn appointment_not_found(id: u32) -> Self {
        ApiError::NotFound(
            "APPOINTMENT_NOT_FOUND",
            format!("appointment {id} is not part of this view"),
        )
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Unprocessable(code, msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::to_error_response(code, &msg),
            )
                .into_response(),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}

/// Failures raised inside the map view. Only `InvalidStatus` ever reaches a
/// client as an error; the others are folded into view fallback state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapViewError {
    #[error("map failed to load: {0}")]
    MapLoadFailure(String),

    #[error("unknown appointment status `{0}`")]
    InvalidStatus(String),

    #[error("geolocation unavailable: {0}")]
    GeolocationFailure(String),

    #[error("appointment {0} is no longer in the list")]
    MissingSelection(u32),
}

impl From<MapViewError> for ApiError {
    fn from(err: MapViewError) -> Self {
        match err {
            MapViewError::InvalidStatus(_) => {
                ApiError::Unprocessable("INVALID_STATUS", err.to_string())
            }
            MapViewError::MissingSelection(id) => ApiError::appointment_not_found(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
