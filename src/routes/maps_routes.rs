// src/routes/maps_routes.rs

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::models::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/maps", get(get_maps_key))
}

#[derive(Debug, Serialize)]
pub struct MapsKeyResponse {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// Key for the browser-side maps loader. Resolved once per process.
pub async fn get_maps_key(State(state): State<AppState>) -> Json<MapsKeyResponse> {
    let bootstrap = state.maps.load().await;
    Json(MapsKeyResponse {
        api_key: bootstrap.api_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_support::{send, test_app};

    #[tokio::test]
    async fn test_maps_key_shape() {
        let app = test_app();
        let (status, json) = send(&app, "GET", "/api/maps", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "apiKey": "test-key" }));
    }
}
