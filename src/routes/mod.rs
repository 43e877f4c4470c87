use crate::models::AppState;
use axum::Router;

pub mod maps_routes;
pub mod route_routes;
pub mod view_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            route_routes::router().merge(view_routes::router()),
        )
        .merge(maps_routes::router())
        .with_state(state)
}

#[derive(Debug, serde::Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::maps_loader::{MapsLoader, StaticKeySource};
    use crate::models::AppState;
    use crate::sheet::SheetConfig;

    pub fn test_state() -> AppState {
        AppState::new(
            MapsLoader::new(StaticKeySource::new("test-key")),
            SheetConfig::default(),
            120,
        )
    }

    pub fn test_app() -> Router {
        super::router(test_state())
    }

    pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
