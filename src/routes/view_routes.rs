// src/routes/view_routes.rs
//
// Server-held map views. Each session has exactly one owner (the session map);
// a handler takes the lock, applies one event and answers with a snapshot.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    map_view::{Camera, MapStatus, MapView, MarkerOverlay, Notice, OverlayRecorder, ReportedPosition, SegmentOverlay},
    models::{
        appointments_from_input, prune_expired_views, sample_day, AppState, AppointmentInput,
        LatLng, ViewSession,
    },
    routes::{route_routes::anchor_from, ApiOk},
    sheet::{
        AnimationDirective, DragGesture, DragOutcome, NavOutcome, SheetContent, SheetMode,
        SheetPosition,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/views", post(create_view))
        .route("/views/{view_id}", get(get_view).delete(delete_view))
        .route("/views/{view_id}/appointments", post(replace_appointments))
        .route("/views/{view_id}/markers/{appointment_id}/tap", post(tap_marker))
        .route("/views/{view_id}/sheet/drag", post(drag_sheet))
        .route("/views/{view_id}/sheet/previous", post(sheet_previous))
        .route("/views/{view_id}/sheet/next", post(sheet_next))
        .route("/views/{view_id}/sheet/close", post(sheet_close))
        .route("/views/{view_id}/sheet/settled", post(sheet_settled))
        .route("/views/{view_id}/camera/{action}", post(camera_action))
        .route("/views/{view_id}/locate", post(locate))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateViewRequest {
    pub appointments: Option<Vec<AppointmentInput>>,
    pub viewport_height: Option<f64>,
    pub anchor_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceAppointmentsRequest {
    pub appointments: Vec<AppointmentInput>,
}

#[derive(Debug, Deserialize)]
pub struct LocateRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SheetSnapshot {
    pub position: SheetPosition,
    pub mode: SheetMode,
    pub selected_appointment_id: Option<u32>,
    pub in_flight: Option<AnimationDirective>,
    pub content: Option<SheetContent>,
}

#[derive(Debug, Serialize)]
pub struct ViewSnapshot {
    pub view_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub map: MapStatus,
    pub controls_visible: bool,
    pub zoom: i32,
    pub camera: Option<Camera>,
    pub notice: Option<Notice>,
    pub markers: Vec<MarkerOverlay>,
    pub segments: Vec<SegmentOverlay>,
    pub sheet: SheetSnapshot,
}

#[derive(Debug, Serialize)]
pub struct EventResult<O> {
    pub outcome: O,
    pub view: ViewSnapshot,
}

#[derive(Debug, Serialize)]
pub struct AnimationOutcome {
    pub animation: Option<AnimationDirective>,
}

#[derive(Debug, Serialize)]
pub struct CameraOutcome {
    pub camera: Option<Camera>,
}

#[derive(Debug, Serialize)]
pub struct DeletedData {
    pub ok: bool,
}

/* ============================================================
   Helpers
   ============================================================ */

fn snapshot(view_id: Uuid, session: &mut ViewSession) -> ViewSnapshot {
    let view = &mut session.view;
    let content = view.sheet_content();
    let sheet = view.sheet();
    let drawn = view.renderer();

    ViewSnapshot {
        view_id,
        created_at: session.created_at,
        map: view.status().clone(),
        controls_visible: view.controls_visible(),
        zoom: view.zoom(),
        camera: drawn.camera,
        notice: view.notice().cloned(),
        markers: drawn.markers.clone(),
        segments: drawn.segments.clone(),
        sheet: SheetSnapshot {
            position: sheet.position(),
            mode: sheet.mode(),
            selected_appointment_id: sheet.selected(),
            in_flight: sheet.in_flight().copied(),
            content,
        },
    }
}

fn with_view<T>(
    state: &AppState,
    view_id: Uuid,
    event: impl FnOnce(&mut MapView<OverlayRecorder>) -> Result<T, ApiError>,
) -> Result<Json<ApiOk<EventResult<T>>>, ApiError> {
    let mut views = state
        .views
        .lock()
        .map_err(|_| ApiError::Internal("view store lock poisoned".into()))?;
    let session = live_session(&mut views, view_id, state.view_ttl_minutes)?;

    let outcome = event(&mut session.view)?;
    Ok(Json(ApiOk {
        data: EventResult {
            outcome,
            view: snapshot(view_id, session),
        },
    }))
}

/// Look up a session and mark it active. An idle one is dropped and reported
/// as missing.
fn live_session(
    views: &mut HashMap<Uuid, ViewSession>,
    view_id: Uuid,
    ttl_minutes: i64,
) -> Result<&mut ViewSession, ApiError> {
    let now = Utc::now();
    let expired = views
        .get(&view_id)
        .ok_or_else(ApiError::view_not_found)?
        .is_expired(now, ttl_minutes);

    if expired {
        views.remove(&view_id);
        tracing::info!(%view_id, "map view expired");
        return Err(ApiError::view_not_found());
    }

    let session = views.get_mut(&view_id).ok_or_else(ApiError::view_not_found)?;
    session.last_active_at = now;
    Ok(session)
}

fn ensure_finite(name: &str, value: f64) -> Result<(), ApiError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{name} must be a finite number"),
        ))
    }
}

/* ============================================================
   Session lifecycle
   ============================================================ */

pub async fn create_view(
    State(state): State<AppState>,
    body: Option<Json<CreateViewRequest>>,
) -> Result<Json<ApiOk<ViewSnapshot>>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let appointments = match req.appointments {
        Some(list) => appointments_from_input(list)?,
        None => sample_day(),
    };

    let mut sheet = state.sheet;
    if let Some(height) = req.viewport_height {
        ensure_finite("viewport_height", height)?;
        if height <= 0.0 {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "viewport_height must be positive".into(),
            ));
        }
        sheet = sheet.with_viewport_height(height);
    }

    let bootstrap = state.maps.load().await;
    let view = MapView::new(appointments, OverlayRecorder::default(), &bootstrap, sheet)
        .with_anchor(anchor_from(req.anchor_id));

    let view_id = Uuid::new_v4();
    let mut session = ViewSession::new(view);
    let snap = snapshot(view_id, &mut session);

    let mut views = state
        .views
        .lock()
        .map_err(|_| ApiError::Internal("view store lock poisoned".into()))?;
    let pruned = prune_expired_views(&mut views, Utc::now(), state.view_ttl_minutes);
    if pruned > 0 {
        tracing::info!(pruned, "dropped idle map views");
    }
    views.insert(view_id, session);
    drop(views);

    tracing::info!(%view_id, markers = snap.markers.len(), "map view created");
    Ok(Json(ApiOk { data: snap }))
}

pub async fn get_view(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
) -> Result<Json<ApiOk<ViewSnapshot>>, ApiError> {
    let mut views = state
        .views
        .lock()
        .map_err(|_| ApiError::Internal("view store lock poisoned".into()))?;
    let session = live_session(&mut views, view_id, state.view_ttl_minutes)?;

    Ok(Json(ApiOk {
        data: snapshot(view_id, session),
    }))
}

pub async fn delete_view(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
) -> Result<Json<ApiOk<DeletedData>>, ApiError> {
    let removed = state
        .views
        .lock()
        .map_err(|_| ApiError::Internal("view store lock poisoned".into()))?
        .remove(&view_id);

    if removed.is_none() {
        return Err(ApiError::view_not_found());
    }

    tracing::info!(%view_id, "map view closed");
    Ok(Json(ApiOk {
        data: DeletedData { ok: true },
    }))
}

pub async fn replace_appointments(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
    Json(req): Json<ReplaceAppointmentsRequest>,
) -> Result<Json<ApiOk<EventResult<AnimationOutcome>>>, ApiError> {
    let appointments = appointments_from_input(req.appointments)?;

    with_view(&state, view_id, |view| {
        let was_open = view.sheet().is_open();
        view.replace_appointments(appointments);
        let animation = if was_open && !view.sheet().is_open() {
            view.sheet().in_flight().copied()
        } else {
            None
        };
        Ok(AnimationOutcome { animation })
    })
}

/* ============================================================
   Sheet events
   ============================================================ */

pub async fn tap_marker(
    State(state): State<AppState>,
    Path((view_id, appointment_id)): Path<(Uuid, u32)>,
) -> Result<Json<ApiOk<EventResult<AnimationOutcome>>>, ApiError> {
    with_view(&state, view_id, |view| {
        let animation = view.select(appointment_id)?;
        Ok(AnimationOutcome { animation })
    })
}

pub async fn drag_sheet(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
    Json(gesture): Json<DragGesture>,
) -> Result<Json<ApiOk<EventResult<DragOutcome>>>, ApiError> {
    ensure_finite("offset_y", gesture.offset_y)?;
    ensure_finite("velocity_y", gesture.velocity_y)?;
    ensure_finite("release_y", gesture.release_y)?;

    with_view(&state, view_id, |view| Ok(view.drag_sheet(&gesture)))
}

pub async fn sheet_previous(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
) -> Result<Json<ApiOk<EventResult<NavOutcome>>>, ApiError> {
    with_view(&state, view_id, |view| Ok(view.previous()))
}

pub async fn sheet_next(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
) -> Result<Json<ApiOk<EventResult<NavOutcome>>>, ApiError> {
    with_view(&state, view_id, |view| Ok(view.next()))
}

pub async fn sheet_close(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
) -> Result<Json<ApiOk<EventResult<AnimationOutcome>>>, ApiError> {
    with_view(&state, view_id, |view| {
        Ok(AnimationOutcome {
            animation: view.close_sheet(),
        })
    })
}

pub async fn sheet_settled(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
) -> Result<Json<ApiOk<EventResult<AnimationOutcome>>>, ApiError> {
    with_view(&state, view_id, |view| {
        Ok(AnimationOutcome {
            animation: view.sheet_settled(),
        })
    })
}

/* ============================================================
   Camera
   ============================================================ */

pub async fn camera_action(
    State(state): State<AppState>,
    Path((view_id, action)): Path<(Uuid, String)>,
) -> Result<Json<ApiOk<EventResult<CameraOutcome>>>, ApiError> {
    with_view(&state, view_id, |view| {
        let camera = match action.as_str() {
            "zoom-in" => view.zoom_in(),
            "zoom-out" => view.zoom_out(),
            "recenter" => view.recenter(),
            other => {
                return Err(ApiError::BadRequest(
                    "VALIDATION_ERROR",
                    format!("unknown camera action `{other}`"),
                ));
            }
        };
        Ok(CameraOutcome { camera })
    })
}

pub async fn locate(
    State(state): State<AppState>,
    Path(view_id): Path<Uuid>,
    Json(req): Json<LocateRequest>,
) -> Result<Json<ApiOk<EventResult<CameraOutcome>>>, ApiError> {
    let reported = match (req.lat, req.lng, req.error) {
        (Some(lat), Some(lng), None) => ReportedPosition(Ok(LatLng::new(lat, lng))),
        (_, _, Some(reason)) => ReportedPosition(Err(reason)),
        _ => {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "either lat/lng or error is required".into(),
            ));
        }
    };

    with_view(&state, view_id, |view| {
        Ok(CameraOutcome {
            camera: view.locate(&reported),
        })
    })
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, Router};
    use serde_json::{json, Value};

    use crate::routes::test_support::{send, test_app, test_state};

    async fn new_view(app: &Router) -> String {
        let (status, json) = send(app, "POST", "/api/v1/views", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        json["data"]["view_id"].as_str().unwrap().to_string()
    }

    fn drag(offset_y: f64, release_y: f64) -> Value {
        json!({ "offset_y": offset_y, "velocity_y": 0.0, "release_y": release_y })
    }

    #[tokio::test]
    async fn test_create_view_draws_sample_day() {
        let app = test_app();
        let (status, json) = send(&app, "POST", "/api/v1/views", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let data = &json["data"];
        assert_eq!(data["map"]["state"], "ready");
        assert_eq!(data["controls_visible"], true);
        assert_eq!(data["markers"].as_array().unwrap().len(), 6);
        assert_eq!(data["segments"].as_array().unwrap().len(), 4);
        assert_eq!(data["sheet"]["position"], "closed");
    }

    #[tokio::test]
    async fn test_tap_then_drag_to_full_and_close() {
        let app = test_app();
        let id = new_view(&app).await;

        let (status, json) =
            send(&app, "POST", &format!("/api/v1/views/{id}/markers/2/tap"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["outcome"]["animation"]["target"], "partial");
        assert_eq!(json["data"]["view"]["sheet"]["content"]["appointment"]["id"], 2);

        let (_, json) = send(
            &app,
            "POST",
            &format!("/api/v1/views/{id}/sheet/drag"),
            Some(drag(-150.0, 250.0)),
        )
        .await;
        assert_eq!(json["data"]["outcome"]["outcome"], "transitioned");
        assert_eq!(json["data"]["view"]["sheet"]["position"], "full");

        // released below the midpoint of an 800px viewport
        let (_, json) = send(
            &app,
            "POST",
            &format!("/api/v1/views/{id}/sheet/drag"),
            Some(drag(150.0, 480.0)),
        )
        .await;
        assert_eq!(json["data"]["outcome"]["to"], "closed");
        assert_eq!(json["data"]["view"]["sheet"]["content"], Value::Null);
    }

    #[tokio::test]
    async fn test_navigation_stops_at_last_entry() {
        let app = test_app();
        let id = new_view(&app).await;
        send(&app, "POST", &format!("/api/v1/views/{id}/markers/6/tap"), None).await;

        let (status, json) =
            send(&app, "POST", &format!("/api/v1/views/{id}/sheet/next"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["outcome"]["outcome"], "at_boundary");
        assert_eq!(json["data"]["view"]["sheet"]["selected_appointment_id"], 6);
        assert_eq!(json["data"]["view"]["sheet"]["content"]["can_next"], false);

        let (_, json) =
            send(&app, "POST", &format!("/api/v1/views/{id}/sheet/previous"), None).await;
        assert_eq!(json["data"]["outcome"]["to"], 5);
    }

    #[tokio::test]
    async fn test_removing_selected_appointment_closes_sheet() {
        let app = test_app();
        let body = json!({
            "appointments": [
                { "id": 1, "status": "next", "patient_name": "A", "address": "x", "time": "9", "treatment": "t", "position": { "lat": 1.0, "lng": 1.0 } },
                { "id": 2, "status": "upcoming", "patient_name": "B", "address": "y", "time": "10", "treatment": "t", "position": { "lat": 2.0, "lng": 2.0 } }
            ]
        });
        let (_, json) = send(&app, "POST", "/api/v1/views", Some(body)).await;
        let id = json["data"]["view_id"].as_str().unwrap().to_string();
        send(&app, "POST", &format!("/api/v1/views/{id}/markers/2/tap"), None).await;

        let replacement = json!({
            "appointments": [
                { "id": 1, "status": "next", "patient_name": "A", "address": "x", "time": "9", "treatment": "t", "position": { "lat": 1.0, "lng": 1.0 } }
            ]
        });
        let (status, json) = send(
            &app,
            "POST",
            &format!("/api/v1/views/{id}/appointments"),
            Some(replacement),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["outcome"]["animation"]["target"], "closed");
        assert_eq!(json["data"]["view"]["sheet"]["position"], "closed");
        assert_eq!(json["data"]["view"]["markers"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_locate_failure_raises_notice() {
        let app = test_app();
        let id = new_view(&app).await;

        let (status, json) = send(
            &app,
            "POST",
            &format!("/api/v1/views/{id}/locate"),
            Some(json!({ "error": "User denied Geolocation" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["outcome"]["camera"]["zoom"], 14);
        assert_eq!(
            json["data"]["view"]["notice"]["message"],
            "Unable to access your location. Using route center instead."
        );
    }

    #[tokio::test]
    async fn test_camera_actions() {
        let app = test_app();
        let id = new_view(&app).await;

        let (_, json) =
            send(&app, "POST", &format!("/api/v1/views/{id}/camera/zoom-in"), None).await;
        assert_eq!(json["data"]["outcome"]["camera"]["zoom"], 15);

        let (status, json) =
            send(&app, "POST", &format!("/api/v1/views/{id}/camera/tilt"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_view_and_appointment() {
        let app = test_app();
        let missing = uuid::Uuid::new_v4();
        let (status, json) = send(&app, "GET", &format!("/api/v1/views/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "VIEW_NOT_FOUND");

        let id = new_view(&app).await;
        let (status, json) =
            send(&app, "POST", &format!("/api/v1/views/{id}/markers/99/tap"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "APPOINTMENT_NOT_FOUND");

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/views/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/api/v1/views/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_view_without_body_uses_sample_day() {
        let app = test_app();
        let (status, json) = send(&app, "POST", "/api/v1/views", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["markers"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_idle_view_expires() {
        let state = test_state();
        let app = crate::routes::router(state.clone());
        let id = new_view(&app).await;

        {
            let mut views = state.views.lock().unwrap();
            let session = views.get_mut(&id.parse::<uuid::Uuid>().unwrap()).unwrap();
            session.last_active_at -= chrono::Duration::minutes(state.view_ttl_minutes + 1);
        }

        let (status, json) = send(&app, "GET", &format!("/api/v1/views/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "VIEW_NOT_FOUND");
        assert!(state.views.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_prunes_idle_views() {
        let state = test_state();
        let app = crate::routes::router(state.clone());
        for _ in 0..5 {
            new_view(&app).await;
        }

        for session in state.views.lock().unwrap().values_mut() {
            session.last_active_at -= chrono::Duration::minutes(state.view_ttl_minutes + 1);
        }

        let fresh = new_view(&app).await;
        let views = state.views.lock().unwrap();
        assert_eq!(views.len(), 1);
        assert!(views.contains_key(&fresh.parse::<uuid::Uuid>().unwrap()));
    }

    #[tokio::test]
    async fn test_activity_keeps_view_alive() {
        let state = test_state();
        let app = crate::routes::router(state.clone());
        let id = new_view(&app).await;

        {
            let mut views = state.views.lock().unwrap();
            let session = views.get_mut(&id.parse::<uuid::Uuid>().unwrap()).unwrap();
            session.last_active_at -= chrono::Duration::minutes(state.view_ttl_minutes - 1);
        }

        let (status, _) = send(&app, "GET", &format!("/api/v1/views/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let views = state.views.lock().unwrap();
        let session = views.get(&id.parse::<uuid::Uuid>().unwrap()).unwrap();
        assert!(!session.is_expired(chrono::Utc::now(), state.view_ttl_minutes));
    }
}
