// src/routes/route_routes.rs

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    map_view::{overlays, MarkerOverlay, SegmentOverlay},
    models::{appointments_from_input, sample_day, AppState, Appointment, AppointmentInput},
    route_builder::{next_visit, NextVisit, RouteAnchor},
    routes::ApiOk,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/routes/today", get(get_today))
        .route("/routes/overlay", post(post_overlay))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct DayOverview {
    pub appointments: Vec<Appointment>,
    pub markers: Vec<MarkerOverlay>,
    pub segments: Vec<SegmentOverlay>,
    pub next_visit: Option<NextVisit>,
}

#[derive(Debug, Serialize)]
pub struct OverlayData {
    pub markers: Vec<MarkerOverlay>,
    pub segments: Vec<SegmentOverlay>,
}

#[derive(Debug, Deserialize)]
pub struct OverlayRequest {
    pub appointments: Vec<AppointmentInput>,
    /// Last completed visit to draw the solid leg from.
    pub anchor_id: Option<u32>,
}

pub fn anchor_from(anchor_id: Option<u32>) -> RouteAnchor {
    anchor_id.map_or(RouteAnchor::FirstCompleted, RouteAnchor::Completed)
}

/* ============================================================
   GET /routes/today
   ============================================================ */

pub async fn get_today() -> Json<ApiOk<DayOverview>> {
    let appointments = sample_day();
    let (markers, segments) = overlays(&appointments, RouteAnchor::FirstCompleted);
    let next_visit = next_visit(&appointments);

    Json(ApiOk {
        data: DayOverview {
            appointments,
            markers,
            segments,
            next_visit,
        },
    })
}

/* ============================================================
   POST /routes/overlay
   ============================================================ */

pub async fn post_overlay(
    Json(req): Json<OverlayRequest>,
) -> Result<Json<ApiOk<OverlayData>>, ApiError> {
    let appointments = appointments_from_input(req.appointments)?;
    let (markers, segments) = overlays(&appointments, anchor_from(req.anchor_id));

    tracing::debug!(
        appointments = appointments.len(),
        segments = segments.len(),
        "computed route overlay"
    );

    Ok(Json(ApiOk {
        data: OverlayData { markers, segments },
    }))
}
