// src/map_view.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classifier::{classify, MarkerStyle};
use crate::error::MapViewError;
use crate::maps_loader::MapsBootstrap;
use crate::models::{Appointment, AppointmentStatus, LatLng, RouteSegment};
use crate::route_builder::{
    bounds, build_routes_with_anchor, centroid, Bounds, RouteAnchor, StrokeStyle,
};
use crate::sheet::{
    AnimationDirective, DragGesture, DragOutcome, NavOutcome, SheetConfig, SheetContent,
    SheetMachine,
};

pub const DEFAULT_ZOOM: i32 = 14;
pub const LOCATED_ZOOM: i32 = 15;
const MAX_ZOOM: i32 = 21;

pub const LOCATION_FALLBACK_NOTICE: &str =
    "Unable to access your location. Using route center instead.";
pub const MAP_NOT_READY_NOTICE: &str = "Map is not fully loaded yet. Please try again in a moment.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerOverlay {
    pub appointment_id: u32,
    pub status: AppointmentStatus,
    pub position: LatLng,
    pub label: String,
    pub style: MarkerStyle,
    pub z_index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentOverlay {
    #[serde(flatten)]
    pub segment: RouteSegment,
    pub stroke: StrokeStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    pub center: LatLng,
    pub zoom: i32,
    pub fit: Option<Bounds>,
}

/// The map SDK as seen from the view. Implementations draw; the view decides
/// what gets drawn.
pub trait MapRenderer {
    fn init(&mut self, bootstrap: &MapsBootstrap) -> Result<(), MapViewError>;
    fn clear(&mut self);
    fn draw_marker(&mut self, marker: MarkerOverlay);
    fn draw_segment(&mut self, segment: SegmentOverlay);
    fn set_camera(&mut self, camera: Camera);
}

pub trait Geolocator {
    fn current_position(&self) -> Result<LatLng, MapViewError>;
}

/// Position reported by the client's own geolocation, or its failure.
pub struct ReportedPosition(pub Result<LatLng, String>);

impl Geolocator for ReportedPosition {
    fn current_position(&self) -> Result<LatLng, MapViewError> {
        match &self.0 {
            Ok(pos) if pos.is_finite() => Ok(*pos),
            Ok(_) => Err(MapViewError::GeolocationFailure(
                "non-finite coordinates".to_string(),
            )),
            Err(reason) => Err(MapViewError::GeolocationFailure(reason.clone())),
        }
    }
}

/// Keeps whatever the view last drew, for serving back to clients.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverlayRecorder {
    pub markers: Vec<MarkerOverlay>,
    pub segments: Vec<SegmentOverlay>,
    pub camera: Option<Camera>,
}

impl MapRenderer for OverlayRecorder {
    /// Never fails. The recorder loads no SDK script, and a keyless bootstrap
    /// still draws in limited mode. `MapStatus::Failed` is reached only
    /// through renderers that can fail to load.
    fn init(&mut self, _bootstrap: &MapsBootstrap) -> Result<(), MapViewError> {
        Ok(())
    }

    fn clear(&mut self) {
        self.markers.clear();
        self.segments.clear();
    }

    fn draw_marker(&mut self, marker: MarkerOverlay) {
        self.markers.push(marker);
    }

    fn draw_segment(&mut self, segment: SegmentOverlay) {
        self.segments.push(segment);
    }

    fn set_camera(&mut self, camera: Camera) {
        self.camera = Some(camera);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MapStatus {
    Ready,
    Failed { title: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    fn now(message: &str) -> Self {
        Self {
            message: message.to_string(),
            raised_at: Utc::now(),
        }
    }
}

/// Markers and route lines for a list, in draw order.
pub fn overlays(
    appointments: &[Appointment],
    anchor: RouteAnchor,
) -> (Vec<MarkerOverlay>, Vec<SegmentOverlay>) {
    let markers = appointments
        .iter()
        .map(|app| {
            let class = classify(app);
            MarkerOverlay {
                appointment_id: app.id,
                status: app.status,
                position: app.position,
                label: class.label_for(app),
                style: class.marker,
                z_index: class.z_order,
            }
        })
        .collect();

    let segments = build_routes_with_anchor(appointments, anchor)
        .into_iter()
        .map(|segment| SegmentOverlay {
            stroke: segment.style.stroke(),
            segment,
        })
        .collect();

    (markers, segments)
}

pub struct MapView<R: MapRenderer> {
    appointments: Vec<Appointment>,
    anchor: RouteAnchor,
    renderer: R,
    sheet: SheetMachine,
    status: MapStatus,
    bounds: Option<Bounds>,
    zoom: i32,
    notice: Option<Notice>,
}

impl<R: MapRenderer> MapView<R> {
    pub fn new(
        appointments: Vec<Appointment>,
        mut renderer: R,
        bootstrap: &MapsBootstrap,
        sheet: SheetConfig,
    ) -> Self {
        let status = match renderer.init(bootstrap) {
            Ok(()) => MapStatus::Ready,
            Err(e) => {
                tracing::error!(error = %e, "map failed to initialise, showing fallback");
                MapStatus::Failed {
                    title: "Unable to load map".to_string(),
                    message: "There was an issue loading the map. Please check your internet connection and try again.".to_string(),
                }
            }
        };

        let mut view = Self {
            bounds: bounds(&appointments),
            appointments,
            anchor: RouteAnchor::default(),
            renderer,
            sheet: SheetMachine::new(sheet),
            status,
            zoom: DEFAULT_ZOOM,
            notice: None,
        };

        if view.is_ready() {
            if let Some(camera) = view.fit_camera() {
                view.renderer.set_camera(camera);
            }
            view.render();
        }
        view
    }

    pub fn with_anchor(mut self, anchor: RouteAnchor) -> Self {
        self.anchor = anchor;
        self.render();
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status == MapStatus::Ready
    }

    /// Map controls are hidden once the map has failed to load.
    pub fn controls_visible(&self) -> bool {
        self.is_ready()
    }

    pub fn status(&self) -> &MapStatus {
        &self.status
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn sheet(&self) -> &SheetMachine {
        &self.sheet
    }

    pub fn zoom(&self) -> i32 {
        self.zoom
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Clear and redraw every marker and line. Lists are small, so there is
    /// no diffing.
    pub fn render(&mut self) {
        if !self.is_ready() {
            return;
        }

        let (markers, segments) = overlays(&self.appointments, self.anchor);
        tracing::debug!(markers = markers.len(), segments = segments.len(), "render pass");

        self.renderer.clear();
        for marker in markers {
            self.renderer.draw_marker(marker);
        }
        for segment in segments {
            self.renderer.draw_segment(segment);
        }
    }

    /// Swap in a new list. An open sheet whose appointment disappeared is closed.
    pub fn replace_appointments(&mut self, appointments: Vec<Appointment>) {
        self.bounds = bounds(&appointments);
        self.appointments = appointments;
        self.sheet.resolve(&self.appointments);
        self.render();
    }

    /// Marker or list-item tap.
    pub fn select(&mut self, appointment_id: u32) -> Result<Option<AnimationDirective>, MapViewError> {
        let app = self
            .appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .ok_or(MapViewError::MissingSelection(appointment_id))?;

        tracing::debug!(appointment_id, status = app.status.as_str(), "appointment selected");
        Ok(self.sheet.open(appointment_id))
    }

    pub fn drag_sheet(&mut self, gesture: &DragGesture) -> DragOutcome {
        if self.sheet.resolve(&self.appointments).is_none() {
            return DragOutcome::Ignored;
        }
        self.sheet.release(gesture)
    }

    pub fn previous(&mut self) -> NavOutcome {
        self.sheet.previous(&self.appointments)
    }

    pub fn next(&mut self) -> NavOutcome {
        self.sheet.next(&self.appointments)
    }

    pub fn close_sheet(&mut self) -> Option<AnimationDirective> {
        self.sheet.close()
    }

    pub fn sheet_settled(&mut self) -> Option<AnimationDirective> {
        self.sheet.animation_finished()
    }

    pub fn sheet_content(&mut self) -> Option<SheetContent> {
        self.sheet.content(&self.appointments)
    }

    fn fit_camera(&self) -> Option<Camera> {
        let b = self.bounds?;
        Some(Camera {
            center: b.center(),
            zoom: self.zoom,
            fit: Some(b),
        })
    }

    fn move_camera(&mut self, center: LatLng, zoom: i32) -> Camera {
        self.zoom = zoom.clamp(0, MAX_ZOOM);
        let camera = Camera {
            center,
            zoom: self.zoom,
            fit: None,
        };
        self.renderer.set_camera(camera);
        camera
    }

    fn current_center(&self) -> Option<LatLng> {
        self.bounds.map(|b| b.center())
    }

    pub fn zoom_in(&mut self) -> Option<Camera> {
        self.zoom_by(1)
    }

    pub fn zoom_out(&mut self) -> Option<Camera> {
        self.zoom_by(-1)
    }

    fn zoom_by(&mut self, delta: i32) -> Option<Camera> {
        if !self.controls_visible() {
            return None;
        }
        self.notice = None;
        let center = self.current_center()?;
        Some(self.move_camera(center, self.zoom + delta))
    }

    /// Fit the map back to every appointment.
    pub fn recenter(&mut self) -> Option<Camera> {
        if !self.controls_visible() {
            return None;
        }
        self.notice = None;
        self.zoom = DEFAULT_ZOOM;
        let camera = self.fit_camera()?;
        self.renderer.set_camera(camera);
        Some(camera)
    }

    /// Centre on the caregiver. Failure is not fatal: the view falls back to
    /// the centroid of the day's visits and raises a notice.
    pub fn locate(&mut self, geolocator: &dyn Geolocator) -> Option<Camera> {
        if !self.controls_visible() {
            return None;
        }

        let Some(fallback) = centroid(&self.appointments) else {
            self.notice = Some(Notice::now(MAP_NOT_READY_NOTICE));
            return None;
        };

        match geolocator.current_position() {
            Ok(pos) => {
                self.notice = None;
                Some(self.move_camera(pos, LOCATED_ZOOM))
            }
            Err(e) => {
                tracing::warn!(error = %e, "geolocation failed, using route centroid");
                self.notice = Some(Notice::now(LOCATION_FALLBACK_NOTICE));
                Some(self.move_camera(fallback, DEFAULT_ZOOM))
            }
        }
    }
}
