// src/route_builder.rs

use serde::Serialize;

use crate::classifier::PRIMARY;
use crate::models::{Appointment, AppointmentStatus, LatLng, RouteSegment, SegmentStyle};

/// Stroke attributes handed to the map for a segment style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrokeStyle {
    pub color: &'static str,
    pub opacity: f64,
    pub weight: f64,
    pub dash_pattern: Option<[u32; 2]>,
    pub geodesic: bool,
}

impl SegmentStyle {
    pub const fn stroke(self) -> StrokeStyle {
        match self {
            SegmentStyle::SolidPrimary => StrokeStyle {
                color: PRIMARY,
                opacity: 1.0,
                weight: 3.0,
                dash_pattern: None,
                geodesic: true,
            },
            SegmentStyle::DashedSecondary => StrokeStyle {
                color: "#768293",
                opacity: 0.7,
                weight: 3.0,
                dash_pattern: Some([10, 5]),
                geodesic: true,
            },
        }
    }
}

/// Which completed visit seeds the solid leg into the next visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteAnchor {
    /// First `completed` entry in list order.
    #[default]
    FirstCompleted,
    /// Caller-chosen last completed visit. Ignored unless it is completed.
    Completed(u32),
}

pub fn build_routes(appointments: &[Appointment]) -> Vec<RouteSegment> {
    build_routes_with_anchor(appointments, RouteAnchor::FirstCompleted)
}

pub fn build_routes_with_anchor(
    appointments: &[Appointment],
    anchor: RouteAnchor,
) -> Vec<RouteSegment> {
    let Some(next) = appointments
        .iter()
        .find(|a| a.status == AppointmentStatus::Next)
    else {
        return Vec::new();
    };

    let completed = appointments.iter().find(|a| {
        a.status == AppointmentStatus::Completed
            && match anchor {
                RouteAnchor::FirstCompleted => true,
                RouteAnchor::Completed(id) => a.id == id,
            }
    });

    let mut upcoming: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Upcoming)
        .collect();
    // stable sort keeps list order for equal ids
    upcoming.sort_by_key(|a| a.id);

    let mut segments = Vec::with_capacity(upcoming.len() + 1);

    if let Some(done) = completed {
        segments.push(RouteSegment {
            from: done.position,
            to: next.position,
            style: SegmentStyle::SolidPrimary,
        });
    }

    let mut cursor = next.position;
    for app in upcoming {
        segments.push(RouteSegment {
            from: cursor,
            to: app.position,
            style: SegmentStyle::DashedSecondary,
        });
        cursor = app.position;
    }

    segments
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }
}

/// Box around every appointment, `None` for an empty list.
pub fn bounds(appointments: &[Appointment]) -> Option<Bounds> {
    let first = appointments.first()?.position;
    let init = Bounds {
        south_west: first,
        north_east: first,
    };

    Some(appointments.iter().fold(init, |b, a| Bounds {
        south_west: LatLng::new(b.south_west.lat.min(a.position.lat), b.south_west.lng.min(a.position.lng)),
        north_east: LatLng::new(b.north_east.lat.max(a.position.lat), b.north_east.lng.max(a.position.lng)),
    }))
}

/// Mean of all appointment positions.
pub fn centroid(appointments: &[Appointment]) -> Option<LatLng> {
    if appointments.is_empty() {
        return None;
    }
    let n = appointments.len() as f64;
    let (lat, lng) = appointments
        .iter()
        .fold((0.0, 0.0), |(lat, lng), a| (lat + a.position.lat, lng + a.position.lng));
    Some(LatLng::new(lat / n, lng / n))
}

#[derive(Debug, Clone, Serialize)]
pub struct NextVisit {
    pub appointment_id: u32,
    pub patient_name: String,
    pub address: String,
    pub treatment: String,
    pub starts: String,
    pub ends: Option<String>,
}

pub fn next_visit(appointments: &[Appointment]) -> Option<NextVisit> {
    let next = appointments
        .iter()
        .find(|a| a.status == AppointmentStatus::Next)?;

    let (starts, ends) = match next.time.split_once(" - ") {
        Some((start, end)) => (start.trim().to_string(), Some(end.trim().to_string())),
        None => (next.time.trim().to_string(), None),
    };

    Some(NextVisit {
        appointment_id: next.id,
        patient_name: next.patient_name.clone(),
        address: next.address.clone(),
        treatment: next.treatment.clone(),
        starts,
        ends,
    })
}
