use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::map_view::{MapView, OverlayRecorder};
use crate::maps_loader::MapsLoader;
use crate::sheet::SheetConfig;

#[derive(Clone)]
pub struct AppState {
    pub maps: Arc<MapsLoader>,
    pub views: Arc<Mutex<HashMap<Uuid, ViewSession>>>,
    pub sheet: SheetConfig,
    pub view_ttl_minutes: i64,
}

impl AppState {
    pub fn new(maps: MapsLoader, sheet: SheetConfig, view_ttl_minutes: i64) -> Self {
        Self {
            maps: Arc::new(maps),
            views: Arc::new(Mutex::new(HashMap::new())),
            sheet,
            view_ttl_minutes,
        }
    }
}

/// One open map screen. The session map owns it; handlers borrow it for the
/// duration of a single event.
pub struct ViewSession {
    pub view: MapView<OverlayRecorder>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl ViewSession {
    pub fn new(view: MapView<OverlayRecorder>) -> Self {
        let now = Utc::now();
        Self {
            view,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Idle for longer than the ttl. A client that never deletes its view
    /// loses it once it goes quiet.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl_minutes: i64) -> bool {
        now - self.last_active_at > Duration::minutes(ttl_minutes)
    }
}

/// Drop every idle session. Returns how many were removed.
pub fn prune_expired_views(
    views: &mut HashMap<Uuid, ViewSession>,
    now: DateTime<Utc>,
    ttl_minutes: i64,
) -> usize {
    let before = views.len();
    views.retain(|_, session| !session.is_expired(now, ttl_minutes));
    before - views.len()
}

/* -------------------------
   Domain
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Completed,
    Next,
    Upcoming,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    pub id: u32,
    pub status: AppointmentStatus,
    pub patient_name: String,
    pub address: String,
    pub time: String,
    pub treatment: String,
    pub position: LatLng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStyle {
    SolidPrimary,
    DashedSecondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteSegment {
    pub from: LatLng,
    pub to: LatLng,
    pub style: SegmentStyle,
}

/* -------------------------
   API DTOs
--------------------------*/

/// Appointment as sent by a client. `status` stays a string until the
/// classifier has checked it against the known set.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentInput {
    pub id: u32,
    pub status: String,
    pub patient_name: String,
    pub address: String,
    pub time: String,
    pub treatment: String,
    pub position: LatLng,
}

impl AppointmentInput {
    pub fn into_appointment(self) -> Result<Appointment, ApiError> {
        if self.id == 0 {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "appointment id must be a positive integer".into(),
            ));
        }

        for (field, value) in [
            ("patient_name", &self.patient_name),
            ("address", &self.address),
            ("time", &self.time),
            ("treatment", &self.treatment),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::BadRequest(
                    "VALIDATION_ERROR",
                    format!("appointment {}: {field} is required", self.id),
                ));
            }
        }

        if !self.position.is_finite() {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("appointment {}: position must be finite", self.id),
            ));
        }

        let status = self.status.parse::<AppointmentStatus>()?;

        Ok(Appointment {
            id: self.id,
            status,
            patient_name: self.patient_name,
            address: self.address,
            time: self.time,
            treatment: self.treatment,
            position: self.position,
        })
    }
}

/// Validate a whole list, keeping visit order. Ids must be unique.
pub fn appointments_from_input(
    input: Vec<AppointmentInput>,
) -> Result<Vec<Appointment>, ApiError> {
    let mut seen = HashSet::with_capacity(input.len());
    let mut out = Vec::with_capacity(input.len());

    for item in input {
        if !seen.insert(item.id) {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("duplicate appointment id {}", item.id),
            ));
        }
        out.push(item.into_appointment()?);
    }

    Ok(out)
}

/* -------------------------
   Sample data
--------------------------*/

fn sample(
    id: u32,
    status: AppointmentStatus,
    patient_name: &str,
    address: &str,
    time: &str,
    treatment: &str,
    position: LatLng,
) -> Appointment {
    Appointment {
        id,
        status,
        patient_name: patient_name.to_string(),
        address: address.to_string(),
        time: time.to_string(),
        treatment: treatment.to_string(),
        position,
    }
}

/// The caregiver day shown on the routes screen when no list is supplied.
pub fn sample_day() -> Vec<Appointment> {
    use AppointmentStatus::*;

    vec![
        sample(
            1,
            Completed,
            "Sarah Johnson",
            "123 Main St, Sainte-Foy, QC",
            "10:30 am - 11:00 am",
            "Blood Pressure Check",
            LatLng::new(46.769, -71.282),
        ),
        sample(
            2,
            Next,
            "Fred Tucker",
            "100 Elm Ridge Center Dr, Greece NY 14626",
            "12:00 pm - 12:30 pm",
            "Wound Care treatment",
            LatLng::new(46.762, -71.295),
        ),
        sample(
            3,
            Upcoming,
            "Maria Garcia",
            "456 Oak Ave, Sainte-Foy, QC",
            "1:30 pm - 2:00 pm",
            "Medication Administration",
            LatLng::new(46.755, -71.305),
        ),
        sample(
            4,
            Upcoming,
            "Robert Chen",
            "789 Pine Rd, Sainte-Foy, QC",
            "2:30 pm - 3:00 pm",
            "Physical Therapy",
            LatLng::new(46.765, -71.315),
        ),
        sample(
            5,
            Cancelled,
            "Emily Wilson",
            "321 Maple Dr, Laval, QC",
            "3:30 pm - 4:00 pm",
            "Wound Dressing",
            LatLng::new(46.775, -71.3),
        ),
        sample(
            6,
            Upcoming,
            "James Brown",
            "654 Cedar Ln, Laval, QC",
            "4:30 pm - 5:00 pm",
            "Diabetes Management",
            LatLng::new(46.785, -71.29),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: u32, status: &str) -> AppointmentInput {
        AppointmentInput {
            id,
            status: status.to_string(),
            patient_name: "Pat".into(),
            address: "1 Road".into(),
            time: "9:00 am - 9:30 am".into(),
            treatment: "Check".into(),
            position: LatLng::new(46.0, -71.0),
        }
    }

    #[test]
    fn test_sample_day_has_single_next() {
        let day = sample_day();
        assert_eq!(day.len(), 6);
        let next = day
            .iter()
            .filter(|a| a.status == AppointmentStatus::Next)
            .count();
        assert_eq!(next, 1);
    }

    #[test]
    fn test_input_validation() {
        assert!(input(1, "upcoming").into_appointment().is_ok());
        assert!(matches!(
            input(0, "upcoming").into_appointment(),
            Err(ApiError::BadRequest(..))
        ));

        let mut blank = input(2, "next");
        blank.address = "  ".into();
        assert!(matches!(blank.into_appointment(), Err(ApiError::BadRequest(..))));

        let mut nan = input(3, "next");
        nan.position.lat = f64::NAN;
        assert!(matches!(nan.into_appointment(), Err(ApiError::BadRequest(..))));
    }

    #[test]
    fn test_unknown_status_is_unprocessable() {
        let err = input(1, "rescheduled").into_appointment().unwrap_err();
        assert!(matches!(err, ApiError::Unprocessable("INVALID_STATUS", _)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let res = appointments_from_input(vec![input(1, "next"), input(1, "upcoming")]);
        assert!(matches!(res, Err(ApiError::BadRequest(..))));
    }
}
