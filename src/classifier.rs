// src/classifier.rs

use std::str::FromStr;

use serde::Serialize;

use crate::error::MapViewError;
use crate::models::{Appointment, AppointmentStatus};

pub const PRIMARY: &str = "#7B4B99";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerVariant {
    /// Stock pin icon, label drawn over it.
    Filled,
    /// Circle symbol with a white fill and a coloured stroke.
    Outlined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    CheckGlyph,
    IdText,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub variant: MarkerVariant,
    pub label_kind: LabelKind,
    pub label_color: &'static str,
    pub icon_url: Option<&'static str>,
    pub fill_color: Option<&'static str>,
    pub stroke_color: Option<&'static str>,
    pub stroke_weight: Option<f64>,
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub marker: MarkerStyle,
    pub z_order: i32,
}

impl Classification {
    /// Label text the rendering layer should draw.
    pub fn label_for(&self, appointment: &Appointment) -> String {
        match self.marker.label_kind {
            LabelKind::CheckGlyph => "\u{2713}".to_string(),
            LabelKind::IdText => appointment.id.to_string(),
        }
    }
}

const fn filled(icon_url: &'static str, label_kind: LabelKind) -> MarkerStyle {
    MarkerStyle {
        variant: MarkerVariant::Filled,
        label_kind,
        label_color: "white",
        icon_url: Some(icon_url),
        fill_color: None,
        stroke_color: None,
        stroke_weight: None,
        scale: None,
    }
}

const COMPLETED: Classification = Classification {
    marker: filled(
        "https://maps.google.com/mapfiles/ms/icons/green-dot.png",
        LabelKind::CheckGlyph,
    ),
    z_order: 1,
};

const NEXT: Classification = Classification {
    marker: filled(
        "https://maps.google.com/mapfiles/ms/icons/purple-dot.png",
        LabelKind::IdText,
    ),
    z_order: 2,
};

const UPCOMING: Classification = Classification {
    marker: MarkerStyle {
        variant: MarkerVariant::Outlined,
        label_kind: LabelKind::IdText,
        label_color: PRIMARY,
        icon_url: None,
        fill_color: Some("white"),
        stroke_color: Some(PRIMARY),
        stroke_weight: Some(2.0),
        scale: Some(10.0),
    },
    z_order: 1,
};

const CANCELLED: Classification = Classification {
    marker: filled(
        "https://maps.google.com/mapfiles/ms/icons/red-dot.png",
        LabelKind::IdText,
    ),
    z_order: 1,
};

impl AppointmentStatus {
    pub const fn classification(self) -> Classification {
        match self {
            AppointmentStatus::Completed => COMPLETED,
            AppointmentStatus::Next => NEXT,
            AppointmentStatus::Upcoming => UPCOMING,
            AppointmentStatus::Cancelled => CANCELLED,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Next => "next",
            AppointmentStatus::Upcoming => "upcoming",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = MapViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(AppointmentStatus::Completed),
            "next" => Ok(AppointmentStatus::Next),
            "upcoming" => Ok(AppointmentStatus::Upcoming),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => {
                tracing::error!(status = other, "appointment status outside the known set");
                Err(MapViewError::InvalidStatus(other.to_string()))
            }
        }
    }
}

pub fn classify(appointment: &Appointment) -> Classification {
    appointment.status.classification()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_day;
    use assert_matches::assert_matches;

    #[test]
    fn test_next_is_drawn_above_everything() {
        let day = sample_day();
        let next = day
            .iter()
            .find(|a| a.status == AppointmentStatus::Next)
            .unwrap();
        let top = classify(next).z_order;

        for app in day.iter().filter(|a| a.id != next.id) {
            assert!(classify(app).z_order < top);
        }
    }

    #[test]
    fn test_marker_variants() {
        assert_eq!(
            AppointmentStatus::Upcoming.classification().marker.variant,
            MarkerVariant::Outlined
        );
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Next,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(status.classification().marker.variant, MarkerVariant::Filled);
        }

        let upcoming = UPCOMING.marker;
        assert_eq!(upcoming.fill_color, Some("white"));
        assert_eq!(upcoming.stroke_color, Some(PRIMARY));
    }

    #[test]
    fn test_labels() {
        let day = sample_day();
        assert_eq!(classify(&day[0]).label_for(&day[0]), "\u{2713}");
        assert_eq!(classify(&day[1]).label_for(&day[1]), "2");
        assert_eq!(classify(&day[4]).label_for(&day[4]), "5");
    }

    #[test]
    fn test_unknown_status_does_not_default() {
        assert_matches!(
            "done".parse::<AppointmentStatus>(),
            Err(MapViewError::InvalidStatus(s)) if s == "done"
        );
        assert_matches!("Next".parse::<AppointmentStatus>(), Err(MapViewError::InvalidStatus(_)));
        assert!("cancelled".parse::<AppointmentStatus>().is_ok());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Next,
            AppointmentStatus::Upcoming,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<AppointmentStatus>(), Ok(status));
        }
    }
}
