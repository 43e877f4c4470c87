// src/sheet.rs
//
// Detail sheet bound to the selected appointment. Gesture events come in as
// plain numbers (offset, velocity, release point); the machine answers with
// the resting position to animate to. Nothing here knows how it is drawn.

use serde::{Deserialize, Serialize};

use crate::error::MapViewError;
use crate::models::Appointment;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetConfig {
    pub viewport_height: f64,
    /// Visible height of the sheet while partially open.
    pub partial_height: f64,
    /// Distance from the top of the viewport when fully open.
    pub full_top: f64,
    pub distance_threshold: f64,
    pub velocity_threshold: f64,
    pub spring_stiffness: f64,
    pub spring_mass: f64,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            viewport_height: 800.0,
            partial_height: 400.0,
            full_top: 100.0,
            distance_threshold: 100.0,
            velocity_threshold: 500.0,
            spring_stiffness: 400.0,
            spring_mass: 1.0,
        }
    }
}

impl SheetConfig {
    pub fn with_viewport_height(self, viewport_height: f64) -> Self {
        Self {
            viewport_height,
            ..self
        }
    }

    /// Resting y (top edge of the sheet, from the top of the viewport).
    pub fn rest_y(&self, position: SheetPosition) -> f64 {
        match position {
            SheetPosition::Closed => self.viewport_height,
            SheetPosition::Partial => {
                (self.viewport_height - self.partial_height).max(self.full_top)
            }
            SheetPosition::Full => self.full_top,
        }
    }

    pub fn midpoint(&self) -> f64 {
        self.viewport_height / 2.0
    }

    pub fn spring(&self) -> SpringParams {
        SpringParams::critically_damped(self.spring_stiffness, self.spring_mass)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetMode {
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetPosition {
    Closed,
    Partial,
    Full,
}

impl From<SheetMode> for SheetPosition {
    fn from(mode: SheetMode) -> Self {
        match mode {
            SheetMode::Partial => SheetPosition::Partial,
            SheetMode::Full => SheetPosition::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
}

impl SpringParams {
    pub fn critically_damped(stiffness: f64, mass: f64) -> Self {
        Self {
            stiffness,
            damping: 2.0 * (stiffness * mass).sqrt(),
            mass,
        }
    }

    /// Time for a critically damped spring to come within 2% of its target.
    pub fn settle_ms(&self) -> u64 {
        let omega = (self.stiffness / self.mass).sqrt();
        if !omega.is_finite() || omega <= 0.0 {
            return 0;
        }
        // (1 + wt) e^{-wt} = 0.02 at wt ~= 5.834
        (5.834 / omega * 1000.0).round() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimationDirective {
    pub target: SheetPosition,
    pub target_y: f64,
    pub spring: SpringParams,
    pub settle_ms: u64,
}

/// Scroll metrics of the sheet's content pane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentScroll {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ContentScroll {
    pub fn at_top(&self) -> bool {
        self.scroll_top <= 0.0
    }

    pub fn at_bottom(&self) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height
    }
}

/// A finished drag. Offsets and velocities are positive downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragGesture {
    pub offset_y: f64,
    #[serde(default)]
    pub velocity_y: f64,
    pub release_y: f64,
    #[serde(default)]
    pub content: Option<ContentScroll>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DragOutcome {
    /// Sheet is closed; nothing to drag.
    Ignored,
    /// The content pane scrolled instead of the sheet moving.
    ConsumedByContent,
    SnappedBack { animation: AnimationDirective },
    Transitioned {
        from: SheetPosition,
        to: SheetPosition,
        animation: AnimationDirective,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavOutcome {
    NotOpen,
    AtBoundary,
    Moved { from: u32, to: u32 },
    /// The selection vanished from the list; the sheet was closed.
    ForcedClose { animation: Option<AnimationDirective> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetSection {
    Header,
    Actions,
    Note,
    Orders,
    DischargeSummary,
    Referrals,
    PatientHistoryLink,
}

impl SheetMode {
    pub fn sections(self) -> &'static [SheetSection] {
        use SheetSection::*;
        match self {
            SheetMode::Partial => &[Header, Actions, Note, Orders],
            SheetMode::Full => &[
                Header,
                Actions,
                Note,
                Orders,
                DischargeSummary,
                Referrals,
                PatientHistoryLink,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetContent {
    pub appointment: Appointment,
    pub mode: SheetMode,
    pub sections: Vec<SheetSection>,
    pub can_previous: bool,
    pub can_next: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetMachine {
    config: SheetConfig,
    mode: SheetMode,
    is_open: bool,
    selected: Option<u32>,
    in_flight: Option<AnimationDirective>,
}

impl SheetMachine {
    pub fn new(config: SheetConfig) -> Self {
        Self {
            config,
            mode: SheetMode::Partial,
            is_open: false,
            selected: None,
            in_flight: None,
        }
    }

    pub fn mode(&self) -> SheetMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub fn in_flight(&self) -> Option<&AnimationDirective> {
        self.in_flight.as_ref()
    }

    pub fn position(&self) -> SheetPosition {
        if self.is_open {
            self.mode.into()
        } else {
            SheetPosition::Closed
        }
    }

    fn animate_to(&mut self, target: SheetPosition) -> AnimationDirective {
        let spring = self.config.spring();
        let directive = AnimationDirective {
            target,
            target_y: self.config.rest_y(target),
            spring,
            settle_ms: spring.settle_ms(),
        };

        if let Some(prev) = self.in_flight.replace(directive) {
            if prev.target != target {
                tracing::debug!(from = ?prev.target, to = ?target, "redirecting in-flight sheet animation");
            }
        }
        directive
    }

    /// Open on `appointment_id`, or switch the selection if already open.
    /// A reopened sheet comes back in the mode it was closed in.
    pub fn open(&mut self, appointment_id: u32) -> Option<AnimationDirective> {
        self.selected = Some(appointment_id);

        if self.is_open {
            tracing::debug!(appointment_id, "sheet selection changed");
            return None;
        }

        self.is_open = true;
        tracing::debug!(appointment_id, mode = ?self.mode, "sheet opened");
        Some(self.animate_to(self.mode.into()))
    }

    /// Close immediately, dropping whatever target was in flight.
    pub fn close(&mut self) -> Option<AnimationDirective> {
        if !self.is_open {
            return None;
        }

        if let Some(pending) = self.in_flight.take() {
            tracing::debug!(cancelled = ?pending.target, "cancelling in-flight sheet animation");
        }
        self.is_open = false;
        tracing::debug!(retained_mode = ?self.mode, "sheet closed");
        Some(self.animate_to(SheetPosition::Closed))
    }

    pub fn animation_finished(&mut self) -> Option<AnimationDirective> {
        self.in_flight.take()
    }

    /// Whether a drag with this offset moves the sheet or scrolls its content.
    pub fn captures_drag(&self, offset_y: f64, content: Option<&ContentScroll>) -> bool {
        match (self.mode, content) {
            (SheetMode::Partial, _) | (SheetMode::Full, None) => true,
            (SheetMode::Full, Some(scroll)) => {
                (scroll.at_top() && offset_y > 0.0) || (scroll.at_bottom() && offset_y < 0.0)
            }
        }
    }

    pub fn release(&mut self, gesture: &DragGesture) -> DragOutcome {
        if !self.is_open {
            return DragOutcome::Ignored;
        }
        if !self.captures_drag(gesture.offset_y, gesture.content.as_ref()) {
            return DragOutcome::ConsumedByContent;
        }

        let d = self.config.distance_threshold;
        let v = self.config.velocity_threshold;
        let up = gesture.offset_y < -d || gesture.velocity_y < -v;
        let down = gesture.offset_y > d || gesture.velocity_y > v;

        let from = self.position();
        let to = match self.mode {
            SheetMode::Partial if up => SheetPosition::Full,
            SheetMode::Partial if down => SheetPosition::Closed,
            SheetMode::Full if down => {
                if gesture.release_y >= self.config.midpoint() {
                    SheetPosition::Closed
                } else {
                    SheetPosition::Partial
                }
            }
            _ => {
                let animation = self.animate_to(from);
                return DragOutcome::SnappedBack { animation };
            }
        };

        let animation = match to {
            SheetPosition::Closed => match self.close() {
                Some(a) => a,
                None => return DragOutcome::Ignored,
            },
            SheetPosition::Partial => {
                self.mode = SheetMode::Partial;
                self.animate_to(to)
            }
            SheetPosition::Full => {
                self.mode = SheetMode::Full;
                self.animate_to(to)
            }
        };

        tracing::debug!(?from, ?to, offset_y = gesture.offset_y, velocity_y = gesture.velocity_y, "sheet drag transition");
        DragOutcome::Transitioned { from, to, animation }
    }

    fn selected_index(&self, appointments: &[Appointment]) -> Result<Option<usize>, MapViewError> {
        let Some(id) = self.selected else {
            return Ok(None);
        };
        appointments
            .iter()
            .position(|a| a.id == id)
            .map(Some)
            .ok_or(MapViewError::MissingSelection(id))
    }

    pub fn can_previous(&self, appointments: &[Appointment]) -> bool {
        matches!(self.selected_index(appointments), Ok(Some(i)) if i > 0)
    }

    pub fn can_next(&self, appointments: &[Appointment]) -> bool {
        matches!(self.selected_index(appointments), Ok(Some(i)) if i + 1 < appointments.len())
    }

    pub fn previous(&mut self, appointments: &[Appointment]) -> NavOutcome {
        self.step(appointments, -1)
    }

    pub fn next(&mut self, appointments: &[Appointment]) -> NavOutcome {
        self.step(appointments, 1)
    }

    fn step(&mut self, appointments: &[Appointment], delta: isize) -> NavOutcome {
        if !self.is_open {
            return NavOutcome::NotOpen;
        }

        let index = match self.selected_index(appointments) {
            Ok(Some(i)) => i,
            Ok(None) => return NavOutcome::NotOpen,
            Err(err) => {
                tracing::warn!(error = %err, "sheet selection missing, closing");
                return NavOutcome::ForcedClose {
                    animation: self.close(),
                };
            }
        };

        let Some(target) = index
            .checked_add_signed(delta)
            .and_then(|i| appointments.get(i))
        else {
            return NavOutcome::AtBoundary;
        };

        let from = appointments[index].id;
        self.selected = Some(target.id);
        tracing::debug!(from, to = target.id, "sheet navigated");
        NavOutcome::Moved { from, to: target.id }
    }

    /// Appointment the open sheet shows. A selection that is no longer in the
    /// list force-closes the sheet.
    pub fn resolve<'a>(&mut self, appointments: &'a [Appointment]) -> Option<&'a Appointment> {
        if !self.is_open {
            return None;
        }

        match self.selected_index(appointments) {
            Ok(Some(i)) => Some(&appointments[i]),
            Ok(None) => {
                self.close();
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "sheet has no content, force closing");
                self.close();
                None
            }
        }
    }

    pub fn content(&mut self, appointments: &[Appointment]) -> Option<SheetContent> {
        let appointment = self.resolve(appointments)?.clone();
        Some(SheetContent {
            appointment,
            mode: self.mode,
            sections: self.mode.sections().to_vec(),
            can_previous: self.can_previous(appointments),
            can_next: self.can_next(appointments),
        })
    }
}
