use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SLOT_DURATION_MINUTES: i32 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    pub id: String,
    pub name: String,
    pub operating_hours: OperatingHours,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One opening window of the day. A window with either bound missing is treated as closed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn closed() -> Self {
        Self::default()
    }

    pub fn bounds(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatingHours {
    #[serde(default)]
    pub morning: TimeWindow,
    #[serde(default)]
    pub evening: TimeWindow,
    #[serde(default = "default_slot_duration")]
    pub slot_duration_minutes: i32,
}

fn default_slot_duration() -> i32 {
    DEFAULT_SLOT_DURATION_MINUTES
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self {
            morning: TimeWindow::closed(),
            evening: TimeWindow::closed(),
            slot_duration_minutes: DEFAULT_SLOT_DURATION_MINUTES,
        }
    }
}

impl OperatingHours {
    /// Clinics with no configured window take bookings by phone only.
    pub fn is_phone_only(&self) -> bool {
        self.morning.bounds().is_none() && self.evening.bounds().is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertClinicRequest {
    pub name: String,
    #[serde(default)]
    pub operating_hours: OperatingHours,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotsResponse {
    pub clinic_id: String,
    pub slot_duration_minutes: i32,
    pub slots: Vec<NaiveTime>,
    pub phone_only: bool,
}
