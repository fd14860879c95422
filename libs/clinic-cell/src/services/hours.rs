// libs/clinic-cell/src/services/hours.rs
use chrono::{Duration, NaiveTime};
use tracing::debug;

use crate::error::ClinicError;
use crate::models::{OperatingHours, TimeWindow};

/// Check the invariants of an operating-hours configuration.
///
/// A window with only one bound is tolerated (it is simply closed), but a window whose
/// start is not before its end is rejected.
pub fn validate_operating_hours(hours: &OperatingHours) -> Result<(), ClinicError> {
    if hours.slot_duration_minutes <= 0 {
        return Err(ClinicError::InvalidConfiguration(format!(
            "slot duration must be positive, got {} minutes",
            hours.slot_duration_minutes
        )));
    }

    for (label, window) in [("morning", &hours.morning), ("evening", &hours.evening)] {
        if let Some((start, end)) = window.bounds() {
            if start >= end {
                return Err(ClinicError::InvalidConfiguration(format!(
                    "{} window start {} must be before end {}",
                    label, start, end
                )));
            }
        }
    }

    Ok(())
}

/// Lazily enumerate the bookable time points, morning window first, then evening.
pub fn slots(hours: &OperatingHours) -> Result<SlotIter, ClinicError> {
    validate_operating_hours(hours)?;

    let step = Duration::minutes(i64::from(hours.slot_duration_minutes));
    let windows = [hours.morning, hours.evening]
        .iter()
        .filter_map(TimeWindow::bounds)
        .collect::<Vec<_>>();

    Ok(SlotIter {
        windows,
        window_index: 0,
        next: None,
        step,
    })
}

/// Collected form of [`slots`]. Empty when the clinic has no configured window.
pub fn generate_slots(hours: &OperatingHours) -> Result<Vec<NaiveTime>, ClinicError> {
    let generated: Vec<NaiveTime> = slots(hours)?.collect();
    debug!(
        "Generated {} slots at {} minute granularity",
        generated.len(),
        hours.slot_duration_minutes
    );
    Ok(generated)
}

pub fn is_offered_slot(hours: &OperatingHours, time: NaiveTime) -> Result<bool, ClinicError> {
    Ok(slots(hours)?.any(|slot| slot == time))
}

/// Iterator over slot start times. A clone resumes from the same position.
#[derive(Debug, Clone)]
pub struct SlotIter {
    windows: Vec<(NaiveTime, NaiveTime)>,
    window_index: usize,
    next: Option<NaiveTime>,
    step: Duration,
}

impl Iterator for SlotIter {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        loop {
            let (start, end) = *self.windows.get(self.window_index)?;
            let candidate = self.next.unwrap_or(start);

            if candidate < end {
                // A step that wraps past midnight ends the window.
                let (following, wrapped) = candidate.overflowing_add_signed(self.step);
                self.next = if wrapped == 0 { Some(following) } else { Some(end) };
                return Some(candidate);
            }

            self.window_index += 1;
            self.next = None;
        }
    }
}
