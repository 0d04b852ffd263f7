use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::booking;
use crate::error::{AppError, AppResult};
use crate::services::pricing::compute_duration;

/// A rental period with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookingWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BookingWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::BadRequest(
                "End date must be after start date".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// The window currently stored on a booking. The table's check
    /// constraint guarantees the ordering, so this does not re-validate.
    pub fn of(booking: &booking::Model) -> Self {
        Self {
            start: booking.start_date.with_timezone(&Utc),
            end: booking.end_date.with_timezone(&Utc),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Billable hours, rounded up, at least one.
    pub fn hours(&self) -> i64 {
        compute_duration(self.start, self.end)
    }

    /// Closed-interval overlap: windows that merely touch at an instant
    /// still collide.
    pub fn overlaps(&self, other_start: DateTime<Utc>, other_end: DateTime<Utc>) -> bool {
        other_start <= self.end && other_end >= self.start
    }
}
