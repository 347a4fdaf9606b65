use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

/// Local business-hours policy for meeting slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
    pub weekdays: Vec<Weekday>,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open_hour: 9,
            close_hour: 18,
            weekdays: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        }
    }
}

impl BusinessHours {
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        self.weekdays.contains(&date.weekday())
    }
}

/// Externally reported occupied range, half-open semantics on comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// A computed free meeting window offered to a lead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: i64,
    pub label: String,
}

impl CandidateSlot {
    fn from_window(start: NaiveDateTime, duration: Duration) -> Self {
        let end = start + duration;
        Self {
            start,
            end,
            duration_minutes: duration.num_minutes(),
            label: format!("{} às {}", start.format("%d/%m/%Y"), start.format("%H:%M")),
        }
    }

    pub fn overlaps(&self, busy: &BusyInterval) -> bool {
        self.start < busy.end && self.end > busy.start
    }
}

/// Computes the ordered free-slot list for a search horizon. Pure: busy
/// intervals are supplied by the caller, which fetched them from the
/// calendar collaborator for the same day range.
#[derive(Clone, Debug)]
pub struct AvailabilityEngine {
    hours: BusinessHours,
    grid_step: Duration,
    max_slots: usize,
}

impl Default for AvailabilityEngine {
    fn default() -> Self {
        Self::new(BusinessHours::default(), 30, 10)
    }
}

impl AvailabilityEngine {
    pub fn new(hours: BusinessHours, grid_step_minutes: u32, max_slots: usize) -> Self {
        Self {
            hours,
            grid_step: Duration::minutes(i64::from(grid_step_minutes.max(1))),
            max_slots,
        }
    }

    /// Walks business days in `[first_day, first_day + horizon_days)` and
    /// emits grid-aligned slots of `duration` that clear every busy
    /// interval. Earliest first, capped. An empty result is a valid
    /// "no availability" outcome, not an error.
    pub fn free_slots(
        &self,
        first_day: NaiveDate,
        horizon_days: u32,
        duration: Duration,
        busy: &[BusyInterval],
    ) -> Vec<CandidateSlot> {
        let mut slots = Vec::new();
        if duration <= Duration::zero() {
            return slots;
        }

        for offset in 0..i64::from(horizon_days) {
            let Some(date) = first_day.checked_add_signed(Duration::days(offset)) else {
                break;
            };
            if !self.hours.is_business_day(date) {
                continue;
            }

            let Some(open) = date.and_hms_opt(self.hours.open_hour, 0, 0) else { continue };
            let Some(close) = date.and_hms_opt(self.hours.close_hour, 0, 0) else { continue };

            let mut cursor = open;
            while cursor + duration <= close {
                let slot = CandidateSlot::from_window(cursor, duration);
                if !busy.iter().any(|interval| slot.overlaps(interval)) {
                    slots.push(slot);
                    if slots.len() >= self.max_slots {
                        return slots;
                    }
                }
                cursor += self.grid_step;
            }
        }

        slots
    }
}
