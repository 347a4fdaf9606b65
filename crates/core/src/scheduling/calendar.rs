use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduling::availability::BusyInterval;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar transport failure: {0}")]
    Transport(String),
    #[error("booking was not confirmed: {0}")]
    Unconfirmed(String),
    #[error("calendar is not configured")]
    Unconfigured,
}

/// Inclusive day range for busy-interval queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub title: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attendee_email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub event_id: String,
    pub meet_link: Option<String>,
}

/// External calendar capability. Both calls may suspend; callers bound them
/// with timeouts and treat failures as recoverable.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn busy_intervals(&self, range: DayRange) -> Result<Vec<BusyInterval>, CalendarError>;
    async fn book(&self, request: BookingRequest) -> Result<BookingConfirmation, CalendarError>;
}
