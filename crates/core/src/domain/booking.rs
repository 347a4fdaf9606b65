use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadId;

/// A confirmed meeting, created only after the external booking capability
/// returned a confirmation. At most one per (lead, start time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookedMeeting {
    /// Reference id issued by the external calendar.
    pub reference_id: String,
    pub lead_id: LeadId,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attendee_email: Option<String>,
    pub created_at: DateTime<Utc>,
}
