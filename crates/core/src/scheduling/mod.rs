pub mod availability;
pub mod calendar;
pub mod clock;
pub mod snapshot;

pub use availability::{AvailabilityEngine, BusinessHours, BusyInterval, CandidateSlot};
pub use calendar::{BookingConfirmation, BookingRequest, CalendarClient, CalendarError, DayRange};
pub use clock::{Clock, FixedClock, SystemClock};
pub use snapshot::{SlotSnapshot, SNAPSHOT_CAP};
