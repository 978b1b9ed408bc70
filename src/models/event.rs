use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::BookingStatus;

/// Published on every booking change; relayed to the back-office event stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingEvent {
    pub booking_id: String,
    pub kind: BookingEventKind,
    pub status: BookingStatus,
    pub appointment: String,
    pub at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    Rescheduled,
    Updated,
    NoShow,
    Reminded,
}
