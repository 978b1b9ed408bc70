use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub service_id: String,
    pub appointment_date: NaiveDate,
    /// Wall-clock start, always stored as zero-padded `HH:MM`.
    pub appointment_time: String,
    /// Minutes reserved on the calendar, snapshot of the service's total duration.
    pub duration_minutes: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
    pub client_notes: Option<String>,
    pub staff_notes: Option<String>,
    pub staff_member_id: Option<String>,
    pub invoice_number: String,
    pub source: BookingSource,
    pub is_first_time_client: bool,
    pub reminders: Reminders,
    pub check_in: Option<CheckIn>,
    pub check_out: Option<CheckOut>,
    pub cancellation: Option<Cancellation>,
    pub rescheduling: Option<Rescheduling>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 7] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
        BookingStatus::Rescheduled,
    ];

    /// Statuses that never hold a place on the calendar.
    pub const RELEASED: [BookingStatus; 2] = [BookingStatus::Cancelled, BookingStatus::NoShow];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in-progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no-show",
            BookingStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    pub fn holds_slot(&self) -> bool {
        !Self::RELEASED.contains(self)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Partial,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "partial" => Some(PaymentStatus::Partial),
            "refunded" => Some(PaymentStatus::Refunded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BookingSource {
    #[default]
    Website,
    Phone,
    WalkIn,
    Referral,
    SocialMedia,
    Admin,
}

impl BookingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingSource::Website => "website",
            BookingSource::Phone => "phone",
            BookingSource::WalkIn => "walk-in",
            BookingSource::Referral => "referral",
            BookingSource::SocialMedia => "social-media",
            BookingSource::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "website" => Some(BookingSource::Website),
            "phone" => Some(BookingSource::Phone),
            "walk-in" => Some(BookingSource::WalkIn),
            "referral" => Some(BookingSource::Referral),
            "social-media" => Some(BookingSource::SocialMedia),
            "admin" => Some(BookingSource::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderChannel {
    Email,
    Sms,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReminderFlag {
    pub sent: bool,
    pub sent_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminders {
    pub email: ReminderFlag,
    pub sms: ReminderFlag,
    /// How many hours before the appointment reminders go out.
    pub reminder_hours: i64,
}

pub const DEFAULT_REMINDER_HOURS: i64 = 24;

impl Default for Reminders {
    fn default() -> Self {
        Self {
            email: ReminderFlag::default(),
            sms: ReminderFlag::default(),
            reminder_hours: DEFAULT_REMINDER_HOURS,
        }
    }
}

impl Reminders {
    pub fn flag_mut(&mut self, channel: ReminderChannel) -> &mut ReminderFlag {
        match channel {
            ReminderChannel::Email => &mut self.email,
            ReminderChannel::Sms => &mut self.sms,
        }
    }

    pub fn reset(&mut self) {
        self.email = ReminderFlag::default();
        self.sms = ReminderFlag::default();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cancellation {
    pub reason: Option<String>,
    pub cancelled_at: NaiveDateTime,
    pub cancelled_by: String,
    pub refund_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rescheduling {
    pub original_date: NaiveDate,
    pub original_time: String,
    pub reason: Option<String>,
    pub rescheduled_at: NaiveDateTime,
    pub rescheduled_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckIn {
    pub time: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckOut {
    pub time: NaiveDateTime,
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
}
