use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::config::{AppConfig, BusinessHours};
use crate::errors::BookingError;
use crate::models::{Booking, Service};

/// Calendar rules applied on top of the per-service constraints.
#[derive(Debug, Clone)]
pub struct BookingRules {
    pub business_hours: BusinessHours,
    pub window_months: u32,
}

impl BookingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            business_hours: config.business_hours.clone(),
            window_months: config.booking_window_months,
        }
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            business_hours: BusinessHours::default(),
            window_months: 6,
        }
    }
}

/// Half-open `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    pub fn new(start: NaiveTime, duration_minutes: i64) -> Self {
        let start = i64::from(start.num_seconds_from_midnight() / 60);
        Self {
            start,
            end: start + duration_minutes,
        }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A slot that passed every creation guard.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSlot {
    pub starts_at: NaiveDateTime,
    /// Normalised `HH:MM`.
    pub time: String,
    pub duration_minutes: i64,
}

/// Accepts `H:MM` or `HH:MM` within 00:00–23:59.
pub fn parse_time(s: &str) -> Result<NaiveTime, BookingError> {
    let invalid = || BookingError::InvalidTime(s.to_string());

    let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(hour) || hour.len() > 2 || !all_digits(minute) || minute.len() != 2 {
        return Err(invalid());
    }

    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

pub fn hours_until(now: NaiveDateTime, at: NaiveDateTime) -> f64 {
    (at - now).num_seconds() as f64 / 3600.0
}

/// True iff no booking on `date` that still holds its slot, other than
/// `exclude_booking_id`, overlaps `[time, time + duration)`.
pub fn is_slot_available(
    existing: &[Booking],
    date: NaiveDate,
    time: &str,
    duration_minutes: i64,
    exclude_booking_id: Option<&str>,
) -> Result<bool, BookingError> {
    let candidate = Interval::new(parse_time(time)?, duration_minutes);

    let conflict = existing
        .iter()
        .filter(|b| b.appointment_date == date)
        .filter(|b| b.status.holds_slot())
        .filter(|b| Some(b.id.as_str()) != exclude_booking_id)
        .any(|b| match parse_time(&b.appointment_time) {
            Ok(start) => Interval::new(start, b.duration_minutes).overlaps(&candidate),
            Err(_) => {
                tracing::warn!(booking_id = %b.id, time = %b.appointment_time, "stored booking has unreadable time, treating as conflict");
                true
            }
        });

    Ok(!conflict)
}

/// Runs every guard a new booking must pass, in a fixed order: service,
/// time format, future start, open day, booking window, advance notice, and
/// finally the calendar over the service's total duration.
pub fn check_new_booking(
    service: Option<&Service>,
    date: NaiveDate,
    time: &str,
    existing: &[Booking],
    now: NaiveDateTime,
    rules: &BookingRules,
) -> Result<ValidatedSlot, BookingError> {
    let service = service
        .filter(|s| s.is_active)
        .ok_or(BookingError::ServiceUnavailable)?;

    let start = parse_time(time)?;
    let starts_at = date.and_time(start);
    if starts_at <= now {
        return Err(BookingError::PastAppointment);
    }

    if rules.business_hours.closed_days.contains(&date.weekday()) {
        return Err(BookingError::ClinicClosed {
            day: weekday_name(date.weekday()).to_string(),
        });
    }

    if let Some(limit) = now.checked_add_months(Months::new(rules.window_months)) {
        if starts_at > limit {
            return Err(BookingError::OutsideBookingWindow {
                months: rules.window_months,
            });
        }
    }

    if hours_until(now, starts_at) < service.booking_advance_notice_hours as f64 {
        return Err(BookingError::InsufficientNotice {
            required_hours: service.booking_advance_notice_hours,
        });
    }

    let time = format_time(start);
    let duration_minutes = service.total_duration();
    if !is_slot_available(existing, date, &time, duration_minutes, None)? {
        return Err(BookingError::SlotConflict);
    }

    Ok(ValidatedSlot {
        starts_at,
        time,
        duration_minutes,
    })
}

/// Candidate start times between opening and closing, one per interval step.
pub fn generate_slots(hours: &BusinessHours) -> Vec<NaiveTime> {
    let step = chrono::Duration::minutes(i64::from(hours.slot_interval_minutes.max(1)));
    let mut slots = Vec::new();
    let mut cursor = hours.open;
    while cursor < hours.close {
        slots.push(cursor);
        let (next, wrapped) = cursor.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        cursor = next;
    }
    slots
}

/// Start times on `date` where a `duration_minutes` appointment fits inside
/// business hours and clears every existing booking.
pub fn available_slots(
    existing: &[Booking],
    date: NaiveDate,
    duration_minutes: i64,
    now: NaiveDateTime,
    hours: &BusinessHours,
) -> Result<Vec<String>, BookingError> {
    if date < now.date() {
        return Err(BookingError::PastAppointment);
    }
    if hours.closed_days.contains(&date.weekday()) {
        return Ok(Vec::new());
    }

    let close = Interval::new(hours.close, 0).start;
    let mut slots = Vec::new();
    for start in generate_slots(hours) {
        if date.and_time(start) <= now {
            continue;
        }
        if Interval::new(start, duration_minutes).end > close {
            continue;
        }
        let time = format_time(start);
        if is_slot_available(existing, date, &time, duration_minutes, None)? {
            slots.push(time);
        }
    }
    Ok(slots)
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
