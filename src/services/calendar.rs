use chrono::Duration;

use crate::errors::BookingError;
use crate::models::{Booking, BookingStatus};

const ICS_STAMP: &str = "%Y%m%dT%H%M%S";

/// Single-event iCalendar file for a booking. Cancelled bookings are emitted
/// with `STATUS:CANCELLED` so calendar clients drop the event.
pub fn generate_ics(
    booking: &Booking,
    service_name: &str,
    clinic_name: &str,
) -> Result<String, BookingError> {
    let start = booking.starts_at()?;
    let dtstart = start.format(ICS_STAMP).to_string();
    let dtend = (start + Duration::minutes(booking.duration_minutes))
        .format(ICS_STAMP)
        .to_string();
    let dtstamp = booking.updated_at.format(ICS_STAMP).to_string();
    let uid = format!("{}@clinicbook", booking.id);

    let summary = escape_text(&format!("{service_name} at {clinic_name}"));
    let description = escape_text(&format!(
        "Invoice {}. {}",
        booking.invoice_number,
        booking.client_notes.as_deref().unwrap_or("No additional notes")
    ));
    let status = match booking.status {
        BookingStatus::Cancelled | BookingStatus::NoShow => "CANCELLED",
        BookingStatus::Pending => "TENTATIVE",
        _ => "CONFIRMED",
    };

    Ok(format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Clinicbook//Appointments//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    ))
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
