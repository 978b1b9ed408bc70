use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingEventKind, ReminderChannel};
use crate::services::notifications::{self, Notice};
use crate::services::scheduling::hours_until;
use crate::state::AppState;

/// Furthest ahead a reminder window may reach.
const SCAN_HORIZON_HOURS: i64 = 7 * 24;

#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct ReminderReport {
    pub due: usize,
    pub emails_sent: usize,
    pub sms_sent: usize,
}

/// A booking is due once its start is within `reminder_hours` and still ahead.
pub fn is_reminder_due(booking: &Booking, now: NaiveDateTime) -> bool {
    if booking.status.is_terminal() {
        return false;
    }
    let Ok(start) = booking.starts_at() else {
        return false;
    };
    let hours = hours_until(now, start);
    hours > 0.0 && hours <= booking.reminders.reminder_hours as f64
}

/// Sends every due reminder on the channels not yet marked sent.
pub async fn send_due_reminders(state: &AppState) -> Result<ReminderReport, AppError> {
    let now = state.now();
    let horizon = now + Duration::hours(SCAN_HORIZON_HOURS);
    let candidates = {
        let conn = state.conn()?;
        queries::get_unreminded_bookings(&conn, &now, &horizon)?
    };
    let due: Vec<Booking> = candidates
        .into_iter()
        .filter(|b| is_reminder_due(b, now))
        .collect();

    let mut report = ReminderReport {
        due: due.len(),
        ..Default::default()
    };

    for booking in due {
        let (user, service_name) = {
            let conn = state.conn()?;
            let user = queries::get_user(&conn, &booking.user_id)?;
            let service_name = queries::get_service(&conn, &booking.service_id)?
                .map(|s| s.name)
                .unwrap_or_else(|| "appointment".to_string());
            (user, service_name)
        };
        let Some(user) = user else {
            tracing::warn!(booking_id = %booking.id, "reminder skipped, owner missing");
            continue;
        };

        let rendered = notifications::render(
            Notice::Reminder,
            &booking,
            &user,
            &service_name,
            &state.config.clinic_name,
        );

        let mut marked_any = false;
        for channel in [ReminderChannel::Email, ReminderChannel::Sms] {
            let already_sent = match channel {
                ReminderChannel::Email => booking.reminders.email.sent,
                ReminderChannel::Sms => booking.reminders.sms.sent,
            };
            if already_sent || (channel == ReminderChannel::Email && !user.email_notifications) {
                continue;
            }
            if !notifications::deliver(state, channel, &user, &rendered).await {
                continue;
            }

            match channel {
                ReminderChannel::Email => report.emails_sent += 1,
                ReminderChannel::Sms => report.sms_sent += 1,
            }

            let marked = {
                let conn = state.conn()?;
                queries::mark_reminder_sent(&conn, &booking, channel, &now)?
            };
            if !marked {
                tracing::info!(
                    booking_id = %booking.id,
                    "booking moved while its reminder was sending, flags left for the new slot"
                );
                break;
            }
            marked_any = true;
        }

        if marked_any {
            state.publish(&booking, BookingEventKind::Reminded);
        }
    }

    if report.due > 0 {
        tracing::info!(
            due = report.due,
            emails = report.emails_sent,
            sms = report.sms_sent,
            "reminder scan finished"
        );
    }
    Ok(report)
}
