use rust_decimal::Decimal;

use crate::models::{Booking, ReminderChannel, User};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Confirmation,
    Cancellation,
    Rescheduled,
    Reminder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub subject: String,
    pub email_body: String,
    pub sms_body: String,
}

const SMS_FOOTER: &str = "Reply STOP to opt out.";

pub fn render(
    notice: Notice,
    booking: &Booking,
    user: &User,
    service_name: &str,
    clinic_name: &str,
) -> Rendered {
    let date = booking.appointment_date.format("%A, %B %-d, %Y");
    let time = &booking.appointment_time;

    let (subject, headline, sms) = match notice {
        Notice::Confirmation => (
            format!("Booking received: {service_name} on {date}"),
            format!(
                "Your {service_name} appointment is booked for {date} at {time}. Invoice {}.",
                booking.invoice_number
            ),
            format!(
                "{clinic_name}: Your {service_name} appointment is confirmed for {date} at {time}. We look forward to seeing you! {SMS_FOOTER}"
            ),
        ),
        Notice::Cancellation => {
            let refund = booking
                .cancellation
                .as_ref()
                .map(|c| c.refund_amount)
                .filter(|amount| *amount > Decimal::ZERO)
                .map(|amount| {
                    format!(" A refund of ${amount:.2} will be processed within 3-5 business days.")
                })
                .unwrap_or_default();
            (
                format!("Appointment cancelled: {service_name} on {date}"),
                format!("Your {service_name} appointment on {date} at {time} has been cancelled.{refund}"),
                format!(
                    "{clinic_name}: Your {service_name} appointment on {date} at {time} has been cancelled.{refund} We hope to see you again soon! {SMS_FOOTER}"
                ),
            )
        }
        Notice::Rescheduled => (
            format!("Appointment moved: {service_name} now on {date}"),
            format!("Your {service_name} appointment has been rescheduled to {date} at {time}."),
            format!(
                "{clinic_name}: Your {service_name} appointment has been rescheduled to {date} at {time}. Please save this new date and time. {SMS_FOOTER}"
            ),
        ),
        Notice::Reminder => (
            format!("Reminder: {service_name} on {date} at {time}"),
            format!(
                "This is a reminder of your {service_name} appointment on {date} at {time}. Please arrive 15 minutes early."
            ),
            format!(
                "{clinic_name} Reminder: You have a {service_name} appointment on {date} at {time}. Please arrive 15 minutes early. Reply CANCEL to cancel or STOP to opt out."
            ),
        ),
    };

    let email_body = format!(
        "Hi {},\n\n{headline}\n\nThank you,\n{clinic_name}\n",
        user.first_name
    );

    Rendered {
        subject,
        email_body,
        sms_body: sms,
    }
}

/// Sends one channel. Returns whether the message went out; failures are logged.
pub async fn deliver(
    state: &AppState,
    channel: ReminderChannel,
    user: &User,
    rendered: &Rendered,
) -> bool {
    match channel {
        ReminderChannel::Email => {
            if !state.email.is_enabled() {
                return false;
            }
            match state
                .email
                .send_email(&user.email, &rendered.subject, &rendered.email_body)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, user_id = %user.id, "failed to send email");
                    false
                }
            }
        }
        ReminderChannel::Sms => {
            if !user.sms_notifications || !state.messaging.is_enabled() {
                return false;
            }
            match state.messaging.send_message(&user.phone, &rendered.sms_body).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, user_id = %user.id, "failed to send SMS");
                    false
                }
            }
        }
    }
}

/// Best-effort fan-out after a booking change. Never fails the caller.
pub async fn send_booking_notice(
    state: &AppState,
    notice: Notice,
    booking: &Booking,
    user: &User,
    service_name: &str,
) {
    let rendered = render(notice, booking, user, service_name, &state.config.clinic_name);

    let emailed = (notice != Notice::Reminder || user.email_notifications)
        && deliver(state, ReminderChannel::Email, user, &rendered).await;
    let texted = deliver(state, ReminderChannel::Sms, user, &rendered).await;

    tracing::debug!(booking_id = %booking.id, ?notice, emailed, texted, "booking notice dispatched");
}
