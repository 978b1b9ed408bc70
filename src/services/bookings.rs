use chrono::NaiveDate;
use rusqlite::TransactionBehavior;
use rust_decimal::Decimal;

use crate::db::queries::{self, ActivityCounter};
use crate::errors::{AppError, BookingError};
use crate::models::{
    Booking, BookingEventKind, BookingSource, BookingStatus, PaymentStatus, Reminders, User,
};
use crate::services::lifecycle::{Actor, BookingUpdate};
use crate::services::notifications::{self, Notice};
use crate::services::scheduling::{self, hours_until};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub service_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub client_notes: Option<String>,
    pub source: BookingSource,
}

/// Clinic-side transitions run from the back office.
#[derive(Debug, Clone)]
pub enum StaffAction {
    Confirm,
    CheckIn {
        notes: Option<String>,
    },
    Complete {
        notes: Option<String>,
        rating: Option<u8>,
        feedback: Option<String>,
    },
    NoShow,
}

/// What a notification needs once the connection has been released.
struct Party {
    user: Option<User>,
    service_name: String,
}

fn load_party(conn: &rusqlite::Connection, booking: &Booking) -> Result<Party, AppError> {
    let user = queries::get_user(conn, &booking.user_id)?;
    let service_name = queries::get_service(conn, &booking.service_id)?
        .map(|s| s.name)
        .unwrap_or_else(|| "appointment".to_string());
    Ok(Party { user, service_name })
}

async fn notify(state: &AppState, notice: Notice, booking: &Booking, party: &Party) {
    match &party.user {
        Some(user) => {
            notifications::send_booking_notice(state, notice, booking, user, &party.service_name).await
        }
        None => tracing::warn!(booking_id = %booking.id, "booking owner missing, notification skipped"),
    }
}

fn ensure_can_manage(booking: &Booking, actor: &Actor) -> Result<(), AppError> {
    if actor.privileged || booking.user_id == actor.id {
        Ok(())
    } else {
        Err(AppError::Forbidden("not your booking".to_string()))
    }
}

/// Validates and stores a new booking for `user`. The availability read and the
/// insert share one immediate transaction, so two requests for the same slot
/// cannot both succeed.
pub async fn create_booking(state: &AppState, user: &User, req: NewBooking) -> Result<Booking, AppError> {
    let now = state.now();
    let rules = state.rules();

    let (booking, service_name) = {
        let mut conn = state.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let service = queries::get_service(&tx, &req.service_id)?;
        let existing = queries::get_bookings_on_date(&tx, req.date, &BookingStatus::RELEASED)?;
        let slot = scheduling::check_new_booking(
            service.as_ref(),
            req.date,
            &req.time,
            &existing,
            now,
            &rules,
        )?;
        let service = service.ok_or(BookingError::ServiceUnavailable)?;

        let prior_visits = queries::count_prior_visits(&tx, &user.id)?;
        let invoice_number = queries::next_invoice_number(&tx, &state.config.invoice_prefix, &now)?;

        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            service_id: service.id.clone(),
            appointment_date: req.date,
            appointment_time: slot.time,
            duration_minutes: slot.duration_minutes,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount: service.price,
            deposit_amount: Decimal::ZERO,
            client_notes: req.client_notes,
            staff_notes: None,
            staff_member_id: None,
            invoice_number,
            source: req.source,
            is_first_time_client: prior_visits == 0,
            reminders: Reminders::default(),
            check_in: None,
            check_out: None,
            cancellation: None,
            rescheduling: None,
            created_at: now,
            updated_at: now,
        };

        queries::insert_booking(&tx, &booking)?;
        queries::increment_activity(&tx, ActivityCounter::Created, &now)?;
        tx.commit()?;

        (booking, service.name)
    };

    tracing::info!(
        booking_id = %booking.id,
        user_id = %user.id,
        date = %booking.appointment_date,
        time = %booking.appointment_time,
        invoice = %booking.invoice_number,
        "booking created"
    );
    state.publish(&booking, BookingEventKind::Created);
    notifications::send_booking_notice(state, Notice::Confirmation, &booking, user, &service_name).await;

    Ok(booking)
}

/// Cancels with the refund the policy grants for the notice given.
pub async fn cancel_booking(
    state: &AppState,
    booking_id: &str,
    actor: &Actor,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let now = state.now();

    let (booking, party) = {
        let mut conn = state.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut booking = queries::get_booking(&tx, booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        ensure_can_manage(&booking, actor)?;

        let hours = hours_until(now, booking.starts_at()?);
        let refund = state.refund_policy.refund_for(hours, booking.total_amount);
        booking.cancel(reason, actor, refund, now)?;

        queries::update_booking(&tx, &booking)?;
        queries::increment_activity(&tx, ActivityCounter::Cancelled, &now)?;
        let party = load_party(&tx, &booking)?;
        tx.commit()?;

        (booking, party)
    };

    tracing::info!(
        booking_id = %booking.id,
        cancelled_by = %actor.id,
        refund = %booking.cancellation.as_ref().map(|c| c.refund_amount).unwrap_or_default(),
        "booking cancelled"
    );
    state.publish(&booking, BookingEventKind::Cancelled);
    notify(state, Notice::Cancellation, &booking, &party).await;

    Ok(booking)
}

pub async fn reschedule_booking(
    state: &AppState,
    booking_id: &str,
    actor: &Actor,
    new_date: NaiveDate,
    new_time: &str,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let now = state.now();

    let (booking, party) = {
        let mut conn = state.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut booking = queries::get_booking(&tx, booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        ensure_can_manage(&booking, actor)?;

        let existing = queries::get_bookings_on_date(&tx, new_date, &BookingStatus::RELEASED)?;
        booking.reschedule(new_date, new_time, reason, actor, &existing, now)?;

        queries::update_booking(&tx, &booking)?;
        queries::increment_activity(&tx, ActivityCounter::Rescheduled, &now)?;
        let party = load_party(&tx, &booking)?;
        tx.commit()?;

        (booking, party)
    };

    tracing::info!(
        booking_id = %booking.id,
        rescheduled_by = %actor.id,
        date = %booking.appointment_date,
        time = %booking.appointment_time,
        "booking rescheduled"
    );
    state.publish(&booking, BookingEventKind::Rescheduled);
    notify(state, Notice::Rescheduled, &booking, &party).await;

    Ok(booking)
}

pub fn apply_staff_action(
    state: &AppState,
    booking_id: &str,
    actor: &Actor,
    action: StaffAction,
) -> Result<Booking, AppError> {
    if !actor.privileged {
        return Err(AppError::Forbidden("staff only".to_string()));
    }
    let now = state.now();

    let (booking, kind) = {
        let mut conn = state.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut booking = queries::get_booking(&tx, booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

        let kind = match action {
            StaffAction::Confirm => {
                booking.confirm(now)?;
                BookingEventKind::Confirmed
            }
            StaffAction::CheckIn { notes } => {
                booking.check_in(notes, now)?;
                BookingEventKind::CheckedIn
            }
            StaffAction::Complete {
                notes,
                rating,
                feedback,
            } => {
                booking.complete(notes, rating, feedback, now)?;
                queries::increment_activity(&tx, ActivityCounter::Completed, &now)?;
                BookingEventKind::Completed
            }
            StaffAction::NoShow => {
                booking.mark_no_show(now)?;
                BookingEventKind::NoShow
            }
        };

        queries::update_booking(&tx, &booking)?;
        tx.commit()?;
        (booking, kind)
    };

    tracing::info!(booking_id = %booking.id, status = %booking.status, actor = %actor.id, "booking updated");
    state.publish(&booking, kind);
    Ok(booking)
}

/// Edits notes, staff assignment and payment details of an open booking.
pub fn update_booking(
    state: &AppState,
    booking_id: &str,
    actor: &Actor,
    update: BookingUpdate,
) -> Result<Booking, AppError> {
    let now = state.now();

    let booking = {
        let conn = state.conn()?;
        let mut booking = queries::get_booking(&conn, booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        ensure_can_manage(&booking, actor)?;
        booking.update_details(update, actor, now)?;
        queries::update_booking(&conn, &booking)?;
        booking
    };

    tracing::info!(booking_id = %booking.id, actor = %actor.id, "booking details updated");
    state.publish(&booking, BookingEventKind::Updated);
    Ok(booking)
}

/// Handles an inbound `CANCEL` text: cancels the sender's next upcoming booking.
pub async fn cancel_next_for_phone(state: &AppState, phone: &str) -> Result<Option<Booking>, AppError> {
    let now = state.now();
    let next = {
        let conn = state.conn()?;
        let user = queries::get_user_by_phone(&conn, phone)?;
        let mut next = None;
        if let Some(user) = user {
            next = queries::next_upcoming_booking(&conn, &user.id, &now)?.map(|b| (user, b));
        }
        next
    };

    let Some((user, booking)) = next else {
        return Ok(None);
    };

    let actor = Actor::from_user(&user);
    let cancelled = cancel_booking(state, &booking.id, &actor, Some("Cancelled via SMS".to_string())).await?;
    Ok(Some(cancelled))
}

pub fn available_slots(state: &AppState, service_id: &str, date: NaiveDate) -> Result<Vec<String>, AppError> {
    let now = state.now();
    let conn = state.conn()?;
    let service = queries::get_service(&conn, service_id)?
        .filter(|s| s.is_active)
        .ok_or(BookingError::ServiceUnavailable)?;
    let existing = queries::get_bookings_on_date(&conn, date, &BookingStatus::RELEASED)?;

    let slots = scheduling::available_slots(
        &existing,
        date,
        service.total_duration(),
        now,
        &state.config.business_hours,
    )?;
    Ok(slots)
}
