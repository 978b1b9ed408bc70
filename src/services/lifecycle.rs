use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::BookingError;
use crate::models::{
    Booking, BookingStatus, Cancellation, CheckIn, CheckOut, PaymentStatus, Rescheduling, User,
};
use crate::services::scheduling::{format_time, is_slot_available, parse_time};

/// Whoever performs a transition. Recorded on the sub-records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    /// Staff and admins may run the clinic-side transitions.
    pub privileged: bool,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            privileged: user.role.is_staff(),
        }
    }

    /// The back-office token holder.
    pub fn back_office() -> Self {
        Self {
            id: "admin".to_string(),
            privileged: true,
        }
    }
}

/// Editable details of an open booking. Clients may only change their own
/// notes; the remaining fields are ignored unless the actor is privileged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingUpdate {
    pub client_notes: Option<String>,
    pub staff_notes: Option<String>,
    pub staff_member_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub deposit_amount: Option<Decimal>,
}

impl Booking {
    pub fn starts_at(&self) -> Result<NaiveDateTime, BookingError> {
        Ok(self.appointment_date.and_time(parse_time(&self.appointment_time)?))
    }

    fn ensure_from(&self, action: &'static str, allowed: &[BookingStatus]) -> Result<(), BookingError> {
        if self.status.is_terminal() || !allowed.contains(&self.status) {
            return Err(BookingError::InvalidTransition {
                action,
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), BookingError> {
        if self.status.is_terminal() {
            return Err(BookingError::InvalidTransition {
                action,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Records the cancellation with whatever refund the caller computed.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        actor: &Actor,
        refund_amount: Decimal,
        now: NaiveDateTime,
    ) -> Result<(), BookingError> {
        self.ensure_open("cancel")?;

        self.status = BookingStatus::Cancelled;
        self.cancellation = Some(Cancellation {
            reason,
            cancelled_at: now,
            cancelled_by: actor.id.clone(),
            refund_amount,
        });
        if refund_amount > Decimal::ZERO {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Moves the appointment. `existing` must hold the bookings on `new_date`;
    /// this booking is excluded from the conflict check. Nothing changes on error.
    pub fn reschedule(
        &mut self,
        new_date: NaiveDate,
        new_time: &str,
        reason: Option<String>,
        actor: &Actor,
        existing: &[Booking],
        now: NaiveDateTime,
    ) -> Result<(), BookingError> {
        self.ensure_open("reschedule")?;

        let start = parse_time(new_time)?;
        if new_date.and_time(start) <= now {
            return Err(BookingError::PastAppointment);
        }
        let new_time = format_time(start);
        if !is_slot_available(existing, new_date, &new_time, self.duration_minutes, Some(&self.id))? {
            return Err(BookingError::SlotConflict);
        }

        self.rescheduling = Some(Rescheduling {
            original_date: self.appointment_date,
            original_time: std::mem::replace(&mut self.appointment_time, new_time),
            reason,
            rescheduled_at: now,
            rescheduled_by: actor.id.clone(),
        });
        self.appointment_date = new_date;
        self.status = BookingStatus::Rescheduled;
        self.reminders.reset();
        self.updated_at = now;
        Ok(())
    }

    pub fn update_details(
        &mut self,
        update: BookingUpdate,
        actor: &Actor,
        now: NaiveDateTime,
    ) -> Result<(), BookingError> {
        self.ensure_open("update")?;

        if let Some(deposit) = update.deposit_amount.filter(|_| actor.privileged) {
            if deposit.is_sign_negative() || deposit > self.total_amount {
                return Err(BookingError::InvalidDeposit);
            }
            self.deposit_amount = deposit;
        }
        if update.client_notes.is_some() {
            self.client_notes = update.client_notes;
        }
        if actor.privileged {
            if update.staff_notes.is_some() {
                self.staff_notes = update.staff_notes;
            }
            if update.staff_member_id.is_some() {
                self.staff_member_id = update.staff_member_id;
            }
            if let Some(payment_status) = update.payment_status {
                self.payment_status = payment_status;
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn confirm(&mut self, now: NaiveDateTime) -> Result<(), BookingError> {
        self.ensure_from("confirm", &[BookingStatus::Pending, BookingStatus::Rescheduled])?;
        self.status = BookingStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    pub fn check_in(&mut self, notes: Option<String>, now: NaiveDateTime) -> Result<(), BookingError> {
        self.ensure_from(
            "check in",
            &[
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Rescheduled,
            ],
        )?;
        self.status = BookingStatus::InProgress;
        self.check_in = Some(CheckIn { time: now, notes });
        self.updated_at = now;
        Ok(())
    }

    /// Checks the client out. `rating` outside 1..=5 is dropped.
    pub fn complete(
        &mut self,
        notes: Option<String>,
        rating: Option<u8>,
        feedback: Option<String>,
        now: NaiveDateTime,
    ) -> Result<(), BookingError> {
        self.ensure_from("complete", &[BookingStatus::Confirmed, BookingStatus::InProgress])?;
        self.status = BookingStatus::Completed;
        self.check_out = Some(CheckOut {
            time: now,
            notes,
            rating: rating.filter(|r| (1..=5).contains(r)),
            feedback,
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_no_show(&mut self, now: NaiveDateTime) -> Result<(), BookingError> {
        self.ensure_from(
            "mark as no-show",
            &[
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Rescheduled,
            ],
        )?;
        self.status = BookingStatus::NoShow;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::refund::RefundPolicy;
    use crate::services::scheduling::hours_until;
    use crate::test_support::{date, dt, sample_booking};

    fn client() -> Actor {
        Actor {
            id: "u1".to_string(),
            privileged: false,
        }
    }

    fn staff() -> Actor {
        Actor {
            id: "s1".to_string(),
            privileged: true,
        }
    }

    #[test]
    fn test_client_update_only_touches_notes() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 90);
        let update = BookingUpdate {
            client_notes: Some("running late".to_string()),
            staff_member_id: Some("s9".to_string()),
            payment_status: Some(PaymentStatus::Paid),
            ..Default::default()
        };
        booking.update_details(update, &client(), dt("2025-03-05 10:00")).unwrap();

        assert_eq!(booking.client_notes.as_deref(), Some("running late"));
        assert_eq!(booking.staff_member_id, None);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_staff_update_assigns_and_records_deposit() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 90);
        let update = BookingUpdate {
            staff_member_id: Some("s1".to_string()),
            staff_notes: Some("sensitive skin".to_string()),
            payment_status: Some(PaymentStatus::Partial),
            deposit_amount: Some(Decimal::new(3000, 2)),
            ..Default::default()
        };
        booking.update_details(update, &staff(), dt("2025-03-05 10:00")).unwrap();

        assert_eq!(booking.staff_member_id.as_deref(), Some("s1"));
        assert_eq!(booking.staff_notes.as_deref(), Some("sensitive skin"));
        assert_eq!(booking.payment_status, PaymentStatus::Partial);
        assert_eq!(booking.deposit_amount, Decimal::new(3000, 2));
    }

    #[test]
    fn test_update_rejects_bad_deposit_and_closed_bookings() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 90);
        let too_much = BookingUpdate {
            deposit_amount: Some(Decimal::new(20000, 2)),
            ..Default::default()
        };
        assert_eq!(
            booking.update_details(too_much, &staff(), dt("2025-03-05 10:00")),
            Err(BookingError::InvalidDeposit)
        );

        booking.status = BookingStatus::Completed;
        let err = booking
            .update_details(BookingUpdate::default(), &staff(), dt("2025-03-05 10:00"))
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { action: "update", .. }));
    }

    #[test]
    fn test_cancel_records_refund() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 90);
        let now = dt("2025-03-09 04:00");
        let hours = hours_until(now, booking.starts_at().unwrap());
        assert_eq!(hours, 30.0);

        let refund = RefundPolicy::default().refund_for(hours, booking.total_amount);
        booking
            .cancel(Some("travel".to_string()), &client(), refund, now)
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.payment_status, PaymentStatus::Refunded);
        let cancellation = booking.cancellation.as_ref().unwrap();
        assert_eq!(cancellation.refund_amount, Decimal::new(10000, 2));
        assert_eq!(cancellation.cancelled_by, "u1");
        assert_eq!(cancellation.cancelled_at, now);
    }

    #[test]
    fn test_cancel_without_refund_keeps_payment_status() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 90);
        booking
            .cancel(None, &client(), Decimal::ZERO, dt("2025-03-10 08:00"))
            .unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_cancel_twice_is_rejected() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 90);
        let first = dt("2025-03-08 10:00");
        booking.cancel(None, &client(), Decimal::new(10000, 2), first).unwrap();

        let err = booking
            .cancel(None, &client(), Decimal::new(10000, 2), dt("2025-03-08 11:00"))
            .unwrap_err();
        assert_eq!(
            err,
            BookingError::InvalidTransition {
                action: "cancel",
                status: BookingStatus::Cancelled
            }
        );
        assert_eq!(booking.cancellation.as_ref().unwrap().cancelled_at, first);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let now = dt("2025-03-01 09:00");
        for status in [
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
        ] {
            let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
            booking.status = status;
            assert!(booking.cancel(None, &client(), Decimal::ZERO, now).is_err());
            assert!(booking
                .reschedule(date("2025-03-11"), "10:00", None, &client(), &[], now)
                .is_err());
            assert!(booking.confirm(now).is_err());
            assert!(booking.check_in(None, now).is_err());
            assert!(booking.complete(None, None, None, now).is_err());
            assert!(booking.mark_no_show(now).is_err());
            assert_eq!(booking.status, status);
        }
    }

    #[test]
    fn test_reschedule_records_original_and_resets_reminders() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        booking.reminders.email.sent = true;
        booking.reminders.sms.sent = true;
        let now = dt("2025-03-05 09:00");

        booking
            .reschedule(date("2025-03-12"), "9:30", Some("work".to_string()), &client(), &[], now)
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Rescheduled);
        assert_eq!(booking.appointment_date, date("2025-03-12"));
        assert_eq!(booking.appointment_time, "09:30");
        assert!(!booking.reminders.email.sent);
        assert!(!booking.reminders.sms.sent);
        let rescheduling = booking.rescheduling.unwrap();
        assert_eq!(rescheduling.original_date, date("2025-03-10"));
        assert_eq!(rescheduling.original_time, "10:00");
        assert_eq!(rescheduling.rescheduled_by, "u1");
    }

    #[test]
    fn test_reschedule_into_conflict_leaves_booking_untouched() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        let before = booking.clone();
        let existing = vec![sample_booking("b2", "2025-03-12", "10:00", 60)];

        let err = booking
            .reschedule(
                date("2025-03-12"),
                "10:30",
                None,
                &client(),
                &existing,
                dt("2025-03-05 09:00"),
            )
            .unwrap_err();

        assert_eq!(err, BookingError::SlotConflict);
        assert_eq!(booking.appointment_date, before.appointment_date);
        assert_eq!(booking.appointment_time, before.appointment_time);
        assert_eq!(booking.status, before.status);
        assert!(booking.rescheduling.is_none());
    }

    #[test]
    fn test_reschedule_within_own_slot() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        let existing = vec![booking.clone()];
        booking
            .reschedule(
                date("2025-03-10"),
                "10:30",
                None,
                &client(),
                &existing,
                dt("2025-03-05 09:00"),
            )
            .unwrap();
        assert_eq!(booking.appointment_time, "10:30");
    }

    #[test]
    fn test_reschedule_into_past() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        let err = booking
            .reschedule(date("2025-03-04"), "10:00", None, &client(), &[], dt("2025-03-05 09:00"))
            .unwrap_err();
        assert_eq!(err, BookingError::PastAppointment);
    }

    #[test]
    fn test_happy_path_through_checkout() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        booking.confirm(dt("2025-03-05 09:00")).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        booking
            .check_in(Some("arrived early".to_string()), dt("2025-03-10 09:55"))
            .unwrap();
        assert_eq!(booking.status, BookingStatus::InProgress);

        booking
            .complete(None, Some(9), Some("lovely".to_string()), dt("2025-03-10 11:00"))
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
        let check_out = booking.check_out.unwrap();
        assert_eq!(check_out.rating, None);
        assert_eq!(check_out.feedback.as_deref(), Some("lovely"));
    }

    #[test]
    fn test_rescheduled_booking_reenters_flow() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        booking.status = BookingStatus::Rescheduled;
        booking.confirm(dt("2025-03-05 09:00")).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_pending_cannot_complete() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        let err = booking.complete(None, None, None, dt("2025-03-10 11:00")).unwrap_err();
        assert_eq!(
            err,
            BookingError::InvalidTransition {
                action: "complete",
                status: BookingStatus::Pending
            }
        );
    }

    #[test]
    fn test_confirmed_cannot_be_confirmed_again() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        booking.confirm(dt("2025-03-05 09:00")).unwrap();
        assert!(booking.confirm(dt("2025-03-05 10:00")).is_err());
    }

    #[test]
    fn test_no_show_releases_slot() {
        let mut booking = sample_booking("b1", "2025-03-10", "10:00", 60);
        booking.mark_no_show(dt("2025-03-10 10:30")).unwrap();
        assert!(!booking.status.holds_slot());
    }
}
