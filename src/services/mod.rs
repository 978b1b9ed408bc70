pub mod bookings;
pub mod calendar;
pub mod email;
pub mod lifecycle;
pub mod messaging;
pub mod notifications;
pub mod refund;
pub mod reminders;
pub mod scheduling;
