pub mod booking;
pub mod event;
pub mod pagination;
pub mod service;
pub mod user;

pub use booking::{
    Booking, BookingSource, BookingStatus, Cancellation, CheckIn, CheckOut, PaymentStatus,
    ReminderChannel, ReminderFlag, Reminders, Rescheduling,
};
pub use event::{BookingEvent, BookingEventKind};
pub use pagination::{PageQuery, Pagination};
pub use service::{RatingSummary, Review, Service, ServiceCategory, ServiceInput};
pub use user::{Role, User};
