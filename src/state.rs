use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::{Booking, BookingEvent, BookingEventKind};
use crate::services::email::EmailProvider;
use crate::services::messaging::MessagingProvider;
use crate::services::refund::RefundPolicy;
use crate::services::scheduling::BookingRules;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub clock: Box<dyn Clock>,
    pub messaging: Box<dyn MessagingProvider>,
    pub email: Box<dyn EmailProvider>,
    pub refund_policy: RefundPolicy,
    pub events: broadcast::Sender<BookingEvent>,
}

impl AppState {
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database mutex poisoned")))
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn rules(&self) -> BookingRules {
        BookingRules::from_config(&self.config)
    }

    /// Fire-and-forget; having no subscribers is fine.
    pub fn publish(&self, booking: &Booking, kind: BookingEventKind) {
        let event = BookingEvent {
            booking_id: booking.id.clone(),
            kind,
            status: booking.status,
            appointment: format!("{} {}", booking.appointment_date, booking.appointment_time),
            at: self.now(),
        };
        let _ = self.events.send(event);
    }
}
