use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::clock::FixedClock;
use crate::config::AppConfig;
use crate::db::{self, queries};
use crate::models::{
    Booking, BookingSource, BookingStatus, PaymentStatus, RatingSummary, Reminders, Role, Service,
    ServiceCategory, User,
};
use crate::services::email::{DisabledEmail, EmailProvider};
use crate::services::messaging::{DisabledMessaging, MessagingProvider};
use crate::services::refund::RefundPolicy;
use crate::state::AppState;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

pub fn sample_user(id: &str, phone: &str) -> User {
    User {
        id: id.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: format!("{id}@example.com"),
        phone: phone.to_string(),
        role: Role::Client,
        email_notifications: true,
        sms_notifications: true,
        created_at: dt("2025-01-01 09:00"),
    }
}

/// `svc-1`, priced at 100.00.
pub fn sample_service(duration: i64, prep: i64, cleanup: i64, notice_hours: i64) -> Service {
    Service {
        id: "svc-1".to_string(),
        name: "Signature Facial".to_string(),
        description: String::new(),
        short_description: String::new(),
        category: ServiceCategory::FacialTreatments,
        duration_minutes: duration,
        price: Decimal::new(10000, 2),
        preparation_minutes: prep,
        cleanup_minutes: cleanup,
        booking_advance_notice_hours: notice_hours,
        is_active: true,
        is_popular: false,
        is_featured: false,
        display_order: 0,
        rating: RatingSummary::default(),
        created_at: dt("2025-01-01 09:00"),
        updated_at: dt("2025-01-01 09:00"),
    }
}

/// Pending booking for `u1` on `svc-1`, totalling 100.00.
pub fn sample_booking(id: &str, day: &str, time: &str, duration: i64) -> Booking {
    Booking {
        id: id.to_string(),
        user_id: "u1".to_string(),
        service_id: "svc-1".to_string(),
        appointment_date: date(day),
        appointment_time: time.to_string(),
        duration_minutes: duration,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        total_amount: Decimal::new(10000, 2),
        deposit_amount: Decimal::ZERO,
        client_notes: None,
        staff_notes: None,
        staff_member_id: None,
        invoice_number: format!("TEST-{id}"),
        source: BookingSource::Website,
        is_first_time_client: false,
        reminders: Reminders::default(),
        check_in: None,
        check_out: None,
        cancellation: None,
        rescheduling: None,
        created_at: dt("2025-03-01 09:00"),
        updated_at: dt("2025-03-01 09:00"),
    }
}

/// In-memory database holding users `u1`, `u2` and service `svc-1` (60 + 15 + 15 minutes).
pub fn seeded_db() -> Arc<Mutex<Connection>> {
    let conn = db::init_db(":memory:").unwrap();
    queries::insert_user(&conn, &sample_user("u1", "+15550000001")).unwrap();
    queries::insert_user(&conn, &sample_user("u2", "+15550000002")).unwrap();
    queries::insert_service(&conn, &sample_service(60, 15, 15, 24)).unwrap();
    Arc::new(Mutex::new(conn))
}

pub fn state_with(
    db: Arc<Mutex<Connection>>,
    now: &str,
    messaging: Box<dyn MessagingProvider>,
    email: Box<dyn EmailProvider>,
) -> AppState {
    let (events, _) = broadcast::channel(16);
    AppState {
        db,
        config: AppConfig::from_env(),
        clock: Box::new(FixedClock(dt(now))),
        messaging,
        email,
        refund_policy: RefundPolicy::default(),
        events,
    }
}

pub fn state_at(now: &str) -> AppState {
    state_with(seeded_db(), now, Box::new(DisabledMessaging), Box::new(DisabledEmail))
}

pub type Outbox = Arc<Mutex<Vec<String>>>;

/// Records each recipient.
pub struct RecordingMessaging(pub Outbox);

#[async_trait]
impl MessagingProvider for RecordingMessaging {
    async fn send_message(&self, to: &str, _body: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(to.to_string());
        Ok(())
    }
}

/// Records each subject line.
pub struct RecordingEmail(pub Outbox);

#[async_trait]
impl EmailProvider for RecordingEmail {
    async fn send_email(&self, _to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

pub struct FailingEmail;

#[async_trait]
impl EmailProvider for FailingEmail {
    async fn send_email(&self, _to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
        anyhow::bail!("smtp relay refused connection")
    }
}
