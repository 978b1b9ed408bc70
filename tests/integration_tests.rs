use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use clinicbook::clock::FixedClock;
use clinicbook::config::{AppConfig, BusinessHours};
use clinicbook::db::{self, queries};
use clinicbook::models::{
    Booking, BookingEventKind, BookingStatus, PaymentStatus, RatingSummary, Role, Service,
    ServiceCategory, User,
};
use clinicbook::services::email::EmailProvider;
use clinicbook::services::messaging::MessagingProvider;
use clinicbook::services::refund::RefundPolicy;
use clinicbook::state::AppState;

// ── Mock Providers ──

type Outbox = Arc<Mutex<Vec<(String, String)>>>;

struct MockMessaging {
    sent: Outbox,
}

#[async_trait]
impl MessagingProvider for MockMessaging {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

struct MockEmail {
    sent: Outbox,
}

#[async_trait]
impl EmailProvider for MockEmail {
    async fn send_email(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

// ── Helpers ──

const NOW: &str = "2025-03-01 09:00";
const ADMIN: &str = "Bearer test-token";

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        clinic_name: "Glow Clinic".to_string(),
        twilio_account_sid: "".to_string(),
        twilio_auth_token: "".to_string(), // empty = skip signature validation
        twilio_phone_number: "+15551234567".to_string(),
        smtp_host: "".to_string(),
        smtp_port: 587,
        smtp_username: "".to_string(),
        smtp_password: "".to_string(),
        email_from: "".to_string(),
        invoice_prefix: "GLW".to_string(),
        business_hours: BusinessHours::default(),
        booking_window_months: 6,
        reminder_scan_seconds: 900,
    }
}

fn client(id: &str, phone: &str) -> User {
    User {
        id: id.to_string(),
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: format!("{id}@example.com"),
        phone: phone.to_string(),
        role: Role::Client,
        email_notifications: true,
        sms_notifications: true,
        created_at: ts("2025-01-01 09:00"),
    }
}

fn staff(id: &str) -> User {
    User {
        role: Role::Staff,
        ..client(id, "+15550000099")
    }
}

/// 60-minute facial with 15 minutes of prep and cleanup: 90 minutes on the calendar.
fn facial() -> Service {
    Service {
        id: "svc-facial".to_string(),
        name: "Hydrating Facial".to_string(),
        description: "Deep hydration".to_string(),
        short_description: "Hydration".to_string(),
        category: ServiceCategory::FacialTreatments,
        duration_minutes: 60,
        price: Decimal::new(12000, 2),
        preparation_minutes: 15,
        cleanup_minutes: 15,
        booking_advance_notice_hours: 24,
        is_active: true,
        is_popular: true,
        is_featured: false,
        display_order: 1,
        rating: RatingSummary::default(),
        created_at: ts("2025-01-01 09:00"),
        updated_at: ts("2025-01-01 09:00"),
    }
}

struct Harness {
    state: Arc<AppState>,
    sms: Outbox,
    emails: Outbox,
}

impl Harness {
    fn new() -> Self {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_user(&conn, &client("u1", "+15550000001")).unwrap();
        queries::insert_user(&conn, &client("u2", "+15550000002")).unwrap();
        queries::insert_service(&conn, &facial()).unwrap();

        let sms = Arc::new(Mutex::new(vec![]));
        let emails = Arc::new(Mutex::new(vec![]));
        let (events, _) = broadcast::channel(16);
        let state = Arc::new(AppState {
            db: Arc::new(Mutex::new(conn)),
            config: test_config(),
            clock: Box::new(FixedClock::parse(NOW).unwrap()),
            messaging: Box::new(MockMessaging {
                sent: Arc::clone(&sms),
            }),
            email: Box::new(MockEmail {
                sent: Arc::clone(&emails),
            }),
            refund_policy: RefundPolicy::default(),
            events,
        });
        Self { state, sms, emails }
    }

    fn app(&self) -> Router {
        clinicbook::build_router(Arc::clone(&self.state))
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = self.app().oneshot(req).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn json(&self, req: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(req).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn book(&self, user_id: &str, date: &str, time: &str) -> (StatusCode, Value) {
        self.json(as_user(
            post_json(
                "/api/bookings",
                json!({
                    "service_id": "svc-facial",
                    "appointment_date": date,
                    "appointment_time": time,
                }),
            ),
            user_id,
        ))
        .await
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn as_user(mut req: Request<Body>, user_id: &str) -> Request<Body> {
    req.headers_mut()
        .insert("x-user-id", user_id.parse().unwrap());
    req
}

fn as_admin(mut req: Request<Body>) -> Request<Body> {
    req.headers_mut()
        .insert("authorization", ADMIN.parse().unwrap());
    req
}

fn sms_request(from: &str, body: &str) -> Request<Body> {
    let from = from.replace('+', "%2B");
    Request::builder()
        .method("POST")
        .uri("/webhook/sms")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "From={from}&To=%2B15551234567&Body={body}&MessageSid=SM_test"
        )))
        .unwrap()
}

fn booking_from(value: Value) -> Booking {
    serde_json::from_value(value).unwrap()
}

// ── Health & Registration ──

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let (status, body) = h.json(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_normalises_and_rejects_duplicates() {
    let h = Harness::new();
    let payload = json!({
        "first_name": "Marie",
        "last_name": "Curie",
        "email": "Marie@Example.com",
        "phone": "(555) 010-2000",
    });

    let (status, body) = h.json(post_json("/api/users", payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "marie@example.com");
    assert_eq!(body["phone"], "+15550102000");
    assert_eq!(body["role"], "client");

    let (status, _) = h.json(post_json("/api/users", payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_short_phone() {
    let h = Harness::new();
    let (status, body) = h
        .json(post_json(
            "/api/users",
            json!({
                "first_name": "Alan",
                "last_name": "Turing",
                "email": "alan@example.com",
                "phone": "1",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("phone"));
}

#[tokio::test]
async fn test_notification_preferences() {
    let h = Harness::new();

    let (status, _) = h
        .json(put_json("/api/users/me/preferences", json!({ "sms_notifications": false })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = h
        .json(as_user(
            put_json("/api/users/me/preferences", json!({ "sms_notifications": false })),
            "u1",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sms_notifications"], false);
    assert_eq!(body["email_notifications"], true);

    let (status, _) = h.book("u1", "2025-03-10", "10:00").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(h.sms.lock().unwrap().is_empty());
    assert_eq!(h.emails.lock().unwrap().len(), 1);
}

// ── Catalog ──

#[tokio::test]
async fn test_list_services_and_categories() {
    let h = Harness::new();

    let (status, body) = h.json(get("/api/services?popular=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total_items"], 1);

    let (_, body) = h.json(get("/api/services?category=chemical-peels")).await;
    assert!(body["services"].as_array().unwrap().is_empty());

    let (_, body) = h.json(get("/api/services/categories")).await;
    let categories = body.as_array().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["id"], "facial-treatments");
    assert_eq!(categories[0]["name"], "Facial Treatments");
    assert_eq!(categories[0]["count"], 1);

    let (status, _) = h.json(get("/api/services/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Booking Creation ──

#[tokio::test]
async fn test_create_booking_then_conflict() {
    let h = Harness::new();
    let mut events = h.state.events.subscribe();

    let (status, body) = h.book("u1", "2025-03-10", "10:00").await;
    assert_eq!(status, StatusCode::CREATED);
    let booking = booking_from(body);
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.duration_minutes, 90);
    assert_eq!(booking.invoice_number, "GLW-202503-0001");
    assert!(booking.is_first_time_client);

    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, BookingEventKind::Created);
    assert_eq!(event.booking_id, booking.id);

    // Confirmation went out on both channels.
    assert_eq!(h.emails.lock().unwrap().len(), 1);
    assert_eq!(h.sms.lock().unwrap()[0].0, "+15550000001");

    let (status, body) = h.book("u2", "2025-03-10", "11:00").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Selected time slot is not available");

    let (status, _) = h.book("u2", "2025-03-10", "11:30").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_booking_preconditions() {
    let h = Harness::new();

    // Less than 24 hours ahead.
    let (status, body) = h.book("u1", "2025-03-01", "15:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "This service requires at least 24 hours advance notice"
    );

    let (status, _) = h.book("u1", "2025-02-28", "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h.book("u1", "2025-03-10", "25:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h.book("u1", "2025-12-01", "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 2025-03-09 is a Sunday.
    let (status, body) = h.book("u1", "2025-03-09", "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "We are closed on Sunday");

    let (status, _) = h.book("nobody", "2025-03-10", "10:00").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_available_slots_skip_taken_time() {
    let h = Harness::new();
    h.book("u1", "2025-03-10", "10:00").await;

    let (status, body) = h
        .json(get(
            "/api/bookings/available-slots?date=2025-03-10&service_id=svc-facial",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let slots: Vec<String> = serde_json::from_value(body["slots"].clone()).unwrap();
    assert!(!slots.contains(&"09:00".to_string()));
    assert!(!slots.contains(&"11:00".to_string()));
    assert!(slots.contains(&"11:30".to_string()));
    assert_eq!(slots.last().map(String::as_str), Some("16:30"));
}

// ── Ownership ──

#[tokio::test]
async fn test_bookings_are_private_to_owner() {
    let h = Harness::new();
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .json(as_user(get(&format!("/api/bookings/{id}")), "u2"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .json(as_user(post_empty(&format!("/api/bookings/{id}/cancel")), "u2"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h
        .json(as_user(get(&format!("/api/bookings/{id}")), "u1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (_, body) = h.json(as_user(get("/api/bookings/mine"), "u1")).await;
    assert_eq!(body["pagination"]["total_items"], 1);
    let (_, body) = h.json(as_user(get("/api/bookings/mine"), "u2")).await;
    assert_eq!(body["pagination"]["total_items"], 0);
}

// ── Cancellation & Rescheduling ──

#[tokio::test]
async fn test_cancel_well_ahead_refunds_in_full() {
    let h = Harness::new();
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .json(as_user(
            post_json(
                &format!("/api/bookings/{id}/cancel"),
                json!({ "reason": "travelling" }),
            ),
            "u1",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let cancelled = booking_from(body);
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
    let cancellation = cancelled.cancellation.unwrap();
    assert_eq!(cancellation.refund_amount, Decimal::new(12000, 2));
    assert_eq!(cancellation.reason.as_deref(), Some("travelling"));

    let (status, _) = h
        .json(as_user(post_empty(&format!("/api/bookings/{id}/cancel")), "u1"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The slot is free again.
    let (status, _) = h.book("u2", "2025-03-10", "10:00").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_reschedule_moves_booking() {
    let h = Harness::new();
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let first = body["id"].as_str().unwrap().to_string();
    h.book("u2", "2025-03-11", "10:00").await;

    let (status, _) = h
        .json(as_user(
            post_json(
                &format!("/api/bookings/{first}/reschedule"),
                json!({ "appointment_date": "2025-03-11", "appointment_time": "10:30" }),
            ),
            "u1",
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = h
        .json(as_user(
            post_json(
                &format!("/api/bookings/{first}/reschedule"),
                json!({ "appointment_date": "2025-03-11", "appointment_time": "14:00" }),
            ),
            "u1",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let moved = booking_from(body);
    assert_eq!(moved.status, BookingStatus::Rescheduled);
    assert_eq!(moved.appointment_time, "14:00");
    let history = moved.rescheduling.unwrap();
    assert_eq!(history.original_time, "10:00");
}

// ── Admin ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let h = Harness::new();

    let (status, _) = h.json(get("/api/admin/status")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = get("/api/admin/status");
    req.headers_mut()
        .insert("authorization", "Bearer wrong-token".parse().unwrap());
    let (status, _) = h.json(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_status_and_activity() {
    let h = Harness::new();
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();
    h.book("u2", "2025-03-12", "10:00").await;
    h.json(as_admin(post_empty(&format!("/api/admin/bookings/{id}/cancel"))))
        .await;

    let (status, body) = h.json(as_admin(get("/api/admin/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upcoming_bookings"], 1);
    assert_eq!(body["pending_bookings"], 1);
    assert_eq!(body["active_services"], 1);
    assert_eq!(body["total_clients"], 2);

    let (_, body) = h.json(as_admin(get("/api/admin/activity?months=3"))).await;
    let months = body.as_array().unwrap();
    assert_eq!(months.len(), 3);
    assert_eq!(months[2]["month"], "2025-03");
    assert_eq!(months[2]["bookings_created"], 2);
    assert_eq!(months[2]["bookings_cancelled"], 1);

    let (_, body) = h
        .json(as_admin(get("/api/admin/bookings?status=cancelled")))
        .await;
    assert_eq!(body["pagination"]["total_items"], 1);
}

#[tokio::test]
async fn test_staff_flow_enables_review() {
    let h = Harness::new();
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();

    // Reviews need a completed visit.
    let (status, _) = h
        .json(as_user(
            post_json("/api/services/svc-facial/reviews", json!({ "rating": 5 })),
            "u1",
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Clients cannot drive staff transitions.
    let (status, _) = h
        .json(as_user(post_empty(&format!("/api/admin/bookings/{id}/confirm")), "u1"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h
        .json(as_admin(post_empty(&format!("/api/admin/bookings/{id}/confirm"))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (_, body) = h
        .json(as_admin(post_json(
            &format!("/api/admin/bookings/{id}/check-in"),
            json!({ "notes": "sensitive skin" }),
        )))
        .await;
    assert_eq!(body["status"], "in-progress");

    let (status, body) = h
        .json(as_admin(post_json(
            &format!("/api/admin/bookings/{id}/complete"),
            json!({ "rating": 5, "feedback": "lovely" }),
        )))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, _) = h
        .json(as_admin(post_empty(&format!("/api/admin/bookings/{id}/no-show"))))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = h
        .json(as_user(
            post_json(
                "/api/services/svc-facial/reviews",
                json!({ "rating": 4, "comment": "Very relaxing" }),
            ),
            "u1",
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["average"], 4.0);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_staff_user_drives_transitions() {
    let h = Harness::new();
    {
        let conn = h.state.conn().unwrap();
        queries::insert_user(&conn, &staff("s1")).unwrap();
    }
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .json(post_empty(&format!("/api/admin/bookings/{id}/confirm")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = h
        .json(as_user(post_empty(&format!("/api/admin/bookings/{id}/confirm")), "s1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, body) = h
        .json(as_user(
            post_json(
                &format!("/api/admin/bookings/{id}/cancel"),
                json!({ "reason": "therapist unwell" }),
            ),
            "s1",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let booking = booking_from(body);
    let cancellation = booking.cancellation.unwrap();
    assert_eq!(cancellation.cancelled_by, "s1");
    assert_eq!(cancellation.reason.as_deref(), Some("therapist unwell"));
}

#[tokio::test]
async fn test_update_booking_details() {
    let h = Harness::new();
    {
        let conn = h.state.conn().unwrap();
        queries::insert_user(&conn, &staff("s1")).unwrap();
    }
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/bookings/{id}");

    // Staff-only fields are ignored for clients.
    let (status, body) = h
        .json(as_user(
            put_json(
                &uri,
                json!({ "client_notes": "allergic to lavender", "staff_member_id": "s9", "payment_status": "paid" }),
            ),
            "u1",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client_notes"], "allergic to lavender");
    assert!(body["staff_member_id"].is_null());
    assert_eq!(body["payment_status"], "pending");

    let (status, _) = h
        .json(as_user(put_json(&uri, json!({ "client_notes": "mine now" })), "u2"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h
        .json(as_user(
            put_json(
                &uri,
                json!({ "staff_member_id": "s1", "payment_status": "paid", "staff_notes": "prefers mornings" }),
            ),
            "s1",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let booking = booking_from(body);
    assert_eq!(booking.staff_member_id.as_deref(), Some("s1"));
    assert_eq!(booking.payment_status, PaymentStatus::Paid);
    assert_eq!(booking.client_notes.as_deref(), Some("allergic to lavender"));

    let (status, _) = h
        .json(as_user(post_empty(&format!("/api/bookings/{id}/cancel")), "u1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h
        .json(as_user(put_json(&uri, json!({ "client_notes": "too late" })), "u1"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_service_management() {
    let h = Harness::new();
    let payload = json!({
        "name": "Glycolic Peel",
        "category": "chemical-peels",
        "duration_minutes": 45,
        "price": 95.5,
    });

    let (status, body) = h
        .json(as_admin(post_json("/api/admin/services", payload.clone())))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["preparation_minutes"], 15);

    let mut invalid = payload.clone();
    invalid["duration_minutes"] = json!(5);
    let (status, _) = h
        .json(as_admin(post_json("/api/admin/services", invalid)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut hidden = payload;
    hidden["is_active"] = json!(false);
    let req = Request::builder()
        .method("PUT")
        .uri(format!("/api/admin/services/{id}"))
        .header("Content-Type", "application/json")
        .header("authorization", ADMIN)
        .body(Body::from(hidden.to_string()))
        .unwrap();
    let (status, _) = h.json(req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h.json(get(&format!("/api/services/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reminder_run_reports_nothing_due() {
    let h = Harness::new();
    h.book("u1", "2025-03-10", "10:00").await;

    let (status, body) = h
        .json(as_admin(post_empty("/api/admin/reminders/run")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["due"], 0);
}

#[tokio::test]
async fn test_reminder_run_sends_due_reminder_once() {
    let h = Harness::new();
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();
    {
        // Pull the appointment inside the 24-hour window.
        let conn = h.state.conn().unwrap();
        let mut booking = queries::get_booking(&conn, &id).unwrap().unwrap();
        booking.appointment_date = ts("2025-03-02 08:00").date();
        booking.appointment_time = "08:00".to_string();
        queries::update_booking(&conn, &booking).unwrap();
    }
    let texts_before = h.sms.lock().unwrap().len();

    let (status, body) = h
        .json(as_admin(post_empty("/api/admin/reminders/run")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["due"], 1);
    assert_eq!(body["emails_sent"], 1);
    assert_eq!(body["sms_sent"], 1);
    assert_eq!(h.sms.lock().unwrap().len(), texts_before + 1);

    let (_, body) = h
        .json(as_admin(post_empty("/api/admin/reminders/run")))
        .await;
    assert_eq!(body["due"], 0);
    assert_eq!(h.sms.lock().unwrap().len(), texts_before + 1);
}

// ── Calendar ──

#[tokio::test]
async fn test_calendar_download() {
    let h = Harness::new();
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();

    let res = h
        .app()
        .oneshot(get(&format!("/calendar/{id}.ics")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/calendar; charset=utf-8"
    );
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let ics = String::from_utf8(body.to_vec()).unwrap();
    assert!(ics.contains("BEGIN:VEVENT"));
    assert!(ics.contains("Hydrating Facial"));

    let (status, _) = h.send(get("/calendar/missing.ics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── SMS Webhook ──

#[tokio::test]
async fn test_sms_stop_disables_texts() {
    let h = Harness::new();

    let (status, body) = h.send(sms_request("+15550000001", "STOP")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("unsubscribed"));

    {
        let conn = h.state.db.lock().unwrap();
        let user = queries::get_user(&conn, "u1").unwrap().unwrap();
        assert!(!user.sms_notifications);
    }

    h.book("u1", "2025-03-10", "10:00").await;
    assert!(h.sms.lock().unwrap().is_empty());
    assert_eq!(h.emails.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sms_cancel_next_booking() {
    let h = Harness::new();
    let (_, body) = h.book("u1", "2025-03-10", "10:00").await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = h.send(sms_request("+15550000001", "cancel")).await;
    assert_eq!(status, StatusCode::OK);
    let reply = String::from_utf8(body).unwrap();
    assert!(reply.contains("has been cancelled"), "unexpected reply: {reply}");

    let conn = h.state.db.lock().unwrap();
    let booking = queries::get_booking(&conn, &id).unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_sms_cancel_without_booking() {
    let h = Harness::new();
    let (_, body) = h.send(sms_request("+15550000002", "CANCEL")).await;
    let reply = String::from_utf8(body).unwrap();
    assert!(reply.contains("find an upcoming appointment"));
}
