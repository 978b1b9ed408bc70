use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::db::queries::{self, BookingFilter, DashboardStats, MonthlyActivity};
use crate::errors::AppError;
use crate::models::{Booking, PageQuery, Service, ServiceInput};
use crate::services::bookings::{self, StaffAction};
use crate::services::reminders::{self, ReminderReport};
use crate::state::AppState;

use super::bookings::{list_page, parse_status, BookingList, CancelRequest};
use super::{check_admin, staff_actor};

// GET /api/admin/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let now = state.now();
    let conn = state.conn()?;
    Ok(Json(queries::get_dashboard_stats(&conn, &now)?))
}

// GET /api/admin/activity
#[derive(Deserialize)]
pub struct ActivityQuery {
    pub months: Option<usize>,
}

pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<MonthlyActivity>>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let months = query.months.unwrap_or(6).clamp(1, 24);
    let now = state.now();
    let conn = state.conn()?;
    Ok(Json(queries::get_recent_monthly_activity(&conn, months, &now)?))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
    pub user_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<BookingList>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let filter = BookingFilter {
        user_id: query.user_id,
        status: parse_status(query.status.as_deref())?,
        date: query.date,
    };
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    Ok(Json(list_page(&state, &filter, page)?))
}

// GET /api/admin/bookings/today
pub async fn get_todays_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let today = state.now().date();
    let conn = state.conn()?;
    Ok(Json(queries::get_bookings_on_date(&conn, today, &[])?))
}

// POST /api/admin/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let actor = staff_actor(&state, &headers)?;
    let booking = bookings::apply_staff_action(&state, &id, &actor, StaffAction::Confirm)?;
    Ok(Json(booking))
}

#[derive(Deserialize, Default)]
pub struct CheckInRequest {
    pub notes: Option<String>,
}

// POST /api/admin/bookings/:id/check-in
pub async fn check_in_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Option<Json<CheckInRequest>>,
) -> Result<Json<Booking>, AppError> {
    let actor = staff_actor(&state, &headers)?;
    let notes = payload.and_then(|Json(p)| p.notes);
    let booking = bookings::apply_staff_action(
        &state,
        &id,
        &actor,
        StaffAction::CheckIn { notes },
    )?;
    Ok(Json(booking))
}

#[derive(Deserialize, Default)]
pub struct CompleteRequest {
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
}

// POST /api/admin/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Option<Json<CompleteRequest>>,
) -> Result<Json<Booking>, AppError> {
    let actor = staff_actor(&state, &headers)?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let booking = bookings::apply_staff_action(
        &state,
        &id,
        &actor,
        StaffAction::Complete {
            notes: payload.notes,
            rating: payload.rating,
            feedback: payload.feedback,
        },
    )?;
    Ok(Json(booking))
}

// POST /api/admin/bookings/:id/no-show
pub async fn no_show_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let actor = staff_actor(&state, &headers)?;
    let booking = bookings::apply_staff_action(&state, &id, &actor, StaffAction::NoShow)?;
    Ok(Json(booking))
}

// POST /api/admin/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<Booking>, AppError> {
    let actor = staff_actor(&state, &headers)?;
    let reason = payload.and_then(|Json(p)| p.reason);
    let booking = bookings::cancel_booking(&state, &id, &actor, reason).await?;
    Ok(Json(booking))
}

// POST /api/admin/services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<ServiceInput>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    check_admin(&headers, &state.config.admin_token)?;
    input.validate().map_err(AppError::Validation)?;

    let now = state.now();
    let service = Service {
        id: uuid::Uuid::new_v4().to_string(),
        name: input.name.trim().to_string(),
        description: input.description,
        short_description: input.short_description,
        category: input.category,
        duration_minutes: input.duration_minutes,
        price: input.price,
        preparation_minutes: input.preparation_minutes,
        cleanup_minutes: input.cleanup_minutes,
        booking_advance_notice_hours: input.booking_advance_notice_hours,
        is_active: input.is_active,
        is_popular: input.is_popular,
        is_featured: input.is_featured,
        display_order: input.display_order,
        rating: Default::default(),
        created_at: now,
        updated_at: now,
    };

    {
        let conn = state.conn()?;
        queries::insert_service(&conn, &service)?;
    }
    tracing::info!(service_id = %service.id, name = %service.name, "service created");
    Ok((StatusCode::CREATED, Json(service)))
}

// PUT /api/admin/services/:id
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<ServiceInput>,
) -> Result<Json<Service>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;
    input.validate().map_err(AppError::Validation)?;

    let conn = state.conn()?;
    let mut service = queries::get_service(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("service not found".to_string()))?;

    service.name = input.name.trim().to_string();
    service.description = input.description;
    service.short_description = input.short_description;
    service.category = input.category;
    service.duration_minutes = input.duration_minutes;
    service.price = input.price;
    service.preparation_minutes = input.preparation_minutes;
    service.cleanup_minutes = input.cleanup_minutes;
    service.booking_advance_notice_hours = input.booking_advance_notice_hours;
    service.is_active = input.is_active;
    service.is_popular = input.is_popular;
    service.is_featured = input.is_featured;
    service.display_order = input.display_order;
    service.updated_at = state.now();

    queries::update_service(&conn, &service)?;
    tracing::info!(service_id = %service.id, "service updated");
    Ok(Json(service))
}

// POST /api/admin/reminders/run
pub async fn run_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ReminderReport>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;
    Ok(Json(reminders::send_due_reminders(&state).await?))
}

// GET /api/admin/events (SSE)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource cannot set headers, so the token may also come as a query param.
    let query_ok = query
        .token
        .as_deref()
        .is_some_and(|t| !t.is_empty() && t == state.config.admin_token);
    if !query_ok {
        check_admin(&headers, &state.config.admin_token)?;
    }

    let live = BroadcastStream::new(state.events.subscribe()).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("booking_event")))
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "event stream subscriber lagged");
            None
        }
    });

    let keepalive = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok(Event::default().comment("keepalive")));

    Ok(Sse::new(live.merge(keepalive)))
}
