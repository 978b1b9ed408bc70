use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, BookingFilter};
use crate::errors::AppError;
use crate::models::{Booking, BookingSource, BookingStatus, PageQuery, Pagination};
use crate::services::bookings::{self, NewBooking};
use crate::services::lifecycle::{Actor, BookingUpdate};
use crate::state::AppState;

use super::{current_actor, current_user};

pub(crate) fn parse_status(raw: Option<&str>) -> Result<Option<BookingStatus>, AppError> {
    raw.map(|s| {
        BookingStatus::parse(s).ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))
    })
    .transpose()
}

#[derive(Serialize)]
pub struct BookingList {
    pub bookings: Vec<Booking>,
    pub pagination: Pagination,
}

pub(crate) fn list_page(
    state: &AppState,
    filter: &BookingFilter,
    page: PageQuery,
) -> Result<BookingList, AppError> {
    let (page, limit, offset) = page.resolve(10);
    let conn = state.conn()?;
    let bookings = queries::list_bookings(&conn, filter, limit, offset)?;
    let total = queries::count_bookings(&conn, filter)?;
    Ok(BookingList {
        bookings,
        pagination: Pagination::new(page, limit, total),
    })
}

// GET /api/bookings/available-slots
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub service_id: String,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub service_id: String,
    pub slots: Vec<String>,
}

pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let slots = bookings::available_slots(&state, &query.service_id, query.date)?;
    Ok(Json(SlotsResponse {
        date: query.date,
        service_id: query.service_id,
        slots,
    }))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub client_notes: Option<String>,
    #[serde(default)]
    pub source: BookingSource,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let user = current_user(&state, &headers)?;
    if payload
        .client_notes
        .as_ref()
        .is_some_and(|n| n.chars().count() > 500)
    {
        return Err(AppError::Validation("notes cannot exceed 500 characters".to_string()));
    }

    let booking = bookings::create_booking(
        &state,
        &user,
        NewBooking {
            service_id: payload.service_id,
            date: payload.appointment_date,
            time: payload.appointment_time,
            client_notes: payload.client_notes,
            source: payload.source,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/mine
#[derive(Deserialize)]
pub struct MineQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MineQuery>,
) -> Result<Json<BookingList>, AppError> {
    let user = current_user(&state, &headers)?;
    let filter = BookingFilter {
        user_id: Some(user.id),
        status: parse_status(query.status.as_deref())?,
        date: None,
    };
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    Ok(Json(list_page(&state, &filter, page)?))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let actor = current_actor(&state, &headers)?;
    let booking = {
        let conn = state.conn()?;
        queries::get_booking(&conn, &id)?
    };

    // Other clients' bookings look the same as missing ones.
    match booking {
        Some(b) if actor.privileged || b.user_id == actor.id => Ok(Json(b)),
        _ => Err(AppError::NotFound("booking not found".to_string())),
    }
}

// PUT /api/bookings/:id
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<BookingUpdate>,
) -> Result<Json<Booking>, AppError> {
    let actor = current_actor(&state, &headers)?;
    Ok(Json(bookings::update_booking(&state, &id, &actor, update)?))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<Booking>, AppError> {
    let actor = current_actor(&state, &headers)?;
    let reason = payload.and_then(|Json(p)| p.reason);
    let booking = bookings::cancel_booking(&state, &id, &actor, reason).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/reschedule
#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub reason: Option<String>,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<RescheduleRequest>,
) -> Result<Json<Booking>, AppError> {
    let actor: Actor = current_actor(&state, &headers)?;
    let booking = bookings::reschedule_booking(
        &state,
        &id,
        &actor,
        payload.appointment_date,
        &payload.appointment_time,
        payload.reason,
    )
    .await?;
    Ok(Json(booking))
}
