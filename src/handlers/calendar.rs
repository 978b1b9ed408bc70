use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

// GET /calendar/:booking_id
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let (booking, service_name) = {
        let conn = state.conn()?;
        let booking = queries::get_booking(&conn, booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        let service_name = queries::get_service(&conn, &booking.service_id)?
            .map(|s| s.name)
            .unwrap_or_else(|| "Appointment".to_string());
        (booking, service_name)
    };

    let ics = generate_ics(&booking, &service_name, &state.config.clinic_name)?;
    let disposition = format!("attachment; filename=\"booking-{booking_id}.ics\"");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        ics,
    )
        .into_response())
}
