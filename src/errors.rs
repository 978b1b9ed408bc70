use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;

/// Scheduling and lifecycle failures. Display strings are shown to clients verbatim.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("Service not found or not available")]
    ServiceUnavailable,

    #[error("Selected time slot is not available")]
    SlotConflict,

    #[error("This service requires at least {required_hours} hours advance notice")]
    InsufficientNotice { required_hours: i64 },

    #[error("Cannot {action} a booking that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: BookingStatus,
    },

    #[error("Appointment date must be in the future")]
    PastAppointment,

    #[error("Invalid appointment time '{0}': use HH:MM in 24-hour format")]
    InvalidTime(String),

    #[error("Cannot book appointments more than {months} months in advance")]
    OutsideBookingWindow { months: u32 },

    #[error("We are closed on {day}")]
    ClinicClosed { day: String },

    #[error("Deposit must be between zero and the booking total")]
    InvalidDeposit,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    Validation(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Booking(BookingError::ServiceUnavailable) => StatusCode::NOT_FOUND,
            AppError::Booking(BookingError::SlotConflict) => StatusCode::CONFLICT,
            AppError::Booking(BookingError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            AppError::Booking(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
