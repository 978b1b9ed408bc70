pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/sms", post(handlers::webhook::sms_webhook))
        .route("/api/users", post(handlers::users::register))
        .route(
            "/api/users/me/preferences",
            put(handlers::users::update_preferences),
        )
        .route("/api/services", get(handlers::services::list_services))
        .route(
            "/api/services/categories",
            get(handlers::services::list_categories),
        )
        .route("/api/services/:id", get(handlers::services::get_service))
        .route(
            "/api/services/:id/reviews",
            post(handlers::services::add_review),
        )
        .route(
            "/api/bookings/available-slots",
            get(handlers::bookings::available_slots),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/mine", get(handlers::bookings::my_bookings))
        .route(
            "/api/bookings/:id",
            get(handlers::bookings::get_booking).put(handlers::bookings::update_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/reschedule",
            post(handlers::bookings::reschedule_booking),
        )
        .route(
            "/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route("/api/admin/activity", get(handlers::admin::get_activity))
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/bookings/today",
            get(handlers::admin::get_todays_bookings),
        )
        .route(
            "/api/admin/bookings/:id/confirm",
            post(handlers::admin::confirm_booking),
        )
        .route(
            "/api/admin/bookings/:id/check-in",
            post(handlers::admin::check_in_booking),
        )
        .route(
            "/api/admin/bookings/:id/complete",
            post(handlers::admin::complete_booking),
        )
        .route(
            "/api/admin/bookings/:id/no-show",
            post(handlers::admin::no_show_booking),
        )
        .route(
            "/api/admin/bookings/:id/cancel",
            post(handlers::admin::cancel_booking),
        )
        .route("/api/admin/services", post(handlers::admin::create_service))
        .route("/api/admin/services/:id", put(handlers::admin::update_service))
        .route(
            "/api/admin/reminders/run",
            post(handlers::admin::run_reminders),
        )
        .route("/api/admin/events", get(handlers::admin::events_stream))
        .with_state(state)
}
