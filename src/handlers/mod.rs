pub mod admin;
pub mod bookings;
pub mod calendar;
pub mod health;
pub mod services;
pub mod users;
pub mod webhook;

use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::services::lifecycle::Actor;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub fn check_admin(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    match bearer_token(headers) {
        Some(token) if !expected_token.is_empty() && token == expected_token => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

/// Resolves the caller from the `X-User-Id` header.
pub fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user_id = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let conn = state.conn()?;
    let user = queries::get_user(&conn, user_id)?;
    user.ok_or(AppError::Unauthorized)
}

/// The admin token wins; otherwise the caller must be a known user.
pub fn current_actor(state: &AppState, headers: &HeaderMap) -> Result<Actor, AppError> {
    if check_admin(headers, &state.config.admin_token).is_ok() {
        return Ok(Actor::back_office());
    }
    current_user(state, headers).map(|user| Actor::from_user(&user))
}

/// Staff users and the admin token may drive booking transitions.
pub fn staff_actor(state: &AppState, headers: &HeaderMap) -> Result<Actor, AppError> {
    let actor = current_actor(state, headers)?;
    if !actor.privileged {
        return Err(AppError::Forbidden("staff only".to_string()));
    }
    Ok(actor)
}
