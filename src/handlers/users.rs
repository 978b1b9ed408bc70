use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::services::messaging::normalize_phone;
use crate::state::AppState;

use super::current_user;

// POST /api/users
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    #[serde(default = "default_true")]
    pub sms_notifications: bool,
}

fn default_true() -> bool {
    true
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let first_name = payload.first_name.trim();
    let last_name = payload.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::Validation("first and last name are required".to_string()));
    }
    if first_name.chars().count() > 50 || last_name.chars().count() > 50 {
        return Err(AppError::Validation("names cannot exceed 50 characters".to_string()));
    }

    let email = payload.email.trim().to_lowercase();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }

    let phone = normalize_phone(&payload.phone)
        .ok_or_else(|| AppError::Validation("a valid phone number is required".to_string()))?;

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email,
        phone,
        role: Role::Client,
        email_notifications: payload.email_notifications,
        sms_notifications: payload.sms_notifications,
        created_at: state.now(),
    };

    {
        let conn = state.conn()?;
        if queries::get_user_by_email(&conn, &user.email)?.is_some() {
            return Err(AppError::Validation("email is already registered".to_string()));
        }
        queries::insert_user(&conn, &user)?;
    }

    tracing::info!(user_id = %user.id, "client registered");
    Ok((StatusCode::CREATED, Json(user)))
}

// PUT /api/users/me/preferences
#[derive(Deserialize)]
pub struct PreferencesRequest {
    pub email_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<PreferencesRequest>,
) -> Result<Json<User>, AppError> {
    let mut user = current_user(&state, &headers)?;
    if let Some(email) = payload.email_notifications {
        user.email_notifications = email;
    }
    if let Some(sms) = payload.sms_notifications {
        user.sms_notifications = sms;
    }

    {
        let conn = state.conn()?;
        queries::update_notification_preferences(
            &conn,
            &user.id,
            user.email_notifications,
            user.sms_notifications,
        )?;
    }

    tracing::info!(
        user_id = %user.id,
        email = user.email_notifications,
        sms = user.sms_notifications,
        "notification preferences updated"
    );
    Ok(Json(user))
}
