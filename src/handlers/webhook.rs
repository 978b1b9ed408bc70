use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::bookings;
use crate::services::messaging::normalize_phone;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TwilioWebhookForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

/// Keywords a client can text back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsCommand {
    Stop,
    Start,
    Help,
    Cancel,
    Other,
}

impl SmsCommand {
    pub fn parse(body: &str) -> Self {
        match body.trim().to_ascii_lowercase().as_str() {
            "stop" | "unsubscribe" | "stopall" | "end" | "quit" => SmsCommand::Stop,
            "start" | "unstop" | "subscribe" => SmsCommand::Start,
            "help" | "info" => SmsCommand::Help,
            "cancel" => SmsCommand::Cancel,
            _ => SmsCommand::Other,
        }
    }
}

fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &[(&str, &str)],
) -> bool {
    let mut data = url.to_string();
    let mut sorted_params = params.to_vec();
    sorted_params.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in &sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) else {
        return false;
    };
    mac.update(data.as_bytes());
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    expected == signature
}

// POST /webhook/sms
pub async fn sms_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<TwilioWebhookForm>,
) -> Response {
    let body = form.body.trim().to_string();

    // Signature check is skipped when no auth token is configured (local development).
    if !state.config.twilio_auth_token.is_empty() {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if signature.is_empty() {
            tracing::warn!("missing X-Twilio-Signature header");
            return (StatusCode::FORBIDDEN, "Missing signature").into_response();
        }

        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("https");
        let host = headers
            .get("x-forwarded-host")
            .or_else(|| headers.get("host"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let url = format!("{proto}://{host}/webhook/sms");

        let params = [
            ("From", form.from.as_str()),
            ("To", form.to.as_str()),
            ("Body", form.body.as_str()),
            ("MessageSid", form.message_sid.as_deref().unwrap_or("")),
        ];
        if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, &params) {
            tracing::warn!("invalid Twilio signature");
            return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    let Some(from) = normalize_phone(&form.from) else {
        tracing::warn!(from = %form.from, "inbound SMS with unusable sender");
        return twiml_response(None);
    };
    let command = SmsCommand::parse(&body);
    tracing::info!(from = %from, ?command, "incoming SMS");

    let clinic = &state.config.clinic_name;
    let reply = match command {
        SmsCommand::Stop | SmsCommand::Start => {
            let enabled = command == SmsCommand::Start;
            if let Err(e) = set_sms_preference(&state, &from, enabled) {
                tracing::error!(error = %e, from = %from, "failed to update SMS preference");
            }
            Some(if enabled {
                format!("You are subscribed to {clinic} SMS notifications again.")
            } else {
                format!("You have been unsubscribed from {clinic} SMS notifications.")
            })
        }
        SmsCommand::Help => Some(format!(
            "{clinic}: Reply CANCEL to cancel your next appointment or STOP to unsubscribe."
        )),
        SmsCommand::Cancel => Some(match bookings::cancel_next_for_phone(&state, &from).await {
            Ok(Some(booking)) => format!(
                "{clinic}: Your appointment on {} at {} has been cancelled.",
                booking.appointment_date.format("%b %-d"),
                booking.appointment_time
            ),
            Ok(None) => format!("{clinic}: We couldn't find an upcoming appointment to cancel."),
            Err(e) => {
                tracing::warn!(error = %e, from = %from, "SMS cancellation failed");
                format!("{clinic}: We couldn't cancel your appointment. Please call us.")
            }
        }),
        SmsCommand::Other => {
            tracing::info!(from = %from, body = %body, "SMS needs manual review");
            None
        }
    };

    twiml_response(reply.as_deref())
}

fn set_sms_preference(state: &AppState, phone: &str, enabled: bool) -> Result<(), AppError> {
    let conn = state.conn()?;
    match queries::get_user_by_phone(&conn, phone)? {
        Some(user) => {
            queries::set_sms_notifications(&conn, &user.id, enabled)?;
        }
        None => tracing::info!(phone, "SMS preference change for unknown number"),
    }
    Ok(())
}

fn twiml_response(message: Option<&str>) -> Response {
    let body = match message {
        Some(text) => format!("<Response><Message>{}</Message></Response>", xml_escape(text)),
        None => "<Response></Response>".to_string(),
    };
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
