use std::env;

use chrono::{NaiveTime, Weekday};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub clinic_name: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from: String,
    pub invoice_prefix: String,
    pub business_hours: BusinessHours,
    pub booking_window_months: u32,
    pub reminder_scan_seconds: u64,
}

/// Opening hours used to generate candidate slots and to refuse closed days.
#[derive(Clone, Debug, PartialEq)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub slot_interval_minutes: u32,
    pub closed_days: Vec<Weekday>,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            slot_interval_minutes: 30,
            closed_days: vec![Weekday::Sun],
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = BusinessHours::default();
        let business_hours = BusinessHours {
            open: env::var("BUSINESS_OPEN")
                .ok()
                .and_then(|v| NaiveTime::parse_from_str(&v, "%H:%M").ok())
                .unwrap_or(defaults.open),
            close: env::var("BUSINESS_CLOSE")
                .ok()
                .and_then(|v| NaiveTime::parse_from_str(&v, "%H:%M").ok())
                .unwrap_or(defaults.close),
            slot_interval_minutes: env::var("SLOT_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m| *m > 0)
                .unwrap_or(defaults.slot_interval_minutes),
            closed_days: env::var("CLOSED_DAYS")
                .ok()
                .map(|v| parse_weekdays(&v))
                .unwrap_or(defaults.closed_days),
        };

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "clinicbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            clinic_name: env::var("CLINIC_NAME").unwrap_or_else(|_| "The Clinic".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM").unwrap_or_default(),
            invoice_prefix: env::var("INVOICE_PREFIX").unwrap_or_else(|_| "INV".to_string()),
            business_hours,
            booking_window_months: env::var("BOOKING_WINDOW_MONTHS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6),
            reminder_scan_seconds: env::var("REMINDER_SCAN_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900),
        }
    }
}

/// Parses a comma separated list such as `sat,sun`. Unknown names are skipped.
fn parse_weekdays(s: &str) -> Vec<Weekday> {
    s.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .filter_map(|d| match d.parse::<Weekday>() {
            Ok(day) => Some(day),
            Err(_) => {
                tracing::warn!(day = d, "ignoring unknown weekday in CLOSED_DAYS");
                None
            }
        })
        .collect()
}
