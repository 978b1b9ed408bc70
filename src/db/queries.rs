use anyhow::Context;
use chrono::{Months, NaiveDate, NaiveDateTime};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    Booking, BookingSource, BookingStatus, PaymentStatus, RatingSummary, ReminderChannel,
    ReminderFlag, Reminders, Review, Role, Service, ServiceCategory, User,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("bad timestamp in database: {s}"))
}

fn parse_decimal(s: &str) -> anyhow::Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("bad amount in database: {s}"))
}

fn to_json<T: Serialize>(value: &Option<T>) -> anyhow::Result<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

fn from_json<T: DeserializeOwned>(value: Option<String>) -> anyhow::Result<Option<T>> {
    value
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(Into::into)
}

/// Appointment start as stored text, comparable with `fmt_start`.
const START_EXPR: &str = "(appointment_date || ' ' || appointment_time)";

fn fmt_start(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

// ── Users ──

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, phone, role, email_notifications, sms_notifications, created_at";

pub fn insert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, first_name, last_name, email, phone, role, email_notifications, sms_notifications, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id,
            user.first_name,
            user.last_name,
            user.email,
            user.phone,
            user.role.as_str(),
            user.email_notifications,
            user.sms_notifications,
            fmt_ts(&user.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let user = conn
        .query_row(&sql, params![id], |row| Ok(parse_user_row(row)))
        .optional()?;
    user.transpose()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE");
    let user = conn
        .query_row(&sql, params![email], |row| Ok(parse_user_row(row)))
        .optional()?;
    user.transpose()
}

pub fn get_user_by_phone(conn: &Connection, phone: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = ?1 ORDER BY created_at ASC LIMIT 1");
    let user = conn
        .query_row(&sql, params![phone], |row| Ok(parse_user_row(row)))
        .optional()?;
    user.transpose()
}

pub fn set_sms_notifications(conn: &Connection, user_id: &str, enabled: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET sms_notifications = ?1 WHERE id = ?2",
        params![enabled, user_id],
    )?;
    Ok(count > 0)
}

pub fn update_notification_preferences(
    conn: &Connection,
    user_id: &str,
    email: bool,
    sms: bool,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET email_notifications = ?1, sms_notifications = ?2 WHERE id = ?3",
        params![email, sms, user_id],
    )?;
    Ok(count > 0)
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let role: String = row.get(5)?;
    let created_at: String = row.get(8)?;

    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        role: Role::parse(&role).with_context(|| format!("unknown role in database: {role}"))?,
        email_notifications: row.get(6)?,
        sms_notifications: row.get(7)?,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Services ──

const SERVICE_COLUMNS: &str = "id, name, description, short_description, category, duration_minutes, price, \
     preparation_minutes, cleanup_minutes, booking_advance_notice_hours, is_active, is_popular, is_featured, \
     display_order, rating_average, rating_count, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct ServiceFilter {
    pub category: Option<ServiceCategory>,
    pub featured: Option<bool>,
    pub popular: Option<bool>,
    pub search: Option<String>,
    pub include_inactive: bool,
}

impl ServiceFilter {
    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<String> = vec![];
        let mut values: Vec<Box<dyn ToSql>> = vec![];

        if !self.include_inactive {
            clauses.push("is_active = 1".to_string());
        }
        if let Some(category) = self.category {
            values.push(Box::new(category.as_str()));
            clauses.push(format!("category = ?{}", values.len()));
        }
        if let Some(featured) = self.featured {
            values.push(Box::new(featured));
            clauses.push(format!("is_featured = ?{}", values.len()));
        }
        if let Some(popular) = self.popular {
            values.push(Box::new(popular));
            clauses.push(format!("is_popular = ?{}", values.len()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            values.push(Box::new(format!("%{search}%")));
            let n = values.len();
            clauses.push(format!("(name LIKE ?{n} OR description LIKE ?{n})"));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

pub fn insert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, description, short_description, category, duration_minutes, price,
            preparation_minutes, cleanup_minutes, booking_advance_notice_hours, is_active, is_popular, is_featured,
            display_order, rating_average, rating_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            service.id,
            service.name,
            service.description,
            service.short_description,
            service.category.as_str(),
            service.duration_minutes,
            service.price.to_string(),
            service.preparation_minutes,
            service.cleanup_minutes,
            service.booking_advance_notice_hours,
            service.is_active,
            service.is_popular,
            service.is_featured,
            service.display_order,
            service.rating.average,
            service.rating.count,
            fmt_ts(&service.created_at),
            fmt_ts(&service.updated_at),
        ],
    )?;
    Ok(())
}

/// Replaces the catalog fields of a service. Ratings are left alone.
pub fn update_service(conn: &Connection, service: &Service) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET name = ?1, description = ?2, short_description = ?3, category = ?4,
            duration_minutes = ?5, price = ?6, preparation_minutes = ?7, cleanup_minutes = ?8,
            booking_advance_notice_hours = ?9, is_active = ?10, is_popular = ?11, is_featured = ?12,
            display_order = ?13, updated_at = ?14
         WHERE id = ?15",
        params![
            service.name,
            service.description,
            service.short_description,
            service.category.as_str(),
            service.duration_minutes,
            service.price.to_string(),
            service.preparation_minutes,
            service.cleanup_minutes,
            service.booking_advance_notice_hours,
            service.is_active,
            service.is_popular,
            service.is_featured,
            service.display_order,
            fmt_ts(&service.updated_at),
            service.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1");
    let service = conn
        .query_row(&sql, params![id], |row| Ok(parse_service_row(row)))
        .optional()?;
    service.transpose()
}

pub fn list_services(
    conn: &Connection,
    filter: &ServiceFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Service>> {
    let (where_sql, mut values) = filter.where_clause();
    values.push(Box::new(limit));
    values.push(Box::new(offset));
    let sql = format!(
        "SELECT {SERVICE_COLUMNS} FROM services{where_sql}
         ORDER BY display_order ASC, name ASC LIMIT ?{} OFFSET ?{}",
        values.len() - 1,
        values.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

pub fn count_services(conn: &Connection, filter: &ServiceFilter) -> anyhow::Result<i64> {
    let (where_sql, values) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM services{where_sql}");
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let count = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
    Ok(count)
}

/// Number of active services per category, in catalog order.
pub fn category_counts(conn: &Connection) -> anyhow::Result<Vec<(ServiceCategory, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*) FROM services WHERE is_active = 1 GROUP BY category",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        let (category, count) = row?;
        match ServiceCategory::parse(&category) {
            Some(category) => counts.push((category, count)),
            None => tracing::warn!(category = %category, "skipping unknown service category"),
        }
    }
    counts.sort_by_key(|(category, _)| {
        ServiceCategory::ALL
            .iter()
            .position(|c| c == category)
            .unwrap_or(usize::MAX)
    });
    Ok(counts)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let category: String = row.get(4)?;
    let price: String = row.get(6)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;

    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        short_description: row.get(3)?,
        category: ServiceCategory::parse(&category)
            .with_context(|| format!("unknown service category in database: {category}"))?,
        duration_minutes: row.get(5)?,
        price: parse_decimal(&price)?,
        preparation_minutes: row.get(7)?,
        cleanup_minutes: row.get(8)?,
        booking_advance_notice_hours: row.get(9)?,
        is_active: row.get(10)?,
        is_popular: row.get(11)?,
        is_featured: row.get(12)?,
        display_order: row.get(13)?,
        rating: RatingSummary {
            average: row.get(14)?,
            count: row.get(15)?,
        },
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Reviews ──

/// Stores one review per client and service, then refreshes the service's rating summary.
pub fn upsert_review(conn: &Connection, review: &Review) -> anyhow::Result<RatingSummary> {
    conn.execute(
        "INSERT INTO reviews (service_id, user_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(service_id, user_id) DO UPDATE SET
           rating = excluded.rating,
           comment = excluded.comment,
           created_at = excluded.created_at",
        params![
            review.service_id,
            review.user_id,
            review.rating,
            review.comment,
            fmt_ts(&review.created_at),
        ],
    )?;

    let (average, count): (f64, i64) = conn.query_row(
        "SELECT COALESCE(AVG(rating), 0), COUNT(*) FROM reviews WHERE service_id = ?1",
        params![review.service_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let average = (average * 10.0).round() / 10.0;

    conn.execute(
        "UPDATE services SET rating_average = ?1, rating_count = ?2 WHERE id = ?3",
        params![average, count, review.service_id],
    )?;

    Ok(RatingSummary { average, count })
}

pub fn has_completed_booking(conn: &Connection, user_id: &str, service_id: &str) -> anyhow::Result<bool> {
    let found: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM bookings WHERE user_id = ?1 AND service_id = ?2 AND status = 'completed'",
        params![user_id, service_id],
        |row| row.get(0),
    )?;
    Ok(found)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, service_id, appointment_date, appointment_time, duration_minutes, \
     status, payment_status, total_amount, deposit_amount, client_notes, staff_notes, staff_member_id, \
     invoice_number, source, is_first_time_client, reminder_hours, email_reminder_sent, email_reminder_sent_at, \
     sms_reminder_sent, sms_reminder_sent_at, check_in, check_out, cancellation, rescheduling, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub user_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub date: Option<NaiveDate>,
}

impl BookingFilter {
    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<String> = vec![];
        let mut values: Vec<Box<dyn ToSql>> = vec![];

        if let Some(user_id) = &self.user_id {
            values.push(Box::new(user_id.clone()));
            clauses.push(format!("user_id = ?{}", values.len()));
        }
        if let Some(status) = self.status {
            values.push(Box::new(status.as_str()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(date) = self.date {
            values.push(Box::new(date.format(DATE_FORMAT).to_string()));
            clauses.push(format!("appointment_date = ?{}", values.len()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
                     ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)"
        ),
        params![
            booking.id,
            booking.user_id,
            booking.service_id,
            booking.appointment_date.format(DATE_FORMAT).to_string(),
            booking.appointment_time,
            booking.duration_minutes,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.total_amount.to_string(),
            booking.deposit_amount.to_string(),
            booking.client_notes,
            booking.staff_notes,
            booking.staff_member_id,
            booking.invoice_number,
            booking.source.as_str(),
            booking.is_first_time_client,
            booking.reminders.reminder_hours,
            booking.reminders.email.sent,
            booking.reminders.email.sent_at.as_ref().map(fmt_ts),
            booking.reminders.sms.sent,
            booking.reminders.sms.sent_at.as_ref().map(fmt_ts),
            to_json(&booking.check_in)?,
            to_json(&booking.check_out)?,
            to_json(&booking.cancellation)?,
            to_json(&booking.rescheduling)?,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

/// Writes back every mutable field of a booking after a lifecycle transition.
pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET appointment_date = ?1, appointment_time = ?2, status = ?3, payment_status = ?4,
            staff_notes = ?5, staff_member_id = ?6, email_reminder_sent = ?7, email_reminder_sent_at = ?8,
            sms_reminder_sent = ?9, sms_reminder_sent_at = ?10, check_in = ?11, check_out = ?12,
            cancellation = ?13, rescheduling = ?14, updated_at = ?15, client_notes = ?16,
            deposit_amount = ?17
         WHERE id = ?18",
        params![
            booking.appointment_date.format(DATE_FORMAT).to_string(),
            booking.appointment_time,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.staff_notes,
            booking.staff_member_id,
            booking.reminders.email.sent,
            booking.reminders.email.sent_at.as_ref().map(fmt_ts),
            booking.reminders.sms.sent,
            booking.reminders.sms.sent_at.as_ref().map(fmt_ts),
            to_json(&booking.check_in)?,
            to_json(&booking.check_out)?,
            to_json(&booking.cancellation)?,
            to_json(&booking.rescheduling)?,
            fmt_ts(&booking.updated_at),
            booking.client_notes,
            booking.deposit_amount.to_string(),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let booking = conn
        .query_row(&sql, params![id], |row| Ok(parse_booking_row(row)))
        .optional()?;
    booking.transpose()
}

/// Bookings on one calendar date whose status is not in `excluded`, earliest first.
pub fn get_bookings_on_date(
    conn: &Connection,
    date: NaiveDate,
    excluded: &[BookingStatus],
) -> anyhow::Result<Vec<Booking>> {
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(date.format(DATE_FORMAT).to_string())];
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE appointment_date = ?1");
    if !excluded.is_empty() {
        let placeholders: Vec<String> = excluded
            .iter()
            .map(|status| {
                values.push(Box::new(status.as_str()));
                format!("?{}", values.len())
            })
            .collect();
        sql.push_str(&format!(" AND status NOT IN ({})", placeholders.join(", ")));
    }
    sql.push_str(" ORDER BY appointment_time ASC");

    query_bookings(conn, &sql, &values)
}

pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (where_sql, mut values) = filter.where_clause();
    values.push(Box::new(limit));
    values.push(Box::new(offset));
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings{where_sql}
         ORDER BY appointment_date DESC, appointment_time DESC LIMIT ?{} OFFSET ?{}",
        values.len() - 1,
        values.len()
    );
    query_bookings(conn, &sql, &values)
}

pub fn count_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<i64> {
    let (where_sql, values) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM bookings{where_sql}");
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let count = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
    Ok(count)
}

/// The client's earliest booking that starts after `now` and can still change state.
pub fn next_upcoming_booking(
    conn: &Connection,
    user_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE user_id = ?1 AND {START_EXPR} > ?2
           AND status NOT IN ('completed', 'cancelled', 'no-show')
         ORDER BY appointment_date ASC, appointment_time ASC LIMIT 1"
    );
    let values: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string()), Box::new(fmt_start(now))];
    Ok(query_bookings(conn, &sql, &values)?.into_iter().next())
}

/// Non-terminal bookings between `from` (exclusive) and `until` (inclusive)
/// with at least one reminder channel still unsent.
pub fn get_unreminded_bookings(
    conn: &Connection,
    from: &NaiveDateTime,
    until: &NaiveDateTime,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE {START_EXPR} > ?1 AND {START_EXPR} <= ?2
           AND status NOT IN ('completed', 'cancelled', 'no-show')
           AND (email_reminder_sent = 0 OR sms_reminder_sent = 0)
         ORDER BY appointment_date ASC, appointment_time ASC"
    );
    let values: Vec<Box<dyn ToSql>> = vec![Box::new(fmt_start(from)), Box::new(fmt_start(until))];
    query_bookings(conn, &sql, &values)
}

/// Marks one reminder channel sent for the appointment `booking` was read at.
/// Returns false when the booking has since moved, leaving its fresh flags alone.
pub fn mark_reminder_sent(
    conn: &Connection,
    booking: &Booking,
    channel: ReminderChannel,
    at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let sql = match channel {
        ReminderChannel::Email => {
            "UPDATE bookings SET email_reminder_sent = 1, email_reminder_sent_at = ?1
             WHERE id = ?2 AND appointment_date = ?3 AND appointment_time = ?4"
        }
        ReminderChannel::Sms => {
            "UPDATE bookings SET sms_reminder_sent = 1, sms_reminder_sent_at = ?1
             WHERE id = ?2 AND appointment_date = ?3 AND appointment_time = ?4"
        }
    };
    let count = conn.execute(
        sql,
        params![
            fmt_ts(at),
            booking.id,
            booking.appointment_date.format(DATE_FORMAT).to_string(),
            booking.appointment_time,
        ],
    )?;
    Ok(count > 0)
}

/// Earlier confirmed or completed visits, used to flag first-time clients.
pub fn count_prior_visits(conn: &Connection, user_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE user_id = ?1 AND status IN ('confirmed', 'completed')",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Allocates the next invoice number for the month of `now`, e.g. `INV-202503-0007`.
pub fn next_invoice_number(conn: &Connection, prefix: &str, now: &NaiveDateTime) -> anyhow::Result<String> {
    let month = now.format("%Y%m").to_string();
    let value: i64 = conn.query_row(
        "INSERT INTO invoice_counters (month, last_value) VALUES (?1, 1)
         ON CONFLICT(month) DO UPDATE SET last_value = last_value + 1
         RETURNING last_value",
        params![month],
        |row| row.get(0),
    )?;
    Ok(format!("{prefix}-{month}-{value:04}"))
}

fn query_bookings(conn: &Connection, sql: &str, values: &[Box<dyn ToSql>]) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(sql)?;
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date: String = row.get(3)?;
    let status: String = row.get(6)?;
    let payment_status: String = row.get(7)?;
    let total_amount: String = row.get(8)?;
    let deposit_amount: String = row.get(9)?;
    let source: String = row.get(14)?;
    let email_sent_at: Option<String> = row.get(18)?;
    let sms_sent_at: Option<String> = row.get(20)?;
    let created_at: String = row.get(25)?;
    let updated_at: String = row.get(26)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_id: row.get(2)?,
        appointment_date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .with_context(|| format!("bad appointment date in database: {date}"))?,
        appointment_time: row.get(4)?,
        duration_minutes: row.get(5)?,
        status: BookingStatus::parse(&status)
            .with_context(|| format!("unknown booking status in database: {status}"))?,
        payment_status: PaymentStatus::parse(&payment_status)
            .with_context(|| format!("unknown payment status in database: {payment_status}"))?,
        total_amount: parse_decimal(&total_amount)?,
        deposit_amount: parse_decimal(&deposit_amount)?,
        client_notes: row.get(10)?,
        staff_notes: row.get(11)?,
        staff_member_id: row.get(12)?,
        invoice_number: row.get(13)?,
        source: BookingSource::parse(&source).unwrap_or_default(),
        is_first_time_client: row.get(15)?,
        reminders: Reminders {
            reminder_hours: row.get(16)?,
            email: ReminderFlag {
                sent: row.get(17)?,
                sent_at: email_sent_at.as_deref().map(parse_ts).transpose()?,
            },
            sms: ReminderFlag {
                sent: row.get(19)?,
                sent_at: sms_sent_at.as_deref().map(parse_ts).transpose()?,
            },
        },
        check_in: from_json(row.get(21)?)?,
        check_out: from_json(row.get(22)?)?,
        cancellation: from_json(row.get(23)?)?,
        rescheduling: from_json(row.get(24)?)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Monthly Activity ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityCounter {
    Created,
    Cancelled,
    Rescheduled,
    Completed,
}

impl ActivityCounter {
    fn column(&self) -> &'static str {
        match self {
            ActivityCounter::Created => "bookings_created",
            ActivityCounter::Cancelled => "bookings_cancelled",
            ActivityCounter::Rescheduled => "bookings_rescheduled",
            ActivityCounter::Completed => "bookings_completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyActivity {
    pub month: String,
    pub bookings_created: i64,
    pub bookings_cancelled: i64,
    pub bookings_rescheduled: i64,
    pub bookings_completed: i64,
}

pub fn increment_activity(conn: &Connection, counter: ActivityCounter, now: &NaiveDateTime) -> anyhow::Result<()> {
    let month = now.format("%Y-%m").to_string();
    let column = counter.column();
    conn.execute(
        &format!(
            "INSERT INTO monthly_activity (month, {column}) VALUES (?1, 1)
             ON CONFLICT(month) DO UPDATE SET {column} = {column} + 1"
        ),
        params![month],
    )?;
    Ok(())
}

/// The last `months` months up to and including the month of `now`, oldest first.
pub fn get_recent_monthly_activity(
    conn: &Connection,
    months: usize,
    now: &NaiveDateTime,
) -> anyhow::Result<Vec<MonthlyActivity>> {
    let mut result = Vec::with_capacity(months);

    for i in 0..months {
        let Some(date) = now.checked_sub_months(Months::new(i as u32)) else {
            break;
        };
        let month = date.format("%Y-%m").to_string();

        let activity = conn
            .query_row(
                "SELECT month, bookings_created, bookings_cancelled, bookings_rescheduled, bookings_completed
                 FROM monthly_activity WHERE month = ?1",
                params![month],
                |row| {
                    Ok(MonthlyActivity {
                        month: row.get(0)?,
                        bookings_created: row.get(1)?,
                        bookings_cancelled: row.get(2)?,
                        bookings_rescheduled: row.get(3)?,
                        bookings_completed: row.get(4)?,
                    })
                },
            )
            .optional()?;

        result.push(activity.unwrap_or(MonthlyActivity {
            month,
            bookings_created: 0,
            bookings_cancelled: 0,
            bookings_rescheduled: 0,
            bookings_completed: 0,
        }));
    }

    result.reverse();
    Ok(result)
}

// ── Dashboard ──

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub todays_bookings: i64,
    pub upcoming_bookings: i64,
    pub pending_bookings: i64,
    pub active_services: i64,
    pub total_clients: i64,
}

pub fn get_dashboard_stats(conn: &Connection, now: &NaiveDateTime) -> anyhow::Result<DashboardStats> {
    let today = now.format(DATE_FORMAT).to_string();

    let todays_bookings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE appointment_date = ?1 AND status NOT IN ('cancelled', 'no-show')",
        params![today],
        |row| row.get(0),
    )?;

    let upcoming_bookings: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM bookings WHERE {START_EXPR} > ?1
             AND status IN ('pending', 'confirmed', 'rescheduled')"
        ),
        params![fmt_start(now)],
        |row| row.get(0),
    )?;

    let pending_bookings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE status = 'pending'",
        [],
        |row| row.get(0),
    )?;

    let active_services: i64 = conn.query_row(
        "SELECT COUNT(*) FROM services WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;

    let total_clients: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'client'",
        [],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        todays_bookings,
        upcoming_bookings,
        pending_bookings,
        active_services,
        total_clients,
    })
}
