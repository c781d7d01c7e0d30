use serde::Serialize;
use sqlx::FromRow;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::error::BookingError;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

pub fn fmt_date(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

pub fn fmt_time(t: Time) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// One screening slot: the scope of seat uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Showing {
    pub theater: String,
    pub date: Date,
    pub time: Time,
}

impl Showing {
    pub fn parse(theater: &str, date: &str, time: &str) -> Result<Self, BookingError> {
        let theater = theater.trim();
        if theater.is_empty() {
            return Err(BookingError::Validation("theater is required".into()));
        }
        let date = Date::parse(date.trim(), DATE_FORMAT).map_err(|_| {
            BookingError::Validation(format!("invalid date {date:?}, expected YYYY-MM-DD"))
        })?;
        let time = Time::parse(time.trim(), TIME_FORMAT)
            .map_err(|_| BookingError::Validation(format!("invalid time {time:?}, expected HH:MM")))?;
        Ok(Self {
            theater: theater.to_string(),
            date,
            time,
        })
    }
}

/// Ticket row in the database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub movie: String,
    pub theater: String,
    pub seats: Vec<String>,
    pub show_date: Date,
    pub show_time: Time,
    pub price: i64,
    pub user_id: Uuid,
    pub qr_code: Option<String>, // base64 PNG
    pub qr_uuid: Option<String>,
    pub created_at: OffsetDateTime,
}

impl Ticket {
    /// Label used on the QR payload and in emails.
    pub fn title(&self) -> String {
        format!("{} @ {}", self.movie, self.theater)
    }
}

/// Validated booking ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub movie: String,
    pub showing: Showing,
    pub seats: Vec<String>,
    pub price: i64,
    pub user_id: Uuid,
}

/// Recipient details for the confirmation email.
#[derive(Debug, Clone)]
pub struct UserContact {
    pub name: String,
    pub email: String,
}

/// Ticket as returned to clients. The QR image is served separately.
#[derive(Debug, Serialize)]
pub struct TicketView {
    pub id: Uuid,
    pub movie: String,
    pub theater: String,
    pub seats: Vec<String>,
    pub date: String,
    pub time: String,
    pub price: i64,
    pub user_id: Uuid,
    pub has_qr: bool,
    pub qr_uuid: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Ticket> for TicketView {
    fn from(t: &Ticket) -> Self {
        Self {
            id: t.id,
            movie: t.movie.clone(),
            theater: t.theater.clone(),
            seats: t.seats.clone(),
            date: fmt_date(t.show_date),
            time: fmt_time(t.show_time),
            price: t.price,
            user_id: t.user_id,
            has_qr: t.qr_code.is_some(),
            qr_uuid: t.qr_uuid.clone(),
            created_at: t.created_at,
        }
    }
}
