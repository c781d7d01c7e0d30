use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::seats::layout::SelectionError;

/// Failures of the booking and ticket surfaces.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("seats already booked: {}", seats.join(", "))]
    SeatConflict { seats: Vec<String> },

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("ticket {0} not found")]
    TicketNotFound(Uuid),

    #[error("{0}")]
    Forbidden(String),

    #[error("persistence error")]
    Persistence(#[source] anyhow::Error),

    #[error("external service error: {0}")]
    ExternalService(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seats: Option<Vec<String>>,
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::SeatConflict { .. } => StatusCode::CONFLICT,
            BookingError::UserNotFound(_) | BookingError::TicketNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BookingError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BookingError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::SeatConflict { .. } => "SEAT_CONFLICT",
            BookingError::UserNotFound(_) => "USER_NOT_FOUND",
            BookingError::TicketNotFound(_) => "TICKET_NOT_FOUND",
            BookingError::Forbidden(_) => "FORBIDDEN",
            BookingError::Persistence(_) => "PERSISTENCE_ERROR",
            BookingError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            BookingError::Persistence(e) => error!(error = ?e, "persistence error"),
            BookingError::ExternalService(msg) => warn!(message = %msg, "external service error"),
            other => warn!(code = other.code(), message = %other, "request rejected"),
        }
    }
}

impl From<SelectionError> for BookingError {
    fn from(e: SelectionError) -> Self {
        BookingError::Validation(e.to_string())
    }
}

impl From<JsonRejection> for BookingError {
    fn from(e: JsonRejection) -> Self {
        BookingError::Validation(e.body_text())
    }
}

impl From<QueryRejection> for BookingError {
    fn from(e: QueryRejection) -> Self {
        BookingError::Validation(e.body_text())
    }
}

impl From<PathRejection> for BookingError {
    fn from(e: PathRejection) -> Self {
        BookingError::Validation(e.body_text())
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        let code = self.code();

        // Storage details stay in the logs.
        let message = match &self {
            BookingError::Persistence(_) => "Booking could not be saved, please retry".to_string(),
            other => other.to_string(),
        };
        let seats = match self {
            BookingError::SeatConflict { seats } => Some(seats),
            _ => None,
        };

        (status, Json(ErrorBody { code, message, seats })).into_response()
    }
}

impl From<(StatusCode, String)> for BookingError {
    fn from((status, msg): (StatusCode, String)) -> Self {
        match status {
            StatusCode::FORBIDDEN => BookingError::Forbidden(msg),
            StatusCode::BAD_REQUEST => BookingError::Validation(msg),
            _ => BookingError::Persistence(anyhow::anyhow!(msg)),
        }
    }
}
