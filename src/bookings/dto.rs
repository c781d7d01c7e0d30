use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::TicketView;
use super::services::StepStatus;

/// Body of `POST /tickets`. The owner comes from the access token.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub movie: String,
    pub theater: String,
    pub seats: Vec<String>,
    pub date: String,
    pub time: String,
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub ticket: TicketView,
    pub qr_code: Option<String>,
    pub qr_uuid: Option<String>,
    pub qr_status: StepStatus,
    pub email_status: StepStatus,
}

#[derive(Debug, Serialize)]
pub struct TicketQrResponse {
    pub ticket_id: Uuid,
    pub qr_code: String,
    pub qr_uuid: String,
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub const MAX_LIMIT: i64 = 100;

    /// Clamp to sane bounds before hitting the database.
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, Self::MAX_LIMIT), self.offset.max(0))
    }
}
