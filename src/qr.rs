use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::bookings::repo_types::{fmt_date, fmt_time, Ticket};
use crate::config::QrConfig;

/// Payload for `POST /generate-qr` on the QR service.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QrRequest {
    pub movie: String,
    pub theater: String,
    pub seats: Vec<String>,
    pub date: String,
    pub time: String,
    pub price: String,
    pub ticket_id: String,
    pub user_id: String,
    pub timestamp: String,
    pub title: String,
}

impl QrRequest {
    pub fn for_ticket(ticket: &Ticket) -> Self {
        Self {
            movie: ticket.movie.clone(),
            theater: ticket.theater.clone(),
            seats: ticket.seats.clone(),
            date: fmt_date(ticket.show_date),
            time: fmt_time(ticket.show_time),
            price: ticket.price.to_string(),
            ticket_id: ticket.id.to_string(),
            user_id: ticket.user_id.to_string(),
            timestamp: ticket
                .created_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| ticket.created_at.unix_timestamp().to_string()),
            title: ticket.title(),
        }
    }
}

/// A QR image (base64 PNG) and the code the issuer embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedQr {
    pub image_base64: String,
    pub code: String,
}

#[async_trait]
pub trait QrIssuer: Send + Sync {
    async fn issue(&self, request: &QrRequest) -> anyhow::Result<IssuedQr>;
}

#[derive(Debug, Deserialize)]
struct GenerateQrResponse {
    qr_code: String,
    ticket_data: GeneratedTicketData,
}

#[derive(Debug, Deserialize)]
struct GeneratedTicketData {
    qr_uuid: Option<String>,
}

#[derive(Clone)]
pub struct HttpQrIssuer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpQrIssuer {
    pub fn new(cfg: &QrConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build qr http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/generate-qr", cfg.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl QrIssuer for HttpQrIssuer {
    async fn issue(&self, request: &QrRequest) -> anyhow::Result<IssuedQr> {
        let started = OffsetDateTime::now_utc();
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?
            .error_for_status()
            .context("qr service returned error status")?;

        let body: GenerateQrResponse = resp.json().await.context("decode qr response")?;
        if body.qr_code.is_empty() {
            anyhow::bail!("qr service returned an empty image");
        }
        let code = body
            .ticket_data
            .qr_uuid
            .filter(|c| !c.is_empty())
            .context("qr service response has no qr_uuid")?;

        tracing::debug!(
            ticket_id = %request.ticket_id,
            elapsed_ms = (OffsetDateTime::now_utc() - started).whole_milliseconds() as i64,
            "qr issued"
        );
        Ok(IssuedQr {
            image_base64: body.qr_code,
            code,
        })
    }
}
