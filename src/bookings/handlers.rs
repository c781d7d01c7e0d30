use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{BookingRequest, BookingResponse, Pagination, TicketQrResponse};
use super::repo_types::TicketView;
use super::services::{self, BookingDeps};
use crate::{
    auth::{jwt::AuthUser, repo_types::Role},
    error::BookingError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

pub fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", post(create_ticket))
        .route("/tickets/user/:user_id", get(list_user_tickets))
        .route("/tickets/theater/:theater", get(list_theater_tickets))
        .route("/tickets/:id", get(get_ticket))
        .route("/tickets/:id/qr", get(get_ticket_qr))
}

#[instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<BookingRequest>,
) -> Result<(StatusCode, HeaderMap, Json<BookingResponse>), BookingError> {
    let new = services::validate(auth.id, body)?;
    let outcome = services::book_ticket(&BookingDeps::from_state(&state), new).await?;

    info!(
        ticket_id = %outcome.ticket.id,
        qr_status = ?outcome.qr_status,
        email_status = ?outcome.email_status,
        "booking completed"
    );

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/tickets/{}", outcome.ticket.id).parse() {
        headers.insert(header::LOCATION, location);
    }

    let (qr_code, qr_uuid) = match outcome.qr {
        Some(q) => (Some(q.image_base64), Some(q.code)),
        None => (None, None),
    };
    Ok((
        StatusCode::CREATED,
        headers,
        Json(BookingResponse {
            ticket: TicketView::from(&outcome.ticket),
            qr_code,
            qr_uuid,
            qr_status: outcome.qr_status,
            email_status: outcome.email_status,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_user_tickets(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<Vec<TicketView>>, BookingError> {
    if auth.id != user_id {
        return Err(BookingError::Forbidden("cannot list another user's tickets".into()));
    }
    let (limit, offset) = p.clamped();
    let tickets = state
        .tickets
        .list_by_user(user_id, limit, offset)
        .await
        .map_err(BookingError::Persistence)?;
    Ok(Json(tickets.iter().map(TicketView::from).collect()))
}

#[instrument(skip(state))]
pub async fn list_theater_tickets(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(theater): ApiPath<String>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<Vec<TicketView>>, BookingError> {
    auth.require_role(Role::CinemaOwner)?;
    let (limit, offset) = p.clamped();
    let tickets = state
        .tickets
        .list_by_theater(theater.trim(), limit, offset)
        .await
        .map_err(BookingError::Persistence)?;
    Ok(Json(tickets.iter().map(TicketView::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<TicketView>, BookingError> {
    let ticket = services::load_ticket(state.tickets.as_ref(), id).await?;
    services::ensure_can_view(&auth, &ticket)?;
    Ok(Json(TicketView::from(&ticket)))
}

#[instrument(skip(state))]
pub async fn get_ticket_qr(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<TicketQrResponse>, BookingError> {
    let ticket = services::load_ticket(state.tickets.as_ref(), id).await?;
    services::ensure_can_view(&auth, &ticket)?;
    let served = services::ticket_qr(state.tickets.as_ref(), state.qr.as_ref(), &ticket).await?;
    Ok(Json(TicketQrResponse {
        ticket_id: ticket.id,
        qr_code: served.qr.image_base64,
        qr_uuid: served.qr.code,
        cached: served.cached,
    }))
}
