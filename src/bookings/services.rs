use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::BookingRequest;
use super::repo::TicketStore;
use super::repo_types::{NewTicket, Showing, Ticket, UserContact};
use crate::auth::jwt::AuthUser;
use crate::auth::repo_types::Role;
use crate::error::BookingError;
use crate::notify::{Notifier, TicketEmail};
use crate::qr::{IssuedQr, QrIssuer, QrRequest};
use crate::seats::layout::parse_selection;
use crate::state::AppState;

/// Result of a best-effort step that runs after the ticket is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Ok,
    Failed,
    Skipped,
}

/// Collaborators of the booking flow.
pub struct BookingDeps<'a> {
    pub store: &'a dyn TicketStore,
    pub qr: &'a dyn QrIssuer,
    pub notifier: &'a dyn Notifier,
}

impl<'a> BookingDeps<'a> {
    pub fn from_state(state: &'a AppState) -> Self {
        Self {
            store: state.tickets.as_ref(),
            qr: state.qr.as_ref(),
            notifier: state.notifier.as_ref(),
        }
    }
}

#[derive(Debug)]
pub struct BookingOutcome {
    pub ticket: Ticket,
    pub qr: Option<IssuedQr>,
    pub qr_status: StepStatus,
    pub email_status: StepStatus,
}

/// Normalize and check a booking request.
pub fn validate(user_id: Uuid, req: BookingRequest) -> Result<NewTicket, BookingError> {
    let movie = req.movie.trim();
    if movie.is_empty() {
        return Err(BookingError::Validation("movie is required".into()));
    }
    let showing = Showing::parse(&req.theater, &req.date, &req.time)?;
    let seats = parse_selection(req.seats.as_slice())?;
    if req.price < 0 {
        return Err(BookingError::Validation("price must not be negative".into()));
    }
    Ok(NewTicket {
        movie: movie.to_string(),
        showing,
        seats: seats.iter().map(ToString::to_string).collect(),
        price: req.price,
        user_id,
    })
}

/// Book seats: guard, persist, then QR and email as best-effort steps.
///
/// Errors are only returned before the ticket is committed. Once persisted the
/// booking is reported as successful and the outcome records how the QR and
/// email steps went.
#[instrument(skip(deps, new), fields(user_id = %new.user_id, theater = %new.showing.theater))]
pub async fn book_ticket(
    deps: &BookingDeps<'_>,
    new: NewTicket,
) -> Result<BookingOutcome, BookingError> {
    let conflicts = deps
        .store
        .conflicting_seats(&new.showing, &new.seats)
        .await
        .map_err(BookingError::Persistence)?;
    if !conflicts.is_empty() {
        return Err(BookingError::SeatConflict { seats: conflicts });
    }

    let contact = deps
        .store
        .user_contact(new.user_id)
        .await
        .map_err(BookingError::Persistence)?
        .ok_or(BookingError::UserNotFound(new.user_id))?;

    let mut ticket = deps.store.insert_ticket(&new).await?;
    info!(ticket_id = %ticket.id, seats = ?ticket.seats, "ticket persisted");

    let qr = issue_qr(deps, &ticket).await;
    let qr_status = if qr.is_some() { StepStatus::Ok } else { StepStatus::Failed };
    if let Some(issued) = &qr {
        ticket.qr_code = Some(issued.image_base64.clone());
        ticket.qr_uuid = Some(issued.code.clone());
    }

    let email_status = send_confirmation(deps.notifier, &contact, &ticket).await;

    Ok(BookingOutcome {
        ticket,
        qr,
        qr_status,
        email_status,
    })
}

async fn issue_qr(deps: &BookingDeps<'_>, ticket: &Ticket) -> Option<IssuedQr> {
    let issued = match deps.qr.issue(&QrRequest::for_ticket(ticket)).await {
        Ok(q) => q,
        Err(e) => {
            warn!(ticket_id = %ticket.id, error = ?e, "qr issuance failed; continuing without qr");
            return None;
        }
    };
    // The image is still returned to the caller if it cannot be stored.
    if let Err(e) = deps
        .store
        .attach_qr(ticket.id, &issued.image_base64, &issued.code)
        .await
    {
        warn!(ticket_id = %ticket.id, error = ?e, "storing qr on ticket failed");
    }
    Some(issued)
}

async fn send_confirmation(
    notifier: &dyn Notifier,
    contact: &UserContact,
    ticket: &Ticket,
) -> StepStatus {
    if !notifier.is_enabled() {
        info!(ticket_id = %ticket.id, to = %contact.email, "mail transport not configured; confirmation skipped");
        return StepStatus::Skipped;
    }
    let email = TicketEmail {
        to: &contact.email,
        name: &contact.name,
        ticket,
        qr_base64: ticket.qr_code.as_deref(),
    };
    match notifier.send_ticket(&email).await {
        Ok(()) => StepStatus::Ok,
        Err(e) => {
            warn!(ticket_id = %ticket.id, error = ?e, "confirmation email failed");
            StepStatus::Failed
        }
    }
}

/// Owners see their own tickets; cinema owners see every ticket.
pub fn ensure_can_view(auth: &AuthUser, ticket: &Ticket) -> Result<(), BookingError> {
    if auth.id == ticket.user_id || auth.role == Role::CinemaOwner {
        return Ok(());
    }
    Err(BookingError::Forbidden("ticket belongs to another user".into()))
}

pub async fn load_ticket(store: &dyn TicketStore, ticket_id: Uuid) -> Result<Ticket, BookingError> {
    store
        .find_ticket(ticket_id)
        .await
        .map_err(BookingError::Persistence)?
        .ok_or(BookingError::TicketNotFound(ticket_id))
}

#[derive(Debug)]
pub struct TicketQr {
    pub qr: IssuedQr,
    pub cached: bool,
}

/// Serve the stored QR, generating and storing it on first request.
#[instrument(skip(store, issuer, ticket), fields(ticket_id = %ticket.id))]
pub async fn ticket_qr(
    store: &dyn TicketStore,
    issuer: &dyn QrIssuer,
    ticket: &Ticket,
) -> Result<TicketQr, BookingError> {
    if let (Some(image), Some(code)) = (&ticket.qr_code, &ticket.qr_uuid) {
        return Ok(TicketQr {
            qr: IssuedQr {
                image_base64: image.clone(),
                code: code.clone(),
            },
            cached: true,
        });
    }

    let issued = issuer
        .issue(&QrRequest::for_ticket(ticket))
        .await
        .map_err(|e| BookingError::ExternalService(format!("qr generation failed: {e:#}")))?;

    match store
        .attach_qr(ticket.id, &issued.image_base64, &issued.code)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            // Someone else attached a code first; serve that one.
            if let Ok(Some(stored)) = store.find_ticket(ticket.id).await {
                if let (Some(image_base64), Some(code)) = (stored.qr_code, stored.qr_uuid) {
                    return Ok(TicketQr {
                        qr: IssuedQr { image_base64, code },
                        cached: true,
                    });
                }
            }
        }
        Err(e) => warn!(error = ?e, "storing regenerated qr failed"),
    }
    info!("qr generated on demand");
    Ok(TicketQr {
        qr: issued,
        cached: false,
    })
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub available: bool,
    pub message: String,
    pub conflicts: Vec<String>,
}

pub async fn check_availability(
    store: &dyn TicketStore,
    showing: &Showing,
    seats: &[String],
) -> Result<Availability, BookingError> {
    let conflicts = store
        .conflicting_seats(showing, seats)
        .await
        .map_err(BookingError::Persistence)?;
    let available = conflicts.is_empty();
    let message = if available {
        "Seats are available".to_string()
    } else {
        format!("Seats already booked: {}", conflicts.join(", "))
    };
    Ok(Availability {
        available,
        message,
        conflicts,
    })
}
