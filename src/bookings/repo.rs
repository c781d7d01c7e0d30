use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::repo_types::{NewTicket, Showing, Ticket, UserContact};
use crate::error::BookingError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Ticket persistence. `ticket_seats` is the source of truth for occupancy.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn user_contact(&self, user_id: Uuid) -> anyhow::Result<Option<UserContact>>;

    /// Seats of `seats` already held by a ticket for the same showing.
    async fn conflicting_seats(
        &self,
        showing: &Showing,
        seats: &[String],
    ) -> anyhow::Result<Vec<String>>;

    async fn booked_seats(&self, showing: &Showing) -> anyhow::Result<Vec<String>>;

    /// Insert the ticket and claim its seats atomically.
    async fn insert_ticket(&self, new: &NewTicket) -> Result<Ticket, BookingError>;

    /// Store QR data on a ticket that has none yet. Returns whether a row changed.
    async fn attach_qr(&self, ticket_id: Uuid, qr_code: &str, qr_uuid: &str)
        -> anyhow::Result<bool>;

    async fn find_ticket(&self, ticket_id: Uuid) -> anyhow::Result<Option<Ticket>>;

    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64)
        -> anyhow::Result<Vec<Ticket>>;

    async fn list_by_theater(
        &self,
        theater: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Ticket>>;
}

#[derive(Clone)]
pub struct PgTicketStore {
    db: PgPool,
}

impl PgTicketStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn db_code(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// What a failed insert means for the caller, keyed on SQLSTATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertFailure {
    SeatTaken,
    UnknownUser,
    Other,
}

impl InsertFailure {
    fn from_code(code: Option<&str>) -> Self {
        match code {
            Some(UNIQUE_VIOLATION) => InsertFailure::SeatTaken,
            Some(FOREIGN_KEY_VIOLATION) => InsertFailure::UnknownUser,
            _ => InsertFailure::Other,
        }
    }

    fn of(e: &sqlx::Error) -> Self {
        Self::from_code(db_code(e).as_deref())
    }
}

/// Conflict reported after losing the seat claim. Falls back to the whole
/// request when the winner is no longer visible.
fn seat_conflict(taken: Vec<String>, requested: &[String]) -> BookingError {
    let seats = if taken.is_empty() { requested.to_vec() } else { taken };
    BookingError::SeatConflict { seats }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn user_contact(&self, user_id: Uuid) -> anyhow::Result<Option<UserContact>> {
        let row = sqlx::query_as::<_, (String, String)>(
            r#"SELECT name, email FROM users WHERE id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("lookup user contact")?;
        Ok(row.map(|(name, email)| UserContact { name, email }))
    }

    async fn conflicting_seats(
        &self,
        showing: &Showing,
        seats: &[String],
    ) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT seat_id
              FROM ticket_seats
             WHERE theater = $1
               AND show_date = $2
               AND show_time = $3
               AND seat_id = ANY($4)
             ORDER BY seat_id
            "#,
        )
        .bind(&showing.theater)
        .bind(showing.date)
        .bind(showing.time)
        .bind(seats)
        .fetch_all(&self.db)
        .await
        .context("query conflicting seats")?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    async fn booked_seats(&self, showing: &Showing) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT seat_id
              FROM ticket_seats
             WHERE theater = $1 AND show_date = $2 AND show_time = $3
             ORDER BY seat_id
            "#,
        )
        .bind(&showing.theater)
        .bind(showing.date)
        .bind(showing.time)
        .fetch_all(&self.db)
        .await
        .context("query booked seats")?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    async fn insert_ticket(&self, new: &NewTicket) -> Result<Ticket, BookingError> {
        let mut tx = self
            .db
            .begin()
            .await
            .context("begin tx")
            .map_err(BookingError::Persistence)?;

        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (id, movie, theater, seats, show_date, show_time, price, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, movie, theater, seats, show_date, show_time, price, user_id,
                      qr_code, qr_uuid, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.movie)
        .bind(&new.showing.theater)
        .bind(&new.seats)
        .bind(new.showing.date)
        .bind(new.showing.time)
        .bind(new.price)
        .bind(new.user_id)
        .fetch_one(&mut *tx)
        .await;

        let ticket = match ticket {
            Ok(t) => t,
            Err(e) if InsertFailure::of(&e) == InsertFailure::UnknownUser => {
                return Err(BookingError::UserNotFound(new.user_id));
            }
            Err(e) => return Err(BookingError::Persistence(anyhow::Error::new(e).context("insert ticket"))),
        };

        let claimed = sqlx::query(
            r#"
            INSERT INTO ticket_seats (theater, show_date, show_time, seat_id, ticket_id)
            SELECT $1, $2, $3, seat, $4 FROM UNNEST($5::text[]) AS seat
            "#,
        )
        .bind(&new.showing.theater)
        .bind(new.showing.date)
        .bind(new.showing.time)
        .bind(ticket.id)
        .bind(&new.seats)
        .execute(&mut *tx)
        .await;

        if let Err(e) = claimed {
            if InsertFailure::of(&e) != InsertFailure::SeatTaken {
                return Err(BookingError::Persistence(
                    anyhow::Error::new(e).context("claim ticket seats"),
                ));
            }
            drop(tx);
            // Lost a race past the pre-check; report whichever seats are now taken.
            warn!(theater = %new.showing.theater, "seat claim hit unique constraint");
            let taken = self
                .conflicting_seats(&new.showing, &new.seats)
                .await
                .unwrap_or_default();
            return Err(seat_conflict(taken, &new.seats));
        }

        tx.commit()
            .await
            .context("commit tx")
            .map_err(BookingError::Persistence)?;
        Ok(ticket)
    }

    async fn attach_qr(
        &self,
        ticket_id: Uuid,
        qr_code: &str,
        qr_uuid: &str,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE tickets SET qr_code = $2, qr_uuid = $3
             WHERE id = $1 AND qr_code IS NULL
            "#,
        )
        .bind(ticket_id)
        .bind(qr_code)
        .bind(qr_uuid)
        .execute(&self.db)
        .await
        .context("attach qr to ticket")?;
        Ok(res.rows_affected() == 1)
    }

    async fn find_ticket(&self, ticket_id: Uuid) -> anyhow::Result<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, movie, theater, seats, show_date, show_time, price, user_id,
                   qr_code, qr_uuid, created_at
              FROM tickets
             WHERE id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.db)
        .await
        .context("find ticket")?;
        Ok(ticket)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, movie, theater, seats, show_date, show_time, price, user_id,
                   qr_code, qr_uuid, created_at
              FROM tickets
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list tickets by user")?;
        Ok(rows)
    }

    async fn list_by_theater(
        &self,
        theater: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, movie, theater, seats, show_date, show_time, price, user_id,
                   qr_code, qr_uuid, created_at
              FROM tickets
             WHERE theater = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(theater)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list tickets by theater")?;
        Ok(rows)
    }
}
