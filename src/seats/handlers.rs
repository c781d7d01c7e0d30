use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::layout::{parse_selection, SeatTier, ROWS, SEATS_PER_ROW};
use super::pricing::{quote, FoodItem, FoodOrder, Quote, FOOD_MENU};
use crate::{
    bookings::{
        repo_types::Showing,
        services::{check_availability, Availability},
    },
    error::BookingError,
    extract::{ApiJson, ApiQuery},
    state::AppState,
};

pub fn seat_routes() -> Router<AppState> {
    Router::new()
        .route("/seats/layout", get(layout))
        .route("/seats/availability", get(availability))
        .route("/seats/booked", get(booked))
        .route("/bookings/quote", post(price_quote))
}

#[derive(Debug, Serialize)]
pub struct RowLayout {
    pub row: char,
    pub tier: SeatTier,
    pub price: i64,
    pub seats: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub rows: Vec<RowLayout>,
    pub food: &'static [FoodItem],
}

pub async fn layout(State(state): State<AppState>) -> Json<LayoutResponse> {
    let pricing = state.config.pricing;
    let rows = ROWS
        .iter()
        .enumerate()
        .map(|(i, &row)| {
            let tier = SeatTier::for_row_index(i);
            RowLayout {
                row,
                tier,
                price: pricing.price_for(tier),
                seats: (1..=SEATS_PER_ROW).map(|n| format!("{row}{n}")).collect(),
            }
        })
        .collect();
    Json(LayoutResponse {
        rows,
        food: &FOOD_MENU,
    })
}

#[derive(Debug, Deserialize)]
pub struct ShowingQuery {
    pub theater: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub theater: String,
    pub date: String,
    pub time: String,
    /// Comma separated, e.g. `A1,A2`.
    pub seats: String,
}

#[instrument(skip(state))]
pub async fn availability(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<AvailabilityQuery>,
) -> Result<Json<Availability>, BookingError> {
    let showing = Showing::parse(&q.theater, &q.date, &q.time)?;
    let requested: Vec<&str> = q.seats.split(',').filter(|s| !s.trim().is_empty()).collect();
    let seats: Vec<String> = parse_selection(requested.as_slice())?
        .iter()
        .map(ToString::to_string)
        .collect();
    let result = check_availability(state.tickets.as_ref(), &showing, &seats).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct BookedSeats {
    pub seats: Vec<String>,
}

#[instrument(skip(state))]
pub async fn booked(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ShowingQuery>,
) -> Result<Json<BookedSeats>, BookingError> {
    let showing = Showing::parse(&q.theater, &q.date, &q.time)?;
    let seats = state
        .tickets
        .booked_seats(&showing)
        .await
        .map_err(BookingError::Persistence)?;
    Ok(Json(BookedSeats { seats }))
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub seats: Vec<String>,
    #[serde(default)]
    pub food: Vec<FoodOrder>,
}

#[instrument(skip(state))]
pub async fn price_quote(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<QuoteRequest>,
) -> Result<Json<Quote>, BookingError> {
    let seats = parse_selection(req.seats.as_slice())?;
    Ok(Json(quote(&state.config.pricing, &seats, &req.food)?))
}
