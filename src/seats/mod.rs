pub mod handlers;
pub mod layout;
pub mod pricing;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::seat_routes()
}
