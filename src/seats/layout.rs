use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Auditorium rows, front to back.
pub const ROWS: [char; 9] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];
pub const SEATS_PER_ROW: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatTier {
    Gold,
    Diamond,
    Recliner,
}

impl SeatTier {
    /// Two gold rows up front, recliners in the last two rows.
    pub fn for_row_index(index: usize) -> Self {
        match index {
            0 | 1 => SeatTier::Gold,
            2..=6 => SeatTier::Diamond,
            _ => SeatTier::Recliner,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("at least one seat must be selected")]
    NoSeats,
    #[error("invalid seat id: {0}")]
    InvalidSeat(String),
    #[error("seat {0} selected more than once")]
    DuplicateSeat(String),
    #[error("unknown food item: {0}")]
    UnknownFood(u32),
    #[error("food quantity must be positive")]
    InvalidQuantity,
}

/// A seat in the fixed layout, e.g. `C12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeatId {
    row: char,
    number: u8,
}

impl SeatId {
    pub fn tier(&self) -> SeatTier {
        let index = ROWS.iter().position(|r| *r == self.row).unwrap_or(ROWS.len() - 1);
        SeatTier::for_row_index(index)
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.number)
    }
}

impl FromStr for SeatId {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_uppercase();
        let invalid = || SelectionError::InvalidSeat(s.trim().to_string());
        let mut chars = raw.chars();
        let row = chars.next().ok_or_else(invalid)?;
        if !ROWS.contains(&row) {
            return Err(invalid());
        }
        let digits = chars.as_str();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let number: u8 = digits.parse().map_err(|_| invalid())?;
        if number == 0 || number > SEATS_PER_ROW {
            return Err(invalid());
        }
        Ok(SeatId { row, number })
    }
}

/// Parse a requested seat list, keeping the caller's order.
pub fn parse_selection<S: AsRef<str>>(raw: &[S]) -> Result<Vec<SeatId>, SelectionError> {
    if raw.is_empty() {
        return Err(SelectionError::NoSeats);
    }
    let mut seen = HashSet::with_capacity(raw.len());
    let mut seats = Vec::with_capacity(raw.len());
    for s in raw {
        let seat: SeatId = s.as_ref().parse()?;
        if !seen.insert(seat) {
            return Err(SelectionError::DuplicateSeat(seat.to_string()));
        }
        seats.push(seat);
    }
    Ok(seats)
}

/// Every seat in the layout, row by row.
#[cfg(test)]
fn all_seats() -> impl Iterator<Item = SeatId> {
    ROWS.iter()
        .flat_map(|&row| (1..=SEATS_PER_ROW).map(move |number| SeatId { row, number }))
}
