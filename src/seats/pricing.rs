use serde::{Deserialize, Serialize};

use super::layout::{SeatId, SeatTier, SelectionError};
use crate::config::PricingConfig;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FoodItem {
    pub id: u32,
    pub name: &'static str,
    pub price: i64,
}

pub const FOOD_MENU: [FoodItem; 4] = [
    FoodItem { id: 1, name: "Popcorn", price: 100 },
    FoodItem { id: 2, name: "Nachos", price: 150 },
    FoodItem { id: 3, name: "Burger", price: 200 },
    FoodItem { id: 4, name: "Soft Drink", price: 80 },
];

pub fn find_food(id: u32) -> Option<&'static FoodItem> {
    FOOD_MENU.iter().find(|f| f.id == id)
}

impl PricingConfig {
    pub fn price_for(&self, tier: SeatTier) -> i64 {
        match tier {
            SeatTier::Gold => self.gold,
            SeatTier::Diamond => self.diamond,
            SeatTier::Recliner => self.recliner,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FoodOrder {
    pub id: u32,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SeatLine {
    pub seat: String,
    pub tier: SeatTier,
    pub price: i64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FoodLine {
    pub id: u32,
    pub name: &'static str,
    pub quantity: u32,
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct Quote {
    pub seats: Vec<SeatLine>,
    pub food: Vec<FoodLine>,
    pub seat_total: i64,
    pub food_total: i64,
    pub total: i64,
}

pub fn quote(
    pricing: &PricingConfig,
    seats: &[SeatId],
    food: &[FoodOrder],
) -> Result<Quote, SelectionError> {
    let seat_lines: Vec<SeatLine> = seats
        .iter()
        .map(|s| SeatLine {
            seat: s.to_string(),
            tier: s.tier(),
            price: pricing.price_for(s.tier()),
        })
        .collect();

    let mut food_lines = Vec::with_capacity(food.len());
    for order in food {
        if order.quantity == 0 {
            return Err(SelectionError::InvalidQuantity);
        }
        let item = find_food(order.id).ok_or(SelectionError::UnknownFood(order.id))?;
        food_lines.push(FoodLine {
            id: item.id,
            name: item.name,
            quantity: order.quantity,
            price: item.price * i64::from(order.quantity),
        });
    }

    let seat_total = seat_lines.iter().map(|l| l.price).sum();
    let food_total = food_lines.iter().map(|l| l.price).sum();
    Ok(Quote {
        seats: seat_lines,
        food: food_lines,
        seat_total,
        food_total,
        total: seat_total + food_total,
    })
}
