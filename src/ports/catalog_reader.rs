//! Catalog reader port.
//!
//! Movies, cinemas, halls and seats are owned by the catalog; the reservation
//! engine only reads the few facts it needs to price and authorize.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CinemaId, DomainError, HallId, Money, MovieId, ScheduleId, SeatId, Timestamp, UserId,
};

#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<ScheduleInfo>, DomainError>;

    /// The cinema a hall belongs to and who owns it.
    async fn get_hall(&self, id: HallId) -> Result<Option<HallInfo>, DomainError>;

    async fn seats_for_hall(&self, id: HallId) -> Result<Vec<SeatInfo>, DomainError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub id: ScheduleId,
    pub hall_id: HallId,
    pub movie_id: MovieId,
    pub starts_at: Timestamp,
    /// Base price of the showing.
    pub price: Money,
}

impl ScheduleInfo {
    /// Showings that already began cannot be reserved.
    pub fn has_started(&self, now: Timestamp) -> bool {
        !now.is_before(&self.starts_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallInfo {
    pub id: HallId,
    pub cinema_id: CinemaId,
    pub owner_id: UserId,
    /// Surcharge added to the schedule price for every seat in this hall.
    pub seat_price: Money,
}

impl HallInfo {
    /// Price frozen onto tickets for `schedule` in this hall.
    pub fn ticket_price(&self, schedule: &ScheduleInfo) -> Money {
        schedule.price + self.seat_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatInfo {
    pub id: SeatId,
    pub hall_id: HallId,
    pub row: i32,
    pub number: i32,
}
