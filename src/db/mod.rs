mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::entities::{
    AppCommission, Bid, Booking, BookingStatus, Member, RideLimit, RiderUsage,
};
use crate::error::Error;

/// Selects a slice of bookings; results come back newest first.
#[derive(Clone, Debug)]
pub enum BookingQuery {
    /// Every booking scheduled on or after the given date.
    Upcoming { from: NaiveDate },
    /// A requester's own bookings scheduled on or after the given date.
    RequestedBy { requester_id: Uuid, from: NaiveDate },
    /// Rides a rider has completed.
    CompletedBy { rider_id: Uuid },
    WithStatus(Vec<BookingStatus>),
}

impl BookingQuery {
    pub fn matches(&self, booking: &Booking) -> bool {
        match self {
            Self::Upcoming { from } => booking.pickup_date >= *from,
            Self::RequestedBy { requester_id, from } => {
                booking.requester_id == *requester_id && booking.pickup_date >= *from
            }
            Self::CompletedBy { rider_id } => {
                booking.status == BookingStatus::Completed && booking.rider_id == Some(*rider_id)
            }
            Self::WithStatus(statuses) => statuses.contains(&booking.status),
        }
    }
}

/// Persistence used by the engine. Every method is a single logical unit:
/// implementations must not let a reader observe half of one call.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_member(&self, id: Uuid) -> Result<Option<Member>, Error>;
    async fn save_member(&self, member: &Member) -> Result<(), Error>;

    async fn find_app_commission(&self) -> Result<Option<AppCommission>, Error>;
    async fn save_app_commission(&self, commission: &AppCommission) -> Result<(), Error>;

    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error>;
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error>;
    async fn find_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>, Error>;
    /// Compare-and-swap on status: writes `booking` only while the stored
    /// status is one of `expected`. Returns false when the swap lost.
    async fn update_booking(
        &self,
        booking: &Booking,
        expected: &[BookingStatus],
    ) -> Result<bool, Error>;
    /// Removes the booking and its bids.
    async fn delete_booking(&self, id: Uuid) -> Result<bool, Error>;

    async fn find_bid(&self, id: Uuid) -> Result<Option<Bid>, Error>;
    async fn find_bids(&self, booking_id: Uuid) -> Result<Vec<Bid>, Error>;
    /// Revises the rider's open bid on the booking in place, or inserts `bid`
    /// when there is none.
    async fn upsert_open_bid(&self, bid: &Bid) -> Result<Bid, Error>;
    /// Inserts a new bid; a concurrent open bid for the same rider and
    /// booking is a conflict.
    async fn insert_bid(&self, bid: &Bid) -> Result<(), Error>;
    /// Marks `winner_id` accepted and every other bid of the booking
    /// rejected. Safe to repeat.
    async fn settle_bids(
        &self,
        booking_id: Uuid,
        winner_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<Bid>, Error>;
    async fn reject_bid(
        &self,
        id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Bid>, Error>;

    /// Loads the ride limit singleton, creating it with defaults on first use.
    async fn ride_limit(&self, now: DateTime<Utc>) -> Result<RideLimit, Error>;
    async fn save_ride_limit_policy(
        &self,
        daily_limit: u32,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<RideLimit, Error>;
    /// Counts one ride action for the rider. Only that rider's entry is
    /// read and written.
    async fn increment_rider_usage(
        &self,
        rider_id: Uuid,
        now: DateTime<Utc>,
        timezone: Tz,
    ) -> Result<RiderUsage, Error>;
    async fn clear_daily_usage(&self, now: DateTime<Utc>) -> Result<RideLimit, Error>;
    async fn replace_ride_limit(&self, ride_limit: &RideLimit) -> Result<(), Error>;
}

fn newest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
