use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{
    AppCommission, Bid, Booking, BookingDetails, BookingStatus, CommissionKind, Eligibility,
    Member, RideLimit, VehicleSnapshot,
};
use crate::error::Error;

/// A booking as shown in a listing, with the bids the caller may see.
#[derive(Clone, Debug, Serialize)]
pub struct BookingListing {
    #[serde(flatten)]
    pub booking: Booking,
    pub bids: Vec<Bid>,
    /// What a rider would take home claiming this booking at its total,
    /// under the current commission policy.
    pub projected_income: Option<Decimal>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RideHistoryEntry {
    #[serde(flatten)]
    pub booking: Booking,
    pub duration_minutes: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RiderLimitStatus {
    pub rider_id: Uuid,
    pub daily_limit: u32,
    pub used_today: u32,
    pub remaining: u32,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RideLimitOverview {
    pub daily_limit: u32,
    pub is_active: bool,
    pub last_reset_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub riders: Vec<RiderLimitStatus>,
}

#[async_trait]
pub trait MemberAPI {
    async fn register_member(&self, user: User) -> Result<Member, Error>;
}

#[async_trait]
pub trait BookingAPI {
    async fn create_booking(&self, user: User, details: BookingDetails) -> Result<Booking, Error>;
    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn list_bookings(&self, user: User) -> Result<Vec<BookingListing>, Error>;
    async fn accept_booking(
        &self,
        user: User,
        id: Uuid,
        vehicle: VehicleSnapshot,
    ) -> Result<Bid, Error>;
    async fn reject_ride(&self, user: User, id: Uuid, reason: String) -> Result<Booking, Error>;
    async fn start_ride(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn finish_ride(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn ride_history(&self, user: User) -> Result<Vec<RideHistoryEntry>, Error>;
    async fn finished_rides(&self, user: User) -> Result<Vec<Booking>, Error>;
    async fn active_rides(&self, user: User) -> Result<Vec<Booking>, Error>;
    async fn override_status(
        &self,
        user: User,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, Error>;
    async fn delete_booking(&self, user: User, id: Uuid) -> Result<(), Error>;
}

#[async_trait]
pub trait BidAPI {
    async fn place_bid(
        &self,
        user: User,
        booking_id: Uuid,
        amount: Decimal,
        vehicle: VehicleSnapshot,
    ) -> Result<Bid, Error>;
    async fn accept_bid(&self, user: User, booking_id: Uuid, bid_id: Uuid)
        -> Result<Booking, Error>;
}

#[async_trait]
pub trait RideLimitAPI {
    async fn global_ride_limit(&self, user: User) -> Result<RideLimitOverview, Error>;
    async fn update_ride_limit(
        &self,
        user: User,
        daily_limit: u32,
        is_active: bool,
    ) -> Result<RideLimit, Error>;
    async fn reset_daily_usage(&self, user: User) -> Result<RideLimit, Error>;
    async fn reset_ride_limits(&self, user: User) -> Result<RideLimit, Error>;
    async fn rider_ride_limit(&self, user: User, rider_id: Uuid)
        -> Result<RiderLimitStatus, Error>;
    async fn check_eligibility(&self, user: User, rider_id: Uuid) -> Result<Eligibility, Error>;
}

#[async_trait]
pub trait CommissionAPI {
    async fn set_app_commission(
        &self,
        user: User,
        kind: CommissionKind,
        value: Decimal,
    ) -> Result<AppCommission, Error>;
}

pub trait API: MemberAPI + BookingAPI + BidAPI + RideLimitAPI + CommissionAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
