use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::db::Store;
use crate::entities::{AppCommission, Bid, BidStatus, Booking, VehicleSnapshot};
use crate::error::{invalid_input_error, unexpected_error, Error};

/// Outcome of accepting one bid out of a booking's bid set.
#[derive(Clone, Debug, Serialize)]
pub struct Settlement {
    pub accepted: Bid,
    pub rejected: Vec<Bid>,
}

/// Bid records, keyed by booking and rider.
#[derive(Clone)]
pub struct BidStore {
    store: Arc<dyn Store>,
}

impl BidStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn find_bid(&self, id: Uuid) -> Result<Bid, Error> {
        self.store.find_bid(id).await?.ok_or(Error::NotFound("bid"))
    }

    pub async fn bids_for(&self, booking_id: Uuid) -> Result<Vec<Bid>, Error> {
        self.store.find_bids(booking_id).await
    }

    /// Creates a pending bid, or reprices the rider's open bid on the same
    /// booking in place.
    #[tracing::instrument(skip(self, booking, commission, vehicle), fields(booking_id = %booking.id))]
    pub async fn place_bid(
        &self,
        booking: &Booking,
        rider_id: Uuid,
        amount: Decimal,
        commission: AppCommission,
        vehicle: VehicleSnapshot,
    ) -> Result<Bid, Error> {
        let bid = Bid::new(
            booking,
            rider_id,
            amount,
            commission,
            vehicle,
            BidStatus::Pending,
            Utc::now(),
        );

        let stored = self.store.upsert_open_bid(&bid).await?;

        if stored.id != bid.id {
            tracing::info!(bid_id = %stored.id, "open bid revised");
        }

        Ok(stored)
    }

    /// A rider claiming the booking outright. The bid still waits for the
    /// requester, so it starts as `pending_confirmation`.
    #[tracing::instrument(skip(self, booking, commission, vehicle), fields(booking_id = %booking.id))]
    pub async fn self_accept_as_bid(
        &self,
        booking: &Booking,
        rider_id: Uuid,
        amount: Decimal,
        commission: AppCommission,
        vehicle: VehicleSnapshot,
    ) -> Result<Bid, Error> {
        let existing = self.store.find_bids(booking.id).await?;

        if existing.iter().any(|bid| bid.rider_id == rider_id) {
            return Err(invalid_input_error(
                "rider already holds a bid for this booking",
            ));
        }

        let bid = Bid::new(
            booking,
            rider_id,
            amount,
            commission,
            vehicle,
            BidStatus::PendingConfirmation,
            Utc::now(),
        );

        self.store.insert_bid(&bid).await?;

        Ok(bid)
    }

    /// Accepts `bid_id` and rejects its siblings in one store call. Repeating
    /// it for the same winner changes nothing further.
    #[tracing::instrument(skip(self))]
    pub async fn accept_bid(&self, booking_id: Uuid, bid_id: Uuid) -> Result<Settlement, Error> {
        let bids = self
            .store
            .settle_bids(booking_id, bid_id, Utc::now())
            .await?;

        let (accepted, rejected): (Vec<Bid>, Vec<Bid>) =
            bids.into_iter().partition(|bid| bid.id == bid_id);

        let accepted = accepted
            .into_iter()
            .next()
            .ok_or_else(|| unexpected_error(format!("settled bids missing winner {}", bid_id)))?;

        Ok(Settlement { accepted, rejected })
    }

    #[tracing::instrument(skip(self))]
    pub async fn reject_bid(&self, bid_id: Uuid, reason: &str) -> Result<Option<Bid>, Error> {
        self.store.reject_bid(bid_id, reason, Utc::now()).await
    }
}
