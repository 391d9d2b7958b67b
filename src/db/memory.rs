use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{newest_first, BookingQuery, Store};
use crate::entities::{
    AppCommission, Bid, BidStatus, Booking, BookingStatus, Member, RideLimit, RiderUsage,
};
use crate::error::{conflict_error, Error};

/// Process-local store. Each map is locked only for the duration of one
/// call, which gives every method the same all-or-nothing visibility the
/// Postgres transactions provide.
#[derive(Default)]
pub struct MemoryStore {
    members: RwLock<HashMap<Uuid, Member>>,
    commission: RwLock<Option<AppCommission>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    bids: RwLock<HashMap<Uuid, Bid>>,
    ride_limit: Mutex<Option<RideLimit>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ride_limit_or_default(slot: &mut Option<RideLimit>, now: DateTime<Utc>) -> &mut RideLimit {
    slot.get_or_insert_with(|| RideLimit::new(now))
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_member(&self, id: Uuid) -> Result<Option<Member>, Error> {
        Ok(self.members.read().await.get(&id).cloned())
    }

    async fn save_member(&self, member: &Member) -> Result<(), Error> {
        self.members.write().await.insert(member.id, member.clone());
        Ok(())
    }

    async fn find_app_commission(&self) -> Result<Option<AppCommission>, Error> {
        Ok(self.commission.read().await.clone())
    }

    async fn save_app_commission(&self, commission: &AppCommission) -> Result<(), Error> {
        *self.commission.write().await = Some(commission.clone());
        Ok(())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error> {
        let mut bookings = self.bookings.write().await;

        if bookings.contains_key(&booking.id) {
            return Err(conflict_error("booking already exists"));
        }

        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn find_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>, Error> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|booking| query.matches(booking))
            .cloned()
            .collect();

        newest_first(&mut bookings);

        Ok(bookings)
    }

    async fn update_booking(
        &self,
        booking: &Booking,
        expected: &[BookingStatus],
    ) -> Result<bool, Error> {
        let mut bookings = self.bookings.write().await;

        match bookings.get_mut(&booking.id) {
            Some(stored) if expected.contains(&stored.status) => {
                *stored = booking.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(Error::NotFound("booking")),
        }
    }

    async fn delete_booking(&self, id: Uuid) -> Result<bool, Error> {
        // always bookings before bids
        let mut bookings = self.bookings.write().await;
        let mut bids = self.bids.write().await;

        let removed = bookings.remove(&id).is_some();

        if removed {
            bids.retain(|_, bid| bid.booking_id != id);
        }

        Ok(removed)
    }

    async fn find_bid(&self, id: Uuid) -> Result<Option<Bid>, Error> {
        Ok(self.bids.read().await.get(&id).cloned())
    }

    async fn find_bids(&self, booking_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut bids: Vec<Bid> = self
            .bids
            .read()
            .await
            .values()
            .filter(|bid| bid.booking_id == booking_id)
            .cloned()
            .collect();

        bids.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(bids)
    }

    async fn upsert_open_bid(&self, bid: &Bid) -> Result<Bid, Error> {
        let mut bids = self.bids.write().await;

        let won = bids.values().any(|stored| {
            stored.booking_id == bid.booking_id
                && stored.rider_id == bid.rider_id
                && stored.status == BidStatus::Accepted
        });

        if won {
            return Err(conflict_error("rider already holds a bid for this booking"));
        }

        let existing = bids.values_mut().find(|stored| {
            stored.booking_id == bid.booking_id && stored.rider_id == bid.rider_id && stored.is_open()
        });

        if let Some(stored) = existing {
            stored.revise(bid);
            return Ok(stored.clone());
        }

        bids.insert(bid.id, bid.clone());
        Ok(bid.clone())
    }

    async fn insert_bid(&self, bid: &Bid) -> Result<(), Error> {
        let mut bids = self.bids.write().await;

        let duplicate = bids.values().any(|stored| {
            stored.booking_id == bid.booking_id
                && stored.rider_id == bid.rider_id
                && stored.status != BidStatus::Rejected
        });

        if duplicate {
            return Err(conflict_error("rider already holds a bid for this booking"));
        }

        bids.insert(bid.id, bid.clone());
        Ok(())
    }

    async fn settle_bids(
        &self,
        booking_id: Uuid,
        winner_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<Bid>, Error> {
        let mut bids = self.bids.write().await;

        match bids.get(&winner_id) {
            Some(winner) if winner.booking_id == booking_id => (),
            _ => return Err(Error::NotFound("bid")),
        }

        let mut settled = Vec::new();

        for bid in bids.values_mut().filter(|bid| bid.booking_id == booking_id) {
            if bid.id == winner_id {
                bid.accept(at);
            } else if bid.status != BidStatus::Rejected {
                bid.reject(None, at);
            }

            settled.push(bid.clone());
        }

        settled.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(settled)
    }

    async fn reject_bid(
        &self,
        id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Bid>, Error> {
        let mut bids = self.bids.write().await;

        Ok(bids.get_mut(&id).map(|bid| {
            bid.reject(Some(reason.to_string()), at);
            bid.clone()
        }))
    }

    async fn ride_limit(&self, now: DateTime<Utc>) -> Result<RideLimit, Error> {
        let mut slot = self.ride_limit.lock().await;
        Ok(ride_limit_or_default(&mut slot, now).clone())
    }

    async fn save_ride_limit_policy(
        &self,
        daily_limit: u32,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<RideLimit, Error> {
        let mut slot = self.ride_limit.lock().await;
        let ride_limit = ride_limit_or_default(&mut slot, now);

        ride_limit.set_policy(daily_limit, is_active, now)?;

        Ok(ride_limit.clone())
    }

    async fn increment_rider_usage(
        &self,
        rider_id: Uuid,
        now: DateTime<Utc>,
        timezone: Tz,
    ) -> Result<RiderUsage, Error> {
        let mut slot = self.ride_limit.lock().await;
        let ride_limit = ride_limit_or_default(&mut slot, now);

        let usage = RiderUsage::advance(ride_limit.daily_usage.get(&rider_id), now, timezone);
        ride_limit.daily_usage.insert(rider_id, usage);

        Ok(usage)
    }

    async fn clear_daily_usage(&self, now: DateTime<Utc>) -> Result<RideLimit, Error> {
        let mut slot = self.ride_limit.lock().await;
        let ride_limit = ride_limit_or_default(&mut slot, now);

        ride_limit.clear_usage(now);

        Ok(ride_limit.clone())
    }

    async fn replace_ride_limit(&self, ride_limit: &RideLimit) -> Result<(), Error> {
        *self.ride_limit.lock().await = Some(ride_limit.clone());
        Ok(())
    }
}
