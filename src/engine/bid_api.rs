use super::Engine;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    api::BidAPI,
    auth::User,
    entities::{Bid, BidStatus, Booking, BookingStatus, VehicleSnapshot},
    error::{conflict_error, invalid_input_error, invalid_state_error, Error},
    events::DomainEvent,
};

#[async_trait]
impl BidAPI for Engine {
    #[tracing::instrument(skip(self, vehicle))]
    async fn place_bid(
        &self,
        user: User,
        booking_id: Uuid,
        amount: Decimal,
        vehicle: VehicleSnapshot,
    ) -> Result<Bid, Error> {
        if amount <= Decimal::ZERO {
            return Err(invalid_input_error("bid amount must be positive"));
        }

        vehicle.validate()?;

        let booking = self.fetch_booking(booking_id).await?;

        self.authorize(user.clone(), "place_bid", booking.clone())?;

        let mut opened = booking.clone();
        let first_bid = opened.record_bid()?;

        let commission = self
            .store
            .find_app_commission()
            .await?
            .ok_or(Error::NotFound("app commission"))?;

        self.ledger.ensure_eligible(user.id).await?;

        let bid = self
            .bids
            .place_bid(&booking, user.id, amount, commission, vehicle)
            .await?;

        // losing this swap only means another bid opened the booking first
        if first_bid && !self.store.update_booking(&opened, &[BookingStatus::Pending]).await? {
            tracing::debug!(booking_id = %booking.id, "booking already left pending");
        }

        // the booking may have been cancelled or confirmed while the bid was written
        let current = self.fetch_booking(booking.id).await?;
        if !current.status.is_open() {
            if current.confirmed_bid_id != Some(bid.id) {
                self.bids
                    .reject_bid(bid.id, "booking closed before the bid was placed")
                    .await?;
            }

            return Err(conflict_error(format!(
                "booking became {} while bidding",
                current.status.name()
            )));
        }

        self.ledger.record_action(user.id).await?;

        tracing::info!(booking_id = %booking.id, bid_id = %bid.id, %amount, "bid placed");

        self.publish(DomainEvent::BidPlaced {
            booking_id: booking.id,
            bid_id: bid.id,
            rider_id: user.id,
            amount,
        });

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_bid(
        &self,
        user: User,
        booking_id: Uuid,
        bid_id: Uuid,
    ) -> Result<Booking, Error> {
        let booking = self.fetch_booking(booking_id).await?;

        self.authorize(user.clone(), "accept_bid", booking.clone())?;

        let bid = self.bids.find_bid(bid_id).await?;

        if bid.booking_id != booking.id {
            return Err(invalid_input_error("bid does not belong to this booking"));
        }

        // the booking swap succeeded earlier but settling the bids did not
        if booking.status == BookingStatus::Confirmed
            && booking.confirmed_bid_id == Some(bid.id)
            && bid.status != BidStatus::Accepted
        {
            tracing::warn!(booking_id = %booking.id, bid_id = %bid.id, "resuming bid settlement");
            self.bids.accept_bid(booking.id, bid.id).await?;
            return Ok(booking);
        }

        let mut confirmed = booking.clone();
        confirmed.confirm(&bid)?;

        if bid.status == BidStatus::Rejected {
            return Err(invalid_state_error("bid has been rejected"));
        }

        self.ledger.ensure_eligible(bid.rider_id).await?;

        if !self
            .store
            .update_booking(&confirmed, &BookingStatus::PRE_CONFIRMATION)
            .await?
        {
            return Err(conflict_error("booking already confirmed"));
        }

        let settlement = self.bids.accept_bid(booking.id, bid.id).await?;

        self.ledger.record_action(bid.rider_id).await?;

        tracing::info!(
            booking_id = %booking.id,
            bid_id = %bid.id,
            rejected = settlement.rejected.len(),
            "bid accepted"
        );

        self.publish(DomainEvent::BidAccepted {
            booking_id: booking.id,
            bid_id: bid.id,
            rider_id: bid.rider_id,
        });

        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{drain, engine, engine_with, requester, rider};
    use super::*;
    use crate::api::{BookingAPI, RideLimitAPI};
    use crate::db::{BookingQuery, MemoryStore, Store};
    use crate::entities::booking::tests::{details, vehicle};
    use crate::entities::{AppCommission, Member, RideLimit, RiderUsage, DEFAULT_DAILY_LIMIT};
    use chrono::{DateTime, Utc};
    use chrono_tz::Tz;
    use std::sync::Arc;

    /// Cancels the booking right after any bid lands on it, the way a
    /// concurrent cancellation would.
    #[derive(Default)]
    struct CancelsAfterBid(MemoryStore);

    #[async_trait]
    impl Store for CancelsAfterBid {
        async fn find_member(&self, id: Uuid) -> Result<Option<Member>, Error> {
            self.0.find_member(id).await
        }

        async fn save_member(&self, member: &Member) -> Result<(), Error> {
            self.0.save_member(member).await
        }

        async fn find_app_commission(&self) -> Result<Option<AppCommission>, Error> {
            self.0.find_app_commission().await
        }

        async fn save_app_commission(&self, commission: &AppCommission) -> Result<(), Error> {
            self.0.save_app_commission(commission).await
        }

        async fn insert_booking(&self, booking: &Booking) -> Result<(), Error> {
            self.0.insert_booking(booking).await
        }

        async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error> {
            self.0.find_booking(id).await
        }

        async fn find_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>, Error> {
            self.0.find_bookings(query).await
        }

        async fn update_booking(
            &self,
            booking: &Booking,
            expected: &[BookingStatus],
        ) -> Result<bool, Error> {
            self.0.update_booking(booking, expected).await
        }

        async fn delete_booking(&self, id: Uuid) -> Result<bool, Error> {
            self.0.delete_booking(id).await
        }

        async fn find_bid(&self, id: Uuid) -> Result<Option<Bid>, Error> {
            self.0.find_bid(id).await
        }

        async fn find_bids(&self, booking_id: Uuid) -> Result<Vec<Bid>, Error> {
            self.0.find_bids(booking_id).await
        }

        async fn upsert_open_bid(&self, bid: &Bid) -> Result<Bid, Error> {
            let stored = self.0.upsert_open_bid(bid).await?;

            if let Some(mut booking) = self.0.find_booking(bid.booking_id).await? {
                let previous = booking.status;
                booking.cancel(booking.requester_id, Utc::now())?;
                self.0.update_booking(&booking, &[previous]).await?;
            }

            Ok(stored)
        }

        async fn insert_bid(&self, bid: &Bid) -> Result<(), Error> {
            self.0.insert_bid(bid).await
        }

        async fn settle_bids(
            &self,
            booking_id: Uuid,
            winner_id: Uuid,
            at: DateTime<Utc>,
        ) -> Result<Vec<Bid>, Error> {
            self.0.settle_bids(booking_id, winner_id, at).await
        }

        async fn reject_bid(
            &self,
            id: Uuid,
            reason: &str,
            at: DateTime<Utc>,
        ) -> Result<Option<Bid>, Error> {
            self.0.reject_bid(id, reason, at).await
        }

        async fn ride_limit(&self, now: DateTime<Utc>) -> Result<RideLimit, Error> {
            self.0.ride_limit(now).await
        }

        async fn save_ride_limit_policy(
            &self,
            daily_limit: u32,
            is_active: bool,
            now: DateTime<Utc>,
        ) -> Result<RideLimit, Error> {
            self.0.save_ride_limit_policy(daily_limit, is_active, now).await
        }

        async fn increment_rider_usage(
            &self,
            rider_id: Uuid,
            now: DateTime<Utc>,
            timezone: Tz,
        ) -> Result<RiderUsage, Error> {
            self.0.increment_rider_usage(rider_id, now, timezone).await
        }

        async fn clear_daily_usage(&self, now: DateTime<Utc>) -> Result<RideLimit, Error> {
            self.0.clear_daily_usage(now).await
        }

        async fn replace_ride_limit(&self, ride_limit: &RideLimit) -> Result<(), Error> {
            self.0.replace_ride_limit(ride_limit).await
        }
    }

    #[test]
    fn bid_on_a_booking_closed_mid_flight_is_withdrawn() {
        let (engine, events) = engine_with(Arc::new(CancelsAfterBid::default()));
        let requester = requester(&engine);
        let rider = rider();

        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();

            let err = engine
                .place_bid(rider.clone(), booking.id, Decimal::from(1000), vehicle())
                .await
                .unwrap_err();
            assert!(err.is_conflict());

            let bids = engine.bids.bids_for(booking.id).await.unwrap();
            assert_eq!(bids.len(), 1);
            assert_eq!(bids[0].status, BidStatus::Rejected);

            // nothing was charged for the withdrawn bid
            let eligibility = engine.ledger.check_eligibility(rider.id).await.unwrap();
            assert_eq!(eligibility.remaining, DEFAULT_DAILY_LIMIT);

            let placed = drain(&events)
                .into_iter()
                .filter(|event| event.name() == "bid_placed")
                .count();
            assert_eq!(placed, 0);
        });
    }

    #[test]
    fn daily_cap_stops_the_third_bid() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();
        let admin = User::new_admin_user();

        tokio_test::block_on(async {
            engine.update_ride_limit(admin, 2, true).await.unwrap();

            let mut bookings = Vec::new();
            for _ in 0..3 {
                let booking = engine
                    .create_booking(requester.clone(), details(900, 100))
                    .await
                    .unwrap();
                bookings.push(booking);
            }

            for (booking, remaining) in bookings.iter().zip([1, 0]) {
                engine
                    .place_bid(rider.clone(), booking.id, Decimal::from(1000), vehicle())
                    .await
                    .unwrap();

                let eligibility = engine.ledger.check_eligibility(rider.id).await.unwrap();
                assert_eq!(eligibility.remaining, remaining);
            }

            let err = engine
                .place_bid(rider.clone(), bookings[2].id, Decimal::from(1000), vehicle())
                .await
                .unwrap_err();

            match err {
                Error::RateLimited { remaining, .. } => assert_eq!(remaining, 0),
                other => panic!("expected rate limit, got {:?}", other),
            }

            // the refused bid left no record behind
            assert!(engine.bids.bids_for(bookings[2].id).await.unwrap().is_empty());
        });
    }

    #[test]
    fn first_bid_opens_the_booking() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();

        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();

            let err = engine
                .place_bid(rider.clone(), booking.id, Decimal::ZERO, vehicle())
                .await
                .unwrap_err();
            assert!(err.is_validation());

            let err = engine
                .place_bid(rider.clone(), Uuid::new_v4(), Decimal::from(1000), vehicle())
                .await
                .unwrap_err();
            assert!(err.is_not_found());

            let err = engine
                .place_bid(requester.clone(), booking.id, Decimal::from(1000), vehicle())
                .await
                .unwrap_err();
            assert!(err.is_unauthorized());

            let first = engine
                .place_bid(rider.clone(), booking.id, Decimal::from(1000), vehicle())
                .await
                .unwrap();
            let revised = engine
                .place_bid(rider.clone(), booking.id, Decimal::from(1100), vehicle())
                .await
                .unwrap();
            assert_eq!(first.id, revised.id);

            let stored = engine.store.find_booking(booking.id).await.unwrap().unwrap();
            assert_eq!(stored.status, BookingStatus::BidPlaced);
            assert_eq!(engine.bids.bids_for(booking.id).await.unwrap().len(), 1);
        });
    }

    #[test]
    fn accepting_one_bid_rejects_the_rest() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let (low_rider, high_rider) = (rider(), rider());

        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();
            let low = engine
                .place_bid(low_rider.clone(), booking.id, Decimal::from(1000), vehicle())
                .await
                .unwrap();
            let high = engine
                .place_bid(high_rider.clone(), booking.id, Decimal::from(1200), vehicle())
                .await
                .unwrap();

            let err = engine
                .accept_bid(high_rider.clone(), booking.id, high.id)
                .await
                .unwrap_err();
            assert!(err.is_unauthorized());

            let confirmed = engine
                .accept_bid(requester.clone(), booking.id, high.id)
                .await
                .unwrap();
            assert_eq!(confirmed.status, BookingStatus::Confirmed);
            assert_eq!(confirmed.confirmed_bid_id, Some(high.id));
            assert_eq!(confirmed.rider_id, Some(high_rider.id));

            assert_eq!(engine.bids.find_bid(high.id).await.unwrap().status, BidStatus::Accepted);
            assert_eq!(engine.bids.find_bid(low.id).await.unwrap().status, BidStatus::Rejected);

            // a second acceptance must not replace the first
            let err = engine
                .accept_bid(requester.clone(), booking.id, low.id)
                .await
                .unwrap_err();
            assert!(err.is_conflict());

            let bids = engine.bids.bids_for(booking.id).await.unwrap();
            let accepted: Vec<_> = bids.iter().filter(|b| b.status == BidStatus::Accepted).collect();
            assert_eq!(accepted.len(), 1);
            assert_eq!(accepted[0].id, high.id);
        });
    }

    #[test]
    fn concurrent_accepts_have_one_winner() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let (first_rider, second_rider) = (rider(), rider());

        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();
            let first = engine
                .place_bid(first_rider.clone(), booking.id, Decimal::from(1000), vehicle())
                .await
                .unwrap();
            let second = engine
                .place_bid(second_rider.clone(), booking.id, Decimal::from(1100), vehicle())
                .await
                .unwrap();

            let (a, b) = tokio::join!(
                engine.accept_bid(requester.clone(), booking.id, first.id),
                engine.accept_bid(requester.clone(), booking.id, second.id),
            );

            assert!(a.is_ok() ^ b.is_ok());
            let loser = if a.is_ok() { b } else { a };
            assert!(loser.unwrap_err().is_conflict());

            let bids = engine.bids.bids_for(booking.id).await.unwrap();
            assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Accepted).count(), 1);
            assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Rejected).count(), 1);
        });
    }

    #[test]
    fn bid_from_another_booking_is_refused() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();

        tokio_test::block_on(async {
            let first = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();
            let second = engine
                .create_booking(requester.clone(), details(500, 50))
                .await
                .unwrap();
            let bid = engine
                .place_bid(rider.clone(), first.id, Decimal::from(1000), vehicle())
                .await
                .unwrap();

            let err = engine
                .accept_bid(requester.clone(), second.id, bid.id)
                .await
                .unwrap_err();
            assert!(err.is_validation());

            let err = engine
                .accept_bid(requester.clone(), first.id, Uuid::new_v4())
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        });
    }

    #[test]
    fn settlement_resumes_after_interruption() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();

        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();
            let bid = engine
                .place_bid(rider.clone(), booking.id, Decimal::from(1000), vehicle())
                .await
                .unwrap();

            // booking swapped, bids never settled
            let mut confirmed = engine.store.find_booking(booking.id).await.unwrap().unwrap();
            confirmed.confirm(&bid).unwrap();
            assert!(engine
                .store
                .update_booking(&confirmed, &BookingStatus::PRE_CONFIRMATION)
                .await
                .unwrap());

            let resumed = engine
                .accept_bid(requester.clone(), booking.id, bid.id)
                .await
                .unwrap();
            assert_eq!(resumed.status, BookingStatus::Confirmed);
            assert_eq!(engine.bids.find_bid(bid.id).await.unwrap().status, BidStatus::Accepted);
        });
    }
}
