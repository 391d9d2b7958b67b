use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::{BookingAPI, BookingListing, RideHistoryEntry},
    auth::{Platform, User},
    db::BookingQuery,
    entities::{local_date, Bid, Booking, BookingDetails, BookingStatus, VehicleSnapshot},
    error::{conflict_error, invalid_input_error, Error},
    events::DomainEvent,
};

#[async_trait]
impl BookingAPI for Engine {
    #[tracing::instrument(skip(self, details))]
    async fn create_booking(&self, user: User, details: BookingDetails) -> Result<Booking, Error> {
        self.authorize(user.clone(), "create_booking", Platform::default())?;

        self.store
            .find_member(user.id)
            .await?
            .ok_or(Error::NotFound("requester"))?;

        let booking = Booking::new(user.id, details, Utc::now())?;

        self.store.insert_booking(&booking).await?;

        tracing::info!(booking_id = %booking.id, "booking created");

        self.publish(DomainEvent::BookingCreated {
            booking_id: booking.id,
            requester_id: booking.requester_id,
        });

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let booking = self.fetch_booking(id).await?;

        self.authorize(user, "read", booking.clone())?;

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bookings(&self, user: User) -> Result<Vec<BookingListing>, Error> {
        let today = local_date(Utc::now(), self.ledger.timezone());

        let query = if user.is_admin || user.is_rider() {
            BookingQuery::Upcoming { from: today }
        } else {
            BookingQuery::RequestedBy {
                requester_id: user.id,
                from: today,
            }
        };

        let bookings = self.store.find_bookings(&query).await?;
        let commission = self.store.find_app_commission().await?;

        let mut listings = Vec::with_capacity(bookings.len());

        for booking in bookings {
            let mut bids = self.bids.bids_for(booking.id).await?;

            if user.is_rider() && !user.is_admin {
                bids.retain(|bid| bid.rider_id == user.id);
            }

            let projected_income = commission
                .as_ref()
                .map(|commission| commission.rider_income(booking.total_amount, booking.commission));

            listings.push(BookingListing {
                booking,
                bids,
                projected_income,
            });
        }

        Ok(listings)
    }

    #[tracing::instrument(skip(self, vehicle))]
    async fn accept_booking(
        &self,
        user: User,
        id: Uuid,
        vehicle: VehicleSnapshot,
    ) -> Result<Bid, Error> {
        vehicle.validate()?;

        let booking = self.fetch_booking(id).await?;

        self.authorize(user.clone(), "accept_booking", booking.clone())?;

        let mut claimed = booking.clone();
        claimed.await_confirmation()?;

        let commission = self
            .store
            .find_app_commission()
            .await?
            .ok_or(Error::NotFound("app commission"))?;

        self.ledger.ensure_eligible(user.id).await?;

        let bid = self
            .bids
            .self_accept_as_bid(&booking, user.id, booking.total_amount, commission, vehicle)
            .await?;

        if !self.store.update_booking(&claimed, &[booking.status]).await? {
            self.bids
                .reject_bid(bid.id, "booking changed before the claim completed")
                .await?;

            return Err(conflict_error("booking was modified concurrently"));
        }

        self.ledger.record_action(user.id).await?;

        tracing::info!(booking_id = %booking.id, bid_id = %bid.id, "booking claimed");

        self.publish(DomainEvent::BookingClaimed {
            booking_id: booking.id,
            bid_id: bid.id,
            rider_id: user.id,
        });

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn reject_ride(&self, user: User, id: Uuid, reason: String) -> Result<Booking, Error> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(invalid_input_error("rejection reason is required"));
        }

        let mut booking = self.fetch_booking(id).await?;

        self.authorize(user.clone(), "reject", booking.clone())?;

        let confirmed_bid_id = booking.reject(user.id, reason, Utc::now())?;

        // status, rider and confirmed bid change in the same write
        self.swap_booking(&booking, &[BookingStatus::Confirmed]).await?;

        if let Some(bid_id) = confirmed_bid_id {
            self.bids.reject_bid(bid_id, reason).await?;
        }

        self.publish(DomainEvent::RideRejected {
            booking_id: booking.id,
            rider_id: user.id,
            reason: reason.to_string(),
        });

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn start_ride(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let mut booking = self.fetch_booking(id).await?;

        self.authorize(user.clone(), "start", booking.clone())?;

        booking.start(user.id, Utc::now())?;

        self.swap_booking(&booking, &[BookingStatus::Confirmed]).await?;

        self.publish(DomainEvent::RideStarted {
            booking_id: booking.id,
            rider_id: user.id,
        });

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn finish_ride(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let mut booking = self.fetch_booking(id).await?;

        self.authorize(user.clone(), "finish", booking.clone())?;

        booking.finish(user.id, Utc::now())?;

        self.swap_booking(&booking, &[BookingStatus::InProgress]).await?;

        self.publish(DomainEvent::RideCompleted {
            booking_id: booking.id,
            rider_id: user.id,
        });

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let mut booking = self.fetch_booking(id).await?;

        self.authorize(user.clone(), "cancel", booking.clone())?;

        let previous = booking.status;
        booking.cancel(user.id, Utc::now())?;

        self.swap_booking(&booking, &[previous]).await?;

        self.publish(DomainEvent::BookingCancelled {
            booking_id: booking.id,
            cancelled_by: user.id,
        });

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn ride_history(&self, user: User) -> Result<Vec<RideHistoryEntry>, Error> {
        self.authorize(user.clone(), "view_history", Platform::default())?;

        let bookings = self
            .store
            .find_bookings(&BookingQuery::CompletedBy { rider_id: user.id })
            .await?;

        Ok(bookings
            .into_iter()
            .map(|booking| {
                let duration_minutes = match (booking.started_at, booking.completed_at) {
                    (Some(started), Some(completed)) => Some((completed - started).num_minutes()),
                    _ => None,
                };

                RideHistoryEntry {
                    booking,
                    duration_minutes,
                }
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn finished_rides(&self, user: User) -> Result<Vec<Booking>, Error> {
        self.authorize(user, "administer", Platform::default())?;

        self.store
            .find_bookings(&BookingQuery::WithStatus(vec![
                BookingStatus::Completed,
                BookingStatus::Cancelled,
            ]))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn active_rides(&self, user: User) -> Result<Vec<Booking>, Error> {
        self.authorize(user, "administer", Platform::default())?;

        self.store
            .find_bookings(&BookingQuery::WithStatus(vec![
                BookingStatus::Confirmed,
                BookingStatus::InProgress,
            ]))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn override_status(
        &self,
        user: User,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, Error> {
        let mut booking = self.fetch_booking(id).await?;

        self.authorize(user, "override_status", booking.clone())?;

        let confirmed_bid_id = booking.confirmed_bid_id;

        booking.override_status(status)?;

        self.swap_booking(&booking, &BookingStatus::ALL).await?;

        // a reopened booking no longer holds its winning bid
        if let Some(bid_id) = confirmed_bid_id.filter(|_| booking.confirmed_bid_id.is_none()) {
            self.bids
                .reject_bid(bid_id, "booking reopened by an administrator")
                .await?;
        }

        tracing::warn!(booking_id = %booking.id, status = status.name(), "booking status overridden");

        self.publish(DomainEvent::StatusOverridden {
            booking_id: booking.id,
            status,
        });

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_booking(&self, user: User, id: Uuid) -> Result<(), Error> {
        let booking = self.fetch_booking(id).await?;

        self.authorize(user, "delete", booking.clone())?;

        if !self.store.delete_booking(booking.id).await? {
            return Err(Error::NotFound("booking"));
        }

        tracing::warn!(booking_id = %booking.id, "booking deleted");

        self.publish(DomainEvent::BookingDeleted {
            booking_id: booking.id,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{drain, engine, requester, rider};
    use super::*;
    use crate::api::BidAPI;
    use crate::auth::Role;
    use crate::entities::booking::tests::{details, vehicle};
    use crate::entities::BidStatus;
    use rust_decimal::Decimal;

    fn confirmed(engine: &Engine, requester: &User, rider: &User) -> (Booking, Bid) {
        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();
            let bid = engine
                .place_bid(rider.clone(), booking.id, Decimal::from(1000), vehicle())
                .await
                .unwrap();
            let booking = engine
                .accept_bid(requester.clone(), booking.id, bid.id)
                .await
                .unwrap();
            (booking, bid)
        })
    }

    #[test]
    fn create_booking_requires_known_requester() {
        let (engine, events) = engine();
        let requester = requester(&engine);

        tokio_test::block_on(async {
            let stranger = User::new(Uuid::new_v4(), Role::Broker);
            let err = engine
                .create_booking(stranger, details(900, 100))
                .await
                .unwrap_err();
            assert!(err.is_not_found());

            let err = engine
                .create_booking(rider(), details(900, 100))
                .await
                .unwrap_err();
            assert!(err.is_unauthorized());

            let booking = engine
                .create_booking(requester, details(900, 100))
                .await
                .unwrap();
            assert_eq!(booking.status, BookingStatus::Pending);
            assert_eq!(booking.total_amount, booking.rider_amount + booking.commission);

            assert_eq!(
                drain(&events),
                vec![DomainEvent::BookingCreated {
                    booking_id: booking.id,
                    requester_id: booking.requester_id,
                }]
            );
        });
    }

    #[test]
    fn rider_rejects_confirmed_ride() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();
        let (booking, bid) = confirmed(&engine, &requester, &rider);

        tokio_test::block_on(async {
            let err = engine
                .reject_ride(rider.clone(), booking.id, "   ".into())
                .await
                .unwrap_err();
            assert!(err.is_validation());

            let rejected = engine
                .reject_ride(rider.clone(), booking.id, "vehicle breakdown".into())
                .await
                .unwrap();

            assert_eq!(rejected.status, BookingStatus::BidPlaced);
            assert_eq!(rejected.rider_id, None);
            assert_eq!(rejected.confirmed_bid_id, None);
            assert_eq!(rejected.rejection_reason.as_deref(), Some("vehicle breakdown"));

            let stored = engine.store.find_booking(booking.id).await.unwrap().unwrap();
            assert_eq!(stored.status, BookingStatus::BidPlaced);
            assert_eq!(stored.rider_id, None);

            let bid = engine.bids.find_bid(bid.id).await.unwrap();
            assert_eq!(bid.status, BidStatus::Rejected);
            assert_eq!(bid.rejection_reason.as_deref(), Some("vehicle breakdown"));
        });
    }

    #[test]
    fn ride_runs_to_completion() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();
        let (booking, _) = confirmed(&engine, &requester, &rider);

        tokio_test::block_on(async {
            let stranger = crate::engine::tests::rider();
            let err = engine.start_ride(stranger, booking.id).await.unwrap_err();
            assert!(err.is_unauthorized());

            let started = engine.start_ride(rider.clone(), booking.id).await.unwrap();
            assert_eq!(started.status, BookingStatus::InProgress);
            assert_eq!(started.started_by, Some(rider.id));

            let finished = engine.finish_ride(rider.clone(), booking.id).await.unwrap();
            assert_eq!(finished.status, BookingStatus::Completed);
            assert_eq!(finished.completed_by, Some(rider.id));

            let history = engine.ride_history(rider.clone()).await.unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].booking.id, booking.id);
            assert_eq!(history[0].duration_minutes, Some(0));

            let err = engine.cancel_booking(requester, booking.id).await.unwrap_err();
            assert!(err.is_invalid_state());
        });
    }

    #[test]
    fn finishing_a_confirmed_ride_changes_nothing() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();
        let (booking, _) = confirmed(&engine, &requester, &rider);

        tokio_test::block_on(async {
            let err = engine.finish_ride(rider.clone(), booking.id).await.unwrap_err();
            assert!(err.is_invalid_state());

            let stored = engine.store.find_booking(booking.id).await.unwrap().unwrap();
            assert_eq!(stored.status, BookingStatus::Confirmed);
            assert_eq!(stored.completed_at, None);
            assert_eq!(stored.completed_by, None);
        });
    }

    #[test]
    fn self_accept_awaits_requester() {
        let (engine, events) = engine();
        let requester = requester(&engine);
        let rider = rider();

        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();
            drain(&events);

            let bid = engine
                .accept_booking(rider.clone(), booking.id, vehicle())
                .await
                .unwrap();
            assert_eq!(bid.status, BidStatus::PendingConfirmation);
            assert_eq!(bid.amount, booking.total_amount);

            let stored = engine.store.find_booking(booking.id).await.unwrap().unwrap();
            assert_eq!(stored.status, BookingStatus::PendingConfirmation);

            let err = engine
                .accept_booking(rider.clone(), booking.id, vehicle())
                .await
                .unwrap_err();
            assert!(err.is_validation());

            let confirmed = engine
                .accept_bid(requester.clone(), booking.id, bid.id)
                .await
                .unwrap();
            assert_eq!(confirmed.status, BookingStatus::Confirmed);
            assert_eq!(confirmed.rider_id, Some(rider.id));

            let usage = engine.ledger.snapshot().await.unwrap();
            assert_eq!(usage.daily_usage[&rider.id].rides_used, 2);

            let kinds: Vec<&str> = drain(&events).iter().map(|e| e.name()).collect();
            assert_eq!(kinds, vec!["booking_claimed", "bid_accepted"]);
        });
    }

    #[test]
    fn listings_hide_other_riders_bids() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let other = crate::engine::tests::requester(&engine);
        let first = rider();
        let second = rider();

        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();
            for rider in [&first, &second] {
                engine
                    .place_bid(rider.clone(), booking.id, Decimal::from(1000), vehicle())
                    .await
                    .unwrap();
            }

            let own = engine.list_bookings(requester.clone()).await.unwrap();
            assert_eq!(own.len(), 1);
            assert_eq!(own[0].bids.len(), 2);
            assert_eq!(own[0].projected_income, Some(Decimal::from(900)));

            let seen = engine.list_bookings(first.clone()).await.unwrap();
            assert_eq!(seen[0].bids.len(), 1);
            assert_eq!(seen[0].bids[0].rider_id, first.id);

            assert!(engine.list_bookings(other).await.unwrap().is_empty());
        });
    }

    #[test]
    fn cancellation_is_terminal() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();

        tokio_test::block_on(async {
            let booking = engine
                .create_booking(requester.clone(), details(900, 100))
                .await
                .unwrap();

            let err = engine.cancel_booking(rider.clone(), booking.id).await.unwrap_err();
            assert!(err.is_unauthorized());

            let cancelled = engine.cancel_booking(requester.clone(), booking.id).await.unwrap();
            assert_eq!(cancelled.status, BookingStatus::Cancelled);
            assert_eq!(cancelled.cancelled_by, Some(requester.id));

            let err = engine
                .place_bid(rider.clone(), booking.id, Decimal::from(1000), vehicle())
                .await
                .unwrap_err();
            assert!(err.is_invalid_state());

            let err = engine.cancel_booking(requester, booking.id).await.unwrap_err();
            assert!(err.is_invalid_state());
        });
    }

    #[test]
    fn reopening_releases_the_winning_bid() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();
        let admin = User::new_admin_user();
        let (booking, won) = confirmed(&engine, &requester, &rider);

        tokio_test::block_on(async {
            engine
                .override_status(admin, booking.id, BookingStatus::BidPlaced)
                .await
                .unwrap();

            let released = engine.bids.find_bid(won.id).await.unwrap();
            assert_eq!(released.status, BidStatus::Rejected);

            let rebid = engine
                .place_bid(rider.clone(), booking.id, Decimal::from(1100), vehicle())
                .await
                .unwrap();
            assert_ne!(rebid.id, won.id);

            let live: Vec<_> = engine
                .bids
                .bids_for(booking.id)
                .await
                .unwrap()
                .into_iter()
                .filter(|bid| bid.rider_id == rider.id && bid.status != BidStatus::Rejected)
                .collect();
            assert_eq!(live.len(), 1);
            assert_eq!(live[0].id, rebid.id);

            let confirmed = engine
                .accept_bid(requester.clone(), booking.id, rebid.id)
                .await
                .unwrap();
            assert_eq!(confirmed.confirmed_bid_id, Some(rebid.id));
        });
    }

    #[test]
    fn admin_overrides_and_purges() {
        let (engine, _events) = engine();
        let requester = requester(&engine);
        let rider = rider();
        let admin = User::new_admin_user();
        let (booking, _) = confirmed(&engine, &requester, &rider);

        tokio_test::block_on(async {
            let err = engine
                .override_status(requester.clone(), booking.id, BookingStatus::Pending)
                .await
                .unwrap_err();
            assert!(err.is_unauthorized());

            let active = engine.active_rides(admin.clone()).await.unwrap();
            assert_eq!(active.len(), 1);

            let reopened = engine
                .override_status(admin.clone(), booking.id, BookingStatus::Pending)
                .await
                .unwrap();
            assert_eq!(reopened.status, BookingStatus::Pending);
            assert_eq!(reopened.rider_id, None);

            assert!(engine.active_rides(admin.clone()).await.unwrap().is_empty());
            assert!(engine.finished_rides(requester.clone()).await.unwrap_err().is_unauthorized());

            engine.delete_booking(admin.clone(), booking.id).await.unwrap();
            assert!(engine.bids.bids_for(booking.id).await.unwrap().is_empty());

            let err = engine.find_booking(admin, booking.id).await.unwrap_err();
            assert!(err.is_not_found());
        });
    }
}
