mod bid_api;
mod bid_store;
mod booking_api;
mod commission_api;
mod ledger;
mod member_api;
mod ride_limit_api;

pub use bid_store::{BidStore, Settlement};
pub use ledger::RideLimitLedger;

use std::sync::Arc;

use chrono_tz::Tz;
use oso::Oso;
use uuid::Uuid;

use crate::{
    api::API,
    auth::authorizor,
    db::Store,
    entities::{Booking, BookingStatus},
    error::{conflict_error, Error},
    events::{DomainEvent, EventBus},
};

/// The marketplace orchestrator: every operation authorizes the actor,
/// consults the ride limit ledger where needed and drives the booking and
/// bid records through their transitions.
pub struct Engine {
    store: Arc<dyn Store>,
    authorizor: Oso,
    ledger: RideLimitLedger,
    bids: BidStore,
    events: EventBus,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all, fields(timezone = %timezone))]
    pub fn new(store: Arc<dyn Store>, timezone: Tz, events: EventBus) -> Result<Self, Error> {
        Ok(Self {
            ledger: RideLimitLedger::new(store.clone(), timezone),
            bids: BidStore::new(store.clone()),
            authorizor: authorizor::new()?,
            store,
            events,
        })
    }

    pub fn ledger(&self) -> &RideLimitLedger {
        &self.ledger
    }

    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(Error::Unauthorized)
    }

    async fn fetch_booking(&self, id: Uuid) -> Result<Booking, Error> {
        self.store
            .find_booking(id)
            .await?
            .ok_or(Error::NotFound("booking"))
    }

    /// Writes `booking` only while the stored copy is still in one of
    /// `expected`, reporting a lost race as a conflict.
    async fn swap_booking(&self, booking: &Booking, expected: &[BookingStatus]) -> Result<(), Error> {
        if self.store.update_booking(booking, expected).await? {
            tracing::info!(booking_id = %booking.id, status = booking.status.name(), "booking transitioned");
            return Ok(());
        }

        Err(conflict_error("booking was modified concurrently"))
    }

    fn publish(&self, event: DomainEvent) {
        self.events.publish(event);
    }
}

impl API for Engine {}
