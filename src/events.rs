use async_channel::{Receiver, Sender, TrySendError};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::entities::BookingStatus;

/// Something that happened in the marketplace that downstream notifiers may
/// want to relay.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingCreated {
        booking_id: Uuid,
        requester_id: Uuid,
    },
    BidPlaced {
        booking_id: Uuid,
        bid_id: Uuid,
        rider_id: Uuid,
        amount: Decimal,
    },
    BookingClaimed {
        booking_id: Uuid,
        bid_id: Uuid,
        rider_id: Uuid,
    },
    BidAccepted {
        booking_id: Uuid,
        bid_id: Uuid,
        rider_id: Uuid,
    },
    RideRejected {
        booking_id: Uuid,
        rider_id: Uuid,
        reason: String,
    },
    RideStarted {
        booking_id: Uuid,
        rider_id: Uuid,
    },
    RideCompleted {
        booking_id: Uuid,
        rider_id: Uuid,
    },
    BookingCancelled {
        booking_id: Uuid,
        cancelled_by: Uuid,
    },
    StatusOverridden {
        booking_id: Uuid,
        status: BookingStatus,
    },
    BookingDeleted {
        booking_id: Uuid,
    },
    RideLimitsReset,
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BookingCreated { .. } => "booking_created",
            Self::BidPlaced { .. } => "bid_placed",
            Self::BookingClaimed { .. } => "booking_claimed",
            Self::BidAccepted { .. } => "bid_accepted",
            Self::RideRejected { .. } => "ride_rejected",
            Self::RideStarted { .. } => "ride_started",
            Self::RideCompleted { .. } => "ride_completed",
            Self::BookingCancelled { .. } => "booking_cancelled",
            Self::StatusOverridden { .. } => "status_overridden",
            Self::BookingDeleted { .. } => "booking_deleted",
            Self::RideLimitsReset => "ride_limits_reset",
        }
    }
}

/// Bounded fan-out of domain events. Delivery is at most once: when the
/// buffer is full the event is dropped and a warning logged, the operation
/// that produced it still succeeds.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: Sender<DomainEvent>,
    receiver: Receiver<DomainEvent>,
}

impl EventBus {
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        Self { sender, receiver }
    }

    pub fn publish(&self, event: DomainEvent) {
        match self.sender.try_send(event) {
            Ok(()) => (),
            Err(TrySendError::Full(event)) => {
                tracing::warn!(event = event.name(), "event buffer full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(event = event.name(), "event bus closed, dropping event");
            }
        }
    }

    /// Receivers share one queue, each event is handed to a single
    /// subscriber.
    pub fn subscribe(&self) -> Receiver<DomainEvent> {
        self.receiver.clone()
    }
}
