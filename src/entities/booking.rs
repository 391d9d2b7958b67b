use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Bid, Location};
use crate::error::{conflict_error, invalid_input_error, invalid_state_error, Error};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub pickup: Location,
    pub destination: Option<Location>,
    pub pickup_date: NaiveDate,
    pub pickup_time: String,
    pub rider_amount: Decimal,
    pub commission: Decimal,
    pub total_amount: Decimal,
    pub phone_number: Option<String>,
    pub number_of_guests: Option<u32>,
    pub vehicle_type: Option<String>,
    pub status: Status,
    pub rider_id: Option<Uuid>,
    pub confirmed_bid_id: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub started_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    BidPlaced,
    PendingConfirmation,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Pending,
        Status::BidPlaced,
        Status::PendingConfirmation,
        Status::Confirmed,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
    ];

    /// States from which a bid may still be accepted.
    pub const PRE_CONFIRMATION: [Status; 2] = [Status::BidPlaced, Status::PendingConfirmation];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::BidPlaced => "bid_placed",
            Self::PendingConfirmation => "pending_confirmation",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::BidPlaced | Self::PendingConfirmation
        )
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|status| status.name() == s)
            .copied()
            .ok_or_else(|| invalid_input_error(format!("unknown booking status '{}'", s)))
    }
}

/// Everything a requester supplies when posting a booking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingDetails {
    pub pickup: Location,
    #[serde(default)]
    pub destination: Option<Location>,
    pub pickup_date: NaiveDate,
    pub pickup_time: String,
    pub rider_amount: Decimal,
    pub commission: Decimal,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub number_of_guests: Option<u32>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
}

impl BookingDetails {
    pub fn validate(&self) -> Result<(), Error> {
        self.pickup.validate()?;

        if let Some(destination) = &self.destination {
            destination.validate()?;
        }

        if self.pickup_time.trim().is_empty() {
            return Err(invalid_input_error("pickup time is required"));
        }

        if self.rider_amount.is_sign_negative() || self.commission.is_sign_negative() {
            return Err(invalid_input_error("amounts cannot be negative"));
        }

        Ok(())
    }
}

impl PolarClass for Booking {
    fn get_polar_class_builder() -> oso::ClassBuilder<Booking> {
        oso::Class::builder()
            .name("Booking")
            .add_attribute_getter("id", |recv: &Booking| recv.id.to_string())
            .add_attribute_getter("requester_id", |recv: &Booking| {
                recv.requester_id.to_string()
            })
            // empty while no rider is assigned, which never matches a user id
            .add_attribute_getter("rider_id", |recv: &Booking| {
                recv.rider_id.map(|id| id.to_string()).unwrap_or_default()
            })
            .add_attribute_getter("status", |recv: &Booking| recv.status.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Booking::get_polar_class_builder();
        builder.build()
    }
}

impl Booking {
    pub fn new(requester_id: Uuid, details: BookingDetails, now: DateTime<Utc>) -> Result<Self, Error> {
        details.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            requester_id,
            total_amount: details.rider_amount + details.commission,
            pickup: details.pickup,
            destination: details.destination,
            pickup_date: details.pickup_date,
            pickup_time: details.pickup_time,
            rider_amount: details.rider_amount,
            commission: details.commission,
            phone_number: details.phone_number,
            number_of_guests: details.number_of_guests,
            vehicle_type: details.vehicle_type,
            status: Status::Pending,
            rider_id: None,
            confirmed_bid_id: None,
            rejection_reason: None,
            rejected_at: None,
            rejected_by: None,
            started_at: None,
            started_by: None,
            completed_at: None,
            completed_by: None,
            cancelled_at: None,
            cancelled_by: None,
            created_at: now,
        })
    }

    pub fn is_assigned_to(&self, rider_id: Uuid) -> bool {
        self.rider_id == Some(rider_id)
    }

    /// Returns true when this bid moved the booking out of `pending`.
    #[tracing::instrument(skip(self), fields(booking_id = %self.id))]
    pub fn record_bid(&mut self) -> Result<bool, Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::BidPlaced;
                Ok(true)
            }
            Status::BidPlaced | Status::PendingConfirmation => Ok(false),
            status => Err(invalid_state_error(format!(
                "cannot bid on a {} booking",
                status.name()
            ))),
        }
    }

    #[tracing::instrument(skip(self), fields(booking_id = %self.id))]
    pub fn await_confirmation(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending | Status::BidPlaced | Status::PendingConfirmation => {
                self.status = Status::PendingConfirmation;
                Ok(())
            }
            status => Err(invalid_state_error(format!(
                "cannot accept a {} booking",
                status.name()
            ))),
        }
    }

    #[tracing::instrument(skip(self, bid), fields(booking_id = %self.id, bid_id = %bid.id))]
    pub fn confirm(&mut self, bid: &Bid) -> Result<(), Error> {
        if bid.booking_id != self.id {
            return Err(invalid_input_error("bid does not belong to this booking"));
        }

        match self.status {
            Status::BidPlaced | Status::PendingConfirmation => {
                self.status = Status::Confirmed;
                self.rider_id = Some(bid.rider_id);
                self.confirmed_bid_id = Some(bid.id);
                Ok(())
            }
            Status::Confirmed | Status::InProgress | Status::Completed => {
                Err(conflict_error("booking already confirmed"))
            }
            status => Err(invalid_state_error(format!(
                "cannot accept a bid on a {} booking",
                status.name()
            ))),
        }
    }

    #[tracing::instrument(skip(self), fields(booking_id = %self.id))]
    pub fn start(&mut self, rider_id: Uuid, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.is_assigned_to(rider_id) {
            return Err(Error::Unauthorized);
        }

        match self.status {
            Status::Confirmed => {
                self.status = Status::InProgress;
                self.started_at = Some(now);
                self.started_by = Some(rider_id);
                Ok(())
            }
            status => Err(invalid_state_error(format!(
                "only confirmed rides can be started, ride is {}",
                status.name()
            ))),
        }
    }

    #[tracing::instrument(skip(self), fields(booking_id = %self.id))]
    pub fn finish(&mut self, rider_id: Uuid, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.is_assigned_to(rider_id) {
            return Err(Error::Unauthorized);
        }

        match self.status {
            Status::InProgress => {
                self.status = Status::Completed;
                self.completed_at = Some(now);
                self.completed_by = Some(rider_id);
                Ok(())
            }
            status => Err(invalid_state_error(format!(
                "only in-progress rides can be finished, ride is {}",
                status.name()
            ))),
        }
    }

    /// Hands a confirmed ride back to the open pool. Returns the bid that had
    /// been confirmed, if any.
    #[tracing::instrument(skip(self), fields(booking_id = %self.id))]
    pub fn reject(
        &mut self,
        rider_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, Error> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(invalid_input_error("rejection reason is required"));
        }

        if !self.is_assigned_to(rider_id) {
            return Err(Error::Unauthorized);
        }

        match self.status {
            Status::Confirmed => {
                self.status = Status::BidPlaced;
                self.rejection_reason = Some(reason.to_string());
                self.rejected_at = Some(now);
                self.rejected_by = Some(rider_id);
                self.rider_id = None;
                Ok(self.confirmed_bid_id.take())
            }
            status => Err(invalid_state_error(format!(
                "only confirmed rides can be rejected, ride is {}",
                status.name()
            ))),
        }
    }

    #[tracing::instrument(skip(self), fields(booking_id = %self.id))]
    pub fn cancel(&mut self, actor_id: Uuid, now: DateTime<Utc>) -> Result<(), Error> {
        if self.status.is_terminal() {
            return Err(invalid_state_error(format!(
                "booking is already {}",
                self.status.name()
            )));
        }

        self.status = Status::Cancelled;
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(actor_id);

        Ok(())
    }

    /// Administrative override. Moving back into an open state releases the
    /// assigned rider so the booking never reads as open-but-assigned.
    #[tracing::instrument(skip(self), fields(booking_id = %self.id))]
    pub fn override_status(&mut self, status: Status) -> Result<(), Error> {
        match status {
            Status::Pending | Status::BidPlaced | Status::PendingConfirmation => {
                self.rider_id = None;
                self.confirmed_bid_id = None;
            }
            Status::Confirmed | Status::InProgress | Status::Completed
                if self.rider_id.is_none() =>
            {
                return Err(invalid_state_error(format!(
                    "cannot mark a booking {} without an assigned rider",
                    status.name()
                )));
            }
            _ => (),
        }

        self.status = status;

        Ok(())
    }
}
