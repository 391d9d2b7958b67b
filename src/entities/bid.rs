use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{AppCommission, Booking, VehicleSnapshot};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub rider_id: Uuid,
    pub amount: Decimal,
    /// Commission policy in force when the bid was placed.
    pub commission: AppCommission,
    pub rider_income: Decimal,
    pub vehicle: VehicleSnapshot,
    pub status: Status,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    PendingConfirmation,
    Accepted,
    Rejected,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingConfirmation => "pending_confirmation",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl Bid {
    pub fn new(
        booking: &Booking,
        rider_id: Uuid,
        amount: Decimal,
        commission: AppCommission,
        vehicle: VehicleSnapshot,
        status: Status,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            rider_id,
            rider_income: commission.rider_income(amount, booking.commission),
            amount,
            commission,
            vehicle,
            status,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A bid the booking's requester can still act on.
    pub fn is_open(&self) -> bool {
        matches!(self.status, Status::Pending | Status::PendingConfirmation)
    }

    /// Rewrites the priced fields of an open bid, keeping its identity and
    /// creation time.
    pub fn revise(&mut self, other: &Bid) {
        self.amount = other.amount;
        self.commission = other.commission.clone();
        self.rider_income = other.rider_income;
        self.vehicle = other.vehicle.clone();
        self.updated_at = other.updated_at;
    }

    pub fn accept(&mut self, now: DateTime<Utc>) {
        self.status = Status::Accepted;
        self.updated_at = now;
    }

    pub fn reject(&mut self, reason: Option<String>, now: DateTime<Utc>) {
        self.status = Status::Rejected;
        if reason.is_some() {
            self.rejection_reason = reason;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::booking::tests::{details, vehicle};
    use crate::entities::CommissionKind;

    #[test]
    fn income_is_captured_at_bid_time() {
        let booking = Booking::new(Uuid::new_v4(), details(900, 100), Utc::now()).unwrap();
        let commission =
            AppCommission::new(CommissionKind::Percentage, Decimal::from(10)).unwrap();

        let bid = Bid::new(
            &booking,
            Uuid::new_v4(),
            Decimal::from(1000),
            commission,
            vehicle(),
            Status::Pending,
            Utc::now(),
        );

        assert_eq!(bid.rider_income, Decimal::from(800));
        assert!(bid.is_open());
    }

    #[test]
    fn revise_keeps_identity() {
        let booking = Booking::new(Uuid::new_v4(), details(900, 100), Utc::now()).unwrap();
        let fixed = AppCommission::new(CommissionKind::Fixed, Decimal::from(50)).unwrap();
        let rider_id = Uuid::new_v4();

        let mut bid = Bid::new(
            &booking,
            rider_id,
            Decimal::from(1000),
            fixed.clone(),
            vehicle(),
            Status::Pending,
            Utc::now(),
        );
        let replacement = Bid::new(
            &booking,
            rider_id,
            Decimal::from(1200),
            fixed,
            vehicle(),
            Status::Pending,
            Utc::now(),
        );

        let (id, created_at) = (bid.id, bid.created_at);
        bid.revise(&replacement);

        assert_eq!(bid.id, id);
        assert_eq!(bid.created_at, created_at);
        assert_eq!(bid.amount, Decimal::from(1200));
        assert_eq!(bid.rider_income, Decimal::from(1050));
    }

    #[test]
    fn reject_keeps_existing_reason() {
        let booking = Booking::new(Uuid::new_v4(), details(900, 100), Utc::now()).unwrap();
        let fixed = AppCommission::new(CommissionKind::Fixed, Decimal::ZERO).unwrap();
        let mut bid = Bid::new(
            &booking,
            Uuid::new_v4(),
            Decimal::from(1000),
            fixed,
            vehicle(),
            Status::Accepted,
            Utc::now(),
        );

        bid.reject(Some("vehicle breakdown".into()), Utc::now());
        bid.reject(None, Utc::now());

        assert_eq!(bid.status, Status::Rejected);
        assert_eq!(bid.rejection_reason.as_deref(), Some("vehicle breakdown"));
    }
}
