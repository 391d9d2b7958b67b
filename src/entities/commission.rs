use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionKind {
    Percentage,
    Fixed,
}

/// The platform's cut, as configured by an administrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppCommission {
    pub kind: CommissionKind,
    pub value: Decimal,
}

impl AppCommission {
    pub fn new(kind: CommissionKind, value: Decimal) -> Result<Self, Error> {
        if value.is_sign_negative() {
            return Err(invalid_input_error("commission cannot be negative"));
        }

        if kind == CommissionKind::Percentage && value > Decimal::ONE_HUNDRED {
            return Err(invalid_input_error("percentage commission cannot exceed 100"));
        }

        Ok(Self { kind, value })
    }

    /// What the rider keeps out of `amount` once the platform cut and the
    /// booking's own commission are taken off.
    pub fn rider_income(&self, amount: Decimal, booking_commission: Decimal) -> Decimal {
        let after_platform = match self.kind {
            CommissionKind::Percentage => {
                amount * (Decimal::ONE - self.value / Decimal::ONE_HUNDRED)
            }
            CommissionKind::Fixed => amount - self.value,
        };

        after_platform - booking_commission
    }
}

#[test]
fn percentage_income() {
    let commission = AppCommission::new(CommissionKind::Percentage, Decimal::from(10)).unwrap();

    assert_eq!(
        commission.rider_income(Decimal::from(1000), Decimal::from(50)),
        Decimal::from(850)
    );
}

#[test]
fn fixed_income() {
    let commission = AppCommission::new(CommissionKind::Fixed, Decimal::from(100)).unwrap();

    assert_eq!(
        commission.rider_income(Decimal::from(1200), Decimal::from(50)),
        Decimal::from(1050)
    );
}

#[test]
fn commission_bounds() {
    assert!(AppCommission::new(CommissionKind::Percentage, Decimal::from(101)).is_err());
    assert!(AppCommission::new(CommissionKind::Fixed, Decimal::from(-1)).is_err());
    assert!(AppCommission::new(CommissionKind::Fixed, Decimal::from(500)).is_ok());
}
