use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, Error};

pub const DEFAULT_DAILY_LIMIT: u32 = 10;
pub const MAX_DAILY_LIMIT: u32 = 100;

/// The global cap on ride actions (bids and accepts) each rider may take per
/// calendar day, together with today's usage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RideLimit {
    pub daily_limit: u32,
    pub is_active: bool,
    pub last_reset_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub daily_usage: HashMap<Uuid, RiderUsage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderUsage {
    pub rides_used: u32,
    pub last_ride_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub allowed: bool,
    pub reason: Option<String>,
    pub remaining: u32,
}

/// Calendar date of `at` in the deployment timezone.
pub fn local_date(at: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    at.with_timezone(&timezone).date_naive()
}

pub fn validate_daily_limit(daily_limit: u32) -> Result<(), Error> {
    if !(1..=MAX_DAILY_LIMIT).contains(&daily_limit) {
        return Err(invalid_input_error(format!(
            "daily limit must be between 1 and {}",
            MAX_DAILY_LIMIT
        )));
    }

    Ok(())
}

impl RiderUsage {
    /// A stored count only applies to the day it was recorded on.
    pub fn is_stale(&self, now: DateTime<Utc>, timezone: Tz) -> bool {
        local_date(self.last_ride_at, timezone) != local_date(now, timezone)
    }

    pub fn used_today(usage: Option<&RiderUsage>, now: DateTime<Utc>, timezone: Tz) -> u32 {
        match usage {
            Some(usage) if !usage.is_stale(now, timezone) => usage.rides_used,
            _ => 0,
        }
    }

    /// The usage after one more counted action at `now`.
    pub fn advance(previous: Option<&RiderUsage>, now: DateTime<Utc>, timezone: Tz) -> RiderUsage {
        RiderUsage {
            rides_used: RiderUsage::used_today(previous, now, timezone) + 1,
            last_ride_at: now,
        }
    }
}

impl RideLimit {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            is_active: true,
            last_reset_at: now,
            created_at: now,
            updated_at: now,
            daily_usage: HashMap::new(),
        }
    }

    pub fn used_today(&self, rider_id: Uuid, now: DateTime<Utc>, timezone: Tz) -> u32 {
        RiderUsage::used_today(self.daily_usage.get(&rider_id), now, timezone)
    }

    pub fn remaining(&self, rider_id: Uuid, now: DateTime<Utc>, timezone: Tz) -> u32 {
        self.daily_limit
            .saturating_sub(self.used_today(rider_id, now, timezone))
    }

    /// Whether the rider may take another ride action today. Does not write
    /// anything back, a stale count simply reads as zero.
    pub fn eligibility(&self, rider_id: Uuid, now: DateTime<Utc>, timezone: Tz) -> Eligibility {
        let remaining = self.remaining(rider_id, now, timezone);

        if !self.is_active {
            return Eligibility {
                allowed: false,
                reason: Some("ride limits are currently disabled".into()),
                remaining,
            };
        }

        if remaining == 0 {
            return Eligibility {
                allowed: false,
                reason: Some("daily ride limit reached".into()),
                remaining,
            };
        }

        Eligibility {
            allowed: true,
            reason: None,
            remaining,
        }
    }

    pub fn set_policy(&mut self, daily_limit: u32, is_active: bool, now: DateTime<Utc>) -> Result<(), Error> {
        validate_daily_limit(daily_limit)?;

        self.daily_limit = daily_limit;
        self.is_active = is_active;
        self.updated_at = now;

        Ok(())
    }

    pub fn clear_usage(&mut self, now: DateTime<Utc>) {
        self.daily_usage.clear();
        self.last_reset_at = now;
        self.updated_at = now;
    }
}
