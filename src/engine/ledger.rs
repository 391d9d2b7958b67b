use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use uuid::Uuid;

use crate::db::Store;
use crate::entities::{validate_daily_limit, Eligibility, RideLimit, RiderUsage};
use crate::error::Error;

/// Daily ride-action budget per rider.
///
/// Callers check eligibility and then record the action as two separate
/// steps. Two requests for the same rider that are in flight together can
/// both pass the check before either records, so a rider may overshoot the
/// cap by at most the number of their concurrent requests. Recording itself
/// is an atomic per-rider increment, so no action is ever lost.
#[derive(Clone)]
pub struct RideLimitLedger {
    store: Arc<dyn Store>,
    timezone: Tz,
}

impl RideLimitLedger {
    pub fn new(store: Arc<dyn Store>, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    #[tracing::instrument(skip(self))]
    pub async fn check_eligibility(&self, rider_id: Uuid) -> Result<Eligibility, Error> {
        let now = Utc::now();
        let ride_limit = self.store.ride_limit(now).await?;

        Ok(ride_limit.eligibility(rider_id, now, self.timezone))
    }

    /// Like `check_eligibility`, but a refusal becomes `Error::RateLimited`.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_eligible(&self, rider_id: Uuid) -> Result<Eligibility, Error> {
        let now = Utc::now();
        let ride_limit = self.store.ride_limit(now).await?;
        let eligibility = ride_limit.eligibility(rider_id, now, self.timezone);

        if !eligibility.allowed {
            tracing::info!(%rider_id, remaining = eligibility.remaining, "ride action refused");

            return Err(Error::RateLimited {
                reason: eligibility.reason.unwrap_or_default(),
                remaining: eligibility.remaining,
                daily_limit: ride_limit.daily_limit,
            });
        }

        Ok(eligibility)
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_action(&self, rider_id: Uuid) -> Result<RiderUsage, Error> {
        let usage = self
            .store
            .increment_rider_usage(rider_id, Utc::now(), self.timezone)
            .await?;

        tracing::debug!(%rider_id, rides_used = usage.rides_used, "ride action recorded");

        Ok(usage)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_policy(&self, daily_limit: u32, is_active: bool) -> Result<RideLimit, Error> {
        validate_daily_limit(daily_limit)?;

        self.store
            .save_ride_limit_policy(daily_limit, is_active, Utc::now())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reset_all(&self) -> Result<RideLimit, Error> {
        let ride_limit = self.store.clear_daily_usage(Utc::now()).await?;

        tracing::info!(last_reset_at = %ride_limit.last_reset_at, "daily ride usage cleared");

        Ok(ride_limit)
    }

    /// Scheduled variant of `reset_all`; an inactive ledger is left alone.
    #[tracing::instrument(skip(self))]
    pub async fn reset_if_active(&self) -> Result<Option<RideLimit>, Error> {
        let ride_limit = self.store.ride_limit(Utc::now()).await?;

        if !ride_limit.is_active {
            tracing::info!("ride limits inactive, skipping daily reset");
            return Ok(None);
        }

        self.reset_all().await.map(Some)
    }

    /// Recreates the singleton with default policy and no usage.
    #[tracing::instrument(skip(self))]
    pub async fn restore_defaults(&self) -> Result<RideLimit, Error> {
        let ride_limit = RideLimit::new(Utc::now());

        self.store.replace_ride_limit(&ride_limit).await?;

        Ok(ride_limit)
    }

    pub async fn snapshot(&self) -> Result<RideLimit, Error> {
        self.store.ride_limit(Utc::now()).await
    }
}
