use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::{RideLimitAPI, RideLimitOverview, RiderLimitStatus},
    auth::{Platform, User},
    entities::{Eligibility, RideLimit},
    error::Error,
    events::DomainEvent,
};

fn rider_status(ride_limit: &RideLimit, rider_id: Uuid, engine: &Engine) -> RiderLimitStatus {
    let now = Utc::now();
    let timezone = engine.ledger.timezone();

    RiderLimitStatus {
        rider_id,
        daily_limit: ride_limit.daily_limit,
        used_today: ride_limit.used_today(rider_id, now, timezone),
        remaining: ride_limit.remaining(rider_id, now, timezone),
        is_active: ride_limit.is_active,
    }
}

#[async_trait]
impl RideLimitAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn global_ride_limit(&self, user: User) -> Result<RideLimitOverview, Error> {
        self.authorize(user, "administer", Platform::default())?;

        let ride_limit = self.ledger.snapshot().await?;

        let mut riders: Vec<RiderLimitStatus> = ride_limit
            .daily_usage
            .keys()
            .map(|rider_id| rider_status(&ride_limit, *rider_id, self))
            .collect();
        riders.sort_by(|a, b| b.used_today.cmp(&a.used_today).then(a.rider_id.cmp(&b.rider_id)));

        Ok(RideLimitOverview {
            daily_limit: ride_limit.daily_limit,
            is_active: ride_limit.is_active,
            last_reset_at: ride_limit.last_reset_at,
            updated_at: ride_limit.updated_at,
            riders,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn update_ride_limit(
        &self,
        user: User,
        daily_limit: u32,
        is_active: bool,
    ) -> Result<RideLimit, Error> {
        self.authorize(user, "administer", Platform::default())?;

        let ride_limit = self.ledger.set_policy(daily_limit, is_active).await?;

        tracing::info!(daily_limit, is_active, "ride limit policy updated");

        Ok(ride_limit)
    }

    #[tracing::instrument(skip(self))]
    async fn reset_daily_usage(&self, user: User) -> Result<RideLimit, Error> {
        self.authorize(user, "administer", Platform::default())?;

        let ride_limit = self.ledger.reset_all().await?;

        self.publish(DomainEvent::RideLimitsReset);

        Ok(ride_limit)
    }

    #[tracing::instrument(skip(self))]
    async fn reset_ride_limits(&self, user: User) -> Result<RideLimit, Error> {
        self.authorize(user, "administer", Platform::default())?;

        let ride_limit = self.ledger.restore_defaults().await?;

        tracing::warn!("ride limits restored to defaults");

        self.publish(DomainEvent::RideLimitsReset);

        Ok(ride_limit)
    }

    #[tracing::instrument(skip(self))]
    async fn rider_ride_limit(
        &self,
        user: User,
        rider_id: Uuid,
    ) -> Result<RiderLimitStatus, Error> {
        self.authorize(user, "read_usage", rider_id.to_string())?;

        let ride_limit = self.ledger.snapshot().await?;

        Ok(rider_status(&ride_limit, rider_id, self))
    }

    #[tracing::instrument(skip(self))]
    async fn check_eligibility(&self, user: User, rider_id: Uuid) -> Result<Eligibility, Error> {
        self.authorize(user, "read_usage", rider_id.to_string())?;

        self.ledger.check_eligibility(rider_id).await
    }
}
