use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{RideLimitAPI, RideLimitOverview, RiderLimitStatus};
use crate::auth::User;
use crate::entities::{Eligibility, RideLimit};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct UpdateParams {
    daily_limit: u32,
    is_active: bool,
}

pub async fn global(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<RideLimitOverview>, Error> {
    let overview = api.global_ride_limit(user).await?;

    Ok(overview.into())
}

pub async fn update(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<UpdateParams>,
) -> Result<Json<RideLimit>, Error> {
    let ride_limit = api
        .update_ride_limit(user, params.daily_limit, params.is_active)
        .await?;

    Ok(ride_limit.into())
}

pub async fn reset_daily(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<RideLimit>, Error> {
    let ride_limit = api.reset_daily_usage(user).await?;

    Ok(ride_limit.into())
}

pub async fn reset_all(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<RideLimit>, Error> {
    let ride_limit = api.reset_ride_limits(user).await?;

    Ok(ride_limit.into())
}

pub async fn rider(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(rider_id): Path<Uuid>,
) -> Result<Json<RiderLimitStatus>, Error> {
    let status = api.rider_ride_limit(user, rider_id).await?;

    Ok(status.into())
}

pub async fn check(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(rider_id): Path<Uuid>,
) -> Result<Json<Eligibility>, Error> {
    let eligibility = api.check_eligibility(user, rider_id).await?;

    Ok(eligibility.into())
}
