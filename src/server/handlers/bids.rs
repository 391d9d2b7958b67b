use axum::extract::{Extension, Json, Path};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::BidAPI;
use crate::auth::User;
use crate::entities::{Bid, Booking, VehicleSnapshot};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    booking_id: Uuid,
    amount: Decimal,
    vehicle: VehicleSnapshot,
}

#[derive(Serialize, Deserialize)]
pub struct AcceptParams {
    booking_id: Uuid,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<CreateParams>,
) -> Result<Json<Bid>, Error> {
    let bid = api
        .place_bid(user, params.booking_id, params.amount, params.vehicle)
        .await?;

    Ok(bid.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<AcceptParams>,
) -> Result<Json<Booking>, Error> {
    let booking = api.accept_bid(user, params.booking_id, id).await?;

    Ok(booking.into())
}
