use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{BookingAPI, BookingListing, RideHistoryEntry};
use crate::auth::User;
use crate::entities::{Bid, Booking, BookingDetails, BookingStatus, VehicleSnapshot};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct AcceptParams {
    vehicle: VehicleSnapshot,
}

#[derive(Serialize, Deserialize)]
pub struct RejectParams {
    reason: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatusParams {
    status: BookingStatus,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(details): Json<BookingDetails>,
) -> Result<Json<Booking>, Error> {
    let booking = api.create_booking(user, details).await?;

    Ok(booking.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<BookingListing>>, Error> {
    let bookings = api.list_bookings(user).await?;

    Ok(bookings.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.find_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn history(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<RideHistoryEntry>>, Error> {
    let rides = api.ride_history(user).await?;

    Ok(rides.into())
}

pub async fn finished(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<Booking>>, Error> {
    let bookings = api.finished_rides(user).await?;

    Ok(bookings.into())
}

pub async fn active(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<Booking>>, Error> {
    let bookings = api.active_rides(user).await?;

    Ok(bookings.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<AcceptParams>,
) -> Result<Json<Bid>, Error> {
    let bid = api.accept_booking(user, id, params.vehicle).await?;

    Ok(bid.into())
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<RejectParams>,
) -> Result<Json<Booking>, Error> {
    let booking = api.reject_ride(user, id, params.reason).await?;

    Ok(booking.into())
}

pub async fn start(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.start_ride(user, id).await?;

    Ok(booking.into())
}

pub async fn finish(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.finish_ride(user, id).await?;

    Ok(booking.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.cancel_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn override_status(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<StatusParams>,
) -> Result<Json<Booking>, Error> {
    let booking = api.override_status(user, id, params.status).await?;

    Ok(booking.into())
}

pub async fn delete(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<()>, Error> {
    api.delete_booking(user, id).await?;

    Ok(().into())
}
