mod extract;
mod handlers;

pub use extract::user_from_headers;

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::Extension,
    routing::{get, patch, post, put},
    Router,
};

use crate::server::handlers::{bids, bookings, members, ride_limits};
use crate::{api::DynAPI, error::Error};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/members", post(members::register))
        .route("/app-commission", put(members::set_commission))
        .route("/bookings", post(bookings::create).get(bookings::list))
        .route("/bookings/history", get(bookings::history))
        .route("/bookings/finished", get(bookings::finished))
        .route("/bookings/active", get(bookings::active))
        .route("/bookings/:id", get(bookings::find).delete(bookings::delete))
        .route("/bookings/:id/accept", patch(bookings::accept))
        .route("/bookings/:id/reject", patch(bookings::reject))
        .route("/bookings/:id/start", patch(bookings::start))
        .route("/bookings/:id/finish", patch(bookings::finish))
        .route("/bookings/:id/cancel", patch(bookings::cancel))
        .route("/bookings/:id/status", patch(bookings::override_status))
        .route("/bids", post(bids::create))
        .route("/bids/:id/accept", patch(bids::accept))
        .route(
            "/ride-limits/global",
            get(ride_limits::global).put(ride_limits::update),
        )
        .route("/ride-limits/reset-daily", post(ride_limits::reset_daily))
        .route("/ride-limits/reset-all", post(ride_limits::reset_all))
        .route("/ride-limits/riders/:id", get(ride_limits::rider))
        .route("/ride-limits/check/:id", get(ride_limits::check))
        .layer(Extension(api))
}

pub async fn serve<F>(api: DynAPI, addr: SocketAddr, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| Error::Unexpected(err.to_string()))
}
