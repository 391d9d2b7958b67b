pub mod bids;
pub mod bookings;
pub mod members;
pub mod ride_limits;
