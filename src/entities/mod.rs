mod bid;
pub(crate) mod booking;
mod commission;
mod location;
mod member;
mod ride_limit;
mod vehicle;

pub use bid::{Bid, Status as BidStatus};
pub use booking::{Booking, BookingDetails, Status as BookingStatus};
pub use commission::{AppCommission, CommissionKind};
pub use location::{Coordinates, Location};
pub use member::{Member, Status as MemberStatus};
pub use ride_limit::{
    local_date, validate_daily_limit, Eligibility, RideLimit, RiderUsage, DEFAULT_DAILY_LIMIT,
    MAX_DAILY_LIMIT,
};
pub use vehicle::VehicleSnapshot;
