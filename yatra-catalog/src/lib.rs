pub mod availability;
pub mod pricing;
pub mod seats;

pub use availability::{
    AvailabilityRequest, AvailabilityState, AvailabilityTracker, CommitOutcome, RequestToken,
    SeatAvailabilitySnapshot,
};
pub use pricing::{FareBreakdown, FareConfig, FareEngine, FeeRule, PricingError};
pub use seats::{SeatError, SeatId, SeatLayout, SeatMap, SeatStatus};
