use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::booking::{CreateBookingRequest, CreatedBooking, SeatAvailability};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Seat no longer available: {0}")]
    SeatConflict(String),

    #[error("Backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// The request may have been applied even though no usable answer came back
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, BackendError::Network(_) | BackendError::Decode(_))
    }
}

/// REST backend the booking pipeline talks to
#[async_trait]
pub trait BookingBackend: Send + Sync {
    /// Seats booked (or held) for a schedule on a journey date
    async fn fetch_seat_availability(
        &self,
        schedule_id: i64,
        journey_date: NaiveDate,
    ) -> Result<SeatAvailability, BackendError>;

    /// The single mutating call of the pipeline
    async fn create_booking(
        &self,
        request: &CreateBookingRequest,
        bearer: &str,
        idempotency_key: Uuid,
    ) -> Result<CreatedBooking, BackendError>;

    /// Ask the backend to email the ticket
    async fn send_ticket_email(&self, booking_id: &str, bearer: &str) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_unknown() {
        assert!(BackendError::Network("reset".to_string()).outcome_unknown());
        assert!(BackendError::Decode("eof".to_string()).outcome_unknown());
        assert!(!BackendError::Unauthorized.outcome_unknown());
        assert!(!BackendError::SeatConflict("A1".to_string()).outcome_unknown());
    }
}
