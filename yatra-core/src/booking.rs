use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use yatra_shared::Masked;

use crate::payment::{BookingPaymentStatus, PaymentMethod};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /bookings/create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub schedule_id: i64,
    pub journey_date: NaiveDate,
    pub number_of_seats: u32,
    pub seat_numbers: Vec<String>,
    pub passenger_name: String,
    pub passenger_phone: Masked<String>,
    pub passenger_email: Masked<String>,
    pub pickup_point: String,
    pub drop_point: String,
    pub special_requests: String,
    /// Decimal major units, as the backend stores it
    pub total_amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: BookingPaymentStatus,
    pub idempotency_key: Uuid,
}

/// Seats already taken for a (schedule, journey date) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAvailability {
    #[serde(default)]
    pub booked_seats: Vec<String>,
    /// Seats temporarily held by other customers
    #[serde(default)]
    pub locked_seats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedBooking {
    #[serde(alias = "id", deserialize_with = "id_as_string")]
    pub booking_id: String,
    pub booking_reference: String,
}

/// Standard `{status, data, message}` envelope returned by every backend route
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAvailabilityData {
    pub seat_availability: SeatAvailability,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingData {
    pub booking: CreatedBooking,
}

/// Backend ids arrive as integers from some routes and strings from others
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}
