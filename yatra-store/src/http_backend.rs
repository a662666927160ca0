use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use yatra_core::booking::{ApiEnvelope, BookingData, SeatAvailabilityData};
use yatra_core::{
    BackendError, BookingBackend, CreateBookingRequest, CreatedBooking, SeatAvailability,
};

use crate::app_config::BackendConfig;
use crate::StoreResult;

/// Header carrying the per-attempt key for booking creation
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// REST client for the booking backend
#[derive(Clone)]
pub struct HttpBookingBackend {
    client: Client,
    base_url: String,
}

impl HttpBookingBackend {
    pub fn new(config: &BackendConfig) -> StoreResult<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let envelope: ApiEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        if !envelope.is_success() {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            });
        }

        envelope
            .data
            .ok_or_else(|| BackendError::Decode("response has no data".to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    BackendError::Network(e.to_string())
}

/// Best-effort `message` from an error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn status_error(status: StatusCode, body: &str) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        StatusCode::CONFLICT => BackendError::SeatConflict(error_message(body)),
        _ => BackendError::Rejected {
            status: status.as_u16(),
            message: error_message(body),
        },
    }
}

#[async_trait]
impl BookingBackend for HttpBookingBackend {
    async fn fetch_seat_availability(
        &self,
        schedule_id: i64,
        journey_date: NaiveDate,
    ) -> Result<SeatAvailability, BackendError> {
        let date = journey_date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(format!("{}/schedules/{}/seats", self.base_url, schedule_id))
            .query(&[("journey_date", date.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let data: SeatAvailabilityData = Self::read_envelope(response).await?;
        tracing::debug!(
            schedule_id,
            journey_date = %date,
            booked = data.seat_availability.booked_seats.len(),
            "Fetched seat availability"
        );
        Ok(data.seat_availability)
    }

    async fn create_booking(
        &self,
        request: &CreateBookingRequest,
        bearer: &str,
        idempotency_key: Uuid,
    ) -> Result<CreatedBooking, BackendError> {
        let response = self
            .client
            .post(format!("{}/bookings/create", self.base_url))
            .bearer_auth(bearer)
            .header(IDEMPOTENCY_HEADER, idempotency_key.to_string())
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let data: BookingData = Self::read_envelope(response).await?;
        tracing::info!(
            booking_id = %data.booking.booking_id,
            schedule_id = request.schedule_id,
            seats = request.number_of_seats,
            "Booking created"
        );
        Ok(data.booking)
    }

    async fn send_ticket_email(&self, booking_id: &str, bearer: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(format!("{}/bookings/{}/send-email", self.base_url, booking_id))
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.map_err(transport_error)?;
        Err(status_error(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use yatra_core::{BookingPaymentStatus, PaymentMethod};
    use yatra_shared::Masked;

    async fn backend(server: &MockServer) -> HttpBookingBackend {
        HttpBookingBackend::new(&BackendConfig {
            base_url: format!("{}/api/", server.uri()),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    fn request(key: Uuid) -> CreateBookingRequest {
        CreateBookingRequest {
            schedule_id: 42,
            journey_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            number_of_seats: 1,
            seat_numbers: vec!["A1".to_string()],
            passenger_name: "Sita Sharma".to_string(),
            passenger_phone: Masked::from("9851234567"),
            passenger_email: Masked::from("sita@example.com"),
            pickup_point: "Kathmandu".to_string(),
            drop_point: "Pokhara".to_string(),
            special_requests: String::new(),
            total_amount: 1070.0,
            payment_method: PaymentMethod::Cash,
            payment_status: BookingPaymentStatus::Pending,
            idempotency_key: key,
        }
    }

    #[tokio::test]
    async fn test_fetch_seat_availability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/schedules/42/seats"))
            .and(query_param("journey_date", "2026-11-02"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": { "seatAvailability": { "bookedSeats": ["A1", "B3"], "lockedSeats": ["C2"] } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let availability = backend(&server)
            .await
            .fetch_seat_availability(42, NaiveDate::from_ymd_opt(2026, 11, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(availability.booked_seats, vec!["A1", "B3"]);
        assert_eq!(availability.locked_seats, vec!["C2"]);
    }

    #[tokio::test]
    async fn test_create_booking_sends_bearer_and_key() {
        let server = MockServer::start().await;
        let key = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/api/bookings/create"))
            .and(header("authorization", "Bearer token-123"))
            .and(header(IDEMPOTENCY_HEADER, key.to_string().as_str()))
            .and(body_partial_json(json!({
                "scheduleId": 42,
                "seatNumbers": ["A1"],
                "paymentMethod": "cash",
                "paymentStatus": "pending"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "success",
                "data": { "booking": { "booking_id": 77, "booking_reference": "YT-000077" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = backend(&server)
            .await
            .create_booking(&request(key), "token-123", key)
            .await
            .unwrap();
        assert_eq!(created.booking_id, "77");
        assert_eq!(created.booking_reference, "YT-000077");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bookings/create"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({ "status": "error", "message": "Seat A1 already booked" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/bookings/9/send-email"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let backend = backend(&server).await;
        let key = Uuid::new_v4();
        let err = backend.create_booking(&request(key), "t", key).await.unwrap_err();
        assert_eq!(err, BackendError::SeatConflict("Seat A1 already booked".to_string()));

        let err = backend.send_ticket_email("9", "t").await.unwrap_err();
        assert_eq!(err, BackendError::Unauthorized);
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/schedules/42/seats"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "error", "message": "Schedule not found" })),
            )
            .mount(&server)
            .await;

        let err = backend(&server)
            .await
            .fetch_seat_availability(42, NaiveDate::from_ymd_opt(2026, 11, 2).unwrap())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::Rejected {
                status: 200,
                message: "Schedule not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let backend = HttpBookingBackend::new(&BackendConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
        })
        .unwrap();
        let err = backend.send_ticket_email("1", "t").await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_)));
    }
}
