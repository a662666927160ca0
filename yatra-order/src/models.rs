use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use yatra_catalog::{FareBreakdown, FareEngine, PricingError, SeatId};
use yatra_core::{
    BookingPaymentStatus, CreateBookingRequest, CreatedBooking, PassengerDetails, PaymentMethod,
    ScheduleSelection,
};

/// The in-progress reservation handed from stage to stage. Nothing here is persisted on the
/// backend until the payment stage creates the booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub schedule: ScheduleSelection,
    pub journey_date: NaiveDate,
    /// In selection order; only the count matters for pricing
    pub seats: Vec<SeatId>,
    pub passenger: PassengerDetails,
    pub fare: FareBreakdown,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
}

impl BookingDraft {
    pub fn seat_count(&self) -> u32 {
        self.seats.len() as u32
    }

    pub fn seat_labels(&self) -> Vec<String> {
        self.seats.iter().map(SeatId::to_string).collect()
    }

    /// Replace the carried fare with one recomputed from (fare per seat, seat count)
    pub fn reprice(&mut self, fares: &FareEngine) -> Result<&FareBreakdown, PricingError> {
        let fare = fares.quote(self.schedule.fare_per_seat, self.seat_count())?;
        if fare.subtotal != self.fare.subtotal {
            tracing::warn!(
                schedule_id = self.schedule.schedule_id,
                carried = %self.fare.grand_total,
                recomputed = %fare.grand_total,
                "Carried fare drifted from recomputed fare"
            );
        }
        self.fare = fare;
        Ok(&self.fare)
    }

    /// Payload for the booking-create call
    pub fn to_create_request(&self, method: PaymentMethod, idempotency_key: Uuid) -> CreateBookingRequest {
        CreateBookingRequest {
            schedule_id: self.schedule.schedule_id,
            journey_date: self.journey_date,
            number_of_seats: self.seat_count(),
            seat_numbers: self.seat_labels(),
            passenger_name: self.passenger.name.trim().to_string(),
            passenger_phone: self.passenger.phone.clone(),
            passenger_email: self.passenger.email.clone(),
            pickup_point: self.passenger.resolved_pickup(&self.schedule),
            drop_point: self.passenger.resolved_drop(&self.schedule),
            special_requests: self.passenger.special_requests_or_empty(),
            total_amount: self.fare.grand_total.to_decimal(),
            payment_method: method,
            payment_status: method.booking_payment_status(),
            idempotency_key,
        }
    }
}

/// A booking the backend accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedBooking {
    pub booking_id: String,
    pub booking_reference: String,
    pub draft: BookingDraft,
    pub payment_method: PaymentMethod,
    pub payment_status: BookingPaymentStatus,
    #[serde(default)]
    pub authorization_id: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}

impl ConfirmedBooking {
    pub fn new(
        draft: BookingDraft,
        created: CreatedBooking,
        payment_method: PaymentMethod,
        authorization_id: Option<String>,
    ) -> Self {
        Self {
            booking_id: created.booking_id,
            booking_reference: created.booking_reference,
            draft,
            payment_method,
            payment_status: payment_method.booking_payment_status(),
            authorization_id,
            confirmed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveTime;
    use yatra_shared::Money;

    pub fn schedule() -> ScheduleSelection {
        ScheduleSelection {
            schedule_id: 42,
            bus_id: 7,
            bus_number: "BA 2 KHA 1234".to_string(),
            bus_type: "Deluxe".to_string(),
            vendor_name: "Sajha Yatayat".to_string(),
            vendor_rating: Some(4.5),
            origin: "Kathmandu".to_string(),
            destination: "Pokhara".to_string(),
            departure_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            fare_per_seat: Money::from_major(1000),
            total_seats: 40,
        }
    }

    pub fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
    }

    pub fn passenger() -> PassengerDetails {
        PassengerDetails::new("Sita Sharma", "9851234567", "sita@example.com")
    }

    pub fn draft(seats: &[&str]) -> BookingDraft {
        let schedule = schedule();
        let seats: Vec<SeatId> = seats.iter().map(|s| s.parse().unwrap()).collect();
        BookingDraft {
            fare: FareEngine::default()
                .seat_fare(schedule.fare_per_seat, seats.len() as u32)
                .unwrap(),
            schedule,
            journey_date: date(),
            seats,
            passenger: passenger(),
            payment_method: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yatra_shared::Money;

    #[test]
    fn test_create_request_defaults_points_and_totals() {
        let mut draft = fixtures::draft(&["A2", "A1"]);
        draft.reprice(&FareEngine::default()).unwrap();

        let request = draft.to_create_request(PaymentMethod::Cash, Uuid::nil());
        assert_eq!(request.seat_numbers, vec!["A2".to_string(), "A1".to_string()]);
        assert_eq!(request.number_of_seats, 2);
        assert_eq!(request.pickup_point, "Kathmandu");
        assert_eq!(request.drop_point, "Pokhara");
        assert_eq!(request.payment_status, BookingPaymentStatus::Pending);
        // 2000 + 2% + 5%
        assert_eq!(request.total_amount, 2140.0);
    }

    #[test]
    fn test_reprice_ignores_carried_total() {
        let mut draft = fixtures::draft(&["A1"]);
        draft.fare.grand_total = Money::from_major(1);
        draft.fare.service_fee = Money::from_major(999);

        let fare = *draft.reprice(&FareEngine::default()).unwrap();
        assert!(fare.is_consistent());
        assert_eq!(fare.grand_total, Money::from_major(1070));
    }
}
