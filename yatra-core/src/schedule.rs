use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use yatra_shared::Money;

use crate::{CoreError, CoreResult};

/// Seats assumed when the backend does not report a capacity
pub const DEFAULT_TOTAL_SEATS: u32 = 40;

/// Largest bus the lettered layout can describe (rows A..Z, 4 seats each)
pub const MAX_TOTAL_SEATS: u32 = 26 * 4;

fn default_total_seats() -> u32 {
    DEFAULT_TOTAL_SEATS
}

/// Snapshot of the schedule chosen on the search page. Read-only for the rest of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSelection {
    pub schedule_id: i64,
    pub bus_id: i64,
    pub bus_number: String,
    pub bus_type: String,
    pub vendor_name: String,
    #[serde(default)]
    pub vendor_rating: Option<f32>,
    pub origin: String,
    pub destination: String,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    /// Rupees on the wire
    #[serde(with = "yatra_shared::money::decimal")]
    pub fare_per_seat: Money,
    #[serde(default = "default_total_seats")]
    pub total_seats: u32,
}

impl ScheduleSelection {
    pub fn validate(&self) -> CoreResult<()> {
        if self.schedule_id <= 0 {
            return Err(CoreError::ValidationError(format!(
                "invalid schedule id {}",
                self.schedule_id
            )));
        }
        if self.fare_per_seat.is_zero() || self.fare_per_seat.minor() < 0 {
            return Err(CoreError::ValidationError(format!(
                "schedule {} has no fare",
                self.schedule_id
            )));
        }
        if self.total_seats == 0 || self.total_seats > MAX_TOTAL_SEATS {
            return Err(CoreError::ValidationError(format!(
                "schedule {} has an unsupported capacity of {} seats",
                self.schedule_id, self.total_seats
            )));
        }
        Ok(())
    }

    /// e.g. "Kathmandu → Pokhara"
    pub fn route_label(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_schedule() {
        assert!(fixtures::schedule().validate().is_ok());

        let mut free = fixtures::schedule();
        free.fare_per_seat = Money::ZERO;
        assert!(free.validate().is_err());

        let mut huge = fixtures::schedule();
        huge.total_seats = 120;
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_total_seats_defaults_when_missing() {
        let json = serde_json::json!({
            "schedule_id": 1,
            "bus_id": 2,
            "bus_number": "GA 1 KHA 99",
            "bus_type": "Seater",
            "vendor_name": "Greenline",
            "origin": "Pokhara",
            "destination": "Chitwan",
            "departure_time": "06:30:00",
            "arrival_time": "11:00:00",
            "fare_per_seat": 900
        });

        let schedule: ScheduleSelection = serde_json::from_value(json).unwrap();
        assert_eq!(schedule.total_seats, DEFAULT_TOTAL_SEATS);
        assert_eq!(schedule.fare_per_seat, Money::from_major(900));
    }

    #[test]
    fn test_fare_read_in_rupees() {
        let mut json = serde_json::to_value(fixtures::schedule()).unwrap();
        assert_eq!(json["fare_per_seat"], serde_json::json!(1000.0));

        json["fare_per_seat"] = serde_json::json!(1250.5);
        let schedule: ScheduleSelection = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(schedule.fare_per_seat, Money::from_minor(125050));

        json["fare_per_seat"] = serde_json::json!("1250.50");
        let schedule: ScheduleSelection = serde_json::from_value(json).unwrap();
        assert_eq!(schedule.fare_per_seat, Money::from_minor(125050));
    }
}
