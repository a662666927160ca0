use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use yatra_core::{BackendError, SeatAvailability};

use crate::seats::SeatId;

/// Monotonic id of an availability read; only the newest one may update state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A read the caller must perform against the backend and then hand back via `commit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRequest {
    pub token: RequestToken,
    pub schedule_id: i64,
    pub journey_date: NaiveDate,
}

/// Occupied seats for one (schedule, journey date) pair. Superseded, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatAvailabilitySnapshot {
    pub schedule_id: i64,
    pub journey_date: NaiveDate,
    pub booked: BTreeSet<SeatId>,
    pub locked: BTreeSet<SeatId>,
    pub fetched_at: DateTime<Utc>,
}

impl SeatAvailabilitySnapshot {
    pub fn from_response(request: &AvailabilityRequest, response: SeatAvailability) -> Self {
        let parse = |ids: Vec<String>| -> BTreeSet<SeatId> {
            ids.into_iter()
                .filter_map(|raw| match raw.parse::<SeatId>() {
                    Ok(seat) => Some(seat),
                    Err(e) => {
                        tracing::warn!(
                            schedule_id = request.schedule_id,
                            seat = %raw,
                            "Ignoring unrecognised seat in availability response: {}", e
                        );
                        None
                    }
                })
                .collect()
        };

        let booked = parse(response.booked_seats);
        // A seat that is both booked and locked is reported as booked
        let locked = parse(response.locked_seats)
            .into_iter()
            .filter(|seat| !booked.contains(seat))
            .collect();

        Self {
            schedule_id: request.schedule_id,
            journey_date: request.journey_date,
            booked,
            locked,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_booked(&self, seat: &SeatId) -> bool {
        self.booked.contains(seat)
    }

    pub fn is_locked(&self, seat: &SeatId) -> bool {
        self.locked.contains(seat)
    }

    /// Neither booked nor held by another customer
    pub fn is_unavailable(&self, seat: &SeatId) -> bool {
        self.is_booked(seat) || self.is_locked(seat)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvailabilityState {
    /// A read is in flight; the seat map is not interactive
    Loading,
    Ready(SeatAvailabilitySnapshot),
    /// The last read failed; the user may retry
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    Failed,
    /// Response to a superseded request, dropped
    Stale,
}

/// Tracks the availability read for the active (schedule, date) and guards against late
/// responses overwriting newer state.
#[derive(Debug, Clone)]
pub struct AvailabilityTracker {
    last_token: u64,
    pending: Option<AvailabilityRequest>,
    state: AvailabilityState,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self {
            last_token: 0,
            pending: None,
            state: AvailabilityState::Loading,
        }
    }

    /// Start a new read, superseding any read still in flight
    pub fn request(&mut self, schedule_id: i64, journey_date: NaiveDate) -> AvailabilityRequest {
        self.last_token += 1;
        let request = AvailabilityRequest {
            token: RequestToken(self.last_token),
            schedule_id,
            journey_date,
        };

        if let Some(previous) = self.pending.replace(request.clone()) {
            tracing::debug!(
                superseded = previous.token.value(),
                token = request.token.value(),
                "Availability request superseded"
            );
        }
        self.state = AvailabilityState::Loading;
        request
    }

    /// Apply the result of a read if it answers the newest request
    pub fn commit(
        &mut self,
        token: RequestToken,
        result: Result<SeatAvailability, BackendError>,
    ) -> CommitOutcome {
        let request = match self.pending.take() {
            Some(pending) if pending.token == token => pending,
            other => {
                self.pending = other;
                tracing::debug!(token = token.value(), "Dropping stale availability response");
                return CommitOutcome::Stale;
            }
        };

        match result {
            Ok(response) => {
                let snapshot = SeatAvailabilitySnapshot::from_response(&request, response);
                tracing::debug!(
                    schedule_id = request.schedule_id,
                    journey_date = %request.journey_date,
                    booked = snapshot.booked.len(),
                    locked = snapshot.locked.len(),
                    "Seat availability refreshed"
                );
                self.state = AvailabilityState::Ready(snapshot);
                CommitOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(
                    schedule_id = request.schedule_id,
                    journey_date = %request.journey_date,
                    "Seat availability fetch failed: {}", e
                );
                self.state = AvailabilityState::Failed(format!("Could not load seat availability: {}", e));
                CommitOutcome::Failed
            }
        }
    }

    pub fn state(&self) -> &AvailabilityState {
        &self.state
    }

    pub fn pending(&self) -> Option<&AvailabilityRequest> {
        self.pending.as_ref()
    }

    pub fn snapshot(&self) -> Option<&SeatAvailabilitySnapshot> {
        match &self.state {
            AvailabilityState::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.state, AvailabilityState::Ready(_))
    }
}

impl Default for AvailabilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, day).unwrap()
    }

    fn booked(seats: &[&str]) -> SeatAvailability {
        SeatAvailability {
            booked_seats: seats.iter().map(|s| s.to_string()).collect(),
            locked_seats: vec![],
        }
    }

    #[test]
    fn test_commit_latest_response() {
        let mut tracker = AvailabilityTracker::new();
        let request = tracker.request(42, date(2));
        assert!(!tracker.is_interactive());

        assert_eq!(tracker.commit(request.token, Ok(booked(&["B3"]))), CommitOutcome::Applied);
        let snapshot = tracker.snapshot().unwrap();
        assert!(snapshot.is_booked(&"B3".parse().unwrap()));
        assert_eq!(snapshot.journey_date, date(2));
    }

    #[test]
    fn test_late_response_for_old_date_is_dropped() {
        let mut tracker = AvailabilityTracker::new();
        let first = tracker.request(42, date(2));
        let second = tracker.request(42, date(3));

        // Old response arrives after the new request was issued
        assert_eq!(tracker.commit(first.token, Ok(booked(&["A1"]))), CommitOutcome::Stale);
        assert_eq!(tracker.state(), &AvailabilityState::Loading);

        assert_eq!(tracker.commit(second.token, Ok(booked(&["C2"]))), CommitOutcome::Applied);
        let snapshot = tracker.snapshot().unwrap();
        assert_eq!(snapshot.journey_date, date(3));
        assert!(!snapshot.is_booked(&"A1".parse().unwrap()));

        // And a duplicate delivery of the applied response is stale too
        assert_eq!(tracker.commit(second.token, Ok(booked(&[]))), CommitOutcome::Stale);
    }

    #[test]
    fn test_failure_then_retry() {
        let mut tracker = AvailabilityTracker::new();
        let request = tracker.request(42, date(2));
        let outcome = tracker.commit(request.token, Err(BackendError::Network("timed out".to_string())));
        assert_eq!(outcome, CommitOutcome::Failed);
        assert!(matches!(tracker.state(), AvailabilityState::Failed(_)));
        assert!(!tracker.is_interactive());

        let retry = tracker.request(42, date(2));
        assert!(retry.token > request.token);
        tracker.commit(retry.token, Ok(booked(&[])));
        assert!(tracker.is_interactive());
    }

    #[test]
    fn test_locked_and_garbage_seats() {
        let request = AvailabilityRequest {
            token: RequestToken(1),
            schedule_id: 1,
            journey_date: date(2),
        };
        let snapshot = SeatAvailabilitySnapshot::from_response(
            &request,
            SeatAvailability {
                booked_seats: vec!["A1".to_string(), "Z9".to_string()],
                locked_seats: vec!["A1".to_string(), "A2".to_string()],
            },
        );

        assert_eq!(snapshot.booked.len(), 1);
        assert!(snapshot.is_locked(&"A2".parse().unwrap()));
        assert!(!snapshot.is_locked(&"A1".parse().unwrap()));
        assert!(snapshot.is_unavailable(&"A1".parse().unwrap()));
    }
}
