use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;
use yatra_catalog::{
    AvailabilityRequest, AvailabilityState, AvailabilityTracker, CommitOutcome, FareEngine,
    PricingError, RequestToken, SeatId, SeatLayout, SeatMap,
};
use yatra_core::{
    BackendError, CoreError, FieldError, PassengerDetails, ScheduleSelection, SeatAvailability,
};
use yatra_shared::Money;

use crate::models::BookingDraft;

/// Why a seat tap had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Availability is loading or failed
    NotInteractive,
    UnknownSeat,
    Booked,
    /// Held by another user's in-progress booking
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected(SeatId),
    Deselected(SeatId),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("Please select at least one seat")]
    NoSeats,

    #[error("Please fill in all required passenger details")]
    Passenger(Vec<FieldError>),

    #[error("Seat availability is not loaded yet")]
    AvailabilityNotReady,

    #[error("Schedule not offered: {0}")]
    UnknownSchedule(i64),

    #[error("Invalid schedule: {0}")]
    Schedule(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<CoreError> for SelectionError {
    fn from(e: CoreError) -> Self {
        SelectionError::Schedule(e.to_string())
    }
}

/// Seats picked by the user, without duplicates, in the order they were tapped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedSeats {
    seats: Vec<SeatId>,
}

impl SelectedSeats {
    pub fn contains(&self, seat: &SeatId) -> bool {
        self.seats.contains(seat)
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn as_slice(&self) -> &[SeatId] {
        &self.seats
    }

    pub fn to_set(&self) -> BTreeSet<SeatId> {
        self.seats.iter().copied().collect()
    }

    fn insert(&mut self, seat: SeatId) {
        if !self.contains(&seat) {
            self.seats.push(seat);
        }
    }

    fn remove(&mut self, seat: &SeatId) {
        self.seats.retain(|s| s != seat);
    }

    fn clear(&mut self) {
        self.seats.clear();
    }
}

/// First stage of the pipeline: seat map, passenger form and running subtotal.
///
/// Fetching is left to the caller. Every operation that needs fresh availability hands back an
/// [`AvailabilityRequest`]; the caller performs the read and feeds the result to
/// [`SeatSelectionStage::apply_availability`]. Responses to superseded requests are dropped.
#[derive(Debug, Clone)]
pub struct SeatSelectionStage {
    schedule: ScheduleSelection,
    candidates: Vec<ScheduleSelection>,
    journey_date: NaiveDate,
    layout: SeatLayout,
    availability: AvailabilityTracker,
    selected: SelectedSeats,
    passenger: PassengerDetails,
    /// Seats from an edited draft, re-applied once if still free after the next read
    carried_over: Vec<SeatId>,
}

impl SeatSelectionStage {
    pub fn new(
        schedule: ScheduleSelection,
        journey_date: NaiveDate,
    ) -> Result<(Self, AvailabilityRequest), SelectionError> {
        Self::with_candidates(vec![schedule], journey_date)
    }

    /// Stage over several schedules; the first one is active until the user picks another
    pub fn with_candidates(
        candidates: Vec<ScheduleSelection>,
        journey_date: NaiveDate,
    ) -> Result<(Self, AvailabilityRequest), SelectionError> {
        let schedule = candidates
            .first()
            .cloned()
            .ok_or(SelectionError::Schedule("no schedule to book".to_string()))?;
        for candidate in &candidates {
            candidate.validate()?;
        }

        let mut availability = AvailabilityTracker::new();
        let request = availability.request(schedule.schedule_id, journey_date);

        let stage = Self {
            layout: SeatLayout::generate(schedule.total_seats),
            schedule,
            candidates,
            journey_date,
            availability,
            selected: SelectedSeats::default(),
            passenger: PassengerDetails::default(),
            carried_over: Vec::new(),
        };
        Ok((stage, request))
    }

    /// Re-enter the stage from the review step. Passenger details are kept; the draft's seats
    /// are re-applied after the fresh read if none of them has been taken meanwhile.
    pub fn resume(draft: BookingDraft) -> (Self, AvailabilityRequest) {
        let mut availability = AvailabilityTracker::new();
        let request = availability.request(draft.schedule.schedule_id, draft.journey_date);

        let stage = Self {
            layout: SeatLayout::generate(draft.schedule.total_seats),
            candidates: vec![draft.schedule.clone()],
            schedule: draft.schedule,
            journey_date: draft.journey_date,
            availability,
            selected: SelectedSeats::default(),
            passenger: draft.passenger,
            carried_over: draft.seats,
        };
        (stage, request)
    }

    pub fn schedule(&self) -> &ScheduleSelection {
        &self.schedule
    }

    pub fn candidates(&self) -> &[ScheduleSelection] {
        &self.candidates
    }

    pub fn journey_date(&self) -> NaiveDate {
        self.journey_date
    }

    pub fn layout(&self) -> &SeatLayout {
        &self.layout
    }

    pub fn availability(&self) -> &AvailabilityState {
        self.availability.state()
    }

    pub fn selected_seats(&self) -> &[SeatId] {
        self.selected.as_slice()
    }

    pub fn passenger(&self) -> &PassengerDetails {
        &self.passenger
    }

    pub fn passenger_mut(&mut self) -> &mut PassengerDetails {
        &mut self.passenger
    }

    /// Change the journey date. Selection is cleared and exactly one new read is issued;
    /// picking the date already shown does nothing.
    pub fn change_date(&mut self, journey_date: NaiveDate) -> Option<AvailabilityRequest> {
        if journey_date == self.journey_date {
            return None;
        }

        tracing::debug!(
            schedule_id = self.schedule.schedule_id,
            from = %self.journey_date,
            to = %journey_date,
            "Journey date changed"
        );
        self.journey_date = journey_date;
        self.selected.clear();
        self.carried_over.clear();
        Some(self.availability.request(self.schedule.schedule_id, journey_date))
    }

    /// Switch to another offered schedule
    pub fn choose_schedule(&mut self, schedule_id: i64) -> Result<AvailabilityRequest, SelectionError> {
        let schedule = self
            .candidates
            .iter()
            .find(|s| s.schedule_id == schedule_id)
            .cloned()
            .ok_or(SelectionError::UnknownSchedule(schedule_id))?;

        self.layout = SeatLayout::generate(schedule.total_seats);
        self.schedule = schedule;
        self.selected.clear();
        self.carried_over.clear();
        Ok(self.availability.request(schedule_id, self.journey_date))
    }

    /// User-initiated retry after a failed read
    pub fn retry_availability(&mut self) -> Option<AvailabilityRequest> {
        match self.availability.state() {
            AvailabilityState::Failed(_) => {
                Some(self.availability.request(self.schedule.schedule_id, self.journey_date))
            }
            _ => None,
        }
    }

    /// Feed the result of a read. A successful read replaces the snapshot and clears the
    /// selection.
    pub fn apply_availability(
        &mut self,
        token: RequestToken,
        result: Result<SeatAvailability, BackendError>,
    ) -> CommitOutcome {
        let outcome = self.availability.commit(token, result);
        if outcome != CommitOutcome::Applied {
            return outcome;
        }

        self.selected.clear();
        let carried_over = std::mem::take(&mut self.carried_over);
        if let Some(snapshot) = self.availability.snapshot() {
            let still_free = carried_over
                .iter()
                .all(|seat| self.layout.contains(seat) && !snapshot.is_unavailable(seat));
            if still_free {
                for seat in carried_over {
                    self.selected.insert(seat);
                }
            } else {
                tracing::info!(
                    schedule_id = self.schedule.schedule_id,
                    "Previously chosen seats were taken; selection cleared"
                );
            }
        }

        debug_assert!(self.selection_is_consistent());
        outcome
    }

    /// Tap on a seat. Booked and locked seats cannot be selected.
    pub fn toggle_seat(&mut self, seat: SeatId) -> ToggleOutcome {
        let Some(snapshot) = self.availability.snapshot() else {
            return ToggleOutcome::Ignored(IgnoreReason::NotInteractive);
        };
        if !self.layout.contains(&seat) {
            return ToggleOutcome::Ignored(IgnoreReason::UnknownSeat);
        }
        if snapshot.is_booked(&seat) {
            return ToggleOutcome::Ignored(IgnoreReason::Booked);
        }
        if snapshot.is_locked(&seat) {
            return ToggleOutcome::Ignored(IgnoreReason::Locked);
        }

        let outcome = if self.selected.contains(&seat) {
            self.selected.remove(&seat);
            ToggleOutcome::Deselected(seat)
        } else {
            self.selected.insert(seat);
            ToggleOutcome::Selected(seat)
        };
        debug_assert!(self.selection_is_consistent());
        outcome
    }

    /// No selected seat is booked or locked in the current snapshot
    pub fn selection_is_consistent(&self) -> bool {
        match self.availability.snapshot() {
            Some(snapshot) => self.selected.as_slice().iter().all(|s| !snapshot.is_unavailable(s)),
            None => self.selected.is_empty(),
        }
    }

    pub fn seat_map(&self) -> SeatMap {
        self.layout
            .render(self.availability.snapshot(), &self.selected.to_set())
    }

    /// Running total shown beside the seat map
    pub fn subtotal(&self, fares: &FareEngine) -> Result<Money, PricingError> {
        fares.subtotal(self.schedule.fare_per_seat, self.selected.len() as u32)
    }

    /// Validate and hand over to review
    pub fn submit(&self, fares: &FareEngine) -> Result<BookingDraft, SelectionError> {
        if !self.availability.is_interactive() {
            return Err(SelectionError::AvailabilityNotReady);
        }
        if self.selected.is_empty() {
            return Err(SelectionError::NoSeats);
        }
        self.passenger.validate().map_err(SelectionError::Passenger)?;

        let fare = fares.seat_fare(self.schedule.fare_per_seat, self.selected.len() as u32)?;

        tracing::info!(
            schedule_id = self.schedule.schedule_id,
            journey_date = %self.journey_date,
            seats = self.selected.len(),
            subtotal = %fare.subtotal,
            "Seat selection submitted"
        );

        Ok(BookingDraft {
            schedule: self.schedule.clone(),
            journey_date: self.journey_date,
            seats: self.selected.as_slice().to_vec(),
            passenger: self.passenger.clone(),
            fare,
            payment_method: None,
            created_at: Utc::now(),
        })
    }
}
