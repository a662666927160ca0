use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use yatra_catalog::{AvailabilityRequest, FareEngine};
use yatra_core::{ScheduleSelection, Session};

use crate::checkout::{
    CheckoutError, ConfirmRequest, PaymentEntry, PaymentProcessor, PaymentStage, PaymentState,
};
use crate::fulfillment::ConfirmationStage;
use crate::models::{BookingDraft, ConfirmedBooking};
use crate::review::{ReviewError, ReviewStage};
use crate::selection::{SeatSelectionStage, SelectionError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceError {
    #[error("Draft storage failed: {0}")]
    Io(String),

    #[error("Stored draft is unreadable: {0}")]
    Corrupt(String),
}

/// Keeps the in-progress draft across restarts
#[async_trait]
pub trait DraftPersistence: Send + Sync {
    async fn save(&self, draft: &BookingDraft) -> Result<(), PersistenceError>;

    async fn load(&self) -> Result<Option<BookingDraft>, PersistenceError>;

    async fn clear(&self) -> Result<(), PersistenceError>;
}

/// Draft lives in memory only; a restart loses it
pub struct NoPersistence;

#[async_trait]
impl DraftPersistence for NoPersistence {
    async fn save(&self, _draft: &BookingDraft) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn load(&self) -> Result<Option<BookingDraft>, PersistenceError> {
        Ok(None)
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid stage transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// A booking that cannot be completed from the client
#[derive(Debug, Clone, PartialEq)]
pub struct FailedBooking {
    pub draft: Option<BookingDraft>,
    pub error: CheckoutError,
}

#[derive(Debug)]
pub enum PipelineStage {
    Idle,
    SeatSelecting(SeatSelectionStage),
    Reviewing(ReviewStage),
    Paying(PaymentStage),
    Confirmed(ConfirmationStage),
    Failed(FailedBooking),
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "IDLE",
            PipelineStage::SeatSelecting(_) => "SEAT_SELECTING",
            PipelineStage::Reviewing(_) => "REVIEWING",
            PipelineStage::Paying(_) => "PAYING",
            PipelineStage::Confirmed(_) => "CONFIRMED",
            PipelineStage::Failed(_) => "FAILED",
        }
    }
}

/// Drives one booking from seat selection to confirmation.
///
/// Transitions: Idle → SeatSelecting → Reviewing → Paying → Confirmed, with Reviewing and an
/// idle Paying able to go back to SeatSelecting. Failed is reached only when a charge has no
/// booking and needs an operator. [`BookingPipeline::reset`] returns to Idle from anywhere.
pub struct BookingPipeline {
    stage: PipelineStage,
    fares: FareEngine,
    drafts: Arc<dyn DraftPersistence>,
}

impl BookingPipeline {
    pub fn new(fares: FareEngine, drafts: Arc<dyn DraftPersistence>) -> Self {
        Self {
            stage: PipelineStage::Idle,
            fares,
            drafts,
        }
    }

    pub fn stage(&self) -> &PipelineStage {
        &self.stage
    }

    pub fn fares(&self) -> &FareEngine {
        &self.fares
    }

    fn invalid(&self, to: &str) -> PipelineError {
        transition_error(self.stage.name(), to)
    }

    /// Transition: Idle | Confirmed | Failed → SeatSelecting
    pub fn start(
        &mut self,
        schedule: ScheduleSelection,
        journey_date: NaiveDate,
    ) -> Result<AvailabilityRequest, PipelineError> {
        if !matches!(
            self.stage,
            PipelineStage::Idle | PipelineStage::Confirmed(_) | PipelineStage::Failed(_)
        ) {
            return Err(self.invalid("SEAT_SELECTING"));
        }

        let (selection, request) = SeatSelectionStage::new(schedule, journey_date)?;
        self.stage = PipelineStage::SeatSelecting(selection);
        Ok(request)
    }

    pub fn selection_mut(&mut self) -> Result<&mut SeatSelectionStage, PipelineError> {
        match &mut self.stage {
            PipelineStage::SeatSelecting(selection) => Ok(selection),
            other => Err(PipelineError::InvalidTransition {
                from: other.name().to_string(),
                to: "SEAT_SELECTING".to_string(),
            }),
        }
    }

    pub fn payment(&self) -> Option<&PaymentStage> {
        match &self.stage {
            PipelineStage::Paying(payment) => Some(payment),
            _ => None,
        }
    }

    pub fn confirmation_mut(&mut self) -> Option<&mut ConfirmationStage> {
        match &mut self.stage {
            PipelineStage::Confirmed(confirmation) => Some(confirmation),
            _ => None,
        }
    }

    /// Transition: SeatSelecting → Reviewing
    pub async fn submit_selection(&mut self) -> Result<(), PipelineError> {
        let PipelineStage::SeatSelecting(selection) = &self.stage else {
            return Err(self.invalid("REVIEWING"));
        };

        let draft = selection.submit(&self.fares)?;
        let review = ReviewStage::enter(draft, &self.fares)?;
        self.snapshot(review.draft()).await;
        self.stage = PipelineStage::Reviewing(review);
        Ok(())
    }

    /// Transition: Reviewing | Paying (idle) → SeatSelecting. Not allowed while a payment
    /// attempt with an unknown outcome is waiting to be retried.
    pub fn edit_booking(&mut self) -> Result<AvailabilityRequest, PipelineError> {
        let draft = match std::mem::replace(&mut self.stage, PipelineStage::Idle) {
            PipelineStage::Reviewing(review) => review.edit(),
            PipelineStage::Paying(payment)
                if payment.state() == PaymentState::Idle && !payment.has_unresolved_attempt() =>
            {
                payment.into_draft()
            }
            other => {
                self.stage = other;
                return Err(self.invalid("SEAT_SELECTING"));
            }
        };

        let (selection, request) = SeatSelectionStage::resume(draft);
        self.stage = PipelineStage::SeatSelecting(selection);
        Ok(request)
    }

    /// Transition: Reviewing → Paying. The review stays in place if the payment page
    /// cannot be opened.
    pub async fn proceed_to_payment(&mut self) -> Result<(), PipelineError> {
        let draft = match &self.stage {
            PipelineStage::Reviewing(review) => review.draft().clone(),
            _ => return Err(self.invalid("PAYING")),
        };
        self.open_payment(Some(draft)).await
    }

    /// Payment page opened directly, e.g. from a restored draft or a deep link.
    /// Without a draft the pipeline goes back to Idle and no request is made.
    pub async fn open_payment(
        &mut self,
        draft: Option<BookingDraft>,
    ) -> Result<(), PipelineError> {
        if !matches!(self.stage, PipelineStage::Idle | PipelineStage::Reviewing(_)) {
            return Err(self.invalid("PAYING"));
        }

        match PaymentStage::enter(draft, &self.fares)? {
            PaymentEntry::Ready(payment) => {
                self.snapshot(payment.draft()).await;
                self.stage = PipelineStage::Paying(payment);
                Ok(())
            }
            PaymentEntry::RedirectToSearch => {
                self.stage = PipelineStage::Idle;
                Err(transition_error("IDLE", "PAYING"))
            }
        }
    }

    /// Confirm payment. Success moves to Confirmed; a charge that needs an operator moves to
    /// Failed; any other failure leaves the payment page idle for a retry.
    pub async fn confirm_payment(
        &mut self,
        processor: &PaymentProcessor,
        request: ConfirmRequest,
        session: Option<Session>,
    ) -> Result<ConfirmedBooking, PipelineError> {
        let from = self.stage.name();
        let PipelineStage::Paying(payment) = &mut self.stage else {
            return Err(transition_error(from, "CONFIRMED"));
        };

        let attempt = payment.begin(request, session, &self.fares)?;
        let outcome = processor.execute(&attempt).await;

        match payment.finish(attempt.idempotency_key, outcome) {
            Ok(confirmed) => {
                self.complete(confirmed.clone()).await;
                Ok(confirmed)
            }
            Err(error) if error.needs_operator() => {
                let draft = Some(payment.draft().clone());
                self.stage = PipelineStage::Failed(FailedBooking {
                    draft,
                    error: error.clone(),
                });
                self.clear_draft().await;
                Err(error.into())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Transition: Paying → Confirmed
    async fn complete(&mut self, confirmed: ConfirmedBooking) {
        self.stage = PipelineStage::Confirmed(ConfirmationStage::new(confirmed));
        self.clear_draft().await;
    }

    /// Pick up a draft saved before a restart; lands on review with a recomputed bill
    pub async fn resume(&mut self) -> Result<bool, PipelineError> {
        if !matches!(self.stage, PipelineStage::Idle) {
            return Err(self.invalid("REVIEWING"));
        }

        let draft = match self.drafts.load().await {
            Ok(Some(draft)) => draft,
            Ok(None) => return Ok(false),
            Err(PersistenceError::Corrupt(e)) => {
                tracing::warn!("Discarding unreadable saved draft: {}", e);
                self.clear_draft().await;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        match ReviewStage::enter(draft, &self.fares) {
            Ok(review) => {
                tracing::info!(
                    schedule_id = review.draft().schedule.schedule_id,
                    "Resumed saved booking draft"
                );
                self.stage = PipelineStage::Reviewing(review);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Discarding unusable saved draft: {}", e);
                self.clear_draft().await;
                Ok(false)
            }
        }
    }

    /// Abandon the booking from any stage
    pub async fn reset(&mut self) {
        tracing::debug!(from = self.stage.name(), "Booking pipeline reset");
        self.stage = PipelineStage::Idle;
        self.clear_draft().await;
    }

    async fn snapshot(&self, draft: &BookingDraft) {
        if let Err(e) = self.drafts.save(draft).await {
            tracing::warn!("Could not save booking draft: {}", e);
        }
    }

    async fn clear_draft(&self) {
        if let Err(e) = self.drafts.clear().await {
            tracing::warn!("Could not clear booking draft: {}", e);
        }
    }
}

fn transition_error(from: &str, to: &str) -> PipelineError {
    PipelineError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use std::sync::Mutex;
    use std::time::Duration;
    use yatra_catalog::SeatId;
    use yatra_core::{
        BackendError, BookingBackend, CreateBookingRequest, CreatedBooking, PaymentMethod, Role,
        SeatAvailability, SimulatedWalletGateway, UserProfile,
    };
    use yatra_shared::{Masked, Money};

    #[derive(Default)]
    struct MemoryDrafts {
        draft: Mutex<Option<BookingDraft>>,
    }

    #[async_trait]
    impl DraftPersistence for MemoryDrafts {
        async fn save(&self, draft: &BookingDraft) -> Result<(), PersistenceError> {
            *self.draft.lock().unwrap() = Some(draft.clone());
            Ok(())
        }

        async fn load(&self) -> Result<Option<BookingDraft>, PersistenceError> {
            Ok(self.draft.lock().unwrap().clone())
        }

        async fn clear(&self) -> Result<(), PersistenceError> {
            *self.draft.lock().unwrap() = None;
            Ok(())
        }
    }

    struct OkBackend;

    #[async_trait]
    impl BookingBackend for OkBackend {
        async fn fetch_seat_availability(
            &self,
            _schedule_id: i64,
            _journey_date: NaiveDate,
        ) -> Result<SeatAvailability, BackendError> {
            Ok(SeatAvailability::default())
        }

        async fn create_booking(
            &self,
            _request: &CreateBookingRequest,
            _bearer: &str,
            _idempotency_key: uuid::Uuid,
        ) -> Result<CreatedBooking, BackendError> {
            Ok(CreatedBooking {
                booking_id: "1".to_string(),
                booking_reference: "YT-0001".to_string(),
            })
        }

        async fn send_ticket_email(&self, _booking_id: &str, _bearer: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    struct LostResponseBackend;

    #[async_trait]
    impl BookingBackend for LostResponseBackend {
        async fn fetch_seat_availability(
            &self,
            _schedule_id: i64,
            _journey_date: NaiveDate,
        ) -> Result<SeatAvailability, BackendError> {
            Ok(SeatAvailability::default())
        }

        async fn create_booking(
            &self,
            _request: &CreateBookingRequest,
            _bearer: &str,
            _idempotency_key: uuid::Uuid,
        ) -> Result<CreatedBooking, BackendError> {
            Err(BackendError::Network("connection reset".to_string()))
        }

        async fn send_ticket_email(&self, _booking_id: &str, _bearer: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn session() -> Session {
        let user = UserProfile {
            uid: "u1".to_string(),
            email: Masked::from("sita@example.com"),
            name: "Sita Sharma".to_string(),
            phone: None,
            role: Role::Customer,
        };
        Session::new("token-123".to_string(), user).unwrap()
    }

    async fn reviewing(pipeline: &mut BookingPipeline) {
        let request = pipeline.start(fixtures::schedule(), fixtures::date()).unwrap();
        let selection = pipeline.selection_mut().unwrap();
        selection.apply_availability(request.token, Ok(SeatAvailability::default()));
        selection.toggle_seat("A1".parse::<SeatId>().unwrap());
        *selection.passenger_mut() = fixtures::passenger();
        pipeline.submit_selection().await.unwrap();
    }

    #[tokio::test]
    async fn test_happy_path_clears_saved_draft() {
        let drafts = Arc::new(MemoryDrafts::default());
        let mut pipeline = BookingPipeline::new(FareEngine::default(), drafts.clone());

        reviewing(&mut pipeline).await;
        assert_eq!(pipeline.stage().name(), "REVIEWING");
        assert!(drafts.draft.lock().unwrap().is_some());

        pipeline.proceed_to_payment().await.unwrap();
        let processor = PaymentProcessor::new(
            Arc::new(OkBackend),
            Arc::new(SimulatedWalletGateway::new(Duration::from_millis(1))),
        );
        let booking = pipeline
            .confirm_payment(&processor, ConfirmRequest::new(PaymentMethod::Cash), Some(session()))
            .await
            .unwrap();
        assert_eq!(booking.booking_reference, "YT-0001");
        assert_eq!(booking.draft.fare.grand_total, Money::from_major(1070));
        assert!(pipeline.confirmation_mut().is_some());

        assert_eq!(pipeline.stage().name(), "CONFIRMED");
        assert!(drafts.draft.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let mut pipeline = BookingPipeline::new(FareEngine::default(), Arc::new(NoPersistence));

        assert!(matches!(
            pipeline.submit_selection().await,
            Err(PipelineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            pipeline.edit_booking(),
            Err(PipelineError::InvalidTransition { .. })
        ));

        pipeline.start(fixtures::schedule(), fixtures::date()).unwrap();
        let err = pipeline.start(fixtures::schedule(), fixtures::date()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidTransition {
                from: "SEAT_SELECTING".to_string(),
                to: "SEAT_SELECTING".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_edit_from_review_keeps_passenger() {
        let mut pipeline = BookingPipeline::new(FareEngine::default(), Arc::new(NoPersistence));
        reviewing(&mut pipeline).await;

        pipeline.edit_booking().unwrap();
        let selection = pipeline.selection_mut().unwrap();
        assert_eq!(selection.passenger(), &fixtures::passenger());
    }

    #[tokio::test]
    async fn test_edit_blocked_while_outcome_unknown() {
        let mut pipeline = BookingPipeline::new(FareEngine::default(), Arc::new(NoPersistence));
        reviewing(&mut pipeline).await;
        pipeline.proceed_to_payment().await.unwrap();

        let processor = PaymentProcessor::new(
            Arc::new(LostResponseBackend),
            Arc::new(SimulatedWalletGateway::new(Duration::from_millis(1))),
        );
        let err = pipeline
            .confirm_payment(&processor, ConfirmRequest::new(PaymentMethod::Cash), Some(session()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Checkout(ref e) if e.outcome_unknown()));
        assert_eq!(pipeline.stage().name(), "PAYING");

        assert!(matches!(
            pipeline.edit_booking(),
            Err(PipelineError::InvalidTransition { .. })
        ));
        assert_eq!(pipeline.stage().name(), "PAYING");
    }

    #[tokio::test]
    async fn test_pricing_failure_keeps_review() {
        let overflowing = FareEngine::new(yatra_catalog::FareConfig {
            service_fee: yatra_catalog::FeeRule::Flat {
                amount: Money::from_minor(i64::MAX),
            },
            tax_rate_bps: 0,
        })
        .unwrap();
        let mut pipeline = BookingPipeline::new(overflowing, Arc::new(NoPersistence));
        let review = ReviewStage::enter(fixtures::draft(&["A1"]), &FareEngine::default()).unwrap();
        pipeline.stage = PipelineStage::Reviewing(review);

        let err = pipeline.proceed_to_payment().await.unwrap_err();
        assert!(matches!(err, PipelineError::Checkout(CheckoutError::Pricing(_))));
        match pipeline.stage() {
            PipelineStage::Reviewing(review) => {
                assert_eq!(review.draft().seats, vec!["A1".parse::<SeatId>().unwrap()]);
            }
            other => panic!("unexpected stage {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_open_payment_without_draft_goes_idle() {
        let mut pipeline = BookingPipeline::new(FareEngine::default(), Arc::new(NoPersistence));
        assert!(pipeline.open_payment(None).await.is_err());
        assert_eq!(pipeline.stage().name(), "IDLE");
    }

    #[tokio::test]
    async fn test_resume_saved_draft() {
        let drafts = Arc::new(MemoryDrafts::default());
        drafts.save(&fixtures::draft(&["B1", "B2"])).await.unwrap();

        let mut pipeline = BookingPipeline::new(FareEngine::default(), drafts.clone());
        assert!(pipeline.resume().await.unwrap());
        match pipeline.stage() {
            PipelineStage::Reviewing(review) => {
                assert_eq!(review.fare().grand_total, Money::from_major(2140));
            }
            other => panic!("unexpected stage {}", other.name()),
        }

        pipeline.reset().await;
        assert_eq!(pipeline.stage().name(), "IDLE");
        assert!(drafts.load().await.unwrap().is_none());
    }
}
