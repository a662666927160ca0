use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;
use yatra_catalog::{FareBreakdown, FareEngine, PricingError};
use yatra_core::{
    AuthorizationRequest, BackendError, BookingBackend, CreateBookingRequest, CreatedBooking,
    GatewayAuthorization, GatewayError, PaymentGateway, PaymentMethod, Session, SessionProvider,
    WalletCredentials,
};
use yatra_shared::Masked;

use crate::models::{BookingDraft, ConfirmedBooking};
use crate::reconciliation::{PartialFailure, ReconciliationPolicy, Reconciler};

/// Default wait for a wallet authorization before giving up
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutValidation {
    #[error("Please accept the terms and conditions")]
    TermsNotAccepted,

    #[error("Please enter your wallet mobile number and PIN")]
    MissingCredentials,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(CheckoutValidation),

    #[error("Please sign in to complete your booking")]
    Unauthenticated,

    #[error("A payment is already being processed")]
    AlreadyProcessing,

    #[error("This booking is already confirmed")]
    AlreadyCompleted,

    #[error("Payment failed: {0}")]
    Gateway(GatewayError),

    #[error("Booking could not be created: {error}")]
    BookingCreation {
        error: BackendError,
        partial: Option<PartialFailure>,
    },

    /// No usable answer from booking-create; the booking may exist. Any charge is kept so the
    /// retry can replay the same request.
    #[error("Booking status unknown ({error}); please retry")]
    OutcomeUnknown {
        error: BackendError,
        authorization: Option<GatewayAuthorization>,
    },

    #[error("A previous {method} payment may have gone through; retry it with the same payment method")]
    UnresolvedAttempt { method: PaymentMethod },

    #[error("Fare could not be computed: {0}")]
    Pricing(#[from] PricingError),

    #[error("Result belongs to a superseded payment attempt")]
    StaleAttempt,
}

impl CheckoutError {
    /// Someone else took a seat between review and payment
    pub fn is_seat_conflict(&self) -> bool {
        matches!(
            self,
            CheckoutError::BookingCreation {
                error: BackendError::SeatConflict(_),
                ..
            }
        )
    }

    /// Charge taken without a booking, left for an operator
    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            CheckoutError::BookingCreation { partial: Some(p), .. } if p.needs_operator()
        )
    }

    /// The backend may have created the booking even though we saw an error
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, CheckoutError::OutcomeUnknown { .. })
    }
}

/// Where the user lands when opening the payment page
#[derive(Debug)]
pub enum PaymentEntry {
    Ready(PaymentStage),
    /// No booking in progress; back to search without touching the network
    RedirectToSearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Idle,
    Processing,
    Succeeded,
}

/// What the user submits with the confirm button
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub method: PaymentMethod,
    pub terms_accepted: bool,
    pub credentials: Option<WalletCredentials>,
}

impl ConfirmRequest {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            terms_accepted: true,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: WalletCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// One press of the confirm button, carried out by [`PaymentProcessor::execute`]
#[derive(Debug, Clone)]
pub struct PaymentAttempt {
    pub idempotency_key: Uuid,
    pub method: PaymentMethod,
    pub credentials: Option<WalletCredentials>,
    pub fare: FareBreakdown,
    pub request: CreateBookingRequest,
    pub bearer: Masked<String>,
    /// Charge kept from an earlier attempt whose booking outcome is unknown
    pub authorization: Option<GatewayAuthorization>,
}

/// Result of an attempt that created a booking
#[derive(Debug, Clone)]
pub struct CheckoutSuccess {
    pub created: CreatedBooking,
    pub method: PaymentMethod,
    pub authorization: Option<GatewayAuthorization>,
}

/// Attempt whose booking-create call got no usable answer
#[derive(Debug, Clone)]
struct UnresolvedAttempt {
    method: PaymentMethod,
    request: CreateBookingRequest,
    authorization: Option<GatewayAuthorization>,
}

/// Payment page state. Owns the draft until a booking exists.
///
/// [`PaymentStage::begin`] and [`PaymentStage::finish`] are synchronous and bracket the slow
/// part, so callers never hold the stage across network I/O.
#[derive(Debug)]
pub struct PaymentStage {
    draft: BookingDraft,
    state: PaymentState,
    in_flight: Option<(Uuid, CreateBookingRequest)>,
    /// Replayed verbatim by the next attempt; a different request is refused until it resolves
    unresolved: Option<UnresolvedAttempt>,
    last_error: Option<CheckoutError>,
    attempts: u32,
}

impl PaymentStage {
    pub fn enter(draft: Option<BookingDraft>, fares: &FareEngine) -> Result<PaymentEntry, CheckoutError> {
        let Some(mut draft) = draft else {
            tracing::info!("Payment page opened without a booking; redirecting to search");
            return Ok(PaymentEntry::RedirectToSearch);
        };
        if draft.seats.is_empty() {
            tracing::warn!("Payment page opened with an empty booking; redirecting to search");
            return Ok(PaymentEntry::RedirectToSearch);
        }
        draft.reprice(fares)?;

        Ok(PaymentEntry::Ready(Self {
            draft,
            state: PaymentState::Idle,
            in_flight: None,
            unresolved: None,
            last_error: None,
            attempts: 0,
        }))
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn last_error(&self) -> Option<&CheckoutError> {
        self.last_error.as_ref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// An earlier attempt may have created the booking and must be retried as it was
    pub fn has_unresolved_attempt(&self) -> bool {
        self.unresolved.is_some()
    }

    pub fn into_draft(self) -> BookingDraft {
        self.draft
    }

    /// Validate the confirm request and mark the stage as processing.
    ///
    /// A second call before [`PaymentStage::finish`] fails with `AlreadyProcessing`, so at
    /// most one booking-create call is made per stage at any time.
    pub fn begin(
        &mut self,
        request: ConfirmRequest,
        session: Option<Session>,
        fares: &FareEngine,
    ) -> Result<PaymentAttempt, CheckoutError> {
        match self.state {
            PaymentState::Processing => return Err(CheckoutError::AlreadyProcessing),
            PaymentState::Succeeded => return Err(CheckoutError::AlreadyCompleted),
            PaymentState::Idle => {}
        }

        let result = self.prepare(request, session, fares);
        match &result {
            Ok(attempt) => {
                self.state = PaymentState::Processing;
                self.in_flight = Some((attempt.idempotency_key, attempt.request.clone()));
                self.last_error = None;
                self.attempts += 1;
                tracing::info!(
                    idempotency_key = %attempt.idempotency_key,
                    method = %attempt.method,
                    amount = %attempt.fare.grand_total,
                    attempt = self.attempts,
                    "Payment started"
                );
            }
            Err(e) => self.last_error = Some(e.clone()),
        }
        result
    }

    fn prepare(
        &mut self,
        request: ConfirmRequest,
        session: Option<Session>,
        fares: &FareEngine,
    ) -> Result<PaymentAttempt, CheckoutError> {
        if !request.terms_accepted {
            return Err(CheckoutError::Validation(CheckoutValidation::TermsNotAccepted));
        }
        let method = request.method;
        let session = session.ok_or(CheckoutError::Unauthenticated)?;

        let credentials = if method.requires_gateway() {
            match request.credentials {
                Some(c) if !c.mobile.is_blank() && !c.pin.is_blank() => Some(c),
                _ => return Err(CheckoutError::Validation(CheckoutValidation::MissingCredentials)),
            }
        } else {
            None
        };

        // 1. Recompute the amount from seat fare and count, never from a carried total
        self.draft.reprice(fares)?;

        // 2. One key per attempt, shared by the charge and the booking. An unresolved attempt
        //    is replayed with its key and charge, and only for an identical request.
        let (idempotency_key, authorization) = match &self.unresolved {
            Some(previous) => {
                let key = previous.request.idempotency_key;
                if self.draft.to_create_request(method, key) != previous.request {
                    return Err(CheckoutError::UnresolvedAttempt {
                        method: previous.method,
                    });
                }
                (key, previous.authorization.clone())
            }
            None => (Uuid::new_v4(), None),
        };
        self.draft.payment_method = Some(method);

        Ok(PaymentAttempt {
            idempotency_key,
            method,
            credentials,
            fare: self.draft.fare,
            request: self.draft.to_create_request(method, idempotency_key),
            bearer: session.token,
            authorization,
        })
    }

    /// Record the outcome of the attempt started by [`PaymentStage::begin`]
    pub fn finish(
        &mut self,
        idempotency_key: Uuid,
        outcome: Result<CheckoutSuccess, CheckoutError>,
    ) -> Result<ConfirmedBooking, CheckoutError> {
        let request = match self.in_flight.take() {
            Some((key, request)) if key == idempotency_key => request,
            other => {
                self.in_flight = other;
                tracing::warn!(idempotency_key = %idempotency_key, "Ignoring result of a superseded payment attempt");
                return Err(CheckoutError::StaleAttempt);
            }
        };

        match outcome {
            Ok(success) => {
                self.state = PaymentState::Succeeded;
                self.unresolved = None;
                let confirmed = ConfirmedBooking::new(
                    self.draft.clone(),
                    success.created,
                    success.method,
                    success.authorization.map(|a| a.authorization_id),
                );
                tracing::info!(
                    booking_id = %confirmed.booking_id,
                    reference = %confirmed.booking_reference,
                    status = confirmed.payment_status.label(),
                    "Booking confirmed"
                );
                Ok(confirmed)
            }
            Err(e) => {
                self.state = PaymentState::Idle;
                self.unresolved = match &e {
                    CheckoutError::OutcomeUnknown { authorization, .. } => Some(UnresolvedAttempt {
                        method: request.payment_method,
                        request,
                        authorization: authorization.clone(),
                    }),
                    _ => None,
                };
                tracing::warn!(idempotency_key = %idempotency_key, "Payment failed: {}", e);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }
}

/// Runs an attempt: wallet authorization (pay now only), then exactly one booking-create call.
pub struct PaymentProcessor {
    backend: Arc<dyn BookingBackend>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: Reconciler,
    gateway_timeout: Duration,
}

impl PaymentProcessor {
    pub fn new(backend: Arc<dyn BookingBackend>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            reconciler: Reconciler::new(ReconciliationPolicy::default(), gateway.clone()),
            backend,
            gateway,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: ReconciliationPolicy) -> Self {
        self.reconciler = Reconciler::new(policy, self.gateway.clone());
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Arc<dyn BookingBackend> {
        &self.backend
    }

    pub async fn execute(&self, attempt: &PaymentAttempt) -> Result<CheckoutSuccess, CheckoutError> {
        // 1. Authorize the charge for pay-now methods, unless a kept charge is replayed
        let authorization = match (&attempt.authorization, &attempt.credentials) {
            (Some(kept), _) => Some(kept.clone()),
            (None, Some(credentials)) if attempt.method.requires_gateway() => {
                Some(self.authorize(attempt, credentials.clone()).await?)
            }
            _ => None,
        };

        // 2. Create the booking
        let created = self
            .backend
            .create_booking(&attempt.request, attempt.bearer.expose(), attempt.idempotency_key)
            .await;

        match created {
            Ok(created) => Ok(CheckoutSuccess {
                created,
                method: attempt.method,
                authorization,
            }),
            Err(error) if error.outcome_unknown() => {
                // 3. The booking may exist; keep the charge for the replay
                tracing::warn!(
                    idempotency_key = %attempt.idempotency_key,
                    charged = authorization.is_some(),
                    "Booking outcome unknown: {}", error
                );
                Err(CheckoutError::OutcomeUnknown { error, authorization })
            }
            Err(error) => {
                // 4. A charge without a booking has to be settled
                let partial = match authorization {
                    Some(authorization) => Some(self.reconciler.reconcile(authorization, &error).await),
                    None => None,
                };
                Err(CheckoutError::BookingCreation { error, partial })
            }
        }
    }

    async fn authorize(
        &self,
        attempt: &PaymentAttempt,
        credentials: WalletCredentials,
    ) -> Result<GatewayAuthorization, CheckoutError> {
        let request = AuthorizationRequest {
            idempotency_key: attempt.idempotency_key,
            method: attempt.method,
            amount: attempt.fare.grand_total,
            credentials,
        };

        match tokio::time::timeout(self.gateway_timeout, self.gateway.authorize(&request)).await {
            Ok(Ok(authorization)) => Ok(authorization),
            Ok(Err(e)) => Err(CheckoutError::Gateway(e)),
            Err(_) => Err(CheckoutError::Gateway(GatewayError::Timeout(self.gateway_timeout))),
        }
    }
}

/// Shared payment page for concurrent callers (UI event handlers, tests).
#[derive(Clone)]
pub struct CheckoutHandle {
    stage: Arc<Mutex<PaymentStage>>,
    processor: Arc<PaymentProcessor>,
    sessions: Arc<dyn SessionProvider>,
    fares: Arc<FareEngine>,
}

impl CheckoutHandle {
    pub fn new(
        stage: PaymentStage,
        processor: Arc<PaymentProcessor>,
        sessions: Arc<dyn SessionProvider>,
        fares: Arc<FareEngine>,
    ) -> Self {
        Self {
            stage: Arc::new(Mutex::new(stage)),
            processor,
            sessions,
            fares,
        }
    }

    /// Press the confirm button
    pub async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmedBooking, CheckoutError> {
        let attempt = {
            let mut stage = self.stage.lock().await;
            stage.begin(request, self.sessions.current_session(), &self.fares)?
        };

        let outcome = self.processor.execute(&attempt).await;

        let mut stage = self.stage.lock().await;
        stage.finish(attempt.idempotency_key, outcome)
    }

    pub async fn state(&self) -> PaymentState {
        self.stage.lock().await.state()
    }

    pub async fn last_error(&self) -> Option<CheckoutError> {
        self.stage.lock().await.last_error().cloned()
    }

    pub async fn draft(&self) -> BookingDraft {
        self.stage.lock().await.draft().clone()
    }
}
