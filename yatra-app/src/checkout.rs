use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use yatra_catalog::{AvailabilityState, SeatId};
use yatra_core::{
    PassengerDetails, PaymentMethod, ScheduleSelection, SessionProvider, UserProfile,
    WalletCredentials,
};
use yatra_order::{
    BookingPipeline, ConfirmRequest, ConfirmedBooking, PipelineError, PipelineStage, Ticket,
    TicketAction, ToggleOutcome,
};

use crate::state::AppContext;

fn default_true() -> bool {
    true
}

/// Sign-in used when no session is saved yet
#[derive(Debug, Clone, Deserialize)]
pub struct SignIn {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentChoice {
    pub method: PaymentMethod,
    #[serde(default)]
    pub credentials: Option<WalletCredentials>,
    #[serde(default = "default_true")]
    pub accept_terms: bool,
}

/// One headless booking, read from a JSON file
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub schedule: ScheduleSelection,
    pub journey_date: NaiveDate,
    pub seats: Vec<SeatId>,
    pub passenger: PassengerDetails,
    pub payment: PaymentChoice,
    #[serde(default)]
    pub sign_in: Option<SignIn>,
    /// Continue a saved draft instead of selecting seats again
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub print_ticket: bool,
    #[serde(default = "default_true")]
    pub download_ticket: bool,
}

impl CheckoutRequest {
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
    }
}

#[derive(Debug)]
pub struct CheckoutOutcome {
    pub booking: ConfirmedBooking,
    pub ticket: Ticket,
}

/// Drive one booking through selection, review, payment and confirmation
pub async fn run_checkout(ctx: &AppContext, request: CheckoutRequest) -> anyhow::Result<CheckoutOutcome> {
    // 1. Session
    if !ctx.sessions.is_signed_in() {
        let sign_in = request
            .sign_in
            .clone()
            .ok_or_else(|| anyhow!("not signed in and the request carries no sign-in"))?;
        ctx.sessions.sign_in(sign_in.token, sign_in.user).await?;
    }

    let mut pipeline = ctx.pipeline();

    // 2. Seats and passenger, unless a saved draft is picked up
    let resumed = request.resume && pipeline.resume().await?;
    if !resumed {
        select_seats(ctx, &mut pipeline, &request).await?;
        pipeline.submit_selection().await?;
    }

    if let PipelineStage::Reviewing(review) = pipeline.stage() {
        for (label, amount) in review.bill_lines() {
            tracing::info!("{:<24} {:>12}", label, amount);
        }
    }

    // 3. Payment
    pipeline.proceed_to_payment().await?;
    let confirm = ConfirmRequest {
        method: request.payment.method,
        terms_accepted: request.payment.accept_terms,
        credentials: request.payment.credentials.clone(),
    };
    let booking = match pipeline
        .confirm_payment(&ctx.processor, confirm, ctx.sessions.current_session())
        .await
    {
        Ok(booking) => booking,
        Err(PipelineError::Checkout(e)) if e.is_seat_conflict() => {
            bail!("A selected seat was just taken by someone else; choose another seat ({e})")
        }
        Err(PipelineError::Checkout(e)) if e.outcome_unknown() => {
            bail!("Booking status is unknown; check your bookings before paying again ({e})")
        }
        Err(PipelineError::Checkout(e)) if e.needs_operator() => {
            bail!("Booking failed after payment and is pending manual review: {e}")
        }
        Err(e) => return Err(e.into()),
    };

    // 4. Confirmation side effects; failures never undo the booking
    let confirmation = pipeline
        .confirmation_mut()
        .ok_or_else(|| anyhow!("pipeline did not reach confirmation"))?;
    if let Some(Err(e)) = confirmation.on_enter(&ctx.tickets).await {
        tracing::warn!("Ticket email not sent: {}", e);
    }
    if request.download_ticket {
        if let Err(e) = confirmation.run(TicketAction::Download, &ctx.tickets).await {
            tracing::warn!("Ticket download failed: {}", e);
        }
    }
    if request.print_ticket {
        if let Err(e) = confirmation.run(TicketAction::Print, &ctx.tickets).await {
            tracing::warn!("Ticket print failed: {}", e);
        }
    }

    Ok(CheckoutOutcome {
        ticket: confirmation.ticket().clone(),
        booking,
    })
}

async fn select_seats(
    ctx: &AppContext,
    pipeline: &mut BookingPipeline,
    request: &CheckoutRequest,
) -> anyhow::Result<()> {
    let availability_request = pipeline.start(request.schedule.clone(), request.journey_date)?;
    let availability = ctx
        .backend
        .fetch_seat_availability(availability_request.schedule_id, availability_request.journey_date)
        .await;

    let selection = pipeline.selection_mut()?;
    selection.apply_availability(availability_request.token, availability);
    if let AvailabilityState::Failed(message) = selection.availability() {
        bail!("{message}");
    }

    for seat in &request.seats {
        match selection.toggle_seat(*seat) {
            ToggleOutcome::Selected(_) => {}
            ToggleOutcome::Deselected(_) => bail!("seat {seat} listed twice"),
            ToggleOutcome::Ignored(reason) => bail!("seat {seat} cannot be selected: {reason:?}"),
        }
    }
    tracing::info!("\n{}", selection.seat_map().to_ascii());

    *selection.passenger_mut() = request.passenger.clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use yatra_core::{
        BackendError, BookingBackend, BookingPaymentStatus, CreateBookingRequest, CreatedBooking,
        SeatAvailability, SimulatedWalletGateway,
    };
    use yatra_store::Config;

    #[derive(Default)]
    struct MemoryBackend {
        creates: AtomicUsize,
        emails: AtomicUsize,
    }

    #[async_trait]
    impl BookingBackend for MemoryBackend {
        async fn fetch_seat_availability(
            &self,
            _schedule_id: i64,
            _journey_date: NaiveDate,
        ) -> Result<SeatAvailability, BackendError> {
            Ok(SeatAvailability {
                booked_seats: vec!["B3".to_string()],
                locked_seats: vec![],
            })
        }

        async fn create_booking(
            &self,
            _request: &CreateBookingRequest,
            _bearer: &str,
            _idempotency_key: uuid::Uuid,
        ) -> Result<CreatedBooking, BackendError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(CreatedBooking {
                booking_id: "12".to_string(),
                booking_reference: "YT-000012".to_string(),
            })
        }

        async fn send_ticket_email(&self, _booking_id: &str, _bearer: &str) -> Result<(), BackendError> {
            self.emails.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.session.path = dir.join("session.json");
        config.drafts.path = dir.join("draft.json");
        config.tickets.output_dir = dir.join("tickets");
        config
    }

    fn request(seats: &[&str]) -> CheckoutRequest {
        serde_json::from_value(serde_json::json!({
            "schedule": {
                "schedule_id": 42,
                "bus_id": 7,
                "bus_number": "BA 2 KHA 1234",
                "bus_type": "Deluxe",
                "vendor_name": "Sajha Yatayat",
                "origin": "Kathmandu",
                "destination": "Pokhara",
                "departure_time": "07:00:00",
                "arrival_time": "14:30:00",
                "fare_per_seat": 1000
            },
            "journey_date": "2026-11-02",
            "seats": seats,
            "passenger": {
                "name": "Sita Sharma",
                "phone": "9851234567",
                "email": "sita@example.com"
            },
            "payment": {
                "method": "esewa",
                "credentials": { "mobile": "9812345678", "pin": "1234" }
            },
            "sign_in": {
                "token": "token-123",
                "user": { "uid": "u1", "email": "sita@example.com", "name": "Sita Sharma", "role": "customer" }
            }
        }))
        .unwrap()
    }

    async fn context(dir: &Path, backend: Arc<MemoryBackend>) -> AppContext {
        AppContext::with_services(
            config(dir),
            backend,
            Arc::new(SimulatedWalletGateway::new(Duration::from_millis(1))),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_headless_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let ctx = context(dir.path(), backend.clone()).await;

        let outcome = run_checkout(&ctx, request(&["A1", "A2"])).await.unwrap();

        assert_eq!(outcome.booking.booking_reference, "YT-000012");
        assert_eq!(outcome.booking.payment_status, BookingPaymentStatus::Paid);
        assert_eq!(outcome.booking.draft.fare.grand_total.to_string(), "2140.00");
        assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
        assert_eq!(backend.emails.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("tickets/ticket-YT-000012.txt").exists());
        assert!(ctx.sessions.is_signed_in());

        ctx.teardown().await.unwrap();
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn test_booked_seat_aborts_before_payment() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let ctx = context(dir.path(), backend.clone()).await;

        let err = run_checkout(&ctx, request(&["B3"])).await.unwrap_err();
        assert!(err.to_string().contains("B3"));
        assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
    }
}
