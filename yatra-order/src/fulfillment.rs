use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use yatra_core::{BackendError, BookingBackend, SessionProvider};

use crate::models::ConfirmedBooking;

/// Printable ticket with the payload encoded in its QR code
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub booking_id: String,
    pub reference: String,
    pub text: String,
    pub qr_payload: String,
}

impl Ticket {
    pub fn render(booking: &ConfirmedBooking) -> Self {
        let draft = &booking.draft;
        let schedule = &draft.schedule;
        let fare = &draft.fare;

        let mut text = String::new();
        let _ = writeln!(text, "==== BUS TICKET ====");
        let _ = writeln!(text, "Reference:   {}", booking.booking_reference);
        let _ = writeln!(text, "Booking ID:  {}", booking.booking_id);
        let _ = writeln!(text, "Operator:    {} ({})", schedule.vendor_name, schedule.bus_type);
        let _ = writeln!(text, "Bus:         {}", schedule.bus_number);
        let _ = writeln!(text, "Route:       {}", schedule.route_label());
        let _ = writeln!(
            text,
            "Departure:   {} {}",
            draft.journey_date.format("%Y-%m-%d"),
            schedule.departure_time.format("%H:%M")
        );
        let _ = writeln!(text, "Arrival:     {}", schedule.arrival_time.format("%H:%M"));
        let _ = writeln!(text, "Seats:       {}", draft.seat_labels().join(", "));
        let _ = writeln!(text, "Passenger:   {}", draft.passenger.name.trim());
        let _ = writeln!(text, "Pickup:      {}", draft.passenger.resolved_pickup(schedule));
        let _ = writeln!(text, "Drop:        {}", draft.passenger.resolved_drop(schedule));
        let _ = writeln!(text, "--------------------");
        let _ = writeln!(text, "Seat fare:   {}", fare.subtotal);
        let _ = writeln!(text, "Service fee: {}", fare.service_fee);
        let _ = writeln!(text, "Tax:         {}", fare.tax);
        let _ = writeln!(text, "Total:       {}", fare.grand_total);
        let _ = writeln!(text, "Payment:     {} ({})", booking.payment_method, booking.payment_status.label());

        Self {
            booking_id: booking.booking_id.clone(),
            reference: booking.booking_reference.clone(),
            text,
            qr_payload: qr_payload(booking),
        }
    }

    pub fn file_name(&self) -> String {
        let safe: String = self
            .reference
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("ticket-{}.txt", safe)
    }
}

/// Data scanned at boarding
fn qr_payload(booking: &ConfirmedBooking) -> String {
    serde_json::json!({
        "reference": booking.booking_reference,
        "booking_id": booking.booking_id,
        "schedule_id": booking.draft.schedule.schedule_id,
        "journey_date": booking.draft.journey_date,
        "seats": booking.draft.seat_labels(),
        "total": booking.draft.fare.grand_total.to_decimal(),
        "payment_status": booking.payment_status,
    })
    .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketAction {
    Print,
    Download,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    Idle,
    Succeeded,
    /// Shown as a toast; the action can be tried again
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SideEffectError {
    #[error("Could not send the ticket email: {0}")]
    Email(#[from] BackendError),

    #[error("Sign in again to email the ticket")]
    NotSignedIn,

    #[error("Could not write the ticket: {0}")]
    Io(String),
}

/// Where printed and downloaded tickets go
#[async_trait]
pub trait TicketSink: Send + Sync {
    async fn print(&self, ticket: &Ticket) -> Result<(), SideEffectError>;

    async fn save(&self, ticket: &Ticket) -> Result<PathBuf, SideEffectError>;
}

/// Prints to stdout and saves into a directory
pub struct FileTicketSink {
    output_dir: PathBuf,
}

impl FileTicketSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl TicketSink for FileTicketSink {
    async fn print(&self, ticket: &Ticket) -> Result<(), SideEffectError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(ticket.text.as_bytes())
            .await
            .map_err(|e| SideEffectError::Io(e.to_string()))?;
        stdout.flush().await.map_err(|e| SideEffectError::Io(e.to_string()))
    }

    async fn save(&self, ticket: &Ticket) -> Result<PathBuf, SideEffectError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| SideEffectError::Io(e.to_string()))?;

        let path = self.output_dir.join(ticket.file_name());
        tokio::fs::write(&path, ticket.text.as_bytes())
            .await
            .map_err(|e| SideEffectError::Io(e.to_string()))?;
        Ok(path)
    }
}

/// Collaborators the confirmation page needs for its side effects
#[derive(Clone)]
pub struct TicketServices {
    pub backend: Arc<dyn BookingBackend>,
    pub sink: Arc<dyn TicketSink>,
    pub sessions: Arc<dyn SessionProvider>,
}

/// Terminal stage. Shows the booking and runs print, download and email on request.
#[derive(Debug)]
pub struct ConfirmationStage {
    booking: ConfirmedBooking,
    ticket: Ticket,
    actions: HashMap<TicketAction, ActionState>,
    email_auto_sent: bool,
}

impl ConfirmationStage {
    pub fn new(booking: ConfirmedBooking) -> Self {
        Self {
            ticket: Ticket::render(&booking),
            booking,
            actions: HashMap::new(),
            email_auto_sent: false,
        }
    }

    pub fn booking(&self) -> &ConfirmedBooking {
        &self.booking
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn action_state(&self, action: TicketAction) -> ActionState {
        self.actions.get(&action).cloned().unwrap_or(ActionState::Idle)
    }

    /// Send the ticket email once per booking when the page is first shown.
    /// Returns `None` when it has already been attempted.
    pub async fn on_enter(&mut self, services: &TicketServices) -> Option<Result<(), SideEffectError>> {
        if self.email_auto_sent {
            return None;
        }
        self.email_auto_sent = true;
        Some(self.run(TicketAction::Email, services).await)
    }

    pub async fn run(
        &mut self,
        action: TicketAction,
        services: &TicketServices,
    ) -> Result<(), SideEffectError> {
        let result = match action {
            TicketAction::Print => services.sink.print(&self.ticket).await,
            TicketAction::Download => services.sink.save(&self.ticket).await.map(|path| {
                tracing::info!(path = %path.display(), "Ticket saved");
            }),
            TicketAction::Email => self.send_email(services).await,
        };

        let state = match &result {
            Ok(()) => ActionState::Succeeded,
            Err(e) => {
                tracing::warn!(
                    booking_id = %self.booking.booking_id,
                    action = ?action,
                    "Ticket action failed: {}", e
                );
                ActionState::Failed(e.to_string())
            }
        };
        self.actions.insert(action, state);
        result
    }

    async fn send_email(&self, services: &TicketServices) -> Result<(), SideEffectError> {
        let session = services
            .sessions
            .current_session()
            .ok_or(SideEffectError::NotSignedIn)?;
        services
            .backend
            .send_ticket_email(&self.booking.booking_id, session.bearer())
            .await?;
        tracing::info!(booking_id = %self.booking.booking_id, "Ticket email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;
    use yatra_catalog::FareEngine;
    use yatra_core::{
        CreateBookingRequest, CreatedBooking, PaymentMethod, Role, SeatAvailability, Session,
        StaticSessionProvider, UserProfile,
    };
    use yatra_shared::Masked;

    #[derive(Default)]
    struct EmailBackend {
        emails: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BookingBackend for EmailBackend {
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
            _idempotency_key: Uuid,
        ) -> Result<CreatedBooking, BackendError> {
            Err(BackendError::Rejected {
                status: 500,
                message: "not used".to_string(),
            })
        }

        async fn send_ticket_email(&self, _booking_id: &str, _bearer: &str) -> Result<(), BackendError> {
            self.emails.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BackendError::Network("smtp relay down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn booking() -> ConfirmedBooking {
        let mut draft = fixtures::draft(&["A1", "A2"]);
        draft.reprice(&FareEngine::default()).unwrap();
        ConfirmedBooking::new(
            draft,
            CreatedBooking {
                booking_id: "981".to_string(),
                booking_reference: "YT-2026/0981".to_string(),
            },
            PaymentMethod::Cash,
            None,
        )
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

    fn services(backend: Arc<EmailBackend>, dir: &std::path::Path, signed_in: bool) -> TicketServices {
        TicketServices {
            backend,
            sink: Arc::new(FileTicketSink::new(dir)),
            sessions: Arc::new(StaticSessionProvider::new(signed_in.then(session))),
        }
    }

    #[test]
    fn test_ticket_render() {
        let ticket = Ticket::render(&booking());
        assert!(ticket.text.contains("Kathmandu"));
        assert!(ticket.text.contains("A1, A2"));
        assert!(ticket.text.contains("Pending - Pay at Counter"));
        assert!(ticket.text.contains("2140.00"));
        assert_eq!(ticket.file_name(), "ticket-YT-2026_0981.txt");

        let qr: serde_json::Value = serde_json::from_str(&ticket.qr_payload).unwrap();
        assert_eq!(qr["reference"], "YT-2026/0981");
        assert_eq!(qr["seats"], serde_json::json!(["A1", "A2"]));
        assert_eq!(qr["payment_status"], "pending");
        assert_eq!(qr["total"], 2140.0);
    }

    #[tokio::test]
    async fn test_email_sent_once_on_enter() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(EmailBackend::default());
        let services = services(backend.clone(), dir.path(), true);

        let mut stage = ConfirmationStage::new(booking());
        assert_eq!(stage.on_enter(&services).await, Some(Ok(())));
        assert!(stage.on_enter(&services).await.is_none());
        assert_eq!(backend.emails.load(Ordering::SeqCst), 1);
        assert_eq!(stage.action_state(TicketAction::Email), ActionState::Succeeded);
    }

    #[tokio::test]
    async fn test_failed_email_is_reported_and_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(EmailBackend {
            fail: true,
            ..Default::default()
        });
        let services = services(backend.clone(), dir.path(), true);

        let mut stage = ConfirmationStage::new(booking());
        assert!(matches!(stage.on_enter(&services).await, Some(Err(SideEffectError::Email(_)))));
        assert!(matches!(stage.action_state(TicketAction::Email), ActionState::Failed(_)));

        let _ = stage.run(TicketAction::Email, &services).await;
        assert_eq!(backend.emails.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_email_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(EmailBackend::default());
        let services = services(backend.clone(), dir.path(), false);

        let mut stage = ConfirmationStage::new(booking());
        let result = stage.run(TicketAction::Email, &services).await;
        assert_eq!(result, Err(SideEffectError::NotSignedIn));
        assert_eq!(backend.emails.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_download_writes_ticket() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(Arc::new(EmailBackend::default()), dir.path(), true);

        let mut stage = ConfirmationStage::new(booking());
        stage.run(TicketAction::Download, &services).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("ticket-YT-2026_0981.txt")).unwrap();
        assert_eq!(written, stage.ticket().text);
        assert_eq!(stage.action_state(TicketAction::Download), ActionState::Succeeded);
        assert_eq!(stage.action_state(TicketAction::Print), ActionState::Idle);
    }
}
