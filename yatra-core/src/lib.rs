pub mod booking;
pub mod identity;
pub mod passenger;
pub mod payment;
pub mod repository;
pub mod schedule;

pub use booking::{CreateBookingRequest, CreatedBooking, SeatAvailability};
pub use identity::{Role, Session, SessionProvider, StaticSessionProvider, UserProfile};
pub use passenger::{FieldError, PassengerDetails, PassengerField};
pub use payment::{
    AuthorizationRequest, BookingPaymentStatus, GatewayAuthorization, GatewayError,
    PaymentGateway, PaymentMethod, SimulatedWalletGateway, WalletCredentials,
};
pub use repository::{BackendError, BookingBackend};
pub use schedule::ScheduleSelection;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Identity verification failed: {0}")]
    IdentityError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
