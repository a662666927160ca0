pub mod checkout;
pub mod fulfillment;
pub mod models;
pub mod pipeline;
pub mod reconciliation;
pub mod review;
pub mod selection;

pub use checkout::{
    CheckoutError, CheckoutHandle, CheckoutSuccess, CheckoutValidation, ConfirmRequest,
    PaymentAttempt, PaymentEntry, PaymentProcessor, PaymentStage, PaymentState,
    DEFAULT_GATEWAY_TIMEOUT,
};
pub use fulfillment::{
    ActionState, ConfirmationStage, FileTicketSink, SideEffectError, Ticket, TicketAction,
    TicketServices, TicketSink,
};
pub use models::{BookingDraft, ConfirmedBooking};
pub use pipeline::{
    BookingPipeline, DraftPersistence, FailedBooking, NoPersistence, PersistenceError,
    PipelineError, PipelineStage,
};
pub use reconciliation::{PartialFailure, ReconciliationPolicy, Reconciler, Resolution};
pub use review::{ReviewError, ReviewStage};
pub use selection::{IgnoreReason, SeatSelectionStage, SelectedSeats, SelectionError, ToggleOutcome};
