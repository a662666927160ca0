pub mod checkout;
pub mod state;
pub mod telemetry;

pub use checkout::{run_checkout, CheckoutOutcome, CheckoutRequest};
pub use state::AppContext;
