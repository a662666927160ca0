use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;
use yatra_shared::{Masked, Money};

/// How the customer settles the fare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Esewa,
    Khalti,
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    /// Wallets are authorized by the gateway before the booking is created. Offline methods are
    /// collected at the counter or at boarding.
    pub fn requires_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Esewa | PaymentMethod::Khalti)
    }

    pub fn booking_payment_status(&self) -> BookingPaymentStatus {
        if self.requires_gateway() {
            BookingPaymentStatus::Paid
        } else {
            BookingPaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Esewa => "esewa",
            PaymentMethod::Khalti => "khalti",
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status recorded with the booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingPaymentStatus {
    #[serde(rename = "success")]
    Paid,
    #[serde(rename = "pending")]
    Pending,
}

impl BookingPaymentStatus {
    /// Label printed on the ticket
    pub fn label(&self) -> &'static str {
        match self {
            BookingPaymentStatus::Paid => "Paid",
            BookingPaymentStatus::Pending => "Pending - Pay at Counter",
        }
    }
}

/// Wallet login used to approve a "pay now" charge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletCredentials {
    pub mobile: Masked<String>,
    pub pin: Masked<String>,
}

impl WalletCredentials {
    pub fn new(mobile: &str, pin: &str) -> Self {
        Self {
            mobile: Masked::from(mobile),
            pin: Masked::from(pin),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Same key that is later sent with the booking-create call
    pub idempotency_key: Uuid,
    pub method: PaymentMethod,
    pub amount: Money,
    pub credentials: WalletCredentials,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayAuthorization {
    pub authorization_id: String,
    pub idempotency_key: Uuid,
    pub method: PaymentMethod,
    pub amount: Money,
    pub authorized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Wallet credentials rejected: {0}")]
    InvalidCredentials(String),

    #[error("Payment gateway did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorize a charge with the wallet provider
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<GatewayAuthorization, GatewayError>;

    /// Release a previous authorization (used when the booking could not be created)
    async fn void(&self, authorization: &GatewayAuthorization) -> Result<(), GatewayError>;
}

/// Development gateway standing in for the eSewa/Khalti integrations. Simulates the wallet
/// round-trip latency and performs the same input checks the wallet login form does.
pub struct SimulatedWalletGateway {
    latency: Duration,
}

impl SimulatedWalletGateway {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedWalletGateway {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedWalletGateway {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<GatewayAuthorization, GatewayError> {
        tokio::time::sleep(self.latency).await;

        if !request.method.requires_gateway() {
            return Err(GatewayError::Declined(format!(
                "{} is not a wallet method",
                request.method
            )));
        }

        let mobile = request.credentials.mobile.expose().trim();
        if mobile.len() != 10 || !mobile.chars().all(|c| c.is_ascii_digit()) {
            return Err(GatewayError::InvalidCredentials(
                "wallet mobile number must be 10 digits".to_string(),
            ));
        }
        if request.credentials.pin.is_blank() {
            return Err(GatewayError::InvalidCredentials("PIN is required".to_string()));
        }
        if request.amount.is_zero() {
            return Err(GatewayError::Declined("nothing to charge".to_string()));
        }

        // Derived from the idempotency key so a retried authorization maps to the same charge
        let authorization_id = format!("sim_auth_{}", request.idempotency_key.simple());

        tracing::info!(
            authorization_id = %authorization_id,
            method = %request.method,
            amount = %request.amount,
            "Simulated wallet authorization approved"
        );

        Ok(GatewayAuthorization {
            authorization_id,
            idempotency_key: request.idempotency_key,
            method: request.method,
            amount: request.amount,
            authorized_at: Utc::now(),
        })
    }

    async fn void(&self, authorization: &GatewayAuthorization) -> Result<(), GatewayError> {
        tokio::time::sleep(self.latency).await;
        tracing::info!(
            authorization_id = %authorization.authorization_id,
            amount = %authorization.amount,
            "Simulated wallet authorization voided"
        );
        Ok(())
    }
}
