use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use yatra_core::{BackendError, GatewayAuthorization, PaymentGateway};

/// What to do with a charge whose booking could not be created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationPolicy {
    /// Void the authorization right away
    #[default]
    AutoVoid,
    /// Leave the charge in place for an operator
    ManualReview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Voided,
    PendingManualReview { reason: String },
}

/// A payment that succeeded at the gateway while the booking-create call failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub authorization: GatewayAuthorization,
    pub booking_error: String,
    pub resolution: Resolution,
    pub recorded_at: DateTime<Utc>,
}

impl PartialFailure {
    pub fn needs_operator(&self) -> bool {
        matches!(self.resolution, Resolution::PendingManualReview { .. })
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match &self.resolution {
            Resolution::Voided => format!(
                "Your booking could not be created. The {} charge of {} was cancelled.",
                self.authorization.method, self.authorization.amount
            ),
            Resolution::PendingManualReview { .. } => format!(
                "Your booking could not be created. Our team will refund the {} charge of {} (reference {}).",
                self.authorization.method, self.authorization.amount, self.authorization.authorization_id
            ),
        }
    }
}

pub struct Reconciler {
    policy: ReconciliationPolicy,
    gateway: Arc<dyn PaymentGateway>,
}

impl Reconciler {
    pub fn new(policy: ReconciliationPolicy, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { policy, gateway }
    }

    pub fn policy(&self) -> ReconciliationPolicy {
        self.policy
    }

    /// Settle a charge whose booking was definitely not created
    pub async fn reconcile(
        &self,
        authorization: GatewayAuthorization,
        booking_error: &BackendError,
    ) -> PartialFailure {
        let resolution = match self.policy {
            ReconciliationPolicy::AutoVoid => match self.gateway.void(&authorization).await {
                Ok(()) => {
                    tracing::warn!(
                        authorization_id = %authorization.authorization_id,
                        amount = %authorization.amount,
                        "Booking creation failed; authorization voided"
                    );
                    Resolution::Voided
                }
                Err(void_error) => {
                    tracing::error!(
                        authorization_id = %authorization.authorization_id,
                        amount = %authorization.amount,
                        "Void failed after booking creation failure: {}", void_error
                    );
                    Resolution::PendingManualReview {
                        reason: format!("void failed: {}", void_error),
                    }
                }
            },
            ReconciliationPolicy::ManualReview => {
                tracing::error!(
                    authorization_id = %authorization.authorization_id,
                    amount = %authorization.amount,
                    "Booking creation failed after payment; queued for manual review"
                );
                Resolution::PendingManualReview {
                    reason: "manual review policy".to_string(),
                }
            }
        };

        PartialFailure {
            authorization,
            booking_error: booking_error.to_string(),
            resolution,
            recorded_at: Utc::now(),
        }
    }
}
