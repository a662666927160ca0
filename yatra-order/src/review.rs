use yatra_catalog::{FareBreakdown, FareEngine, PricingError};

use crate::models::BookingDraft;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReviewError {
    #[error("Nothing to review: the booking has no seats")]
    EmptyDraft,

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Read-only bill shown before payment. Totals are always recomputed on entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewStage {
    draft: BookingDraft,
}

impl ReviewStage {
    pub fn enter(mut draft: BookingDraft, fares: &FareEngine) -> Result<Self, ReviewError> {
        if draft.seats.is_empty() {
            return Err(ReviewError::EmptyDraft);
        }
        draft.reprice(fares)?;

        tracing::debug!(
            schedule_id = draft.schedule.schedule_id,
            seats = draft.seat_count(),
            grand_total = %draft.fare.grand_total,
            "Bill computed"
        );
        Ok(Self { draft })
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn fare(&self) -> &FareBreakdown {
        &self.draft.fare
    }

    /// Go back to seat selection; the draft is returned for the selection stage to resume from
    pub fn edit(self) -> BookingDraft {
        self.draft
    }

    /// Plain-text bill, one line per item
    pub fn bill_lines(&self) -> Vec<(String, String)> {
        let fare = &self.draft.fare;
        vec![
            (
                format!("Seat fare ({} x {})", fare.seat_count, fare.fare_per_seat),
                fare.subtotal.to_string(),
            ),
            ("Service fee".to_string(), fare.service_fee.to_string()),
            ("Tax".to_string(), fare.tax.to_string()),
            ("Total".to_string(), fare.grand_total.to_string()),
        ]
    }
}
