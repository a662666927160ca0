use serde::{Deserialize, Serialize};
use yatra_shared::Money;

/// 100% expressed in basis points
pub const FULL_RATE_BPS: u32 = 10_000;

/// How the service fee is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeRule {
    /// Share of the subtotal, in basis points (2% = 200)
    Percentage { basis_points: u32 },
    /// Fixed amount per booking, in minor units
    Flat { amount: Money },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareConfig {
    pub service_fee: FeeRule,

    /// Tax on the subtotal, in basis points
    pub tax_rate_bps: u32,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            service_fee: FeeRule::Percentage { basis_points: 200 },
            tax_rate_bps: 500,
        }
    }
}

/// Itemised price of a booking. Always derived, never entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub fare_per_seat: Money,
    pub seat_count: u32,
    pub subtotal: Money,
    pub service_fee: Money,
    pub tax: Money,
    pub grand_total: Money,
}

impl FareBreakdown {
    pub fn zero(fare_per_seat: Money) -> Self {
        Self {
            fare_per_seat,
            seat_count: 0,
            subtotal: Money::ZERO,
            service_fee: Money::ZERO,
            tax: Money::ZERO,
            grand_total: Money::ZERO,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.fare_per_seat.checked_mul(self.seat_count) == Some(self.subtotal)
            && self
                .subtotal
                .checked_add(self.service_fee)
                .and_then(|m| m.checked_add(self.tax))
                == Some(self.grand_total)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Rate out of range: {0} bps (max 10000)")]
    RateOutOfRange(u32),

    #[error("Fare overflow for {seats} seats at {fare}")]
    Overflow { fare: Money, seats: u32 },
}

/// Fare computation shared by every stage that shows a price
#[derive(Debug, Clone)]
pub struct FareEngine {
    config: FareConfig,
}

impl FareEngine {
    pub fn new(config: FareConfig) -> Result<Self, PricingError> {
        if let FeeRule::Percentage { basis_points } = config.service_fee {
            if basis_points > FULL_RATE_BPS {
                return Err(PricingError::RateOutOfRange(basis_points));
            }
        }
        if config.tax_rate_bps > FULL_RATE_BPS {
            return Err(PricingError::RateOutOfRange(config.tax_rate_bps));
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &FareConfig {
        &self.config
    }

    /// Seat fare only, as shown in the selection summary
    pub fn subtotal(&self, fare_per_seat: Money, seat_count: u32) -> Result<Money, PricingError> {
        fare_per_seat
            .checked_mul(seat_count)
            .ok_or(PricingError::Overflow {
                fare: fare_per_seat,
                seats: seat_count,
            })
    }

    /// Breakdown carrying only the seat fare; fees and tax are added at review
    pub fn seat_fare(&self, fare_per_seat: Money, seat_count: u32) -> Result<FareBreakdown, PricingError> {
        let subtotal = self.subtotal(fare_per_seat, seat_count)?;
        Ok(FareBreakdown {
            fare_per_seat,
            seat_count,
            subtotal,
            service_fee: Money::ZERO,
            tax: Money::ZERO,
            grand_total: subtotal,
        })
    }

    /// Full breakdown from (fare per seat, seat count). Pure: equal inputs give equal output.
    pub fn quote(&self, fare_per_seat: Money, seat_count: u32) -> Result<FareBreakdown, PricingError> {
        if seat_count == 0 {
            return Ok(FareBreakdown::zero(fare_per_seat));
        }

        let subtotal = self.subtotal(fare_per_seat, seat_count)?;
        let service_fee = match self.config.service_fee {
            FeeRule::Percentage { basis_points } => subtotal.percent_bps(basis_points),
            FeeRule::Flat { amount } => amount,
        };
        let tax = subtotal.percent_bps(self.config.tax_rate_bps);

        let grand_total = subtotal
            .checked_add(service_fee)
            .and_then(|m| m.checked_add(tax))
            .ok_or(PricingError::Overflow {
                fare: fare_per_seat,
                seats: seat_count,
            })?;

        Ok(FareBreakdown {
            fare_per_seat,
            seat_count,
            subtotal,
            service_fee,
            tax,
            grand_total,
        })
    }
}

impl Default for FareEngine {
    fn default() -> Self {
        Self {
            config: FareConfig::default(),
        }
    }
}
