use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{ApprovalLevel, RequestType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    pub level: ApprovalLevel,
    pub required_steps: u8,
}

impl ApprovalRequirement {
    fn for_level(level: ApprovalLevel) -> Self {
        Self { level, required_steps: level.required_steps() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("approval thresholds must be non-negative (low={low}, high={high})")]
    Negative { low: Decimal, high: Decimal },
    #[error("low approval threshold {low} must be strictly below high threshold {high}")]
    Inverted { low: Decimal, high: Decimal },
}

/// Monetary bands that decide how many approval steps a payment needs.
///
/// Each band is closed at its lower bound: `low` itself already needs the
/// chief-accountant step and `high` itself already needs the executive step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalThresholds {
    low: Decimal,
    high: Decimal,
}

impl ApprovalThresholds {
    pub fn new(low: Decimal, high: Decimal) -> Result<Self, ThresholdError> {
        if low.is_sign_negative() || high.is_sign_negative() {
            return Err(ThresholdError::Negative { low, high });
        }
        if low >= high {
            return Err(ThresholdError::Inverted { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> Decimal {
        self.low
    }

    pub fn high(&self) -> Decimal {
        self.high
    }

    pub fn resolve(
        &self,
        request_type: RequestType,
        amount: Option<Decimal>,
    ) -> ApprovalRequirement {
        let amount = match (request_type, amount) {
            (RequestType::Payment, Some(amount)) => amount,
            _ => return ApprovalRequirement::for_level(ApprovalLevel::None),
        };

        let level = if amount >= self.high {
            ApprovalLevel::Executive
        } else if amount >= self.low {
            ApprovalLevel::ChiefAccountant
        } else {
            ApprovalLevel::None
        };
        ApprovalRequirement::for_level(level)
    }
}

impl Default for ApprovalThresholds {
    fn default() -> Self {
        Self { low: Decimal::from(2_000_000_u64), high: Decimal::from(10_000_000_u64) }
    }
}
