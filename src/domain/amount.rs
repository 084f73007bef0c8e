//! Monetary types
//!
//! Domain primitives for money with business rule validation.
//! All values are validated at construction time, ensuring invalid values
//! cannot exist in the system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// Maximum allowed monetary value (1 billion)
const MAX_AMOUNT: &str = "1000000000";

/// Maximum decimal places (2, currency cents)
const MAX_SCALE: u32 = 2;

/// Amount represents a validated monetary value.
///
/// Used for investment amounts and a project's requested target.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum 2 decimal places
/// - Maximum value is 1 billion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use crowdledger::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(25000, 2)).unwrap();
/// assert_eq!(amount.value(), Decimal::new(25000, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct Amount(Decimal);

/// Errors that can occur when creating a monetary value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 2 decimal places
    /// - `AmountError::Overflow` if value > 1 billion
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        if value.scale() > MAX_SCALE {
            return Err(AmountError::TooManyDecimals(value.scale()));
        }

        let max = Decimal::from_str(MAX_AMOUNT).expect("Invalid MAX_AMOUNT constant");
        if value > max {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// Create an Amount from an integer (no decimal places).
    pub fn from_integer(value: i64) -> Result<Self, AmountError> {
        Self::new(Decimal::from(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Add two amounts, validating the sum.
    pub fn try_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        Amount::new(self.0 + other.0)
    }

    /// Signed difference `self - other`.
    ///
    /// May be negative; used to compute the reconciliation delta when an
    /// investment is edited downward.
    pub fn delta(&self, other: &Amount) -> Decimal {
        self.0 - other.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        format!("{:.2}", amount.0)
    }
}

impl Add for Amount {
    type Output = Result<Amount, AmountError>;

    fn add(self, rhs: Self) -> Self::Output {
        self.try_add(&rhs)
    }
}

// Note: We don't implement Sub because the result might be <= 0.
// Use Amount::delta for the signed difference.

/// Raised represents a project's running raised total (zero or positive).
/// Unlike Amount, Raised can be zero, and it absorbs signed deltas from the
/// reconciliation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct Raised(Decimal);

impl Raised {
    /// Create a new raised total (zero or positive)
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }

        let max = Decimal::from_str(MAX_AMOUNT).expect("Invalid MAX_AMOUNT constant");
        if value > max {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// The canonical zero every project starts at
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Add an investment amount to the total
    pub fn credit(&self, amount: &Amount) -> Result<Raised, AmountError> {
        Raised::new(self.0 + amount.value())
    }

    /// Subtract an investment amount from the total
    pub fn debit(&self, amount: &Amount) -> Result<Raised, AmountError> {
        Raised::new(self.0 - amount.value())
    }

    /// Apply a signed delta.
    ///
    /// Deletions and downward edits pass a negative delta; the result must
    /// still be a valid total.
    pub fn apply(&self, delta: Decimal) -> Result<Raised, AmountError> {
        Raised::new(self.0 + delta)
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Raised {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Raised {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| AmountError::ParseError(e.to_string()))?;
        Raised::new(decimal)
    }
}

impl TryFrom<String> for Raised {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Raised::from_str(&value)
    }
}

impl From<Raised> for String {
    fn from(raised: Raised) -> Self {
        format!("{:.2}", raised.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(Decimal::new(100, 0));
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), Decimal::new(100, 0));
    }

    #[test]
    fn test_amount_zero_rejected() {
        let amount = Amount::new(Decimal::ZERO);
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_negative_rejected() {
        let amount = Amount::new(Decimal::new(-100, 0));
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_too_many_decimals() {
        // 0.123 has 3 decimal places
        let amount = Amount::new(Decimal::new(123, 3));
        assert!(matches!(amount, Err(AmountError::TooManyDecimals(3))));
    }

    #[test]
    fn test_amount_max_decimals_ok() {
        // 0.12 has 2 decimal places
        let amount = Amount::new(Decimal::new(12, 2));
        assert!(amount.is_ok());
    }

    #[test]
    fn test_amount_overflow() {
        let value = Decimal::from_str("1000000001").unwrap();
        let amount = Amount::new(value);
        assert!(matches!(amount, Err(AmountError::Overflow)));
    }

    #[test]
    fn test_amount_max_value_ok() {
        let value = Decimal::from_str("1000000000").unwrap();
        let amount = Amount::new(value);
        assert!(amount.is_ok());
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Result<Amount, _> = "123.45".parse();
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), Decimal::new(12345, 2));
    }

    #[test]
    fn test_amount_try_add() {
        let a = Amount::new(Decimal::new(100, 0)).unwrap();
        let b = Amount::new(Decimal::new(50, 0)).unwrap();
        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum.value(), Decimal::new(150, 0));
    }

    #[test]
    fn test_amount_delta_signed() {
        let old = Amount::new(Decimal::new(400, 0)).unwrap();
        let new = Amount::new(Decimal::new(250, 0)).unwrap();

        assert_eq!(new.delta(&old), Decimal::new(-150, 0));
        assert_eq!(old.delta(&new), Decimal::new(150, 0));
        assert_eq!(old.delta(&old), Decimal::ZERO);
    }

    #[test]
    fn test_raised_credit_debit() {
        let raised = Raised::zero();
        let amount = Amount::new(Decimal::new(100, 0)).unwrap();

        let raised = raised.credit(&amount).unwrap();
        assert_eq!(raised.value(), Decimal::new(100, 0));

        let withdraw = Amount::new(Decimal::new(30, 0)).unwrap();
        let raised = raised.debit(&withdraw).unwrap();
        assert_eq!(raised.value(), Decimal::new(70, 0));
    }

    #[test]
    fn test_raised_cannot_go_negative() {
        let raised = Raised::new(Decimal::new(50, 0)).unwrap();
        let amount = Amount::new(Decimal::new(100, 0)).unwrap();

        let result = raised.debit(&amount);
        assert!(matches!(result, Err(AmountError::Negative(_))));
    }

    #[test]
    fn test_raised_apply_delta() {
        let raised = Raised::new(Decimal::new(250, 0)).unwrap();

        // Upward edit: 250 -> 400
        let raised = raised.apply(Decimal::new(150, 0)).unwrap();
        assert_eq!(raised.value(), Decimal::new(400, 0));

        // Deletion: 400 -> 0
        let raised = raised.apply(Decimal::new(-400, 0)).unwrap();
        assert_eq!(raised, Raised::zero());

        // Zero delta is a no-op
        let raised = raised.apply(Decimal::ZERO).unwrap();
        assert_eq!(raised, Raised::zero());
    }
}
