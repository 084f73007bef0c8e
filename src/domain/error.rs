//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// Business rule violations and domain invariant failures.
///
/// Independent of the web/persistence layers; the HTTP mapping lives in
/// `crate::error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Investment references a non-positive user id
    #[error("Invalid investment user")]
    InvalidInvestmentUser,

    /// Investment references a non-positive project id
    #[error("Invalid investment project")]
    InvalidInvestmentProject,

    /// Investment amount is zero, negative or malformed
    #[error("Invalid investment amount: {0}")]
    InvalidInvestmentAmount(String),

    /// Project name is empty
    #[error("Invalid project name")]
    InvalidProjectName,

    /// Project description is empty
    #[error("Invalid project description")]
    InvalidProjectDescription,

    /// Project owner id is non-positive
    #[error("Invalid project owner")]
    InvalidProjectOwner,

    /// Project status label is empty
    #[error("Invalid project status")]
    InvalidProjectStatus,

    /// Requested amount is zero, negative or malformed
    #[error("Invalid project amount requested: {0}")]
    InvalidProjectAmount(String),

    /// Deadline is not strictly in the future
    #[error("Invalid project deadline: deadline is in the past")]
    InvalidProjectDeadline,

    /// Username is empty
    #[error("Invalid username")]
    InvalidUsername,

    /// Email does not match the account service's pattern
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Role label is empty
    #[error("Invalid role")]
    InvalidRole,

    /// Password is empty
    #[error("Password cannot be empty")]
    EmptyPassword,

    /// Acting identity does not own the resource
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    /// Check if this is a client error (caller's fault, never retried)
    pub fn is_client_error(&self) -> bool {
        // Every domain error is either bad input or a failed ownership
        // check; infrastructure failures live in StoreError.
        true
    }

    /// Check if this is an authorization failure
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_classification() {
        let err = DomainError::Unauthorized("investment 42".to_string());
        assert!(err.is_unauthorized());
        assert!(err.is_client_error());
        assert!(err.to_string().contains("investment 42"));
    }

    #[test]
    fn test_validation_errors_are_client_errors() {
        assert!(DomainError::InvalidInvestmentUser.is_client_error());
        assert!(!DomainError::InvalidInvestmentAmount("0".into()).is_unauthorized());
    }
}
