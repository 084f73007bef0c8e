//! Store module
//!
//! Capability traits over persistence plus the shared store error type.
//! The funding service depends on these traits, never on a concrete
//! backend, so the reconciliation logic is testable against the in-memory
//! store in [`memory`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{Account, Investment, Project, ProjectPhoto};

mod account;
mod investment;
pub mod memory;
mod password;
mod project;

pub use account::PgAccountStore;
pub use investment::PgInvestmentStore;
pub use project::PgProjectStore;

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Investment not found: {0}")]
    InvestmentNotFound(i64),

    #[error("Project not found: {0}")]
    ProjectNotFound(i64),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Account with this email already exists: {0}")]
    AccountAlreadyExists(String),

    /// Lock-acquisition timeout or transaction serialization failure.
    /// Retrying the whole operation may succeed.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// A database constraint rejected the write (e.g. the raised total
    /// would go negative). Indicates a bug upstream, not caller error.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Failed to start transaction: {0}")]
    TransactionStart(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether the referenced entity was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::InvestmentNotFound(_)
                | Self::ProjectNotFound(_)
                | Self::AccountNotFound(_)
                | Self::UserNotFound(_)
        )
    }
}

/// SQLSTATE codes that indicate a retryable locking failure.
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "55P03", // lock_not_available (lock_timeout expired)
    "40001", // serialization_failure
    "40P01", // deadlock_detected
];

/// SQLSTATE for CHECK constraint violations.
const CHECK_VIOLATION: &str = "23514";

/// Map a sqlx error, turning lock/serialization failures into
/// [`StoreError::Conflict`] so callers can retry.
pub(crate) fn map_db_error(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if let Some(code) = db_err.code() {
            if RETRYABLE_SQLSTATES.contains(&code.as_ref()) {
                return StoreError::Conflict(db_err.message().to_string());
            }
            if code.as_ref() == CHECK_VIOLATION {
                return StoreError::Constraint(db_err.message().to_string());
            }
        }
    }
    StoreError::Database(err)
}

/// Persistence of user identity and credentials.
///
/// Consulted by the funding core only for existence; never mutated by it.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Persist a new account, hashing the plaintext password.
    async fn create(&self, account: &Account, plain_password: &str) -> Result<Account, StoreError>;

    /// Update username and role for the account with the given email.
    async fn update(&self, account: &Account) -> Result<Account, StoreError>;

    /// Replace the stored credential for the given email.
    async fn update_password(&self, email: &str, new_password: &str) -> Result<(), StoreError>;

    async fn delete(&self, email: &str) -> Result<(), StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Account, StoreError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;

    /// Verify a plaintext password against the stored credential.
    async fn verify_password(&self, email: &str, plain_password: &str)
        -> Result<bool, StoreError>;

    async fn list(&self, search_term: &str) -> Result<Vec<Account>, StoreError>;
}

/// Persistence of project records.
///
/// `update` and `delete` acquire the same per-project lock used by the
/// investment reconciliation path, so project-field edits never race the
/// raised-amount writes. `update` always preserves the stored
/// `amount_raised`; caller-supplied totals are discarded.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create(&self, project: &Project) -> Result<Project, StoreError>;

    async fn update(&self, project: &Project) -> Result<Project, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Project, StoreError>;

    async fn list(&self, search_term: &str) -> Result<Vec<Project>, StoreError>;

    async fn list_by_owner(
        &self,
        owner_id: i64,
        search_term: &str,
    ) -> Result<Vec<Project>, StoreError>;

    async fn photos_by_project(&self, project_id: i64) -> Result<Vec<ProjectPhoto>, StoreError>;

    async fn add_photo(&self, photo: &ProjectPhoto) -> Result<ProjectPhoto, StoreError>;
}

/// Persistence of investment records.
///
/// Every mutation here is one atomic unit with the owning project's
/// raised-amount adjustment: the implementation must serialize same-project
/// writers (row lock or an equivalent per-project mutual exclusion), apply
/// both writes inside one transaction, and roll back both on any failure.
/// There is no way to persist an investment mutation without the paired
/// project write.
#[async_trait]
pub trait InvestmentStore: Send + Sync {
    /// Persist the investment and credit its amount to the project's
    /// raised total. Fails with `ProjectNotFound` (persisting nothing)
    /// when the project is absent.
    async fn create(&self, investment: &Investment) -> Result<Investment, StoreError>;

    /// Persist the updated row and apply the signed `delta` to the
    /// project's raised total. The project write is skipped entirely when
    /// `delta` is zero.
    async fn update(&self, investment: &Investment, delta: Decimal)
        -> Result<Investment, StoreError>;

    /// Delete the row and debit its amount from the project's raised
    /// total.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Investment, StoreError>;

    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Investment>, StoreError>;

    async fn get_by_project_id(&self, project_id: i64) -> Result<Vec<Investment>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        let err = StoreError::Conflict("lock timeout".to_string());
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(StoreError::InvestmentNotFound(1).is_not_found());
        assert!(StoreError::ProjectNotFound(2).is_not_found());
        assert!(!StoreError::ProjectNotFound(2).is_retryable());
    }
}
