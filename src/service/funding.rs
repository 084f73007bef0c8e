//! Funding service
//!
//! Business logic for the investment lifecycle: validation, ownership
//! checks, delta computation, and bounded retry around the store's atomic
//! investment-and-raised-total writes.

use std::time::Duration;

use crate::domain::{DomainError, Investment};
use crate::error::{AppError, AppResult};
use crate::store::{InvestmentStore, StoreError};

/// Attempts per operation when the store reports a retryable conflict
const MAX_RETRIES: u32 = 3;

/// Funding service over any investment store.
///
/// The store contract guarantees each mutation and its raised-amount
/// adjustment are one atomic unit; this layer owns everything that must
/// happen before a transaction opens (fail fast, no partial effect).
pub struct FundingService<S> {
    store: S,
}

impl<S: InvestmentStore> FundingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate investment references.
    ///
    /// The amount needs no check here: `Amount` cannot hold a
    /// non-positive value, so an invalid amount is rejected where the raw
    /// input is parsed.
    fn validate(&self, investment: &Investment) -> Result<(), DomainError> {
        if investment.user_id <= 0 {
            tracing::error!("Invalid investment user");
            return Err(DomainError::InvalidInvestmentUser);
        }

        if investment.project_id <= 0 {
            tracing::error!("Invalid investment project");
            return Err(DomainError::InvalidInvestmentProject);
        }

        Ok(())
    }

    /// Load an investment and check the acting user owns it.
    async fn load_owned(&self, id: i64, acting_user_id: i64) -> AppResult<Investment> {
        let existing = self.store.get_by_id(id).await?;

        if existing.user_id != acting_user_id {
            return Err(DomainError::Unauthorized(format!("investment {id}")).into());
        }

        Ok(existing)
    }

    /// Create a new investment and credit the project's raised total.
    pub async fn create(&self, investment: Investment, acting_user_id: i64) -> AppResult<Investment> {
        let mut investment = investment;
        investment.user_id = acting_user_id;
        self.validate(&investment)?;

        let created =
            retry_conflicts("create investment", || self.store.create(&investment)).await?;

        tracing::info!(
            investment_id = created.id,
            project_id = created.project_id,
            user_id = created.user_id,
            amount = %created.amount,
            "Investment created"
        );

        Ok(created)
    }

    /// Update an owned investment, reconciling the raised total by the
    /// signed amount difference. An unchanged amount skips the project
    /// write entirely.
    pub async fn update(&self, investment: Investment, acting_user_id: i64) -> AppResult<Investment> {
        let existing = self.load_owned(investment.id, acting_user_id).await?;

        // The stored investor and project win; a pledge is not
        // re-targetable to another user or project.
        let candidate = Investment {
            id: existing.id,
            user_id: existing.user_id,
            project_id: existing.project_id,
            amount: investment.amount,
            invested_at: investment.invested_at.or(existing.invested_at),
        };
        self.validate(&candidate)?;

        let delta = candidate.amount.delta(&existing.amount);

        let updated =
            retry_conflicts("update investment", || self.store.update(&candidate, delta)).await?;

        tracing::info!(
            investment_id = updated.id,
            project_id = updated.project_id,
            delta = %delta,
            "Investment updated"
        );

        Ok(updated)
    }

    /// Delete an owned investment, debiting its amount from the raised
    /// total.
    pub async fn delete(&self, id: i64, acting_user_id: i64) -> AppResult<()> {
        self.load_owned(id, acting_user_id).await?;

        retry_conflicts("delete investment", || self.store.delete(id)).await?;

        tracing::info!(investment_id = id, "Investment deleted");

        Ok(())
    }

    /// Fetch an investment; only its owner may read it.
    pub async fn get_by_id(&self, id: i64, acting_user_id: i64) -> AppResult<Investment> {
        self.load_owned(id, acting_user_id).await
    }

    /// List a user's investments; only that user may ask.
    pub async fn get_by_user_id(
        &self,
        user_id: i64,
        requesting_user_id: i64,
    ) -> AppResult<Vec<Investment>> {
        if requesting_user_id != user_id {
            return Err(DomainError::Unauthorized(format!("investments of user {user_id}")).into());
        }

        Ok(self.store.get_by_user_id(user_id).await?)
    }

    /// List all investments on a project. Unrestricted read.
    pub async fn get_by_project_id(&self, project_id: i64) -> AppResult<Vec<Investment>> {
        Ok(self.store.get_by_project_id(project_id).await?)
    }
}

/// Run a store operation, retrying bounded times on retryable conflicts
/// with linear backoff.
async fn retry_conflicts<T, Fut, F>(op: &str, mut attempt_fn: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match attempt_fn().await {
            Err(e) if e.is_retryable() && attempt + 1 < MAX_RETRIES => {
                attempt += 1;
                let delay = Duration::from_millis(50 * attempt as u64);
                tracing::warn!(
                    "Write conflict during {}, retrying (attempt {}/{})",
                    op,
                    attempt,
                    MAX_RETRIES
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

/// Map a failed amount parse to the investment validation error.
pub fn invalid_amount(err: crate::domain::AmountError) -> AppError {
    DomainError::InvalidInvestmentAmount(err.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Amount;
    use crate::store::memory::MemoryStore;
    use crate::store::ProjectStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn project(owner_id: i64) -> crate::domain::Project {
        crate::domain::Project {
            id: 0,
            owner_id,
            status: "active".to_string(),
            name: "Test project".to_string(),
            description: "A project under test".to_string(),
            amount_requested: Amount::new(dec!(1000)).unwrap(),
            amount_raised: Default::default(),
            deadline_at: None,
            created_at: None,
        }
    }

    fn pledge(user_id: i64, project_id: i64, amount: Decimal) -> Investment {
        Investment {
            id: 0,
            user_id,
            project_id,
            amount: Amount::new(amount).unwrap(),
            invested_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_user() {
        let service = FundingService::new(MemoryStore::new());
        let result = service.create(pledge(0, 1, dec!(10)), 0).await;

        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::InvalidInvestmentUser))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_project() {
        let service = FundingService::new(MemoryStore::new());
        let result = service.create(pledge(1, -3, dec!(10)), 1).await;

        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::InvalidInvestmentProject))
        ));
    }

    #[tokio::test]
    async fn test_create_missing_project_persists_nothing() {
        let store = MemoryStore::new();
        let service = FundingService::new(store.clone());

        let result = service.create(pledge(1, 99, dec!(10)), 1).await;
        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::ProjectNotFound(99)))
        ));

        let rows = service.get_by_project_id(99).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_create_stamps_invested_at() {
        let store = MemoryStore::new();
        let project = ProjectStore::create(&store, &project(1)).await.unwrap();
        let service = FundingService::new(store);

        let created = service
            .create(pledge(2, project.id, dec!(25)), 2)
            .await
            .unwrap();
        assert!(created.invested_at.is_some());
        assert!(created.id > 0);
    }

    #[tokio::test]
    async fn test_update_is_not_retargetable() {
        let store = MemoryStore::new();
        let p1 = ProjectStore::create(&store, &project(1)).await.unwrap();
        let p2 = ProjectStore::create(&store, &project(1)).await.unwrap();
        let service = FundingService::new(store.clone());

        let created = service.create(pledge(2, p1.id, dec!(100)), 2).await.unwrap();

        // Attempt to move the pledge to another project and user
        let mut moved = pledge(9, p2.id, dec!(100));
        moved.id = created.id;
        let updated = service.update(moved, 2).await.unwrap();

        assert_eq!(updated.user_id, 2);
        assert_eq!(updated.project_id, p1.id);

        let p2_after = ProjectStore::get_by_id(&store, p2.id).await.unwrap();
        assert_eq!(p2_after.amount_raised.value(), dec!(0));
    }
}
