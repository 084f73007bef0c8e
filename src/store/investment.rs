//! Postgres investment store
//!
//! The transactional heart of the ledger: every investment mutation and
//! the owning project's raised-amount adjustment commit or roll back as
//! one unit, serialized per project by `SELECT ... FOR UPDATE`.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::Investment;

use super::{map_db_error, InvestmentStore, StoreError};

/// Bound on row-lock waits inside a reconciliation transaction.
/// Exceeding it surfaces as a retryable conflict, never silent success.
const LOCK_TIMEOUT: &str = "5s";

/// SQLSTATE for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Clone)]
pub struct PgInvestmentStore {
    pool: PgPool,
}

impl PgInvestmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::TransactionStart)?;

        sqlx::query(&format!("SET LOCAL lock_timeout = '{LOCK_TIMEOUT}'"))
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        Ok(tx)
    }

    /// Acquire the project row lock that serializes all reconciliation
    /// against this project.
    async fn lock_project(
        tx: &mut Transaction<'_, Postgres>,
        project_id: i64,
    ) -> Result<(), StoreError> {
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
                .bind(project_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(map_db_error)?;

        locked
            .map(|_| ())
            .ok_or(StoreError::ProjectNotFound(project_id))
    }

    /// Apply `delta` to the locked project's raised total.
    ///
    /// Private on purpose: callable only with the open transaction that
    /// also persists the triggering investment mutation, so the two writes
    /// are indivisible.
    async fn update_raised_amount(
        tx: &mut Transaction<'_, Postgres>,
        project_id: i64,
        delta: Decimal,
    ) -> Result<(), StoreError> {
        let rows_affected =
            sqlx::query("UPDATE projects SET amount_raised = amount_raised + $2 WHERE id = $1")
                .bind(project_id)
                .bind(delta)
                .execute(&mut **tx)
                .await
                .map_err(map_db_error)?
                .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::ProjectNotFound(project_id));
        }

        Ok(())
    }

    /// Load an investment row under lock, failing when absent.
    async fn lock_investment(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Investment, StoreError> {
        let existing: Option<Investment> = sqlx::query_as(
            r#"
            SELECT id, user_id, project_id, amount, invested_at
            FROM investments
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)?;

        existing.ok_or(StoreError::InvestmentNotFound(id))
    }
}

#[async_trait]
impl InvestmentStore for PgInvestmentStore {
    async fn create(&self, investment: &Investment) -> Result<Investment, StoreError> {
        let mut tx = self.begin().await?;

        Self::lock_project(&mut tx, investment.project_id).await?;

        let invested_at = investment.invested_at.unwrap_or_else(Utc::now);

        let row: Investment = sqlx::query_as(
            r#"
            INSERT INTO investments (user_id, project_id, amount, invested_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, project_id, amount, invested_at
            "#,
        )
        .bind(investment.user_id)
        .bind(investment.project_id)
        .bind(investment.amount)
        .bind(invested_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // The project is locked above, so a foreign-key failure here
            // can only be the investor.
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                    return StoreError::UserNotFound(investment.user_id);
                }
            }
            map_db_error(e)
        })?;

        Self::update_raised_amount(&mut tx, investment.project_id, investment.amount.value())
            .await?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(row)
    }

    async fn update(
        &self,
        investment: &Investment,
        delta: Decimal,
    ) -> Result<Investment, StoreError> {
        let mut tx = self.begin().await?;

        let existing = Self::lock_investment(&mut tx, investment.id).await?;

        if delta != Decimal::ZERO {
            Self::lock_project(&mut tx, existing.project_id).await?;
        }

        let row: Investment = sqlx::query_as(
            r#"
            UPDATE investments
            SET amount = $2, invested_at = $3
            WHERE id = $1
            RETURNING id, user_id, project_id, amount, invested_at
            "#,
        )
        .bind(existing.id)
        .bind(investment.amount)
        .bind(investment.invested_at.or(existing.invested_at))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        // No-op deltas commit the row update without touching the project.
        if delta != Decimal::ZERO {
            Self::update_raised_amount(&mut tx, existing.project_id, delta).await?;
        }

        tx.commit().await.map_err(map_db_error)?;

        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        let existing = Self::lock_investment(&mut tx, id).await?;

        Self::lock_project(&mut tx, existing.project_id).await?;

        sqlx::query("DELETE FROM investments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        Self::update_raised_amount(&mut tx, existing.project_id, -existing.amount.value()).await?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Investment, StoreError> {
        let investment: Option<Investment> = sqlx::query_as(
            r#"
            SELECT id, user_id, project_id, amount, invested_at
            FROM investments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        investment.ok_or(StoreError::InvestmentNotFound(id))
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Investment>, StoreError> {
        sqlx::query_as(
            r#"
            SELECT id, user_id, project_id, amount, invested_at
            FROM investments
            WHERE user_id = $1
            ORDER BY invested_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn get_by_project_id(&self, project_id: i64) -> Result<Vec<Investment>, StoreError> {
        sqlx::query_as(
            r#"
            SELECT id, user_id, project_id, amount, invested_at
            FROM investments
            WHERE project_id = $1
            ORDER BY invested_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
