//! Postgres account store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::domain::Account;

use super::password::{check_password, hash_password};
use super::{map_db_error, AccountStore, StoreError};

/// SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, account: &Account, plain_password: &str) -> Result<Account, StoreError> {
        let password_hash = hash_password(plain_password);
        let now = Utc::now();

        let result: Result<Account, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, username, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&password_hash)
        .bind(&account.role)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        result.map_err(|e| {
            // The unique index on email is the existence check.
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    return StoreError::AccountAlreadyExists(account.email.clone());
                }
            }
            map_db_error(e)
        })
    }

    async fn update(&self, account: &Account) -> Result<Account, StoreError> {
        let row: Option<Account> = sqlx::query_as(
            r#"
            UPDATE users
            SET username = $2, role = $3, updated_at = $4
            WHERE email = $1
            RETURNING id, username, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.role)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.ok_or_else(|| StoreError::AccountNotFound(account.email.clone()))
    }

    async fn update_password(&self, email: &str, new_password: &str) -> Result<(), StoreError> {
        let password_hash = hash_password(new_password);

        let rows_affected =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE email = $1")
                .bind(email)
                .bind(&password_hash)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?
                .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::AccountNotFound(email.to_string()));
        }

        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<(), StoreError> {
        let rows_affected = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::AccountNotFound(email.to_string()));
        }

        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let account: Option<Account> =
            sqlx::query_as(&format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_error)?;

        account.ok_or_else(|| StoreError::AccountNotFound(email.to_string()))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn verify_password(
        &self,
        email: &str,
        plain_password: &str,
    ) -> Result<bool, StoreError> {
        let account = self.get_by_email(email).await?;
        Ok(check_password(&account.password_hash, plain_password))
    }

    async fn list(&self, search_term: &str) -> Result<Vec<Account>, StoreError> {
        if search_term.is_empty() {
            sqlx::query_as(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM users ORDER BY created_at DESC"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
        } else {
            sqlx::query_as(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM users \
                 WHERE username ILIKE $1 OR email ILIKE $1 \
                 ORDER BY created_at DESC"
            ))
            .bind(format!("%{search_term}%"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
        }
    }
}
