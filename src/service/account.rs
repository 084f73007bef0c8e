//! Account service
//!
//! Identity validation over the account store. The email pattern is
//! compiled once at construction and held by the instance, so separate
//! service instances never share mutable state.

use regex::Regex;

use crate::domain::{Account, DomainError};
use crate::error::{AppError, AppResult};
use crate::store::AccountStore;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

pub struct AccountService<S> {
    store: S,
    email_regex: Regex,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: S) -> Self {
        let email_regex = Regex::new(EMAIL_PATTERN).expect("Invalid EMAIL_PATTERN constant");

        Self { store, email_regex }
    }

    fn validate_email(&self, email: &str) -> Result<(), DomainError> {
        if !self.email_regex.is_match(email) {
            tracing::error!("Invalid email: {}", email);
            return Err(DomainError::InvalidEmail(email.to_string()));
        }
        Ok(())
    }

    fn validate(&self, account: &Account) -> Result<(), DomainError> {
        if account.username.is_empty() {
            tracing::error!("Invalid username");
            return Err(DomainError::InvalidUsername);
        }

        self.validate_email(&account.email)?;

        if account.role.is_empty() {
            tracing::error!("Invalid role");
            return Err(DomainError::InvalidRole);
        }

        Ok(())
    }

    pub async fn create(&self, account: Account, plain_password: &str) -> AppResult<Account> {
        self.validate(&account)?;

        if plain_password.is_empty() {
            tracing::error!("Empty password");
            return Err(DomainError::EmptyPassword.into());
        }

        Ok(self.store.create(&account, plain_password).await?)
    }

    pub async fn update(&self, account: Account) -> AppResult<Account> {
        self.validate(&account)?;
        Ok(self.store.update(&account).await?)
    }

    pub async fn update_password(&self, email: &str, new_password: &str) -> AppResult<()> {
        self.validate_email(email)?;

        if new_password.is_empty() {
            tracing::error!("Empty new password");
            return Err(DomainError::EmptyPassword.into());
        }

        Ok(self.store.update_password(email, new_password).await?)
    }

    pub async fn delete(&self, email: &str) -> AppResult<()> {
        self.validate_email(email)?;
        Ok(self.store.delete(email).await?)
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<Account> {
        self.validate_email(email)?;
        Ok(self.store.get_by_email(email).await?)
    }

    /// Verify credentials; the comparison inside the store is constant
    /// time.
    pub async fn authenticate(&self, email: &str, plain_password: &str) -> AppResult<Account> {
        self.validate_email(email)?;

        if !self.store.verify_password(email, plain_password).await? {
            return Err(DomainError::Unauthorized("invalid credentials".to_string()).into());
        }

        Ok(self.store.get_by_email(email).await?)
    }

    pub async fn list(&self, search_term: &str) -> AppResult<Vec<Account>> {
        Ok(self.store.list(search_term).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn account(username: &str, email: &str, role: &str) -> Account {
        Account {
            id: 0,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            role: role.to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_valid_account() {
        let service = AccountService::new(MemoryStore::new());
        let created = service
            .create(account("alice", "alice@example.com", "investor"), "hunter2")
            .await
            .unwrap();

        assert!(created.id > 0);
        assert_ne!(created.password_hash, "hunter2");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_email() {
        let service = AccountService::new(MemoryStore::new());

        for email in ["", "not-an-email", "a@b", "spaces in@example.com"] {
            let result = service
                .create(account("alice", email, "investor"), "hunter2")
                .await;
            assert!(
                matches!(result, Err(AppError::Domain(DomainError::InvalidEmail(_)))),
                "expected rejection for email: {email:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_create_rejects_empty_password() {
        let service = AccountService::new(MemoryStore::new());
        let result = service
            .create(account("alice", "alice@example.com", "investor"), "")
            .await;

        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::EmptyPassword))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let service = AccountService::new(store.clone());
        service
            .create(account("alice", "alice@example.com", "investor"), "pw1")
            .await
            .unwrap();
        assert!(store.exists_by_email("alice@example.com").await.unwrap());

        let result = service
            .create(account("alice2", "alice@example.com", "owner"), "pw2")
            .await;
        assert!(matches!(
            result,
            Err(AppError::Store(crate::store::StoreError::AccountAlreadyExists(_)))
        ));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let service = AccountService::new(MemoryStore::new());
        service
            .create(account("alice", "alice@example.com", "investor"), "hunter2")
            .await
            .unwrap();

        let ok = service.authenticate("alice@example.com", "hunter2").await;
        assert!(ok.is_ok());

        let bad = service.authenticate("alice@example.com", "wrong").await;
        assert!(matches!(
            bad,
            Err(AppError::Domain(DomainError::Unauthorized(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_password_then_authenticate() {
        let service = AccountService::new(MemoryStore::new());
        service
            .create(account("alice", "alice@example.com", "investor"), "old-pw")
            .await
            .unwrap();

        service
            .update_password("alice@example.com", "new-pw")
            .await
            .unwrap();

        assert!(service.authenticate("alice@example.com", "new-pw").await.is_ok());
        assert!(service.authenticate("alice@example.com", "old-pw").await.is_err());
    }
}
