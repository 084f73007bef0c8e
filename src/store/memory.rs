//! In-memory store
//!
//! Implements all three store traits over plain maps, with a per-project
//! async mutex standing in for the database row lock: same-project
//! reconciliation serializes on it exactly as concurrent transactions
//! serialize on `SELECT ... FOR UPDATE`, while different projects proceed
//! in parallel. Nothing is mutated until every check on an operation has
//! passed, so a failed operation has no partial effect.
//!
//! Used by the funding-consistency test suite; also handy as a scratch
//! backend when poking at the API without a database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{Account, Investment, Project, ProjectPhoto};

use super::password::{check_password, hash_password};
use super::{AccountStore, InvestmentStore, ProjectStore, StoreError};

#[derive(Default)]
struct Tables {
    accounts: HashMap<i64, Account>,
    projects: HashMap<i64, Project>,
    investments: HashMap<i64, Investment>,
    photos: HashMap<i64, ProjectPhoto>,
    next_account_id: i64,
    next_project_id: i64,
    next_investment_id: i64,
    next_photo_id: i64,
}

/// In-memory backend shared across clones.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    project_locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the per-project lock that emulates the row lock.
    ///
    /// The guard must be held across the whole reconciliation, read
    /// through write.
    async fn lock_project(&self, project_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.project_locks.lock().await;
            locks
                .entry(project_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[async_trait]
impl InvestmentStore for MemoryStore {
    async fn create(&self, investment: &Investment) -> Result<Investment, StoreError> {
        let _project_guard = self.lock_project(investment.project_id).await;

        // Read the project state under the lock, as FOR UPDATE would.
        let raised = {
            let tables = self.tables.lock().await;
            let project = tables
                .projects
                .get(&investment.project_id)
                .ok_or(StoreError::ProjectNotFound(investment.project_id))?;
            project.amount_raised
        };

        let new_raised = raised
            .credit(&investment.amount)
            .map_err(|e| StoreError::Constraint(e.to_string()))?;

        let mut tables = self.tables.lock().await;
        tables.next_investment_id += 1;
        let row = Investment {
            id: tables.next_investment_id,
            user_id: investment.user_id,
            project_id: investment.project_id,
            amount: investment.amount,
            invested_at: Some(investment.invested_at.unwrap_or_else(Utc::now)),
        };
        tables.investments.insert(row.id, row.clone());
        tables
            .projects
            .get_mut(&investment.project_id)
            .expect("project row vanished while its lock was held")
            .amount_raised = new_raised;

        Ok(row)
    }

    async fn update(
        &self,
        investment: &Investment,
        delta: Decimal,
    ) -> Result<Investment, StoreError> {
        let existing = {
            let tables = self.tables.lock().await;
            tables
                .investments
                .get(&investment.id)
                .cloned()
                .ok_or(StoreError::InvestmentNotFound(investment.id))?
        };

        let _project_guard = if delta != Decimal::ZERO {
            Some(self.lock_project(existing.project_id).await)
        } else {
            None
        };

        let new_raised = if delta != Decimal::ZERO {
            let tables = self.tables.lock().await;
            let project = tables
                .projects
                .get(&existing.project_id)
                .ok_or(StoreError::ProjectNotFound(existing.project_id))?;
            Some(
                project
                    .amount_raised
                    .apply(delta)
                    .map_err(|e| StoreError::Constraint(e.to_string()))?,
            )
        } else {
            None
        };

        let mut tables = self.tables.lock().await;
        let row = Investment {
            id: existing.id,
            user_id: existing.user_id,
            project_id: existing.project_id,
            amount: investment.amount,
            invested_at: investment.invested_at.or(existing.invested_at),
        };
        tables.investments.insert(row.id, row.clone());
        if let Some(new_raised) = new_raised {
            tables
                .projects
                .get_mut(&existing.project_id)
                .expect("project row vanished while its lock was held")
                .amount_raised = new_raised;
        }

        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let existing = {
            let tables = self.tables.lock().await;
            tables
                .investments
                .get(&id)
                .cloned()
                .ok_or(StoreError::InvestmentNotFound(id))?
        };

        let _project_guard = self.lock_project(existing.project_id).await;

        let new_raised = {
            let tables = self.tables.lock().await;
            let project = tables
                .projects
                .get(&existing.project_id)
                .ok_or(StoreError::ProjectNotFound(existing.project_id))?;
            project
                .amount_raised
                .debit(&existing.amount)
                .map_err(|e| StoreError::Constraint(e.to_string()))?
        };

        let mut tables = self.tables.lock().await;
        tables.investments.remove(&id);
        tables
            .projects
            .get_mut(&existing.project_id)
            .expect("project row vanished while its lock was held")
            .amount_raised = new_raised;

        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Investment, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .investments
            .get(&id)
            .cloned()
            .ok_or(StoreError::InvestmentNotFound(id))
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Investment>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Investment> = tables
            .investments
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.invested_at.cmp(&a.invested_at));
        Ok(rows)
    }

    async fn get_by_project_id(&self, project_id: i64) -> Result<Vec<Investment>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Investment> = tables
            .investments
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.invested_at.cmp(&a.invested_at));
        Ok(rows)
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create(&self, project: &Project) -> Result<Project, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.next_project_id += 1;
        let row = Project {
            id: tables.next_project_id,
            owner_id: project.owner_id,
            status: project.status.clone(),
            name: project.name.clone(),
            description: project.description.clone(),
            amount_requested: project.amount_requested,
            amount_raised: crate::domain::Raised::zero(),
            deadline_at: project.deadline_at,
            created_at: Some(Utc::now()),
        };
        tables.projects.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, project: &Project) -> Result<Project, StoreError> {
        // Project-field edits share the reconciliation lock.
        let _project_guard = self.lock_project(project.id).await;

        let mut tables = self.tables.lock().await;
        let existing = tables
            .projects
            .get_mut(&project.id)
            .ok_or(StoreError::ProjectNotFound(project.id))?;

        existing.status = project.status.clone();
        existing.name = project.name.clone();
        existing.description = project.description.clone();
        existing.amount_requested = project.amount_requested;
        existing.deadline_at = project.deadline_at;
        // amount_raised deliberately untouched: the stored total wins.

        Ok(existing.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let _project_guard = self.lock_project(id).await;

        let mut tables = self.tables.lock().await;
        if tables.projects.remove(&id).is_none() {
            return Err(StoreError::ProjectNotFound(id));
        }
        // Cascade, as the schema does.
        tables.investments.retain(|_, i| i.project_id != id);
        tables.photos.retain(|_, p| p.project_id != id);
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Project, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .projects
            .get(&id)
            .cloned()
            .ok_or(StoreError::ProjectNotFound(id))
    }

    async fn list(&self, search_term: &str) -> Result<Vec<Project>, StoreError> {
        let tables = self.tables.lock().await;
        let needle = search_term.to_lowercase();
        let mut rows: Vec<Project> = tables
            .projects
            .values()
            .filter(|p| {
                needle.is_empty()
                    || p.name.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        search_term: &str,
    ) -> Result<Vec<Project>, StoreError> {
        let rows = ProjectStore::list(self, search_term).await?;
        Ok(rows.into_iter().filter(|p| p.owner_id == owner_id).collect())
    }

    async fn photos_by_project(&self, project_id: i64) -> Result<Vec<ProjectPhoto>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<ProjectPhoto> = tables
            .photos
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn add_photo(&self, photo: &ProjectPhoto) -> Result<ProjectPhoto, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.projects.contains_key(&photo.project_id) {
            return Err(StoreError::ProjectNotFound(photo.project_id));
        }
        tables.next_photo_id += 1;
        let row = ProjectPhoto {
            id: tables.next_photo_id,
            project_id: photo.project_id,
            url: photo.url.clone(),
            created_at: Some(Utc::now()),
        };
        tables.photos.insert(row.id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create(&self, account: &Account, plain_password: &str) -> Result<Account, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::AccountAlreadyExists(account.email.clone()));
        }
        tables.next_account_id += 1;
        let now = Utc::now();
        let row = Account {
            id: tables.next_account_id,
            username: account.username.clone(),
            email: account.email.clone(),
            password_hash: hash_password(plain_password),
            role: account.role.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.accounts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, account: &Account) -> Result<Account, StoreError> {
        let mut tables = self.tables.lock().await;
        let existing = tables
            .accounts
            .values_mut()
            .find(|a| a.email == account.email)
            .ok_or_else(|| StoreError::AccountNotFound(account.email.clone()))?;
        existing.username = account.username.clone();
        existing.role = account.role.clone();
        existing.updated_at = Some(Utc::now());
        Ok(existing.clone())
    }

    async fn update_password(&self, email: &str, new_password: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let existing = tables
            .accounts
            .values_mut()
            .find(|a| a.email == email)
            .ok_or_else(|| StoreError::AccountNotFound(email.to_string()))?;
        existing.password_hash = hash_password(new_password);
        existing.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let id = tables
            .accounts
            .values()
            .find(|a| a.email == email)
            .map(|a| a.id)
            .ok_or_else(|| StoreError::AccountNotFound(email.to_string()))?;
        tables.accounts.remove(&id);
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned()
            .ok_or_else(|| StoreError::AccountNotFound(email.to_string()))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.accounts.values().any(|a| a.email == email))
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
        let tables = self.tables.lock().await;
        let needle = search_term.to_lowercase();
        let mut rows: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| {
                needle.is_empty()
                    || a.username.to_lowercase().contains(&needle)
                    || a.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
