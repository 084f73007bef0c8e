//! Project service
//!
//! Validation and ownership rules for project mutation. The raised total
//! is out of bounds here: the store preserves the persisted value on
//! every update, so a project edit can never overwrite reconciliation.

use chrono::Utc;

use crate::domain::{DomainError, Project, ProjectPhoto};
use crate::error::{AppError, AppResult};
use crate::store::ProjectStore;

pub struct ProjectService<S> {
    store: S,
}

impl<S: ProjectStore> ProjectService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate project data.
    ///
    /// The requested amount needs no check: `Amount` cannot hold a
    /// non-positive value.
    fn validate(&self, project: &Project) -> Result<(), DomainError> {
        if project.name.is_empty() {
            tracing::error!("Invalid project name");
            return Err(DomainError::InvalidProjectName);
        }

        if project.description.is_empty() {
            tracing::error!("Invalid project description");
            return Err(DomainError::InvalidProjectDescription);
        }

        if project.owner_id <= 0 {
            tracing::error!("Invalid project owner");
            return Err(DomainError::InvalidProjectOwner);
        }

        if project.status.is_empty() {
            tracing::error!("Invalid project status");
            return Err(DomainError::InvalidProjectStatus);
        }

        if let Some(deadline) = project.deadline_at {
            if deadline <= Utc::now() {
                tracing::error!("Invalid project deadline: deadline is in the past");
                return Err(DomainError::InvalidProjectDeadline);
            }
        }

        Ok(())
    }

    /// Load a project and check the acting user owns it.
    async fn load_owned(&self, id: i64, acting_user_id: i64) -> AppResult<Project> {
        let existing = self.store.get_by_id(id).await?;

        if existing.owner_id != acting_user_id {
            return Err(DomainError::Unauthorized(format!("project {id}")).into());
        }

        Ok(existing)
    }

    pub async fn create(&self, project: Project) -> AppResult<Project> {
        self.validate(&project)?;
        Ok(self.store.create(&project).await?)
    }

    /// Update an owned project. The stored `amount_raised` always wins
    /// over whatever the caller supplied.
    pub async fn update(&self, project: Project, acting_user_id: i64) -> AppResult<Project> {
        self.validate(&project)?;
        self.load_owned(project.id, acting_user_id).await?;

        Ok(self.store.update(&project).await?)
    }

    pub async fn delete(&self, id: i64, acting_user_id: i64) -> AppResult<()> {
        self.load_owned(id, acting_user_id).await?;
        Ok(self.store.delete(id).await?)
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<Project> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn list(&self, search_term: &str) -> AppResult<Vec<Project>> {
        Ok(self.store.list(search_term).await?)
    }

    pub async fn list_by_owner(
        &self,
        owner_id: i64,
        search_term: &str,
    ) -> AppResult<Vec<Project>> {
        Ok(self.store.list_by_owner(owner_id, search_term).await?)
    }

    pub async fn photos_by_project(&self, project_id: i64) -> AppResult<Vec<ProjectPhoto>> {
        Ok(self.store.photos_by_project(project_id).await?)
    }

    /// Attach a photo; only the project owner may.
    pub async fn add_photo(
        &self,
        photo: ProjectPhoto,
        acting_user_id: i64,
    ) -> AppResult<ProjectPhoto> {
        self.load_owned(photo.project_id, acting_user_id).await?;
        Ok(self.store.add_photo(&photo).await?)
    }
}

/// Map a failed amount parse to the project validation error.
pub fn invalid_project_amount(err: crate::domain::AmountError) -> AppError {
    DomainError::InvalidProjectAmount(err.to_string()).into()
}
