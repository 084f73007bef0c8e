//! Postgres project store
//!
//! Project-field updates take the same row lock as the investment
//! reconciliation path, so a concurrent edit can never overwrite a raised
//! total committed between its read and its write.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{Project, ProjectPhoto};

use super::{map_db_error, ProjectStore, StoreError};

#[derive(Debug, Clone)]
pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(StoreError::TransactionStart)
    }
}

const PROJECT_COLUMNS: &str = "id, owner_id, status, name, description, \
     amount_requested, amount_raised, deadline_at, created_at";

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn create(&self, project: &Project) -> Result<Project, StoreError> {
        sqlx::query_as(
            r#"
            INSERT INTO projects
                (owner_id, status, name, description, amount_requested,
                 amount_raised, deadline_at, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7)
            RETURNING id, owner_id, status, name, description,
                      amount_requested, amount_raised, deadline_at, created_at
            "#,
        )
        .bind(project.owner_id)
        .bind(&project.status)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.amount_requested)
        .bind(project.deadline_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update(&self, project: &Project) -> Result<Project, StoreError> {
        let mut tx = self.begin().await?;

        // Same lock as the reconciliation path. The stored row's raised
        // total is authoritative; the caller's copy is discarded.
        let existing: Option<Project> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 FOR UPDATE"
        ))
        .bind(project.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let existing = existing.ok_or(StoreError::ProjectNotFound(project.id))?;

        let row: Project = sqlx::query_as(
            r#"
            UPDATE projects
            SET status = $2, name = $3, description = $4,
                amount_requested = $5, amount_raised = $6, deadline_at = $7
            WHERE id = $1
            RETURNING id, owner_id, status, name, description,
                      amount_requested, amount_raised, deadline_at, created_at
            "#,
        )
        .bind(existing.id)
        .bind(&project.status)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.amount_requested)
        .bind(existing.amount_raised)
        .bind(project.deadline_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?;

        if existing.is_none() {
            return Err(StoreError::ProjectNotFound(id));
        }

        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Project, StoreError> {
        let project: Option<Project> =
            sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_error)?;

        project.ok_or(StoreError::ProjectNotFound(id))
    }

    async fn list(&self, search_term: &str) -> Result<Vec<Project>, StoreError> {
        if search_term.is_empty() {
            sqlx::query_as(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
        } else {
            sqlx::query_as(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects \
                 WHERE name ILIKE $1 OR description ILIKE $1 \
                 ORDER BY created_at DESC"
            ))
            .bind(format!("%{search_term}%"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
        }
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        search_term: &str,
    ) -> Result<Vec<Project>, StoreError> {
        if search_term.is_empty() {
            sqlx::query_as(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects WHERE owner_id = $1 \
                 ORDER BY created_at DESC"
            ))
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
        } else {
            sqlx::query_as(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects \
                 WHERE owner_id = $1 AND (name ILIKE $2 OR description ILIKE $2) \
                 ORDER BY created_at DESC"
            ))
            .bind(owner_id)
            .bind(format!("%{search_term}%"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
        }
    }

    async fn photos_by_project(&self, project_id: i64) -> Result<Vec<ProjectPhoto>, StoreError> {
        sqlx::query_as(
            r#"
            SELECT id, project_id, url, created_at
            FROM project_photos
            WHERE project_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn add_photo(&self, photo: &ProjectPhoto) -> Result<ProjectPhoto, StoreError> {
        sqlx::query_as(
            r#"
            INSERT INTO project_photos (project_id, url, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, project_id, url, created_at
            "#,
        )
        .bind(photo.project_id)
        .bind(&photo.url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
