//! API Routes
//!
//! HTTP endpoint definitions.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::domain::{Account, Amount, Investment, Project, ProjectPhoto, Raised};
use crate::error::AppError;
use crate::service::{
    invalid_amount, invalid_project_amount, AccountService, FundingService, ProjectService,
};
use crate::store::{PgAccountStore, PgInvestmentStore, PgProjectStore};

use super::middleware::RequestUser;

/// Shared application state.
///
/// Services are built once so each holds its compiled validation state
/// for the process lifetime.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService<PgAccountStore>>,
    pub projects: Arc<ProjectService<PgProjectStore>>,
    pub funding: Arc<FundingService<PgInvestmentStore>>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(PgAccountStore::new(pool.clone()))),
            projects: Arc::new(ProjectService::new(PgProjectStore::new(pool.clone()))),
            funding: Arc::new(FundingService::new(PgInvestmentStore::new(pool))),
        }
    }
}

// =========================================================================
// Request types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub role: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub status: String,
    pub name: String,
    pub description: String,
    /// Amount as string for precise decimal
    pub amount_requested: String,
    #[serde(default)]
    pub deadline_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvestmentRequest {
    pub project_id: i64,
    /// Amount as string for precise decimal
    pub amount: String,
    #[serde(default)]
    pub invested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvestmentRequest {
    pub amount: String,
    #[serde(default)]
    pub invested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: Option<String>,
}

impl SearchQuery {
    fn term(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Account endpoints
        .route("/accounts", post(create_account))
        .route("/accounts", put(update_account))
        .route("/accounts/password", put(update_password))
        .route("/accounts/:email", delete(delete_account))
        .route("/accounts/:email", get(get_account))
        .route("/accounts", get(list_accounts))
        // Project endpoints
        .route("/projects", post(create_project))
        .route("/projects/:id", put(update_project))
        .route("/projects/:id", delete(delete_project))
        .route("/projects/:id", get(get_project))
        .route("/projects", get(list_projects))
        .route("/projects/owner/:owner_id", get(list_projects_by_owner))
        .route("/projects/:id/photos", get(get_project_photos))
        .route("/projects/:id/photos", post(add_project_photo))
        // Investment endpoints
        .route("/investments", post(create_investment))
        .route("/investments/:id", put(update_investment))
        .route("/investments/:id", delete(delete_investment))
        .route("/investments/:id", get(get_investment))
        .route("/investments/user/:user_id", get(list_investments_by_user))
        .route(
            "/investments/project/:project_id",
            get(list_investments_by_project),
        )
}

/// Resolve the acting user or fail with a missing-header error.
fn require_user(request_user: Option<Extension<RequestUser>>) -> Result<i64, AppError> {
    request_user
        .map(|Extension(user)| user.user_id)
        .ok_or_else(|| AppError::MissingHeader("X-User-ID".to_string()))
}

// =========================================================================
// Account handlers
// =========================================================================

async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = Account {
        id: 0,
        username: request.username,
        email: request.email,
        password_hash: String::new(),
        role: request.role,
        created_at: None,
        updated_at: None,
    };

    let created = state.accounts.create(account, &request.password).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_account(
    State(state): State<AppState>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<Account>, AppError> {
    let account = Account {
        id: 0,
        username: request.username,
        email: request.email,
        password_hash: String::new(),
        role: request.role,
        created_at: None,
        updated_at: None,
    };

    let updated = state.accounts.update(account).await?;

    Ok(Json(updated))
}

async fn update_password(
    State(state): State<AppState>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .accounts
        .update_password(&request.email, &request.password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_account(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<StatusCode, AppError> {
    state.accounts.delete(&email).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_account(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Account>, AppError> {
    let account = state.accounts.get_by_email(&email).await?;

    Ok(Json(account))
}

async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = state.accounts.list(query.term()).await?;

    Ok(Json(accounts))
}

// =========================================================================
// Project handlers
// =========================================================================

fn project_from_request(id: i64, owner_id: i64, request: ProjectRequest) -> Result<Project, AppError> {
    let amount_requested: Amount = request
        .amount_requested
        .parse()
        .map_err(invalid_project_amount)?;

    Ok(Project {
        id,
        owner_id,
        status: request.status,
        name: request.name,
        description: request.description,
        amount_requested,
        amount_raised: Raised::zero(),
        deadline_at: request.deadline_at,
        created_at: None,
    })
}

async fn create_project(
    State(state): State<AppState>,
    request_user: Option<Extension<RequestUser>>,
    Json(request): Json<ProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let acting_user_id = require_user(request_user)?;
    let project = project_from_request(0, acting_user_id, request)?;

    let created = state.projects.create(project).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request_user: Option<Extension<RequestUser>>,
    Json(request): Json<ProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let acting_user_id = require_user(request_user)?;
    let project = project_from_request(id, acting_user_id, request)?;

    let updated = state.projects.update(project, acting_user_id).await?;

    Ok(Json(updated))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request_user: Option<Extension<RequestUser>>,
) -> Result<StatusCode, AppError> {
    let acting_user_id = require_user(request_user)?;

    state.projects.delete(id, acting_user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, AppError> {
    let project = state.projects.get_by_id(id).await?;

    Ok(Json(project))
}

async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = state.projects.list(query.term()).await?;

    Ok(Json(projects))
}

async fn list_projects_by_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = state.projects.list_by_owner(owner_id, query.term()).await?;

    Ok(Json(projects))
}

async fn get_project_photos(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ProjectPhoto>>, AppError> {
    let photos = state.projects.photos_by_project(id).await?;

    Ok(Json(photos))
}

async fn add_project_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request_user: Option<Extension<RequestUser>>,
    Json(request): Json<PhotoRequest>,
) -> Result<(StatusCode, Json<ProjectPhoto>), AppError> {
    let acting_user_id = require_user(request_user)?;

    let photo = ProjectPhoto {
        id: 0,
        project_id: id,
        url: request.url,
        created_at: None,
    };

    let added = state.projects.add_photo(photo, acting_user_id).await?;

    Ok((StatusCode::CREATED, Json(added)))
}

// =========================================================================
// Investment handlers
// =========================================================================

async fn create_investment(
    State(state): State<AppState>,
    request_user: Option<Extension<RequestUser>>,
    Json(request): Json<CreateInvestmentRequest>,
) -> Result<(StatusCode, Json<Investment>), AppError> {
    let acting_user_id = require_user(request_user)?;
    let amount: Amount = request.amount.parse().map_err(invalid_amount)?;

    let investment = Investment {
        id: 0,
        user_id: acting_user_id,
        project_id: request.project_id,
        amount,
        invested_at: request.invested_at,
    };

    let created = state.funding.create(investment, acting_user_id).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_investment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request_user: Option<Extension<RequestUser>>,
    Json(request): Json<UpdateInvestmentRequest>,
) -> Result<Json<Investment>, AppError> {
    let acting_user_id = require_user(request_user)?;
    let amount: Amount = request.amount.parse().map_err(invalid_amount)?;

    // The stored investor and project win over anything in the payload.
    let investment = Investment {
        id,
        user_id: acting_user_id,
        project_id: 0,
        amount,
        invested_at: request.invested_at,
    };

    let updated = state.funding.update(investment, acting_user_id).await?;

    Ok(Json(updated))
}

async fn delete_investment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request_user: Option<Extension<RequestUser>>,
) -> Result<StatusCode, AppError> {
    let acting_user_id = require_user(request_user)?;

    state.funding.delete(id, acting_user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_investment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request_user: Option<Extension<RequestUser>>,
) -> Result<Json<Investment>, AppError> {
    let acting_user_id = require_user(request_user)?;

    let investment = state.funding.get_by_id(id, acting_user_id).await?;

    Ok(Json(investment))
}

async fn list_investments_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    request_user: Option<Extension<RequestUser>>,
) -> Result<Json<Vec<Investment>>, AppError> {
    let requesting_user_id = require_user(request_user)?;

    let investments = state
        .funding
        .get_by_user_id(user_id, requesting_user_id)
        .await?;

    Ok(Json(investments))
}

async fn list_investments_by_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<Investment>>, AppError> {
    let investments = state.funding.get_by_project_id(project_id).await?;

    Ok(Json(investments))
}
