//! Ledger entities
//!
//! Row types for accounts, projects, investments and project photos.
//! Monetary fields use the validated [`Amount`]/[`Raised`] types so raw
//! floating point can never reach persistence or arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::{Amount, Raised};

/// A registered user account.
///
/// Owned by the account store; the funding core only consults it for
/// existence and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Opaque salted hash, never the plaintext and never serialized out.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A funding project.
///
/// `amount_raised` starts at zero and is mutated only through the
/// investment reconciliation protocol; every other field belongs to the
/// owner.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    #[serde(default)]
    pub id: i64,
    pub owner_id: i64,
    pub status: String,
    pub name: String,
    pub description: String,
    pub amount_requested: Amount,
    #[serde(default)]
    pub amount_raised: Raised,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deadline_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A monetary pledge against a project.
///
/// Owned exclusively by the investor who created it; ownership is checked
/// by the funding service, not structurally enforced.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Investment {
    #[serde(default)]
    pub id: i64,
    pub user_id: i64,
    pub project_id: i64,
    pub amount: Amount,
    /// Stamped with the current time at creation when unset.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub invested_at: Option<DateTime<Utc>>,
}

/// Read-only photo attachment on a project.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectPhoto {
    #[serde(default)]
    pub id: i64,
    pub project_id: i64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<DateTime<Utc>>,
}
