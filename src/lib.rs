//! crowdledger Library
//!
//! Crowdfunding ledger backend: accounts, projects, and investments with
//! transactional reconciliation of each project's raised total.
//! Re-exports modules for the binary, integration tests and external use.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod service;
pub mod store;

mod error;

pub use config::Config;
pub use domain::{Account, Amount, AmountError, Investment, Project, ProjectPhoto, Raised};
pub use domain::{DomainError, RequestContext};
pub use error::{AppError, AppResult};
