//! Service module
//!
//! Business logic over the store traits: validation, authorization, and
//! the funding reconciliation orchestration.

mod account;
mod funding;
mod project;

pub use account::AccountService;
pub use funding::{invalid_amount, FundingService};
pub use project::{invalid_project_amount, ProjectService};
