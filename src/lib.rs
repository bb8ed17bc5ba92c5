//! Lab Supplies - inventory client core
//!
//! In-memory state and backend calls behind the lab operator app: inventory
//! movement lists, return reconciliation for completed loans, usage request
//! review, stock alerts and shelf lookups. The inventory backend is the
//! system of record; nothing here persists business data locally.

pub mod alerts;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod diagnostics;
pub mod error;
pub mod location;
pub mod models;
pub mod movements;
pub mod reconciliation;
pub mod requests;
pub mod storage;
pub mod submission;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, InventoryApi};
pub use config::AppConfig;
pub use error::{ApiError, ConfigError, StorageError, WorkflowError};
pub use models::OperatorContext;
pub use movements::{MovementListStore, TypeFilter};
pub use reconciliation::ReturnCalculator;
pub use submission::{ReconciliationSession, SessionState, SubmitOutcome};
