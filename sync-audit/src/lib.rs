//! Reconciliation session and audit log persistence.
//!
//! A sync session records one reconciliation run (its dry-run flag, the
//! resulting diff, and operator-defined custom fields). Each session owns an
//! ordered list of log entries, one per object touched, classified by action
//! and outcome. Deleting a session removes its entries; references out to
//! other systems (object types, change records) are nullable and can be
//! cleared when their targets disappear.

pub mod error;
pub mod model;
pub mod store;

pub use error::{AuditError, AuditResult};
pub use model::{SyncLogAction, SyncLogEntry, SyncLogStatus, SyncSession};
pub use store::AuditStore;
