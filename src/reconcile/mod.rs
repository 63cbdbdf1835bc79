//! Reconciliation Engine
//!
//! Per managed object: fetch, create when absent, correct replica drift with
//! a targeted update, then normalize-and-diff and patch only on difference.
//! Status conditions of the owning entities are tracked here as well.

pub mod apply;
pub mod diff;
pub mod status;

pub use apply::{ManagedObject, ObjectReconciler, ReconcileOutcome};
pub use diff::{covers, is_up_to_date, normalize, CHURN_METADATA};
pub use status::{apply_condition, set_condition, upsert, ConditionedResource};
