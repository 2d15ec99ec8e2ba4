//! Controller module for observability addon reconciliation
//!
//! Contains the reconciliation engine, the desired-state builder for the
//! metrics collector, and the managers for finalizers, supporting
//! resources and status reporting.

pub mod allowlist;
pub mod collector;
#[cfg(test)]
mod collector_test;
pub mod finalizers;
pub mod hub;
pub mod reconciler;
#[cfg(test)]
mod reconciler_test;
pub mod status;
pub mod supporting;
pub mod sync;

pub use finalizers::ADDON_FINALIZER;
pub use reconciler::{decide, Action, ObservedState, Reconciler, Trigger};
pub use status::AddonState;

/// Field manager and event source identity for API writes
pub const FIELD_MANAGER: &str = "observability-addon-operator";

/// Annotation marking objects managed by this operator. Informational
/// only: ownership semantics are carried by the finalizer, not by this
/// annotation.
pub const OWNER_ANNOTATION_KEY: &str = "owner";
pub const OWNER_ANNOTATION_VALUE: &str = "multicluster-operator";
