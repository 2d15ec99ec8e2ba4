//! Operator configuration resolved at process start
//!
//! All environment-provided values are read once during bootstrap and
//! threaded explicitly into the components that need them; reconciliation
//! logic performs no ambient environment lookups.

/// Process-level configuration for the operator.
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace the collector workload and its local inputs live in
    pub namespace: String,
    /// Hub-side namespace holding the addon resource and its binding object
    pub hub_namespace: String,
    /// Container image reference for the metrics collector
    pub collector_image: String,
}
