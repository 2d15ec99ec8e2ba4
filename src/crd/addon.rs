//! ObservabilityAddon Custom Resource Definition
//!
//! The addon resource is the declarative request to run the metrics
//! collector on this cluster. Its spec shape is shared with the global
//! configuration object, which pushes the same settings down from the hub.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fixed name of the addon resource; every trigger resolves to it.
pub const ADDON_NAME: &str = "observability-addon";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "observability.open-cluster-management.io",
    version = "v1beta1",
    kind = "ObservabilityAddon",
    namespaced,
    status = "ObservabilityAddonStatus",
    shortname = "oba",
    printcolumn = r#"{"name":"Metrics","type":"boolean","jsonPath":".spec.enableMetrics"}"#,
    printcolumn = r#"{"name":"Interval","type":"integer","jsonPath":".spec.interval"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityAddonSpec {
    /// Whether metrics collection is enabled for this cluster
    #[serde(default)]
    pub enable_metrics: bool,

    /// Scrape interval in seconds; non-positive values fall back to the
    /// built-in default
    #[serde(default)]
    pub interval: i32,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityAddonStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StatusCondition>,
}

/// A single reported condition, shared by both status sinks
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub last_transition_time: String,
    pub reason: String,
    pub message: String,
}
