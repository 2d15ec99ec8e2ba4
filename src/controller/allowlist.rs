//! Metrics allowlist accessor
//!
//! The allowlist ConfigMap is produced by another component. Absence or
//! malformed content degrades to the empty allowlist: an addon with no
//! allowlist is a valid configuration and must not block reconciliation.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use kube::Client;
use serde::Deserialize;
use tracing::warn;

/// Fixed name of the allowlist ConfigMap
pub const ALLOWLIST_CONFIG_MAP_NAME: &str = "observability-metrics-allowlist";
const ALLOWLIST_KEY: &str = "metrics_list.yaml";

/// Metric names and raw match expressions the collector may forward.
///
/// Order is preserved end to end; it determines the rendered command line
/// and therefore the outcome of the workload diff.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct MetricsAllowlist {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub matches: Vec<String>,
}

/// Load the allowlist from its ConfigMap. Soft-fail: every failure path
/// logs and yields the empty allowlist.
pub async fn load(client: &Client, namespace: &str) -> MetricsAllowlist {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    match api.get(ALLOWLIST_CONFIG_MAP_NAME).await {
        Ok(cm) => parse(cm
            .data
            .as_ref()
            .and_then(|d| d.get(ALLOWLIST_KEY))
            .map(String::as_str)),
        Err(e) => {
            warn!("Failed to get metrics allowlist configmap: {:?}", e);
            MetricsAllowlist::default()
        }
    }
}

fn parse(raw: Option<&str>) -> MetricsAllowlist {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return MetricsAllowlist::default(),
    };
    match serde_yaml::from_str(raw) {
        Ok(list) => list,
        Err(e) => {
            warn!("Failed to decode metrics allowlist: {}", e);
            MetricsAllowlist::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_order() {
        let list = parse(Some(
            "names:\n  - node_cpu_seconds_total\n  - up\nmatches:\n  - '__name__=\"etcd_debugging\",job=\"etcd\"'\n",
        ));
        assert_eq!(list.names, vec!["node_cpu_seconds_total", "up"]);
        assert_eq!(list.matches, vec![r#"__name__="etcd_debugging",job="etcd""#]);
    }

    #[test]
    fn test_parse_missing_sections_default_empty() {
        let list = parse(Some("names:\n  - up\n"));
        assert_eq!(list.names, vec!["up"]);
        assert!(list.matches.is_empty());
    }

    #[test]
    fn test_parse_absent_payload_is_empty() {
        assert_eq!(parse(None), MetricsAllowlist::default());
        assert_eq!(parse(Some("")), MetricsAllowlist::default());
    }

    #[test]
    fn test_parse_malformed_payload_is_empty() {
        assert_eq!(parse(Some("{not yaml")), MetricsAllowlist::default());
        assert_eq!(parse(Some("names: 42")), MetricsAllowlist::default());
    }
}
