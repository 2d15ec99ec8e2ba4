//! Unit tests for the collector desired-state builder
//!
//! The builder is a pure function, so these tests pin the full rendered
//! command line, the trust-bundle selection logic and the projection used
//! for change detection.

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentStrategy};

    use crate::config::OperatorConfig;
    use crate::controller::allowlist::MetricsAllowlist;
    use crate::controller::collector::*;
    use crate::controller::hub::HubInfo;
    use crate::crd::ObservabilityAddonSpec;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn test_config() -> OperatorConfig {
        OperatorConfig {
            namespace: "test-ns".to_string(),
            hub_namespace: "test-hub-ns".to_string(),
            collector_image: "quay.io/test/metrics-collector:latest".to_string(),
        }
    }

    fn test_hub() -> HubInfo {
        HubInfo {
            cluster_name: "test-cluster".to_string(),
            endpoint: "http://test-endpoint".to_string(),
        }
    }

    fn settings(interval: i32) -> ObservabilityAddonSpec {
        ObservabilityAddonSpec {
            enable_metrics: true,
            interval,
        }
    }

    fn build(
        settings_in: &ObservabilityAddonSpec,
        hub: &HubInfo,
        allowlist: &MetricsAllowlist,
        cluster_id: &str,
        replicas: i32,
    ) -> Deployment {
        build_deployment(
            &test_config(),
            &CollectorParams {
                settings: settings_in,
                hub,
                allowlist,
                cluster_id,
                replicas,
            },
        )
    }

    fn command_of(deployment: &Deployment) -> Vec<String> {
        deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers[0]
            .command
            .clone()
            .unwrap()
    }

    fn volume_names(deployment: &Deployment) -> Vec<String> {
        deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .map(|v| v.name.clone())
            .collect()
    }

    fn env_value(deployment: &Deployment, key: &str) -> Option<String> {
        deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers[0]
            .env
            .as_ref()
            .unwrap()
            .iter()
            .find(|e| e.name == key)
            .and_then(|e| e.value.clone())
    }

    // -----------------------------------------------------------------------
    // Command line rendering
    // -----------------------------------------------------------------------

    #[test]
    fn test_full_command_line_is_byte_stable() {
        let allowlist = MetricsAllowlist {
            names: vec!["node_cpu_seconds_total".to_string(), "up".to_string()],
            matches: vec![r#"job="etcd""#.to_string()],
        };
        let deployment = build(&settings(60), &test_hub(), &allowlist, "abc-123", 1);

        let expected: Vec<String> = [
            "/usr/bin/metrics-collector",
            "--from=$(FROM)",
            "--to-upload=$(TO)",
            "--from-ca-file=/etc/serving-certs-ca-bundle/service-ca.crt",
            "--from-token-file=/var/run/secrets/kubernetes.io/serviceaccount/token",
            "--interval=60s",
            "--label=\"cluster=test-cluster\"",
            "--label=\"clusterID=abc-123\"",
            "--limit-bytes=1073741824",
            "--match={__name__=\"node_cpu_seconds_total\"}",
            "--match={__name__=\"up\"}",
            "--match={job=\"etcd\"}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(command_of(&deployment), expected);
    }

    #[test]
    fn test_identical_inputs_render_identical_deployments() {
        let allowlist = MetricsAllowlist {
            names: vec!["up".to_string()],
            matches: vec![],
        };
        let a = build(&settings(30), &test_hub(), &allowlist, "abc-123", 1);
        let b = build(&settings(30), &test_hub(), &allowlist, "abc-123", 1);
        assert_eq!(command_of(&a), command_of(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_allowlist_order_is_preserved() {
        let allowlist = MetricsAllowlist {
            names: vec!["z_metric".to_string(), "a_metric".to_string()],
            matches: vec![],
        };
        let command = command_of(&build(&settings(30), &test_hub(), &allowlist, "id", 1));
        let matches: Vec<&String> = command
            .iter()
            .filter(|arg| arg.starts_with("--match="))
            .collect();
        assert_eq!(matches[0], "--match={__name__=\"z_metric\"}");
        assert_eq!(matches[1], "--match={__name__=\"a_metric\"}");
    }

    #[test]
    fn test_unset_interval_falls_back_to_default() {
        let allowlist = MetricsAllowlist::default();
        let command = command_of(&build(&settings(0), &test_hub(), &allowlist, "id", 1));
        assert!(command.contains(&"--interval=30s".to_string()));
    }

    // -----------------------------------------------------------------------
    // Trust bundle selection
    // -----------------------------------------------------------------------

    #[test]
    fn test_empty_identifier_substitutes_display_name() {
        let allowlist = MetricsAllowlist::default();
        let command = command_of(&build(&settings(30), &test_hub(), &allowlist, "", 1));
        assert!(command.contains(&"--label=\"clusterID=test-cluster\"".to_string()));
        assert!(command.contains(
            &"--from-ca-file=//run/secrets/kubernetes.io/serviceaccount/service-ca.crt"
                .to_string()
        ));
    }

    #[test]
    fn test_empty_identifier_skips_managed_trust_bundle_volume() {
        let allowlist = MetricsAllowlist::default();
        let deployment = build(&settings(30), &test_hub(), &allowlist, "", 1);
        assert_eq!(
            volume_names(&deployment),
            vec!["observability-managed-cluster-certs".to_string()]
        );
    }

    #[test]
    fn test_managed_trust_bundle_mounted_with_identifier() {
        let allowlist = MetricsAllowlist::default();
        let deployment = build(&settings(30), &test_hub(), &allowlist, "abc-123", 1);
        assert_eq!(
            volume_names(&deployment),
            vec![
                "observability-managed-cluster-certs".to_string(),
                "serving-certs-ca-bundle".to_string(),
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Development cluster branch
    // -----------------------------------------------------------------------

    #[test]
    fn test_kind_cluster_switches_upstream_and_adds_host_alias() {
        let allowlist = MetricsAllowlist::default();
        let deployment = build(&settings(30), &test_hub(), &allowlist, "kind-cluster-id", 1);

        assert_eq!(
            env_value(&deployment, "FROM").as_deref(),
            Some("http://prometheus-k8s.openshift-monitoring.svc:9090")
        );
        let aliases = deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .host_aliases
            .clone()
            .unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].ip.as_deref(), Some("172.17.0.2"));
        assert_eq!(
            aliases[0].hostnames.clone().unwrap(),
            vec!["observatorium.hub".to_string()]
        );
    }

    #[test]
    fn test_regular_cluster_uses_tls_upstream_without_alias() {
        let allowlist = MetricsAllowlist::default();
        let deployment = build(&settings(30), &test_hub(), &allowlist, "abc-123", 1);
        assert_eq!(
            env_value(&deployment, "FROM").as_deref(),
            Some("https://prometheus-k8s.openshift-monitoring.svc:9091")
        );
        assert!(deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .host_aliases
            .is_none());
    }

    // -----------------------------------------------------------------------
    // Metadata and endpoints
    // -----------------------------------------------------------------------

    #[test]
    fn test_fixed_name_selector_and_owner_annotation() {
        let allowlist = MetricsAllowlist::default();
        let deployment = build(&settings(30), &test_hub(), &allowlist, "id", 1);

        assert_eq!(
            deployment.metadata.name.as_deref(),
            Some("metrics-collector-deployment")
        );
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("test-ns"));
        assert_eq!(
            deployment
                .metadata
                .annotations
                .as_ref()
                .unwrap()
                .get("owner")
                .map(String::as_str),
            Some("multicluster-operator")
        );
        let selector = deployment
            .spec
            .as_ref()
            .unwrap()
            .selector
            .match_labels
            .clone()
            .unwrap();
        assert_eq!(
            selector.get("component").map(String::as_str),
            Some("metrics-collector")
        );
    }

    #[test]
    fn test_upload_endpoint_comes_from_hub_info() {
        let allowlist = MetricsAllowlist::default();
        let deployment = build(&settings(30), &test_hub(), &allowlist, "id", 1);
        assert_eq!(
            env_value(&deployment, "TO").as_deref(),
            Some("http://test-endpoint")
        );
    }

    #[test]
    fn test_replica_count_flows_through() {
        let allowlist = MetricsAllowlist::default();
        for replicas in [0, 1] {
            let deployment = build(&settings(30), &test_hub(), &allowlist, "id", replicas);
            assert_eq!(deployment.spec.as_ref().unwrap().replicas, Some(replicas));
        }
    }

    // -----------------------------------------------------------------------
    // Change detection
    // -----------------------------------------------------------------------

    #[test]
    fn test_projection_round_trip_is_unchanged() {
        let allowlist = MetricsAllowlist {
            names: vec!["up".to_string()],
            matches: vec![],
        };
        let desired = build(&settings(30), &test_hub(), &allowlist, "abc-123", 1);
        assert!(specs_match(&desired.clone(), &desired));
    }

    #[test]
    fn test_server_defaulted_fields_do_not_report_a_diff() {
        let allowlist = MetricsAllowlist::default();
        let desired = build(&settings(30), &test_hub(), &allowlist, "abc-123", 1);

        // simulate the fields the API server fills in on a live object
        let mut live = desired.clone();
        {
            let spec = live.spec.as_mut().unwrap();
            spec.revision_history_limit = Some(10);
            spec.progress_deadline_seconds = Some(600);
            spec.strategy = Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                ..Default::default()
            });
            let pod = spec.template.spec.as_mut().unwrap();
            pod.restart_policy = Some("Always".to_string());
            pod.dns_policy = Some("ClusterFirst".to_string());
            pod.termination_grace_period_seconds = Some(30);
            pod.containers[0].termination_message_path =
                Some("/dev/termination-log".to_string());
        }
        live.metadata.resource_version = Some("12345".to_string());

        assert!(specs_match(&live, &desired));
    }

    #[test]
    fn test_replica_change_reports_a_diff() {
        let allowlist = MetricsAllowlist::default();
        let desired = build(&settings(30), &test_hub(), &allowlist, "abc-123", 1);
        let scaled_down = build(&settings(30), &test_hub(), &allowlist, "abc-123", 0);
        assert!(!specs_match(&scaled_down, &desired));
    }

    #[test]
    fn test_command_change_reports_a_diff() {
        let desired = build(
            &settings(30),
            &test_hub(),
            &MetricsAllowlist {
                names: vec!["up".to_string()],
                matches: vec![],
            },
            "abc-123",
            1,
        );
        let stale = build(&settings(30), &test_hub(), &MetricsAllowlist::default(), "abc-123", 1);
        assert!(!specs_match(&stale, &desired));
    }
}
