//! Tests for the reconciliation decision logic
//!
//! `decide` is a pure function over observed state, so the whole state
//! machine of the controller is pinned here without any API traffic.

#[cfg(test)]
mod tests {
    use crate::controller::reconciler::*;
    use crate::controller::status::AddonState;

    /// Observed state for a healthy, fully-installed cluster
    fn installed() -> ObservedState {
        ObservedState {
            addon_present: true,
            addon_deleting: false,
            addon_has_finalizer: true,
            binding_present: true,
            config_enabled: Some(true),
            backend_present: true,
            collector_present: true,
        }
    }

    #[test]
    fn test_absent_addon_is_a_noop() {
        let observed = ObservedState {
            addon_present: false,
            ..Default::default()
        };
        assert_eq!(decide(&observed), Action::NoOp);
    }

    #[test]
    fn test_deletion_with_marker_tears_down() {
        let observed = ObservedState {
            addon_deleting: true,
            ..installed()
        };
        assert_eq!(decide(&observed), Action::Teardown);
    }

    #[test]
    fn test_deletion_without_marker_does_not_tear_down() {
        let observed = ObservedState {
            addon_deleting: true,
            addon_has_finalizer: false,
            ..installed()
        };
        assert_ne!(decide(&observed), Action::Teardown);
    }

    #[test]
    fn test_missing_binding_is_a_noop() {
        let observed = ObservedState {
            binding_present: false,
            ..installed()
        };
        assert_eq!(decide(&observed), Action::NoOp);
    }

    #[test]
    fn test_missing_global_config_is_a_noop() {
        let observed = ObservedState {
            config_enabled: None,
            ..installed()
        };
        assert_eq!(decide(&observed), Action::NoOp);
    }

    #[test]
    fn test_missing_backend_reports_not_supported() {
        let observed = ObservedState {
            backend_present: false,
            ..installed()
        };
        assert_eq!(
            decide(&observed),
            Action::ReportOnly(AddonState::NotSupported)
        );
    }

    #[test]
    fn test_missing_backend_wins_over_disabled_config() {
        // the wait state applies whether or not metrics are enabled
        let observed = ObservedState {
            backend_present: false,
            config_enabled: Some(false),
            ..installed()
        };
        assert_eq!(
            decide(&observed),
            Action::ReportOnly(AddonState::NotSupported)
        );
    }

    #[test]
    fn test_enabled_without_collector_installs() {
        let observed = ObservedState {
            collector_present: false,
            ..installed()
        };
        assert_eq!(decide(&observed), Action::Install);
    }

    #[test]
    fn test_enabled_with_collector_updates() {
        assert_eq!(decide(&installed()), Action::Update);
    }

    #[test]
    fn test_disabled_config_disables() {
        let observed = ObservedState {
            config_enabled: Some(false),
            ..installed()
        };
        assert_eq!(decide(&observed), Action::Disable);
    }

    #[test]
    fn test_disable_keeps_workload_at_zero_replicas() {
        // the disable transition scales to zero; it never deletes
        assert_eq!(replicas_for(&Action::Disable), 0);
        assert_eq!(replicas_for(&Action::Install), 1);
        assert_eq!(replicas_for(&Action::Update), 1);
    }

    #[test]
    fn test_decide_is_stable_for_identical_state() {
        // the state machine is self-stabilizing: same observation, same action
        let observed = installed();
        assert_eq!(decide(&observed), decide(&observed.clone()));
    }

    #[test]
    fn test_cert_secret_trigger_is_recognized() {
        let trigger = Trigger::new("test-ns", "observability-managed-cluster-certs");
        assert!(trigger.is_cert_secret());

        let other = Trigger::new("test-ns", "hub-info-secret");
        assert!(!other.is_cert_secret());
    }

    #[test]
    fn test_cert_trigger_restarts_pods_even_when_spec_unchanged() {
        let trigger = Trigger::new("test-ns", "observability-managed-cluster-certs");
        assert!(should_restart(&trigger, true));
    }

    #[test]
    fn test_cert_trigger_without_live_collector_skips_restart() {
        let trigger = Trigger::new("test-ns", "observability-managed-cluster-certs");
        assert!(!should_restart(&trigger, false));
    }

    #[test]
    fn test_regular_trigger_never_restarts_pods() {
        let trigger = Trigger::new("test-hub-ns", "observability-addon");
        assert!(!should_restart(&trigger, true));
    }
}
