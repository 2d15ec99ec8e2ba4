use anyhow::Result;
use kube::CustomResourceExt;
use observability_addon_operator::crd::{
    ManagedClusterAddOn, MultiClusterObservability, ObservabilityAddon,
};

fn main() -> Result<()> {
    for crd in [
        ObservabilityAddon::crd(),
        MultiClusterObservability::crd(),
        ManagedClusterAddOn::crd(),
    ] {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
