use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, Patch, PatchParams, PostParams};
use observability_addon_operator::config::OperatorConfig;
use observability_addon_operator::controller::Reconciler;
use observability_addon_operator::watcher::Watcher;
use observability_addon_operator::Error;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Namespace the collector workload is managed in
    #[arg(long, env = "NAMESPACE")]
    namespace: String,

    /// Hub-side namespace holding the addon and its binding object
    #[arg(long, env = "WATCH_NAMESPACE")]
    hub_namespace: String,

    /// Container image reference for the metrics collector
    #[arg(long, env = "COLLECTOR_IMAGE")]
    collector_image: String,

    /// Skip leader election (single-replica development runs)
    #[arg(long, env = "SKIP_LEADER_ELECTION")]
    skip_leader_election: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!(
                "observability-addon-operator v{}",
                env!("CARGO_PKG_VERSION")
            );
            Ok(())
        }
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();

    info!(
        "Starting observability addon operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;
    info!("Connected to Kubernetes cluster");

    let config = OperatorConfig {
        namespace: args.namespace,
        hub_namespace: args.hub_namespace,
        collector_image: args.collector_image,
    };

    if !args.skip_leader_election {
        wait_for_leadership(client.clone(), config.namespace.clone()).await?;
    }

    let reconciler = Arc::new(Reconciler::new(client.clone(), config.clone()));
    Watcher::new(client, config, reconciler).run().await
}

const LEASE_NAME: &str = "observability-addon-operator-lock";
const LEASE_DURATION_SECS: i32 = 15;
const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Block until this process holds the leader lease, then keep renewing it
/// in the background.
async fn wait_for_leadership(client: kube::Client, namespace: String) -> Result<(), Error> {
    let identity = std::env::var("HOSTNAME").unwrap_or_else(|_| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string())
    });
    info!("Leader election using holder ID: {}", identity);

    let leases: Api<Lease> = Api::namespaced(client, &namespace);
    loop {
        match try_acquire_or_renew(&leases, &namespace, &identity).await {
            Ok(true) => break,
            Ok(false) => tokio::time::sleep(RETRY_INTERVAL).await,
            Err(e) => {
                warn!("Leader election error: {:?}", e);
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }
    }
    info!("Acquired leadership for lease {}", LEASE_NAME);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(RENEW_INTERVAL).await;
            match try_acquire_or_renew(&leases, &namespace, &identity).await {
                Ok(true) => {}
                Ok(false) => warn!("Lost leadership for lease {}", LEASE_NAME),
                Err(e) => warn!("Failed to renew leader lease: {:?}", e),
            }
        }
    });

    Ok(())
}

async fn try_acquire_or_renew(
    leases: &Api<Lease>,
    namespace: &str,
    identity: &str,
) -> Result<bool, kube::Error> {
    let now = Utc::now();

    match leases.get(LEASE_NAME).await {
        Ok(existing) => {
            let spec = existing.spec.unwrap_or_default();
            let holder = spec.holder_identity.as_deref();
            let expired = match &spec.renew_time {
                Some(renew) => {
                    let duration =
                        i64::from(spec.lease_duration_seconds.unwrap_or(LEASE_DURATION_SECS));
                    now > renew.0 + chrono::Duration::seconds(duration)
                }
                None => true,
            };

            if holder != Some(identity) && !expired {
                return Ok(false);
            }

            let patch = if holder == Some(identity) {
                serde_json::json!({
                    "spec": {
                        "renewTime": MicroTime(now),
                        "leaseDurationSeconds": LEASE_DURATION_SECS,
                    }
                })
            } else {
                info!("Lease held by {:?} is free or expired, taking over", holder);
                serde_json::json!({
                    "spec": {
                        "holderIdentity": identity,
                        "acquireTime": MicroTime(now),
                        "renewTime": MicroTime(now),
                        "leaseDurationSeconds": LEASE_DURATION_SECS,
                    }
                })
            };
            leases
                .patch(LEASE_NAME, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            Ok(true)
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            let lease = Lease {
                metadata: ObjectMeta {
                    name: Some(LEASE_NAME.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                spec: Some(LeaseSpec {
                    holder_identity: Some(identity.to_string()),
                    acquire_time: Some(MicroTime(now)),
                    renew_time: Some(MicroTime(now)),
                    lease_duration_seconds: Some(LEASE_DURATION_SECS),
                    ..Default::default()
                }),
            };
            leases.create(&PostParams::default(), &lease).await?;
            info!("Created lease {} with holder {}", LEASE_NAME, identity);
            Ok(true)
        }
        Err(e) => Err(e),
    }
}
