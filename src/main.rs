//! OCS Teardown CLI
//!
//! Removes an OpenShift Container Storage deployment from a cluster in
//! dependency order:
//!
//! 1. Discover operator-owned storage classes, claims, and pods
//! 2. Detach monitoring, image registry, and logging from the storage
//! 3. Delete bound pods, then their claims
//! 4. Tear down the local-storage layer (PVs, mounts, disk wipe)
//! 5. Delete the StorageCluster and clean node state directories
//! 6. Delete storage classes, node labels, CRDs, and the namespace
//!
//! The run is idempotent; rerunning after an interruption picks up where
//! the previous run left off.

use anyhow::Context;
use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ocs_teardown::{
    ClusterRef, KubeCluster, Outcome, Platform, TeardownConfig, Uninstaller,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// OCS Teardown - remove an OpenShift Container Storage deployment
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cloud platform the cluster runs on (aws, vsphere); any other value
    /// skips the image registry detach
    #[arg(long, env = "PLATFORM", default_value = "unknown")]
    platform: String,

    /// Namespace the storage operator is installed in
    #[arg(long, env = "STORAGE_NAMESPACE", default_value = "openshift-storage")]
    namespace: String,

    /// Path to a kubeconfig file (defaults to in-cluster or ~/.kube/config)
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Seconds to wait for each CRD to finish deleting
    #[arg(long, env = "CRD_TIMEOUT", default_value = "18000")]
    crd_timeout_secs: u64,

    /// Seconds to wait for the operator namespace to finish deleting
    #[arg(long, env = "NAMESPACE_TIMEOUT", default_value = "300")]
    namespace_timeout_secs: u64,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y', env = "ASSUME_YES")]
    yes: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let platform = Platform::from_name(&args.platform);

    info!("Starting OCS teardown");
    info!("  Version: {}", ocs_teardown::VERSION);
    info!("  Namespace: {}", args.namespace);
    info!("  Platform: {}", platform);

    if !args.yes && !confirm(&args.namespace)? {
        info!("Teardown cancelled");
        return Ok(());
    }

    let client = build_client(args.kubeconfig.as_deref()).await?;

    let config = TeardownConfig {
        platform,
        namespace: args.namespace.clone(),
        crd_timeout: Duration::from_secs(args.crd_timeout_secs),
        namespace_timeout: Duration::from_secs(args.namespace_timeout_secs),
    };

    let cluster: ClusterRef = Arc::new(KubeCluster::new(client));
    let report = Uninstaller::new(cluster, config).uninstall().await?;

    match report.outcome() {
        Outcome::Success => {
            info!("Teardown complete");
            Ok(())
        }
        Outcome::PartialFailure => {
            for failure in &report.item_failures {
                error!(
                    "step {}: {} failed: {}",
                    failure.step, failure.target, failure.reason
                );
            }
            error!(
                "Teardown finished with {} recorded failure(s)",
                report.item_failures.len()
            );
            std::process::exit(1);
        }
    }
}

/// Interactive guard before anything destructive happens
fn confirm(namespace: &str) -> anyhow::Result<bool> {
    print!(
        "This permanently deletes the storage deployment in {} and wipes its local disks. Continue? [y/N] ",
        namespace
    );
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

// =============================================================================
// Cluster Client
// =============================================================================

async fn build_client(kubeconfig: Option<&Path>) -> anyhow::Result<Client> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("reading kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("loading kubeconfig")?
        }
        None => Config::infer().await.context("inferring cluster config")?,
    };
    Client::try_from(config).context("building cluster client")
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("kube=info".parse().unwrap())
        .add_directive("tower=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
