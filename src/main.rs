/// spring-boot-eks - EKS stack and Kubernetes manifests for spring-boot-k8s
///
/// Assembles the VPC, ECR repository, EKS cluster and node group declarations
/// together with the application's Namespace, Deployment and Service, then
/// synthesizes them to YAML for an external deploy step.
mod assembly;
mod aws;
mod config;
mod error;
mod graph;
mod k8s;
mod synth;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::assembly::assemble;
use crate::config::{Environment, StackConfig};
use crate::synth::Synthesizer;

#[derive(Parser)]
#[command(name = "spring-boot-eks")]
#[command(about = "Assemble the spring-boot-k8s EKS stack and manifests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Target AWS account (defaults to CDK_DEFAULT_ACCOUNT)
    #[arg(long, global = true)]
    account: Option<String>,

    /// Target AWS region (defaults to CDK_DEFAULT_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Container image reference (defaults to the ${ECR_REPOSITORY_URI}:latest placeholder)
    #[arg(long, global = true)]
    image: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the stack and manifests as YAML
    Synth {
        /// Output directory for generated files
        #[arg(short, long, default_value = "./cdk.out")]
        output: PathBuf,
    },

    /// Show resources and the order they are applied in
    Plan,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("spring_boot_eks={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Synth { ref output } => synth(&cli, output).await,
        Commands::Plan => plan(&cli),
        Commands::Config => show_config(&cli),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Resolve the stack configuration from flags and environment
fn load_config(cli: &Cli) -> Result<StackConfig> {
    let environment = Environment::resolve(cli.account.clone(), cli.region.clone())?;
    let mut config = StackConfig::new(environment);
    if let Some(image) = &cli.image {
        config = config.with_image(image.clone());
    }
    Ok(config)
}

/// Assemble and write all artifacts
async fn synth(cli: &Cli, output: &Path) -> Result<()> {
    let config = load_config(cli)?;
    let assembly = assemble(&config).context("Failed to assemble stack")?;

    let files = Synthesizer::new(output)
        .synthesize(&assembly)
        .await?;

    info!("✓ Synthesis completed successfully!");
    info!("");
    info!("Generated files:");
    info!("  Stack: {}", files.stack.display());
    info!("  Manifests: {}", files.manifests.display());
    for document in &files.documents {
        info!("    - {}", document.display());
    }
    info!("");
    info!("Outputs:");
    for output in &assembly.stack.outputs {
        info!("  {}: {}", output.key, output.value);
    }

    Ok(())
}

/// Log the assembled resources and their apply order
fn plan(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let assembly = assemble(&config).context("Failed to assemble stack")?;
    let stack = &assembly.stack;

    info!("Stack: {} ({})", stack.id, stack.description);
    info!(
        "  Environment: account {} region {}",
        stack.environment.account, stack.environment.region
    );
    info!("");
    info!("Network {} ({}):", stack.network.id, stack.network.cidr);
    for group in &stack.network.subnet_groups {
        for subnet in &group.subnets {
            info!(
                "  - {} {} in {} (egress: {:?})",
                group.name, subnet.cidr, subnet.availability_zone, group.egress
            );
        }
    }
    info!("  NAT gateways: {}", stack.network.nat_gateways);
    info!(
        "Registry: {} (removal: {:?})",
        stack.registry.repository_name, stack.registry.removal_policy
    );
    info!(
        "Cluster: {} (Kubernetes {}, public endpoint: {}, private endpoint: {})",
        stack.cluster.name,
        stack.cluster.version,
        stack.cluster.endpoint_access.public(),
        stack.cluster.endpoint_access.private()
    );
    for grant in &stack.cluster.masters {
        info!("  Masters: {}", grant.principal_arn());
    }
    for pool in &stack.cluster.node_pools {
        info!(
            "  Node group {}: {} x{} (min {}, max {}, {:?})",
            pool.name,
            pool.instance_types.join(","),
            pool.desired_size,
            pool.min_size,
            pool.max_size,
            pool.capacity_type
        );
    }

    info!("");
    info!("Resource order:");
    for (index, id) in stack.dependencies.apply_order().iter().enumerate() {
        info!("  {}. {}", index + 1, id);
    }

    info!("");
    info!("Manifest order on {}:", assembly.manifests.cluster);
    for (index, entry) in assembly.manifests.in_apply_order().iter().enumerate() {
        let meta = entry.document.metadata();
        info!(
            "  {}. {} {} ({})",
            index + 1,
            entry.document.kind(),
            meta.name,
            entry.document.api_version()
        );
    }
    for edge in assembly.manifests.edges() {
        info!("  depends: {}", edge);
    }

    Ok(())
}

/// Print the effective configuration as YAML
fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    config.validate().context("Invalid configuration")?;
    let yaml = serde_yaml::to_string(&config)?;
    println!("{}", yaml);
    Ok(())
}
