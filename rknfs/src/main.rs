//! # rknfs: NFS volume provisioner for RK8s
//!
//! Thin process wrapper around `libnfs`.  The orchestrator either runs one
//! command per call (`provision`, `delete`) or keeps a `serve` process and
//! exchanges newline-delimited JSON messages over stdin/stdout.
//!
//! Must run with privileges sufficient to mount NFS exports.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use libnfs::mount::local_mount_point;
use libnfs::server::serve_lines;
use libnfs::{ExportRef, NamePolicy, NfsProvisioner, Provisioner, ProvisionerConfig};
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{error, info};

/// NFS volume provisioner
#[derive(Parser, Debug)]
#[command(name = "rknfs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Provisioner identity (overrides PROVISIONER_NAME)
    #[arg(long, global = true)]
    identity: Option<String>,

    /// Directory under which exports are mounted (overrides RKNFS_MOUNT_ROOT)
    #[arg(long, global = true, value_name = "DIR")]
    mount_root: Option<PathBuf>,

    /// Mount deadline in seconds (overrides RKNFS_MOUNT_TIMEOUT_SECS)
    #[arg(long, global = true, value_name = "SECS")]
    mount_timeout: Option<u64>,

    /// Reject grouping labels containing '-'
    #[arg(long, global = true)]
    strict_names: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision a volume from JSON provision options and print its descriptor
    Provision {
        /// File holding the options, or `-` for stdin
        #[arg(long, default_value = "-")]
        options: String,
    },
    /// Delete the volume described by a JSON descriptor
    Delete {
        /// File holding the descriptor, or `-` for stdin
        #[arg(long, default_value = "-")]
        volume: String,
    },
    /// Serve newline-delimited JSON requests on stdin/stdout
    Serve,
    /// Print the local mount point an export maps to
    MountPoint {
        #[arg(long)]
        server: String,
        #[arg(long)]
        path: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    // Volume directories must be usable by any pod uid.
    nix::sys::stat::umask(nix::sys::stat::Mode::empty());

    let config = load_config(&cli)?;
    if let Err(e) = run(cli.command, config).await {
        error!(error = %format!("{e:#}"), "rknfs failed");
        return Err(e);
    }
    Ok(())
}

/// Logs go to stderr; stdout carries protocol output.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

/// Environment first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<ProvisionerConfig> {
    let mut config = ProvisionerConfig::from_env().context("Failed to read configuration")?;
    if let Some(identity) = &cli.identity {
        config.identity = identity.clone();
    }
    if let Some(root) = &cli.mount_root {
        config.mount_root = root.clone();
    }
    if let Some(secs) = cli.mount_timeout {
        config.mount_timeout = std::time::Duration::from_secs(secs);
    }
    if cli.strict_names {
        config.naming_policy = NamePolicy::Strict;
    }
    Ok(config)
}

async fn run(command: Commands, config: ProvisionerConfig) -> Result<()> {
    match command {
        Commands::MountPoint { server, path } => {
            let export = ExportRef::new(server, path).canonicalize()?;
            println!("{}", local_mount_point(&config.mount_root, &export).display());
        }
        Commands::Provision { options } => {
            let provisioner = NfsProvisioner::new(&config)?;
            let input = read_input(&options).await?;
            let options = serde_json::from_str(&input)
                .with_context(|| format!("Failed to parse provision options from {options}"))?;
            let volume = provisioner.provision(options).await?;
            info!(volume = %volume.name, "provisioned");
            println!("{}", serde_json::to_string_pretty(&volume)?);
        }
        Commands::Delete { volume } => {
            let provisioner = NfsProvisioner::new(&config)?;
            let input = read_input(&volume).await?;
            let descriptor = serde_json::from_str(&input)
                .with_context(|| format!("Failed to parse volume descriptor from {volume}"))?;
            provisioner.delete(&descriptor).await?;
            info!("deleted");
        }
        Commands::Serve => {
            let provisioner = NfsProvisioner::new(&config)?;
            info!(identity = provisioner.identity(), "serving requests on stdin");
            serve_lines(
                &provisioner,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?;
        }
    }
    Ok(())
}

/// Read `source` as a file path, or stdin when it is `-`.
async fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read {source}"))
    }
}
