use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sc_core::ScId;
use sc_state::{RegistryConfig, SidechainRegistry};

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(about = "Inspect the sidechain registry of a node", long_about = None)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Node data directory, overrides the configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every registered sidechain
    List,

    /// Show one sidechain
    Show { sc_id: String },
}

fn open_registry(cli: &Cli) -> Result<SidechainRegistry> {
    let mut config = RegistryConfig::load(cli.config.as_deref())
        .context("failed to load registry configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    // inspection never destroys data
    config.wipe = false;

    let path = config.store_path();
    if !path.exists() {
        bail!("no sidechain database at {}", path.display());
    }

    let registry = SidechainRegistry::new();
    let count = registry
        .load_from_store(&config, &AtomicBool::new(false))
        .with_context(|| format!("failed to load sidechain database at {}", path.display()))?;
    info!("loaded {} sidechain(s) from {}", count, path.display());
    Ok(registry)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();
    let registry = open_registry(&cli)?;

    match &cli.command {
        Commands::List => {
            let sidechains = registry.copy_sidechains();
            println!("{} sidechain(s)", sidechains.len());
            for (sc_id, info) in &sidechains {
                println!();
                println!("scId: {}", sc_id);
                println!("{}", info);
            }
        }
        Commands::Show { sc_id } => {
            let id: ScId = sc_id
                .parse()
                .with_context(|| format!("invalid sidechain id {:?}", sc_id))?;
            match registry.get(&id) {
                Some(info) => {
                    println!("scId: {}", id);
                    println!("{}", info);
                }
                None => bail!("sidechain {} not found", id),
            }
        }
    }

    Ok(())
}
