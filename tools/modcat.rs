//! modcat - scan a module directory and inspect its callable surface
//!
//! Usage:
//!   modcat scan <path> --id <id> --module-version <version> [--target <folder>]...
//!   modcat members <path> --id <id> --module-version <version> [--name <member>]

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use modcat::config::CatalogConfig;
use modcat::module::api::events::{drain, DiagnosticEvent, EventKind, EventManager};
use modcat::module::{Catalog, ModuleRecord, Scanner};
use modcat::utils::init_logging_from_config;

#[derive(Parser, Debug)]
#[command(name = "modcat", version, about = "Scan plugin modules and list their callable members")]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured one (RUST_LOG still wins)
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a module directory and print the record as JSON
    Scan {
        #[command(flatten)]
        module: ModuleArgs,

        /// Print compact JSON on one line
        #[arg(long)]
        compact: bool,
    },
    /// Scan a module directory and list member signatures
    Members {
        #[command(flatten)]
        module: ModuleArgs,

        /// Only list members with this name (case-insensitive)
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ModuleArgs {
    /// Module directory
    path: PathBuf,

    #[arg(long)]
    id: String,

    /// Module version (recorded as given)
    #[arg(long = "module-version", value_name = "VERSION")]
    version: String,

    /// Only consider these platform target folders
    #[arg(long = "target")]
    targets: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CatalogConfig::from_file(path)?,
        None => CatalogConfig::default(),
    };
    if let Some(filter) = cli.log_filter {
        config.logging.get_or_insert_with(Default::default).filter = Some(filter);
    }
    init_logging_from_config(config.logging.as_ref());

    match cli.command {
        Command::Scan { module, compact } => {
            let record = scan(&config, &module)?;
            let json = if compact {
                serde_json::to_string(&record)?
            } else {
                serde_json::to_string_pretty(&record)?
            };
            println!("{}", json);
        }
        Command::Members { module, name } => {
            let record = scan(&config, &module)?;
            let catalog = Catalog::new();
            catalog
                .add_or_update(record)
                .context("cataloging scanned module")?;

            let members = match name {
                Some(name) => catalog.find_members_by_name(&name)?.collect::<Vec<_>>(),
                None => catalog
                    .get_all()?
                    .iter()
                    .flat_map(|record| record.members.clone())
                    .collect(),
            };
            for member in &members {
                let marker = if member.flags.is_async { " [async]" } else { "" };
                println!("{}{}", member.signature(), marker);
            }
            info!("{} member(s) listed", members.len());
        }
    }
    Ok(())
}

fn scan(config: &CatalogConfig, module: &ModuleArgs) -> anyhow::Result<ModuleRecord> {
    let events = EventManager::new();
    let mut diagnostics = events.subscribe_to(&[EventKind::Scan]);
    let scanner = Scanner::new(&config.scanner).with_events(events);

    let record = if module.targets.is_empty() {
        scanner.scan(&module.path, &module.id, &module.version)
    } else {
        scanner.scan_with_targets(&module.path, &module.id, &module.version, Some(&module.targets))
    }
    .with_context(|| format!("scanning {}", module.path.display()))?;

    for event in drain(&mut diagnostics) {
        match event {
            DiagnosticEvent::ArtifactFailed { artifact, error, .. } => {
                warn!("skipped artifact {}: {}", artifact.display(), error)
            }
            DiagnosticEvent::TargetSkipped { package, reason } => {
                warn!("skipped package {}: {}", package.display(), reason)
            }
            _ => {}
        }
    }
    Ok(record)
}
