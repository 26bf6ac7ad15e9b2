//! homehub-modules - run one module load pass and print the outcome
//!
//! Usage:
//!   homehub-modules [--config hub.toml] [--modules-dir <dir>] [--log-filter <filter>]

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use homehub_modules::module::context::{ComponentCatalog, Environment, HostContext};
use homehub_modules::module::{ArchiveStore, ModuleManager};
use homehub_modules::utils::{init_logging, init_logging_from_config};
use homehub_modules::HubConfig;

/// Name of the property source built from `[environment]` in the hub config
const HOST_CONFIG_SOURCE: &str = "hub-config";

#[derive(Parser, Debug)]
#[command(name = "homehub-modules", version, about = "Load HomeHub modules and report their state")]
struct Args {
    /// Hub configuration file (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory of module archives (overrides the config)
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Log filter (overrides the config; `RUST_LOG` still wins)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HubConfig::from_file(path)?,
        None => HubConfig::default(),
    };

    match &args.log_filter {
        Some(filter) => init_logging(Some(filter.as_str())),
        None => init_logging_from_config(config.logging.as_ref()),
    }

    let module_config = config.module_config();
    let environment = Environment::from_map(HOST_CONFIG_SOURCE, config.environment.clone());
    let host = HostContext::from_environment(environment, ComponentCatalog::new())
        .context("Failed to start host root container")?;

    let mut manager = ModuleManager::new(&module_config, host);
    if let Some(dir) = &args.modules_dir {
        manager = manager.with_store(ArchiveStore::with_extensions(
            dir,
            &module_config.archive_extensions,
        ));
    }
    info!("Watching {:?}", manager.store().modules_dir());

    let report = manager.load_all().await.context("Module load pass failed")?;

    for (archive, error) in &report.rejected {
        warn!("Rejected {:?}: {}", archive, error);
    }
    for archive in &report.shadowed {
        warn!("Ignored {:?}: module id is built in", archive);
    }

    println!("{:<24} {:<10} {:<12} DETAIL", "MODULE", "STATE", "VERSION");
    for (id, view) in &report.snapshot {
        let version = view
            .descriptor
            .as_ref()
            .map(|d| d.version.as_str())
            .unwrap_or("-");
        let detail = view
            .error
            .as_ref()
            .map(|e| e.to_string())
            .or_else(|| view.working_dir.as_ref().map(|d| d.display().to_string()))
            .unwrap_or_default();
        println!("{:<24} {:<10} {:<12} {}", id, view.state.to_string(), version, detail);
    }

    Ok(())
}
