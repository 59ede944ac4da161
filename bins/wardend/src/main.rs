// SPDX-License-Identifier: Apache-2.0
//! Warden Daemon (wardend)
//!
//! Boots the arbitration engine from a JSON configuration, links the
//! resolver rule file, wires grant events into the fact store, and waits for
//! shutdown. Transports and plugins attach on top of this shell.
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use warden_db::{StoreError, TableStore};
use warden_resolver::{NoopInterpreter, Resolver, ResolverBuilder, ResolverError};
use warden_resource::{Engine, ResourceError};

mod config;
mod link;

use config::BootstrapConfig;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Bootstrap configuration file (zones, classes, resource definitions)
    #[clap(short, long)]
    config: PathBuf,

    /// Resolver rule file
    #[clap(short, long)]
    rules: Option<PathBuf>,

    /// Maximum log level (error, warn, info, debug, trace)
    #[clap(short, long, default_value = "info")]
    log_level: String,
}

/// Startup failures mapped to the daemon's exit codes.
#[derive(Debug, Error)]
enum StartupError {
    /// Exit code 1.
    #[error("configuration error: {0:#}")]
    Config(#[source] anyhow::Error),
    /// Exit code 2.
    #[error("arbitration initialisation failed: {0}")]
    Arbitration(#[from] ResourceError),
    /// Exit code 2 (fact store is part of core initialisation).
    #[error("fact store initialisation failed: {0}")]
    Store(#[from] StoreError),
    /// Exit code 3.
    #[error("resolver error: {0}")]
    Resolver(#[from] ResolverError),
}

impl StartupError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 1,
            Self::Arbitration(_) | Self::Store(_) => 2,
            Self::Resolver(_) => 3,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = Level::from_str(&args.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Args) -> Result<(), StartupError> {
    info!("Starting Warden daemon (wardend)...");

    let cfg = BootstrapConfig::load(&args.config).map_err(StartupError::Config)?;
    let registry = cfg.build_registry()?;
    info!(
        zones = registry.zones().len(),
        classes = registry.classes().len(),
        resources = registry.resources().len(),
        "arbitration engine initialised"
    );

    let mut engine = Engine::new(registry);
    let mut store = TableStore::new();
    let owner_table = link::create_owner_table(&mut store)?;

    let mut resolver: Option<Resolver> = match &args.rules {
        Some(path) => {
            let resolver = ResolverBuilder::new()
                .register_interpreter(Box::new(NoopInterpreter))
                .parse_file(path)?;
            info!(
                targets = resolver.targets().len(),
                facts = resolver.facts().len(),
                "resolver linked"
            );
            Some(resolver)
        }
        None => None,
    };

    // Settle the initial (empty) state: a no-op arbitration pass plus one
    // resolution of the configured policy target.
    let events = engine.run_pending();
    link::publish_grants(&engine, &mut store, owner_table, &events)?;
    if let (Some(resolver), Some(target)) = (resolver.as_mut(), cfg.resolve_on_grant.as_deref()) {
        let executed = resolver.update_target(&mut store, target, &[])?;
        debug!(target, executed, "initial resolution");
    }

    let mut classes = String::new();
    if warden_resource::print_classes(&engine, &mut classes).is_ok() && !classes.is_empty() {
        debug!("\n{classes}");
    }

    info!("wardend ready");
    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    Ok(())
}
