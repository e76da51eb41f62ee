//! depgate - package operation engine
//!
//! Usage:
//!   depgate preview plan.toml          # Expand and diff a plan
//!   depgate apply plan.toml            # Gate and apply a plan in memory
//!   depgate metadata Id@1.0.0 ...      # Look up package metadata

mod plan;
mod render;
mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use depgate_core::actions;
use depgate_core::config::{ConfigStore, EngineConfig};
use depgate_core::coordinator::{OperationCoordinator, OperationLock};
use depgate_core::gate::GateOptions;
use depgate_core::metadata::MetadataResolver;
use depgate_core::preview;
use depgate_core::types::{OperationKind, OperationStatus, PackageIdentity};

use crate::terminal::{ConsolePresentation, LogTelemetry};
use crate::plan::{Plan, PlanProjectService};

#[derive(Parser)]
#[command(name = "depgate")]
#[command(about = "Preview, gate and apply package operations", long_about = None)]
struct Cli {
    /// Path to depgate.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the per-project changes a plan would make
    Preview {
        /// Plan file (TOML)
        plan: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Run a plan through the gate and apply it to the in-memory projects
    Apply {
        /// Plan file (TOML)
        plan: PathBuf,

        /// Operation recorded for the run
        #[arg(long, default_value = "install")]
        kind: KindArg,

        /// Accept every prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Resolve metadata for packages against the configured sources
    Metadata {
        /// Packages as Id@version
        #[arg(required = true)]
        packages: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Install,
    Uninstall,
    Update,
}

impl From<KindArg> for OperationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Install => OperationKind::Install,
            KindArg::Uninstall => OperationKind::Uninstall,
            KindArg::Update => OperationKind::Update,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "depgate=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preview { plan, format } => run_preview(&plan, format),
        Commands::Apply { plan, kind, yes } => {
            let config = load_config(cli.config.as_deref())?;
            let status = run_apply(&config, &plan, kind.into(), yes).await?;
            if status != OperationStatus::Succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Metadata { packages, format } => {
            let config = load_config(cli.config.as_deref())?;
            run_metadata(&config, &packages, format).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let store = match path {
        Some(path) => ConfigStore::from_path(path.to_path_buf()),
        None => ConfigStore::from_default_location()?,
    };
    Ok(store.load()?)
}

fn run_preview(path: &Path, format: OutputFormat) -> Result<()> {
    let plan = Plan::load(path)?;
    let projects = PlanProjectService::new(&plan)?;
    let expanded = actions::expand(plan.actions.iter().cloned());
    let change_sets = preview::diff(&expanded, &projects);

    match format {
        OutputFormat::Table => render::print_change_sets(&change_sets),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&change_sets)?),
    }
    Ok(())
}

async fn run_apply(
    config: &EngineConfig,
    path: &Path,
    kind: OperationKind,
    assume_yes: bool,
) -> Result<OperationStatus> {
    let plan = Plan::load(path)?;
    let projects = Arc::new(PlanProjectService::new(&plan)?);
    let coordinator = OperationCoordinator::new(
        OperationLock::new(),
        projects.clone(),
        Arc::new(ConsolePresentation::new(assume_yes)),
        Arc::new(LogTelemetry),
        MetadataResolver::from_config(config)?,
        GateOptions::from(config),
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let actions = plan.actions.clone();
    let outcome = coordinator
        .run(
            kind,
            plan.project_ids(),
            move || future::ready(Ok::<_, depgate_core::Error>(actions)),
            &cancel,
        )
        .await;

    match outcome.status {
        OperationStatus::Succeeded if outcome.executed => {
            println!("Applied {} project change set(s).", outcome.change_sets.len());
            for id in plan.project_ids() {
                let installed = projects.installed(&id);
                println!("  {id}: {} package(s) installed", installed.len());
            }
        }
        OperationStatus::Succeeded => {}
        OperationStatus::Cancelled => match outcome.gate_veto {
            Some(stage) => println!("Operation declined at {stage}."),
            None => println!("Operation cancelled."),
        },
        OperationStatus::Failed => {}
    }
    Ok(outcome.status)
}

async fn run_metadata(config: &EngineConfig, specs: &[String], format: OutputFormat) -> Result<()> {
    let requested = specs
        .iter()
        .map(|spec| PackageIdentity::parse(spec))
        .collect::<depgate_core::Result<Vec<_>>>()?;

    let resolver = MetadataResolver::from_config(config)?;
    let resolved = resolver
        .resolve(&requested, &CancellationToken::new())
        .await
        .context("Metadata lookup failed")?;
    let rows = render::metadata_rows(&requested, &resolved);

    match format {
        OutputFormat::Table => render::print_metadata(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}
