//! # vss2git
//!
//! Migrates the history of one legacy project into a new git repository.
//!
//! ```text
//! vss2git <repo> <project> <output-dir> [--log-file F] [--config F] ...
//! ```
//!
//! `<repo>` is a history dump directory (`manifest.json` plus `data/`).
//! The process exits with status 1 when the run was aborted or any item or
//! changeset failed.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use v2g_export::MemoryRepository;
use v2g_history::{DumpRepository, LegacyRepository};
use v2g_migrate::{run_migration, run_migration_into, MigrationConfig, MigrationOutcome};

/// Legacy history to git migrator.
#[derive(Parser)]
#[command(name = "vss2git", version, about)]
struct Cli {
    /// Legacy repository (history dump directory).
    repo: PathBuf,

    /// Project to migrate, e.g. `$/Project`.
    project: String,

    /// Directory for the new git repository.
    output_dir: PathBuf,

    /// Append log lines to this file instead of stdout.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// TOML file with migration settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds within which one user's changes always form one commit.
    #[arg(long)]
    any_comment_secs: Option<i64>,

    /// Seconds within which one user's changes with the same comment form
    /// one commit.
    #[arg(long)]
    same_comment_secs: Option<i64>,

    /// Domain for generated author emails.
    #[arg(long)]
    email_domain: Option<String>,

    /// Parallel history readers.
    #[arg(long)]
    workers: Option<usize>,

    /// Glob of legacy paths to leave out (repeatable).
    #[arg(long)]
    exclude: Vec<String>,

    /// Write the run summary as JSON to this file.
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Replay into memory only; nothing is written to the output directory.
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// File settings with command-line overrides applied.
    fn migration_config(&self) -> anyhow::Result<MigrationConfig> {
        let mut config = match &self.config {
            Some(path) => MigrationConfig::load(path)?,
            None => MigrationConfig::default(),
        };
        if let Some(secs) = self.any_comment_secs {
            config.any_comment_threshold_secs = secs;
        }
        if let Some(secs) = self.same_comment_secs {
            config.same_comment_threshold_secs = secs;
        }
        if let Some(domain) = &self.email_domain {
            config.email_domain = domain.clone();
        }
        if let Some(workers) = self.workers {
            config.collector_workers = workers;
        }
        config.exclude.extend(self.exclude.iter().cloned());
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(outcome) if outcome.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<MigrationOutcome> {
    init_logging(cli.log_file.as_ref())?;
    let config = cli.migration_config()?;

    let repo: Arc<dyn LegacyRepository> = Arc::new(
        DumpRepository::open(&cli.repo)
            .with_context(|| format!("opening legacy repository {}", cli.repo.display()))?,
    );

    let outcome = if cli.dry_run {
        tracing::info!("dry run: {} is not written", cli.output_dir.display());
        let (outcome, target) =
            run_migration_into(repo, &cli.project, MemoryRepository::new(), &config)?;
        tracing::info!(
            "dry run produced {} commits, {} files, tags {:?}",
            target.commits().len(),
            target.files().len(),
            target.tag_names()
        );
        outcome
    } else {
        run_migration(repo, &cli.project, &cli.output_dir, &config)?
    };

    if let Some(path) = &cli.summary {
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }
    Ok(outcome)
}

/// Send log lines to stdout, or append them to `log_file`.
fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("v2g_queue=info".parse()?)
        .add_directive("v2g_history=info".parse()?)
        .add_directive("v2g_changeset=info".parse()?)
        .add_directive("v2g_export=info".parse()?)
        .add_directive("v2g_migrate=info".parse()?)
        .add_directive("vss2git=info".parse()?);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout)
                .init();
        }
    }
    Ok(())
}
