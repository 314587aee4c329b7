// pipeline.rs: Collect, build and export, end to end.
//
// The stages run strictly left to right. Collection fans out on its own
// queue (collector_workers) and is fully drained before clustering starts.
// Export runs as a single task on a queue of width one, since it owns the
// working tree and the path mapping. Failures from both queues are gathered
// into the outcome. Invalid settings, an invalid project, bad exclusions or
// a target that cannot be created abort the run before anything is written.

use std::path::Path;
use std::sync::{mpsc, Arc};

use anyhow::anyhow;
use serde::Serialize;
use v2g_changeset::{BuildStats, ChangesetBuilder};
use v2g_export::{ExportOptions, ExportStats, Exporter, GitRepository, TargetRepository};
use v2g_history::{open_project, ExcludeFilter, LegacyRepository, RevisionCollector};
use v2g_queue::{Stage, TaskFailure, WorkQueue};

use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};

/// Result of a run that got past its fatal checks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationOutcome {
    /// No failure was recorded in any stage.
    pub success: bool,
    pub failures: Vec<TaskFailure>,
    /// Revision events collected.
    pub events: usize,
    /// Changesets built.
    pub changesets: usize,
    /// Commits written.
    pub commits: usize,
    pub export: ExportStats,
}

/// Migrate `project_path` into a new git repository at `output_dir`.
pub fn run_migration(
    repo: Arc<dyn LegacyRepository>,
    project_path: &str,
    output_dir: &Path,
    config: &MigrationConfig,
) -> Result<MigrationOutcome> {
    let target = GitRepository::new(output_dir).with_default_branch(config.default_branch.clone());
    run_migration_into(repo, project_path, target, config).map(|(outcome, _)| outcome)
}

/// Migrate `project_path` into any target repository and hand the target
/// back together with the outcome.
pub fn run_migration_into<T>(
    repo: Arc<dyn LegacyRepository>,
    project_path: &str,
    mut target: T,
    config: &MigrationConfig,
) -> Result<(MigrationOutcome, T)>
where
    T: TargetRepository + 'static,
{
    tracing::info!("vss2git {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "thresholds: {}s for any comment, {}s for the same comment; email domain {}",
        config.any_comment_threshold_secs,
        config.same_comment_threshold_secs,
        config.email_domain
    );

    let thresholds = config.thresholds()?;
    let exclude = ExcludeFilter::new(config.exclude.as_slice()).map_err(MigrationError::Exclude)?;
    let root = open_project(repo.as_ref(), project_path).map_err(|source| {
        MigrationError::InvalidProject {
            path: project_path.to_string(),
            source,
        }
    })?;

    // Collect
    let collect_queue = WorkQueue::named("collect", config.collector_workers);
    let collector =
        RevisionCollector::with_exclusions(collect_queue.clone(), Arc::clone(&repo), exclude);
    tracing::info!("collecting history of {} from {}", root.path, repo.name());
    collector.add_item(root.clone());
    collect_queue.wait_idle();
    let items = collector.items_collected();
    let events = collector.take_events();
    tracing::info!("collected {} revisions from {} items", events.len(), items);
    let event_count = events.len();

    // Build
    let changesets = ChangesetBuilder::build(thresholds, events);
    let built = BuildStats::of(&changesets);

    // Export
    target.init().map_err(MigrationError::Target)?;
    let export_queue = WorkQueue::named("export", 1);
    let options = ExportOptions::new(root.path.clone())
        .with_email_domain(config.email_domain.clone())
        .with_content_workers(config.content_workers);
    let (tx, rx) = mpsc::channel();
    {
        let queue = export_queue.clone();
        let repo = Arc::clone(&repo);
        export_queue.submit(Stage::Export, root.path.clone(), move || {
            let mut exporter = Exporter::new(queue, repo, target, options);
            let stats = exporter.export(&changesets);
            tx.send((stats, exporter.into_target()))
                .map_err(|_| anyhow!("export results were not collected"))
        });
    }
    export_queue.wait_idle();

    let mut failures = collect_queue.fetch_failures().unwrap_or_default();
    failures.extend(export_queue.fetch_failures().unwrap_or_default());

    let (export, target) = match rx.try_recv() {
        Ok(result) => result,
        Err(_) => {
            let reason = failures
                .last()
                .map(ToString::to_string)
                .unwrap_or_else(|| "no result from export task".to_string());
            tracing::error!("{}", reason);
            return Err(MigrationError::ExportAborted(reason));
        }
    };

    for failure in &failures {
        tracing::error!("{}", failure);
    }
    let outcome = MigrationOutcome {
        success: failures.is_empty(),
        failures,
        events: event_count,
        changesets: built.changesets,
        commits: export.commits,
        export,
    };
    if outcome.success {
        tracing::info!(
            "migration complete: {} revisions, {} changesets, {} commits",
            outcome.events,
            outcome.changesets,
            outcome.commits
        );
    } else {
        tracing::warn!(
            "migration finished with {} failures: {} revisions, {} changesets, {} commits",
            outcome.failures.len(),
            outcome.events,
            outcome.changesets,
            outcome.commits
        );
    }
    Ok((outcome, target))
}
