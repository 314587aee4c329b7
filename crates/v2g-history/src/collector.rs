// collector.rs: Walks a legacy project tree and gathers every revision.
//
// Fan-out / barrier / fan-in:
//   - each item is visited by its own queue task, and project tasks submit
//     tasks for their children
//   - each task converts its item's raw records into a per-item scratch
//     buffer sorted by (timestamp, version)
//   - after the caller's `wait_idle()`, `take_events()` merges the buffers
//     into one globally ordered stream
//
// An item whose history cannot be read fails its own task only. The queue
// records the failure and siblings keep going. A project's children are
// visited even when the project's own history is unreadable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use v2g_queue::{Stage, TaskFailure, WorkQueue};

use crate::event::RevisionEvent;
use crate::filter::ExcludeFilter;
use crate::item::Item;
use crate::reader::LegacyRepository;

struct CollectContext {
    queue: WorkQueue,
    repo: Arc<dyn LegacyRepository>,
    exclude: ExcludeFilter,
    histories: Mutex<Vec<Vec<RevisionEvent>>>,
    /// Items whose history was read; survives `take_events`.
    collected: AtomicUsize,
}

/// Concurrent collector of revision events.
pub struct RevisionCollector {
    ctx: Arc<CollectContext>,
}

impl RevisionCollector {
    pub fn new(queue: WorkQueue, repo: Arc<dyn LegacyRepository>) -> Self {
        Self::with_exclusions(queue, repo, ExcludeFilter::default())
    }

    pub fn with_exclusions(
        queue: WorkQueue,
        repo: Arc<dyn LegacyRepository>,
        exclude: ExcludeFilter,
    ) -> Self {
        Self {
            ctx: Arc::new(CollectContext {
                queue,
                repo,
                exclude,
                histories: Mutex::new(Vec::new()),
                collected: AtomicUsize::new(0),
            }),
        }
    }

    /// Schedule `item` (and, for projects, everything below it) for
    /// collection. Returns immediately; call `wait_idle()` on the queue
    /// before taking the events.
    pub fn add_item(&self, item: Item) {
        submit_visit(Arc::clone(&self.ctx), item);
    }

    /// Number of items whose history has been collected so far.
    pub fn items_collected(&self) -> usize {
        self.ctx.collected.load(Ordering::SeqCst)
    }

    /// Drain everything collected so far as one stream in global order.
    pub fn take_events(&self) -> Vec<RevisionEvent> {
        let histories = std::mem::take(&mut *lock_histories(&self.ctx));
        let mut events: Vec<RevisionEvent> = histories.into_iter().flatten().collect();
        events.sort_by(RevisionEvent::stream_order);
        events
    }
}

fn lock_histories(ctx: &CollectContext) -> std::sync::MutexGuard<'_, Vec<Vec<RevisionEvent>>> {
    match ctx.histories.lock() {
        Ok(guard) => guard,
        Err(poison) => poison.into_inner(),
    }
}

fn submit_visit(ctx: Arc<CollectContext>, item: Item) {
    let queue = ctx.queue.clone();
    let subject = item.path.clone();
    queue.submit(Stage::Collect, subject, move || visit(ctx, item));
}

fn visit(ctx: Arc<CollectContext>, item: Item) -> anyhow::Result<()> {
    if ctx.exclude.is_excluded(&item.path) {
        tracing::debug!("excluding {}", item.path);
        return Ok(());
    }

    let listed = if item.is_project() {
        visit_children(&ctx, &item)
    } else {
        Ok(())
    };

    match (read_history(&ctx, &item), listed) {
        (Err(read), Err(listed)) => {
            let failure = TaskFailure::from_error(Stage::Collect, item.path.clone(), &listed);
            ctx.queue.record_failure(failure);
            Err(read)
        }
        (read, listed) => read.and(listed),
    }
}

fn visit_children(ctx: &Arc<CollectContext>, project: &Item) -> anyhow::Result<()> {
    let children = ctx
        .repo
        .children(project)
        .with_context(|| format!("listing children of {}", project.path))?;
    for child in children {
        submit_visit(Arc::clone(ctx), child);
    }
    Ok(())
}

fn read_history(ctx: &CollectContext, item: &Item) -> anyhow::Result<()> {
    let raw = ctx
        .repo
        .list_history(item)
        .with_context(|| format!("reading history of {}", item.path))?;

    let mut events: Vec<RevisionEvent> = raw
        .into_iter()
        .map(|r| RevisionEvent::from_raw(item, r))
        .collect();
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.version.cmp(&b.version))
    });
    tracing::debug!("{}: {} revisions", item.path, events.len());
    lock_histories(ctx).push(events);
    ctx.collected.fetch_add(1, Ordering::SeqCst);
    Ok(())
}
