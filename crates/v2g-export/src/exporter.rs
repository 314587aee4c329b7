// exporter.rs: Replays sealed changesets against a target repository.
//
// Changesets are applied strictly one after another: they share a single
// working tree and a single PathMapping. Within a changeset the payload
// reads may run on a small local WorkQueue; tree operations and the commit
// always happen on the calling thread.
//
// A changeset that fails part-way is rolled back (mapping journal plus
// `discard_changes` on the target), recorded as a TaskFailure on the
// pipeline queue, and the export carries on with the next changeset.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use v2g_changeset::Changeset;
use v2g_history::item::relative_to;
use v2g_history::{Action, ItemKind, LegacyRepository, PayloadRef, RevisionEvent};
use v2g_queue::{Stage, TaskFailure, WorkQueue};

use crate::path_map::PathMapping;
use crate::refs::RefNamer;
use crate::target::{Author, TargetRepository};

/// Export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Domain appended to legacy user names to form author emails.
    pub email_domain: String,

    /// Legacy project that maps onto the working tree root.
    pub root_project: String,

    /// Parallel payload reads within one changeset.
    pub content_workers: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            email_domain: "localhost".to_string(),
            root_project: "$/".to_string(),
            content_workers: 1,
        }
    }
}

impl ExportOptions {
    pub fn new(root_project: impl Into<String>) -> Self {
        Self {
            root_project: root_project.into(),
            ..Self::default()
        }
    }

    pub fn with_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.email_domain = domain.into();
        self
    }

    pub fn with_content_workers(mut self, workers: usize) -> Self {
        self.content_workers = workers.max(1);
        self
    }
}

/// Counters for one export pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    /// Changesets attempted.
    pub changesets: usize,
    /// Commits created.
    pub commits: usize,
    /// Changesets that replayed cleanly but changed nothing in the tree.
    pub empty: usize,
    /// Changesets rolled back after a failure.
    pub failed: usize,
    pub tags: usize,
    pub branches: usize,
}

enum RefOp {
    Tag {
        name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Branch {
        name: String,
    },
}

/// Replays changesets into a [`TargetRepository`].
pub struct Exporter<T: TargetRepository> {
    /// Failure sink shared with the rest of the pipeline.
    queue: WorkQueue,
    repo: Arc<dyn LegacyRepository>,
    target: T,
    mapping: PathMapping,
    options: ExportOptions,
    refs: RefNamer,
    stats: ExportStats,
}

impl<T: TargetRepository> Exporter<T> {
    /// `target` must already be initialized.
    pub fn new(
        queue: WorkQueue,
        repo: Arc<dyn LegacyRepository>,
        target: T,
        options: ExportOptions,
    ) -> Self {
        Self {
            queue,
            repo,
            target,
            mapping: PathMapping::new(),
            options,
            refs: RefNamer::new(),
            stats: ExportStats::default(),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }

    pub fn mapping(&self) -> &PathMapping {
        &self.mapping
    }

    pub fn stats(&self) -> ExportStats {
        self.stats
    }

    /// Replay `changesets` in order. Failures are recorded on the queue;
    /// the returned stats cover this call only.
    pub fn export(&mut self, changesets: &[Changeset]) -> ExportStats {
        let before = self.stats;
        tracing::info!(
            "exporting {} changesets to {} repository",
            changesets.len(),
            self.target.name()
        );

        for changeset in changesets {
            self.export_one(changeset);
        }

        let stats = ExportStats {
            changesets: self.stats.changesets - before.changesets,
            commits: self.stats.commits - before.commits,
            empty: self.stats.empty - before.empty,
            failed: self.stats.failed - before.failed,
            tags: self.stats.tags - before.tags,
            branches: self.stats.branches - before.branches,
        };
        tracing::info!(
            "export finished: {} commits, {} without changes, {} failed, {} tags, {} branches",
            stats.commits,
            stats.empty,
            stats.failed,
            stats.tags,
            stats.branches
        );
        stats
    }

    fn export_one(&mut self, changeset: &Changeset) {
        self.stats.changesets += 1;
        tracing::debug!("replaying {}", changeset);

        self.mapping.begin();
        match self.replay(changeset) {
            Ok(ref_ops) => {
                self.mapping.commit();
                self.apply_refs(changeset, ref_ops);
            }
            Err(e) => {
                self.mapping.rollback();
                if let Err(reset) = self.target.discard_changes() {
                    tracing::error!("failed to reset working tree after {}: {}", changeset.id, reset);
                }
                self.stats.failed += 1;
                self.queue.record_failure(TaskFailure::from_error(
                    Stage::Export,
                    changeset.id.to_string(),
                    &e,
                ));
            }
        }
    }

    fn replay(&mut self, changeset: &Changeset) -> anyhow::Result<Vec<RefOp>> {
        let contents = self.prepare_contents(changeset)?;

        let mut ref_ops = Vec::new();
        for member in &changeset.members {
            self.apply(member, &contents, &mut ref_ops)
                .with_context(|| format!("applying {}", member))?;
        }

        let author = Author::for_user(&changeset.user, &self.options.email_domain);
        let commit = self
            .target
            .commit(&author, changeset.timestamp, &changeset.comment)
            .with_context(|| format!("committing {}", changeset.id))?;
        match commit {
            Some(id) => {
                self.stats.commits += 1;
                tracing::debug!("{} committed as {}", changeset.id, id.short());
            }
            None => {
                self.stats.empty += 1;
                tracing::debug!("{} has no tree changes", changeset.id);
            }
        }
        Ok(ref_ops)
    }

    /// Read every payload the changeset needs before touching the tree.
    fn prepare_contents(
        &self,
        changeset: &Changeset,
    ) -> anyhow::Result<HashMap<PayloadRef, Vec<u8>>> {
        let mut wanted: Vec<(PayloadRef, String)> = Vec::new();
        for member in &changeset.members {
            if let Some(payload) = &member.payload {
                if !wanted.iter().any(|(r, _)| r == payload) {
                    wanted.push((payload.clone(), member.path.clone()));
                }
            }
        }

        if self.options.content_workers <= 1 || wanted.len() <= 1 {
            let mut contents = HashMap::with_capacity(wanted.len());
            for (reference, path) in wanted {
                let bytes = self
                    .repo
                    .read_payload(&reference)
                    .with_context(|| format!("reading content {} of {}", reference, path))?;
                contents.insert(reference, bytes);
            }
            return Ok(contents);
        }

        let queue = WorkQueue::named("content", self.options.content_workers);
        let results: Arc<Mutex<HashMap<PayloadRef, Vec<u8>>>> = Arc::default();
        for (reference, path) in wanted {
            let repo = Arc::clone(&self.repo);
            let results = Arc::clone(&results);
            queue.submit(Stage::Export, path.clone(), move || {
                let bytes = repo
                    .read_payload(&reference)
                    .with_context(|| format!("reading content {} of {}", reference, path))?;
                lock_contents(&results).insert(reference, bytes);
                Ok(())
            });
        }
        queue.wait_idle();

        if let Some(failures) = queue.fetch_failures() {
            let causes: Vec<String> = failures.iter().map(|f| f.cause.clone()).collect();
            bail!("{}", causes.join("; "));
        }
        let contents = std::mem::take(&mut *lock_contents(&results));
        Ok(contents)
    }

    fn apply(
        &mut self,
        member: &RevisionEvent,
        contents: &HashMap<PayloadRef, Vec<u8>>,
        ref_ops: &mut Vec<RefOp>,
    ) -> anyhow::Result<()> {
        let id = &member.item_id;
        let is_project = member.item_kind == ItemKind::Project;

        match &member.action {
            Action::Add => {
                let path = self.target_path(&member.path)?;
                if path.is_empty() {
                    return Ok(());
                }
                if is_project {
                    self.target.create_dir(&path)?;
                } else {
                    let content: &[u8] = match &member.payload {
                        Some(reference) => content_of(contents, reference)?,
                        None => &[],
                    };
                    self.target.write_file(&path, content)?;
                }
                self.mapping.insert(id, path);
            }
            Action::Edit => {
                if is_project {
                    return Ok(());
                }
                let reference = member
                    .payload
                    .as_ref()
                    .ok_or_else(|| anyhow!("no content recorded for {}", member.path))?;
                let content = content_of(contents, reference)?;

                let mut paths = self.mapping.resolve(id).to_vec();
                if paths.is_empty() {
                    let path = self.target_path(&member.path)?;
                    self.mapping.insert(id, path.clone());
                    paths.push(path);
                }
                for path in &paths {
                    self.target.write_file(path, content)?;
                }
            }
            Action::Rename { previous_path } => {
                let to = self.target_path(&member.path)?;
                let previous = self.target_path(previous_path).ok();
                let from = previous
                    .as_deref()
                    .and_then(|p| self.mapping.find(id, p))
                    .or_else(|| self.mapping.primary(id))
                    .map(str::to_string)
                    .or(previous)
                    .ok_or_else(|| anyhow!("no known location for {}", previous_path))?;
                if from == to {
                    return Ok(());
                }
                if from.is_empty() || to.is_empty() {
                    bail!("cannot move the root project");
                }
                self.target.rename(&from, &to)?;
                self.mapping.rename(id, &from, &to);
            }
            Action::Delete => {
                let legacy = self.target_path(&member.path).ok();
                let matched = legacy
                    .as_deref()
                    .and_then(|p| self.mapping.find(id, p))
                    .map(str::to_string);
                let paths: Vec<String> = match (matched, legacy) {
                    (Some(path), _) => vec![path],
                    (None, _) if self.mapping.contains(id) => self.mapping.resolve(id).to_vec(),
                    (None, Some(legacy)) => {
                        self.mapping.insert(id, legacy.clone());
                        vec![legacy]
                    }
                    (None, None) => bail!("no known location for {}", member.path),
                };
                for path in paths.iter().filter(|p| !p.is_empty()) {
                    if is_project {
                        self.target.remove_dir(path)?;
                    } else {
                        self.target.remove_file(path)?;
                    }
                    self.mapping.remove(id, Some(path));
                }
            }
            Action::Share { source_path } => {
                let to = self.target_path(&member.path)?;
                if to.is_empty() {
                    bail!("cannot share onto the root project");
                }
                if is_project {
                    self.target.create_dir(&to)?;
                } else if let Some(reference) = &member.payload {
                    let content = content_of(contents, reference)?;
                    self.target.write_file(&to, content)?;
                } else {
                    let from = match self.mapping.primary(id) {
                        Some(path) => path.to_string(),
                        None => self.target_path(source_path)?,
                    };
                    self.target.copy_file(&from, &to)?;
                }
                self.mapping.insert(id, to);
            }
            Action::Label { name } => {
                let comment = member.comment.trim();
                ref_ops.push(RefOp::Tag {
                    name: name.clone(),
                    message: if comment.is_empty() {
                        name.clone()
                    } else {
                        comment.to_string()
                    },
                    timestamp: member.timestamp,
                });
            }
            Action::Branch { name } => {
                ref_ops.push(RefOp::Branch { name: name.clone() });
            }
        }
        Ok(())
    }

    /// Create tags and branches after the changeset's commit. A ref that
    /// cannot be created is reported without undoing the commit.
    fn apply_refs(&mut self, changeset: &Changeset, ref_ops: Vec<RefOp>) {
        let tagger = Author::for_user(&changeset.user, &self.options.email_domain);
        for op in ref_ops {
            let result = match op {
                RefOp::Tag {
                    name,
                    message,
                    timestamp,
                } => {
                    let ref_name = self.refs.claim(&name);
                    match self.target.create_tag(&ref_name, &tagger, timestamp, &message) {
                        Ok(()) => {
                            self.stats.tags += 1;
                            tracing::debug!("tagged '{}' as {}", name, ref_name);
                            Ok(())
                        }
                        Err(e) => {
                            self.refs.release(&ref_name);
                            Err(anyhow::Error::new(e)
                                .context(format!("creating tag '{}' for label '{}'", ref_name, name)))
                        }
                    }
                }
                RefOp::Branch { name } => {
                    let ref_name = self.refs.claim(&name);
                    match self.target.create_branch(&ref_name) {
                        Ok(()) => {
                            self.stats.branches += 1;
                            Ok(())
                        }
                        Err(e) => {
                            self.refs.release(&ref_name);
                            Err(anyhow::Error::new(e).context(format!("creating branch '{}'", ref_name)))
                        }
                    }
                }
            };
            if let Err(e) = result {
                self.queue.record_failure(TaskFailure::from_error(
                    Stage::Export,
                    changeset.id.to_string(),
                    &e,
                ));
            }
        }
    }

    /// Working-tree path for a legacy path; empty for the root project.
    fn target_path(&self, legacy_path: &str) -> anyhow::Result<String> {
        relative_to(legacy_path, &self.options.root_project)
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!(
                    "{} is outside the migrated project {}",
                    legacy_path,
                    self.options.root_project
                )
            })
    }
}

fn content_of<'a>(
    contents: &'a HashMap<PayloadRef, Vec<u8>>,
    reference: &PayloadRef,
) -> anyhow::Result<&'a [u8]> {
    contents
        .get(reference)
        .map(Vec::as_slice)
        .ok_or_else(|| anyhow!("content {} was not loaded", reference))
}

fn lock_contents(
    results: &Mutex<HashMap<PayloadRef, Vec<u8>>>,
) -> std::sync::MutexGuard<'_, HashMap<PayloadRef, Vec<u8>>> {
    match results.lock() {
        Ok(guard) => guard,
        Err(poison) => poison.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use chrono::TimeZone;
    use v2g_changeset::{ChangesetBuilder, Thresholds};
    use v2g_history::{InMemoryRepository, Item, RawAction, RawActionKind};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_236_000_000 + secs, 0).unwrap()
    }

    fn file(id: &str, path: &str) -> Item {
        Item::new(id, ItemKind::File, path)
    }

    fn project(id: &str, path: &str) -> Item {
        Item::new(id, ItemKind::Project, path)
    }

    fn ev(item: &Item, secs: i64, user: &str, kind: RawActionKind, payload: Option<&str>) -> RevisionEvent {
        let mut raw = RawAction::new(1, kind, at(secs), user, "");
        if let Some(p) = payload {
            raw = raw.with_payload(p);
        }
        RevisionEvent::from_raw(item, raw)
    }

    fn payloads() -> InMemoryRepository {
        InMemoryRepository::new("$/P")
            .with_payload("p1", "one")
            .with_payload("p2", "two")
            .with_payload("p3", "three")
    }

    fn export_with(
        repo: InMemoryRepository,
        target: MemoryRepository,
        options: ExportOptions,
        events: Vec<RevisionEvent>,
    ) -> (ExportStats, MemoryRepository, WorkQueue, usize) {
        let queue = WorkQueue::new(1);
        let changesets = ChangesetBuilder::build(Thresholds::default(), events);
        let mut exporter = Exporter::new(queue.clone(), Arc::new(repo), target, options);
        let stats = exporter.export(&changesets);
        (stats, exporter.into_target(), queue, changesets.len())
    }

    fn export(events: Vec<RevisionEvent>) -> (ExportStats, MemoryRepository, WorkQueue) {
        let (stats, target, queue, _) =
            export_with(payloads(), MemoryRepository::new(), ExportOptions::new("$/P"), events);
        (stats, target, queue)
    }

    #[test]
    fn one_commit_per_changeset_with_author_and_date() {
        let a = file("A", "$/P/a.txt");
        let b = file("B", "$/P/dir/b.txt");
        let (stats, target, queue) = export(vec![
            ev(&a, 0, "John Smith", RawActionKind::Create, Some("p1")),
            ev(&b, 10, "John Smith", RawActionKind::Create, Some("p2")),
            ev(&a, 2000, "John Smith", RawActionKind::Checkin, Some("p3")),
        ]);

        assert!(queue.fetch_failures().is_none());
        assert_eq!(stats.commits, 2);
        let commits = target.commits();
        assert_eq!(commits[0].author.email, "john.smith@localhost");
        assert_eq!(commits[0].timestamp, at(0));
        assert_eq!(commits[0].files.len(), 2);
        assert_eq!(commits[1].files["a.txt"], b"three");
        assert_eq!(commits[1].files["dir/b.txt"], b"two");
    }

    #[test]
    fn edit_after_rename_lands_on_renamed_path() {
        let item = file("F", "$/P/new.txt");
        let (_, target, queue) = export(vec![
            RevisionEvent::from_raw(
                &item,
                RawAction::new(1, RawActionKind::Create, at(0), "alice", "")
                    .with_payload("p1")
                    .at_path("$/P/old.txt"),
            ),
            ev(
                &item,
                1000,
                "alice",
                RawActionKind::Rename {
                    previous_path: "$/P/old.txt".into(),
                },
                None,
            ),
            // The reader reports the edit under the stale path.
            RevisionEvent::from_raw(
                &item,
                RawAction::new(2, RawActionKind::Checkin, at(2000), "alice", "")
                    .with_payload("p2")
                    .at_path("$/P/old.txt"),
            ),
        ]);

        assert!(queue.fetch_failures().is_none());
        assert_eq!(target.commits().len(), 3);
        assert_eq!(target.file("new.txt"), Some(&b"two"[..]));
        assert!(target.file("old.txt").is_none());
    }

    #[test]
    fn failed_changeset_is_rolled_back_and_export_continues() {
        let good = file("GOOD", "$/P/good.txt");
        let bad = file("BAD", "$/P/bad.txt");
        let other = file("OTHER", "$/P/other.txt");
        let queue = WorkQueue::new(1);
        let changesets = ChangesetBuilder::build(
            Thresholds::default(),
            vec![
                ev(&good, 0, "alice", RawActionKind::Create, Some("p1")),
                ev(&other, 1000, "bob", RawActionKind::Create, Some("p2")),
                ev(&bad, 1001, "bob", RawActionKind::Create, Some("p2")),
                ev(&good, 2000, "alice", RawActionKind::Checkin, Some("p3")),
            ],
        );
        assert_eq!(changesets.len(), 3);

        let target = MemoryRepository::new().with_failing_path("bad.txt");
        let mut exporter =
            Exporter::new(queue.clone(), Arc::new(payloads()), target, ExportOptions::new("$/P"));
        let stats = exporter.export(&changesets);

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.commits, 2);
        assert!(!exporter.mapping().contains(&other.id));

        let failures = queue.fetch_failures().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, Stage::Export);
        assert_eq!(failures[0].subject, "changeset 2");
        assert!(failures[0].cause.contains("injected failure"));

        let target = exporter.into_target();
        assert!(target.file("other.txt").is_none());
        assert_eq!(target.file("good.txt"), Some(&b"three"[..]));
    }

    #[test]
    fn labels_become_tags_on_current_head() {
        let root = project("ROOT", "$/P");
        let a = file("A", "$/P/a.txt");
        let (stats, target, queue) = export(vec![
            ev(&a, 0, "alice", RawActionKind::Create, Some("p1")),
            ev(
                &root,
                1000,
                "alice",
                RawActionKind::Label {
                    label: "Release 1.0".into(),
                },
                None,
            ),
            ev(&a, 2000, "alice", RawActionKind::Checkin, Some("p2")),
            ev(
                &root,
                3000,
                "alice",
                RawActionKind::Label {
                    label: "Release 1.0".into(),
                },
                None,
            ),
        ]);

        assert!(queue.fetch_failures().is_none());
        assert_eq!(stats.commits, 2);
        assert_eq!(stats.empty, 2);
        assert_eq!(stats.tags, 2);
        assert_eq!(target.tag("Release_1.0"), Some((0, "Release 1.0")));
        assert_eq!(target.tag("Release_1.0-2").map(|t| t.0), Some(1));
    }

    #[test]
    fn label_before_first_commit_is_reported() {
        let root = project("ROOT", "$/P");
        let (stats, _, queue) = export(vec![ev(
            &root,
            0,
            "alice",
            RawActionKind::Label { label: "v0".into() },
            None,
        )]);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.tags, 0);
        let failures = queue.fetch_failures().unwrap();
        assert!(failures[0].cause.contains("creating tag 'v0'"));
    }

    #[test]
    fn branch_points_become_branches() {
        let root = project("ROOT", "$/P");
        let a = file("A", "$/P/a.txt");
        let (stats, target, _) = export(vec![
            ev(&a, 0, "alice", RawActionKind::Create, Some("p1")),
            ev(&root, 1000, "alice", RawActionKind::Branch { name: "maint".into() }, None),
        ]);
        assert_eq!(stats.branches, 1);
        assert_eq!(target.branch("maint"), Some(0));
    }

    #[test]
    fn shared_file_edits_update_every_location() {
        let util = file("U", "$/P/lib/util.h");
        let (_, target, queue) = export(vec![
            ev(&util, 0, "alice", RawActionKind::Create, Some("p1")),
            RevisionEvent::from_raw(
                &util,
                RawAction::new(
                    2,
                    RawActionKind::Share {
                        source_path: "$/P/lib/util.h".into(),
                    },
                    at(1000),
                    "alice",
                    "",
                )
                .at_path("$/P/app/util.h"),
            ),
            ev(&util, 2000, "alice", RawActionKind::Checkin, Some("p2")),
        ]);

        assert!(queue.fetch_failures().is_none());
        assert_eq!(target.commits()[1].files["app/util.h"], b"one");
        assert_eq!(target.file("lib/util.h"), Some(&b"two"[..]));
        assert_eq!(target.file("app/util.h"), Some(&b"two"[..]));
    }

    #[test]
    fn project_rename_and_delete_carry_descendants() {
        let src = project("SRC", "$/P/source");
        let main = file("MAIN", "$/P/source/main.c");
        let (_, target, queue) = export(vec![
            RevisionEvent::from_raw(
                &src,
                RawAction::new(1, RawActionKind::Create, at(0), "alice", "").at_path("$/P/src"),
            ),
            RevisionEvent::from_raw(
                &main,
                RawAction::new(1, RawActionKind::Create, at(1), "alice", "")
                    .with_payload("p1")
                    .at_path("$/P/src/main.c"),
            ),
            ev(
                &src,
                1000,
                "alice",
                RawActionKind::Rename {
                    previous_path: "$/P/src".into(),
                },
                None,
            ),
            ev(&main, 2000, "alice", RawActionKind::Checkin, Some("p2")),
            ev(&src, 3000, "alice", RawActionKind::Delete, None),
        ]);

        assert!(queue.fetch_failures().is_none());
        let commits = target.commits();
        assert_eq!(commits.len(), 4);
        assert_eq!(commits[1].files.keys().collect::<Vec<_>>(), vec!["source/main.c"]);
        assert_eq!(commits[2].files["source/main.c"], b"two");
        assert!(commits[3].files.is_empty());
    }

    #[test]
    fn missing_content_fails_only_that_changeset() {
        let a = file("A", "$/P/a.txt");
        let b = file("B", "$/P/b.txt");
        let (stats, target, queue) = export(vec![
            ev(&a, 0, "alice", RawActionKind::Create, Some("missing")),
            ev(&b, 1000, "alice", RawActionKind::Create, Some("p1")),
        ]);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.commits, 1);
        assert!(queue.fetch_failures().unwrap()[0].cause.contains("reading content missing"));
        assert_eq!(target.files().keys().collect::<Vec<_>>(), vec!["b.txt"]);
    }

    #[test]
    fn parallel_content_reads_match_sequential() {
        let events: Vec<RevisionEvent> = (0..6)
            .map(|i| {
                let item = file(&format!("F{}", i), &format!("$/P/f{}.txt", i));
                ev(&item, i, "alice", RawActionKind::Create, Some(["p1", "p2", "p3"][i as usize % 3]))
            })
            .collect();

        let (_, sequential, _, _) = export_with(
            payloads(),
            MemoryRepository::new(),
            ExportOptions::new("$/P"),
            events.clone(),
        );
        let (_, parallel, queue, _) = export_with(
            payloads(),
            MemoryRepository::new(),
            ExportOptions::new("$/P").with_content_workers(4),
            events,
        );
        assert!(queue.fetch_failures().is_none());
        assert_eq!(sequential.commits(), parallel.commits());
    }
}
