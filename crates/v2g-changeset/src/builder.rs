// builder.rs: Clusters the ordered event stream into changesets.
//
// Events arrive in global stream order. Each user has at most one open
// changeset. An event joins its user's open changeset when, measured from
// the open changeset's last member:
//   - the gap is within `any_comment`, or
//   - the comments are identical and the gap is within `same_comment`,
// and the event does not touch an item that the open changeset, or any
// changeset opened after it, already changed. Otherwise the open changeset
// is sealed and a new one starts. Sealed changesets are never reopened.
//
// Changesets are replayed in the order they were opened, so the second
// condition keeps every item's revisions replaying in stream order even
// when another user changed the item in between.
//
// Events of different users never share a changeset. Events with identical
// timestamps are processed in stream order.

use std::collections::{HashMap, HashSet};

use chrono::Duration;
use v2g_history::{ItemId, RevisionEvent};

use crate::changeset::{Changeset, ChangesetId};

/// Clustering windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Maximum gap between consecutive events of one user, whatever their
    /// comments.
    pub any_comment: Duration,

    /// Maximum gap between consecutive events of one user carrying the
    /// exact same comment.
    pub same_comment: Duration,
}

impl Thresholds {
    pub fn new(any_comment: Duration, same_comment: Duration) -> Self {
        Self {
            any_comment,
            same_comment,
        }
    }

    /// Windows from whole seconds, or `None` when a value does not fit in
    /// a `Duration`.
    pub fn try_from_secs(any_comment: i64, same_comment: i64) -> Option<Self> {
        Some(Self::new(
            Duration::try_seconds(any_comment)?,
            Duration::try_seconds(same_comment)?,
        ))
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(Duration::seconds(30), Duration::seconds(600))
    }
}

/// Summary of a clustering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub events: usize,
    pub changesets: usize,
    /// Member count of the largest changeset.
    pub largest: usize,
}

impl BuildStats {
    pub fn of(changesets: &[Changeset]) -> Self {
        Self {
            events: changesets.iter().map(Changeset::len).sum(),
            changesets: changesets.len(),
            largest: changesets.iter().map(Changeset::len).max().unwrap_or(0),
        }
    }
}

struct OpenChangeset {
    /// Order in which the changeset was opened; breaks timestamp ties.
    seq: u64,
    members: Vec<RevisionEvent>,
    /// Items whose file tree state this changeset already changes.
    items: HashSet<ItemId>,
}

impl OpenChangeset {
    fn new(seq: u64, event: RevisionEvent) -> Self {
        let mut open = Self {
            seq,
            members: Vec::new(),
            items: HashSet::new(),
        };
        open.push(event);
        open
    }

    fn push(&mut self, event: RevisionEvent) {
        if event.action.touches_tree() {
            self.items.insert(event.item_id.clone());
        }
        self.members.push(event);
    }

    fn within_window(&self, event: &RevisionEvent, thresholds: &Thresholds) -> bool {
        let Some(last) = self.members.last() else {
            return false;
        };
        let gap = event.timestamp - last.timestamp;
        gap <= thresholds.any_comment
            || (event.comment == last.comment && gap <= thresholds.same_comment)
    }

    fn repeats_item(&self, event: &RevisionEvent) -> bool {
        event.action.touches_tree() && self.items.contains(&event.item_id)
    }
}

enum Step {
    Open,
    Append,
    SealAndOpen,
}

/// Incremental changeset builder.
///
/// Feed events with [`push`](Self::push) in stream order, then call
/// [`finish`](Self::finish). The output is a pure function of the stream
/// and the thresholds.
pub struct ChangesetBuilder {
    thresholds: Thresholds,
    /// Open changeset per user.
    open: HashMap<String, OpenChangeset>,
    sealed: Vec<OpenChangeset>,
    /// Open order of the latest changeset that changed each item.
    last_changed_in: HashMap<ItemId, u64>,
    next_seq: u64,
}

impl ChangesetBuilder {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            open: HashMap::new(),
            sealed: Vec::new(),
            last_changed_in: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Cluster a complete, stream-ordered event sequence.
    pub fn build(
        thresholds: Thresholds,
        events: impl IntoIterator<Item = RevisionEvent>,
    ) -> Vec<Changeset> {
        let mut builder = Self::new(thresholds);
        for event in events {
            builder.push(event);
        }
        builder.finish()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Add the next event of the stream.
    pub fn push(&mut self, event: RevisionEvent) {
        let step = match self.open.get(&event.user) {
            None => Step::Open,
            Some(open) if open.repeats_item(&event) => {
                tracing::debug!(
                    "sealing changeset of {}: {} changed again",
                    event.user,
                    event.path
                );
                Step::SealAndOpen
            }
            Some(open) if self.changed_after(open, &event) => {
                tracing::debug!(
                    "sealing changeset of {}: {} changed by a later changeset",
                    event.user,
                    event.path
                );
                Step::SealAndOpen
            }
            Some(open) if open.within_window(&event, &self.thresholds) => Step::Append,
            Some(_) => Step::SealAndOpen,
        };

        match step {
            Step::Append => {
                if let Some(open) = self.open.get_mut(&event.user) {
                    if event.action.touches_tree() {
                        self.last_changed_in.insert(event.item_id.clone(), open.seq);
                    }
                    open.push(event);
                }
            }
            Step::SealAndOpen => {
                if let Some(closed) = self.open.remove(&event.user) {
                    self.sealed.push(closed);
                }
                self.open_for(event);
            }
            Step::Open => self.open_for(event),
        }
    }

    /// Whether a changeset opened after `open` already changed the item.
    fn changed_after(&self, open: &OpenChangeset, event: &RevisionEvent) -> bool {
        event.action.touches_tree()
            && self
                .last_changed_in
                .get(&event.item_id)
                .is_some_and(|&seq| seq > open.seq)
    }

    fn open_for(&mut self, event: RevisionEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if event.action.touches_tree() {
            self.last_changed_in.insert(event.item_id.clone(), seq);
        }
        self.open
            .insert(event.user.clone(), OpenChangeset::new(seq, event));
    }

    /// Seal every open changeset and return all changesets ordered by
    /// timestamp, numbered from 1.
    pub fn finish(mut self) -> Vec<Changeset> {
        self.sealed.extend(self.open.drain().map(|(_, open)| open));
        self.sealed
            .sort_by_key(|open| (open.members[0].timestamp, open.seq));

        let changesets: Vec<Changeset> = self
            .sealed
            .into_iter()
            .zip(1u64..)
            .map(|(open, n)| Changeset::seal(ChangesetId(n), open.members))
            .collect();

        let stats = BuildStats::of(&changesets);
        tracing::info!(
            "built {} changesets from {} revisions (largest {})",
            stats.changesets,
            stats.events,
            stats.largest
        );
        changesets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use v2g_history::{Item, ItemKind, RawAction, RawActionKind};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_236_000_000 + secs, 0).unwrap()
    }

    fn edit(user: &str, file: &str, secs: i64, comment: &str) -> RevisionEvent {
        let item = Item::new(file, ItemKind::File, format!("$/Project/{}", file));
        RevisionEvent::from_raw(
            &item,
            RawAction::new(1, RawActionKind::Checkin, at(secs), user, comment),
        )
    }

    fn thresholds(any: i64, same: i64) -> Thresholds {
        Thresholds::try_from_secs(any, same).unwrap()
    }

    fn sizes(changesets: &[Changeset]) -> Vec<usize> {
        changesets.iter().map(Changeset::len).collect()
    }

    #[test]
    fn close_events_merge_regardless_of_comment() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("alice", "A", 0, "fix"), edit("alice", "B", 20, "fix")],
        );
        assert_eq!(sizes(&out), vec![2]);

        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("alice", "A", 0, "fix"), edit("alice", "B", 20, "other")],
        );
        assert_eq!(sizes(&out), vec![2]);
    }

    #[test]
    fn same_comment_extends_the_window() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![
                edit("alice", "A", 0, "batch"),
                edit("alice", "B", 400, "batch"),
            ],
        );
        assert_eq!(sizes(&out), vec![2]);
        assert_eq!(out[0].comment, "batch");
    }

    #[test]
    fn different_users_never_merge() {
        let out = ChangesetBuilder::build(
            thresholds(3600, 3600),
            vec![edit("bob", "C", 0, "x"), edit("alice", "D", 1, "x")],
        );
        assert_eq!(sizes(&out), vec![1, 1]);
        assert_eq!(out[0].user, "bob");
        assert_eq!(out[1].user, "alice");
    }

    #[test]
    fn any_comment_boundary_is_inclusive() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("alice", "A", 0, "one"), edit("alice", "B", 30, "two")],
        );
        assert_eq!(sizes(&out), vec![2]);

        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("alice", "A", 0, "one"), edit("alice", "B", 31, "two")],
        );
        assert_eq!(sizes(&out), vec![1, 1]);
    }

    #[test]
    fn same_comment_boundary_is_inclusive() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("alice", "A", 0, "same"), edit("alice", "B", 600, "same")],
        );
        assert_eq!(sizes(&out), vec![2]);

        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("alice", "A", 0, "same"), edit("alice", "B", 601, "same")],
        );
        assert_eq!(sizes(&out), vec![1, 1]);
    }

    #[test]
    fn comment_comparison_is_exact() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("alice", "A", 0, "Batch"), edit("alice", "B", 100, "batch")],
        );
        assert_eq!(sizes(&out), vec![1, 1]);
    }

    #[test]
    fn gap_is_measured_from_last_member() {
        // 0 -> 25 -> 50 -> 75: every step within 30s, total span 75s.
        let out = ChangesetBuilder::build(
            thresholds(30, 30),
            (0..4).map(|i| edit("alice", &format!("F{}", i), i * 25, &format!("c{}", i))),
        );
        assert_eq!(sizes(&out), vec![4]);
    }

    #[test]
    fn sealed_changesets_are_never_reopened() {
        let out = ChangesetBuilder::build(
            thresholds(30, 30),
            vec![
                edit("alice", "A", 0, "a"),
                edit("alice", "B", 100, "b"),
                edit("alice", "C", 110, "c"),
            ],
        );
        assert_eq!(sizes(&out), vec![1, 2]);
        assert_eq!(out[1].members[0].item_id.as_str(), "B");
    }

    #[test]
    fn interleaved_users_keep_separate_open_changesets() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![
                edit("alice", "A", 0, "a"),
                edit("bob", "B", 5, "b"),
                edit("alice", "C", 10, "c"),
                edit("bob", "D", 12, "d"),
            ],
        );
        assert_eq!(sizes(&out), vec![2, 2]);
        assert_eq!(out[0].user, "alice");
        assert_eq!(out[1].user, "bob");
    }

    #[test]
    fn repeated_item_starts_a_new_changeset() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![
                edit("alice", "A", 0, "x"),
                edit("alice", "B", 2, "x"),
                edit("alice", "A", 4, "x"),
            ],
        );
        assert_eq!(sizes(&out), vec![2, 1]);
    }

    #[test]
    fn labels_do_not_count_as_repeated_items() {
        let item = Item::new("A", ItemKind::File, "$/Project/A");
        let label = RevisionEvent::from_raw(
            &item,
            RawAction::new(
                2,
                RawActionKind::Label {
                    label: "v1".into(),
                },
                at(5),
                "alice",
                "",
            ),
        );
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("alice", "A", 0, "x"), label],
        );
        assert_eq!(sizes(&out), vec![2]);
    }

    #[test]
    fn item_changed_by_another_user_is_not_pulled_back() {
        // bob's B@10 sits between alice's A@0 and B@25. Joining B@25 to the
        // changeset opened at 0 would replay it before bob's edit.
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![
                edit("carol", "B", -5000, "add"),
                edit("alice", "A", 0, "x"),
                edit("bob", "B", 10, "y"),
                edit("alice", "B", 25, "x"),
            ],
        );
        let order: Vec<(&str, Vec<&str>)> = out
            .iter()
            .map(|cs| {
                let items = cs.members.iter().map(|m| m.item_id.as_str()).collect();
                (cs.user.as_str(), items)
            })
            .collect();
        assert_eq!(
            order,
            vec![
                ("carol", vec!["B"]),
                ("alice", vec!["A"]),
                ("bob", vec!["B"]),
                ("alice", vec!["B"]),
            ]
        );
    }

    #[test]
    fn item_changed_in_a_sealed_later_changeset_is_not_pulled_back() {
        // bob's changeset holding B is already sealed when alice, still
        // inside her same-comment window, edits B.
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![
                edit("alice", "A", 0, "x"),
                edit("bob", "B", 10, "y"),
                edit("bob", "C", 100, "z"),
                edit("alice", "B", 200, "x"),
            ],
        );
        assert_eq!(sizes(&out), vec![1, 1, 1, 1]);
        assert_eq!(out[3].user, "alice");
        assert_eq!(out[3].members[0].item_id.as_str(), "B");
    }

    #[test]
    fn unrelated_items_still_join_across_other_users() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![
                edit("alice", "A", 0, "x"),
                edit("bob", "B", 10, "y"),
                edit("alice", "C", 25, "x"),
            ],
        );
        assert_eq!(sizes(&out), vec![2, 1]);
    }

    #[test]
    fn thresholds_reject_values_beyond_duration_range() {
        assert!(Thresholds::try_from_secs(i64::MAX, 600).is_none());
        assert!(Thresholds::try_from_secs(30, 10_000_000_000_000_000).is_none());
        assert_eq!(Thresholds::try_from_secs(30, 600), Some(Thresholds::default()));
    }

    #[test]
    fn same_timestamp_users_follow_stream_order() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![edit("zed", "A", 0, "x"), edit("amy", "B", 0, "x")],
        );
        assert_eq!(out[0].user, "zed");
        assert_eq!(out[1].user, "amy");
    }

    #[test]
    fn ids_are_sequential_and_timestamps_non_decreasing() {
        let events = pseudo_random_stream(300);
        let out = ChangesetBuilder::build(thresholds(30, 120), events);
        for (i, cs) in out.iter().enumerate() {
            assert_eq!(cs.id, ChangesetId(i as u64 + 1));
        }
        assert!(out.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn membership_partitions_the_input() {
        let events = pseudo_random_stream(500);
        let out = ChangesetBuilder::build(thresholds(30, 120), events.clone());

        let mut seen: Vec<(String, u32, i64)> = out
            .iter()
            .flat_map(|cs| cs.members.iter())
            .map(|e| (e.item_id.to_string(), e.version, e.timestamp.timestamp()))
            .collect();
        let mut expected: Vec<(String, u32, i64)> = events
            .iter()
            .map(|e| (e.item_id.to_string(), e.version, e.timestamp.timestamp()))
            .collect();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn item_revisions_replay_in_version_order() {
        let out = ChangesetBuilder::build(thresholds(30, 600), pseudo_random_stream(500));
        let mut last: HashMap<&str, u32> = HashMap::new();
        for event in out.iter().flat_map(|cs| cs.members.iter()) {
            let previous = last.insert(event.item_id.as_str(), event.version);
            assert!(
                previous.map_or(true, |v| v < event.version),
                "{} v{} replayed after v{:?}",
                event.item_id,
                event.version,
                previous
            );
        }
    }

    #[test]
    fn members_share_one_user() {
        let out = ChangesetBuilder::build(thresholds(30, 120), pseudo_random_stream(400));
        for cs in &out {
            assert!(cs.members.iter().all(|m| m.user == cs.user));
        }
    }

    #[test]
    fn clustering_is_deterministic() {
        let events = pseudo_random_stream(400);
        let first = ChangesetBuilder::build(thresholds(30, 120), events.clone());
        let second = ChangesetBuilder::build(thresholds(30, 120), events);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let builder = ChangesetBuilder::new(Thresholds::default());
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn stats_summarize_output() {
        let out = ChangesetBuilder::build(
            thresholds(30, 600),
            vec![
                edit("alice", "A", 0, "x"),
                edit("alice", "B", 1, "x"),
                edit("bob", "C", 2, "y"),
            ],
        );
        assert_eq!(
            BuildStats::of(&out),
            BuildStats {
                events: 3,
                changesets: 2,
                largest: 2
            }
        );
    }

    /// A deterministic stream: three users, twenty files, gaps of 0..90s,
    /// a handful of repeated comments.
    fn pseudo_random_stream(n: usize) -> Vec<RevisionEvent> {
        let users = ["alice", "bob", "carol"];
        let comments = ["", "fix", "batch import", "refactor"];
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        let mut secs = 0i64;
        let mut versions: HashMap<String, u32> = HashMap::new();
        (0..n)
            .map(|_| {
                secs += (next() % 90) as i64;
                let user = users[(next() % 3) as usize];
                let file = format!("F{}", next() % 20);
                let comment = comments[(next() % 4) as usize];
                let version = versions.entry(file.clone()).or_insert(0);
                *version += 1;
                let item = Item::new(file.as_str(), ItemKind::File, format!("$/Project/{}", file));
                RevisionEvent::from_raw(
                    &item,
                    RawAction::new(*version, RawActionKind::Checkin, at(secs), user, comment),
                )
            })
            .collect()
    }
}
