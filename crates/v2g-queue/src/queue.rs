// queue.rs: Bounded worker pool with an idle barrier.
//
// Workers are spawned on demand up to `max_workers` and exit as soon as
// the pending list is empty. A task may submit further tasks; those count
// as pending before the submitting task is marked finished, so the idle
// condition (`pending` empty and `active == 0`) can never be observed while
// a resubmission is in flight.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use crate::failure::{Stage, TaskFailure};

type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

struct Task {
    stage: Stage,
    subject: String,
    job: Job,
}

#[derive(Default)]
struct State {
    pending: VecDeque<Task>,
    /// Tasks currently executing.
    active: usize,
    /// Live worker threads.
    workers: usize,
    completed: usize,
    failures: Vec<TaskFailure>,
}

impl State {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active == 0
    }
}

struct Shared {
    name: String,
    max_workers: usize,
    state: Mutex<State>,
    idle: Condvar,
}

impl Shared {
    /// Lock state with poison recovery.
    ///
    /// Jobs run outside the lock and panics are caught, so poisoning can only
    /// come from a bug in this module. Keep going rather than cascade.
    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }
}

/// Bounded-concurrency task runner shared by every pipeline stage.
///
/// Cloning a `WorkQueue` yields another handle to the same pool, which is how
/// running tasks submit follow-up work.
///
/// With `max_workers == 1` tasks run strictly one at a time in submission
/// order.
#[derive(Clone)]
pub struct WorkQueue {
    shared: Arc<Shared>,
}

impl WorkQueue {
    /// Create a queue running at most `max_workers` tasks at once.
    ///
    /// A limit of zero is treated as one.
    pub fn new(max_workers: usize) -> Self {
        Self::named("work", max_workers)
    }

    /// Create a queue whose worker threads are named `<name>-worker`.
    pub fn named(name: impl Into<String>, max_workers: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                max_workers: max_workers.max(1),
                state: Mutex::new(State::default()),
                idle: Condvar::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    /// Enqueue a unit of work.
    ///
    /// `subject` identifies the item or changeset the task is about; it is
    /// what a failure report will name.
    pub fn submit<F>(&self, stage: Stage, subject: impl Into<String>, job: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let spawn = {
            let mut state = self.shared.lock();
            state.pending.push_back(Task {
                stage,
                subject: subject.into(),
                job: Box::new(job),
            });
            if state.workers < self.shared.max_workers {
                state.workers += 1;
                true
            } else {
                false
            }
        };

        if spawn {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-worker", self.shared.name))
                .spawn(move || worker_loop(shared));
            if let Err(e) = spawned {
                // Drain on the submitting thread instead of stranding the task.
                tracing::warn!("{}: failed to spawn worker, running inline: {}", self.name(), e);
                worker_loop(Arc::clone(&self.shared));
            }
        }
    }

    /// Block until every submitted task, including tasks submitted by running
    /// tasks, has finished.
    ///
    /// Must not be called from inside a task of the same queue.
    pub fn wait_idle(&self) {
        let mut state = self.shared.lock();
        while !state.is_idle() {
            state = match self.shared.idle.wait(state) {
                Ok(guard) => guard,
                Err(poison) => poison.into_inner(),
            };
        }
    }

    /// Failures recorded so far, or `None` if there are none.
    ///
    /// Does not block and does not clear the list.
    pub fn fetch_failures(&self) -> Option<Vec<TaskFailure>> {
        let state = self.shared.lock();
        if state.failures.is_empty() {
            None
        } else {
            Some(state.failures.clone())
        }
    }

    /// Record a failure observed outside a task body (for example one
    /// changeset failing inside a long-running export task).
    pub fn record_failure(&self, failure: TaskFailure) {
        tracing::warn!("{}", failure);
        self.shared.lock().failures.push(failure);
    }

    /// Number of tasks that finished without error.
    pub fn completed(&self) -> usize {
        self.shared.lock().completed
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut state = shared.lock();
            match state.pending.pop_front() {
                Some(task) => {
                    state.active += 1;
                    task
                }
                None => {
                    state.workers -= 1;
                    return;
                }
            }
        };

        let Task {
            stage,
            subject,
            job,
        } = task;

        let failure = match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(TaskFailure::from_error(stage, subject, &e)),
            Err(payload) => Some(TaskFailure::new(
                stage,
                subject,
                format!("task panicked: {}", panic_message(payload.as_ref())),
            )),
        };

        if let Some(failure) = &failure {
            tracing::warn!("{}", failure);
        }

        let mut state = shared.lock();
        state.active -= 1;
        match failure {
            Some(failure) => state.failures.push(failure),
            None => state.completed += 1,
        }
        if state.is_idle() {
            shared.idle.notify_all();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn failing_subset_is_reported_and_others_complete() {
        let queue = WorkQueue::new(4);
        let done = Arc::new(Mutex::new(Vec::new()));
        let failing = [2usize, 5, 11];

        for i in 0..16usize {
            let done = Arc::clone(&done);
            queue.submit(Stage::Collect, format!("item-{}", i), move || {
                if failing.contains(&i) {
                    anyhow::bail!("item {} unreadable", i);
                }
                done.lock().unwrap().push(i);
                Ok(())
            });
        }
        queue.wait_idle();

        let failures = queue.fetch_failures().unwrap();
        assert_eq!(failures.len(), failing.len());
        let mut subjects: Vec<_> = failures.iter().map(|f| f.subject.clone()).collect();
        subjects.sort();
        assert_eq!(subjects, vec!["item-11", "item-2", "item-5"]);

        let mut done = done.lock().unwrap().clone();
        done.sort();
        let expected: Vec<usize> = (0..16).filter(|i| !failing.contains(i)).collect();
        assert_eq!(done, expected);
        assert_eq!(queue.completed(), expected.len());
    }

    #[test]
    fn no_failures_yields_none() {
        let queue = WorkQueue::new(2);
        for _ in 0..4 {
            queue.submit(Stage::Export, "ok", || Ok(()));
        }
        queue.wait_idle();
        assert!(queue.fetch_failures().is_none());
    }

    #[test]
    fn wait_idle_on_empty_queue_returns() {
        let queue = WorkQueue::new(3);
        queue.wait_idle();
        assert_eq!(queue.completed(), 0);
    }

    #[test]
    fn transitive_submissions_are_awaited() {
        let queue = WorkQueue::new(3);
        let counter = Arc::new(AtomicUsize::new(0));

        fn fan_out(queue: WorkQueue, counter: Arc<AtomicUsize>, depth: usize) {
            let inner = queue.clone();
            queue.submit(Stage::Collect, format!("depth-{}", depth), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                if depth > 0 {
                    fan_out(inner.clone(), Arc::clone(&counter), depth - 1);
                    fan_out(inner, Arc::clone(&counter), depth - 1);
                }
                Ok(())
            });
        }

        fan_out(queue.clone(), Arc::clone(&counter), 4);
        queue.wait_idle();
        // A full binary tree of depth 4 has 31 nodes.
        assert_eq!(counter.load(Ordering::SeqCst), 31);
    }

    #[test]
    fn single_worker_runs_in_submission_order() {
        let queue = WorkQueue::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let order = Arc::clone(&order);
            queue.submit(Stage::Export, format!("changeset {}", i), move || {
                order.lock().unwrap().push(i);
                Ok(())
            });
        }
        queue.wait_idle();
        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn panic_is_captured_and_pool_survives() {
        let queue = WorkQueue::new(1);
        queue.submit(Stage::Collect, "boom", || panic!("corrupt record"));
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        queue.submit(Stage::Collect, "after", move || {
            ran2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        queue.wait_idle();

        let failures = queue.fetch_failures().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subject, "boom");
        assert!(failures[0].cause.contains("corrupt record"));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fetch_does_not_clear_and_record_appends() {
        let queue = WorkQueue::new(1);
        queue.submit(Stage::Collect, "a", || anyhow::bail!("bad"));
        queue.wait_idle();
        queue.record_failure(TaskFailure::new(Stage::Export, "changeset 1", "commit failed"));

        assert_eq!(queue.fetch_failures().unwrap().len(), 2);
        assert_eq!(queue.fetch_failures().unwrap().len(), 2);
    }

    #[test]
    fn queue_is_reusable_after_idle() {
        let queue = WorkQueue::new(2);
        queue.submit(Stage::Collect, "first", || Ok(()));
        queue.wait_idle();
        queue.submit(Stage::Collect, "second", || Ok(()));
        queue.wait_idle();
        assert_eq!(queue.completed(), 2);
    }

    #[test]
    fn zero_workers_is_clamped() {
        let queue = WorkQueue::named("collect", 0);
        assert_eq!(queue.max_workers(), 1);
        assert_eq!(queue.name(), "collect");
    }
}
