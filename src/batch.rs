//! Batch orchestration.
//!
//! Documents are processed in fixed-size batches. Inside a batch every
//! document's pass runs concurrently on the current task; between batches
//! the orchestrator yields to the scheduler, reports progress, and waits
//! while paused. Batch N+1 never starts before batch N has finished.
//!
//! The in-flight set guarantees that at most one synthesis pass per
//! document is active at any time, across batch runs and single-document
//! triggers alike.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use futures::future::join_all;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::config::MAX_BATCH_SIZE;
use crate::models::{BatchResult, DocumentOutcome};
use crate::progress::{LinkProgressEvent, LinkProgressReporter};

/// Identities of documents with a synthesis pass underway.
#[derive(Default)]
pub struct InFlight {
    ids: Mutex<HashSet<String>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `id`, or `None` when a pass for it is already running.
    /// The claim is released when the guard drops.
    pub fn try_acquire(&self, id: &str) -> Option<InFlightGuard<'_>> {
        if self.lock().insert(id.to_string()) {
            Some(InFlightGuard {
                owner: self,
                id: id.to_string(),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.id);
    }
}

pub struct Orchestrator {
    batch_size: AtomicUsize,
    in_flight: InFlight,
    paused: AtomicBool,
    resumed: Notify,
}

impl Orchestrator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: AtomicUsize::new(batch_size.clamp(1, MAX_BATCH_SIZE)),
            in_flight: InFlight::default(),
            paused: AtomicBool::new(false),
            resumed: Notify::new(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.load(Ordering::SeqCst)
    }

    /// Takes effect at the next run.
    pub fn set_batch_size(&self, size: usize) {
        self.batch_size
            .store(size.clamp(1, MAX_BATCH_SIZE), Ordering::SeqCst);
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Let the current batch finish, then hold before the next one.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resumed.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn wait_while_paused(&self, reporter: &dyn LinkProgressReporter) {
        let mut reported = false;
        loop {
            let resumed = self.resumed.notified();
            if !self.is_paused() {
                return;
            }
            if !reported {
                info!("paused");
                reporter.report(LinkProgressEvent::Paused);
                reported = true;
            }
            resumed.await;
        }
    }

    /// Run `process` over every id, batch by batch.
    ///
    /// A failure in one document never aborts the run. Documents whose id is
    /// already in flight are skipped and counted separately.
    pub async fn run<F, Fut>(
        &self,
        ids: &[String],
        reporter: &dyn LinkProgressReporter,
        mut process: F,
    ) -> BatchResult
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = DocumentOutcome>,
    {
        let size = self.batch_size();
        let total = ids.len();
        let total_batches = total.div_ceil(size);
        let mut result = BatchResult::default();

        for (i, batch) in ids.chunks(size).enumerate() {
            if i > 0 {
                tokio::task::yield_now().await;
            }
            self.wait_while_paused(reporter).await;

            reporter.report(LinkProgressEvent::BatchStarted {
                batch: i + 1,
                total_batches,
                size: batch.len(),
            });
            debug!(batch = i + 1, total_batches, size = batch.len(), "starting batch");

            let passes = batch.iter().map(|id| {
                let guard = self.in_flight.try_acquire(id);
                let pass = guard.as_ref().map(|_| process(id.clone()));
                async move {
                    match (guard, pass) {
                        (Some(_guard), Some(pass)) => pass.await,
                        _ => DocumentOutcome::Skipped,
                    }
                }
            });
            let outcomes = join_all(passes).await;

            for (id, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    DocumentOutcome::Linked { links } => {
                        result.processed += 1;
                        result.links_created += links;
                    }
                    DocumentOutcome::Unchanged => result.processed += 1,
                    DocumentOutcome::Skipped => {
                        debug!("skipped '{}': already in flight", id);
                        result.skipped += 1;
                    }
                    DocumentOutcome::Failed { error } => {
                        debug!("'{}' failed: {}", id, error);
                        result.processed += 1;
                        result.errors += 1;
                    }
                }
            }
            result.batches += 1;

            reporter.report(LinkProgressEvent::BatchFinished {
                done: result.processed + result.skipped,
                total,
                links: result.links_created,
                errors: result.errors,
            });
        }

        info!(
            processed = result.processed,
            links = result.links_created,
            errors = result.errors,
            skipped = result.skipped,
            batches = result.batches,
            "batch run finished"
        );
        reporter.report(LinkProgressEvent::Finished {
            processed: result.processed,
            links: result.links_created,
            errors: result.errors,
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<LinkProgressEvent>>,
    }

    impl LinkProgressReporter for Recorder {
        fn report(&self, event: LinkProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}.md", i)).collect()
    }

    #[test]
    fn guard_releases_on_drop() {
        let set = InFlight::default();
        let guard = set.try_acquire("a").unwrap();
        assert!(set.try_acquire("a").is_none());
        assert!(set.contains("a"));
        drop(guard);
        assert!(set.is_empty());
        assert!(set.try_acquire("a").is_some());
    }

    #[tokio::test]
    async fn splits_into_batches_and_counts_errors() {
        let orch = Orchestrator::new(50);
        let recorder = Recorder::default();
        let result = orch
            .run(&ids(120), &recorder, |id| async move {
                if id.starts_with('7') {
                    DocumentOutcome::Failed {
                        error: "boom".to_string(),
                    }
                } else {
                    DocumentOutcome::Linked { links: 1 }
                }
            })
            .await;

        assert_eq!(result.batches, 3);
        assert_eq!(result.processed, 120);
        assert!(result.errors > 0);
        assert_eq!(result.links_created + result.errors, 120);

        let sizes: Vec<usize> = recorder
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                LinkProgressEvent::BatchStarted { size, .. } => Some(*size),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![50, 50, 20]);
    }

    #[tokio::test]
    async fn batches_never_overlap() {
        let orch = Orchestrator::new(10);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let batches_seen = Arc::new(Mutex::new(Vec::new()));

        let result = orch
            .run(&ids(30), &crate::progress::NoProgress, |id| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                let batches_seen = Arc::clone(&batches_seen);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    batches_seen.lock().unwrap().push(id);
                    active.fetch_sub(1, Ordering::SeqCst);
                    DocumentOutcome::Unchanged
                }
            })
            .await;

        assert_eq!(result.processed, 30);
        assert!(peak.load(Ordering::SeqCst) <= 10);
        let seen = batches_seen.lock().unwrap();
        let first_ten: HashSet<&String> = seen[..10].iter().collect();
        let expected: Vec<String> = ids(10);
        assert!(expected.iter().all(|id| first_ten.contains(id)));
    }

    #[tokio::test]
    async fn in_flight_ids_are_skipped() {
        let orch = Orchestrator::new(5);
        let _held = orch.in_flight().try_acquire("1.md").unwrap();
        let calls = AtomicUsize::new(0);
        let result = orch
            .run(&ids(3), &crate::progress::NoProgress, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DocumentOutcome::Unchanged }
            })
            .await;
        assert_eq!(result.skipped, 1);
        assert_eq!(result.processed, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_input_runs_no_batches() {
        let orch = Orchestrator::new(5);
        let result = orch
            .run(&[], &crate::progress::NoProgress, |_| async {
                DocumentOutcome::Unchanged
            })
            .await;
        assert_eq!(result, BatchResult::default());
    }

    #[tokio::test]
    async fn pause_holds_until_resume() {
        let orch = Arc::new(Orchestrator::new(2));
        let done = Arc::new(AtomicUsize::new(0));
        orch.pause();

        let task = {
            let orch = Arc::clone(&orch);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                orch.run(&ids(4), &crate::progress::NoProgress, move |_| {
                    let done = Arc::clone(&done);
                    async move {
                        done.fetch_add(1, Ordering::SeqCst);
                        DocumentOutcome::Unchanged
                    }
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(done.load(Ordering::SeqCst), 0);

        orch.resume();
        let result = task.await.unwrap();
        assert_eq!(result.processed, 4);
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn batch_size_is_clamped() {
        assert_eq!(Orchestrator::new(0).batch_size(), 1);
        let orch = Orchestrator::new(10_000);
        assert_eq!(orch.batch_size(), MAX_BATCH_SIZE);
        orch.set_batch_size(7);
        assert_eq!(orch.batch_size(), 7);
    }
}
