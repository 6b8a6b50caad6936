use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::lookup::NutritionLookup;
use crate::models::{EntryId, FoodEntry};
use crate::store::EntryStore;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum BackfillOutcome {
    /// Missing fields were filled; carries the updated entry.
    Applied(FoodEntry),
    /// The lookup answered but does not know the food.
    Unknown,
    /// The lookup could not answer. The entry keeps its unknown fields and can be retried.
    Unavailable(String),
    /// Cancelled, or the entry was removed before the result arrived.
    Cancelled,
    /// Nothing left to fill.
    AlreadyPopulated,
    Failed(String),
}

struct Task {
    serial: u64,
    token: CancellationToken,
    done: CancellationToken,
}

type TaskMap = Arc<Mutex<HashMap<EntryId, Task>>>;

/// Outcome of one scheduled backfill. Dropping it detaches the task.
#[derive(Debug)]
pub struct BackfillHandle {
    id: EntryId,
    handle: JoinHandle<BackfillOutcome>,
}

impl BackfillHandle {
    #[must_use]
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub async fn outcome(self) -> BackfillOutcome {
        self.handle
            .await
            .unwrap_or_else(|e| BackfillOutcome::Failed(format!("backfill task failed: {e}")))
    }
}

/// Untracks a task when its future completes, panics or is aborted.
struct Finish {
    tasks: TaskMap,
    id: EntryId,
    serial: u64,
    done: CancellationToken,
}

impl Drop for Finish {
    fn drop(&mut self) {
        let mut tasks = self.tasks.lock();
        if tasks.get(&self.id).is_some_and(|t| t.serial == self.serial) {
            tasks.remove(&self.id);
        }
        drop(tasks);
        self.done.cancel();
    }
}

/// Schedules running backfill tasks keyed by entry id.
///
/// A task forgets itself once it finishes; its outcome is only available
/// through the [`BackfillHandle`] returned by [`Backfiller::schedule`].
/// Dropping the backfiller cancels every running task.
pub struct Backfiller {
    store: Arc<EntryStore>,
    lookup: Arc<dyn NutritionLookup>,
    timeout: Duration,
    tasks: TaskMap,
    next_serial: AtomicU64,
}

impl Backfiller {
    pub fn new(store: Arc<EntryStore>, lookup: Arc<dyn NutritionLookup>) -> Self {
        Self {
            store,
            lookup,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_serial: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spawn a backfill for `entry` on the current tokio runtime.
    ///
    /// Returns `None` when nothing was scheduled: the entry is complete, a
    /// task for it is still running, or there is no runtime.
    pub fn schedule(&self, entry: &FoodEntry) -> Option<BackfillHandle> {
        if !entry.needs_nutrition() {
            return None;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(id = %entry.id, "no async runtime, nutrition backfill skipped");
            return None;
        };

        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&entry.id) {
            return None;
        }

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let done = CancellationToken::new();
        let finish = Finish {
            tasks: Arc::clone(&self.tasks),
            id: entry.id,
            serial,
            done: done.clone(),
        };
        let fut = run(
            Arc::clone(&self.store),
            Arc::clone(&self.lookup),
            token.clone(),
            self.timeout,
            entry.id,
        );
        tasks.insert(
            entry.id,
            Task {
                serial,
                token,
                done,
            },
        );
        drop(tasks);
        let handle = runtime.spawn(async move {
            let _finish = finish;
            fut.await
        });

        debug!(id = %entry.id, food = %entry.name, "nutrition backfill scheduled");
        Some(BackfillHandle {
            id: entry.id,
            handle,
        })
    }

    /// Cancel the running task for `id`. Returns whether one was running.
    pub fn cancel(&self, id: EntryId) -> bool {
        match self.tasks.lock().get(&id) {
            Some(task) => {
                task.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for task in self.tasks.lock().values() {
            task.token.cancel();
        }
    }

    /// Wait until every task running now has finished. Returns how many were waited on.
    pub async fn wait_all(&self) -> usize {
        let done: Vec<CancellationToken> =
            self.tasks.lock().values().map(|t| t.done.clone()).collect();
        for token in &done {
            token.cancelled().await;
        }
        done.len()
    }

    /// Number of tasks still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Drop for Backfiller {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn run(
    store: Arc<EntryStore>,
    lookup: Arc<dyn NutritionLookup>,
    token: CancellationToken,
    timeout: Duration,
    id: EntryId,
) -> BackfillOutcome {
    let entry = match store.get_food(id) {
        Ok(entry) => entry,
        Err(Error::NotFound(_)) => return BackfillOutcome::Cancelled,
        Err(e) => return BackfillOutcome::Failed(e.to_string()),
    };
    if !entry.needs_nutrition() {
        return BackfillOutcome::AlreadyPopulated;
    }

    let fetched = tokio::select! {
        () = token.cancelled() => {
            debug!(%id, "nutrition backfill cancelled");
            return BackfillOutcome::Cancelled;
        }
        r = tokio::time::timeout(timeout, lookup.fetch(&entry.name)) => r,
    };
    if token.is_cancelled() {
        return BackfillOutcome::Cancelled;
    }

    let facts = match fetched {
        Err(_) => {
            let reason = format!("lookup timed out after {}ms", timeout.as_millis());
            warn!(%id, food = %entry.name, %reason, "nutrition lookup unavailable");
            return BackfillOutcome::Unavailable(reason);
        }
        Ok(Err(Error::LookupUnavailable(reason))) => {
            warn!(%id, food = %entry.name, %reason, "nutrition lookup unavailable");
            return BackfillOutcome::Unavailable(reason);
        }
        Ok(Err(e)) => return BackfillOutcome::Failed(e.to_string()),
        Ok(Ok(None)) => {
            debug!(%id, food = %entry.name, "no nutrition facts found");
            return BackfillOutcome::Unknown;
        }
        Ok(Ok(Some(facts))) => facts,
    };

    let patch = facts.patch_for(&entry);
    match store.update_food(id, &patch) {
        Ok(updated) if updated == entry => BackfillOutcome::AlreadyPopulated,
        Ok(updated) => {
            debug!(%id, food = %updated.name, source = %facts.source, "nutrition backfilled");
            BackfillOutcome::Applied(updated)
        }
        Err(Error::NotFound(_)) => {
            debug!(%id, "entry removed before backfill applied");
            BackfillOutcome::Cancelled
        }
        Err(e) => {
            warn!(%id, error = %e, "failed to apply backfilled nutrition");
            BackfillOutcome::Failed(e.to_string())
        }
    }
}
