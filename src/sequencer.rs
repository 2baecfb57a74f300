//! Model status sequencer — one ordered, cancellable sweep at a time.
//!
//! A sweep walks the catalog in declaration order and probes one model
//! at a time, writing each outcome into the shared `SweepState` as it
//! lands. Every trigger (new key, refresh) mints a fresh `SweepRun`; a run
//! may only write while it is still the current one. The check and the
//! write happen under the same lock, so a slow probe from a superseded
//! run can never overwrite a newer sweep's results.
//!
//! Cancellation is cooperative: an in-flight probe is never aborted, its
//! result is just dropped and the loop stops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::credential::ApiKey;
use crate::probe::{ModelProbe, ProbeOutcome};

// ── Sweep State ─────────────────────────────────────────────────────

/// Generation token for one sweep attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SweepRun(u64);

impl SweepRun {
    pub fn number(&self) -> u64 {
        self.0
    }
}

/// Status of one model within the current sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEntry {
    Pending,
    Done(ProbeOutcome),
}

impl SweepEntry {
    pub fn outcome(&self) -> Option<&ProbeOutcome> {
        match self {
            SweepEntry::Pending => None,
            SweepEntry::Done(o) => Some(o),
        }
    }
}

impl Serialize for SweepEntry {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            SweepEntry::Pending => s.serialize_str("pending"),
            SweepEntry::Done(o) => o.serialize(s),
        }
    }
}

/// Model id → status for the current sweep. Empty means "no key".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SweepState {
    entries: HashMap<&'static str, SweepEntry>,
}

impl SweepState {
    fn all_pending(catalog: Catalog) -> Self {
        Self {
            entries: catalog.iter().map(|m| (m.id, SweepEntry::Pending)).collect(),
        }
    }

    fn record(&mut self, model_id: &'static str, outcome: ProbeOutcome) {
        self.entries.insert(model_id, SweepEntry::Done(outcome));
    }

    pub fn get(&self, model_id: &str) -> Option<&SweepEntry> {
        self.entries.get(model_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries no longer pending.
    pub fn completed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| !matches!(e, SweepEntry::Pending))
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.len() - self.completed_count()
    }

    pub fn working_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.outcome().is_some_and(ProbeOutcome::is_working))
            .count()
    }

    /// A sweep has started and has not resolved every model yet.
    pub fn is_checking(&self) -> bool {
        !self.is_empty() && self.pending_count() > 0
    }
}

impl FromIterator<(&'static str, SweepEntry)> for SweepState {
    fn from_iter<I: IntoIterator<Item = (&'static str, SweepEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ── Sequencer ───────────────────────────────────────────────────────

/// How a sweep task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepEnd {
    /// Every catalog model has an outcome.
    Completed,
    /// A newer trigger or a cancel took over before the end.
    Superseded,
}

/// Handle on a spawned sweep. Dropping it detaches the task.
#[derive(Debug)]
pub struct SweepHandle {
    pub run: SweepRun,
    task: JoinHandle<SweepEnd>,
}

impl SweepHandle {
    /// Wait for the sweep task to finish.
    pub async fn join(self) -> SweepEnd {
        // A panicked task can no longer write, which is what superseded means
        self.task.await.unwrap_or(SweepEnd::Superseded)
    }
}

struct Shared {
    current: SweepRun,
    state: SweepState,
    key: Option<ApiKey>,
}

pub struct Sequencer {
    catalog: Catalog,
    probe: Arc<ModelProbe>,
    shared: Arc<Mutex<Shared>>,
    changes: Arc<watch::Sender<u64>>,
}

impl Sequencer {
    pub fn new(catalog: Catalog, probe: Arc<ModelProbe>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            catalog,
            probe,
            shared: Arc::new(Mutex::new(Shared {
                current: SweepRun(0),
                state: SweepState::default(),
                key: None,
            })),
            changes: Arc::new(changes),
        }
    }

    /// A key became available, changed, or went away.
    ///
    /// Always supersedes the current run. With a usable key the state
    /// resets to all-pending and a new sweep starts; without one the state
    /// is cleared to empty and nothing is probed.
    pub fn set_key(&self, key: Option<ApiKey>) -> Option<SweepHandle> {
        let mut shared = self.lock();
        shared.current = SweepRun(shared.current.0 + 1);
        shared.key = key.filter(|k| crate::credential::is_plausible(k.expose()));

        let Some(key) = shared.key.clone() else {
            shared.state = SweepState::default();
            drop(shared);
            self.notify();
            debug!("key cleared, sweep state emptied");
            return None;
        };

        Some(self.begin(shared, key))
    }

    /// Re-run the sweep with the current key. `None` when no key is set.
    pub fn refresh(&self) -> Option<SweepHandle> {
        let mut shared = self.lock();
        let key = shared.key.clone()?;
        shared.current = SweepRun(shared.current.0 + 1);
        Some(self.begin(shared, key))
    }

    /// Supersede the current run without touching the state, e.g. when
    /// the consumer goes away.
    pub fn cancel(&self) {
        let mut shared = self.lock();
        shared.current = SweepRun(shared.current.0 + 1);
    }

    pub fn snapshot(&self) -> SweepState {
        self.lock().state.clone()
    }

    pub fn current_run(&self) -> SweepRun {
        self.lock().current
    }

    pub fn has_key(&self) -> bool {
        self.lock().key.is_some()
    }

    /// The key the current sweep runs with, for on-demand probes.
    pub fn key(&self) -> Option<ApiKey> {
        self.lock().key.clone()
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog
    }

    /// Change counter bumped after every state mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn begin(&self, mut shared: MutexGuard<'_, Shared>, key: ApiKey) -> SweepHandle {
        let run = shared.current;
        shared.state = SweepState::all_pending(self.catalog);
        drop(shared);
        self.notify();

        info!(run = run.0, models = self.catalog.len(), "🔍 Sweep started");
        let task = tokio::spawn(run_sweep(
            self.catalog,
            Arc::clone(&self.probe),
            Arc::clone(&self.shared),
            Arc::clone(&self.changes),
            run,
            key,
        ));
        SweepHandle { run, task }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }

    fn notify(&self) {
        self.changes.send_modify(|v| *v += 1);
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The sweep loop. Runs on its own task; one probe in flight at a time.
async fn run_sweep(
    catalog: Catalog,
    probe: Arc<ModelProbe>,
    shared: Arc<Mutex<Shared>>,
    changes: Arc<watch::Sender<u64>>,
    run: SweepRun,
    key: ApiKey,
) -> SweepEnd {
    for model in catalog {
        if lock_shared(&shared).current != run {
            debug!(run = run.0, "sweep superseded before next probe");
            return SweepEnd::Superseded;
        }

        let outcome = probe.probe(key.expose(), model.id).await;

        {
            let mut guard = lock_shared(&shared);
            if guard.current != run {
                debug!(run = run.0, model_id = model.id, "dropping stale probe result");
                return SweepEnd::Superseded;
            }
            guard.state.record(model.id, outcome);
        }
        changes.send_modify(|v| *v += 1);
    }

    let state = lock_shared(&shared).state.clone();
    info!(
        run = run.0,
        total = state.len(),
        working = state.working_count(),
        "🔍 Sweep complete"
    );
    SweepEnd::Completed
}
