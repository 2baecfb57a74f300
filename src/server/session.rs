//! Dashboard sessions — one sequencer and one detail dialog per browser tab.
//!
//! In memory only. Keys live inside each session's sequencer and vanish
//! with it; nothing is written to disk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::ModelDescriptor;
use crate::display::DetailDialog;
use crate::sequencer::Sequencer;

pub struct Session {
    pub id: Uuid,
    pub sequencer: Sequencer,
    pub created_at: DateTime<Utc>,
    dialog: Mutex<Option<DetailDialog>>,
    dialogs_opened: AtomicU64,
    last_seen: Mutex<DateTime<Utc>>,
}

impl Session {
    fn new(sequencer: Sequencer) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sequencer,
            created_at: now,
            dialog: Mutex::new(None),
            dialogs_opened: AtomicU64::new(0),
            last_seen: Mutex::new(now),
        }
    }

    /// Guard over the open dialog slot. Never held across an await.
    pub fn dialog(&self) -> MutexGuard<'_, Option<DetailDialog>> {
        self.dialog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the open dialog with a fresh instance for `model`.
    pub fn open_dialog(&self, model: &'static ModelDescriptor) {
        let generation = self.dialogs_opened.fetch_add(1, Ordering::Relaxed) + 1;
        *self.dialog() = Some(DetailDialog::open(model, generation));
    }

    pub fn close_dialog(&self) {
        *self.dialog() = None;
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, sequencer: Sequencer) -> Arc<Session> {
        let session = Arc::new(Session::new(sequencer));
        self.inner.write().await.insert(session.id, Arc::clone(&session));
        debug!(session_id = %session.id, "session created");
        session
    }

    /// Look up a session and mark it as seen.
    pub async fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        let session = self.inner.read().await.get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Drop a session and stop its sweep.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let Some(session) = self.inner.write().await.remove(id) else {
            return false;
        };
        session.sequencer.cancel();
        debug!(session_id = %id, "session removed");
        true
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drop every session idle for longer than `ttl`. Returns how many went.
    /// A `ttl` reaching past the representable date range reaps nothing.
    pub async fn reap_idle(&self, ttl: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return 0;
        };

        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| {
            let keep = s.last_seen() > cutoff;
            if !keep {
                s.sequencer.cancel();
            }
            keep
        });
        before - sessions.len()
    }

    /// Background reaper: checks every `every`, drops sessions idle past `ttl`.
    pub fn spawn_reaper(&self, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await; // Skip the immediate tick (nothing to reap yet)
            loop {
                interval.tick().await;
                let reaped = store.reap_idle(ttl).await;
                if reaped > 0 {
                    let remaining = store.len().await;
                    info!(reaped, remaining, "🧹 Idle sessions dropped");
                }
            }
        })
    }
}
