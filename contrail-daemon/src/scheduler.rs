//! Per-project publish scheduler.
//!
//! Each project has one slot: idle, running, or running with one trailing
//! publish pending. Requests that arrive while a publish runs replace the
//! pending job, so a burst of N requests costs at most one in-flight publish
//! plus one trailing publish, and the trailing one (exporting everything
//! since the cursor) covers every request it absorbed. Publishes of
//! different projects run in parallel.
//!
//! A failed publish is broadcast to observers and not retried; the next
//! request for the project runs it again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;

use contrail_core::ProjectId;
use contrail_sync::{PublishOutcome, SyncError};

/// Blocking publish job; runs on the blocking thread pool.
pub type PublishFn = Box<dyn FnOnce() -> Result<PublishOutcome, SyncError> + Send + 'static>;

const EVENT_CAPACITY: usize = 64;

/// What [`SyncScheduler::enqueue`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enqueued {
    /// The slot was idle; the publish started.
    Started,
    /// A publish is running; this one will follow it.
    Trailing,
    /// Merged into the already pending trailing publish.
    Coalesced,
}

/// Result of one publish, as seen by observers.
#[derive(Debug, Clone, Serialize)]
pub struct PublishEvent {
    pub project: ProjectId,
    pub outcome: Result<PublishOutcome, String>,
    pub at: DateTime<Utc>,
}

/// Point-in-time view of one project's slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub project: ProjectId,
    pub running: bool,
    pub trailing: bool,
    pub last: Option<PublishEvent>,
}

#[derive(Default)]
struct Slot {
    running: bool,
    pending: Option<PublishFn>,
    last_started: Option<Instant>,
    last: Option<PublishEvent>,
}

struct Inner {
    slots: Mutex<HashMap<ProjectId, Slot>>,
    min_interval: Duration,
    events: broadcast::Sender<PublishEvent>,
    idle: Notify,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<ProjectId, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

impl SyncScheduler {
    /// `min_interval` is the minimum spacing between the starts of two
    /// publishes of the same project.
    pub fn new(min_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                min_interval,
                events,
                idle: Notify::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishEvent> {
        self.inner.events.subscribe()
    }

    /// Request a publish. Must be called from within a tokio runtime.
    pub fn enqueue(&self, project: ProjectId, job: PublishFn) -> Enqueued {
        let mut slots = self.inner.slots();
        let slot = slots.entry(project.clone()).or_default();
        if slot.running {
            return match slot.pending.replace(job) {
                Some(_) => Enqueued::Coalesced,
                None => Enqueued::Trailing,
            };
        }
        slot.running = true;
        drop(slots);

        tokio::spawn(worker(self.inner.clone(), project, job));
        Enqueued::Started
    }

    pub fn is_running(&self, project: &ProjectId) -> bool {
        self.inner
            .slots()
            .get(project)
            .map(|slot| slot.running)
            .unwrap_or(false)
    }

    /// Wait until `project` has nothing running or pending.
    pub async fn flush(&self, project: &ProjectId) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_running(project) {
                return;
            }
            notified.await;
        }
    }

    /// Wait until every project is idle.
    pub async fn flush_all(&self) {
        let projects: Vec<ProjectId> = self.inner.slots().keys().cloned().collect();
        for project in projects {
            self.flush(&project).await;
        }
    }

    pub fn snapshot(&self) -> Vec<SlotStatus> {
        let slots = self.inner.slots();
        let mut status: Vec<SlotStatus> = slots
            .iter()
            .map(|(project, slot)| SlotStatus {
                project: project.clone(),
                running: slot.running,
                trailing: slot.pending.is_some(),
                last: slot.last.clone(),
            })
            .collect();
        status.sort_by(|a, b| a.project.cmp(&b.project));
        status
    }
}

async fn worker(inner: Arc<Inner>, project: ProjectId, mut job: PublishFn) {
    loop {
        let wait = inner
            .slots()
            .get(&project)
            .and_then(|slot| slot.last_started)
            .map(|started| inner.min_interval.saturating_sub(started.elapsed()))
            .unwrap_or_default();
        if !wait.is_zero() {
            tracing::debug!(project = %project, wait_ms = wait.as_millis() as u64, "rate limiting publish");
            tokio::time::sleep(wait).await;
        }
        inner.slots().entry(project.clone()).or_default().last_started = Some(Instant::now());

        let outcome = match tokio::task::spawn_blocking(job).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => Err(err.to_string()),
            Err(err) => Err(format!("publish task failed: {err}")),
        };
        match &outcome {
            Ok(done) => match &done.key {
                Some(key) => tracing::info!(project = %project, key = %key, bytes = done.bytes, "published"),
                None => tracing::debug!(project = %project, "nothing to publish"),
            },
            Err(err) => tracing::warn!(project = %project, error = %err, "publish failed"),
        }

        let event = PublishEvent {
            project: project.clone(),
            outcome,
            at: Utc::now(),
        };
        // No receivers is fine.
        let _ = inner.events.send(event.clone());

        let next = {
            let mut slots = inner.slots();
            let slot = slots.entry(project.clone()).or_default();
            slot.last = Some(event);
            let next = slot.pending.take();
            if next.is_none() {
                slot.running = false;
            }
            next
        };
        match next {
            Some(pending) => job = pending,
            None => {
                inner.idle.notify_waiters();
                return;
            }
        }
    }
}
