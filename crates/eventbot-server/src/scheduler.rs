//! Start/end timers for scheduled events.
//!
//! Each armed event gets one tokio task that owns both of its deadlines:
//! - sleep until the start, then send a [`StartNotice`] built from the event
//!   as it is in the store at that moment
//! - sleep until the end (the event's `end_time`, or right away for events
//!   without one), remove the event from the store and send an [`EndNotice`]
//!
//! The start notice for an event therefore always precedes its end notice.
//! Handles are kept per event id so [`Scheduler::cancel_timers`] can stop
//! them, and arming an id that already has a pending task is a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use eventbot_core::EventRecord;

use crate::notify::{EndNotice, Notifier, StartNotice};
use crate::store::SharedStore;

/// Result of [`Scheduler::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// Timers are now pending.
    Armed,
    /// Timers were already pending for this id; nothing changed.
    AlreadyArmed,
    /// The event had already started and was removed from the store.
    Expired,
}

/// Counts from [`Scheduler::arm_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub armed: usize,
    pub already_armed: usize,
    pub expired: usize,
}

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

type TimerTable = Arc<Mutex<HashMap<String, TimerEntry>>>;

/// Arms and fires event timers.
///
/// Cheap to clone; clones share the same store, notifier and timer table.
#[derive(Clone)]
pub struct Scheduler {
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
    timers: TimerTable,
    generation: Arc<AtomicU64>,
}

impl Scheduler {
    /// Creates a scheduler working on `store` and reporting to `notifier`.
    pub fn new(store: SharedStore, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Arms the start and end timers for `event`.
    ///
    /// An event whose start time is not in the future is removed from the
    /// store instead: stale events are dropped, never announced late.
    pub async fn arm(&self, event: &EventRecord) -> ArmOutcome {
        let id = event.id().to_string();
        if self.is_armed(&id) {
            debug!(event_id = %id, "Timers already armed");
            return ArmOutcome::AlreadyArmed;
        }

        let now = Utc::now();
        let until_start = event.time_until_start_at(now);
        if until_start <= chrono::Duration::zero() {
            let mut store = self.store.write().await;
            if let Err(e) = store.remove_event(&id) {
                warn!(event_id = %id, error = %e, "Failed to persist removal of stale event");
            }
            info!(
                event_id = %id,
                name = %event.name,
                late_secs = -until_start.num_seconds(),
                "Dropped event whose start time has passed"
            );
            return ArmOutcome::Expired;
        }

        // Both deadlines are fixed now, on the monotonic clock.
        let base = Instant::now();
        let start_in = until_start.to_std().unwrap_or_default();
        let start_at = base + start_in;
        let end_at = match event.time_until_end_at(now) {
            Some(until_end) => base + until_end.to_std().unwrap_or_default().max(start_in),
            None => start_at,
        };

        let mut timers = self.lock_timers();
        if timers.get(&id).is_some_and(|t| !t.handle.is_finished()) {
            return ArmOutcome::AlreadyArmed;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let task = TimerTask {
            id: id.clone(),
            generation,
            start_at,
            end_at,
            store: self.store.clone(),
            notifier: self.notifier.clone(),
            timers: self.timers.clone(),
        };
        let handle = tokio::spawn(task.run());
        timers.insert(id.clone(), TimerEntry { generation, handle });

        info!(
            event_id = %id,
            name = %event.name,
            start_in_secs = start_in.as_secs(),
            end_in_secs = end_at.saturating_duration_since(base).as_secs(),
            "Armed event timers"
        );
        ArmOutcome::Armed
    }

    /// Arms every event currently in the store. Used once at process start.
    pub async fn arm_all(&self) -> ReplaySummary {
        let events: Vec<EventRecord> = self.store.read().await.get_events().to_vec();
        let mut summary = ReplaySummary::default();
        for event in &events {
            match self.arm(event).await {
                ArmOutcome::Armed => summary.armed += 1,
                ArmOutcome::AlreadyArmed => summary.already_armed += 1,
                ArmOutcome::Expired => summary.expired += 1,
            }
        }
        info!(
            armed = summary.armed,
            expired = summary.expired,
            "Replayed stored events"
        );
        summary
    }

    /// Cancels the pending timers of an event. Returns true if a pending
    /// task was stopped.
    pub fn cancel_timers(&self, id: &str) -> bool {
        let Some(entry) = self.lock_timers().remove(id) else {
            return false;
        };
        let was_pending = !entry.handle.is_finished();
        entry.handle.abort();
        debug!(event_id = %id, was_pending, "Cancelled event timers");
        was_pending
    }

    /// Returns true if `id` has pending timers.
    pub fn is_armed(&self, id: &str) -> bool {
        self.lock_timers()
            .get(id)
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Number of events with pending timers.
    pub fn pending(&self) -> usize {
        self.lock_timers()
            .values()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    /// Aborts every pending timer.
    pub fn shutdown(&self) {
        let entries: Vec<_> = self.lock_timers().drain().collect();
        for (_, entry) in &entries {
            entry.handle.abort();
        }
        info!(cancelled = entries.len(), "Scheduler stopped");
    }

    fn lock_timers(&self) -> MutexGuard<'_, HashMap<String, TimerEntry>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct TimerTask {
    id: String,
    generation: u64,
    start_at: Instant,
    end_at: Instant,
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
    timers: TimerTable,
}

impl TimerTask {
    async fn run(self) {
        sleep_until(self.start_at).await;

        let start = {
            let store = self.store.read().await;
            store.get_event(&self.id).map(|e| StartNotice {
                event_id: e.id().to_string(),
                name: e.name.clone(),
                description: e.description.clone(),
                attending: e.attending().to_vec(),
                channel_id: e.channel_id.clone(),
            })
        };
        let Some(notice) = start else {
            debug!(event_id = %self.id, "Event gone before its start, nothing to announce");
            self.release();
            return;
        };
        info!(event_id = %self.id, name = %notice.name, "Event starting");
        self.notifier.event_started(notice).await;

        sleep_until(self.end_at).await;

        let end = {
            let mut store = self.store.write().await;
            let notice = store.get_event(&self.id).map(|e| EndNotice {
                event_id: e.id().to_string(),
                name: e.name.clone(),
                channel_id: e.channel_id.clone(),
            });
            if notice.is_some()
                && let Err(e) = store.remove_event(&self.id)
            {
                warn!(event_id = %self.id, error = %e, "Failed to persist removal of ended event");
            }
            notice
        };
        match end {
            Some(notice) => {
                info!(event_id = %self.id, name = %notice.name, "Event ended");
                self.notifier.event_ended(notice).await;
            }
            None => debug!(event_id = %self.id, "Event already removed before its end"),
        }

        self.release();
    }

    /// Drops this task's handle, unless the id was re-armed in the meantime.
    fn release(&self) {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        if timers
            .get(&self.id)
            .is_some_and(|t| t.generation == self.generation)
        {
            timers.remove(&self.id);
        }
    }
}
