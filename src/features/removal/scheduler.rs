//! Removal scheduler
//!
//! Each scheduled removal gets its own tokio timer task. The pending set is a
//! DashMap keyed by target, one entry per target. Fire, cancel and supersede
//! each do their check-and-remove under that target's entry lock.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0

use super::clock::{Clock, SystemClock};
use super::task::{RemovalTask, TaskId, TaskState};
use crate::features::profiles::{ProfileApi, Target};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// A tracked task plus the handle that disarms its timer
struct PendingRemoval {
    task: RemovalTask,
    timer: AbortHandle,
}

struct SchedulerInner {
    pending: DashMap<Target, PendingRemoval>,
    api: Arc<dyn ProfileApi>,
    clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct RemovalScheduler {
    inner: Arc<SchedulerInner>,
}

impl RemovalScheduler {
    pub fn new(api: Arc<dyn ProfileApi>) -> Self {
        Self::with_clock(api, Arc::new(SystemClock))
    }

    pub fn with_clock(api: Arc<dyn ProfileApi>, clock: Arc<dyn Clock>) -> Self {
        RemovalScheduler {
            inner: Arc::new(SchedulerInner {
                pending: DashMap::new(),
                api,
                clock,
            }),
        }
    }

    /// Schedule removal of `target` in `delay_minutes`, superseding any
    /// removal already pending for the same target.
    ///
    /// Must be called from within a tokio runtime. `delay_minutes` must be
    /// positive; callers that got "0" from the operator skip scheduling.
    /// Returns a snapshot of the task as created.
    pub fn schedule(&self, target: Target, delay_minutes: u32) -> RemovalTask {
        debug_assert!(delay_minutes > 0, "removal delay must be positive");
        self.schedule_after(
            target,
            delay_minutes,
            Duration::from_secs(u64::from(delay_minutes) * 60),
        )
    }

    /// Track a task of `delay_minutes` whose timer goes off after `after`
    fn schedule_after(&self, target: Target, delay_minutes: u32, after: Duration) -> RemovalTask {
        let task = RemovalTask::new(target.clone(), self.inner.clock.now(), delay_minutes);
        let created = task.clone();
        let task_id = task.id.clone();
        let fire_at = task.fire_at;

        // The timer counts from now, not from when the spawned task is first polled
        let deadline = Instant::now() + after;

        // Hold the target's entry while arming, so the timer cannot look
        // itself up before it is tracked
        let slot = self.inner.pending.entry(target.clone());

        let inner = Arc::clone(&self.inner);
        let fire_target = target.clone();
        let fire_id = task_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            inner.fire(&fire_target, &fire_id).await;
        })
        .abort_handle();

        let pending = PendingRemoval { task, timer };
        match slot {
            Entry::Occupied(mut slot) => {
                let superseded = slot.insert(pending);
                superseded.timer.abort();
                let mut old = superseded.task;
                if let Err(e) = old.resolve(TaskState::Cancelled) {
                    warn!("Superseded removal {} was not pending: {e}", old.id);
                }
                info!(
                    "Removal {} for {} superseded by {}",
                    old.id, target, task_id
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(pending);
            }
        }

        info!(
            "Scheduled removal {} of {} in {} minutes (at {})",
            task_id,
            target,
            delay_minutes,
            fire_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        created
    }

    /// Cancel a pending removal.
    ///
    /// Returns `false` for unknown ids and for removals that already fired or
    /// were cancelled. Once this returns `true` the removal will not run.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        // Copy the key out so no map guard is held while removing
        let target = self
            .inner
            .pending
            .iter()
            .find(|entry| entry.task.id == *task_id)
            .map(|entry| entry.key().clone());

        let Some(target) = target else {
            debug!("Cancel requested for unknown removal {task_id}");
            return false;
        };

        match self.inner.take_if(&target, task_id, TaskState::Cancelled) {
            Some(task) => {
                info!("Cancelled removal {} of {}", task.id, task.target);
                true
            }
            None => {
                debug!("Removal {task_id} resolved before it could be cancelled");
                false
            }
        }
    }

    /// Cancel whatever removal is pending for `target`
    pub fn cancel_for_target(&self, target: &Target) -> Option<RemovalTask> {
        let (_, removed) = self.inner.pending.remove(target)?;
        removed.timer.abort();
        let mut task = removed.task;
        task.resolve(TaskState::Cancelled).ok()?;
        info!("Cancelled removal {} of {}", task.id, task.target);
        Some(task)
    }

    /// Disarm every pending removal, returning how many were dropped
    pub fn cancel_all(&self) -> usize {
        let targets: Vec<Target> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        targets
            .iter()
            .filter_map(|target| self.cancel_for_target(target))
            .inspect(|task| {
                warn!(
                    "Pending removal {} of {} (due {}) will not run",
                    task.id,
                    task.target,
                    task.fire_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            })
            .count()
    }

    /// Pending removals, soonest first
    pub fn pending(&self) -> Vec<RemovalTask> {
        let mut tasks: Vec<RemovalTask> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.task.clone())
            .collect();
        tasks.sort_by(|a, b| a.fire_at.cmp(&b.fire_at));
        tasks
    }

    pub fn pending_for(&self, target: &Target) -> Option<RemovalTask> {
        self.inner.pending.get(target).map(|entry| entry.task.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }
}

impl SchedulerInner {
    /// Atomically remove `task_id` if it is still the pending task for
    /// `target`, resolving it to `next`
    fn take_if(&self, target: &Target, task_id: &TaskId, next: TaskState) -> Option<RemovalTask> {
        let (_, removed) = self
            .pending
            .remove_if(target, |_, pending| pending.task.id == *task_id)?;

        if next == TaskState::Cancelled {
            removed.timer.abort();
        }

        let mut task = removed.task;
        if let Err(e) = task.resolve(next) {
            error!("Removal {} left tracked set in bad state: {e}", task.id);
            return None;
        }
        Some(task)
    }

    /// Timer callback: claim the task, then call upstream
    async fn fire(&self, target: &Target, task_id: &TaskId) {
        let Some(task) = self.take_if(target, task_id, TaskState::Fired) else {
            debug!("Removal {task_id} no longer pending at fire time");
            return;
        };

        info!("Removal {} firing for {}", task.id, task.target);

        // Best effort: no retry, the task stays fired either way
        match self.api.remove_profile(&task.target).await {
            Ok(_) => info!("Removal {} completed", task.id),
            Err(e) => error!(
                "Removal {} of {} failed: {} (HTTP {})",
                task.id,
                task.target,
                e.message(),
                e.status()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::profiles::{ApiCallKind, DryRunApi};
    use chrono::{DateTime, TimeZone, Utc};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn scheduler_with(api: Arc<DryRunApi>) -> RemovalScheduler {
        RemovalScheduler::with_clock(api, Arc::new(FixedClock(noon())))
    }

    fn safe() -> Target {
        Target::new("173628", "1845292")
    }

    fn emergency() -> Target {
        Target::new("173535", "1845292")
    }

    async fn advance_minutes(minutes: u64) {
        tokio::time::advance(Duration::from_secs(minutes * 60)).await;
        // Let woken timer tasks run to completion
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_tracks_pending_task() {
        let api = Arc::new(DryRunApi::new());
        let scheduler = scheduler_with(api.clone());

        let id = scheduler.schedule(safe(), 30).id;

        let task = scheduler.pending_for(&safe()).unwrap();
        assert_eq!(task.id, id);
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.fire_at, noon() + chrono::Duration::minutes(30));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_right_after_schedule_prevents_removal() {
        let api = Arc::new(DryRunApi::new());
        let scheduler = scheduler_with(api.clone());

        let id = scheduler.schedule(safe(), 5).id;
        assert!(scheduler.cancel(&id));
        assert_eq!(scheduler.pending_count(), 0);

        advance_minutes(10).await;
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_twice_returns_false() {
        let scheduler = scheduler_with(Arc::new(DryRunApi::new()));

        let id = scheduler.schedule(safe(), 5).id;
        assert!(scheduler.cancel(&id));
        assert!(!scheduler.cancel(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unknown_id() {
        let scheduler = scheduler_with(Arc::new(DryRunApi::new()));
        scheduler.schedule(safe(), 5);

        assert!(!scheduler.cancel(&TaskId::generate()));
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_and_leaves_tracked_set() {
        let api = Arc::new(DryRunApi::new());
        let scheduler = scheduler_with(api.clone());

        let id = scheduler.schedule(safe(), 5).id;

        advance_minutes(4).await;
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 0);
        assert_eq!(scheduler.pending_count(), 1);

        advance_minutes(2).await;
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 1);
        assert_eq!(scheduler.pending_count(), 0);

        // Fired tasks cannot be cancelled
        assert!(!scheduler.cancel(&id));

        advance_minutes(60).await;
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_exactly_at_fire_at() {
        let api = Arc::new(DryRunApi::new());
        let scheduler = scheduler_with(api.clone());

        scheduler.schedule(safe(), 5);

        // No yield before advancing: the timer task has not been polled yet
        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes_previous_task() {
        let api = Arc::new(DryRunApi::new());
        let scheduler = scheduler_with(api.clone());

        let first = scheduler.schedule(safe(), 5).id;
        let second = scheduler.schedule(safe(), 10).id;

        assert_ne!(first, second);
        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
        assert!(!scheduler.cancel(&first));

        // The superseded 5-minute timer must not fire
        advance_minutes(6).await;
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 0);

        advance_minutes(5).await;
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_targets_fire_independently() {
        let api = Arc::new(DryRunApi::new());
        let scheduler = scheduler_with(api.clone());

        scheduler.schedule(safe(), 10);
        scheduler.schedule(emergency(), 5);

        let order: Vec<Target> = scheduler.pending().into_iter().map(|t| t.target).collect();
        assert_eq!(order, vec![emergency(), safe()]);

        advance_minutes(6).await;
        assert_eq!(api.count(ApiCallKind::Remove, &emergency()), 1);
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 0);

        advance_minutes(5).await;
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_removal_is_not_retried() {
        let api = Arc::new(DryRunApi::new().with_remove_failure(500, "upstream down"));
        let scheduler = scheduler_with(api.clone());

        let id = scheduler.schedule(safe(), 1).id;
        advance_minutes(2).await;

        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 1);
        assert_eq!(scheduler.pending_count(), 0);
        assert!(!scheduler.cancel(&id));

        advance_minutes(60).await;
        assert_eq!(api.count(ApiCallKind::Remove, &safe()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_for_target() {
        let api = Arc::new(DryRunApi::new());
        let scheduler = scheduler_with(api.clone());

        let id = scheduler.schedule(safe(), 5).id;
        let cancelled = scheduler.cancel_for_target(&safe()).unwrap();
        assert_eq!(cancelled.id, id);
        assert_eq!(cancelled.state, TaskState::Cancelled);
        assert!(scheduler.cancel_for_target(&safe()).is_none());

        advance_minutes(10).await;
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let api = Arc::new(DryRunApi::new());
        let scheduler = scheduler_with(api.clone());

        scheduler.schedule(safe(), 5);
        scheduler.schedule(emergency(), 15);
        assert_eq!(scheduler.cancel_all(), 2);
        assert_eq!(scheduler.pending_count(), 0);

        advance_minutes(30).await;
        assert!(api.calls().is_empty());
    }

    /// Wait until `target` has `expected` removals, giving up after a second
    async fn wait_for_removals(api: &DryRunApi, target: &Target, expected: usize) -> usize {
        for _ in 0..100 {
            let removes = api.count(ApiCallKind::Remove, target);
            if removes >= expected {
                return removes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        api.count(ApiCallKind::Remove, target)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_due_timer_and_cancel_have_one_winner() {
        for round in 0..200 {
            let api = Arc::new(DryRunApi::new());
            let scheduler = RemovalScheduler::new(api.clone());
            let target = Target::new(format!("race-{round}"), "1845292");

            let task = scheduler.schedule_after(target.clone(), 1, Duration::from_millis(1));
            tokio::time::sleep(Duration::from_millis(1)).await;

            let canceller = {
                let scheduler = scheduler.clone();
                let id = task.id.clone();
                tokio::spawn(async move { scheduler.cancel(&id) })
            };
            let cancelled = canceller.await.unwrap();

            if cancelled {
                tokio::time::sleep(Duration::from_millis(20)).await;
                assert_eq!(
                    api.count(ApiCallKind::Remove, &target),
                    0,
                    "round {round}: cancelled removal still ran"
                );
            } else {
                assert_eq!(
                    wait_for_removals(&api, &target, 1).await,
                    1,
                    "round {round}: fired removal must run exactly once"
                );
            }
            assert_eq!(scheduler.pending_count(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_due_timer_and_supersede_have_one_winner() {
        for round in 0..200 {
            let api = Arc::new(DryRunApi::new());
            let scheduler = RemovalScheduler::new(api.clone());
            let target = Target::new(format!("race-{round}"), "1845292");

            let first = scheduler.schedule_after(target.clone(), 1, Duration::from_millis(1));
            tokio::time::sleep(Duration::from_millis(1)).await;

            let replacer = {
                let scheduler = scheduler.clone();
                let target = target.clone();
                tokio::spawn(async move { scheduler.schedule(target, 60) })
            };
            let second = replacer.await.unwrap();

            tokio::time::sleep(Duration::from_millis(20)).await;

            // The old timer either fired before being replaced or never does
            assert!(api.count(ApiCallKind::Remove, &target) <= 1, "round {round}");
            assert!(!scheduler.cancel(&first.id), "round {round}");

            let pending = scheduler.pending_for(&target).unwrap();
            assert_eq!(pending.id, second.id, "round {round}");
            assert_eq!(scheduler.cancel_all(), 1);
        }
    }
}
