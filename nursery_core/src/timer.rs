//! Sleep timer with a persisted active-timer record.
//!
//! The timer is either idle (no record on disk) or running (exactly one
//! [`ActiveTimer`] record). While running, a sticky notification mirrors the
//! timer; the notification is best-effort and never blocks a transition.
//!
//! State machine:
//! - `start`: Idle -> Running (errors if already running)
//! - `stop`: Running -> Idle, yielding a [`TimerSummary`]
//! - `cancel`: Running -> Idle, discarding the session

use crate::clock::{Clock, SystemClock};
use crate::notify::{
    NotificationContent, NotificationId, NotificationKind, NotificationScheduler, Trigger,
};
use crate::store::JsonFileStore;
use crate::{Error, Result, SleepType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The single running timer, as persisted on disk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveTimer {
    pub baby_id: String,
    pub baby_name: String,
    pub sleep_type: SleepType,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<NotificationId>,
}

impl ActiveTimer {
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.start_time
    }

    /// Notification mirroring this timer. `elapsed` of `None` means the
    /// timer has only just started.
    fn notification(&self, elapsed: Option<Duration>) -> NotificationContent {
        let body = match elapsed {
            None => format!("{} started just now", self.sleep_type.label()),
            Some(elapsed) => format!(
                "{} - {}",
                self.sleep_type.label(),
                format_timer_duration(elapsed)
            ),
        };
        NotificationContent {
            title: format!("{} is sleeping", self.baby_name),
            body,
            kind: NotificationKind::SleepTimer,
            baby_id: Some(self.baby_id.clone()),
            sticky: true,
        }
    }
}

/// Result of stopping a running timer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimerSummary {
    pub baby_id: String,
    pub sleep_type: SleepType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Owner of the active-timer record and its notification
pub struct SleepTimer<N, C = SystemClock> {
    store: JsonFileStore<ActiveTimer>,
    notifier: N,
    clock: C,
}

impl<N: NotificationScheduler> SleepTimer<N, SystemClock> {
    pub fn new(path: impl Into<PathBuf>, notifier: N) -> Self {
        Self::with_clock(path, notifier, SystemClock)
    }
}

impl<N: NotificationScheduler, C: Clock> SleepTimer<N, C> {
    pub fn with_clock(path: impl Into<PathBuf>, notifier: N, clock: C) -> Self {
        Self {
            store: JsonFileStore::new(path),
            notifier,
            clock,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The running timer, if any
    pub fn active(&self) -> Result<Option<ActiveTimer>> {
        self.store.load()
    }

    /// Time elapsed on the running timer
    pub fn elapsed(&self) -> Result<Option<Duration>> {
        let now = self.clock.now();
        Ok(self.active()?.map(|t| t.elapsed_at(now)))
    }

    /// Start timing a sleep
    ///
    /// Fails with [`Error::TimerAlreadyRunning`] if a timer is already
    /// active; the running timer is left untouched. The record is claimed
    /// under the store's write lock before any notification is posted.
    pub fn start(
        &mut self,
        baby_id: impl Into<String>,
        baby_name: impl Into<String>,
        sleep_type: SleepType,
    ) -> Result<ActiveTimer> {
        let mut timer = ActiveTimer {
            baby_id: baby_id.into(),
            baby_name: baby_name.into(),
            sleep_type,
            start_time: self.clock.now(),
            notification_id: None,
        };

        if let Some(existing) = self.store.insert_if_absent(&timer)? {
            return Err(Error::TimerAlreadyRunning {
                baby_name: existing.baby_name,
                started_at: existing.start_time,
            });
        }

        tracing::info!(
            "Started {} timer for {} at {}",
            timer.sleep_type,
            timer.baby_name,
            timer.start_time
        );

        let id = NotificationId::generate();
        if let Err(e) = self
            .notifier
            .schedule(&id, &timer.notification(None), Trigger::Immediate)
        {
            tracing::warn!("Failed to create sleep timer notification: {}", e);
            return Ok(timer);
        }

        match self.attach_handle(timer.start_time, &id) {
            Some(attached) => timer = attached,
            // Stopped before the handle landed, or the handle could not be saved
            None => self.cancel_quietly(&id),
        }
        Ok(timer)
    }

    /// Stop the running timer and report how long it ran
    ///
    /// Returns `Ok(None)` when no timer is running.
    pub fn stop(&mut self) -> Result<Option<TimerSummary>> {
        let Some(timer) = self.store.take()? else {
            tracing::debug!("Stop requested with no active timer");
            return Ok(None);
        };

        let end_time = self.clock.now();
        let duration_minutes = rounded_minutes(end_time - timer.start_time);

        self.dismiss(&timer);

        tracing::info!(
            "Stopped {} timer for {} after {} minutes",
            timer.sleep_type,
            timer.baby_name,
            duration_minutes
        );

        Ok(Some(TimerSummary {
            baby_id: timer.baby_id,
            sleep_type: timer.sleep_type,
            start_time: timer.start_time,
            end_time,
            duration_minutes,
        }))
    }

    /// Discard the running timer without recording it. No-op when idle.
    ///
    /// Also removes a record that failed to parse.
    pub fn cancel(&mut self) -> Result<()> {
        match self.store.take()? {
            Some(timer) => {
                self.dismiss(&timer);
                tracing::info!("Cancelled timer for {}", timer.baby_name);
            }
            None => tracing::debug!("Cancel requested with no active timer"),
        }
        Ok(())
    }

    /// Replace the timer notification with one showing the current elapsed
    /// time
    ///
    /// Returns the (possibly updated) running timer, or `None` once the
    /// timer has been stopped. Notification and storage failures are logged
    /// and leave the previous notification handle in place.
    pub fn refresh_notification(&mut self) -> Result<Option<ActiveTimer>> {
        let Some(timer) = self.active()? else {
            return Ok(None);
        };
        let Some(old_id) = timer.notification_id.clone() else {
            // Notification was never created; nothing to refresh
            return Ok(Some(timer));
        };

        let elapsed = timer.elapsed_at(self.clock.now());
        if let Err(e) = self.notifier.cancel(&old_id) {
            tracing::warn!("Failed to cancel timer notification {}: {}", old_id, e);
        }

        let new_id = NotificationId::generate();
        if let Err(e) = self.notifier.schedule(
            &new_id,
            &timer.notification(Some(elapsed)),
            Trigger::Immediate,
        ) {
            tracing::warn!("Failed to update timer notification: {}", e);
            return Ok(Some(timer));
        }

        match self.attach_handle(timer.start_time, &new_id) {
            Some(updated) => Ok(Some(updated)),
            None => {
                self.cancel_quietly(&new_id);
                // Either stopped meanwhile, or storage failed and the old record stands
                self.active()
            }
        }
    }

    /// Record `id` as the notification of the timer started at `start_time`
    ///
    /// Returns the updated timer, or `None` if that timer is no longer the
    /// running one or the write failed.
    fn attach_handle(
        &self,
        start_time: DateTime<Utc>,
        id: &NotificationId,
    ) -> Option<ActiveTimer> {
        let handle = id.clone();
        let updated = self.store.update(move |t| {
            if t.start_time == start_time {
                t.notification_id = Some(handle);
            }
            Ok(())
        });
        match updated {
            Ok(Some(t)) if t.notification_id.as_ref() == Some(id) => Some(t),
            Ok(_) => {
                tracing::debug!("Timer stopped or replaced before notification {} was recorded", id);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to persist notification handle: {}", e);
                None
            }
        }
    }

    fn dismiss(&mut self, timer: &ActiveTimer) {
        if let Some(id) = &timer.notification_id {
            self.cancel_quietly(id);
        }
    }

    fn cancel_quietly(&mut self, id: &NotificationId) {
        if let Err(e) = self.notifier.cancel(id) {
            tracing::warn!("Failed to cancel notification {}: {}", id, e);
        }
    }
}

/// Whole minutes between start and stop, rounded to nearest
fn rounded_minutes(elapsed: Duration) -> i64 {
    let minutes = (elapsed.num_milliseconds() as f64 / 60_000.0).round() as i64;
    minutes.max(0)
}

/// Render an elapsed duration compactly: "45s", "1m 5s", "1h 1m 1s"
///
/// Leading zero-valued units are omitted; inner units are always shown.
/// Negative durations (clock skew) render as "0s".
pub fn format_timer_duration(elapsed: Duration) -> String {
    let total_seconds = elapsed.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::MemoryScheduler;
    use tempfile::TempDir;

    fn timer_at(temp_dir: &TempDir, clock: &ManualClock) -> SleepTimer<MemoryScheduler, ManualClock> {
        SleepTimer::with_clock(
            temp_dir.path().join("active_timer.json"),
            MemoryScheduler::new(),
            clock.clone(),
        )
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T13:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_format_timer_duration() {
        assert_eq!(format_timer_duration(Duration::seconds(0)), "0s");
        assert_eq!(format_timer_duration(Duration::seconds(45)), "45s");
        assert_eq!(format_timer_duration(Duration::seconds(65)), "1m 5s");
        assert_eq!(format_timer_duration(Duration::seconds(3600)), "1h 0m 0s");
        assert_eq!(format_timer_duration(Duration::seconds(3661)), "1h 1m 1s");
        assert_eq!(format_timer_duration(Duration::milliseconds(1999)), "1s");
        assert_eq!(format_timer_duration(Duration::seconds(-30)), "0s");
    }

    #[test]
    fn test_start_persists_and_notifies() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        let started = timer.start("baby_1", "Mia", SleepType::Nap).unwrap();

        assert_eq!(started.start_time, t0());
        assert!(started.notification_id.is_some());
        assert_eq!(timer.active().unwrap(), Some(started.clone()));

        let notes = timer.notifier().scheduled().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content.title, "Mia is sleeping");
        assert_eq!(notes[0].content.body, "Nap started just now");
        assert!(notes[0].content.sticky);
        assert_eq!(Some(&notes[0].id), started.notification_id.as_ref());
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        let first = timer.start("baby_1", "Mia", SleepType::Nap).unwrap();
        clock.advance(Duration::minutes(3));

        let err = timer.start("baby_2", "Leo", SleepType::Night).unwrap_err();
        assert!(matches!(err, Error::TimerAlreadyRunning { .. }));

        // First timer untouched, no extra notification
        assert_eq!(timer.active().unwrap(), Some(first));
        assert_eq!(timer.notifier().scheduled().unwrap().len(), 1);
    }

    #[test]
    fn test_start_then_immediate_stop_is_zero_minutes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        timer.start("baby_1", "Mia", SleepType::Nap).unwrap();
        let summary = timer.stop().unwrap().unwrap();

        assert_eq!(summary.duration_minutes, 0);
        assert_eq!(summary.start_time, summary.end_time);
    }

    #[test]
    fn test_stop_after_n_minutes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        timer.start("baby_1", "Mia", SleepType::Night).unwrap();
        clock.advance(Duration::minutes(95));
        let summary = timer.stop().unwrap().unwrap();

        assert_eq!(summary.duration_minutes, 95);
        assert_eq!(summary.start_time, t0());
        assert_eq!(summary.end_time, t0() + Duration::minutes(95));
        assert_eq!(summary.sleep_type, SleepType::Night);

        // State and notification cleared
        assert_eq!(timer.active().unwrap(), None);
        assert!(timer.notifier().scheduled().unwrap().is_empty());
    }

    #[test]
    fn test_stop_rounds_to_nearest_minute() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        timer.start("baby_1", "Mia", SleepType::Nap).unwrap();
        clock.advance(Duration::seconds(10 * 60 + 29));
        assert_eq!(timer.stop().unwrap().unwrap().duration_minutes, 10);

        timer.start("baby_1", "Mia", SleepType::Nap).unwrap();
        clock.advance(Duration::seconds(10 * 60 + 30));
        assert_eq!(timer.stop().unwrap().unwrap().duration_minutes, 11);
    }

    #[test]
    fn test_stop_and_cancel_when_idle_are_noops() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        assert_eq!(timer.stop().unwrap(), None);
        timer.cancel().unwrap();
        assert_eq!(timer.active().unwrap(), None);
    }

    #[test]
    fn test_cancel_discards_timer() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        timer.start("baby_1", "Mia", SleepType::Nap).unwrap();
        timer.cancel().unwrap();

        assert_eq!(timer.active().unwrap(), None);
        assert!(timer.notifier().scheduled().unwrap().is_empty());
        assert_eq!(timer.stop().unwrap(), None);
    }

    #[test]
    fn test_timer_survives_restart() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());

        timer_at(&temp_dir, &clock)
            .start("baby_1", "Mia", SleepType::Nap)
            .unwrap();

        clock.advance(Duration::minutes(20));
        let mut reopened = timer_at(&temp_dir, &clock);
        assert_eq!(reopened.elapsed().unwrap(), Some(Duration::minutes(20)));
        assert_eq!(reopened.stop().unwrap().unwrap().duration_minutes, 20);
    }

    #[test]
    fn test_notification_failure_does_not_block_timer() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);
        timer.notifier_mut().set_failing(true);

        let started = timer.start("baby_1", "Mia", SleepType::Nap).unwrap();
        assert_eq!(started.notification_id, None);

        // Refresh without a handle leaves the timer alone
        let refreshed = timer.refresh_notification().unwrap().unwrap();
        assert_eq!(refreshed, started);

        clock.advance(Duration::minutes(7));
        assert_eq!(timer.stop().unwrap().unwrap().duration_minutes, 7);
    }

    #[test]
    fn test_refresh_replaces_notification_with_elapsed_time() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        let started = timer.start("baby_1", "Mia", SleepType::Night).unwrap();
        clock.advance(Duration::seconds(3661));

        let refreshed = timer.refresh_notification().unwrap().unwrap();
        assert_ne!(refreshed.notification_id, started.notification_id);
        assert_eq!(timer.active().unwrap(), Some(refreshed.clone()));

        let notes = timer.notifier().scheduled().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(Some(&notes[0].id), refreshed.notification_id.as_ref());
        assert_eq!(notes[0].content.body, "Night sleep - 1h 1m 1s");
    }

    #[test]
    fn test_refresh_failure_keeps_previous_handle() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        let started = timer.start("baby_1", "Mia", SleepType::Nap).unwrap();
        timer.notifier_mut().set_failing(true);
        clock.advance(Duration::minutes(1));

        let refreshed = timer.refresh_notification().unwrap().unwrap();
        assert_eq!(refreshed, started);
        assert_eq!(timer.active().unwrap(), Some(started));
    }

    #[test]
    fn test_refresh_when_idle_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut timer = timer_at(&temp_dir, &clock);

        assert_eq!(timer.refresh_notification().unwrap(), None);
    }

    #[test]
    fn test_cancel_clears_corrupted_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let path = temp_dir.path().join("active_timer.json");
        std::fs::write(&path, "not json").unwrap();

        let mut timer = timer_at(&temp_dir, &clock);
        assert_eq!(timer.active().unwrap(), None);

        timer.cancel().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_starts_claim_a_single_timer() {
        use crate::notify::SpoolScheduler;
        use std::sync::{Arc, Barrier};

        let temp_dir = tempfile::tempdir().unwrap();
        let record = temp_dir.path().join("active_timer.json");
        let spool = temp_dir.path().join("spool.json");

        for round in 0..10 {
            let barrier = Arc::new(Barrier::new(4));
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let (record, spool, barrier) = (record.clone(), spool.clone(), barrier.clone());
                    std::thread::spawn(move || {
                        let mut timer = SleepTimer::new(record, SpoolScheduler::new(spool));
                        barrier.wait();
                        timer.start(format!("baby_{}", i), "Mia", SleepType::Nap)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let started = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(started, 1, "round {}", round);
            assert!(results.iter().all(|r| matches!(
                r,
                Ok(_) | Err(Error::TimerAlreadyRunning { .. })
            )));

            let mut timer = SleepTimer::new(&record, SpoolScheduler::new(&spool));
            timer.stop().unwrap().unwrap();

            // No sticky notification outlives the timer
            let leftover = SpoolScheduler::new(&spool).scheduled().unwrap();
            assert!(leftover.is_empty(), "round {}: {:?}", round, leftover);
        }
    }

    #[test]
    fn test_stop_wins_over_late_refresh() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut refresher = timer_at(&temp_dir, &clock);
        refresher.start("baby_1", "Mia", SleepType::Nap).unwrap();

        // Another handle stops the timer; a later refresh must not bring it back
        let mut stopper = timer_at(&temp_dir, &clock);
        stopper.stop().unwrap().unwrap();

        clock.advance(Duration::seconds(30));
        assert_eq!(refresher.refresh_notification().unwrap(), None);
        assert_eq!(refresher.active().unwrap(), None);
    }
}
