//! Periodic refresh of the sleep timer notification.
//!
//! A [`RefreshHandle`] owns a background thread that rewrites the timer
//! notification with the current elapsed time every interval. Stopping or
//! cancelling through [`SupervisedTimer`] always shuts the refresh thread
//! down (and waits for it) before the timer record is cleared, so no refresh
//! can run against a timer that is being torn down.

use crate::clock::Clock;
use crate::notify::NotificationScheduler;
use crate::timer::{ActiveTimer, SleepTimer, TimerSummary};
use crate::{Error, Result, SleepType};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

type SharedTimer<N, C> = Arc<Mutex<SleepTimer<N, C>>>;

fn lock_timer<N, C>(timer: &Mutex<SleepTimer<N, C>>) -> Result<MutexGuard<'_, SleepTimer<N, C>>> {
    timer
        .lock()
        .map_err(|_| Error::Other("sleep timer lock poisoned".into()))
}

/// Handle to a running refresh thread
pub struct RefreshHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Spawn a refresh loop for the shared timer
    ///
    /// The loop exits on its own once the timer is no longer running.
    pub fn spawn<N, C>(timer: SharedTimer<N, C>, interval: Duration) -> Self
    where
        N: NotificationScheduler + Send + 'static,
        C: Clock + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                // Cancelled, or the handle was dropped
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            let mut guard = match lock_timer(&timer) {
                Ok(guard) => guard,
                Err(e) => {
                    tracing::warn!("Stopping notification refresh: {}", e);
                    break;
                }
            };
            match guard.refresh_notification() {
                Ok(Some(_)) => tracing::debug!("Refreshed sleep timer notification"),
                Ok(None) => {
                    tracing::debug!("Timer no longer running, refresh loop exiting");
                    break;
                }
                Err(e) => tracing::warn!("Failed to refresh timer notification: {}", e),
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// Whether the refresh thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the refresh loop and wait for any in-flight refresh to finish
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Notification refresh thread panicked");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A sleep timer together with its notification refresh loop
pub struct SupervisedTimer<N, C> {
    timer: SharedTimer<N, C>,
    refresh: Option<RefreshHandle>,
    interval: Duration,
}

impl<N, C> SupervisedTimer<N, C>
where
    N: NotificationScheduler + Send + 'static,
    C: Clock + Send + 'static,
{
    pub fn new(timer: SleepTimer<N, C>, interval: Duration) -> Self {
        Self {
            timer: Arc::new(Mutex::new(timer)),
            refresh: None,
            interval,
        }
    }

    /// Shared access to the underlying timer
    pub fn shared(&self) -> SharedTimer<N, C> {
        Arc::clone(&self.timer)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub fn active(&self) -> Result<Option<ActiveTimer>> {
        lock_timer(&self.timer)?.active()
    }

    /// Start a timer and begin refreshing its notification
    pub fn start(
        &mut self,
        baby_id: impl Into<String>,
        baby_name: impl Into<String>,
        sleep_type: SleepType,
    ) -> Result<ActiveTimer> {
        let started = lock_timer(&self.timer)?.start(baby_id, baby_name, sleep_type)?;
        self.spawn_refresh();
        Ok(started)
    }

    /// Resume refreshing for a timer persisted by an earlier run
    ///
    /// Returns the running timer, or `None` when idle.
    pub fn resume(&mut self) -> Result<Option<ActiveTimer>> {
        let active = self.active()?;
        if active.is_some() && !self.is_refreshing() {
            self.spawn_refresh();
        }
        Ok(active)
    }

    pub fn stop(&mut self) -> Result<Option<TimerSummary>> {
        self.halt_refresh();
        lock_timer(&self.timer)?.stop()
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.halt_refresh();
        lock_timer(&self.timer)?.cancel()
    }

    fn spawn_refresh(&mut self) {
        self.halt_refresh();
        self.refresh = Some(RefreshHandle::spawn(self.shared(), self.interval));
    }

    fn halt_refresh(&mut self) {
        if let Some(handle) = self.refresh.take() {
            handle.cancel();
        }
    }
}
