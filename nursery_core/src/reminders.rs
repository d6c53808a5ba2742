//! Sleep and feeding reminders gated by the user's notification settings.
//!
//! All scheduling here is best-effort: failures are logged and reported as
//! "nothing scheduled" rather than errors.

use crate::clock::{Clock, SystemClock};
use crate::config::ReminderConfig;
use crate::notify::{
    NotificationContent, NotificationId, NotificationKind, NotificationScheduler, Trigger,
};
use crate::store::JsonFileStore;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-category reminder switches
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "enabled")]
    pub sleep_reminders: bool,
    #[serde(default = "enabled")]
    pub feeding_reminders: bool,
    #[serde(default = "enabled")]
    pub diaper_reminders: bool,
}

fn enabled() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sleep_reminders: true,
            feeding_reminders: true,
            diaper_reminders: true,
        }
    }
}

pub struct Reminders<N, C = SystemClock> {
    settings: JsonFileStore<NotificationSettings>,
    notifier: N,
    clock: C,
    config: ReminderConfig,
}

impl<N: NotificationScheduler> Reminders<N, SystemClock> {
    pub fn new(settings_path: impl Into<PathBuf>, notifier: N, config: ReminderConfig) -> Self {
        Self::with_clock(settings_path, notifier, SystemClock, config)
    }
}

impl<N: NotificationScheduler, C: Clock> Reminders<N, C> {
    pub fn with_clock(
        settings_path: impl Into<PathBuf>,
        notifier: N,
        clock: C,
        config: ReminderConfig,
    ) -> Self {
        Self {
            settings: JsonFileStore::new(settings_path),
            notifier,
            clock,
            config,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    /// Current settings; defaults when none are stored or they are unreadable
    pub fn settings(&self) -> NotificationSettings {
        match self.settings.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => NotificationSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to load notification settings: {}", e);
                NotificationSettings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &NotificationSettings) -> Result<()> {
        self.settings.save(settings)?;
        tracing::info!("Saved notification settings: {:?}", settings);
        Ok(())
    }

    /// Remind the caregiver shortly before a predicted nap
    ///
    /// Replaces any earlier sleep reminder. Returns `None` when sleep
    /// reminders are off, the reminder time has already passed, or the
    /// scheduler failed.
    pub fn schedule_sleep_reminder(
        &mut self,
        baby_name: &str,
        next_nap_time: DateTime<Utc>,
        wake_window_minutes: i64,
    ) -> Option<NotificationId> {
        if !self.settings().sleep_reminders {
            tracing::debug!("Sleep reminders disabled");
            return None;
        }

        self.cancel_sleep_reminders();

        let reminder_time = next_nap_time - Duration::minutes(self.config.sleep_lead_minutes);
        if reminder_time <= self.clock.now() {
            tracing::debug!("Sleep reminder time {} already passed", reminder_time);
            return None;
        }

        let content = NotificationContent {
            title: "Sleep Reminder".into(),
            body: format!(
                "{} might be getting sleepy soon. It's been about {} minutes since the last nap.",
                baby_name, wake_window_minutes
            ),
            kind: NotificationKind::SleepReminder,
            baby_id: None,
            sticky: false,
        };
        self.schedule_quietly(&content, Trigger::At(reminder_time))
    }

    /// Remind the caregiver to check on feeding after `interval_hours`
    ///
    /// Falls back to the configured interval when `interval_hours` is None.
    pub fn schedule_feeding_reminder(
        &mut self,
        baby_name: &str,
        interval_hours: Option<u32>,
    ) -> Option<NotificationId> {
        if !self.settings().feeding_reminders {
            tracing::debug!("Feeding reminders disabled");
            return None;
        }

        self.cancel_feeding_reminders();

        let hours = interval_hours.unwrap_or(self.config.feeding_interval_hours);
        let reminder_time = self.clock.now() + Duration::hours(i64::from(hours));
        let content = NotificationContent {
            title: "Feeding Reminder".into(),
            body: format!(
                "It's been {} hours. Time to check if {} is hungry!",
                hours, baby_name
            ),
            kind: NotificationKind::FeedingReminder,
            baby_id: None,
            sticky: false,
        };
        self.schedule_quietly(&content, Trigger::At(reminder_time))
    }

    pub fn cancel_sleep_reminders(&mut self) -> usize {
        self.cancel_kind(NotificationKind::SleepReminder)
    }

    pub fn cancel_feeding_reminders(&mut self) -> usize {
        self.cancel_kind(NotificationKind::FeedingReminder)
    }

    /// Fire a notification immediately to check delivery works
    pub fn send_test_notification(&mut self) -> Result<NotificationId> {
        let id = NotificationId::generate();
        let content = NotificationContent {
            title: "Test Notification".into(),
            body: "Nursery notifications are working!".into(),
            kind: NotificationKind::Test,
            baby_id: None,
            sticky: false,
        };
        self.notifier.schedule(&id, &content, Trigger::Immediate)?;
        Ok(id)
    }

    pub fn cancel_all(&mut self) -> Result<()> {
        self.notifier.cancel_all()
    }

    fn schedule_quietly(
        &mut self,
        content: &NotificationContent,
        trigger: Trigger,
    ) -> Option<NotificationId> {
        let id = NotificationId::generate();
        match self.notifier.schedule(&id, content, trigger) {
            Ok(()) => {
                tracing::info!("Scheduled {:?} {} for {:?}", content.kind, id, trigger);
                Some(id)
            }
            Err(e) => {
                tracing::warn!("Failed to schedule {:?}: {}", content.kind, e);
                None
            }
        }
    }

    /// Cancel every scheduled notification of one kind; returns how many
    fn cancel_kind(&mut self, kind: NotificationKind) -> usize {
        let scheduled = match self.notifier.scheduled() {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Failed to list notifications: {}", e);
                return 0;
            }
        };

        let mut cancelled = 0;
        for notification in scheduled.iter().filter(|n| n.content.kind == kind) {
            match self.notifier.cancel(&notification.id) {
                Ok(()) => cancelled += 1,
                Err(e) => tracing::warn!("Failed to cancel {}: {}", notification.id, e),
            }
        }
        cancelled
    }
}
