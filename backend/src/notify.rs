use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use shared::{Notification, Severity};

use crate::state::lock;

/// Where user-facing messages go. Core logic never talks to the user directly.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Asks the user a yes/no question before a destructive action.
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// The answer was given up front, e.g. as a request parameter.
pub struct PresetConfirmation(pub bool);

#[async_trait]
impl Confirmation for PresetConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        log::debug!("Confirmation '{}' answered {}", prompt, self.0);
        self.0
    }
}

/// Keeps the most recent notifications for the status banner and mirrors
/// them to the log.
pub struct NotificationLog {
    entries: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<Notification> {
        lock(&self.entries).iter().rev().cloned().collect()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Error => log::error!("{}", notification.message),
            Severity::Warning => log::warn!("{}", notification.message),
            Severity::Info | Severity::Success => log::info!("{}", notification.message),
        }

        let mut entries = lock(&self.entries);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification);
    }
}
