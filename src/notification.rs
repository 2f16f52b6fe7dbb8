use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, duration: Duration) -> Self {
        Self {
            message: message.into(),
            level,
            expires_at: Instant::now() + duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Replacement for the dialog boxes of a desktop toolkit: short-lived
/// messages shown on the status line, newest first.
#[derive(Debug)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_secs(4))
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Info);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Error);
    }

    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        let notification = Notification::new(message, level, self.default_duration);
        self.notifications.insert(0, notification);
    }

    /// Remove expired notifications, returns true if any were removed
    pub fn update(&mut self) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired());
        self.notifications.len() != initial_len
    }

    /// The most recent live notification
    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_notification_wins() {
        let mut manager = NotificationManager::new();
        manager.info("first");
        manager.error("second");

        let current = manager.current().unwrap();
        assert_eq!(current.message, "second");
        assert_eq!(current.level, NotificationLevel::Error);
    }

    #[test]
    fn update_drops_expired_messages() {
        let mut manager = NotificationManager::with_default_duration(Duration::from_millis(0));
        manager.info("gone");
        assert!(manager.update());
        assert!(manager.current().is_none());
    }
}
