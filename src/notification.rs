//! Transient notices raised when the viewer cannot show what was asked for

use std::fmt;
use std::time::{Duration, Instant};

/// How long a notice stays visible
pub const NOTICE_LIFETIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// The page is shown but something on it is missing
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    expires_at: Instant,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        write!(f, "[{level}] {}", self.message)
    }
}

/// Notices in the order they were raised
#[derive(Debug)]
pub struct NotificationManager {
    notices: Vec<Notification>,
    lifetime: Duration,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_lifetime(NOTICE_LIFETIME)
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            notices: Vec::new(),
            lifetime,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(NotificationLevel::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message.into());
    }

    fn push(&mut self, level: NotificationLevel, message: String) {
        self.notices.push(Notification {
            level,
            message,
            expires_at: Instant::now() + self.lifetime,
        });
    }

    /// Drop notices whose lifetime has passed
    pub fn expire(&mut self) {
        let now = Instant::now();
        self.notices.retain(|n| n.expires_at > now);
    }

    /// Oldest first
    pub fn all(&self) -> &[Notification] {
        &self.notices
    }

    pub fn with_level(&self, level: NotificationLevel) -> impl Iterator<Item = &Notification> {
        self.notices.iter().filter(move |n| n.level == level)
    }

    pub fn has_notifications(&self) -> bool {
        !self.notices.is_empty()
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn notices_keep_raise_order_and_level() {
        let mut manager = NotificationManager::new();
        manager.warn("Text layer unavailable for page 2");
        manager.error("Could not render page 3");

        let shown: Vec<String> = manager.all().iter().map(ToString::to_string).collect();
        assert_eq!(
            shown,
            [
                "[warning] Text layer unavailable for page 2",
                "[error] Could not render page 3"
            ]
        );
        assert_eq!(manager.with_level(NotificationLevel::Error).count(), 1);

        manager.clear();
        assert!(!manager.has_notifications());
    }

    #[test]
    fn expired_notices_are_dropped() {
        let mut manager = NotificationManager::with_lifetime(Duration::from_millis(20));
        manager.error("gone soon");
        manager.expire();
        assert!(manager.has_notifications());

        thread::sleep(Duration::from_millis(40));
        manager.expire();
        assert!(!manager.has_notifications());
    }
}
