//! Import diagnostics.
//!
//! Content-level anomalies that a decoder recovers from (an unknown chunk,
//! an unrecognized text line, a struct missing from the file's schema) are
//! collected as [`Notification`] items on the finished
//! [`Scene`](crate::scene::Scene) instead of aborting the import. Every
//! notification is forwarded to the `log` facade as it is recorded.

use crate::error::Location;
use std::fmt;

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    /// A unit of input (chunk, block, line, entity) was skipped.
    Skipped,
    /// The input uses a feature this importer does not map.
    NotSupported,
    /// Suspicious but usable input.
    Warning,
    /// An error that was recovered from in failsafe mode.
    Error,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "Skipped"),
            Self::NotSupported => write!(f, "NotSupported"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// A single notification produced while decoding.
#[derive(Debug, Clone)]
pub struct Notification {
    pub notification_type: NotificationType,
    pub message: String,
    pub location: Location,
}

impl Notification {
    /// Create a new notification.
    pub fn new(
        notification_type: NotificationType,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Location::Unknown => write!(f, "[{}] {}", self.notification_type, self.message),
            location => write!(
                f,
                "[{}] {} ({})",
                self.notification_type, self.message, location
            ),
        }
    }
}

/// Collects notifications during an import.
#[derive(Debug, Clone, Default)]
pub struct NotificationCollection {
    items: Vec<Notification>,
}

impl NotificationCollection {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Record a notification and forward it to the log.
    pub fn notify(
        &mut self,
        notification_type: NotificationType,
        location: Location,
        message: impl Into<String>,
    ) {
        let notification = Notification::new(notification_type, location, message);
        match notification_type {
            NotificationType::Skipped | NotificationType::NotSupported => {
                log::debug!("{notification}")
            }
            NotificationType::Warning | NotificationType::Error => log::warn!("{notification}"),
        }
        self.items.push(notification);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Notification> {
        self.items.iter()
    }

    /// Get all notifications of a specific type.
    pub fn of_type(&self, nt: NotificationType) -> Vec<&Notification> {
        self.items
            .iter()
            .filter(|n| n.notification_type == nt)
            .collect()
    }

    pub fn has_type(&self, nt: NotificationType) -> bool {
        self.items.iter().any(|n| n.notification_type == nt)
    }

    /// Append another collection, keeping order.
    pub fn extend(&mut self, other: NotificationCollection) {
        self.items.extend(other.items);
    }
}

impl IntoIterator for NotificationCollection {
    type Item = Notification;
    type IntoIter = std::vec::IntoIter<Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a NotificationCollection {
    type Item = &'a Notification;
    type IntoIter = std::slice::Iter<'a, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
