//! User-facing notifications.
//!
//! The board session reports the outcome of every mutation through a
//! [`Notifier`]. Delivery is best effort: when the channel is full the
//! notification is dropped and logged, never awaited.

use tokio::sync::mpsc;

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational or success message.
    Normal,
    /// Something failed.
    Error,
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short headline.
    pub title: String,
    /// Optional detail line.
    pub description: Option<String>,
    /// Presentation severity.
    pub severity: Severity,
}

impl Notification {
    /// Creates a [`Severity::Normal`] notification.
    pub fn success(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            severity: Severity::Normal,
        }
    }

    /// Creates a [`Severity::Error`] notification.
    pub fn error(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            severity: Severity::Error,
        }
    }

    /// Returns `true` for error notifications.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = match self.severity {
            Severity::Normal => "ok",
            Severity::Error => "error",
        };
        write!(f, "[{marker}] {}", self.title)?;
        if let Some(description) = &self.description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}

/// Sending half of the notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Creates a notifier and the receiver the presentation layer drains.
    #[must_use]
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Delivers a notification without waiting.
    pub fn notify(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(title = %dropped.title, "notification channel full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                tracing::debug!(title = %dropped.title, "no notification listener");
            }
        }
    }

    /// Shorthand for a [`Severity::Normal`] notification.
    pub fn success(&self, title: impl Into<String>, description: Option<String>) {
        self.notify(Notification::success(title, description));
    }

    /// Shorthand for a [`Severity::Error`] notification.
    pub fn error(&self, title: impl Into<String>, description: Option<String>) {
        self.notify(Notification::error(title, description));
    }
}
