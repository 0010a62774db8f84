//! Notification Source Abstraction
//!
//! The host platform's broadcast facility, reduced to register/unregister.
//! Implementations may wrap OS broadcast APIs, message-queue subscriptions or an
//! in-process bus such as [`crate::relay::bus::LocalBroadcastBus`].

use std::fmt;
use std::sync::Arc;

use crate::relay::error::SourceError;
use crate::relay::notification::Notification;

/// Callback invoked by a source for each matching notification.
///
/// May be called from any thread the source chooses.
pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Opaque handle identifying one registration with a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationToken(u64);

impl RegistrationToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who may deliver notifications to a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverScope {
    /// Only notifications sent by this process are delivered
    #[default]
    NotExported,
    /// Notifications from any process are delivered
    Exported,
}

impl ReceiverScope {
    pub fn accepts_external(&self) -> bool {
        matches!(self, ReceiverScope::Exported)
    }
}

/// Topic selection for a registration. Matching is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    topic: String,
}

impl TopicFilter {
    pub fn new<S: Into<String>>(topic: S) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn matches(&self, topic: &str) -> bool {
        self.topic == topic
    }
}

/// A publish/subscribe facility offered by the host
pub trait NotificationSource: Send + Sync {
    /// Register `callback` for notifications whose topic passes `filter`
    fn register(
        &self,
        filter: &TopicFilter,
        scope: ReceiverScope,
        callback: NotificationCallback,
    ) -> Result<RegistrationToken, SourceError>;

    /// Remove a registration. After this returns the source must not start new
    /// invocations of the callback.
    fn unregister(&self, token: RegistrationToken) -> Result<(), SourceError>;

    /// Human readable name used in log output
    fn source_name(&self) -> &str {
        "notification-source"
    }
}
