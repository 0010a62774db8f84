//! In-Process Broadcast Bus
//!
//! A [`NotificationSource`] that lives inside the process. Senders call
//! [`LocalBroadcastBus::send`]; every registration whose topic filter matches is
//! invoked synchronously on the sender's thread, in registration order.
//!
//! Registrations made with [`ReceiverScope::NotExported`] never see
//! notifications whose origin is another process.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace, warn};
use parking_lot::RwLock;

use crate::relay::error::SourceError;
use crate::relay::notification::Notification;
use crate::relay::source::{
    NotificationCallback, NotificationSource, ReceiverScope, RegistrationToken, TopicFilter,
};

struct Registration {
    token: RegistrationToken,
    filter: TopicFilter,
    scope: ReceiverScope,
    callback: NotificationCallback,
}

impl Registration {
    fn accepts(&self, notification: &Notification) -> bool {
        self.filter.matches(&notification.topic)
            && (notification.origin.is_local() || self.scope.accepts_external())
    }
}

#[derive(Default)]
struct BusState {
    registrations: Vec<Registration>,
    required_permission: Option<String>,
    granted: HashSet<String>,
    closed: bool,
}

/// Synchronous in-process broadcast facility
pub struct LocalBroadcastBus {
    name: String,
    state: RwLock<BusState>,
    next_token: AtomicU64,
}

impl LocalBroadcastBus {
    pub fn new() -> Self {
        Self::with_name("local-broadcast")
    }

    pub fn with_name<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(BusState::default()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Require `permission` to be granted before registrations are accepted
    pub fn require_permission<S: Into<String>>(&self, permission: S) {
        self.state.write().required_permission = Some(permission.into());
    }

    pub fn grant_permission<S: Into<String>>(&self, permission: S) {
        self.state.write().granted.insert(permission.into());
    }

    pub fn revoke_permission(&self, permission: &str) {
        self.state.write().granted.remove(permission);
    }

    /// Refuse all further registrations. Existing ones keep receiving.
    pub fn close(&self) {
        debug!("Closing broadcast bus '{}'", self.name);
        self.state.write().closed = true;
    }

    pub fn registration_count(&self) -> usize {
        self.state.read().registrations.len()
    }

    /// Broadcast a notification. Returns the number of receivers invoked.
    pub fn send(&self, notification: &Notification) -> usize {
        // Callbacks run without the state lock held so they may unregister.
        let callbacks: Vec<NotificationCallback> = {
            let state = self.state.read();
            state
                .registrations
                .iter()
                .filter(|registration| registration.accepts(notification))
                .map(|registration| registration.callback.clone())
                .collect()
        };

        trace!(
            "Broadcasting {} to {} receiver(s) on '{}'",
            notification,
            callbacks.len(),
            self.name
        );

        for callback in &callbacks {
            callback(notification);
        }
        callbacks.len()
    }
}

impl Default for LocalBroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSource for LocalBroadcastBus {
    fn register(
        &self,
        filter: &TopicFilter,
        scope: ReceiverScope,
        callback: NotificationCallback,
    ) -> Result<RegistrationToken, SourceError> {
        let mut state = self.state.write();

        if state.closed {
            return Err(SourceError::unavailable(format!(
                "broadcast bus '{}' is closed",
                self.name
            )));
        }

        if let Some(permission) = &state.required_permission {
            if !state.granted.contains(permission) {
                warn!(
                    "Rejected receiver for '{}' on '{}': {} not granted",
                    filter.topic(),
                    self.name,
                    permission
                );
                return Err(SourceError::permission_denied(permission.clone()));
            }
        }

        let token = RegistrationToken::new(self.next_token.fetch_add(1, Ordering::Relaxed));
        state.registrations.push(Registration {
            token,
            filter: filter.clone(),
            scope,
            callback,
        });

        debug!(
            "Registered receiver {} for '{}' ({:?}) on '{}'",
            token,
            filter.topic(),
            scope,
            self.name
        );
        Ok(token)
    }

    fn unregister(&self, token: RegistrationToken) -> Result<(), SourceError> {
        let mut state = self.state.write();
        let before = state.registrations.len();
        state.registrations.retain(|registration| registration.token != token);

        if state.registrations.len() == before {
            return Err(SourceError::UnknownToken(token));
        }

        debug!("Unregistered receiver {} from '{}'", token, self.name);
        Ok(())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, NotificationCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: NotificationCallback = Arc::new(move |n: &Notification| {
            sink.lock().push(n.topic.clone());
        });
        (seen, callback)
    }

    #[test]
    fn test_send_reaches_matching_registrations_only() {
        let bus = LocalBroadcastBus::new();
        let (seen, callback) = recorder();

        bus.register(&TopicFilter::new("a"), ReceiverScope::NotExported, callback)
            .unwrap();

        assert_eq!(bus.send(&Notification::new("a")), 1);
        assert_eq!(bus.send(&Notification::new("b")), 0);
        assert_eq!(*seen.lock(), vec!["a".to_string()]);
    }

    #[test]
    fn test_not_exported_registration_ignores_other_processes() {
        let bus = LocalBroadcastBus::new();
        let (private_seen, private_cb) = recorder();
        let (public_seen, public_cb) = recorder();

        bus.register(&TopicFilter::new("a"), ReceiverScope::NotExported, private_cb)
            .unwrap();
        bus.register(&TopicFilter::new("a"), ReceiverScope::Exported, public_cb)
            .unwrap();

        let spoofed = Notification::new("a").from_external("com.example.spoof");
        assert_eq!(bus.send(&spoofed), 1);

        assert!(private_seen.lock().is_empty());
        assert_eq!(public_seen.lock().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let bus = LocalBroadcastBus::new();
        let (seen, callback) = recorder();

        let token = bus
            .register(&TopicFilter::new("a"), ReceiverScope::NotExported, callback)
            .unwrap();
        assert_eq!(bus.registration_count(), 1);

        bus.unregister(token).unwrap();
        assert_eq!(bus.registration_count(), 0);
        assert_eq!(bus.send(&Notification::new("a")), 0);
        assert!(seen.lock().is_empty());

        assert_eq!(bus.unregister(token), Err(SourceError::UnknownToken(token)));
    }

    #[test]
    fn test_permission_required() {
        let bus = LocalBroadcastBus::new();
        bus.require_permission("scanner.RECEIVE");
        let (_, callback) = recorder();

        let result = bus.register(
            &TopicFilter::new("a"),
            ReceiverScope::NotExported,
            callback.clone(),
        );
        assert_eq!(
            result,
            Err(SourceError::permission_denied("scanner.RECEIVE"))
        );
        assert_eq!(bus.registration_count(), 0);

        bus.grant_permission("scanner.RECEIVE");
        assert!(bus
            .register(&TopicFilter::new("a"), ReceiverScope::NotExported, callback)
            .is_ok());
    }

    #[test]
    fn test_closed_bus_rejects_registration() {
        let bus = LocalBroadcastBus::with_name("test-bus");
        bus.close();
        let (_, callback) = recorder();

        let result = bus.register(&TopicFilter::new("a"), ReceiverScope::NotExported, callback);
        assert!(matches!(result, Err(SourceError::Unavailable { .. })));
    }

    #[test]
    fn test_callback_may_unregister_itself() {
        let bus = Arc::new(LocalBroadcastBus::new());
        let token_slot: Arc<Mutex<Option<RegistrationToken>>> = Arc::new(Mutex::new(None));

        let bus_ref = Arc::clone(&bus);
        let slot = Arc::clone(&token_slot);
        let callback: NotificationCallback = Arc::new(move |_: &Notification| {
            if let Some(token) = slot.lock().take() {
                bus_ref.unregister(token).unwrap();
            }
        });

        let token = bus
            .register(&TopicFilter::new("a"), ReceiverScope::NotExported, callback)
            .unwrap();
        *token_slot.lock() = Some(token);

        assert_eq!(bus.send(&Notification::new("a")), 1);
        assert_eq!(bus.registration_count(), 0);
    }
}
