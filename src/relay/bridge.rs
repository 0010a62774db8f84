//! Event Relay Bridge
//!
//! Turns a push-based [`NotificationSource`] into a single-listener stream.
//! The source registration is made lazily when a listener attaches and removed
//! when it detaches.
//!
//! The active subscription lives behind a read/write lock. Deliveries hold the
//! read lock for the whole time they touch the sink, `start` and `stop` take the
//! write lock, so once `stop` returns nothing further reaches the old sink.
//! Each registration callback carries the id of the subscription it was made
//! for and is ignored unless that subscription is still the active one, which
//! covers sources that hand out a stale callback after unregistering.

use std::sync::{Arc, Weak};

use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;

use crate::relay::error::{RelayError, RelayResult};
use crate::relay::notification::Notification;
use crate::relay::options::{Extraction, ListenArgs, RelayOptions};
use crate::relay::source::{
    NotificationCallback, NotificationSource, ReceiverScope, RegistrationToken, TopicFilter,
};
use crate::relay::traits::{EventSink, StreamHandler};

/// Handle describing an active subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: Uuid,
    options: RelayOptions,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    pub fn filter_key(&self) -> &str {
        &self.options.filter_key
    }

    pub fn payload_field(&self) -> &str {
        &self.options.payload_field
    }
}

/// Counters describing what the bridge did with incoming notifications
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Values handed to a sink
    pub forwarded: u64,
    /// Notifications whose topic did not match the filter key
    pub topic_mismatch: u64,
    /// Matching notifications without a string payload field
    pub missing_field: u64,
    /// Deliveries for a subscription that is no longer active
    pub stale: u64,
    /// Subscriptions started
    pub subscriptions: u64,
}

struct ActiveSubscription {
    id: Uuid,
    options: RelayOptions,
    token: RegistrationToken,
    sink: Arc<dyn EventSink>,
}

struct BridgeState {
    active: RwLock<Option<ActiveSubscription>>,
    stats: Mutex<RelayStats>,
}

impl BridgeState {
    fn deliver(&self, subscription_id: Option<Uuid>, notification: &Notification) {
        let active = self.active.read();

        let current = match active.as_ref() {
            Some(current) if subscription_id.map_or(true, |id| id == current.id) => current,
            _ => {
                trace!("Dropping {} delivered to an inactive subscription", notification);
                self.stats.lock().stale += 1;
                return;
            }
        };

        match current.options.extract(notification) {
            Extraction::Value(value) => {
                trace!("Forwarding value from {}", notification);
                current.sink.success(value.to_string());
                self.stats.lock().forwarded += 1;
            }
            Extraction::TopicMismatch => {
                debug!(
                    "Ignoring {}: topic does not match '{}'",
                    notification, current.options.filter_key
                );
                self.stats.lock().topic_mismatch += 1;
            }
            Extraction::MissingField => {
                debug!(
                    "Ignoring {}: no string field '{}'",
                    notification, current.options.payload_field
                );
                self.stats.lock().missing_field += 1;
            }
        }
    }
}

/// Relays matching notifications from a source to a single sink
pub struct RelayBridge {
    source: Arc<dyn NotificationSource>,
    state: Arc<BridgeState>,
}

impl RelayBridge {
    pub fn new(source: Arc<dyn NotificationSource>) -> Self {
        Self {
            source,
            state: Arc::new(BridgeState {
                active: RwLock::new(None),
                stats: Mutex::new(RelayStats::default()),
            }),
        }
    }

    /// Attach `sink` and register with the source.
    ///
    /// An already active subscription is torn down first: its registration is
    /// removed and its sink receives end-of-stream. If registration fails the
    /// bridge is left inactive and `sink` is dropped.
    pub fn start(
        &self,
        args: Option<&ListenArgs>,
        sink: Arc<dyn EventSink>,
    ) -> RelayResult<Subscription> {
        let options = RelayOptions::resolve(args);
        let mut active = self.state.active.write();

        if let Some(previous) = active.take() {
            debug!("Superseding subscription {}", previous.id);
            self.teardown(previous);
        }

        let id = Uuid::new_v4();
        let filter = TopicFilter::new(options.filter_key.clone());
        let token = self
            .source
            .register(&filter, ReceiverScope::NotExported, self.callback_for(id))
            .map_err(|source| {
                warn!(
                    "Registration with '{}' failed for '{}': {}",
                    self.source.source_name(),
                    options.filter_key,
                    source
                );
                RelayError::registration(options.filter_key.clone(), source)
            })?;

        info!(
            "Relaying '{}' field '{}' (subscription {})",
            options.filter_key, options.payload_field, id
        );

        *active = Some(ActiveSubscription {
            id,
            options: options.clone(),
            token,
            sink,
        });
        self.state.stats.lock().subscriptions += 1;

        Ok(Subscription { id, options })
    }

    /// Detach the active sink and unregister from the source. No-op when idle.
    pub fn stop(&self) {
        let mut active = self.state.active.write();
        match active.take() {
            Some(current) => {
                debug!("Stopping subscription {}", current.id);
                self.teardown(current);
            }
            None => trace!("Stop requested with no active subscription"),
        }
    }

    /// Stop only if `subscription` is still the active one.
    ///
    /// Returns whether anything was stopped.
    pub fn cancel(&self, subscription: &Subscription) -> bool {
        let mut active = self.state.active.write();
        if active.as_ref().map(|current| current.id) != Some(subscription.id) {
            trace!("Ignoring cancel for superseded subscription {}", subscription.id);
            return false;
        }
        if let Some(current) = active.take() {
            self.teardown(current);
        }
        true
    }

    /// Inspect one notification on behalf of the active subscription
    pub fn on_notification(&self, notification: &Notification) {
        self.state.deliver(None, notification);
    }

    pub fn is_active(&self) -> bool {
        self.state.active.read().is_some()
    }

    pub fn active_options(&self) -> Option<RelayOptions> {
        self.state
            .active
            .read()
            .as_ref()
            .map(|current| current.options.clone())
    }

    pub fn stats(&self) -> RelayStats {
        self.state.stats.lock().clone()
    }

    fn callback_for(&self, id: Uuid) -> NotificationCallback {
        let state: Weak<BridgeState> = Arc::downgrade(&self.state);
        Arc::new(move |notification: &Notification| {
            if let Some(state) = state.upgrade() {
                state.deliver(Some(id), notification);
            }
        })
    }

    // Caller holds the write lock.
    fn teardown(&self, subscription: ActiveSubscription) {
        if let Err(e) = self.source.unregister(subscription.token) {
            warn!(
                "Failed to unregister {} from '{}': {}",
                subscription.token,
                self.source.source_name(),
                e
            );
        }
        subscription.sink.end_of_stream();
    }
}

impl StreamHandler for RelayBridge {
    fn on_listen(&self, arguments: Option<&Value>, sink: Arc<dyn EventSink>) -> RelayResult<()> {
        let args = arguments.map(ListenArgs::from_value);
        self.start(args.as_ref(), sink).map(|_| ())
    }

    fn on_cancel(&self) {
        self.stop();
    }
}

impl Drop for RelayBridge {
    fn drop(&mut self) {
        self.stop();
    }
}
