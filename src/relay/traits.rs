//! Stream Handler and Sink Traits
//!
//! The consumer side of the relay: a handler is attached to a channel, and on
//! listen it is handed the sink that feeds the single listener.

use std::sync::Arc;

use serde_json::Value;

use crate::relay::error::RelayResult;

/// Push interface towards the single stream listener.
///
/// Implementations must not block and must not call back into the handler that
/// owns them.
pub trait EventSink: Send + Sync {
    /// Deliver one value
    fn success(&self, value: String);

    /// Report a failure on the open stream
    fn error(&self, code: &str, message: &str);

    /// Signal that no further events will follow
    fn end_of_stream(&self);
}

/// Lifecycle callbacks for a single-listener stream
pub trait StreamHandler: Send + Sync {
    /// A listener attached. `arguments` is whatever the listener passed.
    fn on_listen(&self, arguments: Option<&Value>, sink: Arc<dyn EventSink>) -> RelayResult<()>;

    /// The listener detached
    fn on_cancel(&self);
}
