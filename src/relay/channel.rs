//! Event Channel
//!
//! The embedding-side view of a relay: a named channel bound to a
//! [`StreamHandler`]. Listening returns an [`EventStream`]; cancelling or
//! dropping the stream detaches the listener.
//!
//! A channel has at most one listener. Listening again supersedes the previous
//! listener, and the superseded stream can no longer cancel the new one.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use log::{debug, trace};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::relay::error::RelayResult;
use crate::relay::traits::{EventSink, StreamHandler};

/// Default name of the barcode channel
pub const DEFAULT_CHANNEL_NAME: &str = "scanrelay/barcode_broadcast";

/// Item produced by an [`EventStream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Value(String),
    Error { code: String, message: String },
    EndOfStream,
}

/// Sink feeding one [`EventStream`]
struct ChannelSink {
    channel: String,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelSink {
    fn push(&self, event: StreamEvent) {
        // A closed receiver means the listener already went away.
        if self.tx.send(event).is_err() {
            trace!("Listener on '{}' detached, event dropped", self.channel);
        }
    }
}

impl EventSink for ChannelSink {
    fn success(&self, value: String) {
        self.push(StreamEvent::Value(value));
    }

    fn error(&self, code: &str, message: &str) {
        self.push(StreamEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    fn end_of_stream(&self) {
        self.push(StreamEvent::EndOfStream);
    }
}

struct ChannelInner {
    name: String,
    handler: Arc<dyn StreamHandler>,
    // Generation of the current listener, 0 when none. Held across the
    // handler call so a detach cannot interleave with a new listen.
    current: Mutex<u64>,
    next_generation: AtomicU64,
}

impl ChannelInner {
    fn detach(&self, generation: u64) {
        let mut current = self.current.lock();
        if *current == generation {
            debug!("Listener {} on '{}' cancelled", generation, self.name);
            self.handler.on_cancel();
            *current = 0;
        }
    }
}

/// Named single-listener event channel
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<ChannelInner>,
}

impl EventChannel {
    pub fn new<S: Into<String>>(name: S, handler: Arc<dyn StreamHandler>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                name: name.into(),
                handler,
                current: Mutex::new(0),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn has_listener(&self) -> bool {
        *self.inner.current.lock() != 0
    }

    /// Attach a listener, passing `arguments` through to the handler
    pub fn listen(&self, arguments: Option<Value>) -> RelayResult<EventStream> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ChannelSink {
            channel: self.inner.name.clone(),
            tx,
        });

        let mut current = self.inner.current.lock();
        match self.inner.handler.on_listen(arguments.as_ref(), sink) {
            Ok(()) => *current = generation,
            Err(e) => {
                // The handler tore down any previous listener before failing.
                *current = 0;
                return Err(e);
            }
        }
        drop(current);
        debug!("Listener {} attached to '{}'", generation, self.inner.name);

        Ok(EventStream {
            channel: Arc::clone(&self.inner),
            generation,
            events: UnboundedReceiverStream::new(rx),
            finished: false,
            cancelled: false,
        })
    }
}

/// Stream of events for one listener
pub struct EventStream {
    channel: Arc<ChannelInner>,
    generation: u64,
    events: UnboundedReceiverStream<StreamEvent>,
    finished: bool,
    cancelled: bool,
}

impl EventStream {
    /// Detach from the channel. Events already queued can still be read.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.channel.detach(self.generation);
        self.events.close();
    }

    pub fn channel_name(&self) -> &str {
        &self.channel.name
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.events).poll_next(cx) {
            Poll::Ready(Some(StreamEvent::EndOfStream)) => {
                self.finished = true;
                Poll::Ready(Some(StreamEvent::EndOfStream))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
