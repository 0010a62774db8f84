//! Barcode Broadcast Relay
//!
//! Receives broadcast notifications carrying barcode-scan results and
//! republishes them to a single listener.
//!
//! # Architecture
//!
//! - **Source**: the host's broadcast facility ([`NotificationSource`]), for
//!   example the in-process [`LocalBroadcastBus`]
//! - **Bridge**: registers with the source while a listener is attached and
//!   forwards the payload field of matching notifications ([`RelayBridge`])
//! - **Channel**: the listener-facing stream ([`EventChannel`], [`EventStream`])
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use scanrelay::relay::{EventChannel, LocalBroadcastBus, Notification, RelayBridge, StreamEvent};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = Arc::new(LocalBroadcastBus::new());
//! let bridge = Arc::new(RelayBridge::new(bus.clone()));
//! let channel = EventChannel::new("scanrelay/barcode_broadcast", bridge);
//!
//! let mut stream = channel.listen(None)?;
//! bus.send(&Notification::new("com.scanner.BARCODE").with_field("barcode", "4006381333931"));
//!
//! assert_eq!(stream.next().await, Some(StreamEvent::Value("4006381333931".into())));
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod bus;
pub mod channel;
pub mod error;
pub mod notification;
pub mod options;
pub mod source;
pub mod traits;


pub use bridge::{RelayBridge, RelayStats, Subscription};
pub use bus::LocalBroadcastBus;
pub use channel::{EventChannel, EventStream, StreamEvent, DEFAULT_CHANNEL_NAME};
pub use error::{RelayError, RelayResult, SourceError};
pub use notification::{FieldValue, Notification, Origin};
pub use options::{ListenArgs, RelayOptions, DEFAULT_FILTER_KEY, DEFAULT_PAYLOAD_FIELD};
pub use source::{NotificationCallback, NotificationSource, ReceiverScope, RegistrationToken, TopicFilter};
pub use traits::{EventSink, StreamHandler};
