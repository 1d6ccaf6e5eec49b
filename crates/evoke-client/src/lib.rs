//! Client side of evoke progress streaming.
//!
//! [`EventSubscriber`] keeps a project's SSE stream open, decoding records
//! into [`AppEvent`](evoke_core::AppEvent)s and reconnecting with bounded
//! exponential backoff. When every attempt fails it returns an error rather
//! than retrying forever.

#![deny(unused_crate_dependencies)]

pub mod backoff;
pub mod decoder;
pub mod subscriber;

pub use backoff::{ReconnectPolicy, ReconnectState};
pub use decoder::SseDecoder;
pub use subscriber::{ClientError, EventSubscriber, SubscriptionHandler};
