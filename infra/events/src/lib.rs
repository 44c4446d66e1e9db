//! # Event Bus
//!
//! Type-keyed notification bus shared by the configuration engine and its
//! subscribers.
//!
//! ## Overview
//!
//! Every event type gets one topic. A topic fans out to two kinds of listeners:
//!
//! * **Handlers**: synchronous callbacks run on the publishing thread, in
//!   registration order, before `publish` returns. This is how directive-declared
//!   subscribers and settings-group listeners observe changes without polling.
//! * **Channels**: an optional tokio `broadcast` (fan-out) or `watch` (latest value)
//!   channel for async consumers.
//!
//! Topics live in an `FxHashMap` behind a `parking_lot::RwLock`; handlers are
//! cloned out before they run, so a handler may publish or subscribe re-entrantly.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use strata_event_bus::{EventBus, EventBusError};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct GroupSaved { nodes: u64 }
//!
//! fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new();
//!     let seen = Arc::new(AtomicU64::new(0));
//!
//!     let sink = Arc::clone(&seen);
//!     bus.on::<GroupSaved>(move |event| {
//!         sink.fetch_add(event.nodes, Ordering::SeqCst);
//!     });
//!
//!     bus.publish(GroupSaved { nodes: 3 })?;
//!     assert_eq!(seen.load(Ordering::SeqCst), 3);
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod receiver;

pub use bus::{ChannelKind, Event, EventBus, HandlerId};
pub use error::{EventBusError, EventBusErrorExt};
pub use receiver::EventReceiverExt;
