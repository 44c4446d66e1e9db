use crate::error::EventBusError;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, watch};
use tracing::{trace, warn};

/// 128 is plenty for configuration lifecycle events.
const DEFAULT_CAPACITY: usize = 128;
const MIN_CAPACITY: usize = 1;

/// Supported channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Broadcast (fan-out) semantics.
    Broadcast { capacity: usize },
    /// Watch (latest-value) semantics.
    Watch,
}

/// Marker trait for types that can be sent across the [`EventBus`].
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

/// Identifies a registered handler so it can be removed with [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug)]
struct ChannelState {
    kind: ChannelKind,
    sender: Box<dyn Any + Send + Sync>,
}

#[derive(Debug, Default)]
struct Topic {
    /// Each entry holds a `Handler<T>` for the topic's `T`.
    handlers: Vec<(HandlerId, Arc<dyn Any + Send + Sync>)>,
    channel: Option<ChannelState>,
}

#[derive(Debug)]
enum ChannelHandle<T> {
    Broadcast(broadcast::Sender<Arc<T>>),
    Watch(watch::Sender<Arc<T>>),
}

impl<T: Event> ChannelHandle<T> {
    fn from_state(state: &ChannelState) -> Result<Self, EventBusError> {
        let handle = match state.kind {
            ChannelKind::Broadcast { .. } => state
                .sender
                .downcast_ref::<broadcast::Sender<Arc<T>>>()
                .map(|tx| Self::Broadcast(tx.clone())),
            ChannelKind::Watch => state
                .sender
                .downcast_ref::<watch::Sender<Arc<T>>>()
                .map(|tx| Self::Watch(tx.clone())),
        };
        handle.ok_or_else(type_mismatch::<T>)
    }
}

#[derive(Debug, Default)]
struct BusInner {
    topics: RwLock<FxHashMap<TypeId, Topic>>,
    next_handler: AtomicU64,
}

/// A thread-safe, type-keyed event bus.
///
/// Cloning is cheap; clones share the same topics.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a new, empty `EventBus`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a synchronous handler for events of type `T`.
    ///
    /// Handlers run on the publishing thread in registration order.
    pub fn on<T: Event>(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId(self.inner.next_handler.fetch_add(1, Ordering::Relaxed));
        let handler: Handler<T> = Arc::new(handler);
        let mut topics = self.inner.topics.write();
        topics.entry(TypeId::of::<T>()).or_default().handlers.push((id, Arc::new(handler)));
        trace!(event = std::any::type_name::<T>(), ?id, "Handler registered");
        id
    }

    /// Removes a handler. Returns `false` when it was not registered.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut topics = self.inner.topics.write();
        for topic in topics.values_mut() {
            if let Some(pos) = topic.handlers.iter().position(|(h, _)| *h == id) {
                topic.handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of synchronous handlers registered for `T`.
    #[must_use]
    pub fn handler_count<T: Event>(&self) -> usize {
        self.inner.topics.read().get(&TypeId::of::<T>()).map_or(0, |t| t.handlers.len())
    }

    /// Subscribes to events of type `T` through a broadcast channel with default capacity.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if `T` already has a watch channel.
    ///
    /// # Examples
    /// ```rust
    /// use strata_event_bus::{EventBus, EventReceiverExt};
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// struct Reloaded(u64);
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), strata_event_bus::EventBusError> {
    /// let bus = EventBus::new();
    /// let mut rx = bus.subscribe::<Reloaded>()?;
    /// bus.publish(Reloaded(1))?;
    /// assert_eq!(rx.recv_event().await.map(|e| e.0), Some(1));
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe<T: Event>(&self) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        self.subscribe_with_capacity::<T>(DEFAULT_CAPACITY)
    }

    /// Subscribes with a specific broadcast buffer capacity.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidCapacity`] if `capacity` is zero, or
    /// [`EventBusError::ChannelKindMismatch`] if `T` already has a watch channel.
    pub fn subscribe_with_capacity<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        let capacity = validate_capacity(capacity)?;
        match self.ensure_channel::<T>(ChannelKind::Broadcast { capacity }, None)? {
            ChannelHandle::Broadcast(tx) => Ok(tx.subscribe()),
            ChannelHandle::Watch(_) => Err(type_mismatch::<T>()),
        }
    }

    /// Subscribes to a watch channel (latest-value semantics), creating it with
    /// `initial` if absent.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if `T` already has a broadcast channel.
    pub fn subscribe_watch<T: Event>(
        &self,
        initial: T,
    ) -> Result<watch::Receiver<Arc<T>>, EventBusError> {
        match self.ensure_channel::<T>(ChannelKind::Watch, Some(Arc::new(initial)))? {
            ChannelHandle::Watch(tx) => Ok(tx.subscribe()),
            ChannelHandle::Broadcast(_) => Err(type_mismatch::<T>()),
        }
    }

    /// Publishes an event to every handler and channel subscriber of `T`.
    ///
    /// Returns the number of listeners reached (handlers plus channel receivers).
    /// Publishing with no listeners is not an error.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the topic table is corrupted.
    pub fn publish<T: Event>(&self, event: T) -> Result<usize, EventBusError> {
        self.publish_arc(Arc::new(event))
    }

    /// Publishes a shared event instance without re-wrapping.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the topic table is corrupted.
    pub fn publish_arc<T: Event>(&self, event: Arc<T>) -> Result<usize, EventBusError> {
        let (handlers, channel) = {
            let topics = self.inner.topics.read();
            let Some(topic) = topics.get(&TypeId::of::<T>()) else {
                trace!(event = std::any::type_name::<T>(), "Event dropped: no listeners");
                return Ok(0);
            };
            let handlers = topic
                .handlers
                .iter()
                .map(|(_, h)| h.downcast_ref::<Handler<T>>().cloned().ok_or_else(type_mismatch::<T>))
                .collect::<Result<Vec<_>, _>>()?;
            let channel = topic.channel.as_ref().map(ChannelHandle::<T>::from_state).transpose()?;
            (handlers, channel)
        };

        for handler in &handlers {
            handler(&event);
        }

        let receivers = match channel {
            Some(ChannelHandle::Broadcast(tx)) => tx.send(event).unwrap_or(0),
            Some(ChannelHandle::Watch(tx)) => {
                let count = tx.receiver_count();
                tx.send_replace(event);
                count
            },
            None => 0,
        };

        let count = handlers.len() + receivers;
        trace!(event = std::any::type_name::<T>(), count, "Event dispatched");
        Ok(count)
    }

    /// Drops every handler and channel, closing all receivers.
    ///
    /// Returns the number of topics that were removed.
    pub fn shutdown(&self) -> usize {
        let mut topics = self.inner.topics.write();
        let count = topics.len();
        topics.clear();
        count
    }

    fn ensure_channel<T: Event>(
        &self,
        kind: ChannelKind,
        initial: Option<Arc<T>>,
    ) -> Result<ChannelHandle<T>, EventBusError> {
        let mut topics = self.inner.topics.write();
        let topic = topics.entry(TypeId::of::<T>()).or_default();

        if let Some(existing) = &topic.channel {
            return match (existing.kind, kind) {
                (
                    ChannelKind::Broadcast { capacity: existing_capacity },
                    ChannelKind::Broadcast { capacity },
                ) => {
                    if existing_capacity != capacity {
                        warn!(
                            event = std::any::type_name::<T>(),
                            existing_capacity,
                            requested_capacity = capacity,
                            "Broadcast channel already initialized with a different capacity"
                        );
                    }
                    ChannelHandle::from_state(existing)
                },
                (ChannelKind::Watch, ChannelKind::Watch) => ChannelHandle::from_state(existing),
                _ => Err(EventBusError::ChannelKindMismatch {
                    message: format!(
                        "Expected {kind:?} but found {:?} for {}",
                        existing.kind,
                        std::any::type_name::<T>()
                    )
                    .into(),
                    context: None,
                }),
            };
        }

        trace!(event = std::any::type_name::<T>(), ?kind, "Initializing new event channel");
        let (sender, handle) = match kind {
            ChannelKind::Broadcast { capacity } => {
                let (tx, _) = broadcast::channel::<Arc<T>>(capacity);
                let sender: Box<dyn Any + Send + Sync> = Box::new(tx.clone());
                (sender, ChannelHandle::Broadcast(tx))
            },
            ChannelKind::Watch => {
                let initial = initial.ok_or_else(|| EventBusError::TypeMismatch {
                    message: "Watch channel requires an initial value".into(),
                    context: Some(std::any::type_name::<T>().into()),
                })?;
                let (tx, _) = watch::channel::<Arc<T>>(initial);
                let sender: Box<dyn Any + Send + Sync> = Box::new(tx.clone());
                (sender, ChannelHandle::Watch(tx))
            },
        };
        topic.channel = Some(ChannelState { kind, sender });
        Ok(handle)
    }
}

fn type_mismatch<T>() -> EventBusError {
    EventBusError::TypeMismatch {
        message: std::any::type_name::<T>().into(),
        context: Some("Unexpected event type".into()),
    }
}

fn validate_capacity(capacity: usize) -> Result<usize, EventBusError> {
    if capacity < MIN_CAPACITY {
        return Err(EventBusError::InvalidCapacity {
            message: format!("capacity must be >= {MIN_CAPACITY}").into(),
            context: None,
        });
    }
    Ok(capacity)
}
