use std::sync::Arc;

// ============================================================================
// Eventizer - Reified Interface Calls
// ============================================================================
//
// A message contract is a trait (the capability set) plus a closed enum with
// one variant per trait method. The frontend turns method calls into enum
// values, the backend turns enum values back into method calls.
//
// ============================================================================

/// A reified method invocation.
pub trait Message: Send + 'static {
    /// Name of the method this message stands for
    fn name(&self) -> &'static str;
}

/// A message that can be fired on any implementor of the capability set `T`.
///
/// Firing takes `&self` so the same event can be replayed any number of times;
/// arguments are cloned into each invocation.
pub trait Event<T: ?Sized>: Message {
    fn fire_on(&self, target: &mut T);
}

/// Accepts messages on behalf of someone else. Shared between callers.
pub trait MessageSender<M>: Send + Sync {
    fn send(&self, message: M);
}

/// Consumes messages. Owned by exactly one caller at a time.
pub trait MessageConsumer<M>: Send {
    fn consume(&mut self, message: M);
}

/// Encoder/decoder pair for one message contract.
pub trait Eventizer: Send + Sync + 'static {
    /// The capability set, e.g. `dyn SuiteListener + Send`
    type Target: ?Sized + Send + 'static;

    /// The closed set of reified calls of `Target`
    type Event: Event<Self::Target>;

    /// Contract name used in errors and logs
    const CONTRACT: &'static str;

    /// Returns a `Target` whose every method call sends exactly one event to `sink`
    fn new_frontend(&self, sink: Arc<dyn MessageSender<Self::Event>>) -> Box<Self::Target>;

    /// Returns a consumer that re-invokes each event on `target`
    fn new_backend(&self, target: Box<Self::Target>) -> Box<dyn MessageConsumer<Self::Event>> {
        Box::new(EventDispatcher::new(target))
    }
}

/// Backend that fires every consumed event on its target.
pub struct EventDispatcher<T: ?Sized> {
    target: Box<T>,
}

impl<T: ?Sized> EventDispatcher<T> {
    pub fn new(target: Box<T>) -> Self {
        Self { target }
    }
}

impl<T, M> MessageConsumer<M> for EventDispatcher<T>
where
    T: ?Sized + Send,
    M: Event<T>,
{
    fn consume(&mut self, message: M) {
        message.fire_on(&mut *self.target);
    }
}

/// Adapts a consumer into a sender for single-threaded pipelines.
///
/// Calls are serialized through a mutex, so the consumer still observes one
/// message at a time.
pub struct DirectSender<M> {
    consumer: std::sync::Mutex<Box<dyn MessageConsumer<M>>>,
}

impl<M> DirectSender<M> {
    pub fn new(consumer: Box<dyn MessageConsumer<M>>) -> Self {
        Self {
            consumer: std::sync::Mutex::new(consumer),
        }
    }
}

impl<M: Send> MessageSender<M> for DirectSender<M> {
    fn send(&self, message: M) {
        let mut consumer = self
            .consumer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        consumer.consume(message);
    }
}
