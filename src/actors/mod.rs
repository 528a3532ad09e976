// ============================================================================
// Actors Module
// ============================================================================
//
// Message-driven concurrency for the launcher and the daemon.
//
// Structure:
// - core/           - Contracts: eventizers, registry, runtime hooks, errors
// - infrastructure/ - Mailboxes, actor threads and the `Actors` runtime
//
// Every actor thread owns one mailbox and processes it strictly in order.
// Calls through an `ActorRef` never block and never return a value; replies
// travel as messages in the other direction.
//
// ============================================================================

// Private module declarations
mod core;
mod infrastructure;

// Re-export only what's needed in the public API
pub use self::core::{
    ActorError, CompositeMessageListener, DirectSender, Event, EventDispatcher, Eventizer,
    EventizerRegistry, FailureHandler, Message, MessageConsumer, MessageListener, MessageSender,
    NullMessageListener, TracingFailureLogger, TracingMessageListener,
};
pub use infrastructure::{ActorRef, ActorThread, Actors, HandlerId, ShutdownReport};
