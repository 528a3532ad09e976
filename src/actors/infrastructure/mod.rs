// ============================================================================
// Actor Infrastructure
// ============================================================================
//
// Concrete runtime machinery:
// - Mailbox and cooperative interrupt
// - Actor threads, handler binding and typed references
// - The `Actors` runtime with its unattended worker pool
//
// ============================================================================

// Private module declarations
mod actor_thread;
mod mailbox;
mod runtime;

// Re-export for public API
pub use actor_thread::{ActorRef, ActorThread};
pub use mailbox::HandlerId;
pub use runtime::{Actors, ShutdownReport};
