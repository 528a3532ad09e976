// ============================================================================
// Core Actor Abstractions
// ============================================================================
//
// Contract-level traits shared by every actor: eventizers, the registry that
// locates them, runtime hooks and the error taxonomy.
//
// ============================================================================

pub mod errors;
pub mod eventizer;
pub mod listener;
pub mod registry;

// Re-export core types
pub use errors::*;
pub use eventizer::*;
pub use listener::*;
pub use registry::*;
