// ============================================================================
// Message Contracts
// ============================================================================
//
// Each contract is a listener trait, a closed event enum with one variant
// per method, a frontend that builds the enum, and an eventizer tying them
// together. The enums are the fixed schema that crosses the process
// boundary; nothing else is deserialized from the wire.
//
// ============================================================================

mod command;
mod ids;
mod suite;
mod test_class;

pub use command::{CommandEvent, CommandListener, CommandListenerEventizer, SuiteRequest};
pub use ids::{RunId, RunIdSequence, TestId};
pub use suite::{FailureCause, SuiteEvent, SuiteListener, SuiteListenerEventizer, SuiteListenerToEvent};
pub use test_class::{TestClassEvent, TestClassListener, TestClassListenerEventizer};
