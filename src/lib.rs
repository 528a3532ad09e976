// ============================================================================
// testrun_actors
// ============================================================================
//
// Actor-style concurrency runtime and the launcher/daemon pipeline built on
// it:
// - actors/      - Eventizers, mailboxes, actor threads, the `Actors` runtime
// - events/      - Message contracts shared by launcher and daemon
// - demux/       - Per-run reconstruction of the interleaved suite stream
// - messaging/   - Versioned JSON-lines transport over loopback TCP
// - daemon/      - Runs test classes and reports suite events
// - launcher/    - Summons the daemon and renders its results
// - metrics/     - Prometheus metrics fed by the runtime hooks
// - persistence/ - Entity read/update facade
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod daemon;
pub mod demux;
pub mod events;
pub mod launcher;
pub mod messaging;
pub mod metrics;
pub mod persistence;
pub mod utils;
