// ============================================================================
// Demux Module
// ============================================================================
//
// Launcher-side reconstruction of per-run state from the single suite
// event stream delivered by the daemon.
//
// ============================================================================

mod errors;
mod suite_event_demuxer;

pub use errors::DemuxError;
pub use suite_event_demuxer::{GlobalTestId, SuiteEventDemuxer};
