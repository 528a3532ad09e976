// ============================================================================
// Messaging - Cross-Process Transport
// ============================================================================
//
// A persistent, ordered, bidirectional stream of typed events between the
// launcher and the daemon, framed as versioned JSON lines over TCP.
//
// ============================================================================

mod connection;
mod wire;

pub use connection::{accept_one, connect_with_retry, frame_channel, run_connection, FrameWriter};
pub use wire::{decode_frame, encode_frame, WireError, WireFrame, PROTOCOL_VERSION};
